//! Well-formedness checks for lowered functions.

use crate::ir::{Function, InstrOp};
use crate::pass::{Pass, TransformError};
use crate::Environment;
use tracing::debug;

/// Rejects functions that are not valid SSA or that still contain implicit
/// coercions. Leaves the function unchanged and records `verified` in the
/// environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verify;

impl Pass for Verify {
    fn name(&self) -> &str {
        "verify"
    }

    fn run(
        &self,
        func: Function,
        env: Environment,
    ) -> Result<(Function, Environment), TransformError> {
        check(&func)?;
        debug!(instrs = func.body.len(), "function verified");
        Ok((func, env.with("verified", true)))
    }
}

/// Check `func` without consuming it.
pub fn check(func: &Function) -> Result<(), TransformError> {
    if func.captures.len() != func.params.len() {
        return Err(TransformError::Malformed {
            value: 0,
            reason: format!(
                "{} parameter(s) but {} captured value(s)",
                func.params.len(),
                func.captures.len()
            ),
        });
    }

    for (id, instr) in func.body.iter().enumerate() {
        for operand in instr.operands() {
            if operand >= id {
                return Err(TransformError::Malformed {
                    value: id,
                    reason: format!("use of %{} before its definition", operand),
                });
            }
        }

        match &instr.op {
            InstrOp::Param(n) => match func.params.get(*n) {
                None => {
                    return Err(TransformError::Malformed {
                        value: id,
                        reason: format!("parameter {} out of range", n),
                    });
                }
                Some(param) if param.ty != instr.ty => {
                    return Err(TransformError::Malformed {
                        value: id,
                        reason: format!("parameter {} is {}, not {}", n, param.ty, instr.ty),
                    });
                }
                Some(_) => {}
            },
            InstrOp::Convert(value) => {
                let from = func.body[*value].ty.dtype;
                if !from.widens_to(instr.ty.dtype) {
                    return Err(TransformError::UnsafeCoercion {
                        value: id,
                        from,
                        to: instr.ty.dtype,
                    });
                }
            }
            InstrOp::Const(_) | InstrOp::Binary { .. } => {}
        }
    }

    if func.ret >= func.body.len() {
        return Err(TransformError::Malformed {
            value: func.ret,
            reason: "returned value is not defined".to_string(),
        });
    }

    if let Some(coercion) = func.implicit_coercions().first() {
        return Err(TransformError::ImplicitCoercion {
            instr: coercion.instr,
            operand: coercion.operand,
            found: coercion.from,
            expected: coercion.to,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instr, Param};
    use crate::{ExplicitCoercions, OpKind, Strategy};
    use kiln_term::{DType, Type, Value};

    fn mixed() -> Function {
        Function {
            name: "main".to_string(),
            params: vec![Param {
                name: "x".to_string(),
                ty: Type::scalar(DType::Int64),
            }],
            body: vec![
                Instr::new(InstrOp::Param(0), Type::scalar(DType::Int64)),
                Instr::new(InstrOp::Const(Value::Float(2.0)), Type::scalar(DType::Float64)),
                Instr::new(
                    InstrOp::Binary {
                        op: OpKind::Mul,
                        operand: DType::Float64,
                        lhs: 0,
                        rhs: 1,
                    },
                    Type::scalar(DType::Float64),
                ),
            ],
            ret: 2,
            captures: vec![Value::Int(3)],
        }
    }

    #[test]
    fn test_rejects_implicit_coercion() {
        assert_eq!(
            check(&mixed()),
            Err(TransformError::ImplicitCoercion {
                instr: 2,
                operand: 0,
                found: DType::Int64,
                expected: DType::Float64,
            })
        );
    }

    #[test]
    fn test_accepts_coerced_function() {
        let env = Environment::for_strategy(&Strategy::default());
        let (func, env) = ExplicitCoercions.run(mixed(), env).unwrap();
        let (_, env) = Verify.run(func, env).unwrap();
        assert_eq!(env.get("verified").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn test_rejects_forward_use() {
        let mut func = mixed();
        func.body.swap(0, 2);
        assert!(matches!(check(&func), Err(TransformError::Malformed { value: 0, .. })));
    }

    #[test]
    fn test_rejects_missing_return() {
        let mut func = mixed();
        func.ret = 7;
        func.body[2] = Instr::new(InstrOp::Const(Value::Int(0)), Type::scalar(DType::Int64));
        assert!(matches!(check(&func), Err(TransformError::Malformed { value: 7, .. })));
    }

    #[test]
    fn test_rejects_capture_count_mismatch() {
        let mut func = mixed();
        func.captures.clear();
        assert!(matches!(check(&func), Err(TransformError::Malformed { .. })));
    }
}
