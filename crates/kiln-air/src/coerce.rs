//! Making implicit coercions explicit.

use crate::ir::{Function, Instr, InstrOp, ValueId};
use crate::pass::{Pass, TransformError};
use crate::Environment;
use kiln_term::DType;
use std::collections::HashMap;
use tracing::debug;

/// Environment key recording how many conversions were inserted.
pub const COERCIONS: &str = "coercions";

/// Inserts a `Convert` before every operand whose dtype differs from the
/// dtype its instruction computes in.
///
/// Only widening conversions (`bool -> int64 -> float64`) are inserted; a
/// narrowing one fails the pass. A value converted to the same dtype more
/// than once is converted once and reused.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitCoercions;

impl Pass for ExplicitCoercions {
    fn name(&self) -> &str {
        "explicit_coercions"
    }

    fn run(
        &self,
        func: Function,
        env: Environment,
    ) -> Result<(Function, Environment), TransformError> {
        let mut rewrite = Rewrite::default();

        for (old, instr) in func.body.into_iter().enumerate() {
            let op = match instr.op {
                InstrOp::Binary {
                    op,
                    operand,
                    lhs,
                    rhs,
                } => {
                    let lhs = rewrite.coerce(old, lhs, operand)?;
                    let rhs = rewrite.coerce(old, rhs, operand)?;
                    InstrOp::Binary {
                        op,
                        operand,
                        lhs,
                        rhs,
                    }
                }
                InstrOp::Convert(value) => InstrOp::Convert(rewrite.get(old, value)?),
                op => op,
            };
            let new = rewrite.push(Instr::new(op, instr.ty));
            rewrite.renamed.insert(old, new);
        }

        let ret = rewrite.get(func.ret, func.ret)?;
        let inserted = rewrite.converted.len();
        debug!(inserted, "made coercions explicit");

        let func = Function {
            body: rewrite.body,
            ret,
            ..func
        };
        Ok((func, env.with(COERCIONS, inserted)))
    }
}

#[derive(Default)]
struct Rewrite {
    body: Vec<Instr>,
    renamed: HashMap<ValueId, ValueId>,
    converted: HashMap<(ValueId, DType), ValueId>,
}

impl Rewrite {
    fn push(&mut self, instr: Instr) -> ValueId {
        self.body.push(instr);
        self.body.len() - 1
    }

    /// The new id of `value`, read by instruction `user`.
    fn get(&self, user: ValueId, value: ValueId) -> Result<ValueId, TransformError> {
        self.renamed
            .get(&value)
            .copied()
            .ok_or_else(|| TransformError::Malformed {
                value: user,
                reason: format!("use of %{} before its definition", value),
            })
    }

    /// The new id of `value` as seen by an instruction computing in `target`.
    fn coerce(
        &mut self,
        user: ValueId,
        value: ValueId,
        target: DType,
    ) -> Result<ValueId, TransformError> {
        let value = self.get(user, value)?;
        let ty = self.body[value].ty.clone();
        if ty.dtype == target {
            return Ok(value);
        }
        if !ty.dtype.widens_to(target) {
            return Err(TransformError::UnsafeCoercion {
                value: user,
                from: ty.dtype,
                to: target,
            });
        }
        if let Some(&converted) = self.converted.get(&(value, target)) {
            return Ok(converted);
        }
        let converted = self.push(Instr::new(InstrOp::Convert(value), ty.with_dtype(target)));
        self.converted.insert((value, target), converted);
        Ok(converted)
    }
}
