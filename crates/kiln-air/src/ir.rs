//! Array IR.
//!
//! A lowered [`Function`] is a flat SSA body: instruction `i` defines value
//! `%i`, and operands always refer to earlier instructions. Every
//! instruction carries its result [`Type`]. A `Binary` instruction names the
//! dtype it computes in; an operand whose dtype differs from it is an
//! implicit coercion, which the coercion pass turns into an explicit
//! `Convert`.

use crate::OpKind;
use kiln_term::{DType, Type, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an instruction in a function body.
pub type ValueId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrOp {
    /// The `n`-th function parameter.
    Param(usize),
    Const(Value),
    Binary {
        op: OpKind,
        operand: DType,
        lhs: ValueId,
        rhs: ValueId,
    },
    /// Convert a value to this instruction's dtype.
    Convert(ValueId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instr {
    pub op: InstrOp,
    pub ty: Type,
}

impl Instr {
    pub fn new(op: InstrOp, ty: Type) -> Self {
        Self { op, ty }
    }

    /// Values this instruction reads.
    pub fn operands(&self) -> Vec<ValueId> {
        match &self.op {
            InstrOp::Param(_) | InstrOp::Const(_) => Vec::new(),
            InstrOp::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstrOp::Convert(value) => vec![*value],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// A lowered function and the values captured for its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Instr>,
    pub ret: ValueId,
    /// One value per parameter, in parameter order.
    pub captures: Vec<Value>,
}

/// An operand whose dtype differs from the dtype its instruction computes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coercion {
    pub instr: ValueId,
    pub operand: ValueId,
    pub from: DType,
    pub to: DType,
}

impl Function {
    pub fn instr(&self, id: ValueId) -> Option<&Instr> {
        self.body.get(id)
    }

    pub fn ty(&self, id: ValueId) -> Option<&Type> {
        self.body.get(id).map(|instr| &instr.ty)
    }

    /// The result type, if `ret` is defined.
    pub fn ret_ty(&self) -> Option<&Type> {
        self.ty(self.ret)
    }

    /// Every implicit coercion in the body, in body order.
    pub fn implicit_coercions(&self) -> Vec<Coercion> {
        let mut found = Vec::new();
        for (id, instr) in self.body.iter().enumerate() {
            let InstrOp::Binary {
                operand, lhs, rhs, ..
            } = &instr.op
            else {
                continue;
            };
            for value in [*lhs, *rhs] {
                match self.ty(value) {
                    Some(ty) if ty.dtype != *operand => found.push(Coercion {
                        instr: id,
                        operand: value,
                        from: ty.dtype,
                        to: *operand,
                    }),
                    _ => {}
                }
            }
        }
        found
    }

    pub fn has_implicit_coercions(&self) -> bool {
        !self.implicit_coercions().is_empty()
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            InstrOp::Param(n) => write!(f, "param {}", n)?,
            InstrOp::Const(value) => write!(f, "const {}", value)?,
            InstrOp::Binary {
                op,
                operand,
                lhs,
                rhs,
            } => write!(f, "{}.{} %{}, %{}", op, operand, lhs, rhs)?,
            InstrOp::Convert(value) => write!(f, "convert %{}", value)?,
        }
        write!(f, " : {}", self.ty)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        write!(f, "fn {}({})", self.name, params.join(", "))?;
        if let Some(ty) = self.ret_ty() {
            write!(f, " -> {}", ty)?;
        }
        writeln!(f, " {{")?;
        for (id, instr) in self.body.iter().enumerate() {
            writeln!(f, "  %{} = {}", id, instr)?;
        }
        writeln!(f, "  return %{}", self.ret)?;
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_add() -> Function {
        Function {
            name: "main".to_string(),
            params: vec![
                Param {
                    name: "a".to_string(),
                    ty: Type::scalar(DType::Int64),
                },
                Param {
                    name: "b".to_string(),
                    ty: Type::scalar(DType::Float64),
                },
            ],
            body: vec![
                Instr::new(InstrOp::Param(0), Type::scalar(DType::Int64)),
                Instr::new(InstrOp::Param(1), Type::scalar(DType::Float64)),
                Instr::new(
                    InstrOp::Binary {
                        op: OpKind::Add,
                        operand: DType::Float64,
                        lhs: 0,
                        rhs: 1,
                    },
                    Type::scalar(DType::Float64),
                ),
            ],
            ret: 2,
            captures: vec![Value::Int(1), Value::Float(0.5)],
        }
    }

    #[test]
    fn test_finds_implicit_coercions() {
        let func = mixed_add();
        assert_eq!(
            func.implicit_coercions(),
            vec![Coercion {
                instr: 2,
                operand: 0,
                from: DType::Int64,
                to: DType::Float64,
            }]
        );
    }

    #[test]
    fn test_display() {
        let expected = "\
fn main(a: int64, b: float64) -> float64 {
  %0 = param 0 : int64
  %1 = param 1 : float64
  %2 = add.float64 %0, %1 : float64
  return %2
}";
        assert_eq!(mixed_add().to_string(), expected);
    }
}
