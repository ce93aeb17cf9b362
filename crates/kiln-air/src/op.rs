//! Elementwise operators shared by graphs and the IR.

use kiln_term::{builtins, BinaryFn, DType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A binary elementwise operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Max,
    Min,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl OpKind {
    pub const ALL: [OpKind; 15] = [
        OpKind::Add,
        OpKind::Sub,
        OpKind::Mul,
        OpKind::Div,
        OpKind::Pow,
        OpKind::Max,
        OpKind::Min,
        OpKind::Eq,
        OpKind::Ne,
        OpKind::Lt,
        OpKind::Le,
        OpKind::Gt,
        OpKind::Ge,
        OpKind::And,
        OpKind::Or,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Div => "div",
            OpKind::Pow => "pow",
            OpKind::Max => "max",
            OpKind::Min => "min",
            OpKind::Eq => "eq",
            OpKind::Ne => "ne",
            OpKind::Lt => "lt",
            OpKind::Le => "le",
            OpKind::Gt => "gt",
            OpKind::Ge => "ge",
            OpKind::And => "and",
            OpKind::Or => "or",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            OpKind::Eq | OpKind::Ne | OpKind::Lt | OpKind::Le | OpKind::Gt | OpKind::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, OpKind::And | OpKind::Or)
    }

    /// The dtype both operands are brought to before the operator runs.
    ///
    /// Arithmetic never computes in bool, `div` always computes in float64
    /// and logical operators only accept bool.
    pub fn operand_dtype(&self, lhs: DType, rhs: DType) -> DType {
        match self {
            OpKind::Div => DType::Float64,
            OpKind::And | OpKind::Or => DType::Bool,
            op if op.is_comparison() => lhs.promote(rhs),
            _ => lhs.promote(rhs).promote(DType::Int64),
        }
    }

    /// The dtype of the result, given the operand dtype.
    pub fn result_dtype(&self, operand: DType) -> DType {
        if self.is_comparison() || self.is_logical() {
            DType::Bool
        } else {
            operand
        }
    }

    /// The builtin function that implements this operator.
    pub fn builtin(&self) -> BinaryFn {
        match self {
            OpKind::Add => builtins::add(),
            OpKind::Sub => builtins::sub(),
            OpKind::Mul => builtins::mul(),
            OpKind::Div => builtins::div(),
            OpKind::Pow => builtins::pow(),
            OpKind::Max => builtins::max(),
            OpKind::Min => builtins::min(),
            OpKind::Eq => builtins::eq(),
            OpKind::Ne => builtins::ne(),
            OpKind::Lt => builtins::lt(),
            OpKind::Le => builtins::le(),
            OpKind::Gt => builtins::gt(),
            OpKind::Ge => builtins::ge(),
            OpKind::And => builtins::and(),
            OpKind::Or => builtins::or(),
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpKind::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operator `{}`", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_dtypes() {
        assert_eq!(OpKind::Add.operand_dtype(DType::Int64, DType::Float64), DType::Float64);
        assert_eq!(OpKind::Add.operand_dtype(DType::Bool, DType::Bool), DType::Int64);
        assert_eq!(OpKind::Div.operand_dtype(DType::Int64, DType::Int64), DType::Float64);
        assert_eq!(OpKind::Lt.operand_dtype(DType::Bool, DType::Bool), DType::Bool);
        assert_eq!(OpKind::And.operand_dtype(DType::Int64, DType::Bool), DType::Bool);
    }

    #[test]
    fn test_result_dtypes() {
        assert_eq!(OpKind::Mul.result_dtype(DType::Int64), DType::Int64);
        assert_eq!(OpKind::Ge.result_dtype(DType::Float64), DType::Bool);
        assert_eq!(OpKind::Or.result_dtype(DType::Bool), DType::Bool);
    }

    #[test]
    fn test_names_roundtrip() {
        for op in OpKind::ALL {
            assert_eq!(op.as_str().parse::<OpKind>(), Ok(op));
            assert_eq!(op.builtin().name(), op.as_str());
        }
        assert!("modulo".parse::<OpKind>().is_err());
    }
}
