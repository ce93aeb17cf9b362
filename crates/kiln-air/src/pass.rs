//! Transformation passes over lowered functions.

use crate::ir::{Function, ValueId};
use crate::{Environment, ExplicitCoercions};
use kiln_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, ToDiagnostic};
use kiln_term::DType;
use std::fmt;
use thiserror::Error;

/// Errors raised by a pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("%{value}: converting {from} to {to} would lose information")]
    UnsafeCoercion { value: ValueId, from: DType, to: DType },

    #[error("%{value}: {reason}")]
    Malformed { value: ValueId, reason: String },

    #[error("%{instr}: operand %{operand} is {found}, expected {expected}")]
    ImplicitCoercion {
        instr: ValueId,
        operand: ValueId,
        found: DType,
        expected: DType,
    },
}

impl TransformError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TransformError::UnsafeCoercion { .. } => ErrorCode::UnsafeCoercion,
            TransformError::Malformed { .. } => ErrorCode::MalformedFunction,
            TransformError::ImplicitCoercion { .. } => ErrorCode::ImplicitCoercion,
        }
    }
}

impl ToDiagnostic for TransformError {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(DiagnosticKind::Transform, self.to_string()).with_code(self.code())
    }
}

/// A transformation from one `(function, environment)` pair to the next.
pub trait Pass: Send + Sync {
    /// Stable name used in logs and errors.
    fn name(&self) -> &str;

    fn run(
        &self,
        func: Function,
        env: Environment,
    ) -> Result<(Function, Environment), TransformError>;
}

/// An ordered list of passes, applied first to last.
#[derive(Default)]
pub struct PassList {
    passes: Vec<Box<dyn Pass>>,
}

impl PassList {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard list: make implicit coercions explicit.
    pub fn standard() -> Self {
        Self::new().with(ExplicitCoercions)
    }

    /// Append a pass.
    pub fn with(mut self, pass: impl Pass + 'static) -> Self {
        self.push(pass);
        self
    }

    pub fn push(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn names(&self) -> Vec<&str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Pass> {
        self.passes.iter().map(|pass| pass.as_ref())
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl fmt::Debug for PassList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Verify;

    #[test]
    fn test_standard_list() {
        assert_eq!(PassList::standard().names(), ["explicit_coercions"]);
        assert!(PassList::new().is_empty());
    }

    #[test]
    fn test_append_keeps_order() {
        let passes = PassList::standard().with(Verify);
        assert_eq!(passes.names(), ["explicit_coercions", "verify"]);
        assert_eq!(format!("{:?}", passes), r#"["explicit_coercions", "verify"]"#);
    }

    #[test]
    fn test_error_codes() {
        let err = TransformError::UnsafeCoercion {
            value: 3,
            from: DType::Int64,
            to: DType::Bool,
        };
        assert_eq!(err.to_string(), "%3: converting int64 to bool would lose information");
        assert!(err.code().allows_fallback());
    }
}
