//! Error codes for Kiln diagnostics.

/// Error codes for categorizing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Term evaluation errors (E0100 - E0199)
    ArgumentOutOfRange,
    ApplicationFailed,

    // Lowering errors (E0200 - E0299)
    UnboundInput,
    DanglingNode,
    ForwardReference,
    ShapeMismatch,
    IncompatibleContext,

    // Transformation errors (E0300 - E0399)
    UnsafeCoercion,
    MalformedFunction,
    ImplicitCoercion,

    // Backend errors (E0400 - E0499)
    UnknownStrategy,
    BackendFailure,

    // Configuration errors (E0500 - E0599)
    InvalidConfig,

    // Internal errors (E0900 - E0999)
    CacheCorrupted,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            // Term
            ErrorCode::ArgumentOutOfRange => "E0100",
            ErrorCode::ApplicationFailed => "E0101",

            // Lowering
            ErrorCode::UnboundInput => "E0200",
            ErrorCode::DanglingNode => "E0201",
            ErrorCode::ForwardReference => "E0202",
            ErrorCode::ShapeMismatch => "E0203",
            ErrorCode::IncompatibleContext => "E0204",

            // Transformation
            ErrorCode::UnsafeCoercion => "E0300",
            ErrorCode::MalformedFunction => "E0301",
            ErrorCode::ImplicitCoercion => "E0302",

            // Backend
            ErrorCode::UnknownStrategy => "E0400",
            ErrorCode::BackendFailure => "E0401",

            // Config
            ErrorCode::InvalidConfig => "E0500",

            // Internal
            ErrorCode::CacheCorrupted => "E0900",
        }
    }

    /// Get a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::ArgumentOutOfRange => "argument index exceeds the argument container",
            ErrorCode::ApplicationFailed => "function application failed",

            ErrorCode::UnboundInput => "graph input has no binding in its context",
            ErrorCode::DanglingNode => "graph refers to a node that does not exist",
            ErrorCode::ForwardReference => "graph node refers to itself or a later node",
            ErrorCode::ShapeMismatch => "operand shapes cannot be broadcast together",
            ErrorCode::IncompatibleContext => {
                "expression was built for a different execution strategy"
            }

            ErrorCode::UnsafeCoercion => "implicit coercion would lose information",
            ErrorCode::MalformedFunction => "lowered function is not well formed",
            ErrorCode::ImplicitCoercion => "lowered function still contains implicit coercions",

            ErrorCode::UnknownStrategy => "no backend is registered for the strategy",
            ErrorCode::BackendFailure => "backend failed to execute the function",

            ErrorCode::InvalidConfig => "invalid engine configuration",

            ErrorCode::CacheCorrupted => "specialization cache invariant violated",
        }
    }

    /// Get a suggested fix for the error, if available.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ErrorCode::ArgumentOutOfRange => {
                Some("pass at least as many arguments as the highest `Arg` index plus one")
            }
            ErrorCode::UnboundInput => Some("bind every graph input in the expression context"),
            ErrorCode::IncompatibleContext => {
                Some("switch the current execution context to the strategy the inputs live on")
            }
            ErrorCode::UnsafeCoercion => Some("insert an explicit conversion in the source graph"),
            ErrorCode::UnknownStrategy => Some("register a backend for the strategy or use `default`"),
            _ => None,
        }
    }

    /// The broad class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorCode::ArgumentOutOfRange | ErrorCode::ApplicationFailed => ErrorClass::MalformedTerm,
            ErrorCode::CacheCorrupted => ErrorClass::Internal,
            ErrorCode::InvalidConfig => ErrorClass::Config,
            _ => ErrorClass::Unsupported,
        }
    }

    /// Whether a caller may retry the expression under a different strategy.
    pub fn allows_fallback(&self) -> bool {
        self.class() == ErrorClass::Unsupported
    }
}

/// Coarse classification used to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The term or its arguments are malformed; retrying elsewhere will not help.
    MalformedTerm,
    /// The pipeline cannot run this expression under the requested strategy.
    Unsupported,
    /// Bad configuration input.
    Config,
    /// An internal invariant was violated.
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_ranges() {
        assert_eq!(ErrorCode::ArgumentOutOfRange.as_str(), "E0100");
        assert_eq!(ErrorCode::UnboundInput.as_str(), "E0200");
        assert_eq!(ErrorCode::UnsafeCoercion.as_str(), "E0300");
        assert_eq!(ErrorCode::CacheCorrupted.as_str(), "E0900");
    }

    #[test]
    fn test_fallback_classification() {
        assert_eq!(ErrorCode::ApplicationFailed.class(), ErrorClass::MalformedTerm);
        assert_eq!(ErrorCode::ShapeMismatch.class(), ErrorClass::Unsupported);
        assert!(!ErrorCode::ArgumentOutOfRange.allows_fallback());
        assert!(!ErrorCode::ApplicationFailed.allows_fallback());
        assert!(ErrorCode::IncompatibleContext.allows_fallback());
        assert!(ErrorCode::UnknownStrategy.allows_fallback());
    }
}
