//! Diagnostic types and builders.

use crate::ErrorCode;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

/// Kind of diagnostic for categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Eval,
    Lowering,
    Transform,
    Backend,
    Config,
    Internal,
}

/// A diagnostic message with optional notes and help.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub code: Option<ErrorCode>,
    pub message: String,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            code: None,
            message: message.into(),
            notes: vec![],
            help: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            code: None,
            message: message.into(),
            notes: vec![],
            help: None,
        }
    }

    /// Attach an error code. The code's suggestion becomes the help text
    /// unless one was already set.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        if self.help.is_none() {
            self.help = code.suggestion().map(str::to_string);
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render as plain text, one line per message, note and help.
    pub fn render(&self) -> String {
        let mut out = match &self.code {
            Some(code) => format!("{}[{}]: {}", self.severity.as_str(), code, self.message),
            None => format!("{}: {}", self.severity.as_str(), self.message),
        };
        for note in &self.notes {
            out.push_str("\n  = note: ");
            out.push_str(note);
        }
        if let Some(help) = &self.help {
            out.push_str("\n  = help: ");
            out.push_str(help);
        }
        out
    }
}

/// Conversion of a typed error into a reportable diagnostic.
pub trait ToDiagnostic {
    fn to_diagnostic(&self) -> Diagnostic;
}
