//! Diagnostic and error reporting for Kiln.
//! Kiln 的诊断和错误报告。
//!
//! Every typed error in the workspace maps onto an [`ErrorCode`] and can be
//! turned into a [`Diagnostic`] for display.
//! 工作区中的每个错误类型都对应一个 [`ErrorCode`]，并可转换为 [`Diagnostic`] 进行显示。

mod codes;
mod diagnostic;

pub use codes::{ErrorClass, ErrorCode};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity, ToDiagnostic};

/// Render a diagnostic to stderr.
/// 将诊断信息渲染到标准错误输出。
pub fn emit(diagnostic: &Diagnostic) {
    eprintln!("{}", diagnostic.render());
}
