//! Output formatting utilities.
//! 输出格式化工具。

use kiln_diagnostic::{emit, ToDiagnostic};

/// Print a section heading in bold.
/// 以粗体打印小节标题。
pub fn heading(msg: &str) {
    println!("\x1b[1m{msg}\x1b[0m");
}

/// Print a success message in green.
/// 以绿色打印成功消息。
pub fn success(msg: &str) {
    println!("\x1b[32m{msg}\x1b[0m");
}

/// Print an error message in red.
/// 以红色打印错误消息。
pub fn error(msg: &str) {
    eprintln!("\x1b[31merror:\x1b[0m {msg}");
}

/// Emit the full diagnostic for `err` and return a one-line summary for the
/// exit message.
/// 输出 `err` 的完整诊断，并返回用于退出消息的单行摘要。
pub fn report(err: &impl ToDiagnostic) -> String {
    let diagnostic = err.to_diagnostic();
    emit(&diagnostic);
    match diagnostic.code {
        Some(code) => code.description().to_string(),
        None => diagnostic.message,
    }
}
