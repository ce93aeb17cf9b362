//! CLI command implementations.

pub mod demo;
pub mod prepare;
pub mod run;

use kiln_air::Expr;
use std::fs;
use std::path::Path;

/// Read an expression file: JSON `{"graph": ..., "context": ...}`.
fn load_expr(path: &Path) -> Result<Expr, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read file '{}': {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("cannot parse expression '{}': {}", path.display(), e))
}
