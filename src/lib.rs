//! Kiln workspace facade.
//! Kiln 工作区门面。
//!
//! Re-exports the workspace crates under one roof; the integration tests in
//! `tests/` exercise them together.

pub use kiln_air as air;
pub use kiln_diagnostic as diagnostic;
pub use kiln_term as term;
