//! The `kiln run` command.

use crate::output;
use kiln_air::{Engine, EngineConfig};
use std::path::Path;
use tracing::debug;

pub fn run(file: &Path, strategy: Option<&str>, config: EngineConfig) -> Result<(), String> {
    let expr = super::load_expr(file)?;
    let engine = Engine::new(config);
    let value = engine.run(&expr, strategy).map_err(|e| output::report(&e))?;

    println!("{}", value);
    debug!(stats = ?engine.cache_stats(), "apply cache");
    Ok(())
}
