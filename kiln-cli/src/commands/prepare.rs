//! The `kiln prepare` command.

use crate::output;
use kiln_air::{Engine, EngineConfig};
use std::path::Path;

pub fn run(file: &Path, strategy: Option<&str>, config: EngineConfig) -> Result<(), String> {
    let expr = super::load_expr(file)?;
    let engine = Engine::new(config);
    let (func, env) = engine
        .prepare(&expr, strategy)
        .map_err(|e| output::report(&e))?;

    println!("{}", func);
    let env = serde_json::to_string_pretty(&env).map_err(|e| e.to_string())?;
    println!("{}", env);
    Ok(())
}
