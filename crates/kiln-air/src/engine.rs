//! The engine: a configured pipeline plus backends.

use crate::backend::{Backend, BackendError, BackendRegistry, TermBackend};
use crate::ir::Function;
use crate::pass::PassList;
use crate::prepare::{PrepareError, Pipeline};
use crate::{EngineConfig, Environment, Expr, Strategy, Verify};
use kiln_diagnostic::{Diagnostic, ToDiagnostic};
use kiln_term::{ApplyCache, CacheStats, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Prepare(#[from] PrepareError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ToDiagnostic for EngineError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            EngineError::Prepare(err) => err.to_diagnostic(),
            EngineError::Backend(err) => err.to_diagnostic(),
        }
    }
}

/// Prepares and runs expressions.
///
/// The engine owns its apply cache, sized from the configuration, and serves
/// the `default` strategy with a [`TermBackend`] over that cache.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    pipeline: Pipeline,
    backends: BackendRegistry,
    cache: Arc<ApplyCache>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = Arc::new(ApplyCache::new(config.cache_config()));

        let mut passes = PassList::standard();
        if config.verify {
            passes.push(Verify);
        }

        let mut backends = BackendRegistry::new();
        backends.register(Strategy::DEFAULT, TermBackend::with_cache(cache.clone()));

        info!(
            strategy = %config.default_strategy,
            passes = ?passes.names(),
            "engine ready"
        );

        Self {
            config,
            pipeline: Pipeline::new(passes),
            backends,
            cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    /// Serve `strategy` with `backend`.
    pub fn register(&mut self, strategy: impl Into<Strategy>, backend: impl Backend + 'static) {
        self.backends.register(strategy, backend);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn strategy(&self, strategy: Option<&str>) -> Strategy {
        strategy
            .map(Strategy::from)
            .unwrap_or_else(|| self.config.default_strategy.clone())
    }

    /// Prepare `expr` for `strategy`, or the configured default.
    pub fn prepare(
        &self,
        expr: &Expr,
        strategy: Option<&str>,
    ) -> Result<(Function, Environment), PrepareError> {
        self.pipeline.prepare(expr, self.strategy(strategy))
    }

    /// Prepare `expr` and execute it on the backend for its strategy.
    pub fn run(&self, expr: &Expr, strategy: Option<&str>) -> Result<Value, EngineError> {
        let (func, env) = self.prepare(expr, strategy)?;
        Ok(self.backends.dispatch(&func, &env)?)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
