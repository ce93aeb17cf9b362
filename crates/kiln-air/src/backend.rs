//! Backend dispatch.
//!
//! A prepared function is handed to the backend registered for the strategy
//! named in its environment. The in-process [`TermBackend`] serves `default`
//! by specializing the function into a term tree through the apply cache and
//! evaluating it.

use crate::ir::{Function, InstrOp};
use crate::{Environment, Strategy};
use kiln_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, ToDiagnostic};
use kiln_term::{builtins, evaluate, global_cache, ApplyCache, Args, EvalError, Term, TermRef, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Backend errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("no backend registered for strategy `{strategy}`")]
    UnknownStrategy {
        strategy: String,
        known: Vec<String>,
    },

    #[error("environment does not name a strategy")]
    MissingStrategy,

    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),

    #[error("backend `{backend}` failed: {message}")]
    Failed { backend: String, message: String },
}

impl ToDiagnostic for BackendError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BackendError::UnknownStrategy { known, .. } => {
                Diagnostic::error(DiagnosticKind::Backend, self.to_string())
                    .with_code(ErrorCode::UnknownStrategy)
                    .with_note(format!("registered strategies: {}", known.join(", ")))
            }
            BackendError::MissingStrategy => {
                Diagnostic::error(DiagnosticKind::Backend, self.to_string())
                    .with_code(ErrorCode::UnknownStrategy)
            }
            BackendError::Eval(err) => err.to_diagnostic(),
            BackendError::Failed { .. } => {
                Diagnostic::error(DiagnosticKind::Backend, self.to_string())
                    .with_code(ErrorCode::BackendFailure)
            }
        }
    }
}

/// Executes prepared functions.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, func: &Function, env: &Environment) -> Result<Value, BackendError>;
}

/// Backends by strategy name.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry serving `default` with a [`TermBackend`] on the global cache.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Strategy::DEFAULT, TermBackend::new());
        registry
    }

    /// Register `backend` for `strategy`, replacing any previous one.
    pub fn register(&mut self, strategy: impl Into<Strategy>, backend: impl Backend + 'static) {
        self.register_shared(strategy, Arc::new(backend));
    }

    pub fn register_shared(&mut self, strategy: impl Into<Strategy>, backend: Arc<dyn Backend>) {
        let strategy = strategy.into();
        debug!(%strategy, backend = backend.name(), "registered backend");
        self.backends.insert(strategy.as_str().to_string(), backend);
    }

    pub fn get(&self, strategy: &str) -> Option<&Arc<dyn Backend>> {
        self.backends.get(strategy)
    }

    pub fn strategies(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    /// Run `func` on the backend named by `env`'s strategy.
    pub fn dispatch(&self, func: &Function, env: &Environment) -> Result<Value, BackendError> {
        let strategy = env.strategy().ok_or(BackendError::MissingStrategy)?;
        let backend = self
            .get(strategy)
            .ok_or_else(|| BackendError::UnknownStrategy {
                strategy: strategy.to_string(),
                known: self.strategies().into_iter().map(str::to_string).collect(),
            })?;
        debug!(strategy, backend = backend.name(), "dispatching");
        backend.execute(func, env)
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.backends.iter().map(|(k, v)| (k, v.name())))
            .finish()
    }
}

/// Evaluates functions in-process as term trees.
///
/// Parameters become `Arg(0..n)` and constants become further trailing
/// arguments, so the term depends only on the function's shape and equal
/// shapes share cached nodes.
#[derive(Debug, Clone, Default)]
pub struct TermBackend {
    cache: Option<Arc<ApplyCache>>,
}

impl TermBackend {
    /// A backend building terms through the process-wide cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend building terms through `cache`.
    pub fn with_cache(cache: Arc<ApplyCache>) -> Self {
        Self { cache: Some(cache) }
    }

    fn cache(&self) -> &ApplyCache {
        match &self.cache {
            Some(cache) => cache.as_ref(),
            None => global_cache(),
        }
    }

    /// The term tree for `func` and the constants it expects after the
    /// captured values.
    pub fn specialize(&self, func: &Function) -> Result<(TermRef, Vec<Value>), BackendError> {
        let cache = self.cache();
        let arity = func.params.len();
        let mut terms: Vec<TermRef> = Vec::with_capacity(func.body.len());
        let mut constants = Vec::new();

        let term = |terms: &[TermRef], id: usize| {
            terms.get(id).cloned().ok_or_else(|| BackendError::Failed {
                backend: self.name().to_string(),
                message: format!("use of undefined value %{}", id),
            })
        };

        for instr in &func.body {
            let node = match &instr.op {
                InstrOp::Param(n) => Term::arg(*n),
                InstrOp::Const(value) => {
                    constants.push(value.clone());
                    Term::arg(arity + constants.len() - 1)
                }
                InstrOp::Binary { op, lhs, rhs, .. } => {
                    cache.make_apply(op.builtin(), term(&terms, *lhs)?, term(&terms, *rhs)?)
                }
                InstrOp::Convert(value) => {
                    let source = term(&terms, *value)?;
                    cache.make_apply(builtins::cast_to(instr.ty.dtype), source.clone(), source)
                }
            };
            terms.push(node);
        }

        Ok((term(&terms, func.ret)?, constants))
    }
}

impl Backend for TermBackend {
    fn name(&self) -> &str {
        "term"
    }

    fn execute(&self, func: &Function, _env: &Environment) -> Result<Value, BackendError> {
        let (term, constants) = self.specialize(func)?;
        let args: Args = func.captures.iter().cloned().chain(constants).collect();
        debug!(fingerprint = term.fingerprint(), args = args.len(), "evaluating term");
        Ok(evaluate(&term, &args)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare;
    use crate::GraphBuilder;
    use kiln_term::CacheConfig;

    fn sample(a: i64, b: f64) -> crate::Expr {
        let mut g = GraphBuilder::new();
        let a = g.input("a", a);
        let b = g.input("b", b);
        let two = g.constant(2i64);
        let sum = g.add(a, b);
        let out = g.mul(sum, two);
        g.finish(out)
    }

    #[test]
    fn test_term_backend_evaluates() {
        let (func, env) = prepare(&sample(1, 0.5), "default").unwrap();
        let value = BackendRegistry::with_defaults().dispatch(&func, &env).unwrap();
        assert_eq!(value, Value::Float(3.0));
    }

    #[test]
    fn test_specialized_term_shape() {
        let (func, _) = prepare(&sample(1, 0.5), "default").unwrap();
        let backend = TermBackend::with_cache(Arc::new(ApplyCache::new(CacheConfig::new())));
        let (term, constants) = backend.specialize(&func).unwrap();
        assert_eq!(constants, vec![Value::Int(2)]);
        assert_eq!(
            term.to_string(),
            "Apply[mul, Apply[add, Apply[as_float64, Arg[0], Arg[0]], Arg[Succ[0]]], \
             Apply[as_float64, Arg[Succ[Succ[0]]], Arg[Succ[Succ[0]]]]]"
        );
    }

    #[test]
    fn test_equal_shapes_share_nodes() {
        let cache = Arc::new(ApplyCache::new(CacheConfig::new()));
        let backend = TermBackend::with_cache(cache.clone());
        let (first, _) = prepare(&sample(1, 0.5), "default").unwrap();
        let (second, _) = prepare(&sample(7, -2.0), "default").unwrap();

        let (t1, _) = backend.specialize(&first).unwrap();
        let entries = cache.len();
        let (t2, _) = backend.specialize(&second).unwrap();
        assert!(Arc::ptr_eq(&t1, &t2));
        assert_eq!(cache.len(), entries);
    }

    #[test]
    fn test_unknown_strategy() {
        let (func, _) = prepare(&sample(1, 0.5), "default").unwrap();
        let env = Environment::for_strategy(&Strategy::from("remote-engine"));
        let err = BackendRegistry::with_defaults().dispatch(&func, &env).unwrap_err();
        assert_eq!(
            err,
            BackendError::UnknownStrategy {
                strategy: "remote-engine".to_string(),
                known: vec!["default".to_string()],
            }
        );
        assert_eq!(
            BackendRegistry::with_defaults().dispatch(&func, &Environment::new()),
            Err(BackendError::MissingStrategy)
        );
    }

    #[test]
    fn test_evaluation_errors_surface() {
        let mut g = GraphBuilder::new();
        let a = g.input("a", 1i64);
        let z = g.constant(0i64);
        let out = g.op(crate::OpKind::Div, a, z);
        let (func, env) = prepare(&g.finish(out), "default").unwrap();
        let err = BackendRegistry::with_defaults().dispatch(&func, &env).unwrap_err();
        assert!(matches!(err, BackendError::Eval(EvalError::Application { .. })));
    }
}
