//! The pipeline runner.
//!
//! `prepare` lowers an expression under an execution context, seeds an
//! environment with the requested strategy and folds the function through the
//! pass list in order. The first failure aborts the run; nothing partially
//! transformed is returned.

use crate::context::current_context;
use crate::ir::Function;
use crate::lower::{self, LowerError};
use crate::pass::{PassList, TransformError};
use crate::{Environment, ExecutionContext, Expr, Strategy};
use kiln_diagnostic::{Diagnostic, ErrorCode, ToDiagnostic};
use thiserror::Error;
use tracing::{debug, info_span};

/// Errors from [`Pipeline::prepare`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrepareError {
    #[error("lowering failed: {0}")]
    Lowering(#[from] LowerError),

    #[error("pass `{pass}` failed: {source}")]
    Transformation {
        pass: String,
        #[source]
        source: TransformError,
    },
}

impl PrepareError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PrepareError::Lowering(err) => err.code(),
            PrepareError::Transformation { source, .. } => source.code(),
        }
    }
}

impl ToDiagnostic for PrepareError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            PrepareError::Lowering(err) => err.to_diagnostic(),
            PrepareError::Transformation { pass, source } => source
                .to_diagnostic()
                .with_note(format!("raised by pass `{}`", pass)),
        }
    }
}

/// Lowering followed by an ordered list of passes.
#[derive(Debug, Default)]
pub struct Pipeline {
    passes: PassList,
}

impl Pipeline {
    pub fn new(passes: PassList) -> Self {
        Self { passes }
    }

    /// A pipeline running [`PassList::standard`].
    pub fn standard() -> Self {
        Self::new(PassList::standard())
    }

    pub fn passes(&self) -> &PassList {
        &self.passes
    }

    /// Prepare `expr` for `strategy` under the calling thread's context.
    pub fn prepare(
        &self,
        expr: &Expr,
        strategy: impl Into<Strategy>,
    ) -> Result<(Function, Environment), PrepareError> {
        let ctx = current_context();
        self.prepare_in(&ctx, expr, strategy)
    }

    /// Prepare `expr` for `strategy` under an explicit context.
    pub fn prepare_in(
        &self,
        ctx: &ExecutionContext,
        expr: &Expr,
        strategy: impl Into<Strategy>,
    ) -> Result<(Function, Environment), PrepareError> {
        let strategy = strategy.into();
        let span = info_span!("prepare", %strategy, context = ctx.id());
        let _enter = span.enter();

        let func = lower::from_expr(&expr.graph, &expr.context, ctx)?;
        let env = Environment::for_strategy(&strategy);

        let (func, env) = self.passes.iter().try_fold((func, env), |(func, env), pass| {
            debug!(pass = pass.name(), "running pass");
            pass.run(func, env)
                .map_err(|source| PrepareError::Transformation {
                    pass: pass.name().to_string(),
                    source,
                })
        })?;

        debug!(instrs = func.body.len(), "prepared");
        Ok((func, env))
    }
}

/// Prepare `expr` for `strategy` with the standard pipeline under the calling
/// thread's context.
pub fn prepare(
    expr: &Expr,
    strategy: impl Into<Strategy>,
) -> Result<(Function, Environment), PrepareError> {
    Pipeline::standard().prepare(expr, strategy)
}
