//! Array IR and the preparation pipeline for Kiln.
//! Kiln 的数组中间表示与准备流水线。
//!
//! An [`Expr`] (a graph plus the context it was built under) is lowered to a
//! [`Function`] under an [`ExecutionContext`], threaded through a [`PassList`]
//! together with an [`Environment`] naming the backend strategy, and finally
//! dispatched to the [`Backend`] registered for that strategy.
//!
//! ```text
//! Expr ──lower──> Function ──passes──> (Function, Environment) ──dispatch──> Value
//! ```

mod backend;
mod coerce;
mod config;
mod context;
mod engine;
mod env;
mod graph;
mod op;
mod prepare;
mod verify;
pub mod ir;
pub mod lower;
pub mod pass;

pub use backend::{Backend, BackendError, BackendRegistry, TermBackend};
pub use coerce::{ExplicitCoercions, COERCIONS};
pub use config::{ConfigError, EngineConfig};
pub use context::{current_context, ExecutionContext, Strategy};
pub use engine::{Engine, EngineError};
pub use env::{EnvValue, Environment, STRATEGY};
pub use graph::{Expr, Graph, GraphBuilder, GraphContext, Node, NodeId};
pub use ir::Function;
pub use lower::LowerError;
pub use op::OpKind;
pub use pass::{Pass, PassList, TransformError};
pub use prepare::{prepare, Pipeline, PrepareError};
pub use verify::Verify;
