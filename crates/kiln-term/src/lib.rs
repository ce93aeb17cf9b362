//! Term trees and their evaluation for Kiln.
//!
//! A deferred computation is a tree of [`Term`]s: `Apply` nodes binding a
//! binary function to two subterms, and `Arg` leaves that name a call-time
//! argument by a unary index. Application nodes are built through the
//! [`ApplyCache`], which hands back the same node for the same
//! `(function, left, right)` shape.

mod args;
mod cache;
mod eval;
mod func;
mod term;
pub mod builtins;
pub mod value;

pub use args::{lookup, Args, LookupError};
pub use cache::{global_cache, make_apply, ApplyCache, CacheConfig, CacheCorruption, CacheStats};
pub use eval::{evaluate, EvalError, Evaluator};
pub use func::BinaryFn;
pub use term::{Apply, ArgMarker, Index, Term, TermRef};
pub use value::{DType, NdArray, Type, Value};
