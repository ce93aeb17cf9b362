//! Execution contexts.
//!
//! A context selects the backend strategy expressions are lowered for. Each
//! thread owns one, created on first use; it is handed out as an `Rc`, so it
//! cannot leave the thread. Callers that prefer explicit context passing build
//! their own with [`ExecutionContext::new`] and use `Pipeline::prepare_in`.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Name of a backend strategy, e.g. `default` or `remote-engine`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Strategy(String);

impl Strategy {
    /// The strategy served by the in-process term backend.
    pub const DEFAULT: &'static str = "default";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Strategy {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Strategy {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&Strategy> for Strategy {
    fn from(strategy: &Strategy) -> Self {
        strategy.clone()
    }
}

impl PartialEq<str> for Strategy {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Strategy {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Ambient state for lowering: the active strategy.
#[derive(Debug)]
pub struct ExecutionContext {
    id: u64,
    strategy: RefCell<Strategy>,
}

impl ExecutionContext {
    pub fn new(strategy: impl Into<Strategy>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            strategy: RefCell::new(strategy.into()),
        }
    }

    /// Process-unique identifier of this context.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy.borrow().clone()
    }

    /// Switch the active strategy.
    pub fn set_strategy(&self, strategy: impl Into<Strategy>) {
        let strategy = strategy.into();
        debug!(context = self.id, %strategy, "switching strategy");
        *self.strategy.borrow_mut() = strategy;
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Strategy::default())
    }
}

thread_local! {
    static CURRENT: Rc<ExecutionContext> = Rc::new(ExecutionContext::default());
}

/// The calling thread's context, created with the default strategy on first
/// access. Later calls on the same thread return the same instance.
pub fn current_context() -> Rc<ExecutionContext> {
    CURRENT.with(Rc::clone)
}
