//! Binary functions bound into `Apply` terms.

use crate::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

type ScalarFn = dyn Fn(&Value, &Value) -> Result<Value, String> + Send + Sync;

/// A named, pure binary function.
///
/// Equality and hashing use the identity of the shared function object:
/// clones compare equal, two separately built functions never do, even when
/// they carry the same name.
#[derive(Clone)]
pub struct BinaryFn {
    name: Arc<str>,
    func: Arc<ScalarFn>,
}

impl BinaryFn {
    pub fn new(
        name: impl Into<Arc<str>>,
        func: impl Fn(&Value, &Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function. Failures are plain messages; the evaluator
    /// attaches the failing term.
    pub fn call(&self, left: &Value, right: &Value) -> Result<Value, String> {
        (self.func)(left, right)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.func) as *const () as usize
    }
}

impl PartialEq for BinaryFn {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for BinaryFn {}

impl Hash for BinaryFn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.addr());
    }
}

impl fmt::Debug for BinaryFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn:{}>", self.name)
    }
}

impl fmt::Display for BinaryFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
