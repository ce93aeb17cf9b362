//! Argument containers and positional lookup.

use crate::{Index, Value};
use kiln_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, ToDiagnostic};
use std::fmt;
use std::mem;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// An argument index ran past the end of the container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("argument index {index} out of range for {len} argument(s)")]
pub struct LookupError {
    pub index: usize,
    pub len: usize,
}

impl ToDiagnostic for LookupError {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(DiagnosticKind::Eval, self.to_string())
            .with_code(ErrorCode::ArgumentOutOfRange)
    }
}

/// Call-time arguments as a cons chain, walked one step per `Succ`.
#[derive(Clone, Default)]
pub enum Args {
    #[default]
    Nil,
    Cons(Value, Arc<Args>),
}

impl Args {
    pub fn new() -> Self {
        Args::Nil
    }

    /// Prepend `head` to `tail`.
    pub fn cons(head: Value, tail: Args) -> Self {
        Args::Cons(head, Arc::new(tail))
    }

    pub fn head(&self) -> Option<&Value> {
        match self {
            Args::Nil => None,
            Args::Cons(head, _) => Some(head),
        }
    }

    pub fn tail(&self) -> Option<&Args> {
        match self {
            Args::Nil => None,
            Args::Cons(_, tail) => Some(tail.as_ref()),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Args::Nil)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        let mut current = self;
        std::iter::from_fn(move || {
            let Args::Cons(head, tail) = current else {
                return None;
            };
            current = tail.as_ref();
            Some(head)
        })
    }
}

/// Shared empty tail swapped in while a chain is torn down.
static NIL: LazyLock<Arc<Args>> = LazyLock::new(|| Arc::new(Args::Nil));

impl Drop for Args {
    fn drop(&mut self) {
        let Args::Cons(_, tail) = self else {
            return;
        };
        let mut next = mem::replace(tail, NIL.clone());
        while let Some(mut args) = Arc::into_inner(next) {
            next = match &mut args {
                Args::Cons(_, tail) => mem::replace(tail, NIL.clone()),
                Args::Nil => break,
            };
        }
    }
}

impl PartialEq for Args {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let values: Vec<Value> = iter.into_iter().collect();
        values
            .into_iter()
            .rev()
            .fold(Args::Nil, |tail, head| Args::cons(head, tail))
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        values.into_iter().collect()
    }
}

impl<const N: usize> From<[Value; N]> for Args {
    fn from(values: [Value; N]) -> Self {
        values.into_iter().collect()
    }
}

/// Look up the argument at `index`, walking the index and the container in
/// lock-step.
pub fn lookup<'a>(args: &'a Args, index: &Index) -> Result<&'a Value, LookupError> {
    walk(args, index).ok_or_else(|| LookupError {
        index: index.depth(),
        len: args.len(),
    })
}

fn walk<'a>(mut args: &'a Args, mut index: &Index) -> Option<&'a Value> {
    loop {
        match (args, index) {
            (Args::Nil, _) => return None,
            (Args::Cons(head, _), Index::Zero) => return Some(head),
            (Args::Cons(_, tail), Index::Succ(pred)) => {
                args = tail.as_ref();
                index = pred.as_ref();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Args {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn test_construction_order() {
        let args = ints(&[10, 20, 30]);
        assert_eq!(args.len(), 3);
        assert_eq!(args.head(), Some(&Value::Int(10)));
        assert_eq!(args.tail().and_then(Args::head), Some(&Value::Int(20)));
        let collected: Vec<_> = args.iter().cloned().collect();
        assert_eq!(collected, vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
    }

    #[test]
    fn test_lookup_in_range() {
        let args = ints(&[10, 20, 30]);
        for (i, expected) in [10, 20, 30].into_iter().enumerate() {
            assert_eq!(lookup(&args, &Index::from(i)), Ok(&Value::Int(expected)));
        }
    }

    #[test]
    fn test_lookup_out_of_range() {
        let args = ints(&[10]);
        let err = lookup(&args, &Index::from(1)).unwrap_err();
        assert_eq!(err, LookupError { index: 1, len: 1 });

        let err = lookup(&Args::new(), &Index::Zero).unwrap_err();
        assert_eq!(err.len, 0);
        assert_eq!(err.to_diagnostic().code, Some(ErrorCode::ArgumentOutOfRange));
    }

    #[test]
    fn test_long_chain() {
        let n = 200_000;
        let args: Args = (0..n as i64).map(Value::Int).collect();
        assert_eq!(lookup(&args, &Index::from(n - 1)), Ok(&Value::Int(n as i64 - 1)));
        assert_eq!(args.clone(), args);
        drop(args);
    }
}
