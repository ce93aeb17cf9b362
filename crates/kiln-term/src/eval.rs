//! Term evaluation.

use crate::{lookup, Apply, Args, LookupError, Term, Value};
use kiln_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, ToDiagnostic};
use std::collections::HashMap;
use thiserror::Error;

/// Evaluation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("{term}: {message}")]
    Application { term: String, message: String },
}

impl ToDiagnostic for EvalError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            EvalError::Lookup(err) => err.to_diagnostic(),
            EvalError::Application { term, message } => {
                Diagnostic::error(DiagnosticKind::Eval, format!("application failed: {}", message))
                    .with_code(ErrorCode::ApplicationFailed)
                    .with_note(format!("in term {}", term))
            }
        }
    }
}

/// Evaluate `term` against `args`.
pub fn evaluate(term: &Term, args: &Args) -> Result<Value, EvalError> {
    Evaluator::new(args).eval(term)
}

/// Evaluates terms against one argument container.
///
/// Subterms reached more than once through shared nodes are evaluated once
/// per evaluator; terms are pure, so this never changes the result. Terms
/// stay borrowed for the evaluator's lifetime, which keeps the node
/// addresses used as memo keys valid.
///
/// Evaluation keeps its pending nodes on the heap, so tree depth is bounded
/// by memory rather than by the thread's stack.
pub struct Evaluator<'a> {
    args: &'a Args,
    shared: HashMap<*const Term, Value>,
}

enum Step<'a> {
    /// Evaluate a subterm and push its value.
    Visit(&'a Term),
    /// Both operands are on the value stack; apply the function.
    Apply(&'a Term, &'a Apply),
}

impl<'a> Evaluator<'a> {
    pub fn new(args: &'a Args) -> Self {
        Self {
            args,
            shared: HashMap::new(),
        }
    }

    /// Evaluate a term. The left operand of every application is evaluated
    /// before the right one.
    pub fn eval(&mut self, term: &'a Term) -> Result<Value, EvalError> {
        let mut steps = vec![Step::Visit(term)];
        let mut values: Vec<Value> = Vec::new();

        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(node) => match node {
                    Term::Arg(index) => values.push(lookup(self.args, index)?.clone()),
                    Term::Apply(apply) => {
                        if let Some(value) = self.shared.get(&(node as *const Term)) {
                            values.push(value.clone());
                            continue;
                        }
                        steps.push(Step::Apply(node, apply));
                        steps.push(Step::Visit(apply.right().as_ref()));
                        steps.push(Step::Visit(apply.left().as_ref()));
                    }
                },
                Step::Apply(node, apply) => {
                    let (right, left) = match (values.pop(), values.pop()) {
                        (Some(right), Some(left)) => (right, left),
                        _ => unreachable!("operands are evaluated before their application"),
                    };
                    let value = apply.func().call(&left, &right).map_err(|message| {
                        EvalError::Application {
                            term: node.to_string(),
                            message,
                        }
                    })?;
                    self.shared.insert(node as *const Term, value.clone());
                    values.push(value);
                }
            }
        }

        match values.pop() {
            Some(value) => Ok(value),
            None => unreachable!("evaluation always yields a value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builtins, Term};
    use std::sync::Arc;

    fn apply(f: crate::BinaryFn, l: crate::TermRef, r: crate::TermRef) -> crate::TermRef {
        Arc::new(Term::Apply(crate::Apply::new(f, l, r)))
    }

    #[test]
    fn test_eval_arg() {
        let args = Args::from([Value::Int(4), Value::Int(5)]);
        assert_eq!(evaluate(&Term::arg(1), &args), Ok(Value::Int(5)));
    }

    #[test]
    fn test_eval_nested() {
        let x = apply(builtins::add(), Term::arg(0), Term::arg(1));
        let term = apply(builtins::mul(), x.clone(), x);
        let args = Args::from([Value::Int(2), Value::Int(3)]);
        assert_eq!(evaluate(&term, &args), Ok(Value::Int(25)));
    }

    #[test]
    fn test_application_error_names_term() {
        let term = apply(builtins::add(), Term::arg(0), Term::arg(1));
        let args = Args::from([Value::Int(i64::MAX), Value::Int(1)]);
        match evaluate(&term, &args) {
            Err(EvalError::Application { term, message }) => {
                assert_eq!(term, "Apply[add, Arg[0], Arg[Succ[0]]]");
                assert_eq!(message, "integer overflow in add");
            }
            other => panic!("expected application error, got {:?}", other),
        }
    }

    #[test]
    fn test_inner_failure_is_not_rewrapped() {
        let inner = apply(builtins::and(), Term::arg(0), Term::arg(1));
        let outer = apply(builtins::add(), inner, Term::arg(0));
        let args = Args::from([Value::Int(1), Value::Int(0)]);
        let err = evaluate(&outer, &args).unwrap_err();
        assert!(err.to_string().starts_with("Apply[and"));
    }

    #[test]
    fn test_left_operand_fails_first() {
        let left = apply(builtins::and(), Term::arg(0), Term::arg(0));
        let right = apply(builtins::or(), Term::arg(0), Term::arg(0));
        let term = apply(builtins::add(), left, right);
        let err = evaluate(&term, &Args::from([Value::Int(1)])).unwrap_err();
        assert!(err.to_string().starts_with("Apply[and"));
    }

    #[test]
    fn test_shared_subterm_evaluated_once() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counted = {
            let calls = calls.clone();
            crate::BinaryFn::new("counted", move |l, _| {
                calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Ok(l.clone())
            })
        };
        let x = apply(counted, Term::arg(0), Term::arg(0));
        let term = apply(builtins::mul(), x.clone(), x);
        assert_eq!(evaluate(&term, &Args::from([Value::Int(3)])), Ok(Value::Int(9)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn test_deep_left_chain() {
        let depth = 100_000;
        let term = (0..depth).fold(Term::arg(0), |acc, _| apply(builtins::add(), acc, Term::arg(1)));
        let args = Args::from([Value::Int(0), Value::Int(1)]);
        assert_eq!(evaluate(&term, &args), Ok(Value::Int(depth)));
    }

    #[test]
    fn test_lookup_error_propagates() {
        let term = apply(builtins::add(), Term::arg(0), Term::arg(2));
        let args = Args::from([Value::Int(1), Value::Int(2)]);
        assert_eq!(
            evaluate(&term, &args),
            Err(EvalError::Lookup(LookupError { index: 2, len: 2 }))
        );
    }
}
