//! Term tree nodes.

use crate::BinaryFn;
use std::collections::HashSet;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::mem;
use std::sync::{Arc, LazyLock};

/// A position in the argument container, encoded as a unary chain.
///
/// Comparison, hashing, cloning and dropping all run in a loop over the
/// chain, so large positions never recurse.
pub enum Index {
    Zero,
    Succ(Box<Index>),
}

impl Index {
    /// The next index.
    pub fn succ(self) -> Index {
        Index::Succ(Box::new(self))
    }

    /// The predecessor, if any.
    pub fn pred(&self) -> Option<&Index> {
        match self {
            Index::Zero => None,
            Index::Succ(pred) => Some(pred.as_ref()),
        }
    }

    /// Number of `Succ` wrappers.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self;
        while let Index::Succ(pred) = current {
            depth += 1;
            current = pred.as_ref();
        }
        depth
    }
}

impl Clone for Index {
    fn clone(&self) -> Self {
        Index::from(self.depth())
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.depth() == other.depth()
    }
}

impl Eq for Index {}

impl Hash for Index {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.depth());
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        let mut current = mem::replace(self, Index::Zero);
        while let Index::Succ(pred) = &mut current {
            let next = mem::replace(pred.as_mut(), Index::Zero);
            current = next;
        }
    }
}

impl From<usize> for Index {
    fn from(n: usize) -> Self {
        (0..n).fold(Index::Zero, |index, _| index.succ())
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self.depth();
        for _ in 0..depth {
            f.write_str("Succ[")?;
        }
        f.write_str("0")?;
        for _ in 0..depth {
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Shared handle to an immutable term.
pub type TermRef = Arc<Term>;

/// A node in a term tree.
///
/// Trees may be arbitrarily deep. Every traversal below, including `Drop`,
/// keeps its pending nodes on the heap instead of the call stack.
#[derive(Clone)]
pub enum Term {
    /// Binary function applied to two subterms.
    Apply(Apply),
    /// Reference to a call-time argument.
    Arg(Index),
}

/// Function application node.
///
/// Carries a structural fingerprint computed once at construction, so
/// hashing a term is constant time even when subterms are shared.
#[derive(Clone)]
pub struct Apply {
    func: BinaryFn,
    left: TermRef,
    right: TermRef,
    fingerprint: u64,
}

impl Apply {
    /// Build an application node directly, bypassing the specialization
    /// cache. Prefer [`crate::make_apply`].
    pub fn new(func: BinaryFn, left: TermRef, right: TermRef) -> Self {
        let mut hasher = DefaultHasher::new();
        1u8.hash(&mut hasher);
        func.hash(&mut hasher);
        hasher.write_u64(left.fingerprint());
        hasher.write_u64(right.fingerprint());
        Self {
            fingerprint: hasher.finish(),
            func,
            left,
            right,
        }
    }

    pub fn func(&self) -> &BinaryFn {
        &self.func
    }

    pub fn left(&self) -> &TermRef {
        &self.left
    }

    pub fn right(&self) -> &TermRef {
        &self.right
    }
}

impl Term {
    /// An `Arg` leaf for the `n`-th argument.
    pub fn arg(n: usize) -> TermRef {
        Arc::new(Term::Arg(Index::from(n)))
    }

    /// Structural hash, consistent with `Eq`.
    pub fn fingerprint(&self) -> u64 {
        match self {
            Term::Apply(apply) => apply.fingerprint,
            Term::Arg(index) => {
                let mut hasher = DefaultHasher::new();
                0u8.hash(&mut hasher);
                index.hash(&mut hasher);
                hasher.finish()
            }
        }
    }

    /// Minimum number of arguments this term needs to evaluate.
    pub fn arity(&self) -> usize {
        let mut arity = 0;
        let mut seen = HashSet::new();
        let mut pending = vec![self];
        while let Some(term) = pending.pop() {
            match term {
                Term::Apply(apply) => {
                    if seen.insert(term as *const Term) {
                        pending.push(apply.right.as_ref());
                        pending.push(apply.left.as_ref());
                    }
                }
                Term::Arg(index) => arity = arity.max(index.depth() + 1),
            }
        }
        arity
    }
}

/// Placeholder child swapped in while a tree is torn down.
static LEAF: LazyLock<TermRef> = LazyLock::new(|| Arc::new(Term::Arg(Index::Zero)));

impl Drop for Term {
    fn drop(&mut self) {
        let Term::Apply(apply) = self else {
            return;
        };
        let mut pending = vec![
            mem::replace(&mut apply.left, LEAF.clone()),
            mem::replace(&mut apply.right, LEAF.clone()),
        ];
        // Only nodes this tree owns outright are unlinked; shared ones stay
        // alive with their children intact.
        while let Some(child) = pending.pop() {
            if let Some(mut term) = Arc::into_inner(child) {
                if let Term::Apply(apply) = &mut term {
                    pending.push(mem::replace(&mut apply.left, LEAF.clone()));
                    pending.push(mem::replace(&mut apply.right, LEAF.clone()));
                }
            }
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if std::ptr::eq(a, b) {
                continue;
            }
            match (a, b) {
                (Term::Arg(x), Term::Arg(y)) if x == y => {}
                (Term::Apply(x), Term::Apply(y))
                    if x.fingerprint == y.fingerprint && x.func == y.func =>
                {
                    pending.push((x.right.as_ref(), y.right.as_ref()));
                    pending.push((x.left.as_ref(), y.left.as_ref()));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Piece<'t> {
            Term(&'t Term),
            Text(&'static str),
        }

        let mut pending = vec![Piece::Term(self)];
        while let Some(piece) = pending.pop() {
            match piece {
                Piece::Text(text) => f.write_str(text)?,
                Piece::Term(Term::Arg(index)) => write!(f, "Arg[{}]", index)?,
                Piece::Term(Term::Apply(apply)) => {
                    write!(f, "Apply[{}, ", apply.func)?;
                    pending.push(Piece::Text("]"));
                    pending.push(Piece::Term(apply.right.as_ref()));
                    pending.push(Piece::Text(", "));
                    pending.push(Piece::Term(apply.left.as_ref()));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Endless stream of argument leaves: `Arg[0]`, `Arg[Succ[0]]`, ...
#[derive(Debug, Clone)]
pub struct ArgMarker {
    next: Index,
}

impl ArgMarker {
    pub fn new() -> Self {
        Self { next: Index::Zero }
    }
}

impl Default for ArgMarker {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for ArgMarker {
    type Item = TermRef;

    fn next(&mut self) -> Option<TermRef> {
        let index = self.next.clone();
        self.next = index.clone().succ();
        Some(Arc::new(Term::Arg(index)))
    }
}
