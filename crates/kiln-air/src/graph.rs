//! Surface expression graphs.
//!
//! A graph is the form expressions take before lowering: an ordered list of
//! nodes where operators refer to earlier nodes by position, plus the id of
//! the output node. The [`GraphContext`] carries the values bound to the
//! graph's inputs and, when those inputs were materialized for a particular
//! backend, the strategy they are pinned to.

use crate::{OpKind, Strategy};
use kiln_term::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position of a node in its graph.
pub type NodeId = usize;

/// A graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    /// A call-time input, bound through the context by slot.
    Input { slot: usize, name: String },
    /// A literal.
    Const { value: Value },
    /// An elementwise operator over two earlier nodes.
    Op { op: OpKind, lhs: NodeId, rhs: NodeId },
}

/// An expression graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub output: NodeId,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, output: NodeId) -> Self {
        Self { nodes, output }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The context a graph was built under.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphContext {
    /// Values bound to input slots.
    #[serde(default)]
    pub bindings: BTreeMap<usize, Value>,
    /// Strategy the bound inputs live on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
}

impl GraphContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, slot: usize, value: impl Into<Value>) -> Self {
        self.bindings.insert(slot, value.into());
        self
    }

    pub fn pinned(mut self, strategy: impl Into<Strategy>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn binding(&self, slot: usize) -> Option<&Value> {
        self.bindings.get(&slot)
    }
}

/// An expression: a graph together with the context it was built under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub graph: Graph,
    #[serde(default)]
    pub context: GraphContext,
}

impl Expr {
    pub fn new(graph: Graph, context: GraphContext) -> Self {
        Self { graph, context }
    }
}

/// Incremental builder for an [`Expr`].
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    context: GraphContext,
    next_slot: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input bound to `value` in the next free slot.
    pub fn input(&mut self, name: impl Into<String>, value: impl Into<Value>) -> NodeId {
        let slot = self.next_slot;
        self.context.bindings.insert(slot, value.into());
        self.declare(name, slot)
    }

    /// Add an input in the next free slot without binding it.
    pub fn unbound_input(&mut self, name: impl Into<String>) -> NodeId {
        let slot = self.next_slot;
        self.declare(name, slot)
    }

    fn declare(&mut self, name: impl Into<String>, slot: usize) -> NodeId {
        self.next_slot += 1;
        self.push(Node::Input {
            slot,
            name: name.into(),
        })
    }

    pub fn constant(&mut self, value: impl Into<Value>) -> NodeId {
        self.push(Node::Const {
            value: value.into(),
        })
    }

    pub fn op(&mut self, op: OpKind, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::Op { op, lhs, rhs })
    }

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.op(OpKind::Add, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.op(OpKind::Mul, lhs, rhs)
    }

    /// Pin the inputs to a backend strategy.
    pub fn pin(&mut self, strategy: impl Into<Strategy>) -> &mut Self {
        self.context.strategy = Some(strategy.into());
        self
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Finish with `output` as the result node.
    pub fn finish(self, output: NodeId) -> Expr {
        Expr::new(Graph::new(self.nodes, output), self.context)
    }
}
