//! Lowering expression graphs to the array IR.

use crate::graph::{Graph, GraphContext, Node, NodeId};
use crate::ir::{Function, Instr, InstrOp, Param, ValueId};
use crate::{ExecutionContext, Strategy};
use kiln_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, ToDiagnostic};
use kiln_term::{Type, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

/// Lowering errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LowerError {
    #[error("input `{name}` (slot {slot}) has no binding")]
    UnboundInput { slot: usize, name: String },

    #[error("node {node} does not exist in a graph of {len} node(s)")]
    DanglingNode { node: NodeId, len: usize },

    #[error("node {node} refers to node {operand}, which is not an earlier node")]
    ForwardReference { node: NodeId, operand: NodeId },

    #[error("node {node}: cannot combine {lhs} with {rhs}")]
    ShapeMismatch { node: NodeId, lhs: Type, rhs: Type },

    #[error("expression is pinned to strategy `{pinned}` but the current context uses `{ambient}`")]
    IncompatibleContext { pinned: Strategy, ambient: Strategy },
}

impl LowerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LowerError::UnboundInput { .. } => ErrorCode::UnboundInput,
            LowerError::DanglingNode { .. } => ErrorCode::DanglingNode,
            LowerError::ForwardReference { .. } => ErrorCode::ForwardReference,
            LowerError::ShapeMismatch { .. } => ErrorCode::ShapeMismatch,
            LowerError::IncompatibleContext { .. } => ErrorCode::IncompatibleContext,
        }
    }
}

impl ToDiagnostic for LowerError {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(DiagnosticKind::Lowering, self.to_string()).with_code(self.code())
    }
}

/// Lower `graph` into a function, binding inputs from `ctx`.
///
/// Only nodes reachable from the output are lowered. Parameters are the
/// reachable inputs in slot order; the remaining nodes follow in graph order,
/// which is a topological order because operands precede their users.
pub fn from_expr(
    graph: &Graph,
    ctx: &GraphContext,
    exec: &ExecutionContext,
) -> Result<Function, LowerError> {
    if let Some(pinned) = &ctx.strategy {
        let ambient = exec.strategy();
        if *pinned != ambient {
            return Err(LowerError::IncompatibleContext {
                pinned: pinned.clone(),
                ambient,
            });
        }
    }

    let reachable = reachable(graph)?;

    let mut inputs: BTreeMap<usize, NodeId> = BTreeMap::new();
    for &id in &reachable {
        if let Some(Node::Input { slot, .. }) = graph.node(id) {
            inputs.entry(*slot).or_insert(id);
        }
    }

    let mut lowering = Lowering::default();
    let mut params = Vec::with_capacity(inputs.len());
    let mut captures = Vec::with_capacity(inputs.len());
    let mut slots: HashMap<usize, ValueId> = HashMap::new();

    for (index, (&slot, &id)) in inputs.iter().enumerate() {
        let Some(Node::Input { name, .. }) = graph.node(id) else {
            continue;
        };
        let value = ctx.binding(slot).ok_or_else(|| LowerError::UnboundInput {
            slot,
            name: name.clone(),
        })?;
        let ty = value.ty();
        params.push(Param {
            name: name.clone(),
            ty: ty.clone(),
        });
        captures.push(value.clone());
        slots.insert(slot, lowering.emit(InstrOp::Param(index), ty));
    }

    for &id in &reachable {
        let value = match &graph.nodes[id] {
            Node::Input { slot, .. } => match slots.get(slot) {
                Some(&value) => value,
                None => continue,
            },
            Node::Const { value } => lowering.constant(value),
            Node::Op { op, lhs, rhs } => {
                let (lhs, rhs) = (lowering.value(*lhs), lowering.value(*rhs));
                let (lhs_ty, rhs_ty) = (lowering.ty(lhs), lowering.ty(rhs));
                let shape = lhs_ty
                    .broadcast_shape(&rhs_ty)
                    .ok_or_else(|| LowerError::ShapeMismatch {
                        node: id,
                        lhs: lhs_ty.clone(),
                        rhs: rhs_ty.clone(),
                    })?;
                let operand = op.operand_dtype(lhs_ty.dtype, rhs_ty.dtype);
                let ty = Type::array(op.result_dtype(operand), shape);
                lowering.emit(
                    InstrOp::Binary {
                        op: *op,
                        operand,
                        lhs,
                        rhs,
                    },
                    ty,
                )
            }
        };
        lowering.nodes.insert(id, value);
    }

    let ret = lowering.value(graph.output);
    debug!(
        params = params.len(),
        instrs = lowering.body.len(),
        "lowered expression graph"
    );

    Ok(Function {
        name: "main".to_string(),
        params,
        body: lowering.body,
        ret,
        captures,
    })
}

/// Nodes reachable from the output, in ascending order.
fn reachable(graph: &Graph) -> Result<BTreeSet<NodeId>, LowerError> {
    let len = graph.len();
    if graph.output >= len {
        return Err(LowerError::DanglingNode {
            node: graph.output,
            len,
        });
    }

    let mut seen = BTreeSet::new();
    let mut stack = vec![graph.output];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Node::Op { lhs, rhs, .. } = &graph.nodes[id] {
            for operand in [*lhs, *rhs] {
                if operand >= len {
                    return Err(LowerError::DanglingNode { node: operand, len });
                }
                if operand >= id {
                    return Err(LowerError::ForwardReference { node: id, operand });
                }
                stack.push(operand);
            }
        }
    }
    Ok(seen)
}

#[derive(Default)]
struct Lowering {
    body: Vec<Instr>,
    nodes: HashMap<NodeId, ValueId>,
}

impl Lowering {
    fn emit(&mut self, op: InstrOp, ty: Type) -> ValueId {
        self.body.push(Instr::new(op, ty));
        self.body.len() - 1
    }

    fn constant(&mut self, value: &Value) -> ValueId {
        self.emit(InstrOp::Const(value.clone()), value.ty())
    }

    // Operands are always lowered before their users.
    fn value(&self, node: NodeId) -> ValueId {
        self.nodes[&node]
    }

    fn ty(&self, value: ValueId) -> Type {
        self.body[value].ty.clone()
    }
}
