//! Per-Sound pattern arena.
//!
//! A committed pattern is lowered into a flat arena before it plays. The
//! structural nodes (containers and modifiers) become slots addressed by
//! [`NodeId`], so the step evaluator can hold positions into the tree while
//! still advancing cycle cursors through `&mut PatternTree`. Leaves keep their
//! [`PatternNode`] form for resolution.
//!
//! Each Sound owns its own tree; nothing in it is shared with another Sound.

use crate::dsl::token::SourceRange;

use super::node::{ContainerKind, ModifierKind, NodeKind, PatternNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum Slot {
    Leaf(PatternNode),
    Container {
        kind: ContainerKind,
        children: Vec<NodeId>,
        cursor: usize,
    },
    Modifier {
        kind: ModifierKind,
        amount: PatternNode,
        inner: NodeId,
    },
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub slot: Slot,
    pub ranges: Vec<SourceRange>,
    pub gain: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PatternTree {
    nodes: Vec<TreeNode>,
    root: NodeId,
}

impl PatternTree {
    /// Lower an owned pattern into an arena.
    pub fn lower(pattern: PatternNode) -> Self {
        let mut nodes = Vec::new();
        let root = lower_into(pattern, &mut nodes);
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The leaf pattern at `id`, if that slot is a leaf.
    pub fn leaf(&self, id: NodeId) -> Option<&PatternNode> {
        match &self.nodes[id.0].slot {
            Slot::Leaf(node) => Some(node),
            _ => None,
        }
    }

    /// The `index`-th child of a container slot.
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        match &self.nodes[id.0].slot {
            Slot::Container { children, .. } => children.get(index).copied(),
            _ => None,
        }
    }

    /// Select the next branch of a cycle and advance its cursor.
    pub fn rotate(&mut self, id: NodeId) -> Option<NodeId> {
        match &mut self.nodes[id.0].slot {
            Slot::Container {
                children, cursor, ..
            } if !children.is_empty() => {
                let picked = children[*cursor % children.len()];
                *cursor = cursor.wrapping_add(1);
                Some(picked)
            }
            _ => None,
        }
    }
}

fn lower_into(pattern: PatternNode, nodes: &mut Vec<TreeNode>) -> NodeId {
    let PatternNode { kind, ranges, gain } = pattern;

    let slot = match kind {
        NodeKind::Container {
            kind,
            children,
            cursor,
        } => Slot::Container {
            kind,
            children: children
                .into_iter()
                .map(|child| lower_into(child, nodes))
                .collect(),
            cursor,
        },
        NodeKind::Modifier {
            kind,
            amount,
            inner,
        } => Slot::Modifier {
            kind,
            amount: *amount,
            inner: lower_into(*inner, nodes),
        },
        leaf => {
            let node = PatternNode {
                kind: leaf,
                ranges: ranges.clone(),
                gain,
            };
            Slot::Leaf(node)
        }
    };

    let id = NodeId(nodes.len());
    nodes.push(TreeNode { slot, ranges, gain });
    id
}
