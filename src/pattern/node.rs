//! The pattern tree value domain.
//!
//! Every value the compiler pushes is a [`PatternNode`]: a literal, a
//! render-time variable, a deferred operator, a container or a modifier. Nodes
//! keep the source ranges they were built from so the engine can report which
//! part of the text is sounding.
//!
//! Nodes are plain owned trees. Cloning deep-copies, which is what keeps a
//! cycle's rotation cursor private to one place in one tree.

use crate::dsl::token::SourceRange;

use super::math::MathOp;

/// A render-time variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// Absolute frame counter.
    T,
    /// Elapsed seconds.
    Time,
    /// Position on the beat clock.
    Beat,
}

impl Variable {
    pub fn name(self) -> &'static str {
        match self {
            Variable::T => "t",
            Variable::Time => "time",
            Variable::Beat => "beat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Children play one after another, splitting the duration evenly.
    Sequence,
    /// One child per activation, rotating, each for the full duration.
    Cycle,
    /// All children at once.
    Chord,
}

impl ContainerKind {
    /// Opening and closing bracket for this kind.
    pub fn brackets(self) -> (char, char) {
        match self {
            ContainerKind::Sequence => ('[', ']'),
            ContainerKind::Cycle => ('<', '>'),
            ContainerKind::Chord => ('(', ')'),
        }
    }

    /// Whether arithmetic distributes over this kind element-wise.
    pub fn broadcasts(self) -> bool {
        matches!(self, ContainerKind::Sequence | ContainerKind::Chord)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    /// Divides the inner duration by the amount.
    Speed,
    /// Multiplies the inner gain by the amount.
    Volume,
}

impl ModifierKind {
    pub fn word(self) -> &'static str {
        match self {
            ModifierKind::Speed => "speed",
            ModifierKind::Volume => "vol",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Number(f64),
    /// A quoted string literal.
    Text(String),
    /// A bare token that matched no word when it was compiled.
    Word(String),
    Variable(Variable),
    /// Deferred arithmetic. An empty operand list is the degenerate form
    /// built from malformed operands; it resolves to NaN.
    Operator {
        op: MathOp,
        args: Vec<PatternNode>,
    },
    Container {
        kind: ContainerKind,
        children: Vec<PatternNode>,
        /// Rotation cursor, only meaningful for cycles.
        cursor: usize,
    },
    Modifier {
        kind: ModifierKind,
        amount: Box<PatternNode>,
        inner: Box<PatternNode>,
    },
}

/// Size of a pattern tree, see [`PatternNode::extent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub depth: usize,
    pub nodes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternNode {
    pub kind: NodeKind,
    pub ranges: Vec<SourceRange>,
    /// Static gain stored on the node by `gain`; compounds with ancestors.
    pub gain: Option<f64>,
}

impl PatternNode {
    pub fn new(kind: NodeKind, ranges: Vec<SourceRange>) -> Self {
        Self {
            kind,
            ranges,
            gain: None,
        }
    }

    pub fn number(value: f64, range: SourceRange) -> Self {
        Self::new(NodeKind::Number(value), vec![range])
    }

    pub fn text(value: impl Into<String>, range: SourceRange) -> Self {
        Self::new(NodeKind::Text(value.into()), vec![range])
    }

    pub fn word(value: impl Into<String>, range: SourceRange) -> Self {
        Self::new(NodeKind::Word(value.into()), vec![range])
    }

    pub fn variable(var: Variable, range: SourceRange) -> Self {
        Self::new(NodeKind::Variable(var), vec![range])
    }

    /// A container built from brackets or a collecting word. Containers carry
    /// no ranges of their own; their leaves do.
    pub fn container(kind: ContainerKind, children: Vec<PatternNode>) -> Self {
        Self::new(
            NodeKind::Container {
                kind,
                children,
                cursor: 0,
            },
            Vec::new(),
        )
    }

    pub fn modifier(
        kind: ModifierKind,
        amount: PatternNode,
        inner: PatternNode,
        keyword: SourceRange,
    ) -> Self {
        let mut ranges = vec![keyword];
        ranges.extend_from_slice(&amount.ranges);
        Self::new(
            NodeKind::Modifier {
                kind,
                amount: Box::new(amount),
                inner: Box::new(inner),
            },
            ranges,
        )
    }

    /// The degenerate operator that stands in for malformed operands.
    pub fn degenerate(op: MathOp, keyword: SourceRange) -> Self {
        Self::new(
            NodeKind::Operator {
                op,
                args: Vec::new(),
            },
            vec![keyword],
        )
    }

    /// Build `op` over `args`, distributing into the first sequence or chord
    /// operand (scanning left to right) so that `[1 2] 10 +` becomes
    /// `[11 12]`. Distribution recurses, so nested containers keep their shape.
    pub fn operator(op: MathOp, args: Vec<PatternNode>, keyword: SourceRange) -> Self {
        let Some(idx) = args.iter().position(|a| a.broadcast_kind().is_some()) else {
            return Self::scalar_operator(op, args, keyword);
        };

        let mut args = args;
        let PatternNode {
            kind: target,
            ranges,
            gain,
        } = args.remove(idx);
        let (kind, children, cursor) = match target {
            NodeKind::Container {
                kind,
                children,
                cursor,
            } => (kind, children, cursor),
            other => {
                args.insert(idx, PatternNode::new(other, ranges));
                return Self::scalar_operator(op, args, keyword);
            }
        };

        let children = children
            .into_iter()
            .map(|child| {
                let mut next = args.clone();
                next.insert(idx, child);
                Self::operator(op, next, keyword)
            })
            .collect();

        Self {
            kind: NodeKind::Container {
                kind,
                children,
                cursor,
            },
            ranges,
            gain,
        }
    }

    fn scalar_operator(op: MathOp, args: Vec<PatternNode>, keyword: SourceRange) -> Self {
        let mut ranges = Vec::new();
        for arg in &args {
            ranges.extend_from_slice(&arg.ranges);
        }
        ranges.push(keyword);
        Self::new(NodeKind::Operator { op, args }, ranges)
    }

    fn broadcast_kind(&self) -> Option<ContainerKind> {
        match &self.kind {
            NodeKind::Container { kind, .. } if kind.broadcasts() => Some(*kind),
            _ => None,
        }
    }

    /// Children of a container, empty for anything else.
    pub fn children(&self) -> &[PatternNode] {
        match &self.kind {
            NodeKind::Container { children, .. } => children,
            _ => &[],
        }
    }

    /// Depth and node count of the tree. A leaf has depth 1.
    pub fn extent(&self) -> Extent {
        let mut extent = Extent { depth: 1, nodes: 1 };
        let mut add = |child: &PatternNode| {
            let sub = child.extent();
            extent.depth = extent.depth.max(sub.depth + 1);
            extent.nodes += sub.nodes;
        };
        match &self.kind {
            NodeKind::Operator { args, .. } => args.iter().for_each(&mut add),
            NodeKind::Container { children, .. } => children.iter().for_each(&mut add),
            NodeKind::Modifier { amount, inner, .. } => {
                add(amount);
                add(inner);
            }
            _ => {}
        }
        extent
    }

    /// Multiply the static gain by `amount`.
    pub fn scale_gain(&mut self, amount: f64) {
        self.gain = Some(self.gain.unwrap_or(1.0) * amount);
    }

    /// Write a structural description of the tree: shape, literal values and
    /// static gains, but no source ranges or cursor positions.
    pub fn write_signature(&self, out: &mut String) {
        use std::fmt::Write;

        match &self.kind {
            NodeKind::Number(n) => {
                let _ = write!(out, "n{n}");
            }
            NodeKind::Text(s) => {
                let _ = write!(out, "s{s:?}");
            }
            NodeKind::Word(s) => {
                let _ = write!(out, "w{s:?}");
            }
            NodeKind::Variable(v) => out.push_str(v.name()),
            NodeKind::Operator { op, args } => {
                let _ = write!(out, "op{}(", op.word());
                write_list(args, out);
                out.push(')');
            }
            NodeKind::Container { kind, children, .. } => {
                let (open, close) = kind.brackets();
                out.push(open);
                write_list(children, out);
                out.push(close);
            }
            NodeKind::Modifier {
                kind,
                amount,
                inner,
            } => {
                let _ = write!(out, "{}(", kind.word());
                inner.write_signature(out);
                out.push(',');
                amount.write_signature(out);
                out.push(')');
            }
        }
        if let Some(g) = self.gain {
            let _ = write!(out, "*{g}");
        }
    }
}

fn write_list(nodes: &[PatternNode], out: &mut String) {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        node.write_signature(out);
    }
}
