//! Render-time value resolution and range collection.

use std::borrow::Cow;

use crate::dsl::number;
use crate::dsl::token::SourceRange;

use super::node::{ContainerKind, NodeKind, PatternNode, Variable};

/// The render-time environment a pattern is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Env {
    /// Absolute frame counter.
    pub t: f64,
    /// Elapsed seconds.
    pub time: f64,
    /// Beat clock position.
    pub beat: f64,
}

impl Env {
    /// The environment used when formatting values at compile time.
    pub const ZERO: Env = Env {
        t: 0.0,
        time: 0.0,
        beat: 0.0,
    };

    pub fn at_frame(frame: u64, sample_rate: u32, beat: f64) -> Self {
        Self {
            t: frame as f64,
            time: frame as f64 / sample_rate as f64,
            beat,
        }
    }

    pub fn get(&self, var: Variable) -> f64 {
        match var {
            Variable::T => self.t,
            Variable::Time => self.time,
            Variable::Beat => self.beat,
        }
    }
}

/// A resolved leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Number(f64),
    Text(Cow<'a, str>),
}

impl Value<'_> {
    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Numeric reading of the value; text is coerced.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Text(s) => number::coerce(s),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_ref()),
            Value::Number(_) => None,
        }
    }
}

/// Index of the cycle branch that is current at `beat` when a cycle is read as
/// an operand rather than traversed.
pub fn cycle_branch(beat: f64, len: usize) -> usize {
    (beat.floor() as i64).rem_euclid(len as i64) as usize
}

/// Resolve a node to a value.
///
/// Sequences, chords and empty cycles read as 0. A modifier reads as its inner
/// value. A cycle used as an operand picks its branch from the beat clock.
pub fn resolve<'a>(node: &'a PatternNode, env: &Env) -> Value<'a> {
    match &node.kind {
        NodeKind::Number(n) => Value::Number(*n),
        NodeKind::Text(s) | NodeKind::Word(s) => Value::Text(Cow::Borrowed(s)),
        NodeKind::Variable(var) => Value::Number(env.get(*var)),
        NodeKind::Operator { op, args } => match args.as_slice() {
            [] => Value::Number(f64::NAN),
            [lhs] => op.apply(resolve(lhs, env), None),
            [lhs, rhs, ..] => op.apply(resolve(lhs, env), Some(resolve(rhs, env))),
        },
        NodeKind::Container {
            kind: ContainerKind::Cycle,
            children,
            ..
        } if !children.is_empty() => resolve(&children[cycle_branch(env.beat, children.len())], env),
        NodeKind::Container { .. } => Value::Number(0.0),
        NodeKind::Modifier { inner, .. } => resolve(inner, env),
    }
}

/// Append the ranges of `node` plus those of whatever it currently resolves
/// through: every operand of an operator, and the selected branch of a cycle.
pub fn collect_ranges(node: &PatternNode, env: &Env, out: &mut Vec<SourceRange>) {
    out.extend_from_slice(&node.ranges);
    match &node.kind {
        NodeKind::Operator { args, .. } => {
            for arg in args {
                collect_ranges(arg, env, out);
            }
        }
        NodeKind::Container {
            kind: ContainerKind::Cycle,
            children,
            ..
        } if !children.is_empty() => {
            collect_ranges(&children[cycle_branch(env.beat, children.len())], env, out);
        }
        _ => {}
    }
}
