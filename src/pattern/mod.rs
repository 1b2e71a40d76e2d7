//! Pattern tree algebra and the lazy step evaluator.
//!
//! [`node`] is the value domain the compiler builds. Before a pattern plays it
//! is lowered into a [`tree::PatternTree`], which [`step::StepIter`] walks one
//! step at a time. [`resolve`] turns leaves into values at render time.

pub mod math;
pub mod node;
pub mod resolve;
pub mod step;
pub mod tree;

pub use math::MathOp;
pub use node::{ContainerKind, Extent, ModifierKind, NodeKind, PatternNode, Variable};
pub use resolve::{resolve, Env, Value};
pub use step::{ChordTiming, Step, StepIter};
pub use tree::{NodeId, PatternTree};
