//! Lazy step evaluator.
//!
//! A pattern plays as an endless stream of [`Step`]s: which leaves sound, at
//! what gain, for how many beats, and which source ranges to highlight. The
//! stream is produced by an explicit state machine ([`Visit`]) that resumes
//! where it left off on every pull, so nothing is computed ahead of time. In
//! particular a cycle only rotates, and a modifier only resolves its amount,
//! at the moment playback actually reaches it.
//!
//! Chords run one [`Track`] per child and advance them all by the smallest
//! remaining duration, which is how children with different rhythms line up.

use crate::dsl::token::SourceRange;

use super::node::{ContainerKind, ModifierKind};
use super::resolve::{collect_ranges, resolve, Env};
use super::tree::{NodeId, PatternTree, Slot};

/// Tuning for chord track merging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordTiming {
    /// Step used when the smallest remaining duration is below `stall`.
    pub min_step: f64,
    /// Remaining durations below this count as zero-length.
    pub stall: f64,
    /// A track re-pulls once its remaining duration drops to this.
    pub epsilon: f64,
}

impl Default for ChordTiming {
    fn default() -> Self {
        Self {
            min_step: 0.001,
            stall: 1e-9,
            epsilon: 1e-5,
        }
    }
}

/// One timed unit of evaluation output.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub leaves: Vec<NodeId>,
    /// Gain per leaf, parallel to `leaves`.
    pub gains: Vec<f64>,
    /// Length in beats.
    pub duration: f64,
    pub ranges: Vec<SourceRange>,
}

impl Step {
    /// A silent step.
    pub fn rest(duration: f64, ranges: Vec<SourceRange>) -> Self {
        Self {
            leaves: Vec::new(),
            gains: Vec::new(),
            duration,
            ranges,
        }
    }
}

/// Resumable traversal of one subtree for one activation.
#[derive(Debug)]
enum Visit {
    /// A leaf or empty container: a single step.
    Once(Option<Step>),
    Sequence {
        node: NodeId,
        next: usize,
        child_duration: f64,
        gain: f64,
        ranges: Vec<SourceRange>,
        current: Option<Box<Visit>>,
    },
    /// A cycle's chosen branch or a modifier's inner node, with the wrapping
    /// node's ranges added to every step.
    Wrap {
        inner: Box<Visit>,
        ranges: Vec<SourceRange>,
    },
    Chord {
        tracks: Vec<Track>,
        ranges: Vec<SourceRange>,
        /// Size of the step handed out last; tracks are advanced by it lazily
        /// on the following pull.
        pending: Option<f64>,
    },
}

/// One child's independent traversal inside a chord.
#[derive(Debug)]
struct Track {
    visit: Visit,
    current: Option<Step>,
    remaining: f64,
}

impl Track {
    fn new(visit: Visit, tree: &mut PatternTree, env: &Env, timing: &ChordTiming) -> Self {
        let mut track = Self {
            visit,
            current: None,
            remaining: 0.0,
        };
        track.pull(tree, env, timing);
        track
    }

    fn pull(&mut self, tree: &mut PatternTree, env: &Env, timing: &ChordTiming) {
        self.current = self.visit.next(tree, env, timing);
        self.remaining = self.current.as_ref().map_or(0.0, |s| s.duration);
    }

    fn is_done(&self) -> bool {
        self.current.is_none()
    }
}

impl Visit {
    fn start(
        tree: &mut PatternTree,
        id: NodeId,
        duration: f64,
        gain: f64,
        env: &Env,
        timing: &ChordTiming,
    ) -> Self {
        let node = tree.node(id);
        let ranges = node.ranges.clone();
        let gain = node.gain.unwrap_or(1.0) * gain;

        match &node.slot {
            Slot::Leaf(pattern) => {
                let mut active = Vec::with_capacity(ranges.len() + 2);
                collect_ranges(pattern, env, &mut active);
                Visit::Once(Some(Step {
                    leaves: vec![id],
                    gains: vec![gain],
                    duration,
                    ranges: active,
                }))
            }
            Slot::Container { children, .. } if children.is_empty() => {
                Visit::Once(Some(Step::rest(duration, ranges)))
            }
            Slot::Container {
                kind: ContainerKind::Sequence,
                children,
                ..
            } => Visit::Sequence {
                node: id,
                next: 0,
                child_duration: duration / children.len() as f64,
                gain,
                ranges,
                current: None,
            },
            Slot::Container {
                kind: ContainerKind::Chord,
                children,
                ..
            } => {
                let children = children.clone();
                let tracks = children
                    .into_iter()
                    .map(|child| {
                        let visit = Visit::start(tree, child, duration, gain, env, timing);
                        Track::new(visit, tree, env, timing)
                    })
                    .collect();
                Visit::Chord {
                    tracks,
                    ranges,
                    pending: None,
                }
            }
            Slot::Container {
                kind: ContainerKind::Cycle,
                ..
            } => match tree.rotate(id) {
                Some(branch) => Visit::Wrap {
                    inner: Box::new(Visit::start(tree, branch, duration, gain, env, timing)),
                    ranges,
                },
                None => Visit::Once(Some(Step::rest(duration, ranges))),
            },
            Slot::Modifier {
                kind,
                amount,
                inner,
            } => {
                let inner = *inner;
                let amount = resolve(amount, env).as_number();
                let (duration, gain) = match kind {
                    ModifierKind::Speed => (duration / speed_factor(amount), gain),
                    ModifierKind::Volume => (duration, gain * amount),
                };
                Visit::Wrap {
                    inner: Box::new(Visit::start(tree, inner, duration, gain, env, timing)),
                    ranges,
                }
            }
        }
    }

    fn next(&mut self, tree: &mut PatternTree, env: &Env, timing: &ChordTiming) -> Option<Step> {
        match self {
            Visit::Once(step) => step.take(),
            Visit::Wrap { inner, ranges } => inner.next(tree, env, timing).map(|mut step| {
                step.ranges.extend_from_slice(ranges);
                step
            }),
            Visit::Sequence {
                node,
                next,
                child_duration,
                gain,
                ranges,
                current,
            } => loop {
                if let Some(visit) = current {
                    if let Some(mut step) = visit.next(tree, env, timing) {
                        step.ranges.extend_from_slice(ranges);
                        return Some(step);
                    }
                    *current = None;
                }
                let child = tree.child(*node, *next)?;
                *next += 1;
                *current = Some(Box::new(Visit::start(
                    tree,
                    child,
                    *child_duration,
                    *gain,
                    env,
                    timing,
                )));
            },
            Visit::Chord {
                tracks,
                ranges,
                pending,
            } => {
                if let Some(elapsed) = pending.take() {
                    for track in tracks.iter_mut().filter(|t| !t.is_done()) {
                        track.remaining -= elapsed;
                        if track.remaining <= timing.epsilon {
                            track.pull(tree, env, timing);
                        }
                    }
                }

                let mut size = tracks
                    .iter()
                    .filter(|t| !t.is_done())
                    .map(|t| t.remaining)
                    .fold(f64::INFINITY, f64::min);
                if size == f64::INFINITY {
                    return None;
                }
                if !(size >= timing.stall) {
                    size = timing.min_step;
                }

                let mut merged = Step::rest(size, ranges.clone());
                for step in tracks.iter().filter_map(|t| t.current.as_ref()) {
                    merged.leaves.extend_from_slice(&step.leaves);
                    merged.gains.extend_from_slice(&step.gains);
                    merged.ranges.extend_from_slice(&step.ranges);
                }
                *pending = Some(size);
                Some(merged)
            }
        }
    }
}

/// Speed amounts that are zero, negative or not finite leave time unchanged.
fn speed_factor(amount: f64) -> f64 {
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        1.0
    }
}

/// The endless step stream of one pattern: the root is visited with a one-beat
/// duration and unit gain, and re-entered every time it runs out.
#[derive(Debug, Default)]
pub struct StepIter {
    visit: Option<Visit>,
}

impl StepIter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, tree: &mut PatternTree, env: &Env, timing: &ChordTiming) -> Step {
        let root = tree.root();
        for _ in 0..2 {
            let visit = self
                .visit
                .get_or_insert_with(|| Visit::start(tree, root, 1.0, 1.0, env, timing));
            if let Some(step) = visit.next(tree, env, timing) {
                return step;
            }
            self.visit = None;
        }
        Step::rest(1.0, Vec::new())
    }
}
