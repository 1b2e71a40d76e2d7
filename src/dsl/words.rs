//! The builtin dictionary.

use crate::engine::waveform::Waveform;
use crate::pattern::{ContainerKind, MathOp, ModifierKind, Variable};

/// A builtin word and the stack operation it performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Render the whole stack with a waveform.
    Render(Waveform),
    /// Collect the whole stack into a container.
    Collect(ContainerKind),
    Open(ContainerKind),
    Close(ContainerKind),
    /// `: name body ;`
    Define,
    Dup,
    Drop,
    Swap,
    Modify(ModifierKind),
    /// Multiply a static gain into the value beneath.
    Gain,
    Bpm,
    Var(Variable),
    Math(MathOp),
}

impl Builtin {
    pub fn lookup(word: &str) -> Option<Self> {
        let builtin = match word {
            "seq" => Builtin::Collect(ContainerKind::Sequence),
            "cycle" => Builtin::Collect(ContainerKind::Cycle),
            "chord" => Builtin::Collect(ContainerKind::Chord),
            "[" => Builtin::Open(ContainerKind::Sequence),
            "]" => Builtin::Close(ContainerKind::Sequence),
            "<" => Builtin::Open(ContainerKind::Cycle),
            ">" => Builtin::Close(ContainerKind::Cycle),
            "(" => Builtin::Open(ContainerKind::Chord),
            ")" => Builtin::Close(ContainerKind::Chord),
            ":" => Builtin::Define,
            "dup" => Builtin::Dup,
            "drop" => Builtin::Drop,
            "swap" => Builtin::Swap,
            "vol" => Builtin::Modify(ModifierKind::Volume),
            "speed" => Builtin::Modify(ModifierKind::Speed),
            "gain" => Builtin::Gain,
            "bpm" => Builtin::Bpm,
            "t" => Builtin::Var(Variable::T),
            "time" => Builtin::Var(Variable::Time),
            "beat" => Builtin::Var(Variable::Beat),
            "+" => Builtin::Math(MathOp::Add),
            "-" => Builtin::Math(MathOp::Sub),
            "*" => Builtin::Math(MathOp::Mul),
            "/" => Builtin::Math(MathOp::Div),
            "%" => Builtin::Math(MathOp::Rem),
            "and" => Builtin::Math(MathOp::And),
            "or" => Builtin::Math(MathOp::Or),
            "xor" => Builtin::Math(MathOp::Xor),
            "rshift" => Builtin::Math(MathOp::Shr),
            "lshift" => Builtin::Math(MathOp::Shl),
            "pow" => Builtin::Math(MathOp::Pow),
            "sin" => Builtin::Math(MathOp::Sin),
            "cos" => Builtin::Math(MathOp::Cos),
            other => return Waveform::from_word(other).map(Builtin::Render),
        };
        Some(builtin)
    }

    pub fn is_builtin(word: &str) -> bool {
        Self::lookup(word).is_some()
    }
}
