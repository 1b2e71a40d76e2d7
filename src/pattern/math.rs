//! Operator semantics: arithmetic, 32-bit bitwise logic and unary math.

use std::borrow::Cow;

use crate::dsl::number;

use super::resolve::Value;

/// An operator a pattern word can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shr,
    Shl,
    Pow,
    Sin,
    Cos,
}

impl MathOp {
    /// Number of operands the operator pops.
    pub fn arity(self) -> usize {
        match self {
            MathOp::Sin | MathOp::Cos => 1,
            _ => 2,
        }
    }

    /// The source word that builds this operator.
    pub fn word(self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Sub => "-",
            MathOp::Mul => "*",
            MathOp::Div => "/",
            MathOp::Rem => "%",
            MathOp::And => "and",
            MathOp::Or => "or",
            MathOp::Xor => "xor",
            MathOp::Shr => "rshift",
            MathOp::Shl => "lshift",
            MathOp::Pow => "pow",
            MathOp::Sin => "sin",
            MathOp::Cos => "cos",
        }
    }

    /// Apply to resolved operands. A missing right operand reads as NaN.
    pub fn apply<'a>(self, lhs: Value<'a>, rhs: Option<Value<'a>>) -> Value<'a> {
        if self == MathOp::Add {
            if let Some(rhs) = &rhs {
                if lhs.is_text() || rhs.is_text() {
                    let joined = format!("{}{}", lhs.to_text(), rhs.to_text());
                    return Value::Text(Cow::Owned(joined));
                }
            }
        }

        let a = lhs.as_number();
        let b = rhs.map(|v| v.as_number()).unwrap_or(f64::NAN);

        let n = match self {
            MathOp::Add => a + b,
            MathOp::Sub => a - b,
            MathOp::Mul => a * b,
            MathOp::Div => a / b,
            MathOp::Rem => a % b,
            MathOp::And => (to_int32(a) & to_int32(b)) as f64,
            MathOp::Or => (to_int32(a) | to_int32(b)) as f64,
            MathOp::Xor => (to_int32(a) ^ to_int32(b)) as f64,
            MathOp::Shr => (to_int32(a) >> shift_count(b)) as f64,
            MathOp::Shl => to_int32(a).wrapping_shl(shift_count(b)) as f64,
            MathOp::Pow => a.powf(b),
            MathOp::Sin => a.sin(),
            MathOp::Cos => a.cos(),
        };
        Value::Number(n)
    }
}

/// Wrap a float into a 32-bit two's-complement integer (non-finite → 0).
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let wrapped = n.trunc().rem_euclid(4_294_967_296.0);
    if wrapped >= 2_147_483_648.0 {
        (wrapped - 4_294_967_296.0) as i32
    } else {
        wrapped as i32
    }
}

fn shift_count(n: f64) -> u32 {
    (to_int32(n) as u32) & 31
}

impl Value<'_> {
    fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Number(n) => Cow::Owned(number::to_text(*n)),
            Value::Text(s) => Cow::Borrowed(s.as_ref()),
        }
    }
}
