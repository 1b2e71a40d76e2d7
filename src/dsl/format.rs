//! Renders compiled values back to source text for eval replies.

use crate::pattern::{resolve, Env, NodeKind, PatternNode, Value};

use super::compile::{Command, Program};
use super::number;

/// Command records first, then whatever is left on the stack.
pub fn format_program(program: &Program) -> String {
    let commands = program.commands.iter().map(format_command);
    let stack = program.stack.iter().map(format_node);
    commands.chain(stack).collect::<Vec<_>>().join(" ")
}

pub fn format_command(command: &Command) -> String {
    format!("{} {}", format_node(&command.pattern), command.waveform.word())
}

pub fn format_node(node: &PatternNode) -> String {
    match &node.kind {
        NodeKind::Number(n) => format_number(*n),
        NodeKind::Text(s) => format!("\"{s}\""),
        NodeKind::Word(s) => s.clone(),
        NodeKind::Variable(var) => var.name().to_string(),
        NodeKind::Operator { .. } => format_value(&resolve(node, &Env::ZERO)),
        NodeKind::Container { kind, children, .. } => {
            let (open, close) = kind.brackets();
            let mut out = String::new();
            out.push(open);
            for child in children {
                out.push(' ');
                out.push_str(&format_node(child));
            }
            out.push(' ');
            out.push(close);
            out
        }
        NodeKind::Modifier {
            kind,
            amount,
            inner,
        } => format!("{} {} {}", format_node(inner), format_node(amount), kind.word()),
    }
}

fn format_value(value: &Value<'_>) -> String {
    match value {
        Value::Number(n) => format_number(*n),
        Value::Text(s) => format!("\"{s}\""),
    }
}

/// At most three decimals, trailing zeros dropped.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return number::to_text(n);
    }
    let fixed = format!("{n:.3}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}
