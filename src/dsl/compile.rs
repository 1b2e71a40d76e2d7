//! Stack machine: runs tokens against the builtin and macro dictionaries.
//!
//! Compilation never fails on bad input. Unknown words are pushed as opaque
//! values, stack underflow skips the operation, and stray brackets are
//! ignored. The hard errors are runaway growth: macro recursion, macro
//! fan-out, values nested too deep, and programs that build too many nodes.

use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::waveform::Waveform;
use crate::pattern::{resolve, ContainerKind, Env, NodeKind, PatternNode};

use super::error::CompileError;
use super::lexer;
use super::number;
use super::token::Token;
use super::words::Builtin;

/// Macro expansions nested deeper than this abort the compile.
pub const MAX_MACRO_DEPTH: usize = 64;

/// Values nested deeper than this abort the compile. Every later stage walks
/// the tree recursively.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Tokens run from macro bodies, summed over one compile.
pub const MAX_EXPANDED_TOKENS: usize = 1 << 18;

/// Pattern nodes pushed onto the stack, summed over one compile.
pub const MAX_PATTERN_NODES: usize = 1 << 18;

/// Whether a compile pass will be committed to playback or only inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Commit,
    Eval,
}

/// A render command issued by a waveform word.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub waveform: Waveform,
    pub pattern: PatternNode,
}

/// The result of one compile pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub commands: Vec<Command>,
    /// Values left on the stack after the last token, markers removed.
    pub stack: Vec<PatternNode>,
    pub bpm: f64,
    /// Sample names referenced by `play`, in first-seen order. Only
    /// collected in commit mode.
    pub requests: Vec<String>,
}

#[derive(Debug, Clone)]
enum Item {
    Marker(ContainerKind),
    Value(PatternNode),
}

impl Item {
    fn into_value(self) -> Option<PatternNode> {
        match self {
            Item::Value(node) => Some(node),
            Item::Marker(_) => None,
        }
    }

    fn is_value(&self) -> bool {
        matches!(self, Item::Value(_))
    }
}

/// Lex and run `source`, starting from tempo `bpm`.
pub fn compile_source(source: &str, bpm: f64, mode: Mode) -> Result<Program, CompileError> {
    let tokens = lexer::tokenize(source);
    let mut machine = Machine::new(bpm, mode);
    machine.run(&tokens, 0)?;
    Ok(machine.finish())
}

struct Machine {
    stack: Vec<Item>,
    macros: HashMap<String, Rc<[Token]>>,
    commands: Vec<Command>,
    requests: Vec<String>,
    bpm: f64,
    mode: Mode,
    expanded: usize,
    built: usize,
}

impl Machine {
    fn new(bpm: f64, mode: Mode) -> Self {
        Self {
            stack: Vec::new(),
            macros: HashMap::new(),
            commands: Vec::new(),
            requests: Vec::new(),
            bpm,
            mode,
            expanded: 0,
            built: 0,
        }
    }

    fn finish(self) -> Program {
        Program {
            commands: self.commands,
            stack: self.stack.into_iter().filter_map(Item::into_value).collect(),
            bpm: self.bpm,
            requests: self.requests,
        }
    }

    fn run(&mut self, tokens: &[Token], depth: usize) -> Result<(), CompileError> {
        let mut pos = 0;
        while pos < tokens.len() {
            let token = &tokens[pos];
            pos += 1;

            if depth > 0 {
                self.expanded += 1;
                if self.expanded > MAX_EXPANDED_TOKENS {
                    return Err(CompileError::expansion_limit(
                        token.range(),
                        MAX_EXPANDED_TOKENS,
                    ));
                }
            }

            if let Some(n) = numeric(token) {
                self.push(PatternNode::number(n, token.range()), token)?;
            } else if token.is_quoted() {
                self.push(PatternNode::text(token.unquoted(), token.range()), token)?;
            } else if let Some(builtin) = Builtin::lookup(&token.text) {
                if builtin == Builtin::Define {
                    pos = self.define(tokens, pos);
                } else {
                    self.execute(builtin, token)?;
                }
            } else if let Some(body) = self.macros.get(&token.text).cloned() {
                if depth >= MAX_MACRO_DEPTH {
                    return Err(CompileError::macro_depth(
                        &token.text,
                        token.range(),
                        MAX_MACRO_DEPTH,
                    ));
                }
                self.run(&body, depth + 1)?;
            } else {
                self.push(PatternNode::word(token.text.as_str(), token.range()), token)?;
            }
        }
        Ok(())
    }

    /// Read `name body… ;` starting at `pos`; returns the position after it.
    fn define(&mut self, tokens: &[Token], mut pos: usize) -> usize {
        let Some(name) = tokens.get(pos) else {
            return pos;
        };
        pos += 1;
        let start = pos;
        while pos < tokens.len() && tokens[pos].text != ";" {
            pos += 1;
        }
        let body: Rc<[Token]> = tokens[start..pos].into();
        self.macros.insert(name.text.clone(), body);
        (pos + 1).min(tokens.len())
    }

    fn execute(&mut self, builtin: Builtin, token: &Token) -> Result<(), CompileError> {
        let range = token.range();
        match builtin {
            Builtin::Render(waveform) => self.render(waveform, token)?,
            Builtin::Collect(kind) => {
                let children = self.take_all();
                self.push(PatternNode::container(kind, children), token)?;
            }
            Builtin::Open(kind) => self.stack.push(Item::Marker(kind)),
            Builtin::Close(kind) => self.close(kind, token)?,
            Builtin::Define => {}
            Builtin::Dup => match self.stack.last() {
                Some(Item::Value(top)) => {
                    let copy = top.clone();
                    self.push(copy, token)?;
                }
                Some(Item::Marker(kind)) => {
                    let kind = *kind;
                    self.stack.push(Item::Marker(kind));
                }
                None => {}
            },
            Builtin::Drop => {
                self.stack.pop();
            }
            Builtin::Swap => {
                let len = self.stack.len();
                if len >= 2 {
                    self.stack.swap(len - 1, len - 2);
                }
            }
            Builtin::Modify(kind) => {
                if let Some([value, amount]) = self.pop_values::<2>() {
                    self.push(PatternNode::modifier(kind, amount, value, range), token)?;
                }
            }
            Builtin::Gain => {
                if let Some([mut value, amount]) = self.pop_values::<2>() {
                    value.scale_gain(resolve(&amount, &Env::ZERO).as_number());
                    self.stack.push(Item::Value(value));
                }
            }
            Builtin::Bpm => {
                if let Some([value]) = self.pop_values::<1>() {
                    let bpm = resolve(&value, &Env::ZERO).as_number();
                    if bpm.is_finite() && bpm > 0.0 {
                        self.bpm = bpm;
                    }
                }
            }
            Builtin::Var(var) => self.push(PatternNode::variable(var, range), token)?,
            Builtin::Math(op) => {
                let arity = op.arity();
                if self.stack.len() < arity {
                    return Ok(());
                }
                let operands = self.stack.split_off(self.stack.len() - arity);
                let node = if operands.iter().all(Item::is_value) {
                    let args: Vec<PatternNode> =
                        operands.into_iter().filter_map(Item::into_value).collect();
                    // Broadcasting one container into another multiplies their sizes.
                    let product = args
                        .iter()
                        .fold(1usize, |acc, arg| acc.saturating_mul(arg.extent().nodes));
                    if product > MAX_PATTERN_NODES {
                        return Err(CompileError::pattern_size(range, MAX_PATTERN_NODES));
                    }
                    PatternNode::operator(op, args, range)
                } else {
                    PatternNode::degenerate(op, range)
                };
                self.push(node, token)?;
            }
        }
        Ok(())
    }

    fn render(&mut self, waveform: Waveform, token: &Token) -> Result<(), CompileError> {
        let mut values = self.take_all();
        let pattern = match values.len() {
            0 => return Ok(()),
            1 => values.remove(0),
            _ => {
                let pattern = PatternNode::container(ContainerKind::Sequence, values);
                self.admit(&pattern, token)?;
                pattern
            }
        };
        if self.mode == Mode::Commit && waveform == Waveform::Sample {
            scan_samples(&pattern, &mut self.requests);
        }
        self.commands.push(Command { waveform, pattern });
        Ok(())
    }

    fn close(&mut self, kind: ContainerKind, token: &Token) -> Result<(), CompileError> {
        let Some(idx) = self
            .stack
            .iter()
            .rposition(|item| matches!(item, Item::Marker(k) if *k == kind))
        else {
            return Ok(());
        };
        let group = self.stack.split_off(idx);
        let children = group.into_iter().skip(1).filter_map(Item::into_value).collect();
        self.push(PatternNode::container(kind, children), token)
    }

    /// Push a value built by `token`, charging it against the compile limits.
    fn push(&mut self, node: PatternNode, token: &Token) -> Result<(), CompileError> {
        self.admit(&node, token)?;
        self.stack.push(Item::Value(node));
        Ok(())
    }

    fn admit(&mut self, node: &PatternNode, token: &Token) -> Result<(), CompileError> {
        let extent = node.extent();
        if extent.depth > MAX_NESTING_DEPTH {
            return Err(CompileError::nesting_depth(token.range(), MAX_NESTING_DEPTH));
        }
        self.built += extent.nodes;
        if self.built > MAX_PATTERN_NODES {
            return Err(CompileError::pattern_size(token.range(), MAX_PATTERN_NODES));
        }
        Ok(())
    }

    /// Drain the whole stack, dropping markers.
    fn take_all(&mut self) -> Vec<PatternNode> {
        self.stack.drain(..).filter_map(Item::into_value).collect()
    }

    /// Pop the top `N` items if they are all values, deepest first.
    fn pop_values<const N: usize>(&mut self) -> Option<[PatternNode; N]> {
        let len = self.stack.len();
        if len < N || !self.stack[len - N..].iter().all(Item::is_value) {
            return None;
        }
        let values: Vec<PatternNode> = self
            .stack
            .split_off(len - N)
            .into_iter()
            .filter_map(Item::into_value)
            .collect();
        values.try_into().ok()
    }
}

/// A token reads as a number when it has a numeric prefix and no quote.
fn numeric(token: &Token) -> Option<f64> {
    if token.text.contains('"') {
        return None;
    }
    number::parse_prefix(&token.text)
}

/// Collect the sample names a `play` pattern refers to: text and bare words
/// that are not builtins, found through containers and modifiers.
fn scan_samples(node: &PatternNode, requests: &mut Vec<String>) {
    match &node.kind {
        NodeKind::Text(name) | NodeKind::Word(name) => {
            if !Builtin::is_builtin(name) && !requests.contains(name) {
                requests.push(name.clone());
            }
        }
        NodeKind::Container { children, .. } => {
            for child in children {
                scan_samples(child, requests);
            }
        }
        NodeKind::Modifier { inner, .. } => scan_samples(inner, requests),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorKind;
    use crate::dsl::token::SourceRange;
    use crate::pattern::{MathOp, ModifierKind};

    fn commit(source: &str) -> Program {
        compile_source(source, 120.0, Mode::Commit).unwrap()
    }

    fn numbers(node: &PatternNode) -> Vec<f64> {
        node.children()
            .iter()
            .map(|c| resolve(c, &Env::ZERO).as_number())
            .collect()
    }

    fn kind_of(node: &PatternNode) -> Option<ContainerKind> {
        match &node.kind {
            NodeKind::Container { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[test]
    fn implicit_sequence() {
        let program = commit("220 440 sine");
        assert_eq!(program.commands.len(), 1);
        let cmd = &program.commands[0];
        assert_eq!(cmd.waveform, Waveform::Sine);
        assert_eq!(kind_of(&cmd.pattern), Some(ContainerKind::Sequence));
        assert_eq!(numbers(&cmd.pattern), vec![220.0, 440.0]);
        assert!(cmd.pattern.ranges.is_empty());
        assert!(program.stack.is_empty());
    }

    #[test]
    fn single_value_is_not_wrapped() {
        let program = commit("440hz sine");
        let pattern = &program.commands[0].pattern;
        assert_eq!(pattern.kind, NodeKind::Number(440.0));
        assert_eq!(pattern.ranges, vec![SourceRange::new(0, 5)]);
    }

    #[test]
    fn render_on_empty_stack_is_noop() {
        assert!(commit("sine saw").commands.is_empty());
        assert!(commit("[ ( sine").commands.is_empty());
    }

    #[test]
    fn several_sounds() {
        let program = commit("110 saw 220 330 tri");
        let waves: Vec<_> = program.commands.iter().map(|c| c.waveform).collect();
        assert_eq!(waves, vec![Waveform::Saw, Waveform::Triangle]);
    }

    #[test]
    fn brackets_nest() {
        let program = commit("1 [ 2 < 3 4 > ] 5");
        assert_eq!(program.stack.len(), 3);
        let seq = &program.stack[1];
        assert_eq!(kind_of(seq), Some(ContainerKind::Sequence));
        assert_eq!(kind_of(&seq.children()[1]), Some(ContainerKind::Cycle));
    }

    #[test]
    fn unmatched_close_is_ignored() {
        let program = commit("1 2 ]");
        assert_eq!(program.stack.len(), 2);
    }

    #[test]
    fn close_drops_foreign_markers() {
        let program = commit("[ 1 ( 2 ]");
        assert_eq!(program.stack.len(), 1);
        assert_eq!(numbers(&program.stack[0]), vec![1.0, 2.0]);
    }

    #[test]
    fn empty_group() {
        let program = commit("( )");
        assert_eq!(kind_of(&program.stack[0]), Some(ContainerKind::Chord));
        assert!(program.stack[0].children().is_empty());
    }

    #[test]
    fn collect_words_take_whole_stack() {
        let program = commit("[ 1 2 3 cycle");
        assert_eq!(program.stack.len(), 1);
        assert_eq!(kind_of(&program.stack[0]), Some(ContainerKind::Cycle));
        assert_eq!(numbers(&program.stack[0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn stack_words() {
        let program = commit("1 2 swap");
        let swapped = PatternNode::container(ContainerKind::Sequence, program.stack);
        assert_eq!(numbers(&swapped), vec![2.0, 1.0]);
        assert_eq!(commit("1 dup").stack.len(), 2);
        assert_eq!(commit("1 2 drop").stack.len(), 1);
    }

    #[test]
    fn stack_words_underflow_is_noop() {
        assert!(commit("dup drop").stack.is_empty());
        assert_eq!(commit("1 swap").stack.len(), 1);
        assert_eq!(commit("1 vol").stack.len(), 1);
        assert_eq!(commit("1 speed").stack.len(), 1);
        assert_eq!(commit("+").stack.len(), 0);
        assert_eq!(commit("1 +").stack.len(), 1);
    }

    #[test]
    fn collect_seq_and_chord() {
        let program = commit("1 2 seq");
        assert_eq!(program.stack.len(), 1);
        assert_eq!(kind_of(&program.stack[0]), Some(ContainerKind::Sequence));
        assert_eq!(numbers(&program.stack[0]), vec![1.0, 2.0]);

        let program = commit("( 1 2 chord");
        assert_eq!(program.stack.len(), 1);
        assert_eq!(kind_of(&program.stack[0]), Some(ContainerKind::Chord));
        assert_eq!(numbers(&program.stack[0]), vec![1.0, 2.0]);
    }

    #[test]
    fn dup_makes_an_owned_copy() {
        let mut program = commit("< 1 2 > dup");
        program.stack[1].scale_gain(0.5);
        if let NodeKind::Container { children, .. } = &mut program.stack[1].kind {
            children.clear();
        }
        assert_eq!(program.stack[0].gain, None);
        assert_eq!(numbers(&program.stack[0]), vec![1.0, 2.0]);
    }

    #[test]
    fn dup_of_marker_pushes_marker() {
        let program = commit("[ dup 1 ] ]");
        assert_eq!(program.stack.len(), 1);
        assert_eq!(kind_of(&program.stack[0]), Some(ContainerKind::Sequence));
    }

    #[test]
    fn modifier_ranges() {
        let program = commit("440 2 speed");
        let node = &program.stack[0];
        assert!(matches!(node.kind, NodeKind::Modifier { kind: ModifierKind::Speed, .. }));
        assert_eq!(node.ranges, vec![SourceRange::new(6, 11), SourceRange::new(4, 5)]);
    }

    #[test]
    fn modifier_with_marker_is_noop() {
        let program = commit("440 [ vol");
        assert_eq!(program.stack.len(), 1);
        assert!(matches!(program.stack[0].kind, NodeKind::Number(_)));
    }

    #[test]
    fn gain_is_static() {
        let program = commit("440 0.5 gain 0.5 gain");
        assert_eq!(program.stack[0].gain, Some(0.25));
    }

    #[test]
    fn bpm_accepts_positive_numbers_only() {
        assert_eq!(commit("90 bpm").bpm, 90.0);
        assert_eq!(commit("0 bpm").bpm, 120.0);
        assert_eq!(commit("-5 bpm").bpm, 120.0);
        assert_eq!(commit("\"fast\" bpm").bpm, 120.0);
        assert_eq!(commit("bpm").bpm, 120.0);
        assert_eq!(commit("60 2 * bpm").bpm, 120.0);
        assert_eq!(commit("70 2 * bpm").bpm, 140.0);
    }

    #[test]
    fn operator_is_lazy() {
        let program = commit("beat 100 *");
        let node = &program.stack[0];
        assert!(matches!(node.kind, NodeKind::Operator { op: MathOp::Mul, .. }));
        let env = Env { beat: 3.0, ..Env::ZERO };
        assert_eq!(resolve(node, &env).as_number(), 300.0);
    }

    #[test]
    fn broadcast_either_side() {
        let program = commit("[ 1 2 3 ] 10 +");
        assert_eq!(numbers(&program.stack[0]), vec![11.0, 12.0, 13.0]);
        let program = commit("5 [ 1 2 ] +");
        assert_eq!(numbers(&program.stack[0]), vec![6.0, 7.0]);
        assert_eq!(kind_of(&program.stack[0]), Some(ContainerKind::Sequence));
    }

    #[test]
    fn operator_over_marker_is_degenerate() {
        let program = commit("1 [ +");
        assert_eq!(program.stack.len(), 1);
        assert!(resolve(&program.stack[0], &Env::ZERO).as_number().is_nan());
    }

    #[test]
    fn unknown_words_degrade_to_values() {
        let program = commit("foo 220 sine");
        assert_eq!(program.commands.len(), 1);
        let pattern = &program.commands[0].pattern;
        assert_eq!(pattern.children()[0].kind, NodeKind::Word("foo".into()));
    }

    #[test]
    fn quoted_text() {
        let program = commit("\"bd sn\" \"12\"");
        assert_eq!(program.stack[0].kind, NodeKind::Text("bd sn".into()));
        assert_eq!(program.stack[1].kind, NodeKind::Text("12".into()));
    }

    #[test]
    fn macros_expand() {
        let program = commit(": octave 2 * ; 220 octave octave");
        assert_eq!(resolve(&program.stack[0], &Env::ZERO).as_number(), 880.0);
    }

    #[test]
    fn nested_macros_and_later_tokens() {
        let program = commit(": a 1 ; : b a a + ; b 5");
        let values: Vec<f64> = program
            .stack
            .iter()
            .map(|n| resolve(n, &Env::ZERO).as_number())
            .collect();
        assert_eq!(values, vec![2.0, 5.0]);
    }

    #[test]
    fn macro_body_is_not_run_at_definition() {
        assert!(commit(": beep 440 sine ;").commands.is_empty());
        assert_eq!(commit(": beep 440 sine ; beep beep").commands.len(), 2);
    }

    #[test]
    fn builtins_win_over_macros() {
        let program = commit(": sine 1 ; 440 sine");
        assert_eq!(program.commands.len(), 1);
    }

    #[test]
    fn unterminated_definition_swallows_rest() {
        let program = commit("1 : loop 2 3");
        assert_eq!(program.stack.len(), 1);
    }

    #[test]
    fn recursive_macro_hits_depth_limit() {
        let err = compile_source(": loop loop ; loop", 120.0, Mode::Commit).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MacroDepth);
        assert_eq!(err.range, Some(SourceRange::new(7, 11)));
    }

    #[test]
    fn deep_brackets_hit_nesting_limit() {
        let n = 10_000;
        let source = format!("{}1{} sine", "[ ".repeat(n), " ]".repeat(n));
        let err = compile_source(&source, 120.0, Mode::Commit).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NestingDepth);
    }

    #[test]
    fn nesting_limit_is_inclusive() {
        let depth = MAX_NESTING_DEPTH - 1;
        let source = format!("{}1{}", "[ ".repeat(depth), " ]".repeat(depth));
        assert_eq!(commit(&source).stack[0].extent().depth, MAX_NESTING_DEPTH);
        let source = format!("{}1{}", "[ ".repeat(depth + 1), " ]".repeat(depth + 1));
        assert!(compile_source(&source, 120.0, Mode::Commit).is_err());
    }

    #[test]
    fn long_operator_chains_hit_nesting_limit() {
        let source = format!("t{}", " 1 +".repeat(1_000));
        let err = compile_source(&source, 120.0, Mode::Commit).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NestingDepth);

        let source = format!("1{}", " seq".repeat(1_000));
        let err = compile_source(&source, 120.0, Mode::Commit).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NestingDepth);
    }

    #[test]
    fn macro_fan_out_hits_expansion_limit() {
        let mut source = String::from(": m0 swap ;");
        for i in 1..=30 {
            source.push_str(&format!(" : m{i} m{p} m{p} ;", p = i - 1));
        }
        source.push_str(" 1 2 m30");
        let err = compile_source(&source, 120.0, Mode::Commit).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExpansionLimit);
    }

    #[test]
    fn doubling_values_hit_size_limit() {
        let source = format!("[ 1 2 ]{}", " dup seq".repeat(40));
        let err = compile_source(&source, 120.0, Mode::Commit).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PatternSize);

        let source = format!("[ 1 2 ] 200 *{}", " dup seq".repeat(8));
        let big = compile_source(&source, 120.0, Mode::Commit);
        assert!(big.is_ok());
    }

    #[test]
    fn broadcasting_two_large_containers_is_refused() {
        let wide = format!("[{} ]", " 1".repeat(1_000));
        let source = format!("{wide} {wide} +");
        let err = compile_source(&source, 120.0, Mode::Commit).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PatternSize);
    }

    #[test]
    fn play_requests_samples() {
        let program = commit("bd \"sn\" [ bd hh ] 0.5 vol play");
        assert_eq!(program.requests, vec!["bd", "sn", "hh"]);
    }

    #[test]
    fn play_skips_builtin_names_and_operands() {
        let program = commit("\"sine\" \"a\" \"b\" + play");
        assert!(program.requests.is_empty());
    }

    #[test]
    fn eval_mode_does_not_request() {
        let program = compile_source("bd play", 120.0, Mode::Eval).unwrap();
        assert_eq!(program.commands.len(), 1);
        assert!(program.requests.is_empty());
    }

    #[test]
    fn comments_are_skipped() {
        let program = commit("220 # 330 sine\n440 saw");
        assert_eq!(program.commands.len(), 1);
        assert_eq!(numbers(&program.commands[0].pattern), vec![220.0, 440.0]);
    }
}
