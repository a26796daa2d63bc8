use std::num::ParseIntError;

use fxhash::FxHashMap;
use miette::Result;

use crate::error;
use crate::lexer::{Line, Token};
use crate::symbol::{parse_register, ArgKind, Op, Register};

/// A memory-word address, resolved against machine state at access time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemAddr {
    /// `[N]`: absolute byte address.
    Absolute(i32),
    /// `[reg]`, `[reg+N]`, `[reg-N]`: byte address computed from a register
    /// at execution time.
    Based(Register, i32),
}

/// A bound operand slot: a handle to an int-valued location.
///
/// Registers and memory words are mutable through [`Machine`]; `Value` holds
/// immediates and resolved label targets and is read-only, which the builder
/// enforces for written operand positions.
///
/// [`Machine`]: crate::machine::Machine
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    Register(Register),
    Value(i32),
    Word(MemAddr),
}

/// An executable program: parallel opcode and operand arrays plus the label
/// table kept for diagnostics.
///
/// The opcode stream always ends with the [`Op::Halt`] sentinel, so `eip`
/// values in `0..len()` are the only ones the executor will touch.
#[derive(Debug)]
pub struct Program {
    ops: Vec<Op>,
    args: Vec<Vec<Operand>>,
    start: usize,
    labels: FxHashMap<String, usize>,
}

impl Program {
    /// Two-pass build over tokenized lines: resolve label addresses, then
    /// bind every operand.
    pub fn build(lines: &[Line], src: &str) -> Result<Program> {
        let labels = resolve_labels(lines, src)?;

        let mut ops = Vec::new();
        let mut args = Vec::new();
        for line in lines {
            let rest = skip_label_defs(&line.tokens);
            let Some((mnemonic, operands)) = rest.split_first() else {
                continue;
            };

            let op = Op::from_mnemonic(&mnemonic.text)
                .ok_or_else(|| error::parse_unknown_opcode(mnemonic.span, src, &mnemonic.text))?;

            let signature = op.signature();
            if operands.len() != signature.len() {
                return Err(error::parse_arity(
                    mnemonic.span,
                    src,
                    op.mnemonic(),
                    signature.len(),
                    operands.len(),
                ));
            }

            let mut bound = Vec::with_capacity(signature.len());
            for (token, kind) in operands.iter().zip(signature) {
                bound.push(bind_operand(token, *kind, &labels, src)?);
            }

            ops.push(op);
            args.push(bound);
        }

        // Terminal sentinel
        ops.push(Op::Halt);
        args.push(Vec::new());

        let start = labels.get("start").copied().unwrap_or(0);
        Ok(Program {
            ops,
            args,
            start,
            labels,
        })
    }

    /// Instruction count, sentinel included.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        // The sentinel is always present
        self.ops.len() == 1
    }

    pub fn op(&self, index: usize) -> Op {
        self.ops[index]
    }

    pub fn args(&self, index: usize) -> &[Operand] {
        &self.args[index]
    }

    /// Entry point: the `start` label when defined, 0 otherwise.
    pub fn start(&self) -> usize {
        self.start
    }

    /// The label covering an instruction index, for fault reports: the
    /// nearest definition at or before the index, with the distance past it.
    /// Ties between labels on the same instruction go to the last name.
    pub fn enclosing_label(&self, index: usize) -> Option<(&str, usize)> {
        self.labels
            .iter()
            .filter(|&(_, &ix)| ix <= index)
            .max_by_key(|&(name, &ix)| (ix, name))
            .map(|(name, &ix)| (name.as_str(), index - ix))
    }
}

/// Pass 1: map every label to the index of the instruction that follows it.
///
/// A line may carry several label tokens before its instruction; a line with
/// only labels attaches them to the next instruction-bearing line.
fn resolve_labels(lines: &[Line], src: &str) -> Result<FxHashMap<String, usize>> {
    let mut labels = FxHashMap::default();
    let mut index = 0;

    for line in lines {
        for token in &line.tokens {
            match label_def(&token.text) {
                Some(name) => {
                    if labels.insert(name.to_string(), index).is_some() {
                        return Err(error::parse_duplicate_label(token.span, src, name));
                    }
                }
                None => {
                    index += 1;
                    break;
                }
            }
        }
    }

    Ok(labels)
}

fn skip_label_defs(tokens: &[Token]) -> &[Token] {
    let defs = tokens
        .iter()
        .take_while(|tok| label_def(&tok.text).is_some())
        .count();
    &tokens[defs..]
}

/// Returns the label name for tokens of the form `name:`.
fn label_def(token: &str) -> Option<&str> {
    let name = token.strip_suffix(':')?;
    is_valid_label(name).then_some(name)
}

fn is_valid_label(s: &str) -> bool {
    fn is_valid_first_char(c: char) -> bool {
        matches!(c, '$' | '@' | '_' | 'A'..='Z' | 'a'..='z')
    }

    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            is_valid_first_char(first) && chars.all(|c| c.is_ascii_digit() || is_valid_first_char(c))
        }
        None => false,
    }
}

/// Parse an integer literal in any of the accepted radix spellings:
/// decimal, `0x` hex, `NNh`/`NN|h` hex, and `NNb`/`NN|b` binary, each with
/// an optional leading `-`.
pub fn parse_value(text: &str) -> Result<i32, ParseIntError> {
    if let Some(hex) = text.strip_prefix("0x") {
        i32::from_str_radix(hex, 16)
    } else if let Some(hex) = text.strip_prefix("-0x") {
        i32::from_str_radix(hex, 16).map(|v| -v)
    } else if let Some(hex) = text.strip_suffix("|h").or_else(|| text.strip_suffix('h')) {
        i32::from_str_radix(hex, 16)
    } else if let Some(bin) = text.strip_suffix("|b").or_else(|| text.strip_suffix('b')) {
        i32::from_str_radix(bin, 2)
    } else {
        text.parse()
    }
}

/// Pass 2 operand classification: register, memory word, integer literal,
/// or label, in that order.
fn bind_operand(
    token: &Token,
    kind: ArgKind,
    labels: &FxHashMap<String, usize>,
    src: &str,
) -> Result<Operand> {
    let text = token.text.as_str();

    if let Some(reg) = parse_register(text) {
        return Ok(Operand::Register(reg));
    }

    if let Some(inner) = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .filter(|t| !t.is_empty())
    {
        return parse_mem(inner)
            .map(Operand::Word)
            .ok_or_else(|| error::parse_unknown_identifier(token.span, src, text));
    }

    if let Ok(value) = parse_value(text) {
        return match kind {
            ArgKind::Source => Ok(Operand::Value(value)),
            ArgKind::Target => Err(error::parse_immutable_operand(token.span, src)),
        };
    }

    if is_valid_label(text) {
        if kind == ArgKind::Target {
            return Err(error::parse_immutable_operand(token.span, src));
        }
        return match labels.get(text) {
            Some(index) => Ok(Operand::Value(*index as i32)),
            None => Err(error::parse_unknown_identifier(token.span, src, text)),
        };
    }

    Err(error::parse_unknown_identifier(token.span, src, text))
}

fn parse_mem(inner: &str) -> Option<MemAddr> {
    let inner = inner.trim();
    if let Some(reg) = parse_register(inner) {
        return Some(MemAddr::Based(reg, 0));
    }

    // `reg+N` / `reg-N`; the sign stays attached to the offset
    if let Some(split) = inner.find(['+', '-']).filter(|ix| *ix > 0) {
        let (base, offset) = inner.split_at(split);
        if let Some(reg) = parse_register(base.trim_end()) {
            let offset = parse_value(offset).ok()?;
            return Some(MemAddr::Based(reg, offset));
        }
        return None;
    }

    match parse_value(inner) {
        Ok(addr) if addr >= 0 => Some(MemAddr::Absolute(addr)),
        _ => None,
    }
}
