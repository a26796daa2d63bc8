use std::path::Path;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::machine::Fault;
use crate::symbol::Span;

// Preprocessor errors

pub fn preproc_failed_include(span: Span, src: &str, path: &str, e: std::io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "preproc::include",
        help = "the path is resolved relative to the working directory",
        labels = vec![LabeledSpan::at(span, "unreadable include")],
        "Failed to include `{path}`: {e}",
    )
    .with_source_code(src.to_string())
}

pub fn preproc_empty_define(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "preproc::define",
        help = "the syntax is `%define KEY VALUE`",
        labels = vec![LabeledSpan::at(span, "missing key and value")],
        "Expected a key and value after %define",
    )
    .with_source_code(src.to_string())
}

pub fn preproc_define_without_value(span: Span, src: &str, key: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "preproc::define",
        help = "the syntax is `%define KEY VALUE`",
        labels = vec![LabeledSpan::at(span, "missing value")],
        "Expected a value for %define of `{key}`",
    )
    .with_source_code(src.to_string())
}

pub fn preproc_duplicate_define(span: Span, src: &str, key: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "preproc::duplicate_define",
        help = "each key may only be defined once per run",
        labels = vec![LabeledSpan::at(span, "redefined here")],
        "Duplicate %define of `{key}`",
    )
    .with_source_code(src.to_string())
}

// Program builder errors

pub fn parse_unknown_opcode(span: Span, src: &str, mnemonic: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::unknown_opcode",
        help = "check the mnemonic table for the supported instruction set",
        labels = vec![LabeledSpan::at(span, "not a mnemonic")],
        "Unknown instruction `{mnemonic}`",
    )
    .with_source_code(src.to_string())
}

pub fn parse_arity(span: Span, src: &str, mnemonic: &str, expected: usize, found: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::arity",
        help = "check the number of operands allowed for this instruction",
        labels = vec![LabeledSpan::at(span, "wrong operand count")],
        "`{mnemonic}` expects {expected} operand(s), found {found}",
    )
    .with_source_code(src.to_string())
}

pub fn parse_unknown_identifier(span: Span, src: &str, token: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::operand",
        help = "operands are registers, integer literals, labels, or bracketed memory words",
        labels = vec![LabeledSpan::at(span, "unknown operand")],
        "`{token}` is not a register, literal, or known label",
    )
    .with_source_code(src.to_string())
}

pub fn parse_immutable_operand(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::operand",
        help = "this instruction writes its operand; use a register or a memory word",
        labels = vec![LabeledSpan::at(span, "read-only operand")],
        "Literals and labels cannot be written",
    )
    .with_source_code(src.to_string())
}

pub fn parse_duplicate_label(span: Span, src: &str, label: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::duplicate_label",
        help = "labels are only allowed once per file",
        labels = vec![LabeledSpan::at(span, "duplicate label")],
        "Duplicate label `{label}`",
    )
    .with_source_code(src.to_string())
}

// Driver errors

pub fn file_not_found(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "cli::open",
        help = "a bare name is also retried with a `.vm` extension",
        "File `{}` was not found, or does not exist",
        path.display(),
    )
}

// Runtime errors

pub fn runtime_fault(fault: Fault, at: i32, near: Option<(&str, usize)>) -> Report {
    let place = match near {
        Some((label, offset)) => format!(" (`{label}` + {offset})"),
        None => String::new(),
    };
    miette!(
        severity = Severity::Error,
        code = "runtime::fault",
        help = "the machine state is left as it was when the fault was raised",
        "{fault} at instruction {at}{place}",
    )
}

pub fn runtime_lost_eip(eip: i32) -> Report {
    miette!(
        severity = Severity::Error,
        code = "runtime::lost_eip",
        help = "jump targets must stay inside the instruction stream",
        "Instruction pointer {eip} is outside the program",
    )
}
