use assert_cmd::prelude::*;
use std::process::Command;

fn run_program(name: &str) -> std::process::Output {
    Command::cargo_bin("vesper")
        .unwrap()
        .arg("run")
        .arg(format!("tests/programs/{name}"))
        .output()
        .unwrap()
}

/// Run a program and compare stdout byte-for-byte: one integer per `prn`,
/// newline separated.
fn assert_prints(name: &str, expected: &[i32]) {
    let output = run_program(name);
    assert!(
        output.status.success(),
        "{name} exited with {:?}:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout)
        .unwrap()
        .replace("\r\n", "\n");
    let expected: String = expected.iter().map(|v| format!("{v}\n")).collect();
    assert_eq!(stdout, expected, "{name} printed unexpected output");
}

#[test]
fn runs_without_arguments() {
    let mut cmd = Command::cargo_bin("vesper").unwrap();
    cmd.assert().success();
}

#[test]
fn prints_a_register() {
    assert_prints("print.vm", &[1]);
}

#[test]
fn pushes_and_pops() {
    assert_prints("stack.vm", &[2]);
}

#[test]
fn exposes_flags_through_the_stack() {
    assert_prints("flags.vm", &[1, 0, 2]);
}

#[test]
fn calls_and_returns() {
    assert_prints("calls.vm", &[10, 11]);
}

#[test]
fn mod_then_rem() {
    assert_prints("modrem.vm", &[2]);
}

#[test]
fn full_instruction_sweep() {
    assert_prints(
        "instructions.vm",
        &[
            1, 2, 1, 10, 6, 18, 3, 3, 1, -13, 0, 6, 2, 32, 8, 2147483644, 6, 5, 1, 0, 2, 77, 100,
            103, 105, 111, 112, 114, 121, 123, 124, 130, 133, 134, 141, 142, 145, 150, 152, 155,
            10, 11,
        ],
    );
}

#[test]
fn factorials() {
    assert_prints(
        "fact.vm",
        &[1, 2, 6, 24, 120, 720, 5040, 40320, 362880, 3628800],
    );
}

#[test]
fn literal_and_memory_operands() {
    assert_prints("operands.vm", &[16, 32, 298, 5, 5, -16, -5, 42, 99, 7, 42]);
}

#[test]
fn execution_begins_at_the_start_label() {
    assert_prints("start.vm", &[2]);
}

#[test]
fn defines_substitute_into_the_token_stream() {
    assert_prints("defines.vm", &[3]);
}

#[test]
fn includes_splice_other_files() {
    assert_prints("include.vm", &[10]);
}

#[test]
fn bare_path_runs_like_the_run_subcommand() {
    Command::cargo_bin("vesper")
        .unwrap()
        .arg("tests/programs/print.vm")
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn vm_extension_is_implicit() {
    Command::cargo_bin("vesper")
        .unwrap()
        .arg("run")
        .arg("tests/programs/print")
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn check_assembles_without_running() {
    Command::cargo_bin("vesper")
        .unwrap()
        .arg("check")
        .arg("tests/programs/instructions.vm")
        .assert()
        .success()
        .stdout("");
}

#[test]
fn check_reports_parse_errors() {
    Command::cargo_bin("vesper")
        .unwrap()
        .arg("check")
        .arg("tests/programs/bad_opcode.vm")
        .assert()
        .failure();
}

#[test]
fn unknown_instruction_fails_before_running() {
    let output = run_program("bad_opcode.vm");
    assert!(!output.status.success());
    // Nothing may execute when assembly fails
    assert!(output.stdout.is_empty());
}

#[test]
fn division_by_zero_is_a_runtime_failure() {
    let output = run_program("divzero.vm");
    assert!(!output.status.success());
}

#[test]
fn missing_file_fails() {
    Command::cargo_bin("vesper")
        .unwrap()
        .arg("run")
        .arg("tests/programs/no_such_program.vm")
        .assert()
        .failure();
}
