// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests for the `sfi-validate` binary
//!
//! Code is written to temporary files, either raw or wrapped in an ELF object
//! built with `object`'s writer, and the binary's exit status and stderr are
//! checked.

use std::{
    path::Path,
    process::{Command, Output},
};

use indoc::indoc;
use object::{Architecture, BinaryFormat, Endianness, SectionKind, write};
use tempfile::TempDir;

const NOP: u32 = 0xe320f000;

fn arm_code(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

fn x86_code(bytes: &[u8]) -> Vec<u8> {
    let mut code = bytes.to_vec();
    code.resize(code.len().next_multiple_of(32), 0x90);
    code
}

/// Wraps `code` in a relocatable ELF object as its `.text` section
fn elf(architecture: Architecture, code: &[u8]) -> Vec<u8> {
    let mut object = write::Object::new(BinaryFormat::Elf, architecture, Endianness::Little);
    let text = object.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    object.append_section_data(text, code, 32);
    object.write().expect("failed to write object")
}

fn run(dir: &TempDir, contents: &[u8], args: &[&str]) -> Output {
    let path = dir.path().join("code.bin");
    std::fs::write(&path, contents).expect("failed to write code");
    run_path(&path, args)
}

fn run_path(path: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sfi-validate"))
        .args(args)
        .arg(path)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run sfi-validate")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_accepts_raw_arm_code() {
    let dir = TempDir::new().expect("failed to create temp dir");
    // bic r1, r1, #0xc0000000 / ldr r0, [r1] / nop / nop
    let code = arm_code(&[0xe3c11103, 0xe5910000, NOP, NOP]);
    let output = run(&dir, &code, &["--arch", "arm", "--base", "0x20000"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stderr(&output), "accepted\n");
}

#[test]
fn test_reports_bad_jump_target() {
    let dir = TempDir::new().expect("failed to create temp dir");
    // jmp .+3 into mov eax, 1
    let code = x86_code(&[0xeb, 0x01, 0xb8, 0x01, 0x00, 0x00, 0x00]);
    let output = run(&dir, &code, &["--arch", "x86-32", "--base", "0x1000"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stderr(&output),
        indoc! {"
            0x00001000: bad jump target: jump into middle of instruction; 0x00001000 [eb 01]
            rejected: 1 SFI violation(s)
        "}
    );
}

#[test]
fn test_collect_all() {
    let dir = TempDir::new().expect("failed to create temp dir");
    // ldr r0, [r1] / nop / nop / str r0, [r2]
    let code = arm_code(&[0xe5910000, NOP, NOP, 0xe5820000]);

    let output = run(&dir, &code, &["--arch", "arm"]);
    assert_eq!(output.status.code(), Some(1));
    let text = stderr(&output);
    assert_eq!(text.lines().count(), 2, "{text}");
    assert!(text.starts_with("0x00000000: unsafe load/store: "), "{text}");

    let output = run(&dir, &code, &["--arch", "arm", "--collect-all"]);
    let text = stderr(&output);
    let violations: Vec<&str> = text.lines().filter(|line| line.starts_with("0x")).collect();
    assert_eq!(violations.len(), 2, "{text}");
    assert!(violations[1].starts_with("0x0000000c: unsafe load/store: "), "{text}");
    assert!(text.ends_with("rejected: 2 SFI violation(s)\n"), "{text}");
}

#[test]
fn test_elf_arm_object() {
    let dir = TempDir::new().expect("failed to create temp dir");
    // nop / nop / svc #0 / nop
    let object = elf(Architecture::Arm, &arm_code(&[NOP, NOP, 0xef000000, NOP]));
    let output = run(&dir, &object, &[]);
    assert_eq!(output.status.code(), Some(1));
    let text = stderr(&output);
    assert!(text.contains("0x00000008: forbidden instruction: "), "{text}");
    assert!(text.contains("rejected: unsafe instruction at 0x8"), "{text}");

    let object = elf(Architecture::Arm, &arm_code(&[NOP; 8]));
    assert!(run(&dir, &object, &[]).status.success());
}

#[test]
fn test_elf_x86_object() {
    let dir = TempDir::new().expect("failed to create temp dir");
    // and eax, -32 / jmp eax
    let object = elf(Architecture::I386, &x86_code(&[0x83, 0xe0, 0xe0, 0xff, 0xe0]));
    let output = run(&dir, &object, &[]);
    assert!(output.status.success(), "{}", stderr(&output));

    // the same code checked against the ARM rules
    let output = run(&dir, &object, &["--arch", "arm"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_usage_errors() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let code = arm_code(&[NOP; 4]);

    let output = run(&dir, &code, &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("pass --arch"));

    let output = run(&dir, &code, &["--arch", "arm", "--base", "0x10004"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("rejected: base address 0x10004"));

    let output = run(&dir, &code, &["--arch", "arm", "--bundle-size", "12"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("not a power of two"));

    let output = run_path(&dir.path().join("missing.bin"), &["--arch", "arm"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("Failed to read"));
}
