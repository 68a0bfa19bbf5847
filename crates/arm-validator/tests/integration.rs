// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use arm_validator::{
    DecodedInstruction, Instruction, InstructionClass, ScanState, check_pair, decode,
    valid_instruction_starts, validate,
};
use sfi_core::{
    FailurePolicy, Problem, Register, RegisterList, SafetyLevel, SfiConfig, ValidationError,
    ValidationReport, Violation, ViolationSet,
};

const NOP: u32 = 0xe320f000;
const BASE: u32 = 0x20000;

fn code(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

fn run(words: &[u32], config: &SfiConfig) -> ValidationReport {
    let code = code(words);
    ValidationReport::collect(|on_violation| validate(&code, BASE, config, on_violation))
}

fn collect_all() -> SfiConfig {
    SfiConfig::arm().with_failure_policy(FailurePolicy::CollectAll)
}

/// Small deterministic generator for sampling instruction words
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 32) as u32
    }
}

#[test]
fn test_dispatch_is_total() {
    let mut rng = Lcg(0x5f1);
    let edges = [0, u32::MAX, 0xe000_0000, 0xf000_0000, 0x0fff_ffff, 0xe7f0_00f0];
    let samples = (0..50_000).map(|_| rng.next()).chain(edges);
    for word in samples {
        let inst = DecodedInstruction::new(0, Instruction::new(word));
        let safety = inst.safety();
        assert!(safety.is_safe() || SafetyLevel::UNSAFE_LEVELS.contains(&safety));
        // every predicate answers without panicking
        let _ = (inst.defs(), inst.uses(), inst.base_address_register());
        let _ = (inst.branch_target_register(), inst.branch_target());
        let _ = inst.clears_bits(0xc000_0000);
    }
}

#[test]
fn test_unmodelled_words_are_conservative() {
    let mut rng = Lcg(7);
    let mut fallbacks = 0;
    for _ in 0..50_000 {
        let word = rng.next();
        let decoder = decode(Instruction::new(word));
        if let InstructionClass::Unsafe(level) = decoder.class() {
            fallbacks += 1;
            assert!(!level.is_safe(), "{} at {word:#010x}", decoder.name());
            assert_eq!(decoder.defs(Instruction::new(word)), RegisterList::EVERYTHING);
        }
    }
    assert!(fallbacks > 0);
}

#[test]
fn test_masked_load_in_one_bundle() {
    // bic r1, r1, #0xc0000000 / ldr r0, [r1]
    let first = DecodedInstruction::new(BASE, Instruction::new(0xe3c11103));
    let second = DecodedInstruction::new(BASE + 4, Instruction::new(0xe5910000));
    let mut state = ScanState::default();
    let violations = check_pair(&first, &second, &SfiConfig::arm(), &mut state);
    assert!(violations.is_empty(), "{violations:?}");
    assert!(state.critical.contains(BASE + 4));

    // and r1, r1, #0xff000000 keeps the top bits
    let first = DecodedInstruction::new(BASE, Instruction::new(0xe20114ff));
    let violations = check_pair(&first, &second, &SfiConfig::arm(), &mut ScanState::default());
    assert_eq!(violations, ViolationSet::LOAD_STORE);
}

#[test]
fn test_and_mask_clears_data_bits() {
    // and r1, r1, #0xff / ldr r0, [r1]
    let report = run(&[0xe20110ff, 0xe5910000, NOP, NOP], &SfiConfig::arm());
    assert!(report.is_ok(), "{:?}", report.entries());
}

#[test]
fn test_masked_load_across_bundles() {
    // nop x3 / bic r1, r1, #0xc0000000 / ldr r0, [r1] / nop x3
    let words = [NOP, NOP, NOP, 0xe3c11103, 0xe5910000, NOP, NOP, NOP];
    let report = run(&words, &collect_all());
    assert_eq!(
        report.violations().collect::<Vec<_>>(),
        vec![Violation::LoadStoreCrossesBundle]
    );
    let entry = &report.entries()[0];
    assert_eq!(entry.address, BASE + 0x10);
    let context = entry.context.as_ref().unwrap();
    assert_eq!(context.problem, Problem::UnsafeLoadStore);
    assert_eq!(context.instructions.len(), 2);
    assert!(matches!(
        report.verdict(),
        Some(ValidationError::Violations { count: 1 })
    ));
}

#[test]
fn test_unmasked_load() {
    // nop / ldr r0, [r1] / nop / nop
    let words = [NOP, 0xe5910000, NOP, NOP];
    let report = run(&words, &collect_all());
    assert_eq!(
        report.violations().collect::<Vec<_>>(),
        vec![Violation::LoadStore]
    );
    let starts = valid_instruction_starts(&code(&[NOP, NOP, NOP, NOP]), BASE, &SfiConfig::arm());
    assert_eq!(starts.unwrap().len(), 4);
}

#[test]
fn test_read_only_register() {
    let config = collect_all();
    // mov r9, r0 / ldr r9, [r0] / add r9, r9, #1
    for word in [0xe1a09000u32, 0xe5909000, 0xe2899001] {
        let report = run(&[NOP, word, NOP, NOP], &config);
        assert!(
            report.violations().any(|v| v == Violation::ReadOnly),
            "{word:#010x}: {:?}",
            report.entries()
        );
        let entry = report
            .entries()
            .iter()
            .find(|entry| entry.violation == Violation::ReadOnly)
            .unwrap();
        let context = entry.context.as_ref().unwrap();
        assert_eq!(context.registers, RegisterList::single(Register::TP));
    }
}

#[test]
fn test_call_position() {
    // bl in the second slot
    let report = run(&[NOP, 0xeb00003e, NOP, NOP], &SfiConfig::arm());
    assert_eq!(
        report.violations().collect::<Vec<_>>(),
        vec![Violation::CallPosition]
    );
    // bl .+0x104 in the last slot lands on a bundle head
    assert!(run(&[NOP, NOP, NOP, 0xeb00003f], &SfiConfig::arm()).is_ok());
    // blx r2 in the last slot after bic r2, r2, #0xc000000f
    assert!(run(&[NOP, NOP, 0xe3c222fc, 0xe12fff32], &SfiConfig::arm()).is_ok());
}

#[test]
fn test_validation_is_idempotent() {
    let mut rng = Lcg(42);
    let words: Vec<u32> = (0..64).map(|_| rng.next()).collect();
    let config = collect_all();
    let first = run(&words, &config);
    let second = run(&words, &config);
    assert_eq!(first, second);
    assert!(!first.is_ok());
}

#[test]
fn test_literal_pool_hides_data() {
    // bkpt #0x7777 / data / data / data / b .-0xc into the pool
    let words = [0xe1277777, 0xdeadbeef, 0x12345678, 0xffffffff, 0xeafffffb, NOP, NOP, NOP];
    let report = run(&words, &SfiConfig::arm());
    assert_eq!(
        report.violations().collect::<Vec<_>>(),
        vec![Violation::BranchSplitsPattern]
    );
    assert_eq!(report.entries()[0].address, BASE + 0x10);
}

#[test]
fn test_literal_pool_only_at_bundle_head() {
    // nop / bkpt #0x7777 / svc #0 / nop: the svc is still decoded
    let report = run(&[NOP, 0xe1277777, 0xef000000, NOP], &SfiConfig::arm());
    assert!(matches!(
        report.verdict(),
        Some(ValidationError::UnsafeInstruction {
            address,
            safety: SafetyLevel::Forbidden,
        }) if *address == BASE + 8
    ));
}

#[test]
fn test_diagnostics_quote_disassembly() {
    let report = run(&[NOP, 0xe5910000, NOP, NOP], &SfiConfig::arm());
    let context = report.entries()[0].context.as_ref().unwrap();
    let text = context.to_string();
    assert!(text.starts_with("load/store base register not masked"), "{text}");
    assert!(text.contains("{r1}"), "{text}");
    assert!(text.to_lowercase().contains("ldr"), "{text}");
}
