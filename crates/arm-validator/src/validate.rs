// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Linear scan over a code region
//!
//! Every instruction is checked against its predecessor, then the recorded
//! relative branches are checked against the addresses the scan marked as
//! critical.

use std::ops::ControlFlow;

use log::{debug, trace, warn};
use sfi_core::{
    AddressSet, DiagnosticContext, FailurePolicy, Problem, SafetyLevel, SfiConfig,
    ValidationError, Violation,
};

use crate::rules::{self, ScanState};
use crate::{DecodeError, DecodedInstruction, Instruction};

/// `nop`, standing in for the neighbours outside the region
const NOP: Instruction = Instruction::new(0xe320_f000);

/// Splits code into little-endian words, addressed from zero
pub fn decode_instructions(code: &[u8]) -> Result<Vec<DecodedInstruction>, DecodeError> {
    if code.len() % 4 != 0 {
        return Err(DecodeError::UnalignedCode { size: code.len() });
    }
    Ok(decode_words(code, 0))
}

fn decode_words(code: &[u8], base_address: u32) -> Vec<DecodedInstruction> {
    code.chunks_exact(4)
        .zip((0u32..).step_by(4))
        .map(|(word, offset)| {
            let inst = Instruction::from_le_bytes([word[0], word[1], word[2], word[3]]);
            DecodedInstruction::new(base_address.wrapping_add(offset), inst)
        })
        .collect()
}

/// Validates `code` loaded at `base_address`.
///
/// Every violation is passed to `on_violation` with the address it was found
/// at. Returns `Ok(())` if the code is safe to run in the sandbox.
pub fn validate<F>(
    code: &[u8],
    base_address: u32,
    config: &SfiConfig,
    on_violation: F,
) -> Result<(), ValidationError>
where
    F: FnMut(u32, Violation, Option<DiagnosticContext>),
{
    let words = prepare(code, base_address, config)?;
    let mut scan = Scan::new(base_address, code.len(), config, on_violation);
    scan.run(&words);
    scan.verdict()
}

/// Addresses where execution may safely begin: every instruction of
/// accepted code except the second halves of masking pairs and literal pool
/// data.
pub fn valid_instruction_starts(
    code: &[u8],
    base_address: u32,
    config: &SfiConfig,
) -> Result<AddressSet, ValidationError> {
    let words = prepare(code, base_address, config)?;
    let mut scan = Scan::new(base_address, code.len(), config, |_, _, _| {});
    scan.run(&words);
    scan.verdict()?;
    Ok(words
        .iter()
        .map(DecodedInstruction::addr)
        .filter(|address| !scan.state.critical.contains(*address))
        .collect())
}

fn prepare(
    code: &[u8],
    base_address: u32,
    config: &SfiConfig,
) -> Result<Vec<DecodedInstruction>, ValidationError> {
    debug!(
        "validating {:#x} bytes of arm code at {base_address:#x} (bundle size {})",
        code.len(),
        config.bundle_size()
    );
    config.check_region(base_address, code.len())?;
    Ok(decode_words(code, base_address))
}

struct Scan<'a, F> {
    config: &'a SfiConfig,
    base: u32,
    size: usize,
    state: ScanState,
    reported: usize,
    first_unsafe: Option<(u32, SafetyLevel)>,
    on_violation: F,
}

impl<'a, F> Scan<'a, F>
where
    F: FnMut(u32, Violation, Option<DiagnosticContext>),
{
    fn new(base: u32, size: usize, config: &'a SfiConfig, on_violation: F) -> Self {
        Scan {
            config,
            base,
            size,
            state: ScanState::default(),
            reported: 0,
            first_unsafe: None,
            on_violation,
        }
    }

    fn run(&mut self, words: &[DecodedInstruction]) {
        let outcome = match self.scan_pairs(words) {
            ControlFlow::Continue(()) => self.check_branches(words),
            stop => stop,
        };
        if outcome.is_break() {
            debug!("stopped after the first violation");
        }
    }

    fn scan_pairs(&mut self, words: &[DecodedInstruction]) -> ControlFlow<()> {
        let mut previous = DecodedInstruction::new(self.base.wrapping_sub(4), NOP);
        let mut index = 0;
        while let Some(current) = words.get(index) {
            trace!(
                "{:#010x}: {} {}",
                current.addr(),
                current.inst(),
                current.decoder().name()
            );
            self.check_pair(&previous, current)?;
            index += 1;

            if current.is_literal_pool_head() && self.config.is_bundle_head(current.addr()) {
                let pool = self.config.bundle_for_address(current.addr());
                while let Some(data) = words.get(index).filter(|word| pool.contains(word.addr())) {
                    self.state.critical.add(data.addr());
                    index += 1;
                }
            }
            previous = *current;
        }

        // Whatever the last instruction did to a data register is seen by code
        // outside the region.
        let successor =
            DecodedInstruction::new(self.base.wrapping_add(self.size as u32), NOP);
        let violations = rules::check_data_register_update(
            &previous,
            &successor,
            self.config,
            &mut self.state.critical,
        );
        for violation in violations.violations() {
            let (address, context) = rules::diagnose(violation, &previous, &successor, self.config);
            self.report(address, violation, context)?;
        }
        ControlFlow::Continue(())
    }

    fn check_pair(
        &mut self,
        first: &DecodedInstruction,
        second: &DecodedInstruction,
    ) -> ControlFlow<()> {
        let violations = rules::check_pair(first, second, self.config, &mut self.state);
        for violation in violations.violations() {
            if violation.is_safety() && self.first_unsafe.is_none() {
                self.first_unsafe = Some((second.addr(), second.safety()));
            }
            let (address, context) = rules::diagnose(violation, first, second, self.config);
            self.report(address, violation, context)?;
        }
        ControlFlow::Continue(())
    }

    /// Relative branches may not land on a critical address, and may only
    /// leave the region for a bundle head.
    fn check_branches(&mut self, words: &[DecodedInstruction]) -> ControlFlow<()> {
        let branches: Vec<u32> = self.state.branches.iter().collect();
        for address in branches {
            let index = (address.wrapping_sub(self.base) / 4) as usize;
            let Some(branch) = words.get(index) else {
                continue;
            };
            let target = branch.branch_target();
            let (violation, problem) = if self.in_region(target) {
                if !self.state.critical.contains(target) {
                    continue;
                }
                (Violation::BranchSplitsPattern, Problem::BranchSplitsPattern)
            } else if !self.config.is_bundle_head(target) {
                (
                    Violation::BranchInvalidDestination,
                    Problem::BranchInvalidDestination,
                )
            } else {
                continue;
            };
            let context = DiagnosticContext::new(problem).with_instruction(branch.text());
            self.report(address, violation, context)?;
        }
        ControlFlow::Continue(())
    }

    fn in_region(&self, address: u32) -> bool {
        (address.wrapping_sub(self.base) as usize) < self.size
    }

    fn report(
        &mut self,
        address: u32,
        violation: Violation,
        context: DiagnosticContext,
    ) -> ControlFlow<()> {
        trace!("{address:#010x}: {violation}: {context}");
        (self.on_violation)(address, violation, Some(context));
        self.reported += 1;
        match self.config.failure_policy() {
            FailurePolicy::AbortOnFirst => ControlFlow::Break(()),
            FailurePolicy::CollectAll => ControlFlow::Continue(()),
        }
    }

    fn verdict(&self) -> Result<(), ValidationError> {
        if let Some((address, safety)) = self.first_unsafe {
            warn!("unsafe instruction at {address:#x}: {safety}");
            return Err(ValidationError::UnsafeInstruction { address, safety });
        }
        if self.reported > 0 {
            debug!("rejected with {} violation(s)", self.reported);
            return Err(ValidationError::Violations {
                count: self.reported,
            });
        }
        debug!("accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sfi_core::{FailurePolicy, SfiConfig, ValidationError, ValidationReport, Violation};

    use super::{decode_instructions, valid_instruction_starts, validate};
    use crate::DecodeError;

    const NOP: u32 = 0xe320f000;

    fn code(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    fn report(words: &[u32], config: &SfiConfig) -> ValidationReport {
        let code = code(words);
        ValidationReport::collect(|on_violation| validate(&code, 0x1000, config, on_violation))
    }

    #[test]
    fn test_decode_instructions() {
        let instructions = decode_instructions(&code(&[NOP, 0xe5910000])).unwrap();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[1].addr(), 4);
        assert!(matches!(
            decode_instructions(&[0, 0, 0]),
            Err(DecodeError::UnalignedCode { size: 3 })
        ));
    }

    #[test]
    fn test_accepts_nops() {
        assert!(report(&[NOP; 8], &SfiConfig::arm()).is_ok());
    }

    #[test]
    fn test_rejects_bad_regions() {
        let config = SfiConfig::arm();
        assert!(matches!(
            validate(&code(&[NOP; 3]), 0x1000, &config, |_, _, _| {}),
            Err(ValidationError::UnalignedCode { size: 12, .. })
        ));
        assert!(matches!(
            validate(&code(&[NOP; 4]), 0x1008, &config, |_, _, _| {}),
            Err(ValidationError::UnalignedBase { base: 0x1008, .. })
        ));
    }

    #[test]
    fn test_unsafe_instruction_is_fatal() {
        // nop / svc #0 / nop / nop
        let report = report(&[NOP, 0xef000000, NOP, NOP], &SfiConfig::arm());
        assert!(matches!(
            report.verdict(),
            Some(ValidationError::UnsafeInstruction { address: 0x1004, .. })
        ));
        assert_eq!(report.entries().len(), 1);
        assert_eq!(report.entries()[0].violation, Violation::ForbiddenSafety);
    }

    #[test]
    fn test_abort_on_first() {
        // ldr r0, [r1] / ldr r0, [r2] / nop / nop
        let words = [0xe5910000, 0xe5920000, NOP, NOP];
        let report_first = report(&words, &SfiConfig::arm());
        assert_eq!(report_first.entries().len(), 1);
        assert!(matches!(
            report_first.verdict(),
            Some(ValidationError::Violations { count: 1 })
        ));

        let config = SfiConfig::arm().with_failure_policy(FailurePolicy::CollectAll);
        let report_all = report(&words, &config);
        assert_eq!(report_all.entries().len(), 2);
        assert_eq!(report_all.entries()[1].address, 0x1004);
    }

    #[test]
    fn test_trailing_data_register_update() {
        // nop / nop / nop / add sp, sp, r1
        let report = report(&[NOP, NOP, NOP, 0xe08dd001], &SfiConfig::arm());
        assert_eq!(
            report.violations().collect::<Vec<_>>(),
            vec![Violation::DataRegisterUpdate]
        );
        assert_eq!(report.entries()[0].address, 0x100c);
    }

    #[test]
    fn test_literal_pool_is_skipped() {
        // bkpt #0x7777 / three data words that would not validate
        let words = [0xe1277777, 0xef000000, 0xffffffff, 0xe5910000, NOP, NOP, NOP, NOP];
        let code = code(&words);
        let config = SfiConfig::arm();
        assert!(validate(&code, 0x1000, &config, |_, _, _| {}).is_ok());
        let starts = valid_instruction_starts(&code, 0x1000, &config).unwrap();
        assert_eq!(
            starts.iter().collect::<Vec<_>>(),
            vec![0x1000, 0x1010, 0x1014, 0x1018, 0x101c]
        );
    }

    #[test]
    fn test_branch_into_masking_pair() {
        // b .+8 (to the ldr) / bic r1, r1, #0xc0000000 / ldr r0, [r1] / nop
        let words = [0xea000000, 0xe3c11103, 0xe5910000, NOP];
        let report = report(&words, &SfiConfig::arm());
        assert_eq!(
            report.violations().collect::<Vec<_>>(),
            vec![Violation::BranchSplitsPattern]
        );
        assert_eq!(report.entries()[0].address, 0x1000);
    }

    #[test]
    fn test_branch_out_of_region() {
        // b .+0x104 lands mid-bundle outside the region
        let report = report(&[0xea00003f, NOP, NOP, NOP], &SfiConfig::arm());
        assert_eq!(
            report.violations().collect::<Vec<_>>(),
            vec![Violation::BranchInvalidDestination]
        );
        // b .+0x100 lands on a bundle head
        assert!(self::report(&[0xea00003e, NOP, NOP, NOP], &SfiConfig::arm()).is_ok());
    }

    #[test]
    fn test_abort_on_first_branch() {
        // two branches landing mid-bundle outside the region
        let words = [0xea00003f, 0xea00003f, NOP, NOP];
        let report_first = report(&words, &SfiConfig::arm());
        assert_eq!(report_first.entries().len(), 1);
        assert_eq!(report_first.entries()[0].address, 0x1000);

        let config = SfiConfig::arm().with_failure_policy(FailurePolicy::CollectAll);
        let report_all = report(&words, &config);
        assert_eq!(
            report_all.violations().collect::<Vec<_>>(),
            vec![Violation::BranchInvalidDestination; 2]
        );
    }

    #[test]
    fn test_valid_starts_exclude_critical() {
        // bic r1, r1, #0xc0000000 / ldr r0, [r1] / nop / nop
        let code = code(&[0xe3c11103, 0xe5910000, NOP, NOP]);
        let starts = valid_instruction_starts(&code, 0x2000, &SfiConfig::arm()).unwrap();
        assert_eq!(starts.iter().collect::<Vec<_>>(), vec![0x2000, 0x2008, 0x200c]);
        // ldr r0, [r1] alone is rejected
        let code = self::code(&[NOP, 0xe5910000, NOP, NOP]);
        assert!(valid_instruction_starts(&code, 0x2000, &SfiConfig::arm()).is_err());
    }
}
