// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bundle scan and jump target checks over a code region

use log::{debug, trace, warn};
use sfi_core::{
    AddressSet, DiagnosticContext, FailurePolicy, InstructionText, Problem, SfiConfig,
    ValidationError, Violation,
};

use crate::BUNDLE_SIZE;
use crate::automaton::{DecodedInstruction, scan};
use crate::bitmap::{Bitmap, bad_jump_bundles};
use crate::error::DecodeError;

/// Decodes whole bundles of code, addressed from zero
pub fn decode_instructions(code: &[u8]) -> Result<Vec<DecodedInstruction>, DecodeError> {
    if code.len() % BUNDLE_SIZE != 0 {
        return Err(DecodeError::UnalignedCode { size: code.len() });
    }
    match scan(code) {
        (instructions, None) => Ok(instructions),
        (_, Some(rejection)) => Err(rejection.into()),
    }
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
    check(code, base_address, config, on_violation).map(|_| ())
}

/// Addresses where execution may safely begin: every instruction start of
/// accepted code except the jumps of masked jump pairs.
pub fn valid_instruction_starts(
    code: &[u8],
    base_address: u32,
    config: &SfiConfig,
) -> Result<AddressSet, ValidationError> {
    let instructions = check(code, base_address, config, |_, _, _| {})?;
    Ok(instructions
        .iter()
        .filter(|inst| !inst.masked_jump)
        .map(|inst| base_address.wrapping_add(inst.start as u32))
        .collect())
}

fn check<F>(
    code: &[u8],
    base_address: u32,
    config: &SfiConfig,
    mut on_violation: F,
) -> Result<Vec<DecodedInstruction>, ValidationError>
where
    F: FnMut(u32, Violation, Option<DiagnosticContext>),
{
    debug!(
        "validating {:#x} bytes of x86-32 code at {base_address:#x}",
        code.len()
    );
    if config.bundle_size() as usize != BUNDLE_SIZE {
        return Err(ValidationError::UnsupportedBundleSize {
            bundle_size: config.bundle_size(),
        });
    }
    config.check_region(base_address, code.len())?;

    let (instructions, rejection) = scan(code);
    let mut valid_targets = Bitmap::new(code.len());
    let mut jump_dests = Bitmap::new(code.len());
    for inst in &instructions {
        let address = base_address.wrapping_add(inst.start as u32);
        trace!("{address:#010x}: {:02x?}", &code[inst.start..inst.end()]);
        if !inst.masked_jump {
            valid_targets.set(inst.start);
        }
        let Some(target) = inst.jump else {
            continue;
        };
        if target.rem_euclid(BUNDLE_SIZE as i64) == 0 {
            continue;
        }
        if target < 0 || target >= code.len() as i64 {
            let target = i64::from(base_address) + target;
            let context = DiagnosticContext::new(Problem::DirectJumpOutOfRange)
                .with_instruction(inst.text(code, base_address));
            on_violation(address, Violation::DirectJumpOutOfRange, Some(context));
            warn!("direct jump at {address:#x} to {target:#x} leaves the region");
            return Err(ValidationError::DirectJumpOutOfRange { address, target });
        }
        jump_dests.set(target as usize);
    }

    if let Some(rejection) = rejection {
        let address = base_address.wrapping_add(rejection.begin as u32);
        let end = (rejection.offset + 1).min(code.len());
        let context = DiagnosticContext::new(Problem::UnrecognizedInstruction).with_instruction(
            InstructionText {
                address,
                bytes: code.get(rejection.begin..end).unwrap_or_default().to_vec(),
                disassembly: None,
            },
        );
        on_violation(address, Violation::UnrecognizedInstruction, Some(context));
        warn!("{address:#x}: {}", rejection.reason);
        return Err(ValidationError::UnrecognizedInstruction { address });
    }

    let mut reported = 0;
    for offset in bad_jump_bundles(&valid_targets, &jump_dests) {
        let bundle = offset..offset + BUNDLE_SIZE;
        let context = instructions
            .iter()
            .filter(|inst| {
                inst.jump.is_some_and(|target| {
                    bundle.contains(&(target as usize)) && !valid_targets.is_set(target as usize)
                })
            })
            .fold(DiagnosticContext::new(Problem::BadJumpTarget), |context, inst| {
                context.with_instruction(inst.text(code, base_address))
            });
        on_violation(
            base_address.wrapping_add(offset as u32),
            Violation::BadJumpTarget,
            Some(context),
        );
        reported += 1;
        if config.failure_policy() == FailurePolicy::AbortOnFirst {
            break;
        }
    }
    if reported > 0 {
        debug!("rejected with {reported} bad jump target(s)");
        return Err(ValidationError::Violations { count: reported });
    }
    debug!("accepted {} instruction(s)", instructions.len());
    Ok(instructions)
}
