// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pairwise SFI rules
//!
//! Each rule looks at two adjacent instructions, `first` immediately followed
//! by `second`, and returns the violations it finds. Masking pairs that are
//! accepted record `second` as critical: it must never be a branch target,
//! since jumping there would skip the mask.

use sfi_core::{
    AddressSet, DiagnosticContext, PairDetail, Problem, Register, RegisterList, SfiConfig,
    Violation, ViolationSet,
};

use crate::DecodedInstruction;

/// Mutable scan state shared by the rules
#[derive(Debug, Default)]
pub struct ScanState {
    /// Addresses that must not be branch targets
    pub critical: AddressSet,
    /// Addresses of relative branches, checked once the scan is over
    pub branches: AddressSet,
}

/// Runs every rule on the pair and returns the union of their results
pub fn check_pair(
    first: &DecodedInstruction,
    second: &DecodedInstruction,
    config: &SfiConfig,
    state: &mut ScanState,
) -> ViolationSet {
    let mut violations = ViolationSet::from_safety(second.safety());
    violations |= check_load_store(first, second, config, &mut state.critical);
    violations |= check_branch_mask(first, second, config, &mut state.critical);
    violations |= check_data_register_update(first, second, config, &mut state.critical);
    violations |= check_call_position(second, config);
    violations |= check_read_only(second, config);
    violations |= check_thread_pointer_read(second);
    violations |= check_pc_writes(second, config, &mut state.branches);
    violations
}

/// Accepts a masking pair if both halves share a bundle, otherwise reports
/// `crossing`.
fn pair_allowed(
    first: &DecodedInstruction,
    second: &DecodedInstruction,
    config: &SfiConfig,
    critical: &mut AddressSet,
    crossing: ViolationSet,
) -> ViolationSet {
    if !config.in_same_bundle(first.addr(), second.addr()) {
        return crossing;
    }
    critical.add(second.addr());
    ViolationSet::empty()
}

/// Loads and stores must go through a data-address register, a masked
/// register, or one of the addressing forms that cannot leave the sandbox.
pub fn check_load_store(
    first: &DecodedInstruction,
    second: &DecodedInstruction,
    config: &SfiConfig,
    critical: &mut AddressSet,
) -> ViolationSet {
    let base = second.base_address_register();
    if base.is_none()
        || config.is_data_address_register(base)
        || second.is_literal_load()
        || second.is_load_thread_address_pointer()
    {
        return ViolationSet::empty();
    }

    let mask = config.data_address_mask();
    if first.defines(base) && first.clears_bits(mask) && first.always_dominates(second) {
        return pair_allowed(
            first,
            second,
            config,
            critical,
            ViolationSet::LOAD_STORE_CROSSES_BUNDLE,
        );
    }
    if config.conditional_memory_access_allowed()
        && first.sets_z_if_bits_clear(base, mask)
        && second.is_eq_conditional_on(first)
    {
        return pair_allowed(
            first,
            second,
            config,
            critical,
            ViolationSet::LOAD_STORE_CROSSES_BUNDLE,
        );
    }
    ViolationSet::LOAD_STORE
}

/// Indirect branches must go through a register masked with the code mask
pub fn check_branch_mask(
    first: &DecodedInstruction,
    second: &DecodedInstruction,
    config: &SfiConfig,
    critical: &mut AddressSet,
) -> ViolationSet {
    let target = second.branch_target_register();
    if target.is_none() {
        return ViolationSet::empty();
    }
    if first.defines(target)
        && first.clears_bits(config.code_address_mask())
        && first.always_dominates(second)
    {
        return pair_allowed(
            first,
            second,
            config,
            critical,
            ViolationSet::BRANCH_MASK_CROSSES_BUNDLE,
        );
    }
    ViolationSet::BRANCH_MASK
}

/// A data-address register may only be updated if the new value is masked
/// at once, by the update itself or by the following instruction.
pub fn check_data_register_update(
    first: &DecodedInstruction,
    second: &DecodedInstruction,
    config: &SfiConfig,
    critical: &mut AddressSet,
) -> ViolationSet {
    let data_registers = config.data_address_registers();
    if !first.defines_any(data_registers) {
        return ViolationSet::empty();
    }

    let mask = config.data_address_mask();
    if first.clears_bits(mask) {
        return ViolationSet::empty();
    }
    if first.base_address_register_writeback_small_immediate()
        && data_registers.contains(first.base_address_register())
    {
        return ViolationSet::empty();
    }

    let defs = first.defs().intersect(data_registers);
    if second.defines_all(defs) && second.clears_bits(mask) && second.always_postdominates(first) {
        return pair_allowed(
            first,
            second,
            config,
            critical,
            ViolationSet::DATA_REGISTER_UPDATE_CROSSES_BUNDLE,
        );
    }
    ViolationSet::DATA_REGISTER_UPDATE
}

/// Calls must sit in the last slot of their bundle so the return address
/// is bundle aligned.
pub fn check_call_position(second: &DecodedInstruction, config: &SfiConfig) -> ViolationSet {
    let call = RegisterList::single(Register::PC).add(Register::LR);
    if !second.defines_all(call) {
        return ViolationSet::empty();
    }
    let last_slot = config
        .bundle_for_address(second.addr())
        .end_addr()
        .wrapping_sub(4);
    if second.addr() == last_slot {
        ViolationSet::empty()
    } else {
        ViolationSet::CALL_POSITION
    }
}

pub fn check_read_only(second: &DecodedInstruction, config: &SfiConfig) -> ViolationSet {
    if second.defines_any(config.read_only_registers()) {
        ViolationSet::READ_ONLY
    } else {
        ViolationSet::empty()
    }
}

/// The thread pointer may only be read by the thread pointer loads
pub fn check_thread_pointer_read(second: &DecodedInstruction) -> ViolationSet {
    if second.reads(Register::TP) && !second.is_load_thread_address_pointer() {
        ViolationSet::READ_THREAD_LOCAL_POINTER
    } else {
        ViolationSet::empty()
    }
}

/// Writes to pc other than branches must clear the code mask themselves.
///
/// Relative branches are recorded so their targets can be checked after
/// the scan.
pub fn check_pc_writes(
    second: &DecodedInstruction,
    config: &SfiConfig,
    branches: &mut AddressSet,
) -> ViolationSet {
    if second.is_relative_branch() {
        branches.add(second.addr());
        return ViolationSet::empty();
    }
    if !second.branch_target_register().is_none()
        || !second.defines(Register::PC)
        || second.clears_bits(config.code_address_mask())
    {
        return ViolationSet::empty();
    }
    ViolationSet::PC_WRITES
}

/// Describes one violation found on a pair.
///
/// Returns the address the violation is reported at together with its
/// context. Data register updates are reported at `first`, everything else
/// at `second`.
pub fn diagnose(
    violation: Violation,
    first: &DecodedInstruction,
    second: &DecodedInstruction,
    config: &SfiConfig,
) -> (u32, DiagnosticContext) {
    let both = |context: DiagnosticContext| {
        context
            .with_instruction(first.text())
            .with_instruction(second.text())
    };
    let data_registers = config.data_address_registers();

    match violation {
        Violation::LoadStoreCrossesBundle => (
            second.addr(),
            both(
                DiagnosticContext::new(Problem::UnsafeLoadStore)
                    .with_detail(PairDetail::PairCrossesBundle)
                    .with_registers(RegisterList::single(second.base_address_register())),
            ),
        ),
        Violation::LoadStore => (second.addr(), diagnose_load_store(first, second, config)),
        Violation::BranchMaskCrossesBundle => (
            second.addr(),
            both(
                DiagnosticContext::new(Problem::UnsafeBranch)
                    .with_detail(PairDetail::PairCrossesBundle)
                    .with_registers(RegisterList::single(second.branch_target_register())),
            ),
        ),
        Violation::BranchMask => {
            let target = second.branch_target_register();
            let context = DiagnosticContext::new(Problem::UnsafeBranch)
                .with_registers(RegisterList::single(target));
            let context = if first.defines(target)
                && first.clears_bits(config.code_address_mask())
            {
                both(context.with_detail(pair_condition_detail(first)))
            } else {
                context.with_instruction(second.text())
            };
            (second.addr(), context)
        }
        Violation::DataRegisterUpdateCrossesBundle => (
            first.addr(),
            both(
                DiagnosticContext::new(Problem::UnsafeDataWrite)
                    .with_detail(PairDetail::PairCrossesBundle)
                    .with_registers(first.defs().intersect(data_registers)),
            ),
        ),
        Violation::DataRegisterUpdate => {
            let defs = first.defs().intersect(data_registers);
            let context =
                DiagnosticContext::new(Problem::UnsafeDataWrite).with_registers(defs);
            let context = if second.defines_all(defs)
                && second.clears_bits(config.data_address_mask())
            {
                both(context.with_detail(pair_condition_detail(first)))
            } else {
                context.with_instruction(first.text())
            };
            (first.addr(), context)
        }
        Violation::CallPosition => (
            second.addr(),
            DiagnosticContext::new(Problem::MisalignedCall).with_instruction(second.text()),
        ),
        Violation::ReadOnly => (
            second.addr(),
            DiagnosticContext::new(Problem::ReadOnlyRegister)
                .with_registers(second.defs().intersect(config.read_only_registers()))
                .with_instruction(second.text()),
        ),
        Violation::ReadThreadLocalPointer => (
            second.addr(),
            DiagnosticContext::new(Problem::IllegalUseOfThreadPointer)
                .with_registers(RegisterList::single(Register::TP))
                .with_instruction(second.text()),
        ),
        Violation::PcWrites => (
            second.addr(),
            DiagnosticContext::new(Problem::UnsafeBranch)
                .with_registers(RegisterList::single(Register::PC))
                .with_instruction(second.text()),
        ),
        _ => (
            second.addr(),
            DiagnosticContext::new(Problem::UnsafeInstruction(second.safety()))
                .with_instruction(second.text()),
        ),
    }
}

fn diagnose_load_store(
    first: &DecodedInstruction,
    second: &DecodedInstruction,
    config: &SfiConfig,
) -> DiagnosticContext {
    let base = second.base_address_register();
    let mask = config.data_address_mask();
    let registers = RegisterList::single(base);

    if first.defines(base) {
        let context = DiagnosticContext::new(Problem::UnsafeLoadStore).with_registers(registers);
        if first.clears_bits(mask) {
            return context
                .with_detail(pair_condition_detail(first))
                .with_instruction(first.text())
                .with_instruction(second.text());
        }
        return context.with_instruction(second.text());
    }
    if first.sets_z_if_bits_clear(base, mask) {
        let detail = if config.conditional_memory_access_allowed() {
            PairDetail::EqConditionalOn
        } else {
            PairDetail::TstMemDisallowed
        };
        return DiagnosticContext::new(Problem::UnsafeLoadStore)
            .with_detail(detail)
            .with_registers(registers)
            .with_instruction(first.text())
            .with_instruction(second.text());
    }
    if base == Register::PC {
        return DiagnosticContext::new(Problem::IllegalPcLoadStore)
            .with_registers(registers)
            .with_instruction(second.text());
    }
    DiagnosticContext::new(Problem::UnsafeLoadStore)
        .with_registers(registers)
        .with_instruction(second.text())
}

/// Why a mask in `first` failed to cover its successor
fn pair_condition_detail(first: &DecodedInstruction) -> PairDetail {
    if first.defines(Register::CONDITIONS) {
        PairDetail::ConditionsModified
    } else {
        PairDetail::ConditionMismatch
    }
}

#[cfg(test)]
mod tests {
    use sfi_core::{
        PairDetail, Problem, Register, RegisterList, SfiConfig, Violation, ViolationSet,
    };

    use super::{ScanState, check_pair, diagnose};
    use crate::{DecodedInstruction, Instruction};

    fn at(addr: u32, word: u32) -> DecodedInstruction {
        DecodedInstruction::new(addr, Instruction::new(word))
    }

    fn check(
        first: (u32, u32),
        second: (u32, u32),
        config: &SfiConfig,
    ) -> (ViolationSet, ScanState) {
        let mut state = ScanState::default();
        let first = at(first.0, first.1);
        let second = at(second.0, second.1);
        let violations = check_pair(&first, &second, config, &mut state);
        (violations, state)
    }

    const NOP: u32 = 0xe320f000;

    #[test]
    fn test_masked_load() {
        // bic r1, r1, #0xc0000000 / ldr r0, [r1]
        let (violations, state) =
            check((0x1000, 0xe3c11103), (0x1004, 0xe5910000), &SfiConfig::arm());
        assert!(violations.is_empty(), "{violations:?}");
        assert!(state.critical.contains(0x1004));
    }

    #[test]
    fn test_masked_load_crossing_bundle() {
        let (violations, state) =
            check((0x100c, 0xe3c11103), (0x1010, 0xe5910000), &SfiConfig::arm());
        assert_eq!(violations, ViolationSet::LOAD_STORE_CROSSES_BUNDLE);
        assert!(state.critical.is_empty());
    }

    #[test]
    fn test_unmasked_load() {
        // nop / ldr r0, [r1]
        let (violations, state) = check((0x1000, NOP), (0x1004, 0xe5910000), &SfiConfig::arm());
        assert_eq!(violations, ViolationSet::LOAD_STORE);
        assert!(state.critical.is_empty());
        // ldr r0, [sp, #4]
        let (violations, _) = check((0x1000, NOP), (0x1004, 0xe59d0004), &SfiConfig::arm());
        assert!(violations.is_empty());
        // ldr r0, [pc, #8]
        let (violations, _) = check((0x1000, NOP), (0x1004, 0xe59f0008), &SfiConfig::arm());
        assert!(violations.is_empty());
    }

    #[test]
    fn test_mask_under_other_condition() {
        // bicne r1, r1, #0xc0000000 / ldreq r0, [r1]
        let first = at(0x1000, 0x13c11103);
        let second = at(0x1004, 0x05910000);
        let config = SfiConfig::arm();
        let violations = check_pair(&first, &second, &config, &mut ScanState::default());
        assert_eq!(violations, ViolationSet::LOAD_STORE);
        let (address, context) = diagnose(Violation::LoadStore, &first, &second, &config);
        assert_eq!(address, 0x1004);
        assert_eq!(context.problem, Problem::UnsafeLoadStore);
        assert_eq!(context.detail, Some(PairDetail::ConditionMismatch));
        assert_eq!(context.registers, RegisterList::single(Register::R1));
        assert_eq!(context.instructions.len(), 2);
    }

    #[test]
    fn test_tst_guarded_store() {
        // tst r1, #0xc0000000 / streq r0, [r1]
        let tst = (0x1000, 0xe3110103);
        let store = (0x1004, 0x05810000);
        let (violations, _) = check(tst, store, &SfiConfig::arm());
        assert_eq!(violations, ViolationSet::LOAD_STORE);
        let config = SfiConfig::arm().with_conditional_memory_access(true);
        let (violations, state) = check(tst, store, &config);
        assert!(violations.is_empty());
        assert!(state.critical.contains(0x1004));

        let (_, context) = diagnose(
            Violation::LoadStore,
            &at(tst.0, tst.1),
            &at(store.0, store.1),
            &SfiConfig::arm(),
        );
        assert_eq!(context.detail, Some(PairDetail::TstMemDisallowed));
    }

    #[test]
    fn test_pc_relative_store() {
        // str r0, [pc, #8]
        let first = at(0x1000, NOP);
        let second = at(0x1004, 0xe58f0008);
        let config = SfiConfig::arm();
        let violations = check_pair(&first, &second, &config, &mut ScanState::default());
        assert!(violations.contains(ViolationSet::LOAD_STORE));
        let (_, context) = diagnose(Violation::LoadStore, &first, &second, &config);
        assert_eq!(context.problem, Problem::IllegalPcLoadStore);
    }

    #[test]
    fn test_indirect_branch() {
        // bic r2, r2, #0xc000000f / bx r2
        let (violations, state) =
            check((0x1000, 0xe3c222fc), (0x1004, 0xe12fff12), &SfiConfig::arm());
        assert!(violations.is_empty(), "{violations:?}");
        assert!(state.critical.contains(0x1004));
        // nop / bx r2
        let (violations, _) = check((0x1000, NOP), (0x1004, 0xe12fff12), &SfiConfig::arm());
        assert_eq!(violations, ViolationSet::BRANCH_MASK);
        // bic r2, r2, #0xc000000f / bx r2, across bundles
        let (violations, _) = check((0x100c, 0xe3c222fc), (0x1010, 0xe12fff12), &SfiConfig::arm());
        assert_eq!(violations, ViolationSet::BRANCH_MASK_CROSSES_BUNDLE);
    }

    #[test]
    fn test_code_address_registers_still_need_a_mask() {
        // mov r9, r0 / bx r9
        let (violations, _) = check((0x1000, 0xe1a09000), (0x1004, 0xe12fff19), &SfiConfig::arm());
        assert!(violations.contains(ViolationSet::BRANCH_MASK), "{violations:?}");

        // nop / bx r2, with r2 listed as a code-address register
        let config =
            SfiConfig::arm().with_code_address_registers(RegisterList::single(Register::R2));
        let (violations, _) = check((0x1000, NOP), (0x1004, 0xe12fff12), &config);
        assert_eq!(violations, ViolationSet::BRANCH_MASK);
    }

    #[test]
    fn test_stack_pointer_update() {
        let config = SfiConfig::arm();
        // add sp, sp, r1 / bic sp, sp, #0xc0000000
        let (violations, state) = check((0x1000, 0xe08dd001), (0x1004, 0xe3cdd103), &config);
        assert!(violations.is_empty(), "{violations:?}");
        assert!(state.critical.contains(0x1004));
        // add sp, sp, r1 / nop
        let (violations, _) = check((0x1000, 0xe08dd001), (0x1004, NOP), &config);
        assert_eq!(violations, ViolationSet::DATA_REGISTER_UPDATE);
        // add sp, sp, r1 / bic sp, sp, #0xc0000000 across bundles
        let (violations, _) = check((0x100c, 0xe08dd001), (0x1010, 0xe3cdd103), &config);
        assert_eq!(violations, ViolationSet::DATA_REGISTER_UPDATE_CROSSES_BUNDLE);
        // ldr r0, [sp], #4 writes sp back by a small immediate
        let (violations, _) = check((0x1000, 0xe49d0004), (0x1004, NOP), &config);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_data_update_reported_at_first() {
        let config = SfiConfig::arm();
        // add sp, sp, r1 / nop
        let first = at(0x1000, 0xe08dd001);
        let second = at(0x1004, NOP);
        let (address, context) = diagnose(Violation::DataRegisterUpdate, &first, &second, &config);
        assert_eq!(address, 0x1000);
        assert_eq!(context.problem, Problem::UnsafeDataWrite);
        assert_eq!(context.registers, RegisterList::single(Register::SP));
    }

    #[test]
    fn test_call_position() {
        let config = SfiConfig::arm();
        // bl .+0x100 in the last slot
        let (violations, state) = check((0x1008, NOP), (0x100c, 0xeb00003e), &config);
        assert!(violations.is_empty());
        assert!(state.branches.contains(0x100c));
        // bl .+0x100 in the third slot
        let (violations, _) = check((0x1004, NOP), (0x1008, 0xeb00003e), &config);
        assert_eq!(violations, ViolationSet::CALL_POSITION);
    }

    #[test]
    fn test_read_only_and_thread_pointer() {
        let config = SfiConfig::arm();
        // mov r9, #0
        let (violations, _) = check((0x1000, NOP), (0x1004, 0xe3a09000), &config);
        assert!(violations.contains(ViolationSet::READ_ONLY));
        // add r0, r9, #4
        let (violations, _) = check((0x1000, NOP), (0x1004, 0xe2890004), &config);
        assert_eq!(violations, ViolationSet::READ_THREAD_LOCAL_POINTER);
        // ldr r0, [r9, #4]
        let (violations, _) = check((0x1000, NOP), (0x1004, 0xe5990004), &config);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_pc_writes() {
        let config = SfiConfig::arm();
        // mov pc, r0
        let (violations, _) = check((0x1000, NOP), (0x1004, 0xe1a0f000), &config);
        assert!(violations.contains(ViolationSet::PC_WRITES));
        // bic pc, r0, #0xc000000f
        let (violations, _) = check((0x1000, NOP), (0x1004, 0xe3c0f2fc), &config);
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn test_unsafe_instruction_bit() {
        // svc #0
        let (violations, _) = check((0x1000, NOP), (0x1004, 0xef000000), &SfiConfig::arm());
        assert!(violations.contains_safety_violations());
    }
}
