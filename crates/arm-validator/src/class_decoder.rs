// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Instruction classes and their semantic predicates
//!
//! Every instruction word is mapped (by [`crate::decode`]) to a
//! [`ClassDecoder`]: a rule name plus an [`InstructionClass`] describing the
//! encoding shape. The predicates below answer the questions the pairwise
//! rules ask of an instruction, purely from its bits.
//!
//! | Predicate | Default |
//! |-----------|---------|
//! | `defs` | everything |
//! | `uses` | nothing |
//! | `base_address_register` | `NONE` |
//! | `branch_target_register` | `NONE` |
//! | boolean predicates | `false` |
//! | `branch_target_offset` | `0` |

use sfi_core::{Register, RegisterList, SafetyLevel};

use crate::Instruction;

/// How a data-processing immediate can clear address bits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImmediateMasking {
    None,
    /// `and`: bits clear where the immediate is zero
    And,
    /// `bic`: bits clear where the immediate is one
    Bic,
}

/// Encoding shape of an instruction
///
/// Register positions use the field names of the architecture manual: `Rn`
/// at bits 16-19, `Rd`/`Rt` at bits 12-15, `Rs` at bits 8-11, `Rm` at bits
/// 0-3, unless the variant documents otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionClass {
    /// Rejected in isolation
    Unsafe(SafetyLevel),

    /// `mov`/`mvn`/`movw`/`movt` immediate
    Unary1RegisterImmediateOp,
    /// `op Rd, Rn, #imm`
    Binary2RegisterImmediateOp(ImmediateMasking),
    /// `tst`/`teq`/`cmp`/`cmn` immediate
    BinaryRegisterImmediateTest { tst: bool },
    /// `mov`/shift/`mvn` register with immediate shift
    Unary2RegisterImmedShiftedOp,
    Binary3RegisterImmedShiftedOp,
    Binary2RegisterImmedShiftedTest,
    /// `mvn` register-shifted register
    Unary3RegisterShiftedOp,
    Binary4RegisterShiftedOp,
    Binary3RegisterShiftedTest,
    /// `lsl`/`lsr`/`asr`/`ror` register: Rd 12-15, Rm 8-11, Rn 0-3
    Binary3RegisterOp,

    /// `mul` and friends: Rd 16-19, Rm 8-11, Rn 0-3
    Binary3RegisterOpAltA,
    /// `mla` and friends: Rd 16-19, Ra 12-15, Rm 8-11, Rn 0-3
    Binary4RegisterDualOp,
    /// Long multiplies: RdHi 16-19, RdLo 12-15, Rm 8-11, Rn 0-3
    Binary4RegisterDualResult,

    /// Parallel/saturating arithmetic, extend-and-add, `pkh`, `sel`
    Binary3RegisterOpAltBNoCondUpdates,
    /// Extend, reverse, saturate, `clz`: Rd 12-15, Rm 0-3
    Unary2RegisterOpNotRmIsPc,
    /// `bfc`
    Unary1RegisterBitRangeMsbGeLsb,
    /// `bfi`: Rd 12-15, Rn 0-3
    Binary2RegisterBitRangeMsbGeLsb,
    /// `sbfx`/`ubfx`: Rd 12-15, Rn 0-3
    Binary2RegisterBitRangeNotRnIsPcBitfieldExtract,

    /// `mrs Rd, apsr`
    Unary1RegisterSet,
    /// `msr apsr, #imm`
    MoveImmediate12ToApsr,
    /// `msr apsr, Rn` with Rn at 0-3
    Unary1RegisterUse,

    /// `bx`/`blx` register
    BranchToRegister { link: bool },
    /// `b`/`bl`
    BranchImmediate24 { link: bool },

    /// `bkpt`, which also marks literal pools
    BreakPointAndConstantPoolHead,
    /// `udf`, used as halt fill
    Roadblock,
    /// `nop`/`yield`
    CondNop,

    /// `ldr`/`str`/`ldrb`/`strb` immediate
    LoadStore2RegisterImm12Op { load: bool, byte: bool },
    /// `ldrh`/`strh`/`ldrsb`/`ldrsh`/`ldrd`/`strd` immediate
    LoadStore2RegisterImm8Op { load: bool, double: bool },
    /// `ldrex*`
    LoadExclusive2RegisterOp { double: bool },
    /// `strex*`: status Rd 12-15, Rt 0-3
    StoreExclusive3RegisterOp { double: bool },
    /// `ldm`
    LoadRegisterList,
    /// `stm`
    StoreRegisterList,
    /// `pld`/`pldw`/`pli` immediate
    PreloadRegisterImm12Op,

    /// `dmb`/`dsb`
    DataBarrier,
    /// `isb`
    InstructionBarrier,
    /// `clrex`
    ClearExclusive,

    /// VFP data processing
    VfpOp,
    /// `vmrs Rt, fpscr`; Rt of `pc` targets the flags
    VfpMrsOp,
    /// Core/extension register moves. `dual` has Rt2 at 16-19.
    MoveVfpRegisterOp { dual: bool },
    /// `vldr`/`vstr`
    LoadStoreVectorRegister { load: bool },
    /// `vldm`/`vstm`/`vpush`/`vpop`
    LoadStoreVectorRegisterList { load: bool },
    /// Advanced SIMD data processing
    VectorOp,
    /// Advanced SIMD element and structure loads/stores: Rm 0-3 selects writeback
    VectorLoadStore,
}

/// An instruction class together with the rule that selected it
#[derive(Debug, PartialEq, Eq)]
pub struct ClassDecoder {
    name: &'static str,
    class: InstructionClass,
}

/// Rm value of a vector load/store without writeback
const NO_WRITEBACK: Register = Register::PC;
/// Rm value of a vector load/store that writes back by the transfer size
const SIZE_WRITEBACK: Register = Register::SP;

/// Literal pool marker: `bkpt #0x7777`
const LITERAL_POOL_HEAD_IMMEDIATE: u32 = 0x7777;

fn any_pc(registers: &[Register]) -> bool {
    registers.contains(&Register::PC)
}

fn list(registers: &[Register]) -> RegisterList {
    registers.iter().copied().collect()
}

/// The register after `register` (the second half of a doubleword transfer)
fn pair_of(register: Register) -> Register {
    Register::new(register.number() + 1)
}

/// Multiplies only set flags in the multiply space (bits 24-27 clear)
fn multiply_flags(i: Instruction) -> RegisterList {
    if i.bits(27, 24) == 0 {
        i.flags_if_updated()
    } else {
        RegisterList::EMPTY
    }
}

/// Bit range `[lsb, msb]` of `bfc`/`bfi`
fn bit_range(i: Instruction) -> (u32, u32) {
    (i.bits(11, 7), i.bits(20, 16))
}

impl ClassDecoder {
    pub const fn new(name: &'static str, class: InstructionClass) -> Self {
        ClassDecoder { name, class }
    }

    /// The rule name, e.g. `Binary2RegisterImmediateOp_And_Rule_11_A1_P34`
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn class(&self) -> InstructionClass {
        self.class
    }

    pub fn safety(&self, i: Instruction) -> SafetyLevel {
        use InstructionClass as C;
        use SafetyLevel::*;

        let (rn, rd, rs, rm) = (i.rn(), i.rd(), i.rs(), i.rm());
        match self.class {
            C::Unsafe(level) => level,

            C::Unary1RegisterImmediateOp
            | C::Unary2RegisterImmedShiftedOp
            | C::Binary3RegisterImmedShiftedOp => {
                if rd == Register::PC {
                    ForbiddenOperands
                } else {
                    MayBeSafe
                }
            }
            C::Binary2RegisterImmediateOp(masking) => {
                // `bic pc, ...` is left to the pc-write rule; `subs pc, lr` is
                // an exception return.
                let masks_pc = masking == ImmediateMasking::Bic && !i.updates_flags();
                if rd == Register::PC && !masks_pc {
                    ForbiddenOperands
                } else {
                    MayBeSafe
                }
            }
            C::BinaryRegisterImmediateTest { .. } | C::Binary2RegisterImmedShiftedTest => MayBeSafe,

            C::Unary3RegisterShiftedOp if any_pc(&[rd, rs, rm]) => Unpredictable,
            C::Binary4RegisterShiftedOp if any_pc(&[rd, rn, rs, rm]) => Unpredictable,
            C::Binary3RegisterShiftedTest if any_pc(&[rn, rs, rm]) => Unpredictable,
            C::Binary3RegisterOp if any_pc(&[rd, rs, rm]) => Unpredictable,
            C::Binary3RegisterOpAltA if any_pc(&[rn, rs, rm]) => Unpredictable,
            C::Binary4RegisterDualOp if any_pc(&[rn, rd, rs, rm]) => Unpredictable,
            C::Binary4RegisterDualResult if any_pc(&[rn, rd, rs, rm]) || rn == rd => Unpredictable,
            C::Binary3RegisterOpAltBNoCondUpdates if any_pc(&[rn, rd, rm]) => Unpredictable,
            C::Unary2RegisterOpNotRmIsPc if any_pc(&[rd, rm]) => Unpredictable,
            C::Unary3RegisterShiftedOp
            | C::Binary4RegisterShiftedOp
            | C::Binary3RegisterShiftedTest
            | C::Binary3RegisterOp
            | C::Binary3RegisterOpAltA
            | C::Binary4RegisterDualOp
            | C::Binary4RegisterDualResult
            | C::Binary3RegisterOpAltBNoCondUpdates
            | C::Unary2RegisterOpNotRmIsPc => MayBeSafe,

            C::Unary1RegisterBitRangeMsbGeLsb => {
                let (lsb, msb) = bit_range(i);
                if rd == Register::PC || msb < lsb {
                    Unpredictable
                } else {
                    MayBeSafe
                }
            }
            C::Binary2RegisterBitRangeMsbGeLsb => {
                let (lsb, msb) = bit_range(i);
                if any_pc(&[rd, rm]) || msb < lsb {
                    Unpredictable
                } else {
                    MayBeSafe
                }
            }
            C::Binary2RegisterBitRangeNotRnIsPcBitfieldExtract => {
                let (lsb, width_minus_one) = bit_range(i);
                if any_pc(&[rd, rm]) || lsb + width_minus_one > 31 {
                    Unpredictable
                } else {
                    MayBeSafe
                }
            }

            C::Unary1RegisterSet if rd == Register::PC => Unpredictable,
            C::Unary1RegisterUse if rm == Register::PC || i.bits(19, 18) == 0 => Unpredictable,
            C::Unary1RegisterSet | C::Unary1RegisterUse | C::MoveImmediate12ToApsr => MayBeSafe,

            C::BranchToRegister { .. } if rm == Register::PC => ForbiddenOperands,
            C::BranchToRegister { .. } | C::BranchImmediate24 { .. } => MayBeSafe,

            C::BreakPointAndConstantPoolHead | C::Roadblock => {
                if i.condition() == crate::Condition::Al {
                    MayBeSafe
                } else {
                    Unpredictable
                }
            }
            C::CondNop => MayBeSafe,

            C::LoadStore2RegisterImm12Op { load, byte } => {
                if !i.pre_indexed() && i.writeback_bit() {
                    Forbidden
                } else if i.has_writeback() && (rn == Register::PC || rn == rd) {
                    Unpredictable
                } else if rd == Register::PC && load {
                    ForbiddenOperands
                } else if rd == Register::PC && byte {
                    Unpredictable
                } else {
                    MayBeSafe
                }
            }
            C::LoadStore2RegisterImm8Op { load, double } => {
                let rt2 = pair_of(rd);
                if !i.pre_indexed() && i.writeback_bit() {
                    Forbidden
                } else if double && (rd.number() % 2 == 1 || rd == Register::LR) {
                    Unpredictable
                } else if i.has_writeback()
                    && (rn == Register::PC || rn == rd || (double && rn == rt2))
                {
                    Unpredictable
                } else if rd == Register::PC {
                    if load { ForbiddenOperands } else { Unpredictable }
                } else {
                    MayBeSafe
                }
            }
            C::LoadExclusive2RegisterOp { double } => {
                if any_pc(&[rn, rd]) || (double && (rd.number() % 2 == 1 || rd == Register::LR)) {
                    Unpredictable
                } else {
                    MayBeSafe
                }
            }
            C::StoreExclusive3RegisterOp { double } => {
                let rt2 = pair_of(rm);
                if any_pc(&[rn, rd, rm])
                    || rd == rn
                    || rd == rm
                    || (double && (rm.number() % 2 == 1 || rm == Register::LR || rd == rt2))
                {
                    Unpredictable
                } else {
                    MayBeSafe
                }
            }
            C::LoadRegisterList => {
                let registers = i.register_list();
                if registers.contains(Register::PC) {
                    ForbiddenOperands
                } else if rn == Register::PC
                    || registers.is_empty()
                    || (i.writeback_bit() && registers.contains(rn))
                {
                    Unpredictable
                } else {
                    MayBeSafe
                }
            }
            C::StoreRegisterList => {
                if rn == Register::PC || i.register_list().is_empty() {
                    Unpredictable
                } else {
                    MayBeSafe
                }
            }
            C::PreloadRegisterImm12Op
            | C::DataBarrier
            | C::InstructionBarrier
            | C::ClearExclusive
            | C::VfpOp
            | C::VfpMrsOp
            | C::VectorOp => MayBeSafe,

            C::MoveVfpRegisterOp { dual } => {
                let to_core = i.is_load();
                if rd == Register::PC || (dual && (rn == Register::PC || (to_core && rn == rd))) {
                    Unpredictable
                } else {
                    MayBeSafe
                }
            }
            C::LoadStoreVectorRegister { load } => {
                if !load && rn == Register::PC {
                    ForbiddenOperands
                } else {
                    MayBeSafe
                }
            }
            C::LoadStoreVectorRegisterList { .. } => {
                if rn == Register::PC && i.writeback_bit() {
                    Unpredictable
                } else if rn == Register::PC {
                    ForbiddenOperands
                } else if i.imm8() == 0 {
                    Unpredictable
                } else {
                    MayBeSafe
                }
            }
            C::VectorLoadStore if rn == Register::PC => Unpredictable,
            C::VectorLoadStore => MayBeSafe,
        }
    }

    /// Registers the instruction may write
    pub fn defs(&self, i: Instruction) -> RegisterList {
        use InstructionClass as C;

        let (rn, rd, rm) = (i.rn(), i.rd(), i.rm());
        let writeback_base = RegisterList::EMPTY.add_if(i.has_writeback(), rn);
        match self.class {
            C::Unsafe(_) => RegisterList::EVERYTHING,

            C::Unary1RegisterImmediateOp
            | C::Binary2RegisterImmediateOp(_)
            | C::Unary2RegisterImmedShiftedOp
            | C::Binary3RegisterImmedShiftedOp
            | C::Unary3RegisterShiftedOp
            | C::Binary4RegisterShiftedOp
            | C::Binary3RegisterOp => RegisterList::single(rd).union(i.flags_if_updated()),

            C::BinaryRegisterImmediateTest { .. }
            | C::Binary2RegisterImmedShiftedTest
            | C::Binary3RegisterShiftedTest
            | C::MoveImmediate12ToApsr
            | C::Unary1RegisterUse => RegisterList::single(Register::CONDITIONS),

            C::Binary3RegisterOpAltA | C::Binary4RegisterDualOp => {
                RegisterList::single(rn).union(multiply_flags(i))
            }
            C::Binary4RegisterDualResult => list(&[rn, rd]).union(multiply_flags(i)),

            C::Binary3RegisterOpAltBNoCondUpdates
            | C::Unary2RegisterOpNotRmIsPc
            | C::Unary1RegisterBitRangeMsbGeLsb
            | C::Binary2RegisterBitRangeMsbGeLsb
            | C::Binary2RegisterBitRangeNotRnIsPcBitfieldExtract
            | C::Unary1RegisterSet => RegisterList::single(rd),

            C::BranchToRegister { link } | C::BranchImmediate24 { link } => {
                RegisterList::single(Register::PC).add_if(link, Register::LR)
            }

            C::BreakPointAndConstantPoolHead
            | C::Roadblock
            | C::CondNop
            | C::PreloadRegisterImm12Op
            | C::DataBarrier
            | C::InstructionBarrier
            | C::ClearExclusive
            | C::VfpOp
            | C::VectorOp
            | C::LoadStoreVectorRegister { .. } => RegisterList::EMPTY,

            C::LoadStore2RegisterImm12Op { load, .. } => {
                writeback_base.add_if(load, rd)
            }
            C::LoadStore2RegisterImm8Op { load, double } => writeback_base
                .add_if(load, rd)
                .add_if(load && double, pair_of(rd)),
            C::LoadExclusive2RegisterOp { double } => {
                RegisterList::single(rd).add_if(double, pair_of(rd))
            }
            C::StoreExclusive3RegisterOp { .. } => RegisterList::single(rd),
            C::LoadRegisterList => i
                .register_list()
                .add_if(i.writeback_bit(), rn),
            C::StoreRegisterList | C::LoadStoreVectorRegisterList { .. } => {
                RegisterList::EMPTY.add_if(i.writeback_bit(), rn)
            }

            C::VfpMrsOp => {
                if rd == Register::PC {
                    RegisterList::single(Register::CONDITIONS)
                } else {
                    RegisterList::single(rd)
                }
            }
            C::MoveVfpRegisterOp { dual } => {
                if i.is_load() {
                    RegisterList::single(rd).add_if(dual, rn)
                } else {
                    RegisterList::EMPTY
                }
            }
            C::VectorLoadStore => RegisterList::EMPTY.add_if(rm != NO_WRITEBACK, rn),
        }
    }

    /// Registers the instruction reads
    pub fn uses(&self, i: Instruction) -> RegisterList {
        use InstructionClass as C;

        let (rn, rd, rs, rm) = (i.rn(), i.rd(), i.rs(), i.rm());
        match self.class {
            C::Unsafe(_)
            | C::Unary1RegisterImmediateOp
            | C::MoveImmediate12ToApsr
            | C::BreakPointAndConstantPoolHead
            | C::Roadblock
            | C::CondNop
            | C::DataBarrier
            | C::InstructionBarrier
            | C::ClearExclusive
            | C::VfpOp
            | C::VfpMrsOp
            | C::VectorOp => RegisterList::EMPTY,

            C::Binary2RegisterImmediateOp(_) | C::BinaryRegisterImmediateTest { .. } => {
                RegisterList::single(rn)
            }
            C::Unary2RegisterImmedShiftedOp
            | C::Unary2RegisterOpNotRmIsPc
            | C::Binary2RegisterBitRangeNotRnIsPcBitfieldExtract
            | C::Unary1RegisterUse
            | C::BranchToRegister { .. } => RegisterList::single(rm),
            C::Binary3RegisterImmedShiftedOp
            | C::Binary2RegisterImmedShiftedTest
            | C::Binary3RegisterOpAltBNoCondUpdates => list(&[rn, rm]),
            C::Unary3RegisterShiftedOp | C::Binary3RegisterOp | C::Binary3RegisterOpAltA => {
                list(&[rs, rm])
            }
            C::Binary4RegisterShiftedOp | C::Binary3RegisterShiftedTest => list(&[rn, rs, rm]),
            C::Binary4RegisterDualOp => list(&[rd, rs, rm]),
            C::Binary4RegisterDualResult => list(&[rn, rd, rs, rm]),
            C::Unary1RegisterBitRangeMsbGeLsb => RegisterList::single(rd),
            C::Binary2RegisterBitRangeMsbGeLsb => list(&[rd, rm]),
            C::Unary1RegisterSet => RegisterList::single(Register::CONDITIONS),
            C::BranchImmediate24 { .. } => RegisterList::single(Register::PC),

            C::LoadStore2RegisterImm12Op { load, .. } => {
                RegisterList::single(rn).add_if(!load, rd)
            }
            C::LoadStore2RegisterImm8Op { load, double } => RegisterList::single(rn)
                .add_if(!load, rd)
                .add_if(!load && double, pair_of(rd)),
            C::LoadExclusive2RegisterOp { .. }
            | C::LoadRegisterList
            | C::PreloadRegisterImm12Op
            | C::LoadStoreVectorRegister { .. }
            | C::LoadStoreVectorRegisterList { .. } => RegisterList::single(rn),
            C::StoreExclusive3RegisterOp { double } => {
                list(&[rn, rm]).add_if(double, pair_of(rm))
            }
            C::StoreRegisterList => i.register_list().add(rn),
            C::MoveVfpRegisterOp { dual } => {
                if i.is_load() {
                    RegisterList::EMPTY
                } else {
                    RegisterList::single(rd).add_if(dual, rn)
                }
            }
            C::VectorLoadStore => RegisterList::single(rn)
                .add_if(rm != NO_WRITEBACK && rm != SIZE_WRITEBACK, rm),
        }
    }

    /// Base register of a memory access, or `NONE`
    pub fn base_address_register(&self, i: Instruction) -> Register {
        use InstructionClass as C;
        match self.class {
            C::LoadStore2RegisterImm12Op { .. }
            | C::LoadStore2RegisterImm8Op { .. }
            | C::LoadExclusive2RegisterOp { .. }
            | C::StoreExclusive3RegisterOp { .. }
            | C::LoadRegisterList
            | C::StoreRegisterList
            | C::PreloadRegisterImm12Op
            | C::LoadStoreVectorRegister { .. }
            | C::LoadStoreVectorRegisterList { .. }
            | C::VectorLoadStore => i.rn(),
            _ => Register::NONE,
        }
    }

    /// Load relative to pc with an immediate offset
    pub fn is_literal_load(&self, i: Instruction) -> bool {
        use InstructionClass as C;
        let pc_base = i.rn() == Register::PC;
        match self.class {
            C::LoadStore2RegisterImm12Op { load, .. }
            | C::LoadStore2RegisterImm8Op { load, .. }
            | C::LoadStoreVectorRegister { load } => load && pc_base,
            C::PreloadRegisterImm12Op => pc_base,
            _ => false,
        }
    }

    pub fn branch_target_register(&self, i: Instruction) -> Register {
        match self.class {
            InstructionClass::BranchToRegister { .. } => i.rm(),
            _ => Register::NONE,
        }
    }

    pub fn is_relative_branch(&self, _i: Instruction) -> bool {
        matches!(self.class, InstructionClass::BranchImmediate24 { .. })
    }

    /// Offset of a relative branch target from the branch's own address
    pub fn branch_target_offset(&self, i: Instruction) -> i32 {
        match self.class {
            InstructionClass::BranchImmediate24 { .. } => i.relative_address(),
            _ => 0,
        }
    }

    pub fn is_literal_pool_head(&self, i: Instruction) -> bool {
        matches!(self.class, InstructionClass::BreakPointAndConstantPoolHead)
            && i.imm16_split() == LITERAL_POOL_HEAD_IMMEDIATE
    }

    /// True if every bit of `mask` is zero in the written register
    pub fn clears_bits(&self, i: Instruction, mask: u32) -> bool {
        match self.class {
            InstructionClass::Binary2RegisterImmediateOp(ImmediateMasking::And) => {
                i.modified_immediate() & mask == 0
            }
            InstructionClass::Binary2RegisterImmediateOp(ImmediateMasking::Bic) => {
                i.modified_immediate() & mask == mask
            }
            InstructionClass::Unary1RegisterBitRangeMsbGeLsb => {
                let (lsb, msb) = bit_range(i);
                if msb < lsb {
                    return false;
                }
                let width = msb - lsb + 1;
                let range = if width == 32 {
                    u32::MAX
                } else {
                    ((1u32 << width) - 1) << lsb
                };
                mask & range == mask
            }
            _ => false,
        }
    }

    /// True if the instruction sets Z exactly when the `mask` bits of `r` are clear
    pub fn sets_z_if_bits_clear(&self, i: Instruction, r: Register, mask: u32) -> bool {
        match self.class {
            InstructionClass::BinaryRegisterImmediateTest { tst: true } => {
                i.rn() == r && i.modified_immediate() & mask == mask
            }
            _ => false,
        }
    }

    /// `ldr Rt, [r9]` or `ldr Rt, [r9, #4]`
    pub fn is_load_thread_address_pointer(&self, i: Instruction) -> bool {
        match self.class {
            InstructionClass::LoadStore2RegisterImm12Op {
                load: true,
                byte: false,
            } => {
                i.pre_indexed()
                    && !i.writeback_bit()
                    && i.adds_offset()
                    && i.rn() == Register::TP
                    && matches!(i.imm12(), 0 | 4)
            }
            _ => false,
        }
    }

    /// Base register writeback by an immediate small enough to stay inside
    /// the guard regions
    pub fn base_address_register_writeback_small_immediate(&self, i: Instruction) -> bool {
        use InstructionClass as C;
        match self.class {
            C::LoadStore2RegisterImm12Op { .. } | C::LoadStore2RegisterImm8Op { .. } => {
                i.has_writeback()
            }
            C::LoadRegisterList | C::StoreRegisterList | C::LoadStoreVectorRegisterList { .. } => {
                i.writeback_bit()
            }
            C::VectorLoadStore => i.rm() == SIZE_WRITEBACK,
            _ => false,
        }
    }

    /// Registers written by small-immediate base writeback
    pub fn immediate_addressing_defs(&self, i: Instruction) -> RegisterList {
        if self.base_address_register_writeback_small_immediate(i) {
            RegisterList::single(self.base_address_register(i))
        } else {
            RegisterList::EMPTY
        }
    }
}

#[cfg(test)]
mod tests {
    use sfi_core::{Register, RegisterList, SafetyLevel};

    use super::{ClassDecoder, ImmediateMasking, InstructionClass};
    use crate::Instruction;

    const AND: ClassDecoder = ClassDecoder::new(
        "and",
        InstructionClass::Binary2RegisterImmediateOp(ImmediateMasking::And),
    );
    const BIC: ClassDecoder = ClassDecoder::new(
        "bic",
        InstructionClass::Binary2RegisterImmediateOp(ImmediateMasking::Bic),
    );
    const LDR: ClassDecoder = ClassDecoder::new(
        "ldr",
        InstructionClass::LoadStore2RegisterImm12Op {
            load: true,
            byte: false,
        },
    );

    #[test]
    fn test_unsafe_defaults_are_conservative() {
        let decoder = ClassDecoder::new("x", InstructionClass::Unsafe(SafetyLevel::NotImplemented));
        let i = Instruction::new(0);
        assert_eq!(decoder.defs(i), RegisterList::EVERYTHING);
        assert_eq!(decoder.uses(i), RegisterList::EMPTY);
        assert_eq!(decoder.base_address_register(i), Register::NONE);
        assert_eq!(decoder.branch_target_register(i), Register::NONE);
        assert!(!decoder.clears_bits(i, 0xc000_0000));
        assert_eq!(decoder.branch_target_offset(i), 0);
    }

    #[test]
    fn test_and_clears_zero_bits() {
        // and r1, r1, #0xff
        let i = Instruction::new(0xe20110ff);
        assert!(AND.clears_bits(i, 0xc000_0000));
        assert!(!AND.clears_bits(i, 0x0000_000f));
    }

    #[test]
    fn test_bic_clears_set_bits() {
        // bic r1, r1, #0xc0000000
        let i = Instruction::new(0xe3c11103);
        assert!(BIC.clears_bits(i, 0xc000_0000));
        assert!(!BIC.clears_bits(i, 0xc000_000f));
        assert_eq!(BIC.defs(i), RegisterList::single(Register::R1));
    }

    #[test]
    fn test_bic_of_pc_is_left_to_rules() {
        // bic pc, r0, #0xc000000f
        let i = Instruction::new(0xe3c0f2fc);
        assert!(BIC.clears_bits(i, 0xc000_000f));
        assert_eq!(BIC.safety(i), SafetyLevel::MayBeSafe);
        // and pc, r0, #0xff
        assert_eq!(AND.safety(Instruction::new(0xe200f0ff)), SafetyLevel::ForbiddenOperands);
    }

    #[test]
    fn test_load_writeback() {
        // ldr r0, [r1], #4
        let i = Instruction::new(0xe4910004);
        assert_eq!(LDR.safety(i), SafetyLevel::MayBeSafe);
        assert_eq!(
            LDR.defs(i),
            RegisterList::single(Register::R0).add(Register::R1)
        );
        assert!(LDR.base_address_register_writeback_small_immediate(i));
        assert_eq!(LDR.immediate_addressing_defs(i), RegisterList::single(Register::R1));
        // ldr r1, [r1], #4
        assert_eq!(
            LDR.safety(Instruction::new(0xe4911004)),
            SafetyLevel::Unpredictable
        );
        // ldr pc, [r1]
        assert_eq!(
            LDR.safety(Instruction::new(0xe591f000)),
            SafetyLevel::ForbiddenOperands
        );
    }

    #[test]
    fn test_thread_pointer_loads() {
        // ldr r0, [r9]
        assert!(LDR.is_load_thread_address_pointer(Instruction::new(0xe5990000)));
        // ldr r0, [r9, #4]
        assert!(LDR.is_load_thread_address_pointer(Instruction::new(0xe5990004)));
        // ldr r0, [r9, #8]
        assert!(!LDR.is_load_thread_address_pointer(Instruction::new(0xe5990008)));
        // ldr r0, [r9, #-4]
        assert!(!LDR.is_load_thread_address_pointer(Instruction::new(0xe5190004)));
    }

    #[test]
    fn test_literal_load() {
        // ldr r0, [pc, #8]
        let i = Instruction::new(0xe59f0008);
        assert!(LDR.is_literal_load(i));
        assert_eq!(LDR.base_address_register(i), Register::PC);
    }

    #[test]
    fn test_bfc_clears_range() {
        let bfc = ClassDecoder::new("bfc", InstructionClass::Unary1RegisterBitRangeMsbGeLsb);
        // bfc r0, #30, #2
        let i = Instruction::new(0xe7df0f1f);
        assert!(bfc.clears_bits(i, 0xc000_0000));
        assert!(!bfc.clears_bits(i, 0xc000_000f));
        assert_eq!(bfc.safety(i), SafetyLevel::MayBeSafe);
    }

    #[test]
    fn test_tst_sets_z() {
        let tst = ClassDecoder::new(
            "tst",
            InstructionClass::BinaryRegisterImmediateTest { tst: true },
        );
        // tst r1, #0xc0000000
        let i = Instruction::new(0xe3110103);
        assert!(tst.sets_z_if_bits_clear(i, Register::R1, 0xc000_0000));
        assert!(!tst.sets_z_if_bits_clear(i, Register::R2, 0xc000_0000));
        assert_eq!(tst.defs(i), RegisterList::single(Register::CONDITIONS));
    }
}
