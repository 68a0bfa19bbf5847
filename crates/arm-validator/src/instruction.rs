// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! 32-bit A32 instruction words and field extraction

use std::fmt;

use sfi_core::{Register, RegisterList};

/// Condition field (bits 28-31)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Condition {
    Eq = 0,
    Ne,
    Cs,
    Cc,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
    /// `0b1111`: the unconditional instruction space
    Unconditional,
}

impl Condition {
    const ALL: [Condition; 16] = [
        Condition::Eq,
        Condition::Ne,
        Condition::Cs,
        Condition::Cc,
        Condition::Mi,
        Condition::Pl,
        Condition::Vs,
        Condition::Vc,
        Condition::Hi,
        Condition::Ls,
        Condition::Ge,
        Condition::Lt,
        Condition::Gt,
        Condition::Le,
        Condition::Al,
        Condition::Unconditional,
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Condition::ALL[(bits & 0xf) as usize]
    }

    /// True if the instruction executes regardless of the flags
    pub const fn is_always(self) -> bool {
        matches!(self, Condition::Al | Condition::Unconditional)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Condition::Eq => "eq",
            Condition::Ne => "ne",
            Condition::Cs => "cs",
            Condition::Cc => "cc",
            Condition::Mi => "mi",
            Condition::Pl => "pl",
            Condition::Vs => "vs",
            Condition::Vc => "vc",
            Condition::Hi => "hi",
            Condition::Ls => "ls",
            Condition::Ge => "ge",
            Condition::Lt => "lt",
            Condition::Gt => "gt",
            Condition::Le => "le",
            Condition::Al => "al",
            Condition::Unconditional => "uncond",
        };
        f.write_str(text)
    }
}

/// A raw instruction word
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Instruction(u32);

impl Instruction {
    pub const fn new(bits: u32) -> Self {
        Instruction(bits)
    }

    /// Little-endian word from the first four bytes of `bytes`
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Instruction(u32::from_le_bytes(bytes))
    }

    pub const fn word(self) -> u32 {
        self.0
    }

    /// Bits `hi..=lo`, shifted down
    pub const fn bits(self, hi: u32, lo: u32) -> u32 {
        debug_assert!(hi >= lo && hi < 32);
        let width = hi - lo + 1;
        let mask = if width == 32 { u32::MAX } else { (1 << width) - 1 };
        (self.0 >> lo) & mask
    }

    pub const fn bit(self, n: u32) -> bool {
        debug_assert!(n < 32);
        (self.0 >> n) & 1 == 1
    }

    pub const fn condition(self) -> Condition {
        Condition::from_bits(self.bits(31, 28))
    }

    pub const fn reg(self, lo: u32) -> Register {
        Register::new(self.bits(lo + 3, lo))
    }

    /// Register at bits 0-3
    pub const fn rm(self) -> Register {
        self.reg(0)
    }

    /// Register at bits 8-11
    pub const fn rs(self) -> Register {
        self.reg(8)
    }

    /// Register at bits 12-15 (`Rd` or `Rt`)
    pub const fn rd(self) -> Register {
        self.reg(12)
    }

    /// Register at bits 16-19
    pub const fn rn(self) -> Register {
        self.reg(16)
    }

    pub const fn imm4(self) -> u32 {
        self.bits(3, 0)
    }

    pub const fn imm5(self) -> u32 {
        self.bits(11, 7)
    }

    /// Split 8-bit immediate of the halfword/doubleword transfers
    pub const fn imm4_hi_lo(self) -> u32 {
        (self.bits(11, 8) << 4) | self.bits(3, 0)
    }

    pub const fn imm8(self) -> u32 {
        self.bits(7, 0)
    }

    pub const fn imm12(self) -> u32 {
        self.bits(11, 0)
    }

    /// `imm12:imm4` of BKPT and UDF
    pub const fn imm16_split(self) -> u32 {
        (self.bits(19, 8) << 4) | self.bits(3, 0)
    }

    pub const fn imm24(self) -> u32 {
        self.bits(23, 0)
    }

    /// Expands the 12-bit modified immediate: `imm8` rotated right by `2 * rot`
    pub const fn modified_immediate(self) -> u32 {
        let rotation = self.bits(11, 8) * 2;
        self.imm8().rotate_right(rotation)
    }

    /// Branch offset relative to the branch's own address.
    ///
    /// The immediate counts words and the pc reads 8 bytes ahead.
    pub const fn relative_address(self) -> i32 {
        ((self.imm24() << 8) as i32 >> 6) + 8
    }

    /// S: bit 20
    pub const fn updates_flags(self) -> bool {
        self.bit(20)
    }

    /// L: bit 20
    pub const fn is_load(self) -> bool {
        self.bit(20)
    }

    /// W: bit 21
    pub const fn writeback_bit(self) -> bool {
        self.bit(21)
    }

    /// B (or imm/reg selector): bit 22
    pub const fn bit22(self) -> bool {
        self.bit(22)
    }

    /// U: bit 23
    pub const fn adds_offset(self) -> bool {
        self.bit(23)
    }

    /// P: bit 24
    pub const fn pre_indexed(self) -> bool {
        self.bit(24)
    }

    /// True if the base register is written back (post-indexed, or `!`)
    pub const fn has_writeback(self) -> bool {
        !self.pre_indexed() || self.writeback_bit()
    }

    /// Register list of the block transfers (bits 0-15)
    pub const fn register_list(self) -> RegisterList {
        RegisterList::from_bits(self.bits(15, 0))
    }

    /// The condition register if the S bit is set
    pub const fn flags_if_updated(self) -> RegisterList {
        RegisterList::EMPTY.add_if(self.updates_flags(), Register::CONDITIONS)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use sfi_core::Register;

    use super::{Condition, Instruction};

    #[test]
    fn test_fields() {
        // ldr r0, [r1, #4]
        let inst = Instruction::new(0xe5910004);
        assert_eq!(inst.condition(), Condition::Al);
        assert_eq!(inst.rn(), Register::R1);
        assert_eq!(inst.rd(), Register::R0);
        assert_eq!(inst.imm12(), 4);
        assert!(inst.is_load());
        assert!(inst.pre_indexed());
        assert!(inst.adds_offset());
        assert!(!inst.has_writeback());
        assert_eq!(inst.bits(27, 25), 0b010);
    }

    #[test]
    fn test_modified_immediate() {
        // bic r0, r0, #0xc0000000
        assert_eq!(Instruction::new(0xe3c00103).modified_immediate(), 0xc000_0000);
        // and r0, r0, #0xff
        assert_eq!(Instruction::new(0xe20000ff).modified_immediate(), 0xff);
        // bic r0, r0, #0xc000003f
        assert_eq!(Instruction::new(0xe3c001ff).modified_immediate(), 0xc000_003f);
    }

    #[test]
    fn test_relative_address() {
        // b .+8
        assert_eq!(Instruction::new(0xea000000).relative_address(), 8);
        // b . (imm24 = -2)
        assert_eq!(Instruction::new(0xeafffffe).relative_address(), 0);
        // bl .+0x1000
        assert_eq!(Instruction::new(0xeb0003fe).relative_address(), 0x1000);
    }

    #[test]
    fn test_unconditional_space() {
        // pld [r0]
        let inst = Instruction::new(0xf5d0f000);
        assert_eq!(inst.condition(), Condition::Unconditional);
        assert!(inst.condition().is_always());
        assert!(!Condition::Eq.is_always());
    }
}
