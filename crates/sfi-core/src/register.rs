// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Register identifiers and register sets
//!
//! Registers are small integers: the sixteen general purpose registers of the
//! RISC target plus a pseudo-register for the condition flags. A
//! [`RegisterList`] is a bitmask over those ids and is the vocabulary used to
//! describe which registers an instruction reads or writes.

use std::fmt;

/// A register identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Register(u8);

impl Register {
    pub const R0: Register = Register(0);
    pub const R1: Register = Register(1);
    pub const R2: Register = Register(2);
    pub const R3: Register = Register(3);
    pub const R4: Register = Register(4);
    pub const R5: Register = Register(5);
    pub const R6: Register = Register(6);
    pub const R7: Register = Register(7);
    pub const R8: Register = Register(8);
    pub const R9: Register = Register(9);
    pub const R10: Register = Register(10);
    pub const R11: Register = Register(11);
    pub const R12: Register = Register(12);
    /// Thread pointer, reserved by the sandbox (r9)
    pub const TP: Register = Register(9);
    pub const SP: Register = Register(13);
    pub const LR: Register = Register(14);
    pub const PC: Register = Register(15);
    /// The APSR condition flags, modelled as register 16
    pub const CONDITIONS: Register = Register(16);
    /// Sentinel for "no register"; never a member of any list
    pub const NONE: Register = Register(32);

    /// Number of general purpose registers
    pub const GPR_COUNT: u8 = 16;

    /// Creates a register from its number.
    ///
    /// Numbers outside `0..=16` map to [`Register::NONE`].
    pub const fn new(number: u32) -> Self {
        if number <= 16 {
            Register(number as u8)
        } else {
            Register::NONE
        }
    }

    pub const fn number(self) -> u32 {
        self.0 as u32
    }

    pub const fn is_none(self) -> bool {
        self.0 == Register::NONE.0
    }

    /// Bit of this register in a [`RegisterList`] (zero for `NONE`)
    pub const fn bit(self) -> u32 {
        if self.0 < 32 { 1 << self.0 } else { 0 }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Register::SP => write!(f, "sp"),
            Register::LR => write!(f, "lr"),
            Register::PC => write!(f, "pc"),
            Register::CONDITIONS => write!(f, "APSR"),
            Register::NONE => write!(f, "none"),
            Register(n) => write!(f, "r{n}"),
        }
    }
}

/// A set of registers, stored as a bitmask
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegisterList(u32);

impl RegisterList {
    pub const EMPTY: RegisterList = RegisterList(0);
    /// Maximally conservative set used when an instruction's effects are unknown
    pub const EVERYTHING: RegisterList = RegisterList(u32::MAX);

    const GPR_MASK: u32 = 0xffff;

    pub const fn from_bits(bits: u32) -> Self {
        RegisterList(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn single(register: Register) -> Self {
        RegisterList(register.bit())
    }

    /// Returns the list with `register` added (adding `NONE` is a no-op)
    pub const fn add(self, register: Register) -> Self {
        RegisterList(self.0 | register.bit())
    }

    /// Adds `register` only when `condition` holds
    pub const fn add_if(self, condition: bool, register: Register) -> Self {
        if condition { self.add(register) } else { self }
    }

    pub const fn union(self, other: RegisterList) -> Self {
        RegisterList(self.0 | other.0)
    }

    pub const fn intersect(self, other: RegisterList) -> Self {
        RegisterList(self.0 & other.0)
    }

    pub const fn contains(self, register: Register) -> bool {
        let bit = register.bit();
        bit != 0 && self.0 & bit == bit
    }

    pub const fn contains_all(self, other: RegisterList) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn contains_any(self, other: RegisterList) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of general purpose registers in the list
    pub const fn gpr_count(self) -> u32 {
        (self.0 & Self::GPR_MASK).count_ones()
    }

    /// Lowest numbered general purpose register, or `NONE`
    pub const fn smallest_gpr(self) -> Register {
        let gprs = self.0 & Self::GPR_MASK;
        if gprs == 0 {
            Register::NONE
        } else {
            Register(gprs.trailing_zeros() as u8)
        }
    }

    /// Iterates over the registers (r0-r15 and APSR) in the list
    pub fn iter(self) -> impl Iterator<Item = Register> {
        (0..=16u8)
            .map(Register)
            .filter(move |register| self.contains(*register))
    }
}

impl From<Register> for RegisterList {
    fn from(register: Register) -> Self {
        RegisterList::single(register)
    }
}

impl FromIterator<Register> for RegisterList {
    fn from_iter<I: IntoIterator<Item = Register>>(iter: I) -> Self {
        iter.into_iter().fold(RegisterList::EMPTY, RegisterList::add)
    }
}

impl fmt::Display for RegisterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == RegisterList::EVERYTHING {
            return write!(f, "{{*}}");
        }
        write!(f, "{{")?;
        for (index, register) in self.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{register}")?;
        }
        write!(f, "}}")
    }
}
