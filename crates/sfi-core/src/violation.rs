// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Violation kinds and violation sets

use std::fmt;

use bitflags::bitflags;

use crate::SafetyLevel;

/// A single kind of SFI rule violation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Violation {
    UnknownSafety,
    UndefinedSafety,
    NotImplementedSafety,
    UnpredictableSafety,
    DeprecatedSafety,
    ForbiddenSafety,
    ForbiddenOperandsSafety,
    LoadStore,
    LoadStoreCrossesBundle,
    BranchMask,
    BranchMaskCrossesBundle,
    DataRegisterUpdate,
    DataRegisterUpdateCrossesBundle,
    CallPosition,
    ReadOnly,
    ReadThreadLocalPointer,
    PcWrites,
    BranchSplitsPattern,
    BranchInvalidDestination,
    UnrecognizedInstruction,
    DirectJumpOutOfRange,
    BadJumpTarget,
}

impl Violation {
    /// Every violation kind, in declaration order
    pub const ALL: [Violation; 22] = [
        Violation::UnknownSafety,
        Violation::UndefinedSafety,
        Violation::NotImplementedSafety,
        Violation::UnpredictableSafety,
        Violation::DeprecatedSafety,
        Violation::ForbiddenSafety,
        Violation::ForbiddenOperandsSafety,
        Violation::LoadStore,
        Violation::LoadStoreCrossesBundle,
        Violation::BranchMask,
        Violation::BranchMaskCrossesBundle,
        Violation::DataRegisterUpdate,
        Violation::DataRegisterUpdateCrossesBundle,
        Violation::CallPosition,
        Violation::ReadOnly,
        Violation::ReadThreadLocalPointer,
        Violation::PcWrites,
        Violation::BranchSplitsPattern,
        Violation::BranchInvalidDestination,
        Violation::UnrecognizedInstruction,
        Violation::DirectJumpOutOfRange,
        Violation::BadJumpTarget,
    ];

    /// The violation reported for an instruction of the given safety.
    ///
    /// Returns `None` for [`SafetyLevel::MayBeSafe`].
    pub const fn from_safety(level: SafetyLevel) -> Option<Violation> {
        match level {
            SafetyLevel::Unknown => Some(Violation::UnknownSafety),
            SafetyLevel::Undefined => Some(Violation::UndefinedSafety),
            SafetyLevel::NotImplemented => Some(Violation::NotImplementedSafety),
            SafetyLevel::Unpredictable => Some(Violation::UnpredictableSafety),
            SafetyLevel::Deprecated => Some(Violation::DeprecatedSafety),
            SafetyLevel::Forbidden => Some(Violation::ForbiddenSafety),
            SafetyLevel::ForbiddenOperands => Some(Violation::ForbiddenOperandsSafety),
            SafetyLevel::MayBeSafe => None,
        }
    }

    pub const fn is_safety(self) -> bool {
        (self as u32) <= Violation::ForbiddenOperandsSafety as u32
    }

    pub const fn bit(self) -> ViolationSet {
        ViolationSet::from_bits_retain(1 << self as u32)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Violation::UnknownSafety => "unknown instruction safety",
            Violation::UndefinedSafety => "undefined instruction",
            Violation::NotImplementedSafety => "instruction not implemented",
            Violation::UnpredictableSafety => "unpredictable instruction",
            Violation::DeprecatedSafety => "deprecated instruction",
            Violation::ForbiddenSafety => "forbidden instruction",
            Violation::ForbiddenOperandsSafety => "forbidden operands",
            Violation::LoadStore => "unsafe load/store",
            Violation::LoadStoreCrossesBundle => "load/store mask crosses bundle",
            Violation::BranchMask => "unsafe indirect branch",
            Violation::BranchMaskCrossesBundle => "branch mask crosses bundle",
            Violation::DataRegisterUpdate => "unsafe data register update",
            Violation::DataRegisterUpdateCrossesBundle => "data register update crosses bundle",
            Violation::CallPosition => "misaligned call",
            Violation::ReadOnly => "write to read-only register",
            Violation::ReadThreadLocalPointer => "illegal read of thread pointer",
            Violation::PcWrites => "unsafe write to pc",
            Violation::BranchSplitsPattern => "branch splits instruction pattern",
            Violation::BranchInvalidDestination => "branch to invalid destination",
            Violation::UnrecognizedInstruction => "unrecognized instruction",
            Violation::DirectJumpOutOfRange => "direct jump out of range",
            Violation::BadJumpTarget => "bad jump target",
        };
        f.write_str(text)
    }
}

bitflags! {
    /// A set of violations found for one instruction pair
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ViolationSet: u32 {
        const UNKNOWN_SAFETY = 1 << Violation::UnknownSafety as u32;
        const UNDEFINED_SAFETY = 1 << Violation::UndefinedSafety as u32;
        const NOT_IMPLEMENTED_SAFETY = 1 << Violation::NotImplementedSafety as u32;
        const UNPREDICTABLE_SAFETY = 1 << Violation::UnpredictableSafety as u32;
        const DEPRECATED_SAFETY = 1 << Violation::DeprecatedSafety as u32;
        const FORBIDDEN_SAFETY = 1 << Violation::ForbiddenSafety as u32;
        const FORBIDDEN_OPERANDS_SAFETY = 1 << Violation::ForbiddenOperandsSafety as u32;
        const LOAD_STORE = 1 << Violation::LoadStore as u32;
        const LOAD_STORE_CROSSES_BUNDLE = 1 << Violation::LoadStoreCrossesBundle as u32;
        const BRANCH_MASK = 1 << Violation::BranchMask as u32;
        const BRANCH_MASK_CROSSES_BUNDLE = 1 << Violation::BranchMaskCrossesBundle as u32;
        const DATA_REGISTER_UPDATE = 1 << Violation::DataRegisterUpdate as u32;
        const DATA_REGISTER_UPDATE_CROSSES_BUNDLE =
            1 << Violation::DataRegisterUpdateCrossesBundle as u32;
        const CALL_POSITION = 1 << Violation::CallPosition as u32;
        const READ_ONLY = 1 << Violation::ReadOnly as u32;
        const READ_THREAD_LOCAL_POINTER = 1 << Violation::ReadThreadLocalPointer as u32;
        const PC_WRITES = 1 << Violation::PcWrites as u32;
        const BRANCH_SPLITS_PATTERN = 1 << Violation::BranchSplitsPattern as u32;
        const BRANCH_INVALID_DESTINATION = 1 << Violation::BranchInvalidDestination as u32;
        const UNRECOGNIZED_INSTRUCTION = 1 << Violation::UnrecognizedInstruction as u32;
        const DIRECT_JUMP_OUT_OF_RANGE = 1 << Violation::DirectJumpOutOfRange as u32;
        const BAD_JUMP_TARGET = 1 << Violation::BadJumpTarget as u32;

        const SAFETY = Self::UNKNOWN_SAFETY.bits()
            | Self::UNDEFINED_SAFETY.bits()
            | Self::NOT_IMPLEMENTED_SAFETY.bits()
            | Self::UNPREDICTABLE_SAFETY.bits()
            | Self::DEPRECATED_SAFETY.bits()
            | Self::FORBIDDEN_SAFETY.bits()
            | Self::FORBIDDEN_OPERANDS_SAFETY.bits();
    }
}

impl ViolationSet {
    /// The singleton set for an unsafe level; empty for `MayBeSafe`
    pub const fn from_safety(level: SafetyLevel) -> Self {
        match Violation::from_safety(level) {
            Some(violation) => violation.bit(),
            None => ViolationSet::empty(),
        }
    }

    pub fn contains_violation(self, violation: Violation) -> bool {
        self.contains(violation.bit())
    }

    pub const fn contains_safety_violations(self) -> bool {
        self.intersects(ViolationSet::SAFETY)
    }

    /// The violations in this set, in declaration order
    pub fn violations(self) -> impl Iterator<Item = Violation> {
        Violation::ALL
            .into_iter()
            .filter(move |violation| self.contains(violation.bit()))
    }
}

impl From<Violation> for ViolationSet {
    fn from(violation: Violation) -> Self {
        violation.bit()
    }
}

#[cfg(test)]
mod tests {
    use super::{Violation, ViolationSet};
    use crate::SafetyLevel;

    #[test]
    fn test_one_bit_per_violation() {
        let all = Violation::ALL
            .into_iter()
            .fold(ViolationSet::empty(), |set, v| set | v.bit());
        assert_eq!(all.bits().count_ones() as usize, Violation::ALL.len());
        assert_eq!(all.violations().collect::<Vec<_>>(), Violation::ALL.to_vec());
    }

    #[test]
    fn test_safety_levels_map_to_safety_bits() {
        for level in SafetyLevel::UNSAFE_LEVELS {
            let set = ViolationSet::from_safety(level);
            assert_eq!(set.bits().count_ones(), 1);
            assert!(set.contains_safety_violations());
        }
        assert!(ViolationSet::from_safety(SafetyLevel::MayBeSafe).is_empty());
    }

    #[test]
    fn test_rule_bits_are_not_safety() {
        let set = ViolationSet::LOAD_STORE | ViolationSet::CALL_POSITION;
        assert!(!set.contains_safety_violations());
        assert!(set.contains_violation(Violation::CallPosition));
        assert!(!Violation::PcWrites.is_safety());
        assert!(Violation::ForbiddenOperandsSafety.is_safety());
        assert_eq!(
            set.violations().collect::<Vec<_>>(),
            vec![Violation::LoadStore, Violation::CallPosition]
        );
    }
}
