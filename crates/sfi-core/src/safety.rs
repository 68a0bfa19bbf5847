// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Safety of an instruction in isolation
///
/// Only [`SafetyLevel::MayBeSafe`] instructions go on to the pairwise rules;
/// every other level rejects the code. The ordering exists for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SafetyLevel {
    /// Uninitialised classification, treated as unsafe
    Unknown = 0,
    /// Left undefined by the architecture
    Undefined,
    /// Not recognised by the decoder
    NotImplemented,
    /// Unpredictable effects at runtime
    Unpredictable,
    /// Deprecated by the architecture
    Deprecated,
    /// Forbidden by the sandbox model
    Forbidden,
    /// Operands forbidden by the sandbox model
    ForbiddenOperands,
    /// Nothing unsafe in isolation
    MayBeSafe,
}

impl SafetyLevel {
    /// Every level below `MayBeSafe`, in order
    pub const UNSAFE_LEVELS: [SafetyLevel; 7] = [
        SafetyLevel::Unknown,
        SafetyLevel::Undefined,
        SafetyLevel::NotImplemented,
        SafetyLevel::Unpredictable,
        SafetyLevel::Deprecated,
        SafetyLevel::Forbidden,
        SafetyLevel::ForbiddenOperands,
    ];

    pub const fn is_safe(self) -> bool {
        matches!(self, SafetyLevel::MayBeSafe)
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyLevel::Unknown => write!(f, "unknown instruction safety"),
            SafetyLevel::Undefined => write!(f, "undefined instruction"),
            SafetyLevel::NotImplemented => write!(f, "instruction not implemented by decoder"),
            SafetyLevel::Unpredictable => write!(f, "unpredictable instruction"),
            SafetyLevel::Deprecated => write!(f, "deprecated instruction"),
            SafetyLevel::Forbidden => write!(f, "instruction forbidden by sandbox"),
            SafetyLevel::ForbiddenOperands => write!(f, "operands forbidden by sandbox"),
            SafetyLevel::MayBeSafe => write!(f, "may be safe"),
        }
    }
}
