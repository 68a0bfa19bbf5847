// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for code validation

use thiserror::Error;

use crate::SafetyLevel;

/// Verdict of a validation call that did not accept the code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("code size {size:#x} is not a multiple of the bundle size {bundle_size}")]
    UnalignedCode { size: usize, bundle_size: u32 },

    #[error("base address {base:#x} is not aligned to the bundle size {bundle_size}")]
    UnalignedBase { base: u32, bundle_size: u32 },

    #[error("code of size {size:#x} at {base:#x} does not fit the address space")]
    CodeTooLarge { base: u32, size: usize },

    #[error("bundle size {bundle_size} is not supported by this decoder")]
    UnsupportedBundleSize { bundle_size: u32 },

    #[error("unsafe instruction at {address:#x}: {safety}")]
    UnsafeInstruction { address: u32, safety: SafetyLevel },

    #[error("unrecognized instruction at {address:#x}")]
    UnrecognizedInstruction { address: u32 },

    #[error("direct jump at {address:#x} to out of range target {target:#x}")]
    DirectJumpOutOfRange { address: u32, target: i64 },

    #[error("{count} SFI violation(s)")]
    Violations { count: usize },
}

impl ValidationError {
    /// True for errors that stop validation outright.
    ///
    /// Only [`ValidationError::Violations`] is soft: the code decoded but
    /// broke one or more rules.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ValidationError::Violations { .. })
    }
}

/// Invalid validator configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("bundle size {bundle_size} is not a power of two")]
    BundleSizeNotPowerOfTwo { bundle_size: u32 },

    #[error("bundle size {bundle_size} is smaller than the minimum of {minimum}")]
    BundleSizeTooSmall { bundle_size: u32, minimum: u32 },
}

#[cfg(test)]
mod tests {
    use super::ValidationError;
    use crate::SafetyLevel;

    #[test]
    fn test_tiers() {
        assert!(!ValidationError::Violations { count: 2 }.is_fatal());
        assert!(
            ValidationError::UnsafeInstruction {
                address: 0x20,
                safety: SafetyLevel::Forbidden
            }
            .is_fatal()
        );
        assert!(ValidationError::UnrecognizedInstruction { address: 0 }.is_fatal());
    }

    #[test]
    fn test_messages_carry_hex_addresses() {
        let error = ValidationError::UnsafeInstruction {
            address: 0x1004,
            safety: SafetyLevel::Forbidden,
        };
        assert_eq!(
            error.to_string(),
            "unsafe instruction at 0x1004: instruction forbidden by sandbox"
        );
    }
}
