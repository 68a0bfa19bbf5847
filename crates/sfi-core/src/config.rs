// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sandbox policy and bundle geometry
//!
//! An [`SfiConfig`] is built once per validation policy and only read
//! afterwards. The builder methods consume and return the config so a policy
//! reads as one expression:
//!
//! ```
//! use sfi_core::{FailurePolicy, Register, RegisterList, SfiConfig};
//!
//! let config = SfiConfig::new(16, 0xC000000F, 0xC0000000)
//!     .unwrap()
//!     .with_data_address_registers(RegisterList::single(Register::SP))
//!     .with_failure_policy(FailurePolicy::CollectAll);
//! assert!(config.is_data_address_register(Register::SP));
//! ```

use crate::{ConfigError, Register, RegisterList, ValidationError};

/// A bundle-aligned region of code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bundle {
    begin: u32,
    size: u32,
}

impl Bundle {
    pub const fn new(begin: u32, size: u32) -> Self {
        Bundle { begin, size }
    }

    pub const fn begin_addr(&self) -> u32 {
        self.begin
    }

    /// One past the last byte; wraps at the top of the address space
    pub const fn end_addr(&self) -> u32 {
        self.begin.wrapping_add(self.size)
    }

    pub const fn size(&self) -> u32 {
        self.size
    }

    pub const fn contains(&self, address: u32) -> bool {
        address.wrapping_sub(self.begin) < self.size
    }
}

/// What a validator does after the first violation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FailurePolicy {
    /// Stop at the first reported violation
    #[default]
    AbortOnFirst,
    /// Scan the whole region and report every violation
    CollectAll,
}

/// Smallest instruction word a RISC bundle must hold
const MIN_BUNDLE_SIZE: u32 = 4;

/// Validator configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SfiConfig {
    bundle_size: u32,
    code_address_mask: u32,
    data_address_mask: u32,
    data_address_registers: RegisterList,
    code_address_registers: RegisterList,
    read_only_registers: RegisterList,
    conditional_memory_access: bool,
    failure_policy: FailurePolicy,
}

impl SfiConfig {
    /// Creates a config with no special registers.
    ///
    /// The bundle size must be a power of two of at least one instruction word.
    pub fn new(
        bundle_size: u32,
        code_address_mask: u32,
        data_address_mask: u32,
    ) -> Result<Self, ConfigError> {
        if !bundle_size.is_power_of_two() {
            return Err(ConfigError::BundleSizeNotPowerOfTwo { bundle_size });
        }
        if bundle_size < MIN_BUNDLE_SIZE {
            return Err(ConfigError::BundleSizeTooSmall {
                bundle_size,
                minimum: MIN_BUNDLE_SIZE,
            });
        }
        Ok(SfiConfig {
            bundle_size,
            code_address_mask,
            data_address_mask,
            data_address_registers: RegisterList::EMPTY,
            code_address_registers: RegisterList::EMPTY,
            read_only_registers: RegisterList::EMPTY,
            conditional_memory_access: false,
            failure_policy: FailurePolicy::AbortOnFirst,
        })
    }

    /// The standard ARM sandbox: 16-byte bundles, 1GiB data region, `sp` as
    /// the only data-address register and `r9` read-only.
    pub fn arm() -> Self {
        SfiConfig {
            bundle_size: 16,
            code_address_mask: 0xC000_000F,
            data_address_mask: 0xC000_0000,
            data_address_registers: RegisterList::single(Register::SP),
            code_address_registers: RegisterList::EMPTY,
            read_only_registers: RegisterList::single(Register::TP),
            conditional_memory_access: false,
            failure_policy: FailurePolicy::AbortOnFirst,
        }
    }

    /// The standard x86-32 sandbox: 32-byte bundles, segment-based data
    /// confinement so the masks are unused.
    pub fn x86_32() -> Self {
        SfiConfig {
            bundle_size: 32,
            code_address_mask: 0,
            data_address_mask: 0,
            data_address_registers: RegisterList::EMPTY,
            code_address_registers: RegisterList::EMPTY,
            read_only_registers: RegisterList::EMPTY,
            conditional_memory_access: false,
            failure_policy: FailurePolicy::AbortOnFirst,
        }
    }

    pub fn with_data_address_registers(mut self, registers: RegisterList) -> Self {
        self.data_address_registers = registers;
        self
    }

    pub fn with_code_address_registers(mut self, registers: RegisterList) -> Self {
        self.code_address_registers = registers;
        self
    }

    pub fn with_read_only_registers(mut self, registers: RegisterList) -> Self {
        self.read_only_registers = registers;
        self
    }

    /// Allows `tst`-guarded conditional loads and stores
    pub fn with_conditional_memory_access(mut self, allowed: bool) -> Self {
        self.conditional_memory_access = allowed;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn bundle_size(&self) -> u32 {
        self.bundle_size
    }

    pub fn code_address_mask(&self) -> u32 {
        self.code_address_mask
    }

    pub fn data_address_mask(&self) -> u32 {
        self.data_address_mask
    }

    pub fn data_address_registers(&self) -> RegisterList {
        self.data_address_registers
    }

    pub fn code_address_registers(&self) -> RegisterList {
        self.code_address_registers
    }

    pub fn read_only_registers(&self) -> RegisterList {
        self.read_only_registers
    }

    pub fn is_data_address_register(&self, register: Register) -> bool {
        self.data_address_registers.contains(register)
    }

    pub fn conditional_memory_access_allowed(&self) -> bool {
        self.conditional_memory_access
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn bundle_for_address(&self, address: u32) -> Bundle {
        Bundle::new(address & !(self.bundle_size - 1), self.bundle_size)
    }

    pub fn is_bundle_head(&self, address: u32) -> bool {
        address & (self.bundle_size - 1) == 0
    }

    pub fn in_same_bundle(&self, first: u32, second: u32) -> bool {
        self.bundle_for_address(first) == self.bundle_for_address(second)
    }

    /// Checks that `size` bytes of code at `base` form whole bundles that fit
    /// the 32-bit address space.
    pub fn check_region(&self, base: u32, size: usize) -> Result<(), ValidationError> {
        let bundle_size = self.bundle_size;
        if size % bundle_size as usize != 0 {
            return Err(ValidationError::UnalignedCode { size, bundle_size });
        }
        if !self.is_bundle_head(base) {
            return Err(ValidationError::UnalignedBase { base, bundle_size });
        }
        if u64::from(base) + size as u64 > 1 << 32 {
            return Err(ValidationError::CodeTooLarge { base, size });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Bundle, FailurePolicy, SfiConfig};
    use crate::{ConfigError, Register, ValidationError};

    #[test]
    fn test_rejects_invalid_bundle_sizes() {
        assert!(matches!(
            SfiConfig::new(24, 0, 0),
            Err(ConfigError::BundleSizeNotPowerOfTwo { bundle_size: 24 })
        ));
        assert!(matches!(
            SfiConfig::new(2, 0, 0),
            Err(ConfigError::BundleSizeTooSmall { bundle_size: 2, .. })
        ));
        assert!(matches!(
            SfiConfig::new(0, 0, 0),
            Err(ConfigError::BundleSizeNotPowerOfTwo { .. })
        ));
    }

    #[test]
    fn test_bundle_geometry() {
        let config = SfiConfig::arm();
        let bundle = config.bundle_for_address(0x1014);
        assert_eq!(bundle, Bundle::new(0x1010, 16));
        assert_eq!(bundle.end_addr(), 0x1020);
        assert!(bundle.contains(0x101c));
        assert!(!bundle.contains(0x1020));
        assert!(config.is_bundle_head(0x1010));
        assert!(!config.is_bundle_head(0x1014));
        assert!(config.in_same_bundle(0x1010, 0x101c));
        assert!(!config.in_same_bundle(0x100c, 0x1010));
    }

    #[test]
    fn test_top_bundle_wraps() {
        let bundle = SfiConfig::arm().bundle_for_address(0xffff_fffc);
        assert_eq!(bundle.begin_addr(), 0xffff_fff0);
        assert_eq!(bundle.end_addr(), 0);
        assert!(bundle.contains(0xffff_fffc));
    }

    #[test]
    fn test_builders() {
        let config = SfiConfig::new(32, 0xC000001F, 0xC0000000)
            .unwrap()
            .with_conditional_memory_access(true)
            .with_failure_policy(FailurePolicy::CollectAll);
        assert!(config.conditional_memory_access_allowed());
        assert_eq!(config.failure_policy(), FailurePolicy::CollectAll);
        assert!(!config.is_data_address_register(Register::SP));
        assert!(SfiConfig::arm().is_data_address_register(Register::SP));
        assert!(SfiConfig::arm().read_only_registers().contains(Register::TP));
    }

    #[test]
    fn test_check_region() {
        let config = SfiConfig::arm();
        assert!(config.check_region(0x1000, 0x40).is_ok());
        assert!(config.check_region(0x1000, 0).is_ok());
        assert!(matches!(
            config.check_region(0x1000, 0x44),
            Err(ValidationError::UnalignedCode { size: 0x44, bundle_size: 16 })
        ));
        assert!(matches!(
            config.check_region(0x1004, 0x40),
            Err(ValidationError::UnalignedBase { base: 0x1004, .. })
        ));
        assert!(config.check_region(0xffff_fff0, 0x10).is_ok());
        assert!(matches!(
            config.check_region(0xffff_fff0, 0x20),
            Err(ValidationError::CodeTooLarge { .. })
        ));
    }
}
