// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

/// A sparse, ordered set of code addresses
///
/// Used for the addresses that must not be branch targets (the second half of
/// a masking pattern, literal pool words) and for recorded direct branches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressSet {
    addresses: BTreeSet<u32>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an address, returning `true` if it was not already present
    pub fn add(&mut self, address: u32) -> bool {
        self.addresses.insert(address)
    }

    pub fn remove(&mut self, address: u32) -> bool {
        self.addresses.remove(&address)
    }

    pub fn contains(&self, address: u32) -> bool {
        self.addresses.contains(&address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Iterates in ascending address order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.addresses.iter().copied()
    }
}

impl FromIterator<u32> for AddressSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        AddressSet {
            addresses: iter.into_iter().collect(),
        }
    }
}

impl Extend<u32> for AddressSet {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        self.addresses.extend(iter);
    }
}
