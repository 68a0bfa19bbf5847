// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-byte bit sets over a code region, one `u32` word per bundle

use crate::BUNDLE_SIZE;
use crate::error::BadJumpTarget;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u32>,
}

impl Bitmap {
    /// A cleared bitmap covering `size` bytes
    pub fn new(size: usize) -> Self {
        Bitmap {
            words: vec![0; size.div_ceil(BUNDLE_SIZE)],
        }
    }

    pub fn set(&mut self, offset: usize) {
        if let Some(word) = self.words.get_mut(offset / BUNDLE_SIZE) {
            *word |= 1 << (offset % BUNDLE_SIZE);
        }
    }

    pub fn clear(&mut self, offset: usize) {
        if let Some(word) = self.words.get_mut(offset / BUNDLE_SIZE) {
            *word &= !(1 << (offset % BUNDLE_SIZE));
        }
    }

    pub fn is_set(&self, offset: usize) -> bool {
        self.word(offset / BUNDLE_SIZE) & (1 << (offset % BUNDLE_SIZE)) != 0
    }

    /// Bits of the bundle at `index`; zero past the end
    pub fn word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Offsets of all set bits, in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(index, &word)| {
            (0..BUNDLE_SIZE)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| index * BUNDLE_SIZE + bit)
        })
    }
}

/// Offsets of the bundles holding a jump destination that is not a valid
/// instruction start.
pub fn bad_jump_bundles<'a>(
    valid_targets: &'a Bitmap,
    jump_dests: &'a Bitmap,
) -> impl Iterator<Item = usize> + 'a {
    (0..jump_dests.len())
        .filter(|&index| jump_dests.word(index) & !valid_targets.word(index) != 0)
        .map(|index| index * BUNDLE_SIZE)
}

/// Checks that every recorded jump destination is an instruction start.
pub fn check_jump_targets(
    valid_targets: &Bitmap,
    jump_dests: &Bitmap,
) -> Result<(), BadJumpTarget> {
    match bad_jump_bundles(valid_targets, jump_dests).next() {
        Some(offset) => Err(BadJumpTarget { offset }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{Bitmap, bad_jump_bundles, check_jump_targets};
    use crate::error::BadJumpTarget;

    #[test]
    fn test_bitmap() {
        let mut bitmap = Bitmap::new(64);
        assert_eq!(bitmap.len(), 2);
        bitmap.set(0);
        bitmap.set(33);
        bitmap.set(100);
        assert!(bitmap.is_set(0));
        assert!(bitmap.is_set(33));
        assert!(!bitmap.is_set(100));
        assert_eq!(bitmap.word(1), 0b10);
        assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![0, 33]);
        bitmap.clear(33);
        assert_eq!(bitmap.word(1), 0);
    }

    #[test]
    fn test_check_jump_targets() {
        let mut valid = Bitmap::new(64);
        let mut jumps = Bitmap::new(64);
        for start in [0, 5, 10, 32, 37] {
            valid.set(start);
        }
        jumps.set(5);
        jumps.set(37);
        assert!(check_jump_targets(&valid, &jumps).is_ok());

        // into the middle of the instruction at 32
        jumps.set(34);
        jumps.set(7);
        assert_eq!(
            check_jump_targets(&valid, &jumps),
            Err(BadJumpTarget { offset: 0 })
        );
        assert_eq!(bad_jump_bundles(&valid, &jumps).collect::<Vec<_>>(), vec![0, 32]);
    }
}
