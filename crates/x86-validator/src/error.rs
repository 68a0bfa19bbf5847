// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors that can occur while decoding an x86-32 byte stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("code size {size} is not a multiple of the 32-byte bundle size")]
    UnalignedCode { size: usize },

    #[error("invalid instruction at offset {offset:#x}: {message}")]
    InvalidInstruction { offset: usize, message: String },
}

/// A bundle containing a jump destination that is not an instruction start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("bad jump to around {offset:#x}")]
pub struct BadJumpTarget {
    /// Offset of the bundle holding the bad destination
    pub offset: usize,
}

/// Where and why the automaton stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{reason} at offset {begin:#x}")]
pub struct Rejection {
    /// Start of the rejected instruction, prefixes included
    pub begin: usize,
    /// The byte the automaton could not consume
    pub offset: usize,
    pub reason: &'static str,
}

impl From<Rejection> for DecodeError {
    fn from(rejection: Rejection) -> Self {
        DecodeError::InvalidInstruction {
            offset: rejection.begin,
            message: rejection.reason.to_string(),
        }
    }
}
