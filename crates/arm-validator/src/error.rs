// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors that can occur while splitting code into instruction words
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("code size {size} is not aligned to 4 bytes (truncated section?)")]
    UnalignedCode { size: usize },
}
