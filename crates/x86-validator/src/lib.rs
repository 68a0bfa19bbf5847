// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! SFI validator for x86-32 code
//!
//! Code is consumed one byte at a time by an automaton that recognizes a safe
//! subset of the instruction set. Each 32-byte bundle is decoded on its own,
//! so no instruction crosses a bundle boundary. Instruction starts and direct
//! jump destinations are recorded in per-bundle bitmaps and compared once the
//! whole region has been decoded.
//!
//! # Validation Checklist
//!
//! | Check | Description |
//! |-------|-------------|
//! | **Recognized instructions** | Every byte belongs to an accepted instruction: no `ret`, `int`, system instructions, far jumps and calls or segment writes |
//! | **Prefixes** | `66`/`F2`/`F3` and the VEX `pp` field select a listed form of the opcode, `lock` only on read-modify-write memory forms, hints only on `jcc`, `gs` only in thread pointer loads |
//! | **Bundle alignment** | Instructions never straddle a 32-byte bundle boundary |
//! | **Indirect jumps** | `jmp r`/`call r` only directly after `and r, -32` in the same bundle |
//! | **Direct jumps** | Destinations inside the region are instruction starts; destinations outside it are bundle aligned |
//!
//! # Example
//!
//! ```
//! use sfi_core::{SfiConfig, ValidationReport};
//! use x86_validator::validate;
//!
//! // and eax, -32 / call eax, padded with nops
//! let mut code = vec![0x83, 0xe0, 0xe0, 0xff, 0xd0];
//! code.resize(32, 0x90);
//! let report = ValidationReport::collect(|on_violation| {
//!     validate(&code, 0x10000, &SfiConfig::x86_32(), on_violation)
//! });
//! assert!(report.is_ok());
//! ```

mod automaton;
mod bitmap;
mod error;
mod opcodes;
mod validate;

/// Size of a code bundle; the automaton is reset at each bundle head
pub const BUNDLE_SIZE: usize = 32;

pub use automaton::{Automaton, DecodedInstruction, OpcodeMap, Prefixes, scan};
pub use bitmap::{Bitmap, bad_jump_bundles, check_jump_targets};
pub use error::{BadJumpTarget, DecodeError, Rejection};
pub use validate::{decode_instructions, valid_instruction_starts, validate};
