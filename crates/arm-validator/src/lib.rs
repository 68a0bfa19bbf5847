// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! SFI validator for 32-bit ARM code
//!
//! Checks that untrusted A32 machine code stays inside its sandbox. Every
//! word is classified by a table-driven decoder, then each instruction is
//! checked against the one before it: a masking instruction protects only
//! the instruction right after it, in the same bundle.
//!
//! # Validation Checklist
//!
//! | Check | Description |
//! |-------|-------------|
//! | **Instruction safety** | Undefined, unpredictable, deprecated and forbidden encodings (`svc`, `ldrex` on pc, ...) are fatal |
//! | **Load/store masking** | Base register is `sp`, pc-relative, the thread pointer idiom, or masked by the previous instruction |
//! | **Indirect branches** | Target register masked with the code mask by the previous instruction |
//! | **Data register updates** | Writes to `sp` keep it in the data region, directly or through the next instruction |
//! | **Call position** | `bl`/`blx` sit in the last slot of a bundle |
//! | **Read-only registers** | No instruction writes the thread pointer `r9` |
//! | **Thread pointer reads** | `r9` is only read by `ldr Rt, [r9]` and `ldr Rt, [r9, #4]` |
//! | **pc writes** | Only branches and `bic pc` masks write pc |
//! | **Branch targets** | Direct branches never split a masking pair or enter a literal pool; leaving the region requires a bundle head |
//!
//! # Literal Pools
//!
//! A bundle starting with `bkpt #0x7777` holds data: the rest of the bundle is
//! not decoded and may not be branched to.
//!
//! # Example
//!
//! ```
//! use arm_validator::validate;
//! use sfi_core::{SfiConfig, ValidationReport};
//!
//! // bic r1, r1, #0xc0000000 / ldr r0, [r1] / nop / nop
//! let code: Vec<u8> = [0xe3c11103u32, 0xe5910000, 0xe320f000, 0xe320f000]
//!     .iter()
//!     .flat_map(|word| word.to_le_bytes())
//!     .collect();
//! let report = ValidationReport::collect(|on_violation| {
//!     validate(&code, 0x10000, &SfiConfig::arm(), on_violation)
//! });
//! assert!(report.is_ok());
//! ```

mod class_decoder;
mod decoded;
mod dispatch;
mod error;
mod instruction;
mod rules;
mod validate;

pub use class_decoder::{ClassDecoder, ImmediateMasking, InstructionClass};
pub use decoded::DecodedInstruction;
pub use dispatch::decode;
pub use error::DecodeError;
pub use instruction::{Condition, Instruction};
pub use rules::{ScanState, check_pair, diagnose};
pub use validate::{decode_instructions, valid_instruction_starts, validate};
