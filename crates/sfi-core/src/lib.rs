// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared vocabulary for software fault isolation validators
//!
//! The architecture-specific validators (`arm-validator`, `x86-validator`)
//! report their findings in the terms defined here: register sets, instruction
//! safety levels, violation kinds, bundle geometry and the sandbox policy.
//!
//! # Validation Tiers
//!
//! | Tier | Meaning | Type |
//! |------|---------|------|
//! | **Caller error** | Misaligned region, bad bundle size | [`ValidationError::UnalignedCode`], [`ConfigError`] |
//! | **Fatal** | Undecodable or unsafe-in-isolation instruction, scan stops | [`ValidationError::UnsafeInstruction`], [`ValidationError::UnrecognizedInstruction`] |
//! | **Soft** | Code decodes but breaks a pairwise rule | [`ValidationError::Violations`] |
//!
//! Every individual finding is also reported through a callback
//! `FnMut(u32, Violation, Option<DiagnosticContext>)`; [`ValidationReport`]
//! collects them.

mod address_set;
mod config;
mod diagnostic;
mod error;
mod register;
mod report;
mod safety;
mod violation;

pub use address_set::AddressSet;
pub use config::{Bundle, FailurePolicy, SfiConfig};
pub use diagnostic::{DiagnosticContext, InstructionText, PairDetail, Problem};
pub use error::{ConfigError, ValidationError};
pub use register::{Register, RegisterList};
pub use report::{ReportEntry, ValidationReport};
pub use safety::SafetyLevel;
pub use violation::{Violation, ViolationSet};
