// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI for the SFI validators
//!
//! Validates the `.text` section of an object file, or a file of raw code,
//! against the sandbox rules of its architecture. Exits with 0 if the code is
//! accepted and 1 otherwise; every violation is printed to stderr.
//!
//! # Usage
//!
//! ```bash
//! # ELF object, architecture and base address taken from the file
//! sfi-validate module.o
//!
//! # Raw code loaded at 0x20000, reporting every violation
//! sfi-validate --arch arm --base 0x20000 --collect-all code.bin
//! ```

use std::{fs, path::PathBuf, process};

use clap::{ArgAction, Parser, ValueEnum};
use log::{debug, info};
use object::{Architecture, Object, ObjectSection};
use sfi_core::{DiagnosticContext, FailurePolicy, SfiConfig, ValidationError, Violation};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Arch {
    /// 32-bit ARM (A32)
    Arm,
    /// x86-32
    #[value(name = "x86-32", alias = "x86")]
    X86,
}

#[derive(Parser)]
#[command(
    name = "sfi-validate",
    about = "Checks that untrusted machine code stays inside its SFI sandbox"
)]
struct Cli {
    /// Object file or raw code
    input: PathBuf,

    /// Target architecture; required for raw code
    #[arg(long, value_enum)]
    arch: Option<Arch>,

    /// Load address of the code (default: section address, or 0 for raw code)
    #[arg(long, value_parser = parse_u32)]
    base: Option<u32>,

    /// Bundle size in bytes
    #[arg(long)]
    bundle_size: Option<u32>,

    /// Bits that must be clear in indirect branch targets
    #[arg(long, value_parser = parse_u32)]
    code_mask: Option<u32>,

    /// Bits that must be clear in load/store addresses
    #[arg(long, value_parser = parse_u32)]
    data_mask: Option<u32>,

    /// Accept `tst`-guarded conditional loads and stores
    #[arg(long)]
    allow_conditional_memory: bool,

    /// Report every violation instead of stopping at the first
    #[arg(long)]
    collect_all: bool,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Parses a decimal or `0x`-prefixed hexadecimal number.
fn parse_u32(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => value.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid number {value:?}: {e}"))
}

/// Code to validate and what the file says about it
struct Code {
    bytes: Vec<u8>,
    arch: Option<Arch>,
    base: u32,
}

fn load(data: &[u8]) -> Result<Code, String> {
    let Ok(file) = object::File::parse(data) else {
        debug!("not an object file, validating raw code");
        return Ok(Code {
            bytes: data.to_vec(),
            arch: None,
            base: 0,
        });
    };

    let section = file
        .section_by_name(".text")
        .ok_or("no .text section found")?;
    let bytes = section
        .data()
        .map_err(|e| format!("failed to read .text: {e}"))?
        .to_vec();
    let base = u32::try_from(section.address())
        .map_err(|_| format!(".text address {:#x} is not 32-bit", section.address()))?;
    let arch = match file.architecture() {
        Architecture::Arm => Some(Arch::Arm),
        Architecture::I386 => Some(Arch::X86),
        other => {
            debug!("unsupported object architecture {other:?}");
            None
        }
    };
    Ok(Code { bytes, arch, base })
}

fn config(cli: &Cli, arch: Arch) -> Result<SfiConfig, String> {
    let standard = match arch {
        Arch::Arm => SfiConfig::arm(),
        Arch::X86 => SfiConfig::x86_32(),
    };
    let overridden =
        cli.bundle_size.is_some() || cli.code_mask.is_some() || cli.data_mask.is_some();
    let mut config = if overridden {
        SfiConfig::new(
            cli.bundle_size.unwrap_or(standard.bundle_size()),
            cli.code_mask.unwrap_or(standard.code_address_mask()),
            cli.data_mask.unwrap_or(standard.data_address_mask()),
        )
        .map_err(|e| e.to_string())?
        .with_data_address_registers(standard.data_address_registers())
        .with_code_address_registers(standard.code_address_registers())
        .with_read_only_registers(standard.read_only_registers())
    } else {
        standard
    };
    config = config.with_conditional_memory_access(cli.allow_conditional_memory);
    if cli.collect_all {
        config = config.with_failure_policy(FailurePolicy::CollectAll);
    }
    Ok(config)
}

fn print_violation(address: u32, violation: Violation, context: Option<DiagnosticContext>) {
    match context {
        Some(context) => eprintln!("{address:#010x}: {violation}: {context}"),
        None => eprintln!("{address:#010x}: {violation}"),
    }
}

fn validate(code: &Code, arch: Arch, config: &SfiConfig) -> Result<(), ValidationError> {
    info!(
        "validating {} bytes of {arch:?} code at {:#x}",
        code.bytes.len(),
        code.base
    );
    match arch {
        Arch::Arm => arm_validator::validate(&code.bytes, code.base, config, print_violation),
        Arch::X86 => x86_validator::validate(&code.bytes, code.base, config, print_violation),
    }
}

fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let data = fs::read(&cli.input).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {e}", cli.input.display());
        process::exit(1);
    });
    let mut code = load(&data).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {e}", cli.input.display());
        process::exit(1);
    });
    let Some(arch) = cli.arch.or(code.arch) else {
        eprintln!("Cannot tell the architecture of {}; pass --arch", cli.input.display());
        process::exit(1);
    };
    if let Some(base) = cli.base {
        code.base = base;
    }
    let config = config(&cli, arch).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        process::exit(1);
    });

    match validate(&code, arch, &config) {
        Ok(()) => eprintln!("accepted"),
        Err(error) => {
            eprintln!("rejected: {error}");
            process::exit(1);
        }
    }
}
