// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Human-readable context attached to reported violations

use std::fmt;

use crate::{RegisterList, SafetyLevel};

/// What went wrong, in terms a toolchain author can act on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Problem {
    UnsafeInstruction(SafetyLevel),
    UnsafeLoadStore,
    UnsafeBranch,
    UnsafeDataWrite,
    MisalignedCall,
    ReadOnlyRegister,
    IllegalUseOfThreadPointer,
    IllegalPcLoadStore,
    BranchSplitsPattern,
    BranchInvalidDestination,
    UnrecognizedInstruction,
    DirectJumpOutOfRange,
    BadJumpTarget,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::UnsafeInstruction(level) => write!(f, "{level}"),
            Problem::UnsafeLoadStore => write!(f, "load/store base register not masked"),
            Problem::UnsafeBranch => write!(f, "branch target register not masked"),
            Problem::UnsafeDataWrite => {
                write!(f, "update of data-address register not followed by mask")
            }
            Problem::MisalignedCall => write!(f, "call not at end of bundle"),
            Problem::ReadOnlyRegister => write!(f, "modifies read-only register"),
            Problem::IllegalUseOfThreadPointer => write!(f, "illegal use of thread pointer"),
            Problem::IllegalPcLoadStore => write!(f, "load/store relative to pc"),
            Problem::BranchSplitsPattern => write!(f, "branch into middle of masking pattern"),
            Problem::BranchInvalidDestination => {
                write!(f, "branch out of region to unaligned address")
            }
            Problem::UnrecognizedInstruction => write!(f, "unrecognized instruction"),
            Problem::DirectJumpOutOfRange => write!(f, "direct jump out of range"),
            Problem::BadJumpTarget => write!(f, "jump into middle of instruction"),
        }
    }
}

/// Why a masking pair did not protect its second instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PairDetail {
    /// The mask and its use sit in different bundles
    PairCrossesBundle,
    /// The mask instruction also sets the condition flags
    ConditionsModified,
    /// The two instructions execute under different conditions
    ConditionMismatch,
    /// The guarded access is not `eq`-conditional on the `tst`
    EqConditionalOn,
    /// A `tst` guard was found but conditional memory access is disabled
    TstMemDisallowed,
}

impl fmt::Display for PairDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairDetail::PairCrossesBundle => write!(f, "pattern crosses bundle boundary"),
            PairDetail::ConditionsModified => write!(f, "mask instruction modifies conditions"),
            PairDetail::ConditionMismatch => write!(f, "instructions have different conditions"),
            PairDetail::EqConditionalOn => write!(f, "access must be eq-conditional on tst"),
            PairDetail::TstMemDisallowed => write!(f, "conditional memory access disallowed"),
        }
    }
}

/// One instruction quoted in a diagnostic
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionText {
    pub address: u32,
    /// Raw encoding in memory order
    pub bytes: Vec<u8>,
    pub disassembly: Option<String>,
}

impl fmt::Display for InstructionText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x} [", self.address)?;
        for (index, byte) in self.bytes.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        write!(f, "]")?;
        if let Some(text) = &self.disassembly {
            write!(f, " {text}")?;
        }
        Ok(())
    }
}

/// Context for one reported violation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticContext {
    pub problem: Problem,
    pub detail: Option<PairDetail>,
    pub registers: RegisterList,
    pub instructions: Vec<InstructionText>,
}

impl DiagnosticContext {
    pub fn new(problem: Problem) -> Self {
        DiagnosticContext {
            problem,
            detail: None,
            registers: RegisterList::EMPTY,
            instructions: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: PairDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_registers(mut self, registers: RegisterList) -> Self {
        self.registers = registers;
        self
    }

    pub fn with_instruction(mut self, instruction: InstructionText) -> Self {
        self.instructions.push(instruction);
        self
    }
}

impl fmt::Display for DiagnosticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.problem)?;
        if let Some(detail) = self.detail {
            write!(f, " ({detail})")?;
        }
        if !self.registers.is_empty() {
            write!(f, " registers {}", self.registers)?;
        }
        for instruction in &self.instructions {
            write!(f, "; {instruction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DiagnosticContext, InstructionText, PairDetail, Problem};
    use crate::{Register, RegisterList};

    #[test]
    fn test_renders_one_line() {
        let context = DiagnosticContext::new(Problem::UnsafeLoadStore)
            .with_detail(PairDetail::PairCrossesBundle)
            .with_registers(RegisterList::single(Register::R1))
            .with_instruction(InstructionText {
                address: 0x100c,
                // bic r1, r1, #0xc0000000
                bytes: vec![0x03, 0x11, 0xc1, 0xe3],
                disassembly: None,
            });
        let text = context.to_string();
        assert_eq!(
            text,
            "load/store base register not masked (pattern crosses bundle boundary) \
             registers {r1}; 0x0000100c [03 11 c1 e3]"
        );
        assert!(!text.contains('\n'));
    }
}
