// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! An instruction word bound to its address and class decoder

use sfi_core::{InstructionText, Register, RegisterList, SafetyLevel};
use yaxpeax_arch::{Decoder, U8Reader};
use yaxpeax_arm::armv7::InstDecoder;

use crate::class_decoder::ClassDecoder;
use crate::{Condition, Instruction, decode};

/// A decoded instruction with its location information
#[derive(Clone, Copy, Debug)]
pub struct DecodedInstruction {
    addr: u32,
    inst: Instruction,
    decoder: &'static ClassDecoder,
}

impl DecodedInstruction {
    pub fn new(addr: u32, inst: Instruction) -> Self {
        DecodedInstruction {
            addr,
            inst,
            decoder: decode(inst),
        }
    }

    pub fn addr(&self) -> u32 {
        self.addr
    }

    pub fn inst(&self) -> Instruction {
        self.inst
    }

    pub fn decoder(&self) -> &'static ClassDecoder {
        self.decoder
    }

    pub fn condition(&self) -> Condition {
        self.inst.condition()
    }

    pub fn safety(&self) -> SafetyLevel {
        self.decoder.safety(self.inst)
    }

    pub fn defs(&self) -> RegisterList {
        self.decoder.defs(self.inst)
    }

    pub fn uses(&self) -> RegisterList {
        self.decoder.uses(self.inst)
    }

    pub fn defines(&self, register: Register) -> bool {
        self.defs().contains(register)
    }

    pub fn defines_any(&self, registers: RegisterList) -> bool {
        self.defs().contains_any(registers)
    }

    pub fn defines_all(&self, registers: RegisterList) -> bool {
        self.defs().contains_all(registers)
    }

    pub fn reads(&self, register: Register) -> bool {
        self.uses().contains(register)
    }

    pub fn immediate_addressing_defs(&self) -> RegisterList {
        self.decoder.immediate_addressing_defs(self.inst)
    }

    pub fn base_address_register(&self) -> Register {
        self.decoder.base_address_register(self.inst)
    }

    pub fn is_literal_load(&self) -> bool {
        self.decoder.is_literal_load(self.inst)
    }

    pub fn branch_target_register(&self) -> Register {
        self.decoder.branch_target_register(self.inst)
    }

    pub fn is_relative_branch(&self) -> bool {
        self.decoder.is_relative_branch(self.inst)
    }

    pub fn branch_target_offset(&self) -> i32 {
        self.decoder.branch_target_offset(self.inst)
    }

    /// Destination of a relative branch
    pub fn branch_target(&self) -> u32 {
        self.addr.wrapping_add_signed(self.branch_target_offset())
    }

    pub fn is_literal_pool_head(&self) -> bool {
        self.decoder.is_literal_pool_head(self.inst)
    }

    pub fn clears_bits(&self, mask: u32) -> bool {
        self.decoder.clears_bits(self.inst, mask)
    }

    pub fn sets_z_if_bits_clear(&self, register: Register, mask: u32) -> bool {
        self.decoder.sets_z_if_bits_clear(self.inst, register, mask)
    }

    pub fn is_load_thread_address_pointer(&self) -> bool {
        self.decoder.is_load_thread_address_pointer(self.inst)
    }

    pub fn base_address_register_writeback_small_immediate(&self) -> bool {
        self.decoder
            .base_address_register_writeback_small_immediate(self.inst)
    }

    /// True if `other` executes whenever `self` does (checked on the
    /// immediately following instruction).
    pub fn always_dominates(&self, other: &DecodedInstruction) -> bool {
        self.condition().is_always() || self.condition() == other.condition()
    }

    /// True if `self` executes whenever the preceding `other` did
    pub fn always_postdominates(&self, other: &DecodedInstruction) -> bool {
        self.condition().is_always()
            || (self.condition() == other.condition()
                && !other.defines(Register::CONDITIONS))
    }

    /// True if `self` runs only when a `tst` in `other` set Z
    pub fn is_eq_conditional_on(&self, other: &DecodedInstruction) -> bool {
        self.condition() == Condition::Eq
            && (other.condition() == Condition::Eq || other.condition().is_always())
    }

    /// Little-endian encoding
    pub fn bytes(&self) -> [u8; 4] {
        self.inst.word().to_le_bytes()
    }

    /// Assembly text, if the disassembler knows the encoding
    pub fn disassembly(&self) -> Option<String> {
        let bytes = self.bytes();
        let mut reader = U8Reader::new(&bytes);
        InstDecoder::default()
            .decode(&mut reader)
            .ok()
            .map(|instruction| instruction.to_string())
    }

    /// The instruction as quoted in diagnostics
    pub fn text(&self) -> InstructionText {
        InstructionText {
            address: self.addr,
            bytes: self.bytes().to_vec(),
            disassembly: self.disassembly(),
        }
    }
}
