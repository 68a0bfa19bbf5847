// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Byte-at-a-time recognizer for the accepted x86-32 subset
//!
//! The automaton consumes one byte per [`Automaton::step`] and yields a
//! [`DecodedInstruction`] whenever an instruction ends. It is reset at every
//! bundle boundary: an instruction that would straddle two bundles is
//! rejected. Rejections always name the first byte of the instruction being
//! decoded, prefixes included.

use bitflags::bitflags;
use log::trace;
use sfi_core::InstructionText;

use crate::BUNDLE_SIZE;
use crate::error::Rejection;
use crate::opcodes::{
    ESCAPE_0F, ESCAPE_0F3A, ESCAPE_0F38, Immediate, Mandatory, ModRm, Operands, PRIMARY, Table,
    VEX_0F, VEX_0F3A, VEX_0F38, VexTable, XOP_08, XOP_09, XOP_0A, vex_operands,
};

bitflags! {
    /// Legacy prefixes seen before an opcode
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Prefixes: u8 {
        /// `66`
        const DATA16 = 1 << 0;
        /// `F0`
        const LOCK = 1 << 1;
        /// `F2`
        const REPNZ = 1 << 2;
        /// `F3`
        const REPZ = 1 << 3;
        /// `2E`
        const BRANCH_NOT_TAKEN = 1 << 4;
        /// `3E`
        const BRANCH_TAKEN = 1 << 5;
        /// `65`, thread pointer loads only
        const GS = 1 << 6;

        const HINTS = Self::BRANCH_NOT_TAKEN.bits() | Self::BRANCH_TAKEN.bits();
    }
}

impl Prefixes {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x66 => Some(Prefixes::DATA16),
            0xf0 => Some(Prefixes::LOCK),
            0xf2 => Some(Prefixes::REPNZ),
            0xf3 => Some(Prefixes::REPZ),
            0x2e => Some(Prefixes::BRANCH_NOT_TAKEN),
            0x3e => Some(Prefixes::BRANCH_TAKEN),
            _ => None,
        }
    }

    /// Table slot selected by `66`/`F2`/`F3`, if the combination has one
    fn mandatory(self) -> Option<Mandatory> {
        let data16 = self.contains(Prefixes::DATA16);
        match (self.contains(Prefixes::REPNZ), self.contains(Prefixes::REPZ)) {
            (false, false) if data16 => Some(Mandatory::Data16),
            (false, false) => Some(Mandatory::None),
            (true, false) if data16 => Some(Mandatory::Data16Repnz),
            (true, false) => Some(Mandatory::Repnz),
            (false, true) if data16 => Some(Mandatory::Data16Repz),
            (false, true) => Some(Mandatory::Repz),
            (true, true) => None,
        }
    }
}

/// Opcode table an instruction was decoded from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OpcodeMap {
    #[default]
    Primary,
    Escape0F,
    Escape0F38,
    Escape0F3A,
    Vex0F,
    Vex0F38,
    Vex0F3A,
    Xop8,
    Xop9,
    XopA,
}

impl OpcodeMap {
    fn legacy_table(self) -> &'static Table {
        match self {
            OpcodeMap::Escape0F => &*ESCAPE_0F,
            OpcodeMap::Escape0F38 => &*ESCAPE_0F38,
            OpcodeMap::Escape0F3A => &*ESCAPE_0F3A,
            _ => &*PRIMARY,
        }
    }

    fn vex_table(self) -> &'static VexTable {
        match self {
            OpcodeMap::Vex0F38 => &*VEX_0F38,
            OpcodeMap::Vex0F3A => &*VEX_0F3A,
            OpcodeMap::Xop8 => &*XOP_08,
            OpcodeMap::Xop9 => &*XOP_09,
            OpcodeMap::XopA => &*XOP_0A,
            _ => &*VEX_0F,
        }
    }
}

/// One accepted instruction, with offsets relative to the start of the code
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub start: usize,
    pub length: u8,
    pub prefixes: Prefixes,
    pub map: OpcodeMap,
    pub opcode: u8,
    pub modrm: Option<u8>,
    /// VEX or XOP payload, `W vvvv L pp`; the two-byte form reads as `W0`
    pub vex: Option<u8>,
    /// Destination of a direct jump or call, `end + rel`
    pub jump: Option<i64>,
    /// Second half of an `and r, -32; jmp/call r` pair
    pub masked_jump: bool,
}

impl DecodedInstruction {
    pub fn end(&self) -> usize {
        self.start + usize::from(self.length)
    }

    /// Quotes the instruction's bytes for a diagnostic
    pub fn text(&self, code: &[u8], base_address: u32) -> InstructionText {
        InstructionText {
            address: base_address.wrapping_add(self.start as u32),
            bytes: code
                .get(self.start..self.end())
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
            disassembly: None,
        }
    }
}

/// `nopw cs:[eax+eax*1+0]` after its `66` prefixes
const PADDING_NOP: [u8; 9] = [0x2e, 0x0f, 0x1f, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Most `66` prefixes in front of the padding nop
const MAX_PADDING_PREFIXES: u8 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Instruction boundary
    Start,
    /// After one or more legacy prefixes
    Prefixed,
    /// Next byte of the padding nop
    Padding(u8),
    /// After `0F`
    Escape,
    /// After `0F 38`
    Escape38,
    /// After `0F 3A`
    Escape3A,
    /// After a leading `65`
    SegmentGs,
    /// After `65 8B`
    SegmentGsModRm,
    /// Zero bytes left in a thread pointer offset
    Zero(u8),
    /// After `C4`
    Vex3Map,
    /// After `C4` or `8F` and the map byte
    VexPayload,
    /// After `C5`
    Vex2Payload,
    VexOpcode,
    /// After an unprefixed `8F`: `pop` or an XOP map
    PopOrXop,
    ModRm,
    Sib,
    Displacement(u8),
    Immediate(u8),
    Relative(u8),
}

enum Transition {
    Goto(State),
    Accept,
}

/// Instruction decoded so far
#[derive(Clone, Copy, Debug)]
struct Pending {
    start: usize,
    prefixes: Prefixes,
    /// `66` bytes seen; more than one only leads into the padding nop
    data16_count: u8,
    map: OpcodeMap,
    opcode: u8,
    operands: Operands,
    lock: bool,
    modrm: Option<u8>,
    vex: Option<u8>,
    /// Decoded from a two-byte `C5` prefix
    short: bool,
    immediate: Immediate,
    /// Little-endian immediate or relative field
    value: u32,
    value_len: u8,
    masked_jump: bool,
}

impl Pending {
    fn new(start: usize) -> Self {
        Pending {
            start,
            prefixes: Prefixes::empty(),
            data16_count: 0,
            map: OpcodeMap::Primary,
            opcode: 0,
            operands: Operands::Plain(Immediate::Zero),
            lock: false,
            modrm: None,
            vex: None,
            short: false,
            immediate: Immediate::Zero,
            value: 0,
            value_len: 0,
            masked_jump: false,
        }
    }

    fn data16(&self) -> bool {
        self.prefixes.contains(Prefixes::DATA16)
    }

    fn push_value(&mut self, byte: u8) {
        if self.value_len < 4 {
            self.value |= u32::from(byte) << (8 * self.value_len);
            self.value_len += 1;
        }
    }

    fn relative(&self) -> i64 {
        match self.value_len {
            1 => i64::from(self.value as u8 as i8),
            2 => i64::from(self.value as u16 as i16),
            _ => i64::from(self.value as i32),
        }
    }

    /// Register masked by `and r, -32`
    fn masked_register(&self) -> Option<u8> {
        let modrm = self.modrm?;
        let masks = self.map == OpcodeMap::Primary
            && self.opcode == 0x83
            && self.prefixes.is_empty()
            && modrm & 0xf8 == 0xe0
            && self.value == 0xe0;
        masks.then_some(modrm & 7)
    }
}

pub struct Automaton {
    state: State,
    pending: Pending,
    offset: usize,
    /// Register masked by the last instruction, and where that instruction
    /// ended
    mask: Option<(u8, usize)>,
}

impl Default for Automaton {
    fn default() -> Self {
        Self::new()
    }
}

impl Automaton {
    pub fn new() -> Self {
        Automaton {
            state: State::Start,
            pending: Pending::new(0),
            offset: 0,
            mask: None,
        }
    }

    /// Start of the instruction being decoded
    pub fn begin(&self) -> usize {
        self.pending.start
    }

    /// Consumes the next byte, returning the instruction it completes.
    pub fn step(&mut self, byte: u8) -> Result<Option<DecodedInstruction>, Rejection> {
        let transition = self.transition(byte).map_err(|reason| Rejection {
            begin: self.pending.start,
            offset: self.offset,
            reason,
        })?;
        self.offset += 1;
        match transition {
            Transition::Goto(state) => {
                self.state = state;
                Ok(None)
            }
            Transition::Accept => Ok(Some(self.accept())),
        }
    }

    /// Must be called after every bundle: instructions never cross one.
    pub fn end_bundle(&mut self) -> Result<(), Rejection> {
        self.mask = None;
        if self.state == State::Start {
            return Ok(());
        }
        Err(Rejection {
            begin: self.pending.start,
            offset: self.offset.saturating_sub(1),
            reason: "instruction crosses bundle boundary",
        })
    }

    fn accept(&mut self) -> DecodedInstruction {
        let pending = self.pending;
        let end = self.offset;
        let jump = match pending.operands {
            Operands::Relative(_) => Some(end as i64 + pending.relative()),
            _ => None,
        };
        let inst = DecodedInstruction {
            start: pending.start,
            length: (end - pending.start) as u8,
            prefixes: pending.prefixes,
            map: pending.map,
            opcode: pending.opcode,
            modrm: pending.modrm,
            vex: pending.vex,
            jump,
            masked_jump: pending.masked_jump,
        };
        trace!(
            "{:#x}: {:?} {:#04x}, {} byte(s)",
            inst.start, inst.map, inst.opcode, inst.length
        );
        self.mask = pending.masked_register().map(|register| (register, end));
        self.pending = Pending::new(end);
        self.state = State::Start;
        inst
    }

    fn transition(&mut self, byte: u8) -> Result<Transition, &'static str> {
        use Transition::{Accept, Goto};

        match self.state {
            State::Start | State::Prefixed => self.prefix_or_opcode(byte),
            State::Padding(index) => self.padding(index, byte),
            State::Escape => match byte {
                0x38 => Ok(Goto(State::Escape38)),
                0x3a => Ok(Goto(State::Escape3A)),
                _ => self.legacy(OpcodeMap::Escape0F, byte),
            },
            State::Escape38 => self.legacy(OpcodeMap::Escape0F38, byte),
            State::Escape3A => self.legacy(OpcodeMap::Escape0F3A, byte),

            State::SegmentGs => match byte {
                // mov eax, gs:[0]
                0xa1 => {
                    self.pending.opcode = byte;
                    Ok(Goto(State::Zero(4)))
                }
                0x8b => {
                    self.pending.opcode = byte;
                    Ok(Goto(State::SegmentGsModRm))
                }
                _ => Err("gs override outside a thread pointer load"),
            },
            // mov r32, gs:[disp32]
            State::SegmentGsModRm if byte & 0xc7 == 0x05 => {
                self.pending.modrm = Some(byte);
                Ok(Goto(State::Zero(4)))
            }
            State::SegmentGsModRm => Err("gs override outside a thread pointer load"),
            State::Zero(_) if byte != 0 => Err("thread pointer load with nonzero offset"),
            State::Zero(1) => Ok(Accept),
            State::Zero(left) => Ok(Goto(State::Zero(left - 1))),

            State::Vex3Map => {
                self.pending.map = match byte {
                    0xe1 => OpcodeMap::Vex0F,
                    0xe2 => OpcodeMap::Vex0F38,
                    0xe3 => OpcodeMap::Vex0F3A,
                    _ => return Err("les is not allowed"),
                };
                Ok(Goto(State::VexPayload))
            }
            State::PopOrXop => {
                let map = match byte {
                    0xe8 => OpcodeMap::Xop8,
                    0xe9 => OpcodeMap::Xop9,
                    0xea => OpcodeMap::XopA,
                    // pop r/m32
                    _ => {
                        self.legacy(OpcodeMap::Primary, 0x8f)?;
                        return self.modrm(byte);
                    }
                };
                self.pending.map = map;
                Ok(Goto(State::VexPayload))
            }
            State::VexPayload => {
                if byte & 0x40 == 0 {
                    return Err("vex operand register out of range");
                }
                self.pending.vex = Some(byte);
                Ok(Goto(State::VexOpcode))
            }
            State::Vex2Payload => {
                if byte < 0xc0 {
                    return Err("lds is not allowed");
                }
                self.pending.map = OpcodeMap::Vex0F;
                self.pending.vex = Some(byte & 0x7f);
                self.pending.short = true;
                Ok(Goto(State::VexOpcode))
            }
            State::VexOpcode => self.vex_opcode(byte),

            State::ModRm => self.modrm(byte),
            State::Sib => Ok(self.sib(byte)),
            State::Displacement(1) => Ok(self.immediate()),
            State::Displacement(left) => Ok(Goto(State::Displacement(left - 1))),
            State::Immediate(_) if !self.pending.immediate.accepts(byte) => {
                Err("invalid immediate operand")
            }
            State::Immediate(left) => {
                self.pending.push_value(byte);
                Ok(if left == 1 {
                    Accept
                } else {
                    Goto(State::Immediate(left - 1))
                })
            }
            State::Relative(left) => {
                self.pending.push_value(byte);
                Ok(if left == 1 {
                    Accept
                } else {
                    Goto(State::Relative(left - 1))
                })
            }
        }
    }

    fn prefix_or_opcode(&mut self, byte: u8) -> Result<Transition, &'static str> {
        use Transition::Goto;

        let prefixes = self.pending.prefixes;
        let count = self.pending.data16_count;
        if let Some(prefix) = Prefixes::from_byte(byte) {
            // only more `66`s or the padding nop follow a repeated `66`
            if count >= 2 {
                if prefix == Prefixes::DATA16 && count < MAX_PADDING_PREFIXES {
                    self.pending.data16_count += 1;
                    return Ok(Goto(State::Prefixed));
                }
                if prefix == Prefixes::BRANCH_NOT_TAKEN {
                    return self.padding(0, byte);
                }
                return Err("malformed padding nop");
            }
            if prefix == Prefixes::BRANCH_NOT_TAKEN && prefixes == Prefixes::DATA16 {
                return self.padding(0, byte);
            }
            if prefixes.contains(prefix) {
                if prefixes != Prefixes::DATA16 {
                    return Err("repeated prefix");
                }
                self.pending.data16_count = 2;
                return Ok(Goto(State::Prefixed));
            }
            self.pending.prefixes |= prefix;
            if prefix == Prefixes::DATA16 {
                self.pending.data16_count = 1;
            }
            return Ok(Goto(State::Prefixed));
        }
        if count >= 2 {
            return Err("malformed padding nop");
        }

        match byte {
            0x0f => Ok(Goto(State::Escape)),
            0x65 if prefixes.is_empty() => {
                self.pending.prefixes = Prefixes::GS;
                Ok(Goto(State::SegmentGs))
            }
            0xc4 if prefixes.is_empty() => Ok(Goto(State::Vex3Map)),
            0xc5 if prefixes.is_empty() => Ok(Goto(State::Vex2Payload)),
            0x8f if prefixes.is_empty() => Ok(Goto(State::PopOrXop)),
            _ => self.legacy(OpcodeMap::Primary, byte),
        }
    }

    /// `66 2E 0F 1F 84 00 00 00 00 00`, behind up to six `66`s
    fn padding(&mut self, index: u8, byte: u8) -> Result<Transition, &'static str> {
        if PADDING_NOP.get(usize::from(index)) != Some(&byte) {
            return Err("malformed padding nop");
        }
        match index {
            0 => self.pending.prefixes |= Prefixes::BRANCH_NOT_TAKEN,
            1 => self.pending.map = OpcodeMap::Escape0F,
            2 => self.pending.opcode = byte,
            3 => self.pending.modrm = Some(byte),
            _ => {}
        }
        if usize::from(index) + 1 == PADDING_NOP.len() {
            return Ok(Transition::Accept);
        }
        Ok(Transition::Goto(State::Padding(index + 1)))
    }

    fn legacy(&mut self, map: OpcodeMap, opcode: u8) -> Result<Transition, &'static str> {
        self.pending.map = map;
        self.pending.opcode = opcode;
        let info = map.legacy_table()[usize::from(opcode)];
        if !info.is_valid() {
            return Err("unrecognized opcode");
        }

        let prefixes = self.pending.prefixes;
        if prefixes.intersects(Prefixes::HINTS) {
            if prefixes.bits().count_ones() != 1 || !info.hints {
                return Err("branch hint not allowed");
            }
            let operands = info.operands(Mandatory::None).ok_or("branch hint not allowed")?;
            return Ok(self.operands(operands));
        }

        let lock = prefixes.contains(Prefixes::LOCK);
        let mandatory = prefixes.mandatory().ok_or("conflicting rep prefixes")?;
        if lock && !matches!(mandatory, Mandatory::None | Mandatory::Data16) {
            return Err("lock prefix not allowed");
        }
        let mut operands = info.operands(mandatory).ok_or("prefix not allowed")?;
        if lock {
            let Operands::ModRm(modrm) = operands else {
                return Err("lock prefix not allowed");
            };
            if info.lockable == 0 {
                return Err("lock prefix not allowed");
            }
            operands = Operands::ModRm(ModRm {
                memory: modrm.memory & info.lockable,
                register: 0,
                ..modrm
            });
            self.pending.lock = true;
        }
        Ok(self.operands(operands))
    }

    fn vex_opcode(&mut self, opcode: u8) -> Result<Transition, &'static str> {
        self.pending.opcode = opcode;
        let payload = self.pending.vex.unwrap_or_default();
        let table = self.pending.map.vex_table();
        let operands = vex_operands(table, opcode, payload, self.pending.short)
            .ok_or("unrecognized vex instruction")?;
        Ok(self.operands(operands))
    }

    fn operands(&mut self, operands: Operands) -> Transition {
        self.pending.operands = operands;
        match operands {
            Operands::Plain(immediate) => {
                self.pending.immediate = immediate;
                self.immediate()
            }
            Operands::Relative(bytes) => Transition::Goto(State::Relative(bytes)),
            Operands::ModRm(_) => Transition::Goto(State::ModRm),
        }
    }

    /// `jmp r`/`call r` right after `and r, -32` in the same bundle
    fn is_masked_jump(&self, modrm: u8) -> bool {
        let pending = &self.pending;
        let (mode, reg, rm) = (modrm >> 6, (modrm >> 3) & 7, modrm & 7);
        pending.map == OpcodeMap::Primary
            && pending.opcode == 0xff
            && (reg == 2 || reg == 4)
            && mode == 3
            && pending.prefixes.is_empty()
            && self.mask == Some((rm, pending.start))
    }

    fn modrm(&mut self, modrm: u8) -> Result<Transition, &'static str> {
        let (mode, reg, rm) = (modrm >> 6, (modrm >> 3) & 7, modrm & 7);
        self.pending.modrm = Some(modrm);
        let Operands::ModRm(form) = self.pending.operands else {
            return Err("unexpected modrm byte");
        };

        if mode == 3 && self.is_masked_jump(modrm) {
            self.pending.masked_jump = true;
            return Ok(Transition::Accept);
        }
        if !form.accepts(modrm) {
            return Err(if self.pending.lock {
                "lock prefix not allowed"
            } else {
                "invalid operand for opcode"
            });
        }
        self.pending.immediate = form.immediate(reg);

        Ok(match (mode, rm) {
            (3, _) => self.immediate(),
            (_, 4) => Transition::Goto(State::Sib),
            (0, 5) | (2, _) => Transition::Goto(State::Displacement(4)),
            (1, _) => Transition::Goto(State::Displacement(1)),
            _ => self.immediate(),
        })
    }

    fn sib(&self, sib: u8) -> Transition {
        let mode = self.pending.modrm.unwrap_or_default() >> 6;
        match (mode, sib & 7) {
            (0, 5) | (2, _) => Transition::Goto(State::Displacement(4)),
            (1, _) => Transition::Goto(State::Displacement(1)),
            _ => self.immediate(),
        }
    }

    fn immediate(&self) -> Transition {
        match self.pending.immediate.bytes(self.pending.data16()) {
            0 => Transition::Accept,
            bytes => Transition::Goto(State::Immediate(bytes)),
        }
    }
}

/// Runs the automaton over `code` bundle by bundle.
///
/// Returns the instructions accepted before the first rejection, if any.
pub fn scan(code: &[u8]) -> (Vec<DecodedInstruction>, Option<Rejection>) {
    let mut automaton = Automaton::new();
    let mut instructions = Vec::new();
    for bundle in code.chunks(BUNDLE_SIZE) {
        for &byte in bundle {
            match automaton.step(byte) {
                Ok(Some(inst)) => instructions.push(inst),
                Ok(None) => {}
                Err(rejection) => return (instructions, Some(rejection)),
            }
        }
        if let Err(rejection) = automaton.end_bundle() {
            return (instructions, Some(rejection));
        }
    }
    (instructions, None)
}
