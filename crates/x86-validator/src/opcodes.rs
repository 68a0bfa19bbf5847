// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Opcode tables for the x86-32 automaton
//!
//! Legacy opcodes map to one operand form per combination of `66`/`F2`/`F3`
//! prefixes ([`Mandatory`]); an absent form rejects the instruction. VEX and
//! XOP opcodes map to a list of [`VexForm`]s matched against the payload byte.
//! Anything not listed is rejected: the tables describe the accepted subset
//! of the architecture, not the whole of it.

use lazy_static::lazy_static;

/// Immediate field following the opcode and any ModRM operand
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Immediate {
    Zero,
    Byte,
    /// Two bytes whatever the operand size
    Word,
    /// `enter`: imm16 then imm8
    Enter,
    /// Four bytes whatever the operand size: `moffs32` and XOP `imm32`
    Dword,
    /// 32 bits, or 16 behind a `66` prefix
    Full,
    /// Register number in bits 4-6, other bits clear
    Is4,
    /// [`Immediate::Is4`] with a two-bit selector in bits 0-1
    Is4Select,
    /// 3DNow! operation byte
    Suffix3DNow,
}

impl Immediate {
    pub const fn bytes(self, data16: bool) -> u8 {
        match self {
            Immediate::Zero => 0,
            Immediate::Byte | Immediate::Is4 | Immediate::Is4Select | Immediate::Suffix3DNow => 1,
            Immediate::Word => 2,
            Immediate::Enter => 3,
            Immediate::Dword => 4,
            Immediate::Full if data16 => 2,
            Immediate::Full => 4,
        }
    }

    /// Whether `byte` may end the field
    pub fn accepts(self, byte: u8) -> bool {
        match self {
            Immediate::Is4 => byte & 0x8f == 0,
            Immediate::Is4Select => byte & 0x8c == 0,
            Immediate::Suffix3DNow => is_three_dnow_suffix(byte),
            _ => true,
        }
    }
}

/// Accepted ModRM bytes and the immediate that follows them
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModRm {
    /// `reg` values accepted with a memory operand
    pub memory: u8,
    /// Register operands, bit `reg * 8 + rm`
    pub register: u64,
    pub immediate: Immediate,
    /// `reg` values followed by the immediate
    pub immediate_regs: u8,
}

impl ModRm {
    /// Restricts both operand kinds to the `reg` values in `regs`
    const fn regs(mut self, regs: u8) -> Self {
        self.memory &= regs;
        self.register &= rows(regs);
        self
    }

    fn register_forms(mut self, forms: u64) -> Self {
        self.register = forms;
        self
    }

    const fn imm(mut self, immediate: Immediate) -> Self {
        self.immediate = immediate;
        self
    }

    const fn imm_for(mut self, regs: u8, immediate: Immediate) -> Self {
        self.immediate = immediate;
        self.immediate_regs = regs;
        self
    }

    pub fn accepts(&self, modrm: u8) -> bool {
        if modrm >= 0xc0 {
            self.register & (1 << (modrm - 0xc0)) != 0
        } else {
            self.memory & (1 << ((modrm >> 3) & 7)) != 0
        }
    }

    pub fn immediate(&self, reg: u8) -> Immediate {
        if self.immediate_regs & (1 << reg) != 0 {
            self.immediate
        } else {
            Immediate::Zero
        }
    }
}

/// Bytes following an opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operands {
    /// No ModRM, then the immediate
    Plain(Immediate),
    /// Relative jump or call with a field of this many bytes
    Relative(u8),
    ModRm(ModRm),
}

impl From<Immediate> for Operands {
    fn from(immediate: Immediate) -> Self {
        Operands::Plain(immediate)
    }
}

impl From<ModRm> for Operands {
    fn from(modrm: ModRm) -> Self {
        Operands::ModRm(modrm)
    }
}

const ANY: u8 = 0xff;

const fn regs(values: &[u8]) -> u8 {
    let mut mask = 0;
    let mut index = 0;
    while index < values.len() {
        mask |= 1 << values[index];
        index += 1;
    }
    mask
}

const fn except(values: &[u8]) -> u8 {
    !regs(values)
}

/// Register forms of every `rm` for the `reg` values in `regs`
const fn rows(regs: u8) -> u64 {
    let mut forms: u64 = 0;
    let mut reg = 0;
    while reg < 8 {
        if regs & (1 << reg) != 0 {
            forms |= 0xff << (reg * 8);
        }
        reg += 1;
    }
    forms
}

/// Register forms from inclusive ranges of ModRM bytes
fn forms(ranges: &[(u8, u8)]) -> u64 {
    ranges
        .iter()
        .flat_map(|&(first, last)| first..=last)
        .fold(0, |mask, modrm| mask | 1 << (modrm - 0xc0))
}

const fn modrm(memory: u8, register: u8) -> ModRm {
    ModRm {
        memory,
        register: rows(register),
        immediate: Immediate::Zero,
        immediate_regs: ANY,
    }
}

const MODRM: ModRm = modrm(ANY, ANY);
const MEMORY: ModRm = modrm(ANY, 0);
const REGISTER: ModRm = modrm(0, ANY);
const PLAIN: Operands = Operands::Plain(Immediate::Zero);
const REL8: Operands = Operands::Relative(1);
const REL32: Operands = Operands::Relative(4);

/// `66`/`F2`/`F3` combination selecting an opcode's form
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mandatory {
    None,
    Data16,
    Repnz,
    Repz,
    Data16Repnz,
    Data16Repz,
}

use Mandatory::{Data16, Data16Repnz, Data16Repz, Repnz, Repz};

/// No prefix, as the VEX tables spell it
const NP: Mandatory = Mandatory::None;

impl Mandatory {
    /// From the `pp` field of a VEX or XOP payload
    pub const fn from_pp(payload: u8) -> Self {
        match payload & 3 {
            0 => Mandatory::None,
            1 => Data16,
            2 => Repz,
            _ => Repnz,
        }
    }
}

/// Table entry for one legacy opcode byte
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// Indexed by [`Mandatory`]
    forms: [Option<Operands>; 6],
    /// `reg` values whose memory forms take `lock`
    pub lockable: u8,
    /// `2E`/`3E` branch hints are allowed
    pub hints: bool,
}

impl OpcodeInfo {
    pub const INVALID: OpcodeInfo = OpcodeInfo {
        forms: [None; 6],
        lockable: 0,
        hints: false,
    };

    pub fn operands(&self, prefix: Mandatory) -> Option<Operands> {
        self.forms[prefix as usize]
    }

    pub fn is_valid(&self) -> bool {
        self.forms.iter().any(Option::is_some)
    }

    fn with(mut self, prefixes: &[Mandatory], operands: impl Into<Operands>) -> Self {
        let operands = operands.into();
        for &prefix in prefixes {
            self.forms[prefix as usize] = Some(operands);
        }
        self
    }

    /// Accepts the unprefixed form behind `prefixes` too
    fn also(mut self, prefixes: &[Mandatory]) -> Self {
        let base = self.forms[Mandatory::None as usize];
        for &prefix in prefixes {
            self.forms[prefix as usize] = base;
        }
        self
    }

    fn data16(self) -> Self {
        self.also(&[Data16])
    }

    fn lock(mut self, regs: u8) -> Self {
        self.lockable = regs;
        self
    }

    fn hints(mut self) -> Self {
        self.hints = true;
        self
    }
}

fn op(operands: impl Into<Operands>) -> OpcodeInfo {
    OpcodeInfo::INVALID.with(&[Mandatory::None], operands)
}

fn only(prefixes: &[Mandatory], operands: impl Into<Operands>) -> OpcodeInfo {
    OpcodeInfo::INVALID.with(prefixes, operands)
}

pub type Table = [OpcodeInfo; 256];

fn fill(table: &mut Table, opcodes: impl IntoIterator<Item = usize>, info: OpcodeInfo) {
    for opcode in opcodes {
        table[opcode] = info;
    }
}

fn primary_map() -> Table {
    let mut t = [OpcodeInfo::INVALID; 256];

    // add, or, adc, sbb, and, sub, xor, cmp
    for row in (0x00..=0x38).step_by(8) {
        let lockable = if row == 0x38 { 0 } else { ANY };
        fill(&mut t, [row, row + 2], op(MODRM).lock(lockable));
        fill(&mut t, [row + 1, row + 3], op(MODRM).data16().lock(lockable));
        t[row + 4] = op(Immediate::Byte);
        t[row + 5] = op(Immediate::Full).data16();
    }

    // inc, dec, push, pop
    fill(&mut t, 0x40..=0x4f, op(PLAIN).data16());
    fill(&mut t, 0x50..=0x5f, op(PLAIN));
    t[0x68] = op(Immediate::Full).data16();
    t[0x69] = op(MODRM.imm(Immediate::Full)).data16();
    t[0x6a] = op(Immediate::Byte);
    t[0x6b] = op(MODRM.imm(Immediate::Byte)).data16();
    fill(&mut t, 0x70..=0x7f, op(REL8).hints());

    t[0x80] = op(MODRM.imm(Immediate::Byte)).lock(except(&[7]));
    t[0x81] = op(MODRM.imm(Immediate::Full)).data16().lock(except(&[7]));
    t[0x83] = op(MODRM.imm(Immediate::Byte)).data16().lock(except(&[7]));
    // test, xchg, mov, lea, pop
    fill(&mut t, [0x84, 0x88, 0x8a], op(MODRM));
    fill(&mut t, [0x85, 0x89, 0x8b], op(MODRM).data16());
    t[0x86] = op(MODRM).lock(ANY);
    t[0x87] = op(MODRM).data16().lock(ANY);
    t[0x8d] = op(MEMORY).data16();
    t[0x8f] = op(MODRM.regs(regs(&[0]))).data16();

    // nop and pause, xchg, cbw, cwd
    t[0x90] = op(PLAIN).also(&[Data16, Repz]);
    fill(&mut t, 0x91..=0x99, op(PLAIN).data16());
    t[0x9b] = op(PLAIN);
    // pushfw, popfw
    fill(&mut t, 0x9c..=0x9d, only(&[Data16], PLAIN));
    // sahf, lahf
    fill(&mut t, 0x9e..=0x9f, op(PLAIN));

    fill(&mut t, [0xa0, 0xa2], op(Immediate::Dword));
    fill(&mut t, [0xa1, 0xa3], op(Immediate::Dword).data16());
    // movs, stos, lods take rep; cmps, scas take repz and repnz
    fill(&mut t, [0xa4, 0xaa, 0xac], op(PLAIN).also(&[Repz]));
    fill(&mut t, [0xa5, 0xab, 0xad], op(PLAIN).also(&[Data16, Repz, Data16Repz]));
    fill(&mut t, [0xa6, 0xae], op(PLAIN).also(&[Repnz, Repz]));
    fill(
        &mut t,
        [0xa7, 0xaf],
        op(PLAIN).also(&[Data16, Repnz, Repz, Data16Repnz, Data16Repz]),
    );
    t[0xa8] = op(Immediate::Byte);
    t[0xa9] = op(Immediate::Full).data16();
    fill(&mut t, 0xb0..=0xb7, op(Immediate::Byte));
    fill(&mut t, 0xb8..=0xbf, op(Immediate::Full).data16());

    // shifts and rotates, except the undocumented /6
    t[0xc0] = op(MODRM.regs(except(&[6])).imm(Immediate::Byte));
    t[0xc1] = op(MODRM.regs(except(&[6])).imm(Immediate::Byte)).data16();
    fill(&mut t, [0xd0, 0xd2], op(MODRM.regs(except(&[6]))));
    fill(&mut t, [0xd1, 0xd3], op(MODRM.regs(except(&[6]))).data16());

    t[0xc6] = op(MODRM.regs(regs(&[0])).imm(Immediate::Byte));
    t[0xc7] = op(MODRM.regs(regs(&[0])).imm(Immediate::Full)).data16();
    // enter, leave, far ret
    t[0xc8] = op(Immediate::Enter);
    fill(&mut t, [0xc9, 0xcb], op(PLAIN));
    t[0xca] = op(Immediate::Word);

    // x87
    t[0xd8] = op(MODRM);
    // fld, fxch, fnop, fchs..fxam, constants, transcendentals
    let d9 = forms(&[(0xc0, 0xd0), (0xe0, 0xe1), (0xe4, 0xe5), (0xe8, 0xee), (0xf0, 0xff)]);
    t[0xd9] = op(MEMORY.regs(except(&[1])).register_forms(d9));
    // fcmov, fucompp
    t[0xda] = op(MEMORY.register_forms(forms(&[(0xc0, 0xdf), (0xe9, 0xe9)])));
    // fcmov, fnclex, fninit, fucomi, fcomi
    let db = forms(&[(0xc0, 0xdf), (0xe2, 0xe3), (0xe8, 0xf7)]);
    t[0xdb] = op(MEMORY.regs(except(&[4, 6])).register_forms(db));
    t[0xdc] = op(modrm(ANY, except(&[2, 3])));
    // ffree, fst, fstp, fucom, fucomp
    t[0xdd] = op(modrm(except(&[5]), regs(&[0, 2, 3, 4, 5])));
    // popping arithmetic, fcompp
    t[0xde] = op(MEMORY.register_forms(forms(&[(0xc0, 0xcf), (0xd9, 0xd9), (0xe0, 0xff)])));
    // fnstsw ax, fucomip, fcomip
    t[0xdf] = op(MEMORY.register_forms(forms(&[(0xe0, 0xe0), (0xe8, 0xf7)])));

    fill(&mut t, 0xe8..=0xe9, op(REL32));
    t[0xeb] = op(REL8);
    // hlt, cmc
    fill(&mut t, 0xf4..=0xf5, op(PLAIN));

    // test, not, neg, mul, imul, div, idiv
    let test = MODRM.regs(except(&[1]));
    t[0xf6] = op(test.imm_for(regs(&[0]), Immediate::Byte)).lock(regs(&[2, 3]));
    t[0xf7] = op(test.imm_for(regs(&[0]), Immediate::Full))
        .data16()
        .lock(regs(&[2, 3]));
    // clc, stc, cld, std
    fill(&mut t, 0xf8..=0xf9, op(PLAIN));
    fill(&mut t, 0xfc..=0xfd, op(PLAIN));
    // inc, dec, push; jmp and call only as part of a masked jump
    t[0xfe] = op(MODRM.regs(regs(&[0, 1]))).lock(regs(&[0, 1]));
    t[0xff] = op(MODRM.regs(regs(&[0, 1, 6]))).data16().lock(regs(&[0, 1]));
    t
}

fn escape_0f_map() -> Table {
    let mut t = [OpcodeInfo::INVALID; 256];

    // str, ltr, verr, verw; smsw, monitor, mwait, xgetbv, xsetbv, invlpg
    t[0x00] = op(MODRM.regs(regs(&[1, 3, 4, 5]))).with(&[Data16], REGISTER.regs(regs(&[1])));
    let system = forms(&[(0xc8, 0xc9), (0xd0, 0xd1), (0xe0, 0xe7), (0xf0, 0xf7)]);
    t[0x01] = op(MEMORY.regs(regs(&[4, 6, 7])).register_forms(system))
        .with(&[Data16], REGISTER.regs(regs(&[4])));
    // lar, lsl
    fill(&mut t, 0x02..=0x03, op(MODRM).data16());
    // ud2, femms
    fill(&mut t, [0x0b, 0x0e], op(PLAIN));
    // prefetch, prefetchw
    t[0x0d] = op(MEMORY.regs(regs(&[0, 1])));
    t[0x0f] = op(MODRM.imm(Immediate::Suffix3DNow));

    fill(&mut t, 0x10..=0x11, op(MODRM).also(&[Data16, Repnz, Repz]));
    t[0x12] = op(MODRM).also(&[Repnz, Repz]).with(&[Data16], MEMORY);
    fill(&mut t, [0x13, 0x17], op(MEMORY).data16());
    fill(&mut t, 0x14..=0x15, op(MODRM).data16());
    t[0x16] = op(MODRM).also(&[Repz]).with(&[Data16], MEMORY);
    // prefetchnta..prefetcht2, nop
    t[0x18] = op(MEMORY.regs(regs(&[0, 1, 2, 3])));
    t[0x1f] = op(MODRM.regs(regs(&[0]))).data16();

    fill(&mut t, 0x28..=0x29, op(MODRM).data16());
    t[0x2a] = op(MODRM).also(&[Data16, Repnz, Repz]);
    t[0x2b] = op(MEMORY).also(&[Data16, Repnz, Repz]);
    fill(&mut t, 0x2c..=0x2d, op(MODRM).also(&[Data16, Repnz, Repz]));
    fill(&mut t, 0x2e..=0x2f, op(MODRM).data16());
    // rdtsc
    t[0x31] = op(PLAIN);
    // cmovcc
    fill(&mut t, 0x40..=0x4f, op(MODRM).data16());

    t[0x50] = op(REGISTER).data16();
    t[0x51] = op(MODRM).also(&[Data16, Repnz, Repz]);
    // rsqrt, rcp
    fill(&mut t, 0x52..=0x53, op(MODRM).also(&[Repz]));
    fill(&mut t, 0x54..=0x57, op(MODRM).data16());
    fill(&mut t, 0x58..=0x5a, op(MODRM).also(&[Data16, Repnz, Repz]));
    t[0x5b] = op(MODRM).also(&[Data16, Repz]);
    fill(&mut t, 0x5c..=0x5f, op(MODRM).also(&[Data16, Repnz, Repz]));
    fill(&mut t, 0x60..=0x6b, op(MODRM).data16());
    fill(&mut t, 0x6c..=0x6d, only(&[Data16], MODRM));
    t[0x6e] = op(MODRM).data16();
    t[0x6f] = op(MODRM).also(&[Data16, Repz]);

    t[0x70] = op(MODRM.imm(Immediate::Byte)).also(&[Data16, Repnz, Repz]);
    // shifts by immediate
    let shifts = REGISTER.imm(Immediate::Byte);
    fill(&mut t, 0x71..=0x72, op(shifts.regs(regs(&[2, 4, 6]))).data16());
    t[0x73] = op(shifts.regs(regs(&[2, 6]))).with(&[Data16], shifts.regs(regs(&[2, 3, 6, 7])));
    fill(&mut t, 0x74..=0x76, op(MODRM).data16());
    // emms
    t[0x77] = op(PLAIN);
    // extrq, insertq
    t[0x78] = only(&[Repnz], REGISTER.imm(Immediate::Word));
    t[0x79] = only(&[Data16, Repnz], REGISTER);
    fill(&mut t, 0x7c..=0x7d, only(&[Data16, Repnz], MODRM));
    fill(&mut t, 0x7e..=0x7f, op(MODRM).also(&[Data16, Repz]));

    fill(&mut t, 0x80..=0x8f, op(REL32).hints());
    // setcc
    fill(&mut t, 0x90..=0x9f, op(MODRM));
    // cpuid
    t[0xa2] = op(PLAIN);
    // shld, shrd
    fill(&mut t, [0xa4, 0xac], op(MODRM.imm(Immediate::Byte)).data16());
    fill(&mut t, [0xa5, 0xad, 0xaf, 0xb6, 0xbe], op(MODRM).data16());
    // fxsave..clflush; lfence, mfence, sfence
    let fences = forms(&[(0xe8, 0xe8), (0xf0, 0xf0), (0xf8, 0xf8)]);
    t[0xae] = op(MEMORY.regs(except(&[0, 1])).register_forms(fences));
    // cmpxchg
    t[0xb0] = op(MODRM).lock(ANY);
    t[0xb1] = op(MODRM).data16().lock(ANY);
    t[0xb2] = op(MEMORY).data16();
    fill(&mut t, 0xb4..=0xb5, op(MEMORY).data16());
    fill(&mut t, [0xb7, 0xbf], op(MODRM));
    // popcnt
    t[0xb8] = only(&[Repz, Data16Repz], MODRM);
    // bsf, bsr; tzcnt, lzcnt
    fill(&mut t, 0xbc..=0xbd, op(MODRM).also(&[Data16, Repz, Data16Repz]));

    // xadd
    t[0xc0] = op(MODRM).lock(ANY);
    t[0xc1] = op(MODRM).data16().lock(ANY);
    t[0xc2] = op(MODRM.imm(Immediate::Byte)).also(&[Data16, Repnz, Repz]);
    // movnti
    t[0xc3] = op(MEMORY);
    fill(&mut t, [0xc4, 0xc6], op(MODRM.imm(Immediate::Byte)).data16());
    t[0xc5] = op(REGISTER.imm(Immediate::Byte)).data16();
    // cmpxchg8b
    t[0xc7] = op(MEMORY.regs(regs(&[1]))).lock(regs(&[1]));
    // bswap
    fill(&mut t, 0xc8..=0xcf, op(PLAIN));

    t[0xd0] = only(&[Data16, Repnz], MODRM);
    fill(&mut t, 0xd1..=0xd5, op(MODRM).data16());
    // movq, movq2dq, movdq2q
    t[0xd6] = only(&[Data16], MODRM).with(&[Repnz, Repz], REGISTER);
    t[0xd7] = op(REGISTER).data16();
    fill(&mut t, 0xd8..=0xe5, op(MODRM).data16());
    t[0xe6] = only(&[Data16, Repnz, Repz], MODRM);
    t[0xe7] = only(&[Data16], MEMORY);
    fill(&mut t, 0xe8..=0xef, op(MODRM).data16());
    // lddqu
    t[0xf0] = only(&[Repnz], MEMORY);
    fill(&mut t, 0xf1..=0xf6, op(MODRM).data16());
    // maskmovq
    t[0xf7] = op(REGISTER).data16();
    fill(&mut t, 0xf8..=0xfe, op(MODRM).data16());
    t
}

fn escape_0f38_map() -> Table {
    let mut t = [OpcodeInfo::INVALID; 256];
    let sse = only(&[Data16], MODRM);
    fill(&mut t, 0x00..=0x0b, sse);
    fill(&mut t, [0x10, 0x17], sse);
    fill(&mut t, 0x14..=0x15, sse);
    fill(&mut t, 0x1c..=0x1e, sse);
    fill(&mut t, 0x20..=0x25, sse);
    fill(&mut t, 0x28..=0x29, sse);
    // movntdqa
    t[0x2a] = only(&[Data16], MEMORY);
    t[0x2b] = sse;
    fill(&mut t, 0x30..=0x35, sse);
    fill(&mut t, 0x37..=0x41, sse);
    // aes
    fill(&mut t, 0xdb..=0xdf, sse);
    // crc32
    t[0xf0] = only(&[Repnz], MODRM);
    t[0xf1] = only(&[Repnz, Data16Repnz], MODRM);
    t
}

fn escape_0f3a_map() -> Table {
    let mut t = [OpcodeInfo::INVALID; 256];
    let sse = only(&[Data16], MODRM.imm(Immediate::Byte));
    fill(&mut t, 0x08..=0x0f, sse);
    fill(&mut t, 0x14..=0x17, sse);
    fill(&mut t, 0x20..=0x22, sse);
    fill(&mut t, 0x40..=0x42, sse);
    // pclmulqdq
    t[0x44] = sse;
    // pcmpestr, pcmpistr
    fill(&mut t, 0x60..=0x63, sse);
    // aeskeygenassist
    t[0xdf] = sse;
    t
}

/// One accepted encoding of a VEX or XOP opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VexForm {
    /// Implied prefix carried in `pp`
    pub prefix: Mandatory,
    /// Accepted `L` values, bit per value
    pub l: u8,
    /// Accepted `W` values, bit per value
    pub w: u8,
    /// `vvvv` names a register; otherwise it must be `1111`
    pub vvvv: bool,
    /// Also encodable behind the two-byte `C5` prefix
    pub short: bool,
    pub operands: Operands,
}

impl VexForm {
    /// Whether the form matches a payload byte laid out as `W vvvv L pp`
    pub fn accepts(&self, payload: u8, short: bool) -> bool {
        let w = payload >> 7;
        let l = (payload >> 2) & 1;
        let vvvv_unused = payload & 0x78 == 0x78;
        self.prefix == Mandatory::from_pp(payload)
            && self.w & (1 << w) != 0
            && self.l & (1 << l) != 0
            && (self.vvvv || vvvv_unused)
            && (self.short || !short)
    }

    fn l256(mut self) -> Self {
        self.l = 0b10;
        self
    }

    fn lig(mut self) -> Self {
        self.l = 0b11;
        self
    }

    fn wig(mut self) -> Self {
        self.w = 0b11;
        self
    }

    fn unused_vvvv(mut self) -> Self {
        self.vvvv = false;
        self
    }

    fn long_only(mut self) -> Self {
        self.short = false;
        self
    }
}

/// `L0`, `W0`, `vvvv` in use
fn vex(prefix: Mandatory, operands: impl Into<Operands>) -> VexForm {
    VexForm {
        prefix,
        l: 0b01,
        w: 0b01,
        vvvv: true,
        short: true,
        operands: operands.into(),
    }
}

pub type VexTable = [Vec<VexForm>; 256];

fn add(table: &mut VexTable, opcodes: impl IntoIterator<Item = usize>, form: VexForm) {
    for opcode in opcodes {
        table[opcode].push(form);
    }
}

/// Operands of the first form of `opcode` matching the payload
pub fn vex_operands(table: &VexTable, opcode: u8, payload: u8, short: bool) -> Option<Operands> {
    table[usize::from(opcode)]
        .iter()
        .find(|form| form.accepts(payload, short))
        .map(|form| form.operands)
}

fn vex_table() -> VexTable {
    std::array::from_fn(|_| Vec::new())
}

fn vex_0f_map() -> VexTable {
    let mut t = vex_table();

    // vmovss, vmovsd between registers, then vmovups, vmovupd and the loads
    add(&mut t, 0x10..=0x11, vex(Repz, REGISTER).l256());
    add(&mut t, 0x10..=0x11, vex(Repnz, REGISTER).l256());
    add(&mut t, 0x10..=0x11, vex(NP, MODRM).lig().unused_vvvv());
    add(&mut t, 0x10..=0x11, vex(Data16, MODRM).lig().unused_vvvv());
    add(&mut t, 0x10..=0x11, vex(Repz, MEMORY).unused_vvvv());
    add(&mut t, 0x10..=0x11, vex(Repnz, MEMORY).unused_vvvv());
    // vmovlps, vmovhps, vmovsldup, vmovshdup, vmovddup
    add(&mut t, [0x12, 0x16], vex(NP, MODRM));
    add(&mut t, [0x12, 0x16], vex(Repz, MODRM).lig().unused_vvvv());
    add(&mut t, [0x12], vex(Repnz, MODRM).lig().unused_vvvv());
    add(&mut t, [0x12], vex(Data16, MEMORY));
    add(&mut t, [0x13], vex(NP, MEMORY).unused_vvvv());
    add(&mut t, [0x13], vex(Data16, MEMORY).unused_vvvv());
    add(&mut t, 0x14..=0x15, vex(NP, MODRM).lig());
    add(&mut t, 0x14..=0x15, vex(Data16, MODRM).lig());
    add(&mut t, 0x16..=0x17, vex(Data16, MEMORY));
    add(&mut t, [0x17], vex(NP, MEMORY));

    add(&mut t, 0x28..=0x29, vex(NP, MODRM).lig().unused_vvvv());
    add(&mut t, 0x28..=0x29, vex(Data16, MODRM).lig().unused_vvvv());
    // vcvtsi2ss, vcvtsi2sd
    add(&mut t, [0x2a], vex(Repz, MODRM).long_only());
    add(&mut t, [0x2a], vex(Repnz, MODRM).long_only());
    add(&mut t, [0x2b], vex(NP, MEMORY).lig().unused_vvvv());
    add(&mut t, [0x2b], vex(Data16, MEMORY).lig().unused_vvvv());
    // vcvttss2si, vcvtss2si and the sd forms
    add(&mut t, 0x2c..=0x2d, vex(Repz, MODRM).unused_vvvv().long_only());
    add(&mut t, 0x2c..=0x2d, vex(Repnz, MODRM).unused_vvvv().long_only());
    add(&mut t, 0x2e..=0x2f, vex(NP, MODRM));
    add(&mut t, 0x2e..=0x2f, vex(Data16, MODRM));

    add(&mut t, [0x50], vex(NP, REGISTER).lig().unused_vvvv());
    add(&mut t, [0x50], vex(Data16, REGISTER).lig().unused_vvvv());
    add(&mut t, [0x51], vex(NP, MODRM).lig());
    add(&mut t, [0x51], vex(Data16, MODRM).lig());
    add(&mut t, [0x51, 0x53], vex(Repz, MODRM));
    add(&mut t, [0x51], vex(Repnz, MODRM));
    add(&mut t, 0x52..=0x53, vex(NP, MODRM).lig().unused_vvvv());
    add(&mut t, [0x52], vex(Repz, MODRM).unused_vvvv());
    add(&mut t, 0x54..=0x59, vex(NP, MODRM).lig());
    add(&mut t, 0x54..=0x59, vex(Data16, MODRM).lig());
    add(&mut t, 0x58..=0x5a, vex(Repz, MODRM));
    add(&mut t, 0x58..=0x5a, vex(Repnz, MODRM));
    add(&mut t, 0x5a..=0x5b, vex(NP, MODRM).lig().unused_vvvv());
    add(&mut t, 0x5a..=0x5b, vex(Data16, MODRM).lig().unused_vvvv());
    add(&mut t, [0x5b], vex(Repz, MODRM).lig().unused_vvvv());
    add(&mut t, 0x5c..=0x5f, vex(NP, MODRM).lig());
    add(&mut t, 0x5c..=0x5f, vex(Data16, MODRM).lig());
    add(&mut t, 0x5c..=0x5f, vex(Repz, MODRM));
    add(&mut t, 0x5c..=0x5f, vex(Repnz, MODRM));

    add(&mut t, 0x60..=0x6d, vex(Data16, MODRM));
    add(&mut t, 0x6e..=0x6f, vex(Data16, MODRM).unused_vvvv());
    add(&mut t, [0x6f, 0x7e], vex(Repz, MODRM).unused_vvvv());
    // vpshufd, vpshufhw, vpshuflw
    let imm8 = MODRM.imm(Immediate::Byte);
    add(&mut t, [0x70], vex(Data16, imm8).unused_vvvv());
    add(&mut t, [0x70], vex(Repz, imm8).unused_vvvv());
    add(&mut t, [0x70], vex(Repnz, imm8).unused_vvvv());
    // shifts by immediate, vvvv is the destination
    let shifts = REGISTER.imm(Immediate::Byte);
    add(&mut t, 0x71..=0x72, vex(Data16, shifts.regs(regs(&[2, 4, 6]))));
    add(&mut t, [0x73], vex(Data16, shifts.regs(regs(&[2, 3, 6, 7]))));
    add(&mut t, 0x74..=0x76, vex(Data16, MODRM));
    // vzeroupper, vzeroall
    add(&mut t, [0x77], vex(NP, PLAIN).lig().unused_vvvv());
    add(&mut t, 0x7c..=0x7d, vex(Data16, MODRM).lig());
    add(&mut t, 0x7c..=0x7d, vex(Repnz, MODRM).lig());
    add(&mut t, [0x7e], vex(Data16, MODRM).l256().unused_vvvv());
    add(&mut t, [0x7f], vex(Data16, MODRM).lig().unused_vvvv());
    add(&mut t, [0x7f], vex(Repz, MODRM).lig().unused_vvvv());

    // vldmxcsr, vstmxcsr
    add(&mut t, [0xae], vex(NP, MEMORY.regs(regs(&[2, 3]))).unused_vvvv());
    add(&mut t, [0xc2, 0xc6], vex(NP, imm8).lig());
    add(&mut t, [0xc2, 0xc6], vex(Data16, imm8).lig());
    add(&mut t, [0xc2], vex(Repz, imm8));
    add(&mut t, [0xc2], vex(Repnz, imm8));
    // vpinsrw, vpextrw
    add(&mut t, [0xc4], vex(Data16, imm8).unused_vvvv());
    add(&mut t, [0xc5], vex(Data16, REGISTER.imm(Immediate::Byte)).unused_vvvv());

    add(&mut t, [0xd0], vex(Data16, MODRM).lig());
    add(&mut t, [0xd0], vex(Repnz, MODRM).lig());
    add(&mut t, 0xd1..=0xd5, vex(Data16, MODRM));
    add(&mut t, [0xd6], vex(Data16, MODRM).l256().unused_vvvv());
    add(&mut t, [0xd7], vex(Data16, REGISTER).unused_vvvv());
    add(&mut t, 0xd8..=0xe5, vex(Data16, MODRM));
    add(&mut t, [0xe6], vex(Data16, MODRM).lig().unused_vvvv());
    add(&mut t, [0xe6], vex(Repz, MODRM).lig().unused_vvvv());
    add(&mut t, [0xe6], vex(Repnz, MODRM).lig().unused_vvvv());
    add(&mut t, [0xe7], vex(Data16, MEMORY).lig().unused_vvvv());
    add(&mut t, 0xe8..=0xef, vex(Data16, MODRM));
    // vlddqu
    add(&mut t, [0xf0], vex(Repnz, MEMORY).lig().unused_vvvv());
    add(&mut t, 0xf1..=0xf6, vex(Data16, MODRM));
    add(&mut t, [0xf7], vex(Data16, REGISTER).unused_vvvv());
    add(&mut t, 0xf8..=0xfe, vex(Data16, MODRM));
    t
}

fn vex_0f38_map() -> VexTable {
    let mut t = vex_table();
    add(&mut t, 0x00..=0x0b, vex(Data16, MODRM));
    // vpermilps, vpermilpd, vtestps, vtestpd
    add(&mut t, 0x0c..=0x0d, vex(Data16, MODRM).lig());
    add(&mut t, 0x0e..=0x0f, vex(Data16, MODRM).lig().unused_vvvv());
    add(&mut t, [0x13, 0x17], vex(Data16, MODRM).lig().unused_vvvv());
    // vbroadcastss, vbroadcastsd, vbroadcastf128
    add(&mut t, [0x18], vex(Data16, MEMORY).lig().unused_vvvv());
    add(&mut t, 0x19..=0x1a, vex(Data16, MEMORY).l256().unused_vvvv());
    add(&mut t, 0x1c..=0x1e, vex(Data16, MODRM).unused_vvvv());
    // vpmovsx, vpmovzx
    add(&mut t, 0x20..=0x25, vex(Data16, MODRM).unused_vvvv());
    add(&mut t, 0x28..=0x29, vex(Data16, MODRM));
    add(&mut t, [0x2a], vex(Data16, MEMORY).unused_vvvv());
    add(&mut t, [0x2b], vex(Data16, MODRM));
    // vmaskmovps, vmaskmovpd
    add(&mut t, 0x2c..=0x2f, vex(Data16, MEMORY).lig());
    add(&mut t, 0x30..=0x35, vex(Data16, MODRM).unused_vvvv());
    add(&mut t, 0x37..=0x40, vex(Data16, MODRM));
    add(&mut t, [0x41], vex(Data16, MODRM).unused_vvvv());

    // fma
    add(&mut t, 0x96..=0x98, vex(Data16, MODRM).lig().wig());
    let scalar = [0x99, 0x9b, 0x9d, 0x9f, 0xa9, 0xab, 0xad, 0xaf, 0xb9, 0xbb, 0xbd, 0xbf];
    add(&mut t, scalar, vex(Data16, MODRM).wig());
    let packed = [0x9a, 0x9c, 0x9e, 0xaa, 0xac, 0xae, 0xba, 0xbc, 0xbe];
    add(&mut t, packed, vex(Data16, MODRM).lig().wig());
    add(&mut t, 0xa6..=0xa8, vex(Data16, MODRM).lig().wig());
    add(&mut t, 0xb6..=0xb8, vex(Data16, MODRM).lig().wig());

    // vaes
    add(&mut t, 0xdb..=0xdf, vex(Data16, MODRM));
    // andn, bextr; blsr, blsmsk, blsi
    add(&mut t, [0xf2, 0xf7], vex(NP, MODRM));
    add(&mut t, [0xf3], vex(NP, MODRM.regs(regs(&[1, 2, 3]))));
    t
}

fn vex_0f3a_map() -> VexTable {
    let mut t = vex_table();
    let imm8 = MODRM.imm(Immediate::Byte);
    add(&mut t, 0x04..=0x05, vex(Data16, imm8).lig().unused_vvvv());
    add(&mut t, [0x06], vex(Data16, imm8).l256());
    add(&mut t, 0x08..=0x09, vex(Data16, imm8).lig());
    add(&mut t, 0x0a..=0x0b, vex(Data16, imm8));
    add(&mut t, 0x0c..=0x0d, vex(Data16, imm8).lig());
    add(&mut t, 0x0e..=0x0f, vex(Data16, imm8));
    // vpextrb, vpextrw, vpextrd, vextractps
    add(&mut t, 0x14..=0x16, vex(Data16, imm8).unused_vvvv());
    add(&mut t, [0x17], vex(Data16, MEMORY.imm(Immediate::Byte)).unused_vvvv());
    // vinsertf128, vextractf128
    add(&mut t, 0x18..=0x19, vex(Data16, imm8).l256().unused_vvvv());
    add(&mut t, [0x1d], vex(Data16, imm8).lig().unused_vvvv());
    add(&mut t, [0x20, 0x22], vex(Data16, imm8).unused_vvvv());
    add(&mut t, [0x21], vex(Data16, imm8));
    add(&mut t, [0x40], vex(Data16, imm8).lig());
    add(&mut t, 0x41..=0x42, vex(Data16, imm8));
    add(&mut t, [0x44], vex(Data16, imm8));

    // vpermil2ps, vpermil2pd
    let is4 = MODRM.imm(Immediate::Is4);
    add(&mut t, 0x48..=0x49, vex(Data16, MODRM.imm(Immediate::Is4Select)).lig().wig());
    // vblendv
    add(&mut t, 0x4a..=0x4b, vex(Data16, is4).lig());
    add(&mut t, [0x4c], vex(Data16, is4));
    // fma4
    add(&mut t, 0x5c..=0x5f, vex(Data16, is4).lig().wig());
    add(&mut t, 0x60..=0x63, vex(Data16, imm8).unused_vvvv());
    add(&mut t, 0x68..=0x69, vex(Data16, is4).lig().wig());
    add(&mut t, 0x6a..=0x6b, vex(Data16, is4).wig());
    add(&mut t, 0x6c..=0x6d, vex(Data16, is4).lig().wig());
    add(&mut t, 0x6e..=0x6f, vex(Data16, is4).wig());
    add(&mut t, 0x78..=0x79, vex(Data16, is4).lig().wig());
    add(&mut t, 0x7a..=0x7b, vex(Data16, is4).wig());
    add(&mut t, 0x7c..=0x7d, vex(Data16, is4).lig().wig());
    add(&mut t, 0x7e..=0x7f, vex(Data16, is4).wig());
    add(&mut t, [0xdf], vex(Data16, imm8));
    t
}

fn xop_08_map() -> VexTable {
    let mut t = vex_table();
    // vpmacs, vpmadcs
    let is4 = MODRM.imm(Immediate::Is4);
    add(&mut t, 0x85..=0x87, vex(NP, is4));
    add(&mut t, 0x8e..=0x8f, vex(NP, is4));
    add(&mut t, 0x95..=0x97, vex(NP, is4));
    add(&mut t, 0x9e..=0x9f, vex(NP, is4));
    // vpcmov, vpperm
    add(&mut t, [0xa2], vex(NP, is4).lig().wig());
    add(&mut t, [0xa3], vex(NP, is4).wig());
    add(&mut t, [0xa6, 0xb6], vex(NP, is4));
    // vprot, vpcom
    let imm8 = MODRM.imm(Immediate::Byte);
    add(&mut t, 0xc0..=0xc3, vex(NP, imm8).unused_vvvv());
    add(&mut t, 0xcc..=0xcf, vex(NP, imm8));
    add(&mut t, 0xec..=0xef, vex(NP, imm8));
    t
}

fn xop_09_map() -> VexTable {
    let mut t = vex_table();
    // tbm
    add(&mut t, [0x01], vex(NP, MODRM.regs(except(&[0]))));
    add(&mut t, [0x02], vex(NP, MODRM.regs(regs(&[1, 6]))));
    // llwpcb, slwpcb
    add(&mut t, [0x12], vex(NP, REGISTER.regs(regs(&[0, 1]))).unused_vvvv());
    // vfrcz
    add(&mut t, 0x80..=0x81, vex(NP, MODRM).lig().unused_vvvv());
    add(&mut t, 0x82..=0x83, vex(NP, MODRM).unused_vvvv());
    // vprot, vpsha, vpshl
    add(&mut t, 0x90..=0x9b, vex(NP, MODRM).wig());
    // vphadd, vphsub
    add(&mut t, 0xc1..=0xc3, vex(NP, MODRM).unused_vvvv());
    add(&mut t, 0xc6..=0xc7, vex(NP, MODRM).unused_vvvv());
    add(&mut t, [0xcb, 0xdb], vex(NP, MODRM).unused_vvvv());
    add(&mut t, 0xd1..=0xd3, vex(NP, MODRM).unused_vvvv());
    add(&mut t, 0xd6..=0xd7, vex(NP, MODRM).unused_vvvv());
    add(&mut t, 0xe1..=0xe3, vex(NP, MODRM).unused_vvvv());
    t
}

fn xop_0a_map() -> VexTable {
    let mut t = vex_table();
    // bextr, lwpins, lwpval
    add(&mut t, [0x10], vex(NP, MODRM.imm(Immediate::Dword)).unused_vvvv());
    add(&mut t, [0x12], vex(NP, MODRM.regs(regs(&[0, 1])).imm(Immediate::Dword)));
    t
}

/// 3DNow! operations selected by the suffix byte of `0F 0F`
pub fn is_three_dnow_suffix(suffix: u8) -> bool {
    matches!(
        suffix,
        0x0c | 0x0d
            | 0x1c
            | 0x1d
            | 0x8a
            | 0x8e
            | 0x90
            | 0x94
            | 0x96
            | 0x97
            | 0x9a
            | 0x9e
            | 0xa0
            | 0xa4
            | 0xa6
            | 0xa7
            | 0xaa
            | 0xae
            | 0xb0
            | 0xb4
            | 0xb6
            | 0xb7
            | 0xbb
            | 0xbf
    )
}

lazy_static! {
    /// One-byte opcodes
    pub static ref PRIMARY: Table = primary_map();
    /// Opcodes after `0F`
    pub static ref ESCAPE_0F: Table = escape_0f_map();
    pub static ref ESCAPE_0F38: Table = escape_0f38_map();
    pub static ref ESCAPE_0F3A: Table = escape_0f3a_map();
    pub static ref VEX_0F: VexTable = vex_0f_map();
    pub static ref VEX_0F38: VexTable = vex_0f38_map();
    pub static ref VEX_0F3A: VexTable = vex_0f3a_map();
    /// XOP maps, after `8F E8`, `8F E9` and `8F EA`
    pub static ref XOP_08: VexTable = xop_08_map();
    pub static ref XOP_09: VexTable = xop_09_map();
    pub static ref XOP_0A: VexTable = xop_0a_map();
}

#[cfg(test)]
mod tests {
    use super::{
        ESCAPE_0F, ESCAPE_0F38, Immediate, Mandatory, ModRm, Operands, PRIMARY, VEX_0F, VEX_0F3A,
        vex_operands,
    };

    fn modrm(operands: Option<Operands>) -> ModRm {
        match operands {
            Some(Operands::ModRm(modrm)) => modrm,
            other => panic!("not a ModRM form: {other:?}"),
        }
    }

    #[test]
    fn test_rejected_primary_opcodes() {
        // ret, int3, int, into, iret, in/out, far jmp and call, loop, cli, sti,
        // segment moves, bound, arpl
        for opcode in [
            0xc2, 0xc3, 0xcc, 0xcd, 0xce, 0xcf, 0xe4, 0xe5, 0xec, 0xed, 0xea, 0x9a, 0xe0, 0xe1,
            0xe2, 0xe3, 0xfa, 0xfb, 0x8c, 0x8e, 0x62, 0x63,
        ] {
            assert!(!PRIMARY[opcode].is_valid(), "{opcode:#04x}");
        }
        // pushf and popf only in their 16-bit forms
        assert_eq!(PRIMARY[0x9c].operands(Mandatory::None), None);
        assert!(PRIMARY[0x9c].operands(Mandatory::Data16).is_some());
        // far returns stay in the sandbox's code segment
        assert!(PRIMARY[0xcb].is_valid());
        assert_eq!(
            PRIMARY[0xca].operands(Mandatory::None),
            Some(Operands::Plain(Immediate::Word))
        );
    }

    #[test]
    fn test_primary_forms() {
        let add = PRIMARY[0x05];
        assert_eq!(add.operands(Mandatory::None), Some(Operands::Plain(Immediate::Full)));
        assert_eq!(add.operands(Mandatory::Repz), None);
        assert_eq!(PRIMARY[0xe8].operands(Mandatory::None), Some(Operands::Relative(4)));
        assert!(PRIMARY[0x74].hints);
        assert!(!PRIMARY[0xeb].hints);
        assert_eq!(PRIMARY[0x3b].lockable, 0);

        // push only among the ff register forms
        let ff = modrm(PRIMARY[0xff].operands(Mandatory::None));
        assert!(ff.accepts(0xf0));
        assert!(!ff.accepts(0xd0));
        assert!(!ff.accepts(0xe0));
        assert_eq!(PRIMARY[0xff].lockable, 0b0000_0011);

        // only test takes an immediate in group 3
        let f7 = modrm(PRIMARY[0xf7].operands(Mandatory::None));
        assert_eq!(f7.immediate(0), Immediate::Full);
        assert_eq!(f7.immediate(2), Immediate::Zero);
        assert!(!f7.accepts(0x08));
        assert_eq!(Immediate::Full.bytes(true), 2);
        assert_eq!(Immediate::Enter.bytes(false), 3);
    }

    #[test]
    fn test_escape_forms() {
        for opcode in [0x05, 0x06, 0x08, 0x09, 0x20, 0x22, 0x30, 0x34, 0xa1, 0xb9, 0xff] {
            assert!(!ESCAPE_0F[opcode].is_valid(), "0f {opcode:#04x}");
        }
        // sgdt, sldt and the group 15 forms with reg 0 are rejected
        assert!(!modrm(ESCAPE_0F[0x01].operands(Mandatory::None)).accepts(0x00));
        assert!(!modrm(ESCAPE_0F[0x00].operands(Mandatory::None)).accepts(0xc0));
        let group15 = modrm(ESCAPE_0F[0xae].operands(Mandatory::None));
        assert!(!group15.accepts(0x00));
        assert!(!group15.accepts(0xc0));
        assert!(group15.accepts(0xf0));

        // movhps loads need no prefix; the 66 form takes memory only
        assert_eq!(ESCAPE_0F[0x16].operands(Mandatory::Repnz), None);
        assert!(!modrm(ESCAPE_0F[0x16].operands(Mandatory::Data16)).accepts(0xc0));
        assert_eq!(ESCAPE_0F[0x84].operands(Mandatory::None), Some(Operands::Relative(4)));
        assert_eq!(ESCAPE_0F[0xb8].operands(Mandatory::None), None);
        assert!(ESCAPE_0F[0xb8].operands(Mandatory::Repz).is_some());
        assert!(ESCAPE_0F38[0x00].operands(Mandatory::Data16).is_some());
        assert_eq!(ESCAPE_0F38[0x00].operands(Mandatory::None), None);
    }

    #[test]
    fn test_x87_forms() {
        let d9 = modrm(PRIMARY[0xd9].operands(Mandatory::None));
        // fld dword [eax]; d9 /1 is reserved
        assert!(d9.accepts(0x00));
        assert!(!d9.accepts(0x08));
        // d9 e2 is reserved
        assert!(!d9.accepts(0xe2));
        // fnstsw ax
        assert!(modrm(PRIMARY[0xdf].operands(Mandatory::None)).accepts(0xe0));
    }

    #[test]
    fn test_vex_forms() {
        // vpunpckhbw needs the 66 pp
        assert!(vex_operands(&VEX_0F, 0x68, 0x79, true).is_some());
        assert_eq!(vex_operands(&VEX_0F, 0x68, 0x78, true), None);
        // vzeroupper has no 66 form, and W1 is rejected in the 0f map
        assert!(vex_operands(&VEX_0F, 0x77, 0x78, true).is_some());
        assert_eq!(vex_operands(&VEX_0F, 0x77, 0x79, false), None);
        assert_eq!(vex_operands(&VEX_0F, 0x58, 0xf8, false), None);
        // vcvtsi2ss only behind the three-byte prefix
        assert!(vex_operands(&VEX_0F, 0x2a, 0x7a, false).is_some());
        assert_eq!(vex_operands(&VEX_0F, 0x2a, 0x7a, true), None);
        // vpalignr with vvvv naming xmm0
        let palignr = vex_operands(&VEX_0F3A, 0x0f, 0x79, false);
        assert_eq!(modrm(palignr).immediate, Immediate::Byte);
    }
}
