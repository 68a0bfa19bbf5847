// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decision tree from instruction words to class decoders
//!
//! The tree follows the A32 encoding tables of the ARMv7-A architecture
//! manual. Every word reaches exactly one static [`ClassDecoder`]; encodings
//! the sandbox does not model land on an `Unsafe` decoder.

use sfi_core::{Register, SafetyLevel};

use crate::class_decoder::{ClassDecoder, ImmediateMasking, InstructionClass as C};
use crate::{Condition, Instruction};

const fn unsafe_decoder(name: &'static str, level: SafetyLevel) -> ClassDecoder {
    ClassDecoder::new(name, C::Unsafe(level))
}

static UNDEFINED: ClassDecoder = unsafe_decoder("Undefined", SafetyLevel::Undefined);
static UNPREDICTABLE: ClassDecoder = unsafe_decoder("Unpredictable", SafetyLevel::Unpredictable);
static NOT_IMPLEMENTED: ClassDecoder =
    unsafe_decoder("NotImplemented", SafetyLevel::NotImplemented);

// Data-processing (immediate)

static AND_IMM: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmediateOp_And_Rule_11_A1_P34",
    C::Binary2RegisterImmediateOp(ImmediateMasking::And),
);
static EOR_IMM: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmediateOp_Eor_Rule_44_A1_P94",
    C::Binary2RegisterImmediateOp(ImmediateMasking::None),
);
static SUB_IMM: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmediateOp_Sub_Rule_212_A1_P420",
    C::Binary2RegisterImmediateOp(ImmediateMasking::None),
);
static ADR_SUB: ClassDecoder = ClassDecoder::new(
    "Unary1RegisterImmediateOp_Adr_Rule_10_A2_P32",
    C::Unary1RegisterImmediateOp,
);
static RSB_IMM: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmediateOp_Rsb_Rule_142_A1_P284",
    C::Binary2RegisterImmediateOp(ImmediateMasking::None),
);
static ADD_IMM: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmediateOp_Add_Rule_5_A1_P22",
    C::Binary2RegisterImmediateOp(ImmediateMasking::None),
);
static ADR_ADD: ClassDecoder = ClassDecoder::new(
    "Unary1RegisterImmediateOp_Adr_Rule_10_A1_P32",
    C::Unary1RegisterImmediateOp,
);
static ADC_IMM: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmediateOp_Adc_Rule_6_A1_P14",
    C::Binary2RegisterImmediateOp(ImmediateMasking::None),
);
static SBC_IMM: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmediateOp_Sbc_Rule_151_A1_P302",
    C::Binary2RegisterImmediateOp(ImmediateMasking::None),
);
static RSC_IMM: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmediateOp_Rsc_Rule_145_A1_P290",
    C::Binary2RegisterImmediateOp(ImmediateMasking::None),
);
static TST_IMM: ClassDecoder = ClassDecoder::new(
    "MaskedBinaryRegisterImmediateTest_Tst_Rule_230_A1_P454",
    C::BinaryRegisterImmediateTest { tst: true },
);
static TEQ_IMM: ClassDecoder = ClassDecoder::new(
    "BinaryRegisterImmediateTest_Teq_Rule_227_A1_P448",
    C::BinaryRegisterImmediateTest { tst: false },
);
static CMP_IMM: ClassDecoder = ClassDecoder::new(
    "BinaryRegisterImmediateTest_Cmp_Rule_35_A1_P80",
    C::BinaryRegisterImmediateTest { tst: false },
);
static CMN_IMM: ClassDecoder = ClassDecoder::new(
    "BinaryRegisterImmediateTest_Cmn_Rule_32_A1_P74",
    C::BinaryRegisterImmediateTest { tst: false },
);
static ORR_IMM: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmediateOp_Orr_Rule_113_A1_P228",
    C::Binary2RegisterImmediateOp(ImmediateMasking::None),
);
static MOV_IMM: ClassDecoder = ClassDecoder::new(
    "Unary1RegisterImmediateOp_Mov_Rule_96_A1_P194",
    C::Unary1RegisterImmediateOp,
);
static BIC_IMM: ClassDecoder = ClassDecoder::new(
    "MaskedBinary2RegisterImmediateOp_Bic_Rule_19_A1_P50",
    C::Binary2RegisterImmediateOp(ImmediateMasking::Bic),
);
static MVN_IMM: ClassDecoder = ClassDecoder::new(
    "Unary1RegisterImmediateOp_Mvn_Rule_106_A1_P214",
    C::Unary1RegisterImmediateOp,
);
static MOVW: ClassDecoder = ClassDecoder::new(
    "Unary1RegisterImmediateOp_Mov_Rule_96_A2_P194",
    C::Unary1RegisterImmediateOp,
);
static MOVT: ClassDecoder = ClassDecoder::new(
    "Unary1RegisterImmediateOp_Mov_Rule_99_A1_P200",
    C::Unary1RegisterImmediateOp,
);

// Data-processing (register)

static AND_REG: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterImmedShiftedOp_And_Rule_7_A1_P36",
    C::Binary3RegisterImmedShiftedOp,
);
static EOR_REG: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterImmedShiftedOp_Eor_Rule_45_A1_P96",
    C::Binary3RegisterImmedShiftedOp,
);
static SUB_REG: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterImmedShiftedOp_Sub_Rule_213_A1_P422",
    C::Binary3RegisterImmedShiftedOp,
);
static RSB_REG: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterImmedShiftedOp_Rsb",
    C::Binary3RegisterImmedShiftedOp,
);
static ADD_REG: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterImmedShiftedOp_Add_Rule_6_A1_P24",
    C::Binary3RegisterImmedShiftedOp,
);
static ADC_REG: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterImmedShiftedOp_Adc_Rule_2_A1_P16",
    C::Binary3RegisterImmedShiftedOp,
);
static SBC_REG: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterImmedShiftedOp_Sbc_Rule_152_A1_P304",
    C::Binary3RegisterImmedShiftedOp,
);
static RSC_REG: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterImmedShiftedOp_Rsc_Rule_146_A1_P292",
    C::Binary3RegisterImmedShiftedOp,
);
static TST_REG: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmedShiftedTest_Tst_Rule_231_A1_P456",
    C::Binary2RegisterImmedShiftedTest,
);
static TEQ_REG: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmedShiftedTest_Teq_Rule_228_A1_P450",
    C::Binary2RegisterImmedShiftedTest,
);
static CMP_REG: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmedShiftedTest_Cmp_Rule_36_A1_P82",
    C::Binary2RegisterImmedShiftedTest,
);
static CMN_REG: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterImmedShiftedTest_Cmn_Rule_33_A1_P76",
    C::Binary2RegisterImmedShiftedTest,
);
static ORR_REG: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterImmedShiftedOp_Orr_Rule_114_A1_P230",
    C::Binary3RegisterImmedShiftedOp,
);
static MOV_REG: ClassDecoder = ClassDecoder::new(
    "Unary2RegisterOp_Mov_Rule_97_A1_P196",
    C::Unary2RegisterImmedShiftedOp,
);
static LSL_IMM: ClassDecoder = ClassDecoder::new(
    "Unary2RegisterImmedShiftedOp_Lsl_Rule_88_A1_P178",
    C::Unary2RegisterImmedShiftedOp,
);
static LSR_IMM: ClassDecoder = ClassDecoder::new(
    "Unary2RegisterImmedShiftedOp_Lsr_Rule_90_A1_P182",
    C::Unary2RegisterImmedShiftedOp,
);
static ASR_IMM: ClassDecoder = ClassDecoder::new(
    "Unary2RegisterImmedShiftedOp_Asr_Rule_14_A1_P40",
    C::Unary2RegisterImmedShiftedOp,
);
static RRX: ClassDecoder = ClassDecoder::new(
    "Unary2RegisterOp_Rrx_Rule_141_A1_P282",
    C::Unary2RegisterImmedShiftedOp,
);
static ROR_IMM: ClassDecoder = ClassDecoder::new(
    "Unary2RegisterImmedShiftedOp_Ror_Rule_139_A1_P278",
    C::Unary2RegisterImmedShiftedOp,
);
static BIC_REG: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterImmedShiftedOp_Bic_Rule_20_A1_P52",
    C::Binary3RegisterImmedShiftedOp,
);
static MVN_REG: ClassDecoder = ClassDecoder::new(
    "Unary2RegisterImmedShiftedOp_Mvn_Rule_107_A1_P216",
    C::Unary2RegisterImmedShiftedOp,
);

// Data-processing (register-shifted register)

static AND_RSR: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterShiftedOp_And_Rule_13_A1_P38",
    C::Binary4RegisterShiftedOp,
);
static EOR_RSR: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterShiftedOp_Eor_Rule_46_A1_P98",
    C::Binary4RegisterShiftedOp,
);
static SUB_RSR: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterShiftedOp_Sub_Rule_214_A1_P424",
    C::Binary4RegisterShiftedOp,
);
static RSB_RSR: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterShiftedOp_Rsb_Rule_144_A1_P288",
    C::Binary4RegisterShiftedOp,
);
static ADD_RSR: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterShiftedOp_Add_Rule_7_A1_P26",
    C::Binary4RegisterShiftedOp,
);
static ADC_RSR: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterShiftedOp_Adc_Rule_3_A1_P18",
    C::Binary4RegisterShiftedOp,
);
static SBC_RSR: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterShiftedOp_Sbc_Rule_153_A1_P306",
    C::Binary4RegisterShiftedOp,
);
static RSC_RSR: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterShiftedOp_Rsc_Rule_147_A1_P294",
    C::Binary4RegisterShiftedOp,
);
static TST_RSR: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterShiftedTest_Tst_Rule_232_A1_P458",
    C::Binary3RegisterShiftedTest,
);
static TEQ_RSR: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterShiftedTest_Teq_Rule_229_A1_P452",
    C::Binary3RegisterShiftedTest,
);
static CMP_RSR: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterShiftedTest_Cmp_Rule_37_A1_P84",
    C::Binary3RegisterShiftedTest,
);
static CMN_RSR: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterShiftedTest_Cmn_Rule_34_A1_P78",
    C::Binary3RegisterShiftedTest,
);
static ORR_RSR: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterShiftedOp_Orr_Rule_115_A1_P212",
    C::Binary4RegisterShiftedOp,
);
static LSL_REG: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOp_Lsl_Rule_89_A1_P180", C::Binary3RegisterOp);
static LSR_REG: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOp_Lsr_Rule_91_A1_P184", C::Binary3RegisterOp);
static ASR_REG: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOp_Asr_Rule_15_A1_P42", C::Binary3RegisterOp);
static ROR_REG: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOp_Ror_Rule_140_A1_P280", C::Binary3RegisterOp);
static BIC_RSR: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterShiftedOp_Bic_Rule_21_A1_P54",
    C::Binary4RegisterShiftedOp,
);
static MVN_RSR: ClassDecoder = ClassDecoder::new(
    "Unary3RegisterShiftedOp_Mvn_Rule_108_A1_P218",
    C::Unary3RegisterShiftedOp,
);

// Multiplies

static MUL: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOpAltA_Mul_Rule_105_A1_P212", C::Binary3RegisterOpAltA);
static MLA: ClassDecoder =
    ClassDecoder::new("Binary4RegisterDualOp_Mla_Rule_94_A1_P190", C::Binary4RegisterDualOp);
static MLS: ClassDecoder =
    ClassDecoder::new("Binary4RegisterDualOp_Mls_Rule_95_A1_P192", C::Binary4RegisterDualOp);
static UMAAL: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterDualResult_Umaal_Rule_244_A1_P482",
    C::Binary4RegisterDualResult,
);
static UMULL: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterDualResult_Umull_Rule_246_A1_P486",
    C::Binary4RegisterDualResult,
);
static UMLAL: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterDualResult_Umlal_Rule_245_A1_P484",
    C::Binary4RegisterDualResult,
);
static SMULL: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterDualResult_Smull_Rule_179_A1_P356",
    C::Binary4RegisterDualResult,
);
static SMLAL: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterDualResult_Smlal_Rule_168_A1_P334",
    C::Binary4RegisterDualResult,
);
static SMLAXY: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterDualOp_Smlaxx_Rule_166_A1_P330",
    C::Binary4RegisterDualOp,
);
static SMLAWY: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterDualOp_Smlawx",
    C::Binary4RegisterDualOp,
);
static SMULWY: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterOpAltA_Smulwx_Rule_180_A1_P358",
    C::Binary3RegisterOpAltA,
);
static SMLALXY: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterDualResult_Smlalxx_Rule_169_A1_P336",
    C::Binary4RegisterDualResult,
);
static SMULXY: ClassDecoder = ClassDecoder::new(
    "Binary3RegisterOpAltA_Smulxx",
    C::Binary3RegisterOpAltA,
);
static SMLAD: ClassDecoder =
    ClassDecoder::new("Binary4RegisterDualOp_Smlad", C::Binary4RegisterDualOp);
static SMUAD: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOpAltA_Smuad", C::Binary3RegisterOpAltA);
static SMLSD: ClassDecoder =
    ClassDecoder::new("Binary4RegisterDualOp_Smlsd", C::Binary4RegisterDualOp);
static SMUSD: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOpAltA_Smusd", C::Binary3RegisterOpAltA);
static SDIV: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOpAltA_Sdiv", C::Binary3RegisterOpAltA);
static UDIV: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOpAltA_Udiv", C::Binary3RegisterOpAltA);
static SMLALD: ClassDecoder =
    ClassDecoder::new("Binary4RegisterDualResult_Smlald", C::Binary4RegisterDualResult);
static SMLSLD: ClassDecoder =
    ClassDecoder::new("Binary4RegisterDualResult_Smlsld", C::Binary4RegisterDualResult);
static SMMLA: ClassDecoder =
    ClassDecoder::new("Binary4RegisterDualOp_Smmla", C::Binary4RegisterDualOp);
static SMMUL: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOpAltA_Smmul", C::Binary3RegisterOpAltA);
static SMMLS: ClassDecoder =
    ClassDecoder::new("Binary4RegisterDualOp_Smmls", C::Binary4RegisterDualOp);
static USAD8: ClassDecoder =
    ClassDecoder::new("Binary3RegisterOpAltA_Usad8_Rule_253_A1_P500", C::Binary3RegisterOpAltA);
static USADA8: ClassDecoder = ClassDecoder::new(
    "Binary4RegisterDualOp_Usada8_Rule_254_A1_P502",
    C::Binary4RegisterDualOp,
);

// Media

const fn parallel(name: &'static str) -> ClassDecoder {
    ClassDecoder::new(name, C::Binary3RegisterOpAltBNoCondUpdates)
}

const fn unary_media(name: &'static str) -> ClassDecoder {
    ClassDecoder::new(name, C::Unary2RegisterOpNotRmIsPc)
}

/// Signed parallel add/subtract, indexed by `op1 - 1` (bits 20-21) and op2
static SIGNED_PARALLEL: [[Option<ClassDecoder>; 8]; 3] = [
    [
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Sadd16_Rule_148_A1_P296")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Sasx_Rule_150_A1_P300")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Ssax_Rule_185_A1_P366")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Ssub16_Rule_186_A1_P368")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Sadd8_Rule_149_A1_P298")),
        None,
        None,
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Ssub8_Rule_187_A1_P370")),
    ],
    [
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Qadd16_Rule_125_A1_P252")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Qasx_Rule_127_A1_P256")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Qsax_Rule_130_A1_P262")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Qsub16_Rule_132_A1_P266")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Qadd8_Rule_126_A1_P254")),
        None,
        None,
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Qsub8_Rule_133_A1_P268")),
    ],
    [
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Shadd16_Rule_159_A1_P318")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Shasx_Rule_161_A1_P322")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Shsax_Rule_162_A1_P324")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Shsub16_Rule_163_A1_P326")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Shadd8_Rule_160_A1_P320")),
        None,
        None,
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Shsub8_Rule_164_A1_P328")),
    ],
];

/// Unsigned parallel add/subtract, laid out like [`SIGNED_PARALLEL`]
static UNSIGNED_PARALLEL: [[Option<ClassDecoder>; 8]; 3] = [
    [
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uadd16_Rule_233_A1_P460")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uasx_Rule_235_A1_P464")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Usax_Rule_257_A1_P508")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Usub16_Rule_258_A1_P510")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uadd8_Rule_234_A1_P462")),
        None,
        None,
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Usub8_Rule_259_A1_P512")),
    ],
    [
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uqadd16_Rule_247_A1_P488")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uqasx_Rule_249_A1_P492")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uqsax_Rule_250_A1_P494")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uqsub16_Rule_251_A1_P496")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uqadd8_Rule_248_A1_P490")),
        None,
        None,
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uqsub8_Rule_252_A1_P498")),
    ],
    [
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uhadd16_Rule_238_A1_P470")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uhasx_Rule_240_A1_P474")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uhsax_Rule_241_A1_P476")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uhsub16_Rule_242_A1_P478")),
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uhadd8_Rule_239_A1_P472")),
        None,
        None,
        Some(parallel("Binary3RegisterOpAltBNoCondUpdates_Uhsub8_Rule_243_A1_P480")),
    ],
];

/// Saturating add/subtract, indexed by bits 21-22
static SATURATING: [ClassDecoder; 4] = [
    parallel("Binary3RegisterOpAltBNoCondUpdates_Qadd_Rule_124_A1_P250"),
    parallel("Binary3RegisterOpAltBNoCondUpdates_Qsub_Rule_131_A1_P264"),
    parallel("Binary3RegisterOpAltBNoCondUpdates_Qdadd_Rule_128_A1_P258"),
    parallel("Binary3RegisterOpAltBNoCondUpdates_Qdsub_Rule_129_A1_P260"),
];

static PKH: ClassDecoder = parallel("Binary3RegisterImmedShiftedOpRegsNotPc_Pkh_Rule_116_A1_P234");
static SEL: ClassDecoder = parallel("Binary3RegisterOpAltBNoCondUpdates_Sel_Rule_156_A1_P312");
static SXTAB16: ClassDecoder =
    parallel("Binary3RegisterImmedShiftedOpRegsNotPc_Sxtab16_Rule_221_A1_P436");
static SXTAB: ClassDecoder = parallel("Binary3RegisterOpAltBNoCondUpdates_Sxtab_Rule_220_A1_P434");
static SXTAH: ClassDecoder = parallel("Binary3RegisterOpAltBNoCondUpdates_Sxtah_Rule_222_A1_P438");
static UXTAB16: ClassDecoder =
    parallel("Binary3RegisterOpAltBNoCondUpdates_Uxtab16_Rule_262_A1_P516");
static UXTAB: ClassDecoder = parallel("Binary3RegisterOpAltBNoCondUpdates_Uxtab_Rule_260_A1_P514");
static UXTAH: ClassDecoder = parallel("Binary3RegisterOpAltBNoCondUpdates_Uxtah_Rule_262_A1_P518");
static SXTB16: ClassDecoder =
    unary_media("Unary2RegisterImmedShiftedOpRegsNotPc_Sxtb16_Rule_224_A1_P442");
static SXTB: ClassDecoder =
    unary_media("Unary2RegisterImmedShiftedOpRegsNotPc_Sxtb_Rule_223_A1_P440");
static SXTH: ClassDecoder =
    unary_media("Unary2RegisterOpNotRmIsPcNoCondUpdates_Sxth_Rule_225_A1_P444");
static UXTB16: ClassDecoder =
    unary_media("Unary2RegisterOpNotRmIsPcNoCondUpdates_Uxtb16_Rule_264_A1_P522");
static UXTB: ClassDecoder =
    unary_media("Unary2RegisterOpNotRmIsPcNoCondUpdates_Uxtb_Rule_263_A1_P520");
static UXTH: ClassDecoder =
    unary_media("Unary2RegisterOpNotRmIsPcNoCondUpdates_Uxth_Rule_265_A1_P524");
static SSAT: ClassDecoder = unary_media("Unary2RegisterSatImmedShiftedOp_Ssat_Rule_183_A1_P362");
static SSAT16: ClassDecoder =
    unary_media("Unary2RegisterSatImmedShiftedOp_Ssat16_Rule_184_A1_P364");
static USAT: ClassDecoder = unary_media("Unary2RegisterSatImmedShiftedOp_Usat_Rule_255_A1_P504");
static USAT16: ClassDecoder =
    unary_media("Unary2RegisterSatImmedShiftedOp_Usat16_Rule_256_A1_P506");
static REV: ClassDecoder =
    unary_media("Unary2RegisterOpNotRmIsPcNoCondUpdates_Rev_Rule_135_A1_P272");
static REV16: ClassDecoder =
    unary_media("Unary2RegisterOpNotRmIsPcNoCondUpdates_Rev16_Rule_136_A1_P274");
static RBIT: ClassDecoder =
    unary_media("Unary2RegisterOpNotRmIsPcNoCondUpdates_Rbit_Rule_134_A1_P270");
static REVSH: ClassDecoder =
    unary_media("Unary2RegisterOpNotRmIsPcNoCondUpdates_Revsh_Rule_137_A1_P276");
static CLZ: ClassDecoder = unary_media("Unary2RegisterOpNotRmIsPc_Clz_Rule_31_A1_P72");

static BFC: ClassDecoder = ClassDecoder::new(
    "Unary1RegisterBitRangeMsbGeLsb_Bfc",
    C::Unary1RegisterBitRangeMsbGeLsb,
);
static BFI: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterBitRangeMsbGeLsb_Bfi_Rule_18_A1_P48",
    C::Binary2RegisterBitRangeMsbGeLsb,
);
static SBFX: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterBitRangeNotRnIsPcBitfieldExtract_Sbfx_Rule_154_A1_P308",
    C::Binary2RegisterBitRangeNotRnIsPcBitfieldExtract,
);
static UBFX: ClassDecoder = ClassDecoder::new(
    "Binary2RegisterBitRangeNotRnIsPcBitfieldExtract_Ubfx_Rule_236_A1_P466",
    C::Binary2RegisterBitRangeNotRnIsPcBitfieldExtract,
);
static UDF: ClassDecoder = ClassDecoder::new("Roadblock_Udf", C::Roadblock);

// Miscellaneous and status register access

static MRS: ClassDecoder =
    ClassDecoder::new("Unary1RegisterSet_Mrs_Rule_102_A1_P206", C::Unary1RegisterSet);
static MSR_REG: ClassDecoder =
    ClassDecoder::new("Unary1RegisterUse_Msr_Rule_104_A1_P210", C::Unary1RegisterUse);
static MSR_IMM: ClassDecoder = ClassDecoder::new(
    "MoveImmediate12ToApsr_Msr_Rule_103_A1_P208",
    C::MoveImmediate12ToApsr,
);
static BX: ClassDecoder = ClassDecoder::new(
    "BranchToRegister_Bx_Rule_25_A1_P62",
    C::BranchToRegister { link: false },
);
static BLX_REG: ClassDecoder = ClassDecoder::new(
    "BranchToRegister_Blx_Rule_24_A1_P60",
    C::BranchToRegister { link: true },
);
static BKPT: ClassDecoder = ClassDecoder::new(
    "BreakPointAndConstantPoolHead_Bkpt_Rule_22_A1_P56",
    C::BreakPointAndConstantPoolHead,
);
static NOP: ClassDecoder = ClassDecoder::new("CondDecoder_Nop_Rule_110_A1_P222", C::CondNop);
static YIELD: ClassDecoder = ClassDecoder::new("CondDecoder_Yield_Rule_413_A1_P812", C::CondNop);

static FORBIDDEN_SYSTEM_REGISTER: ClassDecoder =
    unsafe_decoder("Forbidden_SystemRegisterAccess", SafetyLevel::Forbidden);
static FORBIDDEN_BXJ: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_Bxj_Rule_26_A1_P64", SafetyLevel::Forbidden);
static FORBIDDEN_ERET: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_Eret", SafetyLevel::Forbidden);
static FORBIDDEN_HVC: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_Hvc", SafetyLevel::Forbidden);
static FORBIDDEN_SMC: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_Smc", SafetyLevel::Forbidden);
static FORBIDDEN_WFE: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_Wfe_Rule_411_A1_P808", SafetyLevel::Forbidden);
static FORBIDDEN_WFI: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_Wfi_Rule_412_A1_P810", SafetyLevel::Forbidden);
static FORBIDDEN_SEV: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_Sev_Rule_158_A1_P316", SafetyLevel::Forbidden);
static FORBIDDEN_DBG: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_Dbg_Rule_40_A1_P88", SafetyLevel::Forbidden);
static FORBIDDEN_HINT: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_UnallocatedHint", SafetyLevel::Forbidden);

// Loads and stores

static LDR_IMM: ClassDecoder = ClassDecoder::new(
    "Load2RegisterImm12Op_Ldr_Rule_58_A1_P120",
    C::LoadStore2RegisterImm12Op {
        load: true,
        byte: false,
    },
);
static LDR_LIT: ClassDecoder = ClassDecoder::new(
    "Load2RegisterImm12Op_Ldr_Rule_59_A1_P122",
    C::LoadStore2RegisterImm12Op {
        load: true,
        byte: false,
    },
);
static LDRB_IMM: ClassDecoder = ClassDecoder::new(
    "Load2RegisterImm12Op_Ldrb_Rule_62_A1_P128",
    C::LoadStore2RegisterImm12Op {
        load: true,
        byte: true,
    },
);
static LDRB_LIT: ClassDecoder = ClassDecoder::new(
    "Load2RegisterImm12Op_Ldrb_Rule_63_A1_P130",
    C::LoadStore2RegisterImm12Op {
        load: true,
        byte: true,
    },
);
static STR_IMM: ClassDecoder = ClassDecoder::new(
    "Store2RegisterImm12Op_Str_Rule_194_A1_P384",
    C::LoadStore2RegisterImm12Op {
        load: false,
        byte: false,
    },
);
static STRB_IMM: ClassDecoder = ClassDecoder::new(
    "Store2RegisterImm12Op_Strb_Rule_197_A1_P390",
    C::LoadStore2RegisterImm12Op {
        load: false,
        byte: true,
    },
);

static LDRH_IMM: ClassDecoder = ClassDecoder::new(
    "Load2RegisterImm8Op_Ldrh_Rule_74_A1_P152",
    C::LoadStore2RegisterImm8Op {
        load: true,
        double: false,
    },
);
static LDRSB_IMM: ClassDecoder = ClassDecoder::new(
    "Load2RegisterImm8Op_Ldrsb_Rule_78_A1_P160",
    C::LoadStore2RegisterImm8Op {
        load: true,
        double: false,
    },
);
static LDRSH_IMM: ClassDecoder = ClassDecoder::new(
    "Load2RegisterImm8Op_Ldrsh_Rule_82_A1_P168",
    C::LoadStore2RegisterImm8Op {
        load: true,
        double: false,
    },
);
static LDRD_IMM: ClassDecoder = ClassDecoder::new(
    "Load2RegisterImm8DoubleOp_Ldrd_Rule_66_A1_P136",
    C::LoadStore2RegisterImm8Op {
        load: true,
        double: true,
    },
);
static STRH_IMM: ClassDecoder = ClassDecoder::new(
    "Store2RegisterImm8Op_Strh_Rule_207_A1_P410",
    C::LoadStore2RegisterImm8Op {
        load: false,
        double: false,
    },
);
static STRD_IMM: ClassDecoder = ClassDecoder::new(
    "Store2RegisterImm8DoubleOp_Strd_Rule_200_A1_P396",
    C::LoadStore2RegisterImm8Op {
        load: false,
        double: true,
    },
);

static LDREX: ClassDecoder = ClassDecoder::new(
    "LoadExclusive2RegisterOp_Ldrex_Rule_69_A1_P142",
    C::LoadExclusive2RegisterOp { double: false },
);
static LDREXB: ClassDecoder = ClassDecoder::new(
    "LoadExclusive2RegisterOp_Ldrexb_Rule_70_A1_P144",
    C::LoadExclusive2RegisterOp { double: false },
);
static LDREXH: ClassDecoder = ClassDecoder::new(
    "LoadExclusive2RegisterOp_Ldrexh_Rule_72_A1_P148",
    C::LoadExclusive2RegisterOp { double: false },
);
static LDREXD: ClassDecoder = ClassDecoder::new(
    "LoadExclusive2RegisterDoubleOp_Ldrexd_Rule_71_A1_P146",
    C::LoadExclusive2RegisterOp { double: true },
);
static STREX: ClassDecoder = ClassDecoder::new(
    "StoreExclusive3RegisterOp_Strex_Rule_202_A1_P400",
    C::StoreExclusive3RegisterOp { double: false },
);
static STREXB: ClassDecoder = ClassDecoder::new(
    "StoreExclusive3RegisterOp_Strexb_Rule_203_A1_P402",
    C::StoreExclusive3RegisterOp { double: false },
);
static STREXH: ClassDecoder = ClassDecoder::new(
    "StoreExclusive3RegisterOp_Strexh_Rule_205_A1_P406",
    C::StoreExclusive3RegisterOp { double: false },
);
static STREXD: ClassDecoder = ClassDecoder::new(
    "StoreExclusive3RegisterDoubleOp_Strexd_Rule_204_A1_P404",
    C::StoreExclusive3RegisterOp { double: true },
);

static LDM: ClassDecoder = ClassDecoder::new("LoadRegisterList_Ldm", C::LoadRegisterList);
static STM: ClassDecoder = ClassDecoder::new("StoreRegisterList_Stm", C::StoreRegisterList);

static DEPRECATED_SWP: ClassDecoder =
    unsafe_decoder("Deprecated_Swp", SafetyLevel::Deprecated);
static FORBIDDEN_UNPRIVILEGED: ClassDecoder =
    unsafe_decoder("Forbidden_UnprivilegedLoadStore", SafetyLevel::Forbidden);
static FORBIDDEN_REGISTER_OFFSET: ClassDecoder =
    unsafe_decoder("Forbidden_RegisterOffsetLoadStore", SafetyLevel::Forbidden);
static FORBIDDEN_USER_REGISTERS: ClassDecoder =
    unsafe_decoder("Forbidden_UserRegistersLoadStoreMultiple", SafetyLevel::Forbidden);

// Branches, supervisor calls, coprocessors

static B: ClassDecoder = ClassDecoder::new(
    "BranchImmediate24_B_Rule_16_A1_P44",
    C::BranchImmediate24 { link: false },
);
static BL: ClassDecoder = ClassDecoder::new(
    "BranchImmediate24_Bl_Rule_23_A1_P58",
    C::BranchImmediate24 { link: true },
);
static FORBIDDEN_SVC: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_Svc", SafetyLevel::Forbidden);
static FORBIDDEN_COPROCESSOR: ClassDecoder =
    unsafe_decoder("ForbiddenCondDecoder_Coprocessor", SafetyLevel::Forbidden);

// Unconditional space

static PLD: ClassDecoder = ClassDecoder::new(
    "PreloadRegisterImm12Op_Pld_Rule_117_A1_P236",
    C::PreloadRegisterImm12Op,
);
static PLDW: ClassDecoder = ClassDecoder::new(
    "PreloadRegisterImm12Op_Pldw_Rule_117_A1_P236",
    C::PreloadRegisterImm12Op,
);
static PLI: ClassDecoder = ClassDecoder::new(
    "PreloadRegisterImm12Op_Pli_Rule_120_A1_P242",
    C::PreloadRegisterImm12Op,
);
static DMB: ClassDecoder = ClassDecoder::new("DataBarrier_Dmb_Rule_41_A1_P90", C::DataBarrier);
static DSB: ClassDecoder = ClassDecoder::new("DataBarrier_Dsb_Rule_42_A1_P92", C::DataBarrier);
static ISB: ClassDecoder =
    ClassDecoder::new("InstructionBarrier_Isb_Rule_49_A1_P102", C::InstructionBarrier);
static CLREX: ClassDecoder = ClassDecoder::new("Clrex_Rule_30_A1_P70", C::ClearExclusive);
static VECTOR_OP: ClassDecoder = ClassDecoder::new("VectorOp", C::VectorOp);
static VECTOR_LOAD_STORE: ClassDecoder = ClassDecoder::new("VectorLoadStore", C::VectorLoadStore);

static FORBIDDEN_PRELOAD_REGISTER: ClassDecoder =
    unsafe_decoder("Forbidden_PreloadRegister_Rule_119_A1_P240", SafetyLevel::Forbidden);
static FORBIDDEN_CPS: ClassDecoder = unsafe_decoder("Forbidden_Cps_Setend", SafetyLevel::Forbidden);
static FORBIDDEN_UNCONDITIONAL: ClassDecoder =
    unsafe_decoder("ForbiddenUncondDecoder", SafetyLevel::Forbidden);

// VFP

static VFP_OP: ClassDecoder = ClassDecoder::new("VfpOp_Vfp", C::VfpOp);
static VMRS: ClassDecoder = ClassDecoder::new("VfpMrsOp_Vmrs_Rule_335_A1_P658", C::VfpMrsOp);
static VMSR: ClassDecoder = ClassDecoder::new(
    "VfpUsesRegOp_Vmsr_Rule_336_A1_P660",
    C::MoveVfpRegisterOp { dual: false },
);
static VMOV_SINGLE: ClassDecoder = ClassDecoder::new(
    "MoveVfpRegisterOp_Vmov_Rule_330_A1_P648",
    C::MoveVfpRegisterOp { dual: false },
);
static VMOV_DUAL: ClassDecoder = ClassDecoder::new(
    "MoveDoubleVfpRegisterOp_Vmov",
    C::MoveVfpRegisterOp { dual: true },
);
static VMOV_TO_SCALAR: ClassDecoder = ClassDecoder::new(
    "MoveVfpRegisterOpWithTypeSel_Vmov_Rule_328_A1_P644",
    C::MoveVfpRegisterOp { dual: false },
);
static VMOV_FROM_SCALAR: ClassDecoder = ClassDecoder::new(
    "MoveVfpRegisterOpWithTypeSel_Vmov_Rule_329_A1_P646",
    C::MoveVfpRegisterOp { dual: false },
);
static VDUP: ClassDecoder = ClassDecoder::new(
    "DuplicateToAdvSIMDRegisters_Vdup_Rule_303_A1_P594",
    C::MoveVfpRegisterOp { dual: false },
);
static VLDR: ClassDecoder = ClassDecoder::new(
    "LoadVectorRegister_Vldr",
    C::LoadStoreVectorRegister { load: true },
);
static VSTR: ClassDecoder = ClassDecoder::new(
    "StoreVectorRegister_Vstr",
    C::LoadStoreVectorRegister { load: false },
);
static VLDM: ClassDecoder = ClassDecoder::new(
    "LoadVectorRegisterList_Vldm",
    C::LoadStoreVectorRegisterList { load: true },
);
static VSTM: ClassDecoder = ClassDecoder::new(
    "StoreVectorRegisterList_Vstm",
    C::LoadStoreVectorRegisterList { load: false },
);

/// Maps an instruction word to its class decoder
pub fn decode(i: Instruction) -> &'static ClassDecoder {
    if i.condition() == Condition::Unconditional {
        return decode_unconditional(i);
    }
    match i.bits(27, 25) {
        0b000 | 0b001 => decode_data_processing_and_misc(i),
        0b010 => decode_load_store_immediate(i),
        0b011 if i.bit(4) => decode_media(i),
        0b011 => &FORBIDDEN_REGISTER_OFFSET,
        0b100 => decode_block_transfer(i),
        0b101 if i.bit(24) => &BL,
        0b101 => &B,
        _ => decode_coprocessor_and_supervisor_call(i),
    }
}

fn decode_data_processing_and_misc(i: Instruction) -> &'static ClassDecoder {
    let op1 = i.bits(24, 20);
    let op2 = i.bits(7, 4);
    let misc_space = op1 & 0b11001 == 0b10000;

    if i.bit(25) {
        return match op1 {
            0b10000 => &MOVW,
            0b10100 => &MOVT,
            0b10010 | 0b10110 => decode_msr_immediate_and_hints(i),
            _ => decode_data_processing_immediate(i),
        };
    }
    if op2 == 0b1001 {
        return if op1 & 0b10000 == 0 {
            decode_multiply(i)
        } else {
            decode_synchronization(i)
        };
    }
    if op2 == 0b1011 || op2 & 0b1101 == 0b1101 {
        return if op1 & 0b10010 == 0b00010 {
            &FORBIDDEN_UNPRIVILEGED
        } else {
            decode_extra_load_store(i)
        };
    }
    if misc_space {
        return if op2 & 0b1000 == 0 {
            decode_misc(i)
        } else {
            decode_halfword_multiply(i)
        };
    }
    if op2 & 1 == 0 {
        decode_data_processing_register(i)
    } else {
        decode_data_processing_register_shifted(i)
    }
}

fn decode_data_processing_immediate(i: Instruction) -> &'static ClassDecoder {
    let pc_relative = i.rn() == Register::PC;
    match i.bits(24, 21) {
        0b0000 => &AND_IMM,
        0b0001 => &EOR_IMM,
        0b0010 if pc_relative && !i.updates_flags() => &ADR_SUB,
        0b0010 => &SUB_IMM,
        0b0011 => &RSB_IMM,
        0b0100 if pc_relative && !i.updates_flags() => &ADR_ADD,
        0b0100 => &ADD_IMM,
        0b0101 => &ADC_IMM,
        0b0110 => &SBC_IMM,
        0b0111 => &RSC_IMM,
        0b1000 => &TST_IMM,
        0b1001 => &TEQ_IMM,
        0b1010 => &CMP_IMM,
        0b1011 => &CMN_IMM,
        0b1100 => &ORR_IMM,
        0b1101 => &MOV_IMM,
        0b1110 => &BIC_IMM,
        _ => &MVN_IMM,
    }
}

fn decode_data_processing_register(i: Instruction) -> &'static ClassDecoder {
    match i.bits(24, 21) {
        0b0000 => &AND_REG,
        0b0001 => &EOR_REG,
        0b0010 => &SUB_REG,
        0b0011 => &RSB_REG,
        0b0100 => &ADD_REG,
        0b0101 => &ADC_REG,
        0b0110 => &SBC_REG,
        0b0111 => &RSC_REG,
        0b1000 => &TST_REG,
        0b1001 => &TEQ_REG,
        0b1010 => &CMP_REG,
        0b1011 => &CMN_REG,
        0b1100 => &ORR_REG,
        0b1101 => match (i.bits(6, 5), i.imm5()) {
            (0b00, 0) => &MOV_REG,
            (0b00, _) => &LSL_IMM,
            (0b01, _) => &LSR_IMM,
            (0b10, _) => &ASR_IMM,
            (_, 0) => &RRX,
            _ => &ROR_IMM,
        },
        0b1110 => &BIC_REG,
        _ => &MVN_REG,
    }
}

fn decode_data_processing_register_shifted(i: Instruction) -> &'static ClassDecoder {
    match i.bits(24, 21) {
        0b0000 => &AND_RSR,
        0b0001 => &EOR_RSR,
        0b0010 => &SUB_RSR,
        0b0011 => &RSB_RSR,
        0b0100 => &ADD_RSR,
        0b0101 => &ADC_RSR,
        0b0110 => &SBC_RSR,
        0b0111 => &RSC_RSR,
        0b1000 => &TST_RSR,
        0b1001 => &TEQ_RSR,
        0b1010 => &CMP_RSR,
        0b1011 => &CMN_RSR,
        0b1100 => &ORR_RSR,
        0b1101 => match i.bits(6, 5) {
            0b00 => &LSL_REG,
            0b01 => &LSR_REG,
            0b10 => &ASR_REG,
            _ => &ROR_REG,
        },
        0b1110 => &BIC_RSR,
        _ => &MVN_RSR,
    }
}

fn decode_misc(i: Instruction) -> &'static ClassDecoder {
    let op = i.bits(22, 21);
    match (i.bits(6, 4), op) {
        // Banked register access
        (0b000, _) if i.bit(9) => &FORBIDDEN_SYSTEM_REGISTER,
        (0b000, 0b00) => &MRS,
        (0b000, 0b01) if i.bits(17, 16) == 0 => &MSR_REG,
        (0b000, _) => &FORBIDDEN_SYSTEM_REGISTER,
        (0b001, 0b01) => &BX,
        (0b001, 0b11) => &CLZ,
        (0b010, 0b01) => &FORBIDDEN_BXJ,
        (0b011, 0b01) => &BLX_REG,
        (0b101, _) => &SATURATING[op as usize],
        (0b110, 0b11) => &FORBIDDEN_ERET,
        (0b111, 0b01) => &BKPT,
        (0b111, 0b10) => &FORBIDDEN_HVC,
        (0b111, 0b11) => &FORBIDDEN_SMC,
        _ => &UNDEFINED,
    }
}

fn decode_msr_immediate_and_hints(i: Instruction) -> &'static ClassDecoder {
    if i.bit(22) {
        return &FORBIDDEN_SYSTEM_REGISTER;
    }
    match i.bits(19, 16) {
        0b0000 => match i.bits(7, 0) {
            0x00 => &NOP,
            0x01 => &YIELD,
            0x02 => &FORBIDDEN_WFE,
            0x03 => &FORBIDDEN_WFI,
            0x04 => &FORBIDDEN_SEV,
            0xf0..=0xff => &FORBIDDEN_DBG,
            _ => &FORBIDDEN_HINT,
        },
        0b0100 | 0b1000 | 0b1100 => &MSR_IMM,
        _ => &FORBIDDEN_SYSTEM_REGISTER,
    }
}

fn decode_multiply(i: Instruction) -> &'static ClassDecoder {
    match i.bits(23, 21) {
        0b000 => &MUL,
        0b001 => &MLA,
        0b010 if !i.updates_flags() => &UMAAL,
        0b011 if !i.updates_flags() => &MLS,
        0b100 => &UMULL,
        0b101 => &UMLAL,
        0b110 => &SMULL,
        0b111 => &SMLAL,
        _ => &UNDEFINED,
    }
}

fn decode_halfword_multiply(i: Instruction) -> &'static ClassDecoder {
    match i.bits(22, 21) {
        0b00 => &SMLAXY,
        0b01 if i.bit(5) => &SMULWY,
        0b01 => &SMLAWY,
        0b10 => &SMLALXY,
        _ => &SMULXY,
    }
}

fn decode_synchronization(i: Instruction) -> &'static ClassDecoder {
    match i.bits(23, 20) {
        0b0000 | 0b0100 => &DEPRECATED_SWP,
        0b1000 => &STREX,
        0b1001 => &LDREX,
        0b1010 => &STREXD,
        0b1011 => &LDREXD,
        0b1100 => &STREXB,
        0b1101 => &LDREXB,
        0b1110 => &STREXH,
        0b1111 => &LDREXH,
        _ => &UNDEFINED,
    }
}

fn decode_extra_load_store(i: Instruction) -> &'static ClassDecoder {
    if !i.bit22() {
        return &FORBIDDEN_REGISTER_OFFSET;
    }
    match (i.bits(6, 5), i.is_load()) {
        (0b01, false) => &STRH_IMM,
        (0b01, true) => &LDRH_IMM,
        (0b10, false) => &LDRD_IMM,
        (0b10, true) => &LDRSB_IMM,
        (0b11, false) => &STRD_IMM,
        _ => &LDRSH_IMM,
    }
}

fn decode_load_store_immediate(i: Instruction) -> &'static ClassDecoder {
    if !i.pre_indexed() && i.writeback_bit() {
        return &FORBIDDEN_UNPRIVILEGED;
    }
    let literal = i.rn() == Register::PC;
    match (i.is_load(), i.bit22()) {
        (true, false) if literal => &LDR_LIT,
        (true, false) => &LDR_IMM,
        (true, true) if literal => &LDRB_LIT,
        (true, true) => &LDRB_IMM,
        (false, false) => &STR_IMM,
        (false, true) => &STRB_IMM,
    }
}

fn decode_media(i: Instruction) -> &'static ClassDecoder {
    let op1 = i.bits(24, 20);
    let op2 = i.bits(7, 5);
    match op1 >> 3 {
        0b00 => {
            let table = if op1 & 0b100 == 0 {
                &SIGNED_PARALLEL
            } else {
                &UNSIGNED_PARALLEL
            };
            match op1 & 0b11 {
                0 => &UNDEFINED,
                row => table[row as usize - 1][op2 as usize]
                    .as_ref()
                    .unwrap_or(&UNDEFINED),
            }
        }
        0b01 => decode_packing(i),
        0b10 => decode_signed_multiply(i),
        _ => match (op1, op2) {
            (0b11000, 0b000) if i.rd() == Register::PC => &USAD8,
            (0b11000, 0b000) => &USADA8,
            (0b11010 | 0b11011, 0b010 | 0b110) => &SBFX,
            (0b11100 | 0b11101, 0b000 | 0b100) if i.rm() == Register::PC => &BFC,
            (0b11100 | 0b11101, 0b000 | 0b100) => &BFI,
            (0b11110 | 0b11111, 0b010 | 0b110) => &UBFX,
            (0b11111, 0b111) => &UDF,
            _ => &UNDEFINED,
        },
    }
}

fn decode_packing(i: Instruction) -> &'static ClassDecoder {
    let extend = |with_add: &'static ClassDecoder, alone: &'static ClassDecoder| {
        if i.rn() == Register::PC { alone } else { with_add }
    };
    let op2 = i.bits(7, 5);
    match (i.bits(22, 20), op2) {
        (0b000, _) if op2 & 1 == 0 => &PKH,
        (0b000, 0b011) => extend(&SXTAB16, &SXTB16),
        (0b000, 0b101) => &SEL,
        (0b010 | 0b011, _) if op2 & 1 == 0 => &SSAT,
        (0b010, 0b001) => &SSAT16,
        (0b010, 0b011) => extend(&SXTAB, &SXTB),
        (0b011, 0b001) => &REV,
        (0b011, 0b011) => extend(&SXTAH, &SXTH),
        (0b011, 0b101) => &REV16,
        (0b100, 0b011) => extend(&UXTAB16, &UXTB16),
        (0b110 | 0b111, _) if op2 & 1 == 0 => &USAT,
        (0b110, 0b001) => &USAT16,
        (0b110, 0b011) => extend(&UXTAB, &UXTB),
        (0b111, 0b001) => &RBIT,
        (0b111, 0b011) => extend(&UXTAH, &UXTH),
        (0b111, 0b101) => &REVSH,
        _ => &UNDEFINED,
    }
}

fn decode_signed_multiply(i: Instruction) -> &'static ClassDecoder {
    // Ra of 1111 selects the non-accumulating form
    let accumulate = i.rd() != Register::PC;
    match (i.bits(22, 20), i.bits(7, 6)) {
        (0b000, 0b00) if accumulate => &SMLAD,
        (0b000, 0b00) => &SMUAD,
        (0b000, 0b01) if accumulate => &SMLSD,
        (0b000, 0b01) => &SMUSD,
        (0b001, 0b00) if !i.bit(5) => &SDIV,
        (0b011, 0b00) if !i.bit(5) => &UDIV,
        (0b100, 0b00) => &SMLALD,
        (0b100, 0b01) => &SMLSLD,
        (0b101, 0b00) if accumulate => &SMMLA,
        (0b101, 0b00) => &SMMUL,
        (0b101, 0b11) => &SMMLS,
        _ => &UNDEFINED,
    }
}

fn decode_block_transfer(i: Instruction) -> &'static ClassDecoder {
    if i.bit22() {
        &FORBIDDEN_USER_REGISTERS
    } else if i.is_load() {
        &LDM
    } else {
        &STM
    }
}

fn decode_coprocessor_and_supervisor_call(i: Instruction) -> &'static ClassDecoder {
    if i.bits(25, 24) == 0b11 {
        return &FORBIDDEN_SVC;
    }
    if i.bits(11, 9) != 0b101 {
        return &FORBIDDEN_COPROCESSOR;
    }
    let op1 = i.bits(25, 20);
    if op1 & 0b100000 == 0 {
        decode_extension_load_store(i)
    } else if !i.bit(4) {
        &VFP_OP
    } else {
        decode_core_extension_transfer(i)
    }
}

/// `vldr`/`vstr`/`vldm`/`vstm` and 64-bit core register transfers
fn decode_extension_load_store(i: Instruction) -> &'static ClassDecoder {
    let op = i.bits(24, 20);
    if op & 0b11110 == 0 {
        return &UNDEFINED;
    }
    if op & 0b11110 == 0b00100 {
        return &VMOV_DUAL;
    }
    let (puw, load) = (i.bits(24, 23) << 1 | i.bits(21, 21), i.is_load());
    match puw {
        // P=1 W=0: single register, either direction of offset
        0b100 | 0b110 if load => &VLDR,
        0b100 | 0b110 => &VSTR,
        0b010 | 0b011 | 0b101 if load => &VLDM,
        0b010 | 0b011 | 0b101 => &VSTM,
        _ => &UNDEFINED,
    }
}

/// 8, 16 and 32-bit transfers between core and extension registers
fn decode_core_extension_transfer(i: Instruction) -> &'static ClassDecoder {
    let to_core = i.is_load();
    let a = i.bits(23, 21);
    if i.bit(8) {
        return match (to_core, a & 0b100 != 0 && !i.bit(6)) {
            (false, true) => &VDUP,
            (false, false) => &VMOV_TO_SCALAR,
            (true, _) => &VMOV_FROM_SCALAR,
        };
    }
    match (to_core, a) {
        (_, 0b000) => &VMOV_SINGLE,
        (false, 0b111) if i.bits(19, 16) == 0b0001 => &VMSR,
        (true, 0b111) if i.bits(19, 16) == 0b0001 => &VMRS,
        // fpsid, fpexc and the other extension system registers
        (_, 0b111) => &NOT_IMPLEMENTED,
        _ => &UNDEFINED,
    }
}

fn decode_unconditional(i: Instruction) -> &'static ClassDecoder {
    if i.bit(27) {
        return &FORBIDDEN_UNCONDITIONAL;
    }
    let op1 = i.bits(26, 20);
    match op1 {
        0b001_0000 => &FORBIDDEN_CPS,
        _ if op1 >> 5 == 0b01 => &VECTOR_OP,
        _ if op1 & 0b111_0001 == 0b100_0000 => &VECTOR_LOAD_STORE,
        _ if op1 & 0b111_0111 == 0b100_0001 => &FORBIDDEN_HINT,
        _ if op1 & 0b111_0111 == 0b100_0101 => &PLI,
        _ if op1 & 0b111_0111 == 0b101_0001 && i.rn() == Register::PC => &UNPREDICTABLE,
        _ if op1 & 0b111_0111 == 0b101_0001 => &PLDW,
        _ if op1 & 0b111_0111 == 0b101_0101 => &PLD,
        0b101_0111 if i.bits(19, 8) != 0xff0 => &UNPREDICTABLE,
        0b101_0111 => match i.bits(7, 4) {
            0b0001 => &CLREX,
            0b0100 => &DSB,
            0b0101 => &DMB,
            0b0110 => &ISB,
            _ => &UNPREDICTABLE,
        },
        _ if op1 & 0b110_0111 == 0b110_0101 || op1 & 0b111_0111 == 0b111_0001 => {
            &FORBIDDEN_PRELOAD_REGISTER
        }
        _ => &UNDEFINED,
    }
}

#[cfg(test)]
mod tests {
    use sfi_core::SafetyLevel;

    use super::decode;
    use crate::Instruction;

    fn name(word: u32) -> &'static str {
        decode(Instruction::new(word)).name()
    }

    fn safety(word: u32) -> SafetyLevel {
        let i = Instruction::new(word);
        decode(i).safety(i)
    }

    #[test]
    fn test_data_processing() {
        // bic r0, r0, #0xc0000000
        assert_eq!(name(0xe3c00103), "MaskedBinary2RegisterImmediateOp_Bic_Rule_19_A1_P50");
        // tst r0, #0xc0000000
        assert_eq!(name(0xe3100103), "MaskedBinaryRegisterImmediateTest_Tst_Rule_230_A1_P454");
        // mov r0, r1
        assert_eq!(name(0xe1a00001), "Unary2RegisterOp_Mov_Rule_97_A1_P196");
        // lsl r0, r1, #2
        assert_eq!(name(0xe1a00101), "Unary2RegisterImmedShiftedOp_Lsl_Rule_88_A1_P178");
        // add r0, r1, r2, lsl r3
        assert_eq!(name(0xe0810312), "Binary4RegisterShiftedOp_Add_Rule_7_A1_P26");
        // movw r0, #0x1234
        assert_eq!(name(0xe3010234), "Unary1RegisterImmediateOp_Mov_Rule_96_A2_P194");
        // adr r0, .+8 (add r0, pc, #0)
        assert_eq!(name(0xe28f0000), "Unary1RegisterImmediateOp_Adr_Rule_10_A1_P32");
    }

    #[test]
    fn test_misc() {
        // bx lr
        assert_eq!(name(0xe12fff1e), "BranchToRegister_Bx_Rule_25_A1_P62");
        // blx r1
        assert_eq!(name(0xe12fff31), "BranchToRegister_Blx_Rule_24_A1_P60");
        // bkpt #0x7777
        assert_eq!(name(0xe1277777), "BreakPointAndConstantPoolHead_Bkpt_Rule_22_A1_P56");
        // mrs r0, apsr
        assert_eq!(name(0xe10f0000), "Unary1RegisterSet_Mrs_Rule_102_A1_P206");
        // clz r0, r1
        assert_eq!(name(0xe16f0f11), "Unary2RegisterOpNotRmIsPc_Clz_Rule_31_A1_P72");
        // qadd r0, r1, r2
        assert_eq!(name(0xe1020051), "Binary3RegisterOpAltBNoCondUpdates_Qadd_Rule_124_A1_P250");
        // nop
        assert_eq!(name(0xe320f000), "CondDecoder_Nop_Rule_110_A1_P222");
        // wfi
        assert_eq!(safety(0xe320f003), SafetyLevel::Forbidden);
        // mrs r0, spsr
        assert_eq!(safety(0xe14f0000), SafetyLevel::Forbidden);
    }

    #[test]
    fn test_multiply() {
        // mul r0, r1, r2
        assert_eq!(name(0xe0000291), "Binary3RegisterOpAltA_Mul_Rule_105_A1_P212");
        // umull r0, r1, r2, r3
        assert_eq!(name(0xe0810392), "Binary4RegisterDualResult_Umull_Rule_246_A1_P486");
        // umull r0, r0, r2, r3
        assert_eq!(safety(0xe0800392), SafetyLevel::Unpredictable);
        // swp r0, r1, [r2]
        assert_eq!(safety(0xe1020091), SafetyLevel::Deprecated);
    }

    #[test]
    fn test_loads_and_stores() {
        // ldr r0, [r1]
        assert_eq!(name(0xe5910000), "Load2RegisterImm12Op_Ldr_Rule_58_A1_P120");
        // ldr r0, [pc, #8]
        assert_eq!(name(0xe59f0008), "Load2RegisterImm12Op_Ldr_Rule_59_A1_P122");
        // strb r0, [r1]
        assert_eq!(name(0xe5c10000), "Store2RegisterImm12Op_Strb_Rule_197_A1_P390");
        // ldrt r0, [r1]
        assert_eq!(safety(0xe4b10000), SafetyLevel::Forbidden);
        // ldr r0, [r1, r2]
        assert_eq!(safety(0xe7910002), SafetyLevel::Forbidden);
        // ldrh r0, [r1, #2]
        assert_eq!(name(0xe1d100b2), "Load2RegisterImm8Op_Ldrh_Rule_74_A1_P152");
        // ldrd r0, r1, [r2]
        assert_eq!(name(0xe1c200d0), "Load2RegisterImm8DoubleOp_Ldrd_Rule_66_A1_P136");
        // ldrex r0, [r1]
        assert_eq!(name(0xe1910f9f), "LoadExclusive2RegisterOp_Ldrex_Rule_69_A1_P142");
        // strex r0, r2, [r1]
        assert_eq!(name(0xe1810f92), "StoreExclusive3RegisterOp_Strex_Rule_202_A1_P400");
        // push {r4, lr}
        assert_eq!(name(0xe92d4010), "StoreRegisterList_Stm");
        // pop {r4, pc}
        assert_eq!(safety(0xe8bd8010), SafetyLevel::ForbiddenOperands);
    }

    #[test]
    fn test_media() {
        // uxtb r0, r1
        assert_eq!(
            name(0xe6ef0071),
            "Unary2RegisterOpNotRmIsPcNoCondUpdates_Uxtb_Rule_263_A1_P520"
        );
        // uxtab r0, r2, r1
        assert_eq!(name(0xe6e20071), "Binary3RegisterOpAltBNoCondUpdates_Uxtab_Rule_260_A1_P514");
        // sadd16 r0, r1, r2
        assert_eq!(name(0xe6110f12), "Binary3RegisterOpAltBNoCondUpdates_Sadd16_Rule_148_A1_P296");
        // rev r0, r1
        assert_eq!(name(0xe6bf0f31), "Unary2RegisterOpNotRmIsPcNoCondUpdates_Rev_Rule_135_A1_P272");
        // bfc r0, #30, #2
        assert_eq!(name(0xe7df0f1f), "Unary1RegisterBitRangeMsbGeLsb_Bfc");
        // ubfx r0, r1, #0, #8
        assert_eq!(
            name(0xe7e70051),
            "Binary2RegisterBitRangeNotRnIsPcBitfieldExtract_Ubfx_Rule_236_A1_P466"
        );
        // udf #0
        assert_eq!(name(0xe7f000f0), "Roadblock_Udf");
        assert_eq!(safety(0xe7f000f0), SafetyLevel::MayBeSafe);
    }

    #[test]
    fn test_branches_and_system() {
        // b .
        assert_eq!(name(0xeafffffe), "BranchImmediate24_B_Rule_16_A1_P44");
        // bl .+8
        assert_eq!(name(0xeb000000), "BranchImmediate24_Bl_Rule_23_A1_P58");
        // svc #0
        assert_eq!(safety(0xef000000), SafetyLevel::Forbidden);
        // mcr p15, 0, r0, c7, c5, 0
        assert_eq!(safety(0xee070f15), SafetyLevel::Forbidden);
    }

    #[test]
    fn test_unconditional_space() {
        // pld [r0]
        assert_eq!(name(0xf5d0f000), "PreloadRegisterImm12Op_Pld_Rule_117_A1_P236");
        // dmb ish
        assert_eq!(name(0xf57ff05b), "DataBarrier_Dmb_Rule_41_A1_P90");
        // isb sy
        assert_eq!(name(0xf57ff06f), "InstructionBarrier_Isb_Rule_49_A1_P102");
        // clrex
        assert_eq!(name(0xf57ff01f), "Clrex_Rule_30_A1_P70");
        // cpsid i
        assert_eq!(safety(0xf10c0080), SafetyLevel::Forbidden);
        // blx .+8
        assert_eq!(safety(0xfa000000), SafetyLevel::Forbidden);
        // vadd.i32 q0, q1, q2
        assert_eq!(name(0xf2220844), "VectorOp");
        // vld1.32 {d0}, [r0]
        assert_eq!(name(0xf420078f), "VectorLoadStore");
    }

    #[test]
    fn test_vfp() {
        // vadd.f32 s0, s1, s2
        assert_eq!(name(0xee300a81), "VfpOp_Vfp");
        // vmrs APSR_nzcv, fpscr
        assert_eq!(name(0xeef1fa10), "VfpMrsOp_Vmrs_Rule_335_A1_P658");
        // vmov r0, s0
        assert_eq!(name(0xee100a10), "MoveVfpRegisterOp_Vmov_Rule_330_A1_P648");
        // vldr d0, [r0]
        assert_eq!(name(0xed900b00), "LoadVectorRegister_Vldr");
        // vpush {d8}
        assert_eq!(name(0xed2d8b02), "StoreVectorRegisterList_Vstm");
        // vmov r0, r1, d0
        assert_eq!(name(0xec510b10), "MoveDoubleVfpRegisterOp_Vmov");
    }

    #[test]
    fn test_every_word_decodes() {
        let mut word: u32 = 0x1234_5678;
        for _ in 0..10_000 {
            word = word.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let i = Instruction::new(word);
            let decoder = decode(i);
            assert!(!decoder.name().is_empty());
            let _ = decoder.safety(i);
        }
    }
}
