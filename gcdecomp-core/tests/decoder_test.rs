// Unit tests for the PowerPC decoder.

mod utils;

use gcdecomp_core::decompiler::datasource::{
    CrField, DataSource, DataType, Fpr, Gpr, InstFlags, InstSideFx, XerBit,
};
use gcdecomp_core::decompiler::decoder::{
    bo_kind, decode, BoKind, InstOperation, SimplifiedRlwinm,
};

#[test]
fn test_decode_add() {
    // add r3, r3, r4
    let inst = decode(0, 0x7c63_2214);
    assert_eq!(inst.op, InstOperation::Add);
    assert_eq!(inst.reads.len(), 2);
    assert!(matches!(inst.reads[0], DataSource::Gpr(s) if s.reg == Gpr(3)));
    assert!(matches!(inst.reads[1], DataSource::Gpr(s) if s.reg == Gpr(4)));
    assert!(matches!(inst.write, Some(DataSource::Gpr(s)) if s.reg == Gpr(3)));
    assert!(inst.side_effects.is_empty());
}

#[test]
fn test_decode_add_record_overflow() {
    // addo. r3, r3, r4: Rc and OE set
    let inst = decode(0, 0x7c63_2214 | 0b11);
    assert_eq!(inst.op, InstOperation::Add);
    assert!(inst.side_effects.intersects(InstSideFx::WRITES_RECORD));
    assert!(inst.side_effects.intersects(InstSideFx::WRITES_OV_SO));
}

#[test]
fn test_decode_addi_forms() {
    // addi r1, r1, -8 reads the base register
    let inst = decode(0, utils::addi(1, 1, -8));
    assert_eq!(inst.op, InstOperation::Addi);
    assert!(matches!(inst.reads[0], DataSource::Gpr(s) if s.reg == Gpr::R1));
    assert_eq!(inst.reads[1], DataSource::Simm(-8));

    // li r3, 5: rA = r0 becomes the literal zero
    let inst = decode(0, utils::li(3, 5));
    assert_eq!(inst.reads[0], DataSource::AuxImm(0));
    assert_eq!(inst.reads[1], DataSource::Simm(5));
}

#[test]
fn test_updating_load() {
    // lwzu r5, 4(r4)
    let inst = decode(0, utils::lwzu(5, 4, 4));
    assert_eq!(inst.op, InstOperation::Lwzu);
    assert_eq!(inst.reads.len(), 1);
    assert!(matches!(
        inst.reads[0],
        DataSource::MemRegOff(m) if m.base == Gpr(4) && m.offset == 4 && m.width == DataType::S4
    ));
    assert!(matches!(
        inst.write,
        Some(DataSource::Gpr(s)) if s.reg == Gpr(5) && s.width == DataType::S4
    ));
    assert!(inst.side_effects.intersects(InstSideFx::WRITES_BASE_REG));
}

#[test]
fn test_decode_stwu_frame_allocate() {
    // stwu r1, -32(r1)
    let inst = decode(0, utils::stwu(1, -32, 1));
    assert_eq!(inst.op, InstOperation::Stwu);
    assert!(matches!(inst.reads[0], DataSource::Gpr(s) if s.reg == Gpr::R1));
    assert!(matches!(
        inst.write,
        Some(DataSource::MemRegOff(m)) if m.base == Gpr::R1 && m.offset == -32
    ));
    assert!(inst.side_effects.intersects(InstSideFx::WRITES_BASE_REG));
}

#[test]
fn test_branch_targets() {
    let inst = decode(0x100, utils::b(0x10));
    assert_eq!(inst.op, InstOperation::B);
    assert_eq!(inst.branch_target(), 0x110);
    assert!(!inst.side_effects.intersects(InstSideFx::WRITES_LR));

    let inst = decode(0x100, utils::b(-0x20));
    assert_eq!(inst.branch_target(), 0xe0);

    let inst = decode(0x100, utils::bl(0x40));
    assert!(inst.side_effects.intersects(InstSideFx::WRITES_LR));
    assert_eq!(inst.branch_target(), 0x140);

    // Absolute branch ignores the instruction address
    let inst = decode(0x100, utils::b(0x1000) | 0b10);
    assert!(inst.flags.intersects(InstFlags::ABSOLUTE_ADDR));
    assert_eq!(inst.branch_target(), 0x1000);

    let inst = decode(0x100, utils::beq(0x8));
    assert_eq!(inst.op, InstOperation::Bc);
    assert_eq!(inst.branch_target(), 0x108);
}

#[test]
fn test_decode_blr() {
    let inst = decode(0, utils::blr());
    assert_eq!(inst.op, InstOperation::Bclr);
    assert!(inst.is_blr());
    assert!(inst.write.is_none());

    // beqlr is not a plain return
    let inst = decode(0, 0x4d82_0020);
    assert_eq!(inst.op, InstOperation::Bclr);
    assert!(!inst.is_blr());
}

#[test]
fn test_bo_classification() {
    assert_eq!(bo_kind(12), BoKind::T);
    assert_eq!(bo_kind(4), BoKind::F);
    assert_eq!(bo_kind(20), BoKind::Always);
    assert_eq!(bo_kind(16), BoKind::Dnz);
    assert_eq!(bo_kind(18), BoKind::Dz);
    assert_eq!(bo_kind(0), BoKind::Dnzf);
    assert_eq!(bo_kind(2), BoKind::Dzf);
    assert_eq!(bo_kind(8), BoKind::Dnzt);
    assert_eq!(bo_kind(10), BoKind::Dzt);
}

#[test]
fn test_rotate_simplifications() {
    // rlwinm r3, r4, 0, 0, 31-k is clrrwi k
    let inst = decode(0, utils::rlwinm(3, 4, 0, 0, 31 - 5));
    assert_eq!(inst.simplified_rlwinm(), SimplifiedRlwinm::Clrrwi { n: 5 });

    // rlwinm r3, r4, 0, k, 31 is clrlwi k
    let inst = decode(0, utils::rlwinm(3, 4, 0, 5, 31));
    assert_eq!(inst.simplified_rlwinm(), SimplifiedRlwinm::Clrlwi { n: 5 });

    // rlwinm r3, r4, s, 0, 31 with s < 16 is rotlwi s
    let inst = decode(0, utils::rlwinm(3, 4, 4, 0, 31));
    assert_eq!(inst.simplified_rlwinm(), SimplifiedRlwinm::Rotlwi { n: 4 });

    // and with s >= 16, rotrwi 32-s
    let inst = decode(0, utils::rlwinm(3, 4, 20, 0, 31));
    assert_eq!(inst.simplified_rlwinm(), SimplifiedRlwinm::Rotrwi { n: 12 });

    // slwi n = rlwinm sh=n, mb=0, me=31-n
    let inst = decode(0, utils::rlwinm(3, 4, 3, 0, 28));
    assert_eq!(inst.simplified_rlwinm(), SimplifiedRlwinm::Slwi { n: 3 });

    // srwi n = rlwinm sh=32-n, mb=n, me=31
    let inst = decode(0, utils::rlwinm(3, 4, 29, 3, 31));
    assert_eq!(inst.simplified_rlwinm(), SimplifiedRlwinm::Srwi { n: 3 });
}

#[test]
fn test_decode_is_pure() {
    // Same word + va in, same fields out
    let word = utils::add(3, 3, 4);
    let a = decode(0x8000_0000, word);
    let b = decode(0x8000_0000, word);
    assert_eq!(a.op, b.op);
    assert_eq!(a.va, b.va);
    assert_eq!(a.reads.as_slice(), b.reads.as_slice());
    assert_eq!(a.write, b.write);
    assert_eq!(a.side_effects, b.side_effects);
    assert_eq!(a.flags, b.flags);
}

#[test]
fn test_decode_unknown_word() {
    let inst = decode(0, 0);
    assert_eq!(inst.op, InstOperation::Invalid);
    assert!(inst.reads.is_empty());
    assert!(inst.write.is_none());

    // Opcode 31 with a bogus function code
    let inst = decode(0, (31 << 26) | (1023 << 1));
    assert_eq!(inst.op, InstOperation::Invalid);
}

#[test]
fn test_decode_cmpwi() {
    let inst = decode(0, utils::cmpwi(0, 3, 0));
    assert_eq!(inst.op, InstOperation::Cmpi);
    assert!(matches!(inst.reads[0], DataSource::Gpr(s) if s.reg == Gpr(3)));
    assert_eq!(inst.reads[1], DataSource::Simm(0));
    assert_eq!(inst.reads[2], DataSource::XerBit(XerBit::So));
    assert_eq!(inst.write, Some(DataSource::CrField(CrField(0))));
}

#[test]
fn test_decode_mcrf() {
    // mcrf cr2, cr5 reads the source field, writes the destination
    let inst = decode(0, (19 << 26) | (2 << 23) | (5 << 18));
    assert_eq!(inst.op, InstOperation::Mcrf);
    assert_eq!(inst.reads[0], DataSource::CrField(CrField(5)));
    assert_eq!(inst.write, Some(DataSource::CrField(CrField(2))));
}

#[test]
fn test_decode_fadd() {
    // fadd f1, f2, f3
    let inst = decode(0, (63 << 26) | (1 << 21) | (2 << 16) | (3 << 11) | (21 << 1));
    assert_eq!(inst.op, InstOperation::Fadd);
    assert!(matches!(
        inst.reads[0],
        DataSource::Fpr(s) if s.reg == Fpr(2) && s.width == DataType::Double
    ));
    assert!(matches!(inst.write, Some(DataSource::Fpr(s)) if s.reg == Fpr(1)));
    // Arithmetic FP ops carry their FPSCR family mask
    assert!(!inst.fpscr_effects.is_empty());
}

#[test]
fn test_decode_fmul_reads_frc() {
    // fmul f0, f1, f2: the second factor is in FRC, not FRB
    let inst = decode(0, (63 << 26) | (1 << 16) | (2 << 6) | (25 << 1));
    assert_eq!(inst.op, InstOperation::Fmul);
    assert!(matches!(inst.reads[0], DataSource::Fpr(s) if s.reg == Fpr(1)));
    assert!(matches!(inst.reads[1], DataSource::Fpr(s) if s.reg == Fpr(2)));
}

#[test]
fn test_decode_psq_l() {
    // psq_l f1, 8(r3), 0, qr0
    let inst = decode(0, (56 << 26) | (1 << 21) | (3 << 16) | 8);
    assert_eq!(inst.op, InstOperation::PsqL);
    assert!(matches!(
        inst.reads[0],
        DataSource::MemRegOff(m)
            if m.base == Gpr(3) && m.offset == 8 && m.width == DataType::PackedSingle
    ));
    assert_eq!(inst.reads[1], DataSource::AuxImm(0));
    assert!(matches!(
        inst.write,
        Some(DataSource::Fpr(s)) if s.reg == Fpr(1) && s.width == DataType::PackedSingle
    ));
}

#[test]
fn test_decode_ps_add() {
    // ps_add f1, f2, f3: 5-bit function code 21 under opcode 4
    let inst = decode(0, (4 << 26) | (1 << 21) | (2 << 16) | (3 << 11) | (21 << 1));
    assert_eq!(inst.op, InstOperation::PsAdd);
    assert_eq!(inst.reads.len(), 2);
    assert!(matches!(
        inst.write,
        Some(DataSource::Fpr(s)) if s.width == DataType::PackedSingle
    ));
    // The FPSCR mask must not clobber the destination operand
    assert!(!inst.fpscr_effects.is_empty());
}

#[test]
fn test_decode_subtract_operand_order() {
    // subf rD, rA, rB computes rB - rA; rA must stay first in the reads
    let inst = decode(0, (31 << 26) | (3 << 21) | (4 << 16) | (5 << 11) | (40 << 1));
    assert_eq!(inst.op, InstOperation::Subf);
    assert!(matches!(inst.reads[0], DataSource::Gpr(s) if s.reg == Gpr(4)));
    assert!(matches!(inst.reads[1], DataSource::Gpr(s) if s.reg == Gpr(5)));
}

#[test]
fn test_decode_mtctr_mflr() {
    let inst = decode(0, utils::mtctr(0));
    assert_eq!(inst.op, InstOperation::Mtspr);

    let inst = decode(0, utils::mflr(0));
    assert_eq!(inst.op, InstOperation::Mfspr);
    assert!(matches!(inst.write, Some(DataSource::Gpr(s)) if s.reg == Gpr::R0));
}
