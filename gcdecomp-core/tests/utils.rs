//! Shared test helpers: a tiny instruction assembler and image builders.
#![allow(dead_code)]

use gcdecomp_core::decompiler::context::BinaryContext;
use gcdecomp_core::decompiler::memory::SectionedData;

/// Big-endian byte image from 32-bit instruction words.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

pub fn image(base: u32, words: &[u32]) -> SectionedData {
    let mut data = SectionedData::new();
    data.add_section(base, words_to_bytes(words));
    data
}

pub fn context(base: u32, words: &[u32]) -> BinaryContext {
    BinaryContext::from_raw(base, base, &words_to_bytes(words))
}

// Instruction encoders, enough for the scenarios under test.

pub fn addi(rd: u32, ra: u32, simm: i16) -> u32 {
    (14 << 26) | (rd << 21) | (ra << 16) | (simm as u16 as u32)
}

pub fn addis(rd: u32, ra: u32, simm: i16) -> u32 {
    (15 << 26) | (rd << 21) | (ra << 16) | (simm as u16 as u32)
}

/// li rd, value
pub fn li(rd: u32, value: i16) -> u32 {
    addi(rd, 0, value)
}

pub fn add(rd: u32, ra: u32, rb: u32) -> u32 {
    (31 << 26) | (rd << 21) | (ra << 16) | (rb << 11) | (266 << 1)
}

pub fn cmpwi(crf: u32, ra: u32, simm: i16) -> u32 {
    (11 << 26) | (crf << 23) | (ra << 16) | (simm as u16 as u32)
}

pub fn lwz(rd: u32, offset: i16, ra: u32) -> u32 {
    (32 << 26) | (rd << 21) | (ra << 16) | (offset as u16 as u32)
}

pub fn lwzu(rd: u32, offset: i16, ra: u32) -> u32 {
    (33 << 26) | (rd << 21) | (ra << 16) | (offset as u16 as u32)
}

pub fn stw(rs: u32, offset: i16, ra: u32) -> u32 {
    (36 << 26) | (rs << 21) | (ra << 16) | (offset as u16 as u32)
}

pub fn stwu(rs: u32, offset: i16, ra: u32) -> u32 {
    (37 << 26) | (rs << 21) | (ra << 16) | (offset as u16 as u32)
}

pub fn rlwinm(ra: u32, rs: u32, sh: u32, mb: u32, me: u32) -> u32 {
    (21 << 26) | (rs << 21) | (ra << 16) | (sh << 11) | (mb << 6) | (me << 1)
}

/// b with a byte displacement.
pub fn b(disp: i32) -> u32 {
    (18 << 26) | (disp as u32 & 0x03ff_fffc)
}

/// bl with a byte displacement.
pub fn bl(disp: i32) -> u32 {
    b(disp) | 1
}

/// bc with explicit BO/BI fields and a byte displacement.
pub fn bc(bo: u32, bi: u32, disp: i32) -> u32 {
    (16 << 26) | (bo << 21) | (bi << 16) | (disp as u32 & 0xfffc)
}

/// beq against cr0.
pub fn beq(disp: i32) -> u32 {
    bc(12, 2, disp)
}

/// bge against cr0 (branch if not lt).
pub fn bge(disp: i32) -> u32 {
    bc(4, 0, disp)
}

/// bdnz: decrement CTR, branch while non-zero.
pub fn bdnz(disp: i32) -> u32 {
    bc(16, 0, disp)
}

pub fn blr() -> u32 {
    0x4e80_0020
}

pub fn mflr(rd: u32) -> u32 {
    0x7c08_02a6 | (rd << 21)
}

pub fn mtlr(rs: u32) -> u32 {
    0x7c08_03a6 | (rs << 21)
}

pub fn mtctr(rs: u32) -> u32 {
    0x7c09_03a6 | (rs << 21)
}
