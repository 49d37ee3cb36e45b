//! Register Files and Operand Descriptors
//!
//! This module models the four register universes of the Gekko/Broadway core
//! (GPRs, FPRs, condition fields/bits, special registers) together with the
//! `DataSource` descriptors the decoder attaches to every instruction read
//! and write. A `RegSet` is a fixed-width bitmask over one register file with
//! O(1) union/intersection/difference/membership.
//!
//! Register indices are stored as `u8` newtypes (PowerPC has 32 GPRs/FPRs,
//! so an index fits in 5 bits).

use std::marker::PhantomData;

/// A register identified by a small integer index within one register file.
pub trait Register: Copy + Eq {
    /// Index of this register within its file (0-31).
    fn index(self) -> u8;
    /// Register with the given index. Caller guarantees `idx` is in range.
    fn from_index(idx: u8) -> Self;
}

/// General-purpose integer register r0-r31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Gpr(pub u8);

impl Gpr {
    pub const R0: Gpr = Gpr(0);
    /// Stack pointer.
    pub const R1: Gpr = Gpr(1);
    /// Read-only table of contents base.
    pub const R2: Gpr = Gpr(2);
    pub const R3: Gpr = Gpr(3);
    pub const R4: Gpr = Gpr(4);
    pub const R10: Gpr = Gpr(10);
    /// Frame point used by the savegpr/restgpr ABI helpers.
    pub const R11: Gpr = Gpr(11);
    pub const R12: Gpr = Gpr(12);
    /// Small-data base.
    pub const R13: Gpr = Gpr(13);
    pub const R14: Gpr = Gpr(14);
    pub const R31: Gpr = Gpr(31);
}

impl Register for Gpr {
    fn index(self) -> u8 {
        self.0
    }
    fn from_index(idx: u8) -> Self {
        Gpr(idx)
    }
}

/// Floating-point register f0-f31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fpr(pub u8);

impl Fpr {
    pub const F0: Fpr = Fpr(0);
    pub const F1: Fpr = Fpr(1);
    pub const F13: Fpr = Fpr(13);
    pub const F14: Fpr = Fpr(14);
    pub const F31: Fpr = Fpr(31);
}

impl Register for Fpr {
    fn index(self) -> u8 {
        self.0
    }
    fn from_index(idx: u8) -> Self {
        Fpr(idx)
    }
}

/// One of the eight 4-bit condition register fields cr0-cr7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CrField(pub u8);

impl CrField {
    pub const CR0: CrField = CrField(0);
    /// CR1 receives the FP exception summary for record-form FP ops.
    pub const CR1: CrField = CrField(1);
}

impl Register for CrField {
    fn index(self) -> u8 {
        self.0
    }
    fn from_index(idx: u8) -> Self {
        CrField(idx)
    }
}

/// One of the 32 individual condition register bits.
///
/// Bit `4*k + 0..=3` of field `k` holds `lt`, `gt`, `eq`, `so` respectively.
/// CR1's bits are overloaded with the FP exception summaries (fx, fex, vx,
/// ox); those are aliases of CR1's four bits, not distinct state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CrBit(pub u8);

impl CrBit {
    pub fn field(self) -> CrField {
        CrField(self.0 / 4)
    }

    /// Position of this bit within its field (0 = lt, 1 = gt, 2 = eq, 3 = so).
    pub fn bit_in_field(self) -> u8 {
        self.0 % 4
    }

    pub fn lt(field: CrField) -> CrBit {
        CrBit(field.0 * 4)
    }
    pub fn gt(field: CrField) -> CrBit {
        CrBit(field.0 * 4 + 1)
    }
    pub fn eq(field: CrField) -> CrBit {
        CrBit(field.0 * 4 + 2)
    }
    pub fn so(field: CrField) -> CrBit {
        CrBit(field.0 * 4 + 3)
    }
}

impl Register for CrBit {
    fn index(self) -> u8 {
        self.0
    }
    fn from_index(idx: u8) -> Self {
        CrBit(idx)
    }
}

/// Special-purpose registers the core models explicitly.
///
/// Anything outside the LR/CTR/XER triple is carried with its raw 10-bit
/// encoding so the IR can still name it in an intrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Spr {
    Xer,
    Lr,
    Ctr,
    Other(u16),
}

impl Spr {
    pub fn from_encoded(num: u16) -> Spr {
        match num {
            1 => Spr::Xer,
            8 => Spr::Lr,
            9 => Spr::Ctr,
            other => Spr::Other(other),
        }
    }
}

/// Time base registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tbr {
    Tbl,
    Tbu,
    Other(u16),
}

impl Tbr {
    pub fn from_encoded(num: u16) -> Tbr {
        match num {
            268 => Tbr::Tbl,
            269 => Tbr::Tbu,
            other => Tbr::Other(other),
        }
    }
}

/// Individually tracked bits of the fixed-point exception register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XerBit {
    /// Carry.
    Ca,
    /// Overflow.
    Ov,
    /// Overflow summary.
    So,
    /// Byte count field (bits 25-31), read by string ops.
    ByteCount,
}

/// Fixed-width register set over one register file.
///
/// Union/intersection/difference/membership are single bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegSet<R: Register> {
    bits: u32,
    _file: PhantomData<R>,
}

impl<R: Register> Default for RegSet<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R: Register> RegSet<R> {
    pub const fn empty() -> Self {
        RegSet {
            bits: 0,
            _file: PhantomData,
        }
    }

    pub const fn from_bits(bits: u32) -> Self {
        RegSet {
            bits,
            _file: PhantomData,
        }
    }

    pub const fn bits(self) -> u32 {
        self.bits
    }

    pub fn single(reg: R) -> Self {
        Self::from_bits(1 << reg.index())
    }

    pub fn of(regs: &[R]) -> Self {
        let mut set = Self::empty();
        for &r in regs {
            set.insert(r);
        }
        set
    }

    /// All registers with index >= `start.index()`.
    pub fn range_from(start: R) -> Self {
        Self::from_bits(!((1u32 << start.index()) - 1))
    }

    pub fn contains(self, reg: R) -> bool {
        self.bits & (1 << reg.index()) != 0
    }

    pub fn insert(&mut self, reg: R) {
        self.bits |= 1 << reg.index();
    }

    pub fn remove(&mut self, reg: R) {
        self.bits &= !(1 << reg.index());
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn len(self) -> u32 {
        self.bits.count_ones()
    }

    /// Iterate over member registers in ascending index order.
    pub fn iter(self) -> RegSetIter<R> {
        RegSetIter {
            bits: self.bits,
            _file: PhantomData,
        }
    }
}

pub struct RegSetIter<R: Register> {
    bits: u32,
    _file: PhantomData<R>,
}

impl<R: Register> Iterator for RegSetIter<R> {
    type Item = R;

    fn next(&mut self) -> Option<R> {
        if self.bits == 0 {
            return None;
        }
        let idx = self.bits.trailing_zeros() as u8;
        self.bits &= self.bits - 1;
        Some(R::from_index(idx))
    }
}

impl<R: Register> std::ops::BitOr for RegSet<R> {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self::from_bits(self.bits | rhs.bits)
    }
}

impl<R: Register> std::ops::BitOrAssign for RegSet<R> {
    fn bitor_assign(&mut self, rhs: Self) {
        self.bits |= rhs.bits;
    }
}

impl<R: Register> std::ops::BitAnd for RegSet<R> {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self::from_bits(self.bits & rhs.bits)
    }
}

impl<R: Register> std::ops::BitAndAssign for RegSet<R> {
    fn bitand_assign(&mut self, rhs: Self) {
        self.bits &= rhs.bits;
    }
}

impl<R: Register> std::ops::BitXor for RegSet<R> {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self::from_bits(self.bits ^ rhs.bits)
    }
}

impl<R: Register> std::ops::Sub for RegSet<R> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::from_bits(self.bits & !rhs.bits)
    }
}

impl<R: Register> std::ops::SubAssign for RegSet<R> {
    fn sub_assign(&mut self, rhs: Self) {
        self.bits &= !rhs.bits;
    }
}

pub type GprSet = RegSet<Gpr>;
pub type FprSet = RegSet<Fpr>;
pub type CrFieldSet = RegSet<CrField>;

/// Registers the CodeWarrior EABI lets a callee clobber: r0 plus r3-r12.
pub const CALLER_SAVED_GPRS: GprSet = GprSet::from_bits(0b0001_1111_1111_1001);
/// Registers a callee must preserve: r14-r31.
pub const CALLEE_SAVED_GPRS: GprSet = GprSet::from_bits(0xffff_c000);
/// Integer argument registers r3-r10, in order.
pub const GPR_PARAMETERS: GprSet = GprSet::from_bits(0b0111_1111_1000);
/// Integer return register r3.
pub const GPR_RETURN: GprSet = GprSet::from_bits(1 << 3);

/// Volatile FPRs: f0-f13.
pub const CALLER_SAVED_FPRS: FprSet = FprSet::from_bits(0b0011_1111_1111_1111);
/// Preserved FPRs: f14-f31.
pub const CALLEE_SAVED_FPRS: FprSet = FprSet::from_bits(0xffff_c000);
/// Floating argument registers f1-f13, in order.
pub const FPR_PARAMETERS: FprSet = FprSet::from_bits(0b0011_1111_1111_1110);
/// Floating return register f1.
pub const FPR_RETURN: FprSet = FprSet::from_bits(1 << 1);

/// Condition fields a call may clobber: cr0, cr1, cr5-cr7.
pub const VOLATILE_CR_FIELDS: CrFieldSet = CrFieldSet::from_bits(0b1110_0011);

/// Access width of a register slice or memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    S1,
    S2,
    S4,
    Single,
    Double,
    /// Two packed 32-bit singles (Gekko paired-single extension).
    PackedSingle,
    /// FPR operand whose width depends on runtime state.
    SingleOrDouble,
    Unknown,
}

/// GPR operand together with the width actually accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GprSlice {
    pub reg: Gpr,
    pub width: DataType,
}

/// FPR operand together with the width actually accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FprSlice {
    pub reg: Fpr,
    pub width: DataType,
}

/// Memory operand addressed as base register + signed 16-bit displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRegOff {
    pub base: Gpr,
    pub offset: i16,
    pub width: DataType,
}

/// Memory operand addressed as base register + index register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRegReg {
    pub base: Gpr,
    pub index: Gpr,
    pub width: DataType,
}

/// Contiguous register range from `low` to r31 (lmw/stmw).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiReg {
    pub low: Gpr,
    pub width: DataType,
}

macro_rules! bitmask_newtype {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub $repr);

        impl $name {
            pub const NONE: $name = $name(0);

            /// True when any bit of `mask` is set in `self`.
            pub fn intersects(self, mask: $name) -> bool {
                self.0 & mask.0 != 0
            }

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl std::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                $name(self.0 & rhs.0)
            }
        }
    };
}

pub(crate) use bitmask_newtype;

bitmask_newtype! {
    /// FPSCR bit mask. Each floating op family writes a fixed subset.
    FpscrBits(u32)
}

impl FpscrBits {
    pub const ALL: FpscrBits = FpscrBits(0xffff_ffff);
    pub const EXCEPTION_MASK: FpscrBits = FpscrBits(0b0000_0000_1110_0000_0001_1111_1111_1001);
    pub const WRITE_MASK: FpscrBits = FpscrBits(0b1111_1111_1111_1111_1111_1111_1111_1001);

    pub const FX: FpscrBits = FpscrBits(1 << 0);
    pub const FEX: FpscrBits = FpscrBits(1 << 1);
    pub const VX: FpscrBits = FpscrBits(1 << 2);
    pub const OX: FpscrBits = FpscrBits(1 << 3);
    pub const UX: FpscrBits = FpscrBits(1 << 4);
    pub const ZX: FpscrBits = FpscrBits(1 << 5);
    pub const XX: FpscrBits = FpscrBits(1 << 6);
    pub const VXSNAN: FpscrBits = FpscrBits(1 << 7);
    pub const VXISI: FpscrBits = FpscrBits(1 << 8);
    pub const VXIDI: FpscrBits = FpscrBits(1 << 9);
    pub const VXZDZ: FpscrBits = FpscrBits(1 << 10);
    pub const VXIMZ: FpscrBits = FpscrBits(1 << 11);
    pub const VXVC: FpscrBits = FpscrBits(1 << 12);
    pub const FR: FpscrBits = FpscrBits(1 << 13);
    pub const FI: FpscrBits = FpscrBits(1 << 14);
    pub const FPRF: FpscrBits = FpscrBits(0b11111 << 15);
    pub const FPC: FpscrBits = FpscrBits(1 << 15);
    pub const FPCC: FpscrBits = FpscrBits(0b1111 << 16);
    pub const VXSOFT: FpscrBits = FpscrBits(1 << 21);
    pub const VXSQRT: FpscrBits = FpscrBits(1 << 22);
    pub const VXCVI: FpscrBits = FpscrBits(1 << 23);
    pub const VE: FpscrBits = FpscrBits(1 << 24);
    pub const OE: FpscrBits = FpscrBits(1 << 25);
    pub const UE: FpscrBits = FpscrBits(1 << 26);
    pub const ZE: FpscrBits = FpscrBits(1 << 27);
    pub const XE: FpscrBits = FpscrBits(1 << 28);
    pub const NI: FpscrBits = FpscrBits(1 << 29);
    pub const RN: FpscrBits = FpscrBits(0b11 << 30);
}

bitmask_newtype! {
    /// Encoding flags that change how an instruction is interpreted.
    InstFlags(u32)
}

impl InstFlags {
    /// AA bit: branch displacement is an absolute address.
    pub const ABSOLUTE_ADDR: InstFlags = InstFlags(0b001);
    /// W bit: paired-single load fills the second lane with 1.0.
    pub const PS_LOADS_ONE: InstFlags = InstFlags(0b010);
    /// L bit on compares (64-bit mode; always 0 on Gekko).
    pub const LONG_MODE: InstFlags = InstFlags(0b100);
}

bitmask_newtype! {
    /// Architectural side effects beyond the primary write.
    InstSideFx(u32)
}

impl InstSideFx {
    /// Effectively executes `cmpwi cr0, rD, 0` (record forms, the `.` suffix).
    pub const WRITES_RECORD: InstSideFx = InstSideFx(0b000001);
    /// Copies the FP exception summary into CR1 (record-form FP ops).
    pub const WRITES_FP_RECORD: InstSideFx = InstSideFx(0b000010);
    /// Saves overflow state to XER[OV]/XER[SO] (the `o` suffix).
    pub const WRITES_OV_SO: InstSideFx = InstSideFx(0b000100);
    /// Updating load/store: writes the effective address back to the base.
    pub const WRITES_BASE_REG: InstSideFx = InstSideFx(0b001000);
    /// Writes the next PC to LR (branches with the LK bit).
    pub const WRITES_LR: InstSideFx = InstSideFx(0b010000);
    /// Saves carry state to XER[CA].
    pub const WRITES_CA: InstSideFx = InstSideFx(0b100000);
}

/// Tagged descriptor for anything an instruction can read or write.
///
/// The decoder pushes these in semantic order, which matters for
/// non-commutative operations (subtract, divide, compares, shifts).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataSource {
    Gpr(GprSlice),
    Fpr(FprSlice),
    CrField(CrField),
    CrBit(CrBit),
    MemRegOff(MemRegOff),
    MemRegReg(MemRegReg),
    MultiReg(MultiReg),
    Spr(Spr),
    Tbr(Tbr),
    FpscrBits(FpscrBits),
    Simm(i16),
    Uimm(u16),
    /// Branch displacement in bytes, sign-extended and shifted.
    RelBranch(i32),
    /// Raw auxiliary immediate (BO field, shift amounts, mask bounds, ...).
    AuxImm(u32),
    XerBit(XerBit),
}

impl DataSource {
    pub fn is_memory_ref(&self) -> bool {
        matches!(self, DataSource::MemRegOff(_) | DataSource::MemRegReg(_))
    }

    /// Base GPR of a memory operand, if this is one.
    pub fn memory_base(&self) -> Option<Gpr> {
        match self {
            DataSource::MemRegOff(mem) => Some(mem.base),
            DataSource::MemRegReg(mem) => Some(mem.base),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regset_ops() {
        let mut set = GprSet::empty();
        set.insert(Gpr::R3);
        set.insert(Gpr::R4);
        assert!(set.contains(Gpr::R3));
        assert!(!set.contains(Gpr::R0));
        assert_eq!(set.len(), 2);

        let other = GprSet::single(Gpr::R3);
        assert_eq!((set - other).iter().collect::<Vec<_>>(), vec![Gpr::R4]);
        assert_eq!(set & other, other);
        assert!((set ^ set).is_empty());
    }

    #[test]
    fn test_regset_range() {
        let set = GprSet::range_from(Gpr(30));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Gpr(30), Gpr(31)]);
        assert_eq!(CALLEE_SAVED_GPRS, GprSet::range_from(Gpr::R14));
    }

    #[test]
    fn test_abi_sets() {
        assert!(CALLER_SAVED_GPRS.contains(Gpr::R0));
        assert!(CALLER_SAVED_GPRS.contains(Gpr::R12));
        assert!(!CALLER_SAVED_GPRS.contains(Gpr::R1));
        assert!(!CALLER_SAVED_GPRS.contains(Gpr::R2));
        assert_eq!(GPR_PARAMETERS.iter().next(), Some(Gpr::R3));
        assert_eq!(GPR_PARAMETERS.len(), 8);
        assert_eq!(FPR_PARAMETERS.len(), 13);
    }

    #[test]
    fn test_cr_bits() {
        assert_eq!(CrBit::eq(CrField::CR0), CrBit(2));
        assert_eq!(CrBit(6).field(), CrField(1));
        assert_eq!(CrBit(7).bit_in_field(), 3);
    }
}
