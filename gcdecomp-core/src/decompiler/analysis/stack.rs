//! Stack-Frame Recovery
//!
//! Classifies every reference to the stack pointer (r1) across a subroutine:
//! reads and writes through it, address-of computations, and modifications
//! of r1 itself. The unique frame-allocating `stwu r1, -N(r1)` observed at
//! entry fixes the stack size; slots above `stack_size + 4` belong to the
//! caller's frame and are classified as incoming parameters.
//!
//! Width conflicts on a slot are not errors; a slot accumulates the union of
//! every width it was accessed with.

use smallvec::SmallVec;

use crate::decompiler::analysis::control_flow::SubroutineGraph;
use crate::decompiler::datasource::{bitmask_newtype, DataSource, DataType, Gpr, InstSideFx};
use crate::decompiler::decoder::{InstOperation, MetaInst};

bitmask_newtype! {
    /// Set of widths a stack slot has been accessed with.
    TypeSet(u8)
}

impl TypeSet {
    pub const BYTE: TypeSet = TypeSet(1 << 0);
    pub const HALF_WORD: TypeSet = TypeSet(1 << 1);
    pub const WORD: TypeSet = TypeSet(1 << 2);
    pub const SINGLE: TypeSet = TypeSet(1 << 3);
    pub const DOUBLE: TypeSet = TypeSet(1 << 4);
}

fn convert_data_type(width: DataType) -> TypeSet {
    match width {
        DataType::S1 => TypeSet::BYTE,
        DataType::S2 => TypeSet::HALF_WORD,
        DataType::S4 => TypeSet::WORD,
        DataType::Single => TypeSet::SINGLE,
        DataType::Double => TypeSet::DOUBLE,
        _ => TypeSet::NONE,
    }
}

/// How one instruction touched a stack slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Read,
    Write,
    Address,
}

#[derive(Debug, Clone, Copy)]
pub struct StackReference {
    pub va: u32,
    pub kind: ReferenceKind,
}

/// One recovered stack slot with every reference to it.
#[derive(Debug, Clone)]
pub struct StackVariable {
    pub offset: i16,
    pub types: TypeSet,
    pub refs: Vec<StackReference>,
    pub is_param: bool,
    /// Slot holds saved callee state (LR, callee-saved registers) rather
    /// than a program variable.
    pub is_frame_storage: bool,
}

/// Recovered stack layout of one subroutine.
#[derive(Debug, Default)]
pub struct SubroutineStack {
    locals: Vec<StackVariable>,
    params: Vec<StackVariable>,
    stack_size: u16,
}

impl SubroutineStack {
    pub fn stack_size(&self) -> u16 {
        self.stack_size
    }

    pub fn locals(&self) -> &[StackVariable] {
        &self.locals
    }

    pub fn params(&self) -> &[StackVariable] {
        &self.params
    }

    fn in_param_region(&self, offset: i16) -> bool {
        offset > self.stack_size as i16 + 4
    }

    pub fn variable_for_offset(&self, offset: i16) -> Option<&StackVariable> {
        let region = if self.in_param_region(offset) {
            &self.params
        } else {
            &self.locals
        };
        region.iter().find(|var| var.offset == offset)
    }

    pub fn variable_for_offset_mut(&mut self, offset: i16) -> Option<&mut StackVariable> {
        let region = if self.in_param_region(offset) {
            &mut self.params
        } else {
            &mut self.locals
        };
        region.iter_mut().find(|var| var.offset == offset)
    }

    fn record_reference(&mut self, va: u32, offset: i16, types: TypeSet, kind: ReferenceKind) {
        let is_param = self.in_param_region(offset);
        let region = if is_param {
            &mut self.params
        } else {
            &mut self.locals
        };
        match region.iter_mut().find(|var| var.offset == offset) {
            Some(var) => {
                var.refs.push(StackReference { va, kind });
                var.types |= types;
            }
            None => region.push(StackVariable {
                offset,
                types,
                refs: vec![StackReference { va, kind }],
                is_param,
                is_frame_storage: false,
            }),
        }
    }

    /// Record a load/store through r1. A packed-single access lands as two
    /// 4-byte slots.
    fn analyze_readwrite(&mut self, inst: &MetaInst, offset: i16, width: DataType, kind: ReferenceKind) {
        let mut slots: SmallVec<[(i16, DataType); 2]> = SmallVec::new();
        let offset = offset.unsigned_abs() as i16;
        if width == DataType::PackedSingle {
            slots.push((offset, DataType::Single));
            slots.push((offset + 4, DataType::Single));
        } else {
            slots.push((offset, width));
        }

        for (slot, slot_width) in slots {
            self.record_reference(inst.va, slot, convert_data_type(slot_width), kind);
        }
    }

    /// `addi rX, r1, imm` takes a slot's address.
    fn analyze_address_of(&mut self, inst: &MetaInst) {
        if !matches!(inst.op, InstOperation::Addi | InstOperation::Addic) {
            return;
        }
        if let Some(offset) = inst.read_simm() {
            self.record_reference(inst.va, offset, TypeSet::NONE, ReferenceKind::Address);
        }
    }

    /// Writes to r1 itself: frame allocation and restoration.
    fn analyze_sp_modify(&mut self, inst: &MetaInst) {
        if inst.op == InstOperation::Stwu && inst.read_gpr() == Some(Gpr::R1) {
            if let Some(mem) = inst.write_mem_off() {
                self.stack_size = mem.offset.unsigned_abs();
            }
        }
        // addi r1, r1, N restores the frame; the perilogue classifier tags it
    }

    fn analyze_block(&mut self, graph: &SubroutineGraph, id: u32) {
        enum SpReference {
            Read(i16, DataType),
            Write(i16, DataType),
            AddressOf,
            SpModify,
        }

        for inst in &graph.block(id).instructions {
            // An instruction can reference r1 at most three ways at once
            let mut sp_refs: SmallVec<[SpReference; 3]> = SmallVec::new();

            for read in &inst.reads {
                match read {
                    DataSource::MemRegOff(mem) if mem.base == Gpr::R1 => {
                        sp_refs.push(SpReference::Read(mem.offset, mem.width));
                    }
                    DataSource::Gpr(slice) if slice.reg == Gpr::R1 => {
                        sp_refs.push(SpReference::AddressOf);
                    }
                    _ => {}
                }
            }
            match &inst.write {
                Some(DataSource::MemRegOff(mem)) if mem.base == Gpr::R1 => {
                    // An updating store through r1 also moves the stack
                    // pointer; settle the frame size before filing the slot
                    if inst.side_effects.intersects(InstSideFx::WRITES_BASE_REG) {
                        sp_refs.push(SpReference::SpModify);
                    }
                    sp_refs.push(SpReference::Write(mem.offset, mem.width));
                }
                Some(DataSource::Gpr(slice)) if slice.reg == Gpr::R1 => {
                    sp_refs.push(SpReference::SpModify);
                }
                _ => {}
            }

            for sp_ref in sp_refs {
                match sp_ref {
                    SpReference::Read(off, width) => {
                        self.analyze_readwrite(inst, off, width, ReferenceKind::Read)
                    }
                    SpReference::Write(off, width) => {
                        self.analyze_readwrite(inst, off, width, ReferenceKind::Write)
                    }
                    SpReference::AddressOf => self.analyze_address_of(inst),
                    SpReference::SpModify => self.analyze_sp_modify(inst),
                }
            }
        }
    }
}

/// Recover the stack layout of the subroutine.
pub fn run_stack_analysis(graph: &SubroutineGraph) -> SubroutineStack {
    let mut stack = SubroutineStack::default();
    for id in graph.forward_order() {
        stack.analyze_block(graph, id);
    }
    stack
}
