//! Gekko -> IR Lowering
//!
//! Translates an analyzed [`Subroutine`] into an [`IrRoutine`] whose graph
//! has the same shape as the PPC graph and whose instructions reference
//! routine-scoped temporaries, stack slots, parameters, immediates, and
//! function refs - never physical registers.
//!
//! Bind tracking runs first (phase A per block from the liveness deltas,
//! then the cross-block union), so that lowering can resolve any register
//! at any address to its routine temp with a single range query.
//!
//! Perilogue-tagged instructions lower to nothing: frame setup and callee
//! saves are already carried by the stack and bind models. Paired-single
//! and other untranslatable operations become opaque `Intrinsic`s.

use crate::decompiler::analysis::control_flow::{BasicBlock, OutgoingEdgeKind};
use crate::decompiler::analysis::data_flow::{
    analyze_lifetimes, CrModel, FprModel, RegisterLifetimes,
};
use crate::decompiler::analysis::perilogue::PerilogueTag;
use crate::decompiler::analysis::Subroutine;
use crate::decompiler::context::BinaryContext;
use crate::decompiler::datasource::{
    CrField, DataSource, DataType, Fpr, FprSet, Gpr, GprSet, InstSideFx, RegSet, Register,
    FPR_PARAMETERS, FPR_RETURN, GPR_PARAMETERS, GPR_RETURN,
};
use crate::decompiler::decoder::{BoKind, InstOperation, MetaInst, SimplifiedRlwinm, SimplifiedRlwnm};
use crate::decompiler::flow_graph::{BlockTransfer, FlowGraph, VertexId};
use crate::decompiler::ir::binding::BindTracker;
use crate::decompiler::ir::instruction::{
    ConditionRef, CounterCheck, FunctionRef, Immediate, IrBlock, IrInst, IrOpcode, IrRoutine,
    IrType, MemRef, OpVar, ParamRef, StackRef, TempVar, INVALID_TEMP,
};

/// Registers that are never bound to temps: the stack pointer, the
/// read-only TOC, and the small-data base are named directly.
const ABI_FIXED_GPRS: GprSet = GprSet::from_bits(
    (1 << 1) | (1 << 2) | (1 << 13),
);

/// Phase A over one block: derive bind regions from the per-instruction
/// live-in/live-out deltas and publish boundary-crossing binds.
#[allow(clippy::too_many_arguments)]
fn compute_binds_local<R: Register>(
    tracker: &mut BindTracker<R>,
    block: &BasicBlock,
    lt: &RegisterLifetimes<R>,
    skip: RegSet<R>,
    params: RegSet<R>,
    rets: RegSet<R>,
    is_entry: bool,
    is_exit: bool,
) {
    let mut connect_in = lt.input;
    let mut rgn_begin = [block.start_va; 32];

    for i in 0..lt.live_in.len() {
        let cur_addr = block.start_va + 4 * i as u32;
        let delta = lt.live_in[i] ^ lt.live_out[i];
        for reg in delta.iter() {
            if skip.contains(reg) {
                continue;
            }
            if lt.live_in[i].contains(reg) {
                // Live range ends at this instruction
                let is_param = is_entry && params.contains(reg) && connect_in.contains(reg);
                let bind = tracker.add_block_bind(
                    reg,
                    is_param,
                    false,
                    rgn_begin[reg.index() as usize],
                    cur_addr + 4,
                );
                if connect_in.contains(reg) {
                    tracker.publish_in(block, bind);
                    connect_in.remove(reg);
                }
            } else {
                // Newly defined here
                rgn_begin[reg.index() as usize] = cur_addr;
            }
        }
    }

    for reg in lt.output.iter() {
        if skip.contains(reg) {
            continue;
        }
        let is_param = is_entry && params.contains(reg) && connect_in.contains(reg);
        let is_ret = is_exit && rets.contains(reg) && lt.output.contains(reg);
        let bind = tracker.add_block_bind(
            reg,
            is_param,
            is_ret,
            rgn_begin[reg.index() as usize],
            block.end_va,
        );
        tracker.publish_out(block, bind);
        if connect_in.contains(reg) {
            tracker.publish_in(block, bind);
        }
    }
}

struct GekkoTranslator<'a> {
    routine: &'a Subroutine,
    ctx: &'a BinaryContext,
    ir: IrRoutine,
}

impl<'a> GekkoTranslator<'a> {
    fn new(routine: &'a Subroutine, ctx: &'a BinaryContext) -> Self {
        let nblocks = routine.graph.len();

        // Mirror the PPC graph shape onto the IR graph
        let mut graph: FlowGraph<IrBlock> = FlowGraph::new();
        let mut block_vertex = vec![0usize; nblocks];
        for block in routine.graph.blocks() {
            block_vertex[block.id as usize] = graph.add_vertex(IrBlock::default());
        }
        graph.link(
            graph.root(),
            block_vertex[routine.graph.root as usize],
            BlockTransfer::Unconditional,
        );
        for block in routine.graph.blocks() {
            for (kind, target) in &block.outgoing {
                let transfer = match kind {
                    OutgoingEdgeKind::Unconditional => BlockTransfer::Unconditional,
                    OutgoingEdgeKind::ConditionTrue => BlockTransfer::ConditionTrue,
                    OutgoingEdgeKind::ConditionFalse => BlockTransfer::ConditionFalse,
                    OutgoingEdgeKind::Fallthrough => BlockTransfer::Fallthrough,
                };
                graph.link(
                    block_vertex[block.id as usize],
                    block_vertex[*target as usize],
                    transfer,
                );
            }
            if block.outgoing.is_empty() {
                graph.link(
                    block_vertex[block.id as usize],
                    graph.terminal(),
                    BlockTransfer::Unconditional,
                );
            }
        }

        GekkoTranslator {
            routine,
            ctx,
            ir: IrRoutine {
                graph,
                gpr_binds: BindTracker::new(nblocks, IrType::S4),
                fpr_binds: BindTracker::new(nblocks, IrType::Double),
                cr_binds: BindTracker::new(nblocks, IrType::Bool),
                int_params: [INVALID_TEMP; 8],
                flt_params: [INVALID_TEMP; 13],
                stack_params: Vec::new(),
                num_int_params: 0,
                num_flt_params: 0,
                block_vertex,
            },
        }
    }

    fn compute_binds(&mut self) {
        let routine = self.routine;
        let graph = &routine.graph;

        let fpr_lt = analyze_lifetimes::<FprModel>(graph, self.ctx);
        let cr_lt = analyze_lifetimes::<CrModel>(graph, self.ctx);

        for id in graph.forward_order() {
            let block = graph.block(id);
            let is_entry = id == graph.root;
            let is_exit = block.outgoing.is_empty();

            compute_binds_local(
                &mut self.ir.gpr_binds,
                block,
                block.lifetimes(),
                ABI_FIXED_GPRS,
                GPR_PARAMETERS,
                GPR_RETURN,
                is_entry,
                is_exit,
            );
            compute_binds_local(
                &mut self.ir.fpr_binds,
                block,
                &fpr_lt[id as usize],
                FprSet::empty(),
                FPR_PARAMETERS,
                FPR_RETURN,
                is_entry,
                is_exit,
            );
            compute_binds_local(
                &mut self.ir.cr_binds,
                block,
                &cr_lt[id as usize],
                RegSet::empty(),
                RegSet::empty(),
                RegSet::empty(),
                is_entry,
                is_exit,
            );
        }

        self.ir.gpr_binds.collect();
        self.ir.fpr_binds.collect();
        self.ir.cr_binds.collect();
    }

    /// Fill the ordered parameter tables from the collected binds.
    fn collect_params(&mut self) {
        for bind in self.ir.gpr_binds.temps() {
            if bind.is_param && (3..=10).contains(&bind.reg.0) {
                self.ir.int_params[(bind.reg.0 - 3) as usize] = bind.id;
            }
        }
        for bind in self.ir.fpr_binds.temps() {
            if bind.is_param && (1..=13).contains(&bind.reg.0) {
                self.ir.flt_params[(bind.reg.0 - 1) as usize] = bind.id;
            }
        }
        self.ir.num_int_params = self
            .ir
            .int_params
            .iter()
            .filter(|&&t| t != INVALID_TEMP)
            .count() as u8;
        self.ir.num_flt_params = self
            .ir
            .flt_params
            .iter()
            .filter(|&&t| t != INVALID_TEMP)
            .count() as u8;

        let mut offsets: Vec<u16> = self
            .routine
            .stack
            .params()
            .iter()
            .map(|var| var.offset as u16)
            .collect();
        offsets.sort_unstable();
        self.ir.stack_params = offsets;
    }

    fn emit(&mut self, v: VertexId, opcode: IrOpcode, operands: &[OpVar]) {
        self.ir
            .graph
            .vertex_mut(v)
            .data_mut()
            .instructions
            .push(IrInst::new(opcode, operands));
    }

    fn emit_intrinsic(&mut self, v: VertexId) {
        self.emit(v, IrOpcode::Intrinsic, &[]);
    }

    fn gpr_temp(&self, va: u32, reg: Gpr) -> Option<u32> {
        self.ir.gpr_binds.query_temp(va, reg).map(|b| b.id)
    }

    fn gpr_op(&self, va: u32, reg: Gpr) -> Option<OpVar> {
        Some(OpVar::Temp(TempVar::Integral {
            temp: self.gpr_temp(va, reg)?,
            ty: IrType::S4,
        }))
    }

    fn fpr_op(&self, va: u32, reg: Fpr, width: DataType) -> Option<OpVar> {
        let ty = match width {
            DataType::Single => IrType::Single,
            _ => IrType::Double,
        };
        let bind = self.ir.fpr_binds.query_temp(va, reg)?;
        Some(OpVar::Temp(TempVar::Floating { temp: bind.id, ty }))
    }

    fn cond_ref(&self, va: u32, field: CrField, bits: u8) -> Option<ConditionRef> {
        let bind = self.ir.cr_binds.query_temp(va, field)?;
        Some(ConditionRef {
            temp: bind.id,
            bits,
        })
    }

    fn cond_op(&self, va: u32, field: CrField, bits: u8) -> Option<OpVar> {
        Some(OpVar::Temp(TempVar::Condition(self.cond_ref(
            va, field, bits,
        )?)))
    }

    /// Reference into this routine's frame, or the caller's parameter area.
    fn stack_op(&self, offset: i16, addrof: bool) -> OpVar {
        let is_param = self
            .routine
            .stack
            .variable_for_offset(offset)
            .map(|var| var.is_param)
            .unwrap_or(false);
        if is_param {
            if let Some(index) = self.ir.stack_param_idx(offset as u16) {
                return OpVar::Param(ParamRef { index, addrof });
            }
        }
        OpVar::Stack(StackRef { offset, addrof })
    }

    fn read_op(&self, va: u32, ds: &DataSource) -> Option<OpVar> {
        match ds {
            DataSource::Gpr(slice) => match slice.reg {
                Gpr::R1 => Some(self.stack_op(0, true)),
                Gpr::R2 => self.ctx.abi.rtoc_base.map(|base| {
                    OpVar::Imm(Immediate {
                        value: base,
                        signed: false,
                    })
                }),
                Gpr::R13 => self.ctx.abi.r13_base.map(|base| {
                    OpVar::Imm(Immediate {
                        value: base,
                        signed: false,
                    })
                }),
                reg => self.gpr_op(va, reg),
            },
            DataSource::Fpr(slice) => self.fpr_op(va, slice.reg, slice.width),
            DataSource::CrField(field) => self.cond_op(va, *field, 0b1111),
            DataSource::CrBit(bit) => self.cond_op(va, bit.field(), 1 << bit.bit_in_field()),
            DataSource::MemRegOff(mem) => {
                if mem.base == Gpr::R1 {
                    Some(self.stack_op(mem.offset, false))
                } else {
                    Some(OpVar::Mem(MemRef {
                        base_temp: self.gpr_temp(va, mem.base)?,
                        offset: mem.offset,
                    }))
                }
            }
            DataSource::Simm(imm) => Some(OpVar::Imm(Immediate {
                value: *imm as i32 as u32,
                signed: true,
            })),
            DataSource::Uimm(imm) => Some(OpVar::Imm(Immediate {
                value: *imm as u32,
                signed: false,
            })),
            DataSource::AuxImm(imm) => Some(OpVar::Imm(Immediate {
                value: *imm,
                signed: false,
            })),
            _ => None,
        }
    }

    fn write_op(&self, va: u32, ds: &DataSource) -> Option<OpVar> {
        match ds {
            DataSource::Gpr(slice) => self.gpr_op(va, slice.reg),
            DataSource::Fpr(slice) => self.fpr_op(va, slice.reg, slice.width),
            DataSource::CrField(field) => self.cond_op(va, *field, 0b1111),
            DataSource::CrBit(bit) => self.cond_op(va, bit.field(), 1 << bit.bit_in_field()),
            DataSource::MemRegOff(mem) => {
                if mem.base == Gpr::R1 {
                    Some(self.stack_op(mem.offset, false))
                } else {
                    Some(OpVar::Mem(MemRef {
                        base_temp: self.gpr_temp(va, mem.base)?,
                        offset: mem.offset,
                    }))
                }
            }
            _ => None,
        }
    }

    /// Append the cr0 record test for `.` forms.
    fn emit_rc_test(&mut self, v: VertexId, inst: &MetaInst) {
        if !inst.side_effects.intersects(InstSideFx::WRITES_RECORD) {
            return;
        }
        let Some(write) = &inst.write else { return };
        let (Some(cr0), Some(dst)) = (
            self.cond_op(inst.va, CrField::CR0, 0b1111),
            self.write_op(inst.va, write),
        ) else {
            return;
        };
        self.emit(v, IrOpcode::RcTest, &[cr0, dst]);
    }

    /// dst = op(read0) lowering.
    fn lower_unary(&mut self, v: VertexId, opcode: IrOpcode, inst: &MetaInst) {
        let ops = (|| {
            let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
            let src = self.read_op(inst.va, inst.reads.first()?)?;
            Some([dst, src])
        })();
        match ops {
            Some(ops) => {
                self.emit(v, opcode, &ops);
                self.emit_rc_test(v, inst);
            }
            None => self.emit_intrinsic(v),
        }
    }

    /// dst = op(read0, read1) lowering, optionally shifting the immediate
    /// left 16 bits for the `-is` forms.
    fn lower_binary_shift(&mut self, v: VertexId, opcode: IrOpcode, inst: &MetaInst, shift16: bool) {
        let ops = (|| {
            let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
            let a = self.read_op(inst.va, inst.reads.first()?)?;
            let mut b = self.read_op(inst.va, inst.reads.get(1)?)?;
            if shift16 {
                if let OpVar::Imm(imm) = &mut b {
                    imm.value <<= 16;
                }
            }
            Some([dst, a, b])
        })();
        match ops {
            Some(ops) => {
                self.emit(v, opcode, &ops);
                self.emit_rc_test(v, inst);
            }
            None => self.emit_intrinsic(v),
        }
    }

    fn lower_binary(&mut self, v: VertexId, opcode: IrOpcode, inst: &MetaInst) {
        self.lower_binary_shift(v, opcode, inst, false);
    }

    /// subf rD, rA, rB computes rB - rA: operands reversed into Sub.
    fn lower_subtract(&mut self, v: VertexId, inst: &MetaInst) {
        let ops = (|| {
            let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
            let a = self.read_op(inst.va, inst.reads.first()?)?;
            let b = self.read_op(inst.va, inst.reads.get(1)?)?;
            Some([dst, b, a])
        })();
        match ops {
            Some(ops) => {
                self.emit(v, IrOpcode::Sub, &ops);
                self.emit_rc_test(v, inst);
            }
            None => self.emit_intrinsic(v),
        }
    }

    /// Two-instruction expansion `dst = inner(a, b); dst = outer(dst)` used
    /// by nor/nand/eqv. Safe because the destination is written last.
    fn lower_negated_binary(&mut self, v: VertexId, inner: IrOpcode, inst: &MetaInst) {
        let ops = (|| {
            let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
            let a = self.read_op(inst.va, inst.reads.first()?)?;
            let b = self.read_op(inst.va, inst.reads.get(1)?)?;
            Some([dst, a, b])
        })();
        match ops {
            Some([dst, a, b]) => {
                self.emit(v, inner, &[dst, a, b]);
                self.emit(v, IrOpcode::NotB, &[dst, dst]);
                self.emit_rc_test(v, inst);
            }
            None => self.emit_intrinsic(v),
        }
    }

    /// andc/orc complement the second operand through the destination. Falls
    /// back to an intrinsic when the destination aliases the first source.
    fn lower_complement_second(&mut self, v: VertexId, opcode: IrOpcode, inst: &MetaInst) {
        let dest_reg = inst.write_gpr();
        let src_reg = inst.reads.first().and_then(|ds| match ds {
            DataSource::Gpr(slice) => Some(slice.reg),
            _ => None,
        });
        if dest_reg.is_none() || dest_reg == src_reg {
            self.emit_intrinsic(v);
            return;
        }
        let ops = (|| {
            let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
            let a = self.read_op(inst.va, inst.reads.first()?)?;
            let b = self.read_op(inst.va, inst.reads.get(1)?)?;
            Some([dst, a, b])
        })();
        match ops {
            Some([dst, a, b]) => {
                self.emit(v, IrOpcode::NotB, &[dst, b]);
                self.emit(v, opcode, &[dst, a, dst]);
                self.emit_rc_test(v, inst);
            }
            None => self.emit_intrinsic(v),
        }
    }

    /// cmp/cmpi/cmpl/cmpli: all four bits of the target field at once.
    fn lower_compare(&mut self, v: VertexId, inst: &MetaInst) {
        let ops = (|| {
            let field = match inst.write.as_ref()? {
                DataSource::CrField(field) => *field,
                _ => return None,
            };
            let dst = self.cond_op(inst.va, field, 0b1111)?;
            let a = self.read_op(inst.va, inst.reads.first()?)?;
            let b = self.read_op(inst.va, inst.reads.get(1)?)?;
            Some([dst, a, b])
        })();
        match ops {
            Some(ops) => self.emit(v, IrOpcode::Cmp, &ops),
            None => self.emit_intrinsic(v),
        }
    }

    fn lower_load(&mut self, v: VertexId, inst: &MetaInst) {
        let Some(write) = &inst.write else {
            self.emit_intrinsic(v);
            return;
        };

        match inst.read_mem_off() {
            Some(mem) => {
                let ops = (|| {
                    let dst = self.write_op(inst.va, write)?;
                    let src = self.read_op(inst.va, &DataSource::MemRegOff(mem))?;
                    Some([dst, src])
                })();
                match ops {
                    Some(ops) => self.emit(v, IrOpcode::Load, &ops),
                    None => {
                        self.emit_intrinsic(v);
                        return;
                    }
                }
                self.emit_base_update(v, inst, mem.base, mem.offset);
            }
            None => self.lower_indexed_load(v, inst),
        }
    }

    /// x-form load: the effective address is computed through the (integer)
    /// destination before the load overwrites it.
    fn lower_indexed_load(&mut self, v: VertexId, inst: &MetaInst) {
        let mem = inst.reads.iter().find_map(|ds| match ds {
            DataSource::MemRegReg(mem) => Some(*mem),
            _ => None,
        });
        let (Some(mem), Some(dest_reg)) = (mem, inst.write_gpr()) else {
            // Float indexed loads have no integer scratch to stage through
            self.emit_intrinsic(v);
            return;
        };

        let ops = (|| {
            let dst_temp = self.gpr_temp(inst.va, dest_reg)?;
            let dst = self.gpr_op(inst.va, dest_reg)?;
            let base = self.gpr_op(inst.va, mem.base)?;
            let index = self.gpr_op(inst.va, mem.index)?;
            Some((dst_temp, dst, base, index))
        })();
        let Some((dst_temp, dst, base, index)) = ops else {
            self.emit_intrinsic(v);
            return;
        };

        self.emit(v, IrOpcode::Add, &[dst, base, index]);
        if inst.side_effects.intersects(InstSideFx::WRITES_BASE_REG) {
            self.emit(v, IrOpcode::Mov, &[base, dst]);
        }
        self.emit(
            v,
            IrOpcode::Load,
            &[
                dst,
                OpVar::Mem(MemRef {
                    base_temp: dst_temp,
                    offset: 0,
                }),
            ],
        );
    }

    fn lower_store(&mut self, v: VertexId, inst: &MetaInst) {
        let Some(mem) = inst.write_mem_off() else {
            // x-form stores have no scratch register to stage the address in
            self.emit_intrinsic(v);
            return;
        };

        // The frame-allocating stwu is implicit in the stack model
        if inst.op == InstOperation::Stwu && inst.read_gpr() == Some(Gpr::R1) {
            return;
        }

        let ops = (|| {
            let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
            let src = self.read_op(inst.va, inst.reads.first()?)?;
            Some([dst, src])
        })();
        match ops {
            Some(ops) => self.emit(v, IrOpcode::Store, &ops),
            None => {
                self.emit_intrinsic(v);
                return;
            }
        }
        self.emit_base_update(v, inst, mem.base, mem.offset);
    }

    /// Updating memory forms write the effective address back to the base.
    fn emit_base_update(&mut self, v: VertexId, inst: &MetaInst, base: Gpr, offset: i16) {
        if !inst.side_effects.intersects(InstSideFx::WRITES_BASE_REG) || base == Gpr::R1 {
            return;
        }
        if let Some(base_op) = self.gpr_op(inst.va, base) {
            let imm = OpVar::Imm(Immediate {
                value: offset as i32 as u32,
                signed: true,
            });
            self.emit(v, IrOpcode::Add, &[base_op, base_op, imm]);
        }
    }

    /// rlwinm via its simplified classification; the general form expands to
    /// a rotate and mask through the destination.
    fn lower_rlwinm(&mut self, v: VertexId, inst: &MetaInst) {
        let imm = |value: u32| {
            OpVar::Imm(Immediate {
                value,
                signed: false,
            })
        };
        let ops = (|| {
            let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
            let src = self.read_op(inst.va, inst.reads.first()?)?;
            Some((dst, src))
        })();
        let Some((dst, src)) = ops else {
            self.emit_intrinsic(v);
            return;
        };

        use crate::decompiler::decoder::gen_mask;
        match inst.simplified_rlwinm() {
            SimplifiedRlwinm::Slwi { n } => self.emit(v, IrOpcode::Lsh, &[dst, src, imm(n as u32)]),
            SimplifiedRlwinm::Srwi { n } => self.emit(v, IrOpcode::Rsh, &[dst, src, imm(n as u32)]),
            SimplifiedRlwinm::Rotlwi { n } => {
                self.emit(v, IrOpcode::Rol, &[dst, src, imm(n as u32)])
            }
            SimplifiedRlwinm::Rotrwi { n } => {
                self.emit(v, IrOpcode::Ror, &[dst, src, imm(n as u32)])
            }
            SimplifiedRlwinm::Clrlwi { n } => {
                self.emit(v, IrOpcode::AndB, &[dst, src, imm(gen_mask(n as u32, 31))])
            }
            SimplifiedRlwinm::Clrrwi { n } => self.emit(
                v,
                IrOpcode::AndB,
                &[dst, src, imm(gen_mask(0, 31 - n as u32))],
            ),
            _ => {
                // rol then mask; the destination is a safe intermediate
                let sh = inst.raw.sh();
                let mask = gen_mask(inst.raw.mb(), inst.raw.me());
                self.emit(v, IrOpcode::Rol, &[dst, src, imm(sh)]);
                self.emit(v, IrOpcode::AndB, &[dst, dst, imm(mask)]);
            }
        }
        self.emit_rc_test(v, inst);
    }

    /// Fused multiply-add family: expand through the destination, unless the
    /// addend aliases it.
    fn lower_fma(&mut self, v: VertexId, inst: &MetaInst, second: IrOpcode, negate: bool) {
        let dest_reg = match &inst.write {
            Some(DataSource::Fpr(slice)) => Some(slice.reg),
            _ => None,
        };
        let addend_reg = match inst.reads.get(1) {
            Some(DataSource::Fpr(slice)) => Some(slice.reg),
            _ => None,
        };
        if dest_reg.is_none() || dest_reg == addend_reg {
            self.emit_intrinsic(v);
            return;
        }

        let ops = (|| {
            let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
            let a = self.read_op(inst.va, inst.reads.first()?)?;
            let b = self.read_op(inst.va, inst.reads.get(1)?)?;
            let c = self.read_op(inst.va, inst.reads.get(2)?)?;
            Some([dst, a, b, c])
        })();
        match ops {
            Some([dst, a, b, c]) => {
                self.emit(v, IrOpcode::Mul, &[dst, a, c]);
                self.emit(v, second, &[dst, dst, b]);
                if negate {
                    self.emit(v, IrOpcode::Neg, &[dst, dst]);
                }
                self.emit_rc_test(v, inst);
            }
            None => self.emit_intrinsic(v),
        }
    }

    /// `bc` emits no instruction; the containing block's terminator records
    /// the condition bit, inversion, and counter involvement.
    fn lower_bc_terminator(&mut self, v: VertexId, inst: &MetaInst) {
        let bo = inst.bo_kind();

        let counter = match bo {
            BoKind::Dnz | BoKind::Dnzf | BoKind::Dnzt => CounterCheck::NotZero,
            BoKind::Dz | BoKind::Dzf | BoKind::Dzt => CounterCheck::Zero,
            _ => CounterCheck::Ignore,
        };
        let tests_condition = matches!(
            bo,
            BoKind::T | BoKind::F | BoKind::Dnzt | BoKind::Dnzf | BoKind::Dzt | BoKind::Dzf
        );
        let invert = matches!(bo, BoKind::F | BoKind::Dnzf | BoKind::Dzf);

        let cond = if tests_condition {
            let bit = inst.branch_condition_bit();
            self.cond_ref(inst.va, bit.field(), 1 << bit.bit_in_field())
        } else {
            None
        };

        let block = self.ir.graph.vertex_mut(v).data_mut();
        block.cond = cond;
        block.invert_cond = invert;
        block.counter_check = counter;
    }

    fn lower_addi(&mut self, v: VertexId, inst: &MetaInst) {
        // Address-of a stack slot
        if inst.read_gpr() == Some(Gpr::R1) {
            let ops = (|| {
                let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
                let offset = inst.read_simm()?;
                Some([dst, self.stack_op(offset, true)])
            })();
            match ops {
                Some(ops) => self.emit(v, IrOpcode::Mov, &ops),
                None => self.emit_intrinsic(v),
            }
            return;
        }

        // li: immediate load when the base is the literal zero
        if matches!(inst.reads.first(), Some(DataSource::AuxImm(0))) {
            let shift = inst.op == InstOperation::Addis;
            let ops = (|| {
                let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
                let value = inst.read_simm()? as i32 as u32;
                Some([
                    dst,
                    OpVar::Imm(Immediate {
                        value: if shift { value << 16 } else { value },
                        signed: !shift,
                    }),
                ])
            })();
            match ops {
                Some(ops) => self.emit(v, IrOpcode::Mov, &ops),
                None => self.emit_intrinsic(v),
            }
            return;
        }

        self.lower_binary_shift(v, IrOpcode::Add, inst, inst.op == InstOperation::Addis);
    }

    fn translate_inst(&mut self, v: VertexId, inst: &MetaInst) {
        use InstOperation as Op;
        match inst.op {
            // Arithmetic
            Op::Add => self.lower_binary(v, IrOpcode::Add, inst),
            Op::Addi | Op::Addis => self.lower_addi(v, inst),
            Op::Addc | Op::Addic | Op::AddicRc => self.lower_binary(v, IrOpcode::Addc, inst),
            Op::Subf => self.lower_subtract(v, inst),
            Op::Subfc | Op::Subfic => self.lower_subtract(v, inst),
            Op::Mulli | Op::Mullw => self.lower_binary(v, IrOpcode::Mul, inst),
            Op::Divw | Op::Divwu => self.lower_binary(v, IrOpcode::Div, inst),
            Op::Neg => self.lower_unary(v, IrOpcode::Neg, inst),
            // Carry-consuming extended arithmetic has no flat rendition
            Op::Adde | Op::Addme | Op::Addze | Op::Subfe | Op::Subfme | Op::Subfze => {
                self.emit_intrinsic(v)
            }
            Op::Mulhw | Op::Mulhwu => self.emit_intrinsic(v),

            // Compares
            Op::Cmp | Op::Cmpi | Op::Cmpl | Op::Cmpli => self.lower_compare(v, inst),

            // Logical
            Op::And | Op::AndiRc => self.lower_binary(v, IrOpcode::AndB, inst),
            Op::AndisRc => self.lower_binary_shift(v, IrOpcode::AndB, inst, true),
            Op::Or => {
                // mr: or with itself is a plain move
                if inst.reads.len() == 2 && inst.reads[0] == inst.reads[1] {
                    self.lower_unary(v, IrOpcode::Mov, inst);
                } else {
                    self.lower_binary(v, IrOpcode::OrB, inst);
                }
            }
            Op::Ori => {
                // Canonical nop encoding
                if inst.raw.0 == 0x6000_0000 {
                    return;
                }
                self.lower_binary(v, IrOpcode::OrB, inst);
            }
            Op::Oris => self.lower_binary_shift(v, IrOpcode::OrB, inst, true),
            Op::Xor | Op::Xori => self.lower_binary(v, IrOpcode::XorB, inst),
            Op::Xoris => self.lower_binary_shift(v, IrOpcode::XorB, inst, true),
            Op::Nand => self.lower_negated_binary(v, IrOpcode::AndB, inst),
            Op::Nor => self.lower_negated_binary(v, IrOpcode::OrB, inst),
            Op::Eqv => self.lower_negated_binary(v, IrOpcode::XorB, inst),
            Op::Andc => self.lower_complement_second(v, IrOpcode::AndB, inst),
            Op::Orc => self.lower_complement_second(v, IrOpcode::OrB, inst),
            Op::Extsb | Op::Extsh => self.lower_unary(v, IrOpcode::Mov, inst),
            Op::Cntlzw => self.emit_intrinsic(v),

            // Shifts and rotates
            Op::Slw => self.lower_binary(v, IrOpcode::Lsh, inst),
            Op::Srw | Op::Sraw | Op::Srawi => self.lower_binary(v, IrOpcode::Rsh, inst),
            Op::Rlwinm => self.lower_rlwinm(v, inst),
            Op::Rlwnm => {
                if inst.simplified_rlwnm() == SimplifiedRlwnm::Rotlw {
                    self.lower_binary(v, IrOpcode::Rol, inst);
                } else {
                    self.emit_intrinsic(v);
                }
            }
            Op::Rlwimi => self.emit_intrinsic(v),

            // Loads
            Op::Lbz | Op::Lbzu | Op::Lbzux | Op::Lbzx | Op::Lha | Op::Lhau | Op::Lhaux
            | Op::Lhax | Op::Lhz | Op::Lhzu | Op::Lhzux | Op::Lhzx | Op::Lwz | Op::Lwzu
            | Op::Lwzux | Op::Lwzx | Op::Lwarx | Op::Lfs | Op::Lfsu | Op::Lfd | Op::Lfdu => {
                self.lower_load(v, inst)
            }
            Op::Lfsx | Op::Lfsux | Op::Lfdx | Op::Lfdux => self.lower_indexed_load(v, inst),

            // Stores
            Op::Stb | Op::Stbu | Op::Sth | Op::Sthu | Op::Stw | Op::Stwu | Op::Stfs
            | Op::Stfsu | Op::Stfd | Op::Stfdu => self.lower_store(v, inst),
            Op::Stbx | Op::Stbux | Op::Sthx | Op::Sthux | Op::Stwx | Op::Stwux | Op::StwcxRc
            | Op::Stfsx | Op::Stfsux | Op::Stfdx | Op::Stfdux | Op::Stfiwx => {
                self.emit_intrinsic(v)
            }

            // Byte-reversed and string/multiple forms stay opaque
            Op::Lhbrx | Op::Lwbrx | Op::Sthbrx | Op::Stwbrx | Op::Lmw | Op::Stmw | Op::Lswi
            | Op::Lswx | Op::Stswi | Op::Stswx => self.emit_intrinsic(v),

            // Floating arithmetic
            Op::Fadd | Op::Fadds => self.lower_binary(v, IrOpcode::Add, inst),
            Op::Fsub | Op::Fsubs => self.lower_binary(v, IrOpcode::Sub, inst),
            Op::Fmul | Op::Fmuls => self.lower_binary(v, IrOpcode::Mul, inst),
            Op::Fdiv | Op::Fdivs => self.lower_binary(v, IrOpcode::Div, inst),
            Op::Fmadd | Op::Fmadds => self.lower_fma(v, inst, IrOpcode::Add, false),
            Op::Fmsub | Op::Fmsubs => self.lower_fma(v, inst, IrOpcode::Sub, false),
            Op::Fnmadd | Op::Fnmadds => self.lower_fma(v, inst, IrOpcode::Add, true),
            Op::Fnmsub | Op::Fnmsubs => self.lower_fma(v, inst, IrOpcode::Sub, true),
            Op::Fmr => self.lower_unary(v, IrOpcode::Mov, inst),
            Op::Fneg => self.lower_unary(v, IrOpcode::Neg, inst),
            Op::Fabs => self.lower_unary(v, IrOpcode::Abs, inst),
            Op::Fnabs => {
                let ops = (|| {
                    let dst = self.write_op(inst.va, inst.write.as_ref()?)?;
                    let src = self.read_op(inst.va, inst.reads.first()?)?;
                    Some([dst, src])
                })();
                match ops {
                    Some([dst, src]) => {
                        self.emit(v, IrOpcode::Abs, &[dst, src]);
                        self.emit(v, IrOpcode::Neg, &[dst, dst]);
                        self.emit_rc_test(v, inst);
                    }
                    None => self.emit_intrinsic(v),
                }
            }
            Op::Fcmpu | Op::Fcmpo => self.lower_compare(v, inst),
            Op::Fres | Op::Frsqrte | Op::Fsel | Op::Fctiw | Op::Fctiwz | Op::Frsp => {
                self.emit_intrinsic(v)
            }

            // CR logical
            Op::Crand => self.lower_binary(v, IrOpcode::AndB, inst),
            Op::Cror => self.lower_binary(v, IrOpcode::OrB, inst),
            Op::Crxor => self.lower_binary(v, IrOpcode::XorB, inst),
            Op::Crnand => self.lower_negated_binary(v, IrOpcode::AndB, inst),
            Op::Crnor => self.lower_negated_binary(v, IrOpcode::OrB, inst),
            Op::Creqv => self.lower_negated_binary(v, IrOpcode::XorB, inst),
            Op::Crandc | Op::Crorc => self.emit_intrinsic(v),
            Op::Mcrf => self.lower_unary(v, IrOpcode::Mov, inst),

            // Branches
            Op::B => {
                if inst.side_effects.intersects(InstSideFx::WRITES_LR) {
                    let target = inst.branch_target();
                    if !self.ctx.is_abi_routine(target) {
                        self.emit(
                            v,
                            IrOpcode::Call,
                            &[OpVar::Func(FunctionRef { va: target })],
                        );
                    }
                }
                // Plain b: the edge carries the transfer
            }
            Op::Bc => {
                if inst.side_effects.intersects(InstSideFx::WRITES_LR) {
                    self.emit_intrinsic(v);
                } else {
                    self.lower_bc_terminator(v, inst);
                }
            }
            Op::Bclr => {
                if inst.side_effects.intersects(InstSideFx::WRITES_LR) {
                    self.emit_intrinsic(v);
                } else {
                    if !inst.is_blr() {
                        // Conditional return
                        self.lower_bc_terminator(v, inst);
                    }
                    self.emit(v, IrOpcode::Return, &[]);
                }
            }
            Op::Bcctr => self.emit_intrinsic(v),

            // Barriers
            Op::Sync | Op::Isync | Op::Eieio => self.emit(v, IrOpcode::OptBarrier, &[]),

            // System, cache, FPSCR and everything else privileged
            _ => self.emit_intrinsic(v),
        }
    }

    fn translate(&mut self) {
        self.compute_binds();
        self.collect_params();

        let routine = self.routine;
        for id in routine.graph.forward_order() {
            let block = routine.graph.block(id);
            let v = self.ir.block_vertex[id as usize];
            for (i, inst) in block.instructions.iter().enumerate() {
                let tag = block
                    .perilogue_tags
                    .get(i)
                    .copied()
                    .unwrap_or(PerilogueTag::NormalInst);
                if tag != PerilogueTag::NormalInst {
                    continue;
                }
                self.translate_inst(v, inst);
            }
        }
    }
}

/// Lower a fully analyzed subroutine into its IR.
pub fn translate_subroutine(routine: &Subroutine, ctx: &BinaryContext) -> IrRoutine {
    let mut translator = GekkoTranslator::new(routine, ctx);
    translator.translate();
    log::debug!(
        "translated {:#010x}: {} gpr temp(s), {} fpr temp(s), {} cr temp(s)",
        routine.start_va,
        translator.ir.gpr_binds.len(),
        translator.ir.fpr_binds.len(),
        translator.ir.cr_binds.len()
    );
    translator.ir
}
