//! Prologue/Epilogue Classification
//!
//! Tags each instruction of the entry and exit blocks with its perilogue
//! role: frame allocation, link-register shuffling, callee-saved register
//! saves and restores, and branches into the savegpr/restgpr ABI helpers.
//! Everything else stays [`PerilogueTag::NormalInst`].
//!
//! Classification leans on the liveness facts: a `stw` of a callee-saved
//! register only counts as a save if the register has been live since block
//! entry, and `mtlr r0` only closes an epilogue if r0 still carries a value
//! loaded by an earlier `LoadSenderLR`.

use crate::decompiler::analysis::control_flow::{BasicBlock, SubroutineGraph};
use crate::decompiler::analysis::stack::SubroutineStack;
use crate::decompiler::context::BinaryContext;
use crate::decompiler::datasource::{DataSource, Fpr, Gpr, Spr, CALLEE_SAVED_GPRS};
use crate::decompiler::decoder::{InstOperation, MetaInst};

/// Role of one instruction within the subroutine's perilogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerilogueTag {
    #[default]
    NormalInst,

    FrameAllocate,
    MoveLrToR0,
    SaveSenderLr,
    CalleeGprSave,
    CalleeFprSave,
    CalleeGprRestore,
    CalleeFprRestore,
    AbiRoutine,
    LoadSenderLr,
    MoveR0ToLr,
    FrameDeallocate,
}

fn is_mfspr_of(inst: &MetaInst, spr: Spr) -> bool {
    inst.op == InstOperation::Mfspr && inst.reads.first() == Some(&DataSource::Spr(spr))
}

fn is_mtspr_of(inst: &MetaInst, spr: Spr) -> bool {
    inst.op == InstOperation::Mtspr && inst.write == Some(DataSource::Spr(spr))
}

/// Walk backwards from `start` while `reg` stays live, checking whether any
/// earlier instruction in the block carries `wanted`.
fn backtrack_for_tag(
    block: &BasicBlock,
    tags: &[PerilogueTag],
    reg: Gpr,
    start: usize,
    wanted: PerilogueTag,
) -> bool {
    let lt = block.lifetimes();
    for j in (1..=start).rev() {
        if !lt.live_out[j - 1].contains(reg) {
            return false;
        }
        if tags[j - 1] == wanted {
            return true;
        }
    }
    false
}

/// True when `reg` has been live continuously since block entry at
/// instruction `start`, i.e. its value is still the caller's.
fn live_since_entry(block: &BasicBlock, reg: Gpr, start: usize) -> bool {
    let lt = block.lifetimes();
    (1..=start).rev().all(|j| lt.live_out[j - 1].contains(reg))
}

fn classify_block(
    graph: &SubroutineGraph,
    id: u32,
    stack: &mut SubroutineStack,
    ctx: &BinaryContext,
) -> Vec<PerilogueTag> {
    let block = graph.block(id);
    let mut tags = vec![PerilogueTag::NormalInst; block.instructions.len()];

    for i in 0..block.instructions.len() {
        let inst = &block.instructions[i];
        let mut tag = PerilogueTag::NormalInst;

        if inst.op == InstOperation::Stwu && inst.read_gpr() == Some(Gpr::R1) {
            tag = PerilogueTag::FrameAllocate;
        } else if inst.op == InstOperation::Addi
            && inst.write_gpr() == Some(Gpr::R1)
            && inst.read_gpr() == Some(Gpr::R1)
        {
            tag = PerilogueTag::FrameDeallocate;
        } else if is_mfspr_of(inst, Spr::Lr) && inst.write_gpr() == Some(Gpr::R0) {
            // TODO: also require LR to be a routine input once SPR liveness
            // is tracked
            tag = PerilogueTag::MoveLrToR0;
        } else if is_mtspr_of(inst, Spr::Lr) && inst.read_gpr() == Some(Gpr::R0) {
            if backtrack_for_tag(block, &tags, Gpr::R0, i, PerilogueTag::LoadSenderLr) {
                tag = PerilogueTag::MoveR0ToLr;
            }
        } else if inst.op == InstOperation::Stw {
            if let (Some(store_reg), Some(mem)) = (inst.read_gpr(), inst.write_mem_off()) {
                if mem.base == Gpr::R1 {
                    if store_reg == Gpr::R0 {
                        // LR saves stay within one basic block in practice
                        if backtrack_for_tag(block, &tags, Gpr::R0, i, PerilogueTag::MoveLrToR0) {
                            tag = PerilogueTag::SaveSenderLr;
                            if let Some(var) = stack.variable_for_offset_mut(mem.offset) {
                                var.is_frame_storage = true;
                            }
                        }
                    } else if CALLEE_SAVED_GPRS.contains(store_reg)
                        && live_since_entry(block, store_reg, i)
                    {
                        tag = PerilogueTag::CalleeGprSave;
                        if let Some(var) = stack.variable_for_offset_mut(mem.offset) {
                            var.is_frame_storage = true;
                        }
                    }
                }
            }
        } else if inst.op == InstOperation::Stmw {
            if let (Some(DataSource::MultiReg(multi)), Some(mem)) =
                (inst.reads.first(), inst.write_mem_off())
            {
                if mem.base == Gpr::R1 && live_since_entry(block, multi.low, i) {
                    tag = PerilogueTag::CalleeGprSave;
                    if let Some(var) = stack.variable_for_offset_mut(mem.offset) {
                        var.is_frame_storage = true;
                    }
                }
            }
        } else if inst.op == InstOperation::Stfd {
            if let (Some(DataSource::Fpr(slice)), Some(mem)) =
                (inst.reads.first(), inst.write_mem_off())
            {
                if mem.base == Gpr::R1 && slice.reg >= Fpr::F14 {
                    tag = PerilogueTag::CalleeFprSave;
                    if let Some(var) = stack.variable_for_offset_mut(mem.offset) {
                        var.is_frame_storage = true;
                    }
                }
            }
        } else if inst.op == InstOperation::Lwz {
            if let (Some(mem), Some(read_reg)) = (inst.read_mem_off(), inst.write_gpr()) {
                if mem.base == Gpr::R1
                    && stack
                        .variable_for_offset(mem.offset)
                        .is_some_and(|var| var.is_frame_storage)
                {
                    if read_reg == Gpr::R0 {
                        tag = PerilogueTag::LoadSenderLr;
                    } else if CALLEE_SAVED_GPRS.contains(read_reg) {
                        tag = PerilogueTag::CalleeGprRestore;
                    }
                }
            }
        } else if inst.op == InstOperation::Lmw {
            if let (Some(mem), Some(DataSource::MultiReg(_))) = (inst.read_mem_off(), &inst.write) {
                if mem.base == Gpr::R1
                    && stack
                        .variable_for_offset(mem.offset)
                        .is_some_and(|var| var.is_frame_storage)
                {
                    tag = PerilogueTag::CalleeGprRestore;
                }
            }
        } else if inst.op == InstOperation::Lfd {
            if let (Some(mem), Some(DataSource::Fpr(slice))) = (inst.read_mem_off(), &inst.write) {
                if mem.base == Gpr::R1
                    && slice.reg >= Fpr::F14
                    && stack
                        .variable_for_offset(mem.offset)
                        .is_some_and(|var| var.is_frame_storage)
                {
                    tag = PerilogueTag::CalleeFprRestore;
                }
            }
        } else if inst.op == InstOperation::B && ctx.is_abi_routine(inst.branch_target()) {
            tag = PerilogueTag::AbiRoutine;
            // The addi that parked the frame point in r11 belongs to the
            // save sequence too
            if i > 0 {
                let prev = &block.instructions[i - 1];
                if prev.op == InstOperation::Addi
                    && prev.write_gpr() == Some(Gpr::R11)
                    && prev.read_gpr() == Some(Gpr::R1)
                {
                    tags[i - 1] = PerilogueTag::CalleeGprSave;
                    if let Some(offset) = prev.read_simm() {
                        if let Some(var) = stack.variable_for_offset_mut(offset) {
                            var.is_frame_storage = true;
                        }
                    }
                }
            }
        }

        tags[i] = tag;
    }

    tags
}

/// Tag the entry block and every exit block of the subroutine.
pub fn run_perilogue_analysis(
    graph: &mut SubroutineGraph,
    stack: &mut SubroutineStack,
    ctx: &BinaryContext,
) {
    let mut targets = vec![graph.root];
    for &exit in &graph.exits {
        if !targets.contains(&exit) {
            targets.push(exit);
        }
    }

    for id in targets {
        let tags = classify_block(graph, id, stack, ctx);
        graph.block_mut(id).perilogue_tags = tags;
    }

    // Blocks that never got classified still carry one tag per instruction
    let ids: Vec<u32> = graph.blocks().map(|b| b.id).collect();
    for id in ids {
        let block = graph.block_mut(id);
        if block.perilogue_tags.len() != block.instructions.len() {
            block.perilogue_tags = vec![PerilogueTag::NormalInst; block.instructions.len()];
        }
    }
}
