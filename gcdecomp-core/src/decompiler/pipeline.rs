//! Per-Subroutine Decompilation Pipeline
//!
//! Drives the analysis stages in order for one subroutine:
//!
//! 1. Control flow graph construction (with loop identification)
//! 2. Register liveness
//! 3. Stack-frame recovery
//! 4. Perilogue classification
//! 5. IR lowering with bind tracking
//! 6. Control-flow structuring
//!
//! Each [`DecompiledSubroutine`] owns all of its results exclusively, so a
//! caller may decompile many subroutines in parallel against one shared
//! read-only [`BinaryContext`](crate::decompiler::context::BinaryContext).

use anyhow::Result;

use crate::decompiler::analysis::{
    build_graph, run_liveness_analysis, run_perilogue_analysis, run_stack_analysis, Subroutine,
};
use crate::decompiler::context::BinaryContext;
use crate::decompiler::datasource::{FprSet, FPR_PARAMETERS, GPR_PARAMETERS};
use crate::decompiler::decoder::InstOperation;
use crate::decompiler::error::DecompilerError;
use crate::decompiler::ir::{translate_subroutine, IrRoutine};
use crate::decompiler::structure::{
    run_control_flow_analysis, HllControlTree, SemanticPreservingStructurizer,
};

/// Everything produced for one subroutine, ready for pseudo-code emission.
pub struct DecompiledSubroutine {
    pub subroutine: Subroutine,
    pub routine: IrRoutine,
    pub tree: HllControlTree,
}

/// Run every analysis stage for the subroutine at `start_va`.
pub fn decompile_subroutine(
    ctx: &BinaryContext,
    start_va: u32,
) -> Result<DecompiledSubroutine> {
    if !ctx.ram.is_mapped(start_va) {
        return Err(DecompilerError::UnmappedEntrypoint(start_va).into());
    }
    if ctx.ram.read_instruction(start_va).op == InstOperation::Invalid {
        return Err(DecompilerError::EmptySubroutine(start_va).into());
    }

    log::debug!("analyzing subroutine at {:#010x}", start_va);

    let mut graph = build_graph(ctx.ram.as_ref(), start_va);
    log::debug!(
        "graph: {} block(s), {} loop(s), {} direct call(s)",
        graph.len(),
        graph.loops.len(),
        graph.direct_calls.len()
    );

    run_liveness_analysis(&mut graph, ctx);

    let mut stack = run_stack_analysis(&graph);
    run_perilogue_analysis(&mut graph, &mut stack, ctx);
    log::debug!(
        "stack: size {}, {} local(s), {} param slot(s)",
        stack.stack_size(),
        stack.locals().len(),
        stack.params().len()
    );

    // The argument registers live into the entry block are the parameters
    let entry_input = graph.block(graph.root).lifetimes().input;
    let mut subroutine = Subroutine {
        start_va,
        gpr_params: entry_input & GPR_PARAMETERS,
        fpr_params: FprSet::empty(),
        graph,
        stack,
    };

    let routine = translate_subroutine(&subroutine, ctx);

    // FPR liveness only exists inside the translator; read the result back
    // from its parameter table
    for bind in routine.fpr_binds.temps() {
        if bind.is_param && FPR_PARAMETERS.contains(bind.reg) {
            subroutine.fpr_params.insert(bind.reg);
        }
    }

    let mut structurizer = SemanticPreservingStructurizer;
    let tree = run_control_flow_analysis(&mut structurizer, &routine);
    log::debug!("structured {:#010x}: {} node(s)", start_va, tree.len());

    Ok(DecompiledSubroutine {
        subroutine,
        routine,
        tree,
    })
}
