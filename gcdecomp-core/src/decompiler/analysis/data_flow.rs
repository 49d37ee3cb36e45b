//! Register Liveness Analysis
//!
//! Computes per-instruction live-in/live-out sets and whole-block summaries
//! with a guess-then-confirm scheme rather than a fully pessimistic initial
//! estimate:
//!
//! 1. *Local pass* (forward DFS order): per-instruction `use`/`def` sets,
//!    accumulating the block `input`, `overwrite` and candidate `guess_out`
//!    summaries, then threading `input` through the per-instruction sets.
//! 2. *Forward guess propagation* to a fixed point: registers flowing
//!    untouched through a block surface in its `propagated` set.
//! 3. *Backward output confirmation* to a fixed point: successor inputs
//!    confirm guesses into `output`; confirmed pass-throughs also widen the
//!    block's `input` and every instruction's live range.
//! 4. *Unused-range clearing*: guesses that were never confirmed are swept
//!    back out of the per-instruction sets.
//!
//! Both fixpoints are monotone over a finite lattice, so they converge; the
//! result is independent of visitation order.
//!
//! The engine is generic over the register file through [`LivenessModel`].
//! The GPR instance fills [`BasicBlock::liveness`]; the FPR and CR-field
//! instances are computed on demand by the IR translator.

use crate::decompiler::analysis::control_flow::SubroutineGraph;
use crate::decompiler::context::BinaryContext;
use crate::decompiler::datasource::{
    CrField, CrFieldSet, DataSource, Fpr, FprSet, Gpr, GprSet, InstSideFx, RegSet, Register,
    CALLER_SAVED_FPRS, CALLER_SAVED_GPRS, FPR_RETURN, GPR_RETURN, VOLATILE_CR_FIELDS,
};
use crate::decompiler::decoder::{InstOperation, MetaInst};

/// Per-block liveness facts over one register file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterLifetimes<R: Register> {
    // Per-instruction register liveness
    pub def: Vec<RegSet<R>>,
    pub uses: Vec<RegSet<R>>,
    pub live_in: Vec<RegSet<R>>,
    pub live_out: Vec<RegSet<R>>,

    // Liveness summary for the whole block
    pub input: RegSet<R>,
    pub output: RegSet<R>,
    pub overwrite: RegSet<R>,

    // Working sets used only during fixed-point iteration
    pub guess_out: RegSet<R>,
    pub propagated: RegSet<R>,
}

impl<R: Register> Default for RegisterLifetimes<R> {
    fn default() -> Self {
        RegisterLifetimes {
            def: Vec::new(),
            uses: Vec::new(),
            live_in: Vec::new(),
            live_out: Vec::new(),
            input: RegSet::empty(),
            output: RegSet::empty(),
            overwrite: RegSet::empty(),
            guess_out: RegSet::empty(),
            propagated: RegSet::empty(),
        }
    }
}

/// Register-file-specific extraction of liveness effects.
pub trait LivenessModel {
    type Reg: Register;

    /// `(use, def)` sets of a non-call instruction.
    fn uses_defs(inst: &MetaInst) -> (RegSet<Self::Reg>, RegSet<Self::Reg>);

    /// Registers a call clobbers with unknown values.
    fn call_kill() -> RegSet<Self::Reg>;

    /// Registers a call defines on return.
    fn call_def() -> RegSet<Self::Reg>;

    /// Registers carrying this subroutine's own return value at its exits.
    fn return_set() -> RegSet<Self::Reg>;
}

/// GPR model: the one stored on basic blocks.
pub struct GprModel;

impl LivenessModel for GprModel {
    type Reg = Gpr;

    fn uses_defs(inst: &MetaInst) -> (GprSet, GprSet) {
        let mut uses = GprSet::empty();
        let mut def = GprSet::empty();

        for read in &inst.reads {
            match read {
                DataSource::Gpr(slice) => uses.insert(slice.reg),
                DataSource::MemRegOff(mem) => uses.insert(mem.base),
                DataSource::MemRegReg(mem) => {
                    uses.insert(mem.base);
                    uses.insert(mem.index);
                }
                DataSource::MultiReg(multi) => uses |= GprSet::range_from(multi.low),
                _ => {}
            }
        }
        match &inst.write {
            Some(DataSource::Gpr(slice)) => def.insert(slice.reg),
            Some(DataSource::MemRegOff(mem)) => uses.insert(mem.base),
            Some(DataSource::MemRegReg(mem)) => {
                uses.insert(mem.base);
                uses.insert(mem.index);
            }
            Some(DataSource::MultiReg(multi)) => def |= GprSet::range_from(multi.low),
            _ => {}
        }
        // An updating write does not count as a define
        def -= uses;
        (uses, def)
    }

    fn call_kill() -> GprSet {
        CALLER_SAVED_GPRS
    }

    fn call_def() -> GprSet {
        GPR_RETURN
    }

    fn return_set() -> GprSet {
        GPR_RETURN
    }
}

/// FPR model, used by the IR translator for float binds.
pub struct FprModel;

impl LivenessModel for FprModel {
    type Reg = Fpr;

    fn uses_defs(inst: &MetaInst) -> (FprSet, FprSet) {
        let mut uses = FprSet::empty();
        let mut def = FprSet::empty();

        for read in &inst.reads {
            if let DataSource::Fpr(slice) = read {
                uses.insert(slice.reg);
            }
        }
        if let Some(DataSource::Fpr(slice)) = &inst.write {
            def.insert(slice.reg);
        }
        def -= uses;
        (uses, def)
    }

    fn call_kill() -> FprSet {
        CALLER_SAVED_FPRS
    }

    fn call_def() -> FprSet {
        FPR_RETURN
    }

    fn return_set() -> FprSet {
        FPR_RETURN
    }
}

/// CR model at field granularity, used by the IR translator for condition
/// binds. Record-form side effects define cr0 (cr1 for FP record forms).
pub struct CrModel;

impl LivenessModel for CrModel {
    type Reg = CrField;

    fn uses_defs(inst: &MetaInst) -> (CrFieldSet, CrFieldSet) {
        let mut uses = CrFieldSet::empty();
        let mut def = CrFieldSet::empty();

        for read in &inst.reads {
            match read {
                DataSource::CrField(field) => uses.insert(*field),
                DataSource::CrBit(bit) => uses.insert(bit.field()),
                _ => {}
            }
        }
        match &inst.write {
            Some(DataSource::CrField(field)) => def.insert(*field),
            Some(DataSource::CrBit(bit)) => def.insert(bit.field()),
            _ => {}
        }
        if inst.side_effects.intersects(InstSideFx::WRITES_RECORD) {
            def.insert(CrField::CR0);
        }
        if inst.side_effects.intersects(InstSideFx::WRITES_FP_RECORD) {
            def.insert(CrField::CR1);
        }
        def -= uses;
        (uses, def)
    }

    fn call_kill() -> CrFieldSet {
        VOLATILE_CR_FIELDS
    }

    fn call_def() -> CrFieldSet {
        CrFieldSet::empty()
    }

    fn return_set() -> CrFieldSet {
        CrFieldSet::empty()
    }
}

/// True for the instructions that transfer to another routine and come back:
/// everything carrying the LK bit, except a `b` to a savegpr/restgpr helper
/// (those neither clobber nor define the argument registers).
fn is_call_like(inst: &MetaInst, ctx: &BinaryContext) -> bool {
    if !inst.side_effects.intersects(InstSideFx::WRITES_LR) {
        return false;
    }
    match inst.op {
        InstOperation::B => !ctx.is_abi_routine(inst.branch_target()),
        InstOperation::Bc | InstOperation::Bclr | InstOperation::Bcctr => true,
        _ => false,
    }
}

fn local_pass<M: LivenessModel>(
    graph: &SubroutineGraph,
    ctx: &BinaryContext,
    order: &[u32],
) -> Vec<RegisterLifetimes<M::Reg>> {
    let mut all: Vec<RegisterLifetimes<M::Reg>> = (0..graph.len())
        .map(|_| RegisterLifetimes::default())
        .collect();

    for &id in order {
        let block = graph.block(id);
        let lt = &mut all[id as usize];

        let mut inputs = RegSet::empty();
        let mut outputs = RegSet::empty();
        let mut def_mask = RegSet::empty();

        for inst in &block.instructions {
            // live_in: registers live coming into this instruction
            // use: register set accessed by this instruction
            // def: register set modified by this instruction
            // kill: register set clobbered with an unknown value
            let mut live_in = RegSet::empty();
            let mut uses = RegSet::empty();
            let mut def = RegSet::empty();
            let mut kill = RegSet::empty();

            if let Some(prev_out) = lt.live_out.last() {
                live_in = *prev_out;
            }

            if is_call_like(inst, ctx) {
                kill = M::call_kill();
                def = M::call_def();
            } else if inst.side_effects.intersects(InstSideFx::WRITES_LR) {
                // b to an ABI helper: transparent for liveness purposes
            } else {
                let (u, d) = M::uses_defs(inst);
                uses = u;
                def = d;
            }

            def_mask |= kill | def;
            inputs |= uses - def_mask;
            outputs = outputs - kill | def | uses;

            lt.def.push(def);
            lt.uses.push(uses);
            lt.live_in.push(live_in);
            lt.live_out.push((live_in | uses) - kill | def);
        }

        lt.input = inputs;
        lt.guess_out = outputs;
        lt.overwrite = def_mask;

        // Thread the block inputs forward through the instruction sets
        let mut input_mask = inputs;
        for i in 0..block.instructions.len() {
            if input_mask.is_empty() {
                break;
            }
            lt.live_in[i] |= input_mask;
            input_mask -= lt.uses[i];
            lt.live_out[i] |= input_mask;
        }
    }

    all
}

/// Push unconsumed guesses through blocks that neither read nor write them.
fn propagate_guesses<M: LivenessModel>(
    graph: &SubroutineGraph,
    all: &mut [RegisterLifetimes<M::Reg>],
    id: u32,
) -> bool {
    let mut passthrough = RegSet::empty();
    for (_, pred) in &graph.block(id).incoming {
        let pred_lt = &all[*pred as usize];
        passthrough |= pred_lt.guess_out | pred_lt.propagated;
    }

    let lt = &mut all[id as usize];
    // Only registers this block itself does not touch can pass through
    passthrough -= lt.overwrite | lt.input;

    if passthrough == lt.propagated {
        return false;
    }
    lt.propagated = passthrough;
    true
}

/// Confirm guessed outputs against the inputs of every successor. Exit
/// blocks fold the ABI return set in as a pseudo-successor, which is what
/// keeps a return value live through the epilogue.
fn backpropagate_outputs<M: LivenessModel>(
    graph: &SubroutineGraph,
    all: &mut [RegisterLifetimes<M::Reg>],
    id: u32,
) -> bool {
    let block = graph.block(id);

    let mut outedge_inputs = RegSet::empty();
    for (_, succ) in &block.outgoing {
        outedge_inputs |= all[*succ as usize].input;
    }
    if block.outgoing.is_empty() {
        outedge_inputs |= M::return_set();
    }

    let lt = &mut all[id as usize];

    let used_out = outedge_inputs & lt.guess_out;
    if !used_out.is_empty() {
        lt.guess_out -= used_out;
        lt.output |= used_out;
    }

    let used_pt = outedge_inputs & lt.propagated;
    if !used_pt.is_empty() {
        lt.propagated -= used_pt;
        lt.output |= used_pt;
        lt.input |= used_pt;
        for i in 0..lt.live_in.len() {
            lt.live_in[i] |= used_pt;
            lt.live_out[i] |= used_pt;
        }
        return true;
    }

    false
}

/// Backward sweep clearing liveness for guesses that were never confirmed.
///
/// ```text
/// D=Def U=Use .=Neither
/// .....D.............U.........U............D......U.....
///                              |____________|
///                              unused section
/// ```
fn clear_unused_sections<M: LivenessModel>(all: &mut [RegisterLifetimes<M::Reg>], id: u32) {
    let lt = &mut all[id as usize];
    let mut unused_mask = lt.guess_out;
    for i in (0..lt.live_out.len()).rev() {
        lt.live_out[i] -= unused_mask;
        unused_mask = (unused_mask | lt.def[i]) - lt.uses[i];
        lt.live_in[i] -= unused_mask;
    }
}

/// Run the full liveness pipeline over one register file.
pub fn analyze_lifetimes<M: LivenessModel>(
    graph: &SubroutineGraph,
    ctx: &BinaryContext,
) -> Vec<RegisterLifetimes<M::Reg>> {
    let order = graph.forward_order();
    let mut all = local_pass::<M>(graph, ctx, &order);

    let mut iterations = 0usize;
    loop {
        let mut did_change = false;
        for &id in &order {
            did_change |= propagate_guesses::<M>(graph, &mut all, id);
        }
        iterations += 1;
        if !did_change {
            break;
        }
    }

    loop {
        let mut did_change = false;
        for &id in &order {
            did_change |= backpropagate_outputs::<M>(graph, &mut all, id);
        }
        iterations += 1;
        if !did_change {
            break;
        }
    }
    log::debug!("liveness converged after {} sweep(s)", iterations);

    for &id in &order {
        clear_unused_sections::<M>(&mut all, id);
    }

    all
}

/// Populate every block's GPR liveness facts.
pub fn run_liveness_analysis(graph: &mut SubroutineGraph, ctx: &BinaryContext) {
    let all = analyze_lifetimes::<GprModel>(graph, ctx);
    for (id, lt) in all.into_iter().enumerate() {
        graph.block_mut(id as u32).liveness = Some(lt);
    }
}
