// Integration tests for bind tracking and IR lowering.

mod utils;

use gcdecomp_core::decompiler::analysis::control_flow::build_graph;
use gcdecomp_core::decompiler::analysis::data_flow::run_liveness_analysis;
use gcdecomp_core::decompiler::analysis::perilogue::run_perilogue_analysis;
use gcdecomp_core::decompiler::analysis::stack::run_stack_analysis;
use gcdecomp_core::decompiler::analysis::Subroutine;
use gcdecomp_core::decompiler::context::BinaryContext;
use gcdecomp_core::decompiler::datasource::{FprSet, Gpr, GPR_PARAMETERS};
use gcdecomp_core::decompiler::ir::{
    translate_subroutine, CounterCheck, IrOpcode, IrRoutine, OpVar, TempVar, INVALID_TEMP,
};

fn analyze(ctx: &BinaryContext, start: u32) -> (Subroutine, IrRoutine) {
    let mut graph = build_graph(ctx.ram.as_ref(), start);
    run_liveness_analysis(&mut graph, ctx);
    let mut stack = run_stack_analysis(&graph);
    run_perilogue_analysis(&mut graph, &mut stack, ctx);

    let entry_input = graph.block(graph.root).lifetimes().input;
    let subroutine = Subroutine {
        start_va: start,
        gpr_params: entry_input & GPR_PARAMETERS,
        fpr_params: FprSet::empty(),
        graph,
        stack,
    };
    let routine = translate_subroutine(&subroutine, ctx);
    (subroutine, routine)
}

fn temp_of(op: &OpVar) -> u32 {
    match op {
        OpVar::Temp(TempVar::Integral { temp, .. }) => *temp,
        OpVar::Temp(TempVar::Floating { temp, .. }) => *temp,
        OpVar::Temp(TempVar::Condition(cond)) => cond.temp,
        other => panic!("expected a temp operand, got {:?}", other),
    }
}

#[test]
fn test_leaf_add_lowering() {
    // add r3, r3, r4; blr
    let ctx = utils::context(0, &[utils::add(3, 3, 4), utils::blr()]);
    let (_, routine) = analyze(&ctx, 0);

    // One bind per argument register, with the right roles
    let r3 = routine
        .gpr_binds
        .temps()
        .iter()
        .find(|b| b.reg == Gpr(3))
        .expect("r3 bind");
    let r4 = routine
        .gpr_binds
        .temps()
        .iter()
        .find(|b| b.reg == Gpr(4))
        .expect("r4 bind");
    assert!(r3.is_param && r3.is_ret);
    assert!(r4.is_param && !r4.is_ret);
    assert_eq!(r3.regions, vec![(0, 8)]);
    assert_eq!(r4.regions, vec![(0, 4)]);

    // [Add t_r3, t_r3, t_r4; Return]
    let entry = routine.block_vertex[0];
    let block = routine.graph.vertex(entry).data();
    assert_eq!(block.instructions.len(), 2);
    let add = &block.instructions[0];
    assert_eq!(add.opcode, IrOpcode::Add);
    assert_eq!(temp_of(&add.operands[0]), r3.id);
    assert_eq!(temp_of(&add.operands[1]), r3.id);
    assert_eq!(temp_of(&add.operands[2]), r4.id);
    assert_eq!(block.instructions[1].opcode, IrOpcode::Return);

    // Ordered parameter table: r3 then r4
    assert_eq!(routine.int_params[0], r3.id);
    assert_eq!(routine.int_params[1], r4.id);
    assert_eq!(routine.num_int_params, 2);
    assert_eq!(routine.int_params[2], INVALID_TEMP);
}

#[test]
fn test_bind_regions_are_disjoint() {
    let ctx = utils::context(
        0,
        &[
            utils::cmpwi(0, 3, 0),
            utils::beq(0xc),
            utils::li(3, 1),
            utils::b(0x8),
            utils::li(3, 2),
            utils::blr(),
        ],
    );
    let (_, routine) = analyze(&ctx, 0);

    // For each register, every pair of ranges across all temps is disjoint
    let mut by_reg: std::collections::HashMap<Gpr, Vec<(u32, u32)>> =
        std::collections::HashMap::new();
    for bind in routine.gpr_binds.temps() {
        by_reg.entry(bind.reg).or_default().extend(&bind.regions);
    }
    for (reg, mut ranges) in by_reg {
        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0,
                "overlapping bind ranges {:?} for {:?}",
                pair,
                reg
            );
        }
    }

    // The range query resolves each region back to its temp
    for bind in routine.gpr_binds.temps() {
        for &(lo, _) in &bind.regions {
            let found = routine.gpr_binds.query_temp(lo, bind.reg).expect("range");
            assert_eq!(found.id, bind.id);
        }
    }
}

#[test]
fn test_if_else_condition_terminator() {
    let ctx = utils::context(
        0,
        &[
            utils::cmpwi(0, 3, 0),
            utils::beq(0xc),
            utils::li(3, 1),
            utils::b(0x8),
            utils::li(3, 2),
            utils::blr(),
        ],
    );
    let (sub, routine) = analyze(&ctx, 0);

    let head = routine.graph.vertex(routine.block_vertex[0]).data();
    // The compare lowers to Cmp; the bc lowers to the block terminator
    assert!(head.instructions.iter().any(|i| i.opcode == IrOpcode::Cmp));
    let cond = head.cond.expect("conditional terminator");
    assert_eq!(cond.bits, 0b0100, "beq tests the eq bit");
    assert!(!head.invert_cond);
    assert_eq!(head.counter_check, CounterCheck::Ignore);

    // Both assignment arms are Movs of immediates
    for id in 1..sub.graph.len() as u32 {
        let block = routine.graph.vertex(routine.block_vertex[id as usize]).data();
        for inst in &block.instructions {
            if inst.opcode == IrOpcode::Mov {
                assert!(matches!(inst.operands[1], OpVar::Imm(imm) if imm.signed));
            }
        }
    }
}

#[test]
fn test_counted_loop_counter_check() {
    let ctx = utils::context(
        0,
        &[
            utils::li(3, 0),
            utils::li(0, 10),
            utils::mtctr(0),
            utils::addi(3, 3, 1),
            utils::bdnz(-4),
            utils::blr(),
        ],
    );
    let (sub, routine) = analyze(&ctx, 0);

    let header = sub.graph.loops[0].header;
    let body = routine.graph.vertex(routine.block_vertex[header as usize]).data();
    assert_eq!(body.counter_check, CounterCheck::NotZero);
    assert!(body.cond.is_none());
}

#[test]
fn test_call_lowering() {
    let mut words = vec![utils::bl(0x38), utils::blr()];
    words.resize(0x40 / 4, utils::blr());
    let ctx = utils::context(0, &words);
    let (_, routine) = analyze(&ctx, 0);

    let entry = routine.graph.vertex(routine.block_vertex[0]).data();
    let call = entry
        .instructions
        .iter()
        .find(|i| i.opcode == IrOpcode::Call)
        .expect("call");
    assert!(matches!(call.operands[0], OpVar::Func(f) if f.va == 0x38));
}

#[test]
fn test_frame_setup_is_suppressed() {
    // Scenario E prologue/epilogue lowers to nothing but the Return
    let ctx = utils::context(
        0,
        &[
            utils::mflr(0),
            utils::stw(0, 4, 1),
            utils::stwu(1, -32, 1),
            utils::stw(31, 28, 1),
            utils::lwz(31, 28, 1),
            utils::addi(1, 1, 32),
            utils::lwz(0, 4, 1),
            utils::mtlr(0),
            utils::blr(),
        ],
    );
    let (_, routine) = analyze(&ctx, 0);

    let entry = routine.graph.vertex(routine.block_vertex[0]).data();
    assert_eq!(entry.instructions.len(), 1);
    assert_eq!(entry.instructions[0].opcode, IrOpcode::Return);
}

#[test]
fn test_stack_slot_operands() {
    //  stwu r1, -16(r1); stw r3, 8(r1); lwz r3, 8(r1); addi r1, r1, 16; blr
    let ctx = utils::context(
        0,
        &[
            utils::stwu(1, -16, 1),
            utils::stw(3, 8, 1),
            utils::lwz(3, 8, 1),
            utils::addi(1, 1, 16),
            utils::blr(),
        ],
    );
    let (_, routine) = analyze(&ctx, 0);

    let entry = routine.graph.vertex(routine.block_vertex[0]).data();
    let store = entry
        .instructions
        .iter()
        .find(|i| i.opcode == IrOpcode::Store)
        .expect("store");
    assert!(matches!(
        store.operands[0],
        OpVar::Stack(s) if s.offset == 8 && !s.addrof
    ));
    let load = entry
        .instructions
        .iter()
        .find(|i| i.opcode == IrOpcode::Load)
        .expect("load");
    assert!(matches!(
        load.operands[1],
        OpVar::Stack(s) if s.offset == 8 && !s.addrof
    ));
}

#[test]
fn test_updating_load_emits_base_update() {
    // lwzu r5, 4(r4); add r3, r5, r4; blr
    let ctx = utils::context(
        0,
        &[utils::lwzu(5, 4, 4), add_regs(3, 5, 4), utils::blr()],
    );
    let (_, routine) = analyze(&ctx, 0);

    let entry = routine.graph.vertex(routine.block_vertex[0]).data();
    let ops: Vec<IrOpcode> = entry.instructions.iter().map(|i| i.opcode).collect();
    // Load, then the base register update, then the add and return
    assert_eq!(
        ops,
        vec![IrOpcode::Load, IrOpcode::Add, IrOpcode::Add, IrOpcode::Return]
    );
}

fn add_regs(rd: u32, ra: u32, rb: u32) -> u32 {
    utils::add(rd, ra, rb)
}
