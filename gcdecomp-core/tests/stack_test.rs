// Integration tests for stack recovery and perilogue classification.

mod utils;

use gcdecomp_core::decompiler::analysis::control_flow::build_graph;
use gcdecomp_core::decompiler::analysis::data_flow::run_liveness_analysis;
use gcdecomp_core::decompiler::analysis::perilogue::{run_perilogue_analysis, PerilogueTag};
use gcdecomp_core::decompiler::analysis::stack::{run_stack_analysis, ReferenceKind, TypeSet};

#[test]
fn test_stwu_sets_stack_size() {
    let ctx = utils::context(0, &[utils::stwu(1, -32, 1), utils::blr()]);
    let mut graph = build_graph(ctx.ram.as_ref(), 0);
    run_liveness_analysis(&mut graph, &ctx);
    let stack = run_stack_analysis(&graph);
    assert_eq!(stack.stack_size(), 32);
}

#[test]
fn test_no_frame_means_zero_size() {
    let ctx = utils::context(0, &[utils::add(3, 3, 4), utils::blr()]);
    let mut graph = build_graph(ctx.ram.as_ref(), 0);
    run_liveness_analysis(&mut graph, &ctx);
    let stack = run_stack_analysis(&graph);
    assert_eq!(stack.stack_size(), 0);
    assert!(stack.locals().is_empty());
    assert!(stack.params().is_empty());
}

#[test]
fn test_local_slot_accumulates_references() {
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
    let mut graph = build_graph(ctx.ram.as_ref(), 0);
    run_liveness_analysis(&mut graph, &ctx);
    let stack = run_stack_analysis(&graph);

    let var = stack.variable_for_offset(8).expect("slot at +8");
    assert!(!var.is_param);
    assert_eq!(var.types, TypeSet::WORD);
    assert_eq!(var.refs.len(), 2);
    assert_eq!(var.refs[0].kind, ReferenceKind::Write);
    assert_eq!(var.refs[1].kind, ReferenceKind::Read);
}

#[test]
fn test_parameter_slot_partition() {
    // A slot above stack_size + 4 belongs to the caller's frame
    let ctx = utils::context(
        0,
        &[
            utils::stwu(1, -32, 1),
            utils::lwz(3, 0x48, 1),
            utils::addi(1, 1, 32),
            utils::blr(),
        ],
    );
    let mut graph = build_graph(ctx.ram.as_ref(), 0);
    run_liveness_analysis(&mut graph, &ctx);
    let stack = run_stack_analysis(&graph);

    let var = stack.variable_for_offset(0x48).expect("param slot");
    assert!(var.is_param);
    assert_eq!(stack.params().len(), 1);
}

#[test]
fn test_address_of_reference() {
    // addi r4, r1, 8 takes the address of the slot at +8
    let ctx = utils::context(
        0,
        &[
            utils::stwu(1, -16, 1),
            utils::stw(3, 8, 1),
            utils::addi(4, 1, 8),
            utils::addi(1, 1, 16),
            utils::blr(),
        ],
    );
    let mut graph = build_graph(ctx.ram.as_ref(), 0);
    run_liveness_analysis(&mut graph, &ctx);
    let stack = run_stack_analysis(&graph);

    let var = stack.variable_for_offset(8).expect("slot at +8");
    assert!(var
        .refs
        .iter()
        .any(|r| r.kind == ReferenceKind::Address && r.va == 0x8));
}

#[test]
fn test_callee_save_detection() {
    // Scenario: mflr r0; stw r0, 4(r1); stwu r1, -32(r1); stw r31, 28(r1);
    // then the matching epilogue
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
    let mut graph = build_graph(ctx.ram.as_ref(), 0);
    run_liveness_analysis(&mut graph, &ctx);
    let mut stack = run_stack_analysis(&graph);
    run_perilogue_analysis(&mut graph, &mut stack, &ctx);

    let tags = &graph.block(graph.root).perilogue_tags;
    assert_eq!(
        &tags[..8],
        &[
            PerilogueTag::MoveLrToR0,
            PerilogueTag::SaveSenderLr,
            PerilogueTag::FrameAllocate,
            PerilogueTag::CalleeGprSave,
            PerilogueTag::CalleeGprRestore,
            PerilogueTag::FrameDeallocate,
            PerilogueTag::LoadSenderLr,
            PerilogueTag::MoveR0ToLr,
        ]
    );

    // The LR home and the callee-save slot hold frame state, not variables
    assert!(stack.variable_for_offset(4).unwrap().is_frame_storage);
    assert!(stack.variable_for_offset(28).unwrap().is_frame_storage);
}

#[test]
fn test_abi_helper_branch_tagging() {
    // Epilogue that restores through _restgpr: the addi r11 setup and the
    // helper branch are both perilogue
    let restgpr_words: Vec<u32> = (14..32)
        .map(|r| utils::lwz(r, -0x48 + 4 * (r as i16 - 14), 11))
        .chain(std::iter::once(utils::blr()))
        .collect();

    let mut words = vec![
        utils::stwu(1, -64, 1),
        utils::addi(11, 1, 64),
        utils::b(0x100 - 0x8),
    ];
    words.resize(0x100 / 4, 0);
    words.extend_from_slice(&restgpr_words);
    let ctx = utils::context(0, &words);
    assert!(ctx.is_abi_routine(0x100));

    let mut graph = build_graph(ctx.ram.as_ref(), 0);
    run_liveness_analysis(&mut graph, &ctx);
    let mut stack = run_stack_analysis(&graph);
    run_perilogue_analysis(&mut graph, &mut stack, &ctx);

    let tags = &graph.block(graph.root).perilogue_tags;
    assert_eq!(tags[0], PerilogueTag::FrameAllocate);
    assert_eq!(tags[1], PerilogueTag::CalleeGprSave);
    assert_eq!(tags[2], PerilogueTag::AbiRoutine);
}
