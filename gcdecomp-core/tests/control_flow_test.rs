// Integration tests for CFG construction, block splitting, and loops.

mod utils;

use gcdecomp_core::decompiler::analysis::control_flow::{
    build_graph, IncomingEdgeKind, OutgoingEdgeKind,
};

#[test]
fn test_single_block_leaf() {
    // add r3, r3, r4; blr
    let image = utils::image(0, &[utils::add(3, 3, 4), utils::blr()]);
    let graph = build_graph(&image, 0);

    assert_eq!(graph.len(), 1);
    let block = graph.block(graph.root);
    assert_eq!((block.start_va, block.end_va), (0, 8));
    assert_eq!(block.instructions.len(), 2);
    assert!(block.outgoing.is_empty());
    assert_eq!(graph.exits, vec![0]);
    assert!(graph.loops.is_empty());
}

#[test]
fn test_if_else_diamond() {
    //  0x00 cmpwi r3, 0
    //  0x04 beq .L2
    //  0x08 li r3, 1
    //  0x0c b .L3
    //  0x10 .L2: li r3, 2
    //  0x14 .L3: blr
    let image = utils::image(
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
    let graph = build_graph(&image, 0);

    assert_eq!(graph.len(), 4);
    assert!(graph.loops.is_empty());

    let head = graph.block(graph.root);
    assert_eq!((head.start_va, head.end_va), (0, 8));
    assert_eq!(head.outgoing.len(), 2);
    assert_eq!(head.outgoing[0].0, OutgoingEdgeKind::ConditionTrue);
    assert_eq!(head.outgoing[1].0, OutgoingEdgeKind::ConditionFalse);

    let taken = graph.block(head.outgoing[0].1);
    let fallthrough = graph.block(head.outgoing[1].1);
    assert_eq!(taken.start_va, 0x10);
    assert_eq!(fallthrough.start_va, 0x08);

    // Both arms rejoin at the exit block
    let join_a = taken.outgoing[0].1;
    let join_b = fallthrough.outgoing[0].1;
    assert_eq!(join_a, join_b);
    let join = graph.block(join_a);
    assert_eq!(join.start_va, 0x14);
    assert!(graph.is_exit_block(join.id));
    assert_eq!(join.incoming.len(), 2);
}

#[test]
fn test_construction_is_deterministic() {
    let words = [
        utils::cmpwi(0, 3, 0),
        utils::beq(0xc),
        utils::li(3, 1),
        utils::b(0x8),
        utils::li(3, 2),
        utils::blr(),
    ];
    let image = utils::image(0x8000_0000, &words);

    let a = build_graph(&image, 0x8000_0000);
    let b = build_graph(&image, 0x8000_0000);
    assert_eq!(a.len(), b.len());
    for (lhs, rhs) in a.blocks().zip(b.blocks()) {
        assert_eq!(lhs.id, rhs.id);
        assert_eq!(lhs.start_va, rhs.start_va);
        assert_eq!(lhs.end_va, rhs.end_va);
        assert_eq!(lhs.outgoing.as_slice(), rhs.outgoing.as_slice());
    }
}

#[test]
fn test_branch_into_block_splits_it() {
    //  0x00 li r3, 0
    //  0x04 add r3, r3, r4   <- loop target lands mid-block
    //  0x08 cmpwi r3, 10
    //  0x0c blt .L(-8)
    //  0x10 blr
    let image = utils::image(
        0,
        &[
            utils::li(3, 0),
            utils::add(3, 3, 4),
            utils::cmpwi(0, 3, 10),
            utils::bc(12, 0, -8),
            utils::blr(),
        ],
    );
    let graph = build_graph(&image, 0);

    // The upper half keeps id 0, the lower half got a fresh id
    let upper = graph.block(0);
    assert_eq!((upper.start_va, upper.end_va), (0, 4));
    assert_eq!(upper.outgoing.len(), 1);
    assert_eq!(upper.outgoing[0].0, OutgoingEdgeKind::Fallthrough);

    let lower = graph.block(upper.outgoing[0].1);
    assert_eq!((lower.start_va, lower.end_va), (4, 0x10));
    // The conditional branch lives in the lower half and loops back to it
    assert!(lower
        .outgoing
        .iter()
        .any(|(kind, target)| *kind == OutgoingEdgeKind::ConditionTrue && *target == lower.id));

    // Range index resolves interior addresses to the right halves
    assert_eq!(graph.block_by_vaddr(0x0).unwrap().id, upper.id);
    assert_eq!(graph.block_by_vaddr(0x8).unwrap().id, lower.id);

    // The self edge is a back edge of a single-block loop
    assert_eq!(graph.loops.len(), 1);
    let lp = graph.loops.first().unwrap();
    assert_eq!(lp.header, lower.id);
    assert_eq!(lp.blocks().collect::<Vec<_>>(), vec![lower.id]);
    assert_eq!(lp.exits.len(), 1);
    assert!(lower
        .incoming
        .iter()
        .any(|(kind, src)| *kind == IncomingEdgeKind::Back && *src == lower.id));
}

#[test]
fn test_counted_loop() {
    //  0x00 li r3, 0
    //  0x04 li r0, 10
    //  0x08 mtctr r0
    //  0x0c .body: addi r3, r3, 1
    //  0x10 bdnz .body
    //  0x14 blr
    let image = utils::image(
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
    let graph = build_graph(&image, 0);

    assert_eq!(graph.loops.len(), 1);
    let lp = graph.loops.first().unwrap();
    let header = graph.block(lp.header);
    assert_eq!(header.start_va, 0x0c);
    // The loop is exactly its body block
    assert_eq!(lp.blocks().collect::<Vec<_>>(), vec![lp.header]);
    // The only exit leads to the epilogue
    assert_eq!(lp.exits.len(), 1);
    assert_eq!(graph.block(lp.exits[0]).start_va, 0x14);
}

#[test]
fn test_direct_calls_do_not_break_blocks() {
    //  0x00 bl +0x100
    //  0x04 add r3, r3, r4
    //  0x08 blr
    let mut words = vec![utils::bl(0x100), utils::add(3, 3, 4), utils::blr()];
    // Pad so the call target is mapped
    words.resize(0x104 / 4 + 1, utils::blr());
    let image = utils::image(0, &words);
    let graph = build_graph(&image, 0);

    assert_eq!(graph.len(), 1);
    assert_eq!(graph.block(0).instructions.len(), 3);
    assert_eq!(graph.direct_calls, vec![0x100]);
}

#[test]
fn test_unmapped_branch_is_silent_exit() {
    // b to an address far outside the image: edge omitted, block exits
    let image = utils::image(0, &[utils::b(0x7_0000)]);
    let graph = build_graph(&image, 0);

    assert_eq!(graph.len(), 1);
    let block = graph.block(0);
    assert!(block.outgoing.is_empty());
    assert!(graph.is_exit_block(0));
}

#[test]
fn test_unreachable_code_ignored() {
    // The li after blr is never discovered
    let image = utils::image(0, &[utils::blr(), utils::li(3, 1)]);
    let graph = build_graph(&image, 0);

    assert_eq!(graph.len(), 1);
    assert_eq!(graph.block(0).end_va, 4);
}

#[test]
fn test_forward_in_edges_mirror_out_edges() {
    let image = utils::image(
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
    let graph = build_graph(&image, 0);

    for block in graph.blocks() {
        for (_, target) in &block.outgoing {
            assert!(
                graph
                    .block(*target)
                    .incoming
                    .iter()
                    .any(|(_, src)| *src == block.id),
                "missing in-edge {} -> {}",
                block.id,
                target
            );
        }
    }
}
