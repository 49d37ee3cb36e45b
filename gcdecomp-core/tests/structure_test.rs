// Integration tests for the control-flow structurizer.

mod utils;

use gcdecomp_core::decompiler::pipeline::decompile_subroutine;
use gcdecomp_core::decompiler::structure::{Acn, HllControlTree};

fn seq_items(tree: &HllControlTree) -> Vec<&Acn> {
    match tree.node(tree.root) {
        Acn::Seq(items) => items.iter().map(|&id| tree.node(id)).collect(),
        other => panic!("root is not a sequence: {:?}", other),
    }
}

#[test]
fn test_leaf_becomes_seq_of_basic() {
    let ctx = utils::context(0, &[utils::add(3, 3, 4), utils::blr()]);
    let result = decompile_subroutine(&ctx, 0).unwrap();

    let items = seq_items(&result.tree);
    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Acn::Basic(_)));
}

#[test]
fn test_if_else_structure() {
    //  cmpwi; beq .L2; li r3,1; b .L3; .L2: li r3,2; .L3: blr
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
    let result = decompile_subroutine(&ctx, 0).unwrap();
    let tree = &result.tree;

    let items = seq_items(tree);
    assert_eq!(items.len(), 2);
    let Acn::IfElse {
        head,
        then,
        otherwise,
    } = items[0]
    else {
        panic!("expected if-else, got {:?}", items[0]);
    };
    assert!(matches!(tree.node(*head), Acn::Basic(_)));

    // The taken arm wraps the block at 0x10, the fallthrough the one at 0x8
    let then_block = match tree.node(*then) {
        Acn::Basic(v) => *v,
        other => panic!("then arm not basic: {:?}", other),
    };
    let else_block = match tree.node(*otherwise) {
        Acn::Basic(v) => *v,
        other => panic!("else arm not basic: {:?}", other),
    };
    assert_ne!(then_block, else_block);

    // Trailing exit block
    assert!(matches!(items[1], Acn::Basic(_)));
}

#[test]
fn test_triangle_if() {
    //  cmpwi; beq .L (skip the store); stw r3, 8(r1); .L: blr
    let ctx = utils::context(
        0,
        &[
            utils::cmpwi(0, 3, 0),
            utils::beq(0x8),
            utils::stw(3, 8, 1),
            utils::blr(),
        ],
    );
    let result = decompile_subroutine(&ctx, 0).unwrap();
    let tree = &result.tree;

    let items = seq_items(tree);
    assert_eq!(items.len(), 2);
    let Acn::If {
        head,
        then,
        invert_cond,
    } = items[0]
    else {
        panic!("expected if, got {:?}", items[0]);
    };
    assert!(matches!(tree.node(*head), Acn::Basic(_)));
    assert!(matches!(tree.node(*then), Acn::Basic(_)));
    // The then-arm runs when the beq is NOT taken
    assert!(*invert_cond);
}

#[test]
fn test_self_loop_do_while() {
    // Counted loop: body tests its own terminator
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
    let result = decompile_subroutine(&ctx, 0).unwrap();
    let tree = &result.tree;

    let items = seq_items(tree);
    assert_eq!(items.len(), 3);
    assert!(matches!(items[0], Acn::Basic(_)));
    let Acn::DoWhile { body, cond } = items[1] else {
        panic!("expected do-while, got {:?}", items[1]);
    };
    assert_eq!(body, cond, "a single-block loop is its own condition");
    assert!(matches!(items[2], Acn::Basic(_)));
}

#[test]
fn test_two_block_while_loop() {
    //  0x00 li r3, 0
    //  0x04 .head: cmpwi r3, 10
    //  0x08 bge .exit
    //  0x0c addi r3, r3, 1
    //  0x10 b .head
    //  0x14 .exit: blr
    let ctx = utils::context(
        0,
        &[
            utils::li(3, 0),
            utils::cmpwi(0, 3, 10),
            utils::bge(0xc),
            utils::addi(3, 3, 1),
            utils::b(-0xc),
            utils::blr(),
        ],
    );
    let result = decompile_subroutine(&ctx, 0).unwrap();
    let tree = &result.tree;

    let items = seq_items(tree);
    assert_eq!(items.len(), 3);
    let Acn::While { cond, body } = items[1] else {
        panic!("expected while, got {:?}", items[1]);
    };
    assert!(matches!(tree.node(*cond), Acn::Basic(_)));
    assert!(matches!(tree.node(*body), Acn::Basic(_)));
}

#[test]
fn test_infinite_loop_is_self_loop() {
    //  .spin: b .spin
    let ctx = utils::context(0, &[utils::b(0)]);
    let result = decompile_subroutine(&ctx, 0).unwrap();
    let tree = &result.tree;

    let items = seq_items(tree);
    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Acn::SelfLoop(_)));
}

#[test]
fn test_nested_if_in_loop() {
    //  0x00 li r3, 0
    //  0x04 .head: cmpwi r3, 10
    //  0x08 bge .exit (0x20)
    //  0x0c cmpwi cr0, r4, 0
    //  0x10 beq .skip (0x18)
    //  0x14 addi r3, r3, 1
    //  0x18 .skip: addi r3, r3, 1
    //  0x1c b .head
    //  0x20 .exit: blr
    let ctx = utils::context(
        0,
        &[
            utils::li(3, 0),
            utils::cmpwi(0, 3, 10),
            utils::bge(0x18),
            utils::cmpwi(0, 4, 0),
            utils::beq(0x8),
            utils::addi(3, 3, 1),
            utils::addi(3, 3, 1),
            utils::b(-0x18),
            utils::blr(),
        ],
    );
    let result = decompile_subroutine(&ctx, 0).unwrap();
    let tree = &result.tree;

    // The routine still reduces to a single well-formed sequence with a
    // while whose body contains the triangle
    let items = seq_items(tree);
    assert_eq!(items.len(), 3);
    let Acn::While { body, .. } = items[1] else {
        panic!("expected while, got {:?}", items[1]);
    };
    fn contains_if(tree: &HllControlTree, id: usize) -> bool {
        match tree.node(id) {
            Acn::If { .. } => true,
            Acn::Seq(items) => items.iter().any(|&i| contains_if(tree, i)),
            _ => false,
        }
    }
    assert!(contains_if(tree, *body));
}

#[test]
fn test_unmapped_entrypoint_is_an_error() {
    let ctx = utils::context(0, &[utils::blr()]);
    assert!(decompile_subroutine(&ctx, 0x1000).is_err());
}
