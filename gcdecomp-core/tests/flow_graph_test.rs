// Tests for the generic flow graph substrate and dominator computation.

use gcdecomp_core::decompiler::flow_graph::{
    dominates, BlockTransfer, Direction, FlowGraph,
};

/// root -> a -> {b, c} -> d -> terminal
fn diamond() -> (FlowGraph<&'static str>, [usize; 4]) {
    let mut graph = FlowGraph::new();
    let a = graph.add_vertex("a");
    let b = graph.add_vertex("b");
    let c = graph.add_vertex("c");
    let d = graph.add_vertex("d");

    graph.link(graph.root(), a, BlockTransfer::Unconditional);
    graph.link(a, b, BlockTransfer::ConditionTrue);
    graph.link(a, c, BlockTransfer::ConditionFalse);
    graph.link(b, d, BlockTransfer::Unconditional);
    graph.link(c, d, BlockTransfer::Unconditional);
    graph.link(d, graph.terminal(), BlockTransfer::Unconditional);

    (graph, [a, b, c, d])
}

#[test]
fn test_preorder_follows_insertion_order() {
    let (graph, [a, b, c, d]) = diamond();
    let order = graph.preorder(Direction::Forward, graph.root());
    assert_eq!(order, vec![graph.root(), a, b, d, graph.terminal(), c]);
}

#[test]
fn test_postorder_children_first() {
    let (graph, [a, b, c, d]) = diamond();
    let order = graph.postorder(Direction::Forward, graph.root());

    let pos = |v: usize| order.iter().position(|&x| x == v).unwrap();
    assert!(pos(d) < pos(b));
    assert!(pos(b) < pos(a));
    assert!(pos(c) < pos(a));
    assert!(pos(a) < pos(graph.root()));
    assert_eq!(order.last(), Some(&graph.root()));
}

#[test]
fn test_diamond_dominators() {
    let (graph, [a, b, c, d]) = diamond();
    let dom = graph.dominator_tree();

    assert_eq!(dom[graph.root()], graph.root());
    assert_eq!(dom[a], graph.root());
    assert_eq!(dom[b], a);
    assert_eq!(dom[c], a);
    // Neither branch dominates the join
    assert_eq!(dom[d], a);

    assert!(dominates(&dom, a, d));
    assert!(dominates(&dom, graph.root(), d));
    assert!(!dominates(&dom, b, d));
}

#[test]
fn test_diamond_post_dominators() {
    let (graph, [a, b, c, d]) = diamond();
    let pdom = graph.post_dominator_tree();

    assert_eq!(pdom[graph.terminal()], graph.terminal());
    assert_eq!(pdom[d], graph.terminal());
    assert_eq!(pdom[b], d);
    assert_eq!(pdom[c], d);
    assert_eq!(pdom[a], d);
}

#[test]
fn test_dominates_antisymmetry() {
    let (graph, [a, b, _, d]) = diamond();
    let dom = graph.dominator_tree();

    for &n in &[a, b, d] {
        for &m in &[a, b, d] {
            if dominates(&dom, n, m) && dominates(&dom, m, n) {
                assert_eq!(n, m);
            }
        }
    }
}

#[test]
fn test_loop_dominators() {
    // root -> h <-> t, h -> e -> terminal
    let mut graph = FlowGraph::new();
    let h = graph.add_vertex("h");
    let t = graph.add_vertex("t");
    let e = graph.add_vertex("e");
    graph.link(graph.root(), h, BlockTransfer::Unconditional);
    graph.link(h, t, BlockTransfer::ConditionTrue);
    graph.link(h, e, BlockTransfer::ConditionFalse);
    graph.link(t, h, BlockTransfer::Unconditional);
    graph.link(e, graph.terminal(), BlockTransfer::Unconditional);

    let dom = graph.dominator_tree();
    assert_eq!(dom[t], h);
    assert_eq!(dom[e], h);
    // The back edge target dominates its source
    assert!(dominates(&dom, h, t));
    assert!(!dominates(&dom, t, h));
}

#[test]
fn test_unreachable_vertices_have_no_idom() {
    let mut graph = FlowGraph::new();
    let a = graph.add_vertex("a");
    let orphan = graph.add_vertex("orphan");
    graph.link(graph.root(), a, BlockTransfer::Unconditional);
    graph.link(a, graph.terminal(), BlockTransfer::Unconditional);

    let dom = graph.dominator_tree();
    assert_eq!(dom[a], graph.root());
    assert!(!dominates(&dom, graph.root(), orphan));
}

#[test]
fn test_insert_after_preserves_structure() {
    let (mut graph, [a, b, _, _]) = diamond();
    let n = graph.insert_after(a, "n", BlockTransfer::Unconditional);

    // a now flows only through n, which inherited both branch edges
    assert_eq!(graph.vertex(a).outgoing.len(), 1);
    assert_eq!(graph.vertex(a).outgoing[0].target, n);
    assert_eq!(graph.vertex(n).outgoing.len(), 2);
    assert!(graph.vertex(b).incoming.iter().any(|e| e.target == n));

    let dom = graph.dominator_tree();
    assert_eq!(dom[n], a);
    assert_eq!(dom[b], n);
}

#[test]
fn test_exit_vertex_and_entry() {
    let (graph, [a, _, _, d]) = diamond();
    assert_eq!(graph.entry(), Some(a));
    assert!(graph.is_exit_vertex(d));
    assert!(!graph.is_exit_vertex(a));
}
