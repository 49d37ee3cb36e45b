//! Control-Flow Structuring
//!
//! Reduces the IR's flow graph to a tree of abstract control nodes using
//! semantics-preserving structural analysis with iterative refinement, after
//! "Native x86 Decompilation Using Semantics-Preserving Structural Analysis
//! and Iterative Control-Flow Structuring".
//!
//! The working graph starts with one `Basic` node per IR block. Each pass
//! walks a forward postorder and tries, in this order:
//!
//! 1. *Acyclic regions*: sequences, if/else with inverse conditions, the
//!    triangle form, and switches whose cases share one follow node.
//! 2. *Cyclic regions*: self loops, single-block do-whiles, and two-vertex
//!    while/do-while loops found through dominator back edges.
//! 3. *Refinement*: cut one in-edge of a join vertex into a `Goto`/`Tail`
//!    sink, which unblocks further reduction of irreducible shapes.
//!
//! Every reduction strictly shrinks the graph (refinement strictly removes
//! a join edge and is budgeted), so structuring always terminates; if the
//! budget runs dry the remaining regions are emitted as a `Goto`-chained
//! sequence rather than looping forever.

use crate::decompiler::flow_graph::{
    dominates, inverse_condition, BlockTransfer, Direction, EdgeData, FlowGraph, VertexId,
};
use crate::decompiler::ir::IrRoutine;

pub type AcnId = usize;

/// Abstract control node. `Basic` leaves reference vertices of the
/// [`IrRoutine`] graph; everything else composes other nodes by id.
#[derive(Debug, Clone, PartialEq)]
pub enum Acn {
    /// Leaf wrapping one IR block (by IR graph vertex id).
    Basic(VertexId),
    Seq(Vec<AcnId>),
    If {
        head: AcnId,
        then: AcnId,
        invert_cond: bool,
    },
    IfElse {
        head: AcnId,
        then: AcnId,
        otherwise: AcnId,
    },
    IfElseIf {
        arms: Vec<(AcnId, AcnId)>,
        fallthrough: Option<AcnId>,
    },
    Switch {
        head: AcnId,
        cases: Vec<(BlockTransfer, AcnId)>,
    },
    /// `body` runs, then `cond`'s terminator decides whether to repeat. A
    /// single-block loop is its own condition: `body == cond`.
    DoWhile { body: AcnId, cond: AcnId },
    While { cond: AcnId, body: AcnId },
    For {
        init: AcnId,
        cond: AcnId,
        body: AcnId,
        step: AcnId,
    },
    /// Loop with no exit edge.
    SelfLoop(AcnId),
    /// Unstructured jump to the region whose entry block has this id.
    Goto(u32),
    /// Unstructured jump out of the routine.
    Tail,
}

/// Structurizer output: an arena of nodes plus the root.
pub struct HllControlTree {
    nodes: Vec<Acn>,
    pub root: AcnId,
}

impl HllControlTree {
    pub fn node(&self, id: AcnId) -> &Acn {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Generic control flow structurizer, transforming an [`IrRoutine`] graph
/// into an abstract control tree.
pub trait ControlFlowStructurizer {
    fn structurize(&mut self, routine: &IrRoutine) -> HllControlTree;
}

/// The default structural-analysis implementation.
#[derive(Default)]
pub struct SemanticPreservingStructurizer;

pub fn run_control_flow_analysis(
    structurizer: &mut dyn ControlFlowStructurizer,
    routine: &IrRoutine,
) -> HllControlTree {
    structurizer.structurize(routine)
}

struct Reducer {
    graph: FlowGraph<AcnId>,
    nodes: Vec<Acn>,
    /// Entry label of each working vertex's region (IR vertex id).
    labels: Vec<u32>,
}

impl Reducer {
    fn alloc(&mut self, node: Acn) -> AcnId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn acn_of(&self, v: VertexId) -> AcnId {
        *self.graph.vertex(v).data()
    }

    /// Single predecessor and single successor: the only shape that can sit
    /// in the middle of a reduced region.
    fn sess(&self, v: VertexId) -> bool {
        let vert = self.graph.vertex(v);
        vert.is_real() && vert.single_pred() && vert.single_succ()
    }

    fn real_postorder(&self) -> Vec<VertexId> {
        self.graph
            .postorder(Direction::Forward, self.graph.root())
            .into_iter()
            .filter(|&v| self.graph.vertex(v).is_real())
            .collect()
    }

    /// Collapse `members` into a fresh vertex carrying `acn`. External
    /// in-edges of `entry` move to the new vertex; if `follow` is given the
    /// new vertex gains a single unconditional edge to it.
    fn reduce_region(
        &mut self,
        entry: VertexId,
        members: &[VertexId],
        acn: AcnId,
        follow: Option<VertexId>,
    ) -> VertexId {
        let new_v = self.graph.add_vertex(acn);
        self.labels.push(self.labels[entry]);

        // Move external in-edges onto the new vertex, preserving the source
        // side's edge order
        for &m in members {
            let incoming = self.graph.vertex(m).incoming.clone();
            for edge in incoming {
                if members.contains(&edge.target) {
                    continue;
                }
                let src = edge.target;
                for out in &mut self.graph.vertex_mut(src).outgoing {
                    if out.target == m {
                        out.target = new_v;
                    }
                }
                self.graph.vertex_mut(new_v).incoming.push(EdgeData {
                    target: src,
                    transfer: edge.transfer,
                });
            }
        }

        // Drop member edges: internal ones vanish, external out-edges are
        // subsumed by the follow edge
        for &m in members {
            let outgoing = std::mem::take(&mut self.graph.vertex_mut(m).outgoing);
            for edge in outgoing {
                if !members.contains(&edge.target) {
                    let target = edge.target;
                    self.graph
                        .vertex_mut(target)
                        .incoming
                        .retain(|e| !members.contains(&e.target));
                }
            }
            self.graph.vertex_mut(m).incoming.clear();
        }
        for &m in members {
            self.graph.detach(m);
        }

        if let Some(follow) = follow {
            self.graph.link(new_v, follow, BlockTransfer::Unconditional);
        }
        new_v
    }

    /// Replace `v` with a fresh vertex carrying `acn`, keeping every edge
    /// except self-edges.
    fn replace_vertex(&mut self, v: VertexId, acn: AcnId) -> VertexId {
        let new_v = self.graph.add_vertex(acn);
        self.labels.push(self.labels[v]);

        let incoming: Vec<_> = self
            .graph
            .vertex(v)
            .incoming
            .iter()
            .filter(|e| e.target != v)
            .cloned()
            .collect();
        let outgoing: Vec<_> = self
            .graph
            .vertex(v)
            .outgoing
            .iter()
            .filter(|e| e.target != v)
            .cloned()
            .collect();

        for edge in &incoming {
            let src = edge.target;
            for out in &mut self.graph.vertex_mut(src).outgoing {
                if out.target == v {
                    out.target = new_v;
                }
            }
        }
        for edge in &outgoing {
            let dst = edge.target;
            for inn in &mut self.graph.vertex_mut(dst).incoming {
                if inn.target == v {
                    inn.target = new_v;
                }
            }
        }

        self.graph.vertex_mut(new_v).incoming = incoming;
        self.graph.vertex_mut(new_v).outgoing = outgoing;
        self.graph.vertex_mut(v).incoming.clear();
        self.graph.vertex_mut(v).outgoing.clear();
        self.graph.detach(v);
        new_v
    }

    fn flatten_seq(&self, id: AcnId) -> Vec<AcnId> {
        match &self.nodes[id] {
            Acn::Seq(items) => items.clone(),
            _ => vec![id],
        }
    }

    /// One acyclic match + reduction, preferring the earliest postorder site.
    fn try_acyclic(&mut self) -> bool {
        for v in self.real_postorder() {
            if !self.graph.vertex(v).is_real() {
                continue;
            }

            // Sequence: merge with a sole successor that has no other way in
            if self.graph.vertex(v).single_succ() {
                let succ = self.graph.vertex(v).outgoing[0].target;
                let two_cycle = self
                    .graph
                    .vertex(succ)
                    .outgoing
                    .iter()
                    .any(|e| e.target == v);
                if succ != v
                    && self.graph.vertex(succ).is_real()
                    && self.graph.vertex(succ).single_pred()
                    && !two_cycle
                {
                    let mut items = self.flatten_seq(self.acn_of(v));
                    items.extend(self.flatten_seq(self.acn_of(succ)));
                    let seq = self.alloc(Acn::Seq(items));

                    let follow = self.graph.vertex(succ).outgoing.first().map(|e| e.target);
                    self.reduce_region(v, &[v, succ], seq, follow);
                    return true;
                }
            }

            let out = self.graph.vertex(v).outgoing.clone();
            if out.len() == 2 && inverse_condition(out[0].transfer, out[1].transfer) {
                let (m, n) = (out[0].target, out[1].target);
                if m == v || n == v || m == n {
                    continue;
                }

                // If-else: both arms rejoin at one follow node
                if self.sess(m) && self.sess(n) {
                    let m_follow = self.graph.vertex(m).outgoing[0].target;
                    let n_follow = self.graph.vertex(n).outgoing[0].target;
                    if m_follow == n_follow && m_follow != v {
                        let (then, otherwise) = if out[0].transfer == BlockTransfer::ConditionTrue {
                            (m, n)
                        } else {
                            (n, m)
                        };
                        let acn = self.alloc(Acn::IfElse {
                            head: self.acn_of(v),
                            then: self.acn_of(then),
                            otherwise: self.acn_of(otherwise),
                        });
                        self.reduce_region(v, &[v, m, n], acn, Some(m_follow));
                        return true;
                    }
                }

                // Triangle: one arm is the follow node itself
                if self.sess(m) && self.graph.vertex(m).outgoing[0].target == n {
                    let acn = self.alloc(Acn::If {
                        head: self.acn_of(v),
                        then: self.acn_of(m),
                        invert_cond: out[0].transfer == BlockTransfer::ConditionFalse,
                    });
                    self.reduce_region(v, &[v, m], acn, Some(n));
                    return true;
                }
                if self.sess(n) && self.graph.vertex(n).outgoing[0].target == m {
                    let acn = self.alloc(Acn::If {
                        head: self.acn_of(v),
                        then: self.acn_of(n),
                        invert_cond: out[1].transfer == BlockTransfer::ConditionFalse,
                    });
                    self.reduce_region(v, &[v, n], acn, Some(m));
                    return true;
                }

                continue;
            }

            // Switch: >= 2 cases, all rejoining at one follow node
            if out.len() >= 2 {
                let first = out[0].target;
                if !self.sess(first) {
                    continue;
                }
                let follow = self.graph.vertex(first).outgoing[0].target;
                let mut cases = vec![(out[0].transfer, self.acn_of(first))];
                let mut members = vec![v, first];
                let mut matched = true;
                for edge in &out[1..] {
                    if !self.sess(edge.target)
                        || self.graph.vertex(edge.target).outgoing[0].target != follow
                    {
                        matched = false;
                        break;
                    }
                    cases.push((edge.transfer, self.acn_of(edge.target)));
                    members.push(edge.target);
                }
                if matched && follow != v {
                    let acn = self.alloc(Acn::Switch {
                        head: self.acn_of(v),
                        cases,
                    });
                    self.reduce_region(v, &members, acn, Some(follow));
                    return true;
                }
            }
        }
        false
    }

    /// One cyclic match + reduction on dominator-identified back edges.
    fn try_cyclic(&mut self) -> bool {
        // Self loops first: a single block looping on itself
        for v in self.real_postorder() {
            if !self.graph.vertex(v).is_real() {
                continue;
            }
            let has_self_edge = self.graph.vertex(v).outgoing.iter().any(|e| e.target == v);
            if !has_self_edge {
                continue;
            }
            let has_exit = self.graph.vertex(v).outgoing.iter().any(|e| e.target != v);

            let inner = self.acn_of(v);
            let acn = if has_exit {
                // The block is both the loop body and its own exit test
                self.alloc(Acn::DoWhile {
                    body: inner,
                    cond: inner,
                })
            } else {
                self.alloc(Acn::SelfLoop(inner))
            };
            self.replace_vertex(v, acn);
            return true;
        }

        // Two-vertex loops through the dominator tree
        let dom = self.graph.dominator_tree();
        for v in self.real_postorder() {
            if !self.graph.vertex(v).is_real() {
                continue;
            }
            let back_target = self
                .graph
                .vertex(v)
                .outgoing
                .iter()
                .map(|e| e.target)
                .find(|&h| h != v && self.graph.vertex(h).is_real() && dominates(&dom, h, v));
            let Some(header) = back_target else { continue };

            // The loop body must have reduced to exactly header + tail
            let tail_edges = self.graph.vertex(v).outgoing.clone();
            let header_edges = self.graph.vertex(header).outgoing.clone();
            if !self.graph.vertex(v).single_pred()
                || self.graph.vertex(v).incoming[0].target != header
            {
                continue;
            }

            if header_edges.len() == 2 && tail_edges.len() == 1 {
                // while: the header tests, the tail loops back unconditionally
                let exit = header_edges
                    .iter()
                    .map(|e| e.target)
                    .find(|&t| t != v);
                if let Some(exit) = exit {
                    let acn = self.alloc(Acn::While {
                        cond: self.acn_of(header),
                        body: self.acn_of(v),
                    });
                    self.reduce_region(header, &[header, v], acn, Some(exit));
                    return true;
                }
            } else if header_edges.len() == 1 && tail_edges.len() == 2 {
                // do-while: the tail tests and exits
                let exit = tail_edges.iter().map(|e| e.target).find(|&t| t != header);
                if let Some(exit) = exit {
                    let acn = self.alloc(Acn::DoWhile {
                        body: self.acn_of(header),
                        cond: self.acn_of(v),
                    });
                    self.reduce_region(header, &[header, v], acn, Some(exit));
                    return true;
                }
            }
        }

        false
    }

    /// Cut one in-edge of the join vertex that blocks reduction, expressing
    /// the jump as a `Goto` (or `Tail` for exits) sink node.
    fn refine(&mut self) -> bool {
        let postorder = self.real_postorder();

        // Postorder position, for picking the latest jump deterministically
        let mut position = vec![usize::MAX; self.graph.len()];
        for (i, &v) in postorder.iter().enumerate() {
            position[v] = i;
        }

        for &v in &postorder {
            if self.graph.vertex(v).incoming.len() < 2 {
                continue;
            }

            let src = self
                .graph
                .vertex(v)
                .incoming
                .iter()
                .filter(|e| self.graph.vertex(e.target).is_real())
                .max_by_key(|e| position[e.target])
                .map(|e| (e.target, e.transfer));
            let Some((src, transfer)) = src else { continue };

            let acn = if self.graph.is_exit_vertex(v) {
                self.alloc(Acn::Tail)
            } else {
                self.alloc(Acn::Goto(self.labels[v]))
            };

            self.graph.unlink(src, v);
            let sink = self.graph.add_vertex(acn);
            self.labels.push(self.labels[v]);
            self.graph.link(src, sink, transfer);
            self.graph
                .link(sink, self.graph.terminal(), BlockTransfer::Unconditional);

            log::debug!(
                "refined join at region {:#x}: rerouted edge from region {:#x}",
                self.labels[v],
                self.labels[src]
            );
            return true;
        }

        false
    }

    /// Refinement budget exhausted: emit what is left as a sequence chained
    /// by explicit gotos.
    fn fallback_sequence(&mut self) -> AcnId {
        let mut items = Vec::new();
        for &v in self.real_postorder().iter().rev() {
            items.push(self.acn_of(v));
            let jumps: Vec<Acn> = self
                .graph
                .vertex(v)
                .outgoing
                .iter()
                .filter(|e| self.graph.vertex(e.target).is_real())
                .map(|e| Acn::Goto(self.labels[e.target]))
                .collect();
            for jump in jumps {
                let id = self.alloc(jump);
                items.push(id);
            }
            if self.graph.is_exit_vertex(v) {
                let id = self.alloc(Acn::Tail);
                items.push(id);
            }
        }
        self.alloc(Acn::Seq(items))
    }
}

impl ControlFlowStructurizer for SemanticPreservingStructurizer {
    fn structurize(&mut self, routine: &IrRoutine) -> HllControlTree {
        let mut nodes = Vec::new();
        let graph = FlowGraph::copy_shape_from(&routine.graph, |idx, _| {
            nodes.push(Acn::Basic(idx));
            nodes.len() - 1
        });
        let labels: Vec<u32> = (0..graph.len() as u32).collect();

        let mut reducer = Reducer {
            graph,
            nodes,
            labels,
        };

        let budget = 4 * reducer.graph.real_count() + 8;
        let mut refinements = 0usize;

        let root = loop {
            let remaining = reducer.graph.real_count();
            if remaining <= 1 {
                let root_acn = reducer
                    .graph
                    .iter_real()
                    .next()
                    .map(|vert| *vert.data());
                break match root_acn {
                    Some(acn) => acn,
                    None => reducer.alloc(Acn::Seq(Vec::new())),
                };
            }

            if reducer.try_acyclic() {
                continue;
            }
            if reducer.try_cyclic() {
                continue;
            }
            if refinements < budget && reducer.refine() {
                refinements += 1;
                continue;
            }

            log::warn!(
                "structurizer gave up after {} refinement(s) with {} region(s) left",
                refinements,
                remaining
            );
            break reducer.fallback_sequence();
        };

        // The tree always reads as a sequence at top level
        let root = if matches!(reducer.nodes[root], Acn::Seq(_)) {
            root
        } else {
            reducer.alloc(Acn::Seq(vec![root]))
        };

        HllControlTree {
            nodes: reducer.nodes,
            root,
        }
    }
}
