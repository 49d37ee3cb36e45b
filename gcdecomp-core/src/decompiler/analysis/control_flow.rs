//! Control Flow Graph Construction
//!
//! Discovers the basic blocks of one subroutine by following branches from
//! its entrypoint, splitting blocks when a later branch lands mid-block, and
//! finally identifying loops and back-edges.
//!
//! # Construction Algorithm
//! 1. Seed a root block at the entrypoint and keep a worklist of unprocessed
//!    blocks.
//! 2. Walk each block forward one instruction at a time, extending its end
//!    address. Calls (`bl`) do not terminate a block; `b`/`bc` terminate it
//!    with the matching out-edges; `bclr`/`bcctr` terminate it as an exit.
//! 3. A branch target inside an existing block splits that block: the upper
//!    half keeps its id and in-edges and falls through to the lower half,
//!    which inherits the outgoing edges.
//! 4. Once the block set is stable, decode every block's instruction list,
//!    fill the range index, and mirror each out-edge as a forward in-edge.
//!
//! # Loop Detection
//! A block is a loop header iff it has an in-edge from its own forward
//! reachable set (computed against a cut set of already-discovered back
//! edges) and another in-edge from outside it. The loop body is every block
//! on a path from the header back to it; those in-edges become back-edges
//! and are added to the cut set.

use bitvec::prelude::*;
use smallvec::SmallVec;

use crate::decompiler::analysis::data_flow::RegisterLifetimes;
use crate::decompiler::analysis::perilogue::PerilogueTag;
use crate::decompiler::datasource::{Gpr, InstSideFx};
use crate::decompiler::decoder::{InstOperation, MetaInst};
use crate::decompiler::interval_tree::IntervalTree;
use crate::decompiler::memory::RandomAccessData;

pub type BlockId = u32;

/// Kind of an edge as seen from its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingEdgeKind {
    Forward,
    Back,
}

/// Kind of an edge as seen from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingEdgeKind {
    Unconditional,
    ConditionTrue,
    ConditionFalse,
    Fallthrough,
}

/// Basic block over the half-open, 4-byte-aligned range `[start_va, end_va)`.
pub struct BasicBlock {
    pub id: BlockId,
    pub start_va: u32,
    pub end_va: u32,
    pub incoming: SmallVec<[(IncomingEdgeKind, BlockId); 2]>,
    pub outgoing: SmallVec<[(OutgoingEdgeKind, BlockId); 2]>,
    pub instructions: Vec<MetaInst>,
    /// GPR liveness facts, filled by the liveness analyzer.
    pub liveness: Option<RegisterLifetimes<Gpr>>,
    /// One tag per instruction, filled by the perilogue classifier.
    pub perilogue_tags: Vec<PerilogueTag>,
}

impl BasicBlock {
    fn new(id: BlockId, start_va: u32) -> Self {
        BasicBlock {
            id,
            start_va,
            end_va: start_va,
            incoming: SmallVec::new(),
            outgoing: SmallVec::new(),
            instructions: Vec::new(),
            liveness: None,
            perilogue_tags: Vec::new(),
        }
    }

    /// Liveness facts; panics if the liveness analyzer has not run yet.
    pub fn lifetimes(&self) -> &RegisterLifetimes<Gpr> {
        self.liveness
            .as_ref()
            .expect("liveness analysis has not run on this block")
    }
}

/// Natural loop discovered in the graph.
pub struct Loop {
    pub header: BlockId,
    /// Membership bitset over block ids.
    pub contents: BitVec<u32>,
    /// Distinct blocks outside the loop targeted from inside it.
    pub exits: SmallVec<[BlockId; 2]>,
}

impl Loop {
    pub fn contains(&self, id: BlockId) -> bool {
        self.contents
            .get(id as usize)
            .map(|b| *b)
            .unwrap_or(false)
    }

    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.contents.iter_ones().map(|i| i as BlockId)
    }
}

/// Per-subroutine control flow graph.
pub struct SubroutineGraph {
    pub root: BlockId,
    blocks: Vec<BasicBlock>,
    by_range: IntervalTree<BlockId>,
    pub exits: Vec<BlockId>,
    pub loops: Vec<Loop>,
    /// Targets of every `bl` seen while walking the subroutine.
    pub direct_calls: Vec<u32>,
}

impl SubroutineGraph {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id as usize]
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    /// Block containing `va`, via the range index.
    pub fn block_by_vaddr(&self, va: u32) -> Option<&BasicBlock> {
        self.by_range
            .query_range(va, va.wrapping_add(4))
            .map(|id| self.block(*id))
    }

    pub fn is_exit_block(&self, id: BlockId) -> bool {
        self.exits.contains(&id)
    }

    /// Forward DFS preorder from the root, children in edge insertion order.
    pub fn forward_order(&self) -> Vec<BlockId> {
        let mut visited = bitvec![u32, Lsb0; 0; self.blocks.len()];
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if visited[id as usize] {
                continue;
            }
            visited.set(id as usize, true);
            order.push(id);
            for (_, next) in self.block(id).outgoing.iter().rev() {
                if !visited[*next as usize] {
                    stack.push(*next);
                }
            }
        }
        order
    }

    /// Forward reachable set from `from`, ignoring edges in `cuts`.
    fn future_set(&self, from: BlockId, cuts: &CutSet) -> BitVec<u32> {
        let mut visited = bitvec![u32, Lsb0; 0; self.blocks.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if visited[id as usize] {
                continue;
            }
            visited.set(id as usize, true);
            for (_, next) in &self.block(id).outgoing {
                if !visited[*next as usize] && !cuts.contains(&(id, *next)) {
                    stack.push(*next);
                }
            }
        }
        visited
    }
}

type CutSet = std::collections::HashSet<(BlockId, BlockId)>;

struct GraphBuilder<'a> {
    ram: &'a dyn RandomAccessData,
    graph: SubroutineGraph,
    worklist: Vec<BlockId>,
}

impl<'a> GraphBuilder<'a> {
    fn block_at_head(&self, address: u32) -> Option<BlockId> {
        self.graph
            .blocks
            .iter()
            .find(|b| b.start_va == address)
            .map(|b| b.id)
    }

    fn block_containing(&self, address: u32) -> Option<BlockId> {
        self.graph
            .blocks
            .iter()
            .find(|b| address > b.start_va && address < b.end_va)
            .map(|b| b.id)
    }

    /// Split `original` at `address`. The upper half keeps its id and gains a
    /// fallthrough to the lower half, which inherits the outgoing edges.
    fn split_block(&mut self, original: BlockId, address: u32) -> BlockId {
        let new_id = self.graph.blocks.len() as BlockId;
        let (old_end, moved_edges) = {
            let orig = self.graph.block_mut(original);
            let old_end = orig.end_va;
            let moved = std::mem::take(&mut orig.outgoing);
            orig.end_va = address;
            orig.outgoing.push((OutgoingEdgeKind::Fallthrough, new_id));
            (old_end, moved)
        };

        let mut lower = BasicBlock::new(new_id, address);
        lower.end_va = old_end;
        lower.outgoing = moved_edges;
        self.graph.blocks.push(lower);
        new_id
    }

    /// Record a branch from `cur` to `target_addr`. Returns the id of the
    /// block the branch instruction belongs to afterwards, which differs
    /// from `cur` when the branch split its own block.
    fn handle_branch(
        &mut self,
        cur: BlockId,
        target_addr: u32,
        inst_addr: u32,
        kind: OutgoingEdgeKind,
    ) -> BlockId {
        if !self.ram.is_mapped(target_addr) {
            // Silent exit: the edge is omitted and the block ends normally
            log::warn!(
                "branch at {:#010x} to unmapped address {:#010x}, dropping edge",
                inst_addr,
                target_addr
            );
            return cur;
        }

        // Branching into the start of another block just links to it
        if let Some(known) = self.block_at_head(target_addr) {
            self.graph
                .block_mut(cur)
                .outgoing
                .push((kind, known));
            return cur;
        }

        let next = if let Some(owner) = self.block_containing(target_addr) {
            let next = self.split_block(owner, target_addr);
            // A branch back into its own block now lives in the lower half
            if owner == cur && inst_addr >= target_addr {
                self.graph.block_mut(next).outgoing.push((kind, next));
                return next;
            }
            next
        } else {
            let next = self.graph.blocks.len() as BlockId;
            let mut block = BasicBlock::new(next, target_addr);
            block.end_va = target_addr + 4;
            self.graph.blocks.push(block);
            self.worklist.push(next);
            next
        };

        self.graph.block_mut(cur).outgoing.push((kind, next));
        cur
    }

    fn walk_block(&mut self, id: BlockId) {
        let mut inst_addr = self.graph.block(id).start_va;
        loop {
            self.graph.block_mut(id).end_va = inst_addr + 4;

            // Falling through to an already known block terminates here
            if let Some(head) = self.block_at_head(inst_addr) {
                if head != id {
                    let block = self.graph.block_mut(id);
                    block.end_va = inst_addr;
                    block.outgoing.push((OutgoingEdgeKind::Fallthrough, head));
                    return;
                }
            }

            let inst = self.ram.read_instruction(inst_addr);

            // Calls do not end the block; direct ones are recorded
            if inst.side_effects.intersects(InstSideFx::WRITES_LR) {
                if inst.op == InstOperation::B {
                    self.graph.direct_calls.push(inst.branch_target());
                }
                inst_addr += 4;
                continue;
            }

            match inst.op {
                InstOperation::Bclr | InstOperation::Bcctr => {
                    self.graph.exits.push(id);
                    return;
                }

                InstOperation::B => {
                    self.handle_branch(
                        id,
                        inst.branch_target(),
                        inst_addr,
                        OutgoingEdgeKind::Unconditional,
                    );
                    return;
                }

                InstOperation::Bc => {
                    let src = self.handle_branch(
                        id,
                        inst.branch_target(),
                        inst_addr,
                        OutgoingEdgeKind::ConditionTrue,
                    );
                    self.handle_branch(
                        src,
                        inst_addr + 4,
                        inst_addr,
                        OutgoingEdgeKind::ConditionFalse,
                    );
                    return;
                }

                _ => {
                    inst_addr += 4;
                }
            }
        }
    }
}

/// Discover the subroutine graph reachable from `start_va`.
pub fn build_graph(ram: &dyn RandomAccessData, start_va: u32) -> SubroutineGraph {
    let mut builder = GraphBuilder {
        ram,
        graph: SubroutineGraph {
            root: 0,
            blocks: Vec::new(),
            by_range: IntervalTree::new(),
            exits: Vec::new(),
            loops: Vec::new(),
            direct_calls: Vec::new(),
        },
        worklist: Vec::new(),
    };

    builder.graph.blocks.push(BasicBlock::new(0, start_va));
    builder.worklist.push(0);

    while let Some(id) = builder.worklist.pop() {
        builder.walk_block(id);
    }

    let mut graph = builder.graph;

    // Fill out block data now that block extents are final
    let order = graph.forward_order();
    for &id in &order {
        let (start, end) = {
            let block = graph.block(id);
            (block.start_va, block.end_va)
        };
        let instructions: Vec<MetaInst> = (start..end)
            .step_by(4)
            .map(|va| ram.read_instruction(va))
            .collect();
        graph.block_mut(id).instructions = instructions;
        graph.by_range.try_insert(start, end, id);
    }

    // Mirror every out-edge of a reachable block as a forward in-edge
    for &id in &order {
        let targets: Vec<BlockId> = graph.block(id).outgoing.iter().map(|(_, t)| *t).collect();
        for target in targets {
            graph
                .block_mut(target)
                .incoming
                .push((IncomingEdgeKind::Forward, id));
        }
    }

    // Blocks whose edges were all dropped are silent exits
    for &id in &order {
        if graph.block(id).outgoing.is_empty() && !graph.exits.contains(&id) {
            graph.exits.push(id);
        }
    }

    detect_loops(&mut graph, &order);
    graph
}

/// Construct a loop from its header: walk forward accumulating every block
/// on a path that reaches back into the loop, then collect the exits.
fn construct_loop(graph: &SubroutineGraph, header: BlockId, cuts: &CutSet) -> Loop {
    let nblocks = graph.len();
    let mut contents = bitvec![u32, Lsb0; 0; nblocks];
    contents.set(header as usize, true);

    let mut visited = bitvec![u32, Lsb0; 0; nblocks];
    let mut path: Vec<BlockId> = Vec::new();
    let mut stack: Vec<(BlockId, usize)> = vec![(header, 0)];

    while let Some((cur, depth)) = stack.pop() {
        if visited[cur as usize] {
            continue;
        }
        visited.set(cur as usize, true);

        path.truncate(depth);
        path.push(cur);

        let reaches_loop = graph
            .block(cur)
            .outgoing
            .iter()
            .any(|(_, next)| contents[*next as usize]);
        if reaches_loop {
            for &step in &path {
                contents.set(step as usize, true);
            }
        }

        for (_, next) in graph.block(cur).outgoing.iter().rev() {
            if !visited[*next as usize] && !cuts.contains(&(cur, *next)) {
                stack.push((*next, depth + 1));
            }
        }
    }

    let mut exits: SmallVec<[BlockId; 2]> = SmallVec::new();
    for id in contents.iter_ones() {
        for (_, next) in &graph.block(id as BlockId).outgoing {
            if !contents[*next as usize] && !exits.contains(next) {
                exits.push(*next);
            }
        }
    }

    Loop {
        header,
        contents,
        exits,
    }
}

fn detect_loops(graph: &mut SubroutineGraph, order: &[BlockId]) {
    let mut cuts: CutSet = CutSet::new();

    for &cur in order {
        if graph.block(cur).incoming.is_empty() {
            continue;
        }

        let future = graph.future_set(cur, &cuts);
        let mut incoming_in_future = false;
        let mut incoming_outside = false;
        for (_, src) in &graph.block(cur).incoming {
            if future[*src as usize] {
                incoming_in_future = true;
            } else {
                incoming_outside = true;
            }
        }

        if incoming_in_future && incoming_outside {
            let found = construct_loop(graph, cur, &cuts);
            log::debug!(
                "loop header {:#010x}: {} block(s), {} exit(s)",
                graph.block(cur).start_va,
                found.contents.count_ones(),
                found.exits.len()
            );
            graph.loops.push(found);

            // All edges pointing back to the loop entry are back-edges; cut
            // them so outer headers see an acyclic inner region
            let sources: Vec<BlockId> = graph
                .block(cur)
                .incoming
                .iter()
                .filter(|(_, src)| future[*src as usize])
                .map(|(_, src)| *src)
                .collect();
            for src in sources {
                for edge in graph.block_mut(cur).incoming.iter_mut() {
                    if edge.1 == src {
                        edge.0 = IncomingEdgeKind::Back;
                    }
                }
                cuts.insert((src, cur));
            }
        }
    }
}
