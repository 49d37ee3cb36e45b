//! Bind Tracking
//!
//! A *bind* is a routine-scoped name for the value held in one physical
//! register over a set of address ranges. Tracking runs in two phases:
//!
//! *Phase A - block-local accumulation.* The translator emplaces binds
//! scoped to single basic blocks and publishes the ones crossing block
//! boundaries onto the edges they cross (a forwarding list per block).
//!
//! *Phase B - collection.* Binds sharing a register on a common edge are
//! merged with a union-find; each resulting group becomes one routine temp
//! whose `regions` gather the member ranges, registered in a per-register
//! interval tree. Block-local tables are freed afterwards.
//!
//! Invariant: for a given register, no two routine temps have overlapping
//! regions. A violation means an upstream analysis produced inconsistent
//! liveness and is a programming error, so collection fails fast.

use crate::decompiler::analysis::control_flow::BasicBlock;
use crate::decompiler::datasource::Register;
use crate::decompiler::interval_tree::IntervalTree;
use crate::decompiler::ir::instruction::IrType;

/// One routine-scoped temporary over a single physical register.
#[derive(Debug, Clone)]
pub struct BindInfo<R> {
    pub id: u32,
    pub reg: R,
    pub ty: IrType,
    /// Half-open VA ranges this temp is live over, pairwise disjoint.
    pub regions: Vec<(u32, u32)>,
    pub is_param: bool,
    pub is_ret: bool,
}

struct BlockBind<R> {
    id: u32,
    rgn: (u32, u32),
    reg: R,
    is_param: bool,
    is_ret: bool,
    // Union-find state
    parent: u32,
    cached_rep: Option<u32>,
    routine_temp: Option<u32>,
}

/// Two-phase bind tracker for one register file.
pub struct BindTracker<R: Register> {
    /// Block-scoped binds; cleared by collection.
    block_binds: Vec<BlockBind<R>>,
    /// Per-block list of binds published across that block's edges.
    forwarding: Vec<Vec<u32>>,
    /// Routine-scoped temps, built by collection.
    temps: Vec<BindInfo<R>>,
    /// Per-register live-range index: `[lo, hi)` -> temp id.
    ranges: Vec<IntervalTree<u32>>,
    /// Type stamped onto every temp of this file.
    temp_type: IrType,
}

impl<R: Register> BindTracker<R> {
    pub fn new(block_count: usize, temp_type: IrType) -> Self {
        BindTracker {
            block_binds: Vec::new(),
            forwarding: (0..block_count).map(|_| Vec::new()).collect(),
            temps: Vec::new(),
            ranges: (0..32).map(|_| IntervalTree::new()).collect(),
            temp_type,
        }
    }

    /// Phase A: emplace a bind spanning `[lo, hi)` within one block.
    pub fn add_block_bind(&mut self, reg: R, is_param: bool, is_ret: bool, lo: u32, hi: u32) -> u32 {
        let id = self.block_binds.len() as u32;
        self.block_binds.push(BlockBind {
            id,
            rgn: (lo, hi),
            reg,
            is_param,
            is_ret,
            parent: id,
            cached_rep: None,
            routine_temp: None,
        });
        id
    }

    /// Publish a bind on the block's outgoing edges.
    pub fn publish_out(&mut self, block: &BasicBlock, bind: u32) {
        self.forwarding[block.id as usize].push(bind);
    }

    /// Publish a bind to every predecessor for cross-block joining.
    pub fn publish_in(&mut self, block: &BasicBlock, bind: u32) {
        for (_, pred) in &block.incoming {
            self.forwarding[*pred as usize].push(bind);
        }
    }

    fn representative(&self, mut id: u32) -> u32 {
        loop {
            let parent = self.block_binds[id as usize].parent;
            if parent == id {
                return id;
            }
            id = parent;
        }
    }

    /// Path-compress through `cached_rep` so collection stays near-linear.
    fn cache_representative(&mut self, id: u32) -> u32 {
        let rep = self.representative(id);
        let mut cur = id;
        while self.block_binds[cur as usize].cached_rep.is_none() {
            self.block_binds[cur as usize].cached_rep = Some(rep);
            let parent = self.block_binds[cur as usize].parent;
            if parent == cur {
                break;
            }
            cur = parent;
        }
        rep
    }

    /// Phase B: union binds across edges and collect the disjoint groups
    /// into routine temps.
    ///
    /// Panics if two collected regions overlap on one register; the
    /// disjoint-range invariant was violated upstream.
    pub fn collect(&mut self) {
        // Union all binds sharing a register on each edge
        let forwarding = std::mem::take(&mut self.forwarding);
        for mut edge_list in forwarding {
            while !edge_list.is_empty() {
                let search_reg = self.block_binds[edge_list[0] as usize].reg;
                let (group, rest): (Vec<u32>, Vec<u32>) = edge_list
                    .into_iter()
                    .partition(|&b| self.block_binds[b as usize].reg == search_reg);
                edge_list = rest;

                let group_rep = self.representative(group[0]);
                for &member in &group[1..] {
                    let member_rep = self.representative(member);
                    if member_rep == group_rep {
                        continue;
                    }
                    self.block_binds[member_rep as usize].parent = group_rep;
                    let (is_param, is_ret) = {
                        let m = &self.block_binds[member_rep as usize];
                        (m.is_param, m.is_ret)
                    };
                    let rep = &mut self.block_binds[group_rep as usize];
                    rep.is_param |= is_param;
                    rep.is_ret |= is_ret;
                }
            }
        }

        // Collect each disjoint set into one routine temp
        for idx in 0..self.block_binds.len() as u32 {
            let rep = self.cache_representative(idx);

            let temp_id = match self.block_binds[rep as usize].routine_temp {
                Some(t) => t,
                None => {
                    let t = self.temps.len() as u32;
                    let rep_bind = &self.block_binds[rep as usize];
                    self.temps.push(BindInfo {
                        id: t,
                        reg: rep_bind.reg,
                        ty: self.temp_type,
                        regions: Vec::new(),
                        is_param: rep_bind.is_param,
                        is_ret: rep_bind.is_ret,
                    });
                    self.block_binds[rep as usize].routine_temp = Some(t);
                    t
                }
            };

            let (lo, hi) = self.block_binds[idx as usize].rgn;
            let reg = self.block_binds[idx as usize].reg;
            self.temps[temp_id as usize].regions.push((lo, hi));
            assert!(
                self.ranges[reg.index() as usize].try_insert(lo, hi, temp_id),
                "overlapping bind regions for register {} at [{:#x}, {:#x})",
                reg.index(),
                lo,
                hi
            );
        }

        self.block_binds.clear();
        self.block_binds.shrink_to_fit();
    }

    /// The unique temp live in `reg` at `va`, if any.
    pub fn query_temp(&self, va: u32, reg: R) -> Option<&BindInfo<R>> {
        self.ranges[reg.index() as usize]
            .query_range(va, va.wrapping_add(4))
            .map(|id| &self.temps[*id as usize])
    }

    pub fn temp(&self, id: u32) -> Option<&BindInfo<R>> {
        self.temps.get(id as usize)
    }

    pub fn temps(&self) -> &[BindInfo<R>] {
        &self.temps
    }

    pub fn len(&self) -> usize {
        self.temps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temps.is_empty()
    }
}
