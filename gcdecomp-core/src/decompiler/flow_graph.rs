//! Flow-Graph Substrate
//!
//! Generic labeled directed graph used by the IR and the structurizer. Two
//! pseudo-vertices are always present: a preheader `root` (source of the
//! unique entry edge) and a postexit `terminal` (sink of every exit edge).
//! Vertices live in an arena and are addressed by [`VertexId`]; a removed
//! vertex becomes a tombstone (`Detached`) so indices stay stable.
//!
//! Traversals are deterministic: children are visited in edge insertion
//! order. Dominator and post-dominator trees are computed by the simple form
//! of Lengauer-Tarjan, parameterized on traversal direction so both share
//! one implementation.

pub type VertexId = usize;

/// Sentinel for "no vertex" (unreachable entries in dominator trees).
pub const INVALID_VERTEX: VertexId = usize::MAX;

/// Edge label carried over from the source graph's edge kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTransfer {
    Unconditional,
    ConditionTrue,
    ConditionFalse,
    Fallthrough,
    /// Jump-table case with its index.
    SwitchCase(u32),
}

/// True when `a` and `b` are the two arms of one condition.
pub fn inverse_condition(a: BlockTransfer, b: BlockTransfer) -> bool {
    matches!(
        (a, b),
        (BlockTransfer::ConditionTrue, BlockTransfer::ConditionFalse)
            | (BlockTransfer::ConditionFalse, BlockTransfer::ConditionTrue)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeData {
    pub target: VertexId,
    pub transfer: BlockTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoVertex {
    /// Source of the unique entry edge.
    Preheader,
    /// Sink of every exit edge.
    PostExit,
}

enum VertexKind<V> {
    Pseudo(PseudoVertex),
    Real(V),
    /// Tombstone left behind by region substitution.
    Detached,
}

pub struct FlowVertex<V> {
    pub idx: VertexId,
    kind: VertexKind<V>,
    pub incoming: Vec<EdgeData>,
    pub outgoing: Vec<EdgeData>,
}

impl<V> FlowVertex<V> {
    pub fn is_real(&self) -> bool {
        matches!(self.kind, VertexKind::Real(_))
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self.kind, VertexKind::Pseudo(_))
    }

    pub fn is_detached(&self) -> bool {
        matches!(self.kind, VertexKind::Detached)
    }

    pub fn is_postexit(&self) -> bool {
        matches!(self.kind, VertexKind::Pseudo(PseudoVertex::PostExit))
    }

    pub fn data(&self) -> &V {
        match &self.kind {
            VertexKind::Real(v) => v,
            _ => panic!("data() on non-real flow vertex {}", self.idx),
        }
    }

    pub fn data_mut(&mut self) -> &mut V {
        match &mut self.kind {
            VertexKind::Real(v) => v,
            _ => panic!("data_mut() on non-real flow vertex {}", self.idx),
        }
    }

    pub fn try_data(&self) -> Option<&V> {
        match &self.kind {
            VertexKind::Real(v) => Some(v),
            _ => None,
        }
    }

    pub fn single_succ(&self) -> bool {
        self.outgoing.len() == 1
    }

    pub fn single_pred(&self) -> bool {
        self.incoming.len() == 1
    }
}

/// Traversal direction: forward follows outgoing edges from the root,
/// backward follows incoming edges from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub struct FlowGraph<V> {
    vertices: Vec<FlowVertex<V>>,
    root: VertexId,
    terminal: VertexId,
}

impl<V> Default for FlowGraph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FlowGraph<V> {
    pub fn new() -> Self {
        let mut graph = FlowGraph {
            vertices: Vec::new(),
            root: 0,
            terminal: 0,
        };
        graph.root = graph.add_pseudo(PseudoVertex::Preheader);
        graph.terminal = graph.add_pseudo(PseudoVertex::PostExit);
        graph
    }

    pub fn root(&self) -> VertexId {
        self.root
    }

    pub fn terminal(&self) -> VertexId {
        self.terminal
    }

    /// Real vertex the entry edge leads to, if any.
    pub fn entry(&self) -> Option<VertexId> {
        self.vertices[self.root].outgoing.first().map(|e| e.target)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn real_count(&self) -> usize {
        self.vertices.iter().filter(|v| v.is_real()).count()
    }

    pub fn vertex(&self, idx: VertexId) -> &FlowVertex<V> {
        &self.vertices[idx]
    }

    pub fn vertex_mut(&mut self, idx: VertexId) -> &mut FlowVertex<V> {
        &mut self.vertices[idx]
    }

    pub fn add_vertex(&mut self, data: V) -> VertexId {
        let idx = self.vertices.len();
        self.vertices.push(FlowVertex {
            idx,
            kind: VertexKind::Real(data),
            incoming: Vec::new(),
            outgoing: Vec::new(),
        });
        idx
    }

    pub fn add_pseudo(&mut self, kind: PseudoVertex) -> VertexId {
        let idx = self.vertices.len();
        self.vertices.push(FlowVertex {
            idx,
            kind: VertexKind::Pseudo(kind),
            incoming: Vec::new(),
            outgoing: Vec::new(),
        });
        idx
    }

    pub fn link(&mut self, from: VertexId, to: VertexId, transfer: BlockTransfer) {
        self.vertices[from].outgoing.push(EdgeData {
            target: to,
            transfer,
        });
        self.vertices[to].incoming.push(EdgeData {
            target: from,
            transfer,
        });
    }

    /// Remove the first `from -> to` edge, if present.
    pub fn unlink(&mut self, from: VertexId, to: VertexId) {
        if let Some(pos) = self.vertices[from]
            .outgoing
            .iter()
            .position(|e| e.target == to)
        {
            self.vertices[from].outgoing.remove(pos);
        }
        if let Some(pos) = self.vertices[to]
            .incoming
            .iter()
            .position(|e| e.target == from)
        {
            self.vertices[to].incoming.remove(pos);
        }
    }

    /// Insert a new vertex between `before` and all of its outgoing links.
    pub fn insert_after(&mut self, before: VertexId, data: V, transfer: BlockTransfer) -> VertexId {
        let new_idx = self.add_vertex(data);
        let moved = std::mem::take(&mut self.vertices[before].outgoing);

        // Retarget the incoming side of every moved edge
        for edge in &moved {
            for back in &mut self.vertices[edge.target].incoming {
                if back.target == before && back.transfer == edge.transfer {
                    back.target = new_idx;
                }
            }
        }
        self.vertices[new_idx].outgoing = moved;

        self.link(before, new_idx, transfer);
        new_idx
    }

    /// Turn `idx` into a tombstone. The caller is responsible for having
    /// relinked or removed every edge touching it first.
    pub fn detach(&mut self, idx: VertexId) {
        debug_assert!(self.vertices[idx].incoming.is_empty());
        debug_assert!(self.vertices[idx].outgoing.is_empty());
        self.vertices[idx].kind = VertexKind::Detached;
    }

    pub fn iter_real(&self) -> impl Iterator<Item = &FlowVertex<V>> {
        self.vertices.iter().filter(|v| v.is_real())
    }

    /// True for a real vertex whose only successor is the terminal.
    pub fn is_exit_vertex(&self, idx: VertexId) -> bool {
        let v = &self.vertices[idx];
        v.is_real() && v.single_succ() && self.vertices[v.outgoing[0].target].is_postexit()
    }

    fn edges(&self, idx: VertexId, dir: Direction) -> &[EdgeData] {
        match dir {
            Direction::Forward => &self.vertices[idx].outgoing,
            Direction::Backward => &self.vertices[idx].incoming,
        }
    }

    /// Pre-order DFS from `start`, children in edge insertion order.
    pub fn preorder(&self, dir: Direction, start: VertexId) -> Vec<VertexId> {
        let mut visited = vec![false; self.vertices.len()];
        let mut order = Vec::new();
        let mut stack = vec![start];

        while let Some(vert) = stack.pop() {
            if visited[vert] {
                continue;
            }
            visited[vert] = true;
            order.push(vert);

            // Reverse push keeps pop order equal to edge insertion order
            for edge in self.edges(vert, dir).iter().rev() {
                if !visited[edge.target] {
                    stack.push(edge.target);
                }
            }
        }
        order
    }

    /// Pre-order DFS carrying a path-accumulated annotation; `step` maps the
    /// parent's annotation to the child's.
    pub fn preorder_accumulate<A: Clone>(
        &self,
        dir: Direction,
        start: VertexId,
        init: A,
        mut step: impl FnMut(VertexId, &A) -> A,
    ) -> Vec<(VertexId, A)> {
        let mut visited = vec![false; self.vertices.len()];
        let mut order = Vec::new();
        let mut stack = vec![(start, init)];

        while let Some((vert, acc)) = stack.pop() {
            if visited[vert] {
                continue;
            }
            visited[vert] = true;

            let forward = step(vert, &acc);
            for edge in self.edges(vert, dir).iter().rev() {
                if !visited[edge.target] {
                    stack.push((edge.target, forward.clone()));
                }
            }
            order.push((vert, acc));
        }
        order
    }

    /// Post-order DFS from `start`, children in edge insertion order.
    pub fn postorder(&self, dir: Direction, start: VertexId) -> Vec<VertexId> {
        let mut visited = vec![false; self.vertices.len()];
        let mut order = Vec::new();
        // (vertex, next child index to expand)
        let mut stack: Vec<(VertexId, usize)> = vec![(start, 0)];
        visited[start] = true;

        while let Some(&(vert, child)) = stack.last() {
            let edges = self.edges(vert, dir);
            if child < edges.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let target = edges[child].target;
                if !visited[target] {
                    visited[target] = true;
                    stack.push((target, 0));
                }
            } else {
                order.push(vert);
                stack.pop();
            }
        }
        order
    }

    /// Immediate-dominator tree; `tree[v]` is `v`'s idom, the root maps to
    /// itself, unreachable vertices map to [`INVALID_VERTEX`].
    pub fn dominator_tree(&self) -> Vec<VertexId> {
        self.lengauer_tarjan(Direction::Forward)
    }

    /// Immediate post-dominator tree rooted at the terminal.
    pub fn post_dominator_tree(&self) -> Vec<VertexId> {
        self.lengauer_tarjan(Direction::Backward)
    }

    /// Simple-form Lengauer-Tarjan. Forward direction computes dominators
    /// from the root; backward computes post-dominators from the terminal.
    fn lengauer_tarjan(&self, dir: Direction) -> Vec<VertexId> {
        let n = self.vertices.len();
        let start = match dir {
            Direction::Forward => self.root,
            Direction::Backward => self.terminal,
        };

        // Step 1: DFS numbering and spanning-tree parents
        let mut sdom = vec![usize::MAX; n];
        let mut dfs2vert = Vec::with_capacity(n);
        let mut parent = vec![INVALID_VERTEX; n];

        for (vert, dfs_parent) in self.preorder_accumulate(dir, start, start, |v, _| v) {
            sdom[vert] = dfs2vert.len();
            dfs2vert.push(vert);
            parent[vert] = dfs_parent;
        }

        let mut idom = vec![INVALID_VERTEX; n];
        let reachable = dfs2vert.len();
        if reachable == 0 {
            return idom;
        }

        // Steps 2 + 3: semidominators with deferred idom buckets
        let mut forest = DisjointSet::new(n);
        let mut bucket: Vec<Vec<VertexId>> = vec![Vec::new(); n];

        // Vertex with minimal semidominator along the forest path to v
        let min_vert = |forest: &mut DisjointSet, sdom: &[usize], v: VertexId| -> VertexId {
            let r = forest.root(v);
            if r == v {
                return v;
            }
            let mut min_u = v;
            let mut u = parent[v];
            while u != r {
                if sdom[u] < sdom[min_u] {
                    min_u = u;
                }
                u = parent[u];
            }
            min_u
        };

        for w_dfs in (1..reachable).rev() {
            let w = dfs2vert[w_dfs];

            let back_edges = match dir {
                Direction::Forward => &self.vertices[w].incoming,
                Direction::Backward => &self.vertices[w].outgoing,
            };
            for edge in back_edges {
                let v = edge.target;
                if sdom[v] == usize::MAX {
                    continue;
                }
                let u = min_vert(&mut forest, &sdom, v);
                sdom[w] = sdom[w].min(sdom[u]);
            }

            forest.link(w, parent[w]);
            bucket[dfs2vert[sdom[w]]].push(w);

            let deferred = std::mem::take(&mut bucket[parent[w]]);
            for v in deferred {
                let u = min_vert(&mut forest, &sdom, v);
                // idom is either known now (parent[w]) or must be deferred
                idom[v] = if sdom[u] < sdom[v] { u } else { parent[w] };
            }
        }

        // Step 4: forward pass resolves deferred idoms
        for w_dfs in 1..reachable {
            let w = dfs2vert[w_dfs];
            if idom[w] != dfs2vert[sdom[w]] {
                idom[w] = idom[idom[w]];
            }
        }

        idom[start] = start;
        idom
    }
}

/// Walk `m` upward through `tree` until either `n` or the tree root.
pub fn dominates(tree: &[VertexId], n: VertexId, m: VertexId) -> bool {
    if m >= tree.len() || tree[m] == INVALID_VERTEX {
        return false;
    }
    let mut it = m;
    while tree[it] != it && it != n {
        it = tree[it];
    }
    it == n
}

/// Union-find with path compression used by the dominator computation.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        DisjointSet {
            parent: (0..len).collect(),
        }
    }

    fn root(&mut self, node: usize) -> usize {
        let mut r = node;
        while self.parent[r] != r {
            r = self.parent[r];
        }
        // Path compression
        let mut cur = node;
        while self.parent[cur] != r {
            let next = self.parent[cur];
            self.parent[cur] = r;
            cur = next;
        }
        r
    }

    fn link(&mut self, from: usize, to: usize) {
        let fr = self.root(from);
        let tr = self.root(to);
        self.parent[fr] = tr;
    }
}

impl<V> FlowGraph<V> {
    /// Build a graph with the same shape as `other`, generating each real
    /// vertex's payload from the original.
    pub fn copy_shape_from<U>(
        other: &FlowGraph<U>,
        mut make: impl FnMut(VertexId, &U) -> V,
    ) -> FlowGraph<V> {
        let mut graph = FlowGraph {
            vertices: Vec::with_capacity(other.vertices.len()),
            root: other.root,
            terminal: other.terminal,
        };
        for vert in &other.vertices {
            let kind = match &vert.kind {
                VertexKind::Pseudo(p) => VertexKind::Pseudo(*p),
                VertexKind::Real(u) => VertexKind::Real(make(vert.idx, u)),
                VertexKind::Detached => VertexKind::Detached,
            };
            graph.vertices.push(FlowVertex {
                idx: vert.idx,
                kind,
                incoming: vert.incoming.clone(),
                outgoing: vert.outgoing.clone(),
            });
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_after_relinks() {
        let mut graph: FlowGraph<u32> = FlowGraph::new();
        let a = graph.add_vertex(1);
        let b = graph.add_vertex(2);
        graph.link(graph.root(), a, BlockTransfer::Unconditional);
        graph.link(a, b, BlockTransfer::Unconditional);

        let mid = graph.insert_after(a, 3, BlockTransfer::Fallthrough);
        assert_eq!(graph.vertex(a).outgoing[0].target, mid);
        assert_eq!(graph.vertex(mid).outgoing[0].target, b);
        assert_eq!(graph.vertex(b).incoming[0].target, mid);
    }
}
