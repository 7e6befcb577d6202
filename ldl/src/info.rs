///! Elimination-Tree Information (ETI): per-node metadata symbolic
///! analysis produces and the numeric factorization/solves consume —
///! `lowerStruct`, the relative-index maps into the parent front, and,
///! for distributed nodes, the communication plan.

use crate::grid::ProcessGrid;

/// Communication plan and grid placement for one distributed node.
/// `num_child_solve_send_indices[p]` / `child_solve_recv_indices[p]` are
/// indexed by rank within this node's *parent* team (the peers this
/// node's update is packed to during a solve's forward sweep);
/// `num_child_factor_send_indices`/`child_factor_recv_indices` are the
/// factorization analogues.
#[derive(Debug, Clone)]
pub struct DistNodeInfo {
    pub grid: ProcessGrid,
    pub num_child_solve_send_indices: Vec<usize>,
    pub child_solve_recv_indices: Vec<Vec<usize>>,
    pub num_child_factor_send_indices: Vec<usize>,
    pub child_factor_recv_indices: Vec<Vec<usize>>,
}

/// Metadata for one elimination-tree node: the assembled front's
/// structure and, once built, its relationship to its children's
/// update matrices.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub off: usize,
    pub size: usize,
    /// Row indices below `[off, off + size)` present in the assembled
    /// front (`lowerStruct`), strictly increasing.
    pub lower_struct: Vec<usize>,
    /// For each entry of the left child's `lower_struct`, its position
    /// in this node's assembled index list (`[off, off+size) ++
    /// lower_struct`). Empty for leaves.
    pub left_rel_indices: Vec<usize>,
    /// Same, for the right child.
    pub right_rel_indices: Vec<usize>,
    pub parent: Option<usize>,
    pub children: Option<(usize, usize)>,
    pub dist: Option<DistNodeInfo>,
}

impl NodeInfo {
    pub fn is_local(&self) -> bool {
        self.dist.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Length of the assembled index list, `size + lower_struct.len()`:
    /// the order of this node's front.
    pub fn front_order(&self) -> usize {
        self.size + self.lower_struct.len()
    }
}

/// The full per-node symbolic analysis result, arena-indexed the same
/// way as [`dsparse::SeparatorTree`], avoiding ownership cycles.
#[derive(Debug, Clone)]
pub struct EliminationTreeInfo {
    nodes: Vec<NodeInfo>,
    root: usize,
}

impl EliminationTreeInfo {
    pub(crate) fn new(nodes: Vec<NodeInfo>, root: usize) -> Self {
        EliminationTreeInfo { nodes, root }
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn node(&self, id: usize) -> &NodeInfo {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Post-order (children before parent): the order numeric
    /// factorization walks the tree in.
    pub fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.post_order_from(self.root, &mut order);
        order
    }

    fn post_order_from(&self, id: usize, order: &mut Vec<usize>) {
        if let Some((l, r)) = self.nodes[id].children {
            self.post_order_from(l, order);
            self.post_order_from(r, order);
        }
        order.push(id);
    }

    /// Pre-order (parent before children): the order the backward solve
    /// walks the tree in.
    pub fn pre_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.pre_order_from(self.root, &mut order);
        order
    }

    fn pre_order_from(&self, id: usize, order: &mut Vec<usize>) {
        order.push(id);
        if let Some((l, r)) = self.nodes[id].children {
            self.pre_order_from(l, order);
            self.pre_order_from(r, order);
        }
    }

    /// Distributed nodes only, in post-order (a node's distributed
    /// children, if any, precede it) — the order `dist_ldl`/the
    /// distributed solve walk the upper, team-owned part of the tree in.
    pub fn distributed_post_order(&self) -> Vec<usize> {
        self.post_order().into_iter().filter(|&id| !self.nodes[id].is_local()).collect()
    }

    /// Distributed nodes only, pre-order — the order the distributed
    /// backward solve walks in.
    pub fn distributed_pre_order(&self) -> Vec<usize> {
        self.pre_order().into_iter().filter(|&id| !self.nodes[id].is_local()).collect()
    }
}
