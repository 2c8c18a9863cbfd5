//! Per-worker scratch arenas.
//!
//! All mutable per-job node state lives here, indexed by node id. Each
//! worker leases one arena per job from a shared pool, so at most
//! `num_threads` arenas exist and the traversal loops run without any
//! locking. Arenas are cleared selectively: only nodes a job actually
//! touched are reset, and buckets are zeroed up to the job's weight cap
//! rather than reallocated.

use std::sync::Mutex;

use crate::graph::NodeId;

use super::{buckets::NodeBuckets, distances::NodeDistances, topo::TopoInfo};

/// Scratch state for one job, covering every node in the graph.
#[derive(Debug, Default)]
pub(crate) struct JobScratch {
    pub(crate) distances: Vec<NodeDistances>,
    pub(crate) topo: Vec<TopoInfo>,
    touched: Vec<NodeId>,
    touched_flags: Vec<bool>,
}

impl JobScratch {
    pub(crate) fn new(num_nodes: usize) -> Self {
        Self {
            distances: vec![NodeDistances::default(); num_nodes],
            topo: (0..num_nodes).map(|_| TopoInfo::default()).collect(),
            touched: Vec::new(),
            touched_flags: vec![false; num_nodes],
        }
    }

    /// Grows the arena when virtual sources were appended after it was
    /// first sized.
    pub(crate) fn ensure_nodes(&mut self, num_nodes: usize) {
        if self.distances.len() < num_nodes {
            self.distances.resize(num_nodes, NodeDistances::default());
            self.topo.resize_with(num_nodes, TopoInfo::default);
            self.touched_flags.resize(num_nodes, false);
        }
    }

    /// Records that a job wrote state for `node`.
    pub(crate) fn touch(&mut self, node: NodeId) {
        if let Some(flag) = self.touched_flags.get_mut(node) {
            if !*flag {
                *flag = true;
                self.touched.push(node);
            }
        }
    }

    /// Nodes the current job has written state for.
    pub(crate) fn touched(&self) -> &[NodeId] {
        &self.touched
    }

    /// Resets every touched node, zeroing buckets up to `cap`.
    pub(crate) fn clear(&mut self, cap: u32) {
        for index in 0..self.touched.len() {
            let node = self.touched[index];
            self.distances[node].clear();
            self.topo[node].clear_job(cap);
            self.touched_flags[node] = false;
        }
        self.touched.clear();
    }

    pub(crate) fn buckets(&self, node: NodeId) -> &NodeBuckets {
        &self.topo[node].buckets
    }

    /// Splits the arena to view one node's buckets while updating
    /// another's topological record. The two ids must differ.
    pub(crate) fn merge_pair(
        &mut self,
        from: NodeId,
        to: NodeId,
    ) -> (&NodeBuckets, &mut TopoInfo) {
        debug_assert_ne!(from, to);
        if from < to {
            let (head, tail) = self.topo.split_at_mut(to);
            (&head[from].buckets, &mut tail[0])
        } else {
            let (head, tail) = self.topo.split_at_mut(from);
            (&tail[0].buckets, &mut head[to])
        }
    }
}

/// Lease-based pool bounding live arenas to the worker count.
#[derive(Debug, Default)]
pub(crate) struct ScratchPool {
    arenas: Mutex<Vec<JobScratch>>,
}

impl ScratchPool {
    /// Takes an arena, creating one sized for `num_nodes` when the pool is
    /// empty. A poisoned pool falls back to a fresh arena; the scratch in
    /// the poisoned pool is discarded with the failed job.
    pub(crate) fn lease(&self, num_nodes: usize) -> JobScratch {
        let mut arena = self
            .arenas
            .lock()
            .map_or_else(|_| JobScratch::new(num_nodes), |mut v| {
                v.pop().unwrap_or_else(|| JobScratch::new(num_nodes))
            });
        arena.ensure_nodes(num_nodes);
        arena
    }

    /// Returns a cleared arena to the pool.
    pub(crate) fn release(&self, arena: JobScratch) {
        if let Ok(mut arenas) = self.arenas.lock() {
            arenas.push(arena);
        }
    }
}
