//! Shared per-node demand table.
//!
//! Demands are the only cross-job mutable state besides the path-count
//! history: every job deposits the demand its connection induces, and
//! later jobs read the accumulated totals during probability analysis.
//! Deposits commute, so jobs may land in any order; each node's slot is
//! guarded by its own mutex.

use std::sync::Mutex;

use crate::graph::{NodeId, RoutingGraph};

use super::error::{AnalysisError, Result};

/// Per-node accumulated demand.
#[derive(Debug)]
pub(crate) struct DemandMap {
    slots: Vec<Mutex<f64>>,
    /// When set, wires report exactly this demand and everything else
    /// reports zero; deposits still accumulate but are never read.
    fixed_wire_demand: Option<f64>,
}

impl DemandMap {
    pub(crate) fn new(num_nodes: usize, fixed_wire_demand: Option<f64>) -> Self {
        Self {
            slots: (0..num_nodes).map(|_| Mutex::new(0.0)).collect(),
            fixed_wire_demand,
        }
    }

    /// Builds a table preloaded with explicit per-node demands.
    pub(crate) fn from_values(values: Vec<f64>) -> Self {
        Self {
            slots: values.into_iter().map(Mutex::new).collect(),
            fixed_wire_demand: None,
        }
    }

    /// Effective demand of `node` for probability analysis.
    pub(crate) fn demand(&self, graph: &RoutingGraph, node: NodeId) -> Result<f64> {
        if let Some(fixed) = self.fixed_wire_demand {
            let is_wire = graph.node(node).is_some_and(|n| n.node_type().is_wire());
            return Ok(if is_wire { fixed } else { 0.0 });
        }
        let slot = self.slots.get(node).ok_or(AnalysisError::UnknownNode {
            node,
            num_nodes: self.slots.len(),
        })?;
        let value = slot.lock().map_err(|_| AnalysisError::LockPoisoned {
            resource: "node demand",
        })?;
        Ok(*value)
    }

    /// Adds `amount` to `node`'s accumulated demand.
    pub(crate) fn deposit(&self, node: NodeId, amount: f64) -> Result<()> {
        let slot = self.slots.get(node).ok_or(AnalysisError::UnknownNode {
            node,
            num_nodes: self.slots.len(),
        })?;
        let mut value = slot.lock().map_err(|_| AnalysisError::LockPoisoned {
            resource: "node demand",
        })?;
        *value += amount;
        Ok(())
    }

    /// Zeroes every slot; used between demand-multiplier search steps.
    pub(crate) fn reset(&self) -> Result<()> {
        for slot in &self.slots {
            let mut value = slot.lock().map_err(|_| AnalysisError::LockPoisoned {
                resource: "node demand",
            })?;
            *value = 0.0;
        }
        Ok(())
    }

    /// Grows the table when virtual sources were appended after creation.
    pub(crate) fn ensure_nodes(&mut self, num_nodes: usize) {
        while self.slots.len() < num_nodes {
            self.slots.push(Mutex::new(0.0));
        }
    }
}
