//! Per-node path-weight buckets.
//!
//! Each node carries two dense accumulator arrays, one keyed against the
//! connection's source and one against its sink. During enumeration an
//! entry holds the number of distinct legal partial paths of that exact
//! weight (or hop count); during probability analysis it holds the
//! probability that no such partial path is usable. Arrays grow to the
//! job's weight cap and are cleared selectively so an oversized tail from
//! an earlier job is never re-zeroed.

/// Source- and sink-keyed accumulators for one node.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct NodeBuckets {
    source: Vec<f64>,
    sink: Vec<f64>,
}

impl NodeBuckets {
    /// Grows both arrays to hold indices `0..=cap`.
    pub(crate) fn ensure_capacity(&mut self, cap: u32) {
        let len = cap as usize + 1;
        if self.source.len() < len {
            self.source.resize(len, 0.0);
        }
        if self.sink.len() < len {
            self.sink.resize(len, 0.0);
        }
    }

    /// Zeroes indices `0..=cap`, leaving any longer tail untouched.
    pub(crate) fn clear_up_to(&mut self, cap: u32) {
        let len = (cap as usize + 1).min(self.source.len());
        self.source[..len].fill(0.0);
        let len = (cap as usize + 1).min(self.sink.len());
        self.sink[..len].fill(0.0);
    }

    /// Source-keyed entry at `weight`, zero when out of range.
    pub(crate) fn source_at(&self, weight: u32) -> f64 {
        self.source.get(weight as usize).copied().unwrap_or(0.0)
    }

    /// Sink-keyed entry at `weight`, zero when out of range.
    pub(crate) fn sink_at(&self, weight: u32) -> f64 {
        self.sink.get(weight as usize).copied().unwrap_or(0.0)
    }

    pub(crate) fn source_mut(&mut self) -> &mut [f64] {
        &mut self.source
    }

    pub(crate) fn sink_mut(&mut self) -> &mut [f64] {
        &mut self.sink
    }

    /// Fills the source-keyed entries `0..=cap` with `value`. Used to seed
    /// the probability pass, where an untouched bucket means "no usable
    /// path of this weight" (probability one of non-reachability).
    pub(crate) fn fill_source_up_to(&mut self, cap: u32, value: f64) {
        self.ensure_capacity(cap);
        let len = cap as usize + 1;
        self.source[..len].fill(value);
    }

    /// Number of legal source-to-sink paths through this node: every
    /// combination of a source-side prefix and sink-side suffix whose total
    /// weight, with the node's own weight, fits the cap.
    pub(crate) fn num_paths(&self, node_weight: u32, cap: u32) -> f64 {
        if node_weight > cap {
            return 0.0;
        }
        let budget = cap - node_weight;
        let mut total = 0.0;
        for (w1, &prefixes) in self.source.iter().enumerate() {
            if w1 as u32 > budget || prefixes == 0.0 {
                continue;
            }
            total += prefixes * self.suffix_sum(budget - w1 as u32);
        }
        total
    }

    /// Number of sink-side completions for a prefix of weight `w1`.
    pub(crate) fn completions(&self, node_weight: u32, w1: u32, cap: u32) -> f64 {
        if node_weight + w1 > cap {
            return 0.0;
        }
        self.suffix_sum(cap - node_weight - w1)
    }

    /// Probability that the source cannot be reached from this node's
    /// source-keyed buckets, assuming weight classes are independent.
    pub(crate) fn probability_not_reachable(&self, cap: u32) -> f64 {
        let len = (cap as usize + 1).min(self.source.len());
        self.source[..len].iter().product()
    }

    fn suffix_sum(&self, max_weight: u32) -> f64 {
        let len = (max_weight as usize + 1).min(self.sink.len());
        self.sink[..len].iter().sum()
    }
}
