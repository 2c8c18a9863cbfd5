//! User-facing configuration for a routability run.
//!
//! Options are assembled through [`UserOptionsBuilder`], which validates the
//! probability lists and thread counts up front so analysis code can assume
//! a well-formed configuration. No global state: the validated options are
//! passed as a context parameter to every component entry point.

use std::{num::NonZeroUsize, path::PathBuf};

use thiserror::Error;

use crate::PROB_TOL;

/// How the routing graph file is structured.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum GraphMode {
    /// Full VPR dump: nodes, switches, edges, block types, grid, channels.
    #[default]
    Vpr,
    /// Bare graph: nodes, switches, and edges only.
    Simple,
}

impl GraphMode {
    /// Returns the display name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vpr => "RR_GRAPH_VPR",
            Self::Simple => "RR_GRAPH_SIMPLE",
        }
    }
}

/// How demand a connection contributes to its own path is discounted.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SelfCongestionMode {
    /// No discounting.
    #[default]
    None,
    /// Discount from per-node path-count history within a Manhattan radius
    /// of the connection's endpoints.
    Radius,
    /// Discount the exact per-parent, per-path-weight demand contributions
    /// recorded during enumeration.
    PathDependence,
}

/// Whether bucket indices mean accumulated path weight or hop count.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum BucketMode {
    /// Bucket index is the accumulated path weight.
    #[default]
    ByPathWeight,
    /// Bucket index is the number of hops from the endpoint.
    ByPathHops,
}

/// Stable codes describing [`OptionsError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum OptionsErrorCode {
    /// `max_connection_length` was zero.
    InvalidConnectionLength,
    /// A probability fell outside `[0, 1]`.
    InvalidProbability,
    /// The length-probability list was empty or did not sum to one.
    InvalidLengthProbabilities,
    /// `demand_multiplier` was not positive.
    InvalidDemandMultiplier,
    /// `target_reliability` fell outside `[0, 1]`.
    InvalidTargetReliability,
}

impl OptionsErrorCode {
    /// Returns the stable machine-readable representation of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConnectionLength => "OPTIONS_INVALID_CONNECTION_LENGTH",
            Self::InvalidProbability => "OPTIONS_INVALID_PROBABILITY",
            Self::InvalidLengthProbabilities => "OPTIONS_INVALID_LENGTH_PROBABILITIES",
            Self::InvalidDemandMultiplier => "OPTIONS_INVALID_DEMAND_MULTIPLIER",
            Self::InvalidTargetReliability => "OPTIONS_INVALID_TARGET_RELIABILITY",
        }
    }
}

/// Configuration rejected by [`UserOptionsBuilder::build`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum OptionsError {
    /// `max_connection_length` was zero.
    #[error("max_connection_length must be at least 1")]
    InvalidConnectionLength,
    /// A probability fell outside `[0, 1]`.
    #[error("{name} must lie in [0, 1] (got {got})")]
    InvalidProbability {
        /// Which option carried the bad value.
        name: &'static str,
        /// The rejected value.
        got: f64,
    },
    /// The length-probability list was empty or did not sum to one.
    #[error("length probabilities must sum to 1 (got {sum} over {count} entries)")]
    InvalidLengthProbabilities {
        /// Sum of the provided list.
        sum: f64,
        /// Number of entries provided.
        count: usize,
    },
    /// `demand_multiplier` was not positive.
    #[error("demand_multiplier must be positive (got {got})")]
    InvalidDemandMultiplier {
        /// The rejected value.
        got: f64,
    },
    /// `target_reliability` fell outside `[0, 1]`.
    #[error("target_reliability must lie in [0, 1] (got {got})")]
    InvalidTargetReliability {
        /// The rejected value.
        got: f64,
    },
}

impl OptionsError {
    /// Retrieves the stable [`OptionsErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> OptionsErrorCode {
        match self {
            Self::InvalidConnectionLength => OptionsErrorCode::InvalidConnectionLength,
            Self::InvalidProbability { .. } => OptionsErrorCode::InvalidProbability,
            Self::InvalidLengthProbabilities { .. } => {
                OptionsErrorCode::InvalidLengthProbabilities
            }
            Self::InvalidDemandMultiplier { .. } => OptionsErrorCode::InvalidDemandMultiplier,
            Self::InvalidTargetReliability { .. } => OptionsErrorCode::InvalidTargetReliability,
        }
    }
}

/// Validated options for one routability run.
#[derive(Clone, Debug)]
pub struct UserOptions {
    /// Path to the routing graph file.
    pub rr_graph_file: PathBuf,
    /// Structure of the graph file.
    pub graph_mode: GraphMode,
    /// Longest Manhattan connection length analysed.
    pub max_connection_length: usize,
    /// Restrict test tiles to the device core.
    pub analyze_core: bool,
    /// When set, wires carry exactly this demand and enumeration deposits
    /// are ignored.
    pub use_routing_node_demand: Option<f64>,
    /// Worker threads for enumeration and probability analysis.
    pub num_threads: NonZeroUsize,
    /// When set, search for the demand multiplier hitting this reliability.
    pub target_reliability: Option<f64>,
    /// Self-congestion discounting scheme.
    pub self_congestion_mode: SelfCongestionMode,
    /// Usage probability of each receiver pin.
    pub ipin_probability: f64,
    /// Usage probability of each driver pin.
    pub opin_probability: f64,
    /// Scale factor applied to every demand deposit.
    pub demand_multiplier: f64,
    /// Occurrence probability per connection length, index 0 = length 1.
    pub length_probabilities: Vec<f64>,
}

impl UserOptions {
    /// Starts building options for the given graph file.
    #[must_use]
    pub fn builder(rr_graph_file: impl Into<PathBuf>) -> UserOptionsBuilder {
        UserOptionsBuilder::new(rr_graph_file)
    }
}

/// Builder validating [`UserOptions`].
#[derive(Clone, Debug)]
pub struct UserOptionsBuilder {
    rr_graph_file: PathBuf,
    graph_mode: GraphMode,
    max_connection_length: usize,
    analyze_core: bool,
    use_routing_node_demand: Option<f64>,
    num_threads: NonZeroUsize,
    target_reliability: Option<f64>,
    self_congestion_mode: SelfCongestionMode,
    ipin_probability: f64,
    opin_probability: f64,
    demand_multiplier: f64,
    length_probabilities: Option<Vec<f64>>,
}

impl UserOptionsBuilder {
    /// Creates a builder with the defaults: VPR mode, connection length 3,
    /// one thread, no target reliability, no self-congestion discounting,
    /// pin probabilities 1, demand multiplier 1.
    #[must_use]
    pub fn new(rr_graph_file: impl Into<PathBuf>) -> Self {
        Self {
            rr_graph_file: rr_graph_file.into(),
            graph_mode: GraphMode::Vpr,
            max_connection_length: 3,
            analyze_core: false,
            use_routing_node_demand: None,
            num_threads: NonZeroUsize::MIN,
            target_reliability: None,
            self_congestion_mode: SelfCongestionMode::None,
            ipin_probability: 1.0,
            opin_probability: 1.0,
            demand_multiplier: 1.0,
            length_probabilities: None,
        }
    }

    /// Sets the graph file structure.
    #[must_use]
    pub fn with_graph_mode(mut self, mode: GraphMode) -> Self {
        self.graph_mode = mode;
        self
    }

    /// Sets the longest analysed connection length.
    #[must_use]
    pub fn with_max_connection_length(mut self, length: usize) -> Self {
        self.max_connection_length = length;
        self
    }

    /// Restricts test tiles to the device core.
    #[must_use]
    pub fn with_analyze_core(mut self, analyze_core: bool) -> Self {
        self.analyze_core = analyze_core;
        self
    }

    /// Fixes wire demand to a constant instead of enumeration deposits.
    #[must_use]
    pub fn with_routing_node_demand(mut self, demand: f64) -> Self {
        self.use_routing_node_demand = Some(demand);
        self
    }

    /// Sets the worker thread count.
    #[must_use]
    pub fn with_num_threads(mut self, threads: NonZeroUsize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Requests a demand-multiplier search for the given reliability.
    #[must_use]
    pub fn with_target_reliability(mut self, target: f64) -> Self {
        self.target_reliability = Some(target);
        self
    }

    /// Selects the self-congestion discounting scheme.
    #[must_use]
    pub fn with_self_congestion_mode(mut self, mode: SelfCongestionMode) -> Self {
        self.self_congestion_mode = mode;
        self
    }

    /// Sets the receiver-pin usage probability.
    #[must_use]
    pub fn with_ipin_probability(mut self, probability: f64) -> Self {
        self.ipin_probability = probability;
        self
    }

    /// Sets the driver-pin usage probability.
    #[must_use]
    pub fn with_opin_probability(mut self, probability: f64) -> Self {
        self.opin_probability = probability;
        self
    }

    /// Sets the demand scale factor.
    #[must_use]
    pub fn with_demand_multiplier(mut self, multiplier: f64) -> Self {
        self.demand_multiplier = multiplier;
        self
    }

    /// Supplies the per-length occurrence probabilities (index 0 = length
    /// 1). Defaults to uniform over `1..=max_connection_length`.
    #[must_use]
    pub fn with_length_probabilities(mut self, probabilities: Vec<f64>) -> Self {
        self.length_probabilities = Some(probabilities);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`OptionsError`] when a probability leaves `[0, 1]`, the
    /// length probabilities do not sum to one, the connection length is
    /// zero, or the demand multiplier is not positive.
    pub fn build(self) -> Result<UserOptions, OptionsError> {
        if self.max_connection_length == 0 {
            return Err(OptionsError::InvalidConnectionLength);
        }
        check_probability("ipin_probability", self.ipin_probability)?;
        check_probability("opin_probability", self.opin_probability)?;
        if let Some(demand) = self.use_routing_node_demand {
            check_probability("use_routing_node_demand", demand)?;
        }
        if self.demand_multiplier <= 0.0 {
            return Err(OptionsError::InvalidDemandMultiplier {
                got: self.demand_multiplier,
            });
        }
        if let Some(target) = self.target_reliability {
            if !(0.0..=1.0).contains(&target) {
                return Err(OptionsError::InvalidTargetReliability { got: target });
            }
        }

        let length_probabilities = match self.length_probabilities {
            Some(list) => {
                let sum: f64 = list.iter().sum();
                if list.is_empty() || (sum - 1.0).abs() > PROB_TOL {
                    return Err(OptionsError::InvalidLengthProbabilities {
                        sum,
                        count: list.len(),
                    });
                }
                if let Some(&bad) = list.iter().find(|p| !(0.0..=1.0).contains(*p)) {
                    return Err(OptionsError::InvalidProbability {
                        name: "length_probabilities",
                        got: bad,
                    });
                }
                list
            }
            None => {
                let count = self.max_connection_length;
                vec![1.0 / count as f64; count]
            }
        };

        Ok(UserOptions {
            rr_graph_file: self.rr_graph_file,
            graph_mode: self.graph_mode,
            max_connection_length: self.max_connection_length,
            analyze_core: self.analyze_core,
            use_routing_node_demand: self.use_routing_node_demand,
            num_threads: self.num_threads,
            target_reliability: self.target_reliability,
            self_congestion_mode: self.self_congestion_mode,
            ipin_probability: self.ipin_probability,
            opin_probability: self.opin_probability,
            demand_multiplier: self.demand_multiplier,
            length_probabilities,
        })
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), OptionsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(OptionsError::InvalidProbability { name, got: value })
    }
}
