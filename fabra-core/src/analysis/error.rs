//! Error types raised during routability analysis.

use thiserror::Error;

use crate::graph::NodeId;

/// Stable codes describing [`AnalysisError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum AnalysisErrorCode {
    /// The architecture has no fill block type to exercise.
    NoFillType,
    /// No test tile qualified under the configured margins.
    NoTestTiles,
    /// No configured connection length is realizable in the test area.
    NoRealizableLength,
    /// A job referenced a node outside the graph.
    UnknownNode,
    /// A node required by a job could not be resolved in the lookup.
    MissingPinNode,
    /// A virtual source was requested on a node that is not an input pin.
    NotAnInputPin,
    /// A synchronisation primitive became poisoned after a panic.
    LockPoisoned,
    /// The worker thread pool could not be created.
    WorkerPool,
    /// The demand-multiplier search failed to bracket the target.
    TargetNotBracketed,
}

impl AnalysisErrorCode {
    /// Returns the stable machine-readable representation of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoFillType => "ANALYSIS_NO_FILL_TYPE",
            Self::NoTestTiles => "ANALYSIS_NO_TEST_TILES",
            Self::NoRealizableLength => "ANALYSIS_NO_REALIZABLE_LENGTH",
            Self::UnknownNode => "ANALYSIS_UNKNOWN_NODE",
            Self::MissingPinNode => "ANALYSIS_MISSING_PIN_NODE",
            Self::NotAnInputPin => "ANALYSIS_NOT_AN_INPUT_PIN",
            Self::LockPoisoned => "ANALYSIS_LOCK_POISONED",
            Self::WorkerPool => "ANALYSIS_WORKER_POOL",
            Self::TargetNotBracketed => "ANALYSIS_TARGET_NOT_BRACKETED",
        }
    }
}

/// An error raised while preparing or running the analysis.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AnalysisError {
    /// The architecture has no fill block type to exercise.
    #[error("the architecture has no fill block type")]
    NoFillType,
    /// No test tile qualified under the configured margins.
    #[error("no test tiles inside a {margin}-tile margin on a {width}x{height} grid")]
    NoTestTiles {
        /// Margin excluded around the perimeter.
        margin: u16,
        /// Grid width.
        width: u16,
        /// Grid height.
        height: u16,
    },
    /// No configured connection length is realizable in the test area.
    #[error("none of the configured connection lengths are realizable in the test area")]
    NoRealizableLength,
    /// A job referenced a node outside the graph.
    #[error("job references node {node}, but the graph has {num_nodes} nodes")]
    UnknownNode {
        /// The out-of-range node id.
        node: NodeId,
        /// Number of nodes known to the analysis.
        num_nodes: usize,
    },
    /// A node required by a job could not be resolved in the lookup.
    #[error("no {kind} node at ({x}, {y}) ptc {ptc}")]
    MissingPinNode {
        /// Node kind looked up.
        kind: &'static str,
        /// Tile x coordinate.
        x: u16,
        /// Tile y coordinate.
        y: u16,
        /// Pin/class index looked up.
        ptc: u16,
    },
    /// A virtual source was requested on a node that is not an input pin.
    #[error("node {node} is not an input pin")]
    NotAnInputPin {
        /// The offending node.
        node: NodeId,
    },
    /// A synchronisation primitive became poisoned after a panic.
    #[error("lock for {resource} is poisoned")]
    LockPoisoned {
        /// Name of the poisoned resource.
        resource: &'static str,
    },
    /// The worker thread pool could not be created.
    #[error("failed to build the worker pool: {message}")]
    WorkerPool {
        /// Error reported by the pool builder.
        message: String,
    },
    /// The demand-multiplier search failed to bracket the target.
    #[error("could not bracket target reliability {target} (reliability at multiplier {multiplier} is {reliability})")]
    TargetNotBracketed {
        /// Requested reliability.
        target: f64,
        /// Largest multiplier probed.
        multiplier: f64,
        /// Reliability observed there.
        reliability: f64,
    },
}

impl AnalysisError {
    /// Retrieves the stable [`AnalysisErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> AnalysisErrorCode {
        match self {
            Self::NoFillType => AnalysisErrorCode::NoFillType,
            Self::NoTestTiles { .. } => AnalysisErrorCode::NoTestTiles,
            Self::NoRealizableLength => AnalysisErrorCode::NoRealizableLength,
            Self::UnknownNode { .. } => AnalysisErrorCode::UnknownNode,
            Self::MissingPinNode { .. } => AnalysisErrorCode::MissingPinNode,
            Self::NotAnInputPin { .. } => AnalysisErrorCode::NotAnInputPin,
            Self::LockPoisoned { .. } => AnalysisErrorCode::LockPoisoned,
            Self::WorkerPool { .. } => AnalysisErrorCode::WorkerPool,
            Self::TargetNotBracketed { .. } => AnalysisErrorCode::TargetNotBracketed,
        }
    }
}

/// Convenient alias for analysis results.
pub(crate) type Result<T> = core::result::Result<T, AnalysisError>;
