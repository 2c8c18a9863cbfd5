//! Error types raised while assembling or validating the routing graph.

use thiserror::Error;

use super::node::{NodeId, NodeType};

/// Stable codes describing [`GraphError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum GraphErrorCode {
    /// An edge referenced a node id outside the node table.
    UnknownNode,
    /// An edge referenced a switch id outside the switch table.
    UnknownSwitch,
    /// A pin node carried no side attribute.
    PinWithoutSide,
    /// A wire's ptc index exceeded the sized lookup row.
    PtcOutOfRange,
    /// A block pin number exceeded the block's pin count.
    PinOutOfRange,
    /// The grid contained no tiles.
    EmptyGrid,
    /// A grid tile referenced an unknown block type.
    UnknownBlockType,
    /// The lookup index disagreed with the node table.
    LookupMismatch,
}

impl GraphErrorCode {
    /// Returns the stable machine-readable representation of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownNode => "GRAPH_UNKNOWN_NODE",
            Self::UnknownSwitch => "GRAPH_UNKNOWN_SWITCH",
            Self::PinWithoutSide => "GRAPH_PIN_WITHOUT_SIDE",
            Self::PtcOutOfRange => "GRAPH_PTC_OUT_OF_RANGE",
            Self::PinOutOfRange => "GRAPH_PIN_OUT_OF_RANGE",
            Self::EmptyGrid => "GRAPH_EMPTY_GRID",
            Self::UnknownBlockType => "GRAPH_UNKNOWN_BLOCK_TYPE",
            Self::LookupMismatch => "GRAPH_LOOKUP_MISMATCH",
        }
    }
}

/// An error produced while loading or cross-checking graph structures.
///
/// Every variant is fatal at load; the graph is unusable once one has been
/// observed.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GraphError {
    /// An edge referenced a node id outside the node table.
    #[error("edge references node {node}, but the graph has {num_nodes} nodes")]
    UnknownNode {
        /// The out-of-range node id.
        node: NodeId,
        /// Number of nodes in the graph.
        num_nodes: usize,
    },
    /// An edge referenced a switch id outside the switch table.
    #[error("edge references switch {switch}, but the graph has {num_switches} switches")]
    UnknownSwitch {
        /// The out-of-range switch id.
        switch: usize,
        /// Number of switch types in the graph.
        num_switches: usize,
    },
    /// A pin node carried no side attribute.
    #[error("{node_type} node {node} has no side")]
    PinWithoutSide {
        /// The offending node.
        node: NodeId,
        /// Its type.
        node_type: NodeType,
    },
    /// A wire's ptc index exceeded the sized lookup row.
    #[error("ptc {ptc} for {node_type} at ({x}, {y}) exceeds the channel's {row_len} tracks")]
    PtcOutOfRange {
        /// The offending node's type.
        node_type: NodeType,
        /// Tile x coordinate.
        x: u16,
        /// Tile y coordinate.
        y: u16,
        /// The out-of-range ptc.
        ptc: u16,
        /// Size of the lookup row at that tile.
        row_len: usize,
    },
    /// A block pin number exceeded the block's pin count.
    #[error("block type {block} lists pin {pin}, but declares only {num_pins} pins")]
    PinOutOfRange {
        /// Index of the block type.
        block: usize,
        /// The out-of-range pin number.
        pin: u16,
        /// The block's declared pin count.
        num_pins: usize,
    },
    /// The grid contained no tiles.
    #[error("the device grid contains no tiles")]
    EmptyGrid,
    /// A grid tile referenced an unknown block type.
    #[error("grid tile references block type {type_index}, but only {num_types} exist")]
    UnknownBlockType {
        /// The out-of-range type index.
        type_index: usize,
        /// Number of block types in the table.
        num_types: usize,
    },
    /// The lookup index disagreed with the node table.
    #[error("node lookup mismatch for node {node}: {detail}")]
    LookupMismatch {
        /// The node whose lookup entry is inconsistent.
        node: NodeId,
        /// Human-readable description of the disagreement.
        detail: String,
    },
}

impl GraphError {
    /// Retrieves the stable [`GraphErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> GraphErrorCode {
        match self {
            Self::UnknownNode { .. } => GraphErrorCode::UnknownNode,
            Self::UnknownSwitch { .. } => GraphErrorCode::UnknownSwitch,
            Self::PinWithoutSide { .. } => GraphErrorCode::PinWithoutSide,
            Self::PtcOutOfRange { .. } => GraphErrorCode::PtcOutOfRange,
            Self::PinOutOfRange { .. } => GraphErrorCode::PinOutOfRange,
            Self::EmptyGrid => GraphErrorCode::EmptyGrid,
            Self::UnknownBlockType { .. } => GraphErrorCode::UnknownBlockType,
            Self::LookupMismatch { .. } => GraphErrorCode::LookupMismatch,
        }
    }
}

/// Convenient alias for graph-construction results.
pub type Result<T> = core::result::Result<T, GraphError>;
