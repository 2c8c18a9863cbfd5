//! Error types raised while reading a routing graph file.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::graph::GraphError;

/// Stable codes describing [`ParseError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ParseErrorCode {
    /// The file could not be opened or read.
    Io,
    /// The file is not named like an XML document.
    NotXml,
    /// The XML was malformed.
    Xml,
    /// A required element was absent.
    MissingElement,
    /// A required attribute was absent.
    MissingAttribute,
    /// An attribute carried an unparseable or unrecognised value.
    InvalidAttribute,
    /// Two nodes carried the same id.
    DuplicateNode,
    /// A node id was listed nowhere in the file.
    MissingNode,
    /// An edge referenced an id outside the node table.
    UnknownNodeId,
    /// Graph assembly or lookup verification failed.
    Graph,
}

impl ParseErrorCode {
    /// Returns the stable machine-readable representation of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Io => "PARSE_IO",
            Self::NotXml => "PARSE_NOT_XML",
            Self::Xml => "PARSE_XML",
            Self::MissingElement => "PARSE_MISSING_ELEMENT",
            Self::MissingAttribute => "PARSE_MISSING_ATTRIBUTE",
            Self::InvalidAttribute => "PARSE_INVALID_ATTRIBUTE",
            Self::DuplicateNode => "PARSE_DUPLICATE_NODE",
            Self::MissingNode => "PARSE_MISSING_NODE",
            Self::UnknownNodeId => "PARSE_UNKNOWN_NODE_ID",
            Self::Graph => "PARSE_GRAPH",
        }
    }
}

/// An error raised while loading a routing graph file. All fatal.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file could not be opened or read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The file is not named like an XML document.
    #[error("`{path}` does not have an .xml extension")]
    NotXml {
        /// The rejected path.
        path: PathBuf,
    },
    /// The XML was malformed.
    #[error("malformed XML: {message}")]
    Xml {
        /// Parser diagnostic.
        message: String,
    },
    /// A required element was absent.
    #[error("missing element <{element}>")]
    MissingElement {
        /// Name of the absent element.
        element: &'static str,
    },
    /// A required attribute was absent.
    #[error("element <{element}> is missing attribute `{attribute}`")]
    MissingAttribute {
        /// The element the attribute belongs to.
        element: &'static str,
        /// The absent attribute.
        attribute: &'static str,
    },
    /// An attribute carried an unparseable or unrecognised value.
    #[error("element <{element}> attribute `{attribute}` has invalid value `{value}`")]
    InvalidAttribute {
        /// The element the attribute belongs to.
        element: &'static str,
        /// The attribute name.
        attribute: &'static str,
        /// The offending raw value.
        value: String,
    },
    /// Two nodes carried the same id.
    #[error("node id {id} appears more than once")]
    DuplicateNode {
        /// The repeated id.
        id: usize,
    },
    /// A node id was listed nowhere in the file.
    #[error("node id {id} is never defined")]
    MissingNode {
        /// The undefined id.
        id: usize,
    },
    /// An edge referenced an id outside the node table.
    #[error("edge references node {id}, but only {num_nodes} nodes were defined")]
    UnknownNodeId {
        /// The out-of-range id.
        id: usize,
        /// Number of nodes defined in the file.
        num_nodes: usize,
    },
    /// Graph assembly or lookup verification failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl ParseError {
    /// Retrieves the stable [`ParseErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> ParseErrorCode {
        match self {
            Self::Io { .. } => ParseErrorCode::Io,
            Self::NotXml { .. } => ParseErrorCode::NotXml,
            Self::Xml { .. } => ParseErrorCode::Xml,
            Self::MissingElement { .. } => ParseErrorCode::MissingElement,
            Self::MissingAttribute { .. } => ParseErrorCode::MissingAttribute,
            Self::InvalidAttribute { .. } => ParseErrorCode::InvalidAttribute,
            Self::DuplicateNode { .. } => ParseErrorCode::DuplicateNode,
            Self::MissingNode { .. } => ParseErrorCode::MissingNode,
            Self::UnknownNodeId { .. } => ParseErrorCode::UnknownNodeId,
            Self::Graph(_) => ParseErrorCode::Graph,
        }
    }
}

/// Convenient alias for parser results.
pub(crate) type Result<T> = core::result::Result<T, ParseError>;
