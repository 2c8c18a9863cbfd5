//! Routability analysis: distances, topological enumeration, probability
//! propagation, and the worker pool that drives them.

mod buckets;
mod demand;
mod distances;
mod enumerate;
mod error;
mod history;
mod pool;
mod probability;
mod scratch;
mod settings;
mod topo;
mod virtual_source;

pub use self::{
    error::{AnalysisError, AnalysisErrorCode},
    pool::{
        AnalysisOutcome, ConnectionAnalysis, PATH_COUNT_HISTORY_RADIUS, analyze_connection,
        run_analysis,
    },
    settings::{AnalysisSettings, PATH_WEIGHT_SLACK},
    virtual_source::{VirtualSource, attach_virtual_source},
};

#[cfg(test)]
mod tests;
