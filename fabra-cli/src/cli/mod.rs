//! Command-line interface orchestration for the fabra analysis pipeline.
//!
//! The CLI offers an `analyze` command that loads a routing graph dump and
//! prints the fabric's estimated reliability, plus the demand multiplier
//! when a target reliability was requested.

mod commands;

pub use commands::{
    AnalyzeCommand, Cli, CliError, Command, CongestionArg, ExecutionSummary, GraphModeArg,
    render_summary, run_cli,
};

#[cfg(test)]
mod tests;
