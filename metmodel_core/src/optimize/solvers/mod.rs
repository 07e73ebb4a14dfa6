//! Solver backends for flux balance problems
use std::time::Duration;

use cfg_if::cfg_if;
use thiserror::Error;

use crate::optimize::formulation::Formulation;
use crate::optimize::FluxResult;

pub mod glpk;

cfg_if! {
    if #[cfg(feature = "minilp")] {
        pub mod microlp;
    }
}

/// A backend able to solve a [`Formulation`]
///
/// Solvers are shared across the worker threads of deletion analyses, so must be usable
/// through a shared reference.
pub trait Solver: Send + Sync {
    /// Solve the linear program
    ///
    /// An infeasible or unbounded problem is a successful solve with the matching status,
    /// errors are reserved for failing to run the solver or read its output.
    fn solve(&self, formulation: &Formulation) -> Result<FluxResult, SolverError>;
}

/// Errors from running a solver
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Unable to start solver `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Solver IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Solver did not finish within {0:?}")]
    Timeout(Duration),
    #[error("Solver exited with status {code:?}")]
    NonZeroExit { code: Option<i32>, log: String },
    #[error("Unable to read solver report: {reason}")]
    MalformedReport { reason: String, report: String },
    #[error("Invalid value `{value}` for reaction {reaction}")]
    InvalidBound { reaction: String, value: String },
    #[error("Solver backend error: {0}")]
    Backend(String),
}

impl SolverError {
    /// Solver output captured alongside the error, if any
    pub fn raw_report(&self) -> Option<&str> {
        match self {
            SolverError::NonZeroExit { log, .. } => Some(log),
            SolverError::MalformedReport { report, .. } => Some(report),
            _ => None,
        }
    }
}
