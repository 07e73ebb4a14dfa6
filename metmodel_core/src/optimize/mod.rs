//! Module for formulating flux balance problems and interpreting their solutions

pub mod formulation;
pub mod objective;
pub mod solvers;

use indexmap::IndexMap;
use serde::Serialize;

use crate::optimize::solvers::SolverError;

/// Struct representing the solution to a flux balance problem
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FluxResult {
    /// The status of the optimization problem, representing if the optimization was
    /// completed successfully
    pub status: OptimizationStatus,
    /// Optimized value of the objective
    ///
    /// Some(f64) if the solver reported one, None otherwise
    pub objective_value: Option<f64>,
    /// Flux through each reaction at the optimum, keyed by reaction id
    pub flux_by_reaction: IndexMap<String, f64>,
    /// Unparsed solver output, kept for diagnostics
    pub raw_report: Option<String>,
}

impl FluxResult {
    /// Result recording a failed solve, the error text is kept as the raw report
    pub fn from_solver_error(error: &SolverError) -> Self {
        let raw_report = match error.raw_report() {
            Some(report) => format!("{error}\n{report}"),
            None => error.to_string(),
        };
        FluxResult {
            status: OptimizationStatus::Error,
            objective_value: None,
            flux_by_reaction: IndexMap::new(),
            raw_report: Some(raw_report),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == OptimizationStatus::Optimal
    }
}

/// Status of an optimization problem
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum OptimizationStatus {
    /// Problem has been optimized
    Optimal,
    /// Problem can't be solved because it is infeasible (conflicting constraints)
    Infeasible,
    /// Problem can't be optimized because objective value is not bounded
    Unbounded,
    /// The solver could not be run, or its output could not be read
    Error,
    /// The solver reported a status with no better match
    Unknown,
}

impl OptimizationStatus {
    /// Map the text after `Status:` in a glpsol report (`OPTIMAL`, `INFEASIBLE (FINAL)`,
    /// `INTEGER OPTIMAL`, ...)
    pub fn from_glpk_status(text: &str) -> Self {
        let status = text.split('(').next().unwrap_or_default().trim();
        match status {
            "OPTIMAL" | "INTEGER OPTIMAL" => OptimizationStatus::Optimal,
            "INFEASIBLE" | "EMPTY" | "INTEGER EMPTY" => OptimizationStatus::Infeasible,
            "UNBOUNDED" => OptimizationStatus::Unbounded,
            _ => OptimizationStatus::Unknown,
        }
    }
}
