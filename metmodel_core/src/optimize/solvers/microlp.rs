//! Solver interface for the pure Rust microlp solver, avoids the glpsol subprocess
use indexmap::IndexMap;
use ::microlp::{
    ComparisonOp, Error as MicrolpError, LinearExpr, OptimizationDirection, Problem, Variable,
};

use crate::optimize::formulation::Formulation;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{FluxResult, OptimizationStatus};

/// Solves formulations in process with microlp
#[derive(Clone, Debug, Default)]
pub struct MicrolpSolver {}

impl MicrolpSolver {
    pub fn new() -> Self {
        MicrolpSolver {}
    }
}

fn parse_value(reaction: &str, value: &str) -> Result<f64, SolverError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| SolverError::InvalidBound {
            reaction: reaction.to_string(),
            value: value.to_string(),
        })
}

impl Solver for MicrolpSolver {
    fn solve(&self, formulation: &Formulation) -> Result<FluxResult, SolverError> {
        let direction = match formulation.objective.sense {
            ObjectiveSense::Maximize => OptimizationDirection::Maximize,
            ObjectiveSense::Minimize => OptimizationDirection::Minimize,
        };
        let mut problem = Problem::new(direction);

        let objective_id = &formulation.objective.reaction_id;
        let mut variables: IndexMap<&str, Variable> = IndexMap::new();
        for (reaction, constraint) in formulation.bounds.iter() {
            let lower = parse_value(reaction, &constraint.lower)?;
            let upper = parse_value(reaction, &constraint.upper)?;
            let coefficient = if reaction == objective_id { 1.0 } else { 0.0 };
            variables.insert(reaction, problem.add_var(coefficient, (lower, upper)));
        }
        // An objective outside the model is a free standing variable, as it is for glpsol
        if !variables.contains_key(objective_id.as_str()) {
            problem.add_var(1.0, (0.0, f64::INFINITY));
        }

        for row in formulation.rows.iter() {
            let mut expression = LinearExpr::empty();
            for (reaction, coefficient) in row.terms.iter() {
                let coefficient = parse_value(reaction, coefficient)?;
                if let Some(variable) = variables.get(reaction.as_str()) {
                    expression.add(*variable, coefficient);
                }
            }
            problem.add_constraint(expression, ComparisonOp::Eq, 0.0);
        }

        let (status, solution) = match problem.solve() {
            Ok(solution) => (OptimizationStatus::Optimal, Some(solution)),
            Err(MicrolpError::Infeasible) => (OptimizationStatus::Infeasible, None),
            Err(MicrolpError::Unbounded) => (OptimizationStatus::Unbounded, None),
            #[allow(unreachable_patterns)]
            Err(err) => return Err(SolverError::Backend(err.to_string())),
        };

        Ok(match solution {
            Some(solution) => FluxResult {
                status,
                objective_value: Some(solution.objective()),
                flux_by_reaction: variables
                    .iter()
                    .map(|(reaction, variable)| (reaction.to_string(), solution[*variable]))
                    .collect(),
                raw_report: None,
            },
            None => FluxResult {
                status,
                objective_value: None,
                flux_by_reaction: IndexMap::new(),
                raw_report: None,
            },
        })
    }
}
