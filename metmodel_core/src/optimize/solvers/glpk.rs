//! Solver interface for the GLPK command line solver, `glpsol`
//!
//! The formulation is written as a CPLEX LP file into a temporary directory, `glpsol` is run
//! on it, and the printed solution report is read back.
use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use derive_builder::Builder;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::configuration::Configuration;
use crate::optimize::formulation::Formulation;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{FluxResult, OptimizationStatus};

/// How often a running solver is checked for completion
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs `glpsol` as a subprocess
#[derive(Builder, Debug, Clone)]
pub struct GlpsolSolver {
    /// Path to, or name of, the glpsol executable
    #[builder(default = "PathBuf::from(\"glpsol\")", setter(into))]
    pub executable: PathBuf,
    /// Wall clock limit for a single solve, the process is killed when it is exceeded
    #[builder(default = "Duration::from_secs(50)")]
    pub timeout: Duration,
}

impl Default for GlpsolSolver {
    fn default() -> Self {
        GlpsolSolver {
            executable: PathBuf::from("glpsol"),
            timeout: Duration::from_secs(50),
        }
    }
}

impl GlpsolSolver {
    pub fn from_configuration(configuration: &Configuration) -> Self {
        GlpsolSolver {
            executable: configuration.glpsol_path.clone(),
            timeout: configuration.solver_timeout(),
        }
    }

    /// Run glpsol on an LP file, with its console output sent to `log_path`
    fn run(&self, lp_path: &Path, report_path: &Path, log_path: &Path) -> Result<(), SolverError> {
        let log = File::create(log_path)?;
        let mut child = Command::new(&self.executable)
            .arg("--cpxlp")
            .arg(lp_path)
            .arg("-o")
            .arg(report_path)
            .stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log)
            .spawn()
            .map_err(|source| SolverError::Spawn {
                program: self.executable.display().to_string(),
                source,
            })?;

        let started = Instant::now();
        let status: ExitStatus = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                warn!("glpsol exceeded {:?}, killing it", self.timeout);
                // The child may have exited in the meantime
                let _ = child.kill();
                let _ = child.wait();
                return Err(SolverError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };
        debug!("glpsol finished in {:?} with {}", started.elapsed(), status);

        if !status.success() {
            return Err(SolverError::NonZeroExit {
                code: status.code(),
                log: fs::read_to_string(log_path).unwrap_or_default(),
            });
        }
        Ok(())
    }
}

impl Solver for GlpsolSolver {
    fn solve(&self, formulation: &Formulation) -> Result<FluxResult, SolverError> {
        let workdir = tempfile::tempdir()?;
        let lp_path = workdir.path().join("model.lp");
        let report_path = workdir.path().join("model.out");
        let log_path = workdir.path().join("glpsol.log");

        fs::write(&lp_path, write_cplex_lp(formulation)?)?;
        self.run(&lp_path, &report_path, &log_path)?;
        let report = fs::read_to_string(&report_path)?;
        parse_report(&report, formulation)
    }
}

/// Render a formulation in the CPLEX LP format read by `glpsol --cpxlp`
pub fn write_cplex_lp(formulation: &Formulation) -> Result<String, SolverError> {
    let mut lp = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(lp, "\\ Flux balance problem\n");
    let _ = writeln!(lp, "\\ Objective function");
    let _ = writeln!(lp, "{}", formulation.objective.sense);
    let _ = writeln!(lp, "  Z : {}\n", formulation.objective.reaction_id);

    let _ = writeln!(lp, "\\ Mass balance equations");
    let _ = writeln!(lp, "Subject To");
    for row in formulation.rows.iter() {
        let mut line = format!("  {} :", row.species);
        for (reaction, coefficient) in row.terms.iter() {
            line.push_str(&lp_coefficient(coefficient));
            line.push(' ');
            line.push_str(reaction);
        }
        let _ = writeln!(lp, "{line} = 0");
    }

    let _ = writeln!(lp, "\n\\ Flux constraints");
    let _ = writeln!(lp, "Bounds");
    for (reaction, constraint) in formulation.bounds.iter() {
        for value in [&constraint.lower, &constraint.upper] {
            if value.trim().parse::<f64>().is_err() {
                return Err(SolverError::InvalidBound {
                    reaction: reaction.clone(),
                    value: value.clone(),
                });
            }
        }
        let _ = writeln!(
            lp,
            "  {} <= {} <= {}",
            constraint.lower, reaction, constraint.upper
        );
    }
    let _ = writeln!(lp, "\nEnd");
    Ok(lp)
}

/// Coefficient as written in front of a variable, ` +`, ` -`, ` +2`, ` -0.5`
fn lp_coefficient(coefficient: &str) -> String {
    let (sign, magnitude) = match coefficient.strip_prefix('-') {
        Some(magnitude) => ('-', magnitude),
        None => ('+', coefficient.strip_prefix('+').unwrap_or(coefficient)),
    };
    if magnitude == "1" {
        format!(" {sign}")
    } else {
        format!(" {sign}{magnitude}")
    }
}

/// Read the solution report written by `glpsol -o`
///
/// Column lines are `No. name status activity ...`. When a name is too long for its column
/// glpsol moves the rest of the line onto the next one, in which case the activity is the
/// second field of that next line.
pub fn parse_report(report: &str, formulation: &Formulation) -> Result<FluxResult, SolverError> {
    let malformed = |reason: String| SolverError::MalformedReport {
        reason,
        report: report.to_string(),
    };
    let parse_value = |value: &str, what: &str| {
        value
            .parse::<f64>()
            .map_err(|_| malformed(format!("invalid {what} `{value}`")))
    };

    let lines: Vec<&str> = report.lines().collect();
    let mut status = None;
    let mut objective_value = None;
    let mut flux_by_reaction = IndexMap::new();
    for (index, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if let Some(text) = line.strip_prefix("Status:") {
            status = Some(OptimizationStatus::from_glpk_status(text));
        }
        if line.starts_with("Objective:") {
            let value = fields
                .get(3)
                .ok_or_else(|| malformed("objective line is too short".to_string()))?;
            objective_value = Some(parse_value(value, "objective value")?);
        }
        let Some(reaction) = fields.get(1).filter(|id| formulation.has_reaction(id)) else {
            continue;
        };
        let value = if fields.len() < 4 {
            lines
                .get(index + 1)
                .and_then(|next| next.split_whitespace().nth(1))
                .ok_or_else(|| malformed(format!("missing value for {reaction}")))?
        } else {
            fields[3]
        };
        flux_by_reaction.insert(reaction.to_string(), parse_value(value, "flux")?);
    }

    let status = status.ok_or_else(|| malformed("missing Status line".to_string()))?;
    let objective_value =
        objective_value.ok_or_else(|| malformed("missing Objective line".to_string()))?;
    Ok(FluxResult {
        status,
        objective_value: Some(objective_value),
        flux_by_reaction,
        raw_report: Some(report.to_string()),
    })
}
