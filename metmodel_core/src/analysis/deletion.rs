//! Single and pairwise deletion analysis
//!
//! Items (genes, proteins, or reactions) are removed one at a time, or reactions two at a
//! time, and the model is re-solved with the affected reactions blocked. A deletion is lethal
//! when the solve is not optimal, or the objective falls below a fraction of the wild type
//! objective.
//!
//! The model is never modified. Each deletion solves a copy of the wild type formulation
//! with the blocked reactions' bounds replaced, so deletions are independent and run on a
//! rayon thread pool.
use std::sync::atomic::{AtomicBool, Ordering};

use derive_builder::Builder;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::configuration::Configuration;
use crate::metabolic_model::gene::{GeneActivity, GeneAssociations, GprError};
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::{BoundaryKind, Constraint};
use crate::optimize::formulation::{Formulation, FormulationError};
use crate::optimize::solvers::Solver;
use crate::optimize::{FluxResult, OptimizationStatus};

/// Settings for deletion analyses
#[derive(Builder, Clone, Debug, PartialEq)]
pub struct DeletionOptions {
    /// Fraction of the wild type objective below which a deletion is lethal
    #[builder(default = "0.25")]
    pub lethal_fraction: f64,
    /// Number of worker threads
    #[builder(default = "1")]
    pub processes: usize,
    /// Leave reactions which are lethal on their own out of the pairwise search
    #[builder(default = "true")]
    pub exclude_essential: bool,
}

impl Default for DeletionOptions {
    fn default() -> Self {
        DeletionOptions {
            lethal_fraction: 0.25,
            processes: 1,
            exclude_essential: true,
        }
    }
}

impl DeletionOptions {
    pub fn from_configuration(configuration: &Configuration) -> Self {
        DeletionOptions {
            lethal_fraction: configuration.lethal_fraction,
            processes: configuration.processes,
            ..DeletionOptions::default()
        }
    }
}

/// Outcome of solving with a set of reactions blocked
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Knockout {
    /// Reactions constrained to zero flux
    pub reactions: Vec<String>,
    pub status: OptimizationStatus,
    pub objective_value: Option<f64>,
    pub lethal: bool,
    /// Set when the solver itself failed, such failures are counted as lethal
    pub solver_error: Option<String>,
}

/// A lethal item of a single deletion analysis, with the knockouts that were lethal
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemDeletion {
    pub item: String,
    pub knockouts: Vec<Knockout>,
}

/// Results of a single deletion analysis
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SingleDeletionReport {
    pub wild_type_objective: f64,
    /// Number of items deleted
    pub tested: usize,
    /// Lethal items, sorted by item id
    pub lethal: Vec<ItemDeletion>,
    /// Number of solves where the solver failed
    pub failures: usize,
    /// Whether the analysis stopped before every item was deleted
    pub cancelled: bool,
}

impl SingleDeletionReport {
    pub fn lethal_items(&self) -> Vec<&str> {
        self.lethal.iter().map(|item| item.item.as_str()).collect()
    }
}

/// Results of a pairwise reaction deletion analysis
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PairwiseDeletionReport {
    pub wild_type_objective: f64,
    /// Reactions paired with one another, sorted
    pub candidates: Vec<String>,
    /// Reactions left out because they are lethal on their own
    pub excluded_essential: Vec<String>,
    /// Number of pairs deleted
    pub tested: usize,
    /// Lethal pairs, in lexicographic order
    pub lethal: Vec<Knockout>,
    /// Number of solves where the solver failed
    pub failures: usize,
    /// Whether the analysis stopped before every pair was deleted
    pub cancelled: bool,
}

impl PairwiseDeletionReport {
    pub fn lethal_pairs(&self) -> Vec<(&str, &str)> {
        self.lethal
            .iter()
            .filter_map(|knockout| match knockout.reactions.as_slice() {
                [first, second] => Some((first.as_str(), second.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// Errors which prevent a deletion analysis from running
#[derive(Debug, Error)]
pub enum DeletionError {
    #[error(transparent)]
    Formulation(#[from] FormulationError),
    #[error("Wild type solve was not optimal ({status:?}), deletions cannot be classified")]
    WildTypeNotOptimal {
        status: OptimizationStatus,
        report: Option<String>,
    },
    #[error(transparent)]
    Gpr(#[from] GprError),
    #[error("Unable to start worker threads: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// The unperturbed problem every deletion is compared against
struct Baseline<'a> {
    formulation: Formulation,
    objective: f64,
    solver: &'a dyn Solver,
    lethal_fraction: f64,
}

impl<'a> Baseline<'a> {
    fn solve(
        model: &Model,
        solver: &'a dyn Solver,
        options: &DeletionOptions,
    ) -> Result<Self, DeletionError> {
        let formulation = Formulation::build(model)?;
        let result = solver
            .solve(&formulation)
            .unwrap_or_else(|err| FluxResult::from_solver_error(&err));
        match (result.status, result.objective_value) {
            (OptimizationStatus::Optimal, Some(objective)) => {
                info!("Wild type objective {}", objective);
                Ok(Baseline {
                    formulation,
                    objective,
                    solver,
                    lethal_fraction: options.lethal_fraction,
                })
            }
            (status, _) => Err(DeletionError::WildTypeNotOptimal {
                status,
                report: result.raw_report,
            }),
        }
    }

    /// Solve with `reactions` blocked and classify the result
    fn knockout(&self, reactions: &[&str]) -> Knockout {
        let formulation = self.formulation.with_bound_overrides(
            reactions
                .iter()
                .map(|reaction| (*reaction, Constraint::blocked())),
        );
        let (result, solver_error) = match self.solver.solve(&formulation) {
            Ok(result) => (result, None),
            Err(err) => {
                warn!("Solver failed with {:?} blocked: {}", reactions, err);
                (FluxResult::from_solver_error(&err), Some(err.to_string()))
            }
        };
        let lethal = match (result.status, result.objective_value) {
            (OptimizationStatus::Optimal, Some(objective)) => {
                objective < self.lethal_fraction * self.objective
            }
            _ => true,
        };
        debug!(
            "Blocked {:?}: {:?} {:?}, lethal {}",
            reactions, result.status, result.objective_value, lethal
        );
        Knockout {
            reactions: reactions.iter().map(|reaction| reaction.to_string()).collect(),
            status: result.status,
            objective_value: result.objective_value,
            lethal,
            solver_error,
        }
    }
}

fn thread_pool(options: &DeletionOptions) -> Result<ThreadPool, DeletionError> {
    ThreadPoolBuilder::new()
        .num_threads(options.processes.max(1))
        .build()
        .map_err(DeletionError::from)
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Delete every item of `associations` one at a time
///
/// For each item, the reactions whose rule becomes inactive are each blocked individually
/// and re-solved. The item is lethal if any of those solves is lethal. Items which disable
/// no reaction are not lethal.
///
/// Setting `cancel` stops further items from being started, the report then covers the
/// items which finished.
pub fn single_deletion(
    model: &Model,
    solver: &dyn Solver,
    associations: &GeneAssociations,
    options: &DeletionOptions,
    cancel: Option<&AtomicBool>,
) -> Result<SingleDeletionReport, DeletionError> {
    let pool = thread_pool(options)?;
    let baseline = Baseline::solve(model, solver, options)?;
    single_deletion_with(&pool, &baseline, associations, cancel)
}

fn single_deletion_with(
    pool: &ThreadPool,
    baseline: &Baseline,
    associations: &GeneAssociations,
    cancel: Option<&AtomicBool>,
) -> Result<SingleDeletionReport, DeletionError> {
    let items = associations.items();
    info!("Deleting {} items one at a time", items.len());
    let states = associations.all_active();

    let outcomes: Vec<Option<Result<(String, Vec<Knockout>), GprError>>> = pool.install(|| {
        items
            .par_iter()
            .map_with(states, |states, item| {
                if is_cancelled(cancel) {
                    return None;
                }
                states.insert(item.clone(), GeneActivity::Inactive);
                let disabled = associations.disabled_reactions(states);
                states.insert(item.clone(), GeneActivity::Active);
                let knockouts = disabled.map(|disabled| {
                    disabled
                        .iter()
                        .filter(|reaction| baseline.formulation.has_reaction(reaction))
                        .map(|reaction| baseline.knockout(&[reaction.as_str()]))
                        .collect::<Vec<_>>()
                });
                Some(knockouts.map(|knockouts| (item.clone(), knockouts)))
            })
            .collect()
    });

    let mut report = SingleDeletionReport {
        wild_type_objective: baseline.objective,
        tested: 0,
        lethal: Vec::new(),
        failures: 0,
        cancelled: false,
    };
    for outcome in outcomes {
        let Some(outcome) = outcome else {
            report.cancelled = true;
            continue;
        };
        let (item, knockouts) = outcome?;
        report.tested += 1;
        report.failures += knockouts
            .iter()
            .filter(|knockout| knockout.solver_error.is_some())
            .count();
        let lethal: Vec<Knockout> = knockouts
            .into_iter()
            .filter(|knockout| knockout.lethal)
            .collect();
        if !lethal.is_empty() {
            report.lethal.push(ItemDeletion {
                item,
                knockouts: lethal,
            });
        }
    }
    report.lethal.sort_by(|a, b| a.item.cmp(&b.item));
    info!(
        "{} of {} items are lethal, {} solver failures",
        report.lethal.len(),
        report.tested,
        report.failures
    );
    Ok(report)
}

/// Delete every unordered pair of reactions
///
/// The objective reaction and generated source and escape reactions are never deleted.
/// With [`DeletionOptions::exclude_essential`] set, reactions lethal on their own are left
/// out as well, since every pair containing them would be lethal.
pub fn pairwise_deletion(
    model: &Model,
    solver: &dyn Solver,
    options: &DeletionOptions,
    cancel: Option<&AtomicBool>,
) -> Result<PairwiseDeletionReport, DeletionError> {
    let pool = thread_pool(options)?;
    let baseline = Baseline::solve(model, solver, options)?;

    let excluded_essential = if options.exclude_essential {
        let singles = single_deletion_with(
            &pool,
            &baseline,
            &GeneAssociations::reaction_level(model),
            cancel,
        )?;
        singles
            .lethal_items()
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    let objective_id = baseline.formulation.objective.reaction_id.as_str();
    let mut candidates: Vec<String> = model
        .reactions
        .values()
        .filter(|reaction| reaction.id != objective_id)
        .filter(|reaction| {
            !matches!(
                reaction.boundary,
                Some(BoundaryKind::Source) | Some(BoundaryKind::Escape)
            )
        })
        .filter(|reaction| !excluded_essential.contains(&reaction.id))
        .map(|reaction| reaction.id.clone())
        .collect();
    candidates.sort();

    let pairs: Vec<(&str, &str)> = candidates
        .iter()
        .enumerate()
        .flat_map(|(index, first)| {
            candidates[index + 1..]
                .iter()
                .map(move |second| (first.as_str(), second.as_str()))
        })
        .collect();
    info!(
        "Deleting {} pairs of {} reactions",
        pairs.len(),
        candidates.len()
    );

    let outcomes: Vec<Option<Knockout>> = pool.install(|| {
        pairs
            .par_iter()
            .map(|(first, second)| {
                if is_cancelled(cancel) {
                    return None;
                }
                Some(baseline.knockout(&[*first, *second]))
            })
            .collect()
    });

    let mut report = PairwiseDeletionReport {
        wild_type_objective: baseline.objective,
        candidates: candidates.clone(),
        excluded_essential,
        tested: 0,
        lethal: Vec::new(),
        failures: 0,
        cancelled: false,
    };
    // Outcomes keep the order of `pairs`, which is already lexicographic
    for outcome in outcomes {
        let Some(knockout) = outcome else {
            report.cancelled = true;
            continue;
        };
        report.tested += 1;
        if knockout.solver_error.is_some() {
            report.failures += 1;
        }
        if knockout.lethal {
            report.lethal.push(knockout);
        }
    }
    info!(
        "{} of {} pairs are lethal, {} solver failures",
        report.lethal.len(),
        report.tested,
        report.failures
    );
    Ok(report)
}
