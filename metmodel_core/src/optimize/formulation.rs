//! Build the linear program for a flux balance analysis from a [`Model`]
//!
//! The formulation has one steady state balance row per non boundary species, with the
//! reactants of each reaction entering negatively and the products positively, and one
//! pair of bounds per reaction. Rows, terms and bounds are ordered by id so the same model
//! always produces the same program.
use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::io::equation::is_boundary_species;
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::Constraint;
use crate::optimize::objective::Objective;

/// Steady state mass balance of a species, the signed terms must sum to zero
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BalanceRow {
    /// Species being balanced
    pub species: String,
    /// `(reaction id, signed coefficient)` in reaction id order
    pub terms: Vec<(String, String)>,
}

/// A linear program ready to hand to a [`Solver`](crate::optimize::solvers::Solver)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Formulation {
    pub objective: Objective,
    /// Balance rows in species id order, shared between a formulation and its overrides
    pub rows: Arc<Vec<BalanceRow>>,
    /// Bounds of every reaction in reaction id order
    pub bounds: IndexMap<String, Constraint>,
}

impl Formulation {
    /// Formulate the model as a linear program
    ///
    /// # Examples
    /// ```rust
    /// use metmodel_core::metabolic_model::model::Model;
    /// use metmodel_core::optimize::formulation::Formulation;
    /// use metmodel_core::optimize::objective::Objective;
    /// let mut model = Model::new_empty();
    /// model.add_reaction_from_equation("R_1", "", &[], "[c] : A --> B").unwrap();
    /// model.set_objective(Objective::maximize("R_1"));
    /// let formulation = Formulation::build(&model).unwrap();
    /// assert_eq!(formulation.bounds["R_1"].upper, "1000");
    /// ```
    pub fn build(model: &Model) -> Result<Formulation, FormulationError> {
        let objective = model
            .objective
            .clone()
            .ok_or(FormulationError::NoObjective)?;
        if !model.reactions.contains_key(&objective.reaction_id) {
            warn!(
                "{} is not a reaction in the model, it will be unconstrained",
                objective.reaction_id
            );
        }

        let mut reaction_ids: Vec<&String> = model.reactions.keys().collect();
        reaction_ids.sort();

        let mut balances: BTreeMap<&str, Vec<(String, String)>> = BTreeMap::new();
        let mut bounds = IndexMap::with_capacity(reaction_ids.len());
        for reaction_id in reaction_ids {
            let reaction = &model.reactions[reaction_id];
            bounds.insert(reaction_id.clone(), model.resolve_bounds(reaction));

            let reactants = reaction
                .equation
                .reactants
                .iter()
                .map(|(species, coefficient)| (species, negate(coefficient)));
            let products = reaction
                .equation
                .products
                .iter()
                .map(|(species, coefficient)| (species, coefficient.clone()));
            for (species, coefficient) in reactants.chain(products) {
                if is_boundary_species(species) {
                    continue;
                }
                balances
                    .entry(species.as_str())
                    .or_default()
                    .push((reaction_id.clone(), coefficient));
            }
        }

        let rows: Vec<BalanceRow> = balances
            .into_iter()
            .map(|(species, terms)| BalanceRow {
                species: species.to_string(),
                terms,
            })
            .collect();
        debug!(
            "Formulated {} balance rows over {} reactions",
            rows.len(),
            bounds.len()
        );
        Ok(Formulation {
            objective,
            rows: Arc::new(rows),
            bounds,
        })
    }

    /// Formulation with some reaction bounds replaced
    ///
    /// The balance rows are shared with `self`, only the bounds are copied. Overrides for
    /// reactions missing from the formulation are ignored.
    pub fn with_bound_overrides<'a, I>(&self, overrides: I) -> Formulation
    where
        I: IntoIterator<Item = (&'a str, Constraint)>,
    {
        let mut bounds = self.bounds.clone();
        for (reaction_id, constraint) in overrides {
            match bounds.get_mut(reaction_id) {
                Some(bound) => *bound = constraint,
                None => warn!("Cannot override bounds of {}: not in the formulation", reaction_id),
            }
        }
        Formulation {
            objective: self.objective.clone(),
            rows: Arc::clone(&self.rows),
            bounds,
        }
    }

    /// Whether a reaction has a variable in the formulation
    pub fn has_reaction(&self, reaction_id: &str) -> bool {
        self.bounds.contains_key(reaction_id)
    }
}

/// Flip the sign of a coefficient kept as text
fn negate(coefficient: &str) -> String {
    match coefficient.strip_prefix('-') {
        Some(magnitude) => magnitude.to_string(),
        None => format!("-{coefficient}"),
    }
}

/// Errors from formulating a model
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulationError {
    #[error("No objective has been defined")]
    NoObjective,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_model() -> Model {
        let mut model = Model::new_empty();
        model
            .add_reaction_from_equation("R_2", "", &[], "[c] : B + 2 C --> D")
            .unwrap();
        model
            .add_reaction_from_equation("R_1", "", &[], "[c] : A <==> B")
            .unwrap();
        model
            .add_reaction_from_equation("R_SRC_A_c", "", &[], "A[b] --> A[c]")
            .unwrap();
        model.set_objective(Objective::maximize("R_2"));
        model
    }

    #[test]
    fn default_bounds_row() {
        let mut model = Model::new_empty();
        model
            .add_reaction_from_equation("R", "", &[], "[c] : A --> B")
            .unwrap();
        model.set_objective(Objective::maximize("R"));
        let formulation = Formulation::build(&model).unwrap();
        assert_eq!(formulation.bounds["R"], Constraint::new("0", "1000"));
    }

    #[test]
    fn mass_balance_signs() {
        let formulation = Formulation::build(&toy_model()).unwrap();
        let species: Vec<&str> = formulation
            .rows
            .iter()
            .map(|row| row.species.as_str())
            .collect();
        // Boundary species are not balanced
        assert_eq!(species, vec!["M_A_c", "M_B_c", "M_C_c", "M_D_c"]);

        let row = |id: &str| {
            formulation
                .rows
                .iter()
                .find(|row| row.species == id)
                .unwrap()
                .terms
                .clone()
        };
        assert_eq!(
            row("M_A_c"),
            vec![
                ("R_1".to_string(), "-1".to_string()),
                ("R_SRC_A_c".to_string(), "1".to_string())
            ]
        );
        assert_eq!(
            row("M_B_c"),
            vec![
                ("R_1".to_string(), "1".to_string()),
                ("R_2".to_string(), "-1".to_string())
            ]
        );
        assert_eq!(row("M_C_c"), vec![("R_2".to_string(), "-2".to_string())]);
    }

    #[test]
    fn bounds_sorted_and_resolved() {
        let mut model = toy_model();
        model.set_constraint("R_2", "0", "10");
        let formulation = Formulation::build(&model).unwrap();
        let ids: Vec<&String> = formulation.bounds.keys().collect();
        assert_eq!(ids, vec!["R_1", "R_2", "R_SRC_A_c"]);
        assert_eq!(formulation.bounds["R_1"], Constraint::new("-1000", "1000"));
        assert_eq!(formulation.bounds["R_2"], Constraint::new("0", "10"));
    }

    #[test]
    fn missing_objective() {
        let mut model = toy_model();
        model.objective = None;
        assert_eq!(
            Formulation::build(&model).unwrap_err(),
            FormulationError::NoObjective
        );
    }

    #[test]
    fn objective_outside_model_is_allowed() {
        let mut model = toy_model();
        model.set_objective(Objective::maximize("R_biomass"));
        assert!(Formulation::build(&model).is_ok());
    }

    #[test]
    fn overrides_leave_base_untouched() {
        let formulation = Formulation::build(&toy_model()).unwrap();
        let knocked = formulation.with_bound_overrides([("R_1", Constraint::blocked())]);
        assert_eq!(knocked.bounds["R_1"], Constraint::blocked());
        assert_eq!(formulation.bounds["R_1"], Constraint::new("-1000", "1000"));
        assert_eq!(knocked.rows, formulation.rows);
        assert!(Arc::ptr_eq(&knocked.rows, &formulation.rows));
    }

    #[test]
    fn negation() {
        assert_eq!(negate("2"), "-2");
        assert_eq!(negate("-0.5"), "0.5");
    }
}
