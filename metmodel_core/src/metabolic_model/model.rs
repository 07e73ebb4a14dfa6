//! This module provides the Model struct for representing an entire metabolic model
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::configuration::Configuration;
use crate::io::equation::{
    boundary_counterpart, parse, Equation, EquationError, BOUNDARY_COMPARTMENT,
    METABOLITE_PREFIX,
};
use crate::metabolic_model::compartment::Compartment;
use crate::metabolic_model::metabolite::Species;
use crate::metabolic_model::reaction::{
    BoundaryKind, Constraint, Reaction, ReactionBuilder, ReactionBuilderError,
};
use crate::optimize::formulation::{Formulation, FormulationError};
use crate::optimize::objective::Objective;
use crate::optimize::solvers::Solver;
use crate::optimize::FluxResult;

/// Default maximum flux magnitude
pub const DEFAULT_VMAX: &str = "1000";

/// Represents a constraint-based metabolic model
///
/// Misuse such as deleting a missing reaction is logged as a warning and otherwise ignored,
/// only operations which would break the model's invariants return errors.
#[derive(Clone, Debug)]
pub struct Model {
    /// Id associated with the Model
    pub id: Option<String>,
    /// Human readable name of the Model
    pub name: Option<String>,
    /// Map of compartment ids to Compartments
    pub compartments: IndexMap<String, Compartment>,
    /// Map of species ids to Species
    pub species: IndexMap<String, Species>,
    /// Map of reaction ids to Reactions
    pub reactions: IndexMap<String, Reaction>,
    /// Explicit flux bounds, keyed by reaction id
    pub constraints: IndexMap<String, Constraint>,
    /// Maximum flux magnitude used for reactions without explicit bounds
    pub vmax: String,
    /// Reaction flux to optimize
    pub objective: Option<Objective>,
    /// Species with a source reaction
    pub sources: Vec<String>,
    /// Species with an escape reaction
    pub escapes: Vec<String>,
    /// Species with an exchange reaction, and the exchange bounds
    pub exchanges: Vec<(String, Constraint)>,
    /// Result of the latest solve
    pub flux: Option<FluxResult>,
}

impl Default for Model {
    fn default() -> Self {
        Model::new_empty()
    }
}

impl Model {
    pub fn new_empty() -> Self {
        Model {
            id: None,
            name: None,
            compartments: IndexMap::new(),
            species: IndexMap::new(),
            reactions: IndexMap::new(),
            constraints: IndexMap::new(),
            vmax: DEFAULT_VMAX.to_string(),
            objective: None,
            sources: Vec::new(),
            escapes: Vec::new(),
            exchanges: Vec::new(),
            flux: None,
        }
    }

    /// Create an empty model using the configured maximum flux
    pub fn from_configuration(configuration: &Configuration) -> Self {
        Model {
            vmax: configuration.vmax.clone(),
            ..Model::new_empty()
        }
    }

    pub fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = Some(objective);
    }

    /// Add a compartment, replacing any existing compartment with the same id
    pub fn add_compartment(&mut self, compartment: Compartment) {
        self.compartments.insert(compartment.id.clone(), compartment);
    }

    /// Add a species, replacing any existing species with the same id
    pub fn add_species(&mut self, species: Species) {
        self.species.insert(species.id.clone(), species);
    }

    /// Add a reaction to the model
    ///
    /// Compartments and species referenced by the equation are created if needed. A reaction
    /// whose id is already present is ignored. If any species has no known compartment
    /// nothing is inserted.
    ///
    /// # Examples
    /// ```rust
    /// use metmodel_core::io::equation::parse;
    /// use metmodel_core::metabolic_model::model::Model;
    /// use metmodel_core::metabolic_model::reaction::ReactionBuilder;
    /// let mut model = Model::new_empty();
    /// let (reversible, equation) = parse("[c] : akg + asp-L <==> glu-L + oaa").unwrap();
    /// let reaction = ReactionBuilder::default()
    ///     .id("R_ASPTA".to_string())
    ///     .reversible(reversible)
    ///     .equation(equation)
    ///     .build()
    ///     .unwrap();
    /// model.add_reaction(reaction).unwrap();
    /// assert!(model.species.contains_key("M_asp_DASH_L_c"));
    /// assert!(model.compartments.contains_key("Cytosol"));
    /// ```
    pub fn add_reaction(&mut self, reaction: Reaction) -> Result<(), ModelError> {
        if self.reactions.contains_key(&reaction.id) {
            warn!("{} already in reactions, keeping the existing reaction", reaction.id);
            return Ok(());
        }

        // Resolve every compartment before touching the model
        let mut referenced = Vec::new();
        for species in reaction.equation.species() {
            let compartment = Compartment::for_species(species).ok_or_else(|| {
                ModelError::UnknownCompartment {
                    species: species.to_string(),
                    reaction: reaction.id.clone(),
                }
            })?;
            referenced.push((species.to_string(), compartment));
        }

        for (species, compartment) in referenced {
            if !self.compartments.contains_key(&compartment.id) {
                debug!("Adding compartment {}", compartment.id);
                self.add_compartment(compartment.clone());
            }
            if !self.species.contains_key(&species) {
                self.add_species(Species::referenced(&species, &compartment.id));
            }
        }
        self.reactions.insert(reaction.id.clone(), reaction);
        Ok(())
    }

    /// Parse an equation and add the resulting reaction, reversibility follows the arrow
    pub fn add_reaction_from_equation(
        &mut self,
        id: &str,
        name: &str,
        notes: &[&str],
        equation: &str,
    ) -> Result<(), ModelError> {
        let (reversible, equation) = parse(equation)?;
        let reaction = Reaction {
            id: id.to_string(),
            name: name.to_string(),
            reversible,
            notes: notes.iter().map(|note| note.to_string()).collect(),
            equation,
            boundary: None,
        };
        self.add_reaction(reaction)
    }

    /// Remove a reaction, its species are kept
    pub fn delete_reaction(&mut self, id: &str) {
        if self.reactions.shift_remove(id).is_none() {
            warn!("Cannot delete {}: not in reactions", id);
        }
    }

    /// Print the equation of a reaction
    pub fn equation_string(&self, id: &str) -> Option<String> {
        self.reactions.get(id).map(Reaction::equation_string)
    }

    /// Add a note, e.g. `SUBSYSTEM: glycolysis`, to a reaction
    pub fn add_note(&mut self, id: &str, note: &str) {
        match self.reactions.get_mut(id) {
            Some(reaction) => {
                reaction.notes.insert(note.to_string());
            }
            None => warn!("Cannot add \"{}\" to notes of {}: not in reactions", note, id),
        }
    }

    /// Remove a note from a reaction
    pub fn delete_note(&mut self, id: &str, note: &str) {
        match self.reactions.get_mut(id) {
            Some(reaction) => {
                if !reaction.notes.remove(note) {
                    warn!("Cannot delete \"{}\" from notes of {}: not in notes", note, id);
                }
            }
            None => warn!(
                "Cannot delete \"{}\" from notes of {}: not in reactions",
                note, id
            ),
        }
    }

    /// Notes of a reaction starting with `tag`, with the tag removed, sorted
    pub fn notes_by_tag(&self, id: &str, tag: &str) -> Vec<String> {
        match self.reactions.get(id) {
            Some(reaction) => reaction
                .notes
                .iter()
                .filter_map(|note| note.strip_prefix(tag))
                .map(str::to_string)
                .collect(),
            None => {
                warn!("Cannot read notes of {}: not in reactions", id);
                Vec::new()
            }
        }
    }

    /// Set explicit flux bounds for a reaction
    pub fn set_constraint(&mut self, id: &str, lower: &str, upper: &str) {
        if self.reactions.contains_key(id) {
            self.constraints
                .insert(id.to_string(), Constraint::new(lower, upper));
        } else {
            warn!("Cannot set constraint for {}: not in reactions", id);
        }
    }

    /// Remove the explicit bounds of a reaction, restoring the defaults
    pub fn unset_constraint(&mut self, id: &str) {
        if !self.reactions.contains_key(id) {
            warn!("Cannot unset constraint for {}: not in reactions", id);
            return;
        }
        self.constraints.shift_remove(id);
    }

    /// Bounds in effect for a reaction, explicit or default
    pub fn bounds(&self, id: &str) -> Option<Constraint> {
        self.reactions
            .get(id)
            .map(|reaction| self.resolve_bounds(reaction))
    }

    pub(crate) fn resolve_bounds(&self, reaction: &Reaction) -> Constraint {
        self.constraints
            .get(&reaction.id)
            .cloned()
            .unwrap_or_else(|| Constraint::default_for(reaction.reversible, &self.vmax))
    }

    /// Explicit constraints ordered by reaction id
    pub fn sorted_constraints(&self) -> Vec<(&str, &Constraint)> {
        let mut constraints: Vec<(&str, &Constraint)> = self
            .constraints
            .iter()
            .map(|(id, constraint)| (id.as_str(), constraint))
            .collect();
        constraints.sort_by(|a, b| a.0.cmp(b.0));
        constraints
    }

    /// Change the maximum flux, explicit bounds equal to the old maximum (or its negation)
    /// are moved to the new value
    pub fn reset_vmax(&mut self, vmax: &str) {
        let old_lower = format!("-{}", self.vmax);
        let new_lower = format!("-{vmax}");
        for constraint in self.constraints.values_mut() {
            if constraint.lower == old_lower {
                constraint.lower = new_lower.clone();
            }
            if constraint.upper == self.vmax {
                constraint.upper = vmax.to_string();
            }
        }
        self.vmax = vmax.to_string();
    }

    /// Add a source reaction (boundary species to species) for each species
    pub fn set_sources(&mut self, species: &[String]) -> Result<(), ModelError> {
        self.sources = species.to_vec();
        for id in species {
            self.add_boundary_reaction(id, BoundaryKind::Source)?;
        }
        Ok(())
    }

    /// Add an escape reaction (species to boundary species) for each species
    pub fn set_escapes(&mut self, species: &[String]) -> Result<(), ModelError> {
        self.escapes = species.to_vec();
        for id in species {
            self.add_boundary_reaction(id, BoundaryKind::Escape)?;
        }
        Ok(())
    }

    /// Add a reversible exchange reaction with explicit bounds for each species
    pub fn set_exchanges(&mut self, exchanges: &[(String, Constraint)]) -> Result<(), ModelError> {
        self.exchanges = exchanges.to_vec();
        for (id, constraint) in exchanges {
            if let Some(reaction_id) = self.add_boundary_reaction(id, BoundaryKind::Exchange)? {
                self.set_constraint(&reaction_id, &constraint.lower, &constraint.upper);
            }
        }
        Ok(())
    }

    /// Generate the boundary reaction of a kind for a species, returning its id. Species
    /// already on the boundary are skipped.
    fn add_boundary_reaction(
        &mut self,
        species: &str,
        kind: BoundaryKind,
    ) -> Result<Option<String>, ModelError> {
        if species.ends_with(BOUNDARY_COMPARTMENT) {
            debug!("Skipping {} reaction for boundary species {}", kind.subsystem(), species);
            return Ok(None);
        }
        let reaction_id = format!(
            "{}{}",
            kind.prefix(),
            species.strip_prefix(METABOLITE_PREFIX).unwrap_or(species)
        );
        let inner = vec![(species.to_string(), "1".to_string())];
        let outer = vec![(boundary_counterpart(species), "1".to_string())];
        let equation = match kind {
            BoundaryKind::Source => Equation::new(outer, inner),
            BoundaryKind::Escape | BoundaryKind::Exchange => Equation::new(inner, outer),
        };
        let reaction = ReactionBuilder::default()
            .id(reaction_id.clone())
            .name(format!(". {}", kind.description()))
            .reversible(kind == BoundaryKind::Exchange)
            .notes(
                [format!("SUBSYSTEM: {}", kind.subsystem()), "EC: .".to_string()]
                    .into_iter()
                    .collect(),
            )
            .equation(equation)
            .boundary(Some(kind))
            .build()?;
        self.add_reaction(reaction)?;
        Ok(Some(reaction_id))
    }

    /// Formulate and solve the model, storing the result as the latest flux
    ///
    /// When neither escapes nor exchanges are defined an escape is first added for every
    /// species. A solver failure is stored as an error result rather than returned.
    pub fn solve(&mut self, solver: &dyn Solver) -> Result<&FluxResult, ModelError> {
        if self.escapes.is_empty() && self.exchanges.is_empty() {
            info!("No escapes currently specified, adding escape fluxes to all species");
            let mut species: Vec<String> = self.species.keys().cloned().collect();
            species.sort();
            self.set_escapes(&species)?;
        }
        let formulation = Formulation::build(self)?;
        let result = solver.solve(&formulation).unwrap_or_else(|err| {
            warn!("Solver failed: {}", err);
            FluxResult::from_solver_error(&err)
        });
        info!(
            "Solved model: {:?}, objective {:?}",
            result.status, result.objective_value
        );
        let stored: &FluxResult = self.flux.insert(result);
        Ok(stored)
    }
}

/// Errors from modifying or solving a model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Species {species} in reaction {reaction} has an unknown compartment")]
    UnknownCompartment { species: String, reaction: String },
    #[error(transparent)]
    Equation(#[from] EquationError),
    #[error(transparent)]
    Formulation(#[from] FormulationError),
    #[error("Unable to build reaction: {0}")]
    ReactionBuild(#[from] ReactionBuilderError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::solvers::SolverError;
    use crate::optimize::OptimizationStatus;

    fn toy_model() -> Model {
        let mut model = Model::new_empty();
        model
            .add_reaction_from_equation("R_1", "first", &["SUBSYSTEM: test"], "[c] : A --> B")
            .unwrap();
        model
            .add_reaction_from_equation("R_2", "second", &[], "[c] : B <==> C")
            .unwrap();
        model
    }

    struct FixedSolver;

    impl Solver for FixedSolver {
        fn solve(&self, formulation: &Formulation) -> Result<FluxResult, SolverError> {
            Ok(FluxResult {
                status: OptimizationStatus::Optimal,
                objective_value: Some(1.0),
                flux_by_reaction: formulation
                    .bounds
                    .keys()
                    .map(|id| (id.clone(), 1.0))
                    .collect(),
                raw_report: None,
            })
        }
    }

    struct FailingSolver;

    impl Solver for FailingSolver {
        fn solve(&self, _formulation: &Formulation) -> Result<FluxResult, SolverError> {
            Err(SolverError::Timeout(std::time::Duration::from_secs(1)))
        }
    }

    #[test]
    fn lazy_species_and_compartments() {
        let mut model = Model::new_empty();
        model
            .add_reaction_from_equation("R_T", "", &[], "atp[c] + glc-D[e] --> adp[m]")
            .unwrap();
        let compartments: Vec<&String> = model.compartments.keys().collect();
        assert_eq!(compartments, vec!["Cytosol", "Extraorganism", "Mitochondria"]);
        assert_eq!(model.species["M_glc_DASH_D_e"].compartment, "Extraorganism");
        assert!(!model.species["M_atp_c"].boundary);
    }

    #[test]
    fn add_reaction_is_idempotent() {
        let mut model = toy_model();
        let before = model.reactions["R_1"].clone();
        model
            .add_reaction_from_equation("R_1", "other", &[], "[c] : X --> Y")
            .unwrap();
        assert_eq!(model.reactions.len(), 2);
        assert_eq!(model.reactions["R_1"], before);
        assert!(!model.species.contains_key("M_X_c"));
    }

    #[test]
    fn unknown_compartment_inserts_nothing() {
        let mut model = Model::new_empty();
        let err = model
            .add_reaction_from_equation("R_bad", "", &[], "A[c] --> B[q]")
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownCompartment { ref species, .. } if species == "M_B_q"));
        assert!(model.reactions.is_empty());
        assert!(model.species.is_empty());
        assert!(model.compartments.is_empty());
    }

    #[test]
    fn parse_errors_propagate() {
        let mut model = Model::new_empty();
        let err = model
            .add_reaction_from_equation("R_bad", "", &[], "A B --> C")
            .unwrap_err();
        assert!(matches!(err, ModelError::Equation(_)));
    }

    #[test]
    fn delete_reaction_keeps_species() {
        let mut model = toy_model();
        model.delete_reaction("R_1");
        model.delete_reaction("R_missing");
        assert!(!model.reactions.contains_key("R_1"));
        assert!(model.species.contains_key("M_A_c"));
    }

    #[test]
    fn notes() {
        let mut model = toy_model();
        model.add_note("R_1", "SUBSYSTEM: glycolysis");
        model.add_note("R_1", "EC: 1.1.1.1");
        model.add_note("R_missing", "SUBSYSTEM: nothing");
        assert_eq!(
            model.notes_by_tag("R_1", "SUBSYSTEM: "),
            vec!["glycolysis", "test"]
        );
        model.delete_note("R_1", "SUBSYSTEM: test");
        model.delete_note("R_1", "SUBSYSTEM: absent");
        assert_eq!(model.notes_by_tag("R_1", "SUBSYSTEM: "), vec!["glycolysis"]);
        assert!(model.notes_by_tag("R_2", "SUBSYSTEM: ").is_empty());
    }

    #[test]
    fn constraints() {
        let mut model = toy_model();
        assert_eq!(model.bounds("R_1"), Some(Constraint::new("0", "1000")));
        assert_eq!(model.bounds("R_2"), Some(Constraint::new("-1000", "1000")));
        model.set_constraint("R_2", "-5", "5");
        model.set_constraint("R_1", "1", "2");
        model.set_constraint("R_missing", "0", "1");
        assert_eq!(model.bounds("R_2"), Some(Constraint::new("-5", "5")));
        let ids: Vec<&str> = model.sorted_constraints().iter().map(|c| c.0).collect();
        assert_eq!(ids, vec!["R_1", "R_2"]);
        model.unset_constraint("R_2");
        assert_eq!(model.bounds("R_2"), Some(Constraint::new("-1000", "1000")));
        assert_eq!(model.bounds("R_missing"), None);
    }

    #[test]
    fn reset_vmax_rewrites_matching_bounds() {
        let mut model = toy_model();
        model.set_constraint("R_1", "0", "1000");
        model.set_constraint("R_2", "-1000", "20");
        model.reset_vmax("500");
        assert_eq!(model.vmax, "500");
        assert_eq!(model.bounds("R_1"), Some(Constraint::new("0", "500")));
        assert_eq!(model.bounds("R_2"), Some(Constraint::new("-500", "20")));
    }

    #[test]
    fn boundary_reactions() {
        let mut model = toy_model();
        model.set_sources(&["M_A_c".to_string()]).unwrap();
        model
            .set_escapes(&["M_C_c".to_string(), "M_A_b".to_string()])
            .unwrap();
        model
            .set_exchanges(&[("M_B_c".to_string(), Constraint::new("-10", "10"))])
            .unwrap();

        let source = &model.reactions["R_SRC_A_c"];
        assert_eq!(source.boundary, Some(BoundaryKind::Source));
        assert!(!source.reversible);
        assert_eq!(source.equation_string(), "A[b] --> A[c]");
        assert!(source.notes.contains("SUBSYSTEM: SourceFlux"));
        assert!(source.notes.contains("EC: ."));
        assert!(model.species["M_A_b"].boundary);

        let escape = &model.reactions["R_ESC_C_c"];
        assert_eq!(escape.equation_string(), "C[c] --> C[b]");
        // No escape for species already on the boundary
        assert!(!model.reactions.contains_key("R_ESC_A_b"));

        let exchange = &model.reactions["R_EXCH_B_c"];
        assert!(exchange.reversible);
        assert_eq!(model.bounds("R_EXCH_B_c"), Some(Constraint::new("-10", "10")));
    }

    #[test]
    fn solve_adds_escapes_and_stores_flux() {
        let mut model = toy_model();
        model.set_objective(Objective::maximize("R_2"));
        let result = model.solve(&FixedSolver).unwrap();
        assert!(result.is_optimal());
        for species in ["A_c", "B_c", "C_c"] {
            assert!(model.reactions.contains_key(&format!("R_ESC_{species}")));
        }
        let flux = model.flux.as_ref().unwrap();
        assert_eq!(flux.flux_by_reaction["R_ESC_A_c"], 1.0);
    }

    #[test]
    fn solve_stores_solver_failure() {
        let mut model = toy_model();
        model.set_objective(Objective::maximize("R_2"));
        let result = model.solve(&FailingSolver).unwrap();
        assert_eq!(result.status, OptimizationStatus::Error);
        assert!(result.raw_report.is_some());
    }

    #[test]
    fn solve_without_objective() {
        let mut model = toy_model();
        assert!(matches!(
            model.solve(&FixedSolver),
            Err(ModelError::Formulation(FormulationError::NoObjective))
        ));
    }
}
