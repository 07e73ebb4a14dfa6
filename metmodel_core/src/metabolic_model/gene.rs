//! This module provides the GPR enum, representing a gene protein reaction rule, and the
//! GeneAssociations struct mapping reactions to the rules that keep them available
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::warn;

use crate::io::gpr_parse::{parse_gpr, GprParseError};
use crate::metabolic_model::model::Model;

/// Tag of the reaction notes holding gene association rules
pub const GENE_ASSOCIATION_TAG: &str = "Gene_association: ";

/// Whether a gene is active or not
#[derive(Clone, Debug, Hash, Eq, PartialEq, Copy)]
pub enum GeneActivity {
    /// Gene is considered active
    Active,
    /// Gene is considered inactive
    Inactive,
}

/// Mapping of gene (or other item) ids to their current activity
pub type GeneStates = IndexMap<String, GeneActivity>;

/// Representation of a Gene Protein Reaction Rule as an AST
///
/// Conjunctions represent the subunits of a complex which are all required, disjunctions
/// represent isozymes any one of which is sufficient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gpr {
    /// A terminal gene node
    Gene(String),
    /// Active only if every child is active
    And(Vec<Gpr>),
    /// Active if any child is active
    Or(Vec<Gpr>),
}

impl Gpr {
    /// Create a conjunction, nested conjunctions are flattened and a single term is returned as is
    pub fn and(terms: Vec<Gpr>) -> Gpr {
        Gpr::flatten(terms, true)
    }

    /// Create a disjunction, nested disjunctions are flattened and a single term is returned as is
    pub fn or(terms: Vec<Gpr>) -> Gpr {
        Gpr::flatten(terms, false)
    }

    fn flatten(terms: Vec<Gpr>, conjunction: bool) -> Gpr {
        let mut flat = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Gpr::And(children) if conjunction => flat.extend(children),
                Gpr::Or(children) if !conjunction => flat.extend(children),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            return flat.remove(0);
        }
        if conjunction {
            Gpr::And(flat)
        } else {
            Gpr::Or(flat)
        }
    }

    /// Evaluate whether the GPR is Active or Inactive given the activity of every gene
    pub fn eval(&self, states: &GeneStates) -> Result<GeneActivity, GprError> {
        match self {
            Gpr::Gene(gene) => states
                .get(gene)
                .copied()
                .ok_or_else(|| GprError::GeneNotFound(gene.clone())),
            Gpr::And(children) => {
                for child in children {
                    if child.eval(states)? == GeneActivity::Inactive {
                        return Ok(GeneActivity::Inactive);
                    }
                }
                Ok(GeneActivity::Active)
            }
            Gpr::Or(children) => {
                for child in children {
                    if child.eval(states)? == GeneActivity::Active {
                        return Ok(GeneActivity::Active);
                    }
                }
                Ok(GeneActivity::Inactive)
            }
        }
    }

    /// Ids of every gene in the rule
    pub fn genes(&self) -> BTreeSet<&str> {
        let mut genes = BTreeSet::new();
        self.collect_genes(&mut genes);
        genes
    }

    fn collect_genes<'a>(&'a self, genes: &mut BTreeSet<&'a str>) {
        match self {
            Gpr::Gene(gene) => {
                genes.insert(gene.as_str());
            }
            Gpr::And(children) | Gpr::Or(children) => {
                children.iter().for_each(|child| child.collect_genes(genes))
            }
        }
    }

    /// Generate a GPR string with gene ids from the GPR AST
    pub fn to_string_id(&self) -> String {
        let join = |children: &[Gpr], operator: &str| {
            let inner = children
                .iter()
                .map(|child| child.to_string_id())
                .collect::<Vec<_>>()
                .join(operator);
            format!("({inner})")
        };
        match self {
            Gpr::Gene(gene) => gene.clone(),
            Gpr::And(children) => join(children, " and "),
            Gpr::Or(children) => join(children, " or "),
        }
    }
}

impl Display for Gpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_id())
    }
}

/// Errors from evaluating GPRs
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GprError {
    #[error("Gene {0} in GPR has no known activity")]
    GeneNotFound(String),
}

/// Rules determining which reactions remain available as items (genes, proteins, or the
/// reactions themselves) are removed
#[derive(Clone, Debug, Default)]
pub struct GeneAssociations {
    rules: IndexMap<String, Gpr>,
}

impl GeneAssociations {
    pub fn new() -> Self {
        GeneAssociations::default()
    }

    /// Set the rule for a reaction, replacing any existing rule
    pub fn insert(&mut self, reaction_id: &str, gpr: Gpr) {
        self.rules.insert(reaction_id.to_string(), gpr);
    }

    /// Parse and set the rule for a reaction
    pub fn insert_str(&mut self, reaction_id: &str, gpr: &str) -> Result<(), GprParseError> {
        let gpr = parse_gpr(gpr)?;
        self.insert(reaction_id, gpr);
        Ok(())
    }

    /// Rule for a reaction, if one exists
    pub fn get(&self, reaction_id: &str) -> Option<&Gpr> {
        self.rules.get(reaction_id)
    }

    /// Number of reactions with a rule
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Build associations from the `Gene_association: ` notes of the model's reactions.
    ///
    /// A rule of `.` means the reaction has no known genes and is left out.
    pub fn from_notes(model: &Model) -> Result<Self, GprParseError> {
        let mut associations = GeneAssociations::new();
        for (reaction_id, reaction) in model.reactions.iter() {
            let rules: Vec<&str> = reaction
                .notes
                .iter()
                .filter_map(|note| note.strip_prefix(GENE_ASSOCIATION_TAG))
                .map(str::trim)
                .filter(|rule| !rule.is_empty() && *rule != ".")
                .collect();
            match rules.as_slice() {
                [] => {}
                [rule] => associations.insert_str(reaction_id, rule)?,
                [first, ..] => {
                    warn!(
                        "Reaction {} has {} gene associations, using `{}`",
                        reaction_id,
                        rules.len(),
                        first
                    );
                    associations.insert_str(reaction_id, first)?
                }
            }
        }
        Ok(associations)
    }

    /// Associations where each reaction depends only on itself, used to delete reactions
    /// directly
    pub fn reaction_level(model: &Model) -> Self {
        let mut associations = GeneAssociations::new();
        for reaction_id in model.reactions.keys() {
            associations.insert(reaction_id, Gpr::Gene(reaction_id.clone()));
        }
        associations
    }

    /// Every item referenced by any rule, sorted
    pub fn items(&self) -> Vec<String> {
        let items: BTreeSet<&str> = self.rules.values().flat_map(|gpr| gpr.genes()).collect();
        items.into_iter().map(str::to_string).collect()
    }

    /// Gene states with every item active
    pub fn all_active(&self) -> GeneStates {
        self.items()
            .into_iter()
            .map(|item| (item, GeneActivity::Active))
            .collect()
    }

    /// Reactions whose rule evaluates to inactive under `states`, sorted by id
    pub fn disabled_reactions(&self, states: &GeneStates) -> Result<Vec<String>, GprError> {
        let mut disabled = Vec::new();
        for (reaction_id, gpr) in self.rules.iter() {
            if gpr.eval(states)? == GeneActivity::Inactive {
                disabled.push(reaction_id.clone());
            }
        }
        disabled.sort();
        Ok(disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gene(id: &str) -> Gpr {
        Gpr::Gene(id.to_string())
    }

    fn states(active: &[&str], inactive: &[&str]) -> GeneStates {
        let mut states = GeneStates::new();
        active.iter().for_each(|g| {
            states.insert(g.to_string(), GeneActivity::Active);
        });
        inactive.iter().for_each(|g| {
            states.insert(g.to_string(), GeneActivity::Inactive);
        });
        states
    }

    #[test]
    fn gene_node() {
        let states = states(&["Active1"], &["Inactive1"]);
        assert_eq!(gene("Active1").eval(&states).unwrap(), GeneActivity::Active);
        assert_eq!(
            gene("Inactive1").eval(&states).unwrap(),
            GeneActivity::Inactive
        );
        assert_eq!(
            gene("Missing").eval(&states).unwrap_err(),
            GprError::GeneNotFound("Missing".to_string())
        );
    }

    #[test]
    fn and_node() {
        let states = states(&["Active1", "Active2"], &["Inactive1", "Inactive2"]);
        let both_active = Gpr::And(vec![gene("Active1"), gene("Active2")]);
        assert_eq!(both_active.eval(&states).unwrap(), GeneActivity::Active);
        let one_inactive = Gpr::And(vec![gene("Active1"), gene("Inactive1")]);
        assert_eq!(one_inactive.eval(&states).unwrap(), GeneActivity::Inactive);
        let both_inactive = Gpr::And(vec![gene("Inactive1"), gene("Inactive2")]);
        assert_eq!(both_inactive.eval(&states).unwrap(), GeneActivity::Inactive);
    }

    #[test]
    fn or_node() {
        let states = states(&["Active1", "Active2"], &["Inactive1", "Inactive2"]);
        let both_active = Gpr::Or(vec![gene("Active1"), gene("Active2")]);
        assert_eq!(both_active.eval(&states).unwrap(), GeneActivity::Active);
        let one_inactive = Gpr::Or(vec![gene("Active1"), gene("Inactive1")]);
        assert_eq!(one_inactive.eval(&states).unwrap(), GeneActivity::Active);
        let both_inactive = Gpr::Or(vec![gene("Inactive1"), gene("Inactive2")]);
        assert_eq!(both_inactive.eval(&states).unwrap(), GeneActivity::Inactive);
    }

    #[test]
    fn constructors_flatten() {
        let nested = Gpr::and(vec![
            Gpr::and(vec![gene("a"), gene("b")]),
            gene("c"),
            Gpr::or(vec![gene("d"), gene("e")]),
        ]);
        assert_eq!(
            nested,
            Gpr::And(vec![
                gene("a"),
                gene("b"),
                gene("c"),
                Gpr::Or(vec![gene("d"), gene("e")])
            ])
        );
        assert_eq!(Gpr::or(vec![gene("a")]), gene("a"));
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", gene("ActiveGene1")), "ActiveGene1");
        let gpr = parse_gpr("(Rv0001 and Rv0002) or Rv0003").unwrap();
        // Every operation is wrapped in parentheses, including the outermost one
        assert_eq!(format!("{}", gpr), "((Rv0001 and Rv0002) or Rv0003)");
    }

    #[test]
    fn associations_cascade() {
        let mut associations = GeneAssociations::new();
        associations.insert_str("R_complex", "g1 and g2").unwrap();
        associations.insert_str("R_isozyme", "g2 or g3").unwrap();
        associations.insert_str("R_single", "g3").unwrap();
        assert_eq!(associations.items(), vec!["g1", "g2", "g3"]);

        let mut states = associations.all_active();
        assert!(associations.disabled_reactions(&states).unwrap().is_empty());

        states.insert("g2".to_string(), GeneActivity::Inactive);
        assert_eq!(
            associations.disabled_reactions(&states).unwrap(),
            vec!["R_complex"]
        );

        states.insert("g3".to_string(), GeneActivity::Inactive);
        assert_eq!(
            associations.disabled_reactions(&states).unwrap(),
            vec!["R_complex", "R_isozyme", "R_single"]
        );
    }
}
