//! This module provides a struct for representing reactions, and their flux constraints
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::io::equation::{make_string, Equation};

/// Represents a reaction in the metabolic model
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Used to identify the reaction
    pub id: String,
    /// Human-readable reaction name
    #[builder(default = "String::new()")]
    pub name: String,
    /// Whether the reaction can carry negative flux
    #[builder(default = "false")]
    pub reversible: bool,
    /// Free text notes, conventionally prefixed with a tag such as `SUBSYSTEM: `
    #[builder(default = "BTreeSet::new()")]
    pub notes: BTreeSet<String>,
    /// Stoichiometry of the reaction
    #[builder(default = "Equation::default()")]
    pub equation: Equation,
    /// Set when the reaction was generated to connect a species to the system boundary
    #[builder(default = "None")]
    pub boundary: Option<BoundaryKind>,
}

impl Reaction {
    /// Print the reaction equation
    pub fn equation_string(&self) -> String {
        make_string(&self.equation, self.reversible)
    }
}

/// Kinds of generated boundary reactions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// Boundary species to species, `R_SRC_`
    Source,
    /// Species to boundary species, `R_ESC_`
    Escape,
    /// Reversible species to boundary species, `R_EXCH_`
    Exchange,
}

impl BoundaryKind {
    /// Prefix of the generated reaction ids
    pub fn prefix(&self) -> &'static str {
        match self {
            BoundaryKind::Source => "R_SRC_",
            BoundaryKind::Escape => "R_ESC_",
            BoundaryKind::Exchange => "R_EXCH_",
        }
    }

    /// Subsystem recorded in the notes of generated reactions
    pub fn subsystem(&self) -> &'static str {
        match self {
            BoundaryKind::Source => "SourceFlux",
            BoundaryKind::Escape => "EscapeFlux",
            BoundaryKind::Exchange => "ExchangeFlux",
        }
    }

    /// Suffix of the generated reaction names
    pub fn description(&self) -> &'static str {
        match self {
            BoundaryKind::Source => "source flux",
            BoundaryKind::Escape => "escape flux",
            BoundaryKind::Exchange => "exchange flux",
        }
    }
}

/// Lower and upper flux bounds of a reaction, kept as decimal text
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub lower: String,
    pub upper: String,
}

impl Constraint {
    pub fn new(lower: &str, upper: &str) -> Self {
        Constraint {
            lower: lower.to_string(),
            upper: upper.to_string(),
        }
    }

    /// Bounds used when a reaction has no explicit constraint, `[0, vmax]` for irreversible
    /// reactions and `[-vmax, vmax]` for reversible ones
    pub fn default_for(reversible: bool, vmax: &str) -> Self {
        if reversible {
            Constraint::new(&format!("-{vmax}"), vmax)
        } else {
            Constraint::new("0", vmax)
        }
    }

    /// A constraint blocking all flux
    pub fn blocked() -> Self {
        Constraint::new("0", "0")
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}", self.lower, self.upper)
    }
}
