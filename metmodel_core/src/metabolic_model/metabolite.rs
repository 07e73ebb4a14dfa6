//! This module provides the species struct representing a metabolite in a compartment

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::io::equation::is_boundary_species;

/// Represents a metabolite in a specific compartment
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// Used to identify the species, e.g. `M_glu_DASH_L_c` (must be unique)
    pub id: String,
    /// Human Readable name of the species
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Id of the compartment the species is in
    pub compartment: String,
    /// Electrical charge of the species
    #[builder(default = "None")]
    pub charge: Option<i32>,
    /// Whether the species sits on the system boundary, so is not mass balanced
    #[builder(default = "false")]
    pub boundary: bool,
}

impl Species {
    /// Species created on first reference from a reaction
    pub fn referenced(id: &str, compartment: &str) -> Self {
        Species {
            id: id.to_string(),
            name: None,
            compartment: compartment.to_string(),
            charge: None,
            boundary: is_boundary_species(id),
        }
    }
}
