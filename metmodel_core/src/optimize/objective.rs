//! Provides struct for representing the objective of a flux balance problem

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents the Objective of a flux balance problem, the flux through a single reaction
/// to be maximized or minimized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    /// Sense of the objective (maximize, or minimize), see [`ObjectiveSense`]
    pub sense: ObjectiveSense,
    /// Reaction whose flux is optimized
    pub reaction_id: String,
}

impl Objective {
    pub fn new(sense: ObjectiveSense, reaction_id: &str) -> Self {
        Self {
            sense,
            reaction_id: reaction_id.to_string(),
        }
    }

    /// Create a new maximization objective
    pub fn maximize(reaction_id: &str) -> Self {
        Self::new(ObjectiveSense::Maximize, reaction_id)
    }

    /// Create a new minimization objective
    pub fn minimize(reaction_id: &str) -> Self {
        Self::new(ObjectiveSense::Minimize, reaction_id)
    }
}

/// Represents the sense of the objective, whether it should be maximized or minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveSense {
    /// The objective should be minimized
    Minimize,
    /// The objective should be maximized
    Maximize,
}

impl Display for ObjectiveSense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectiveSense::Minimize => write!(f, "Minimize"),
            ObjectiveSense::Maximize => write!(f, "Maximize"),
        }
    }
}

impl FromStr for ObjectiveSense {
    type Err = ObjectiveSenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "maximize" | "max" => Ok(ObjectiveSense::Maximize),
            "minimize" | "min" => Ok(ObjectiveSense::Minimize),
            _ => Err(ObjectiveSenseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Unknown objective sense `{0}`, expected Maximize or Minimize")]
pub struct ObjectiveSenseError(pub String);
