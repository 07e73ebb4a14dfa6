//! Module providing the Model struct for representing a constraint-based metabolic model.

pub mod compartment;
pub mod gene;
pub mod metabolite;
pub mod model;
pub mod reaction;
