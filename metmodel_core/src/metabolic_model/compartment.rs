//! This module provides the compartment struct, and the table of one letter compartment
//! abbreviations used as suffixes on species ids
use serde::{Deserialize, Serialize};

/// A cellular compartment, optionally enclosed by another compartment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compartment {
    /// Name of the compartment, e.g. `Cytosol`
    pub id: String,
    /// Compartment surrounding this one
    pub outside: Option<String>,
}

impl Compartment {
    pub fn new(id: &str, outside: Option<&str>) -> Self {
        Compartment {
            id: id.to_string(),
            outside: outside.map(str::to_string),
        }
    }

    /// Look up the compartment for a species suffix letter
    ///
    /// # Examples
    /// ```rust
    /// use metmodel_core::metabolic_model::compartment::Compartment;
    /// let cytosol = Compartment::from_abbreviation('c').unwrap();
    /// assert_eq!(cytosol.id, "Cytosol");
    /// assert_eq!(cytosol.outside.as_deref(), Some("Extraorganism"));
    /// assert!(Compartment::from_abbreviation('q').is_none());
    /// ```
    pub fn from_abbreviation(letter: char) -> Option<Compartment> {
        let (id, outside) = match letter {
            'c' => ("Cytosol", Some("Extraorganism")),
            'r' => ("EndoplasmicReticulum", Some("Cytosol")),
            'e' => ("Extraorganism", None),
            'g' => ("GolgiApparatus", Some("Cytosol")),
            'l' => ("Reservosome", Some("Cytosol")),
            'm' => ("Mitochondria", Some("Cytosol")),
            'n' => ("Nucleus", Some("Cytosol")),
            'x' => ("Glycosome", Some("Cytosol")),
            'v' => ("Vacuole", Some("Cytosol")),
            // Boundary species live outside the organism
            'b' => ("Extraorganism", None),
            'p' => ("BtwnMitoInnerOuter", Some("Cytosol")),
            _ => return None,
        };
        Some(Compartment::new(id, outside))
    }

    /// Compartment of a species id, determined by its final letter
    pub fn for_species(species_id: &str) -> Option<Compartment> {
        species_id.chars().last().and_then(Compartment::from_abbreviation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn species_suffix() {
        assert_eq!(
            Compartment::for_species("M_atp_m"),
            Some(Compartment::new("Mitochondria", Some("Cytosol")))
        );
        assert_eq!(
            Compartment::for_species("M_glc_DASH_D_b"),
            Some(Compartment::new("Extraorganism", None))
        );
        assert_eq!(Compartment::for_species("M_A"), None);
        assert_eq!(Compartment::for_species(""), None);
    }
}
