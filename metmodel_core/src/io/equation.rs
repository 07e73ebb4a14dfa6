//! Parse reaction equation strings into a canonical stoichiometric form, and print them back
//!
//! Three notations are accepted:
//! - no compartment, `2 A + B --> C`, ids are used verbatim with the metabolite prefix added
//! - single compartment, `[c] : akg + asp-L <==> glu-L + oaa`, the compartment is appended to
//!   every metabolite
//! - multiple compartments, `atp[c] + urea[e] --> adp[c] + urea[c]`, each metabolite carries its
//!   own compartment
//!
//! In the compartment notations metabolites are converted to ids like `M_asp_DASH_L_c`.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix marking a metabolite id
pub const METABOLITE_PREFIX: &str = "M_";
/// Replacement for `-` inside metabolite ids
pub const DASH_ESCAPE: &str = "_DASH_";
/// Compartment letter used by the boundary counterparts of metabolites
pub const BOUNDARY_COMPARTMENT: char = 'b';

/// A single `(species id, coefficient)` entry on one side of an equation
pub type Term = (String, String);

/// Stoichiometry of a reaction, coefficients are kept as written
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equation {
    /// Species consumed by the reaction
    pub reactants: Vec<Term>,
    /// Species produced by the reaction
    pub products: Vec<Term>,
}

impl Equation {
    pub fn new(reactants: Vec<Term>, products: Vec<Term>) -> Self {
        Equation {
            reactants,
            products,
        }
    }

    /// Iterate over every species id referenced by the equation, reactants first
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.reactants
            .iter()
            .chain(self.products.iter())
            .map(|(species, _)| species.as_str())
    }

    fn swapped(self) -> Self {
        Equation {
            reactants: self.products,
            products: self.reactants,
        }
    }
}

/// Reaction arrows, in the order they are searched for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Arrow {
    ReversibleLong,
    Forward,
    Backward,
    ReversibleShort,
}

impl Arrow {
    const PRIORITY: [Arrow; 4] = [
        Arrow::ReversibleLong,
        Arrow::Forward,
        Arrow::Backward,
        Arrow::ReversibleShort,
    ];

    fn token(self) -> &'static str {
        match self {
            Arrow::ReversibleLong => " <==> ",
            Arrow::Forward => " --> ",
            Arrow::Backward => " <-- ",
            Arrow::ReversibleShort => " <=> ",
        }
    }

    fn is_reversible(self) -> bool {
        matches!(self, Arrow::ReversibleLong | Arrow::ReversibleShort)
    }
}

#[derive(Clone, Copy, Debug)]
enum CompartmentMode {
    NoCompartment,
    Single(char),
    Multi,
}

/// Parse a reaction equation
///
/// # Returns
/// A tuple of whether the reaction is reversible, and the parsed [`Equation`]. Equations
/// written right to left (`<--`) are returned with their sides swapped.
///
/// # Examples
/// ```rust
/// use metmodel_core::io::equation::parse;
/// let (reversible, equation) = parse("[c] : 2 ala-D + atp <==> adp + alaala").unwrap();
/// assert!(reversible);
/// assert_eq!(equation.reactants[0], ("M_ala_DASH_D_c".to_string(), "2".to_string()));
/// ```
pub fn parse(equation: &str) -> Result<(bool, Equation), EquationError> {
    let (mode, body) = compartment_mode(equation)?;

    let arrow = Arrow::PRIORITY
        .into_iter()
        .find(|arrow| body.contains(arrow.token()))
        .ok_or_else(|| EquationError::MissingArrow(equation.to_string()))?;

    let mut sides = body.split(arrow.token());
    let (left, right) = match (sides.next(), sides.next(), sides.next()) {
        (Some(left), Some(right), None) => (left, right),
        _ => return Err(EquationError::MultipleArrows(equation.to_string())),
    };

    let parsed = Equation::new(
        parse_side(left, mode, equation)?,
        parse_side(right, mode, equation)?,
    );

    let parsed = match arrow {
        Arrow::Backward => parsed.swapped(),
        _ => parsed,
    };
    Ok((arrow.is_reversible(), parsed))
}

/// Work out which notation the equation uses, stripping a leading `[x] :` tag if present
fn compartment_mode(equation: &str) -> Result<(CompartmentMode, &str), EquationError> {
    if !equation.contains('[') {
        return Ok((CompartmentMode::NoCompartment, equation));
    }
    if let Some(rest) = equation.strip_prefix('[') {
        let (tag, after) =
            rest.split_once(']')
                .ok_or_else(|| EquationError::InvalidCompartmentTag {
                    tag: rest.to_string(),
                    text: equation.to_string(),
                })?;
        let letter = single_letter(tag).ok_or_else(|| EquationError::InvalidCompartmentTag {
            tag: tag.to_string(),
            text: equation.to_string(),
        })?;
        // Only consume the whitespace when a colon follows, an empty reactant side
        // still needs the leading space of the arrow token
        let body = match after.trim_start().strip_prefix(':') {
            Some(body) => body,
            None => after,
        };
        return Ok((CompartmentMode::Single(letter), body));
    }
    Ok((CompartmentMode::Multi, equation))
}

fn parse_side(
    side: &str,
    mode: CompartmentMode,
    equation: &str,
) -> Result<Vec<Term>, EquationError> {
    if side.trim().is_empty() {
        return Ok(Vec::new());
    }
    side.split(" + ")
        .map(|term| parse_term(term, mode, equation))
        .collect()
}

fn parse_term(term: &str, mode: CompartmentMode, equation: &str) -> Result<Term, EquationError> {
    let tokens: Vec<&str> = term.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Err(EquationError::EmptyTerm(equation.to_string())),
        [species] => Ok((canonical_id(species, mode, equation)?, "1".to_string())),
        [coefficient, species] => {
            if !is_numeric(coefficient) {
                return Err(EquationError::InvalidCoefficient {
                    coefficient: coefficient.to_string(),
                    equation: equation.to_string(),
                });
            }
            Ok((
                canonical_id(species, mode, equation)?,
                coefficient.to_string(),
            ))
        }
        _ => Err(EquationError::MissingPlus(equation.to_string())),
    }
}

fn canonical_id(
    species: &str,
    mode: CompartmentMode,
    equation: &str,
) -> Result<String, EquationError> {
    match mode {
        CompartmentMode::NoCompartment => Ok(format!("{METABOLITE_PREFIX}{species}")),
        CompartmentMode::Single(letter) => internal_id(species, letter, equation),
        CompartmentMode::Multi => {
            let (name, letter) = split_compartment_tag(species).ok_or_else(|| {
                EquationError::InvalidCompartmentTag {
                    tag: species.to_string(),
                    text: equation.to_string(),
                }
            })?;
            internal_id(name, letter, equation)
        }
    }
}

/// Escape a metabolite name into its internal id, names already holding the dash escape
/// would collide with a dashed name and are rejected
fn internal_id(name: &str, compartment: char, text: &str) -> Result<String, EquationError> {
    if name.contains(DASH_ESCAPE) {
        return Err(EquationError::ReservedName {
            name: name.to_string(),
            text: text.to_string(),
        });
    }
    Ok(format!(
        "{METABOLITE_PREFIX}{}_{compartment}",
        name.replace('-', DASH_ESCAPE)
    ))
}

fn single_letter(tag: &str) -> Option<char> {
    let mut chars = tag.chars();
    let letter = chars.next()?;
    match chars.next() {
        None if letter.is_ascii_alphabetic() => Some(letter),
        _ => None,
    }
}

/// Split a metabolite like `leu-L[c]` into `("leu-L", 'c')`
fn split_compartment_tag(species: &str) -> Option<(&str, char)> {
    let inner = species.strip_suffix(']')?;
    let (name, tag) = inner.rsplit_once('[')?;
    if name.is_empty() {
        return None;
    }
    Some((name, single_letter(tag)?))
}

/// Split an internal id like `M_leu_DASH_L_c` into `("leu_DASH_L", 'c')`
fn split_internal_id(id: &str) -> Option<(&str, char)> {
    let stripped = id.strip_prefix(METABOLITE_PREFIX)?;
    let (name, letter) = stripped.rsplit_once('_')?;
    if name.is_empty() {
        return None;
    }
    Some((name, single_letter(letter)?))
}

fn is_numeric(coefficient: &str) -> bool {
    coefficient
        .parse::<f64>()
        .map(|value| value.is_finite())
        .unwrap_or(false)
}

/// Remove a useless trailing `.0` (`2.0` -> `2`)
fn trim_coefficient(coefficient: &str) -> &str {
    coefficient.strip_suffix(".0").unwrap_or(coefficient)
}

/// Print an equation, approximately inverting [`parse`]
///
/// When every species shares a compartment the single compartment notation is used,
/// otherwise each species is annotated with its own compartment. Ids which the compartment
/// notations cannot reproduce (no compartment suffix, or an unescaped dash) are printed as
/// with [`make_string_nocomp`].
pub fn make_string(equation: &Equation, reversible: bool) -> String {
    let Some(splits) = equation
        .species()
        .map(|species| split_internal_id(species).filter(|(name, _)| !name.contains('-')))
        .collect::<Option<Vec<(&str, char)>>>()
    else {
        return make_string_nocomp(equation, reversible);
    };
    let arrow = if reversible { "<==>" } else { "-->" };
    let distinct: BTreeSet<char> = splits.iter().map(|(_, letter)| *letter).collect();
    let single = match distinct.into_iter().collect::<Vec<_>>().as_slice() {
        [letter] => Some(*letter),
        _ => None,
    };

    let render_side = |side: &[Term]| -> String {
        side.iter()
            .filter_map(|(species, coefficient)| {
                let (name, letter) = split_internal_id(species)?;
                let name = name.replace(DASH_ESCAPE, "-");
                let name = match single {
                    Some(_) => name,
                    None => format!("{name}[{letter}]"),
                };
                Some(match trim_coefficient(coefficient) {
                    "1" => name,
                    coefficient => format!("{coefficient} {name}"),
                })
            })
            .collect::<Vec<_>>()
            .join(" + ")
    };

    let prefix = single
        .map(|letter| format!("[{letter}] : "))
        .unwrap_or_default();
    format!(
        "{prefix}{} {arrow} {}",
        render_side(&equation.reactants),
        render_side(&equation.products)
    )
}

/// Print an equation using the raw ids (minus the metabolite prefix), without any
/// compartment handling
pub fn make_string_nocomp(equation: &Equation, reversible: bool) -> String {
    let arrow = if reversible { "<==>" } else { "-->" };
    let render_side = |side: &[Term]| -> String {
        side.iter()
            .map(|(species, coefficient)| {
                let name = species.strip_prefix(METABOLITE_PREFIX).unwrap_or(species);
                if coefficient == "1" {
                    name.to_string()
                } else {
                    format!("{coefficient} {name}")
                }
            })
            .collect::<Vec<_>>()
            .join(" + ")
    };
    format!(
        "{} {arrow} {}",
        render_side(&equation.reactants),
        render_side(&equation.products)
    )
}

/// Convert a metabolite like `leu-L[c]` into its internal id `M_leu_DASH_L_c`
pub fn convert_metabolite_ext2int(metabolite: &str) -> Result<String, EquationError> {
    let (name, letter) = split_compartment_tag(metabolite)
        .ok_or_else(|| EquationError::InvalidMetabolite(metabolite.to_string()))?;
    internal_id(name, letter, metabolite)
}

/// Convert an internal id like `M_leu_DASH_L_c` into `leu-L[c]`
pub fn convert_metabolite_int2ext(id: &str) -> Result<String, EquationError> {
    let (name, letter) =
        split_internal_id(id).ok_or_else(|| EquationError::InvalidMetabolite(id.to_string()))?;
    Ok(format!("{}[{letter}]", name.replace(DASH_ESCAPE, "-")))
}

/// Id of the boundary counterpart of a species (final compartment letter replaced by `b`)
pub fn boundary_counterpart(species: &str) -> String {
    let mut chars = species.chars();
    chars.next_back();
    format!("{}{BOUNDARY_COMPARTMENT}", chars.as_str())
}

/// Whether the species id belongs to the boundary compartment
pub fn is_boundary_species(species: &str) -> bool {
    species.ends_with(&format!("_{BOUNDARY_COMPARTMENT}"))
}

/// Errors encountered while parsing equations or metabolite ids
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EquationError {
    /// None of the reaction arrows were found
    #[error("Mistake in reaction direction arrow: {0}")]
    MissingArrow(String),
    /// The reaction arrow was found more than once
    #[error("Reaction arrow appears more than once: {0}")]
    MultipleArrows(String),
    /// A term had more than a coefficient and a species
    #[error("Missing a '+' sign? {0}")]
    MissingPlus(String),
    /// A side contained an empty term, e.g. `A +  + B`
    #[error("Empty term in equation: {0}")]
    EmptyTerm(String),
    /// A coefficient could not be read as a number
    #[error("Invalid stoichiometric coefficient `{coefficient}` in: {equation}")]
    InvalidCoefficient {
        coefficient: String,
        equation: String,
    },
    /// A compartment tag was not a single letter inside brackets
    #[error("Invalid compartment tag `{tag}` in: {text}")]
    InvalidCompartmentTag { tag: String, text: String },
    /// A metabolite name contained the dash escape sequence
    #[error("Metabolite name `{name}` contains the reserved sequence `_DASH_` in: {text}")]
    ReservedName { name: String, text: String },
    /// A metabolite id could not be converted
    #[error("Invalid metabolite: {0}")]
    InvalidMetabolite(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(species: &str, coefficient: &str) -> Term {
        (species.to_string(), coefficient.to_string())
    }

    /// Per side multiset of (species, numeric coefficient)
    fn normalized(equation: &Equation) -> (Vec<(String, f64)>, Vec<(String, f64)>) {
        let side = |terms: &[Term]| {
            let mut side: Vec<(String, f64)> = terms
                .iter()
                .map(|(s, c)| (s.clone(), c.parse::<f64>().unwrap()))
                .collect();
            side.sort_by(|a, b| a.0.cmp(&b.0));
            side
        };
        (side(&equation.reactants), side(&equation.products))
    }

    #[test]
    fn single_compartment() {
        let (reversible, equation) = parse("[c] : akg + asp-L <==> glu-L + oaa").unwrap();
        assert!(reversible);
        assert_eq!(
            equation.reactants,
            vec![term("M_akg_c", "1"), term("M_asp_DASH_L_c", "1")]
        );
        assert_eq!(
            equation.products,
            vec![term("M_glu_DASH_L_c", "1"), term("M_oaa_c", "1")]
        );
    }

    #[test]
    fn explicit_coefficient() {
        let (reversible, equation) =
            parse("[c] : 2 ala-D + atp <==> adp + alaala + h + pi").unwrap();
        assert!(reversible);
        assert_eq!(equation.reactants[0], term("M_ala_DASH_D_c", "2"));
        assert_eq!(equation.reactants[1], term("M_atp_c", "1"));
        assert_eq!(equation.products.len(), 4);

        let (reversible, equation) = parse("[c] : gtp + 3 h2o --> 25dhpp + for + 2 h + ppi").unwrap();
        assert!(!reversible);
        assert_eq!(equation.reactants[1], term("M_h2o_c", "3"));
        assert_eq!(equation.products[2], term("M_h_c", "2"));
    }

    #[test]
    fn multi_compartment() {
        let (reversible, equation) =
            parse("atp[c] + h2o[c] + urea[e] --> adp[c] + h[c] + urea[c] + pi[c]").unwrap();
        assert!(!reversible);
        assert_eq!(
            equation.reactants,
            vec![
                term("M_atp_c", "1"),
                term("M_h2o_c", "1"),
                term("M_urea_e", "1")
            ]
        );
        assert_eq!(equation.products[2], term("M_urea_c", "1"));
    }

    #[test]
    fn no_compartment() {
        let (reversible, equation) = parse("A + B <==> C + D").unwrap();
        assert!(reversible);
        assert_eq!(equation.reactants, vec![term("M_A", "1"), term("M_B", "1")]);
        assert_eq!(equation.products, vec![term("M_C", "1"), term("M_D", "1")]);

        let (reversible, equation) = parse("2 A + B --> C").unwrap();
        assert!(!reversible);
        assert_eq!(equation.reactants[0], term("M_A", "2"));
    }

    #[test]
    fn backward_arrow_swaps_sides() {
        let (reversible, equation) = parse("C <-- A + B").unwrap();
        assert!(!reversible);
        assert_eq!(equation.reactants, vec![term("M_A", "1"), term("M_B", "1")]);
        assert_eq!(equation.products, vec![term("M_C", "1")]);
    }

    #[test]
    fn short_reversible_arrow() {
        let (reversible, equation) = parse("[m] : A <=> B").unwrap();
        assert!(reversible);
        assert_eq!(equation.products, vec![term("M_B_m", "1")]);
    }

    #[test]
    fn empty_side() {
        let (_, equation) = parse("[c] : A --> ").unwrap();
        assert_eq!(equation.reactants, vec![term("M_A_c", "1")]);
        assert!(equation.products.is_empty());
    }

    #[test]
    fn run_together_species_rejected() {
        match parse("A B --> C") {
            Err(EquationError::InvalidCoefficient { equation, .. }) => {
                assert_eq!(equation, "A B --> C")
            }
            other => panic!("Expected an invalid coefficient error, got {:?}", other),
        }
        let err = parse("A B --> C").unwrap_err();
        assert!(err.to_string().contains("A B --> C"));
    }

    #[test]
    fn missing_plus() {
        match parse("[c] : 2 A B --> C") {
            Err(EquationError::MissingPlus(text)) => assert_eq!(text, "[c] : 2 A B --> C"),
            other => panic!("Expected a missing plus error, got {:?}", other),
        }
    }

    #[test]
    fn missing_arrow() {
        match parse("A + B = C") {
            Err(EquationError::MissingArrow(text)) => assert_eq!(text, "A + B = C"),
            other => panic!("Expected a missing arrow error, got {:?}", other),
        }
    }

    #[test]
    fn multiple_arrows() {
        assert!(matches!(
            parse("A --> B --> C"),
            Err(EquationError::MultipleArrows(_))
        ));
    }

    #[test]
    fn multi_letter_compartment_rejected() {
        assert!(matches!(
            parse("atp[cx] --> atp[e]"),
            Err(EquationError::InvalidCompartmentTag { .. })
        ));
        assert!(matches!(
            parse("[cx] : A --> B"),
            Err(EquationError::InvalidCompartmentTag { .. })
        ));
    }

    #[test]
    fn print_single_compartment() {
        let (reversible, equation) = parse("[c] : 2 ala-D + atp <==> adp + alaala").unwrap();
        assert_eq!(
            make_string(&equation, reversible),
            "[c] : 2 ala-D + atp <==> adp + alaala"
        );
    }

    #[test]
    fn print_multi_compartment() {
        let equation = Equation::new(
            vec![term("M_atp_c", "1.0"), term("M_urea_e", "2.0")],
            vec![term("M_urea_c", "1"), term("M_leu_DASH_L_c", "0.5")],
        );
        assert_eq!(
            make_string(&equation, false),
            "atp[c] + 2 urea[e] --> urea[c] + 0.5 leu-L[c]"
        );
    }

    #[test]
    fn print_nocomp() {
        let (reversible, equation) = parse("2 A + B <==> C").unwrap();
        assert_eq!(make_string_nocomp(&equation, reversible), "2 A + B <==> C");
        assert_eq!(make_string(&equation, reversible), "2 A + B <==> C");
    }

    #[test]
    fn round_trip() {
        let equations = [
            "A + B <==> C + D",
            "2 A + B --> C",
            "[c] : A + 2 B <==> C",
            "A[c] + B[e] --> C[c]",
            "C <-- A + B",
            "[c] : akg + asp-L <==> glu-L + oaa",
            "atp[c] + h2o[c] + urea[e] --> adp[c] + h[c] + urea[c] + pi[c]",
            "[m] : 2.0 nadh + o2 <=> 2 nad + 2 h2o",
            "[c] : A --> ",
            "A_c + B --> C",
            "glc-D_c --> x_c",
        ];
        for text in equations {
            let (reversible, equation) = parse(text).unwrap();
            let printed = make_string(&equation, reversible);
            let (reparsed_reversible, reparsed) = parse(&printed)
                .unwrap_or_else(|e| panic!("Failed to reparse {printed} (from {text}): {e}"));
            assert_eq!(reversible, reparsed_reversible, "{text}");
            assert_eq!(normalized(&equation), normalized(&reparsed), "{text}");
        }
    }

    #[test]
    fn canonical_ids_are_distinct_within_a_compartment() {
        let names = ["glu-L", "glu-D", "glu", "gluL", "glu_L", "glu_DASH_L"];
        let mut ids = BTreeSet::new();
        for name in names {
            match parse(&format!("[c] : {name} --> ")) {
                Ok((_, equation)) => assert!(
                    ids.insert(equation.reactants[0].0.clone()),
                    "{name} collided"
                ),
                Err(EquationError::ReservedName { name: reserved, .. }) => {
                    assert_eq!(reserved, "glu_DASH_L")
                }
                Err(err) => panic!("Unexpected error for {name}: {err}"),
            }
        }
        assert_eq!(ids.len(), names.len() - 1);
        assert!(matches!(
            parse("[c] : glu-L --> glu_DASH_L"),
            Err(EquationError::ReservedName { .. })
        ));
        assert!(matches!(
            parse("glu_DASH_L[c] --> glu[e]"),
            Err(EquationError::ReservedName { .. })
        ));
        assert!(matches!(
            convert_metabolite_ext2int("glu_DASH_L[c]"),
            Err(EquationError::ReservedName { .. })
        ));
    }

    #[test]
    fn uncompartmented_ids_print_raw() {
        let (reversible, equation) = parse("A_c + B --> C").unwrap();
        assert_eq!(make_string(&equation, reversible), "A_c + B --> C");
        let (reversible, equation) = parse("glc-D_c --> x_c").unwrap();
        assert_eq!(equation.reactants[0].0, "M_glc-D_c");
        assert_eq!(make_string(&equation, reversible), "glc-D_c --> x_c");
    }

    #[test]
    fn metabolite_conversions() {
        assert_eq!(
            convert_metabolite_ext2int("leu-L[c]").unwrap(),
            "M_leu_DASH_L_c"
        );
        assert_eq!(
            convert_metabolite_int2ext("M_leu_DASH_L_c").unwrap(),
            "leu-L[c]"
        );
        assert!(convert_metabolite_ext2int("leu-L").is_err());
        assert!(convert_metabolite_int2ext("leu").is_err());
    }

    #[test]
    fn boundary_helpers() {
        assert_eq!(boundary_counterpart("M_glc_DASH_D_e"), "M_glc_DASH_D_b");
        assert!(is_boundary_species("M_glc_DASH_D_b"));
        assert!(!is_boundary_species("M_glc_DASH_D_e"));
    }
}
