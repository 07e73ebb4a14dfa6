use std::path::PathBuf;
use std::time::Duration;

use metmodel_core::analysis::deletion::{
    pairwise_deletion, single_deletion, DeletionOptions, DeletionOptionsBuilder,
};
use metmodel_core::io::equation::{self, Equation};
use metmodel_core::metabolic_model::gene::GeneAssociations;
use metmodel_core::metabolic_model::model::Model;
use metmodel_core::metabolic_model::reaction::Constraint;
use metmodel_core::optimize::objective::{Objective, ObjectiveSense};
use metmodel_core::optimize::solvers::glpk::GlpsolSolver;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use tracing_subscriber::EnvFilter;

fn value_error<E: std::fmt::Display>(err: E) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn runtime_error<E: std::fmt::Display>(err: E) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

/// A constraint-based metabolic model
#[pyclass(name = "Model")]
struct PyModel {
    inner: Model,
    solver: GlpsolSolver,
}

#[pymethods]
impl PyModel {
    #[new]
    #[pyo3(signature = (vmax=None, glpsol=None, timeout_secs=None))]
    fn new(vmax: Option<String>, glpsol: Option<String>, timeout_secs: Option<u64>) -> Self {
        let mut inner = Model::new_empty();
        if let Some(vmax) = vmax {
            inner.vmax = vmax;
        }
        let mut solver = GlpsolSolver::default();
        if let Some(glpsol) = glpsol {
            solver.executable = PathBuf::from(glpsol);
        }
        if let Some(timeout_secs) = timeout_secs {
            solver.timeout = Duration::from_secs(timeout_secs);
        }
        PyModel { inner, solver }
    }

    fn set_id(&mut self, id: &str) {
        self.inner.set_id(id);
    }

    fn set_name(&mut self, name: &str) {
        self.inner.set_name(name);
    }

    #[getter]
    fn reactions(&self) -> Vec<String> {
        self.inner.reactions.keys().cloned().collect()
    }

    #[getter]
    fn species(&self) -> Vec<String> {
        self.inner.species.keys().cloned().collect()
    }

    #[pyo3(signature = (id, equation, name="", notes=Vec::new()))]
    fn add_reaction(
        &mut self,
        id: &str,
        equation: &str,
        name: &str,
        notes: Vec<String>,
    ) -> PyResult<()> {
        let notes: Vec<&str> = notes.iter().map(String::as_str).collect();
        self.inner
            .add_reaction_from_equation(id, name, &notes, equation)
            .map_err(value_error)
    }

    fn delete_reaction(&mut self, id: &str) {
        self.inner.delete_reaction(id);
    }

    fn equation(&self, id: &str) -> Option<String> {
        self.inner.equation_string(id)
    }

    fn add_note(&mut self, id: &str, note: &str) {
        self.inner.add_note(id, note);
    }

    fn delete_note(&mut self, id: &str, note: &str) {
        self.inner.delete_note(id, note);
    }

    fn notes_by_tag(&self, id: &str, tag: &str) -> Vec<String> {
        self.inner.notes_by_tag(id, tag)
    }

    fn set_constraint(&mut self, id: &str, lower: &str, upper: &str) {
        self.inner.set_constraint(id, lower, upper);
    }

    fn unset_constraint(&mut self, id: &str) {
        self.inner.unset_constraint(id);
    }

    fn bounds(&self, id: &str) -> Option<(String, String)> {
        self.inner
            .bounds(id)
            .map(|constraint| (constraint.lower, constraint.upper))
    }

    fn reset_vmax(&mut self, vmax: &str) {
        self.inner.reset_vmax(vmax);
    }

    fn set_sources(&mut self, species: Vec<String>) -> PyResult<()> {
        self.inner.set_sources(&species).map_err(value_error)
    }

    fn set_escapes(&mut self, species: Vec<String>) -> PyResult<()> {
        self.inner.set_escapes(&species).map_err(value_error)
    }

    /// Exchanges are given as `(species, lower, upper)`
    fn set_exchanges(&mut self, exchanges: Vec<(String, String, String)>) -> PyResult<()> {
        let exchanges: Vec<(String, Constraint)> = exchanges
            .into_iter()
            .map(|(species, lower, upper)| (species, Constraint::new(&lower, &upper)))
            .collect();
        self.inner.set_exchanges(&exchanges).map_err(value_error)
    }

    #[pyo3(signature = (reaction, sense="Maximize"))]
    fn set_objective(&mut self, reaction: &str, sense: &str) -> PyResult<()> {
        let sense: ObjectiveSense = sense.parse().map_err(value_error)?;
        self.inner.set_objective(Objective::new(sense, reaction));
        Ok(())
    }

    /// Solve the model, returning the status and objective value
    fn solve(&mut self, py: Python<'_>) -> PyResult<(String, Option<f64>)> {
        let PyModel { inner, solver } = self;
        let result = py
            .allow_threads(|| inner.solve(&*solver).map(|result| result.clone()))
            .map_err(value_error)?;
        Ok((format!("{:?}", result.status), result.objective_value))
    }

    /// Flux through each reaction from the latest solve
    fn flux(&self) -> Vec<(String, f64)> {
        self.inner
            .flux
            .as_ref()
            .map(|flux| {
                flux.flux_by_reaction
                    .iter()
                    .map(|(id, value)| (id.clone(), *value))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Delete genes (from `Gene_association: ` notes) or reactions one at a time,
    /// returning the lethal ones
    #[pyo3(signature = (level="reactions", processes=1))]
    fn single_deletion(
        &self,
        py: Python<'_>,
        level: &str,
        processes: usize,
    ) -> PyResult<Vec<String>> {
        let associations = match level {
            "reactions" => GeneAssociations::reaction_level(&self.inner),
            "genes" => GeneAssociations::from_notes(&self.inner).map_err(value_error)?,
            other => {
                return Err(PyValueError::new_err(format!(
                    "Unknown deletion level `{other}`, expected reactions or genes"
                )))
            }
        };
        let options = DeletionOptionsBuilder::default()
            .processes(processes)
            .build()
            .map_err(value_error)?;
        let report = py
            .allow_threads(|| {
                single_deletion(&self.inner, &self.solver, &associations, &options, None)
            })
            .map_err(runtime_error)?;
        Ok(report
            .lethal_items()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Delete every pair of reactions, returning the lethal pairs
    #[pyo3(signature = (processes=1, exclude_essential=true))]
    fn pairwise_deletion(
        &self,
        py: Python<'_>,
        processes: usize,
        exclude_essential: bool,
    ) -> PyResult<Vec<(String, String)>> {
        let options = DeletionOptions {
            processes,
            exclude_essential,
            ..DeletionOptions::default()
        };
        let report = py
            .allow_threads(|| pairwise_deletion(&self.inner, &self.solver, &options, None))
            .map_err(runtime_error)?;
        Ok(report
            .lethal_pairs()
            .into_iter()
            .map(|(first, second)| (first.to_string(), second.to_string()))
            .collect())
    }
}

/// Parse a reaction equation into `(reversible, reactants, products)`
#[pyfunction]
fn parse_equation(text: &str) -> PyResult<(bool, Vec<(String, String)>, Vec<(String, String)>)> {
    let (reversible, parsed) = equation::parse(text).map_err(value_error)?;
    Ok((reversible, parsed.reactants, parsed.products))
}

/// Print a parsed equation
#[pyfunction]
fn make_string(
    reactants: Vec<(String, String)>,
    products: Vec<(String, String)>,
    reversible: bool,
) -> String {
    equation::make_string(&Equation::new(reactants, products), reversible)
}

#[pyfunction]
fn convert_metabolite_ext2int(metabolite: &str) -> PyResult<String> {
    equation::convert_metabolite_ext2int(metabolite).map_err(value_error)
}

#[pyfunction]
fn convert_metabolite_int2ext(id: &str) -> PyResult<String> {
    equation::convert_metabolite_int2ext(id).map_err(value_error)
}

/// A Python module implemented in Rust. The name of this function must match
/// the `lib.name` setting in the `Cargo.toml`, else Python will not be able to
/// import the module.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // A subscriber may already be installed by an earlier import
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
    m.add_function(wrap_pyfunction!(parse_equation, m)?)?;
    m.add_function(wrap_pyfunction!(make_string, m)?)?;
    m.add_function(wrap_pyfunction!(convert_metabolite_ext2int, m)?)?;
    m.add_function(wrap_pyfunction!(convert_metabolite_int2ext, m)?)?;
    m.add_class::<PyModel>()?;
    Ok(())
}
