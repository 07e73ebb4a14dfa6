//! Core rust implementation of metmodel, a crate for building constraint based metabolic
//! models from reaction equations, formulating them as linear programs, and running
//! knockout analyses against an LP solver.

pub mod analysis;
pub mod configuration;
pub mod io;
pub mod metabolic_model;
pub mod optimize;
