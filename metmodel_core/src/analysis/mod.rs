//! Analyses built on repeated solves of a model

pub mod deletion;
