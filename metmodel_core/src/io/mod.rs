//! Module for reading and writing the textual notations used by models
pub mod equation;
pub mod gpr_parse;
