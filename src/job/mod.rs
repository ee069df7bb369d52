//! Job domain: configuration decoding, parameters, and errors

mod config;
mod errors;
mod params;

pub use config::{JobConfig, ParameterDefinition};
pub use errors::JobError;
pub use params::{
    BuiltinRef, CiProvider, DeriveInputs, Overrides, ParamSet, Parameter, derive_params,
    undeclared_builtin_refs,
};
