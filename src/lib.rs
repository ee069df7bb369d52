//! # jjrunner - run CI jobs locally
//!
//! jjrunner fetches a Jenkins job's configuration, rebuilds its
//! parameter set and shell build steps on the caller's machine, and
//! executes the steps sequentially, so a CI job's exact shell behavior
//! can be reproduced without triggering a remote build.
//!
//! ## Pipeline
//!
//! 1. Fetch the job's `config.xml` with the credentials from
//!    `JJR_USER`/`JJR_PASS`
//! 2. Derive the ordered parameter set (auto-generated entries, local
//!    git branch, server-declared defaults, local builtin variables,
//!    caller overrides)
//! 3. Warn about builtin variables the steps reference but nothing
//!    defines
//! 4. Materialize a variables file, per-step command files, and a
//!    driver script in the system temp directory
//! 5. Run each step as a child process with a fixed timeout, stopping
//!    at the first non-zero exit
//!
//! ## Quick Start
//!
//! ```bash
//! export JJR_USER=me JJR_PASS=token
//!
//! # Run a job locally
//! jjrunner my-job
//!
//! # Override parameters and inspect what would run
//! jjrunner my-job --args '{"branch": "feature/x"}' --dryrun
//! ```
//!
//! ## License
//!
//! Licensed under either of
//! - Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <https://www.apache.org/licenses/LICENSE-2.0>)
//! - MIT license ([LICENSE-MIT](LICENSE-MIT) or <https://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod executor;
pub mod infrastructure;
pub mod job;

// Re-export commonly used types
pub use executor::{DriverFile, JobRunner, RunnerConfig, StepScript, VariablesFile};
pub use infrastructure::{Credentials, DEFAULT_SERVER_URL, JenkinsClient};
pub use job::{
    BuiltinRef, CiProvider, DeriveInputs, JobConfig, JobError, Overrides, ParamSet, Parameter,
    ParameterDefinition, derive_params, undeclared_builtin_refs,
};

/// Version of the jjrunner crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
