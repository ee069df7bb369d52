//! Infrastructure layer
//!
//! External concerns: the Jenkins HTTP endpoint, local git lookups,
//! and logging setup.

pub mod git;
pub mod jenkins;
pub mod logging;

pub use jenkins::{Credentials, DEFAULT_SERVER_URL, JenkinsClient};
