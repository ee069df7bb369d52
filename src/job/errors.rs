//! Error types for the job domain

use thiserror::Error;

/// Errors that can occur while fetching, rebuilding, or running a job
#[derive(Error, Debug)]
pub enum JobError {
    /// Required credential environment variables are not set
    #[error("JJR_USER and/or JJR_PASS environment variables are not set")]
    MissingCredentials,

    /// The job configuration could not be retrieved from the server
    #[error("failed to fetch configuration for job '{job}': {reason}")]
    Fetch {
        /// Name of the job being fetched.
        job: String,
        /// Description of the transport or HTTP failure.
        reason: String,
    },

    /// The job configuration document is missing an expected section
    #[error("malformed job configuration: {0}")]
    MalformedConfig(String),

    /// The `--args` JSON did not decode to a flat object of scalars
    #[error("invalid override arguments: {0}")]
    InvalidOverrides(String),

    /// A build step exited with a non-zero code
    #[error("step {step} failed with exit code {code}")]
    StepFailed {
        /// 1-indexed position of the failing step.
        step: usize,
        /// Exit code returned by the child process.
        code: i32,
    },

    /// A build step exceeded the execution timeout and was killed
    #[error("step {step} timed out after {duration:?}")]
    StepTimeout {
        /// 1-indexed position of the step.
        step: usize,
        /// Duration waited before the kill.
        duration: std::time::Duration,
    },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// Maps the error to the process exit code.
    ///
    /// A failed step propagates the child's own exit code; everything
    /// else exits 1. Codes outside `1..=255` are mapped to 1 so the
    /// shell never sees a spurious 0.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::StepFailed { code, .. } => {
                let masked = (*code & 0xff) as u8;
                if *code <= 0 || masked == 0 { 1 } else { masked }
            }
            _ => 1,
        }
    }
}
