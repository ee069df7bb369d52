//! jjrunner - execute CI jobs locally
//!
//! Fetches a Jenkins job's configuration and runs its shell build
//! steps on this machine, exporting the job's parameters first.
//!
//! ```bash
//! export JJR_USER=me JJR_PASS=token
//! jjrunner my-job --args '{"branch": "feature/x"}'
//! ```
//!
//! Exit code is 1 for missing credentials or fetch/decoding failures,
//! the failing step's own exit code when a step fails, and 0 on full
//! success or a completed dry run.

use jjrunner::JobError;
use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    jjrunner::infrastructure::logging::init_logging("info");

    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e.downcast_ref::<JobError>().map_or(1, JobError::exit_code);
            ExitCode::from(code)
        }
    }
}
