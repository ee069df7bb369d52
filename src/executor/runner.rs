//! Sequential step execution
//!
//! Runs the materialized build steps one at a time: write the step's
//! command file, rewrite the driver, spawn it, wait with a fixed
//! timeout, and stop at the first non-zero exit. Only one child process
//! is ever in flight.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::job::{JobError, ParamSet};

use super::scripts::{DriverFile, StepScript, VariablesFile};

/// How often the runner polls a child for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for a job run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Materialize artifacts but execute nothing and delete nothing.
    pub dry_run: bool,

    /// Per-step execution timeout; the child is killed on expiry.
    pub timeout: Duration,

    /// Directory holding the generated scripts.
    pub temp_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            timeout: Duration::from_secs(3600),
            temp_dir: std::env::temp_dir(),
        }
    }
}

/// Outcome of one executed step
#[derive(Debug)]
struct StepOutcome {
    exit_code: i32,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

/// Executes a job's build steps sequentially
#[derive(Debug, Clone)]
pub struct JobRunner {
    config: RunnerConfig,
}

impl JobRunner {
    /// Creates a runner with the given configuration
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Runs every step in order, stopping at the first failure
    ///
    /// On success all generated files are deleted. On failure the
    /// variables file and driver stay on disk for inspection; the
    /// failing step's command file is still removed. In dry-run mode
    /// nothing is executed and nothing is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::StepFailed`] with the child's exit code,
    /// [`JobError::StepTimeout`] when a step had to be killed, or
    /// [`JobError::Io`] when an artifact cannot be written.
    pub fn run(&self, params: &ParamSet, commands: &[String]) -> Result<(), JobError> {
        let variables = VariablesFile::materialize(&self.config.temp_dir, params)?;
        if self.config.dry_run {
            println!("Arguments file: {}", variables.path().display());
        }

        let driver = DriverFile::new(&self.config.temp_dir);

        for (index, command) in commands.iter().enumerate() {
            let step_no = index + 1;
            let step = StepScript::materialize(
                &self.config.temp_dir,
                step_no,
                command,
                self.config.dry_run,
            )?;
            driver.write_for_step(variables.path(), step.path())?;

            if self.config.dry_run {
                println!("Command file:   {}", step.path().display());
                continue;
            }

            tracing::debug!(step = step_no, "Executing build step");
            let outcome = self.execute_driver(&driver)?;

            if outcome.timed_out {
                report_failure(command, &outcome);
                return Err(JobError::StepTimeout {
                    step: step_no,
                    duration: self.config.timeout,
                });
            }

            if outcome.exit_code != 0 {
                report_failure(command, &outcome);
                return Err(JobError::StepFailed {
                    step: step_no,
                    code: outcome.exit_code,
                });
            }

            report_success(command);
        }

        if !self.config.dry_run {
            variables.remove()?;
            // A job with no steps never wrote the driver.
            if driver.path().exists() {
                driver.remove()?;
            }
        }

        Ok(())
    }

    /// Spawns the driver and waits for it, killing it on timeout
    ///
    /// Output is echoed line by line as it arrives and collected for
    /// the failure report; whatever arrived before a kill is kept.
    fn execute_driver(&self, driver: &DriverFile) -> Result<StepOutcome, JobError> {
        let mut child = Command::new(driver.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take().unwrap();

        let stdout_handle = Arc::new(Mutex::new(String::new()));
        let stderr_handle = Arc::new(Mutex::new(String::new()));

        let stdout_thread = {
            let stdout_handle = Arc::clone(&stdout_handle);
            std::thread::spawn(move || {
                let reader = io::BufReader::new(stdout);
                for line in reader.lines().map_while(Result::ok) {
                    println!("{line}");
                    let mut guard = stdout_handle.lock().unwrap();
                    guard.push_str(&line);
                    guard.push('\n');
                }
            })
        };

        let stderr_thread = {
            let stderr_handle = Arc::clone(&stderr_handle);
            std::thread::spawn(move || {
                let reader = io::BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    eprintln!("{line}");
                    let mut guard = stderr_handle.lock().unwrap();
                    guard.push_str(&line);
                    guard.push('\n');
                }
            })
        };

        let deadline = Instant::now() + self.config.timeout;
        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                timed_out = true;
                child.kill()?;
                break child.wait()?;
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        // After a kill, orphaned grandchildren may keep the pipes open
        // and the readers blocked; take whatever output arrived instead
        // of joining.
        if !timed_out {
            let _ = stdout_thread.join();
            let _ = stderr_thread.join();
        }

        let stdout = stdout_handle.lock().unwrap().clone();
        let stderr = stderr_handle.lock().unwrap().clone();

        Ok(StepOutcome {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            timed_out,
        })
    }
}

fn report_success(command: &str) {
    println!("#---- command ----:\n{command}\n#---- end command ----\n\nSUCCESS\n");
}

fn report_failure(command: &str, outcome: &StepOutcome) {
    println!("#---- command ----:\n{command}\n#---- end command ----\n");
    if !outcome.stdout.is_empty() {
        println!("#---- stdout ----:\n{}#---- end stdout ----\n", outcome.stdout);
    }
    if !outcome.stderr.is_empty() {
        println!("#---- stderr ----:\n{}#---- end stderr ----\n", outcome.stderr);
    }
    if outcome.timed_out {
        println!("Killed on timeout, last exit code {}\n", outcome.exit_code);
    } else {
        println!("Returned with errorcode {}\n", outcome.exit_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ParamSet, Parameter};
    use tempfile::TempDir;

    fn runner_in(dir: &TempDir, dry_run: bool) -> JobRunner {
        JobRunner::new(RunnerConfig {
            dry_run,
            timeout: Duration::from_secs(30),
            temp_dir: dir.path().to_path_buf(),
        })
    }

    fn sample_params() -> ParamSet {
        let mut params = ParamSet::new();
        params.insert(Parameter::new("GREETING", "hello", "auto-generated"));
        params
    }

    fn leftover_files(dir: &TempDir, prefix: &str) -> Vec<String> {
        std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    #[test]
    fn test_all_steps_succeed_and_clean_up() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let commands = vec![
            "echo step one".to_string(),
            format!("echo \"$GREETING\" > {}", marker.display()),
        ];

        runner_in(&dir, false)
            .run(&sample_params(), &commands)
            .unwrap();

        // Parameters were exported to the steps via the variables file
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "hello\n");

        // Full success removes every generated artifact
        assert!(leftover_files(&dir, "jjrunner_").is_empty());
    }

    #[test]
    fn test_failure_stops_run_and_keeps_variables_file() {
        let dir = TempDir::new().unwrap();
        let never = dir.path().join("never");
        let commands = vec![
            "echo ok".to_string(),
            "exit 3".to_string(),
            format!("touch {}", never.display()),
        ];

        let err = runner_in(&dir, false)
            .run(&sample_params(), &commands)
            .unwrap_err();

        assert!(matches!(err, JobError::StepFailed { step: 2, code: 3 }));
        assert_eq!(err.exit_code(), 3);

        // Steps after the failing one never ran
        assert!(!never.exists());

        // Variables file and driver survive for inspection; the failing
        // step's command file does not.
        assert_eq!(leftover_files(&dir, "jjrunner_args_").len(), 1);
        assert_eq!(leftover_files(&dir, "jjrunner_main_").len(), 1);
        assert!(leftover_files(&dir, "jjrunner_com_").is_empty());
    }

    #[test]
    fn test_dry_run_executes_nothing_and_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let commands = vec![
            format!("touch {}", marker.display()),
            "echo second".to_string(),
        ];

        runner_in(&dir, true)
            .run(&sample_params(), &commands)
            .unwrap();

        assert!(!marker.exists());
        assert_eq!(leftover_files(&dir, "jjrunner_args_").len(), 1);
        assert_eq!(leftover_files(&dir, "jjrunner_com_").len(), 2);
    }

    #[test]
    fn test_empty_command_list_succeeds() {
        let dir = TempDir::new().unwrap();
        runner_in(&dir, false).run(&sample_params(), &[]).unwrap();
        assert!(leftover_files(&dir, "jjrunner_").is_empty());
    }

    #[test]
    fn test_timeout_kills_step() {
        let dir = TempDir::new().unwrap();
        let runner = JobRunner::new(RunnerConfig {
            dry_run: false,
            timeout: Duration::from_millis(200),
            temp_dir: dir.path().to_path_buf(),
        });

        let commands = vec!["sleep 30".to_string()];
        let err = runner.run(&sample_params(), &commands).unwrap_err();

        assert!(matches!(err, JobError::StepTimeout { step: 1, .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_partial_output_captured_before_failure() {
        let dir = TempDir::new().unwrap();
        let commands = vec!["echo partial; exit 7".to_string()];

        let err = runner_in(&dir, false)
            .run(&sample_params(), &commands)
            .unwrap_err();

        assert!(matches!(err, JobError::StepFailed { step: 1, code: 7 }));
    }
}
