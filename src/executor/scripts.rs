//! Script materialization
//!
//! Builds the three shell artifacts a run needs in the system temp
//! directory, all owner-rwx only:
//!
//! - one variables file exporting every derived parameter
//! - one command file per build step, holding the raw step body
//! - one driver file, rewritten before each step, that sources the
//!   variables file and invokes the step's command file
//!
//! Cleanup policy is deliberately asymmetric: command files are removed
//! as soon as their step finishes, success or failure, while the
//! variables file and driver only go away after a fully successful run,
//! so a failed run leaves the exported environment on disk for
//! inspection. Dry runs keep everything.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::job::ParamSet;

/// Owner read/write/execute only.
const SCRIPT_MODE: u32 = 0o700;

fn write_script(path: &Path, content: &str) -> io::Result<()> {
    fs::write(path, content)?;
    fs::set_permissions(path, fs::Permissions::from_mode(SCRIPT_MODE))
}

/// Single-quotes a value for a shell export statement
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// The generated file exporting every parameter
#[derive(Debug)]
pub struct VariablesFile {
    path: PathBuf,
}

impl VariablesFile {
    /// Writes the variables file for a parameter set
    ///
    /// Emits, per parameter in insertion order, a `# description`
    /// comment when one exists and an `export NAME='value'` line.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if the file cannot be written.
    pub fn materialize(dir: &Path, params: &ParamSet) -> io::Result<Self> {
        let path = dir.join(format!("jjrunner_args_{}.sh", Uuid::new_v4()));

        let mut content = String::new();
        for param in params.iter() {
            if let Some(description) = &param.description {
                content.push_str(&format!("# {description}\n"));
            }
            content.push_str(&format!(
                "export {}={}\n\n",
                param.name,
                shell_quote(&param.value)
            ));
        }

        write_script(&path, &content)?;
        Ok(Self { path })
    }

    /// Path of the variables file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file; called only after a fully successful run
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if the file cannot be removed.
    pub fn remove(self) -> io::Result<()> {
        fs::remove_file(&self.path)
    }
}

/// The generated driver script, rewritten once per step
#[derive(Debug)]
pub struct DriverFile {
    path: PathBuf,
}

impl DriverFile {
    /// Picks a driver path; the file is written per step
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("jjrunner_main_{}.sh", Uuid::new_v4())),
        }
    }

    /// Rewrites the driver to source the variables file and run a step
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if the file cannot be written.
    pub fn write_for_step(&self, variables: &Path, command: &Path) -> io::Result<()> {
        let content = format!(
            "#!/bin/bash\n. {}\n{}\n",
            variables.display(),
            command.display()
        );
        write_script(&self.path, &content)
    }

    /// Path of the driver script
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the driver; called only after a fully successful run
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if the file cannot be removed.
    pub fn remove(self) -> io::Result<()> {
        fs::remove_file(&self.path)
    }
}

/// One step's command file, removed when the step's scope ends
#[derive(Debug)]
pub struct StepScript {
    path: PathBuf,
    keep: bool,
}

impl StepScript {
    /// Writes the raw step body to a numbered command file
    ///
    /// `step` is the 1-indexed step position. With `keep` set (dry
    /// run) the file survives the scope for inspection.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if the file cannot be written.
    pub fn materialize(dir: &Path, step: usize, body: &str, keep: bool) -> io::Result<Self> {
        let path = dir.join(format!("jjrunner_com_{}_{}.sh", step, Uuid::new_v4()));
        write_script(&path, body)?;
        Ok(Self { path, keep })
    }

    /// Path of the command file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StepScript {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_file(&self.path);
        }
    }
}
