//! CLI for jjrunner
//!
//! Parses the command line and drives the whole pipeline: fetch the
//! job configuration, derive parameters, warn about undeclared builtin
//! variables, materialize the scripts, and run the steps.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;

use jjrunner::executor::{JobRunner, RunnerConfig};
use jjrunner::infrastructure::{Credentials, DEFAULT_SERVER_URL, JenkinsClient, git};
use jjrunner::job::{
    CiProvider, DeriveInputs, JobConfig, Overrides, derive_params, undeclared_builtin_refs,
};

/// CLI arguments for jjrunner
#[derive(Parser, Debug)]
#[command(name = "jjrunner")]
#[command(author, version, about = "Execute CI jobs locally", long_about = None)]
struct Args {
    /// Name of the job to run locally
    jobname: String,

    /// JSON object overriding job arguments
    #[arg(short, long)]
    args: Option<String>,

    /// Materialize scripts under the temp directory without running them
    #[arg(short, long)]
    dryrun: bool,

    /// Build reason recorded in the BUILD_REASON parameter
    #[arg(short, long)]
    reason: Option<String>,
}

/// Parse arguments and run the job end to end
pub fn run() -> Result<()> {
    let args = Args::parse();
    tracing::debug!(job = %args.jobname, overrides = ?args.args, "Starting run");

    // Overrides are validated before any network or filesystem work.
    let overrides = match &args.args {
        Some(json) => Overrides::parse(json)?,
        None => Overrides::default(),
    };

    let credentials = Credentials::from_env()?;
    let server_url =
        std::env::var("JJR_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    let client = JenkinsClient::new(&server_url, credentials)?;

    let xml = client
        .fetch_job_config(&args.jobname)
        .with_context(|| format!("fetching configuration for job '{}'", args.jobname))?;
    let config = JobConfig::parse(&xml)
        .with_context(|| format!("decoding configuration for job '{}'", args.jobname))?;

    let cwd = std::env::current_dir().context("resolving current directory")?;
    let branch = git::current_branch(&cwd);
    if branch.is_none() {
        tracing::warn!("retrieving git information failed, continuing without a branch");
    }

    let env: HashMap<String, String> = std::env::vars().collect();
    let reason = args.reason.clone().unwrap_or_else(|| {
        let user = env
            .get("USER")
            .or_else(|| env.get("USERNAME"))
            .map_or("unknown", String::as_str);
        format!("Started by user {user}")
    });
    let home = env.get("HOME").map_or("/", String::as_str).to_string();

    let provider = CiProvider::jenkins();
    let params = derive_params(
        &provider,
        &config,
        &overrides,
        &DeriveInputs {
            job_name: &args.jobname,
            reason: &reason,
            home: &home,
            branch: branch.as_deref(),
            env: &env,
        },
    );

    for reference in undeclared_builtin_refs(&provider, &params, &config.commands) {
        tracing::warn!(
            var = reference.name,
            step = reference.step,
            "builtin variable referenced by step but not defined"
        );
    }

    let runner = JobRunner::new(RunnerConfig {
        dry_run: args.dryrun,
        ..RunnerConfig::default()
    });
    runner.run(&params, &config.commands)?;

    Ok(())
}
