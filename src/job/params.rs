//! Parameter derivation for locally executed jobs
//!
//! Rebuilds the environment a job would see on the CI server by merging,
//! in precedence order:
//!
//! 1. Auto-generated entries (build reason, job name, home, build number)
//! 2. The local git branch, when one could be resolved
//! 3. Parameters declared in the remote job configuration
//! 4. Provider builtin variables present in the local environment
//! 5. Caller-supplied JSON overrides
//!
//! Later sources override the value of earlier ones but never their
//! position: the parameter set keeps first-insertion order, which is the
//! order entries appear in the generated variables file.

use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;

use super::config::JobConfig;
use super::errors::JobError;

/// Description attached to every auto-generated parameter.
const AUTO_GENERATED: &str = "auto-generated";

/// An immutable builtin-variable table for one CI provider
///
/// Passed explicitly into derivation so the set of well-known variable
/// names is data, not a hidden global.
#[derive(Debug, Clone, Copy)]
pub struct CiProvider {
    /// Provider name, used in diagnostics.
    pub name: &'static str,

    /// Environment variable names the provider defines for every build.
    pub builtin_vars: &'static [&'static str],
}

impl CiProvider {
    /// The Jenkins builtin variable table
    #[must_use]
    pub const fn jenkins() -> Self {
        Self {
            name: "jenkins",
            builtin_vars: &[
                "BUILD_NUMBER",
                "BUILD_ID",
                "BUILD_URL",
                "NODE_NAME",
                "JOB_NAME",
                "BUILD_TAG",
                "JENKINS_URL",
                "EXECUTOR_NUMBER",
                "JAVA_HOME",
                "WORKSPACE",
                "SVN_REVISION",
                "CVS_BRANCH",
                "GIT_COMMIT",
                "GIT_URL",
                "GIT_BRANCH",
            ],
        }
    }
}

/// One resolved job parameter
///
/// Entries copied verbatim from the local environment carry no
/// description; everything else does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Variable name, unique within a [`ParamSet`].
    pub name: String,

    /// Value exported to the build steps.
    pub value: String,

    /// Human-readable origin of the entry, emitted as a comment in the
    /// variables file when present.
    pub description: Option<String>,
}

impl Parameter {
    /// Creates a described parameter
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: Some(description.into()),
        }
    }

    /// Creates a bare parameter without a description
    pub fn bare(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
        }
    }
}

/// Insertion-ordered set of parameters keyed by name
///
/// Overwriting an existing name replaces its value and description but
/// keeps the position of the first insertion.
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    entries: IndexMap<String, Parameter>,
}

impl ParamSet {
    /// Creates an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a parameter, keyed by its name
    pub fn insert(&mut self, param: Parameter) {
        self.entries.insert(param.name.clone(), param);
    }

    /// Looks up a parameter by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries.get(name)
    }

    /// Returns true if a parameter with this name exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates parameters in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.values()
    }

    /// Number of parameters in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Caller-supplied parameter overrides parsed from `--args`
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    entries: IndexMap<String, String>,
}

impl Overrides {
    /// Parses the `--args` JSON
    ///
    /// The value must be a JSON object whose values are all scalars
    /// (string, number, or bool). Key order is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidOverrides`] for invalid JSON, a
    /// non-object top level, or nested values.
    pub fn parse(json: &str) -> Result<Self, JobError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| JobError::InvalidOverrides(e.to_string()))?;

        let object = value.as_object().ok_or_else(|| {
            JobError::InvalidOverrides("overridden args must be a JSON object".to_string())
        })?;

        let mut entries = IndexMap::new();
        for (key, value) in object {
            let scalar = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(JobError::InvalidOverrides(format!(
                        "value for '{key}' must be a scalar"
                    )));
                }
            };
            entries.insert(key.clone(), scalar);
        }

        Ok(Self { entries })
    }

    /// Iterates override pairs in JSON order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter()
    }

    /// Returns true if no overrides were supplied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Locally derived inputs for parameter derivation
#[derive(Debug, Clone)]
pub struct DeriveInputs<'a> {
    /// Name of the job being run.
    pub job_name: &'a str,

    /// Human-readable build reason (`--reason` or the generated default).
    pub reason: &'a str,

    /// The caller's home directory, exported as `JENKINS_HOME`.
    pub home: &'a str,

    /// Local git branch, when one could be resolved.
    pub branch: Option<&'a str>,

    /// Snapshot of the local process environment.
    pub env: &'a HashMap<String, String>,
}

/// Builds the ordered parameter set for a job run
///
/// See the module docs for the merge precedence. The one wrinkle is the
/// `branch` parameter: when the server declares it and a local branch
/// was resolved, the local branch wins over the server default so the
/// steps build what the caller has checked out.
#[must_use]
pub fn derive_params(
    provider: &CiProvider,
    config: &JobConfig,
    overrides: &Overrides,
    inputs: &DeriveInputs<'_>,
) -> ParamSet {
    let mut params = ParamSet::new();

    params.insert(Parameter::new("BUILD_REASON", inputs.reason, AUTO_GENERATED));
    params.insert(Parameter::new("JOB_NAME", inputs.job_name, AUTO_GENERATED));
    params.insert(Parameter::new("JENKINS_HOME", inputs.home, AUTO_GENERATED));
    params.insert(Parameter::new("BUILD_NUMBER", "1", AUTO_GENERATED));

    if let Some(branch) = inputs.branch {
        params.insert(Parameter::new("GIT_BRANCH", branch, AUTO_GENERATED));
    }

    for definition in &config.parameters {
        let value = if definition.name == "branch"
            && let Some(branch) = inputs.branch
        {
            branch.to_string()
        } else {
            definition.default_value.clone()
        };

        params.insert(Parameter {
            name: definition.name.clone(),
            value,
            description: definition.description.clone(),
        });
    }

    // Builtins already set locally are copied in verbatim, without the
    // name/description structure of declared parameters.
    for builtin in provider.builtin_vars {
        if let Some(value) = inputs.env.get(*builtin) {
            params.insert(Parameter::bare(*builtin, value));
        }
    }

    for (key, value) in overrides.iter() {
        let description = match params.get(key).and_then(|p| p.description.as_deref()) {
            Some(desc) => format!("{desc} (passed to jjrunner)"),
            None => "Passed to jjrunner".to_string(),
        };
        params.insert(Parameter::new(key, value, description));
    }

    params
}

/// A reference to an undeclared builtin variable inside a step body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinRef {
    /// Name of the builtin variable.
    pub name: &'static str,

    /// 1-indexed position of the step referencing it.
    pub step: usize,
}

/// Finds builtin variables referenced by steps but absent from the set
///
/// Whole-word, case-sensitive text search over every command body for
/// every provider builtin missing from `params`. Advisory only; callers
/// log the hits and proceed.
#[must_use]
pub fn undeclared_builtin_refs(
    provider: &CiProvider,
    params: &ParamSet,
    commands: &[String],
) -> Vec<BuiltinRef> {
    let mut refs = Vec::new();
    for &builtin in provider.builtin_vars {
        if params.contains(builtin) {
            continue;
        }
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(builtin)))
            .expect("builtin names form valid patterns");
        for (index, command) in commands.iter().enumerate() {
            if pattern.is_match(command) {
                refs.push(BuiltinRef {
                    name: builtin,
                    step: index + 1,
                });
            }
        }
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::config::ParameterDefinition;

    fn test_config(definitions: Vec<ParameterDefinition>) -> JobConfig {
        JobConfig {
            parameters: definitions,
            commands: Vec::new(),
        }
    }

    fn test_inputs(env: &HashMap<String, String>) -> DeriveInputs<'_> {
        DeriveInputs {
            job_name: "my-job",
            reason: "Started by user tester",
            home: "/home/tester",
            branch: None,
            env,
        }
    }

    #[test]
    fn test_param_set_keeps_first_insertion_order() {
        let mut params = ParamSet::new();
        params.insert(Parameter::new("A", "1", "first"));
        params.insert(Parameter::new("B", "2", "second"));
        params.insert(Parameter::new("A", "3", "rewritten"));

        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(params.get("A").unwrap().value, "3");
        assert_eq!(
            params.get("A").unwrap().description.as_deref(),
            Some("rewritten")
        );
    }

    #[test]
    fn test_auto_generated_entries_come_first() {
        let env = HashMap::new();
        let params = derive_params(
            &CiProvider::jenkins(),
            &test_config(vec![]),
            &Overrides::default(),
            &test_inputs(&env),
        );

        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["BUILD_REASON", "JOB_NAME", "JENKINS_HOME", "BUILD_NUMBER"]
        );
        assert_eq!(params.get("BUILD_NUMBER").unwrap().value, "1");
        assert_eq!(params.get("JOB_NAME").unwrap().value, "my-job");
    }

    #[test]
    fn test_branch_substitution_over_server_default() {
        let env = HashMap::new();
        let mut inputs = test_inputs(&env);
        inputs.branch = Some("feature/local");

        let config = test_config(vec![ParameterDefinition {
            name: "branch".to_string(),
            description: Some("branch to build".to_string()),
            default_value: "master".to_string(),
        }]);

        let params = derive_params(
            &CiProvider::jenkins(),
            &config,
            &Overrides::default(),
            &inputs,
        );

        let branch = params.get("branch").unwrap();
        assert_eq!(branch.value, "feature/local");
        assert_eq!(branch.description.as_deref(), Some("branch to build"));
        assert_eq!(params.get("GIT_BRANCH").unwrap().value, "feature/local");
    }

    #[test]
    fn test_server_default_used_without_local_branch() {
        let env = HashMap::new();
        let config = test_config(vec![ParameterDefinition {
            name: "branch".to_string(),
            description: None,
            default_value: "master".to_string(),
        }]);

        let params = derive_params(
            &CiProvider::jenkins(),
            &config,
            &Overrides::default(),
            &test_inputs(&env),
        );

        assert_eq!(params.get("branch").unwrap().value, "master");
        assert!(!params.contains("GIT_BRANCH"));
    }

    #[test]
    fn test_env_builtins_copied_without_description() {
        let env = HashMap::from([
            ("WORKSPACE".to_string(), "/srv/ws".to_string()),
            ("UNRELATED".to_string(), "ignored".to_string()),
        ]);

        let params = derive_params(
            &CiProvider::jenkins(),
            &test_config(vec![]),
            &Overrides::default(),
            &test_inputs(&env),
        );

        let workspace = params.get("WORKSPACE").unwrap();
        assert_eq!(workspace.value, "/srv/ws");
        assert_eq!(workspace.description, None);
        assert!(!params.contains("UNRELATED"));
    }

    #[test]
    fn test_env_builtin_overwrites_value_not_position() {
        // BUILD_NUMBER is auto-generated at position 3 and then
        // overwritten from the environment; it must keep its slot.
        let env = HashMap::from([("BUILD_NUMBER".to_string(), "42".to_string())]);

        let params = derive_params(
            &CiProvider::jenkins(),
            &test_config(vec![]),
            &Overrides::default(),
            &test_inputs(&env),
        );

        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["BUILD_REASON", "JOB_NAME", "JENKINS_HOME", "BUILD_NUMBER"]
        );
        let build_number = params.get("BUILD_NUMBER").unwrap();
        assert_eq!(build_number.value, "42");
        assert_eq!(build_number.description, None);
    }

    #[test]
    fn test_override_annotates_existing_description() {
        let env = HashMap::new();
        let config = test_config(vec![ParameterDefinition {
            name: "target".to_string(),
            description: Some("deploy target".to_string()),
            default_value: "staging".to_string(),
        }]);
        let overrides = Overrides::parse(r#"{"target": "production", "extra": 7}"#).unwrap();

        let params = derive_params(&CiProvider::jenkins(), &config, &overrides, &test_inputs(&env));

        let target = params.get("target").unwrap();
        assert_eq!(target.value, "production");
        assert_eq!(
            target.description.as_deref(),
            Some("deploy target (passed to jjrunner)")
        );

        let extra = params.get("extra").unwrap();
        assert_eq!(extra.value, "7");
        assert_eq!(extra.description.as_deref(), Some("Passed to jjrunner"));
    }

    #[test]
    fn test_overrides_reject_non_object() {
        assert!(matches!(
            Overrides::parse(r#"["a", "b"]"#),
            Err(JobError::InvalidOverrides(_))
        ));
        assert!(matches!(
            Overrides::parse("42"),
            Err(JobError::InvalidOverrides(_))
        ));
        assert!(matches!(
            Overrides::parse("not json"),
            Err(JobError::InvalidOverrides(_))
        ));
    }

    #[test]
    fn test_overrides_reject_nested_values() {
        assert!(matches!(
            Overrides::parse(r#"{"key": {"nested": true}}"#),
            Err(JobError::InvalidOverrides(_))
        ));
        assert!(matches!(
            Overrides::parse(r#"{"key": [1, 2]}"#),
            Err(JobError::InvalidOverrides(_))
        ));
    }

    #[test]
    fn test_overrides_accept_scalars() {
        let overrides = Overrides::parse(r#"{"s": "v", "n": 1.5, "b": false}"#).unwrap();
        let pairs: Vec<_> = overrides
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(pairs, vec![("s", "v"), ("n", "1.5"), ("b", "false")]);
    }

    #[test]
    fn test_undeclared_builtin_scan() {
        let mut params = ParamSet::new();
        params.insert(Parameter::new("BUILD_NUMBER", "1", AUTO_GENERATED));

        let commands = vec![
            "echo $BUILD_NUMBER".to_string(),
            "echo $WORKSPACE && ls".to_string(),
            "echo plain".to_string(),
        ];

        let refs = undeclared_builtin_refs(&CiProvider::jenkins(), &params, &commands);
        assert_eq!(
            refs,
            vec![BuiltinRef {
                name: "WORKSPACE",
                step: 2
            }]
        );
    }

    #[test]
    fn test_builtin_scan_is_whole_word() {
        let params = ParamSet::new();
        let commands = vec!["echo $WORKSPACE_TMP".to_string()];

        let refs = undeclared_builtin_refs(&CiProvider::jenkins(), &params, &commands);
        assert!(refs.iter().all(|r| r.name != "WORKSPACE"));
    }

    #[test]
    fn test_builtin_scan_reports_every_step() {
        let params = ParamSet::new();
        let commands = vec![
            "echo $GIT_COMMIT".to_string(),
            "test -n \"$GIT_COMMIT\"".to_string(),
        ];

        let refs = undeclared_builtin_refs(&CiProvider::jenkins(), &params, &commands);
        let commit_refs: Vec<_> = refs.iter().filter(|r| r.name == "GIT_COMMIT").collect();
        assert_eq!(commit_refs.len(), 2);
    }
}
