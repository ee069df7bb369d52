//! Job configuration decoding
//!
//! Decodes the `config.xml` document Jenkins serves for a job into the
//! two pieces this tool cares about: the declared parameters and the
//! ordered shell build steps.

use roxmltree::{Document, Node};

use super::errors::JobError;

/// A parameter declared in the remote job definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDefinition {
    /// Parameter name.
    pub name: String,

    /// Description from the job definition, when present.
    pub description: Option<String>,

    /// Server-side default value. An absent or empty default becomes
    /// an empty string.
    pub default_value: String,
}

/// The parts of a job definition needed to run it locally
#[derive(Debug, Clone, Default)]
pub struct JobConfig {
    /// Declared parameters, in document order.
    pub parameters: Vec<ParameterDefinition>,

    /// Shell build step bodies, in document order.
    pub commands: Vec<String>,
}

impl JobConfig {
    /// Decodes a job's `config.xml`
    ///
    /// # Errors
    ///
    /// Returns [`JobError::MalformedConfig`] if the document is not
    /// well-formed XML or lacks the `parameterDefinitions` or
    /// `builders` sections.
    pub fn parse(xml: &str) -> Result<Self, JobError> {
        let document = Document::parse(xml)
            .map_err(|e| JobError::MalformedConfig(format!("invalid XML: {e}")))?;
        let root = document.root_element();

        let definitions = root
            .descendants()
            .find(|n| n.has_tag_name("parameterDefinitions"))
            .ok_or_else(|| {
                JobError::MalformedConfig("no parameterDefinitions section".to_string())
            })?;

        let parameters = definitions
            .children()
            .filter(Node::is_element)
            .map(parse_definition)
            .collect::<Result<Vec<_>, _>>()?;

        let builders = root
            .children()
            .find(|n| n.has_tag_name("builders"))
            .ok_or_else(|| JobError::MalformedConfig("no builders section".to_string()))?;

        // Each builder (e.g. hudson.tasks.Shell) wraps its script body
        // in a single child element such as <command>.
        let commands = builders
            .children()
            .filter(Node::is_element)
            .map(|builder| {
                builder
                    .children()
                    .find(Node::is_element)
                    .and_then(|body| body.text())
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();

        Ok(Self {
            parameters,
            commands,
        })
    }
}

fn parse_definition(node: Node<'_, '_>) -> Result<ParameterDefinition, JobError> {
    let child_text = |tag: &str| {
        node.children()
            .find(|n| n.has_tag_name(tag))
            .and_then(|n| n.text())
            .map(str::to_string)
    };

    let name = child_text("name").ok_or_else(|| {
        JobError::MalformedConfig(format!(
            "parameter definition <{}> has no name",
            node.tag_name().name()
        ))
    })?;

    Ok(ParameterDefinition {
        name,
        description: child_text("description"),
        default_value: child_text("defaultValue").unwrap_or_default(),
    })
}
