// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid manifest: {0}")]
    #[diagnostic(
        code(authstack::manifest::validation),
        help("Run `authstack validate` for detailed validation errors")
    )]
    Validation(String),

    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<Error>),

    #[error("Parameter not found: {0}")]
    #[diagnostic(
        code(authstack::parameter::not_found),
        help("Declare the parameter in your authstack.yaml:\n\nparameters:\n  {0}:\n    default: \"value\"")
    )]
    ParameterNotFound(String),

    #[error("Parameter '{0}' is set on the command line but not declared in the manifest")]
    #[diagnostic(
        code(authstack::parameter::undeclared),
        help("Add parameter declaration:\n\nparameters:\n  {0}:\n    default: \"\"")
    )]
    UndeclaredParameter(String),

    #[error("Invalid parameter value for '{name}': {reason}")]
    #[diagnostic(code(authstack::parameter::invalid))]
    InvalidParameter { name: String, reason: String },

    #[error("{referrer} uses unqualified scope '{scope}'")]
    #[diagnostic(
        code(authstack::scope::unqualified),
        help("Resource-server scopes are written as <resourceServerId>/<scopeName>")
    )]
    UnqualifiedScope { scope: String, referrer: String },

    #[error("{referrer} references scope '{scope}' which no resource server defines")]
    #[diagnostic(
        code(authstack::scope::unresolved),
        help("Check the identifier and scope names under resource_servers")
    )]
    UnresolvedScope { scope: String, referrer: String },

    #[error("{referrer} references undefined {kind} '{name}'")]
    #[diagnostic(code(authstack::reference::unknown))]
    UnknownReference {
        kind: &'static str,
        name: String,
        referrer: String,
    },

    #[error("Code artifact for function '{function}' not found at '{path}'")]
    #[diagnostic(
        code(authstack::function::missing_artifact),
        help("Package the handler before evaluating the manifest; paths are relative to the manifest directory")
    )]
    MissingArtifact { function: String, path: String },

    #[error("Invalid hosted domain prefix '{prefix}': {reason}")]
    #[diagnostic(code(authstack::domain::invalid_prefix))]
    InvalidDomainPrefix { prefix: String, reason: String },

    #[error("Hosted domain prefix '{prefix}' is claimed by more than one manifest: {}", .manifests.join(", "))]
    #[diagnostic(
        code(authstack::domain::duplicate_prefix),
        help("Domain prefixes are global in the identity provider's namespace; give each deployment its own prefix")
    )]
    DuplicateDomainPrefix {
        prefix: String,
        manifests: Vec<String>,
    },

    #[error("Logical id '{id}' is produced by both {first} and {second}")]
    #[diagnostic(
        code(authstack::synth::logical_id_collision),
        help("Rename one of the resources; logical ids drop every non-alphanumeric character")
    )]
    LogicalIdCollision {
        id: String,
        first: String,
        second: String,
    },

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    #[diagnostic(code(authstack::dependency::circular))]
    CircularDependency(Vec<String>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::ParameterNotFound(name) => Some(format!(
                "Declare '{}' under 'parameters:' with a default, or pass --set {}=<value>",
                name, name
            )),
            Error::UndeclaredParameter(name) => Some(format!(
                "Add a parameter declaration for '{}' in your authstack.yaml:\n\nparameters:\n  {}:\n    default: \"\"",
                name, name
            )),
            Error::UnqualifiedScope { scope, .. } => Some(format!(
                "Write the scope as <resourceServerId>/{}; standard scopes are openid, email, phone, profile and aws.cognito.signin.user.admin",
                scope
            )),
            Error::UnresolvedScope { scope, .. } => Some(format!(
                "Declare '{}' under resource_servers, or fix the spelling of the reference",
                scope
            )),
            Error::MissingArtifact { path, .. } => Some(format!(
                "Build the handler so that '{}' exists, then re-run the command",
                path
            )),
            Error::DuplicateDomainPrefix { prefix, .. } => Some(format!(
                "Use a parameter for the prefix and override it per deployment, e.g. --set DOMAIN_PREFIX={}-2",
                prefix
            )),
            Error::CircularDependency(path) => Some(format!(
                "Resources cannot reference each other in a cycle: {}",
                path.join(", ")
            )),
            Error::Config(msg) if msg.contains("Could not find") => {
                Some("Create a starter manifest with: authstack init".to_string())
            }
            Error::Config(_) | Error::Validation(_) | Error::UnknownReference { .. } => {
                Some("Validate your manifest with: authstack validate".to_string())
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }

    /// Collapse a list of errors: none is `Ok`, one is returned as-is, more become `Multiple`.
    pub fn collect(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_empty_is_ok() {
        assert!(Error::collect(Vec::new()).is_ok());
    }

    #[test]
    fn test_collect_single_error_is_unwrapped() {
        let err = Error::collect(vec![Error::Validation("bad".to_string())]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_collect_many_errors_become_multiple() {
        let err = Error::collect(vec![
            Error::Validation("one".to_string()),
            Error::ParameterNotFound("TWO".to_string()),
        ])
        .unwrap_err();
        match err {
            Error::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected Multiple, got {other:?}"),
        }
    }

    #[test]
    fn test_unqualified_scope_suggestion_mentions_format() {
        let err = Error::UnqualifiedScope {
            scope: "user".to_string(),
            referrer: "Client 'web'".to_string(),
        };
        let text = err.with_suggestion();
        assert!(text.contains("Client 'web' uses unqualified scope 'user'"));
        assert!(text.contains("<resourceServerId>/user"));
    }

    #[test]
    fn test_duplicate_prefix_lists_manifests() {
        let err = Error::DuplicateDomainPrefix {
            prefix: "shared".to_string(),
            manifests: vec!["a.yaml".to_string(), "b.yaml".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Hosted domain prefix 'shared' is claimed by more than one manifest: a.yaml, b.yaml"
        );
    }
}
