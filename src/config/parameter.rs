//! Manifest parameters and deployment environments.
//!
//! Parameters feed `{{NAME}}` placeholders. A parameter may carry one value
//! per environment and a default used when the active environment has none.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment environment used to pick parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "develop" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(format!(
                "Invalid environment '{}'. Valid values: development, staging, production",
                s
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub development: Option<serde_yaml::Value>,

    /// Alias of `development`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub develop: Option<serde_yaml::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging: Option<serde_yaml::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub production: Option<serde_yaml::Value>,

    /// Allowed values. Empty means anything goes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub either: Vec<String>,
}

impl Parameter {
    /// Value for `env`, falling back to the default.
    pub fn value_for(&self, env: Environment) -> Option<&serde_yaml::Value> {
        let specific = match env {
            Environment::Development => self.development.as_ref().or(self.develop.as_ref()),
            Environment::Staging => self.staging.as_ref(),
            Environment::Production => self.production.as_ref(),
        };
        specific.or(self.default.as_ref())
    }
}

/// Render a scalar YAML value as the text substituted into placeholders.
pub fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(yaml: &str) -> Parameter {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!(
            "develop".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Staging".parse::<Environment>().unwrap(), Environment::Staging);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn test_value_prefers_environment_specific() {
        let p = param("default: a\nproduction: b\ndevelop: c");
        let text = |env| scalar_to_string(p.value_for(env).unwrap()).unwrap();
        assert_eq!(text(Environment::Production), "b");
        assert_eq!(text(Environment::Development), "c");
        assert_eq!(text(Environment::Staging), "a");
    }

    #[test]
    fn test_value_missing_everywhere() {
        let p = param("production: only-prod");
        assert!(p.value_for(Environment::Development).is_none());
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(
            scalar_to_string(&serde_yaml::Value::Number(128u64.into())).as_deref(),
            Some("128")
        );
        assert_eq!(
            scalar_to_string(&serde_yaml::Value::Bool(true)).as_deref(),
            Some("true")
        );
        assert!(scalar_to_string(&serde_yaml::Value::Sequence(Vec::new())).is_none());
    }
}
