use crate::config::{scalar_to_string, Environment, Parameter};
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Global template regex compiled once
static TEMPLATE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_template_regex() -> &'static Regex {
    TEMPLATE_REGEX.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("static regex pattern is valid")
    })
}

/// Key of the manifest section that declares parameters. Its own contents
/// are never substituted.
const PARAMETERS_KEY: &str = "parameters";

/// Resolver handles parameter values and template substitution.
///
/// Value priority for each parameter:
/// 1. `--set NAME=VALUE` overrides (must name a declared parameter)
/// 2. The value for the active [`Environment`]
/// 3. The parameter `default`
///
/// Substitution runs over the parsed YAML tree, so every string in the
/// manifest (keys excluded) may contain `{{NAME}}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    environment: Environment,
    overrides: BTreeMap<String, String>,
}

impl Resolver {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Compute the effective value of every parameter that has one.
    pub fn resolve_values(
        &self,
        parameters: &BTreeMap<String, Parameter>,
    ) -> Result<BTreeMap<String, String>> {
        if let Some(name) = self.overrides.keys().find(|k| !parameters.contains_key(*k)) {
            return Err(Error::UndeclaredParameter(name.clone()));
        }

        let mut values = BTreeMap::new();
        for (name, param) in parameters {
            let value = match self.overrides.get(name) {
                Some(v) => Some(v.clone()),
                None => match param.value_for(self.environment) {
                    Some(raw) => Some(scalar_to_string(raw).ok_or_else(|| {
                        Error::InvalidParameter {
                            name: name.clone(),
                            reason: "value must be a string, number or boolean".to_string(),
                        }
                    })?),
                    None => None,
                },
            };

            if let Some(value) = value {
                if !param.either.is_empty() && !param.either.contains(&value) {
                    return Err(Error::InvalidParameter {
                        name: name.clone(),
                        reason: format!(
                            "'{}' is not one of: {}",
                            value,
                            param.either.join(", ")
                        ),
                    });
                }
                tracing::debug!(parameter = %name, env = %self.environment, "resolved parameter");
                values.insert(name.clone(), value);
            }
        }

        Ok(values)
    }

    /// Replace every `{{NAME}}` in `template` with its value.
    pub fn resolve_template(
        &self,
        template: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<String> {
        let mut missing = None;
        let resolved = get_template_regex().replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            match values.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(name) => Err(Error::ParameterNotFound(name)),
            None => Ok(resolved.into_owned()),
        }
    }

    /// Resolve parameters declared in `document` and substitute them
    /// throughout the rest of the document.
    pub fn apply(&self, mut document: serde_yaml::Value) -> Result<serde_yaml::Value> {
        let parameters: BTreeMap<String, Parameter> = match document.get(PARAMETERS_KEY) {
            Some(section) if !section.is_null() => serde_yaml::from_value(section.clone())
                .map_err(|e| Error::Parse(format!("Invalid 'parameters' section: {}", e)))?,
            _ => BTreeMap::new(),
        };

        let values = self.resolve_values(&parameters)?;

        if let serde_yaml::Value::Mapping(map) = &mut document {
            for (key, value) in map.iter_mut() {
                if key.as_str() == Some(PARAMETERS_KEY) {
                    continue;
                }
                self.substitute(value, &values)?;
            }
        }

        Ok(document)
    }

    fn substitute(
        &self,
        value: &mut serde_yaml::Value,
        values: &BTreeMap<String, String>,
    ) -> Result<()> {
        match value {
            serde_yaml::Value::String(s) => {
                if s.contains("{{") {
                    *s = self.resolve_template(s, values)?;
                }
            }
            serde_yaml::Value::Sequence(items) => {
                for item in items {
                    self.substitute(item, values)?;
                }
            }
            serde_yaml::Value::Mapping(map) => {
                for (_, item) in map.iter_mut() {
                    self.substitute(item, values)?;
                }
            }
            serde_yaml::Value::Tagged(tagged) => self.substitute(&mut tagged.value, values)?,
            _ => {}
        }
        Ok(())
    }
}

/// Parse a `NAME=VALUE` override as given to `--set`.
pub fn parse_override(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(Error::InvalidParameter {
            name: raw.to_string(),
            reason: "expected NAME=VALUE".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_template_replaces_all_occurrences() {
        let resolver = Resolver::default();
        let out = resolver
            .resolve_template("{{A}}-{{ B }}-{{A}}", &values(&[("A", "x"), ("B", "y")]))
            .unwrap();
        assert_eq!(out, "x-y-x");
    }

    #[test]
    fn test_resolve_template_missing_parameter() {
        let resolver = Resolver::default();
        let err = resolver
            .resolve_template("{{MISSING}}", &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::ParameterNotFound(name) if name == "MISSING"));
    }

    #[test]
    fn test_resolved_values_are_not_rescanned() {
        let resolver = Resolver::default();
        let out = resolver
            .resolve_template("{{A}}", &values(&[("A", "{{B}}")]))
            .unwrap();
        assert_eq!(out, "{{B}}");
    }

    #[test]
    fn test_apply_uses_environment_and_overrides() {
        let doc: serde_yaml::Value = serde_yaml::from_str(
            r#"
parameters:
  PREFIX:
    default: dev-prefix
    production: prod-prefix
  STAGE:
    default: beta
directory:
  domain:
    prefix: "{{PREFIX}}"
gateway:
  stage: "{{STAGE}}"
  routes:
    - path: "/{{STAGE}}"
"#,
        )
        .unwrap();

        let resolver = Resolver::new(Environment::Production)
            .with_overrides(values(&[("STAGE", "live")]));
        let out = resolver.apply(doc).unwrap();

        assert_eq!(out["directory"]["domain"]["prefix"].as_str(), Some("prod-prefix"));
        assert_eq!(out["gateway"]["stage"].as_str(), Some("live"));
        assert_eq!(out["gateway"]["routes"][0]["path"].as_str(), Some("/live"));
        // The declarations themselves are left alone.
        assert_eq!(out["parameters"]["PREFIX"]["default"].as_str(), Some("dev-prefix"));
    }

    #[test]
    fn test_apply_rejects_undeclared_override() {
        let doc: serde_yaml::Value = serde_yaml::from_str("stack: {name: s}").unwrap();
        let resolver = Resolver::default().with_overrides(values(&[("NOPE", "1")]));
        let err = resolver.apply(doc).unwrap_err();
        assert!(matches!(err, Error::UndeclaredParameter(name) if name == "NOPE"));
    }

    #[test]
    fn test_either_constraint() {
        let mut params = BTreeMap::new();
        params.insert(
            "TIER".to_string(),
            Parameter {
                default: Some(serde_yaml::Value::String("gold".to_string())),
                either: vec!["silver".to_string(), "bronze".to_string()],
                ..Default::default()
            },
        );
        let err = Resolver::default().resolve_values(&params).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name, .. } if name == "TIER"));
    }

    #[test]
    fn test_parameter_without_value_only_fails_when_used() {
        let doc: serde_yaml::Value = serde_yaml::from_str(
            r#"
parameters:
  PROD_ONLY:
    production: x
stack:
  name: demo
"#,
        )
        .unwrap();
        assert!(Resolver::default().apply(doc.clone()).is_ok());

        let mut used = doc;
        used["stack"]["name"] = serde_yaml::Value::String("{{PROD_ONLY}}".to_string());
        let err = Resolver::default().apply(used).unwrap_err();
        assert!(matches!(err, Error::ParameterNotFound(name) if name == "PROD_ONLY"));
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_override("novalue").is_err());
        assert!(parse_override("=x").is_err());
    }
}
