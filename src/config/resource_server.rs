use serde::{Deserialize, Serialize};

/// A namespace of fine-grained permissions owned by the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceServerConfig {
    /// Logical name of the resource. Defaults to the identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Prefix of every qualified scope: `<identifier>/<scope>`.
    pub identifier: String,

    #[serde(default)]
    pub scopes: Vec<ScopeConfig>,
}

impl ResourceServerConfig {
    pub fn logical_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.identifier)
    }

    pub fn has_scope(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.name == name)
    }

    /// Qualified scope strings in declaration order.
    pub fn qualified_scopes(&self) -> Vec<String> {
        self.scopes
            .iter()
            .map(|s| format!("{}/{}", self.identifier, s.name))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,
}
