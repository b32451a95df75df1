use super::Manifest;
use crate::error::{Error, Result};
use crate::parameter::Resolver;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "authstack.yaml";
const MANIFEST_FILE_ALT: &str = "authstack.yml";

pub struct Parser {
    resolver: Resolver,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            resolver: Resolver::default(),
        }
    }

    /// Use `resolver` for parameter values instead of the development defaults.
    pub fn with_resolver(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// Find the manifest starting from the current directory
    pub fn find_config_file(&self) -> Result<PathBuf> {
        let current_dir = std::env::current_dir()?;
        Self::find_config_in_dir(&current_dir)
    }

    pub fn find_config_in_dir(dir: &Path) -> Result<PathBuf> {
        for name in [MANIFEST_FILE, MANIFEST_FILE_ALT] {
            let candidate = dir.join(name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }

        if let Some(parent) = dir.parent() {
            return Self::find_config_in_dir(parent);
        }

        Err(Error::Config(format!(
            "Could not find {} in current directory or any parent",
            MANIFEST_FILE
        )))
    }

    /// Load a manifest from a file path
    pub fn load_manifest<P: AsRef<Path>>(&self, path: P) -> Result<Manifest> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read manifest '{}': {}",
                path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %path.display(), "loaded manifest");
        self.parse_manifest(&content)
    }

    /// Parse a manifest from a YAML string, substituting parameters first.
    pub fn parse_manifest(&self, content: &str) -> Result<Manifest> {
        let document: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| Error::Parse(format!("Failed to parse YAML manifest: {}", e)))?;

        let document = self.resolver.apply(document)?;

        let manifest: Manifest = serde_yaml::from_value(document)
            .map_err(|e| Error::Parse(format!("Invalid manifest: {}", e)))?;

        Ok(manifest)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
