mod check;
mod graph;
mod init;
mod routes;
mod synth;
mod validate;

pub use check::*;
pub use graph::*;
pub use init::*;
pub use routes::*;
pub use synth::*;
pub use validate::*;

use authstack::parameter::{parse_override, Resolver};
use authstack::{Environment, Parser as ConfigParser, Stack};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Manifest location plus a parser configured from the global flags.
pub struct ManifestContext {
    pub parser: ConfigParser,
    pub manifest_path: PathBuf,
}

impl ManifestContext {
    /// Resolve `--config`, `--env` and `--set` into a ready parser.
    pub fn resolve(config: Option<PathBuf>, env: &str, set: &[String]) -> anyhow::Result<Self> {
        let environment: Environment = env.parse().map_err(|e: String| anyhow::anyhow!(e))?;

        let mut overrides = BTreeMap::new();
        for raw in set {
            let (name, value) = parse_override(raw)?;
            overrides.insert(name, value);
        }

        let parser =
            ConfigParser::with_resolver(Resolver::new(environment).with_overrides(overrides));
        let manifest_path = match config {
            Some(path) => path,
            None => parser.find_config_file()?,
        };
        tracing::debug!(
            manifest = %manifest_path.display(),
            environment = %environment,
            "resolved manifest"
        );

        Ok(Self {
            parser,
            manifest_path,
        })
    }

    /// Directory that code paths in the manifest are relative to.
    pub fn base_dir(&self) -> &Path {
        self.manifest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Build the stack. Commands that only inspect policy skip the artifact check.
    pub fn load_stack(&self, verify_artifacts: bool) -> anyhow::Result<Stack> {
        let manifest = self.parser.load_manifest(&self.manifest_path)?;
        let stack = Stack::builder()
            .manifest(manifest)
            .base_dir(self.base_dir())
            .verify_artifacts(verify_artifacts)
            .build()?;
        Ok(stack)
    }
}
