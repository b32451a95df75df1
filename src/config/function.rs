//! Compute target configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MEMORY_MB: u32 = 128;
pub const MAX_MEMORY_MB: u32 = 10240;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(900);

/// A packaged handler plus the runtime metadata needed to invoke it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub runtime: Runtime,

    /// Entry point, `<module>.<export>`.
    pub handler: String,

    /// Code artifact: a directory or a `.zip`, relative to the manifest.
    pub code: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u32>,

    /// Duration string such as `3s`, `500ms` or `1m`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

impl FunctionConfig {
    pub fn memory_mb(&self) -> u32 {
        self.memory_size.unwrap_or(DEFAULT_MEMORY_MB)
    }

    /// Parsed timeout; `None` if the string is malformed.
    pub fn timeout_duration(&self) -> Option<Duration> {
        match self.timeout.as_deref() {
            Some(raw) => parse_duration(raw),
            None => Some(DEFAULT_TIMEOUT),
        }
    }
}

/// Runtime identifiers the deployment target accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Runtime {
    #[serde(rename = "nodejs18.x")]
    Nodejs18,
    #[serde(rename = "nodejs20.x")]
    Nodejs20,
    #[serde(rename = "nodejs22.x")]
    Nodejs22,
    #[serde(rename = "python3.11")]
    Python311,
    #[serde(rename = "python3.12")]
    Python312,
    #[serde(rename = "java21")]
    Java21,
    #[serde(rename = "provided.al2023")]
    ProvidedAl2023,
}

impl Runtime {
    pub fn identifier(&self) -> &'static str {
        match self {
            Runtime::Nodejs18 => "nodejs18.x",
            Runtime::Nodejs20 => "nodejs20.x",
            Runtime::Nodejs22 => "nodejs22.x",
            Runtime::Python311 => "python3.11",
            Runtime::Python312 => "python3.12",
            Runtime::Java21 => "java21",
            Runtime::ProvidedAl2023 => "provided.al2023",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Parse `"500ms"`, `"3s"`, `"2m"` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit_ms) = if let Some(n) = raw.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = raw.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = raw.strip_suffix('m') {
        (n, 60_000)
    } else {
        (raw, 1_000)
    };
    let value: u64 = digits.trim().parse().ok()?;
    value.checked_mul(unit_ms).map(Duration::from_millis)
}

/// `index.handler`, `app.main.handler`: a module path and an export name.
pub fn is_valid_handler(handler: &str) -> bool {
    match handler.rsplit_once('.') {
        Some((module, export)) => {
            !module.is_empty()
                && !export.is_empty()
                && handler
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | ':' | '$'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("3s"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn test_handler_format() {
        assert!(is_valid_handler("index.handler"));
        assert!(is_valid_handler("src/app.main"));
        assert!(!is_valid_handler("index"));
        assert!(!is_valid_handler(".handler"));
        assert!(!is_valid_handler("index."));
        assert!(!is_valid_handler("in dex.handler"));
    }

    #[test]
    fn test_function_defaults() {
        let yaml = r#"
runtime: nodejs18.x
handler: index.handler
code: lambda/simple
"#;
        let function: FunctionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(function.runtime, Runtime::Nodejs18);
        assert_eq!(function.memory_mb(), 128);
        assert_eq!(function.timeout_duration(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_unknown_runtime_is_rejected() {
        let yaml = "runtime: cobol85\nhandler: a.b\ncode: x";
        assert!(serde_yaml::from_str::<FunctionConfig>(yaml).is_err());
    }
}
