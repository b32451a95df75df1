//! REST API gateway configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_STAGE: &str = "prod";
pub const DEFAULT_IDENTITY_SOURCE: &str = "method.request.header.Authorization";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Logical name of the REST API.
    pub name: String,

    /// Display name; defaults to the logical name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_api_name: Option<String>,

    #[serde(default = "default_stage")]
    pub stage: String,

    #[serde(default)]
    pub authorizers: BTreeMap<String, AuthorizerConfig>,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

fn default_stage() -> String {
    DEFAULT_STAGE.to_string()
}

impl GatewayConfig {
    pub fn display_name(&self) -> &str {
        self.rest_api_name.as_deref().unwrap_or(&self.name)
    }
}

/// Token authorizer backed by the identity directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizerConfig {
    /// Name of the directory whose tokens this authorizer accepts.
    pub directory: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_source: Option<String>,
}

impl AuthorizerConfig {
    pub fn identity_source(&self) -> &str {
        self.identity_source
            .as_deref()
            .unwrap_or(DEFAULT_IDENTITY_SOURCE)
    }
}

/// An HTTP entry point bound to a function and, optionally, an authorizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub path: String,

    pub method: HttpMethod,

    pub function: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<String>,

    /// Qualified scopes; the presented access token must carry at least one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl RouteConfig {
    pub fn requires_auth(&self) -> bool {
        self.authorizer.is_some()
    }

    /// `ANY /` - the route that catches every method on the API root.
    pub fn is_catch_all(&self) -> bool {
        self.method == HttpMethod::Any && self.path == "/"
    }

    /// Non-empty path segments, `/a/b` -> `["a", "b"]`.
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    pub fn describe(&self) -> String {
        format!("Route '{} {}'", self.method, self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Any,
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Any => "ANY",
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ANY" => Ok(HttpMethod::Any),
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(format!(
                "Invalid HTTP method '{}'. Valid values: ANY, GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS",
                s
            )),
        }
    }
}
