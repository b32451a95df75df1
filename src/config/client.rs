//! OAuth client registrations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// URL used for code/implicit clients that declare no callback of their own.
pub const PLACEHOLDER_CALLBACK_URL: &str = "https://example.com";

/// A named credential profile permitted to request tokens from the directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub generate_secret: bool,

    #[serde(default)]
    pub flows: Vec<OAuthFlow>,

    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub callback_urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logout_urls: Vec<String>,
}

impl ClientConfig {
    pub fn has_flow(&self, flow: OAuthFlow) -> bool {
        self.flows.contains(&flow)
    }

    /// Whether any flow sends an end user through a browser redirect.
    pub fn has_user_facing_flow(&self) -> bool {
        self.flows.iter().any(|f| f.is_user_facing())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthFlow {
    AuthorizationCode,
    Implicit,
    ClientCredentials,
}

impl OAuthFlow {
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, OAuthFlow::ClientCredentials)
    }

    /// Flow name as used in `AllowedOAuthFlows`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            OAuthFlow::AuthorizationCode => "code",
            OAuthFlow::Implicit => "implicit",
            OAuthFlow::ClientCredentials => "client_credentials",
        }
    }
}

impl fmt::Display for OAuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthFlow::AuthorizationCode => write!(f, "authorization_code"),
            OAuthFlow::Implicit => write!(f, "implicit"),
            OAuthFlow::ClientCredentials => write!(f, "client_credentials"),
        }
    }
}
