//! Root manifest types.
//!
//! [`Manifest`] mirrors `authstack.yaml` one to one. Named collections use
//! `BTreeMap` so that every walk over the manifest, and everything derived
//! from it, happens in a stable order.

use super::{
    ClientConfig, DirectoryConfig, FunctionConfig, GatewayConfig, Parameter,
    ResourceServerConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root structure of `authstack.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,

    pub stack: StackMetadata,

    /// The single identity directory of this deployment.
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub resource_servers: Vec<ResourceServerConfig>,

    /// Client registrations keyed by client name.
    #[serde(default)]
    pub clients: BTreeMap<String, ClientConfig>,

    /// Compute targets keyed by function name.
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    /// Domains that client callback URLs are expected to live under.
    /// Callbacks elsewhere produce an advisory. Empty disables the check.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_callback_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Manifest {
    /// Domain prefix of the hosted sign-in domain, if one is declared.
    pub fn domain_prefix(&self) -> Option<&str> {
        self.directory.domain.as_ref().map(|d| d.prefix.as_str())
    }

    /// Routes of the gateway, or nothing when no gateway is declared.
    pub fn routes(&self) -> &[super::RouteConfig] {
        self.gateway
            .as_ref()
            .map(|g| g.routes.as_slice())
            .unwrap_or_default()
    }
}
