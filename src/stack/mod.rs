//! The typed, immutable stack tree.
//!
//! A [`Stack`] is what a validated [`Manifest`](crate::config::Manifest)
//! turns into once every name reference has been resolved. It is built once
//! by [`StackBuilder`] and then only read: synthesis, the route table and the
//! runtime model all take `&Stack`.

mod builder;
mod ids;
mod scope;

pub use builder::*;
pub use ids::*;
pub use scope::*;

use crate::config::{
    HttpMethod, OAuthFlow, Runtime, SignInAlias, VerificationConfig, PLACEHOLDER_CALLBACK_URL,
};
use crate::synth::fingerprint_bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    name: String,
    description: Option<String>,
    directory: IdentityDirectory,
    resource_servers: BTreeMap<ResourceServerId, ResourceServer>,
    clients: BTreeMap<ClientName, ClientRegistration>,
    functions: BTreeMap<FunctionName, ComputeTarget>,
    gateway: Option<Gateway>,
}

impl Stack {
    pub fn builder() -> StackBuilder {
        StackBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn directory(&self) -> &IdentityDirectory {
        &self.directory
    }

    pub fn resource_servers(&self) -> &BTreeMap<ResourceServerId, ResourceServer> {
        &self.resource_servers
    }

    pub fn clients(&self) -> &BTreeMap<ClientName, ClientRegistration> {
        &self.clients
    }

    pub fn client(&self, name: &str) -> Option<&ClientRegistration> {
        self.clients.get(name)
    }

    pub fn functions(&self) -> &BTreeMap<FunctionName, ComputeTarget> {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&ComputeTarget> {
        self.functions.get(name)
    }

    pub fn gateway(&self) -> Option<&Gateway> {
        self.gateway.as_ref()
    }

    /// Every resource-server scope, qualified.
    pub fn qualified_scopes(&self) -> Vec<QualifiedScope> {
        self.resource_servers
            .values()
            .flat_map(|rs| rs.qualified_scopes())
            .collect()
    }

    /// Every logical id the stack will synthesize, paired with a description
    /// of the entity that owns it.
    pub fn logical_ids(&self) -> Vec<(LogicalId, String)> {
        let mut ids = vec![(
            self.directory.logical_id.clone(),
            format!("directory '{}'", self.directory.name),
        )];
        if let Some(domain) = &self.directory.domain {
            ids.push((
                domain.logical_id.clone(),
                format!("domain '{}'", domain.prefix),
            ));
        }
        for rs in self.resource_servers.values() {
            ids.push((rs.logical_id.clone(), format!("resource server '{}'", rs.id)));
        }
        for client in self.clients.values() {
            ids.push((client.logical_id.clone(), format!("client '{}'", client.name)));
        }
        for function in self.functions.values() {
            ids.push((
                function.logical_id.clone(),
                format!("function '{}'", function.name),
            ));
            ids.push((
                function.role_logical_id(),
                format!("role of function '{}'", function.name),
            ));
        }
        if let Some(gateway) = &self.gateway {
            ids.extend(gateway.logical_ids());
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityDirectory {
    pub name: DirectoryName,
    pub logical_id: LogicalId,
    pub self_sign_up: bool,
    pub sign_in_aliases: BTreeSet<SignInAlias>,
    pub verification: Option<VerificationConfig>,
    pub domain: Option<HostedDomain>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedDomain {
    pub logical_id: LogicalId,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceServer {
    pub id: ResourceServerId,
    pub logical_id: LogicalId,
    pub name: String,
    /// Scope name to description.
    pub scopes: BTreeMap<ScopeName, String>,
}

impl ResourceServer {
    pub fn qualified_scopes(&self) -> Vec<QualifiedScope> {
        self.scopes
            .keys()
            .map(|name| QualifiedScope::new(self.id.clone(), name.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretPolicy {
    /// The provider generates a secret at deployment time.
    Generated,
    None,
}

/// How far a client can be trusted with credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustLevel {
    /// Runs where a secret cannot be kept (browser, mobile).
    Public,
    /// Backend that holds a secret and acts for an end user.
    Confidential,
    /// Service-to-service caller, no end user involved.
    Machine,
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustLevel::Public => write!(f, "public"),
            TrustLevel::Confidential => write!(f, "confidential"),
            TrustLevel::Machine => write!(f, "machine"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientRegistration {
    pub name: ClientName,
    pub logical_id: LogicalId,
    pub secret: SecretPolicy,
    pub flows: BTreeSet<OAuthFlow>,
    /// Allowed scopes in declaration order.
    pub scopes: Vec<OAuthScope>,
    pub callback_urls: Vec<String>,
    pub logout_urls: Vec<String>,
}

impl ClientRegistration {
    pub fn has_flow(&self, flow: OAuthFlow) -> bool {
        self.flows.contains(&flow)
    }

    pub fn secret_policy(&self) -> SecretPolicy {
        self.secret
    }

    pub fn requires_secret(&self) -> bool {
        self.secret == SecretPolicy::Generated
    }

    pub fn trust_level(&self) -> TrustLevel {
        if self.has_flow(OAuthFlow::ClientCredentials) {
            TrustLevel::Machine
        } else if self.requires_secret() {
            TrustLevel::Confidential
        } else {
            TrustLevel::Public
        }
    }

    pub fn allows(&self, scope: &OAuthScope) -> bool {
        self.scopes.contains(scope)
    }

    /// Callback URLs as deployed: browser clients without any get the placeholder.
    pub fn effective_callback_urls(&self) -> Vec<String> {
        let user_facing = self.flows.iter().any(|f| f.is_user_facing());
        if user_facing && self.callback_urls.is_empty() {
            vec![PLACEHOLDER_CALLBACK_URL.to_string()]
        } else {
            self.callback_urls.clone()
        }
    }

    /// Resource servers this client takes scopes from.
    pub fn resource_servers(&self) -> BTreeSet<&ResourceServerId> {
        self.scopes
            .iter()
            .filter_map(OAuthScope::as_qualified)
            .map(QualifiedScope::server)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeTarget {
    pub name: FunctionName,
    pub logical_id: LogicalId,
    pub runtime: Runtime,
    pub handler: String,
    pub code: CodeArtifact,
    pub memory_mb: u32,
    pub timeout: Duration,
    pub environment: BTreeMap<String, String>,
}

impl ComputeTarget {
    pub fn role_logical_id(&self) -> LogicalId {
        self.logical_id.child("ServiceRole")
    }
}

/// Packaged handler code, identified by a content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeArtifact {
    pub path: PathBuf,
    /// Hex SHA-256 of the artifact contents.
    pub fingerprint: String,
}

impl CodeArtifact {
    pub fn object_key(&self) -> String {
        format!("{}.zip", self.fingerprint)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gateway {
    pub logical_id: LogicalId,
    pub display_name: String,
    pub stage: String,
    pub authorizers: BTreeMap<AuthorizerName, Authorizer>,
    pub routes: Vec<Route>,
}

impl Gateway {
    /// Logical id of the API resource at `segments` (empty for the root).
    pub fn resource_logical_id(&self, segments: &[&str]) -> LogicalId {
        let mut parts = vec![self.logical_id.as_str()];
        parts.extend_from_slice(segments);
        LogicalId::from_parts(&parts)
    }

    pub fn method_logical_id(&self, route: &Route) -> LogicalId {
        self.resource_logical_id(&route.segments())
            .child(route.method.as_str())
    }

    pub fn permission_logical_id(&self, route: &Route) -> LogicalId {
        self.method_logical_id(route).child("Permission")
    }

    /// Carries the routes fingerprint, so any route change replaces the deployment.
    pub fn deployment_logical_id(&self) -> LogicalId {
        self.logical_id
            .child(&format!("Deployment{}", self.routes_fingerprint()))
    }

    pub fn stage_logical_id(&self) -> LogicalId {
        self.logical_id.child(&format!("DeploymentStage{}", self.stage))
    }

    /// Every distinct non-root path prefix, shortest first.
    pub fn resource_paths(&self) -> BTreeSet<Vec<&str>> {
        let mut paths = BTreeSet::new();
        for route in &self.routes {
            let segments = route.segments();
            for depth in 1..=segments.len() {
                paths.insert(segments[..depth].to_vec());
            }
        }
        paths
    }

    /// Find the route serving `method` on `path`.
    ///
    /// The most specific matching path wins: a literal segment beats `{param}`,
    /// which beats a greedy `{param+}`. On that path the exact method is tried
    /// first, then `ANY`.
    pub fn find_route(&self, method: HttpMethod, path: &str) -> Option<&Route> {
        let path = normalize_path(path);
        let requested: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut best: Option<(Vec<u8>, &Route)> = None;
        for route in &self.routes {
            let Some(rank) = match_rank(&route.segments(), &requested) else {
                continue;
            };
            if best.as_ref().map_or(true, |(top, _)| rank > *top) {
                best = Some((rank, route));
            }
        }
        let resource = normalize_path(&best?.1.path);

        let on_resource = |m: HttpMethod| {
            self.routes
                .iter()
                .find(|r| r.method == m && normalize_path(&r.path) == resource)
        };
        on_resource(method).or_else(|| on_resource(HttpMethod::Any))
    }

    /// Changes whenever a route, its method or its authorization changes.
    pub fn routes_fingerprint(&self) -> String {
        let mut lines: Vec<String> = self
            .routes
            .iter()
            .map(|r| {
                let scopes: Vec<String> =
                    r.required_scopes().iter().map(ToString::to_string).collect();
                format!(
                    "{} /{} {} {} {}",
                    r.method,
                    r.segments().join("/"),
                    r.target,
                    r.authorizer().map(|a| a.as_str()).unwrap_or("-"),
                    scopes.join(",")
                )
            })
            .collect();
        lines.sort();
        fingerprint_bytes(lines.join("\n").as_bytes())[..16].to_string()
    }

    fn logical_ids(&self) -> Vec<(LogicalId, String)> {
        let mut ids = vec![(
            self.logical_id.clone(),
            format!("gateway '{}'", self.display_name),
        )];
        for (name, authorizer) in &self.authorizers {
            ids.push((authorizer.logical_id.clone(), format!("authorizer '{}'", name)));
        }
        for segments in self.resource_paths() {
            ids.push((
                self.resource_logical_id(&segments),
                format!("API resource '/{}'", segments.join("/")),
            ));
        }
        for route in &self.routes {
            let label = format!("route '{} {}'", route.method, route.path);
            ids.push((self.method_logical_id(route), label.clone()));
            ids.push((self.permission_logical_id(route), format!("permission of {}", label)));
        }
        ids.push((self.deployment_logical_id(), "gateway deployment".to_string()));
        ids.push((self.stage_logical_id(), format!("stage '{}'", self.stage)));
        ids
    }
}

/// Per-segment match quality of a route template against a request path:
/// 2 for a literal, 1 for `{param}`, 0 for a greedy `{param+}` tail.
fn match_rank(template: &[&str], requested: &[&str]) -> Option<Vec<u8>> {
    let mut rank = Vec::with_capacity(template.len());
    for (i, segment) in template.iter().enumerate() {
        let is_param = segment.starts_with('{') && segment.ends_with('}');
        if is_param && segment.ends_with("+}") {
            // A greedy segment needs at least one segment to consume.
            if requested.len() <= i {
                return None;
            }
            rank.push(0);
            return Some(rank);
        }
        let actual = requested.get(i)?;
        if is_param {
            rank.push(1);
        } else if segment == actual {
            rank.push(2);
        } else {
            return None;
        }
    }
    (template.len() == requested.len()).then_some(rank)
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorizer {
    pub logical_id: LogicalId,
    pub directory: DirectoryName,
    pub identity_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Reachable by any caller.
    Public,
    /// Needs a token from the authorizer's directory. With scopes, an access
    /// token carrying at least one of them; without, an ID token.
    Directory {
        authorizer: AuthorizerName,
        scopes: Vec<QualifiedScope>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub method: HttpMethod,
    pub target: FunctionName,
    pub authorization: Authorization,
}

impl Route {
    pub fn requires_auth(&self) -> bool {
        matches!(self.authorization, Authorization::Directory { .. })
    }

    pub fn required_scopes(&self) -> &[QualifiedScope] {
        match &self.authorization {
            Authorization::Directory { scopes, .. } => scopes,
            Authorization::Public => &[],
        }
    }

    pub fn authorizer(&self) -> Option<&AuthorizerName> {
        match &self.authorization {
            Authorization::Directory { authorizer, .. } => Some(authorizer),
            Authorization::Public => None,
        }
    }

    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}
