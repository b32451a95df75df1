use super::{
    Authorization, Authorizer, AuthorizerName, ClientName, ClientRegistration, CodeArtifact,
    ComputeTarget, DirectoryName, FunctionName, Gateway, HostedDomain, IdentityDirectory,
    LogicalId, ResourceServer, ResourceServerId, Route, ScopeName, ScopeRegistry, SecretPolicy,
    Stack,
};
use crate::config::{Manifest, Parser, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::synth;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Builds an immutable [`Stack`] from a [`Manifest`].
///
/// `build()` validates the manifest, checks code artifacts, logs advisories and
/// resolves every name reference into a typed link. Nothing it returns holds a
/// dangling reference.
///
/// # Example
///
/// ```no_run
/// use authstack::{Parser, Stack};
///
/// # fn example() -> authstack::Result<()> {
/// let manifest = Parser::new().load_manifest("authstack.yaml")?;
/// let stack = Stack::builder()
///     .manifest(manifest)
///     .base_dir(".")
///     .build()?;
/// println!("{} clients", stack.clients().len());
/// # Ok(())
/// # }
/// ```
pub struct StackBuilder {
    manifest: Option<Manifest>,
    base_dir: Option<PathBuf>,
    verify_artifacts: bool,
    log_advisories: bool,
}

impl StackBuilder {
    pub fn new() -> Self {
        Self {
            manifest: None,
            base_dir: None,
            verify_artifacts: true,
            log_advisories: true,
        }
    }

    /// Set the manifest. Required.
    pub fn manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Directory that function `code` paths are relative to. Defaults to ".".
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Check that code artifacts exist and fingerprint their contents.
    ///
    /// When disabled, fingerprints are derived from the configured path, so
    /// the stack can be inspected without the build output present.
    pub fn verify_artifacts(mut self, verify: bool) -> Self {
        self.verify_artifacts = verify;
        self
    }

    /// Emit advisories as `warn` events. Disable when the caller reports them itself.
    pub fn log_advisories(mut self, log: bool) -> Self {
        self.log_advisories = log;
        self
    }

    pub fn build(self) -> Result<Stack> {
        let manifest = self
            .manifest
            .ok_or_else(|| Error::Config("a manifest is required to build a stack".to_string()))?;
        let base_dir = self.base_dir.unwrap_or_else(|| PathBuf::from("."));

        manifest.validate()?;
        if self.verify_artifacts {
            manifest.validate_artifacts(&base_dir)?;
        }
        if self.log_advisories {
            for advisory in manifest.advisories() {
                tracing::warn!("{}", advisory);
            }
        }

        let registry = ScopeRegistry::from_manifest(&manifest);
        let directory = build_directory(&manifest);
        let resource_servers = build_resource_servers(&manifest);
        let clients = build_clients(&manifest, &directory, &registry)?;
        let functions = build_functions(&manifest, &base_dir, self.verify_artifacts)?;
        let gateway = build_gateway(&manifest, &registry)?;

        let stack = Stack {
            name: manifest.stack.name.clone(),
            description: manifest.stack.description.clone(),
            directory,
            resource_servers,
            clients,
            functions,
            gateway,
        };
        check_logical_ids(&stack)?;

        tracing::debug!(
            stack = stack.name(),
            scopes = registry.len(),
            clients = stack.clients.len(),
            functions = stack.functions.len(),
            routes = stack.gateway.as_ref().map_or(0, |g| g.routes.len()),
            "built stack"
        );
        Ok(stack)
    }
}

impl Default for StackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    /// Load, validate and build the stack described by the manifest at `path`.
    ///
    /// Code paths resolve against the manifest's directory.
    pub fn load(parser: &Parser, path: &Path) -> Result<Stack> {
        let manifest = parser.load_manifest(path)?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Stack::builder()
            .manifest(manifest)
            .base_dir(base_dir)
            .build()
    }
}

fn build_directory(manifest: &Manifest) -> IdentityDirectory {
    let config = &manifest.directory;
    let logical_id = LogicalId::from_parts(&[&config.name]);
    let domain = config.domain.as_ref().map(|d| HostedDomain {
        logical_id: logical_id.child(d.logical_name()),
        prefix: d.prefix.clone(),
    });

    IdentityDirectory {
        name: DirectoryName::new(config.name.as_str()),
        logical_id,
        self_sign_up: config.self_sign_up,
        sign_in_aliases: config.sign_in_aliases.iter().copied().collect(),
        verification: config.verification.clone(),
        domain,
    }
}

fn build_resource_servers(manifest: &Manifest) -> BTreeMap<ResourceServerId, ResourceServer> {
    manifest
        .resource_servers
        .iter()
        .map(|rs| {
            let id = ResourceServerId::new(rs.identifier.as_str());
            let server = ResourceServer {
                id: id.clone(),
                logical_id: LogicalId::from_parts(&[rs.logical_name()]),
                name: rs.logical_name().to_string(),
                scopes: rs
                    .scopes
                    .iter()
                    .map(|s| (ScopeName::new(s.name.as_str()), s.description.clone()))
                    .collect(),
            };
            (id, server)
        })
        .collect()
}

fn build_clients(
    manifest: &Manifest,
    directory: &IdentityDirectory,
    registry: &ScopeRegistry,
) -> Result<BTreeMap<ClientName, ClientRegistration>> {
    let mut clients = BTreeMap::new();
    for (name, config) in &manifest.clients {
        let referrer = format!("Client '{}'", name);
        let scopes = config
            .scopes
            .iter()
            .map(|raw| registry.resolve(raw, &referrer))
            .collect::<Result<Vec<_>>>()?;

        let registration = ClientRegistration {
            name: ClientName::new(name.as_str()),
            logical_id: directory.logical_id.child(name),
            secret: if config.generate_secret {
                SecretPolicy::Generated
            } else {
                SecretPolicy::None
            },
            flows: config.flows.iter().copied().collect(),
            scopes,
            callback_urls: config.callback_urls.clone(),
            logout_urls: config.logout_urls.clone(),
        };
        clients.insert(registration.name.clone(), registration);
    }
    Ok(clients)
}

fn build_functions(
    manifest: &Manifest,
    base_dir: &Path,
    verify_artifacts: bool,
) -> Result<BTreeMap<FunctionName, ComputeTarget>> {
    let mut functions = BTreeMap::new();
    for (name, config) in &manifest.functions {
        let path = base_dir.join(&config.code);
        let fingerprint = if verify_artifacts {
            synth::fingerprint(&path)?
        } else {
            synth::fingerprint_bytes(config.code.to_string_lossy().as_bytes())
        };

        let target = ComputeTarget {
            name: FunctionName::new(name.as_str()),
            logical_id: LogicalId::from_parts(&[name]),
            runtime: config.runtime,
            handler: config.handler.clone(),
            code: CodeArtifact { path, fingerprint },
            memory_mb: config.memory_mb(),
            timeout: config.timeout_duration().unwrap_or(DEFAULT_TIMEOUT),
            environment: config.environment.clone(),
        };
        functions.insert(target.name.clone(), target);
    }
    Ok(functions)
}

fn build_gateway(manifest: &Manifest, registry: &ScopeRegistry) -> Result<Option<Gateway>> {
    let Some(config) = &manifest.gateway else {
        return Ok(None);
    };

    let authorizers = config
        .authorizers
        .iter()
        .map(|(name, a)| {
            let authorizer = Authorizer {
                logical_id: LogicalId::from_parts(&[name]),
                directory: DirectoryName::new(a.directory.as_str()),
                identity_source: a.identity_source().to_string(),
            };
            (AuthorizerName::new(name.as_str()), authorizer)
        })
        .collect();

    let mut routes = Vec::with_capacity(config.routes.len());
    for route in &config.routes {
        let referrer = route.describe();
        let authorization = match &route.authorizer {
            Some(authorizer) => Authorization::Directory {
                authorizer: AuthorizerName::new(authorizer.as_str()),
                scopes: route
                    .scopes
                    .iter()
                    .map(|raw| registry.resolve_qualified(raw, &referrer))
                    .collect::<Result<Vec<_>>>()?,
            },
            None => Authorization::Public,
        };
        routes.push(Route {
            path: route.path.clone(),
            method: route.method,
            target: FunctionName::new(route.function.as_str()),
            authorization,
        });
    }

    Ok(Some(Gateway {
        logical_id: LogicalId::from_parts(&[&config.name]),
        display_name: config.display_name().to_string(),
        stage: config.stage.clone(),
        authorizers,
        routes,
    }))
}

fn check_logical_ids(stack: &Stack) -> Result<()> {
    let mut owners: BTreeMap<LogicalId, String> = BTreeMap::new();
    let mut errors = Vec::new();
    for (id, owner) in stack.logical_ids() {
        if let Some(first) = owners.get(&id) {
            errors.push(Error::LogicalIdCollision {
                id: id.to_string(),
                first: first.clone(),
                second: owner,
            });
        } else {
            owners.insert(id, owner);
        }
    }
    Error::collect(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpMethod, OAuthFlow};
    use crate::stack::{OAuthScope, StandardScope, TrustLevel};

    const MANIFEST: &str = r#"
stack:
  name: Demo
directory:
  name: UserPool
  domain:
    name: CognitoDomain
    prefix: demo-auth-domain
resource_servers:
  - name: ResourceServer
    identifier: api
    scopes:
      - { name: read, description: Read }
      - { name: write, description: Write }
clients:
  web:
    flows: [authorization_code]
    scopes: [openid, api/read]
  worker:
    generate_secret: true
    flows: [client_credentials]
    scopes: [api/write]
functions:
  handler:
    runtime: nodejs18.x
    handler: index.handler
    code: lambda
    timeout: 10s
gateway:
  name: RestApi
  authorizers:
    Auth:
      directory: UserPool
  routes:
    - { path: /, method: ANY, function: handler, authorizer: Auth }
    - { path: /items, method: GET, function: handler, authorizer: Auth, scopes: [api/read] }
"#;

    fn manifest() -> Manifest {
        Parser::new().parse_manifest(MANIFEST).unwrap()
    }

    fn build(manifest: Manifest) -> Result<Stack> {
        StackBuilder::new()
            .manifest(manifest)
            .verify_artifacts(false)
            .build()
    }

    #[test]
    fn test_builder_requires_manifest() {
        assert!(matches!(StackBuilder::new().build(), Err(Error::Config(_))));
    }

    #[test]
    fn test_build_resolves_references() {
        let stack = build(manifest()).unwrap();

        assert_eq!(stack.name(), "Demo");
        assert_eq!(stack.directory().logical_id.as_str(), "UserPool");
        assert_eq!(
            stack.directory().domain.as_ref().unwrap().logical_id.as_str(),
            "UserPoolCognitoDomain"
        );

        let web = stack.client("web").unwrap();
        assert_eq!(web.logical_id.as_str(), "UserPoolweb");
        assert_eq!(web.trust_level(), TrustLevel::Public);
        assert_eq!(web.scopes[0], OAuthScope::Standard(StandardScope::OpenId));
        assert_eq!(web.resource_servers().len(), 1);

        let worker = stack.client("worker").unwrap();
        assert!(worker.has_flow(OAuthFlow::ClientCredentials));
        assert_eq!(worker.trust_level(), TrustLevel::Machine);

        let handler = stack.function("handler").unwrap();
        assert_eq!(handler.timeout.as_secs(), 10);
        assert_eq!(handler.memory_mb, 128);
        assert_eq!(handler.role_logical_id().as_str(), "handlerServiceRole");

        let gateway = stack.gateway().unwrap();
        let items = gateway.find_route(HttpMethod::Get, "/items").unwrap();
        assert_eq!(items.required_scopes()[0].to_string(), "api/read");
        assert!(gateway.routes[0].required_scopes().is_empty());
        assert!(gateway.routes[0].requires_auth());
    }

    #[test]
    fn test_build_rejects_invalid_manifest() {
        let mut m = manifest();
        m.clients.get_mut("web").unwrap().scopes.push("api/delete".to_string());
        assert!(matches!(build(m), Err(Error::UnresolvedScope { .. })));
    }

    #[test]
    fn test_build_checks_artifacts() {
        let temp = tempfile::tempdir().unwrap();
        let err = StackBuilder::new()
            .manifest(manifest())
            .base_dir(temp.path())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingArtifact { .. }));

        std::fs::create_dir(temp.path().join("lambda")).unwrap();
        std::fs::write(temp.path().join("lambda/index.js"), "exports.handler = 1;").unwrap();
        let stack = StackBuilder::new()
            .manifest(manifest())
            .base_dir(temp.path())
            .build()
            .unwrap();
        assert_eq!(stack.function("handler").unwrap().code.fingerprint.len(), 64);
    }

    #[test]
    fn test_logical_id_collision() {
        let mut m = manifest();
        // "handler" already owns the id `handler`; a function named "han-dler" strips to the same.
        let function = m.functions["handler"].clone();
        m.functions.insert("han-dler".to_string(), function);
        let Err(Error::Multiple(errors)) = build(m) else {
            panic!("expected function and role ids to collide");
        };
        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], Error::LogicalIdCollision { id, .. } if id == "handler"));
    }

    #[test]
    fn test_load_resolves_code_relative_to_manifest() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp.path().join("lambda")).unwrap();
        std::fs::write(temp.path().join("lambda/index.js"), "exports.handler = 1;").unwrap();
        let path = temp.path().join("authstack.yaml");
        std::fs::write(&path, MANIFEST).unwrap();

        let stack = Stack::load(&Parser::new(), &path).unwrap();
        assert_eq!(
            stack.function("handler").unwrap().code.path,
            temp.path().join("lambda")
        );
    }
}
