use super::{
    is_valid_handler, ClientConfig, DirectoryConfig, FunctionConfig, GatewayConfig, Manifest,
    OAuthFlow, RouteConfig, MAX_MEMORY_MB, MAX_TIMEOUT, DEFAULT_MEMORY_MB,
};
use crate::error::{Error, Result};
use crate::stack::{OAuthScope, ScopeRegistry, StandardScope};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

const MAX_SUBJECT_LEN: usize = 140;
const MAX_BODY_LEN: usize = 20_000;
const RESERVED_PREFIX_WORDS: [&str; 3] = ["aws", "amazon", "cognito"];

static STACK_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
static STAGE_REGEX: OnceLock<Regex> = OnceLock::new();
static SEGMENT_REGEX: OnceLock<Regex> = OnceLock::new();
static ENV_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn stack_name_regex() -> &'static Regex {
    STACK_NAME_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("static regex pattern is valid")
    })
}

fn stage_regex() -> &'static Regex {
    STAGE_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex pattern is valid"))
}

fn segment_regex() -> &'static Regex {
    SEGMENT_REGEX.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9._-]+|\{[A-Za-z0-9_]+\+?\})$")
            .expect("static regex pattern is valid")
    })
}

fn env_name_regex() -> &'static Regex {
    ENV_NAME_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("static regex pattern is valid")
    })
}

/// A finding that does not block deployment but deserves a second look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// A browser-facing client without callback URLs gets a placeholder.
    MissingCallbackUrls { client: String },
    /// `ANY /` only checks that a session token is valid.
    SessionOnlyCatchAll { route: String },
    /// Route reachable without any token.
    PublicRoute { route: String },
    /// Callback outside every trusted domain.
    UntrustedCallback { client: String, url: String },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::MissingCallbackUrls { client } => write!(
                f,
                "Client '{}' enables a browser flow but declares no callback_urls; the placeholder {} is used",
                client,
                super::PLACEHOLDER_CALLBACK_URL
            ),
            Advisory::SessionOnlyCatchAll { route } => write!(
                f,
                "{} accepts any valid session token without a scope requirement",
                route
            ),
            Advisory::PublicRoute { route } => {
                write!(f, "{} has no authorizer and is publicly reachable", route)
            }
            Advisory::UntrustedCallback { client, url } => write!(
                f,
                "Client '{}' redirects to '{}', outside trusted_callback_domains",
                client, url
            ),
        }
    }
}

impl Manifest {
    /// Validate the manifest, reporting every problem found.
    ///
    /// The code artifact check needs the manifest location and lives in
    /// [`Manifest::validate_artifacts`].
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let registry = ScopeRegistry::from_manifest(self);

        if !stack_name_regex().is_match(&self.stack.name) {
            errors.push(Error::Validation(format!(
                "Stack name '{}' must start with a letter and contain only letters, digits and hyphens (max 128)",
                self.stack.name
            )));
        }

        validate_directory(&self.directory, &mut errors);
        self.validate_resource_servers(&mut errors);

        for (name, client) in &self.clients {
            validate_client(name, client, &registry, &mut errors);
        }

        for (name, function) in &self.functions {
            validate_function(name, function, &mut errors);
        }

        if let Some(gateway) = &self.gateway {
            self.validate_gateway(gateway, &registry, &mut errors);
        }

        Error::collect(errors)
    }

    /// Check that every function's code artifact exists relative to `base_dir`.
    pub fn validate_artifacts(&self, base_dir: &Path) -> Result<()> {
        let mut errors = Vec::new();
        for (name, function) in &self.functions {
            let path = base_dir.join(&function.code);
            let is_zip = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
            if !(path.is_dir() || is_zip) {
                errors.push(Error::MissingArtifact {
                    function: name.clone(),
                    path: path.display().to_string(),
                });
            }
        }
        Error::collect(errors)
    }

    /// Non-fatal findings, in manifest order.
    pub fn advisories(&self) -> Vec<Advisory> {
        let mut advisories = Vec::new();

        for (name, client) in &self.clients {
            if client.has_user_facing_flow() && client.callback_urls.is_empty() {
                advisories.push(Advisory::MissingCallbackUrls {
                    client: name.clone(),
                });
            }
            if self.trusted_callback_domains.is_empty() {
                continue;
            }
            for raw in &client.callback_urls {
                let trusted = url::Url::parse(raw)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .is_some_and(|host| {
                        self.trusted_callback_domains
                            .iter()
                            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
                    });
                if !trusted {
                    advisories.push(Advisory::UntrustedCallback {
                        client: name.clone(),
                        url: raw.clone(),
                    });
                }
            }
        }

        for route in self.routes() {
            if !route.requires_auth() {
                advisories.push(Advisory::PublicRoute {
                    route: route.describe(),
                });
            } else if route.is_catch_all() && route.scopes.is_empty() {
                advisories.push(Advisory::SessionOnlyCatchAll {
                    route: route.describe(),
                });
            }
        }

        advisories
    }

    fn validate_resource_servers(&self, errors: &mut Vec<Error>) {
        let mut identifiers = BTreeSet::new();
        for rs in &self.resource_servers {
            if rs.identifier.is_empty() || rs.identifier.chars().any(char::is_whitespace) {
                errors.push(Error::Validation(format!(
                    "Resource server identifier '{}' must be non-empty and contain no whitespace",
                    rs.identifier
                )));
            }
            if !identifiers.insert(rs.identifier.as_str()) {
                errors.push(Error::Validation(format!(
                    "Resource server identifier '{}' is declared more than once",
                    rs.identifier
                )));
            }

            let mut names = BTreeSet::new();
            for scope in &rs.scopes {
                if scope.name.is_empty()
                    || scope.name.contains('/')
                    || scope.name.chars().any(char::is_whitespace)
                {
                    errors.push(Error::Validation(format!(
                        "Scope name '{}' in resource server '{}' must be non-empty without '/' or whitespace",
                        scope.name, rs.identifier
                    )));
                }
                if !names.insert(scope.name.as_str()) {
                    errors.push(Error::Validation(format!(
                        "Scope '{}' is declared more than once in resource server '{}'",
                        scope.name, rs.identifier
                    )));
                }
            }
        }
    }

    fn validate_gateway(
        &self,
        gateway: &GatewayConfig,
        registry: &ScopeRegistry,
        errors: &mut Vec<Error>,
    ) {
        if gateway.name.trim().is_empty() {
            errors.push(Error::Validation("Gateway name must not be empty".to_string()));
        }
        if !stage_regex().is_match(&gateway.stage) {
            errors.push(Error::Validation(format!(
                "Stage name '{}' may only contain letters, digits and underscores",
                gateway.stage
            )));
        }

        for (name, authorizer) in &gateway.authorizers {
            if authorizer.directory != self.directory.name {
                errors.push(Error::UnknownReference {
                    kind: "directory",
                    name: authorizer.directory.clone(),
                    referrer: format!("Authorizer '{}'", name),
                });
            }
        }

        let mut seen = BTreeSet::new();
        for route in &gateway.routes {
            let referrer = route.describe();
            validate_route_path(route, errors);

            if !seen.insert((route.path.as_str(), route.method)) {
                errors.push(Error::Validation(format!(
                    "{} is declared more than once",
                    referrer
                )));
            }

            if !self.functions.contains_key(&route.function) {
                errors.push(Error::UnknownReference {
                    kind: "function",
                    name: route.function.clone(),
                    referrer: referrer.clone(),
                });
            }

            match &route.authorizer {
                Some(authorizer) if !gateway.authorizers.contains_key(authorizer) => {
                    errors.push(Error::UnknownReference {
                        kind: "authorizer",
                        name: authorizer.clone(),
                        referrer: referrer.clone(),
                    });
                }
                None if !route.scopes.is_empty() => {
                    errors.push(Error::Validation(format!(
                        "{} requires scopes but has no authorizer to check them",
                        referrer
                    )));
                }
                _ => {}
            }

            for scope in &route.scopes {
                if let Err(e) = registry.resolve_qualified(scope, &referrer) {
                    errors.push(e);
                }
            }
        }
    }
}

fn validate_directory(directory: &DirectoryConfig, errors: &mut Vec<Error>) {
    if directory.name.trim().is_empty() {
        errors.push(Error::Validation(
            "Directory name must not be empty".to_string(),
        ));
    }

    if let Some(verification) = &directory.verification {
        if let Some(subject) = &verification.email_subject {
            if subject.chars().count() > MAX_SUBJECT_LEN {
                errors.push(Error::Validation(format!(
                    "Verification email subject exceeds {} characters",
                    MAX_SUBJECT_LEN
                )));
            }
        }
        if let Some(body) = &verification.email_body {
            let placeholder = verification.style.placeholder();
            if !body.contains(placeholder) {
                errors.push(Error::Validation(format!(
                    "Verification email body must contain {} for {:?} style verification",
                    placeholder, verification.style
                )));
            }
            if body.chars().count() > MAX_BODY_LEN {
                errors.push(Error::Validation(format!(
                    "Verification email body exceeds {} characters",
                    MAX_BODY_LEN
                )));
            }
        }
        if let Some(sms) = &verification.sms_message {
            if !sms.contains(super::CODE_PLACEHOLDER) {
                errors.push(Error::Validation(format!(
                    "Verification SMS message must contain {}",
                    super::CODE_PLACEHOLDER
                )));
            }
        }
    }

    if let Some(domain) = &directory.domain {
        if let Err(e) = validate_domain_prefix(&domain.prefix) {
            errors.push(e);
        }
    }
}

/// Check a hosted domain prefix against the provider's naming rules.
pub fn validate_domain_prefix(prefix: &str) -> Result<()> {
    let fail = |reason: &str| {
        Err(Error::InvalidDomainPrefix {
            prefix: prefix.to_string(),
            reason: reason.to_string(),
        })
    };

    if prefix.is_empty() || prefix.len() > 63 {
        return fail("must be between 1 and 63 characters");
    }
    if !prefix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return fail("may only contain lowercase letters, digits and hyphens");
    }
    if prefix.starts_with('-') || prefix.ends_with('-') {
        return fail("must not start or end with a hyphen");
    }
    if let Some(word) = RESERVED_PREFIX_WORDS.iter().find(|w| prefix.contains(*w)) {
        return fail(&format!("must not contain the reserved word '{}'", word));
    }
    Ok(())
}

fn validate_client(
    name: &str,
    client: &ClientConfig,
    registry: &ScopeRegistry,
    errors: &mut Vec<Error>,
) {
    let referrer = format!("Client '{}'", name);

    if client.flows.is_empty() {
        errors.push(Error::Validation(format!(
            "{} enables no OAuth flow; add one of authorization_code, implicit, client_credentials",
            referrer
        )));
    }

    let machine = client.has_flow(OAuthFlow::ClientCredentials);
    if machine && client.has_user_facing_flow() {
        errors.push(Error::Validation(format!(
            "{} mixes client_credentials with a browser flow; machine clients must not serve end users",
            referrer
        )));
    }
    if machine && !client.generate_secret {
        errors.push(Error::Validation(format!(
            "{} uses client_credentials and must set generate_secret: true",
            referrer
        )));
    }

    let mut seen = BTreeSet::new();
    let mut standard = BTreeSet::new();
    for raw in &client.scopes {
        if !seen.insert(raw.as_str()) {
            errors.push(Error::Validation(format!(
                "{} lists scope '{}' more than once",
                referrer, raw
            )));
            continue;
        }
        match registry.resolve(raw, &referrer) {
            Ok(OAuthScope::Standard(scope)) => {
                if machine {
                    errors.push(Error::Validation(format!(
                        "{} uses client_credentials and may only request resource-server scopes, not '{}'",
                        referrer, scope
                    )));
                }
                standard.insert(scope);
            }
            Ok(OAuthScope::Custom(_)) => {}
            Err(e) => errors.push(e),
        }
    }

    if !standard.contains(&StandardScope::OpenId) {
        if let Some(scope) = standard.iter().find(|s| s.requires_openid()) {
            errors.push(Error::Validation(format!(
                "{} requests '{}' which requires the 'openid' scope",
                referrer, scope
            )));
        }
    }

    for (kind, urls) in [("callback", &client.callback_urls), ("logout", &client.logout_urls)] {
        for raw in urls {
            if let Err(reason) = check_redirect_url(raw) {
                errors.push(Error::Validation(format!(
                    "{} has invalid {} URL '{}': {}",
                    referrer, kind, raw, reason
                )));
            }
        }
    }
}

/// Redirect targets must be absolute `https` URLs; `http` is only allowed for local development.
fn check_redirect_url(raw: &str) -> std::result::Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "https" => Ok(()),
        "http" if matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1")) => Ok(()),
        "http" => Err("http is only allowed for localhost".to_string()),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}

fn validate_function(name: &str, function: &FunctionConfig, errors: &mut Vec<Error>) {
    if !is_valid_handler(&function.handler) {
        errors.push(Error::Validation(format!(
            "Function '{}' has invalid handler '{}'. Use <module>.<export>, e.g. index.handler",
            name, function.handler
        )));
    }

    let memory = function.memory_mb();
    if !(DEFAULT_MEMORY_MB..=MAX_MEMORY_MB).contains(&memory) {
        errors.push(Error::Validation(format!(
            "Function '{}' memory_size {} is outside {}..={} MB",
            name, memory, DEFAULT_MEMORY_MB, MAX_MEMORY_MB
        )));
    }

    match function.timeout_duration() {
        Some(t) if t >= Duration::from_secs(1) && t <= MAX_TIMEOUT && t.subsec_millis() == 0 => {}
        Some(_) => errors.push(Error::Validation(format!(
            "Function '{}' timeout must be a whole number of seconds between 1s and 15m",
            name
        ))),
        None => errors.push(Error::Validation(format!(
            "Function '{}' has invalid timeout '{}'. Use formats like '3s', '30s', '1m'",
            name,
            function.timeout.as_deref().unwrap_or_default()
        ))),
    }

    for key in function.environment.keys() {
        if !env_name_regex().is_match(key) {
            errors.push(Error::Validation(format!(
                "Function '{}' has invalid environment variable name '{}'",
                name, key
            )));
        }
    }
}

fn validate_route_path(route: &RouteConfig, errors: &mut Vec<Error>) {
    let path = &route.path;
    if !path.starts_with('/') {
        errors.push(Error::Validation(format!(
            "{}: path must start with '/'",
            route.describe()
        )));
        return;
    }
    if path == "/" {
        return;
    }
    let trimmed = &path[1..];
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|segment| !segment_regex().is_match(segment)) {
        errors.push(Error::Validation(format!(
            "{}: path segments must be non-empty and contain only letters, digits, '.', '_', '-' or a {{param}}",
            route.describe()
        )));
        return;
    }
    let greedy_inside = segments
        .iter()
        .rev()
        .skip(1)
        .any(|segment| segment.ends_with("+}"));
    if greedy_inside {
        errors.push(Error::Validation(format!(
            "{}: a greedy {{param+}} segment must be the last segment",
            route.describe()
        )));
    }
}

/// Reject hosted domain prefixes claimed by more than one manifest.
///
/// `manifests` pairs a label (usually the file path) with the parsed manifest.
pub fn check_prefix_uniqueness(manifests: &[(String, Manifest)]) -> Result<()> {
    let mut claims: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (label, manifest) in manifests {
        if let Some(prefix) = manifest.domain_prefix() {
            claims.entry(prefix).or_default().push(label.clone());
        }
    }

    let errors = claims
        .into_iter()
        .filter(|(_, labels)| labels.len() > 1)
        .map(|(prefix, labels)| Error::DuplicateDomainPrefix {
            prefix: prefix.to_string(),
            manifests: labels,
        })
        .collect();

    Error::collect(errors)
}
