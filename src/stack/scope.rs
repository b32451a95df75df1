//! OAuth scopes and the resource-server scope registry.

use super::{ResourceServerId, ScopeName};
use crate::config::Manifest;
use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Scopes the identity provider defines on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StandardScope {
    OpenId,
    Email,
    Phone,
    Profile,
    /// Lets the token call the provider's own user APIs.
    CognitoAdmin,
}

impl StandardScope {
    pub const ALL: [StandardScope; 5] = [
        StandardScope::OpenId,
        StandardScope::Email,
        StandardScope::Phone,
        StandardScope::Profile,
        StandardScope::CognitoAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StandardScope::OpenId => "openid",
            StandardScope::Email => "email",
            StandardScope::Phone => "phone",
            StandardScope::Profile => "profile",
            StandardScope::CognitoAdmin => "aws.cognito.signin.user.admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    /// `email`, `phone` and `profile` are only granted alongside `openid`.
    pub fn requires_openid(&self) -> bool {
        matches!(
            self,
            StandardScope::Email | StandardScope::Phone | StandardScope::Profile
        )
    }
}

impl fmt::Display for StandardScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource-server scope, written `<resourceServerId>/<scopeName>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedScope {
    server: ResourceServerId,
    scope: ScopeName,
}

impl QualifiedScope {
    pub fn new(server: ResourceServerId, scope: ScopeName) -> Self {
        Self { server, scope }
    }

    pub fn server(&self) -> &ResourceServerId {
        &self.server
    }

    pub fn scope(&self) -> &ScopeName {
        &self.scope
    }
}

impl fmt::Display for QualifiedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.server, self.scope)
    }
}

impl FromStr for QualifiedScope {
    type Err = String;

    /// Split on the last `/`: identifiers may be URLs, scope names never contain `/`.
    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let (server, scope) = raw
            .rsplit_once('/')
            .ok_or_else(|| format!("'{}' is not of the form <resourceServerId>/<scopeName>", raw))?;
        if server.is_empty() || scope.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(format!(
                "'{}' is not of the form <resourceServerId>/<scopeName>",
                raw
            ));
        }
        Ok(Self::new(ResourceServerId::new(server), ScopeName::new(scope)))
    }
}

impl Serialize for QualifiedScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Any scope a client may be allowed to request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OAuthScope {
    Standard(StandardScope),
    Custom(QualifiedScope),
}

impl OAuthScope {
    pub fn as_qualified(&self) -> Option<&QualifiedScope> {
        match self {
            OAuthScope::Custom(q) => Some(q),
            OAuthScope::Standard(_) => None,
        }
    }
}

impl fmt::Display for OAuthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthScope::Standard(s) => s.fmt(f),
            OAuthScope::Custom(q) => q.fmt(f),
        }
    }
}

impl Serialize for OAuthScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Catalog of every scope the resource servers declare.
///
/// The registry is the only place a manifest string becomes a
/// [`QualifiedScope`], so anything holding one is known to exist.
#[derive(Debug, Clone, Default)]
pub struct ScopeRegistry {
    servers: BTreeMap<ResourceServerId, BTreeSet<ScopeName>>,
}

impl ScopeRegistry {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut servers: BTreeMap<ResourceServerId, BTreeSet<ScopeName>> = BTreeMap::new();
        for rs in &manifest.resource_servers {
            servers
                .entry(ResourceServerId::new(rs.identifier.as_str()))
                .or_default()
                .extend(rs.scopes.iter().map(|s| ScopeName::new(s.name.as_str())));
        }
        Self { servers }
    }

    pub fn contains(&self, scope: &QualifiedScope) -> bool {
        self.servers
            .get(scope.server())
            .is_some_and(|names| names.contains(scope.scope()))
    }

    pub fn len(&self) -> usize {
        self.servers.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a client scope: a standard scope or a registered qualified scope.
    pub fn resolve(&self, raw: &str, referrer: &str) -> Result<OAuthScope> {
        if let Some(standard) = StandardScope::parse(raw) {
            return Ok(OAuthScope::Standard(standard));
        }
        self.resolve_qualified(raw, referrer).map(OAuthScope::Custom)
    }

    /// Resolve a scope that must belong to a resource server.
    pub fn resolve_qualified(&self, raw: &str, referrer: &str) -> Result<QualifiedScope> {
        let scope: QualifiedScope = raw.parse().map_err(|_| Error::UnqualifiedScope {
            scope: raw.to_string(),
            referrer: referrer.to_string(),
        })?;

        if !self.contains(&scope) {
            return Err(Error::UnresolvedScope {
                scope: raw.to_string(),
                referrer: referrer.to_string(),
            });
        }

        tracing::debug!(scope = %scope, referrer, "resolved scope");
        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn registry() -> ScopeRegistry {
        let yaml = r#"
stack: { name: T }
directory: { name: D }
resource_servers:
  - identifier: test-resource-server1
    scopes:
      - { name: admin }
      - { name: employee }
      - { name: user }
  - identifier: https://api.example.com
    scopes:
      - { name: read }
"#;
        let manifest: Manifest = serde_yaml::from_str(yaml).unwrap();
        ScopeRegistry::from_manifest(&manifest)
    }

    #[test]
    fn test_parse_qualified_scope() {
        let scope: QualifiedScope = "test-resource-server1/user".parse().unwrap();
        assert_eq!(scope.server().as_str(), "test-resource-server1");
        assert_eq!(scope.scope().as_str(), "user");
        assert_eq!(scope.to_string(), "test-resource-server1/user");
    }

    #[test]
    fn test_parse_url_identifier() {
        let scope: QualifiedScope = "https://api.example.com/read".parse().unwrap();
        assert_eq!(scope.server().as_str(), "https://api.example.com");
        assert_eq!(scope.scope().as_str(), "read");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("user".parse::<QualifiedScope>().is_err());
        assert!("/user".parse::<QualifiedScope>().is_err());
        assert!("server/".parse::<QualifiedScope>().is_err());
        assert!("server/us er".parse::<QualifiedScope>().is_err());
    }

    #[test]
    fn test_registry_resolution() {
        let registry = registry();
        assert_eq!(registry.len(), 4);

        assert_eq!(
            registry.resolve("openid", "c").unwrap(),
            OAuthScope::Standard(StandardScope::OpenId)
        );
        let custom = registry.resolve("test-resource-server1/admin", "c").unwrap();
        assert_eq!(custom.to_string(), "test-resource-server1/admin");
        assert!(custom.as_qualified().is_some());
        assert!(registry.resolve("https://api.example.com/read", "c").is_ok());
    }

    #[test]
    fn test_registry_rejects_unknown() {
        let registry = registry();
        assert!(matches!(
            registry.resolve("admin", "c").unwrap_err(),
            Error::UnqualifiedScope { .. }
        ));
        assert!(matches!(
            registry.resolve("test-resource-server1/root", "c").unwrap_err(),
            Error::UnresolvedScope { .. }
        ));
        assert!(matches!(
            registry.resolve_qualified("openid", "route").unwrap_err(),
            Error::UnqualifiedScope { .. }
        ));
    }

    #[test]
    fn test_empty_registry() {
        let registry = ScopeRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.resolve("email", "c").is_ok());
        assert!(registry.resolve("api/read", "c").is_err());
    }

    #[test]
    fn test_standard_scope_round_trip() {
        for scope in StandardScope::ALL {
            assert_eq!(StandardScope::parse(scope.as_str()), Some(scope));
        }
        assert!(StandardScope::Profile.requires_openid());
        assert!(!StandardScope::OpenId.requires_openid());
    }

    proptest! {
        #[test]
        fn prop_qualified_scope_display_parses_back(
            server in "[a-z][a-z0-9-]{0,15}(\\.[a-z]{2,5})?",
            scope in "[a-z][a-z0-9._-]{0,15}",
        ) {
            let raw = format!("{}/{}", server, scope);
            let parsed: QualifiedScope = raw.parse().unwrap();
            prop_assert_eq!(parsed.server().as_str(), server.as_str());
            prop_assert_eq!(parsed.scope().as_str(), scope.as_str());
            prop_assert_eq!(parsed.to_string(), raw);
        }

        #[test]
        fn prop_url_identifiers_split_on_last_slash(
            host in "[a-z]{1,10}\\.example\\.com",
            scope in "[a-z]{1,10}",
        ) {
            let raw = format!("https://{}/{}", host, scope);
            let parsed: QualifiedScope = raw.parse().unwrap();
            prop_assert_eq!(parsed.server().to_string(), format!("https://{}", host));
            prop_assert_eq!(parsed.scope().as_str(), scope.as_str());
        }
    }
}
