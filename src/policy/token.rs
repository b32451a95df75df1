use crate::config::OAuthFlow;
use crate::stack::{
    ClientName, ClientRegistration, DirectoryName, OAuthScope, QualifiedScope, Stack,
    StandardScope,
};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What a token is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenUse {
    /// Proves who the user is. Carries no scopes.
    Id,
    /// Grants access to resource-server scopes.
    Access,
}

impl fmt::Display for TokenUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenUse::Id => write!(f, "id"),
            TokenUse::Access => write!(f, "access"),
        }
    }
}

impl FromStr for TokenUse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "id" => Ok(TokenUse::Id),
            "access" => Ok(TokenUse::Access),
            _ => Err(format!("Unknown token use '{}'. Expected id or access", s)),
        }
    }
}

/// A simulated token: the claims the gateway authorizer looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub issuer: DirectoryName,
    pub client: ClientName,
    pub subject: Option<String>,
    pub token_use: TokenUse,
    pub scopes: BTreeSet<OAuthScope>,
}

impl Token {
    pub fn has_scope(&self, scope: &QualifiedScope) -> bool {
        self.scopes.contains(&OAuthScope::Custom(scope.clone()))
    }

    /// Space-separated `scope` claim.
    pub fn scope_claim(&self) -> String {
        self.scopes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Tokens returned by one grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access: Token,
    /// Only issued when a user signed in and `openid` was granted.
    pub id: Option<Token>,
}

impl TokenSet {
    pub fn get(&self, token_use: TokenUse) -> Option<&Token> {
        match token_use {
            TokenUse::Access => Some(&self.access),
            TokenUse::Id => self.id.as_ref(),
        }
    }
}

/// Token endpoint errors, named after their OAuth 2.0 error codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("invalid_client: no client named '{0}'")]
    UnknownClient(String),

    #[error("unauthorized_client: client '{client}' is not allowed the {flow} flow")]
    UnauthorizedClient { client: String, flow: OAuthFlow },

    #[error("invalid_client: client '{0}' must authenticate with its secret")]
    InvalidClient(String),

    #[error("invalid_scope: client '{client}' may not request '{scope}'")]
    InvalidScope { client: String, scope: String },
}

/// Issues tokens the way the stack's directory would.
pub struct IdentityProvider<'a> {
    stack: &'a Stack,
}

impl<'a> IdentityProvider<'a> {
    pub fn new(stack: &'a Stack) -> Self {
        Self { stack }
    }

    /// Machine-to-machine grant. Only an access token is issued.
    pub fn client_credentials(
        &self,
        client: &str,
        secret: Option<&str>,
        requested: &[&str],
    ) -> Result<TokenSet, GrantError> {
        let registration = self.client_for(client, OAuthFlow::ClientCredentials)?;
        check_secret(registration, secret)?;

        let scopes = grant_scopes(registration, requested)?;
        tracing::debug!(client, scopes = scopes.len(), "issued client_credentials token");
        Ok(TokenSet {
            access: self.token(registration, None, TokenUse::Access, scopes),
            id: None,
        })
    }

    /// Authorization-code grant on behalf of `subject`.
    ///
    /// Confidential clients redeem the code with their secret.
    pub fn authorization_code(
        &self,
        client: &str,
        secret: Option<&str>,
        subject: &str,
        requested: &[&str],
    ) -> Result<TokenSet, GrantError> {
        let registration = self.client_for(client, OAuthFlow::AuthorizationCode)?;
        check_secret(registration, secret)?;
        let scopes = grant_scopes(registration, requested)?;

        let id = scopes
            .contains(&OAuthScope::Standard(StandardScope::OpenId))
            .then(|| {
                self.token(
                    registration,
                    Some(subject.to_string()),
                    TokenUse::Id,
                    BTreeSet::new(),
                )
            });

        tracing::debug!(client, subject, scopes = scopes.len(), "issued authorization_code tokens");
        Ok(TokenSet {
            access: self.token(registration, Some(subject.to_string()), TokenUse::Access, scopes),
            id,
        })
    }

    fn client_for(&self, client: &str, flow: OAuthFlow) -> Result<&'a ClientRegistration, GrantError> {
        let registration = self
            .stack
            .client(client)
            .ok_or_else(|| GrantError::UnknownClient(client.to_string()))?;
        if !registration.has_flow(flow) {
            return Err(GrantError::UnauthorizedClient {
                client: client.to_string(),
                flow,
            });
        }
        Ok(registration)
    }

    fn token(
        &self,
        client: &ClientRegistration,
        subject: Option<String>,
        token_use: TokenUse,
        scopes: BTreeSet<OAuthScope>,
    ) -> Token {
        Token {
            issuer: self.stack.directory().name.clone(),
            client: client.name.clone(),
            subject,
            token_use,
            scopes,
        }
    }
}

fn check_secret(client: &ClientRegistration, secret: Option<&str>) -> Result<(), GrantError> {
    if client.requires_secret() && secret.map_or(true, str::is_empty) {
        return Err(GrantError::InvalidClient(client.name.to_string()));
    }
    Ok(())
}

/// An empty request grants everything the client is allowed.
fn grant_scopes(
    client: &ClientRegistration,
    requested: &[&str],
) -> Result<BTreeSet<OAuthScope>, GrantError> {
    if requested.is_empty() {
        return Ok(client.scopes.iter().cloned().collect());
    }

    requested
        .iter()
        .map(|raw| {
            parse_scope(raw)
                .filter(|scope| client.allows(scope))
                .ok_or_else(|| GrantError::InvalidScope {
                    client: client.name.to_string(),
                    scope: raw.to_string(),
                })
        })
        .collect()
}

fn parse_scope(raw: &str) -> Option<OAuthScope> {
    StandardScope::parse(raw)
        .map(OAuthScope::Standard)
        .or_else(|| raw.parse().ok().map(OAuthScope::Custom))
}
