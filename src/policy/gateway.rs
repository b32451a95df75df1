use super::{Token, TokenUse};
use crate::config::HttpMethod;
use crate::stack::{Authorization, FunctionName, QualifiedScope, Route, Stack};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    pub method: HttpMethod,
    pub path: String,
    pub token: Option<Token>,
}

impl GatewayRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }
}

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request reached its compute target.
    Dispatched {
        route: String,
        function: FunctionName,
    },
    /// The gateway answered before the handler ran.
    Rejected(Rejection),
}

impl Decision {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Decision::Dispatched { .. })
    }

    pub fn status(&self) -> u16 {
        match self {
            Decision::Dispatched { .. } => 200,
            Decision::Rejected(rejection) => rejection.status(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Dispatched { route, function } => {
                write!(f, "dispatched {} to function '{}'", route, function)
            }
            Decision::Rejected(rejection) => write!(
                f,
                "rejected with {} {}: {}",
                rejection.status(),
                rejection.message(),
                rejection
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No route matches the method and path.
    NoRoute,
    MissingToken,
    /// Token not issued by the route authorizer's directory.
    InvalidToken { issuer: String },
    WrongTokenUse {
        expected: TokenUse,
        actual: TokenUse,
    },
    InsufficientScope { required: Vec<QualifiedScope> },
}

impl Rejection {
    pub fn status(&self) -> u16 {
        match self {
            Rejection::NoRoute => 403,
            _ => 401,
        }
    }

    /// Response body message, as the gateway words it.
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::NoRoute => "Missing Authentication Token",
            _ => "Unauthorized",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoRoute => write!(f, "no route matches the request"),
            Rejection::MissingToken => write!(f, "no token was presented"),
            Rejection::InvalidToken { issuer } => {
                write!(f, "token was issued by directory '{}'", issuer)
            }
            Rejection::WrongTokenUse { expected, actual } => {
                write!(f, "route expects an {} token, got an {} token", expected, actual)
            }
            Rejection::InsufficientScope { required } => {
                let scopes: Vec<String> = required.iter().map(ToString::to_string).collect();
                write!(f, "token lacks any of the scopes {}", scopes.join(", "))
            }
        }
    }
}

/// Replays the gateway's route lookup and authorizer checks against a stack.
pub struct GatewaySimulator<'a> {
    stack: &'a Stack,
}

impl<'a> GatewaySimulator<'a> {
    pub fn new(stack: &'a Stack) -> Self {
        Self { stack }
    }

    pub fn evaluate(&self, request: &GatewayRequest) -> Decision {
        let Some(route) = self
            .stack
            .gateway()
            .and_then(|g| g.find_route(request.method, &request.path))
        else {
            tracing::debug!(method = %request.method, path = %request.path, "no route");
            return Decision::Rejected(Rejection::NoRoute);
        };

        match self.authorize(route, request.token.as_ref()) {
            Ok(()) => Decision::Dispatched {
                route: format!("{} {}", route.method, route.path),
                function: route.target.clone(),
            },
            Err(rejection) => {
                tracing::debug!(
                    method = %route.method,
                    path = %route.path,
                    reason = %rejection,
                    "rejected request"
                );
                Decision::Rejected(rejection)
            }
        }
    }

    /// Routes without scopes validate an ID token. Routes with scopes need
    /// an access token carrying at least one of them.
    fn authorize(&self, route: &Route, token: Option<&Token>) -> Result<(), Rejection> {
        let Authorization::Directory { scopes, .. } = &route.authorization else {
            return Ok(());
        };
        let token = token.ok_or(Rejection::MissingToken)?;

        if token.issuer != self.stack.directory().name {
            return Err(Rejection::InvalidToken {
                issuer: token.issuer.to_string(),
            });
        }

        let expected = if scopes.is_empty() {
            TokenUse::Id
        } else {
            TokenUse::Access
        };
        if token.token_use != expected {
            return Err(Rejection::WrongTokenUse {
                expected,
                actual: token.token_use,
            });
        }

        if !scopes.is_empty() && !scopes.iter().any(|s| token.has_scope(s)) {
            return Err(Rejection::InsufficientScope {
                required: scopes.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parser;
    use crate::policy::IdentityProvider;
    use crate::stack::{DirectoryName, StackBuilder};

    const MANIFEST: &str = r#"
stack: { name: Demo }
directory: { name: UserPool }
resource_servers:
  - identifier: api
    scopes: [{ name: admin }, { name: user }]
clients:
  spa:
    flows: [authorization_code]
    scopes: [openid, email]
  worker:
    generate_secret: true
    flows: [client_credentials]
    scopes: [api/admin, api/user]
functions:
  handler: { runtime: nodejs18.x, handler: index.handler, code: lambda }
gateway:
  name: Api
  authorizers:
    Auth: { directory: UserPool }
  routes:
    - { path: /, method: ANY, function: handler, authorizer: Auth }
    - { path: /user, method: GET, function: handler, authorizer: Auth, scopes: [api/user] }
    - { path: /open, method: GET, function: handler }
    - { path: "/items/{id}", method: GET, function: handler }
    - { path: /items/latest, method: GET, function: handler, authorizer: Auth }
    - { path: "/files/{proxy+}", method: ANY, function: handler, authorizer: Auth }
    - { path: /reports, method: GET, function: handler, authorizer: Auth, scopes: [api/admin, api/user] }
"#;

    fn stack() -> Stack {
        let manifest = Parser::new().parse_manifest(MANIFEST).unwrap();
        StackBuilder::new()
            .manifest(manifest)
            .verify_artifacts(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_public_route_dispatches_without_token() {
        let stack = stack();
        let decision =
            GatewaySimulator::new(&stack).evaluate(&GatewayRequest::new(HttpMethod::Get, "/open"));
        assert!(decision.is_dispatched());
        assert_eq!(decision.status(), 200);
    }

    #[test]
    fn test_unknown_route_is_403() {
        let stack = stack();
        let decision = GatewaySimulator::new(&stack)
            .evaluate(&GatewayRequest::new(HttpMethod::Post, "/open"));
        assert_eq!(decision, Decision::Rejected(Rejection::NoRoute));
        assert_eq!(decision.status(), 403);
    }

    #[test]
    fn test_catch_all_needs_id_token() {
        let stack = stack();
        let gateway = GatewaySimulator::new(&stack);
        let tokens = IdentityProvider::new(&stack)
            .authorization_code("spa", None, "alice", &[])
            .unwrap();

        let anonymous = GatewayRequest::new(HttpMethod::Delete, "/");
        assert_eq!(
            gateway.evaluate(&anonymous),
            Decision::Rejected(Rejection::MissingToken)
        );

        let with_id = anonymous.clone().with_token(tokens.id.clone().unwrap());
        assert!(gateway.evaluate(&with_id).is_dispatched());

        let with_access = anonymous.with_token(tokens.access);
        assert!(matches!(
            gateway.evaluate(&with_access),
            Decision::Rejected(Rejection::WrongTokenUse { expected: TokenUse::Id, .. })
        ));
    }

    #[test]
    fn test_scoped_route_checks_scope() {
        let stack = stack();
        let gateway = GatewaySimulator::new(&stack);
        let provider = IdentityProvider::new(&stack);
        let request = GatewayRequest::new(HttpMethod::Get, "/user");

        let admin_only = provider
            .client_credentials("worker", Some("s"), &["api/admin"])
            .unwrap();
        let decision = gateway.evaluate(&request.clone().with_token(admin_only.access));
        assert!(matches!(
            decision,
            Decision::Rejected(Rejection::InsufficientScope { .. })
        ));
        assert_eq!(decision.status(), 401);

        let user = provider
            .client_credentials("worker", Some("s"), &["api/user"])
            .unwrap();
        assert!(gateway.evaluate(&request.with_token(user.access)).is_dispatched());
    }

    #[test]
    fn test_foreign_issuer_is_rejected() {
        let stack = stack();
        let mut token = IdentityProvider::new(&stack)
            .client_credentials("worker", Some("s"), &[])
            .unwrap()
            .access;
        token.issuer = DirectoryName::new("OtherPool");

        let decision = GatewaySimulator::new(&stack)
            .evaluate(&GatewayRequest::new(HttpMethod::Get, "/user").with_token(token));
        assert_eq!(
            decision,
            Decision::Rejected(Rejection::InvalidToken {
                issuer: "OtherPool".to_string()
            })
        );
    }

    #[test]
    fn test_templated_routes_dispatch() {
        let stack = stack();
        let gateway = GatewaySimulator::new(&stack);

        let decision = gateway.evaluate(&GatewayRequest::new(HttpMethod::Get, "/items/42"));
        assert_eq!(
            decision,
            Decision::Dispatched {
                route: "GET /items/{id}".to_string(),
                function: FunctionName::new("handler"),
            }
        );

        // The literal sibling wins over the parameter, and it needs a token.
        let decision = gateway.evaluate(&GatewayRequest::new(HttpMethod::Get, "/items/latest"));
        assert_eq!(decision, Decision::Rejected(Rejection::MissingToken));

        let decision = gateway.evaluate(&GatewayRequest::new(HttpMethod::Get, "/items/42/parts"));
        assert_eq!(decision, Decision::Rejected(Rejection::NoRoute));
    }

    #[test]
    fn test_greedy_route_covers_nested_paths() {
        let stack = stack();
        let gateway = GatewaySimulator::new(&stack);
        let id_token = IdentityProvider::new(&stack)
            .authorization_code("spa", None, "alice", &[])
            .unwrap()
            .id
            .unwrap();

        let request = GatewayRequest::new(HttpMethod::Put, "/files/a/b/c.txt");
        assert_eq!(
            gateway.evaluate(&request),
            Decision::Rejected(Rejection::MissingToken)
        );
        assert!(gateway.evaluate(&request.with_token(id_token)).is_dispatched());

        let bare = GatewayRequest::new(HttpMethod::Get, "/files");
        assert_eq!(gateway.evaluate(&bare), Decision::Rejected(Rejection::NoRoute));
    }

    #[test]
    fn test_any_listed_scope_is_enough() {
        let stack = stack();
        let gateway = GatewaySimulator::new(&stack);
        let provider = IdentityProvider::new(&stack);
        let request = GatewayRequest::new(HttpMethod::Get, "/reports");

        for scope in ["api/admin", "api/user"] {
            let tokens = provider.client_credentials("worker", Some("s"), &[scope]).unwrap();
            assert!(gateway.evaluate(&request.clone().with_token(tokens.access)).is_dispatched());
        }
    }
}
