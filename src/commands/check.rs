use super::ManifestContext;
use crate::cli::{Grant, TokenKind};
use crate::output::UserOutput;
use authstack::config::{HttpMethod, OAuthFlow};
use authstack::policy::{Decision, GatewayRequest, GatewaySimulator, IdentityProvider, TokenUse};
use authstack::stack::{SecretPolicy, Stack};

/// Secret presented by simulated confidential clients.
const SIMULATED_SECRET: &str = "simulated-secret";
const SIMULATED_SUBJECT: &str = "simulated-user";

pub struct CheckArgs {
    pub method: String,
    pub path: String,
    pub client: Option<String>,
    pub grant: Option<Grant>,
    pub scopes: Vec<String>,
    pub token: Option<TokenKind>,
}

pub fn run_check(
    ctx: &ManifestContext,
    args: &CheckArgs,
    out: &dyn UserOutput,
) -> anyhow::Result<Decision> {
    let stack = ctx.load_stack(false)?;
    let method: HttpMethod = args
        .method
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let mut request = GatewayRequest::new(method, args.path.as_str());
    if let Some(client) = &args.client {
        let token_use = args
            .token
            .map(|kind| match kind {
                TokenKind::Id => TokenUse::Id,
                TokenKind::Access => TokenUse::Access,
            })
            .unwrap_or_else(|| default_token_use(&stack, method, &args.path));

        let requested: Vec<&str> = args.scopes.iter().map(String::as_str).collect();
        let secret = stack
            .client(client)
            .filter(|c| c.secret_policy() == SecretPolicy::Generated)
            .map(|_| SIMULATED_SECRET);
        let provider = IdentityProvider::new(&stack);
        let tokens = match grant_for(&stack, client, args.grant) {
            Grant::ClientCredentials => provider.client_credentials(client, secret, &requested)?,
            Grant::Code => {
                provider.authorization_code(client, secret, SIMULATED_SUBJECT, &requested)?
            }
        };

        let token = tokens.get(token_use).cloned().ok_or_else(|| {
            anyhow::anyhow!(
                "Client '{}' was not granted 'openid', so no ID token was issued",
                client
            )
        })?;
        out.status(&format!(
            "Token: {} token for client '{}' (scopes: {})",
            token.token_use,
            client,
            if token.scopes.is_empty() {
                "-".to_string()
            } else {
                token.scope_claim()
            }
        ));
        request = request.with_token(token);
    }

    let decision = GatewaySimulator::new(&stack).evaluate(&request);
    let line = format!("{} {} -> {}", method, args.path, decision);
    if decision.is_dispatched() {
        out.success(&line);
    } else {
        out.warning(&line);
    }
    Ok(decision)
}

/// The client's own flow unless one is given explicitly.
fn grant_for(stack: &Stack, client: &str, grant: Option<Grant>) -> Grant {
    grant.unwrap_or_else(|| match stack.client(client) {
        Some(c) if c.has_flow(OAuthFlow::ClientCredentials) => Grant::ClientCredentials,
        _ => Grant::Code,
    })
}

/// Present whichever token the matching route validates.
fn default_token_use(stack: &Stack, method: HttpMethod, path: &str) -> TokenUse {
    let scoped = stack
        .gateway()
        .and_then(|g| g.find_route(method, path))
        .map_or(true, |route| !route.required_scopes().is_empty());
    if scoped {
        TokenUse::Access
    } else {
        TokenUse::Id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingOutput;
    use std::fs;

    const MANIFEST: &str = r#"
stack: { name: Demo }
directory: { name: UserPool }
resource_servers:
  - identifier: api
    scopes: [{ name: admin }, { name: user }]
clients:
  web:
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
"#;

    fn context() -> (tempfile::TempDir, ManifestContext) {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("authstack.yaml");
        fs::write(&path, MANIFEST).unwrap();
        let ctx = ManifestContext::resolve(Some(path), "development", &[]).unwrap();
        (temp, ctx)
    }

    fn args(method: &str, path: &str, client: Option<&str>) -> CheckArgs {
        CheckArgs {
            method: method.to_string(),
            path: path.to_string(),
            client: client.map(str::to_string),
            grant: None,
            scopes: Vec::new(),
            token: None,
        }
    }

    #[test]
    fn test_check_without_token() {
        let (_temp, ctx) = context();
        let decision = run_check(&ctx, &args("GET", "/", None), &RecordingOutput::default()).unwrap();
        assert_eq!(decision.status(), 401);
    }

    #[test]
    fn test_check_picks_grant_and_token() {
        let (_temp, ctx) = context();
        let out = RecordingOutput::default();

        let decision = run_check(&ctx, &args("GET", "/user", Some("worker")), &out).unwrap();
        assert!(decision.is_dispatched());
        assert!(out.text().contains("access token for client 'worker'"));

        let decision = run_check(&ctx, &args("POST", "/", Some("web")), &out).unwrap();
        assert!(decision.is_dispatched());
    }

    #[test]
    fn test_check_scope_subset_is_rejected() {
        let (_temp, ctx) = context();
        let mut request = args("GET", "/user", Some("worker"));
        request.scopes = vec!["api/admin".to_string()];
        let decision = run_check(&ctx, &request, &RecordingOutput::default()).unwrap();
        assert_eq!(decision.status(), 401);
    }

    #[test]
    fn test_check_rejects_bad_method() {
        let (_temp, ctx) = context();
        assert!(run_check(&ctx, &args("FETCH", "/", None), &RecordingOutput::default()).is_err());
    }
}
