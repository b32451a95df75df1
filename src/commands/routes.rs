use super::ManifestContext;
use crate::output::UserOutput;
use authstack::stack::{Route, Stack};
use serde_json::json;

pub fn run_routes(ctx: &ManifestContext, json: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    let stack = ctx.load_stack(false)?;
    let routes: &[Route] = stack.gateway().map(|g| g.routes.as_slice()).unwrap_or_default();

    if json {
        let rows: Vec<_> = routes
            .iter()
            .map(|route| {
                json!({
                    "path": route.path,
                    "method": route.method.as_str(),
                    "auth_required": route.requires_auth(),
                    "authorizer": route.authorizer().map(|a| a.as_str()),
                    "token": token_kind(route),
                    "scopes": route.required_scopes(),
                    "function": route.target,
                })
            })
            .collect();
        out.status(&serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    print_table(&stack, routes, out);
    Ok(())
}

/// Which token the gateway validates on this route.
fn token_kind(route: &Route) -> Option<&'static str> {
    if !route.requires_auth() {
        None
    } else if route.required_scopes().is_empty() {
        Some("id")
    } else {
        Some("access")
    }
}

fn print_table(stack: &Stack, routes: &[Route], out: &dyn UserOutput) {
    let Some(gateway) = stack.gateway() else {
        out.status("  No gateway configured");
        return;
    };

    out.status(&format!("Routes of {} (stage {}):", gateway.display_name, gateway.stage));
    out.status(&format!(
        "  {:<20} {:<8} {:<6} {:<7} {:<30} {}",
        "ROUTE", "METHOD", "AUTH", "TOKEN", "SCOPES", "TARGET"
    ));
    out.status(&format!("{:-<90}", ""));

    for route in routes {
        let scopes: Vec<String> = route
            .required_scopes()
            .iter()
            .map(ToString::to_string)
            .collect();
        out.status(&format!(
            "  {:<20} {:<8} {:<6} {:<7} {:<30} {}",
            route.path,
            route.method,
            if route.requires_auth() { "yes" } else { "no" },
            token_kind(route).unwrap_or("-"),
            if scopes.is_empty() { "-".to_string() } else { scopes.join(" ") },
            route.target
        ));
    }
}
