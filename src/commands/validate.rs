use super::ManifestContext;
use crate::output::UserOutput;
use authstack::config::check_prefix_uniqueness;
use authstack::stack::Stack;
use std::path::PathBuf;

pub fn run_validate(
    ctx: &ManifestContext,
    extra: &[PathBuf],
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    out.status(&format!("Validating {}...", ctx.manifest_path.display()));

    let manifest = match ctx.parser.load_manifest(&ctx.manifest_path) {
        Ok(manifest) => manifest,
        Err(e) => {
            out.error("Manifest failed to load");
            return Err(e.into());
        }
    };

    let advisories = manifest.advisories();
    let stack = Stack::builder()
        .manifest(manifest.clone())
        .base_dir(ctx.base_dir())
        .log_advisories(false)
        .build()?;

    let mut labelled = vec![(ctx.manifest_path.display().to_string(), manifest)];
    for path in extra {
        labelled.push((path.display().to_string(), ctx.parser.load_manifest(path)?));
    }
    check_prefix_uniqueness(&labelled)?;

    out.success("Manifest is valid");
    out.blank();
    print_summary(&stack, out);

    if !advisories.is_empty() {
        out.blank();
        out.status(&format!("Advisories: {}", advisories.len()));
        for advisory in &advisories {
            out.warning(&format!("  ! {}", advisory));
        }
    }

    if !extra.is_empty() {
        out.blank();
        out.status(&format!(
            "Domain prefixes are unique across {} manifests",
            labelled.len()
        ));
    }

    Ok(())
}

fn print_summary(stack: &Stack, out: &dyn UserOutput) {
    out.status(&format!("Stack: {}", stack.name()));

    let directory = stack.directory();
    match &directory.domain {
        Some(domain) => out.status(&format!(
            "Directory: {} (domain prefix: {})",
            directory.name, domain.prefix
        )),
        None => out.status(&format!("Directory: {}", directory.name)),
    }

    out.status(&format!("\nResource servers: {}", stack.resource_servers().len()));
    for server in stack.resource_servers().values() {
        let scopes: Vec<&str> = server.scopes.keys().map(|s| s.as_str()).collect();
        out.status(&format!("  - {} ({})", server.id, scopes.join(", ")));
    }

    out.status(&format!("\nClients: {}", stack.clients().len()));
    for client in stack.clients().values() {
        let flows: Vec<&str> = client.flows.iter().map(|f| f.wire_name()).collect();
        let scopes: Vec<String> = client.scopes.iter().map(ToString::to_string).collect();
        out.status(&format!(
            "  - {} ({}; {}; {})",
            client.name,
            client.trust_level(),
            flows.join(", "),
            scopes.join(" ")
        ));
    }

    out.status(&format!("\nFunctions: {}", stack.functions().len()));
    for function in stack.functions().values() {
        out.status(&format!(
            "  - {} ({}, {}, {} MB, {}s)",
            function.name,
            function.runtime,
            function.handler,
            function.memory_mb,
            function.timeout.as_secs()
        ));
    }

    if let Some(gateway) = stack.gateway() {
        out.status(&format!(
            "\nGateway: {} (stage {}, {} routes)",
            gateway.display_name,
            gateway.stage,
            gateway.routes.len()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingOutput;
    use std::fs;

    const MANIFEST: &str = r#"
stack: { name: Demo }
directory:
  name: UserPool
  domain: { prefix: demo-auth-domain }
resource_servers:
  - identifier: api
    scopes: [{ name: user }]
clients:
  web:
    flows: [authorization_code]
    scopes: [openid]
functions:
  handler: { runtime: nodejs18.x, handler: index.handler, code: lambda }
gateway:
  name: Api
  routes:
    - { path: /open, method: GET, function: handler }
"#;

    fn context(dir: &std::path::Path) -> ManifestContext {
        fs::create_dir_all(dir.join("lambda")).unwrap();
        fs::write(dir.join("lambda/index.js"), "exports.handler = 1;").unwrap();
        let path = dir.join("authstack.yaml");
        fs::write(&path, MANIFEST).unwrap();
        ManifestContext::resolve(Some(path), "development", &[]).unwrap()
    }

    #[test]
    fn test_validate_prints_summary_and_advisories() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = context(temp.path());
        let out = RecordingOutput::default();

        run_validate(&ctx, &[], &out).unwrap();

        let text = out.text();
        assert!(text.contains("Manifest is valid"));
        assert!(text.contains("  - web (public; code; openid)"));
        assert!(text.contains("warning:   ! Route 'GET /open' has no authorizer"));
        assert!(text.contains("warning:   ! Client 'web' enables a browser flow"));
    }

    #[test]
    fn test_validate_detects_prefix_collision() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = context(temp.path());
        let other = temp.path().join("other.yaml");
        fs::write(&other, MANIFEST).unwrap();

        let err = run_validate(&ctx, &[other], &RecordingOutput::default()).unwrap_err();
        assert!(err.to_string().contains("demo-auth-domain"));
    }
}
