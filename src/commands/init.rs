use crate::output::UserOutput;
use std::path::Path;

const TEMPLATE: &str = include_str!("../../demos/simple-api-gw-cognito-auth/authstack.yaml");

pub fn run_init(output: &Path, force: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    if output.exists() && !force {
        out.error(&format!("Error: {} already exists", output.display()));
        out.error("Use --force to overwrite");
        return Err(anyhow::anyhow!("File already exists"));
    }

    std::fs::write(output, TEMPLATE)?;
    out.success(&format!("Created {}", output.display()));
    out.status("\nNext steps:");
    out.status(&format!(
        "  1. Edit {} to describe your directory, clients and routes",
        output.display()
    ));
    out.status("  2. Point functions.simpleLambda.code at your packaged handler");
    out.status("  3. Run: authstack validate");

    Ok(())
}
