use super::ManifestContext;
use crate::cli::TemplateFormat;
use crate::output::UserOutput;
use authstack::Synthesizer;
use std::path::Path;

pub fn run_synth(
    ctx: &ManifestContext,
    output: Option<&Path>,
    format: TemplateFormat,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let stack = ctx.load_stack(true)?;
    let synthesis = Synthesizer::new(&stack).synthesize();

    match output {
        Some(dir) => {
            for path in synthesis.write_to(dir)? {
                out.success(&format!("Wrote {}", path.display()));
            }
            out.status(&format!(
                "{} resources, {} assets",
                synthesis.template.resources.len(),
                synthesis.assets.len()
            ));
        }
        None => {
            let rendered = match format {
                TemplateFormat::Json => synthesis.template.to_json()?,
                TemplateFormat::Yaml => synthesis.template.to_yaml()?,
            };
            out.status(rendered.trim_end());
        }
    }

    Ok(())
}
