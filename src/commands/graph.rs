use super::ManifestContext;
use crate::output::UserOutput;
use authstack::dependency::Graph;
use authstack::Synthesizer;
use std::collections::BTreeMap;

pub fn run_graph(ctx: &ManifestContext, json: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    let stack = ctx.load_stack(false)?;
    let template = Synthesizer::new(&stack).synthesize().template;
    let graph = Graph::from_template(&template);
    let waves = graph.deployment_waves()?;

    if json {
        let dependencies: BTreeMap<&str, Vec<String>> = graph
            .nodes()
            .iter()
            .map(|id| (id.as_str(), graph.direct_dependencies(id)))
            .collect();
        let value = serde_json::json!({
            "resources": graph.nodes().len(),
            "edges": graph.edge_count(),
            "waves": waves,
            "dependencies": dependencies,
        });
        out.status(&serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    out.status(&format!(
        "Deployment waves for {} ({} resources, {} dependencies):",
        stack.name(),
        graph.nodes().len(),
        graph.edge_count()
    ));
    out.status(&format!("{:-<60}", ""));
    for (index, wave) in waves.iter().enumerate() {
        out.status(&format!("  Wave {}:", index + 1));
        for id in wave {
            let resource_type = template
                .resource(id)
                .map(|r| r.resource_type.as_str())
                .unwrap_or_default();
            let deps = graph.direct_dependencies(id);
            if deps.is_empty() {
                out.status(&format!("    {:<40} {}", id, resource_type));
            } else {
                out.status(&format!(
                    "    {:<40} {:<34} <- {}",
                    id,
                    resource_type,
                    deps.join(", ")
                ));
            }
        }
    }

    Ok(())
}
