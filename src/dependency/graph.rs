use crate::error::{Error, Result};
use crate::synth::Template;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Dependency graph between template resources
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeSet<String>,
    /// `edges[A] = {B, C}` means A depends on B and C
    edges: BTreeMap<String, BTreeSet<String>>,
    /// `reverse[A] = {B, C}` means B and C depend on A
    reverse: BTreeMap<String, BTreeSet<String>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of a template from `DependsOn` and the `Ref` and
    /// `Fn::GetAtt` intrinsics found anywhere in resource properties.
    ///
    /// References to pseudo parameters (`AWS::Region`, ...) and to names that
    /// are not resources in the template are ignored.
    pub fn from_template(template: &Template) -> Self {
        let mut graph = Self::new();
        for id in template.resources.keys() {
            graph.add_node(id.clone());
        }

        for (id, resource) in &template.resources {
            let mut targets = BTreeSet::new();
            collect_references(&resource.properties, &mut targets);
            targets.extend(resource.depends_on.iter().cloned());

            for target in targets {
                if target != *id && template.resources.contains_key(&target) {
                    graph.add_edge(id.clone(), target);
                }
            }
        }
        graph
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, name: String) {
        self.nodes.insert(name.clone());
        self.edges.entry(name.clone()).or_default();
        self.reverse.entry(name).or_default();
    }

    /// Add a dependency edge (from depends on to)
    pub fn add_edge(&mut self, from: String, to: String) {
        self.add_node(from.clone());
        self.add_node(to.clone());

        self.edges.entry(from.clone()).or_default().insert(to.clone());
        self.reverse.entry(to).or_default().insert(from);
    }

    /// Resources `node` references directly, sorted by id.
    pub fn direct_dependencies(&self, node: &str) -> Vec<String> {
        self.edges
            .get(node)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Topological sort - dependencies first, ties broken by name
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut in_degree = self.in_degrees();

        let mut queue: VecDeque<String> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(node, _)| node.clone())
            .collect();

        let mut result = Vec::new();

        while let Some(node) = queue.pop_front() {
            result.push(node.clone());

            if let Some(dependents) = self.reverse.get(&node) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent.clone());
                        }
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            let cycle = self.find_cycle();
            return Err(Error::CircularDependency(cycle));
        }

        Ok(result)
    }

    fn in_degrees(&self) -> BTreeMap<String, usize> {
        self.nodes
            .iter()
            .map(|node| (node.clone(), self.edges.get(node).map_or(0, BTreeSet::len)))
            .collect()
    }

    /// Find a cycle in the graph and return it as a path
    fn find_cycle(&self) -> Vec<String> {
        let mut visited = BTreeSet::new();
        let mut rec_stack = BTreeSet::new();
        let mut path = Vec::new();

        for node in &self.nodes {
            if !visited.contains(node) {
                if let Some(cycle) =
                    self.find_cycle_dfs(node, &mut visited, &mut rec_stack, &mut path)
                {
                    return cycle;
                }
            }
        }

        self.nodes.iter().take(3).cloned().collect()
    }

    fn find_cycle_dfs(
        &self,
        node: &str,
        visited: &mut BTreeSet<String>,
        rec_stack: &mut BTreeSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if !visited.contains(dep) {
                    if let Some(cycle) = self.find_cycle_dfs(dep, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(dep) {
                    let cycle_start = path.iter().position(|n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[cycle_start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
            }
        }

        rec_stack.remove(node);
        path.pop();
        None
    }

    /// Group resources into waves: every resource in a wave depends only on
    /// resources in earlier waves, so a wave can be created in parallel.
    pub fn deployment_waves(&self) -> Result<Vec<Vec<String>>> {
        self.topological_sort()?;

        let mut in_degree = self.in_degrees();
        let mut waves = Vec::new();
        let mut processed = BTreeSet::new();

        while processed.len() < self.nodes.len() {
            let wave: Vec<String> = self
                .nodes
                .iter()
                .filter(|node| {
                    !processed.contains(*node) && in_degree.get(*node).copied().unwrap_or(0) == 0
                })
                .cloned()
                .collect();

            if wave.is_empty() {
                return Err(Error::Config(
                    "Unable to determine deployment waves".to_string(),
                ));
            }

            for node in &wave {
                processed.insert(node.clone());
                if let Some(dependents) = self.reverse.get(node) {
                    for dependent in dependents {
                        if let Some(degree) = in_degree.get_mut(dependent) {
                            *degree = degree.saturating_sub(1);
                        }
                    }
                }
            }
            waves.push(wave);
        }

        Ok(waves)
    }

    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }
}

fn collect_references(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("Ref") {
                out.insert(target.clone());
            }
            if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(target)) = args.first() {
                    out.insert(target.clone());
                }
            }
            for nested in map.values() {
                collect_references(nested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        _ => {}
    }
}
