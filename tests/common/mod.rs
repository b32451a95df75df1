#![allow(dead_code)]

use authstack::config::Environment;
use authstack::parameter::Resolver;
use authstack::{Parser, Stack};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The bundled reference deployment.
pub fn demo_manifest() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join("simple-api-gw-cognito-auth")
        .join("authstack.yaml")
}

pub fn parser_for(environment: Environment, overrides: &[(&str, &str)]) -> Parser {
    let overrides: BTreeMap<String, String> = overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Parser::with_resolver(Resolver::new(environment).with_overrides(overrides))
}

pub fn demo_stack() -> Stack {
    Stack::load(&Parser::new(), &demo_manifest()).expect("demo manifest should build")
}
