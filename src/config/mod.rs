//! Manifest parsing and types.
//!
//! The manifest is the raw, serde-facing view of a deployment. It is parsed
//! from YAML, has its `{{PARAM}}` placeholders substituted, and is validated
//! here before the [`crate::stack::StackBuilder`] turns it into a typed tree.
//!
//! - `types` - Root manifest structure (`Manifest`, `StackMetadata`)
//! - `directory` - Identity directory and hosted domain
//! - `resource_server` - Resource servers and their scopes
//! - `client` - OAuth client registrations
//! - `function` - Compute targets (packaged handlers)
//! - `gateway` - REST API, authorizers and routes
//! - `parameter` - Parameters and environments
//! - `parser` - YAML loading and manifest discovery
//! - `validation` - Manifest validation and advisories

mod client;
mod directory;
mod function;
mod gateway;
mod parameter;
mod parser;
mod resource_server;
mod types;
mod validation;

pub use client::*;
pub use directory::*;
pub use function::*;
pub use gateway::*;
pub use parameter::*;
pub use parser::*;
pub use resource_server::*;
pub use types::*;
pub use validation::*;
