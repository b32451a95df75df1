//! # authstack
//!
//! Declarative manifests for an OAuth-protected API deployment: one identity
//! directory with a hosted sign-in domain, resource servers and their scopes,
//! client registrations, packaged functions, and a REST gateway whose routes
//! are bound to the directory with optional scope requirements.
//!
//! ## Features
//!
//! - **Fail-fast validation**: unqualified or misspelled scopes, dangling
//!   references and missing code artifacts are rejected before synthesis
//! - **Typed stack**: every name reference is resolved into a typed link
//!   once, at build time
//! - **Deterministic synthesis**: the same stack always yields the same
//!   deployment template and content-addressed asset keys
//! - **Policy simulation**: replay token grants and gateway authorization
//!   for concrete requests without deploying anything
//!
//! ## Quick Start
//!
//! ```no_run
//! use authstack::{Parser, Stack, Synthesizer};
//!
//! # fn example() -> authstack::Result<()> {
//! let stack = Stack::load(&Parser::new(), "authstack.yaml".as_ref())?;
//! let synthesis = Synthesizer::new(&stack).synthesize();
//! println!("{}", synthesis.template.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dependency;
pub mod error;
pub mod parameter;
pub mod policy;
pub mod stack;
pub mod synth;

// Re-export commonly used types
pub use config::{Environment, Manifest, Parser};
pub use error::{Error, Result};
pub use policy::{GatewayRequest, GatewaySimulator, IdentityProvider};
pub use stack::{Stack, StackBuilder};
pub use synth::{Synthesis, Synthesizer};
