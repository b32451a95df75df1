//! Template synthesis.
//!
//! - `template` - The template document and intrinsic helpers
//! - `asset` - Content fingerprints and the asset manifest
//! - `synthesizer` - Stack to template translation

mod asset;
mod synthesizer;
pub mod template;

pub use asset::*;
pub use synthesizer::*;
pub use template::{Output, Resource, Template};
