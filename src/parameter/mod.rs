//! Parameter resolution and `{{NAME}}` substitution.

mod resolver;

pub use resolver::*;
