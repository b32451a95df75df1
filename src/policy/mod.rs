//! Request-time behavior of a deployed stack.
//!
//! The identity provider and the gateway enforce the policy a stack
//! declares. This module replays that enforcement offline so a manifest's
//! route table can be checked with concrete requests before anything is
//! deployed.

mod gateway;
mod token;

pub use gateway::*;
pub use token::*;
