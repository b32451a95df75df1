//! Typed identifiers for stack entities.
//!
//! Entities reference each other by name. Wrapping each kind of name in its
//! own type keeps a client name from being looked up as a function name.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a resource server; the prefix of its qualified scopes.
    ResourceServerId
);
string_id!(
    /// Scope name, unique within its resource server.
    ScopeName
);
string_id!(
    /// Name of a client registration.
    ClientName
);
string_id!(
    /// Name of a compute target.
    FunctionName
);
string_id!(
    /// Name of a gateway authorizer.
    AuthorizerName
);
string_id!(
    /// Name of the identity directory.
    DirectoryName
);
string_id!(
    /// Template-level resource identifier: ASCII letters and digits only.
    LogicalId
);

impl LogicalId {
    /// Join `parts`, dropping every character that is not an ASCII letter or digit.
    ///
    /// Ids that would not start with a letter are prefixed with `R`.
    pub fn from_parts(parts: &[&str]) -> Self {
        let mut id: String = parts
            .iter()
            .flat_map(|p| p.chars())
            .filter(char::is_ascii_alphanumeric)
            .collect();
        if !id.starts_with(|c: char| c.is_ascii_alphabetic()) {
            id.insert(0, 'R');
        }
        Self(id)
    }

    /// Derive a child id, e.g. `UserPool` + `Domain` -> `UserPoolDomain`.
    pub fn child(&self, suffix: &str) -> Self {
        Self::from_parts(&[&self.0, suffix])
    }
}
