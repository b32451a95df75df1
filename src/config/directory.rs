//! Identity directory configuration.

use serde::{Deserialize, Serialize};

/// Placeholder the identity provider replaces with the verification code.
pub const CODE_PLACEHOLDER: &str = "{####}";

/// Placeholder the identity provider replaces with the verification link.
pub const LINK_PLACEHOLDER: &str = "{##Verify Email##}";

/// The managed user directory: sign-up, sign-in and verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Logical name, used to reference the directory from authorizers.
    pub name: String,

    #[serde(default)]
    pub self_sign_up: bool,

    #[serde(default)]
    pub sign_in_aliases: Vec<SignInAlias>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<HostedDomainConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInAlias {
    Email,
    Phone,
    Username,
    PreferredUsername,
}

impl SignInAlias {
    /// Whether users sign in with this attribute instead of a free-form username.
    pub fn is_username_attribute(&self) -> bool {
        matches!(self, SignInAlias::Email | SignInAlias::Phone)
    }

    /// Attribute name as the identity provider spells it.
    pub fn attribute(&self) -> &'static str {
        match self {
            SignInAlias::Email => "email",
            SignInAlias::Phone => "phone_number",
            SignInAlias::Username => "username",
            SignInAlias::PreferredUsername => "preferred_username",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStyle {
    #[default]
    Code,
    Link,
}

impl VerificationStyle {
    /// Placeholder that must appear in the email body for this style.
    pub fn placeholder(&self) -> &'static str {
        match self {
            VerificationStyle::Code => CODE_PLACEHOLDER,
            VerificationStyle::Link => LINK_PLACEHOLDER,
        }
    }

    pub fn default_email_option(&self) -> &'static str {
        match self {
            VerificationStyle::Code => "CONFIRM_WITH_CODE",
            VerificationStyle::Link => "CONFIRM_WITH_LINK",
        }
    }
}

/// Verification message sent after self sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default)]
    pub style: VerificationStyle,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_body: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_message: Option<String>,
}

/// Hosted sign-in domain under the provider's shared namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedDomainConfig {
    /// Logical name of the domain resource. Defaults to `Domain`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub prefix: String,
}

impl HostedDomainConfig {
    pub fn logical_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Domain")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directory_section() {
        let yaml = r#"
name: UserPool
self_sign_up: true
sign_in_aliases: [email]
verification:
  style: code
  email_subject: "Verify"
  email_body: "Code {####}"
domain:
  prefix: my-prefix
"#;
        let dir: DirectoryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(dir.name, "UserPool");
        assert!(dir.self_sign_up);
        assert_eq!(dir.sign_in_aliases, vec![SignInAlias::Email]);
        let verification = dir.verification.unwrap();
        assert_eq!(verification.style, VerificationStyle::Code);
        let domain = dir.domain.unwrap();
        assert_eq!(domain.prefix, "my-prefix");
        assert_eq!(domain.logical_name(), "Domain");
    }

    #[test]
    fn test_verification_style_placeholders() {
        assert_eq!(VerificationStyle::Code.placeholder(), "{####}");
        assert_eq!(VerificationStyle::Link.placeholder(), "{##Verify Email##}");
        assert_eq!(
            VerificationStyle::Link.default_email_option(),
            "CONFIRM_WITH_LINK"
        );
    }

    #[test]
    fn test_sign_in_alias_attributes() {
        assert!(SignInAlias::Email.is_username_attribute());
        assert!(!SignInAlias::PreferredUsername.is_username_attribute());
        assert_eq!(SignInAlias::Phone.attribute(), "phone_number");
    }
}
