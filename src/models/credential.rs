//! Credential domain models
//!
//! `secret` is opaque to this layer; it is stored as given and wrapped in
//! [`Secret`] so it never shows up in `Debug` output or logs.

use chrono::{DateTime, Utc};
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialType {
    Password,
    Key,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::Password => "password",
            CredentialType::Key => "key",
        }
    }
}

impl FromStr for CredentialType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(CredentialType::Password),
            "key" => Ok(CredentialType::Key),
            other => Err(format!("unknown credential type: {other}")),
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access material bound to exactly one asset
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: Uuid,
    /// Owning asset, fixed at creation
    pub asset_id: Uuid,
    pub kind: CredentialType,
    pub username: String,
    pub secret: Secret<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create credential request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCredential {
    pub asset_id: Uuid,
    #[serde(rename = "type")]
    pub kind: CredentialType,
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    pub secret: Secret<String>,
}

/// Update credential request; the owning asset cannot be changed
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCredential {
    #[serde(rename = "type")]
    pub kind: CredentialType,
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    pub secret: Secret<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_secret_not_in_debug_output() {
        let req: CreateCredential = serde_json::from_str(
            r#"{"asset_id": "6f1c1d0e-8a53-4c2e-9a4b-1d2f3e4a5b6c", "type": "password", "username": "root", "secret": "hunter2"}"#,
        )
        .unwrap();

        assert_eq!(req.secret.expose_secret(), "hunter2");
        assert!(!format!("{:?}", req).contains("hunter2"));
    }

    #[test]
    fn test_credential_type_parse() {
        assert_eq!("key".parse::<CredentialType>().unwrap(), CredentialType::Key);
        assert!("token".parse::<CredentialType>().is_err());
    }
}
