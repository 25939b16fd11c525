//! Session domain models
//!
//! A session is a metadata record of an access event, not a live connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Ssh,
    Rdp,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Ssh => "ssh",
            SessionType::Rdp => "rdp",
        }
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ssh" => Ok(SessionType::Ssh),
            "rdp" => Ok(SessionType::Rdp),
            other => Err(format!("unknown session type: {other}")),
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub credential_id: Uuid,
    #[serde(rename = "type")]
    pub kind: SessionType,
    /// Caller-defined state label, e.g. "active"
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }
}

/// Create session request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSession {
    pub asset_id: Uuid,
    #[serde(rename = "cred_id", alias = "credential_id")]
    pub credential_id: Uuid,
    #[serde(rename = "type")]
    pub kind: SessionType,
    /// 调用方定义的状态标签，不限长度，不能为空
    #[validate(length(min = 1))]
    pub status: String,
}

/// Update session request; asset and credential links are immutable
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateSession {
    #[serde(rename = "type")]
    pub kind: SessionType,
    #[validate(length(min = 1))]
    pub status: String,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
}
