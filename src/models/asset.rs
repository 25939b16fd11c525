//! Asset domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Asset kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Host,
    Db,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Host => "host",
            AssetType::Db => "db",
        }
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(AssetType::Host),
            "db" => Ok(AssetType::Db),
            other => Err(format!("unknown asset type: {other}")),
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reachable target (host or database)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Asset {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: AssetType,
    pub name: String,
    pub ip: IpAddr,
    pub port: u16,
    /// Groups this asset belongs to, in group creation order
    pub group_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create asset request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAsset {
    #[serde(rename = "type")]
    pub kind: AssetType,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub ip: IpAddr,
    #[validate(range(min = 1))]
    pub port: u16,
}

/// Update asset request (full replace of the mutable fields)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateAsset {
    #[serde(rename = "type")]
    pub kind: AssetType,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub ip: IpAddr,
    #[validate(range(min = 1))]
    pub port: u16,
}
