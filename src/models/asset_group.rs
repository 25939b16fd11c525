//! Asset group domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Asset group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetGroup {
    pub id: Uuid,
    pub name: String,
    pub attrs: Vec<AssetGroupAttribute>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetGroup {
    /// 按 key 查找属性
    pub fn attr(&self, key: &str) -> Option<&AssetGroupAttribute> {
        self.attrs.iter().find(|a| a.key == key)
    }
}

/// Typed key/value tag owned by one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetGroupAttribute {
    pub id: Uuid,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attribute payload for create/update
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AttributeInput {
    #[validate(length(min = 1, max = 255))]
    pub key: String,
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl AttributeInput {
    pub fn new(key: impl Into<String>, value: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind: kind.into(),
        }
    }
}

/// Create group request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAssetGroup {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    #[validate(nested)]
    pub attrs: Vec<AttributeInput>,
}

/// Update group request
///
/// Replaces the name and the whole attribute set. Attributes are matched by
/// key: existing keys keep their id, missing keys are removed.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateAssetGroup {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    #[validate(nested)]
    pub attrs: Vec<AttributeInput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_group_defaults() {
        let req: CreateAssetGroup = serde_json::from_str(r#"{"name": "prod"}"#).unwrap();
        assert_eq!(req.name, "prod");
        assert!(req.attrs.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_nested_attribute_validation() {
        let req = CreateAssetGroup {
            name: "prod".to_string(),
            attrs: vec![AttributeInput::new("", "v", "label")],
        };
        assert!(req.validate().is_err());
    }
}
