use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::usage::DataUsage;

/// `allow | deny | prompt`, the result of a single policy sub-check as
/// well as the literal value a tool can configure per data-usage level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionValue {
    Allow,
    Deny,
    Prompt,
}

/// Either an explicit allow-list of destinations or the `"none"` sentinel
/// meaning no destination is allowed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowedTargets {
    None(NoneSentinel),
    List(Vec<String>),
}

/// Deserializes only from the literal string `"none"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoneSentinel;

impl Serialize for NoneSentinel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("none")
    }
}

impl<'de> Deserialize<'de> for NoneSentinel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "none" {
            Ok(NoneSentinel)
        } else {
            Err(serde::de::Error::custom("expected the literal string \"none\""))
        }
    }
}

/// Unified target permissions plus the legacy per-target-type lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetPermissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_targets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_targets: Option<AllowedTargets>,

    // Legacy, type-scoped fields. Only consulted when `target.type` matches
    // and the unified fields above did not already decide the outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_servers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_servers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_clients: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsentOverrides {
    #[serde(default)]
    pub always_require_consent: bool,
    #[serde(default)]
    pub never_require_consent: bool,
    #[serde(default)]
    pub allowed_without_consent: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_consent_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataPolicy {
    #[serde(default)]
    pub data_usage_permissions: HashMap<DataUsage, PermissionValue>,
    #[serde(default)]
    pub target_permissions: TargetPermissions,
    #[serde(default)]
    pub consent_overrides: ConsentOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub is_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_policy: Option<DataPolicy>,
}

impl Tool {
    pub fn new(name: impl Into<String>, is_sensitive: bool) -> Self {
        Self {
            name: name.into(),
            input_schema: Value::Null,
            is_sensitive,
            data_policy: None,
        }
    }

    pub fn with_data_policy(mut self, policy: DataPolicy) -> Self {
        self.data_policy = Some(policy);
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn allowed_targets_none_sentinel_round_trips() {
        let at: AllowedTargets = serde_json::from_str("\"none\"").unwrap();
        assert!(matches!(at, AllowedTargets::None(_)));
        let serialized = serde_json::to_string(&at).unwrap();
        assert_eq!(serialized, "\"none\"");
    }

    #[test]
    fn allowed_targets_rejects_other_strings() {
        let result: Result<AllowedTargets, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }

    #[test]
    fn allowed_targets_list_round_trips() {
        let at: AllowedTargets = serde_json::from_str(r#"["gpt-4", "claude"]"#).unwrap();
        match at {
            AllowedTargets::List(v) => assert_eq!(v, vec!["gpt-4", "claude"]),
            AllowedTargets::None(_) => panic!("expected a list"),
        }
    }
}
