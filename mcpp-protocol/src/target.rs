use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// The kind of endpoint a `Target` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Client,
    Server,
    Llm,
    All,
}

impl TargetType {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetType::Client => "client",
            TargetType::Server => "server",
            TargetType::Llm => "llm",
            TargetType::All => "all",
        }
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `destination` is a single endpoint name or a list of them.
/// Policy evaluation treats a list as "all of these destinations must
/// clear the check" — a single denied destination denies the whole
/// request, which is the conservative reading of an otherwise-unspecified
/// multi-destination case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    Single(String),
    Multiple(Vec<String>),
}

impl Destination {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        match self {
            Destination::Single(s) => std::slice::from_ref(s).iter().map(String::as_str),
            Destination::Multiple(v) => v.iter().map(String::as_str),
        }
    }

    pub fn primary(&self) -> &str {
        match self {
            Destination::Single(s) => s,
            Destination::Multiple(v) => v.first().map(String::as_str).unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub destination: Destination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_metadata: Option<Value>,
}

/// Configuration-time classification of a destination. Unlike `Target`,
/// this is not per-request — it is keyed by destination string in
/// `ServerConfig::target_categories` and its trust level is never granted
/// authorizing power on its own; it is purely informational for UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetCategory {
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub category: Category,
    pub trust_level: TrustLevel,
    pub requires_consent: bool,
    #[serde(default)]
    pub metadata: Value,
}

impl TargetCategory {
    /// `metadata.data_retention == "permanent"`, consulted by one of the
    /// consent trigger checks.
    pub fn has_permanent_retention(&self) -> bool {
        self.metadata
            .get("data_retention")
            .and_then(Value::as_str)
            .is_some_and(|v| v == "permanent")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Internal,
    Partner,
    External,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    High,
    Medium,
    Low,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_iterates_single_as_one_item() {
        let d = Destination::Single("gpt-4".to_string());
        assert_eq!(d.iter().collect::<Vec<_>>(), vec!["gpt-4"]);
    }

    #[test]
    fn permanent_retention_is_detected() {
        let cat = TargetCategory {
            target_type: TargetType::Llm,
            category: Category::External,
            trust_level: TrustLevel::Low,
            requires_consent: true,
            metadata: serde_json::json!({"data_retention": "permanent"}),
        };
        assert!(cat.has_permanent_retention());
    }
}
