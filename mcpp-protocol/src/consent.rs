use serde::Deserialize;
use serde::Serialize;

use crate::usage::DataUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentDecision {
    Allow,
    Deny,
}

impl ConsentDecision {
    pub fn is_allow(self) -> bool {
        matches!(self, ConsentDecision::Allow)
    }
}

/// Key for the consent decision cache:
/// `host_id :: destination :: data_usage [:: tool_name]`.
///
/// A decision coming back through `provide_consent` carries only a
/// `request_id`, not this context, so the dispatcher stashes this struct
/// alongside the pending request when it is created — the key is rebuilt
/// from that stored context rather than guessed at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionCacheKey {
    pub host_id: String,
    pub destination: String,
    pub data_usage: DataUsage,
    pub tool_name: Option<String>,
}

impl DecisionCacheKey {
    pub fn new(
        host_id: impl Into<String>,
        destination: impl Into<String>,
        data_usage: DataUsage,
        tool_name: Option<String>,
    ) -> Self {
        Self {
            host_id: host_id.into(),
            destination: destination.into(),
            data_usage,
            tool_name,
        }
    }

    /// Canonical string form, used as the literal cache key.
    pub fn canonical(&self) -> String {
        match &self.tool_name {
            Some(tool) => format!("{}::{}::{}::{}", self.host_id, self.destination, self.data_usage, tool),
            None => format!("{}::{}::{}", self.host_id, self.destination, self.data_usage),
        }
    }
}

/// The payload a host uses to render a consent UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRequest {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub destination: String,
    pub data_usage: DataUsage,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timeout_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_includes_tool_only_when_present() {
        let with_tool = DecisionCacheKey::new("host", "gpt-4", DataUsage::Transfer, Some("search".to_string()));
        assert_eq!(with_tool.canonical(), "host::gpt-4::transfer::search");

        let without_tool = DecisionCacheKey::new("host", "gpt-4", DataUsage::Transfer, None);
        assert_eq!(without_tool.canonical(), "host::gpt-4::transfer");
    }
}
