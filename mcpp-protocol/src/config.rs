use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::consent::ConsentDecision;
use crate::tool::AllowedTargets;
use crate::tool::PermissionValue;
use crate::usage::DataUsage;
use crate::TargetCategory;

/// Global fallback for `target.type = "server"` / `"llm"` when a tool does
/// not decide the outcome itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultTargetPolicy {
    /// `None` means no restriction. `Some(List(..))` requires membership.
    /// `Some(None(_))` (the `"none"` sentinel) denies every server target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<AllowedTargets>,
    /// When `true`, every `target.type = "llm"` request is denied globally.
    #[serde(default)]
    pub llm_deny: bool,
}

/// The consent trigger flags evaluated during policy consent checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequireConsentFor {
    #[serde(default)]
    pub any_transfer: bool,
    #[serde(default)]
    pub sensitive_data_transfer: bool,
    #[serde(default)]
    pub llm_data_access: bool,
    #[serde(default)]
    pub external_server_transfer: bool,
}

/// Process-wide policy configuration. Loaded once at startup; the policy
/// evaluator treats it as an immutable snapshot for the lifetime of a
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub default_data_usage_policy: HashMap<DataUsage, PermissionValue>,
    pub default_target_policy: DefaultTargetPolicy,
    pub trusted_targets: Vec<String>,
    pub trusted_domains: Vec<String>,
    pub target_categories: HashMap<String, TargetCategory>,
    pub require_consent_for: RequireConsentFor,
    pub consent_timeout_seconds: u64,
    pub default_on_timeout: ConsentDecision,
    /// Default lifetime of a `remember`-d consent grant when
    /// `provide_consent` omits `duration_minutes`.
    pub cache_consent_duration_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut default_data_usage_policy = HashMap::new();
        default_data_usage_policy.insert(DataUsage::Display, PermissionValue::Allow);
        default_data_usage_policy.insert(DataUsage::Process, PermissionValue::Allow);
        default_data_usage_policy.insert(DataUsage::Store, PermissionValue::Prompt);
        default_data_usage_policy.insert(DataUsage::Transfer, PermissionValue::Prompt);

        Self {
            default_data_usage_policy,
            default_target_policy: DefaultTargetPolicy::default(),
            trusted_targets: Vec::new(),
            trusted_domains: Vec::new(),
            target_categories: HashMap::new(),
            require_consent_for: RequireConsentFor {
                any_transfer: true,
                sensitive_data_transfer: true,
                llm_data_access: true,
                external_server_transfer: true,
            },
            consent_timeout_seconds: 30,
            default_on_timeout: ConsentDecision::Deny,
            cache_consent_duration_minutes: 15,
        }
    }
}

impl ServerConfig {
    /// Matches `destination` against `trusted_domains`, where an entry may
    /// be a literal host or a `*.suffix` wildcard.
    pub fn is_trusted_domain(&self, destination: &str) -> bool {
        self.trusted_domains.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix("*.") {
                destination == suffix || destination.ends_with(&format!(".{suffix}"))
            } else {
                destination == pattern
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_domain_matches_subdomains_and_bare_suffix() {
        let mut cfg = ServerConfig::default();
        cfg.trusted_domains = vec!["*.example.com".to_string()];
        assert!(cfg.is_trusted_domain("api.example.com"));
        assert!(cfg.is_trusted_domain("example.com"));
        assert!(!cfg.is_trusted_domain("example.com.evil.net"));
    }

    #[test]
    fn literal_domain_requires_exact_match() {
        let mut cfg = ServerConfig::default();
        cfg.trusted_domains = vec!["partner.example.com".to_string()];
        assert!(cfg.is_trusted_domain("partner.example.com"));
        assert!(!cfg.is_trusted_domain("other.example.com"));
    }
}
