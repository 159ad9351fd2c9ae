use std::collections::HashMap;

use mcpp_protocol::consent::DecisionCacheKey;
use mcpp_protocol::target::Category;
use mcpp_protocol::target::TargetType;
use mcpp_protocol::tool::AllowedTargets;
use mcpp_protocol::tool::PermissionValue;
use mcpp_protocol::tool::Tool;
use mcpp_protocol::usage::DataUsage;
use mcpp_protocol::usage::UsageContext;
use mcpp_protocol::ServerConfig;
use serde::Serialize;
use tracing::debug;

use crate::error::CoreError;
use crate::error::Result;

/// Records which of the evaluator's ordered sub-checks passed, so a
/// permission error or consent request can show a debugging client exactly
/// where evaluation stopped rather than just the final verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationDetails {
    pub data_usage_check: bool,
    pub target_check: bool,
    pub consent_check: bool,
}

/// Outcome of a full policy pass: either the request may proceed, or it
/// must be held for a consent decision before proceeding. A deny is never
/// represented here — it surfaces as `CoreError::InsufficientPermissions`.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluatorResult {
    Allow,
    ConsentRequired { reasons: Vec<String>, cache_key: DecisionCacheKey, validation_details: ValidationDetails },
}

enum ConsentOutcome {
    /// Steps 1-7 matched: consent is bypassed unconditionally, even if the
    /// data-usage permission itself is `prompt`.
    Bypassed,
    /// None of steps 1-7 applied; `reasons` holds whatever step-8 triggers
    /// fired (may be empty — the caller still folds in the `prompt`
    /// data-usage permission before deciding).
    Evaluated(Vec<String>),
}

/// Decides `allow | deny | prompt` for a `(tool, usage_context)` pair.
/// Stateless and config-snapshot-only; it never touches the decision
/// cache or pending consent table itself, which belong to the consent
/// coordinator.
pub struct PolicyEvaluator;

impl PolicyEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, tool: &Tool, config: &ServerConfig, context: &UsageContext) -> Result<EvaluatorResult> {
        let mut validation_details = ValidationDetails::default();

        let data_permission = self.resolve_data_usage_permission(tool, config, context.data_usage);
        if data_permission == PermissionValue::Deny {
            debug!(tool = %tool.name, data_usage = %context.data_usage, "denied: data usage not permitted");
            return Err(CoreError::InsufficientPermissions {
                reason: format!("data usage '{}' is denied for tool '{}'", context.data_usage, tool.name),
                validation_details,
            });
        }
        validation_details.data_usage_check = true;

        for destination in context.target.destination.iter() {
            self.check_target_permission(tool, config, context.target.target_type, destination).map_err(|err| {
                debug!(tool = %tool.name, destination, "denied: target not permitted");
                attach_validation_details(err, validation_details)
            })?;
        }
        validation_details.target_check = true;

        let mut reasons = match self.consent_check(tool, config, context) {
            ConsentOutcome::Bypassed => {
                validation_details.consent_check = true;
                return Ok(EvaluatorResult::Allow);
            }
            ConsentOutcome::Evaluated(reasons) => reasons,
        };
        if data_permission == PermissionValue::Prompt {
            reasons.push(format!("data usage '{}' requires prompting by policy", context.data_usage));
        }

        if reasons.is_empty() {
            validation_details.consent_check = true;
            Ok(EvaluatorResult::Allow)
        } else {
            debug!(tool = %tool.name, reasons = ?reasons, "consent required before proceeding");
            Ok(EvaluatorResult::ConsentRequired { reasons, cache_key: self.cache_key(tool, context), validation_details })
        }
    }

    /// Tool-level permissions take precedence over the global default at
    /// the requested usage level; see `effective_permission` for the two
    /// cross-level cascades applied within each map.
    fn resolve_data_usage_permission(&self, tool: &Tool, config: &ServerConfig, level: DataUsage) -> PermissionValue {
        if let Some(policy) = &tool.data_policy {
            if let Some(value) = effective_permission(&policy.data_usage_permissions, level) {
                return value;
            }
        }
        effective_permission(&config.default_data_usage_policy, level).unwrap_or(PermissionValue::Allow)
    }

    /// Ordered, short-circuiting target check: tool-level unified fields,
    /// then legacy per-type lists (only when the unified fields didn't
    /// already decide), then the global default target policy.
    fn check_target_permission(
        &self,
        tool: &Tool,
        config: &ServerConfig,
        target_type: TargetType,
        destination: &str,
    ) -> Result<()> {
        if let Some(policy) = &tool.data_policy {
            let perms = &policy.target_permissions;
            if let Some(blocked) = &perms.blocked_targets {
                if blocked.iter().any(|b| b == destination) {
                    return Err(deny_target(destination, &blocked_by_tool(target_type)));
                }
            }
            if let Some(allowed) = &perms.allowed_targets {
                return match allowed {
                    AllowedTargets::None(_) => Err(deny_target(destination, "no_targets_allowed")),
                    AllowedTargets::List(list) if !list.iter().any(|a| a == destination) => {
                        Err(deny_target(destination, &not_in_allowlist(target_type)))
                    }
                    AllowedTargets::List(_) => Ok(()),
                };
            }
            match target_type {
                TargetType::Server => {
                    if let Some(blocked) = &perms.blocked_servers {
                        if blocked.iter().any(|b| b == destination) {
                            return Err(deny_target(destination, &blocked_by_tool(target_type)));
                        }
                    }
                    if let Some(allowed) = &perms.allowed_servers {
                        if !allowed.iter().any(|a| a == destination) {
                            return Err(deny_target(destination, &not_in_allowlist(target_type)));
                        }
                    }
                }
                TargetType::Client => {
                    if let Some(allowed) = &perms.allowed_clients {
                        if !allowed.iter().any(|a| a == destination) {
                            return Err(deny_target(destination, &not_in_allowlist(target_type)));
                        }
                    }
                }
                TargetType::Llm | TargetType::All => {}
            }
        }

        let trusted = config.trusted_targets.iter().any(|t| t == destination) || config.is_trusted_domain(destination);
        if trusted {
            return Ok(());
        }

        match target_type {
            TargetType::Server => match &config.default_target_policy.server {
                Some(AllowedTargets::None(_)) => Err(deny_target(destination, "no_targets_allowed")),
                Some(AllowedTargets::List(list)) if !list.iter().any(|a| a == destination) => {
                    Err(deny_target(destination, &not_in_allowlist(target_type)))
                }
                _ => Ok(()),
            },
            TargetType::Llm if config.default_target_policy.llm_deny => Err(deny_target(destination, "llm_denied_globally")),
            _ => Ok(()),
        }
    }

    /// Ordered consent check. Steps 1-7 are absolute bypasses that stop at
    /// the first match and never require consent, independent of anything
    /// that follows (including a `prompt` data-usage permission); only
    /// once none of them apply do the trigger flags in step 8 run.
    fn consent_check(&self, tool: &Tool, config: &ServerConfig, context: &UsageContext) -> ConsentOutcome {
        let destination = context.target.destination.primary();
        let overrides = tool.data_policy.as_ref().map(|p| &p.consent_overrides);

        if context.data_usage == DataUsage::Display && context.target.target_type == TargetType::Client {
            return ConsentOutcome::Bypassed;
        }
        if overrides.is_some_and(|o| o.never_require_consent) {
            return ConsentOutcome::Bypassed;
        }
        if overrides.is_some_and(|o| o.always_require_consent) {
            let message = overrides
                .and_then(|o| o.custom_consent_message.clone())
                .unwrap_or_else(|| "tool policy always requires consent".to_string());
            return ConsentOutcome::Evaluated(vec![message]);
        }
        if overrides.is_some_and(|o| o.allowed_without_consent.iter().any(|d| d == destination)) {
            return ConsentOutcome::Bypassed;
        }
        if config.trusted_targets.iter().any(|t| t == destination) {
            return ConsentOutcome::Bypassed;
        }
        if config.is_trusted_domain(destination) {
            return ConsentOutcome::Bypassed;
        }
        let category = config.target_categories.get(destination);
        if let Some(category) = category {
            if !category.requires_consent {
                return ConsentOutcome::Bypassed;
            }
        }

        let mut reasons = Vec::new();
        let flags = &config.require_consent_for;
        if flags.any_transfer && context.data_usage == DataUsage::Transfer {
            reasons.push("any data transfer requires consent".to_string());
        }
        if flags.sensitive_data_transfer && tool.is_sensitive {
            reasons.push("transferring sensitive tool output requires consent".to_string());
        }
        if flags.llm_data_access && context.target.target_type == TargetType::Llm {
            reasons.push("sending data to an LLM target requires consent".to_string());
        }
        if context.target.target_type == TargetType::Llm && category.is_some_and(|c| c.has_permanent_retention()) {
            reasons.push("destination retains data permanently".to_string());
        }
        if flags.external_server_transfer
            && context.target.target_type == TargetType::Server
            && category.is_some_and(|c| c.category == Category::External)
        {
            reasons.push("transferring to an external server requires consent".to_string());
        }

        ConsentOutcome::Evaluated(reasons)
    }

    fn cache_key(&self, tool: &Tool, context: &UsageContext) -> DecisionCacheKey {
        DecisionCacheKey::new(
            context.requester.host_id.clone(),
            context.target.destination.primary().to_string(),
            context.data_usage,
            Some(tool.name.clone()),
        )
    }
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn deny_target(destination: &str, reason: &str) -> CoreError {
    CoreError::InsufficientPermissions {
        reason: format!("target '{destination}' denied: {reason}"),
        validation_details: ValidationDetails::default(),
    }
}

/// `check_target_permission` has no visibility into the sub-checks that
/// already passed before it ran, so `evaluate` patches the real
/// `validation_details` onto its error after the fact rather than
/// threading them through every `deny_target` call site.
fn attach_validation_details(err: CoreError, validation_details: ValidationDetails) -> CoreError {
    match err {
        CoreError::InsufficientPermissions { reason, .. } => {
            CoreError::InsufficientPermissions { reason, validation_details }
        }
        other => other,
    }
}

fn blocked_by_tool(target_type: TargetType) -> String {
    format!("{}_blocked_by_tool", target_type.as_str())
}

fn not_in_allowlist(target_type: TargetType) -> String {
    format!("{}_not_in_allowlist", target_type.as_str())
}

/// Resolves the permission for `level` against a sparse map, applying the
/// hierarchy's two cascades: a deny at an equal-or-less-restrictive level
/// forces a deny here too (you can't transfer what you aren't even allowed
/// to display), and an explicit allow at a more-restrictive level implies
/// allow here (being allowed to transfer implies being allowed to merely
/// display). The deny cascade wins when both would otherwise apply.
fn effective_permission(map: &HashMap<DataUsage, PermissionValue>, level: DataUsage) -> Option<PermissionValue> {
    let denied_below = DataUsage::ALL
        .into_iter()
        .any(|lower| lower <= level && map.get(&lower) == Some(&PermissionValue::Deny));
    if denied_below {
        return Some(PermissionValue::Deny);
    }
    if let Some(value) = map.get(&level) {
        return Some(*value);
    }
    let allowed_above = DataUsage::ALL
        .into_iter()
        .any(|higher| higher > level && map.get(&higher) == Some(&PermissionValue::Allow));
    if allowed_above {
        Some(PermissionValue::Allow)
    } else {
        None
    }
}
