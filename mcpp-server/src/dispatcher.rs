#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use mcpp_core::CoreError;
use mcpp_core::DataCache;
use mcpp_core::EvaluatorResult;
use mcpp_core::PlaceholderEngine;
use mcpp_core::PolicyEvaluator;
use mcpp_core::ReferenceFinder;
use mcpp_core::consent::ConsentCoordinator;
use mcpp_protocol::CachedEntry;
use mcpp_protocol::ServerConfig;
use mcpp_protocol::cache_entry::EntryMetadata;
use mcpp_protocol::consent::ConsentDecision;
use mcpp_protocol::consent::ConsentRequest;
use mcpp_protocol::consent::DecisionCacheKey;
use mcpp_protocol::ids::CallId;
use mcpp_protocol::tool::Tool;
use mcpp_protocol::usage::UsageContext;
use mcpp_types::ErrorCode;
use mcpp_types::JsonRpcError;
use mcpp_types::JsonRpcMessage;
use mcpp_types::JsonRpcRequest;
use mcpp_types::JsonRpcResponse;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::error;
use tracing::warn;
use uuid::Uuid;

use crate::tool_executor::ToolExecutor;
use crate::tool_executor::ToolOutcome;

/// Everything a request handler needs: the cache, the policy snapshot, the
/// consent coordinator, the registered tool declarations, and whatever
/// executes a tool's actual business logic. One instance is shared (behind
/// an `Arc`) across every connection the HTTP layer accepts.
pub struct AppState {
    pub cache: DataCache,
    pub config: ServerConfig,
    /// Shared via `Arc` (rather than owned outright) so the timeout sweep
    /// `gate_on_policy` spawns for each consent prompt can outlive the
    /// request that created it.
    pub consent: Arc<ConsentCoordinator>,
    pub tools: RwLock<HashMap<String, Tool>>,
    pub executor: Arc<dyn ToolExecutor>,
}

impl AppState {
    pub fn new(config: ServerConfig, tools: Vec<Tool>, executor: Arc<dyn ToolExecutor>) -> Self {
        let tools = tools.into_iter().map(|t| (t.name.clone(), t)).collect();
        Self {
            cache: DataCache::new(),
            config,
            consent: Arc::new(ConsentCoordinator::new()),
            tools: RwLock::new(tools),
            executor,
        }
    }

    fn tool(&self, name: &str) -> Tool {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .get(name)
            .cloned()
            .unwrap_or_else(|| Tool::new(name, false))
    }
}

/// Routing-level failure: either a dispatch concern (bad method, bad
/// params) or a propagated engine error. Both end up translated to the
/// same `JsonRpcErrorObject` shape by `to_error_object`.
enum DispatchError {
    UnknownMethod(String),
    InvalidParams(String),
    Core(CoreError),
    /// A `Core` error that also carries structured detail on `error.data` —
    /// `CONSENT_REQUIRED` carries the full `consent_request` a host needs to
    /// render a prompt, and `INSUFFICIENT_PERMISSIONS` carries
    /// `validation_details` so a debugging client can see which sub-check
    /// failed.
    CoreWithData(CoreError, Value),
}

impl From<CoreError> for DispatchError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientPermissions { reason, validation_details } => {
                let data = serde_json::json!({ "validation_details": validation_details });
                DispatchError::CoreWithData(CoreError::InsufficientPermissions { reason, validation_details }, data)
            }
            other => DispatchError::Core(other),
        }
    }
}

impl DispatchError {
    fn code(&self) -> i64 {
        match self {
            DispatchError::UnknownMethod(_) => ErrorCode::MethodNotFound.code(),
            DispatchError::InvalidParams(_) => ErrorCode::InvalidParams.code(),
            DispatchError::Core(err) | DispatchError::CoreWithData(err, _) => err.wire_code().code(),
        }
    }

    fn message(&self) -> String {
        match self {
            DispatchError::UnknownMethod(m) => format!("unknown method '{m}'"),
            DispatchError::InvalidParams(m) => m.clone(),
            DispatchError::Core(err) | DispatchError::CoreWithData(err, _) => err.to_string(),
        }
    }

    /// Extra structured detail carried on `error.data`. Only consent-related
    /// errors need this; every other error is fully described by its
    /// message.
    fn data(&self) -> Option<Value> {
        match self {
            DispatchError::CoreWithData(_, data) => Some(data.clone()),
            _ => None,
        }
    }
}

pub async fn dispatch(state: &AppState, request: JsonRpcRequest) -> JsonRpcMessage {
    match route(state, &request.method, request.params.clone()).await {
        Ok(result) => JsonRpcMessage::Response(JsonRpcResponse::new(request.id, result)),
        Err(err) => {
            let code = err.code();
            let data = err.data();
            // Internal errors (a malformed config reload, an I/O failure)
            // get their full detail logged server-side; the client only
            // ever sees a generic message for these, never the detail.
            let message = if code == ErrorCode::InternalError.code() {
                error!(method = %request.method, detail = %err.message(), "internal error handling request");
                "internal server error".to_string()
            } else {
                err.message()
            };
            JsonRpcMessage::Error(JsonRpcError::new(request.id, code, message, data))
        }
    }
}

async fn route(state: &AppState, method: &str, params: Option<Value>) -> Result<Value, DispatchError> {
    match method {
        "tools/list" => Ok(tools_list(state)),
        "tools/call" => tools_call(state, params).await,
        "mcpp/get_data" => mcpp_get_data(state, params),
        "mcpp/find_reference" => mcpp_find_reference(state, params),
        "mcpp/resolve_placeholders" => mcpp_resolve_placeholders(state, params),
        "mcpp/provide_consent" => mcpp_provide_consent(state, params),
        other => Err(DispatchError::UnknownMethod(other.to_string())),
    }
}

fn params_of<T: for<'de> Deserialize<'de>>(params: Option<Value>) -> Result<T, DispatchError> {
    let value = params.ok_or_else(|| DispatchError::InvalidParams("missing params".to_string()))?;
    serde_json::from_value(value).map_err(|e| DispatchError::InvalidParams(format!("invalid params: {e}")))
}

fn tools_list(state: &AppState) -> Value {
    let tools = state.tools.read().expect("tool registry lock poisoned");
    let mut list: Vec<&Tool> = tools.values().collect();
    list.sort_by(|a, b| a.name.cmp(&b.name));
    serde_json::json!({ "tools": list })
}

#[derive(Debug, Deserialize)]
struct ToolsCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
    #[serde(default)]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SensitiveSummary {
    message: String,
    row_count: usize,
    column_names: Vec<String>,
    data_ref_id: String,
}

async fn tools_call(state: &AppState, params: Option<Value>) -> Result<Value, DispatchError> {
    let params: ToolsCallParams = params_of(params)?;
    let tool = {
        let tools = state.tools.read().expect("tool registry lock poisoned");
        tools
            .get(&params.name)
            .cloned()
            .ok_or_else(|| DispatchError::InvalidParams(format!("unknown tool '{}'", params.name)))?
    };

    let call_id = match params.tool_call_id {
        Some(id) if CallId::is_valid(&id) => id,
        Some(id) => return Err(DispatchError::InvalidParams(format!("'{id}' is not a valid call_id"))),
        None => Uuid::new_v4().to_string(),
    };

    let outcome = state.executor.execute(&tool, params.arguments).await;
    let metadata = EntryMetadata::new(tool.name.clone(), tool.is_sensitive);
    let entry = match outcome {
        ToolOutcome::Table(payload) => CachedEntry::Table { payload, metadata },
        ToolOutcome::Text(payload) => CachedEntry::Text { payload, metadata },
        ToolOutcome::Json(payload) => CachedEntry::Json { payload, metadata },
    };

    if tool.is_sensitive {
        let summary = match &entry {
            CachedEntry::Table { payload, .. } => SensitiveSummary {
                message: format!("'{}' returned {} row(s); use mcpp/get_data to read them", tool.name, payload.rows.len()),
                row_count: payload.rows.len(),
                column_names: payload.headers.clone(),
                data_ref_id: call_id.clone(),
            },
            CachedEntry::Text { .. } | CachedEntry::Json { .. } => SensitiveSummary {
                message: format!("'{}' returned a result; use mcpp/get_data to read it", tool.name),
                row_count: 0,
                column_names: Vec::new(),
                data_ref_id: call_id.clone(),
            },
        };
        state.cache.put(call_id, entry);
        Ok(serde_json::to_value(summary).expect("summary always serializes"))
    } else {
        Ok(serde_json::to_value(&entry).expect("cached entry always serializes"))
    }
}

#[derive(Debug, Deserialize)]
struct GetDataParams {
    tool_call_id: String,
    #[serde(default)]
    usage_context: Option<UsageContext>,
}

fn mcpp_get_data(state: &AppState, params: Option<Value>) -> Result<Value, DispatchError> {
    let params: GetDataParams = params_of(params)?;
    let entry = state.cache.get(&params.tool_call_id).ok_or_else(|| CoreError::DataNotFound(params.tool_call_id.clone()))?;

    if let Some(context) = params.usage_context {
        let tool = state.tool(&entry.metadata().tool_name);
        gate_on_policy(state, &tool, &context)?;
    }

    Ok(serde_json::to_value(&entry).expect("cached entry always serializes"))
}

#[derive(Debug, Deserialize)]
struct FindReferenceParams {
    tool_call_id: String,
    keyword: String,
    #[serde(default)]
    column_name: Option<String>,
}

fn mcpp_find_reference(state: &AppState, params: Option<Value>) -> Result<Value, DispatchError> {
    let params: FindReferenceParams = params_of(params)?;
    let finder = ReferenceFinder::new(&state.cache);
    let found = finder.find(&params.tool_call_id, &params.keyword, params.column_name.as_deref())?;
    Ok(serde_json::json!({
        "placeholder": found.placeholder,
        "similarity": found.similarity,
        "metadata": { "cells_scanned": found.cells_scanned },
    }))
}

#[derive(Debug, Deserialize)]
struct ResolvePlaceholdersParams {
    data: Value,
    #[serde(default)]
    usage_context: Option<UsageContext>,
    #[serde(default)]
    tool_name: Option<String>,
}

fn mcpp_resolve_placeholders(state: &AppState, params: Option<Value>) -> Result<Value, DispatchError> {
    let params: ResolvePlaceholdersParams = params_of(params)?;

    if let Some(context) = &params.usage_context {
        let tool = state.tool(params.tool_name.as_deref().unwrap_or_default());
        gate_on_policy(state, &tool, context)?;
    }

    let engine = PlaceholderEngine::new(&state.cache);
    let (resolved_data, status) = engine.resolve_with_tracking(params.data);
    Ok(serde_json::json!({
        "resolved_data": resolved_data,
        "resolution_status": {
            "total": status.total,
            "resolved": status.resolved,
            "failed": status.failed,
            "unresolved": status.unresolved,
        },
    }))
}

/// Runs the policy evaluator for `tool`/`context` and turns a `ConsentRequired`
/// outcome into an immediate `-32007` response carrying a freshly-minted
/// `consent_request`, consulting the decision cache first so a remembered
/// `allow`/`deny`, or a prior prompt's timeout, short-circuits without
/// reprompting.
fn gate_on_policy(state: &AppState, tool: &Tool, context: &UsageContext) -> Result<(), DispatchError> {
    match PolicyEvaluator::new().evaluate(tool, &state.config, context) {
        Ok(EvaluatorResult::Allow) => Ok(()),
        Ok(EvaluatorResult::ConsentRequired { reasons, cache_key, validation_details }) => {
            if let Some(cached) = state.consent.lookup_cached(&cache_key) {
                return if cached.via_timeout {
                    Err(CoreError::ConsentTimeout.into())
                } else if cached.decision.is_allow() {
                    Ok(())
                } else {
                    Err(CoreError::ConsentDenied.into())
                };
            }

            let request = ConsentRequest {
                request_id: Uuid::new_v4().to_string(),
                tool_name: Some(tool.name.clone()),
                destination: cache_key.destination.clone(),
                data_usage: cache_key.data_usage,
                reasons,
                message: None,
                timeout_seconds: state.config.consent_timeout_seconds,
            };
            let receiver = state.consent.begin(&request, cache_key.clone());
            spawn_timeout_sweep(
                Arc::clone(&state.consent),
                request.request_id.clone(),
                cache_key,
                receiver,
                Duration::from_secs(state.config.consent_timeout_seconds),
                state.config.default_on_timeout,
            );

            let data = serde_json::json!({ "consent_request": request, "validation_details": validation_details });
            Err(DispatchError::CoreWithData(CoreError::ConsentRequired, data))
        }
        Err(err) => Err(err.into()),
    }
}

/// Waits out a consent request's deadline in the background so an
/// abandoned prompt turns into `CONSENT_TIMEOUT` on the host's next
/// attempt instead of leaving the pending entry (and the oneshot sender
/// it holds) parked forever.
fn spawn_timeout_sweep(
    consent: Arc<ConsentCoordinator>,
    request_id: String,
    cache_key: DecisionCacheKey,
    receiver: oneshot::Receiver<ConsentDecision>,
    timeout: Duration,
    default_on_timeout: ConsentDecision,
) {
    tokio::spawn(async move {
        let outcome = consent.await_decision(receiver, timeout, default_on_timeout).await;
        if outcome.timed_out() {
            consent.cancel(&request_id);
            consent.record_timeout_default(cache_key, outcome.decision(), timeout.as_secs() as i64);
            warn!(request_id, "consent request went unanswered and timed out");
        }
    });
}

#[derive(Debug, Deserialize)]
struct ProvideConsentParams {
    request_id: String,
    decision: ConsentDecision,
    #[serde(default)]
    remember: bool,
    #[serde(default)]
    duration_minutes: Option<i64>,
}

fn mcpp_provide_consent(state: &AppState, params: Option<Value>) -> Result<Value, DispatchError> {
    let params: ProvideConsentParams = params_of(params)?;
    let cache_key = state.consent.resolve(&params.request_id, params.decision)?;

    // `resolve` already granted the decision for the original request's
    // retry window, which just lets the host's re-issue of the pending
    // operation succeed without a fresh prompt. `remember` asks for the
    // grant to outlive that: re-record it with the requested (or
    // config-default) duration.
    if params.remember {
        let minutes = params.duration_minutes.unwrap_or(state.config.cache_consent_duration_minutes);
        state.consent.record(cache_key, params.decision, minutes * 60);
    }

    Ok(serde_json::json!({ "ok": true }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use super::*;
    use crate::tool_executor::EchoToolExecutor;
    use chrono::Utc;
    use mcpp_protocol::cache_entry::TableData;
    use mcpp_protocol::target::Destination;
    use mcpp_protocol::target::Target;
    use mcpp_protocol::target::TargetType;
    use mcpp_protocol::usage::DataUsage;
    use mcpp_protocol::usage::Requester;

    fn state_with(config: ServerConfig, tools: Vec<Tool>) -> AppState {
        AppState::new(config, tools, Arc::new(EchoToolExecutor))
    }

    fn context(data_usage: DataUsage, destination: &str) -> UsageContext {
        UsageContext {
            data_usage,
            requester: Requester { host_id: "host-1".to_string(), session_id: None, timestamp: Utc::now() },
            target: Target {
                target_type: TargetType::Server,
                destination: Destination::Single(destination.to_string()),
                purpose: None,
                llm_metadata: None,
            },
        }
    }

    #[tokio::test]
    async fn non_sensitive_tool_call_returns_full_payload_uncached() {
        let state = state_with(ServerConfig::default(), vec![Tool::new("echo", false)]);
        let params = serde_json::json!({"name": "echo", "arguments": {"x": 1}});
        let result = route(&state, "tools/call", Some(params)).await;
        assert!(result.is_ok());
        assert_eq!(state.cache.keys().len(), 0);
    }

    #[tokio::test]
    async fn sensitive_tool_call_caches_and_returns_summary() {
        let state = state_with(ServerConfig::default(), vec![Tool::new("export", true)]);
        let params = serde_json::json!({"name": "export", "arguments": {}, "tool_call_id": "t1"});
        let result = route(&state, "tools/call", Some(params)).await.unwrap();
        assert_eq!(result["dataRefId"], "t1");
        assert!(state.cache.has("t1"));
    }

    #[tokio::test]
    async fn unknown_tool_name_is_invalid_params() {
        let state = state_with(ServerConfig::default(), vec![]);
        let params = serde_json::json!({"name": "ghost", "arguments": {}});
        let err = route(&state, "tools/call", Some(params)).await.err().unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidParams.code());
    }

    #[test]
    fn get_data_returns_data_not_found_for_missing_call_id() {
        let state = state_with(ServerConfig::default(), vec![]);
        let params = serde_json::json!({"tool_call_id": "ghost"});
        let err = mcpp_get_data(&state, Some(params)).err().unwrap();
        assert_eq!(err.code(), ErrorCode::DataNotFound.code());
    }

    #[test]
    fn get_data_without_usage_context_skips_policy() {
        let state = state_with(ServerConfig::default(), vec![]);
        state.cache.put("t1", CachedEntry::Text { payload: "x".to_string(), metadata: EntryMetadata::new("echo", true) });
        let params = serde_json::json!({"tool_call_id": "t1"});
        let result = mcpp_get_data(&state, Some(params)).unwrap();
        assert_eq!(result["payload"], "x");
    }

    #[tokio::test]
    async fn get_data_under_prompt_permission_returns_consent_required_with_request() {
        let state = state_with(ServerConfig::default(), vec![]);
        state.cache.put("t1", CachedEntry::Text { payload: "x".to_string(), metadata: EntryMetadata::new("echo", true) });
        let ctx = context(DataUsage::Store, "s1"); // default policy: store -> prompt
        let params = serde_json::json!({"tool_call_id": "t1", "usage_context": ctx});
        let err = mcpp_get_data(&state, Some(params)).err().unwrap();
        assert_eq!(err.code(), ErrorCode::ConsentRequired.code());
        let data = err.data().unwrap();
        assert!(data["consent_request"]["request_id"].is_string());
        assert_eq!(state.consent.pending_count(), 1);
    }

    #[tokio::test]
    async fn consent_timeout_is_surfaced_on_retry_after_the_deadline_elapses() {
        let mut config = ServerConfig::default();
        config.consent_timeout_seconds = 0;
        let state = state_with(config, vec![]);
        state.cache.put("t1", CachedEntry::Text { payload: "x".to_string(), metadata: EntryMetadata::new("echo", true) });
        let ctx = context(DataUsage::Store, "s1");
        let params = serde_json::json!({"tool_call_id": "t1", "usage_context": ctx});

        let first = mcpp_get_data(&state, Some(params.clone())).err().unwrap();
        assert_eq!(first.code(), ErrorCode::ConsentRequired.code());

        // Give the background timeout sweep a chance to run.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let second = mcpp_get_data(&state, Some(params)).err().unwrap();
        assert_eq!(second.code(), ErrorCode::ConsentTimeout.code());
        assert_eq!(state.consent.pending_count(), 0);
    }

    #[test]
    fn find_reference_returns_placeholder_and_metadata() {
        let state = state_with(ServerConfig::default(), vec![]);
        let table = TableData::new(vec!["Name".to_string()], vec![vec![Value::from("Ana Silva")]]).unwrap();
        state.cache.put("t1", CachedEntry::Table { payload: table, metadata: EntryMetadata::new("search", true) });
        let params = serde_json::json!({"tool_call_id": "t1", "keyword": "ana silvaa"});
        let result = mcpp_find_reference(&state, Some(params)).unwrap();
        assert_eq!(result["placeholder"], "{t1.0.Name}");
        assert!(result["metadata"]["cells_scanned"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn resolve_placeholders_without_usage_context_skips_policy() {
        let state = state_with(ServerConfig::default(), vec![]);
        let table = TableData::new(vec!["Age".to_string()], vec![vec![Value::from(42)]]).unwrap();
        state.cache.put("t1", CachedEntry::Table { payload: table, metadata: EntryMetadata::new("lookup", true) });
        let params = serde_json::json!({"data": "{t1.0.Age}"});
        let result = mcpp_resolve_placeholders(&state, Some(params)).unwrap();
        assert_eq!(result["resolved_data"], 42);
        assert_eq!(result["resolution_status"]["resolved"], 1);
    }

    #[tokio::test]
    async fn provide_consent_resolves_pending_request() {
        let state = state_with(ServerConfig::default(), vec![]);
        state.cache.put("t1", CachedEntry::Text { payload: "x".to_string(), metadata: EntryMetadata::new("echo", true) });
        let ctx = context(DataUsage::Store, "s1");
        let params = serde_json::json!({"tool_call_id": "t1", "usage_context": ctx});
        let err = mcpp_get_data(&state, Some(params)).err().unwrap();
        let request_id = err.data().unwrap()["consent_request"]["request_id"].as_str().unwrap().to_string();

        let consent_params = serde_json::json!({"request_id": request_id, "decision": "allow"});
        let result = mcpp_provide_consent(&state, Some(consent_params)).unwrap();
        assert_eq!(result["ok"], true);
        assert_eq!(state.consent.pending_count(), 0);
    }

    #[test]
    fn provide_consent_unknown_request_id_is_an_error() {
        let state = state_with(ServerConfig::default(), vec![]);
        let params = serde_json::json!({"request_id": "ghost", "decision": "deny"});
        assert!(mcpp_provide_consent(&state, Some(params)).is_err());
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let err = DispatchError::UnknownMethod("nope".to_string());
        assert_eq!(err.code(), ErrorCode::MethodNotFound.code());
    }
}
