#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use mcpp_protocol::consent::ConsentDecision;
use mcpp_protocol::consent::ConsentRequest;
use mcpp_protocol::consent::DecisionCacheKey;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::warn;

use crate::error::CoreError;
use crate::error::Result;

struct CachedDecision {
    decision: ConsentDecision,
    expires_at: DateTime<Utc>,
    via_timeout: bool,
}

/// A cached consent outcome, along with whether it came from a real human
/// decision or from `default_on_timeout` after a prompt went unanswered.
/// The distinction matters on the wire: a remembered `deny` reports
/// `CONSENT_DENIED`, but a lapsed prompt reports `CONSENT_TIMEOUT` even if
/// the default happened to resolve to `deny` too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedConsent {
    pub decision: ConsentDecision,
    pub via_timeout: bool,
}

/// Coordinates user consent prompts: tracks in-flight requests as
/// one-shot awaitables (mirroring how a long-running session tracks
/// pending command approvals) and caches resolved decisions so the same
/// host/destination/usage/tool combination isn't re-prompted on every
/// call.
pub struct ConsentCoordinator {
    pending: Mutex<HashMap<String, PendingConsent>>,
    decisions: Mutex<HashMap<String, CachedDecision>>,
}

struct PendingConsent {
    sender: oneshot::Sender<ConsentDecision>,
    cache_key: DecisionCacheKey,
    /// How long a bare (non-`remember`) decision should suppress
    /// reprompting for, so the host's expected retry of the original
    /// operation succeeds without needing `remember`. Taken from the
    /// request's own `timeout_seconds`, since that is the window the host
    /// was told to answer within.
    retry_grant_seconds: i64,
}

impl ConsentCoordinator {
    pub fn new() -> Self {
        Self { pending: Mutex::new(HashMap::new()), decisions: Mutex::new(HashMap::new()) }
    }

    /// Returns a cached decision for `key` if one is on file and not
    /// expired; evicts it if expired.
    pub fn lookup_cached(&self, key: &DecisionCacheKey) -> Option<CachedConsent> {
        let canonical = key.canonical();
        let mut decisions = self.decisions.lock().expect("decision cache lock poisoned");
        match decisions.get(&canonical) {
            Some(cached) if cached.expires_at > Utc::now() => {
                Some(CachedConsent { decision: cached.decision, via_timeout: cached.via_timeout })
            }
            Some(_) => {
                decisions.remove(&canonical);
                None
            }
            None => None,
        }
    }

    /// Registers a new pending consent request, returning the receiving
    /// half of the one-shot channel the caller should await.
    pub fn begin(&self, request: &ConsentRequest, cache_key: DecisionCacheKey) -> oneshot::Receiver<ConsentDecision> {
        let (sender, receiver) = oneshot::channel();
        let mut pending = self.pending.lock().expect("pending consent lock poisoned");
        pending.insert(
            request.request_id.clone(),
            PendingConsent { sender, cache_key, retry_grant_seconds: request.timeout_seconds as i64 },
        );
        receiver
    }

    /// Resolves a pending request by id, waking whoever is awaiting the
    /// matching receiver. Returns the cache key the decision was made
    /// under, so a caller that wants to remember the grant (`remember=true`)
    /// doesn't have to re-derive it.
    ///
    /// The decision is granted in the cache only for `retry_grant_seconds`
    /// — long enough for the host to re-issue the original operation, not
    /// an indefinite memoization. `remember=true` is what extends it, via a
    /// separate `record` call on the returned key.
    pub fn resolve(&self, request_id: &str, decision: ConsentDecision) -> Result<DecisionCacheKey> {
        let pending_entry = {
            let mut pending = self.pending.lock().expect("pending consent lock poisoned");
            pending.remove(request_id)
        };
        let entry = pending_entry.ok_or_else(|| {
            warn!(request_id, "consent decision for unknown or already-settled request");
            CoreError::InvalidParams(format!("no pending consent request '{request_id}'"))
        })?;

        debug!(request_id, decision = ?decision, "consent decision received");
        self.record(entry.cache_key.clone(), decision, entry.retry_grant_seconds);

        // A dropped receiver (the original caller already timed out) is not
        // an error here; the decision is still on file for the retry.
        let _ = entry.sender.send(decision);
        Ok(entry.cache_key)
    }

    /// Directly records a human decision in the cache, bypassing the
    /// pending table. Used both by `resolve`'s retry grant and by
    /// `remember=true` extending that grant to a longer duration.
    pub fn record(&self, key: DecisionCacheKey, decision: ConsentDecision, ttl_seconds: i64) {
        let mut decisions = self.decisions.lock().expect("decision cache lock poisoned");
        decisions.insert(
            key.canonical(),
            CachedDecision { decision, expires_at: Utc::now() + chrono::Duration::seconds(ttl_seconds), via_timeout: false },
        );
    }

    /// Records `default_on_timeout` as the outcome of a lapsed prompt, so
    /// the host's next attempt sees `CONSENT_TIMEOUT` instead of a fresh
    /// prompt for the window given by `ttl_seconds`.
    pub fn record_timeout_default(&self, key: DecisionCacheKey, decision: ConsentDecision, ttl_seconds: i64) {
        let mut decisions = self.decisions.lock().expect("decision cache lock poisoned");
        decisions.insert(
            key.canonical(),
            CachedDecision { decision, expires_at: Utc::now() + chrono::Duration::seconds(ttl_seconds), via_timeout: true },
        );
    }

    pub fn clear_cache(&self) {
        self.decisions.lock().expect("decision cache lock poisoned").clear();
    }

    /// Awaits a pending decision, falling back to `default_on_timeout` if
    /// the host never answers within `timeout`. A dropped sender (the
    /// coordinator being torn down) also falls back to the default. The
    /// caller tells the two outcomes apart via `AwaitOutcome::timed_out` to
    /// decide whether to report `CONSENT_TIMEOUT` instead of a plain
    /// decision.
    pub async fn await_decision(
        &self,
        receiver: oneshot::Receiver<ConsentDecision>,
        timeout: Duration,
        default_on_timeout: ConsentDecision,
    ) -> AwaitOutcome {
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(decision)) => AwaitOutcome::Decided(decision),
            Ok(Err(_)) | Err(_) => {
                debug!(?default_on_timeout, "consent wait timed out, applying default");
                AwaitOutcome::TimedOut(default_on_timeout)
            }
        }
    }

    /// Removes a pending request without resolving it. Used once an
    /// awaiter gives up on a deadline: a decision that lands afterward has
    /// no pending entry to land in and is rejected by `resolve`'s
    /// not-found error, matching the cancellation contract where a late
    /// decision on an abandoned wait is silently discarded.
    pub fn cancel(&self, request_id: &str) {
        self.pending.lock().expect("pending consent lock poisoned").remove(request_id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("pending consent lock poisoned").len()
    }
}

/// Outcome of `await_decision`: either the host answered before the
/// deadline, or the wait timed out and `default_on_timeout` was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitOutcome {
    Decided(ConsentDecision),
    TimedOut(ConsentDecision),
}

impl AwaitOutcome {
    pub fn decision(self) -> ConsentDecision {
        match self {
            AwaitOutcome::Decided(decision) | AwaitOutcome::TimedOut(decision) => decision,
        }
    }

    pub fn timed_out(self) -> bool {
        matches!(self, AwaitOutcome::TimedOut(_))
    }
}

impl Default for ConsentCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
