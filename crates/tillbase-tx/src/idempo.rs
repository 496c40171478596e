use crate::errors::TxError;
use crate::model::{Begin, IdempotencyRecord};
use async_trait::async_trait;
use serde_json::Value;
use tillbase_storage::DocRef;
use tillbase_types::prelude::{payload_hash, Actor};

/// Use the client's key verbatim when present; otherwise derive a
/// deterministic key so retries without an explicit key still collapse.
pub fn resolve_request_key(client_key: Option<&str>, actor: &Actor, payload: &Value) -> String {
    if let Some(key) = client_key {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    format!("{}:{}", actor.user, payload_hash(payload))
}

#[async_trait]
pub trait IdempoStore: Send + Sync {
    /// Atomically classify the (key, endpoint) pair and, when fresh,
    /// reserve it in-flight. Concurrent first attempts serialize here: the
    /// loser observes `Begin::InFlight` and must re-read.
    async fn begin(
        &self,
        key: &str,
        endpoint: &str,
        request_hash: &str,
        now_ms: i64,
        inflight_ttl_ms: i64,
    ) -> Result<Begin, TxError>;

    async fn complete(
        &self,
        key: &str,
        endpoint: &str,
        request_hash: &str,
        response: Value,
        reference: Option<DocRef>,
    ) -> Result<(), TxError>;

    async fn fail(
        &self,
        key: &str,
        endpoint: &str,
        request_hash: &str,
        error_message: &str,
    ) -> Result<(), TxError>;

    async fn load(
        &self,
        key: &str,
        endpoint: &str,
    ) -> Result<Option<IdempotencyRecord>, TxError>;

    /// Delete every record with `expires_at < now`. Safe to run concurrently
    /// with reads and writes; returns the purge count.
    async fn sweep(&self, now_ms: i64) -> Result<u64, TxError>;
}
