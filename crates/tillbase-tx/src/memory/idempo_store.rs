use crate::errors::TxError;
use crate::idempo::IdempoStore;
use crate::model::{Begin, IdempotencyRecord, RecordStatus};
use crate::util::now_ms;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tillbase_storage::DocRef;

/// Reference in-memory idempotency store. The map mutation under one write
/// lock is the moral equivalent of the unique (request_key, endpoint)
/// constraint a persistent backend would rely on.
#[derive(Clone)]
pub struct InMemoryIdempoStore {
    inner: Arc<RwLock<HashMap<(String, String), IdempotencyRecord>>>,
    retention_ms: i64,
}

impl InMemoryIdempoStore {
    pub fn new(retention_ms: i64) -> Self {
        InMemoryIdempoStore {
            inner: Arc::new(RwLock::new(HashMap::new())),
            retention_ms,
        }
    }

    fn key(key: &str, endpoint: &str) -> (String, String) {
        (key.to_string(), endpoint.to_string())
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl Default for InMemoryIdempoStore {
    fn default() -> Self {
        // 2-day retention unless configured otherwise.
        Self::new(2 * 24 * 3_600_000)
    }
}

#[async_trait]
impl IdempoStore for InMemoryIdempoStore {
    async fn begin(
        &self,
        key: &str,
        endpoint: &str,
        request_hash: &str,
        now_ms: i64,
        inflight_ttl_ms: i64,
    ) -> Result<Begin, TxError> {
        let mut guard = self.inner.write();
        let id = Self::key(key, endpoint);

        if let Some(existing) = guard.get(&id) {
            let expired_inflight =
                existing.status == RecordStatus::InFlight && existing.expires_at <= now_ms;
            if !expired_inflight {
                if existing.request_hash != request_hash {
                    return Ok(Begin::Conflict);
                }
                return Ok(match &existing.status {
                    RecordStatus::Completed => {
                        Begin::Replay(existing.response.clone().unwrap_or(Value::Null))
                    }
                    RecordStatus::Failed => Begin::PriorFailure(
                        existing.error_message.clone().unwrap_or_default(),
                    ),
                    RecordStatus::InFlight => Begin::InFlight,
                });
            }
            // Abandoned reservation: the previous attempt died without
            // resolving; take over.
        }

        guard.insert(
            id,
            IdempotencyRecord {
                request_key: key.to_string(),
                endpoint: endpoint.to_string(),
                request_hash: request_hash.to_string(),
                status: RecordStatus::InFlight,
                response: None,
                reference: None,
                error_message: None,
                created_at: now_ms,
                expires_at: now_ms + inflight_ttl_ms,
            },
        );
        Ok(Begin::Fresh)
    }

    async fn complete(
        &self,
        key: &str,
        endpoint: &str,
        request_hash: &str,
        response: Value,
        reference: Option<DocRef>,
    ) -> Result<(), TxError> {
        let now = now_ms();
        let mut guard = self.inner.write();
        let record = guard
            .entry(Self::key(key, endpoint))
            .or_insert_with(|| IdempotencyRecord {
                request_key: key.to_string(),
                endpoint: endpoint.to_string(),
                request_hash: request_hash.to_string(),
                status: RecordStatus::InFlight,
                response: None,
                reference: None,
                error_message: None,
                created_at: now,
                expires_at: now,
            });
        record.status = RecordStatus::Completed;
        record.request_hash = request_hash.to_string();
        record.response = Some(response);
        record.reference = reference;
        record.error_message = None;
        record.expires_at = now + self.retention_ms;
        Ok(())
    }

    async fn fail(
        &self,
        key: &str,
        endpoint: &str,
        request_hash: &str,
        error_message: &str,
    ) -> Result<(), TxError> {
        let now = now_ms();
        let mut guard = self.inner.write();
        let record = guard
            .entry(Self::key(key, endpoint))
            .or_insert_with(|| IdempotencyRecord {
                request_key: key.to_string(),
                endpoint: endpoint.to_string(),
                request_hash: request_hash.to_string(),
                status: RecordStatus::InFlight,
                response: None,
                reference: None,
                error_message: None,
                created_at: now,
                expires_at: now,
            });
        record.status = RecordStatus::Failed;
        record.request_hash = request_hash.to_string();
        record.error_message = Some(error_message.to_string());
        record.expires_at = now + self.retention_ms;
        Ok(())
    }

    async fn load(
        &self,
        key: &str,
        endpoint: &str,
    ) -> Result<Option<IdempotencyRecord>, TxError> {
        let guard = self.inner.read();
        Ok(guard.get(&Self::key(key, endpoint)).cloned())
    }

    async fn sweep(&self, now_ms: i64) -> Result<u64, TxError> {
        let mut guard = self.inner.write();
        let before = guard.len();
        guard.retain(|_, record| record.expires_at >= now_ms);
        Ok((before - guard.len()) as u64)
    }
}
