use serde::{Deserialize, Serialize};
use serde_json::Value;
use tillbase_storage::DocRef;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    InFlight,
    Completed,
    Failed,
}

/// Persisted outcome of one logical client operation. At most one record
/// exists per (request_key, endpoint).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub request_key: String,
    pub endpoint: String,
    pub request_hash: String,
    pub status: RecordStatus,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub reference: Option<DocRef>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
}

/// What `begin` observed for a (request_key, endpoint) pair.
#[derive(Clone, Debug, PartialEq)]
pub enum Begin {
    /// No usable record existed; an in-flight reservation is now held.
    Fresh,
    /// A completed record with the same payload hash; return it unchanged.
    Replay(Value),
    /// A record with a different payload hash: conflicting key reuse.
    Conflict,
    /// A failed record with the same payload hash; the failure is terminal.
    PriorFailure(String),
    /// Another attempt holds the reservation; re-read after it resolves.
    InFlight,
}
