use crate::errors::StorageError;
use crate::model::Document;
use crate::query::{Listing, QueryParams};
use crate::spi::capabilities::SchemaCapabilities;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Narrow collaborator interface over the authoritative document store.
/// Insert/save/submit/cancel raise typed errors; the engine never sees the
/// store's internals.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, doctype: &str, name: &str) -> Result<Document, StorageError>;

    async fn list(&self, doctype: &str, params: QueryParams) -> Result<Listing, StorageError>;

    /// Insert a draft document; the store assigns the name when the payload
    /// carries none.
    async fn insert(
        &self,
        doctype: &str,
        fields: Map<String, Value>,
        owner: &str,
    ) -> Result<Document, StorageError>;

    /// Merge a field patch into an existing document.
    async fn save(
        &self,
        doctype: &str,
        name: &str,
        patch: Map<String, Value>,
    ) -> Result<Document, StorageError>;

    async fn submit(&self, doctype: &str, name: &str) -> Result<Document, StorageError>;

    async fn cancel(&self, doctype: &str, name: &str) -> Result<Document, StorageError>;

    async fn exists(&self, doctype: &str, name: &str) -> Result<bool, StorageError> {
        match self.get(doctype, name).await {
            Ok(_) => Ok(true),
            Err(err) if err.code() == "NOT_FOUND" => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Schema capability descriptor, resolved once at startup and injected
    /// into consumers; never re-queried per call.
    async fn capabilities(&self) -> Result<SchemaCapabilities, StorageError>;
}
