use crate::event::{ActivityEvent, ACTIVITY_DOCTYPE};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tillbase_storage::DocumentStore;

/// Fire-and-forget event emission. Implementations own their error
/// boundary: `record` cannot fail from the caller's perspective.
#[async_trait]
pub trait ActivityRecorder: Send + Sync {
    async fn record(&self, event: ActivityEvent);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullRecorder;

#[async_trait]
impl ActivityRecorder for NullRecorder {
    async fn record(&self, _event: ActivityEvent) {}
}

/// Persists activity into the document store's activity table. Failures
/// are reported to the observability sink and swallowed.
#[derive(Clone)]
pub struct StoreActivityRecorder {
    store: Arc<dyn DocumentStore>,
}

impl StoreActivityRecorder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        StoreActivityRecorder { store }
    }

    fn doc_fields(event: &ActivityEvent) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("subject".into(), json!(event.subject()));
        fields.insert(
            "content".into(),
            json!(serde_json::to_string(event).unwrap_or_else(|_| "{}".into())),
        );
        fields.insert("event_type".into(), json!(event.event_type));
        fields.insert("reference_doctype".into(), json!(event.reference_doctype));
        fields.insert("reference_name".into(), json!(event.reference_name));
        fields.insert("user".into(), json!(event.actor));
        fields.insert("full_name".into(), json!(event.actor_full_name));
        fields.insert("occurred_at".into(), json!(event.occurred_at.0));
        fields
    }
}

#[async_trait]
impl ActivityRecorder for StoreActivityRecorder {
    async fn record(&self, event: ActivityEvent) {
        if event.reference_name.trim().is_empty() {
            return;
        }
        let actor = event.actor.clone();
        if let Err(err) = self
            .store
            .insert(ACTIVITY_DOCTYPE, Self::doc_fields(&event), &actor)
            .await
        {
            tracing::warn!(
                target: "tillbase::observe",
                actor,
                "activity record dropped: {err:?}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillbase_storage::prelude::*;
    use tillbase_types::prelude::Actor;

    #[tokio::test]
    async fn record_persists_subject_and_content() {
        let store = Arc::new(MemoryDocumentStore::new());
        let recorder = StoreActivityRecorder::new(store.clone());
        let event = ActivityEvent::new(
            "Sales Invoice",
            "created",
            "Sales Invoice",
            "SI-00001",
            &Actor::named("cashier@x"),
        );
        recorder.record(event).await;

        let listing = store
            .list(ACTIVITY_DOCTYPE, QueryParams::default())
            .await
            .unwrap();
        assert_eq!(listing.total, 1);
        let doc = &listing.docs[0];
        assert!(doc.field_str("subject").unwrap().starts_with("[Tillbase]"));
        let content: ActivityEvent =
            serde_json::from_str(doc.field_str("content").unwrap()).unwrap();
        assert_eq!(content.reference_name, "SI-00001");
    }

    #[tokio::test]
    async fn blank_reference_is_silently_dropped() {
        let store = Arc::new(MemoryDocumentStore::new());
        let recorder = StoreActivityRecorder::new(store.clone());
        let event = ActivityEvent::new("X", "y", "X", "  ", &Actor::named("u"));
        recorder.record(event).await;
        let listing = store
            .list(ACTIVITY_DOCTYPE, QueryParams::default())
            .await
            .unwrap();
        assert_eq!(listing.total, 0);
    }
}
