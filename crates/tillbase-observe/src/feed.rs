use crate::event::{ActivityEvent, ACTIVITY_DOCTYPE, SUBJECT_PREFIX};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tillbase_storage::prelude::*;
use tillbase_types::prelude::{Actor, Timestamp};

pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;
pub const MAX_ACTIVITY_LIMIT: usize = 200;

#[derive(Clone, Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    pub modified_since: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default = "ActivityQuery::default_only_other_cashiers")]
    pub only_other_cashiers: bool,
    #[serde(default)]
    pub event_types: Vec<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub territory: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
}

impl ActivityQuery {
    fn default_only_other_cashiers() -> bool {
        true
    }
}

impl Default for ActivityQuery {
    fn default() -> Self {
        ActivityQuery {
            modified_since: None,
            limit: None,
            offset: None,
            only_other_cashiers: true,
            event_types: Vec::new(),
            company: None,
            profile: None,
            warehouse: None,
            territory: None,
            route: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ActivityItem {
    pub name: String,
    pub event_type: String,
    pub action: Option<String>,
    pub title: String,
    pub message: String,
    pub actor: String,
    pub actor_full_name: String,
    pub is_other_cashier: bool,
    pub reference_doctype: String,
    pub reference_name: String,
    pub company: Option<String>,
    pub profile: Option<String>,
    pub warehouse: Option<String>,
    pub territory: Option<String>,
    pub route: Option<String>,
    pub occurred_at: Timestamp,
    pub payload: Value,
}

/// Reads the cashier activity feed with post-filtering over stored rows.
/// Total scan work is bounded by an explicit ceiling independent of the
/// requested page size.
#[derive(Clone)]
pub struct ActivityFeed {
    store: Arc<dyn DocumentStore>,
}

impl ActivityFeed {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        ActivityFeed { store }
    }

    pub async fn list(
        &self,
        actor: &Actor,
        query: &ActivityQuery,
    ) -> Result<Vec<ActivityItem>, StorageError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
            .clamp(1, MAX_ACTIVITY_LIMIT);
        let chunk_size = MAX_ACTIVITY_LIMIT.min((limit * 2).max(50));
        let max_scan = MAX_ACTIVITY_LIMIT * 10;
        let current_user = actor.user.0.clone();
        let allowed_types: Vec<String> = query
            .event_types
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let mut params = QueryParams::default()
            .filter("subject", Filter::Like(format!("{SUBJECT_PREFIX}%")))
            .order(OrderBy::desc("occurred_at"));
        if let Some(since) = query.modified_since {
            params = params.filter("modified", Filter::Gte(Value::Number(since.into())));
        }
        if query.only_other_cashiers && !actor.is_guest() {
            params = params.filter("user", Filter::Ne(Value::String(current_user.clone())));
        }

        let mut start = query.offset.unwrap_or(0);
        let mut scanned = 0usize;
        let mut result: Vec<ActivityItem> = Vec::new();

        while result.len() < limit && scanned < max_scan {
            let listing = self
                .store
                .list(
                    ACTIVITY_DOCTYPE,
                    params.clone().page(start, Some(chunk_size as u32)),
                )
                .await?;
            if listing.docs.is_empty() {
                break;
            }
            start += listing.docs.len() as u64;
            scanned += listing.docs.len();

            for doc in listing.docs {
                let item = normalize_row(&doc, &current_user);
                if !allowed_types.is_empty()
                    && !allowed_types.contains(&item.event_type.trim().to_lowercase())
                {
                    continue;
                }
                if !matches_context(&item, query) {
                    continue;
                }
                result.push(item);
                if result.len() >= limit {
                    break;
                }
            }
        }

        Ok(result)
    }
}

fn normalize_row(doc: &Document, current_user: &str) -> ActivityItem {
    let content: Option<ActivityEvent> = doc
        .field_str("content")
        .and_then(|raw| serde_json::from_str(raw).ok());
    let actor = doc
        .field_str("user")
        .map(str::to_string)
        .or_else(|| content.as_ref().map(|c| c.actor.clone()))
        .unwrap_or_default();
    let actor_full_name = doc
        .field_str("full_name")
        .map(str::to_string)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| actor.clone());
    let subject = doc.field_str("subject").unwrap_or_default().to_string();

    ActivityItem {
        name: doc.name.clone(),
        event_type: content
            .as_ref()
            .map(|c| c.event_type.clone())
            .or_else(|| doc.field_str("event_type").map(str::to_string))
            .unwrap_or_default(),
        action: content
            .as_ref()
            .map(|c| c.action.clone())
            .filter(|a| !a.is_empty()),
        title: subject.clone(),
        message: content
            .as_ref()
            .and_then(|c| c.message.clone())
            .unwrap_or(subject),
        is_other_cashier: !actor.is_empty() && actor != current_user,
        reference_doctype: doc
            .field_str("reference_doctype")
            .unwrap_or_default()
            .to_string(),
        reference_name: doc
            .field_str("reference_name")
            .unwrap_or_default()
            .to_string(),
        company: content.as_ref().and_then(|c| c.company.clone()),
        profile: content.as_ref().and_then(|c| c.profile.clone()),
        warehouse: content.as_ref().and_then(|c| c.warehouse.clone()),
        territory: content.as_ref().and_then(|c| c.territory.clone()),
        route: content.as_ref().and_then(|c| c.route.clone()),
        occurred_at: content
            .as_ref()
            .map(|c| c.occurred_at)
            .unwrap_or(doc.modified),
        payload: content.map(|c| c.payload).unwrap_or(Value::Null),
        actor,
        actor_full_name,
    }
}

fn matches_context(item: &ActivityItem, query: &ActivityQuery) -> bool {
    let pairs = [
        (&query.company, &item.company),
        (&query.profile, &item.profile),
        (&query.warehouse, &item.warehouse),
        (&query.territory, &item.territory),
        (&query.route, &item.route),
    ];
    for (expected, actual) in pairs {
        let Some(expected) = expected.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        // Rows without the field pass; a differing value excludes the row.
        if let Some(actual) = actual.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !actual.eq_ignore_ascii_case(expected) {
                return false;
            }
        }
    }
    true
}
