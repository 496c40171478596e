use crate::model::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Filter operators understood by the storage layer. Meta columns (`name`,
/// `modified`, `docstatus`, `owner`) are addressable like payload fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Gte(Value),
    Lte(Value),
    Like(String),
}

impl Filter {
    fn matches(&self, candidate: Option<&Value>) -> bool {
        match self {
            Filter::Eq(expected) => candidate.map(|v| loose_eq(v, expected)).unwrap_or(false),
            Filter::Ne(expected) => !candidate.map(|v| loose_eq(v, expected)).unwrap_or(false),
            Filter::In(options) => candidate
                .map(|v| options.iter().any(|o| loose_eq(v, o)))
                .unwrap_or(false),
            Filter::Gte(bound) => candidate.map(|v| loose_cmp(v, bound) >= 0).unwrap_or(false),
            Filter::Lte(bound) => candidate.map(|v| loose_cmp(v, bound) <= 0).unwrap_or(false),
            Filter::Like(prefix) => candidate
                .and_then(Value::as_str)
                .map(|s| {
                    let pattern = prefix.trim_end_matches('%');
                    s.starts_with(pattern)
                })
                .unwrap_or(false),
        }
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn loose_cmp(a: &Value, b: &Value) -> i8 {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return if x < y {
            -1
        } else if x > y {
            1
        } else {
            0
        };
    }
    let x = a.as_str().unwrap_or_default();
    let y = b.as_str().unwrap_or_default();
    match x.cmp(y) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            descending: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub filters: BTreeMap<String, Filter>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub offset: u64,
    /// `None` fetches everything past the offset.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl QueryParams {
    pub fn filter(mut self, field: &str, filter: Filter) -> Self {
        self.filters.insert(field.to_string(), filter);
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn page(mut self, offset: u64, limit: Option<u32>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let row = doc.to_row_value();
        self.filters
            .iter()
            .all(|(field, filter)| filter.matches(row.get(field)))
    }
}

/// One page of documents plus the total match count before pagination.
#[derive(Clone, Debug, PartialEq)]
pub struct Listing {
    pub docs: Vec<Document>,
    pub total: u64,
}

impl Listing {
    pub fn has_more(&self, offset: u64, limit: Option<u32>) -> bool {
        match limit {
            Some(limit) => offset + u64::from(limit) < self.total,
            None => false,
        }
    }
}
