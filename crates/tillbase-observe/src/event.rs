use serde::{Deserialize, Serialize};
use serde_json::Value;
use tillbase_types::prelude::{Actor, Timestamp};

pub const ACTIVITY_DOCTYPE: &str = "Activity Log";
pub const SUBJECT_PREFIX: &str = "[Tillbase]";

/// Cashier-visible activity emitted after successful mutations. Best
/// effort side channel; recording failures never reach the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub event_type: String,
    pub action: String,
    pub reference_doctype: String,
    pub reference_name: String,
    pub actor: String,
    #[serde(default)]
    pub actor_full_name: String,
    #[serde(default)]
    pub message: Option<String>,
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
    pub occurred_at: Timestamp,
    #[serde(default)]
    pub payload: Value,
}

impl ActivityEvent {
    pub fn new(event_type: &str, action: &str, reference_doctype: &str, reference_name: &str, actor: &Actor) -> Self {
        ActivityEvent {
            event_type: event_type.to_string(),
            action: action.to_string(),
            reference_doctype: reference_doctype.to_string(),
            reference_name: reference_name.to_string(),
            actor: actor.user.0.clone(),
            actor_full_name: actor.display_name().to_string(),
            message: None,
            company: None,
            profile: None,
            warehouse: None,
            territory: None,
            route: None,
            occurred_at: Timestamp::now(),
            payload: Value::Null,
        }
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_company(mut self, company: Option<String>) -> Self {
        self.company = company;
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Short human subject line, capped the way timeline UIs expect.
    pub fn subject(&self) -> String {
        let mut base = format!("{SUBJECT_PREFIX} {} {}", self.event_type, self.action)
            .trim()
            .to_string();
        if !self.reference_name.is_empty() {
            base = format!("{base}: {}", self.reference_name);
        }
        base.chars().take(140).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_carries_prefix_and_reference() {
        let event = ActivityEvent::new(
            "Sales Invoice",
            "created",
            "Sales Invoice",
            "SI-00001",
            &Actor::named("cashier@x"),
        );
        assert_eq!(event.subject(), "[Tillbase] Sales Invoice created: SI-00001");
    }

    #[test]
    fn subject_is_capped_at_140_chars() {
        let mut event = ActivityEvent::new("X", "y", "X", "Z", &Actor::named("u"));
        event.reference_name = "N".repeat(300);
        assert_eq!(event.subject().chars().count(), 140);
    }
}
