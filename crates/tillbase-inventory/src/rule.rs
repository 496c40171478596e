use serde::{Deserialize, Serialize};
use tillbase_config::AlertRuleConfig;
use tillbase_types::prelude::WarehouseId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleScope {
    Any,
    Exact(String),
}

impl RuleScope {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            RuleScope::Any
        } else {
            RuleScope::Exact(trimmed.to_string())
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            RuleScope::Any => true,
            RuleScope::Exact(value) => value == candidate,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, RuleScope::Exact(_))
    }
}

/// Compiled alert rule. The ratio and priority clamps are applied here, at
/// write time; evaluation trusts the invariants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub warehouse: RuleScope,
    pub item_group: RuleScope,
    pub critical_ratio: f64,
    pub low_ratio: f64,
    pub priority: i64,
}

impl AlertRule {
    pub fn new(
        warehouse: RuleScope,
        item_group: RuleScope,
        critical_ratio: f64,
        low_ratio: f64,
        priority: i64,
    ) -> Self {
        let critical_ratio = critical_ratio.max(0.0);
        let low_ratio = low_ratio.max(critical_ratio);
        AlertRule {
            warehouse,
            item_group,
            critical_ratio,
            low_ratio,
            priority: priority.max(0),
        }
    }

    pub fn from_config(config: &AlertRuleConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(AlertRule::new(
            RuleScope::parse(&config.warehouse),
            RuleScope::parse(&config.item_group),
            config.critical_ratio,
            config.low_ratio,
            config.priority,
        ))
    }

    pub fn applies_to(&self, warehouse: &WarehouseId, item_group: &str) -> bool {
        self.warehouse.matches(&warehouse.0) && self.item_group.matches(item_group)
    }

    /// Sort key: ascending priority, specific item group before wildcard at
    /// equal priority, then group name for determinism.
    pub fn sort_key(&self) -> (i64, u8, String) {
        let specificity = if self.item_group.is_exact() { 0 } else { 1 };
        let group = match &self.item_group {
            RuleScope::Exact(name) => name.clone(),
            RuleScope::Any => String::new(),
        };
        (self.priority, specificity, group)
    }
}

/// Fallback thresholds when no rule matches, plus the result cap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertDefaults {
    pub critical_ratio: f64,
    pub low_ratio: f64,
    pub limit: usize,
}

impl AlertDefaults {
    pub fn new(critical_ratio: f64, low_ratio: f64, limit: usize) -> Self {
        let critical_ratio = critical_ratio.max(0.0);
        AlertDefaults {
            critical_ratio,
            low_ratio: low_ratio.max(critical_ratio),
            limit,
        }
    }
}

impl Default for AlertDefaults {
    fn default() -> Self {
        AlertDefaults::new(0.35, 1.0, 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_clamp_at_construction() {
        let rule = AlertRule::new(RuleScope::Any, RuleScope::Any, -0.5, 0.1, -3);
        assert_eq!(rule.critical_ratio, 0.0);
        assert_eq!(rule.low_ratio, 0.1);
        assert_eq!(rule.priority, 0);

        let inverted = AlertRule::new(RuleScope::Any, RuleScope::Any, 0.8, 0.2, 1);
        assert_eq!(inverted.low_ratio, 0.8, "low clamps up to critical");
    }

    #[test]
    fn scope_parse_treats_star_and_empty_as_any() {
        assert_eq!(RuleScope::parse(""), RuleScope::Any);
        assert_eq!(RuleScope::parse(" * "), RuleScope::Any);
        assert_eq!(RuleScope::parse("WH-1"), RuleScope::Exact("WH-1".into()));
    }

    #[test]
    fn disabled_config_rows_compile_to_nothing() {
        let config = AlertRuleConfig {
            enabled: false,
            warehouse: String::new(),
            item_group: String::new(),
            critical_ratio: 0.2,
            low_ratio: 0.5,
            priority: 1,
        };
        assert!(AlertRule::from_config(&config).is_none());
    }
}
