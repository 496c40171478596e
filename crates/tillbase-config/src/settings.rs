use serde::{Deserialize, Serialize};

/// Effective runtime settings consumed by the sync planner, the alert
/// engine, and the mutation path. Loaded once at startup and swapped as a
/// whole on update; never read from ambient process state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "Settings::default_enable_api")]
    pub enable_api: bool,
    #[serde(default = "Settings::default_sync_page_size")]
    pub default_sync_page_size: u32,
    #[serde(default = "Settings::default_bootstrap_invoice_days")]
    pub bootstrap_invoice_days: i64,
    #[serde(default = "Settings::default_recent_paid_invoice_days")]
    pub recent_paid_invoice_days: i64,
    #[serde(default = "Settings::default_payment_entry_days")]
    pub payment_entry_days: i64,
    #[serde(default = "Settings::default_enable_inventory_alerts")]
    pub enable_inventory_alerts: bool,
    #[serde(default = "Settings::default_inventory_alert_limit")]
    pub inventory_alert_default_limit: usize,
    #[serde(default = "Settings::default_inventory_alert_critical_ratio")]
    pub inventory_alert_critical_ratio: f64,
    #[serde(default = "Settings::default_inventory_alert_low_ratio")]
    pub inventory_alert_low_ratio: f64,
    #[serde(default)]
    pub inventory_alert_rules: Vec<AlertRuleConfig>,
    #[serde(default = "Settings::default_idempotency_retention_days")]
    pub idempotency_retention_days: i64,
    #[serde(default = "Settings::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Settings {
    fn default_enable_api() -> bool {
        true
    }

    fn default_sync_page_size() -> u32 {
        50
    }

    fn default_bootstrap_invoice_days() -> i64 {
        90
    }

    fn default_recent_paid_invoice_days() -> i64 {
        7
    }

    fn default_payment_entry_days() -> i64 {
        30
    }

    fn default_enable_inventory_alerts() -> bool {
        true
    }

    fn default_inventory_alert_limit() -> usize {
        20
    }

    fn default_inventory_alert_critical_ratio() -> f64 {
        0.35
    }

    fn default_inventory_alert_low_ratio() -> f64 {
        1.0
    }

    fn default_idempotency_retention_days() -> i64 {
        2
    }

    fn default_sweep_interval_secs() -> u64 {
        3600
    }

    pub fn idempotency_retention_ms(&self) -> i64 {
        self.idempotency_retention_days.max(0) * 24 * 60 * 60 * 1000
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enable_api: Self::default_enable_api(),
            default_sync_page_size: Self::default_sync_page_size(),
            bootstrap_invoice_days: Self::default_bootstrap_invoice_days(),
            recent_paid_invoice_days: Self::default_recent_paid_invoice_days(),
            payment_entry_days: Self::default_payment_entry_days(),
            enable_inventory_alerts: Self::default_enable_inventory_alerts(),
            inventory_alert_default_limit: Self::default_inventory_alert_limit(),
            inventory_alert_critical_ratio: Self::default_inventory_alert_critical_ratio(),
            inventory_alert_low_ratio: Self::default_inventory_alert_low_ratio(),
            inventory_alert_rules: Vec::new(),
            idempotency_retention_days: Self::default_idempotency_retention_days(),
            sweep_interval_secs: Self::default_sweep_interval_secs(),
        }
    }
}

/// One inventory alert rule as authored in configuration. Ratio and
/// priority clamps happen when the rule is compiled, at write time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertRuleConfig {
    #[serde(default = "AlertRuleConfig::default_enabled")]
    pub enabled: bool,
    /// Empty or "*" applies the rule to every warehouse.
    #[serde(default)]
    pub warehouse: String,
    /// Empty or "*" applies the rule to every item group.
    #[serde(default)]
    pub item_group: String,
    #[serde(default = "AlertRuleConfig::default_critical_ratio")]
    pub critical_ratio: f64,
    #[serde(default = "AlertRuleConfig::default_low_ratio")]
    pub low_ratio: f64,
    #[serde(default = "AlertRuleConfig::default_priority")]
    pub priority: i64,
}

impl AlertRuleConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_critical_ratio() -> f64 {
        0.35
    }

    fn default_low_ratio() -> f64 {
        1.0
    }

    fn default_priority() -> i64 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.default_sync_page_size, 50);
        assert_eq!(settings.bootstrap_invoice_days, 90);
        assert_eq!(settings.recent_paid_invoice_days, 7);
        assert_eq!(settings.inventory_alert_default_limit, 20);
        assert_eq!(settings.idempotency_retention_ms(), 2 * 24 * 3_600_000);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let settings: Settings =
            serde_json::from_value(serde_json::json!({"default_sync_page_size": 100})).unwrap();
        assert_eq!(settings.default_sync_page_size, 100);
        assert!(settings.enable_inventory_alerts);
    }
}
