use crate::model::{Alert, AlertStatus, ReorderLevels, SnapshotRow};
use crate::rule::{AlertDefaults, AlertRule, RuleScope};
use tillbase_types::prelude::WarehouseId;

/// Evaluates stock-health alerts for one warehouse against the compiled
/// rule set. Rules are read-only at evaluation time.
pub struct AlertEngine {
    warehouse_rules: Vec<AlertRule>,
    wildcard_rules: Vec<AlertRule>,
    defaults: AlertDefaults,
}

impl AlertEngine {
    pub fn new(mut rules: Vec<AlertRule>, defaults: AlertDefaults) -> Self {
        rules.sort_by_key(AlertRule::sort_key);
        let (warehouse_rules, wildcard_rules) = rules
            .into_iter()
            .partition(|rule| rule.warehouse.is_exact());
        AlertEngine {
            warehouse_rules,
            wildcard_rules,
            defaults,
        }
    }

    /// First matching rule wins: warehouse-scoped candidates before global
    /// wildcards, each pre-sorted by (priority, specific-group-first).
    fn select_rule(&self, warehouse: &WarehouseId, item_group: &str) -> Option<&AlertRule> {
        self.warehouse_rules
            .iter()
            .chain(self.wildcard_rules.iter())
            .find(|rule| rule.applies_to(warehouse, item_group))
    }

    fn ratios_for(&self, warehouse: &WarehouseId, item_group: &str) -> (f64, f64) {
        match self.select_rule(warehouse, item_group) {
            Some(rule) => (rule.critical_ratio, rule.low_ratio),
            None => {
                tracing::debug!(
                    target: "tillbase::inventory",
                    warehouse = %warehouse,
                    item_group,
                    "no alert rule matched; using default ratios"
                );
                (self.defaults.critical_ratio, self.defaults.low_ratio)
            }
        }
    }

    pub fn evaluate(
        &self,
        warehouse: &WarehouseId,
        rows: &[SnapshotRow],
        reorders: &ReorderLevels,
    ) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = Vec::new();
        for row in rows {
            // Service items never alert.
            if !row.is_stocked {
                continue;
            }
            let entry = reorders.get(&row.item_code);
            let (critical_ratio, low_ratio) = self.ratios_for(warehouse, &row.item_group);

            let status = if row.projected_qty <= 0.0 {
                Some(AlertStatus::Critical)
            } else {
                match entry.reorder_level {
                    Some(level) if level > 0.0 => {
                        if row.projected_qty <= level * critical_ratio {
                            Some(AlertStatus::Critical)
                        } else if row.projected_qty <= level * low_ratio {
                            Some(AlertStatus::Low)
                        } else {
                            None
                        }
                    }
                    _ => None,
                }
            };

            if let Some(status) = status {
                alerts.push(Alert {
                    item_code: row.item_code.clone(),
                    item_name: row.item_name.clone(),
                    status,
                    qty: row.projected_qty,
                    reorder_level: entry.reorder_level,
                    reorder_qty: entry.reorder_qty,
                });
            }
        }

        alerts.sort_by(|a, b| {
            (a.status != AlertStatus::Critical)
                .cmp(&(b.status != AlertStatus::Critical))
                .then(a.qty.partial_cmp(&b.qty).unwrap_or(std::cmp::Ordering::Equal))
        });
        alerts.truncate(self.defaults.limit);
        alerts
    }
}

/// Hide negative-stock rows unless they carry an alert; strips nothing
/// else. Shared by bootstrap and the inventory delta.
pub fn apply_visibility_rules(rows: Vec<SnapshotRow>, alerts: &[Alert]) -> Vec<SnapshotRow> {
    rows.into_iter()
        .filter(|row| {
            row.raw_on_hand >= 0.0
                || alerts.iter().any(|alert| alert.item_code == row.item_code)
        })
        .collect()
}

pub fn has_negative_rows(rows: &[SnapshotRow]) -> bool {
    rows.iter().any(|row| row.raw_on_hand < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillbase_types::prelude::ItemCode;

    fn row(code: &str, group: &str, projected: f64) -> SnapshotRow {
        SnapshotRow {
            item_code: ItemCode(code.to_string()),
            item_name: code.to_string(),
            item_group: group.to_string(),
            description: String::new(),
            sellable_qty: projected.max(0.0),
            raw_on_hand: projected,
            projected_qty: projected,
            price: 0.0,
            currency: String::new(),
            valuation_rate: 0.0,
            barcode: String::new(),
            stock_uom: "Unit".into(),
            brand: String::new(),
            image: String::new(),
            is_stocked: true,
            is_service: false,
            variant_of: None,
            variant_attributes: None,
        }
    }

    fn reorders(entries: &[(&str, f64)]) -> ReorderLevels {
        let mut levels = ReorderLevels::default();
        for (code, level) in entries {
            levels.set(ItemCode(code.to_string()), Some(*level), Some(level * 2.0));
        }
        levels
    }

    fn wh() -> WarehouseId {
        WarehouseId("WH-1".into())
    }

    #[test]
    fn wildcard_group_rule_marks_low_stock_critical() {
        let engine = AlertEngine::new(
            vec![AlertRule::new(
                RuleScope::Exact("WH-1".into()),
                RuleScope::Any,
                0.2,
                0.5,
                10,
            )],
            AlertDefaults::default(),
        );
        let alerts = engine.evaluate(&wh(), &[row("SKU-1", "Drinks", 15.0)], &reorders(&[("SKU-1", 100.0)]));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].status, AlertStatus::Critical); // 15 <= 100 * 0.2
    }

    #[test]
    fn specific_group_rule_beats_wildcard_regardless_of_declaration_order() {
        let wildcard = AlertRule::new(RuleScope::Exact("WH-1".into()), RuleScope::Any, 0.9, 0.95, 10);
        let specific = AlertRule::new(
            RuleScope::Exact("WH-1".into()),
            RuleScope::Exact("Drinks".into()),
            0.1,
            0.2,
            10,
        );

        for rules in [vec![wildcard.clone(), specific.clone()], vec![specific, wildcard]] {
            let engine = AlertEngine::new(rules, AlertDefaults::default());
            // 50/100 = 0.5: LOW under the wildcard (0.9/0.95), clean under
            // the specific rule (0.1/0.2).
            let alerts =
                engine.evaluate(&wh(), &[row("SKU-1", "Drinks", 50.0)], &reorders(&[("SKU-1", 100.0)]));
            assert!(alerts.is_empty(), "specific rule must win");
        }
    }

    #[test]
    fn lower_priority_wins_within_same_scope() {
        let engine = AlertEngine::new(
            vec![
                AlertRule::new(RuleScope::Exact("WH-1".into()), RuleScope::Any, 0.9, 0.95, 20),
                AlertRule::new(RuleScope::Exact("WH-1".into()), RuleScope::Any, 0.1, 0.2, 5),
            ],
            AlertDefaults::default(),
        );
        let alerts =
            engine.evaluate(&wh(), &[row("SKU-1", "Drinks", 50.0)], &reorders(&[("SKU-1", 100.0)]));
        assert!(alerts.is_empty(), "priority 5 rule (0.1/0.2) applies");
    }

    #[test]
    fn warehouse_rule_beats_global_wildcard() {
        let engine = AlertEngine::new(
            vec![
                AlertRule::new(RuleScope::Any, RuleScope::Exact("Drinks".into()), 0.9, 0.95, 1),
                AlertRule::new(RuleScope::Exact("WH-1".into()), RuleScope::Any, 0.1, 0.2, 50),
            ],
            AlertDefaults::default(),
        );
        // Warehouse-scoped candidates are consulted before global ones even
        // at higher priority numbers.
        let alerts =
            engine.evaluate(&wh(), &[row("SKU-1", "Drinks", 50.0)], &reorders(&[("SKU-1", 100.0)]));
        assert!(alerts.is_empty());
    }

    #[test]
    fn zero_or_negative_projection_is_always_critical() {
        let engine = AlertEngine::new(Vec::new(), AlertDefaults::default());
        let alerts = engine.evaluate(
            &wh(),
            &[row("SKU-1", "Drinks", 0.0), row("SKU-2", "Drinks", -3.0)],
            &ReorderLevels::default(),
        );
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.status == AlertStatus::Critical));
    }

    #[test]
    fn alert_monotonicity_under_decreasing_quantity() {
        let engine = AlertEngine::new(
            vec![AlertRule::new(RuleScope::Exact("WH-1".into()), RuleScope::Any, 0.3, 0.7, 10)],
            AlertDefaults::default(),
        );
        let reorders = reorders(&[("SKU-1", 100.0)]);

        let mut last_rank = 0u8; // 0 none, 1 low, 2 critical
        let mut qty = 120.0;
        while qty >= -10.0 {
            let alerts = engine.evaluate(&wh(), &[row("SKU-1", "Drinks", qty)], &reorders);
            let rank = match alerts.first().map(|a| a.status) {
                None => 0,
                Some(AlertStatus::Low) => 1,
                Some(AlertStatus::Critical) => 2,
            };
            assert!(rank >= last_rank, "status regressed at qty {qty}");
            last_rank = rank;
            qty -= 2.5;
        }
    }

    #[test]
    fn non_stocked_service_items_never_alert() {
        let engine = AlertEngine::new(Vec::new(), AlertDefaults::default());
        let mut service = row("SVC-1", "Services", -5.0);
        service.is_stocked = false;
        service.is_service = true;
        assert!(engine
            .evaluate(&wh(), &[service], &ReorderLevels::default())
            .is_empty());
    }

    #[test]
    fn results_order_critical_first_then_ascending_qty_then_truncate() {
        let engine = AlertEngine::new(
            vec![AlertRule::new(RuleScope::Any, RuleScope::Any, 0.5, 1.0, 10)],
            AlertDefaults::new(0.35, 1.0, 3),
        );
        let rows = vec![
            row("LOW-B", "G", 90.0),
            row("CRIT-B", "G", 40.0),
            row("LOW-A", "G", 60.0),
            row("CRIT-A", "G", 10.0),
        ];
        let alerts = engine.evaluate(&wh(), &rows, &reorders(&[
            ("LOW-B", 100.0),
            ("CRIT-B", 100.0),
            ("LOW-A", 100.0),
            ("CRIT-A", 100.0),
        ]));
        let codes: Vec<&str> = alerts.iter().map(|a| a.item_code.0.as_str()).collect();
        assert_eq!(codes, vec!["CRIT-A", "CRIT-B", "LOW-A"]);
    }

    #[test]
    fn visibility_hides_negative_rows_without_alerts() {
        let rows = vec![row("NEG", "G", -2.0), row("POS", "G", 5.0)];
        let alerts = vec![Alert {
            item_code: ItemCode("NEG".into()),
            item_name: "NEG".into(),
            status: AlertStatus::Critical,
            qty: -2.0,
            reorder_level: None,
            reorder_qty: None,
        }];

        let visible = apply_visibility_rules(rows.clone(), &alerts);
        assert_eq!(visible.len(), 2, "alerted negative row stays visible");

        let hidden = apply_visibility_rules(rows, &[]);
        let codes: Vec<&str> = hidden.iter().map(|r| r.item_code.0.as_str()).collect();
        assert_eq!(codes, vec!["POS"]);
    }
}
