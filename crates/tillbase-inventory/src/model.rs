use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tillbase_types::prelude::ItemCode;

/// One sellable item in one warehouse, derived per request from the stock,
/// item-master, and price tables. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub item_code: ItemCode,
    pub item_name: String,
    #[serde(default)]
    pub item_group: String,
    #[serde(default)]
    pub description: String,
    /// max(on_hand - reserved, 0); what a cashier may actually sell.
    pub sellable_qty: f64,
    /// On-hand before flooring; drives the negative-stock visibility rule.
    pub raw_on_hand: f64,
    pub projected_qty: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub valuation_rate: f64,
    #[serde(default)]
    pub barcode: String,
    #[serde(default)]
    pub stock_uom: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub image: String,
    pub is_stocked: bool,
    pub is_service: bool,
    #[serde(default)]
    pub variant_of: Option<String>,
    #[serde(default)]
    pub variant_attributes: Option<String>,
}

impl SnapshotRow {
    pub fn sellable(on_hand: f64, reserved: f64) -> f64 {
        (on_hand - reserved).max(0.0)
    }
}

/// Configured reorder thresholds per item in the evaluated warehouse.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReorderLevels {
    pub by_item: BTreeMap<ItemCode, ReorderEntry>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub reorder_level: Option<f64>,
    pub reorder_qty: Option<f64>,
}

impl ReorderLevels {
    pub fn set(&mut self, item: ItemCode, level: Option<f64>, qty: Option<f64>) {
        self.by_item.insert(
            item,
            ReorderEntry {
                reorder_level: level,
                reorder_qty: qty,
            },
        );
    }

    pub fn get(&self, item: &ItemCode) -> ReorderEntry {
        self.by_item.get(item).copied().unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Critical,
    Low,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub item_code: ItemCode,
    pub item_name: String,
    pub status: AlertStatus,
    pub qty: f64,
    #[serde(default)]
    pub reorder_level: Option<f64>,
    #[serde(default)]
    pub reorder_qty: Option<f64>,
}
