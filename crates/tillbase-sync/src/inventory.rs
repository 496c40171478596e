use crate::errors::SyncError;
use crate::pagination::PageInfo;
use crate::rows::{rows_from_docs, BinRow, ItemMasterRow, PriceRow, ReorderRow};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tillbase_inventory::prelude::*;
use tillbase_storage::prelude::*;
use tillbase_types::prelude::ItemCode;

/// Assembles user-visible inventory rows for one warehouse. A row is a
/// join over the stock, item-master, price, barcode, and variant tables;
/// the delta path therefore unions change signals from all of them.
#[derive(Clone)]
pub struct InventoryReader {
    store: Arc<dyn DocumentStore>,
    caps: SchemaCapabilities,
}

impl InventoryReader {
    pub fn new(store: Arc<dyn DocumentStore>, caps: SchemaCapabilities) -> Self {
        InventoryReader { store, caps }
    }

    async fn sellable_item_codes(&self) -> Result<Vec<String>, SyncError> {
        let listing = self
            .store
            .list(
                "Item",
                QueryParams::default()
                    .filter("disabled", Filter::Eq(Value::from(0)))
                    .filter("is_sales_item", Filter::Eq(Value::from(1)))
                    .order(OrderBy::asc("name")),
            )
            .await?;
        let rows: Vec<ItemMasterRow> = rows_from_docs(&listing.docs)?;
        let codes: BTreeSet<String> = rows
            .iter()
            .map(|row| row.code().trim().to_string())
            .filter(|code| !code.is_empty())
            .collect();
        Ok(codes.into_iter().collect())
    }

    /// One bootstrap page of snapshot rows, paginated over the ordered
    /// sellable item code set.
    pub async fn snapshot_page(
        &self,
        warehouse: &str,
        price_list: &str,
        offset: u64,
        limit: u32,
    ) -> Result<(Vec<SnapshotRow>, PageInfo), SyncError> {
        let codes = self.sellable_item_codes().await?;
        let total = codes.len() as u64;
        let start = (offset as usize).min(codes.len());
        let page: Vec<String> = if limit > 0 {
            codes.into_iter().skip(start).take(limit as usize).collect()
        } else {
            codes.into_iter().skip(start).collect()
        };
        let rows = self.rows_for_codes(warehouse, price_list, &page).await?;
        let info = if limit > 0 {
            PageInfo::new(offset, limit, total)
        } else {
            PageInfo::whole(total)
        };
        Ok((rows, info))
    }

    /// Rebuild full rows for exactly the given code set.
    pub async fn rows_for_codes(
        &self,
        warehouse: &str,
        price_list: &str,
        codes: &[String],
    ) -> Result<Vec<SnapshotRow>, SyncError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let code_values: Vec<Value> = codes.iter().map(|c| Value::String(c.clone())).collect();

        let bins = self
            .store
            .list(
                "Bin",
                QueryParams::default()
                    .filter("warehouse", Filter::Eq(Value::String(warehouse.into())))
                    .filter("item_code", Filter::In(code_values.clone())),
            )
            .await?;
        let bin_rows: Vec<BinRow> = rows_from_docs(&bins.docs)?;
        let bin_by_code: BTreeMap<&str, &BinRow> = bin_rows
            .iter()
            .filter(|row| !row.item_code.is_empty())
            .map(|row| (row.item_code.as_str(), row))
            .collect();

        let items = self
            .store
            .list(
                "Item",
                QueryParams::default().filter("name", Filter::In(code_values.clone())),
            )
            .await?;
        let item_rows: Vec<ItemMasterRow> = rows_from_docs(&items.docs)?;
        let item_by_code: BTreeMap<&str, &ItemMasterRow> = item_rows
            .iter()
            .map(|row| (row.code(), row))
            .collect();

        let barcode_by_code = self.first_child_text("Item Barcode", "barcode", codes).await?;
        let variant_by_code = self.variant_descriptors(codes).await?;
        let price_by_code = self.latest_prices(price_list, &code_values).await?;

        let mut output = Vec::new();
        for code in codes {
            let Some(item) = item_by_code.get(code.as_str()) else {
                continue;
            };
            let bin = bin_by_code.get(code.as_str());
            let actual_qty = bin.map(|b| b.actual_qty).unwrap_or(0.0);
            let reserved_qty = bin.map(|b| b.reserved_qty).unwrap_or(0.0);
            let projected_qty = bin
                .and_then(|b| b.projected_qty)
                .unwrap_or(actual_qty);
            let price_row = price_by_code.get(code.as_str());
            let price = price_row
                .map(|p| p.price_list_rate)
                .unwrap_or(item.standard_rate);
            let variant_attributes = variant_by_code.get(code.as_str()).cloned();

            let mut item_name = if item.item_name.is_empty() {
                code.clone()
            } else {
                item.item_name.clone()
            };
            if let Some(descriptor) = &variant_attributes {
                if !item_name.to_lowercase().contains(&descriptor.to_lowercase()) {
                    item_name = format!("{item_name} ({descriptor})");
                }
            }

            output.push(SnapshotRow {
                item_code: ItemCode(code.clone()),
                item_name,
                item_group: item.item_group.clone(),
                description: item.description.clone(),
                sellable_qty: SnapshotRow::sellable(actual_qty, reserved_qty),
                raw_on_hand: actual_qty,
                projected_qty,
                price,
                currency: price_row.map(|p| p.currency.clone()).unwrap_or_default(),
                valuation_rate: bin.map(|b| b.valuation_rate).unwrap_or(0.0),
                barcode: barcode_by_code.get(code.as_str()).cloned().unwrap_or_default(),
                stock_uom: if item.stock_uom.is_empty() {
                    bin.map(|b| b.stock_uom.clone()).unwrap_or_default()
                } else {
                    item.stock_uom.clone()
                },
                brand: item.brand.clone(),
                image: item.image.clone(),
                is_stocked: item.is_stock_item,
                is_service: !item.is_stock_item,
                variant_of: item.variant_of.clone(),
                variant_attributes,
            });
        }
        Ok(output)
    }

    pub async fn reorder_levels(
        &self,
        warehouse: &str,
        rows: &[SnapshotRow],
    ) -> Result<ReorderLevels, SyncError> {
        let mut levels = ReorderLevels::default();
        if rows.is_empty() || !self.caps.has_table("Item Reorder") {
            return Ok(levels);
        }
        let codes: Vec<Value> = rows
            .iter()
            .map(|row| Value::String(row.item_code.0.clone()))
            .collect();
        let listing = self
            .store
            .list(
                "Item Reorder",
                QueryParams::default()
                    .filter("warehouse", Filter::Eq(Value::String(warehouse.into())))
                    .filter("parent", Filter::In(codes)),
            )
            .await?;
        let reorder_rows: Vec<ReorderRow> = rows_from_docs(&listing.docs)?;
        for row in reorder_rows {
            if row.parent.is_empty() {
                continue;
            }
            levels.set(
                ItemCode(row.parent.clone()),
                row.warehouse_reorder_level,
                row.warehouse_reorder_qty,
            );
        }
        Ok(levels)
    }

    /// Item codes touched since the watermark through any of the three
    /// signals a visible row depends on: stock level, item master, price.
    pub async fn delta_codes(
        &self,
        warehouse: &str,
        price_list: &str,
        modified_since: i64,
    ) -> Result<Vec<String>, SyncError> {
        let since = Value::from(modified_since);
        let mut codes: BTreeSet<String> = BTreeSet::new();

        let bins = self
            .store
            .list(
                "Bin",
                QueryParams::default()
                    .filter("warehouse", Filter::Eq(Value::String(warehouse.into())))
                    .filter("modified", Filter::Gte(since.clone())),
            )
            .await?;
        for row in rows_from_docs::<BinRow>(&bins.docs)? {
            let code = row.item_code.trim().to_string();
            if !code.is_empty() {
                codes.insert(code);
            }
        }

        let items = self
            .store
            .list(
                "Item",
                QueryParams::default().filter("modified", Filter::Gte(since.clone())),
            )
            .await?;
        for row in rows_from_docs::<ItemMasterRow>(&items.docs)? {
            let code = row.code().trim().to_string();
            if !code.is_empty() {
                codes.insert(code);
            }
        }

        if self.caps.has_table("Item Price") {
            let mut params = QueryParams::default()
                .filter("selling", Filter::Eq(Value::from(1)))
                .filter("modified", Filter::Gte(since));
            if !price_list.is_empty() {
                params = params.filter("price_list", Filter::Eq(Value::String(price_list.into())));
            }
            let prices = self.store.list("Item Price", params).await?;
            for row in rows_from_docs::<PriceRow>(&prices.docs)? {
                let code = row.item_code.trim().to_string();
                if !code.is_empty() {
                    codes.insert(code);
                }
            }
        }

        Ok(codes.into_iter().collect())
    }

    async fn first_child_text(
        &self,
        doctype: &str,
        field: &str,
        codes: &[String],
    ) -> Result<BTreeMap<String, String>, SyncError> {
        let mut map = BTreeMap::new();
        if codes.is_empty() || !self.caps.has_table(doctype) {
            return Ok(map);
        }
        let mut params = QueryParams::default()
            .filter(
                "parent",
                Filter::In(codes.iter().map(|c| Value::String(c.clone())).collect()),
            )
            .order(OrderBy::asc("idx"));
        if self.caps.has_field(doctype, "parenttype") {
            params = params.filter("parenttype", Filter::Eq(Value::String("Item".into())));
        }
        let listing = self.store.list(doctype, params).await?;
        for doc in &listing.docs {
            let Some(parent) = doc.field_str("parent") else {
                continue;
            };
            let text = doc.field_str(field).unwrap_or_default().trim().to_string();
            if !text.is_empty() {
                map.entry(parent.to_string()).or_insert(text);
            }
        }
        Ok(map)
    }

    async fn variant_descriptors(
        &self,
        codes: &[String],
    ) -> Result<BTreeMap<String, String>, SyncError> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if codes.is_empty() || !self.caps.has_table("Item Variant Attribute") {
            return Ok(BTreeMap::new());
        }
        let mut params = QueryParams::default()
            .filter(
                "parent",
                Filter::In(codes.iter().map(|c| Value::String(c.clone())).collect()),
            )
            .order(OrderBy::asc("idx"));
        if self.caps.has_field("Item Variant Attribute", "parenttype") {
            params = params.filter("parenttype", Filter::Eq(Value::String("Item".into())));
        }
        let listing = self.store.list("Item Variant Attribute", params).await?;
        for doc in &listing.docs {
            let Some(parent) = doc.field_str("parent") else {
                continue;
            };
            let attribute = doc.field_str("attribute").unwrap_or_default().trim().to_string();
            let value = doc
                .field_str("attribute_value")
                .unwrap_or_default()
                .trim()
                .to_string();
            if value.is_empty() {
                continue;
            }
            let text = if attribute.is_empty() {
                value
            } else {
                format!("{attribute}: {value}")
            };
            grouped.entry(parent.to_string()).or_default().push(text);
        }
        Ok(grouped
            .into_iter()
            .map(|(code, parts)| (code, parts.join(", ")))
            .collect())
    }

    async fn latest_prices(
        &self,
        price_list: &str,
        code_values: &[Value],
    ) -> Result<BTreeMap<String, PriceRow>, SyncError> {
        let mut map = BTreeMap::new();
        if !self.caps.has_table("Item Price") {
            return Ok(map);
        }
        let mut params = QueryParams::default()
            .filter("item_code", Filter::In(code_values.to_vec()))
            .filter("selling", Filter::Eq(Value::from(1)))
            .order(OrderBy::desc("modified"));
        if !price_list.is_empty() {
            params = params.filter("price_list", Filter::Eq(Value::String(price_list.into())));
        }
        let listing = self.store.list("Item Price", params).await?;
        for row in rows_from_docs::<PriceRow>(&listing.docs)? {
            if !row.item_code.is_empty() {
                map.entry(row.item_code.clone()).or_insert(row);
            }
        }
        Ok(map)
    }
}
