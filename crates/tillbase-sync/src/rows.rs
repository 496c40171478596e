use crate::errors::SyncError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tillbase_storage::Document;

/// Deserialize a typed row out of a document's flattened field map.
/// Missing fields fall back to each row type's documented defaults.
pub fn row_from_doc<T: DeserializeOwned>(doc: &Document) -> Result<T, SyncError> {
    serde_json::from_value(doc.to_row_value()).map_err(|err| {
        SyncError::internal(&format!(
            "malformed {} row {}: {err}",
            doc.doctype, doc.name
        ))
    })
}

pub fn rows_from_docs<T: DeserializeOwned>(docs: &[Document]) -> Result<Vec<T>, SyncError> {
    docs.iter().map(row_from_doc).collect()
}

/// Stores persist boolean flags as 0/1, true/false, or "1"/"true"; accept
/// all of them.
pub fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
        }
        _ => false,
    })
}

fn de_f64_loose<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BinRow {
    #[serde(default)]
    pub item_code: String,
    #[serde(default)]
    pub warehouse: String,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub actual_qty: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub reserved_qty: f64,
    #[serde(default)]
    pub projected_qty: Option<f64>,
    #[serde(default)]
    pub stock_uom: String,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub valuation_rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMasterRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub item_code: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub item_group: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub stock_uom: String,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub standard_rate: f64,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_stock_item: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_sales_item: bool,
    #[serde(default)]
    pub variant_of: Option<String>,
    #[serde(default, deserialize_with = "de_flag")]
    pub disabled: bool,
}

impl ItemMasterRow {
    pub fn code(&self) -> &str {
        if self.item_code.trim().is_empty() {
            &self.name
        } else {
            &self.item_code
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    #[serde(default)]
    pub item_code: String,
    #[serde(default)]
    pub price_list: String,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub price_list_rate: f64,
    #[serde(default)]
    pub currency: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReorderRow {
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub warehouse: String,
    #[serde(default)]
    pub warehouse_reorder_level: Option<f64>,
    #[serde(default)]
    pub warehouse_reorder_qty: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditLimitRow {
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub credit_limit: Option<f64>,
    #[serde(default, deserialize_with = "de_flag")]
    pub bypass_credit_limit_check: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub territory: Option<String>,
    #[serde(default)]
    pub mobile_no: Option<String>,
    #[serde(default)]
    pub primary_address: Option<String>,
    #[serde(default)]
    pub email_id: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_customer_type")]
    pub customer_type: String,
    #[serde(default, deserialize_with = "de_flag")]
    pub disabled: bool,
    #[serde(default)]
    pub credit_limits: Vec<CreditLimitSummary>,
    #[serde(default)]
    pub outstanding: f64,
    #[serde(default)]
    pub pending_invoices_count: u64,
    #[serde(default)]
    pub modified: i64,
}

fn default_customer_type() -> String {
    "Individual".to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditLimitSummary {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub credit_limit: Option<f64>,
    #[serde(default, deserialize_with = "de_flag")]
    pub bypass_credit_limit_check: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub supplier_name: String,
    #[serde(default)]
    pub supplier_group: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "de_flag")]
    pub disabled: bool,
    #[serde(default)]
    pub modified: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub posting_date: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub conversion_rate: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub net_total: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub total: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub total_taxes_and_charges: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub grand_total: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub rounded_total: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub rounding_adjustment: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub discount_amount: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub paid_amount: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub change_amount: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub write_off_amount: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub outstanding_amount: f64,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_pos: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub update_stock: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub disable_rounded_total: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_return: bool,
    #[serde(default)]
    pub return_against: Option<String>,
    #[serde(default)]
    pub pos_profile: Option<String>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub party_account_currency: Option<String>,
    #[serde(default)]
    pub contact_display: Option<String>,
    #[serde(default)]
    pub contact_mobile: Option<String>,
    #[serde(default)]
    pub docstatus: u8,
    #[serde(default)]
    pub modified: i64,
    #[serde(default)]
    pub items: Vec<InvoiceItemRow>,
    #[serde(default)]
    pub payments: Vec<InvoicePaymentRow>,
    #[serde(default)]
    pub payment_schedule: Vec<PaymentScheduleRow>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItemRow {
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub item_code: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub qty: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub rate: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub amount: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub discount_percentage: f64,
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub income_account: Option<String>,
    #[serde(default)]
    pub cost_center: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoicePaymentRow {
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub mode_of_payment: String,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub amount: f64,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default = "default_payment_type")]
    pub r#type: String,
}

fn default_payment_type() -> String {
    "Receive".to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentScheduleRow {
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub payment_term: Option<String>,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub invoice_portion: f64,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub mode_of_payment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntryRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub posting_date: String,
    #[serde(default)]
    pub party: String,
    #[serde(default)]
    pub party_type: String,
    #[serde(default)]
    pub payment_type: String,
    #[serde(default)]
    pub mode_of_payment: Option<String>,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub paid_amount: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub received_amount: f64,
    #[serde(default)]
    pub paid_from_account_currency: Option<String>,
    #[serde(default)]
    pub paid_to_account_currency: Option<String>,
    #[serde(default)]
    pub docstatus: u8,
    #[serde(default)]
    pub modified: i64,
    #[serde(default)]
    pub references: Vec<PaymentReferenceRow>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentReferenceRow {
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub reference_doctype: String,
    #[serde(default)]
    pub reference_name: String,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub outstanding_amount: f64,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub allocated_amount: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub currency_name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub number_format: Option<String>,
    #[serde(default)]
    pub exchange_rate: Option<f64>,
    #[serde(default)]
    pub exchange_rate_to: Option<String>,
    #[serde(default)]
    pub exchange_rate_date: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentTermRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub payment_term_name: String,
    #[serde(default, deserialize_with = "de_f64_loose")]
    pub invoice_portion: f64,
    #[serde(default)]
    pub mode_of_payment: Option<String>,
    #[serde(default)]
    pub due_date_based_on: Option<String>,
    #[serde(default)]
    pub credit_days: Option<i64>,
    #[serde(default)]
    pub credit_months: Option<i64>,
    #[serde(default)]
    pub discount_type: Option<String>,
    #[serde(default)]
    pub discount: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TerritoryRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub territory_name: String,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_group: bool,
    #[serde(default)]
    pub parent_territory: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerGroupRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub customer_group_name: String,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_group: bool,
    #[serde(default)]
    pub parent_customer_group: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyRow {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub default_currency: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub default_payable_account: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StockSettingsRow {
    #[serde(default, deserialize_with = "de_flag")]
    pub allow_negative_stock: bool,
}
