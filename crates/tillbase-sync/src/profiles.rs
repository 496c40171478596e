use crate::errors::SyncError;
use crate::rows::{de_flag, rows_from_docs};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tillbase_storage::prelude::*;
use tillbase_types::prelude::Actor;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDetail {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub warehouse: String,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub territory: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default = "ProfileDetail::default_apply_discount_on")]
    pub apply_discount_on: String,
    #[serde(default)]
    pub cost_center: String,
    #[serde(default)]
    pub selling_price_list: String,
    #[serde(default)]
    pub payments: Vec<ProfilePayment>,
}

impl ProfileDetail {
    fn default_apply_discount_on() -> String {
        "Grand Total".to_string()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePayment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode_of_payment: String,
    #[serde(default, deserialize_with = "de_flag")]
    pub default: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub allow_in_returns: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpeningShift {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub pos_profile: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub posting_date: String,
    #[serde(default)]
    pub period_start_date: String,
    #[serde(default)]
    pub pos_closing_entry: Option<String>,
    #[serde(default)]
    pub modified: i64,
}

/// Register-profile access and shift resolution for the calling user.
#[derive(Clone)]
pub struct ProfileReader {
    store: Arc<dyn DocumentStore>,
    caps: SchemaCapabilities,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct AssignmentRow {
    #[serde(default)]
    parent: String,
    #[serde(default, deserialize_with = "de_flag")]
    default: bool,
}

impl ProfileReader {
    pub fn new(store: Arc<dyn DocumentStore>, caps: SchemaCapabilities) -> Self {
        ProfileReader { store, caps }
    }

    async fn assignments(&self, user: &str) -> Result<Option<Vec<AssignmentRow>>, SyncError> {
        if !self.caps.has_table("POS Profile User")
            || !self.caps.has_field("POS Profile User", "user")
        {
            return Ok(None);
        }
        let mut params = QueryParams::default()
            .filter("user", Filter::Eq(Value::String(user.into())))
            .order(OrderBy::asc("idx"));
        if self.caps.has_field("POS Profile User", "parenttype") {
            params = params.filter("parenttype", Filter::Eq(Value::String("POS Profile".into())));
        }
        let listing = self.store.list("POS Profile User", params).await?;
        Ok(Some(rows_from_docs(&listing.docs)?))
    }

    /// Profiles the user may operate, default first flagged. When the
    /// user-mapping table is absent the site exposes every enabled profile.
    pub async fn accessible_profiles(&self, actor: &Actor) -> Result<Vec<ProfileSummary>, SyncError> {
        let assignments = self.assignments(&actor.user.0).await?;

        let mut params = QueryParams::default()
            .filter("disabled", Filter::Eq(Value::from(0)))
            .order(OrderBy::asc("name"));

        let default_names: BTreeSet<String>;
        match &assignments {
            Some(rows) => {
                let assigned: BTreeSet<String> = rows
                    .iter()
                    .filter(|row| !row.parent.is_empty())
                    .map(|row| row.parent.clone())
                    .collect();
                if assigned.is_empty() {
                    return Ok(Vec::new());
                }
                default_names = rows
                    .iter()
                    .filter(|row| row.default)
                    .map(|row| row.parent.clone())
                    .collect();
                params = params.filter(
                    "name",
                    Filter::In(assigned.iter().map(|n| Value::String(n.clone())).collect()),
                );
            }
            None => default_names = BTreeSet::new(),
        }

        let listing = self.store.list("POS Profile", params).await?;
        let mut profiles: Vec<ProfileSummary> = rows_from_docs(&listing.docs)?;
        for profile in &mut profiles {
            profile.is_default = default_names.contains(&profile.name);
        }
        Ok(profiles)
    }

    pub async fn profile_detail(&self, name: &str) -> Result<Option<ProfileDetail>, SyncError> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        let doc = match self.store.get("POS Profile", name).await {
            Ok(doc) => doc,
            Err(err) if err.code() == "NOT_FOUND" => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut detail: ProfileDetail = crate::rows::row_from_doc(&doc)?;
        detail.name = doc.name.clone();
        if detail.territory.is_empty() {
            detail.territory = detail.route.clone();
        }
        if detail.country.is_empty() && !detail.company.is_empty() {
            if let Ok(company) = self.store.get("Company", &detail.company).await {
                detail.country = company.field_str("country").unwrap_or_default().to_string();
            }
        }
        detail.payments = self.profile_payments(name).await?;
        Ok(Some(detail))
    }

    async fn profile_payments(&self, profile: &str) -> Result<Vec<ProfilePayment>, SyncError> {
        if !self.caps.has_table("POS Payment Method") {
            return Ok(Vec::new());
        }
        let mut params = QueryParams::default()
            .filter("parent", Filter::Eq(Value::String(profile.into())))
            .order(OrderBy::asc("idx"));
        if self.caps.has_field("POS Payment Method", "parenttype") {
            params = params.filter("parenttype", Filter::Eq(Value::String("POS Profile".into())));
        }
        let listing = self.store.list("POS Payment Method", params).await?;
        let mut payments: Vec<ProfilePayment> = rows_from_docs(&listing.docs)?;
        for payment in &mut payments {
            if payment.name.is_empty() {
                payment.name = payment.mode_of_payment.clone();
            }
        }
        Ok(payments)
    }

    /// The default profile for a session opening: the user's flagged
    /// default, else the first accessible one.
    pub async fn default_profile(&self, actor: &Actor) -> Result<Option<String>, SyncError> {
        let profiles = self.accessible_profiles(actor).await?;
        Ok(profiles
            .iter()
            .find(|p| p.is_default)
            .or_else(|| profiles.first())
            .map(|p| p.name.clone()))
    }

    /// Locate the caller's open shift, optionally pinned to a profile or a
    /// specific opening entry. Errors mirror what clients must act on:
    /// open a shift first, or the named entry is no longer open.
    pub async fn require_open_shift(
        &self,
        actor: &Actor,
        profile: Option<&str>,
        opening_name: Option<&str>,
    ) -> Result<OpeningShift, SyncError> {
        if !self.caps.has_table("POS Opening Entry") {
            return Err(SyncError::validation(
                "POS Opening Entry is not available on this site",
            ));
        }

        let mut params = QueryParams::default()
            .filter("docstatus", Filter::Eq(Value::from(1)))
            .order(OrderBy::desc("modified"))
            .page(0, Some(20));
        if self.caps.has_field("POS Opening Entry", "user") {
            params = params.filter("user", Filter::Eq(Value::String(actor.user.0.clone())));
        }
        if let Some(profile) = profile.filter(|p| !p.is_empty()) {
            if self.caps.has_field("POS Opening Entry", "pos_profile") {
                params = params.filter("pos_profile", Filter::Eq(Value::String(profile.into())));
            }
        }
        let mut pinned = params.clone();
        if let Some(name) = opening_name.filter(|n| !n.is_empty()) {
            pinned = pinned.filter("name", Filter::Eq(Value::String(name.into())));
        }

        let listing = self.store.list("POS Opening Entry", pinned).await?;
        let shifts: Vec<OpeningShift> = rows_from_docs(&listing.docs)?;
        let has_status = self.caps.has_field("POS Opening Entry", "status");
        let open = shifts.into_iter().find(|shift| {
            if has_status {
                shift.status.trim().eq_ignore_ascii_case("open")
            } else {
                // Sites without a status column: no closing link means open.
                shift.pos_closing_entry.is_none()
            }
        });
        if let Some(shift) = open {
            return Ok(shift);
        }

        if let Some(name) = opening_name.filter(|n| !n.is_empty()) {
            let existing = self
                .store
                .list(
                    "POS Opening Entry",
                    params.filter("name", Filter::Eq(Value::String(name.into()))),
                )
                .await?;
            if let Some(doc) = existing.docs.first() {
                let status = doc.field_str("status").unwrap_or("Unknown");
                return Err(SyncError::validation(&format!(
                    "POS Opening Entry {name} is not open (status: {status}). Open a new shift first."
                )));
            }
        }

        Err(SyncError::validation(
            "Open shift required. Call session.opening_create_submit before sync.bootstrap.",
        ))
    }

    /// An already-open submitted shift for (user, profile), if any; session
    /// opening reuses it instead of double-opening.
    pub async fn find_existing_open_shift(
        &self,
        user: &str,
        profile: Option<&str>,
    ) -> Result<Option<OpeningShift>, SyncError> {
        if user.is_empty() || !self.caps.has_table("POS Opening Entry") {
            return Ok(None);
        }
        let mut params = QueryParams::default()
            .filter("docstatus", Filter::Eq(Value::from(1)))
            .filter("status", Filter::Eq(Value::String("Open".into())))
            .filter("user", Filter::Eq(Value::String(user.into())))
            .order(OrderBy::desc("modified"))
            .page(0, Some(1));
        if let Some(profile) = profile.filter(|p| !p.is_empty()) {
            params = params.filter("pos_profile", Filter::Eq(Value::String(profile.into())));
        }
        let listing = self.store.list("POS Opening Entry", params).await?;
        match listing.docs.first() {
            Some(doc) => Ok(Some(crate::rows::row_from_doc(doc)?)),
            None => Ok(None),
        }
    }
}
