use crate::errors::StorageError;
use crate::model::Document;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tillbase_types::prelude::Actor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Write,
    Create,
    Submit,
    Cancel,
    Delete,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Create => "create",
            Action::Submit => "submit",
            Action::Cancel => "cancel",
            Action::Delete => "delete",
        }
    }
}

pub trait PermissionChecker: Send + Sync {
    fn has_permission(
        &self,
        actor: &Actor,
        doctype: &str,
        action: Action,
        doc: Option<&Document>,
    ) -> bool;
}

/// Raise the typed error the envelope mapper expects when an actor lacks a
/// document permission.
pub fn enforce_permission(
    checker: &dyn PermissionChecker,
    actor: &Actor,
    doctype: &str,
    action: Action,
    doc: Option<&Document>,
) -> Result<(), StorageError> {
    if checker.has_permission(actor, doctype, action, doc) {
        Ok(())
    } else {
        Err(StorageError::permission_denied(&format!(
            "user {} lacks {} permission on {doctype}",
            actor.user,
            action.as_str()
        )))
    }
}

/// Permissive default used by tests and the in-memory runtime profile.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn has_permission(&self, _: &Actor, _: &str, _: Action, _: Option<&Document>) -> bool {
        true
    }
}

/// Role-based matrix: doctype -> action -> roles allowed. Roles listed under
/// the `"*"` doctype apply everywhere.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoleMatrixChecker {
    pub matrix: BTreeMap<String, BTreeMap<Action, BTreeSet<String>>>,
}

impl RoleMatrixChecker {
    pub fn allow(mut self, doctype: &str, action: Action, roles: &[&str]) -> Self {
        self.matrix
            .entry(doctype.to_string())
            .or_default()
            .entry(action)
            .or_default()
            .extend(roles.iter().map(|r| r.to_string()));
        self
    }

    fn allowed(&self, doctype: &str, action: Action, actor: &Actor) -> bool {
        self.matrix
            .get(doctype)
            .and_then(|actions| actions.get(&action))
            .map(|roles| roles.iter().any(|role| actor.has_role(role)))
            .unwrap_or(false)
    }
}

impl PermissionChecker for RoleMatrixChecker {
    fn has_permission(
        &self,
        actor: &Actor,
        doctype: &str,
        action: Action,
        _doc: Option<&Document>,
    ) -> bool {
        self.allowed(doctype, action, actor) || self.allowed("*", action, actor)
    }
}
