pub mod invoice;
pub mod payment;
pub mod session;

use serde_json::Value;
use tillbase_storage::prelude::*;
use tillbase_tx::TxError;
use tillbase_types::prelude::Actor;

pub(crate) fn require(
    checker: &dyn PermissionChecker,
    actor: &Actor,
    doctype: &str,
    actions: &[Action],
) -> Result<(), TxError> {
    for action in actions {
        enforce_permission(checker, actor, doctype, *action, None)?;
    }
    Ok(())
}

pub(crate) fn field_or_null(doc: &Document, key: &str) -> Value {
    doc.field(key).cloned().unwrap_or(Value::Null)
}
