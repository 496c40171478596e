pub use crate::engine::{apply_visibility_rules, has_negative_rows, AlertEngine};
pub use crate::model::{Alert, AlertStatus, ReorderEntry, ReorderLevels, SnapshotRow};
pub use crate::rule::{AlertDefaults, AlertRule, RuleScope};
