pub use crate::actor::{Actor, GUEST_USER};
pub use crate::envelope::{Envelope, ErrorBody};
pub use crate::hash::{canonical_json, canonicalize, payload_hash};
pub use crate::id::{CurrencyCode, Id, ItemCode, WarehouseId};
pub use crate::time::{now_ms, server_time, Timestamp};
