pub use crate::errors::TxError;
pub use crate::executor::{MutationExecutor, MutationResult};
pub use crate::idempo::{resolve_request_key, IdempoStore};
pub use crate::memory::InMemoryIdempoStore;
pub use crate::model::{Begin, IdempotencyRecord, RecordStatus};
pub use crate::util::now_ms;
