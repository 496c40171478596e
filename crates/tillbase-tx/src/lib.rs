pub mod errors;
pub mod executor;
pub mod idempo;
pub mod model;
pub mod util;
pub mod prelude;

pub mod memory {
    mod idempo_store;
    pub use idempo_store::InMemoryIdempoStore;
}

pub use errors::TxError;
pub use executor::{MutationExecutor, MutationResult};
pub use idempo::{resolve_request_key, IdempoStore};
pub use model::{Begin, IdempotencyRecord, RecordStatus};
