pub use crate::errors::StorageError;
pub use crate::memory::MemoryDocumentStore;
pub use crate::model::{DocRef, DocStatus, Document};
pub use crate::query::{Filter, Listing, OrderBy, QueryParams};
pub use crate::spi::capabilities::SchemaCapabilities;
pub use crate::spi::permission::{
    enforce_permission, Action, AllowAll, PermissionChecker, RoleMatrixChecker,
};
pub use crate::spi::store::DocumentStore;
