pub mod codes;
pub mod obj;
pub mod retry;
pub mod prelude;

pub use codes::ErrorCode;
pub use obj::{ErrorBuilder, ErrorObj};
pub use retry::RetryClass;
