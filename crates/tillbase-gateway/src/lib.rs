pub mod app;
pub mod envelope;
pub mod mutations;
pub mod payloads;
pub mod routes;
pub mod state;

pub use app::{build_state, router, run, GatewayConfig};
pub use state::AppState;
