use crate::envelope::ApiError;
use axum::http::HeaderMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tillbase_config::{Settings, SettingsHandle};
use tillbase_observe::prelude::*;
use tillbase_storage::prelude::*;
use tillbase_sync::prelude::SyncPlanner;
use tillbase_tx::memory::InMemoryIdempoStore;
use tillbase_tx::MutationExecutor;
use tillbase_types::prelude::Actor;

#[derive(Clone)]
pub struct VersionInfo {
    pub version: String,
    pub commit: Option<String>,
}

impl VersionInfo {
    pub fn from_env() -> Self {
        VersionInfo {
            version: std::env::var("TILLBASE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            commit: std::env::var("GIT_COMMIT_HASH").ok(),
        }
    }
}

/// Bearer tokens / API keys resolved into actors at startup.
pub struct AuthIndex {
    pub tokens: HashMap<String, Actor>,
    pub allow_anonymous: bool,
    pub anonymous_roles: Vec<String>,
}

impl AuthIndex {
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Actor, ApiError> {
        let presented = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .or_else(|| headers.get("x-api-key").and_then(|v| v.to_str().ok()));

        match presented {
            Some(token) => self
                .tokens
                .get(token)
                .cloned()
                .ok_or_else(|| ApiError::authentication("invalid token")),
            None if self.allow_anonymous => {
                let mut actor = Actor::guest();
                actor.roles = self.anonymous_roles.clone();
                Ok(actor)
            }
            None => Err(ApiError::authentication("authentication required")),
        }
    }
}

#[derive(Default)]
struct MetricsInner {
    total_requests: u64,
    total_errors: u64,
    routes: HashMap<String, RouteStats>,
}

#[derive(Default)]
struct RouteStats {
    request_count: u64,
    error_count: u64,
    total_latency_ms: u64,
}

#[derive(Clone, Default)]
pub struct GatewayMetrics {
    inner: Arc<Mutex<MetricsInner>>,
}

impl GatewayMetrics {
    pub fn record(&self, route: &str, is_error: bool, latency_ms: u64) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;
        if is_error {
            inner.total_errors += 1;
        }
        let stats = inner.routes.entry(route.to_string()).or_default();
        stats.request_count += 1;
        if is_error {
            stats.error_count += 1;
        }
        stats.total_latency_ms += latency_ms;
    }

    pub fn snapshot(&self) -> Value {
        let inner = self.inner.lock();
        let routes: Vec<Value> = inner
            .routes
            .iter()
            .map(|(route, stats)| {
                json!({
                    "route": route,
                    "requests": stats.request_count,
                    "errors": stats.error_count,
                    "avg_latency_ms": if stats.request_count > 0 {
                        Some(stats.total_latency_ms as f64 / stats.request_count as f64)
                    } else {
                        None
                    },
                })
            })
            .collect();
        json!({
            "total_requests": inner.total_requests,
            "total_errors": inner.total_errors,
            "routes": routes,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub checker: Arc<dyn PermissionChecker>,
    pub caps: SchemaCapabilities,
    pub planner: SyncPlanner,
    pub executor: Arc<MutationExecutor<InMemoryIdempoStore>>,
    pub recorder: Arc<dyn ActivityRecorder>,
    pub feed: ActivityFeed,
    pub settings: Arc<SettingsHandle>,
    pub auth: Arc<AuthIndex>,
    pub version: VersionInfo,
    pub metrics: GatewayMetrics,
}

impl AppState {
    /// Authenticate the caller and gate on the API being enabled; every
    /// endpoint goes through here first.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(Actor, Arc<Settings>), ApiError> {
        let settings = self.settings.get();
        if !settings.enable_api {
            return Err(ApiError::forbidden(
                "Tillbase API is disabled. Enable it in the runtime settings.",
            ));
        }
        let actor = self.auth.resolve(headers)?;
        Ok((actor, settings))
    }
}
