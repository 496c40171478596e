use crate::routes;
use crate::state::{AppState, AuthIndex, GatewayMetrics, VersionInfo};
use anyhow::{anyhow, Context};
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use config::Config;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tillbase_config::{load_settings, SettingsHandle};
use tillbase_observe::prelude::*;
use tillbase_rates::prelude::{NullRateSource, RateResolver};
use tillbase_storage::prelude::*;
use tillbase_sync::prelude::{DocQuoteStore, SyncPlanner};
use tillbase_tx::memory::InMemoryIdempoStore;
use tillbase_tx::prelude::now_ms;
use tillbase_tx::IdempoStore;
use tillbase_tx::MutationExecutor;
use tillbase_types::prelude::{Actor, Id};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    let config = GatewayConfig::load()?;
    let state = build_state(&config).await?;
    spawn_sweep_task(&state);

    let app = router(state.clone())
        .layer(from_fn_with_state(state, metrics_middleware));

    let addr: SocketAddr = format!("{}:{}", config.server.address, config.server.port)
        .parse()
        .context("invalid server address/port")?;

    info!(%addr, "tillbase gateway listening");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server failure")?;

    Ok(())
}

pub fn init_tracing() {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .finish(),
    )
    .is_err()
    {
        // Subscriber already set by tests or external runtime.
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/version", get(routes::version))
        .route("/metrics", get(routes::metrics))
        .route("/api/v1/sync/bootstrap", post(routes::sync_bootstrap))
        .route("/api/v1/sync/delta", post(routes::sync_delta))
        .route("/api/v1/inventory/alerts", post(routes::inventory_alerts))
        .route("/api/v1/customers/summary", post(routes::customers_summary))
        .route("/api/v1/profiles/mine", post(routes::profiles_mine))
        .route("/api/v1/activity/list", post(routes::activity_list))
        .route("/api/v1/settings/get", post(routes::settings_get))
        .route("/api/v1/settings/update", post(routes::settings_update))
        .route("/api/v1/invoices/create-submit", post(routes::invoice_create_submit))
        .route("/api/v1/invoices/cancel", post(routes::invoice_cancel))
        .route("/api/v1/payments/receive", post(routes::payment_receive))
        .route("/api/v1/payments/pay", post(routes::payment_pay))
        .route(
            "/api/v1/payments/internal-transfer",
            post(routes::payment_internal_transfer),
        )
        .route("/api/v1/sessions/open", post(routes::session_open))
        .route("/api/v1/sessions/close", post(routes::session_close))
        .with_state(state)
}

pub async fn build_state(config: &GatewayConfig) -> anyhow::Result<AppState> {
    let settings = load_settings(config.settings_file.as_deref())
        .map_err(|err| anyhow!("settings load failed: {err}"))?;
    let retention_ms = settings.idempotency_retention_ms();
    let settings = Arc::new(SettingsHandle::new(settings));

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
    let checker: Arc<dyn PermissionChecker> = config.permission_checker();

    // Capability descriptor resolved once at startup; consumers never
    // probe the schema per call.
    let caps = store
        .capabilities()
        .await
        .map_err(|err| anyhow!("capability resolution failed: {err}"))?;

    let resolver = RateResolver::new(
        Arc::new(NullRateSource),
        Arc::new(DocQuoteStore::new(store.clone())),
    );
    let planner = SyncPlanner::new(store.clone(), caps.clone(), resolver);

    let executor = Arc::new(MutationExecutor::new(InMemoryIdempoStore::new(retention_ms)));
    let recorder: Arc<dyn ActivityRecorder> = Arc::new(StoreActivityRecorder::new(store.clone()));
    let feed = ActivityFeed::new(store.clone());

    Ok(AppState {
        store,
        checker,
        caps,
        planner,
        executor,
        recorder,
        feed,
        settings,
        auth: Arc::new(config.auth_index()?),
        version: VersionInfo::from_env(),
        metrics: GatewayMetrics::default(),
    })
}

pub fn spawn_sweep_task(state: &AppState) {
    let executor = state.executor.clone();
    let settings = state.settings.clone();
    tokio::spawn(async move {
        loop {
            let interval = settings.get().sweep_interval_secs.max(1);
            tokio::time::sleep(Duration::from_secs(interval)).await;
            match executor.store().sweep(now_ms()).await {
                Ok(purged) if purged > 0 => {
                    info!(target: "tillbase::gateway", purged, "idempotency sweep");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "tillbase::gateway", "idempotency sweep failed: {err:?}");
                }
            }
        }
    });
}

pub async fn metrics_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    state.metrics.record(
        &path,
        status.is_client_error() || status.is_server_error(),
        start.elapsed().as_millis() as u64,
    );
    response
}

pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("shutdown signal listener failed: {err}");
    }
    info!("shutting down");
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub settings_file: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub permissions: Vec<PermissionRuleConfig>,
}

impl GatewayConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_file = std::env::var("TILLBASE_GATEWAY_CONFIG")
            .unwrap_or_else(|_| "config/gateway.toml".to_string());

        let mut builder = Config::builder()
            .set_default("server.address", ServerConfig::default_address())?
            .set_default("server.port", ServerConfig::default_port())?;

        if Path::new(&config_file).exists() {
            builder = builder.add_source(config::File::from(Path::new(&config_file)));
        }
        builder = builder
            .add_source(config::Environment::with_prefix("TILLBASE_GATEWAY").separator("__"));

        let config: GatewayConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        Ok(config)
    }

    pub fn auth_index(&self) -> anyhow::Result<AuthIndex> {
        let mut tokens = HashMap::new();
        for token in &self.auth.tokens {
            let (secret, actor) = token.resolve()?;
            tokens.insert(secret, actor);
        }
        Ok(AuthIndex {
            tokens,
            allow_anonymous: self.auth.allow_anonymous,
            anonymous_roles: self.auth.anonymous_roles.clone(),
        })
    }

    pub fn permission_checker(&self) -> Arc<dyn PermissionChecker> {
        if self.permissions.is_empty() {
            return Arc::new(AllowAll);
        }
        let mut checker = RoleMatrixChecker::default();
        for rule in &self.permissions {
            let roles: Vec<&str> = rule.roles.iter().map(String::as_str).collect();
            checker = checker.allow(&rule.doctype, rule.action, &roles);
        }
        Arc::new(checker)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_address")]
    address: String,
    #[serde(default = "ServerConfig::default_port")]
    port: u16,
}

impl ServerConfig {
    fn default_address() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: Self::default_address(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_allow_anonymous")]
    allow_anonymous: bool,
    #[serde(default)]
    anonymous_roles: Vec<String>,
    #[serde(default)]
    tokens: Vec<ApiTokenConfig>,
}

impl AuthConfig {
    fn default_allow_anonymous() -> bool {
        true
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            allow_anonymous: Self::default_allow_anonymous(),
            anonymous_roles: Vec::new(),
            tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiTokenConfig {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    token_env: Option<String>,
    user: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

impl ApiTokenConfig {
    fn resolve(&self) -> anyhow::Result<(String, Actor)> {
        let secret = if let Some(env_var) = &self.token_env {
            std::env::var(env_var)
                .with_context(|| format!("token env {env_var} for {} not set", self.user))?
        } else {
            self.token
                .clone()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| anyhow!("token for {} must be set via token or token_env", self.user))?
        };
        Ok((
            secret,
            Actor {
                user: Id(self.user.clone()),
                full_name: self.full_name.clone(),
                roles: self.roles.clone(),
            },
        ))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PermissionRuleConfig {
    doctype: String,
    action: Action,
    roles: Vec<String>,
}
