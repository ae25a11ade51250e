//! HTTP server assembly for scrawl.
//!
//! Loads [`ServerConfig`], and wraps the report router in the middleware
//! chain every deployment runs with. The binary in `main.rs` only wires the
//! pieces together and binds the listener.

pub mod ratelimit;

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use axum::{
  Json, Router,
  body::Body,
  extract::{ConnectInfo, DefaultBodyLimit},
  http::Request,
  middleware,
  routing::get,
};
use config::{Config, ConfigError, Environment, File, Map, builder::DefaultState};
use scrawl_api::{ReportHandler, reports_router};
use scrawl_core::{
  normalize::NormalizerKind,
  notify::{Notifier, NotifyPolicy},
  store::ReportStore,
};
use scrawl_discord::{DEFAULT_API_BASE, DiscordConfig};
use scrawl_store_sql::PoolSettings;
use serde::Deserialize;
use serde_json::{Value, json};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
  catch_panic::CatchPanicLayer,
  cors::CorsLayer,
  request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
  timeout::TimeoutLayer,
  trace::TraceLayer,
};

use crate::ratelimit::{RateLimitSettings, RateLimiter, limit_by_client};

/// Environment prefix for every configuration key (`SCRAWL_PORT`, ...).
pub const ENV_PREFIX: &str = "SCRAWL";

/// Deployment variables honoured without the prefix. They take precedence
/// over both the file and the `SCRAWL_*` variables.
const CONVENTIONAL_VARS: &[(&str, &str)] = &[
  ("database_url", "DATABASE_URL"),
  ("port", "PORT"),
  ("discord_token", "DISCORD_TOKEN"),
  ("discord_channel", "DISCORD_CHANNEL"),
];

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub database_url:           String,
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  #[serde(default = "default_max_connections")]
  pub max_connections:        u32,
  #[serde(default = "default_thirty")]
  pub acquire_timeout_secs:   u64,
  #[serde(default = "default_connect_attempts")]
  pub connect_attempts:       u32,
  #[serde(default = "default_thirty")]
  pub request_timeout_secs:   u64,
  #[serde(default = "default_body_limit")]
  pub body_limit_bytes:       usize,
  #[serde(default = "default_max_in_flight")]
  pub max_in_flight:          usize,
  #[serde(default = "default_rate_limit_requests")]
  pub rate_limit_requests:    u32,
  #[serde(default = "default_rate_limit_period")]
  pub rate_limit_period_secs: u64,
  #[serde(default = "default_rate_limit_burst")]
  pub rate_limit_burst:       u32,
  #[serde(default)]
  pub normalizer:             NormalizerKind,
  #[serde(default)]
  pub discord_token:          Option<String>,
  #[serde(default)]
  pub discord_channel:        Option<String>,
  #[serde(default = "default_api_base")]
  pub discord_api_base:       String,
  #[serde(default = "default_true")]
  pub notify_required:        bool,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_connections() -> u32 { 10 }
fn default_connect_attempts() -> u32 { 10 }
fn default_thirty() -> u64 { 30 }
fn default_body_limit() -> usize { 1024 * 1024 }
fn default_max_in_flight() -> usize { 1024 }
fn default_rate_limit_requests() -> u32 { 60 }
fn default_rate_limit_period() -> u64 { 60 }
fn default_rate_limit_burst() -> u32 { 20 }
fn default_api_base() -> String { DEFAULT_API_BASE.to_string() }
fn default_true() -> bool { true }

impl ServerConfig {
  /// Layer the optional TOML file at `path`, `SCRAWL_*` variables and the
  /// conventional deployment variables, in increasing precedence.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let builder = Config::builder().add_source(File::from(path).required(false));
    Self::from_builder(builder, None)
  }

  /// Finish `builder` with the environment layers. `vars` replaces the
  /// process environment when given.
  fn from_builder(
    builder: config::ConfigBuilder<DefaultState>,
    vars: Option<Map<String, String>>,
  ) -> Result<Self, ConfigError> {
    let lookup = |name: &str| match &vars {
      Some(vars) => vars.get(name).cloned(),
      None => std::env::var(name).ok(),
    };

    let mut builder =
      builder.add_source(Environment::with_prefix(ENV_PREFIX).source(vars.clone()));
    for (key, name) in CONVENTIONAL_VARS {
      builder = builder.set_override_option(*key, lookup(name))?;
    }

    builder.build()?.try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn pool_settings(&self) -> PoolSettings {
    PoolSettings {
      max_connections:  self.max_connections,
      acquire_timeout:  Duration::from_secs(self.acquire_timeout_secs),
      connect_attempts: self.connect_attempts,
    }
  }

  /// Per-client limit; `rate_limit_requests = 0` turns it off.
  pub fn rate_limit(&self) -> RateLimitSettings {
    RateLimitSettings {
      requests: self.rate_limit_requests,
      period:   Duration::from_secs(self.rate_limit_period_secs),
      burst:    self.rate_limit_burst,
    }
  }

  pub fn notify_policy(&self) -> NotifyPolicy { NotifyPolicy::from_required(self.notify_required) }

  /// Discord settings, if both a token and a channel are configured.
  ///
  /// Only one of the two disables notification and logs a warning.
  pub fn discord_config(&self) -> Option<DiscordConfig> {
    match (&self.discord_token, &self.discord_channel) {
      (Some(token), Some(channel)) => {
        let mut config = DiscordConfig::new(token, channel);
        config.api_base = self.discord_api_base.clone();
        Some(config)
      }
      (None, None) => None,
      (token, _) => {
        let missing = if token.is_some() { "discord_channel" } else { "discord_token" };
        tracing::warn!(missing, "incomplete Discord settings, notifications disabled");
        None
      }
    }
  }
}

// ─── Application ──────────────────────────────────────────────────────────────

/// `GET /health`
async fn health() -> Json<Value> {
  Json(json!({
    "status":  "ok",
    "service": env!("CARGO_PKG_NAME"),
    "version": env!("CARGO_PKG_VERSION"),
  }))
}

/// One span per request, tagged with the request id and, when served with
/// connect info, the client address.
fn request_span(req: &Request<Body>) -> tracing::Span {
  let request_id = req
    .headers()
    .get("x-request-id")
    .and_then(|v| v.to_str().ok())
    .unwrap_or("-");
  let client = req
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|ConnectInfo(addr)| addr.to_string())
    .unwrap_or_else(|| "-".to_string());

  tracing::info_span!(
    "request",
    method = %req.method(),
    path = %req.uri().path(),
    %request_id,
    %client,
  )
}

/// Build the full application: report routes, health check and middleware.
pub fn app<S, N>(handler: Arc<ReportHandler<S, N>>, config: &ServerConfig) -> Router
where
  S: ReportStore + 'static,
  N: Notifier + 'static,
{
  let mut router = Router::new()
    .route("/health", get(health))
    .merge(reports_router(handler))
    .layer(DefaultBodyLimit::max(config.body_limit_bytes))
    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
    .layer(CorsLayer::permissive())
    .layer(GlobalConcurrencyLimitLayer::new(config.max_in_flight));

  if let Some(limiter) = RateLimiter::new(config.rate_limit()) {
    router = router.layer(middleware::from_fn_with_state(limiter, limit_by_client));
  }

  router
    .layer(TraceLayer::new_for_http().make_span_with(request_span))
    .layer(PropagateRequestIdLayer::x_request_id())
    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    .layer(CatchPanicLayer::new())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
