//! Per-client request rate limiting.
//!
//! Each client address owns a token bucket holding up to `burst` tokens,
//! refilled at `requests` per `period`. A request spends one token; a client
//! with an empty bucket is answered with an empty 429.

use std::{
  net::{IpAddr, SocketAddr},
  sync::Arc,
  time::{Duration, Instant},
};

use axum::{
  extract::{ConnectInfo, Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
};
use dashmap::DashMap;

/// Buckets kept before idle, fully refilled ones are swept.
const MAX_TRACKED_CLIENTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
  pub requests: u32,
  pub period:   Duration,
  pub burst:    u32,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
  tokens:  f64,
  updated: Instant,
}

/// Shared limiter state. Cheap to clone.
///
/// Requests without a known peer address (no `ConnectInfo`) share one bucket.
#[derive(Clone)]
pub struct RateLimiter {
  per_sec:  f64,
  capacity: f64,
  buckets:  Arc<DashMap<Option<IpAddr>, Bucket>>,
}

impl RateLimiter {
  /// `None` when `settings` would never admit a request (zero rate or
  /// period), which disables limiting.
  pub fn new(settings: RateLimitSettings) -> Option<Self> {
    if settings.requests == 0 || settings.period.is_zero() {
      return None;
    }
    Some(Self {
      per_sec:  f64::from(settings.requests) / settings.period.as_secs_f64(),
      capacity: f64::from(settings.burst.max(1)),
      buckets:  Arc::new(DashMap::new()),
    })
  }

  /// Spend one token from `client`'s bucket at `now`. Returns `false` when
  /// the bucket is empty.
  pub fn check(&self, client: Option<IpAddr>, now: Instant) -> bool {
    let allowed = {
      let mut bucket = self
        .buckets
        .entry(client)
        .or_insert(Bucket { tokens: self.capacity, updated: now });

      let elapsed = now.saturating_duration_since(bucket.updated).as_secs_f64();
      bucket.tokens = (bucket.tokens + elapsed * self.per_sec).min(self.capacity);
      bucket.updated = now;

      if bucket.tokens >= 1.0 {
        bucket.tokens -= 1.0;
        true
      } else {
        false
      }
    };

    if self.buckets.len() > MAX_TRACKED_CLIENTS {
      self.sweep(now);
    }
    allowed
  }

  /// Drop buckets that have been idle long enough to be full again.
  fn sweep(&self, now: Instant) {
    let refill = Duration::from_secs_f64(self.capacity / self.per_sec);
    self
      .buckets
      .retain(|_, b| now.saturating_duration_since(b.updated) < refill);
  }
}

/// axum middleware applying `limiter` to every request.
pub async fn limit_by_client(
  State(limiter): State<RateLimiter>,
  request: Request,
  next: Next,
) -> Response {
  let client = request
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|ConnectInfo(addr)| addr.ip());

  if !limiter.check(client, Instant::now()) {
    tracing::debug!(client = ?client, "rate limited");
    return StatusCode::TOO_MANY_REQUESTS.into_response();
  }
  next.run(request).await
}
