// src/utils.rs
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::RateLimiter;
use log::{debug, error};
use serde_json::json;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::{ConfigError, RconError, RefreshError};

pub type IpRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

// Separate types so each route group gets its own `app_data` slot.
pub struct ApiLimiter(pub IpRateLimiter);
pub struct RconLimiter(pub IpRateLimiter);

#[derive(Debug)]
pub enum RequestError {
    RateLimitExceeded,
    UnknownServer(String),
    TargetConfig(String),
    Rcon(RconError),
    CacheNotReady,
    CacheCorrupt(String),
    NotFound,
    RefreshBusy,
    Upstream(String),
    Internal(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            Self::UnknownServer(name) => write!(f, "Server '{}' not found", name),
            Self::TargetConfig(msg) => write!(f, "Failed to read server configurations: {}", msg),
            Self::Rcon(e) => write!(f, "Error getting server data: {}", e),
            Self::CacheNotReady => write!(f, "Server list is not available yet"),
            Self::CacheCorrupt(msg) => write!(f, "Cached server list is unreadable: {}", msg),
            Self::NotFound => write!(f, "No servers found"),
            Self::RefreshBusy => write!(f, "A refresh is already running"),
            Self::Upstream(msg) => write!(f, "Upstream listing failed: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::UnknownServer(_) | Self::NotFound => StatusCode::NOT_FOUND,
            Self::Rcon(RconError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Rcon(RconError::Connection(_))
            | Self::Rcon(RconError::Protocol(_))
            | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::RefreshBusy => StatusCode::CONFLICT,
            Self::CacheNotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::Rcon(RconError::Configuration(_))
            | Self::TargetConfig(_)
            | Self::CacheCorrupt(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<RconError> for RequestError {
    fn from(e: RconError) -> Self {
        Self::Rcon(e)
    }
}

impl From<ConfigError> for RequestError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::UnknownServer(name) => Self::UnknownServer(name),
            other => Self::TargetConfig(other.to_string()),
        }
    }
}

impl From<RefreshError> for RequestError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::Busy => Self::RefreshBusy,
            RefreshError::Upstream(e) => Self::Upstream(e.to_string()),
            RefreshError::Encode(e) => Self::Internal(e.to_string()),
        }
    }
}

/// Address of the connecting peer, used as the rate limit key.
pub fn client_ip(req: &HttpRequest) -> IpAddr {
    match req.peer_addr() {
        Some(addr) => addr.ip(),
        None => {
            debug!("Request without peer address, using unspecified");
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        }
    }
}

pub fn check_rate_limit(req: &HttpRequest, limiter: &IpRateLimiter) -> Result<IpAddr, RequestError> {
    let ip = client_ip(req);
    if limiter.check_key(&ip).is_err() {
        error!("Rate limit exceeded for {} on {}", ip, req.path());
        return Err(RequestError::RateLimitExceeded);
    }
    Ok(ip)
}

/// Forgets clients whose quota has fully replenished.
pub fn prune_limiter(limiter: &IpRateLimiter) {
    limiter.retain_recent();
    limiter.shrink_to_fit();
}

/// Periodically prunes both limiters so the per-IP state does not grow
/// with every address ever seen.
pub fn spawn_limiter_pruner(
    api: web::Data<ApiLimiter>,
    rcon: web::Data<RconLimiter>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            prune_limiter(&api.0);
            prune_limiter(&rcon.0);
            debug!(
                "Rate limiter state: {} api clients, {} rcon clients",
                api.0.len(),
                rcon.0.len()
            );
        }
    })
}
