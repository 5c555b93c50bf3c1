// src/handlers/servers.rs
use std::collections::BTreeMap;
use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use log::{error, info};

use crate::config::{self, Config, RconTarget};
use crate::error::RconError;
use crate::models::server::ServerRecord;
use crate::rcon;
use crate::utils::{check_rate_limit, RconLimiter, RequestError};

/// Status of every configured target. A target that cannot be queried is
/// reported offline instead of failing the whole response.
pub async fn get_servers(
    req: HttpRequest,
    config: web::Data<Config>,
    rate_limiter: web::Data<RconLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate_limit(&req, &rate_limiter.0)?;

    let targets = config::load_targets(&config.rcon_config_path)?;
    let default_timeout = config.rcon_timeout();

    let pending: Vec<_> = targets
        .into_iter()
        .map(|(name, target)| {
            let handle = tokio::task::spawn_blocking(move || run_query(target, default_timeout));
            (name, handle)
        })
        .collect();

    let mut records = BTreeMap::new();
    for (name, handle) in pending {
        let record = match handle.await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                error!("Error getting server data for {}: {}", name, e);
                ServerRecord::offline()
            }
            Err(e) => {
                error!("Query task for {} failed: {}", name, e);
                ServerRecord::offline()
            }
        };
        records.insert(name, record);
    }

    info!("Sent data for {} servers to client", records.len());
    Ok(HttpResponse::Ok().json(records))
}

pub async fn get_server(
    req: HttpRequest,
    path: web::Path<String>,
    config: web::Data<Config>,
    rate_limiter: web::Data<RconLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate_limit(&req, &rate_limiter.0)?;

    let name = path.into_inner();
    let target = config::find_target(&config.rcon_config_path, &name)?;
    let default_timeout = config.rcon_timeout();

    let record = tokio::task::spawn_blocking(move || run_query(target, default_timeout))
        .await
        .map_err(|e| RequestError::Internal(e.to_string()))?
        .map_err(|e| {
            error!("Error getting server data for {}: {}", name, e);
            RequestError::from(e)
        })?;

    info!("Sent server data for {} to client", name);
    Ok(HttpResponse::Ok().json(record))
}

fn run_query(target: RconTarget, default_timeout: Duration) -> Result<ServerRecord, RconError> {
    let timeout = target.timeout_or(default_timeout);
    rcon::query_server(&target.address, &target.password, timeout)
}
