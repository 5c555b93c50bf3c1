// src/main.rs
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use env_logger::Env;
use governor::RateLimiter;
use log::{error, info};

use palquery::config::{self, Config};
use palquery::filter::DnsResolver;
use palquery::handlers;
use palquery::storage::cache::SnapshotCache;
use palquery::storage::refresh::{self, PageSource};
use palquery::upstream::ListingClient;
use palquery::utils::{self, ApiLimiter, RconLimiter};

const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logger only once at the start
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();

    if let Ok(json) = std::env::var("CONFIG_JSON") {
        if let Err(e) = config::write_targets_from_json(&json, &config.rcon_config_path, &config.logs_path) {
            error!("Error generating rcon targets from CONFIG_JSON: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    }

    let cache = Arc::new(SnapshotCache::load(config.cache_config()));
    let client = ListingClient::new(config.api_base_url.clone()).map_err(|e| {
        error!("Failed to build upstream client: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let source: Arc<dyn PageSource> = Arc::new(client);
    refresh::spawn_refresher(cache.clone(), source.clone());

    let bind = config.bind();
    let cache = web::Data::from(cache);
    let source: web::Data<dyn PageSource> = web::Data::from(source);
    let resolver = web::Data::new(DnsResolver::new());
    let api_rate_limiter = web::Data::new(ApiLimiter(RateLimiter::keyed(config.api_quota())));
    let rcon_rate_limiter = web::Data::new(RconLimiter(RateLimiter::keyed(config.rcon_quota())));
    utils::spawn_limiter_pruner(
        api_rate_limiter.clone(),
        rcon_rate_limiter.clone(),
        LIMITER_PRUNE_INTERVAL,
    );
    let config = web::Data::new(config);

    info!("Starting server on {}", bind);
    HttpServer::new(move || {
        App::new()
            .app_data(cache.clone())
            .app_data(source.clone())
            .app_data(resolver.clone())
            .app_data(config.clone())
            .app_data(api_rate_limiter.clone())
            .app_data(rcon_rate_limiter.clone())
            .route("/", web::get().to(handlers::index::index))
            .route("/healthz", web::get().to(handlers::health::healthz))
            .route("/rcon/", web::get().to(handlers::servers::get_servers))
            .route("/rcon/{name}", web::get().to(handlers::servers::get_server))
            .route("/api", web::get().to(handlers::api::search_servers))
            .route("/api/refresh", web::post().to(handlers::api::refresh_servers))
    })
        .bind(&bind)?
        .run().await
}
