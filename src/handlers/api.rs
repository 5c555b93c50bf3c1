// src/handlers/api.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, error, info};

use crate::config::Config;
use crate::filter::{self, DnsResolver, FilterCriterion};
use crate::models::listing::ListedServer;
use crate::storage::cache::SnapshotCache;
use crate::storage::refresh::{self, PageSource};
use crate::utils::{check_rate_limit, ApiLimiter, RequestError};

/// Free-text search term; never treated as an attribute filter.
pub const SEARCH_KEY: &str = "q";

pub async fn search_servers(
    req: HttpRequest,
    query: web::Query<Vec<(String, String)>>,
    cache: web::Data<SnapshotCache>,
    config: web::Data<Config>,
    resolver: web::Data<DnsResolver>,
    rate_limiter: web::Data<ApiLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate_limit(&req, &rate_limiter.0)?;

    let payload = tokio::time::timeout(config.cache_wait(), cache.get())
        .await
        .map_err(|_| {
            error!("Server list still loading after {:?}", config.cache_wait());
            RequestError::CacheNotReady
        })?;
    let servers: Vec<ListedServer> = serde_json::from_slice(&payload)
        .map_err(|e| RequestError::CacheCorrupt(e.to_string()))?;

    let (search, criteria) = split_query(query.into_inner());
    let servers = match search {
        Some(term) => search_by_name(servers, &term),
        None => servers,
    };

    let criteria = filter::resolve_addresses(criteria, resolver.get_ref()).await;
    let matched = filter::filter(&servers, &criteria);
    debug!("{} of {} servers matched", matched.len(), servers.len());

    shape(matched)
}

pub async fn refresh_servers(
    req: HttpRequest,
    cache: web::Data<SnapshotCache>,
    source: web::Data<dyn PageSource>,
    rate_limiter: web::Data<ApiLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate_limit(&req, &rate_limiter.0)?;

    let count = refresh::refresh_if_idle(cache.get_ref(), source.get_ref()).await?;
    info!("On-demand refresh stored {} servers", count);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "servers": count })))
}

/// Separates the search term from attribute filters, keeping the first
/// value of every key in query order.
pub fn split_query(pairs: Vec<(String, String)>) -> (Option<String>, Vec<FilterCriterion>) {
    let mut search = None;
    let mut criteria: Vec<FilterCriterion> = Vec::new();
    for (key, value) in pairs {
        if key == SEARCH_KEY {
            search.get_or_insert(value);
        } else if !criteria.iter().any(|c| c.key == key) {
            criteria.push(FilterCriterion::new(key, value));
        }
    }
    (search.filter(|term| !term.trim().is_empty()), criteria)
}

/// Case-insensitive substring match on the server name.
pub fn search_by_name(servers: Vec<ListedServer>, term: &str) -> Vec<ListedServer> {
    let needle = term.trim().to_lowercase();
    servers
        .into_iter()
        .filter(|server| server.name.to_lowercase().contains(&needle))
        .collect()
}

fn shape(mut matched: Vec<ListedServer>) -> Result<HttpResponse, RequestError> {
    match matched.len() {
        0 => Err(RequestError::NotFound),
        1 => Ok(HttpResponse::Ok().json(matched.remove(0))),
        _ => Ok(HttpResponse::Ok().json(matched)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cache::CacheConfig;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use actix_web::ResponseError;
    use governor::RateLimiter;
    use std::time::Duration;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn named(name: &str) -> ListedServer {
        ListedServer {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn search_term_is_not_a_criterion() {
        let (search, criteria) = split_query(pairs(&[
            ("region", "NA"),
            ("q", "pal"),
            ("type", "Steam"),
            ("region", "EU"),
        ]));
        assert_eq!(search.as_deref(), Some("pal"));
        assert_eq!(
            criteria,
            vec![
                FilterCriterion::new("region", "NA"),
                FilterCriterion::new("type", "Steam"),
            ]
        );
    }

    #[test]
    fn blank_search_is_ignored() {
        let (search, criteria) = split_query(pairs(&[("q", "  ")]));
        assert!(search.is_none());
        assert!(criteria.is_empty());
    }

    #[test]
    fn search_matches_substring_ignoring_case() {
        let found = search_by_name(
            vec![named("Pal Land"), named("Friends"), named("PALACE")],
            "pal",
        );
        let names: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Pal Land", "PALACE"]);
    }

    #[test]
    fn response_shape_follows_cardinality() {
        let err = shape(Vec::new()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(shape(vec![named("a")]).unwrap().status(), StatusCode::OK);
        assert_eq!(shape(vec![named("a"), named("b")]).unwrap().status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn cold_cache_answers_unavailable_after_wait() {
        let dir = tempfile::tempdir().unwrap();
        let cache = web::Data::new(SnapshotCache::new(CacheConfig {
            path: dir.path().join("servers.json"),
            max_age: Duration::from_secs(3600),
            refresh_interval: Duration::from_secs(60),
        }));
        let config = web::Data::new(Config {
            cache_wait_secs: 0,
            ..Config::default()
        });
        let limiter = web::Data::new(ApiLimiter(RateLimiter::keyed(config.api_quota())));
        let req = TestRequest::default()
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .to_http_request();

        let err = search_servers(
            req,
            web::Query(Vec::new()),
            cache,
            config,
            web::Data::new(DnsResolver::new()),
            limiter,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
