// src/filter.rs
use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{ResolveError, Resolver};
use log::{debug, warn};

use crate::models::listing::ListedServer;

pub const ADDRESS_KEY: &str = "address";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriterion {
    pub key: String,
    pub value: String,
}

impl FilterCriterion {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Records that expose their attributes by external (wire) name.
pub trait Filterable {
    /// String form of the attribute called `key`, or `None` if the record
    /// has no such attribute.
    fn attribute(&self, key: &str) -> Option<String>;
}

impl Filterable for ListedServer {
    fn attribute(&self, key: &str) -> Option<String> {
        let value = match key {
            "server_id" => self.server_id.clone(),
            "namespace" => self.namespace.clone(),
            "type" => self.kind.clone(),
            "region" => self.region.clone(),
            "name" => self.name.clone(),
            "map_name" => self.map_name.clone(),
            "description" => self.description.clone(),
            "address" => self.address.clone(),
            "port" => self.port.to_string(),
            "is_password" => self.is_password.to_string(),
            "version" => self.version.clone(),
            "created_at" => self.created_at.to_string(),
            "update_at" => self.update_at.to_string(),
            "world_guid" => self.world_guid.clone(),
            "current_players" => self.current_players.to_string(),
            "max_players" => self.max_players.to_string(),
            "days" => self.days.to_string(),
            "server_time" => self.server_time.to_string(),
            _ => return None,
        };
        Some(value)
    }
}

/// Keeps the records matching every criterion exactly. A key no record
/// declares matches nothing.
pub fn filter<T>(records: &[T], criteria: &[FilterCriterion]) -> Vec<T>
where
    T: Filterable + Clone,
{
    let mut kept: Vec<T> = records.to_vec();
    for criterion in criteria {
        let before = kept.len();
        kept.retain(|record| {
            record
                .attribute(&criterion.key)
                .is_some_and(|value| value == criterion.value)
        });
        debug!(
            "Filter {}={}: {} -> {} records",
            criterion.key,
            criterion.value,
            before,
            kept.len()
        );
    }
    kept
}

#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn first_ipv4(&self, host: &str) -> Result<Ipv4Addr, String>;
}

/// Rewrites `address` criteria that name a host into its first IPv4
/// address. Criteria whose host cannot be resolved are dropped so they
/// do not narrow the result.
pub async fn resolve_addresses<R>(criteria: Vec<FilterCriterion>, resolver: &R) -> Vec<FilterCriterion>
where
    R: HostResolver + ?Sized,
{
    let mut resolved = Vec::with_capacity(criteria.len());
    for criterion in criteria {
        if criterion.key != ADDRESS_KEY
            || criterion.value.parse::<IpAddr>().is_ok()
            || !is_domain(&criterion.value)
        {
            resolved.push(criterion);
            continue;
        }

        match resolver.first_ipv4(&criterion.value).await {
            Ok(ip) => {
                debug!("Resolved {} to {}", criterion.value, ip);
                resolved.push(FilterCriterion::new(ADDRESS_KEY, ip.to_string()));
            }
            Err(e) => warn!(
                "Cannot resolve {}, ignoring address filter: {}",
                criterion.value, e
            ),
        }
    }
    resolved
}

fn is_domain(value: &str) -> bool {
    !value.is_empty() && value.split('.').all(|label| !label.is_empty())
}

/// DNS-backed [`HostResolver`].
pub struct DnsResolver {
    inner: Resolver<TokioConnectionProvider>,
}

impl DnsResolver {
    pub fn new() -> Self {
        let inner = Resolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        )
        .build();
        Self { inner }
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn first_ipv4(&self, host: &str) -> Result<Ipv4Addr, String> {
        let lookup = self
            .inner
            .lookup_ip(host)
            .await
            .map_err(|e: ResolveError| e.to_string())?;
        lookup
            .iter()
            .find_map(|ip| match ip {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| format!("no IPv4 address found for {}", host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn server(id: &str, kind: &str, region: &str, address: &str) -> ListedServer {
        ListedServer {
            server_id: id.to_string(),
            kind: kind.to_string(),
            region: region.to_string(),
            address: address.to_string(),
            port: 8211,
            ..Default::default()
        }
    }

    fn ids(records: &[ListedServer]) -> Vec<&str> {
        records.iter().map(|r| r.server_id.as_str()).collect()
    }

    fn sample() -> Vec<ListedServer> {
        vec![
            server("a", "Steam", "NA", "10.0.0.1"),
            server("b", "Steam", "EU", "10.0.0.2"),
            server("c", "Xbox", "NA", "10.0.0.3"),
            server("d", "Steam", "NA", "10.0.0.4"),
        ]
    }

    struct StaticResolver(HashMap<&'static str, Ipv4Addr>);

    #[async_trait]
    impl HostResolver for StaticResolver {
        async fn first_ipv4(&self, host: &str) -> Result<Ipv4Addr, String> {
            self.0
                .get(host)
                .copied()
                .ok_or_else(|| format!("unknown host {}", host))
        }
    }

    fn resolver() -> StaticResolver {
        StaticResolver(HashMap::from([("play.example.com", Ipv4Addr::new(10, 0, 0, 3))]))
    }

    #[test]
    fn criteria_are_anded() {
        let kept = filter(
            &sample(),
            &[
                FilterCriterion::new("type", "Steam"),
                FilterCriterion::new("region", "NA"),
            ],
        );
        assert_eq!(ids(&kept), vec!["a", "d"]);
    }

    #[test]
    fn criteria_order_does_not_matter() {
        let type_first = filter(
            &sample(),
            &[
                FilterCriterion::new("type", "Steam"),
                FilterCriterion::new("region", "NA"),
            ],
        );
        let region_first = filter(
            &sample(),
            &[
                FilterCriterion::new("region", "NA"),
                FilterCriterion::new("type", "Steam"),
            ],
        );
        assert_eq!(type_first, region_first);
    }

    #[test]
    fn matches_exactly_after_stringification() {
        assert_eq!(filter(&sample(), &[FilterCriterion::new("port", "8211")]).len(), 4);
        assert!(filter(&sample(), &[FilterCriterion::new("port", "821")]).is_empty());
        assert!(filter(&sample(), &[FilterCriterion::new("type", "steam")]).is_empty());
        assert_eq!(
            filter(&sample(), &[FilterCriterion::new("is_password", "false")]).len(),
            4
        );
    }

    #[test]
    fn unknown_key_yields_nothing() {
        assert!(filter(&sample(), &[FilterCriterion::new("colour", "red")]).is_empty());
    }

    #[test]
    fn no_criteria_keeps_everything() {
        assert_eq!(filter(&sample(), &[]), sample());
    }

    #[tokio::test]
    async fn hostname_filters_like_its_address() {
        let by_host = resolve_addresses(
            vec![FilterCriterion::new(ADDRESS_KEY, "play.example.com")],
            &resolver(),
        )
        .await;
        let by_ip = vec![FilterCriterion::new(ADDRESS_KEY, "10.0.0.3")];
        assert_eq!(by_host, by_ip);
        assert_eq!(filter(&sample(), &by_host), filter(&sample(), &by_ip));
        assert_eq!(ids(&filter(&sample(), &by_host)), vec!["c"]);
    }

    #[tokio::test]
    async fn unresolvable_host_is_skipped() {
        let criteria = resolve_addresses(
            vec![
                FilterCriterion::new(ADDRESS_KEY, "nowhere.invalid"),
                FilterCriterion::new("region", "NA"),
            ],
            &resolver(),
        )
        .await;
        assert_eq!(criteria, vec![FilterCriterion::new("region", "NA")]);
        assert_eq!(ids(&filter(&sample(), &criteria)), vec!["a", "c", "d"]);
    }

    #[tokio::test]
    async fn literal_addresses_pass_through() {
        let criteria = vec![
            FilterCriterion::new(ADDRESS_KEY, "10.0.0.1"),
            FilterCriterion::new("name", "play.example.com"),
        ];
        assert_eq!(resolve_addresses(criteria.clone(), &resolver()).await, criteria);
    }

    #[test]
    fn domain_shape() {
        assert!(is_domain("example.com"));
        assert!(is_domain("localhost"));
        assert!(!is_domain("bad..name"));
        assert!(!is_domain(""));
    }
}
