// src/upstream.rs
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::debug;

use crate::error::UpstreamError;
use crate::models::listing::ServerListPage;
use crate::storage::refresh::PageSource;

lazy_static! {
    static ref LIST_PATH: &'static str = "/server/list";
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the public community-server listing API.
pub struct ListingClient {
    http: reqwest::Client,
    base_url: String,
}

impl ListingClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("palquery/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn list_url(&self) -> String {
        format!("{}{}", self.base_url, *LIST_PATH)
    }
}

#[async_trait]
impl PageSource for ListingClient {
    async fn fetch_page(&self, page: u32) -> Result<ServerListPage, UpstreamError> {
        let url = self.list_url();
        debug!("GET {} page {}", url, page);

        let response = self
            .http
            .get(&url)
            .query(&[("page", page)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }
        Ok(response.json::<ServerListPage>().await?)
    }
}
