use async_trait::async_trait;
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::parse_users;
use crate::config::Config;
use crate::error::NetworkError;
use crate::models::User;

/// A paginated source of user profiles.
#[async_trait]
pub trait RemoteSource: Send + Sync {
  /// Fetch one remote page of `results` users, normalized and unfavorited.
  async fn fetch_users(&self, page: u32, results: u32) -> Result<Vec<User>, NetworkError>;
}

/// HTTP client for the remote user API
#[derive(Clone)]
pub struct RemoteClient {
  http: reqwest::Client,
  endpoint: Url,
  timeout: Duration,
}

impl RemoteClient {
  pub fn new(config: &Config) -> Result<Self> {
    let timeout = config.request_timeout();
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("userdir/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      endpoint: config.endpoint_url()?,
      timeout,
    })
  }

  /// Build `<endpoint>?page=<n>&results=<count>`
  fn page_url(&self, page: u32, results: u32) -> Url {
    let mut url = self.endpoint.clone();
    url
      .query_pairs_mut()
      .append_pair("page", &page.to_string())
      .append_pair("results", &results.to_string());
    url
  }

  fn classify(&self, e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
      NetworkError::Timeout(self.timeout)
    } else {
      e.into()
    }
  }
}

#[async_trait]
impl RemoteSource for RemoteClient {
  async fn fetch_users(&self, page: u32, results: u32) -> Result<Vec<User>, NetworkError> {
    let url = self.page_url(page, results);
    debug!(%url, "fetching users");

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| self.classify(e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(NetworkError::Status(status.as_u16()));
    }

    let body = response.bytes().await.map_err(|e| self.classify(e))?;
    parse_users(&body, Utc::now())
  }
}
