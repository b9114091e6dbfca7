use super::{ElectionSource, FetchError, NameLookup, Result};
use crate::model::election::{ElectionPage, PageSize};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

/// Election platform API reached over HTTP.
#[derive(Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct NameResponse {
    name: String,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("{} returned {}", url, status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ElectionSource for HttpSource {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, page: u32, size: PageSize) -> Result<ElectionPage> {
        let url = format!("{}/elections/concluded", self.base_url);
        self.get_json(
            &url,
            &[("page", page.to_string()), ("limit", size.get().to_string())],
        )
        .await
    }
}

#[async_trait]
impl NameLookup for HttpSource {
    #[instrument(level = "debug", skip(self))]
    async fn lookup_name(&self, identifier: &str) -> Result<String> {
        let url = format!("{}/users/{}", self.base_url, identifier);
        let body: NameResponse = self.get_json(&url, &[]).await?;
        Ok(body.name)
    }
}
