use std::time::Duration;

use async_trait::async_trait;
use medwiki_core::config::EutilsConfig;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{Result, ScienceError};
use crate::eutils::parser::parse_article_set;
use crate::eutils::types::{PubmedArticle, SearchHandle};
use crate::http::RateLimitedClient;
use crate::sources::LiteratureIndex;

const USER_AGENT: &str = concat!("medwiki/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ESearchEnvelope {
    esearchresult: Option<ESearchResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    count: Option<String>,
    webenv: Option<String>,
    querykey: Option<String>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

/// NCBI E-utilities esearch/efetch client.
pub struct EutilsClient {
    client: RateLimitedClient,
    base_url: String,
    database: String,
    api_key: String,
}

impl EutilsClient {
    /// Pacing before window fetches is the pipeline's job, so requests here
    /// go out without a minimum interval.
    pub fn new(api_key: impl Into<String>, config: &EutilsConfig) -> Result<Self> {
        Self::with_params(
            &config.base_url,
            &config.database,
            api_key,
            Duration::ZERO,
            config.max_retries,
        )
    }

    pub fn with_params(
        base_url: &str,
        database: &str,
        api_key: impl Into<String>,
        min_interval: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ScienceError::MissingCredential("NCBI E-utilities".to_string()));
        }
        Ok(Self {
            client: RateLimitedClient::new(min_interval, max_retries, USER_AGENT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            database: database.to_string(),
            api_key,
        })
    }

    #[instrument(skip(self))]
    async fn esearch(&self, query: &str) -> Result<SearchHandle> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let params = [
            ("api_key", self.api_key.clone()),
            ("db", self.database.clone()),
            ("term", query.to_string()),
            ("retmode", "json".to_string()),
            ("usehistory", "y".to_string()),
            ("retmax", "1".to_string()),
        ];

        let envelope: ESearchEnvelope = self.client.get_json(&url, &params).await?;
        if let Some(error) = envelope.error {
            return Err(ScienceError::ApiError("esearch".to_string(), error));
        }
        let result = envelope.esearchresult.ok_or_else(|| {
            ScienceError::Parse("esearch response has no esearchresult".to_string())
        })?;
        if let Some(error) = result.error {
            return Err(ScienceError::ApiError("esearch".to_string(), error));
        }

        let count = result
            .count
            .as_deref()
            .map(str::trim)
            .unwrap_or("0")
            .parse::<usize>()
            .map_err(|e| ScienceError::Parse(format!("esearch count: {e}")))?;
        let web_env = result.webenv.unwrap_or_default();
        let query_key = result.querykey.unwrap_or_default();
        if count > 0 && (web_env.is_empty() || query_key.is_empty()) {
            return Err(ScienceError::Parse(
                "esearch response has no history handle".to_string(),
            ));
        }

        debug!(count, "esearch complete");
        Ok(SearchHandle {
            count,
            web_env,
            query_key,
        })
    }

    #[instrument(skip(self, handle), fields(query_key = %handle.query_key))]
    async fn efetch(
        &self,
        handle: &SearchHandle,
        offset: usize,
        size: usize,
    ) -> Result<Vec<PubmedArticle>> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let params = [
            ("db", self.database.clone()),
            ("WebEnv", handle.web_env.clone()),
            ("query_key", handle.query_key.clone()),
            ("retmode", "xml".to_string()),
            ("retstart", offset.to_string()),
            ("retmax", size.to_string()),
            ("api_key", self.api_key.clone()),
        ];

        let xml = self.client.get_with_query(&url, &params).await?;
        let articles = parse_article_set(&xml)?;
        debug!(returned = articles.len(), "efetch window complete");
        Ok(articles)
    }
}

#[async_trait]
impl LiteratureIndex for EutilsClient {
    async fn search(&self, query: &str) -> Result<SearchHandle> {
        self.esearch(query).await
    }

    async fn fetch_window(
        &self,
        handle: &SearchHandle,
        offset: usize,
        size: usize,
    ) -> Result<Vec<PubmedArticle>> {
        self.efetch(handle, offset, size).await
    }
}
