use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use medwiki_core::config::WikidataConfig;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::http::RateLimitedClient;
use crate::sources::{Binding, EntityQuery};

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

/// Wikidata Query Service client (SPARQL 1.1 JSON results).
pub struct WikidataClient {
    client: RateLimitedClient,
    sparql_url: String,
}

impl WikidataClient {
    pub fn new(config: &WikidataConfig) -> Result<Self> {
        Self::with_params(
            &config.sparql_url,
            &config.user_agent,
            Duration::ZERO,
            config.max_retries,
        )
    }

    pub fn with_params(
        sparql_url: &str,
        user_agent: &str,
        min_interval: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(min_interval, max_retries, user_agent)?,
            sparql_url: sparql_url.to_string(),
        })
    }

    #[instrument(skip_all, fields(query_len = sparql.len()))]
    async fn run_select(&self, sparql: &str) -> Result<Vec<Binding>> {
        let params = [
            ("format", "json".to_string()),
            ("query", sparql.to_string()),
        ];
        let response: SparqlResponse = self.client.get_json(&self.sparql_url, &params).await?;

        let rows: Vec<Binding> = response
            .results
            .bindings
            .into_iter()
            .map(|row| row.into_iter().map(|(var, v)| (var, v.value)).collect())
            .collect();
        debug!(rows = rows.len(), "sparql select complete");
        Ok(rows)
    }
}

#[async_trait]
impl EntityQuery for WikidataClient {
    async fn select(&self, sparql: &str) -> Result<Vec<Binding>> {
        self.run_select(sparql).await
    }
}
