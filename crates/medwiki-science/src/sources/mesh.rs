use std::time::Duration;

use async_trait::async_trait;
use medwiki_core::config::WikidataConfig;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;
use crate::sources::MeshLabelSource;

#[derive(Debug, Deserialize)]
struct DescriptorLookup {
    #[serde(rename = "@graph", default)]
    graph: Vec<DescriptorNode>,
}

#[derive(Debug, Deserialize)]
struct DescriptorNode {
    label: DescriptorLabel,
}

#[derive(Debug, Deserialize)]
struct DescriptorLabel {
    #[serde(rename = "@value")]
    value: String,
}

/// NLM MeSH RDF linked-data lookup: `{base}/{descriptor}.json`.
pub struct MeshLabelClient {
    client: RateLimitedClient,
    base_url: String,
}

impl MeshLabelClient {
    /// Lookups are spaced half a second apart.
    pub fn new(config: &WikidataConfig) -> Result<Self> {
        Self::with_params(
            &config.mesh_label_url,
            &config.user_agent,
            Duration::from_millis(500),
            config.max_retries,
        )
    }

    pub fn with_params(
        base_url: &str,
        user_agent: &str,
        min_interval: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(min_interval, max_retries, user_agent)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MeshLabelSource for MeshLabelClient {
    async fn label(&self, mesh_id: &str) -> Result<String> {
        let mesh_id = mesh_id.trim();
        if mesh_id.is_empty() {
            return Err(ScienceError::MalformedRecord(
                "mesh".to_string(),
                "empty descriptor id".to_string(),
            ));
        }

        let url = format!("{}/{mesh_id}.json", self.base_url);
        let lookup: DescriptorLookup = self.client.get_json(&url, &[]).await?;
        match lookup.graph.as_slice() {
            [node] => {
                debug!(mesh_id, label = %node.label.value, "mesh label");
                Ok(node.label.value.clone())
            }
            nodes => Err(ScienceError::ApiError(
                "mesh".to_string(),
                format!("{} results for {mesh_id}", nodes.len()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn client(server: &Server) -> MeshLabelClient {
        MeshLabelClient::with_params(&server.url(), "medwiki-test", Duration::ZERO, 0).unwrap()
    }

    #[tokio::test]
    async fn reads_graph_label() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/D001249.json")
            .with_status(200)
            .with_body(
                r#"{"@context":"https://id.nlm.nih.gov/mesh/jsonld.json",
                    "@graph":[{"@id":"mesh:D001249","identifier":"D001249",
                    "label":{"@language":"en","@value":"Asthma"}}]}"#,
            )
            .create_async()
            .await;

        assert_eq!(client(&server).label("D001249").await.unwrap(), "Asthma");
    }

    #[tokio::test]
    async fn ambiguous_graph_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/D000001.json")
            .with_status(200)
            .with_body(r#"{"@graph":[]}"#)
            .create_async()
            .await;

        let err = client(&server).label("D000001").await.unwrap_err();
        assert!(matches!(err, ScienceError::ApiError(..)));
    }

    #[tokio::test]
    async fn empty_id_makes_no_request() {
        let server = Server::new_async().await;
        let err = client(&server).label("  ").await.unwrap_err();
        assert!(matches!(err, ScienceError::MalformedRecord(..)));
    }
}
