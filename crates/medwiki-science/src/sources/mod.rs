use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::eutils::types::{PubmedArticle, SearchHandle};

/// Search-then-page access to a bibliographic index.
#[async_trait]
pub trait LiteratureIndex: Send + Sync {
    /// Runs `query` with history enabled and returns the hit count plus a
    /// handle that later window fetches reuse.
    async fn search(&self, query: &str) -> Result<SearchHandle>;

    async fn fetch_window(
        &self,
        handle: &SearchHandle,
        offset: usize,
        size: usize,
    ) -> Result<Vec<PubmedArticle>>;
}

/// License metadata as a full-text provider states it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseDetail {
    pub link: Option<String>,
    pub text: String,
}

#[async_trait]
pub trait LicenseDetailSource: Send + Sync {
    /// `pmcid` is the bare number, without the `PMC` prefix.
    async fn license_detail(&self, pmcid: &str) -> Result<LicenseDetail>;
}

/// One solution row of a SELECT query: variable name to bound value.
pub type Binding = HashMap<String, String>;

#[async_trait]
pub trait EntityQuery: Send + Sync {
    async fn select(&self, sparql: &str) -> Result<Vec<Binding>>;
}

/// Preferred English label of a MeSH descriptor.
#[async_trait]
pub trait MeshLabelSource: Send + Sync {
    async fn label(&self, mesh_id: &str) -> Result<String>;
}

pub mod europepmc;
pub mod mesh;
pub mod wikidata;
