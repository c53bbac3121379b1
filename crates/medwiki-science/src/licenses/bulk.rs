//! The PMC open-access file list, held in memory for one run.
//!
//! ```text
//! 2019-01-29 16:14:58
//! oa_package/08/e0/PMC13900.tar.gz	Breast Cancer Res. 2001 Nov 2; 3(1):55-60	PMC13900	PMID:11250746	NO-CC CODE
//! ```

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use medwiki_core::config::LicenseListConfig;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::http::RateLimitedClient;

const COLUMNS: usize = 5;
const USER_AGENT: &str = concat!("medwiki/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default)]
pub struct BulkLicenseList {
    by_pmid: HashMap<String, String>,
    /// Keyed by the bare number, `PMC` stripped.
    by_pmcid: HashMap<String, String>,
}

impl BulkLicenseList {
    /// Citation text is free-form and not always UTF-8; bad bytes are
    /// replaced rather than failing the whole list.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Self> {
        let mut list = Self::default();
        let mut skipped = 0usize;
        let mut buf = Vec::new();

        // first line is the generation timestamp
        reader.read_until(b'\n', &mut buf)?;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            let columns: Vec<&str> = line.split('\t').collect();
            if columns.len() != COLUMNS {
                skipped += 1;
                continue;
            }
            let code = columns[4].trim();
            if code.is_empty() {
                continue;
            }

            let pmcid = columns[2].trim().trim_start_matches("PMC");
            if !pmcid.is_empty() {
                list.by_pmcid.insert(pmcid.to_string(), code.to_string());
            }
            let pmid = columns[3].trim().trim_start_matches("PMID:");
            if !pmid.is_empty() {
                list.by_pmid.insert(pmid.to_string(), code.to_string());
            }
        }

        if skipped > 0 {
            warn!(skipped, "ignored license list lines with unexpected column count");
        }
        Ok(list)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Self::from_reader(contents.as_bytes())
    }

    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let list = Self::from_reader(BufReader::new(file))?;
        info!(pmids = list.by_pmid.len(), pmcids = list.by_pmcid.len(), "license list loaded");
        Ok(list)
    }

    /// Downloads the list to `config.path`, replacing any existing copy.
    pub async fn download(config: &LicenseListConfig) -> Result<u64> {
        let client = RateLimitedClient::new(Duration::ZERO, 3, USER_AGENT)?;
        info!(url = %config.download_url, path = %config.path, "downloading license list");
        client
            .download_to(&config.download_url, Path::new(&config.path))
            .await
    }

    /// Loads the configured list, fetching it first when it is missing and
    /// the configuration allows that.
    pub async fn load_or_download(config: &LicenseListConfig) -> Result<Self> {
        let path = Path::new(&config.path);
        if !path.exists() && config.download_if_missing {
            Self::download(config).await?;
        }
        Self::load(path)
    }

    pub fn lookup_pmid(&self, pmid: &str) -> Option<&str> {
        self.by_pmid
            .get(pmid.trim())
            .map(String::as_str)
            .filter(|code| !code.is_empty())
    }

    /// Accepts `5729401` and `PMC5729401` alike.
    pub fn lookup_pmcid(&self, pmcid: &str) -> Option<&str> {
        self.by_pmcid
            .get(pmcid.trim().trim_start_matches("PMC"))
            .map(String::as_str)
            .filter(|code| !code.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.by_pmid.is_empty() && self.by_pmcid.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, pmid: &str, pmcid: &str, code: &str) {
        if !pmid.is_empty() {
            self.by_pmid.insert(pmid.to_string(), code.to_string());
        }
        if !pmcid.is_empty() {
            self.by_pmcid
                .insert(pmcid.trim_start_matches("PMC").to_string(), code.to_string());
        }
    }
}
