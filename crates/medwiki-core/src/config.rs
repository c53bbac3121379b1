use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MedwikiError, Result};

/// Root application configuration, loaded from `~/.config/medwiki/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub eutils: EutilsConfig,
    pub europepmc: EuropePmcConfig,
    pub wikidata: WikidataConfig,
    pub licenses: LicenseListConfig,
    pub output: OutputConfig,
    pub search: SearchConfig,
    /// Optional TOML file replacing the built-in Wikidata schema tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EutilsConfig {
    pub base_url: String,
    pub database: String,
    pub api_key_env: String,
    /// Records per efetch window.
    pub batch_size: usize,
    /// Fixed pause before every efetch call. NCBI allows ten requests a second with a key.
    pub request_delay_ms: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EuropePmcConfig {
    pub enabled: bool,
    pub base_url: String,
    pub request_delay_ms: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikidataConfig {
    pub sparql_url: String,
    pub mesh_label_url: String,
    pub user_agent: String,
    /// Upper bound on `UNION` blocks in one query.
    pub max_values_per_query: usize,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseListConfig {
    pub path: String,
    pub download_url: String,
    pub download_if_missing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: String,
    pub table_file: String,
    pub statements_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// PubMed query wrapped around every feed term; `{term}` is replaced.
    pub term_template: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for EutilsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            database: "pubmed".to_string(),
            api_key_env: "NCBI_API_KEY".to_string(),
            batch_size: 200,
            request_delay_ms: 100,
            max_retries: 3,
        }
    }
}

impl Default for EuropePmcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.ebi.ac.uk/europepmc/webservices/rest".to_string(),
            request_delay_ms: 100,
            max_retries: 3,
        }
    }
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            sparql_url: "https://query.wikidata.org/sparql".to_string(),
            mesh_label_url: "https://id.nlm.nih.gov/mesh".to_string(),
            user_agent: format!("medwiki/{}", env!("CARGO_PKG_VERSION")),
            max_values_per_query: 200,
            max_retries: 3,
        }
    }
}

impl Default for LicenseListConfig {
    fn default() -> Self {
        Self {
            path: "oa_file_list.txt".to_string(),
            download_url: "https://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_file_list.txt".to_string(),
            download_if_missing: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
            table_file: "results.csv".to_string(),
            statements_file: "results_quickstatements.txt".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            term_template: r#""{term}"[Mesh Major Topic] AND (Review[ptyp] OR "Retraction of Publication"[PTYP])"#
                .to_string(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/medwiki/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("MEDWIKI_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("medwiki")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.eutils.batch_size == 0 {
            return Err(MedwikiError::ConfigError(
                "eutils.batch_size must be at least 1".to_string(),
            ));
        }
        if self.wikidata.max_values_per_query == 0 {
            return Err(MedwikiError::ConfigError(
                "wikidata.max_values_per_query must be at least 1".to_string(),
            ));
        }
        if !self.search.term_template.contains("{term}") {
            return Err(MedwikiError::ConfigError(
                "search.term_template must contain {term}".to_string(),
            ));
        }
        Ok(())
    }

    // ─── Derived values ────────────────────────────────────

    /// Picks the explicit key if given, otherwise the configured environment variable.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned)
            .or_else(|| {
                std::env::var(&self.eutils.api_key_env)
                    .ok()
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
            })
            .ok_or_else(|| MedwikiError::MissingCredential(self.eutils.api_key_env.clone()))
    }

    pub fn search_query(&self, term: &str) -> String {
        self.search.term_template.replace("{term}", term)
    }

    pub fn set_output_dir(&mut self, dir: PathBuf) {
        self.output.directory = dir.to_string_lossy().to_string();
    }

    pub fn table_path(&self) -> PathBuf {
        PathBuf::from(&self.output.directory).join(&self.output.table_file)
    }

    pub fn statements_path(&self) -> PathBuf {
        PathBuf::from(&self.output.directory).join(&self.output.statements_file)
    }

    pub fn license_list_path(&self) -> PathBuf {
        PathBuf::from(&self.licenses.path)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.eutils.request_delay_ms)
    }
}
