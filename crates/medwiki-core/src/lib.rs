//! medwiki-core: configuration, knowledge-graph schema tables, term feeds.

pub mod config;
pub mod error;
pub mod feed;
pub mod schema;

pub use config::AppConfig;
pub use error::{ExitCode, MedwikiError, Result};
pub use feed::{load_term_feed, save_term_feed};
pub use schema::{CC_BY_4_URL, GraphSchema, canonical_license_url};
