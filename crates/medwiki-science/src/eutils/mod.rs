//! PubMed access through NCBI E-utilities.

pub mod client;
pub mod parser;
pub mod types;

pub use client::EutilsClient;
pub use types::{PubmedArticle, SearchHandle};
