use std::path::Path;

use crate::error::{MedwikiError, Result};

/// Reads a term feed: a JSON array of search terms.
///
/// Blank terms are dropped; repeated terms are kept once, first occurrence wins.
pub fn load_term_feed(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MedwikiError::FeedNotFound(path.display().to_string())
        } else {
            MedwikiError::Io(e)
        }
    })?;

    let terms: Vec<String> = serde_json::from_str(&contents)
        .map_err(|e| MedwikiError::InvalidFeed(path.display().to_string(), e.to_string()))?;

    let mut feed: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        let term = term.trim();
        if !term.is_empty() && !feed.iter().any(|t| t == term) {
            feed.push(term.to_string());
        }
    }
    Ok(feed)
}

pub fn save_term_feed(path: &Path, terms: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(terms)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_terms_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, r#"["Asthma", " Gout ", "", "Asthma"]"#).unwrap();

        let feed = load_term_feed(&path).unwrap();
        assert_eq!(feed, vec!["Asthma".to_string(), "Gout".to_string()]);
    }

    #[test]
    fn missing_file_is_feed_not_found() {
        let err = load_term_feed(Path::new("/tmp/medwiki_missing_feed.json")).unwrap_err();
        assert!(matches!(err, MedwikiError::FeedNotFound(_)));
    }

    #[test]
    fn non_array_json_is_invalid_feed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, r#"{"terms": ["Asthma"]}"#).unwrap();

        let err = load_term_feed(&path).unwrap_err();
        assert!(matches!(err, MedwikiError::InvalidFeed(..)));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("generated_feed.json");
        let terms = vec!["Acne Vulgaris".to_string(), "Zika Virus Infection".to_string()];

        save_term_feed(&path, &terms).unwrap();
        assert_eq!(load_term_feed(&path).unwrap(), terms);
    }
}
