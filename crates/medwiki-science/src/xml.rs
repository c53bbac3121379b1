//! Helpers shared by the streaming XML readers (PubMed, JATS).

use quick_xml::events::BytesStart;

use crate::error::{Result, ScienceError};

/// True when the open-element stack ends with `tail`, innermost last.
pub(crate) fn path_ends_with(stack: &[String], tail: &[&str]) -> bool {
    stack.len() >= tail.len()
        && stack[stack.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(open, want)| open == want)
}

pub(crate) fn in_element(stack: &[String], name: &str) -> bool {
    stack.iter().any(|open| open == name)
}

pub(crate) fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Unescaped attribute value; empty when the attribute is absent.
pub(crate) fn attribute(e: &BytesStart<'_>, key: &str) -> Result<String> {
    let attr = e
        .try_get_attribute(key)
        .map_err(|err| ScienceError::Parse(format!("bad {key} attribute: {err}")))?;
    match attr {
        Some(attr) => attr
            .unescape_value()
            .map(|value| value.into_owned())
            .map_err(|err| ScienceError::Parse(format!("bad {key} attribute: {err}"))),
        None => Ok(String::new()),
    }
}

/// Collapses runs of whitespace, including line breaks, into single spaces.
pub(crate) fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| clean_text(&v)).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn matches_innermost_suffix() {
        let open = stack(&["PubmedArticle", "MedlineCitation", "PMID"]);
        assert!(path_ends_with(&open, &["MedlineCitation", "PMID"]));
        assert!(!path_ends_with(&open, &["CommentsCorrections", "PMID"]));
        assert!(!path_ends_with(&open[..1], &["MedlineCitation", "PMID"]));
    }

    #[test]
    fn cleans_whitespace() {
        assert_eq!(clean_text("  Gout\n  and   <i>urate</i> "), "Gout and <i>urate</i>");
        assert_eq!(clean_optional(Some("   ".to_string())), None);
    }
}
