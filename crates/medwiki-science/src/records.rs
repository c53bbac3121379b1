use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScienceError};
use crate::eutils::types::{Article, PartialDate, PubmedArticle};
use crate::licenses::LicenseDecision;

const REVIEW_TYPES: &[&str] = &["Review", "Systematic Review"];
const RETRACTED_TYPE: &str = "Retracted Publication";
const RETRACTION_TYPE: &str = "Retraction of Publication";
const RETRACTION_IN_REF: &str = "RetractionIn";

/// A major MeSH descriptor attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshSubject {
    pub mesh_id: String,
    pub name: String,
}

/// Fields derived from one PubMed record. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub title: String,
    pub pmid: String,
    /// PMC ID without its `PMC` prefix.
    pub pmcid: Option<String>,
    pub subjects: Vec<MeshSubject>,
    pub is_review: bool,
    pub is_retracted: bool,
    pub is_retraction: bool,
    pub retracted_by_pmid: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub journal: Option<String>,
    pub issn: Option<String>,
}

impl EnrichedRecord {
    pub fn from_article(raw: &PubmedArticle) -> Result<Self> {
        let pmid = raw
            .pmid
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ScienceError::MalformedRecord("<unknown>".to_string(), "no PMID".to_string())
            })?;
        let article = raw.article.as_ref().ok_or_else(|| {
            ScienceError::MalformedRecord(pmid.clone(), "no Article element".to_string())
        })?;

        let has_type = |wanted: &str| article.publication_types.iter().any(|t| t == wanted);
        let is_retraction = has_type(RETRACTION_TYPE);

        let retracted_by_pmid = if is_retraction {
            None
        } else {
            raw.comments_corrections
                .iter()
                .find(|cc| cc.ref_type == RETRACTION_IN_REF)
                .and_then(|cc| cc.pmid.clone())
        };

        let journal = article.journal.as_ref();

        Ok(Self {
            title: article.title.clone(),
            pmid,
            pmcid: pmc_id(raw),
            subjects: major_subjects(raw),
            is_review: REVIEW_TYPES.iter().any(|t| has_type(*t)),
            is_retracted: has_type(RETRACTED_TYPE),
            is_retraction,
            retracted_by_pmid,
            publication_date: publication_date(article),
            journal: journal.and_then(|j| j.title.clone()),
            issn: journal.and_then(|j| j.issn.clone()),
        })
    }

    /// Day-precision time literal, e.g. `+2017-12-14T00:00:00Z/11`.
    pub fn publication_date_literal(&self) -> Option<String> {
        self.publication_date.map(|d| time_literal(&d))
    }
}

/// A major subject with whatever the drug and disease lookups found for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSubject {
    pub subject: MeshSubject,
    pub drug: Option<String>,
    pub disease: Option<String>,
}

impl ResolvedSubject {
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.drug.as_deref().into_iter().chain(self.disease.as_deref())
    }
}

/// A licensed record joined with its resolved entities, ready for output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRecord {
    pub record: EnrichedRecord,
    pub license: LicenseDecision,
    /// The article itself, found through its PMC ID.
    pub article_entity: Option<String>,
    pub journal_entity: Option<String>,
    pub subjects: Vec<ResolvedSubject>,
    pub retracted_by_entity: Option<String>,
}

pub fn time_literal(date: &NaiveDate) -> String {
    format!("+{}T00:00:00Z/11", date.format("%Y-%m-%d"))
}

/// Headings whose descriptor, or any of whose qualifiers, is a major topic.
/// The descriptor is what gets kept.
pub fn major_subjects(raw: &PubmedArticle) -> Vec<MeshSubject> {
    raw.mesh_headings
        .iter()
        .filter_map(|heading| {
            let descriptor = heading.descriptor.as_ref()?;
            let major =
                descriptor.major_topic || heading.qualifiers.iter().any(|q| q.major_topic);
            major.then(|| MeshSubject {
                mesh_id: descriptor.ui.clone(),
                name: descriptor.name.clone(),
            })
        })
        .collect()
}

fn pmc_id(raw: &PubmedArticle) -> Option<String> {
    raw.article_ids
        .iter()
        .find(|id| id.id_type == "pmc")
        .map(|id| id.value.trim_start_matches("PMC").to_string())
        .filter(|id| !id.is_empty())
}

/// Journal-issue date first, then the first electronic article date.
/// Either a whole date comes back or nothing does.
pub fn publication_date(article: &Article) -> Option<NaiveDate> {
    article
        .journal
        .as_ref()
        .and_then(|j| j.pub_date.as_ref())
        .and_then(|d| date_from_parts(d, parse_month_token))
        .or_else(|| {
            article
                .article_dates
                .first()
                .and_then(|d| date_from_parts(d, |m| m.parse::<u32>().ok()))
        })
}

fn date_from_parts(parts: &PartialDate, month: impl Fn(&str) -> Option<u32>) -> Option<NaiveDate> {
    let year = parts.year.as_deref()?.parse::<i32>().ok().filter(|y| *y > 0)?;
    let month = parts
        .month
        .as_deref()
        .and_then(month)
        .filter(|m| (1..=12).contains(m))?;
    let day = parts
        .day
        .as_deref()
        .and_then(|d| d.parse::<u32>().ok())
        .filter(|d| *d > 0)
        .unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `"3"`, `"03"`, `"Mar"` and `"mar"` all give 3.
fn parse_month_token(token: &str) -> Option<u32> {
    if let Ok(n) = token.parse::<u32>() {
        return Some(n);
    }
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = token.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|idx| idx as u32 + 1)
}
