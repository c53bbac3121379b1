use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::formats::{QuickStatementsWriter, TableWriter};
use crate::licenses::{BulkLicenseList, LicenseDecision, LicenseReconciler};
use crate::records::{EnrichedRecord, JoinedRecord, ResolvedSubject};
use crate::resolver::{BatchResolver, IdSet, IdentifierKind, ResolvedMap};
use crate::sources::{LicenseDetailSource, LiteratureIndex};

/// Identifiers gathered across every record of one term.
#[derive(Debug, Clone, Default)]
pub struct IdentifierSets {
    pub retraction_pmids: IdSet,
    pub pmcids: IdSet,
    pub issns: IdSet,
    pub mesh_ids: IdSet,
}

impl IdentifierSets {
    pub fn collect(&mut self, record: &EnrichedRecord) {
        if let Some(pmid) = record.retracted_by_pmid.as_deref() {
            self.retraction_pmids.insert(pmid);
        }
        if let Some(pmcid) = record.pmcid.as_deref() {
            self.pmcids.insert(pmcid);
        }
        if let Some(issn) = record.issn.as_deref() {
            self.issns.insert(issn);
        }
        for subject in &record.subjects {
            self.mesh_ids.insert(&subject.mesh_id);
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Resolved {
    retractions: ResolvedMap,
    articles: ResolvedMap,
    journals: ResolvedMap,
    drugs: ResolvedMap,
    diseases: ResolvedMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TermReport {
    pub term: String,
    /// Hit count reported by the search.
    pub matched: usize,
    pub fetched: usize,
    /// Records dropped as malformed.
    pub skipped: usize,
    pub licensed: usize,
    pub rows: usize,
    pub statements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermOutcome {
    pub term: String,
    pub report: Option<TermReport>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedReport {
    pub terms: Vec<TermOutcome>,
}

impl FeedReport {
    pub fn failed(&self) -> impl Iterator<Item = &TermOutcome> {
        self.terms.iter().filter(|t| t.error.is_some())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn total_rows(&self) -> usize {
        self.terms
            .iter()
            .filter_map(|t| t.report.as_ref())
            .map(|r| r.rows)
            .sum()
    }

    pub fn total_statements(&self) -> usize {
        self.terms
            .iter()
            .filter_map(|t| t.report.as_ref())
            .map(|r| r.statements)
            .sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Records per fetch window.
    pub batch_size: usize,
    /// Pause before every window fetch.
    pub fetch_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 200,
            fetch_delay: Duration::from_millis(100),
        }
    }
}

/// Search → fetch → resolve → license → join → emit, one term at a time.
pub struct EnrichmentPipeline {
    index: Arc<dyn LiteratureIndex>,
    detail_source: Option<Arc<dyn LicenseDetailSource>>,
    resolver: BatchResolver,
    reconciler: LicenseReconciler,
    bulk: Arc<BulkLicenseList>,
    settings: PipelineSettings,
}

impl EnrichmentPipeline {
    pub fn new(
        index: Arc<dyn LiteratureIndex>,
        resolver: BatchResolver,
        reconciler: LicenseReconciler,
        bulk: Arc<BulkLicenseList>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            index,
            detail_source: None,
            resolver,
            reconciler,
            bulk,
            settings: PipelineSettings {
                batch_size: settings.batch_size.max(1),
                ..settings
            },
        }
    }

    pub fn with_detail_source(mut self, source: Arc<dyn LicenseDetailSource>) -> Self {
        self.detail_source = Some(source);
        self
    }

    /// Runs every term, carrying on past failed ones. Both writers are
    /// flushed after each term.
    pub async fn run_feed<T, Q, F>(
        &self,
        terms: &[String],
        query_for: F,
        table: &mut TableWriter<T>,
        statements: &mut QuickStatementsWriter<Q>,
    ) -> FeedReport
    where
        T: Write,
        Q: Write,
        F: Fn(&str) -> String,
    {
        let mut feed = FeedReport::default();

        for (idx, term) in terms.iter().enumerate() {
            info!(term = %term, "term {}/{}", idx + 1, terms.len());
            let query = query_for(term);
            let result = self.run_term(term, &query, table, statements).await;

            let flushed = table.flush().and_then(|_| statements.flush());
            let outcome = match (result, flushed) {
                (Ok(report), Ok(())) => {
                    info!(
                        term = %term,
                        matched = report.matched,
                        rows = report.rows,
                        statements = report.statements,
                        "term complete"
                    );
                    TermOutcome {
                        term: term.clone(),
                        report: Some(report),
                        error: None,
                    }
                }
                (Err(e), _) | (Ok(_), Err(e)) => {
                    error!(term = %term, error = %e, "term failed");
                    TermOutcome {
                        term: term.clone(),
                        report: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            feed.terms.push(outcome);
        }

        feed
    }

    /// Processes one term. Any remote failure before emission abandons the
    /// term without writing a row for it.
    #[instrument(skip(self, query, table, statements))]
    pub async fn run_term<T: Write, Q: Write>(
        &self,
        term: &str,
        query: &str,
        table: &mut TableWriter<T>,
        statements: &mut QuickStatementsWriter<Q>,
    ) -> Result<TermReport> {
        let mut report = TermReport {
            term: term.to_string(),
            ..Default::default()
        };

        // Searching
        let handle = self.index.search(query).await?;
        report.matched = handle.count;

        // Fetching + Collecting
        let mut records = Vec::new();
        let mut ids = IdentifierSets::default();
        let mut offset = 0;
        while offset < handle.count {
            sleep(self.settings.fetch_delay).await;
            let window = self
                .index
                .fetch_window(&handle, offset, self.settings.batch_size)
                .await?;
            report.fetched += window.len();

            for raw in &window {
                match EnrichedRecord::from_article(raw) {
                    Ok(record) => {
                        ids.collect(&record);
                        records.push(record);
                    }
                    Err(e) => {
                        warn!(error = %e, "skipping record");
                        report.skipped += 1;
                    }
                }
            }
            offset += self.settings.batch_size;
        }

        // Resolving
        let resolved = self.resolve(&ids).await?;

        // Licensing + Joining
        let mut joined = Vec::with_capacity(records.len());
        for record in records {
            let Some(license) = self
                .reconciler
                .reconcile(
                    &record.pmid,
                    record.pmcid.as_deref(),
                    &self.bulk,
                    self.detail_source.as_deref(),
                )
                .await
            else {
                continue;
            };
            joined.push(join(record, license, &resolved));
        }
        report.licensed = joined.len();

        // Emitting
        for record in &joined {
            table.write_row(record)?;
            report.rows += 1;
            report.statements += statements.write_record(record)?;
        }

        Ok(report)
    }

    async fn resolve(&self, ids: &IdentifierSets) -> Result<Resolved> {
        let r = &self.resolver;
        Ok(Resolved {
            retractions: r
                .resolve(IdentifierKind::Pmid, ids.retraction_pmids.as_slice())
                .await?,
            articles: r
                .resolve(IdentifierKind::Pmcid, ids.pmcids.as_slice())
                .await?,
            journals: r.resolve(IdentifierKind::Issn, ids.issns.as_slice()).await?,
            drugs: r
                .resolve(IdentifierKind::MeshDrug, ids.mesh_ids.as_slice())
                .await?,
            diseases: r
                .resolve(IdentifierKind::MeshDisease, ids.mesh_ids.as_slice())
                .await?,
        })
    }
}

fn join(
    record: EnrichedRecord,
    license: LicenseDecision,
    resolved: &Resolved,
) -> JoinedRecord {
    let lookup = |map: &ResolvedMap, id: Option<&str>| {
        id.and_then(|id| map.get(id)).map(ToOwned::to_owned)
    };

    let subjects = record
        .subjects
        .iter()
        .map(|subject| ResolvedSubject {
            subject: subject.clone(),
            drug: lookup(&resolved.drugs, Some(subject.mesh_id.as_str())),
            disease: lookup(&resolved.diseases, Some(subject.mesh_id.as_str())),
        })
        .collect();

    JoinedRecord {
        article_entity: lookup(&resolved.articles, record.pmcid.as_deref()),
        journal_entity: lookup(&resolved.journals, record.issn.as_deref()),
        retracted_by_entity: lookup(&resolved.retractions, record.retracted_by_pmid.as_deref()),
        subjects,
        license,
        record,
    }
}
