use std::sync::Arc;

use medwiki_core::schema::{CC_BY_4_URL, GraphSchema, canonical_license_url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::licenses::bulk::BulkLicenseList;
use crate::sources::{LicenseDetail, LicenseDetailSource};

/// Wording Europe PMC uses for CC-BY-4.0 grants that omit the link.
pub const CC_BY_4_PHRASE: &str = "This article is distributed under the terms of the Creative Commons Attribution 4.0 International License";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LicenseSourceKind {
    BulkList,
    DetailLookup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseDecision {
    /// Code from the bulk list, e.g. `CC BY`.
    pub code: Option<String>,
    /// Canonicalized detail link, kept even when it maps to nothing.
    pub source_link: Option<String>,
    pub source_kind: LicenseSourceKind,
    pub entity: Option<String>,
}

impl LicenseDecision {
    /// Item cited as the origin of the license statement.
    pub fn source_item<'s>(&self, schema: &'s GraphSchema) -> &'s str {
        match self.source_kind {
            LicenseSourceKind::DetailLookup => &schema.items.europe_pmc,
            LicenseSourceKind::BulkList => &schema.items.pubmed_central,
        }
    }
}

/// Combines the bulk list with per-article detail. Stateless: the same
/// inputs always give the same decision.
#[derive(Debug, Clone)]
pub struct LicenseReconciler {
    schema: Arc<GraphSchema>,
}

impl LicenseReconciler {
    pub fn new(schema: Arc<GraphSchema>) -> Self {
        Self { schema }
    }

    /// Looks up detail for records with a PMC ID, then decides. Detail
    /// failures only cost the detail; the bulk code still counts.
    pub async fn reconcile(
        &self,
        pmid: &str,
        pmcid: Option<&str>,
        bulk: &BulkLicenseList,
        detail_source: Option<&dyn LicenseDetailSource>,
    ) -> Option<LicenseDecision> {
        let pmcid = pmcid.map(str::trim).filter(|id| !id.is_empty());

        let detail = match (pmcid, detail_source) {
            (Some(id), Some(source)) => match source.license_detail(id).await {
                Ok(detail) => Some(detail),
                Err(e) => {
                    warn!(pmid, pmcid = id, error = %e, "license detail lookup failed");
                    None
                }
            },
            _ => None,
        };

        self.decide(pmid, pmcid, bulk, detail.as_ref())
    }

    pub fn decide(
        &self,
        pmid: &str,
        pmcid: Option<&str>,
        bulk: &BulkLicenseList,
        detail: Option<&LicenseDetail>,
    ) -> Option<LicenseDecision> {
        let code = bulk
            .lookup_pmid(pmid)
            .or_else(|| pmcid.and_then(|id| bulk.lookup_pmcid(id)))
            .map(ToOwned::to_owned);

        let source_link = detail.and_then(|d| detail_link(pmid, d));
        let detail_entity = source_link
            .as_deref()
            .and_then(|link| self.schema.license_entity(link))
            .map(ToOwned::to_owned);

        let decision = match (detail_entity, code) {
            (Some(entity), code) => LicenseDecision {
                code,
                source_link,
                source_kind: LicenseSourceKind::DetailLookup,
                entity: Some(entity),
            },
            (None, Some(code)) => LicenseDecision {
                entity: self.schema.license_entity(&code).map(ToOwned::to_owned),
                code: Some(code),
                source_link,
                source_kind: LicenseSourceKind::BulkList,
            },
            (None, None) => {
                debug!(pmid, "no license found");
                return None;
            }
        };
        Some(decision)
    }
}

fn detail_link(pmid: &str, detail: &LicenseDetail) -> Option<String> {
    match detail.link.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(link) => Some(canonical_license_url(link).unwrap_or_else(|| {
            warn!(pmid, link, "license link is not a URL, keeping it verbatim");
            link.to_string()
        })),
        None if detail.text.contains(CC_BY_4_PHRASE) => Some(CC_BY_4_URL.to_string()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScienceError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDetail {
        detail: Option<LicenseDetail>,
        calls: AtomicUsize,
    }

    impl FixedDetail {
        fn new(detail: Option<LicenseDetail>) -> Self {
            Self {
                detail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LicenseDetailSource for FixedDetail {
        async fn license_detail(&self, pmcid: &str) -> Result<LicenseDetail> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.detail
                .clone()
                .ok_or_else(|| ScienceError::SourceUnavailable(format!("PMC{pmcid}")))
        }
    }

    fn reconciler() -> LicenseReconciler {
        LicenseReconciler::new(Arc::new(GraphSchema::default()))
    }

    fn bulk() -> BulkLicenseList {
        let mut list = BulkLicenseList::default();
        list.insert("11250747", "PMC13901", "CC BY");
        list.insert("", "PMC13902", "NO-CC CODE");
        list
    }

    fn link(href: &str) -> LicenseDetail {
        LicenseDetail {
            link: Some(href.to_string()),
            text: String::new(),
        }
    }

    #[test]
    fn known_detail_link_supersedes_bulk_code() {
        let detail = link("http://creativecommons.org/licenses/by/4.0");
        let decision = reconciler()
            .decide("11250747", Some("13901"), &bulk(), Some(&detail))
            .unwrap();

        assert_eq!(decision.source_kind, LicenseSourceKind::DetailLookup);
        assert_eq!(decision.code.as_deref(), Some("CC BY"));
        assert_eq!(
            decision.source_link.as_deref(),
            Some("https://creativecommons.org/licenses/by/4.0/")
        );
        assert_eq!(decision.entity.as_deref(), Some("Q20007257"));
    }

    #[test]
    fn unknown_detail_link_leaves_bulk_code() {
        let detail = link("https://example.org/our-own-terms");
        let decision = reconciler()
            .decide("11250747", Some("13901"), &bulk(), Some(&detail))
            .unwrap();

        assert_eq!(decision.source_kind, LicenseSourceKind::BulkList);
        assert_eq!(decision.entity.as_deref(), Some("Q6905323"));
        assert_eq!(
            decision.source_link.as_deref(),
            Some("https://example.org/our-own-terms/")
        );
    }

    #[test]
    fn falls_back_to_pmcid_in_bulk_list() {
        let decision = reconciler()
            .decide("999", Some("13902"), &bulk(), None)
            .unwrap();
        assert_eq!(decision.code.as_deref(), Some("NO-CC CODE"));
        assert_eq!(decision.source_kind, LicenseSourceKind::BulkList);
        assert_eq!(decision.entity, None);
    }

    #[test]
    fn phrase_without_link_synthesizes_cc_by_4() {
        let detail = LicenseDetail {
            link: None,
            text: format!("Open Access{CC_BY_4_PHRASE} (see website)."),
        };
        let decision = reconciler()
            .decide("1", Some("2"), &BulkLicenseList::default(), Some(&detail))
            .unwrap();
        assert_eq!(decision.source_link.as_deref(), Some(CC_BY_4_URL));
        assert_eq!(decision.source_kind, LicenseSourceKind::DetailLookup);
        assert_eq!(decision.code, None);
    }

    #[test]
    fn nothing_known_is_no_decision() {
        let detail = link("https://example.org/terms");
        assert_eq!(
            reconciler().decide("1", Some("2"), &BulkLicenseList::default(), Some(&detail)),
            None
        );
        assert_eq!(
            reconciler().decide("1", None, &BulkLicenseList::default(), None),
            None
        );
    }

    #[test]
    fn relative_link_kept_verbatim() {
        let detail = link("licenses/by/4.0");
        let decision = reconciler()
            .decide("11250747", None, &bulk(), Some(&detail))
            .unwrap();
        assert_eq!(decision.source_link.as_deref(), Some("licenses/by/4.0"));
        assert_eq!(decision.source_kind, LicenseSourceKind::BulkList);
    }

    #[test]
    fn source_item_follows_kind() {
        let r = reconciler();
        let detail = link(CC_BY_4_URL);
        let from_detail = r.decide("1", Some("2"), &bulk(), Some(&detail)).unwrap();
        let from_bulk = r.decide("11250747", None, &bulk(), None).unwrap();
        let schema = GraphSchema::default();
        assert_eq!(from_detail.source_item(&schema), "Q5412157");
        assert_eq!(from_bulk.source_item(&schema), "Q229883");
    }

    #[tokio::test]
    async fn repeated_reconcile_is_identical() {
        let r = reconciler();
        let source = FixedDetail::new(Some(link("http://creativecommons.org/licenses/by-nc/4.0")));
        let list = bulk();

        let first = r
            .reconcile("11250747", Some("13901"), &list, Some(&source))
            .await;
        let second = r
            .reconcile("11250747", Some("13901"), &list, Some(&source))
            .await;
        assert_eq!(first, second);
        assert_eq!(first.unwrap().entity.as_deref(), Some("Q34179348"));
    }

    #[tokio::test]
    async fn failed_detail_keeps_bulk_code() {
        let source = FixedDetail::new(None);
        let decision = reconciler()
            .reconcile("11250747", Some("13901"), &bulk(), Some(&source))
            .await
            .unwrap();
        assert_eq!(decision.source_kind, LicenseSourceKind::BulkList);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_pmcid_skips_detail_lookup() {
        let source = FixedDetail::new(Some(link(CC_BY_4_URL)));
        let decision = reconciler()
            .reconcile("11250747", None, &bulk(), Some(&source))
            .await
            .unwrap();
        assert_eq!(decision.source_kind, LicenseSourceKind::BulkList);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
