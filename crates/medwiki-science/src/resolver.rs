//! Batch resolution of external identifiers to knowledge-graph entities.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use medwiki_core::schema::GraphSchema;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::sources::EntityQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    Pmid,
    Pmcid,
    Issn,
    MeshDrug,
    MeshDisease,
}

impl IdentifierKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pmid => "pmid",
            Self::Pmcid => "pmcid",
            Self::Issn => "issn",
            Self::MeshDrug => "mesh-drug",
            Self::MeshDisease => "mesh-disease",
        }
    }

    /// Property carrying the identifier and the type the entity must have.
    fn lookup<'s>(self, schema: &'s GraphSchema) -> (&'s str, &'s str) {
        let p = &schema.properties;
        let t = &schema.types;
        match self {
            Self::Pmid => (&p.pmid, &t.scholarly_article),
            Self::Pmcid => (&p.pmcid, &t.scholarly_article),
            Self::Issn => (&p.issn, &t.scientific_journal),
            Self::MeshDrug => (&p.mesh_id, &t.drug),
            Self::MeshDisease => (&p.mesh_id, &t.disease),
        }
    }
}

/// Insertion-ordered identifier set. Values are stored exactly as given, so
/// later lookups with the same string hit; blank values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the value was new.
    pub fn insert(&mut self, value: &str) -> bool {
        if value.trim().is_empty() || self.seen.contains(value) {
            return false;
        }
        self.seen.insert(value.to_string());
        self.order.push(value.to_string());
        true
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Identifier → entity. When two entities claim one identifier the later
/// one is kept and the clash is counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMap {
    entries: HashMap<String, String>,
    clashes: usize,
}

impl ResolvedMap {
    pub fn insert(&mut self, id: impl Into<String>, entity: impl Into<String>) {
        let id = id.into();
        let entity = entity.into();
        if let Some(previous) = self.entries.get(&id) {
            if *previous != entity {
                warn!(id = %id, previous = %previous, entity = %entity, "identifier resolves to several entities, keeping the last");
                self.clashes += 1;
            }
        }
        self.entries.insert(id, entity);
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clashes(&self) -> usize {
        self.clashes
    }
}

pub struct BatchResolver {
    query: Arc<dyn EntityQuery>,
    schema: Arc<GraphSchema>,
    max_values_per_query: usize,
}

impl BatchResolver {
    pub fn new(
        query: Arc<dyn EntityQuery>,
        schema: Arc<GraphSchema>,
        max_values_per_query: usize,
    ) -> Self {
        Self {
            query,
            schema,
            max_values_per_query: max_values_per_query.max(1),
        }
    }

    /// Resolves every value in `ids`. An empty slice makes no remote call.
    #[instrument(skip_all, fields(kind = kind.label(), ids = ids.len()))]
    pub async fn resolve(&self, kind: IdentifierKind, ids: &[String]) -> Result<ResolvedMap> {
        let mut resolved = ResolvedMap::default();
        if ids.is_empty() {
            return Ok(resolved);
        }

        for chunk in ids.chunks(self.max_values_per_query) {
            let sparql = self.build_query(kind, chunk);
            for row in self.query.select(&sparql).await? {
                let (Some(res), Some(val)) = (row.get("res"), row.get("val")) else {
                    continue;
                };
                resolved.insert(val.clone(), self.schema.strip_entity_prefix(res));
            }
        }

        debug!(resolved = resolved.len(), clashes = resolved.clashes(), "batch resolved");
        Ok(resolved)
    }

    pub fn build_query(&self, kind: IdentifierKind, values: &[String]) -> String {
        let (property, entity_type) = kind.lookup(&self.schema);
        let instance_of = &self.schema.properties.instance_of;

        let blocks = values
            .iter()
            .map(|value| {
                format!(
                    "{{ ?res wdt:{instance_of} wd:{entity_type}. ?res wdt:{property} \"{}\". }}",
                    escape_literal(value)
                )
            })
            .collect::<Vec<_>>()
            .join(" UNION ");

        format!(
            "SELECT ?res ?val WHERE {{ {blocks} OPTIONAL {{ ?res wdt:{property} ?val. }} }}"
        )
    }
}

/// Escapes a value for use inside a double-quoted SPARQL string literal.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Binding;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingQuery {
        rows: Vec<Binding>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EntityQuery for RecordingQuery {
        async fn select(&self, sparql: &str) -> Result<Vec<Binding>> {
            self.seen.lock().unwrap().push(sparql.to_string());
            Ok(self.rows.clone())
        }
    }

    fn row(res: &str, val: &str) -> Binding {
        Binding::from([
            ("res".to_string(), format!("http://www.wikidata.org/entity/{res}")),
            ("val".to_string(), val.to_string()),
        ])
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn resolver(query: Arc<RecordingQuery>, chunk: usize) -> BatchResolver {
        BatchResolver::new(query, Arc::new(GraphSchema::default()), chunk)
    }

    #[tokio::test]
    async fn empty_set_makes_no_call() {
        let query = Arc::new(RecordingQuery::default());
        let map = resolver(query.clone(), 200)
            .resolve(IdentifierKind::Pmcid, &[])
            .await
            .unwrap();
        assert!(map.is_empty());
        assert!(query.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn strips_entity_prefix() {
        let query = Arc::new(RecordingQuery {
            rows: vec![row("Q59345985", "5729401"), row("Q1", "1")],
            ..Default::default()
        });
        let map = resolver(query, 200)
            .resolve(IdentifierKind::Pmcid, &ids(&["5729401", "1"]))
            .await
            .unwrap();
        assert_eq!(map.get("5729401"), Some("Q59345985"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.clashes(), 0);
    }

    #[tokio::test]
    async fn chunks_large_sets() {
        let query = Arc::new(RecordingQuery::default());
        let values: Vec<String> = (0..5).map(|n| format!("D00{n}")).collect();
        resolver(query.clone(), 2)
            .resolve(IdentifierKind::MeshDrug, &values)
            .await
            .unwrap();

        let seen = query.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].matches(" UNION ").count(), 0);
        assert_eq!(seen[0].matches(" UNION ").count(), 1);
    }

    #[tokio::test]
    async fn rows_without_value_are_ignored() {
        let mut partial = row("Q5", "x");
        partial.remove("val");
        let query = Arc::new(RecordingQuery {
            rows: vec![partial],
            ..Default::default()
        });
        let map = resolver(query, 200)
            .resolve(IdentifierKind::Issn, &ids(&["x"]))
            .await
            .unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn last_writer_wins_and_counts_clashes() {
        let mut map = ResolvedMap::default();
        map.insert("0028-0836", "Q180445");
        map.insert("0028-0836", "Q180445");
        assert_eq!(map.clashes(), 0);

        map.insert("0028-0836", "Q999");
        assert_eq!(map.get("0028-0836"), Some("Q999"));
        assert_eq!(map.clashes(), 1);
    }

    #[test]
    fn builds_union_query() {
        let query = Arc::new(RecordingQuery::default());
        let sparql = resolver(query, 200).build_query(IdentifierKind::Issn, &ids(&["1471-2466", "0028-0836"]));
        assert_eq!(
            sparql,
            "SELECT ?res ?val WHERE { \
             { ?res wdt:P31 wd:Q5633421. ?res wdt:P236 \"1471-2466\". } UNION \
             { ?res wdt:P31 wd:Q5633421. ?res wdt:P236 \"0028-0836\". } \
             OPTIONAL { ?res wdt:P236 ?val. } }"
        );
    }

    #[test]
    fn kinds_pick_type_and_property() {
        let query = Arc::new(RecordingQuery::default());
        let r = resolver(query, 200);
        let disease = r.build_query(IdentifierKind::MeshDisease, &ids(&["D001249"]));
        assert!(disease.contains("wd:Q12136. ?res wdt:P486 \"D001249\""));
        let pmid = r.build_query(IdentifierKind::Pmid, &ids(&["30683838"]));
        assert!(pmid.contains("wd:Q13442814. ?res wdt:P698 \"30683838\""));
    }

    #[test]
    fn escapes_literals() {
        assert_eq!(escape_literal(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_literal("x\ny"), "x\\ny");
    }

    #[test]
    fn idset_keeps_first_occurrence_order() {
        let mut set = IdSet::new();
        assert!(set.insert("b"));
        assert!(set.insert("a"));
        assert!(!set.insert("b"));
        assert!(!set.insert(""));
        assert!(!set.insert("  "));
        assert_eq!(set.as_slice(), &["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn resolved_keys_match_collected_ids() {
        let mut set = IdSet::new();
        set.insert("1471-2466");
        let query = Arc::new(RecordingQuery {
            rows: vec![row("Q15724092", "1471-2466")],
            ..Default::default()
        });
        let map = resolver(query.clone(), 200)
            .resolve(IdentifierKind::Issn, set.as_slice())
            .await
            .unwrap();

        for id in set.as_slice() {
            assert_eq!(map.get(id), Some("Q15724092"));
        }
        assert!(query.seen.lock().unwrap()[0].contains("\"1471-2466\""));
    }
}
