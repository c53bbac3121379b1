//! Builds a term feed from the knowledge graph.
//!
//! Every disease linked to a medical specialty (directly or through a
//! part-of chain) contributes its MeSH descriptor; the descriptors are then
//! turned into their preferred labels, which are valid `[Mesh Major Topic]`
//! search terms.

use std::collections::BTreeSet;
use std::sync::Arc;

use medwiki_core::schema::GraphSchema;
use tracing::{info, warn};

use crate::error::{Result, ScienceError};
use crate::sources::{EntityQuery, MeshLabelSource};

/// Placeholder some graph items carry instead of a real descriptor.
const NO_DESCRIPTOR: &str = "NoID";

pub struct FeedGenerator {
    query: Arc<dyn EntityQuery>,
    labels: Arc<dyn MeshLabelSource>,
    schema: Arc<GraphSchema>,
}

impl FeedGenerator {
    pub fn new(
        query: Arc<dyn EntityQuery>,
        labels: Arc<dyn MeshLabelSource>,
        schema: Arc<GraphSchema>,
    ) -> Self {
        Self {
            query,
            labels,
            schema,
        }
    }

    /// Sorted, de-duplicated labels. A failed label lookup skips that
    /// descriptor; a failed graph query aborts.
    pub async fn generate(&self) -> Result<Vec<String>> {
        let specialties = self.specialties().await?;
        info!(count = specialties.len(), "medical specialties");

        let mut descriptors = BTreeSet::new();
        for specialty in &specialties {
            for row in self.query.select(&self.descriptor_query(specialty)).await? {
                match row.get("MeSHID").map(|id| id.trim()) {
                    Some(id) if !id.is_empty() => {
                        descriptors.insert(id.to_string());
                    }
                    _ => {
                        return Err(ScienceError::Parse(format!(
                            "descriptor row without MeSHID under {specialty}"
                        )));
                    }
                }
            }
        }
        info!(count = descriptors.len(), "mesh descriptors");

        let mut labels = BTreeSet::new();
        for id in descriptors.iter().filter(|id| id.as_str() != NO_DESCRIPTOR) {
            match self.labels.label(id).await {
                Ok(label) if !label.trim().is_empty() => {
                    labels.insert(label.trim().to_string());
                }
                Ok(_) => warn!(mesh_id = %id, "empty mesh label, skipping"),
                Err(e) => warn!(mesh_id = %id, error = %e, "mesh label lookup failed, skipping"),
            }
        }

        Ok(labels.into_iter().collect())
    }

    async fn specialties(&self) -> Result<Vec<String>> {
        let rows = self.query.select(&self.specialty_query()).await?;
        let mut specialties = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(spec) = row.get("spec").filter(|s| !s.trim().is_empty()) else {
                return Err(ScienceError::Parse("specialty row without spec".to_string()));
            };
            specialties.push(self.schema.strip_entity_prefix(spec).to_string());
        }
        Ok(specialties)
    }

    pub fn specialty_query(&self) -> String {
        let p = &self.schema.properties;
        let t = &self.schema.types;
        format!(
            "SELECT DISTINCT ?spec WHERE {{ ?item wdt:{} wd:{}. ?item wdt:{} ?spec. }}",
            p.instance_of, t.disease, p.medical_specialty
        )
    }

    pub fn descriptor_query(&self, specialty: &str) -> String {
        let p = &self.schema.properties;
        let t = &self.schema.types;
        format!(
            "SELECT DISTINCT ?item ?MeSHID WHERE {{ \
             ?item wdt:{} wd:{}; wdt:{} ?medspec; wdt:{} ?MeSHID. \
             ?medspec wdt:{}* wd:{specialty}. }}",
            p.instance_of, t.disease, p.medical_specialty, p.mesh_id, p.part_of
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Binding;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeGraph {
        seen: Mutex<Vec<String>>,
        by_specialty: HashMap<&'static str, Vec<&'static str>>,
    }

    #[async_trait]
    impl EntityQuery for FakeGraph {
        async fn select(&self, sparql: &str) -> Result<Vec<Binding>> {
            self.seen.lock().unwrap().push(sparql.to_string());
            if !sparql.contains("?MeSHID") {
                let mut specs: Vec<_> = self.by_specialty.keys().collect();
                specs.sort();
                return Ok(specs
                    .into_iter()
                    .map(|s| {
                        Binding::from([(
                            "spec".to_string(),
                            format!("http://www.wikidata.org/entity/{s}"),
                        )])
                    })
                    .collect());
            }
            let rows = self
                .by_specialty
                .iter()
                .filter(|(spec, _)| sparql.contains(&format!("wd:{spec}.")))
                .flat_map(|(_, ids)| ids.iter())
                .map(|id| Binding::from([("MeSHID".to_string(), id.to_string())]))
                .collect();
            Ok(rows)
        }
    }

    struct FakeLabels;

    #[async_trait]
    impl MeshLabelSource for FakeLabels {
        async fn label(&self, mesh_id: &str) -> Result<String> {
            match mesh_id {
                "D001249" => Ok("Asthma".to_string()),
                "D006073" => Ok("Gout".to_string()),
                "D000152" => Ok("Acne Vulgaris".to_string()),
                other => Err(ScienceError::ApiError("mesh".into(), format!("0 results for {other}"))),
            }
        }
    }

    fn generator(by_specialty: HashMap<&'static str, Vec<&'static str>>) -> (FeedGenerator, Arc<FakeGraph>) {
        let graph = Arc::new(FakeGraph {
            seen: Mutex::new(Vec::new()),
            by_specialty,
        });
        let generator = FeedGenerator::new(
            graph.clone(),
            Arc::new(FakeLabels),
            Arc::new(GraphSchema::default()),
        );
        (generator, graph)
    }

    #[tokio::test]
    async fn collects_sorted_unique_labels() {
        let (generator, graph) = generator(HashMap::from([
            ("Q3286546", vec!["D001249", "D006073", "NoID"]),
            ("Q171171", vec!["D000152", "D001249", "D999999"]),
        ]));

        let feed = generator.generate().await.unwrap();
        assert_eq!(feed, vec!["Acne Vulgaris", "Asthma", "Gout"]);
        // Specialty listing plus one descriptor query per specialty.
        assert_eq!(graph.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn no_specialties_gives_empty_feed() {
        let (generator, _) = generator(HashMap::new());
        assert!(generator.generate().await.unwrap().is_empty());
    }

    #[test]
    fn descriptor_query_follows_part_of_chain() {
        let (generator, _) = generator(HashMap::new());
        let q = generator.descriptor_query("Q3286546");
        assert!(q.contains("?item wdt:P31 wd:Q12136; wdt:P1995 ?medspec; wdt:P486 ?MeSHID."));
        assert!(q.contains("?medspec wdt:P361* wd:Q3286546."));
        assert!(generator.specialty_query().contains("?item wdt:P1995 ?spec."));
    }
}
