//! Knowledge-graph schema tables.
//!
//! Every entity and property ID the pipeline writes or queries lives here, in
//! one immutable value that is handed to the reconciler, resolver, and
//! formatters. The default is the Wikidata schema; a TOML file can replace it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MedwikiError, Result};

/// Canonical CC-BY-4.0 link, synthesized when a license grant names it only in prose.
pub const CC_BY_4_URL: &str = "https://creativecommons.org/licenses/by/4.0/";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSchema {
    /// Prefix stripped from entity URIs in query results.
    pub entity_prefix: String,
    pub types: EntityTypes,
    pub properties: Properties,
    pub references: ReferenceProperties,
    pub items: SourceItems,
    /// License code (bulk list) or canonical license URL (detail lookup) to entity.
    pub licenses: BTreeMap<String, String>,
}

/// Entities used as the object of "instance of".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityTypes {
    pub scholarly_article: String,
    pub scientific_journal: String,
    pub disease: String,
    pub drug: String,
    pub retracted_paper: String,
    pub retraction_notice: String,
    pub review_article: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Properties {
    pub instance_of: String,
    pub part_of: String,
    pub issn: String,
    pub license: String,
    pub main_subject: String,
    pub mesh_id: String,
    /// Links a disease to its medical specialty.
    pub medical_specialty: String,
    pub pmid: String,
    pub pmcid: String,
    pub published_in: String,
    pub publication_date: String,
    pub retracted_by: String,
}

/// Property keys used on provenance sub-lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceProperties {
    pub stated_in: String,
    pub retrieved: String,
}

/// Entities cited as the origin of a statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceItems {
    pub pubmed: String,
    pub pubmed_central: String,
    pub europe_pmc: String,
}

impl Default for EntityTypes {
    fn default() -> Self {
        Self {
            scholarly_article: "Q13442814".to_string(),
            scientific_journal: "Q5633421".to_string(),
            disease: "Q12136".to_string(),
            drug: "Q8386".to_string(),
            retracted_paper: "Q45182324".to_string(),
            retraction_notice: "Q7316896".to_string(),
            review_article: "Q7318358".to_string(),
        }
    }
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            instance_of: "P31".to_string(),
            part_of: "P361".to_string(),
            issn: "P236".to_string(),
            license: "P275".to_string(),
            main_subject: "P921".to_string(),
            mesh_id: "P486".to_string(),
            medical_specialty: "P1995".to_string(),
            pmid: "P698".to_string(),
            pmcid: "P932".to_string(),
            published_in: "P1433".to_string(),
            publication_date: "P577".to_string(),
            retracted_by: "P5824".to_string(),
        }
    }
}

impl Default for ReferenceProperties {
    fn default() -> Self {
        Self {
            stated_in: "S248".to_string(),
            retrieved: "S813".to_string(),
        }
    }
}

impl Default for SourceItems {
    fn default() -> Self {
        Self {
            pubmed: "Q180686".to_string(),
            pubmed_central: "Q229883".to_string(),
            europe_pmc: "Q5412157".to_string(),
        }
    }
}

const WIKIDATA_LICENSES: &[(&str, &str)] = &[
    ("CC0", "Q6938433"),
    ("CC BY", "Q6905323"),
    ("CC BY-NC-ND", "Q6937225"),
    ("CC BY-NC", "Q6936496"),
    ("https://creativecommons.org/publicdomain/zero/1.0/", "Q6938433"),
    ("https://creativecommons.org/publicdomain/mark/1.0/", "Q7257361"),
    ("https://creativecommons.org/licenses/by/1.0/", "Q30942811"),
    ("https://creativecommons.org/licenses/by/2.0/", "Q19125117"),
    ("https://creativecommons.org/licenses/by/2.0/kr/", "Q44282633"),
    ("https://creativecommons.org/licenses/by/2.1/jp/", "Q26116436"),
    ("https://creativecommons.org/licenses/by/2.5/", "Q18810333"),
    ("https://creativecommons.org/licenses/by/2.5/se/", "Q27940776"),
    ("https://creativecommons.org/licenses/by/3.0/", "Q14947546"),
    ("https://creativecommons.org/licenses/by/3.0/au/", "Q52555753"),
    ("https://creativecommons.org/licenses/by/3.0/igo/", "Q26259495"),
    ("https://creativecommons.org/licenses/by/3.0/nl/", "Q53859967"),
    ("https://creativecommons.org/licenses/by/3.0/us/", "Q18810143"),
    ("https://creativecommons.org/licenses/by/4.0/", "Q20007257"),
    ("https://creativecommons.org/licenses/by-nc/1.0/", "Q44283370"),
    ("https://creativecommons.org/licenses/by-nc/2.0/", "Q44128984"),
    ("https://creativecommons.org/licenses/by-nc/2.5/", "Q19113746"),
    ("https://creativecommons.org/licenses/by-nc/3.0/", "Q18810331"),
    ("https://creativecommons.org/licenses/by-nc/4.0/", "Q34179348"),
    ("https://creativecommons.org/licenses/by-nc-nd/1.0/", "Q47008926"),
    ("https://creativecommons.org/licenses/by-nc-nd/2.0/", "Q47008927"),
    ("https://creativecommons.org/licenses/by-nc-nd/2.0/uk/", "Q56299316"),
    ("https://creativecommons.org/licenses/by-nc-nd/2.5/", "Q19068204"),
    ("https://creativecommons.org/licenses/by-nc-nd/2.5/pt/", "Q42172282"),
    ("https://creativecommons.org/licenses/by-nc-nd/3.0/", "Q19125045"),
    ("https://creativecommons.org/licenses/by-nc-nd/4.0/", "Q24082749"),
    ("https://creativecommons.org/licenses/by-nc-sa/1.0/", "Q47008954"),
    ("https://creativecommons.org/licenses/by-nc-sa/2.0/", "Q28050835"),
    ("https://creativecommons.org/licenses/by-nc-sa/2.0/kr/", "Q58041147"),
    ("https://creativecommons.org/licenses/by-nc-sa/2.5/", "Q19068212"),
    ("https://creativecommons.org/licenses/by-nc-sa/3.0/", "Q15643954"),
    ("https://creativecommons.org/licenses/by-nc-sa/4.0/", "Q42553662"),
    ("https://creativecommons.org/licenses/by-nd/1.0/", "Q47008966"),
    ("https://creativecommons.org/licenses/by-nd/2.0/", "Q35254645"),
    ("https://creativecommons.org/licenses/by-nd/2.5/", "Q18810338"),
    ("https://creativecommons.org/licenses/by-nd/3.0/", "Q18810160"),
    ("https://creativecommons.org/licenses/by-nd/4.0/", "Q36795408"),
    ("https://creativecommons.org/licenses/by-sa/1.0/", "Q47001652"),
    ("https://creativecommons.org/licenses/by-sa/2.0/", "Q19068220"),
    ("https://creativecommons.org/licenses/by-sa/2.0/kr/", "Q44282641"),
    ("https://creativecommons.org/licenses/by-sa/2.5/", "Q19113751"),
    ("https://creativecommons.org/licenses/by-sa/2.5/ca/", "Q24331618"),
    ("https://creativecommons.org/licenses/by-sa/2.5/nl/", "Q18199175"),
    ("https://creativecommons.org/licenses/by-sa/2.5/se/", "Q15914252"),
    ("https://creativecommons.org/licenses/by-sa/3.0/", "Q14946043"),
    ("https://creativecommons.org/licenses/by-sa/3.0/de/deed.de", "Q42716613"),
    ("https://creativecommons.org/licenses/by-sa/3.0/igo/", "Q56292840"),
    ("https://creativecommons.org/licenses/by-sa/3.0/nl/", "Q18195572"),
    ("https://creativecommons.org/licenses/by-sa/3.0/us/", "Q18810341"),
    ("https://creativecommons.org/licenses/sampling+/1.0/", "Q26913038"),
];

impl Default for GraphSchema {
    fn default() -> Self {
        let licenses = WIKIDATA_LICENSES
            .iter()
            .map(|(key, entity)| (key.to_string(), entity.to_string()))
            .collect();

        Self {
            entity_prefix: "http://www.wikidata.org/entity/".to_string(),
            types: EntityTypes::default(),
            properties: Properties::default(),
            references: ReferenceProperties::default(),
            items: SourceItems::default(),
            licenses,
        }
        .normalized()
    }
}

impl GraphSchema {
    /// Load a schema override from TOML. Sections left out keep their Wikidata defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MedwikiError::SchemaError(format!("cannot read {}: {e}", path.display()))
        })?;
        let schema: Self = toml::from_str(&contents)?;
        Ok(schema.normalized())
    }

    /// Rewrites URL-shaped license keys into their canonical form so lookups
    /// with canonicalized links always hit.
    pub fn normalized(mut self) -> Self {
        self.licenses = self
            .licenses
            .into_iter()
            .map(|(key, entity)| {
                let key = if key.contains("://") {
                    canonical_license_url(&key).unwrap_or(key)
                } else {
                    key
                };
                (key, entity)
            })
            .collect();
        self
    }

    pub fn license_entity(&self, key: &str) -> Option<&str> {
        self.licenses
            .get(key)
            .map(String::as_str)
            .filter(|entity| !entity.is_empty())
    }

    pub fn strip_entity_prefix<'a>(&self, uri: &'a str) -> &'a str {
        uri.strip_prefix(self.entity_prefix.as_str()).unwrap_or(uri)
    }
}

/// Forces the `https` scheme and a trailing path separator, so that the
/// `http://…/4.0` and `https://…/4.0/` spellings compare equal.
///
/// Returns `None` when `link` is not an absolute URL.
pub fn canonical_license_url(link: &str) -> Option<String> {
    let mut url = Url::parse(link.trim()).ok()?;
    if url.scheme() != "https" && url.set_scheme("https").is_err() {
        return None;
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Some(url.to_string())
}
