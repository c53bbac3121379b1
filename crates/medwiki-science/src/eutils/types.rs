//! Raw PubMed records as delivered by efetch, before any derivation.

/// One `<PubmedArticle>`. Fields are optional wherever the source document
/// may leave the element out; nothing here is interpreted yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PubmedArticle {
    /// `MedlineCitation/PMID`.
    pub pmid: Option<String>,
    pub article: Option<Article>,
    pub mesh_headings: Vec<MeshHeading>,
    pub comments_corrections: Vec<CommentsCorrection>,
    /// `PubmedData/ArticleIdList/ArticleId`.
    pub article_ids: Vec<ArticleId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Article {
    pub title: String,
    pub journal: Option<Journal>,
    pub publication_types: Vec<String>,
    pub article_dates: Vec<PartialDate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Journal {
    pub title: Option<String>,
    pub issn: Option<String>,
    /// `JournalIssue/PubDate`. The month may be `"3"` or `"Mar"`.
    pub pub_date: Option<PartialDate>,
}

/// Date fields kept as the source wrote them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialDate {
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshHeading {
    pub descriptor: Option<MeshTerm>,
    pub qualifiers: Vec<MeshTerm>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshTerm {
    /// Descriptor or qualifier UI, e.g. `D001249`.
    pub ui: String,
    pub name: String,
    /// `MajorTopicYN="Y"`.
    pub major_topic: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentsCorrection {
    pub ref_type: String,
    pub pmid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleId {
    pub id_type: String,
    pub value: String,
}

/// Continuation handle returned by a history-enabled esearch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHandle {
    pub count: usize,
    pub web_env: String,
    pub query_key: String,
}
