//! Streaming reader for efetch `PubmedArticleSet` documents.
//!
//! Titles routinely carry inline markup (`<i>`, `<sup>`), so the reader walks
//! events and routes text by the open-element path instead of mapping
//! elements onto fixed string fields.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, ScienceError};
use crate::eutils::types::{
    Article, ArticleId, CommentsCorrection, Journal, MeshHeading, MeshTerm, PartialDate,
    PubmedArticle,
};
use crate::xml::{attribute, clean_optional, clean_text, element_name, in_element, path_ends_with};

pub fn parse_article_set(xml: &str) -> Result<Vec<PubmedArticle>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut articles = Vec::new();
    let mut current: Option<PubmedArticle> = None;
    let mut saw_set = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            ScienceError::Parse(format!(
                "invalid PubMed XML at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = element_name(&e);
                if name == "PubmedArticleSet" {
                    saw_set = true;
                }
                if name == "PubmedArticle" {
                    current = Some(PubmedArticle::default());
                } else if let Some(article) = current.as_mut() {
                    open_element(article, &stack, &name, &e)?;
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = element_name(&e);
                if name == "PubmedArticleSet" {
                    saw_set = true;
                }
                if let Some(article) = current.as_mut() {
                    open_element(article, &stack, &name, &e)?;
                }
            }
            Event::Text(t) => {
                if let Some(article) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| ScienceError::Parse(format!("invalid PubMed text: {e}")))?;
                    push_text(article, &stack, &text);
                }
            }
            Event::CData(c) => {
                if let Some(article) = current.as_mut() {
                    let bytes = c.into_inner();
                    push_text(article, &stack, &String::from_utf8_lossy(&bytes));
                }
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some("PubmedArticle") {
                    if let Some(article) = current.take() {
                        articles.push(normalize(article));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_set {
        return Err(ScienceError::Parse(
            "efetch response has no PubmedArticleSet".to_string(),
        ));
    }
    Ok(articles)
}

fn open_element(
    record: &mut PubmedArticle,
    stack: &[String],
    name: &str,
    e: &BytesStart<'_>,
) -> Result<()> {
    match name {
        "Article" if path_ends_with(stack, &["MedlineCitation"]) => {
            record.article = Some(Article::default());
        }
        "Journal" if path_ends_with(stack, &["Article"]) => {
            if let Some(article) = record.article.as_mut() {
                article.journal = Some(Journal::default());
            }
        }
        "PubDate" if path_ends_with(stack, &["Journal", "JournalIssue"]) => {
            if let Some(journal) = journal_mut(record) {
                journal.pub_date = Some(PartialDate::default());
            }
        }
        "ArticleDate" if path_ends_with(stack, &["Article"]) => {
            if let Some(article) = record.article.as_mut() {
                article.article_dates.push(PartialDate::default());
            }
        }
        "PublicationType" if path_ends_with(stack, &["PublicationTypeList"]) => {
            if let Some(article) = record.article.as_mut() {
                article.publication_types.push(String::new());
            }
        }
        "MeshHeading" if path_ends_with(stack, &["MeshHeadingList"]) => {
            record.mesh_headings.push(MeshHeading::default());
        }
        "DescriptorName" | "QualifierName" if path_ends_with(stack, &["MeshHeading"]) => {
            let term = MeshTerm {
                ui: attribute(e, "UI")?,
                name: String::new(),
                major_topic: attribute(e, "MajorTopicYN")? == "Y",
            };
            if let Some(heading) = record.mesh_headings.last_mut() {
                if name == "DescriptorName" {
                    heading.descriptor = Some(term);
                } else {
                    heading.qualifiers.push(term);
                }
            }
        }
        "CommentsCorrections" if path_ends_with(stack, &["CommentsCorrectionsList"]) => {
            record.comments_corrections.push(CommentsCorrection {
                ref_type: attribute(e, "RefType")?,
                pmid: None,
            });
        }
        "ArticleId" if path_ends_with(stack, &["PubmedData", "ArticleIdList"]) => {
            record.article_ids.push(ArticleId {
                id_type: attribute(e, "IdType")?,
                value: String::new(),
            });
        }
        _ => {}
    }
    Ok(())
}

fn push_text(record: &mut PubmedArticle, stack: &[String], text: &str) {
    if in_element(stack, "ArticleTitle") && in_element(stack, "Article") {
        if let Some(article) = record.article.as_mut() {
            article.title.push_str(text);
        }
        return;
    }

    if path_ends_with(stack, &["MedlineCitation", "PMID"]) {
        append(record.pmid.get_or_insert_with(String::new), text);
    } else if path_ends_with(stack, &["Journal", "Title"]) {
        if let Some(journal) = journal_mut(record) {
            append(journal.title.get_or_insert_with(String::new), text);
        }
    } else if path_ends_with(stack, &["Journal", "ISSN"]) {
        if let Some(journal) = journal_mut(record) {
            append(journal.issn.get_or_insert_with(String::new), text);
        }
    } else if path_ends_with(stack, &["JournalIssue", "PubDate", "Year"])
        || path_ends_with(stack, &["JournalIssue", "PubDate", "Month"])
        || path_ends_with(stack, &["JournalIssue", "PubDate", "Day"])
    {
        if let Some(date) = journal_mut(record).and_then(|j| j.pub_date.as_mut()) {
            push_date_part(date, stack, text);
        }
    } else if path_ends_with(stack, &["ArticleDate", "Year"])
        || path_ends_with(stack, &["ArticleDate", "Month"])
        || path_ends_with(stack, &["ArticleDate", "Day"])
    {
        if let Some(date) = record
            .article
            .as_mut()
            .and_then(|a| a.article_dates.last_mut())
        {
            push_date_part(date, stack, text);
        }
    } else if path_ends_with(stack, &["PublicationTypeList", "PublicationType"]) {
        if let Some(kind) = record
            .article
            .as_mut()
            .and_then(|a| a.publication_types.last_mut())
        {
            kind.push_str(text);
        }
    } else if path_ends_with(stack, &["MeshHeading", "DescriptorName"]) {
        if let Some(term) = record
            .mesh_headings
            .last_mut()
            .and_then(|h| h.descriptor.as_mut())
        {
            term.name.push_str(text);
        }
    } else if path_ends_with(stack, &["MeshHeading", "QualifierName"]) {
        if let Some(term) = record
            .mesh_headings
            .last_mut()
            .and_then(|h| h.qualifiers.last_mut())
        {
            term.name.push_str(text);
        }
    } else if path_ends_with(stack, &["CommentsCorrections", "PMID"]) {
        if let Some(cc) = record.comments_corrections.last_mut() {
            append(cc.pmid.get_or_insert_with(String::new), text);
        }
    } else if path_ends_with(stack, &["PubmedData", "ArticleIdList", "ArticleId"]) {
        if let Some(id) = record.article_ids.last_mut() {
            id.value.push_str(text);
        }
    }
}

fn push_date_part(date: &mut PartialDate, stack: &[String], text: &str) {
    let slot = match stack.last().map(String::as_str) {
        Some("Year") => &mut date.year,
        Some("Month") => &mut date.month,
        Some("Day") => &mut date.day,
        _ => return,
    };
    append(slot.get_or_insert_with(String::new), text);
}

fn append(target: &mut String, text: &str) {
    target.push_str(text);
}

fn journal_mut(record: &mut PubmedArticle) -> Option<&mut Journal> {
    record.article.as_mut().and_then(|a| a.journal.as_mut())
}

fn clean_date(date: PartialDate) -> PartialDate {
    PartialDate {
        year: clean_optional(date.year),
        month: clean_optional(date.month),
        day: clean_optional(date.day),
    }
}

fn clean_term(term: MeshTerm) -> MeshTerm {
    MeshTerm {
        ui: term.ui.trim().to_string(),
        name: clean_text(&term.name),
        major_topic: term.major_topic,
    }
}

fn normalize(record: PubmedArticle) -> PubmedArticle {
    PubmedArticle {
        pmid: clean_optional(record.pmid),
        article: record.article.map(|article| Article {
            title: clean_text(&article.title),
            journal: article.journal.map(|journal| Journal {
                title: clean_optional(journal.title),
                issn: clean_optional(journal.issn),
                pub_date: journal.pub_date.map(clean_date),
            }),
            publication_types: article
                .publication_types
                .into_iter()
                .map(|kind| clean_text(&kind))
                .filter(|kind| !kind.is_empty())
                .collect(),
            article_dates: article.article_dates.into_iter().map(clean_date).collect(),
        }),
        mesh_headings: record
            .mesh_headings
            .into_iter()
            .map(|heading| MeshHeading {
                descriptor: heading.descriptor.map(clean_term),
                qualifiers: heading.qualifiers.into_iter().map(clean_term).collect(),
            })
            .collect(),
        comments_corrections: record
            .comments_corrections
            .into_iter()
            .map(|cc| CommentsCorrection {
                ref_type: cc.ref_type.trim().to_string(),
                pmid: clean_optional(cc.pmid),
            })
            .collect(),
        article_ids: record
            .article_ids
            .into_iter()
            .map(|id| ArticleId {
                id_type: id.id_type.trim().to_string(),
                value: id.value.trim().to_string(),
            })
            .collect(),
    }
}
