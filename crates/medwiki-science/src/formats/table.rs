use std::io::Write;

use crate::error::Result;
use crate::records::JoinedRecord;

pub const COLUMNS: [&str; 17] = [
    "Title",
    "Item",
    "PMID",
    "PMCID",
    "License PMC",
    "License EPMC",
    "License Item",
    "Main Subjects",
    "Publication Date",
    "Publication",
    "ISSN",
    "ISSN item",
    "Is Review Article",
    "Is retracted",
    "Retracted by",
    "Retracted by item",
    "Is retraction",
];

/// Tab-separated report, one row per licensed record.
pub struct TableWriter<W: Write> {
    out: W,
    rows: usize,
}

impl<W: Write> TableWriter<W> {
    /// Writes the header row straight away.
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, "{}", COLUMNS.join("\t"))?;
        Ok(Self { out, rows: 0 })
    }

    pub fn write_row(&mut self, joined: &JoinedRecord) -> Result<()> {
        writeln!(self.out, "{}", render_row(joined).join("\t"))?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn render_row(joined: &JoinedRecord) -> Vec<String> {
    let record = &joined.record;
    let license = &joined.license;

    let main_subjects = joined
        .subjects
        .iter()
        .map(|resolved| {
            let entities = resolved.entities().collect::<Vec<_>>();
            if entities.is_empty() {
                resolved.subject.name.clone()
            } else {
                format!("{} ({})", resolved.subject.name, entities.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    let cells = [
        record.title.clone(),
        text(&joined.article_entity),
        record.pmid.clone(),
        text(&record.pmcid),
        text(&license.code),
        text(&license.source_link),
        text(&license.entity),
        main_subjects,
        record.publication_date_literal().unwrap_or_default(),
        text(&record.journal),
        text(&record.issn),
        text(&joined.journal_entity),
        record.is_review.to_string(),
        record.is_retracted.to_string(),
        text(&record.retracted_by_pmid),
        text(&joined.retracted_by_entity),
        record.is_retraction.to_string(),
    ];
    cells.iter().map(|cell| sanitize(cell)).collect()
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Tabs and line breaks would split the row.
fn sanitize(cell: &str) -> String {
    cell.replace(['\t', '\r', '\n'], " ")
}
