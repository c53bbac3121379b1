//! QuickStatements batch-edit output.
//!
//! One tab-separated line per statement, provenance pairs trailing:
//!
//! ```text
//! Q47550229	P932	"5729401"	S248	Q229883	S813	+2019-03-01T00:00:00Z/11
//! ```

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use chrono::NaiveDate;
use medwiki_core::schema::GraphSchema;

use crate::error::Result;
use crate::records::{JoinedRecord, time_literal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub entity: String,
    pub property: String,
    pub value: String,
    pub sources: Vec<(String, String)>,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.entity, self.property, self.value)?;
        for (key, value) in &self.sources {
            write!(f, "\t{key}\t{value}")?;
        }
        Ok(())
    }
}

struct StatementBuilder<'a> {
    entity: &'a str,
    schema: &'a GraphSchema,
    retrieved: &'a str,
    statements: Vec<Statement>,
}

impl StatementBuilder<'_> {
    fn push(&mut self, property: &str, value: String, stated_in: &str) {
        let refs = &self.schema.references;
        self.statements.push(Statement {
            entity: self.entity.to_string(),
            property: property.to_string(),
            value,
            sources: vec![
                (refs.stated_in.clone(), stated_in.to_string()),
                (refs.retrieved.clone(), self.retrieved.to_string()),
            ],
        });
    }
}

/// Statements for one joined record; empty when the article itself was not
/// found in the graph.
pub fn record_statements(
    joined: &JoinedRecord,
    schema: &GraphSchema,
    retrieved: &str,
) -> Vec<Statement> {
    let Some(entity) = joined.article_entity.as_deref() else {
        return Vec::new();
    };
    let record = &joined.record;
    let props = &schema.properties;
    let types = &schema.types;
    let pmc = schema.items.pubmed_central.as_str();

    let mut b = StatementBuilder {
        entity,
        schema,
        retrieved,
        statements: Vec::new(),
    };

    if let Some(pmcid) = record.pmcid.as_deref() {
        b.push(&props.pmcid, quoted(pmcid), pmc);
    }
    if let Some(date) = record.publication_date_literal() {
        b.push(&props.publication_date, date, pmc);
    }
    if record.is_review {
        b.push(&props.instance_of, types.review_article.clone(), pmc);
    }
    if let Some(license) = joined.license.entity.as_deref() {
        b.push(&props.license, license.to_string(), joined.license.source_item(schema));
    }
    if let Some(journal) = joined.journal_entity.as_deref() {
        b.push(&props.published_in, journal.to_string(), pmc);
    }
    for subject in &joined.subjects {
        for topic in subject.entities() {
            b.push(&props.main_subject, topic.to_string(), pmc);
        }
    }
    if record.is_retracted {
        b.push(&props.instance_of, types.retracted_paper.clone(), pmc);
        if let Some(by) = joined.retracted_by_entity.as_deref() {
            b.push(&props.retracted_by, by.to_string(), pmc);
        }
    }
    if record.is_retraction {
        b.push(&props.instance_of, types.retraction_notice.clone(), pmc);
    }

    b.statements
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

pub struct QuickStatementsWriter<W: Write> {
    out: W,
    schema: Arc<GraphSchema>,
    retrieved: String,
    statements: usize,
}

impl<W: Write> QuickStatementsWriter<W> {
    /// `run_date` stamps every "retrieved" reference.
    pub fn new(out: W, schema: Arc<GraphSchema>, run_date: NaiveDate) -> Self {
        Self {
            out,
            schema,
            retrieved: time_literal(&run_date),
            statements: 0,
        }
    }

    /// Writes the record's statement group followed by a blank line.
    /// Returns how many statements were written.
    pub fn write_record(&mut self, joined: &JoinedRecord) -> Result<usize> {
        let statements = record_statements(joined, &self.schema, &self.retrieved);
        if statements.is_empty() {
            return Ok(0);
        }
        for statement in &statements {
            writeln!(self.out, "{statement}")?;
        }
        writeln!(self.out)?;
        self.statements += statements.len();
        Ok(statements.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn statements(&self) -> usize {
        self.statements
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
