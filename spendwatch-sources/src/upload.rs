//! Uploaded spreadsheets
//!
//! Users may supply their own expense sheets. Column detection is left to
//! the [`UploadParser`] implementation; [`DelimitedUploadParser`] handles the
//! fixed layout `author;category;amount;date;region;description`.
//!
//! Parsed rows feed two consumers: [`UploadAnalysis`] for grouped summaries,
//! and [`UploadAdapter`], which exposes the rows as a spending source.

use crate::adapter::{FetchParams, SourceAdapter};
use crate::parse::{parse_amount, parse_date};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use spendwatch_core::{
    FieldGroup, NormalizedRecord, SourceError, SourceKind, SpendCategory, SpendRecord,
    TrackedIdentity,
};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// RECORDS
// ============================================================================

/// One spreadsheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub author: String,
    pub category: SpendCategory,
    pub amount: f64,
    pub date: NaiveDate,
    pub region: String,
    pub description: String,
}

impl UploadRecord {
    pub fn to_spend_record(&self) -> SpendRecord {
        SpendRecord {
            date: self.date,
            category: self.category,
            amount: self.amount,
            vendor: self.description.clone(),
            document_id: None,
            source: SourceKind::Upload,
        }
    }
}

/// A row that could not be parsed. `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRowError {
    pub line: usize,
    pub reason: String,
}

/// Parser output: good rows and per-row errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedUpload {
    pub records: Vec<UploadRecord>,
    pub errors: Vec<UploadRowError>,
}

/// Turns raw spreadsheet text into records.
pub trait UploadParser: Send + Sync {
    fn parse(&self, raw: &str) -> ParsedUpload;
}

// ============================================================================
// DELIMITED PARSER
// ============================================================================

const COLUMN_COUNT: usize = 6;

/// Fixed-column delimited text parser.
#[derive(Debug, Clone)]
pub struct DelimitedUploadParser {
    delimiter: char,
    has_header: bool,
}

impl DelimitedUploadParser {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            has_header: true,
        }
    }

    pub fn without_header(mut self) -> Self {
        self.has_header = false;
        self
    }

    fn parse_row(&self, row: &str) -> Result<UploadRecord, String> {
        let cells: Vec<&str> = row.split(self.delimiter).map(str::trim).collect();
        if cells.len() < COLUMN_COUNT {
            return Err(format!(
                "expected {} columns, found {}",
                COLUMN_COUNT,
                cells.len()
            ));
        }

        let author = cells[0];
        if author.is_empty() {
            return Err("empty author".to_string());
        }
        let amount = parse_amount(&serde_json::Value::String(cells[2].to_string()), "amount")
            .map_err(|e| e.to_string())?;
        let date = parse_date(cells[3], "date").map_err(|e| e.to_string())?;

        Ok(UploadRecord {
            author: author.to_string(),
            category: SpendCategory::from_label(cells[1]),
            amount,
            date,
            region: cells[4].to_string(),
            description: cells[5..].join(&self.delimiter.to_string()),
        })
    }
}

impl Default for DelimitedUploadParser {
    fn default() -> Self {
        Self::new(';')
    }
}

impl UploadParser for DelimitedUploadParser {
    fn parse(&self, raw: &str) -> ParsedUpload {
        let mut parsed = ParsedUpload::default();
        let skip = usize::from(self.has_header);

        for (index, row) in raw.lines().enumerate().skip(skip) {
            if row.trim().is_empty() {
                continue;
            }
            match self.parse_row(row) {
                Ok(record) => parsed.records.push(record),
                Err(reason) => parsed.errors.push(UploadRowError {
                    line: index + 1,
                    reason,
                }),
            }
        }
        parsed
    }
}

// ============================================================================
// FILTER & ANALYSIS
// ============================================================================

/// Optional row filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFilter {
    pub author: Option<String>,
    pub year: Option<i32>,
    pub region: Option<String>,
}

impl UploadFilter {
    pub fn matches(&self, record: &UploadRecord) -> bool {
        let author_ok = self
            .author
            .as_deref()
            .is_none_or(|a| record.author.trim().eq_ignore_ascii_case(a.trim()));
        let year_ok = self.year.is_none_or(|y| record.date.year() == y);
        let region_ok = self
            .region
            .as_deref()
            .is_none_or(|r| record.region.trim().eq_ignore_ascii_case(r.trim()));
        author_ok && year_ok && region_ok
    }
}

/// Total and row count for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub label: String,
    pub total: f64,
    pub count: usize,
}

/// Filtered rows with summaries by author, category and region.
///
/// Summaries are ordered by descending total, then label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadAnalysis {
    pub records: Vec<UploadRecord>,
    pub by_author: Vec<GroupSummary>,
    pub by_category: Vec<GroupSummary>,
    pub by_region: Vec<GroupSummary>,
    pub total: f64,
    pub errors: Vec<UploadRowError>,
}

impl UploadAnalysis {
    pub fn build(parsed: &ParsedUpload, filter: &UploadFilter) -> Self {
        let records: Vec<UploadRecord> = parsed
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();

        Self {
            by_author: summarize(&records, |r| r.author.clone()),
            by_category: summarize(&records, |r| r.category.to_string()),
            by_region: summarize(&records, |r| r.region.clone()),
            total: records.iter().map(|r| r.amount).sum(),
            errors: parsed.errors.clone(),
            records,
        }
    }
}

fn summarize(records: &[UploadRecord], label: impl Fn(&UploadRecord) -> String) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(label(record)).or_insert((0.0, 0));
        entry.0 += record.amount;
        entry.1 += 1;
    }

    let mut summaries: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(label, (total, count))| GroupSummary {
            label,
            total,
            count,
        })
        .collect();
    summaries.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.label.cmp(&b.label)));
    summaries
}

// ============================================================================
// ADAPTER
// ============================================================================

/// Exposes uploaded rows as the spending source for matching identities.
///
/// Rows match when their author equals the identity's display name
/// (ASCII case-insensitive). A set reference year restricts rows to it.
#[derive(Debug, Clone)]
pub struct UploadAdapter {
    records: Arc<Vec<UploadRecord>>,
    owned: [FieldGroup; 1],
}

impl UploadAdapter {
    pub fn new(parsed: ParsedUpload) -> Self {
        Self {
            records: Arc::new(parsed.records),
            owned: [FieldGroup::Spending],
        }
    }
}

#[async_trait]
impl SourceAdapter for UploadAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Upload
    }

    fn owned_fields(&self) -> &[FieldGroup] {
        &self.owned
    }

    async fn fetch(
        &self,
        identity: &TrackedIdentity,
        params: &FetchParams,
    ) -> Result<Vec<NormalizedRecord>, SourceError> {
        let filter = UploadFilter {
            author: Some(identity.display_name.clone()),
            year: params.year,
            region: None,
        };
        Ok(self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| NormalizedRecord::Expense(r.to_spend_record()))
            .collect())
    }
}
