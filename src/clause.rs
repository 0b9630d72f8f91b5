//! Clause records and the lightweight producers that feed the audit loop.
//!
//! Clause records arrive either as a JSON array produced by an upstream
//! parser, or as markdown / plain text that is split on common legal clause
//! markers (`Article 3`, `Section 2`, `4.1`, `(a)`) and `#` headers. Pages are
//! separated by form feeds.
//!
//! A header starts a new section but not a new clause: the header line and
//! the text under it stay with the running clause id. Text that precedes the
//! first clause marker on a page is labelled with the [`GENERAL_CLAUSE_ID`]
//! sentinel; callers drop it with [`auditable`] before auditing.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// Sentinel clause id for text not grouped under any clause marker.
pub const GENERAL_CLAUSE_ID: &str = "General";

/// Fragments shorter than this (after trimming) are treated as noise.
pub const MIN_CLAUSE_CHARS: usize = 10;

static CLAUSE_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:Article\s+\d+|Section\s+\d+|Clause\s+\d+|\d+\.\d+|\(\w\))").unwrap()
});

static HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#+\s+(.*)").unwrap());

/// A delimited unit of contract text subject to compliance evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseRecord {
    pub clause_id: String,
    pub section: String,
    /// 1-based page number.
    pub page_no: u32,
    pub raw_text: String,
}

impl ClauseRecord {
    pub fn new(clause_id: &str, section: &str, page_no: u32, raw_text: &str) -> Self {
        Self {
            clause_id: clause_id.to_string(),
            section: section.to_string(),
            page_no,
            raw_text: raw_text.to_string(),
        }
    }

    /// Whether this record is ungrouped text rather than a real clause.
    pub fn is_general(&self) -> bool {
        self.clause_id == GENERAL_CLAUSE_ID
    }
}

/// Load clause records from a file.
///
/// `.json` files are read as an array of records; anything else is treated
/// as markdown / plain text and split with [`split_clauses`].
pub fn load_clauses(path: &Path) -> Result<Vec<ClauseRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read clause input {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        let records: Vec<ClauseRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse clause records in {}", path.display()))?;
        Ok(records
            .into_iter()
            .filter(|r| r.raw_text.trim().chars().count() >= MIN_CLAUSE_CHARS)
            .collect())
    } else {
        Ok(split_clauses(&content))
    }
}

/// Split a markdown or plain-text contract into clause records.
pub fn split_clauses(text: &str) -> Vec<ClauseRecord> {
    text.split('\u{0C}')
        .enumerate()
        .flat_map(|(i, page)| split_page(page, i as u32 + 1))
        .collect()
}

fn split_page(text: &str, page_no: u32) -> Vec<ClauseRecord> {
    let mut records = Vec::new();
    let mut clause_id = GENERAL_CLAUSE_ID.to_string();
    let mut section = GENERAL_CLAUSE_ID.to_string();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = HEADER_REGEX.captures(line) {
            flush(&mut records, page_no, &section, &clause_id, &mut buffer);
            section = caps[1].trim().to_string();
        }

        if let Some(m) = CLAUSE_MARKER_REGEX.find(line) {
            flush(&mut records, page_no, &section, &clause_id, &mut buffer);
            clause_id = m.as_str().to_string();
        }

        buffer.push(line);
    }

    flush(&mut records, page_no, &section, &clause_id, &mut buffer);
    records
}

fn flush(
    records: &mut Vec<ClauseRecord>,
    page_no: u32,
    section: &str,
    clause_id: &str,
    buffer: &mut Vec<&str>,
) {
    if buffer.is_empty() {
        return;
    }
    let content = buffer.join("\n");
    buffer.clear();
    if content.trim().chars().count() < MIN_CLAUSE_CHARS {
        return;
    }
    records.push(ClauseRecord::new(clause_id, section, page_no, &content));
}

/// Drop ungrouped `General` records, keeping input order.
pub fn auditable(records: Vec<ClauseRecord>) -> Vec<ClauseRecord> {
    records.into_iter().filter(|r| !r.is_general()).collect()
}

/// Derive the default index namespace for a contract file.
///
/// `"Employment Contract.pdf"` becomes `"contract_employment_contract"`.
pub fn default_namespace(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    format!("contract_{}", stem.to_lowercase().replace(' ', "_"))
}
