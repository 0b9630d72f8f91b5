//! Clause listing: `clause-audit clauses`.

use anyhow::{Context, Result};
use clause_audit::clause::{self, ClauseRecord};
use std::path::Path;

pub fn cmd_clauses(input: &Path, all: bool, json: bool) -> Result<()> {
    let records = clause::load_clauses(input)?;
    let total = records.len();
    let records: Vec<ClauseRecord> = if all {
        records
    } else {
        clause::auditable(records)
    };

    if json {
        let out = serde_json::to_string_pretty(&records).context("Failed to serialize clause records")?;
        println!("{}", out);
        return Ok(());
    }

    println!(
        "{} clause(s) to audit ({} record(s) parsed) from {}",
        records.len(),
        total,
        input.display()
    );
    println!();
    for record in &records {
        let first_line = record.raw_text.lines().next().unwrap_or_default();
        println!(
            "  [p{}] {:<12} {:<24} {}",
            record.page_no,
            record.clause_id,
            truncate(&record.section, 24),
            truncate(first_line, 60)
        );
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}
