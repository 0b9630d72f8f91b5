//! Semantic similarity index consumed by the reflector.
//!
//! The reflector only needs `query(text, namespace, top_k)`; population of the
//! index happens before a run starts. [`LocalIndex`] is an in-memory,
//! namespace-partitioned implementation that scores a query against every
//! equally long word window of each indexed chunk, so a verbatim excerpt of
//! indexed text scores 1.0 and a paraphrase scores proportionally lower.
//!
//! Scoring runs on the blocking pool. Dropping the query future (timeout,
//! cancellation) stops the scan at the next window.

use crate::clause::{self, ClauseRecord};
use crate::errors::IndexError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One ranked hit from a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
    /// Normalized similarity in `0.0..=1.0`.
    pub score: f64,
    /// The indexed chunk that matched.
    pub metadata: ClauseRecord,
}

/// Read-only similarity search over indexed document text.
///
/// Implementations must scope results to `namespace` and return matches in
/// descending score order, at most `top_k` of them.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    async fn query(
        &self,
        text: &str,
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>, IndexError>;
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    record: ClauseRecord,
    words: Vec<String>,
    /// Char count of each word, for window length bounds.
    word_chars: Vec<usize>,
}

impl IndexedChunk {
    fn new(record: &ClauseRecord) -> Self {
        let words = normalize(&record.raw_text);
        let word_chars = words.iter().map(|w| w.chars().count()).collect();
        Self {
            record: record.clone(),
            words,
            word_chars,
        }
    }
}

/// In-memory index keyed by namespace.
#[derive(Debug, Clone, Default)]
pub struct LocalIndex {
    namespaces: HashMap<String, Arc<Vec<IndexedChunk>>>,
}

impl LocalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index holding one document's records under `namespace`.
    pub fn from_records(namespace: &str, records: &[ClauseRecord]) -> Self {
        let mut index = Self::new();
        index.upsert(namespace, records);
        index
    }

    /// Load a clause file (JSON or text) into `namespace`.
    pub fn from_file(path: &Path, namespace: &str) -> Result<Self, IndexError> {
        let records = clause::load_clauses(path).map_err(|source| IndexError::LoadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        if records.is_empty() {
            return Err(IndexError::Unavailable(format!(
                "{} contains no indexable text",
                path.display()
            )));
        }
        Ok(Self::from_records(namespace, &records))
    }

    /// Add records to a namespace.
    pub fn upsert(&mut self, namespace: &str, records: &[ClauseRecord]) {
        let chunks = self.namespaces.entry(namespace.to_string()).or_default();
        Arc::make_mut(chunks).extend(records.iter().map(IndexedChunk::new));
    }

    /// Number of chunks held for a namespace.
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces.get(namespace).map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(|c| c.is_empty())
    }
}

#[async_trait]
impl SemanticIndex for LocalIndex {
    async fn query(
        &self,
        text: &str,
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        let query = normalize(text);
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let Some(chunks) = self.namespaces.get(namespace).cloned() else {
            return Ok(Vec::new());
        };

        let abandon = CancellationToken::new();
        let _stop_on_drop = abandon.clone().drop_guard();

        tokio::task::spawn_blocking(move || rank_chunks(&query, &chunks, top_k, &abandon))
            .await
            .map_err(|e| IndexError::QueryFailed(format!("similarity search aborted: {}", e)))?
            .ok_or_else(|| IndexError::QueryFailed("similarity search abandoned".to_string()))
    }
}

fn normalize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Score every chunk and keep the best `top_k`. `None` if `abandon` fired.
fn rank_chunks(
    query: &[String],
    chunks: &[IndexedChunk],
    top_k: usize,
    abandon: &CancellationToken,
) -> Option<Vec<IndexMatch>> {
    let query_text = query.join(" ");
    let mut matches = Vec::with_capacity(chunks.len());

    for chunk in chunks.iter().filter(|c| !c.words.is_empty()) {
        let score = window_similarity(&query_text, query.len(), chunk, abandon)?;
        matches.push(IndexMatch {
            score,
            metadata: chunk.record.clone(),
        });
    }

    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches.truncate(top_k);
    Some(matches)
}

/// Best normalized Levenshtein similarity between the query and any window
/// of the chunk with the same word count.
///
/// Windows whose length alone caps them at or below the best score so far
/// are skipped; the result is the same as scoring all of them.
fn window_similarity(
    query_text: &str,
    query_words: usize,
    chunk: &IndexedChunk,
    abandon: &CancellationToken,
) -> Option<f64> {
    if chunk.words.len() <= query_words {
        return Some(strsim::normalized_levenshtein(query_text, &chunk.words.join(" ")));
    }

    let query_chars = query_text.chars().count();
    let mut best = 0.0_f64;
    for (start, window) in chunk.words.windows(query_words).enumerate() {
        if abandon.is_cancelled() {
            return None;
        }
        let window_chars =
            chunk.word_chars[start..start + query_words].iter().sum::<usize>() + query_words - 1;
        if length_bound(query_chars, window_chars) <= best {
            continue;
        }
        best = best.max(strsim::normalized_levenshtein(query_text, &window.join(" ")));
        if best >= 1.0 {
            break;
        }
    }
    Some(best)
}

/// Upper bound on normalized Levenshtein similarity of strings with these
/// char counts: the distance is at least their length difference.
fn length_bound(a: usize, b: usize) -> f64 {
    let longest = a.max(b);
    if longest == 0 {
        return 1.0;
    }
    a.min(b) as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ClauseRecord> {
        vec![
            ClauseRecord::new(
                "1.1",
                "Leave",
                1,
                "1.1 The Employee is entitled to 30 days of annual leave.",
            ),
            ClauseRecord::new("8.1", "Termination", 3, "8.1 Notice period shall be 1 week."),
        ]
    }

    #[tokio::test]
    async fn test_verbatim_excerpt_scores_one() {
        let index = LocalIndex::from_records("contract_a", &records());
        let matches = index
            .query("Notice period shall be 1 week.", "contract_a", 1)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].metadata.clause_id, "8.1");
        assert!((matches[0].score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_matching_ignores_case_and_whitespace() {
        let index = LocalIndex::from_records("contract_a", &records());
        let matches = index
            .query("entitled   to 30 DAYS of\nannual leave.", "contract_a", 1)
            .await
            .unwrap();
        assert_eq!(matches[0].metadata.clause_id, "1.1");
        assert!((matches[0].score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_fabricated_quote_scores_low() {
        let index = LocalIndex::from_records("contract_a", &records());
        let matches = index
            .query("The employer may terminate without any notice whatsoever.", "contract_a", 1)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].score < 0.85, "score was {}", matches[0].score);
    }

    #[tokio::test]
    async fn test_results_sorted_and_truncated() {
        let index = LocalIndex::from_records("contract_a", &records());
        let matches = index
            .query("Notice period shall be 1 week.", "contract_a", 5)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches[0].score >= matches[1].score);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let mut index = LocalIndex::from_records("contract_a", &records());
        index.upsert(
            "contract_b",
            &[ClauseRecord::new("2.1", "Pay", 1, "Salary is paid monthly in arrears.")],
        );

        let matches = index
            .query("Notice period shall be 1 week.", "contract_b", 1)
            .await
            .unwrap();
        assert_eq!(matches[0].metadata.clause_id, "2.1");
        assert!(matches[0].score < 0.85);

        let none = index.query("anything", "contract_missing", 1).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_returns_nothing() {
        let index = LocalIndex::from_records("contract_a", &records());
        assert!(index.query("   ", "contract_a", 1).await.unwrap().is_empty());
    }

    #[test]
    fn test_from_file_rejects_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "[]").unwrap();
        let err = LocalIndex::from_file(&path, "ns").unwrap_err();
        assert!(matches!(err, IndexError::Unavailable(_)));
    }

    #[test]
    fn test_from_file_missing_is_load_failure() {
        let err = LocalIndex::from_file(Path::new("/nonexistent/clauses.json"), "ns").unwrap_err();
        assert!(matches!(err, IndexError::LoadFailed { .. }));
    }

    #[tokio::test]
    async fn test_verbatim_excerpt_found_in_long_chunk() {
        let filler = "the parties agree to the terms set out below ".repeat(200);
        let text = format!("{}Notice period shall be 1 week. {}", filler, filler);
        let index = LocalIndex::from_records("ns", &[ClauseRecord::new("8.1", "Termination", 3, &text)]);

        let matches = index.query("Notice period shall be 1 week.", "ns", 1).await.unwrap();
        assert!((matches[0].score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_length_bound_pruning_matches_full_scan() {
        let chunk = IndexedChunk::new(&ClauseRecord::new(
            "1",
            "S",
            1,
            "a bb ccc dddd eeeee the employee shall receive thirty days paid leave yearly",
        ));
        let query = normalize("employee shall receive thirty days leave");
        let query_text = query.join(" ");

        let full = chunk
            .words
            .windows(query.len())
            .map(|w| strsim::normalized_levenshtein(&query_text, &w.join(" ")))
            .fold(0.0, f64::max);
        let pruned =
            window_similarity(&query_text, query.len(), &chunk, &CancellationToken::new()).unwrap();
        assert_eq!(pruned, full);
    }

    #[test]
    fn test_length_bound() {
        assert_eq!(length_bound(0, 0), 1.0);
        assert_eq!(length_bound(5, 10), 0.5);
        assert_eq!(length_bound(10, 5), 0.5);
    }

    #[test]
    fn test_abandoned_scan_stops() {
        let text = "word ".repeat(500);
        let chunks = vec![IndexedChunk::new(&ClauseRecord::new("1", "S", 1, &text))];
        let abandon = CancellationToken::new();
        abandon.cancel();
        assert!(rank_chunks(&normalize("some other words"), &chunks, 1, &abandon).is_none());
    }

    #[test]
    fn test_len_counts_per_namespace() {
        let index = LocalIndex::from_records("contract_a", &records());
        assert_eq!(index.len("contract_a"), 2);
        assert_eq!(index.len("contract_b"), 0);
        assert!(!index.is_empty());
        assert!(LocalIndex::new().is_empty());
    }
}
