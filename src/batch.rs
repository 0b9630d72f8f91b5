//! Batch driver: audits every clause of a document.
//!
//! Clauses run on spawned tasks through a bounded, order-preserving stream,
//! so outcomes come back in input order whatever the concurrency. A task that
//! panics is recorded as an escalated outcome with a synthetic ERROR finding
//! and the remaining clauses carry on.

use crate::clause::ClauseRecord;
use crate::orchestrator::{AuditOutcome, ClauseAuditOrchestrator};
use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;

/// Runs the orchestrator over a sequence of clauses.
#[derive(Clone)]
pub struct BatchDriver {
    orchestrator: ClauseAuditOrchestrator,
    concurrency: usize,
    cancel: CancellationToken,
}

impl BatchDriver {
    /// Sequential driver (one clause at a time).
    pub fn new(orchestrator: ClauseAuditOrchestrator) -> Self {
        Self {
            orchestrator,
            concurrency: 1,
            cancel: CancellationToken::new(),
        }
    }

    /// Maximum clauses in flight; values below 1 become 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Share an external cancellation token (e.g. wired to Ctrl-C).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Audit `clauses` within `namespace`, returning outcomes in input order.
    pub async fn run(&self, clauses: Vec<ClauseRecord>, namespace: &str) -> Vec<AuditOutcome> {
        let total = clauses.len();
        tracing::info!(
            clauses = total,
            concurrency = self.concurrency,
            namespace,
            "starting clause audit batch"
        );

        let outcomes: Vec<AuditOutcome> = stream::iter(clauses.into_iter().enumerate())
            .map(|(position, clause)| {
                let orchestrator = self.orchestrator.clone();
                let cancel = self.cancel.clone();
                let namespace = namespace.to_string();
                let clause_id = clause.clause_id.clone();
                let handle = tokio::spawn(async move {
                    tracing::debug!(
                        clause_id = %clause.clause_id,
                        position = position + 1,
                        total,
                        "auditing clause"
                    );
                    orchestrator.run_with_cancel(&clause, &namespace, &cancel).await
                });
                async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!(clause_id = %clause_id, error = %e, "clause audit task failed");
                            AuditOutcome::failed(&clause_id, format!("clause audit task failed: {}", e))
                        }
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let unverified = outcomes.iter().filter(|o| o.is_unverified()).count();
        tracing::info!(
            clauses = outcomes.len(),
            unverified,
            "clause audit batch finished"
        );
        outcomes
    }
}
