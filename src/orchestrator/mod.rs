//! Critic-reflector loop for a single clause.
//!
//! [`ClauseAuditOrchestrator::run`] drives the machine in [`state`] until it
//! reaches a terminal state and returns an [`AuditOutcome`]. It never fails:
//! the critic already converts reasoning failures into ERROR findings and the
//! reflector converts index failures into rejections, so the only exits are
//! the terminal reasons.
//!
//! All mutable state for a clause lives in a `ClauseRun` owned by one
//! invocation; orchestrators are cheap to clone and share nothing mutable.

pub mod outcome;
pub mod state;

pub use outcome::{AuditAttempt, AuditOutcome, TerminalReason};
pub use state::{AuditEvent, AuditState, TransitionError};

use crate::clause::ClauseRecord;
use crate::config::DEFAULT_CONTEXT;
use crate::critic::CriticEvaluator;
use crate::finding::{Finding, VerificationResult};
use crate::policy::RetryPolicy;
use crate::reflector::ReflectorVerifier;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Tracing target for per-attempt events.
pub const ATTEMPT_TARGET: &str = "clause_audit::attempt";

/// Why a run stopped before reaching a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

impl Interrupt {
    fn describe(&self) -> &'static str {
        match self {
            Self::Cancelled => "audit cancelled",
            Self::DeadlineExceeded => "clause deadline exceeded",
        }
    }
}

#[derive(Debug)]
enum Halt {
    Interrupted(Interrupt),
    Invalid(TransitionError),
}

impl From<TransitionError> for Halt {
    fn from(e: TransitionError) -> Self {
        Halt::Invalid(e)
    }
}

/// Mutable state of one clause audit.
#[derive(Debug)]
struct ClauseRun {
    state: AuditState,
    evaluations: u32,
    last_finding: Option<Finding>,
    last_verification: Option<VerificationResult>,
    attempts: Vec<AuditAttempt>,
}

impl ClauseRun {
    fn new() -> Self {
        Self {
            state: AuditState::Init,
            evaluations: 0,
            last_finding: None,
            last_verification: None,
            attempts: Vec::new(),
        }
    }

    fn advance(&mut self, event: AuditEvent) -> Result<AuditState, TransitionError> {
        self.state = self.state.transition(event)?;
        Ok(self.state)
    }

    fn finish(mut self, clause_id: &str, terminal_reason: TerminalReason, detail: &str) -> AuditOutcome {
        let final_finding = self
            .last_finding
            .take()
            .unwrap_or_else(|| Finding::error(clause_id, detail));
        AuditOutcome {
            clause_id: clause_id.to_string(),
            final_finding,
            attempts_used: self.evaluations,
            terminal_reason,
            final_verification: self.last_verification,
            attempts: self.attempts,
        }
    }
}

/// Runs the bounded critic-reflector loop for clauses.
#[derive(Clone)]
pub struct ClauseAuditOrchestrator {
    critic: CriticEvaluator,
    reflector: ReflectorVerifier,
    policy: RetryPolicy,
    context: String,
    clause_timeout: Option<Duration>,
}

impl ClauseAuditOrchestrator {
    pub fn new(critic: CriticEvaluator, reflector: ReflectorVerifier) -> Self {
        Self {
            critic,
            reflector,
            policy: RetryPolicy::default(),
            context: DEFAULT_CONTEXT.to_string(),
            clause_timeout: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Legal context passed to every critic call.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Wall-clock budget per clause; `None` means unbounded.
    pub fn with_clause_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.clause_timeout = timeout;
        self
    }

    /// Audit one clause to a terminal outcome.
    pub async fn run(&self, clause: &ClauseRecord, namespace: &str) -> AuditOutcome {
        self.run_with_cancel(clause, namespace, &CancellationToken::new())
            .await
    }

    /// Audit one clause, stopping early if `cancel` fires or the clause
    /// deadline passes. An early stop yields `TerminalReason::Cancelled`.
    pub async fn run_with_cancel(
        &self,
        clause: &ClauseRecord,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> AuditOutcome {
        let deadline = self.clause_timeout.map(|t| Instant::now() + t);
        let mut run = ClauseRun::new();

        match self.drive(clause, namespace, cancel, deadline, &mut run).await {
            Ok(reason) => {
                tracing::info!(
                    clause_id = %clause.clause_id,
                    terminal_reason = %reason,
                    attempts_used = run.evaluations,
                    "clause audit finished"
                );
                run.finish(&clause.clause_id, reason, "no finding produced")
            }
            Err(Halt::Interrupted(interrupt)) => {
                if let Ok(state) = run.state.transition(AuditEvent::Cancel) {
                    run.state = state;
                }
                tracing::warn!(
                    clause_id = %clause.clause_id,
                    attempts_used = run.evaluations,
                    "{}",
                    interrupt.describe()
                );
                run.finish(&clause.clause_id, TerminalReason::Cancelled, interrupt.describe())
            }
            Err(Halt::Invalid(e)) => {
                tracing::error!(clause_id = %clause.clause_id, error = %e, "audit state machine fault");
                let detail = e.to_string();
                let mut outcome = run.finish(&clause.clause_id, TerminalReason::EscalatedMaxRetries, &detail);
                outcome.final_finding = Finding::error(&clause.clause_id, detail);
                outcome
            }
        }
    }

    async fn drive(
        &self,
        clause: &ClauseRecord,
        namespace: &str,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        run: &mut ClauseRun,
    ) -> Result<TerminalReason, Halt> {
        run.advance(AuditEvent::Start)?;

        loop {
            // CRITIC_EVAL / RETRY_CRITIC_EVAL
            let finding = guarded(self.critic.evaluate(clause, &self.context), cancel, deadline)
                .await
                .map_err(Halt::Interrupted)?;
            run.evaluations += 1;
            run.last_finding = Some(finding.clone());
            run.last_verification = None;
            run.advance(AuditEvent::Evaluated)?;

            // REFLECTOR_VERIFY
            let verification = guarded(self.reflector.verify(&finding, namespace), cancel, deadline)
                .await
                .map_err(Halt::Interrupted)?;
            let decision = self.policy.decide(&verification, run.evaluations);

            tracing::info!(
                target: ATTEMPT_TARGET,
                clause_id = %clause.clause_id,
                namespace,
                attempt = run.evaluations,
                status = %finding.status,
                verified = verification.verified,
                score = ?verification.similarity_score,
                reason = %verification.reason,
                decision = %decision,
                "audit attempt"
            );

            run.last_verification = Some(verification.clone());
            run.attempts.push(AuditAttempt {
                attempt_number: run.evaluations,
                finding,
                verification,
                decision,
            });

            match run.advance(AuditEvent::Decided(decision))? {
                AuditState::Accepted if self.reflector.is_disabled() => {
                    return Ok(TerminalReason::VerificationDisabled);
                }
                AuditState::Accepted => return Ok(TerminalReason::Accepted),
                AuditState::Escalated => return Ok(TerminalReason::EscalatedMaxRetries),
                AuditState::RetryCriticEval => {
                    tracing::debug!(
                        clause_id = %clause.clause_id,
                        attempt = run.evaluations,
                        max_attempts = self.policy.max_attempts(),
                        "finding unverified; retrying critic"
                    );
                }
                other => {
                    return Err(Halt::Invalid(TransitionError {
                        from: other,
                        event: AuditEvent::Decided(decision),
                    }));
                }
            }
        }
    }
}

/// Await `fut` unless cancellation or the deadline comes first.
async fn guarded<F: Future>(
    fut: F,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<F::Output, Interrupt> {
    let expiry = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        _ = expiry => Err(Interrupt::DeadlineExceeded),
        out = fut => Ok(out),
    }
}
