//! Contract audit: `clause-audit audit`.

use anyhow::{Context, Result};
use clause_audit::audit::{AuditLogger, RunConfig, RunSummary};
use clause_audit::batch::BatchDriver;
use clause_audit::clause;
use clause_audit::config::{AuditToml, CONFIG_DIR};
use clause_audit::critic::CriticEvaluator;
use clause_audit::critic::backend::build_backend;
use clause_audit::orchestrator::ClauseAuditOrchestrator;
use clause_audit::policy::RetryPolicy;
use clause_audit::reflector::ReflectorVerifier;
use clause_audit::reflector::index::{LocalIndex, SemanticIndex};
use clause_audit::report::ComplianceReport;
use clause_audit::report::redline::Redliner;
use clause_audit::report::summary::Summarizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::super::AuditArgs;
use super::load_config;

pub async fn cmd_audit(project_dir: &Path, explicit_config: Option<&Path>, args: &AuditArgs) -> Result<()> {
    let mut config = load_config(project_dir, explicit_config)?;
    apply_cli_overrides(&mut config, args);
    config.validate()?;

    let records = clause::load_clauses(&args.input)?;
    let namespace = args
        .namespace
        .clone()
        .unwrap_or_else(|| clause::default_namespace(&args.input));
    let contract_name = contract_name(&args.input);

    println!("--- Auditing {} (namespace {}) ---", contract_name, namespace);

    let index_source = args.index_source.as_deref().unwrap_or(&args.input);
    let index = LocalIndex::from_file(index_source, &namespace).map(|i| Arc::new(i) as Arc<dyn SemanticIndex>);
    let reflector = ReflectorVerifier::from_config(&config.index, index);
    if let Some(reason) = reflector.disabled_reason() {
        println!("Verification disabled: {}", reason);
    }

    let backend = build_backend(&config.reasoning).context("Failed to set up reasoning backend")?;
    let critic = CriticEvaluator::new(backend.clone()).with_temperature(config.reasoning.temperature);

    let orchestrator = ClauseAuditOrchestrator::new(critic, reflector.clone())
        .with_policy(RetryPolicy::new(config.audit.max_attempts))
        .with_context(config.audit.default_context.clone())
        .with_clause_timeout(config.audit.clause_timeout());

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling remaining clauses");
            ctrl_c.cancel();
        }
    });

    let driver = BatchDriver::new(orchestrator)
        .with_concurrency(config.audit.concurrency)
        .with_cancellation(cancel.clone());

    let clauses = clause::auditable(records);
    println!("Identified {} clause(s) to audit.", clauses.len());

    let mut logger = AuditLogger::new(&project_dir.join(CONFIG_DIR));
    logger.start_run(RunConfig {
        input: args.input.clone(),
        namespace: namespace.clone(),
        max_attempts: config.audit.max_attempts,
        similarity_threshold: config.index.similarity_threshold,
        concurrency: config.audit.concurrency,
        backend: backend.name().to_string(),
        verification_disabled: reflector.disabled_reason().map(str::to_string),
    })?;

    let outcomes = driver.run(clauses, &namespace).await;

    logger.add_outcomes(&outcomes)?;
    let run_file = logger.finish_run()?;

    let stages = ReportStages::select(args, &config, cancel.is_cancelled());
    if cancel.is_cancelled() {
        println!("Run cancelled; skipping suggested rewrites and summaries.");
    }

    let redlines = if stages.redline {
        println!("Generating suggested rewrites...");
        Redliner::new(backend.clone()).suggest_all(&outcomes).await
    } else {
        Vec::new()
    };

    let mut report = ComplianceReport::new(&contract_name, &outcomes)
        .with_redlines(redlines)
        .with_verification_disabled(reflector.disabled_reason().map(str::to_string));
    if stages.summary {
        println!("Writing executive summaries...");
        let narrative = Summarizer::new(backend)
            .summarize(&contract_name, report.risk(), &outcomes)
            .await;
        report = report.with_narrative(Some(narrative));
    }
    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| default_report_path(project_dir, &contract_name));
    std::fs::write(&report_path, report.render())
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;

    print_summary(&RunSummary::from_outcomes(&outcomes), report.risk().risk_score);
    println!("Run log: {}", run_file.display());
    println!("Report saved to: {}", report_path.display());
    Ok(())
}

fn apply_cli_overrides(config: &mut AuditToml, args: &AuditArgs) {
    if let Some(n) = args.max_attempts {
        config.audit.max_attempts = n;
    }
    if let Some(t) = args.threshold {
        config.index.similarity_threshold = t;
    }
    if let Some(c) = args.concurrency {
        config.audit.concurrency = c;
    }
    if let Some(ctx) = &args.context {
        config.audit.default_context = ctx.clone();
    }
    if args.no_index {
        config.index.enabled = false;
    }
}

/// Report stages that call the reasoning service after the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReportStages {
    redline: bool,
    summary: bool,
}

impl ReportStages {
    /// Nothing runs once the batch was cancelled.
    fn select(args: &AuditArgs, config: &AuditToml, cancelled: bool) -> Self {
        if cancelled {
            return Self {
                redline: false,
                summary: false,
            };
        }
        Self {
            redline: args.redline || config.report.redline,
            summary: config.report.summary && !args.no_summary,
        }
    }
}

fn contract_name(input: &Path) -> String {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("contract")
        .to_string()
}

fn default_report_path(project_dir: &Path, contract_name: &str) -> PathBuf {
    project_dir.join(format!("audit_report_{}.md", contract_name))
}

fn print_summary(summary: &RunSummary, risk_score: u32) {
    println!();
    println!("Audit complete: {} clause(s)", summary.total);
    println!("  accepted:              {}", summary.accepted);
    println!("  escalated (unverified): {}", summary.escalated);
    if summary.cancelled > 0 {
        println!("  cancelled:             {}", summary.cancelled);
    }
    if summary.verification_disabled > 0 {
        println!("  verification disabled: {}", summary.verification_disabled);
    }
    println!("  risk score:            {}/100", risk_score);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_default_report_path_uses_stem() {
        let path = default_report_path(Path::new("/work"), &contract_name(Path::new("docs/Employment.md")));
        assert_eq!(path, PathBuf::from("/work/audit_report_Employment.md"));
    }

    fn audit_args(extra: &[&str]) -> AuditArgs {
        let argv = ["clause-audit", "audit", "contract.md"].into_iter().chain(extra.iter().copied());
        match Cli::parse_from(argv).command {
            Commands::Audit(args) => args,
            _ => unreachable!("audit subcommand"),
        }
    }

    #[test]
    fn test_summary_on_by_default_redline_off() {
        let stages = ReportStages::select(&audit_args(&[]), &AuditToml::default(), false);
        assert_eq!(
            stages,
            ReportStages {
                redline: false,
                summary: true
            }
        );
    }

    #[test]
    fn test_flags_and_config_select_stages() {
        let stages = ReportStages::select(&audit_args(&["--redline", "--no-summary"]), &AuditToml::default(), false);
        assert!(stages.redline);
        assert!(!stages.summary);

        let mut config = AuditToml::default();
        config.report.redline = true;
        config.report.summary = false;
        let stages = ReportStages::select(&audit_args(&[]), &config, false);
        assert!(stages.redline);
        assert!(!stages.summary);
    }

    #[test]
    fn test_cancelled_run_skips_reasoning_stages() {
        let mut config = AuditToml::default();
        config.report.redline = true;
        let stages = ReportStages::select(&audit_args(&["--redline"]), &config, true);
        assert!(!stages.redline);
        assert!(!stages.summary);
    }
}
