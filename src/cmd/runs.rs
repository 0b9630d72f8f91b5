//! Saved audit runs: `clause-audit runs`.

use anyhow::{Context, Result, bail};
use clause_audit::audit::{AuditLogger, AuditRun};
use clause_audit::config::{CONFIG_DIR, runs_dir};
use std::path::{Path, PathBuf};

use super::super::RunsCommands;

pub fn cmd_runs(project_dir: &Path, command: Option<RunsCommands>) -> Result<()> {
    let logger = AuditLogger::new(&project_dir.join(CONFIG_DIR));

    match command {
        None | Some(RunsCommands::List) => {
            let runs = logger.list_runs()?;
            if runs.is_empty() {
                println!("No audit runs in {}", runs_dir(project_dir).display());
                return Ok(());
            }
            println!("{} audit run(s), most recent first:", runs.len());
            println!();
            for path in &runs {
                let name = file_name(path);
                match logger.load_run(path) {
                    Ok(run) => println!("  {}  {}", name, describe_run(&run)),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "unreadable run file");
                        println!("  {}  (unreadable)", name);
                    }
                }
            }
        }
        Some(RunsCommands::Show { run, json }) => {
            let path = resolve_run(project_dir, &logger, &run)?;
            let run = logger
                .load_run(&path)
                .with_context(|| format!("Failed to load run {}", path.display()))?;
            if json {
                let out = serde_json::to_string_pretty(&run).context("Failed to serialize audit run")?;
                println!("{}", out);
            } else {
                print_run(&path, &run);
            }
        }
    }
    Ok(())
}

/// A run argument is `latest`, a file in the runs directory, or a path.
fn resolve_run(project_dir: &Path, logger: &AuditLogger, run: &str) -> Result<PathBuf> {
    if run == "latest" {
        return match logger.list_runs()?.into_iter().next() {
            Some(path) => Ok(path),
            None => bail!("No audit runs in {}", runs_dir(project_dir).display()),
        };
    }

    let direct = PathBuf::from(run);
    if direct.is_file() {
        return Ok(direct);
    }
    let dir = runs_dir(project_dir);
    for candidate in [dir.join(run), dir.join(format!("{}.json", run))] {
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!("No audit run '{}' in {}", run, dir.display())
}

fn describe_run(run: &AuditRun) -> String {
    let summary = run.summary();
    let state = if run.ended_at.is_some() { "" } else { " (unfinished)" };
    format!(
        "{}  {} clause(s), {} accepted, {} unverified{}",
        run.config.input.display(),
        summary.total,
        summary.accepted,
        summary.unverified(),
        state
    )
}

fn print_run(path: &Path, run: &AuditRun) {
    let summary = run.summary();
    println!();
    println!("Audit run {}", run.run_id);
    println!("===========================================");
    println!("File:        {}", path.display());
    println!("Started:     {}", run.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    match run.ended_at {
        Some(ended) => println!("Ended:       {}", ended.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Ended:       (unfinished)"),
    }
    println!("Input:       {}", run.config.input.display());
    println!("Namespace:   {}", run.config.namespace);
    println!("Backend:     {}", run.config.backend);
    println!(
        "Settings:    max_attempts={} threshold={} concurrency={}",
        run.config.max_attempts, run.config.similarity_threshold, run.config.concurrency
    );
    if let Some(reason) = &run.config.verification_disabled {
        println!("Verification disabled: {}", reason);
    }
    println!();
    println!(
        "Outcomes: {} total, {} accepted, {} escalated, {} cancelled, {} unchecked",
        summary.total, summary.accepted, summary.escalated, summary.cancelled, summary.verification_disabled
    );
    println!();
    for outcome in &run.outcomes {
        println!(
            "  {:<12} {:<22} {:<10} attempts={}",
            outcome.clause_id,
            outcome.terminal_reason.to_string(),
            outcome.final_finding.status.to_string(),
            outcome.attempts_used
        );
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
