use super::{AuditRun, RunConfig};
use crate::orchestrator::AuditOutcome;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes audit runs as JSON under `<audit_dir>/runs/`.
///
/// While a run is active its state is mirrored to `<audit_dir>/current-run.json`
/// so an interrupted run can be inspected.
pub struct AuditLogger {
    audit_dir: PathBuf,
    current_run: Option<AuditRun>,
    current_run_file: PathBuf,
}

impl AuditLogger {
    pub fn new(audit_dir: &Path) -> Self {
        let current_run_file = audit_dir.join("current-run.json");
        Self {
            audit_dir: audit_dir.to_path_buf(),
            current_run: None,
            current_run_file,
        }
    }

    fn runs_dir(&self) -> PathBuf {
        self.audit_dir.join("runs")
    }

    pub fn start_run(&mut self, config: RunConfig) -> Result<()> {
        fs::create_dir_all(&self.audit_dir)
            .with_context(|| format!("Failed to create {}", self.audit_dir.display()))?;
        self.current_run = Some(AuditRun::new(config));
        self.save_current()
    }

    /// Append clause outcomes to the active run.
    pub fn add_outcomes(&mut self, outcomes: &[AuditOutcome]) -> Result<()> {
        let run = self
            .current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("add_outcomes called with no active run"))?;
        run.outcomes.extend_from_slice(outcomes);
        self.save_current()
    }

    pub fn finish_run(&mut self) -> Result<PathBuf> {
        let mut run = self
            .current_run
            .take()
            .ok_or_else(|| anyhow::anyhow!("No current run to finish"))?;
        run.finish();

        let runs_dir = self.runs_dir();
        fs::create_dir_all(&runs_dir).context("Failed to create runs directory")?;

        let filename = format!(
            "{}_{}.json",
            run.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &run.run_id.to_string()[..8]
        );
        let run_file = runs_dir.join(&filename);

        let json = serde_json::to_string_pretty(&run).context("Failed to serialize audit run")?;
        fs::write(&run_file, json).context("Failed to write audit run file")?;

        if self.current_run_file.exists() {
            fs::remove_file(&self.current_run_file)
                .context("Failed to remove current-run.json after finishing run")?;
        }

        tracing::info!(path = %run_file.display(), run_id = %run.run_id, "audit run saved");
        Ok(run_file)
    }

    fn save_current(&self) -> Result<()> {
        if let Some(ref run) = self.current_run {
            let json = serde_json::to_string_pretty(run).context("Failed to serialize current run")?;
            fs::write(&self.current_run_file, json).context("Failed to write current run file")?;
        }
        Ok(())
    }

    /// Saved run files, most recent first.
    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        let runs_dir = self.runs_dir();
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs: Vec<PathBuf> = fs::read_dir(&runs_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();

        runs.sort();
        runs.reverse();
        Ok(runs)
    }

    pub fn load_run(&self, path: &Path) -> Result<AuditRun> {
        let content = fs::read_to_string(path).context("Failed to read audit run file")?;
        serde_json::from_str(&content).context("Failed to parse audit run file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Finding, FindingStatus};
    use crate::orchestrator::TerminalReason;
    use tempfile::TempDir;

    fn run_config() -> RunConfig {
        RunConfig {
            input: PathBuf::from("contract.md"),
            namespace: "contract_contract".into(),
            max_attempts: 3,
            similarity_threshold: 0.85,
            concurrency: 1,
            backend: "claude-cli".into(),
            verification_disabled: None,
        }
    }

    fn escalated() -> AuditOutcome {
        AuditOutcome {
            clause_id: "8.1".into(),
            final_finding: Finding::new("8.1", FindingStatus::Violation).with_quote("made up"),
            attempts_used: 3,
            terminal_reason: TerminalReason::EscalatedMaxRetries,
            final_verification: None,
            attempts: Vec::new(),
        }
    }

    #[test]
    fn test_add_outcomes_without_active_run_returns_err() {
        let dir = TempDir::new().unwrap();
        let mut logger = AuditLogger::new(dir.path());
        assert!(logger.add_outcomes(&[escalated()]).is_err());
        assert!(logger.finish_run().is_err());
    }

    #[test]
    fn test_run_file_is_written_and_reloadable() {
        let dir = TempDir::new().unwrap();
        let audit_dir = dir.path().join(".clause-audit");
        let mut logger = AuditLogger::new(&audit_dir);

        logger.start_run(run_config()).unwrap();
        assert!(audit_dir.join("current-run.json").exists());

        logger.add_outcomes(&[escalated()]).unwrap();
        let path = logger.finish_run().unwrap();

        assert!(!audit_dir.join("current-run.json").exists());
        assert!(path.starts_with(audit_dir.join("runs")));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["run_id"].as_str().unwrap().len(), 36);
        assert!(!value["ended_at"].is_null());
        assert_eq!(value["outcomes"][0]["terminal_reason"], "ESCALATED_MAX_RETRIES");
        assert!(value["config"].get("verification_disabled").is_none());

        let run = logger.load_run(&path).unwrap();
        assert_eq!(run.summary().escalated, 1);
        assert_eq!(logger.list_runs().unwrap(), vec![path]);
    }

    #[test]
    fn test_list_runs_empty_when_no_runs_dir() {
        let dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(dir.path());
        assert!(logger.list_runs().unwrap().is_empty());
    }

    #[test]
    fn test_disabled_reason_is_recorded() {
        let dir = TempDir::new().unwrap();
        let mut logger = AuditLogger::new(dir.path());
        let mut config = run_config();
        config.verification_disabled = Some("semantic index disabled by configuration".into());
        logger.start_run(config).unwrap();
        let path = logger.finish_run().unwrap();

        let run = logger.load_run(&path).unwrap();
        assert_eq!(
            run.config.verification_disabled.as_deref(),
            Some("semantic index disabled by configuration")
        );
    }
}
