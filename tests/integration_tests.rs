//! Integration tests for the clause-audit CLI.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CONTRACT: &str = "\
# Employment Agreement
This agreement is made between the parties named below.

## Leave
1.1 The Employee is entitled to 30 days of annual leave.

## Termination
Either party may end this agreement as set out below.
8.1 Notice period shall be 1 week.
";

/// Helper to create a clause-audit Command
fn clause_audit() -> Command {
    cargo_bin_cmd!("clause-audit")
}

fn write_contract(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("contract.md");
    fs::write(&path, CONTRACT).unwrap();
    path
}

fn write_config(dir: &TempDir, content: &str) {
    let config_dir = dir.path().join(".clause-audit");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("audit.toml"), content).unwrap();
}

/// Stand-in reasoning command that ignores its prompt and always cites `quote`.
#[cfg(unix)]
fn write_stub_reasoner(dir: &Path, quote: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let reply = format!(
        r#"{{"status": "VIOLATION", "law_reference": "UAE Labour Law Art. 43", "reasoning": "Notice below the statutory minimum", "source_verification": "{}"}}"#,
        quote
    );
    let script = format!("#!/bin/sh\ncat > /dev/null\ncat <<'EOF'\n{}\nEOF\n", reply);
    let path = dir.join("reasoner.sh");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        clause_audit()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("audit"))
            .stdout(predicate::str::contains("clauses"));
    }

    #[test]
    fn test_version() {
        clause_audit().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_command_fails() {
        clause_audit().arg("frobnicate").assert().failure();
    }

    #[test]
    fn test_audit_requires_input() {
        clause_audit().arg("audit").assert().failure();
    }
}

// =============================================================================
// Clause Listing
// =============================================================================

mod clauses {
    use super::*;

    #[test]
    fn test_lists_auditable_clauses() {
        let dir = TempDir::new().unwrap();
        let contract = write_contract(&dir);

        clause_audit()
            .arg("clauses")
            .arg(&contract)
            .assert()
            .success()
            .stdout(predicate::str::contains("3 clause(s) to audit (4 record(s) parsed)"))
            .stdout(predicate::str::contains("1.1"))
            .stdout(predicate::str::contains("8.1"));
    }

    #[test]
    fn test_json_output_includes_general_with_all() {
        let dir = TempDir::new().unwrap();
        let contract = write_contract(&dir);

        let output = clause_audit()
            .args(["clauses", "--json", "--all"])
            .arg(&contract)
            .output()
            .unwrap();
        assert!(output.status.success());

        let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let ids: Vec<&str> = records
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["clause_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["General", "1.1", "1.1", "8.1"]);
    }

    #[test]
    fn test_missing_file_fails() {
        clause_audit()
            .args(["clauses", "/nonexistent/contract.md"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read clause input"));
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config_commands {
    use super::*;

    #[test]
    fn test_show_defaults() {
        let dir = TempDir::new().unwrap();
        clause_audit()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("using defaults"))
            .stdout(predicate::str::contains("max_attempts = 3"))
            .stdout(predicate::str::contains("similarity_threshold = 0.85"));
    }

    #[test]
    fn test_show_reads_project_file() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[audit]\nmax_attempts = 5\n");
        clause_audit()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("max_attempts = 5"));
    }

    #[test]
    fn test_validate_defaults() {
        let dir = TempDir::new().unwrap();
        clause_audit()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults (valid)"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[audit]\nmax_attempts = 0\n");
        clause_audit()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "validate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("audit.max_attempts"));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        clause_audit()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("--config")
            .arg(dir.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read config file"));
    }
}

// =============================================================================
// End-to-end Audit (stub reasoning command)
// =============================================================================

#[cfg(unix)]
mod audit_runs {
    use super::*;

    fn audit(dir: &TempDir, reasoner: &Path) -> Command {
        let mut cmd = clause_audit();
        cmd.current_dir(dir.path())
            .env("CLAUSE_AUDIT_CMD", reasoner)
            .env_remove("CLAUSE_AUDIT_MAX_ATTEMPTS")
            .env_remove("CLAUSE_AUDIT_THRESHOLD")
            .arg("--project-dir")
            .arg(dir.path())
            .arg("audit");
        cmd
    }

    fn report(dir: &TempDir) -> String {
        fs::read_to_string(dir.path().join("audit_report_contract.md")).unwrap()
    }

    #[test]
    fn test_verbatim_quotes_are_accepted() {
        let dir = TempDir::new().unwrap();
        let contract = write_contract(&dir);
        let reasoner = write_stub_reasoner(dir.path(), "Notice period shall be 1 week.");

        audit(&dir, &reasoner)
            .arg(&contract)
            .assert()
            .success()
            .stdout(predicate::str::contains("Audit complete: 3 clause(s)"))
            .stdout(predicate::str::is_match(r"accepted:\s+3").unwrap());

        let report = report(&dir);
        assert!(report.contains("# Compliance Report: contract"));
        assert!(report.contains("verified after 1 attempt(s)"));
        assert!(!report.contains("## Unverified Findings"));

        let runs: Vec<_> = fs::read_dir(dir.path().join(".clause-audit/runs"))
            .unwrap()
            .collect();
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn test_fabricated_quotes_escalate() {
        let dir = TempDir::new().unwrap();
        let contract = write_contract(&dir);
        let reasoner = write_stub_reasoner(dir.path(), "The employer may dismiss staff at will.");

        audit(&dir, &reasoner)
            .args(["--max-attempts", "2"])
            .arg(&contract)
            .assert()
            .success()
            .stdout(predicate::str::contains("escalated (unverified): 3"));

        let report = report(&dir);
        assert!(report.contains("## Unverified Findings"));
        assert!(report.contains("UNVERIFIED after 2 attempt(s)"));

        let run_file = fs::read_dir(dir.path().join(".clause-audit/runs"))
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let run: serde_json::Value = serde_json::from_str(&fs::read_to_string(run_file).unwrap()).unwrap();
        assert_eq!(run["outcomes"][0]["terminal_reason"], "ESCALATED_MAX_RETRIES");
        assert_eq!(run["outcomes"][0]["attempts_used"], 2);
    }

    #[test]
    fn test_no_index_marks_run_disabled() {
        let dir = TempDir::new().unwrap();
        let contract = write_contract(&dir);
        let reasoner = write_stub_reasoner(dir.path(), "anything at all");
        let report_path = dir.path().join("out.md");

        audit(&dir, &reasoner)
            .arg("--no-index")
            .arg("--report")
            .arg(&report_path)
            .arg(&contract)
            .assert()
            .success()
            .stdout(predicate::str::contains("Verification disabled"))
            .stdout(predicate::str::contains("verification disabled: 3"));

        let report = fs::read_to_string(report_path).unwrap();
        assert!(report.contains("**Verification disabled**"));
        assert!(!report.contains("verified after"));
    }

    #[test]
    fn test_failing_reasoner_escalates_with_error_findings() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let contract = write_contract(&dir);
        let reasoner = dir.path().join("broken.sh");
        fs::write(&reasoner, "#!/bin/sh\ncat > /dev/null\nexit 3\n").unwrap();
        fs::set_permissions(&reasoner, fs::Permissions::from_mode(0o755)).unwrap();

        audit(&dir, &reasoner)
            .args(["--max-attempts", "1"])
            .arg(&contract)
            .assert()
            .success()
            .stdout(predicate::str::contains("escalated (unverified): 3"));

        let report = report(&dir);
        assert!(report.contains("**Status**: ERROR"));
        assert!(report.contains("exited with code 3"));
    }

    #[test]
    fn test_stalled_reasoner_times_out_into_error_findings() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let contract = write_contract(&dir);
        write_config(&dir, "[reasoning]\ntimeout_secs = 1\n");
        let reasoner = dir.path().join("stalled.sh");
        fs::write(&reasoner, "#!/bin/sh\ncat > /dev/null\nexec sleep 30\n").unwrap();
        fs::set_permissions(&reasoner, fs::Permissions::from_mode(0o755)).unwrap();

        audit(&dir, &reasoner)
            .args(["--max-attempts", "1"])
            .arg(&contract)
            .timeout(std::time::Duration::from_secs(20))
            .assert()
            .success()
            .stdout(predicate::str::contains("escalated (unverified): 3"));

        let report = report(&dir);
        assert!(report.contains("**Status**: ERROR"));
        assert!(report.contains("timed out after 1s"));
    }

    #[test]
    fn test_report_carries_bilingual_summaries() {
        let dir = TempDir::new().unwrap();
        let contract = write_contract(&dir);
        let reasoner = write_stub_reasoner(dir.path(), "Notice period shall be 1 week.");

        audit(&dir, &reasoner)
            .arg(&contract)
            .assert()
            .success()
            .stdout(predicate::str::contains("Writing executive summaries..."));

        let report = report(&dir);
        let english = report.find("## English Audit Summary").unwrap();
        let arabic = report.find("## Arabic Audit Summary (ملخص التدقيق)").unwrap();
        let detailed = report.find("## Detailed Findings").unwrap();
        assert!(english < arabic && arabic < detailed);
    }

    #[test]
    fn test_no_summary_flag_omits_narrative() {
        let dir = TempDir::new().unwrap();
        let contract = write_contract(&dir);
        let reasoner = write_stub_reasoner(dir.path(), "Notice period shall be 1 week.");

        audit(&dir, &reasoner)
            .arg("--no-summary")
            .arg(&contract)
            .assert()
            .success()
            .stdout(predicate::str::contains("Writing executive summaries...").not());

        assert!(!report(&dir).contains("Audit Summary"));
    }

    #[test]
    fn test_runs_list_and_show_after_audit() {
        let dir = TempDir::new().unwrap();
        let contract = write_contract(&dir);
        let reasoner = write_stub_reasoner(dir.path(), "Notice period shall be 1 week.");

        audit(&dir, &reasoner)
            .arg("--no-summary")
            .arg(&contract)
            .assert()
            .success();

        clause_audit()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["runs", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 audit run(s)"))
            .stdout(predicate::str::contains("3 clause(s), 3 accepted, 0 unverified"));

        clause_audit()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["runs", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Namespace:   contract_contract"))
            .stdout(predicate::str::contains("ACCEPTED"));

        let output = clause_audit()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["runs", "show", "latest", "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let run: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(run["outcomes"].as_array().unwrap().len(), 3);
    }
}

// =============================================================================
// Saved Runs
// =============================================================================

mod runs {
    use super::*;

    #[test]
    fn test_list_without_runs() {
        let dir = TempDir::new().unwrap();
        clause_audit()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("runs")
            .assert()
            .success()
            .stdout(predicate::str::contains("No audit runs in"));
    }

    #[test]
    fn test_show_unknown_run_fails() {
        let dir = TempDir::new().unwrap();
        clause_audit()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["runs", "show", "2020-01-01T00-00-00_deadbeef"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No audit run '2020-01-01T00-00-00_deadbeef'"));
    }
}
