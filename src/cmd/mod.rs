//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `audit`   | `Audit`          |
//! | `clauses` | `Clauses`        |
//! | `config`  | `Config`         |
//! | `runs`    | `Runs`           |

pub mod audit;
pub mod clauses;
pub mod config;
pub mod runs;

pub use audit::cmd_audit;
pub use clauses::cmd_clauses;
pub use config::cmd_config;
pub use runs::cmd_runs;

use anyhow::{Context, Result};
use clause_audit::config::{AuditToml, default_config_path};
use std::path::{Path, PathBuf};

/// Resolve which config file applies: an explicit `--config`, else the
/// project default.
pub fn config_path(project_dir: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_config_path(project_dir))
}

/// Load file + environment configuration. A missing default file means
/// defaults; a missing explicit `--config` file is an error.
pub fn load_config(project_dir: &Path, explicit: Option<&Path>) -> Result<AuditToml> {
    let mut config = match explicit {
        Some(path) => AuditToml::load(path)?,
        None => AuditToml::load_or_default(project_dir)?,
    };
    config
        .apply_env()
        .context("Invalid CLAUSE_AUDIT_* environment override")?;
    Ok(config)
}
