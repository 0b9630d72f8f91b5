use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clause_audit::logging::{self, LogFormat};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "clause-audit")]
#[command(version, about = "Contract clause compliance auditor with verified citations")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Config file. Defaults to .clause-audit/audit.toml in the project directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Audit every clause of a contract and write a compliance report
    Audit(AuditArgs),
    /// Print the clause records parsed from a contract
    Clauses {
        /// Contract file (.json clause records, or markdown / plain text)
        input: PathBuf,
        /// Include ungrouped `General` text
        #[arg(long)]
        all: bool,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// List or inspect saved audit runs
    Runs {
        #[command(subcommand)]
        command: Option<RunsCommands>,
    },
}

#[derive(Args, Clone, Debug)]
pub struct AuditArgs {
    /// Contract file (.json clause records, or markdown / plain text)
    pub input: PathBuf,

    /// Index namespace. Defaults to contract_<file stem>
    #[arg(long)]
    pub namespace: Option<String>,

    /// Critic evaluations allowed per clause
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Minimum similarity for a quote to count as verified (inclusive)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Clauses audited concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Legal context passed to the critic
    #[arg(long)]
    pub context: Option<String>,

    /// Run with verification disabled (findings are recorded as unchecked)
    #[arg(long)]
    pub no_index: bool,

    /// Document indexed for quote verification. Defaults to the input contract
    #[arg(long)]
    pub index_source: Option<PathBuf>,

    /// Report path. Defaults to audit_report_<file stem>.md in the project directory
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Generate suggested rewrites for violations
    #[arg(long)]
    pub redline: bool,

    /// Skip the English and Arabic narrative summaries
    #[arg(long)]
    pub no_summary: bool,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration
    Validate,
}

#[derive(Subcommand, Clone)]
pub enum RunsCommands {
    /// List saved runs, most recent first
    List,
    /// Show one run
    Show {
        /// Run file name, path, or `latest`
        #[arg(default_value = "latest")]
        run: String,
        /// Print the run record as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.log_format, cli.log_file.as_deref())?;

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Audit(args) => {
            cmd::cmd_audit(&project_dir, cli.config.as_deref(), args).await?;
        }
        Commands::Clauses { input, all, json } => cmd::cmd_clauses(input, *all, *json)?,
        Commands::Config { command } => {
            cmd::cmd_config(&project_dir, cli.config.as_deref(), command.clone())?
        }
        Commands::Runs { command } => cmd::cmd_runs(&project_dir, command.clone())?,
    }

    Ok(())
}
