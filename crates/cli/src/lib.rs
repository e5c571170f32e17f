//! CLI for loadscope.
//!
//! `loadscope` with no subcommand behaves like `loadscope run`: it audits the
//! service at `BASE_URL` (default `http://localhost:3000`) and prints the
//! report to stdout. Logs go to stderr.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use loadscope_benchmarks::io::{write_report_json, write_report_markdown};
use loadscope_benchmarks::markdown::render_report;
use loadscope_benchmarks::{run_audit, AuditConfig, BenchmarkProfile, ProfileName};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// loadscope CLI.
#[derive(Parser, Debug)]
#[command(name = "loadscope")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Subcommand to run; defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments for the implicit `run`.
    #[command(flatten)]
    pub run: RunArgs,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audit the target service and print the report.
    Run(RunArgs),

    /// Print the parameters of every built-in profile.
    Profiles,
}

/// Stdout rendering of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Markdown text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Options of the `run` command.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Base URL of the service under audit.
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Profile preset: exhaustive or gentle.
    #[arg(short, long)]
    pub profile: Option<ProfileName>,

    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also write the full report as JSON to this path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the markdown report to this path.
    #[arg(long)]
    pub markdown_output: Option<PathBuf>,

    /// Report format on stdout.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl RunArgs {
    /// Load layered configuration and apply the command-line overrides.
    pub fn resolve_config(&self) -> anyhow::Result<AuditConfig> {
        let mut config =
            AuditConfig::load(self.config.as_deref()).context("Failed to load configuration")?;
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(profile) = self.profile {
            config.profile = profile;
        }
        Ok(config)
    }
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(verbose: bool, format: LogFormat) {
    let default = if verbose {
        "loadscope_cli=debug,loadscope_benchmarks=debug,loadscope_core=debug,warn"
    } else {
        "loadscope_cli=info,loadscope_benchmarks=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    if installed.is_err() {
        eprintln!("Warning: a log subscriber was already installed");
    }
}

/// Run the CLI with parsed arguments.
///
/// # Returns
///
/// Returns `Ok(())` for every completed audit, whatever it found, or an
/// error if configuration is invalid or the target is unreachable.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Run(args)) => execute_run(args).await,
        Some(Commands::Profiles) => print_profiles(),
        None => execute_run(cli.run).await,
    }
}

async fn execute_run(args: RunArgs) -> anyhow::Result<()> {
    init_tracing(args.verbose, args.log_format);
    let config = args.resolve_config()?;

    let report = run_audit(&config)
        .await
        .with_context(|| format!("Audit of {} failed", config.base_url))?;

    match args.format {
        OutputFormat::Text => print!("{}", render_report(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if let Some(path) = &args.output {
        write_report_json(&report, path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "JSON report saved");
    }
    if let Some(path) = &args.markdown_output {
        write_report_markdown(&report, path)
            .with_context(|| format!("Failed to write markdown report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Markdown report saved");
    }
    Ok(())
}

fn print_profiles() -> anyhow::Result<()> {
    for name in ProfileName::ALL {
        println!("[{name}]");
        print!("{}", BenchmarkProfile::preset(name).to_toml()?);
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["loadscope", "--profile", "gentle", "--format", "json"])
            .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.profile, Some(ProfileName::Gentle));
        assert_eq!(cli.run.format, OutputFormat::Json);
    }

    #[test]
    fn test_run_subcommand_flags() {
        let cli = Cli::try_parse_from([
            "loadscope",
            "run",
            "--base-url",
            "http://staging:8080",
            "--output",
            "report.json",
            "--markdown-output",
            "report.md",
            "--verbose",
            "--log-format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.base_url.as_deref(), Some("http://staging:8080"));
                assert_eq!(args.output, Some(PathBuf::from("report.json")));
                assert_eq!(args.markdown_output, Some(PathBuf::from("report.md")));
                assert!(args.verbose);
                assert_eq!(args.log_format, LogFormat::Json);
                assert_eq!(args.profile, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_profile_is_rejected() {
        assert!(Cli::try_parse_from(["loadscope", "--profile", "turbo"]).is_err());
    }

    #[test]
    fn test_profiles_subcommand() {
        let cli = Cli::try_parse_from(["loadscope", "profiles"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Profiles)));
    }

    #[test]
    fn test_resolve_config_applies_overrides() {
        let args = RunArgs {
            base_url: Some("http://127.0.0.1:9999".to_string()),
            profile: Some(ProfileName::Gentle),
            ..RunArgs::default()
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.profile, ProfileName::Gentle);
    }
}
