//! Argument parsing, configuration and logging setup, and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use otaverify_config::VerifierConfig;
use otaverify_events::EventBus;
use otaverify_telemetry::{LoggingConfig, Metrics, build_sha, init_logging, log_format_from_config};
use tracing::{info, warn};

use crate::commands;
use crate::error::{CliError, CliResult};

#[derive(Parser)]
#[command(name = "otaverify", about = "Inspect and verify update payloads")]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "OTAVERIFY_CONFIG")]
    pub(crate) config: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Json,
        help = "Select output format for command reports"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Parse a payload header and summarise its manifest.
    Inspect(InspectArgs),
    /// Check the metadata signature, and optionally the payload signature.
    VerifyMetadata(VerifyMetadataArgs),
    /// Hash installed partitions against an install plan.
    VerifyPartitions(VerifyPartitionsArgs),
    /// Derive an install plan from a payload manifest.
    Plan(PlanArgs),
}

#[derive(Args)]
pub(crate) struct InspectArgs {
    #[arg(long)]
    pub(crate) payload: PathBuf,
}

#[derive(Args)]
pub(crate) struct VerifyMetadataArgs {
    #[arg(long)]
    pub(crate) payload: PathBuf,
    /// PEM public key; falls back to the configured key.
    #[arg(long)]
    pub(crate) public_key: Option<PathBuf>,
    /// Base64 metadata signature delivered out of band.
    #[arg(long, default_value = "")]
    pub(crate) metadata_signature: String,
    /// Also check the signature over the whole payload.
    #[arg(long)]
    pub(crate) full_payload: bool,
}

#[derive(Args)]
pub(crate) struct VerifyPartitionsArgs {
    #[arg(long)]
    pub(crate) plan: PathBuf,
    /// Read size per hashing step; overrides the configured chunk size.
    #[arg(long)]
    pub(crate) chunk_size: Option<usize>,
}

#[derive(Args)]
pub(crate) struct PlanArgs {
    #[arg(long)]
    pub(crate) payload: PathBuf,
    /// Directory holding `<partition>.img` for the running slot.
    #[arg(long)]
    pub(crate) source_dir: PathBuf,
    /// Directory holding `<partition>.img` for the updated slot.
    #[arg(long)]
    pub(crate) target_dir: PathBuf,
    /// Write the plan here instead of printing it.
    #[arg(long)]
    pub(crate) out: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum OutputFormat {
    Json,
    Table,
}

/// Shared state handed to every command.
pub(crate) struct AppContext {
    pub(crate) config: VerifierConfig,
    pub(crate) output: OutputFormat,
    pub(crate) events: EventBus,
    pub(crate) metrics: Metrics,
}

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let command_name = command_label(&cli.command);

    let config = match otaverify_config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            let err = CliError::validation(format!(
                "invalid configuration: {:#}",
                anyhow::Error::new(err)
            ));
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    let logging = LoggingConfig {
        level: &config.log_level,
        format: log_format_from_config(config.log_format.as_deref()),
        build_sha: build_sha(),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging unavailable: {err}");
    }

    let result = match Metrics::new() {
        Ok(metrics) => {
            let ctx = AppContext {
                config,
                output: cli.output,
                events: EventBus::new(),
                metrics,
            };
            dispatch(cli.command, &ctx).await
        }
        Err(err) => Err(CliError::failure(err)),
    };

    match result {
        Ok(()) => {
            info!(command = command_name, "command succeeded");
            0
        }
        Err(err) => {
            warn!(
                command = command_name,
                code = err.code().map(|code| code.as_str()),
                "command failed"
            );
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

pub(crate) async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<()> {
    match command {
        Command::Inspect(args) => commands::inspect::handle(ctx, &args),
        Command::VerifyMetadata(args) => commands::metadata::handle(ctx, &args),
        Command::VerifyPartitions(args) => commands::partitions::handle(ctx, &args).await,
        Command::Plan(args) => commands::plan::handle(ctx, &args),
    }
}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Inspect(_) => "inspect",
        Command::VerifyMetadata(_) => "verify_metadata",
        Command::VerifyPartitions(_) => "verify_partitions",
        Command::Plan(_) => "plan",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_verify_metadata_flags() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "otaverify",
            "--output",
            "table",
            "verify-metadata",
            "--payload",
            "payload.bin",
            "--public-key",
            "key.pem",
            "--full-payload",
        ])?;
        assert_eq!(cli.output, OutputFormat::Table);
        assert_eq!(command_label(&cli.command), "verify_metadata");
        let Command::VerifyMetadata(args) = cli.command else {
            panic!("expected verify-metadata");
        };
        assert_eq!(args.public_key, Some(PathBuf::from("key.pem")));
        assert!(args.metadata_signature.is_empty());
        assert!(args.full_payload);
        Ok(())
    }

    #[test]
    fn verify_partitions_requires_a_plan() {
        assert!(Cli::try_parse_from(["otaverify", "verify-partitions"]).is_err());
    }
}
