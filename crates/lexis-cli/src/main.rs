// crates/lexis-cli/src/main.rs
// ============================================================================
// Module: Lexis CLI Entry Point
// Description: Command dispatcher for the Lexis server and config checks.
// Purpose: Start the multiplexing server in a fixed order and validate config.
// Dependencies: clap, lexis-cli, lexis-config, lexis-core, lexis-server, tokio
// ============================================================================

//! ## Overview
//! `lexis serve` loads configuration, opens storage, builds the accessor
//! registry, binds the shared listener, and serves until Ctrl-C. `lexis
//! config check` validates a config file and prints a short summary. Errors
//! are written to stderr and exit non-zero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use lexis_cli::bootstrap::build_audit_sink;
use lexis_cli::bootstrap::build_registry;
use lexis_cli::bootstrap::relay_channels;
use lexis_config::LexisConfig;
use lexis_config::StorageConfig;
use lexis_core::ResourceGuard;
use lexis_server::AppState;
use lexis_server::ErrorDisclosure;
use lexis_server::LexisServer;
use lexis_server::ServerSettings;
use lexis_server::StaticTokenIdentityProvider;
use lexis_server::resource_router;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "lexis", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Lexis server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to lexis.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a Lexis configuration file.
    Check(ConfigCheckCommand),
}

/// Arguments for `config check`.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Optional config file path (defaults to lexis.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Check(command) => command_config_check(&command),
        },
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = LexisConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let registry_config = config.clone();
    let registry = tokio::task::spawn_blocking(move || build_registry(&registry_config))
        .await
        .map_err(|err| CliError::new(format!("startup failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    let audit = build_audit_sink(&config, &config.audit)
        .map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    let identity = StaticTokenIdentityProvider::from_config(&config.auth);
    if identity.is_empty() {
        write_stderr_line(
            "lexis: WARNING: no auth principals configured; resource requests will be rejected",
        )
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }

    let state = AppState::new(
        ResourceGuard::new(Arc::new(registry)),
        Arc::new(identity),
        Arc::clone(&audit),
    )
    .with_disclosure(ErrorDisclosure::from_config(&config.server));
    let settings = ServerSettings::from_config(&config.server)
        .map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    let (server, channels) = LexisServer::bind(settings, resource_router(state), audit)
        .await
        .map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    let addr = server.local_addr().map_err(|err| CliError::new(err.to_string()))?;
    write_stderr_line(&format!("lexis: listening on {addr}"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;

    tokio::spawn(relay_channels(channels));
    server
        .serve_with_shutdown(shutdown_signal())
        .await
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves on Ctrl-C; never resolves when the signal cannot be installed.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes `config check`.
fn command_config_check(command: &ConfigCheckCommand) -> CliResult<ExitCode> {
    let config = LexisConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let storage = match &config.storage {
        StorageConfig::Memory => "memory",
        StorageConfig::Sqlite(_) => "sqlite",
    };
    let keys: Vec<String> = config.resources.iter().map(|resource| resource.key.to_string()).collect();
    write_stdout_line(&format!(
        "config ok: bind {}, storage {storage}, resources [{}], {} auth principals",
        config.server.bind,
        keys.join(", "),
        config.auth.principals.len()
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output failure message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
