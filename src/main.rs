//! GA Launcher - process supervisor for the Granblue Automation bot
//!
//! Main entry point for the command-line application.
//!
//! # Overview
//!
//! This binary wires the library together. It initializes:
//! - Launcher configuration ([`ConfigManager`]: `launcher.yaml` + `GA_LAUNCHER_*` env)
//! - Logging infrastructure (daily rotating diagnostic log, optional console output)
//! - Tokio async runtime (child process I/O and statistics API calls)
//! - State management ([`StateManager`])
//! - The bot controller ([`BotController`])
//!
//! # Commands
//!
//! - `run`: start the bot and stream its message log until it exits; Ctrl-C stops it
//! - `check`: report whether the settings are complete enough to start
//! - `settings`: print the effective settings, optionally writing them back
//! - `init-config`: write a `launcher.yaml` with every default spelled out
//!
//! The message log goes to stdout. Diagnostics go to the log file and, with
//! `--debug`, to stderr.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use ga_launcher::logging::{LogOptions, setup_logging};
use ga_launcher::services::default_lifecycle;
use ga_launcher::services::readiness::missing_requirements;
use ga_launcher::{APP_NAME, BotController, ConfigManager, StateManager, VERSION};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Prefix of the diagnostic log files inside the log directory
const LOG_PREFIX: &str = "ga-launcher";

#[derive(Parser, Debug)]
#[command(name = "ga-launcher", version, about = "Run and supervise the Granblue Automation bot")]
struct Cli {
    /// Directory containing launcher.yaml
    #[arg(long, global = true, default_value = ".")]
    config_dir: Utf8PathBuf,

    /// Debug-level diagnostics, also mirrored to stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Write the diagnostic log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bot and stream its message log until it exits
    Run {
        /// Start even when the settings are incomplete
        #[arg(long)]
        force: bool,
    },

    /// Report whether the bot is ready to start
    Check,

    /// Print the effective settings as JSON
    Settings {
        /// Write the settings back, recomputing the summon elements
        #[arg(long)]
        save: bool,
    },

    /// Write a launcher.yaml with the default values
    InitConfig,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;

    if let Commands::InitConfig = cli.command {
        let path = config_manager.launcher_config_path();
        if config_manager.write_default_launcher_config()? {
            println!("Wrote default launcher config to {}", path);
        } else {
            println!("{} already exists, leaving it alone", path);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let launcher_config = config_manager.load_launcher_config()?;

    let _guard = setup_logging(
        &launcher_config.log_dir,
        LOG_PREFIX,
        LogOptions {
            debug_mode: cli.debug || launcher_config.debug_mode,
            console_output: cli.debug,
            json_file: cli.log_json,
        },
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("ga-launcher-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let state_manager = Arc::new(StateManager::new());
    let controller =
        BotController::new(Arc::clone(&state_manager), launcher_config, default_lifecycle())?;
    controller.load_settings();

    let exit_code = match cli.command {
        Commands::Run { force } => runtime.block_on(run_bot(&controller, force))?,
        Commands::Check => check_ready(&controller),
        Commands::Settings { save } => print_settings(&controller, save)?,
        Commands::InitConfig => ExitCode::SUCCESS,
    };

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    Ok(exit_code)
}

/// Start the bot and echo its message log until the session ends.
async fn run_bot(controller: &BotController, force: bool) -> Result<ExitCode> {
    let state = controller.state();
    let mut printed = echo_messages(state, 0);

    if !state.read(|s| s.ready) && !force {
        let missing = describe_missing(controller);
        eprintln!("Not ready to start: {}. Use --force to start anyway.", missing);
        return Ok(ExitCode::FAILURE);
    }

    let mut changes = state.subscribe();
    if !controller.request_start().await {
        echo_messages(state, printed);
        eprintln!("The bot could not be started");
        return Ok(ExitCode::FAILURE);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        printed = echo_messages(state, printed);
        if controller.session_ended() {
            break;
        }

        tokio::select! {
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        tracing::info!("Interrupted, stopping the bot");
                        controller.request_stop().await;
                    }
                    Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
                }
            }
            change = changes.recv() => {
                if let Err(RecvError::Closed) = change {
                    break;
                }
            }
        }
    }

    echo_messages(state, printed);
    println!();
    Ok(ExitCode::SUCCESS)
}

/// Print message log entries from `from` onwards.
///
/// # Returns
/// The index of the next entry to print
fn echo_messages(state: &StateManager, from: usize) -> usize {
    let messages = state.messages_since(from);
    if messages.is_empty() {
        return from;
    }

    let mut stdout = std::io::stdout().lock();
    for message in &messages {
        let _ = write!(stdout, "{}", message);
    }
    let _ = stdout.flush();

    from + messages.len()
}

fn describe_missing(controller: &BotController) -> String {
    controller.state().read(|s| {
        missing_requirements(&s.settings.game)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    })
}

fn check_ready(controller: &BotController) -> ExitCode {
    echo_messages(controller.state(), 0);

    let farming_mode = controller
        .state()
        .read(|s| s.settings.game.farming_mode.clone());

    if controller.state().read(|s| s.ready) {
        println!("Ready to start (farming mode: {})", farming_mode);
        ExitCode::SUCCESS
    } else {
        println!("Not ready to start: {}", describe_missing(controller));
        ExitCode::FAILURE
    }
}

fn print_settings(controller: &BotController, save: bool) -> Result<ExitCode> {
    let saved = !save || controller.save_settings();
    echo_messages(controller.state(), 0);
    if !saved {
        return Ok(ExitCode::FAILURE);
    }

    let settings = controller.state().read(|s| s.settings.clone());
    let json = serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?;
    println!("{}", json);

    Ok(ExitCode::SUCCESS)
}
