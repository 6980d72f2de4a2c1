// Bot controller - drives the bot process from the shared state
//
// This module contains the BotController which coordinates between:
// - StateManager (settings, flags, message log)
// - ProcessLifecycle (host-specific log directory and process-tree kill)
// - StatisticsReporter (Granblue Automation Statistics API)
//
// It handles:
// - Loading, saving and validating the user settings
// - Spawning the bot and pumping its output into the message log
// - Stopping the bot exactly once, whichever path asks first
// - Flushing the session log when the process exits

use crate::config;
use crate::models::summons::catalog;
use crate::models::{LauncherConfig, Settings};
use crate::services::lifecycle::ProcessLifecycle;
use crate::services::message_log::{session_log_name, write_session_log};
use crate::services::readiness::is_ready;
use crate::services::result_line::{ResultLine, is_result_line, parse_result_line};
use crate::services::statistics::StatisticsReporter;
use crate::state::{StateChange, StateManager};
use anyhow::{Context, Result};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How long output readers may lag behind the exit of the bot process
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Something the bot process did, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    Error(String),
    /// The process exited; `None` when it was terminated by a signal
    Closed(Option<i32>),
}

/// Owns the bot process and everything that reacts to it.
///
/// Cloning is cheap; clones share the same state, lifecycle and HTTP client.
/// The spawned pump task holds a clone so it can call back into
/// [`stop()`](Self::stop).
///
/// # Example
/// ```ignore
/// let state = Arc::new(StateManager::new());
/// let controller = BotController::new(state, launcher_config, default_lifecycle())?;
/// controller.load_settings();
/// if controller.request_start().await {
///     controller.wait_for_session_end().await;
/// }
/// ```
#[derive(Clone)]
pub struct BotController {
    state: Arc<StateManager>,
    config: Arc<LauncherConfig>,
    lifecycle: Arc<dyn ProcessLifecycle>,
    reporter: StatisticsReporter,
}

impl BotController {
    pub fn new(
        state: Arc<StateManager>,
        config: LauncherConfig,
        lifecycle: Arc<dyn ProcessLifecycle>,
    ) -> Result<Self> {
        let reporter = StatisticsReporter::new(&config.api_base_url, config.api_timeout())
            .context("Failed to create statistics API client")?;

        Ok(Self {
            state,
            config: Arc::new(config),
            lifecycle,
            reporter,
        })
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------------

    /// Load the settings file into the shared state.
    ///
    /// A missing or broken file is reported to the message log and leaves the
    /// default settings in place; the initial load counts as finished either way.
    ///
    /// # Returns
    /// `true` when the file was loaded
    pub fn load_settings(&self) -> bool {
        let settings = match config::load_settings(&self.config.settings_path) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::error!("Encountered read exception while loading settings: {:#}", e);
                self.state.push_message(format!(
                    "\nEncountered exception while loading settings from local JSON file: {:#}",
                    e
                ));
                None
            }
        };

        let loaded = settings.is_some();
        self.state.load_settings(settings);
        self.refresh_ready();
        loaded
    }

    /// Change the settings, then persist them and recompute readiness.
    ///
    /// Nothing is written before the initial load finished or when the change
    /// left the settings untouched.
    pub fn update_settings<F>(&self, settings_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut Settings),
    {
        let changes = self.state.update_settings(|settings| {
            settings_fn(settings);
            settings.refresh_summon_elements(catalog());
        });

        if changes.contains(&StateChange::SettingsChanged) && self.state.read(|s| s.settings_loaded) {
            self.save_settings();
        }

        self.refresh_ready();
        changes
    }

    /// Write the current settings to the settings file.
    ///
    /// The settings as written, with recomputed summon elements, replace the
    /// ones in the shared state.
    ///
    /// # Returns
    /// `true` when the file was written
    pub fn save_settings(&self) -> bool {
        let settings = self.state.read(|s| s.settings.clone());

        match config::save_settings(&self.config.settings_path, &settings, catalog()) {
            Ok(written) => {
                self.state.update(|s| s.settings = written);
                true
            }
            Err(e) => {
                tracing::error!("Encountered write exception while saving settings: {:#}", e);
                self.state.push_message(format!(
                    "\nEncountered write exception while saving settings to settings.json: {:#}\nThe current directory or parent directory might be write-protected",
                    e
                ));
                false
            }
        }
    }

    /// Recompute the ready flag from the current settings.
    pub fn refresh_ready(&self) -> bool {
        let ready = self.state.read(|s| is_ready(&s.settings.game));
        self.state.set_ready(ready);
        ready
    }

    // ---------------------------------------------------------------------
    // Process control
    // ---------------------------------------------------------------------

    /// Ask for the bot to start and start it if nothing is running.
    ///
    /// # Returns
    /// `true` when a new process was spawned
    pub async fn request_start(&self) -> bool {
        self.state.request_start();
        self.start().await
    }

    /// Ask for the bot to stop and stop it if it is running.
    ///
    /// # Returns
    /// `true` when a running process was killed by this call
    pub async fn request_stop(&self) -> bool {
        self.state.request_stop();
        let should_stop = self.state.read(|s| s.is_running && s.has_process());
        if should_stop { self.stop().await } else { false }
    }

    /// Spawn the bot process.
    ///
    /// Runs only when no process is alive or starting, a start was requested
    /// and no stop was requested. The statistics API login happens first; its failure is
    /// reported but does not prevent the start.
    ///
    /// # Returns
    /// `true` when a new process was spawned
    pub async fn start(&self) -> bool {
        if !self.state.reserve_start() {
            tracing::debug!("Start skipped: bot already running or starting, or no start requested");
            return false;
        }

        self.ensure_log_dir().await;
        self.login().await;

        if self.state.read(|s| s.stop_requested) {
            tracing::info!("Stop requested during startup, not spawning the bot");
            self.state.abandon_start(true);
            return false;
        }

        let mut child = match self.spawn_bot() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("Failed to start bot: {:#}", e);
                self.state.push_async(format!("\nChild process error: {:#}", e));
                self.state.abandon_start(false);
                return false;
            }
        };

        let Some(pid) = child.id() else {
            tracing::error!("Bot process exited before its pid was known");
            self.state
                .push_async("\nChild process error: process exited before it could be tracked");
            self.state.abandon_start(false);
            return false;
        };

        self.state.bot_started(pid);
        tracing::info!("Started bot process {}", pid);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let readers = watch_child(&mut child, events_tx.clone());
        tokio::spawn(wait_for_exit(child, readers, events_tx));

        let controller = self.clone();
        tokio::spawn(async move { controller.pump(events_rx).await });

        true
    }

    /// Kill the bot's process tree.
    ///
    /// Does nothing when no process is alive. The pid is released under the
    /// state lock before the kill, so concurrent callers kill at most once.
    ///
    /// # Returns
    /// `true` when this call performed the kill
    pub async fn stop(&self) -> bool {
        let pid = self.state.take_pid();
        if pid == 0 {
            tracing::debug!("Stop skipped: no bot process running");
            return false;
        }

        tracing::info!("Stopping bot process tree {}", pid);
        let lifecycle = Arc::clone(&self.lifecycle);
        match tokio::task::spawn_blocking(move || lifecycle.kill_tree(pid)).await {
            Ok(Ok(output)) => tracing::debug!("Kill output: {}", output.trim()),
            Ok(Err(e)) => tracing::warn!("Failed to kill process tree {}: {}", pid, e),
            Err(e) => tracing::error!("Kill task for {} failed: {}", pid, e),
        }

        true
    }

    /// Wait until the current session's log has been flushed.
    ///
    /// Only meaningful after [`start()`](Self::start) returned `true`.
    pub async fn wait_for_session_end(&self) {
        let mut changes = self.state.subscribe();
        loop {
            if self.session_ended() {
                return;
            }
            match changes.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// True once the last session's process exited and its log was flushed.
    pub fn session_ended(&self) -> bool {
        self.state.read(|s| s.session_log_flushed)
    }

    async fn ensure_log_dir(&self) {
        let lifecycle = Arc::clone(&self.lifecycle);
        let log_dir = self.config.log_dir.clone();

        match tokio::task::spawn_blocking(move || lifecycle.ensure_log_dir(&log_dir)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to create log directory {}: {}", self.config.log_dir, e),
            Err(e) => tracing::error!("Log directory task failed: {}", e),
        }
    }

    async fn login(&self) {
        let credentials = self.state.read(|s| s.settings.api.clone());

        match self.reporter.login(&credentials).await {
            Ok(()) => {
                self.state.set_api_logged_in(true);
                self.state
                    .push_async("Successfully logged into Granblue Automation Statistics API.\n");
            }
            Err(e) => {
                tracing::warn!("Failed to login to statistics API: {}", e);
                self.state.push_async(format!(
                    "Failed to login to Granblue Automation Statistics API: {}\n",
                    e
                ));
            }
        }
    }

    fn spawn_bot(&self) -> Result<Child> {
        let launch = self.config.launch_spec();

        let mut command = Command::new(&launch.program);
        command
            .args(&launch.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &launch.working_dir {
            command.current_dir(dir);
        }
        self.lifecycle.configure(&mut command);

        command.spawn().with_context(|| {
            format!("Failed to spawn `{} {}`", launch.program, launch.args.join(" "))
        })
    }

    // ---------------------------------------------------------------------
    // Process events
    // ---------------------------------------------------------------------

    async fn pump(&self, mut events: mpsc::UnboundedReceiver<ProcessEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::debug!("Process event channel closed");
    }

    /// Apply one process event to the message log.
    pub async fn handle_event(&self, event: ProcessEvent) {
        match event {
            ProcessEvent::Stdout(line) => {
                if self.state.read(|s| s.api_logged_in) && is_result_line(&line) {
                    match parse_result_line(&line) {
                        Ok(result) => self.dispatch_report(result),
                        Err(e) => {
                            tracing::warn!("Unable to send API request: {}", e);
                            self.state.push_async(format!(
                                "\nUnable to send API request to Granblue Automation Statistics: {}",
                                e
                            ));
                        }
                    }
                }
                self.append(format!("\n{}", line)).await;
            }
            ProcessEvent::Stderr(line) => self.append(format!("\n{}", line)).await,
            ProcessEvent::Error(error) => {
                tracing::error!("Child process error: {}", error);
                self.append(format!("\nChild process error: {}", error)).await;
            }
            ProcessEvent::Closed(code) => {
                let name = session_log_name();
                let code = code.map_or_else(|| "null".to_string(), |code| code.to_string());
                tracing::info!("Bot process finished with code {}", code);

                self.state.update(|s| {
                    s.session_log_name = Some(name.clone());
                    s.log.push_async(format!("\n\nSaved message log to: {}.txt", name));
                    s.log
                        .push_async(format!("\nChild process finished with code {}", code));
                });

                self.stop().await;
                self.flush_if_finished();
            }
        }
    }

    async fn append(&self, message: String) {
        self.state.push_async(message);

        let closing = self.state.read(|s| s.has_process() && s.log.closing_requested());
        if closing {
            tracing::info!("Bot announced it is closing");
            self.stop().await;
        }
    }

    /// Write the session log once the exit line is in. Only the close handler calls this.
    fn flush_if_finished(&self) {
        let pending = self.state.read(|s| {
            (s.session_finished() && !s.session_log_flushed).then(|| {
                let name = s.session_log_name.clone().unwrap_or_else(session_log_name);
                (name, s.log.contents())
            })
        });
        let Some((name, contents)) = pending else {
            return;
        };

        if let Err(e) = write_session_log(&self.config.log_dir, &name, &contents) {
            tracing::error!("Encountered write exception: {:#}", e);
        }
        self.state.update(|s| s.session_log_flushed = true);
    }

    fn dispatch_report(&self, result: ResultLine) {
        let (credentials, farming_mode, first_time) = self.state.read(|s| {
            (
                s.settings.api.clone(),
                s.settings.game.farming_mode.clone(),
                s.first_api_request,
            )
        });
        let reporter = self.reporter.clone();
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let outcome = reporter
                .report(
                    &credentials,
                    &farming_mode,
                    &result.item_name,
                    result.amount,
                    first_time,
                )
                .await;

            if outcome.bootstrap_completed() {
                state.complete_api_bootstrap();
            }
            for message in outcome.messages() {
                state.push_async(message);
            }
        });
    }
}

/// Start forwarding the child's output streams as process events.
fn watch_child(child: &mut Child, events: mpsc::UnboundedSender<ProcessEvent>) -> Vec<JoinHandle<()>> {
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_lines(stdout, events.clone(), ProcessEvent::Stdout)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_lines(stderr, events, ProcessEvent::Stderr)));
    }
    readers
}

/// Wait for the child to exit and report it after the rest of its output.
///
/// Grandchildren can hold the pipes open after the child itself is gone, so the
/// readers only get [`READER_DRAIN_TIMEOUT`] to finish.
async fn wait_for_exit(
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    let status = child.wait().await;

    for reader in readers {
        if timeout(READER_DRAIN_TIMEOUT, reader).await.is_err() {
            tracing::debug!("Output reader still open after the bot exited");
        }
    }

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            let _ = events.send(ProcessEvent::Error(e.to_string()));
            None
        }
    };
    let _ = events.send(ProcessEvent::Closed(code));
}

async fn forward_lines<R>(
    reader: R,
    events: mpsc::UnboundedSender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer);
                let line = line.trim_end_matches(['\r', '\n']).to_string();
                if events.send(wrap(line)).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = events.send(ProcessEvent::Error(e.to_string()));
                break;
            }
        }
    }
}
