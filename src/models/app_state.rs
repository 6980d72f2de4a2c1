use crate::models::Settings;
use crate::services::message_log::MessageLog;

/// Single source of truth for all launcher state.
///
/// Holds the user settings, the message log shown to the user, the handle of
/// the running bot process and the flags that drive it.
///
/// # Thread Safety
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`].
/// Never mutate it directly; go through [`StateManager::update()`](crate::state::StateManager::update)
/// so change events are emitted.
#[derive(Clone, Debug)]
pub struct AppState {
    // Settings
    pub settings: Settings,
    /// Set once the initial settings load finished, successfully or not.
    /// Saves are suppressed until then.
    pub settings_loaded: bool,
    pub ready: bool,

    // Process control
    /// Process identifier of the bot; 0 when no process is running
    pub pid: u32,
    pub start_requested: bool,
    pub stop_requested: bool,
    pub is_running: bool,
    /// Set while a start is between its checks and the spawn
    pub starting: bool,

    // Statistics API session
    pub api_logged_in: bool,
    /// True until the first "create item" bootstrap of the session succeeds
    pub first_api_request: bool,

    // Message log
    pub log: MessageLog,
    /// Length of the message log when the current session began
    pub session_start: usize,
    /// File name chosen for the session log when the process closed
    pub session_log_name: Option<String>,
    /// Set after the session log has been written to disk
    pub session_log_flushed: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            settings_loaded: false,
            ready: false,

            pid: 0,
            start_requested: false,
            stop_requested: false,
            is_running: false,
            starting: false,

            api_logged_in: false,
            first_api_request: true,

            log: MessageLog::default(),
            session_start: 0,
            session_log_name: None,
            session_log_flushed: false,
        }
    }
}

impl AppState {
    /// True once the current session's process-exit line reached the log.
    pub fn session_finished(&self) -> bool {
        self.log.has_finished_since(self.session_start)
    }

    /// True while a bot process is alive.
    pub fn has_process(&self) -> bool {
        self.pid != 0
    }

    /// Clear the start, stop and running flags.
    pub fn clear_control_flags(&mut self) {
        self.start_requested = false;
        self.stop_requested = false;
        self.is_running = false;
    }

    /// Reset per-session bookkeeping before a new process is spawned.
    pub fn begin_session(&mut self) {
        self.session_start = self.log.len();
        self.session_log_name = None;
        self.session_log_flushed = false;
    }
}
