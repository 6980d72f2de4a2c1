// State management module
//
// This module provides the StateManager which wraps AppState with thread-safe access
// using Arc<RwLock<T>> and emits change events for the front end and the controller.

use crate::models::{AppState, Settings};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These events notify interested parties (the controller and the CLI) about
/// state changes without requiring them to poll the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The initial settings load has finished
    SettingsLoaded,

    /// The settings document changed
    SettingsChanged,

    /// The ready-to-start flag changed
    ReadyChanged { ready: bool },

    /// Start or stop was requested or the request was cleared
    ControlChanged {
        start_requested: bool,
        stop_requested: bool,
    },

    /// A bot process was spawned
    BotStarted { pid: u32 },

    /// The bot process was stopped and the handle released
    BotStopped,

    /// New entries reached the message log
    MessageLogUpdated { len: usize },

    /// The statistics API login state changed
    ApiLoginChanged { logged_in: bool },

    /// The session log was written (or the write was attempted) after the process exited
    SessionLogFlushed,
}

/// Thread-safe state manager with event emission
///
/// This is the central state management component that:
/// - Provides thread-safe access to [`AppState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// # Usage
///
/// Always use `StateManager` instead of accessing [`AppState`] directly:
/// - [`read()`](Self::read) for reading state
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
pub struct StateManager {
    /// The application state protected by RwLock for thread-safe access
    state: Arc<RwLock<AppState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 256 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Get a read-only snapshot of the current state
    ///
    /// This clones the entire state, message log included. For single fields,
    /// prefer `read()` with a closure.
    pub fn snapshot(&self) -> AppState {
        self.read(|state| state.clone())
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.is_running);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// 1. Captures the old state
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits appropriate events
    ///
    /// # Returns
    /// A vector of StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        self.update_with(|state| {
            update_fn(state);
        })
        .1
    }

    /// Like [`update()`](Self::update), but hands back a value computed under the lock.
    pub fn update_with<F, R>(&self, update_fn: F) -> (R, Vec<StateChange>)
    where
        F: FnOnce(&mut AppState) -> R,
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        let value = update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);
        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        (value, changes)
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if !old.settings_loaded && new.settings_loaded {
            changes.push(StateChange::SettingsLoaded);
        }

        if old.settings != new.settings {
            changes.push(StateChange::SettingsChanged);
        }

        if old.ready != new.ready {
            changes.push(StateChange::ReadyChanged { ready: new.ready });
        }

        if old.start_requested != new.start_requested || old.stop_requested != new.stop_requested {
            changes.push(StateChange::ControlChanged {
                start_requested: new.start_requested,
                stop_requested: new.stop_requested,
            });
        }

        if old.pid != new.pid {
            if new.pid != 0 {
                changes.push(StateChange::BotStarted { pid: new.pid });
            } else {
                changes.push(StateChange::BotStopped);
            }
        }

        if old.log.len() != new.log.len() {
            changes.push(StateChange::MessageLogUpdated { len: new.log.len() });
        }

        if old.api_logged_in != new.api_logged_in {
            changes.push(StateChange::ApiLoginChanged {
                logged_in: new.api_logged_in,
            });
        }

        if !old.session_log_flushed && new.session_log_flushed {
            changes.push(StateChange::SessionLogFlushed);
        }

        changes
    }

    // Convenience methods for common state updates

    /// Finish the initial settings load, committing `settings` when present.
    pub fn load_settings(&self, settings: Option<Settings>) -> Vec<StateChange> {
        self.update(|state| {
            if let Some(settings) = settings {
                state.settings = settings;
            }
            state.settings_loaded = true;
        })
    }

    /// Mutate the settings document
    pub fn update_settings<F>(&self, settings_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut Settings),
    {
        self.update(|state| settings_fn(&mut state.settings))
    }

    pub fn set_ready(&self, ready: bool) -> Vec<StateChange> {
        self.update(|state| state.ready = ready)
    }

    pub fn request_start(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.start_requested = true;
            state.stop_requested = false;
        })
    }

    pub fn request_stop(&self) -> Vec<StateChange> {
        self.update(|state| state.stop_requested = true)
    }

    /// Claim the right to spawn the bot.
    ///
    /// Succeeds only when no process is alive or being started, a start was
    /// requested and no stop was requested. The check and the claim happen
    /// under one write lock, so concurrent callers cannot both succeed. The
    /// claim is released by [`bot_started()`](Self::bot_started) or
    /// [`abandon_start()`](Self::abandon_start).
    pub fn reserve_start(&self) -> bool {
        self.update_with(|state| {
            let can_start = !state.has_process()
                && !state.starting
                && state.start_requested
                && !state.stop_requested;
            if can_start {
                state.starting = true;
            }
            can_start
        })
        .0
    }

    /// Release a start claim without spawning.
    ///
    /// `clear_requests` also clears the start and stop requests.
    pub fn abandon_start(&self, clear_requests: bool) -> Vec<StateChange> {
        self.update(|state| {
            state.starting = false;
            if clear_requests {
                state.clear_control_flags();
            } else {
                state.start_requested = false;
            }
        })
    }

    /// Record a freshly spawned bot process and open its session
    pub fn bot_started(&self, pid: u32) -> Vec<StateChange> {
        self.update(|state| {
            state.begin_session();
            state.starting = false;
            state.pid = pid;
            state.is_running = true;
        })
    }

    /// Release the process handle and clear the control flags.
    ///
    /// The check and the reset happen under one write lock, so when several
    /// callers race only one of them receives the pid.
    ///
    /// # Returns
    /// The released pid, or 0 when no process was running (state untouched)
    pub fn take_pid(&self) -> u32 {
        self.update_with(|state| {
            let pid = state.pid;
            if pid != 0 {
                state.pid = 0;
                state.clear_control_flags();
            }
            pid
        })
        .0
    }

    /// Append a launcher message to the synchronous log
    pub fn push_message(&self, message: impl Into<String>) -> Vec<StateChange> {
        let message = message.into();
        self.update(|state| state.log.push(message))
    }

    /// Append a bot-originated message to the asynchronous log
    pub fn push_async(&self, message: impl Into<String>) -> Vec<StateChange> {
        let message = message.into();
        self.update(|state| state.log.push_async(message))
    }

    /// Synchronous log entries from `index` onwards
    pub fn messages_since(&self, index: usize) -> Vec<String> {
        self.read(|state| {
            state
                .log
                .messages()
                .get(index..)
                .map(<[String]>::to_vec)
                .unwrap_or_default()
        })
    }

    pub fn set_api_logged_in(&self, logged_in: bool) -> Vec<StateChange> {
        self.update(|state| state.api_logged_in = logged_in)
    }

    /// Mark the session's one-time "create item" bootstrap as done
    pub fn complete_api_bootstrap(&self) -> Vec<StateChange> {
        self.update(|state| state.first_api_request = false)
    }

}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(!state.is_running);
        assert!(!state.ready);
        assert_eq!(state.pid, 0);
    }

    #[test]
    fn test_load_settings_emits_loaded_and_changed() {
        let manager = StateManager::new();
        let mut settings = Settings::default();
        settings.game.farming_mode = "Quest".to_string();

        let changes = manager.load_settings(Some(settings));

        assert_eq!(
            changes,
            vec![StateChange::SettingsLoaded, StateChange::SettingsChanged]
        );
        assert!(manager.read(|s| s.settings_loaded));
    }

    #[test]
    fn test_failed_load_still_marks_loaded() {
        let manager = StateManager::new();

        let changes = manager.load_settings(None);

        assert_eq!(changes, vec![StateChange::SettingsLoaded]);
        assert_eq!(manager.read(|s| s.settings.clone()), Settings::default());
    }

    #[test]
    fn test_update_settings_without_change_emits_nothing() {
        let manager = StateManager::new();
        let changes = manager.update_settings(|settings| settings.game.item.clear());
        assert!(changes.is_empty());
    }

    #[test]
    fn test_bot_started_and_take_pid() {
        let manager = StateManager::new();
        manager.request_start();

        let changes = manager.bot_started(4242);
        assert_eq!(changes, vec![StateChange::BotStarted { pid: 4242 }]);

        assert_eq!(manager.take_pid(), 4242);
        let state = manager.snapshot();
        assert_eq!(state.pid, 0);
        assert!(!state.start_requested);
        assert!(!state.stop_requested);
        assert!(!state.is_running);
    }

    #[test]
    fn test_reserve_start_claims_once() {
        let manager = StateManager::new();
        assert!(!manager.reserve_start());

        manager.request_start();
        assert!(manager.reserve_start());
        assert!(!manager.reserve_start());

        manager.bot_started(11);
        let state = manager.snapshot();
        assert!(!state.starting);
        assert!(!manager.reserve_start());
    }

    #[test]
    fn test_abandon_start_releases_claim() {
        let manager = StateManager::new();
        manager.request_start();
        assert!(manager.reserve_start());

        manager.abandon_start(false);

        let state = manager.snapshot();
        assert!(!state.starting);
        assert!(!state.start_requested);
        assert!(!manager.reserve_start());

        manager.request_start();
        assert!(manager.reserve_start());
    }

    #[test]
    fn test_bot_started_opens_session() {
        let manager = StateManager::new();
        manager.push_message("\nChild process finished with code 0");
        manager.update(|s| s.session_log_flushed = true);

        manager.bot_started(5);

        let state = manager.snapshot();
        assert_eq!(state.session_start, 1);
        assert!(!state.session_log_flushed);
        assert!(!state.session_finished());
    }

    #[test]
    fn test_take_pid_when_idle_leaves_state_untouched() {
        let manager = StateManager::new();
        manager.request_start();
        let mut rx = manager.subscribe();

        assert_eq!(manager.take_pid(), 0);

        assert!(rx.try_recv().is_err());
        assert!(manager.read(|s| s.start_requested));
    }

    #[test]
    fn test_take_pid_only_once() {
        let manager = StateManager::new();
        manager.bot_started(7);

        assert_eq!(manager.take_pid(), 7);
        assert_eq!(manager.take_pid(), 0);
    }

    #[test]
    fn test_push_async_updates_message_log() {
        let manager = StateManager::new();
        manager.push_message("\nlauncher");

        let changes = manager.push_async("\nbot");

        assert_eq!(changes, vec![StateChange::MessageLogUpdated { len: 2 }]);
        assert_eq!(manager.messages_since(1), vec!["\nbot".to_string()]);
        assert!(manager.messages_since(5).is_empty());
    }

    #[test]
    fn test_control_flags() {
        let manager = StateManager::new();

        let changes = manager.request_start();
        assert_eq!(
            changes,
            vec![StateChange::ControlChanged {
                start_requested: true,
                stop_requested: false
            }]
        );

        let changes = manager.request_stop();
        assert_eq!(
            changes,
            vec![StateChange::ControlChanged {
                start_requested: true,
                stop_requested: true
            }]
        );
    }

    #[test]
    fn test_api_session_flags() {
        let manager = StateManager::new();

        let changes = manager.set_api_logged_in(true);
        assert_eq!(changes, vec![StateChange::ApiLoginChanged { logged_in: true }]);

        manager.complete_api_bootstrap();
        assert!(!manager.read(|s| s.first_api_request));
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.set_ready(true);

        let event = rx.try_recv();
        assert!(matches!(event, Ok(StateChange::ReadyChanged { ready: true })));
    }

    #[test]
    fn test_clone_state_manager() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.bot_started(10);

        assert_eq!(manager2.read(|s| s.pid), 10);
    }
}
