// GA Launcher - process supervisor for the Granblue Automation bot
//
// This is the library crate containing the launcher logic and data structures.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod controller;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use controller::{BotController, ProcessEvent};
pub use models::{AppState, LauncherConfig, Settings};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
