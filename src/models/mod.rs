//! Data models for the launcher.
//!
//! - [`AppState`]: The central state container: settings, message log, process handle and flags
//! - [`Settings`]: The user settings document persisted to `settings.json`
//! - [`LauncherConfig`]: Where things live (settings file, logs, bot script, API host)
//! - [`SummonCatalog`]: Fixed mapping from summon names to [`Element`]s
//!
//! # Architecture Note
//!
//! - **Serializable**: Settings and launcher config derive `Serialize`/`Deserialize`
//! - **Cloneable**: AppState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager)
//! - **Immutable**: State updates go through StateManager's `update()` method to ensure consistency

pub mod app_state;
pub mod launcher;
pub mod settings;
pub mod summons;

pub use app_state::AppState;
pub use launcher::{LauncherConfig, LaunchSpec};
pub use settings::{ApiSettings, GameSettings, NightmareSettings, Settings};
pub use summons::{Element, SummonCatalog};
