//! Services module - launcher logic with no UI dependencies.
//!
//! # Components
//!
//! - [`message_log`]: The two-part message log, its sentinel lines and session log files
//! - [`readiness`]: Whether the current settings are complete enough to start the bot
//! - [`result_line`]: Parsing of `API-RESULT|<item>|<amount>` lines printed by the bot
//! - [`statistics`]: Client for the Granblue Automation Statistics API
//! - [`lifecycle`]: Host-specific log directory creation and process-tree kill
//!
//! # Design Philosophy
//!
//! - **Explicit inputs**: Services take settings and paths as parameters instead of reading shared state
//! - **Framework-agnostic**: Usable from the CLI, tests, or any other front end
//! - **Errors as values**: Failures are returned, the controller decides how to surface them

pub mod lifecycle;
pub mod message_log;
pub mod readiness;
pub mod result_line;
pub mod statistics;

pub use lifecycle::{LifecycleError, ProcessLifecycle, default_lifecycle};
pub use message_log::{CLOSING_SENTINEL, FINISHED_SENTINEL, MessageLog};
pub use readiness::{FarmingMode, MissingRequirement, is_ready, missing_requirements};
pub use result_line::{ResultLine, ResultLineError, parse_result_line};
pub use statistics::{ReportOutcome, StatisticsError, StatisticsReporter};
