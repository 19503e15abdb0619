//! Application constants
//!
//! Centralized location for magic strings and configuration defaults.

/// Application name
pub const APP_NAME: &str = "Courier";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory under the home directory holding config, collections and environments
pub const DATA_DIR_NAME: &str = ".courier";

/// Config file name inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of history entries kept per request
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Default log file, relative to the data directory
pub const DEFAULT_LOG_FILE: &str = "courier.log";

/// Default sidebar width in columns
pub const DEFAULT_SIDEBAR_WIDTH: u16 = 30;

/// URL used for freshly created requests
pub const DEFAULT_REQUEST_URL: &str = "{{base_url}}/";

/// Scheme assumed when a resolved URL carries none
pub const DEFAULT_SCHEME: &str = "https://";
