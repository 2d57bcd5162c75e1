//! Global constants and helpers for store locations, cache sizing, and timestamp formatting
// Constants for version and binary identification
use std::path::PathBuf;
use std::time::Duration;

/// Binary name used in help output and log prefixes
pub const BINARY_NAME: &str = "dirmark";

/// Package version from Cargo.toml (set at compile time)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Active Handle Cache
// ============================================================================

/// Maximum number of simultaneously active directory handles
pub const DEFAULT_CACHE_CAPACITY: usize = 5;

/// Idle threshold for the explicit `sweep_idle` pass (5 minutes).
///
/// Nothing evicts on this automatically; capacity is the only implicit policy.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

// ============================================================================
// Relocatable references
// ============================================================================

/// Prefix identifying a relocatable (device + inode + birth time) reference token
pub const RELOCATABLE_REFERENCE_PREFIX: &str = "ino:v2:";

/// Older relocatable tokens without a birth time; still decoded
pub const LEGACY_RELOCATABLE_REFERENCE_PREFIX: &str = "ino:v1:";

/// How many directory levels below the surviving ancestor are searched
/// when a relocatable reference has gone stale
pub const RELOCATION_SEARCH_DEPTH: usize = 3;

// ============================================================================
// Record store
// ============================================================================

/// Config directory name (under the platform config dir)
pub const CONFIG_DIR_NAME: &str = "directory_bookmarks";

/// Record store file name
pub const STORE_FILE_NAME: &str = "bookmarks.json";

/// On-disk record store format version
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Environment variable overriding the record store location
pub const STORE_ENV_VAR: &str = "DIRMARK_STORE";

/// Default record store path: `<config dir>/directory_bookmarks/bookmarks.json`
///
/// Falls back to the current directory when the platform exposes no config dir.
pub fn default_store_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(STORE_FILE_NAME)
}

/// Hidden-file marker excluded from file listings
pub const HIDDEN_FILE_PREFIX: char = '.';

/// Current UTC time, truncated to whole seconds like the persisted `createdAt`
pub fn now_utc() -> chrono::DateTime<chrono::Utc> {
    use chrono::SubsecRound;
    chrono::Utc::now().trunc_subsecs(0)
}
