//! Environment variable parsing utilities.
//!
//! Configuration reads everything through these helpers so that an unset, blank or
//! unparsable variable consistently falls back to the default instead of failing:
//!
//! ```
//! use persona_types::env_utils::{env_var_or, env_nonempty};
//!
//! let interval: u64 = env_var_or("PERSONA_SYNC_INTERVAL_SECS", 30);
//! let endpoint: Option<String> = env_nonempty("PERSONA_REMOTE_ENDPOINT");
//! ```

use std::path::PathBuf;
use std::str::FromStr;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable with a default value.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Read a string variable, treating blank values as unset.
pub fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a string variable with a default, treating blank values as unset.
pub fn env_string_or(key: &str, default: &str) -> String {
    env_nonempty(key).unwrap_or_else(|| default.to_string())
}

/// Read a filesystem path variable, treating blank values as unset.
pub fn env_path(key: &str) -> Option<PathBuf> {
    env_nonempty(key).map(PathBuf::from)
}
