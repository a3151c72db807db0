//! Central Configuration Constants
//!
//! Single source of truth for defaults that are not part of a config section.
//! Env helpers read `SIGNUP_GUARD_*` overrides with a fallback to the default.

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Signup-Guard";

/// Env var prefix for overrides
pub const ENV_PREFIX: &str = "SIGNUP_GUARD_";

/// Default warn threshold
pub const DEFAULT_WARN_THRESHOLD: f32 = 0.30;

/// Default block threshold
pub const DEFAULT_BLOCK_THRESHOLD: f32 = 0.60;

/// Minimum labelled samples before a training run may proceed
pub const DEFAULT_MIN_TRAINING_SAMPLES: usize = 1000;

/// Artifact size ceiling (bytes). Matches the storage value limit of the edge KV.
pub const DEFAULT_MAX_ARTIFACT_BYTES: usize = 25 * 1024 * 1024;

/// Backup ring capacity
pub const DEFAULT_BACKUP_CAPACITY: usize = 5;

/// Registry snapshot time-to-live (seconds)
pub const DEFAULT_REGISTRY_TTL_SECS: u64 = 300;

/// Training lease time-to-live (seconds)
pub const DEFAULT_LEASE_TTL_SECS: u64 = 30 * 60;

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Read `SIGNUP_GUARD_<name>` from the environment
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name)).ok()
}

/// Read and parse an env override, falling back to `default`
pub fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_var(name)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a boolean env override (`false`/`0` disable, anything else enables)
pub fn env_flag(name: &str, default: bool) -> bool {
    env_var(name)
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(default)
}
