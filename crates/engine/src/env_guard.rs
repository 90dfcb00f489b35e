//! Scoped process-environment overrides.
//!
//! Some external tools only read configuration from the environment
//! (`DOCKER_CONFIG` during authenticated pulls). Operations that must mutate
//! the process environment hold a guard for the duration of the call; the
//! previous value is restored when the guard drops, on every exit path.

use std::ffi::OsString;

/// Restores an environment variable to its previous state on drop.
#[must_use = "the override ends when the guard is dropped"]
pub struct ScopedEnv {
    key: String,
    previous: Option<OsString>,
}

impl ScopedEnv {
    /// Sets `key` to `value` for the lifetime of the returned guard.
    pub fn set(key: impl Into<String>, value: impl AsRef<str>) -> Self {
        let key = key.into();
        let previous = std::env::var_os(&key);
        std::env::set_var(&key, value.as_ref());
        Self { key, previous }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(previous) => std::env::set_var(&self.key, previous),
            None => std::env::remove_var(&self.key),
        }
    }
}
