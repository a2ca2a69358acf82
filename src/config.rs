//! Environment-driven backend configuration
//!
//! The backend needs exactly two pieces of host configuration: where
//! shared-memory backing stores may be created (mandatory), and whether
//! client-side window decorations should be suppressed (optional).

use std::env;
use std::path::PathBuf;

use crate::error::BackendError;

/// Environment variable naming the directory for shared-memory files.
pub const ENV_RUNTIME_DIR: &str = "XDG_RUNTIME_DIR";

/// Boolean-like environment variable disabling client-side decorations.
pub const ENV_NO_DECORATIONS: &str = "WAYBRIDGE_NO_DECORATIONS";

/// Backend configuration resolved at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory under which per-window backing stores are created.
    pub runtime_dir: PathBuf,
    /// When true, no decoration surfaces are created and configure sizes
    /// are taken verbatim (no chrome insets).
    pub disable_decorations: bool,
}

impl Config {
    /// Resolve the configuration from the process environment.
    ///
    /// Fails when the runtime directory variable is unset; the backend
    /// cannot exchange pixel buffers with the compositor without it.
    pub fn from_env() -> Result<Self, BackendError> {
        let runtime_dir = env::var_os(ENV_RUNTIME_DIR)
            .map(PathBuf::from)
            .ok_or(BackendError::MissingRuntimeDir)?;

        let disable_decorations = flag_enabled(env::var(ENV_NO_DECORATIONS).ok().as_deref());

        Ok(Self {
            runtime_dir,
            disable_decorations,
        })
    }
}

/// A flag variable counts as set unless it is absent, empty, or `0`.
fn flag_enabled(value: Option<&str>) -> bool {
    match value {
        Some(v) => !v.is_empty() && v != "0",
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_flag_is_disabled() {
        assert!(!flag_enabled(None));
    }

    #[test]
    fn empty_and_zero_are_disabled() {
        assert!(!flag_enabled(Some("")));
        assert!(!flag_enabled(Some("0")));
    }

    #[test]
    fn any_other_value_enables() {
        assert!(flag_enabled(Some("1")));
        assert!(flag_enabled(Some("true")));
        assert!(flag_enabled(Some("yes")));
        // Only the exact string "0" disables; values merely starting with
        // a zero count as set.
        assert!(flag_enabled(Some("01")));
        assert!(flag_enabled(Some("0yes")));
    }
}
