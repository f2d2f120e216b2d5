//! Path configuration for cineforge state.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variable (CINEFORGE_HOME)
//! 2. Default (~/.cineforge)
//!
//! Checkpoints live under `<home>/runs/<run-id>/`.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment variable overriding the state directory
pub const HOME_ENV: &str = "CINEFORGE_HOME";

/// Get the cineforge home directory (engine state)
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }

    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".cineforge"))
}

/// Get the runs directory (`$CINEFORGE_HOME/runs`)
pub fn runs_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join("runs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_dir_is_under_home() {
        let home = home_dir().unwrap();
        let runs = runs_dir().unwrap();
        assert!(runs.starts_with(&home));
        assert!(runs.ends_with("runs"));
    }
}
