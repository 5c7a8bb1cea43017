//! Buying engine thresholds. All durations are in engine ticks.
//! Loaded by merging defaults, then a TOML file, then environment overrides.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// File: ~/.config/swarm/buying.toml or /etc/swarm/buying.toml.
/// Env overrides: SWARM_INVITATION_TIMEOUT_TICKS, SWARM_MAX_INVITATION_ATTEMPTS,
/// SWARM_REQUEST_TIMEOUT_TICKS, SWARM_VALIDATION_GRACE_TICKS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuyingConfig {
    /// Ticks without enough joined sellers before invitations are sent again (default 10).
    #[serde(default = "default_invitation_timeout_ticks")]
    pub invitation_timeout_ticks: u64,
    /// Invitations a seller may leave unanswered before it is evicted (default 3).
    #[serde(default = "default_max_invitation_attempts")]
    pub max_invitation_attempts: u32,
    /// Ticks a piece request may stay unanswered (default 30).
    #[serde(default = "default_request_timeout_ticks")]
    pub request_timeout_ticks: u64,
    /// Ticks a delivered piece may wait for validation before the seller is paid anyway (default 5).
    #[serde(default = "default_validation_grace_ticks")]
    pub validation_grace_ticks: u64,
}

fn default_invitation_timeout_ticks() -> u64 {
    10
}
fn default_max_invitation_attempts() -> u32 {
    3
}
fn default_request_timeout_ticks() -> u64 {
    30
}
fn default_validation_grace_ticks() -> u64 {
    5
}

impl Default for BuyingConfig {
    fn default() -> Self {
        Self {
            invitation_timeout_ticks: default_invitation_timeout_ticks(),
            max_invitation_attempts: default_max_invitation_attempts(),
            request_timeout_ticks: default_request_timeout_ticks(),
            validation_grace_ticks: default_validation_grace_ticks(),
        }
    }
}

impl BuyingConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("invalid buying config")
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("parsing {}", path.display()))
    }

    /// Apply overrides from `lookup` (normally the process environment). Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let ticks = |key: &str| lookup(key).and_then(|s| s.parse::<u64>().ok());
        if let Some(v) = ticks("SWARM_INVITATION_TIMEOUT_TICKS") {
            self.invitation_timeout_ticks = v;
        }
        if let Some(v) = lookup("SWARM_MAX_INVITATION_ATTEMPTS").and_then(|s| s.parse().ok()) {
            self.max_invitation_attempts = v;
        }
        if let Some(v) = ticks("SWARM_REQUEST_TIMEOUT_TICKS") {
            self.request_timeout_ticks = v;
        }
        if let Some(v) = ticks("SWARM_VALIDATION_GRACE_TICKS") {
            self.validation_grace_ticks = v;
        }
    }
}

/// Load config: default, then the first config file found (if any), then env vars.
/// A config file that exists but fails to parse is reported and skipped.
pub fn load() -> BuyingConfig {
    let mut c = match config_paths().into_iter().find(|p| p.exists()) {
        Some(path) => BuyingConfig::from_path(&path).unwrap_or_else(|err| {
            tracing::warn!(error = %format!("{err:#}"), "ignoring buying config file");
            BuyingConfig::default()
        }),
        None => BuyingConfig::default(),
    };
    c.apply_overrides(|key| std::env::var(key).ok());
    c
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/swarm/buying.toml"));
    }
    out.push(PathBuf::from("/etc/swarm/buying.toml"));
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(
            BuyingConfig::from_toml_str("").unwrap(),
            BuyingConfig::default()
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let c = BuyingConfig::from_toml_str("request_timeout_ticks = 4").unwrap();
        assert_eq!(c.request_timeout_ticks, 4);
        assert_eq!(c.invitation_timeout_ticks, 10);
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(BuyingConfig::from_toml_str("request_timeout = 4").is_err());
    }

    #[test]
    fn overrides_replace_parseable_values() {
        let env: HashMap<&str, &str> = [
            ("SWARM_MAX_INVITATION_ATTEMPTS", "7"),
            ("SWARM_VALIDATION_GRACE_TICKS", "soon"),
        ]
        .into_iter()
        .collect();
        let mut c = BuyingConfig::default();
        c.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(c.max_invitation_attempts, 7);
        assert_eq!(c.validation_grace_ticks, 5);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = BuyingConfig::from_path(Path::new("/nonexistent/swarm/buying.toml"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("reading"));
    }
}
