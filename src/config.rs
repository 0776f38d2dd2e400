//! Runtime configuration (§6 expansion): a small, optional `clidef.toml`
//! overlay on top of documented defaults. Absence of the file is not an
//! error — every field falls back to the value baked into [`Ctx::new`].

use crate::error::ClidefError;
use serde::Deserialize;
use std::path::Path;

fn default_parallel_cpu_multiplier() -> u32 {
    2
}

fn default_sigterm_grace_ms() -> u64 {
    5000
}

/// Deserialized straight from `clidef.toml`. Every field is optional so a
/// partial file (or none at all) still produces sane defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    #[serde(default = "default_parallel_cpu_multiplier")]
    pub parallel_cpu_multiplier: u32,
    #[serde(default = "default_sigterm_grace_ms")]
    pub sigterm_grace_ms: u64,
    #[serde(default)]
    pub no_color: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            parallel_cpu_multiplier: default_parallel_cpu_multiplier(),
            sigterm_grace_ms: default_sigterm_grace_ms(),
            no_color: false,
        }
    }
}

impl RuntimeConfig {
    /// SIGTERM→SIGKILL grace period never exceeds the 5s ceiling (§5); a
    /// config file may only shorten it.
    pub fn sigterm_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sigterm_grace_ms.min(5000))
    }

    /// Loads `clidef.toml` from `path` if it exists, else returns defaults.
    /// A present-but-unparseable file is a load-time [`ClidefError::Config`].
    pub fn load(path: &Path) -> Result<Self, ClidefError> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|e| ClidefError::Config {
                message: format!("failed to parse {}: {e}", path.display()),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(e) => Err(ClidefError::io(
                format!("failed to read {}", path.display()),
                Some(path.to_path_buf()),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = RuntimeConfig::load(Path::new("/nonexistent/clidef.toml")).unwrap();
        assert_eq!(config.parallel_cpu_multiplier, 2);
        assert_eq!(config.sigterm_grace_ms, 5000);
    }

    #[test]
    fn partial_file_fills_in_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clidef.toml");
        std::fs::write(&path, "parallel_cpu_multiplier = 4\n").unwrap();
        let config = RuntimeConfig::load(&path).unwrap();
        assert_eq!(config.parallel_cpu_multiplier, 4);
        assert_eq!(config.sigterm_grace_ms, 5000);
    }

    #[test]
    fn grace_period_is_clamped_to_five_seconds() {
        let config = RuntimeConfig {
            sigterm_grace_ms: 60_000,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.sigterm_grace(), std::time::Duration::from_secs(5));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clidef.toml");
        std::fs::write(&path, "not = [valid\n").unwrap();
        assert!(RuntimeConfig::load(&path).is_err());
    }
}
