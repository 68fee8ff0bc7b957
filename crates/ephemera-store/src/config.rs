use std::path::PathBuf;
use std::time::Duration;

use ephemera_types::{IdSpec, NamePolicy};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// What to do with backing files found when the store opens.
///
/// Expiry timers live in memory only, so objects written before a restart
/// have no pending expiry until something reclaims them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupPolicy {
    /// Delete files older than the retention window and re-schedule the rest
    /// using their modification time.
    #[default]
    Sweep,
    /// Leave existing files alone. They stay on disk until removed by hand.
    Ignore,
}

/// Longest accepted retention window: one year.
pub const MAX_RETENTION_SECS: u64 = 365 * 24 * 60 * 60;

/// Longest accepted delay before a deletion retry: one hour.
pub const MAX_DELETE_RETRY_DELAY_MS: u64 = 60 * 60 * 1000;

/// Configuration for the [`EphemeralStore`](crate::EphemeralStore).
///
/// Fixed at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory owned exclusively by the store.
    pub directory: PathBuf,
    /// Retention window in seconds (default: 300).
    pub retention_secs: u64,
    /// Random bytes per object id (default: 16).
    pub id_bytes: usize,
    /// Largest accepted payload in bytes (default: 32 MiB).
    pub max_object_size: u64,
    /// Extensions display names may keep.
    pub allowed_extensions: Vec<String>,
    /// Extension forced onto names without an allowed one.
    pub default_extension: String,
    /// Maximum display-name length.
    pub max_name_len: usize,
    /// Handling of files left over from a previous run.
    pub startup: StartupPolicy,
    /// Upper bound on how long the expiry loop sleeps between passes.
    pub tick_interval_ms: u64,
    /// Delay before the single retry of a failed deletion.
    pub delete_retry_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let names = NamePolicy::default();
        Self {
            directory: std::env::temp_dir().join("ephemera"),
            retention_secs: 300,
            id_bytes: IdSpec::MIN_BYTES,
            max_object_size: 32 * 1024 * 1024, // 32 MiB
            allowed_extensions: names.allowed_extensions,
            default_extension: names.default_extension,
            max_name_len: names.max_len,
            startup: StartupPolicy::default(),
            tick_interval_ms: 1_000,
            delete_retry_delay_ms: 5_000,
        }
    }
}

impl StoreConfig {
    /// Config rooted at `directory` with every other field defaulted.
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.retention_secs == 0 {
            return Err(StoreError::Config("retention_secs must be positive".into()));
        }
        if self.retention_secs > MAX_RETENTION_SECS {
            return Err(StoreError::Config(format!(
                "retention_secs must be at most {MAX_RETENTION_SECS}"
            )));
        }
        if self.delete_retry_delay_ms > MAX_DELETE_RETRY_DELAY_MS {
            return Err(StoreError::Config(format!(
                "delete_retry_delay_ms must be at most {MAX_DELETE_RETRY_DELAY_MS}"
            )));
        }
        if self.max_object_size == 0 {
            return Err(StoreError::Config("max_object_size must be positive".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(StoreError::Config("tick_interval_ms must be positive".into()));
        }
        self.id_spec()?;
        self.name_policy().validate()?;
        Ok(())
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn delete_retry_delay(&self) -> Duration {
        Duration::from_millis(self.delete_retry_delay_ms)
    }

    pub fn id_spec(&self) -> StoreResult<IdSpec> {
        Ok(IdSpec::new(self.id_bytes)?)
    }

    pub fn name_policy(&self) -> NamePolicy {
        NamePolicy {
            allowed_extensions: self
                .allowed_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            default_extension: self.default_extension.to_ascii_lowercase(),
            max_len: self.max_name_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.retention(), Duration::from_secs(300));
        assert_eq!(c.id_bytes, 16);
        assert_eq!(c.max_object_size, 32 * 1024 * 1024);
        assert_eq!(c.startup, StartupPolicy::Sweep);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn zero_retention_is_rejected() {
        let c = StoreConfig {
            retention_secs: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(c.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn retention_is_bounded() {
        let at_max = StoreConfig {
            retention_secs: MAX_RETENTION_SECS,
            ..StoreConfig::default()
        };
        assert!(at_max.validate().is_ok());

        for retention_secs in [MAX_RETENTION_SECS + 1, 9_000_000_000_000, u64::MAX] {
            let c = StoreConfig {
                retention_secs,
                ..StoreConfig::default()
            };
            assert!(matches!(c.validate(), Err(StoreError::Config(_))), "{retention_secs}");
        }
    }

    #[test]
    fn retry_delay_is_bounded() {
        let c = StoreConfig {
            delete_retry_delay_ms: MAX_DELETE_RETRY_DELAY_MS + 1,
            ..StoreConfig::default()
        };
        assert!(matches!(c.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn narrow_ids_are_rejected() {
        let c = StoreConfig {
            id_bytes: 4,
            ..StoreConfig::default()
        };
        assert!(matches!(c.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn extensions_are_lowercased() {
        let c = StoreConfig {
            allowed_extensions: vec!["PDF".into(), "Txt".into()],
            default_extension: "PDF".into(),
            ..StoreConfig::default()
        };
        let policy = c.name_policy();
        assert_eq!(policy.allowed_extensions, vec!["pdf", "txt"]);
        assert_eq!(policy.default_extension, "pdf");
        assert!(c.validate().is_ok());
    }
}
