//! Licensing configuration.
//!
//! Every component receives its settings from a [`LicenseConfig`] value passed
//! to its constructor; nothing is read from process-wide state.

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Seconds between authority rechecks (24 hours).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Seconds a previously valid verdict survives an unreachable authority (7 days).
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;

/// License term assumed when the authority omits `expires`.
pub const DEFAULT_TERM_DAYS: u64 = 365;

/// How a due recheck is scheduled relative to the authorization decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecheckMode {
    /// Contact the authority before returning the decision.
    #[default]
    Inline,
    /// Serve the grace verdict immediately and recheck on a spawned task.
    /// Falls back to inline once the grace window has run out.
    Background,
}

/// Configuration for the licensing subsystem.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Licensing authority endpoint (form POST target).
    pub endpoint_url: String,
    /// API key identifying this product line to the authority.
    pub api_key: String,
    /// Product name sent with every request.
    pub product: String,
    /// Secret used to key the tamper hash.
    pub salt: String,
    /// License key. When unset, the key stored in the verification file is used.
    pub license_key: Option<String>,
    /// Path of the local verification file.
    pub verification_file: PathBuf,
    /// Seconds between authority rechecks.
    pub check_interval_secs: u64,
    /// Seconds an unreachable authority is tolerated after the last check.
    pub grace_period_secs: u64,
    /// License term in days when the authority omits `expires`.
    pub default_term_days: u64,
    /// Timeout for `activate` calls, in milliseconds.
    pub activate_timeout_ms: u64,
    /// Timeout for `verify` calls, in milliseconds.
    pub verify_timeout_ms: u64,
    /// Timeout for `deactivate` calls, in milliseconds.
    pub deactivate_timeout_ms: u64,
    /// Recheck scheduling.
    pub recheck_mode: RecheckMode,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            api_key: String::new(),
            product: "default".to_string(),
            salt: String::new(),
            license_key: None,
            verification_file: default_verification_file(),
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            default_term_days: DEFAULT_TERM_DAYS,
            activate_timeout_ms: 30_000,
            verify_timeout_ms: 30_000,
            deactivate_timeout_ms: 10_000,
            recheck_mode: RecheckMode::Inline,
        }
    }
}

impl LicenseConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> LicenseResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LicenseError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Checks the settings every component depends on.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] naming the first invalid field.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.endpoint_url.trim().is_empty() {
            return Err(LicenseError::Config("endpoint_url is not set".to_string()));
        }
        if self.salt.is_empty() {
            return Err(LicenseError::Config("salt is not set".to_string()));
        }
        if self.grace_period_secs < self.check_interval_secs {
            return Err(LicenseError::Config(
                "grace_period_secs must not be shorter than check_interval_secs".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    #[must_use]
    pub fn default_term(&self) -> Duration {
        Duration::from_secs(self.default_term_days * 24 * 60 * 60)
    }
}

impl fmt::Debug for LicenseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("api_key", &"<redacted>")
            .field("product", &self.product)
            .field("salt", &"<redacted>")
            .field("license_key", &self.license_key.as_ref().map(|_| "<redacted>"))
            .field("verification_file", &self.verification_file)
            .field("check_interval_secs", &self.check_interval_secs)
            .field("grace_period_secs", &self.grace_period_secs)
            .field("default_term_days", &self.default_term_days)
            .field("activate_timeout_ms", &self.activate_timeout_ms)
            .field("verify_timeout_ms", &self.verify_timeout_ms)
            .field("deactivate_timeout_ms", &self.deactivate_timeout_ms)
            .field("recheck_mode", &self.recheck_mode)
            .finish()
    }
}

/// `<data dir>/domainlock/verification.json`, or the working directory when
/// the platform has no data directory.
fn default_verification_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("domainlock")
        .join("verification.json")
}
