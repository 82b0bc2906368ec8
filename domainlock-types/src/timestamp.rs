//! Wall-clock timestamps in whole seconds since the Unix epoch.
//!
//! The verification file stores `last_check` and `expires` as plain unix
//! seconds, so this type serializes transparently as an integer.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTimestamp(i64);

impl UnixTimestamp {
    /// The epoch itself.
    pub const EPOCH: Self = Self(0);

    /// Creates a timestamp at the current time.
    ///
    /// A system clock set before the epoch reads as the epoch.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self(secs)
    }

    /// Creates a timestamp from seconds since the epoch.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Creates a timestamp from seconds, rejecting negative values.
    ///
    /// # Errors
    ///
    /// Returns an error if `secs` is before the epoch.
    pub fn try_from_secs(secs: i64) -> Result<Self, Error> {
        if secs < 0 {
            return Err(Error::InvalidTimestamp(format!(
                "{secs} is before the unix epoch"
            )));
        }
        Ok(Self(secs))
    }

    /// Returns the number of seconds since the epoch.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// Seconds elapsed from `earlier` to `self`. Negative if `earlier` is in the future.
    #[must_use]
    pub const fn seconds_since(&self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns this timestamp shifted forward by `secs`.
    #[must_use]
    pub const fn plus_secs(&self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

impl Default for UnixTimestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
