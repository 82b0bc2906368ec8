//! The persisted license record and the authority verdicts that produce it.

use crate::integrity::IntegrityGuard;
use domainlock_types::{Domain, LicenseKey, UnixTimestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Whether the license currently permits the deployment to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Inactive,
}

impl LicenseStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the authority validated the license on the last successful check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationType {
    #[default]
    Automatic,
    Manual,
}

impl ValidationType {
    /// Parses the authority's `validation_type` field. Anything other than
    /// `manual` is treated as automatic.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("manual") {
            Self::Manual
        } else {
            Self::Automatic
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }
}

/// A successful answer from the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// How the authority validated the license.
    pub validation_type: ValidationType,
    /// Expiry reported by the authority, if any.
    pub expires: Option<UnixTimestamp>,
    /// Free-form message from the authority.
    pub message: Option<String>,
}

impl Verdict {
    /// Expiry to persist: the reported one, or `now + default_term`.
    #[must_use]
    pub fn expiry_from(&self, now: UnixTimestamp, default_term: Duration) -> UnixTimestamp {
        self.expires
            .unwrap_or_else(|| now.plus_secs(default_term.as_secs() as i64))
    }
}

/// The local record of the last known license verdict.
///
/// Fields are private: every change goes through an operation that reseals
/// the record with the [`IntegrityGuard`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    license_key: LicenseKey,
    domain: Domain,
    status: LicenseStatus,
    hash: String,
    last_check: UnixTimestamp,
    validation_type: ValidationType,
    expires: UnixTimestamp,
}

impl LicenseRecord {
    /// Creates a fresh, active, sealed record from an activation verdict.
    #[must_use]
    pub fn issue(
        license_key: LicenseKey,
        domain: Domain,
        verdict: &Verdict,
        now: UnixTimestamp,
        default_term: Duration,
        guard: &IntegrityGuard,
    ) -> Self {
        let mut record = Self {
            license_key,
            domain,
            status: LicenseStatus::Active,
            hash: String::new(),
            last_check: now,
            validation_type: verdict.validation_type,
            expires: verdict.expiry_from(now, default_term),
        };
        guard.seal(&mut record);
        record
    }

    /// Applies a successful `verify` verdict.
    pub fn refresh(
        &mut self,
        verdict: &Verdict,
        now: UnixTimestamp,
        default_term: Duration,
        guard: &IntegrityGuard,
    ) {
        self.status = LicenseStatus::Active;
        self.touch(now);
        self.validation_type = verdict.validation_type;
        self.expires = verdict.expiry_from(now, default_term);
        guard.seal(self);
    }

    /// Applies a rejection or an expired grace window.
    pub fn mark_inactive(&mut self, now: UnixTimestamp, guard: &IntegrityGuard) {
        self.status = LicenseStatus::Inactive;
        self.touch(now);
        guard.seal(self);
    }

    fn touch(&mut self, now: UnixTimestamp) {
        self.last_check = self.last_check.max(now);
    }

    #[must_use]
    pub fn license_key(&self) -> &LicenseKey {
        &self.license_key
    }

    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    #[must_use]
    pub fn status(&self) -> LicenseStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == LicenseStatus::Active
    }

    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    #[must_use]
    pub fn last_check(&self) -> UnixTimestamp {
        self.last_check
    }

    #[must_use]
    pub fn validation_type(&self) -> ValidationType {
        self.validation_type
    }

    #[must_use]
    pub fn expires(&self) -> UnixTimestamp {
        self.expires
    }

    /// Seconds since the last check, as seen at `now`.
    #[must_use]
    pub fn age(&self, now: UnixTimestamp) -> i64 {
        now.seconds_since(self.last_check)
    }

    pub(crate) fn set_hash(&mut self, hash: String) {
        self.hash = hash;
    }
}
