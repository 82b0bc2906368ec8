//! Recheck and grace-period policy.
//!
//! Decides, from a cached record and the outcome of a recheck, which state the
//! license is in. The policy never touches the network or the filesystem; the
//! [`crate::ProtectionGate`] drives it.

use crate::config::LicenseConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::integrity::IntegrityGuard;
use crate::record::LicenseRecord;
use domainlock_types::{Domain, UnixTimestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the license state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyState {
    /// Cached verdict is valid and fresh.
    Verified,
    /// Cached verdict is valid but the authority must be asked again.
    PendingRecheck,
    /// The authority is unreachable but the last check is recent enough.
    Grace,
    /// The license is inactive until re-activated.
    Expired,
    /// The record failed its tamper check.
    IntegrityFailed,
    /// The record is bound to a different domain.
    DomainMismatch,
}

impl fmt::Display for PolicyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Verified => "verified",
            Self::PendingRecheck => "pending_recheck",
            Self::Grace => "grace",
            Self::Expired => "expired",
            Self::IntegrityFailed => "integrity_failed",
            Self::DomainMismatch => "domain_mismatch",
        };
        f.write_str(s)
    }
}

impl PolicyState {
    /// The terminal state a failed assessment or recheck leads to.
    #[must_use]
    pub fn for_error(err: &LicenseError) -> Self {
        match err {
            LicenseError::Integrity(_) => Self::IntegrityFailed,
            LicenseError::DomainMismatch { .. } => Self::DomainMismatch,
            _ => Self::Expired,
        }
    }
}

/// What to do after a failed recheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecheckFailure {
    /// Keep serving the cached verdict, untouched.
    Grace,
    /// Force the record inactive and deny.
    Expire,
}

/// Timing rules for rechecks and the grace window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePeriodPolicy {
    check_interval_secs: i64,
    grace_period_secs: i64,
}

impl GracePeriodPolicy {
    #[must_use]
    pub fn new(check_interval_secs: u64, grace_period_secs: u64) -> Self {
        Self {
            check_interval_secs: i64::try_from(check_interval_secs).unwrap_or(i64::MAX),
            grace_period_secs: i64::try_from(grace_period_secs).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn from_config(config: &LicenseConfig) -> Self {
        Self::new(config.check_interval_secs, config.grace_period_secs)
    }

    /// Classifies a cached record for a request on `requested`.
    ///
    /// Returns [`PolicyState::Verified`] or [`PolicyState::PendingRecheck`].
    /// A record past its `expires` is always due for a recheck, as is one
    /// whose last check lies in the future.
    ///
    /// # Errors
    ///
    /// - [`LicenseError::Integrity`] if the tamper hash does not match
    /// - [`LicenseError::DomainMismatch`] if the binding excludes `requested`
    /// - [`LicenseError::Inactive`] if the record is inactive
    pub fn assess(
        &self,
        record: &LicenseRecord,
        requested: &Domain,
        guard: &IntegrityGuard,
        now: UnixTimestamp,
    ) -> LicenseResult<PolicyState> {
        guard.verify(record)?;

        if !record.domain().permits(requested) {
            return Err(LicenseError::DomainMismatch {
                bound: record.domain().to_string(),
                actual: requested.to_string(),
            });
        }

        if !record.is_active() {
            return Err(LicenseError::Inactive);
        }

        let age = record.age(now);
        let due = age < 0 || age > self.check_interval_secs || now >= record.expires();
        Ok(if due {
            PolicyState::PendingRecheck
        } else {
            PolicyState::Verified
        })
    }

    /// Returns true if an active record may still be served without the authority.
    #[must_use]
    pub fn within_grace(&self, record: &LicenseRecord, now: UnixTimestamp) -> bool {
        let age = record.age(now);
        record.is_active() && (0..self.grace_period_secs).contains(&age)
    }

    /// Decides what a failed recheck means.
    ///
    /// Only transport and protocol failures are grace-eligible, and only when
    /// there is cached history inside the grace window. An explicit rejection
    /// always expires the license.
    #[must_use]
    pub fn on_recheck_failure(
        &self,
        record: Option<&LicenseRecord>,
        err: &LicenseError,
        now: UnixTimestamp,
    ) -> RecheckFailure {
        match record {
            Some(record) if err.is_grace_eligible() && self.within_grace(record, now) => {
                RecheckFailure::Grace
            }
            _ => RecheckFailure::Expire,
        }
    }
}
