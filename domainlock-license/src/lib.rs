//! Domain-bound licensing for domainlock deployments.
//!
//! This crate handles:
//! - Activation and deactivation of a license key against a remote authority
//! - Binding the license to one domain, or to every domain via `*`
//! - Periodic re-validation with a bounded grace period when the authority
//!   is unreachable
//! - A tamper-evident local record of the last verdict
//!
//! # Design Principles
//!
//! - **Single gate**: hosts call [`ProtectionGate::authorize`] and receive a
//!   [`Decision`]; no internal error type reaches host code
//! - **Fail closed**: missing, corrupt or tampered records deny
//! - **Rejections are final**: only an unreachable authority earns grace
//! - **Explicit configuration**: every component is built from a
//!   [`LicenseConfig`] value
//!
//! # Verification File
//!
//! The record is stored as JSON with the fields `license_key`, `domain`,
//! `status`, `hash`, `last_check`, `validation_type` and `expires`. The
//! `hash` is an HMAC-SHA256 over all other fields, keyed by the configured
//! salt.

mod client;
mod clock;
mod config;
mod domain;
mod error;
mod gate;
mod integrity;
mod policy;
mod record;
mod store;

pub use client::{
    parse_expiry, Action, Authority, AuthorityClient, HttpAuthority, ServerResponse,
    VerificationRequest,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    LicenseConfig, RecheckMode, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_GRACE_PERIOD_SECS,
    DEFAULT_TERM_DAYS,
};
pub use domain::{RequestContext, CLIENT_IP_HEADERS};
pub use error::{LicenseError, LicenseResult};
pub use gate::{Decision, DenyReason, ProtectionGate};
pub use integrity::IntegrityGuard;
pub use policy::{GracePeriodPolicy, PolicyState, RecheckFailure};
pub use record::{LicenseRecord, LicenseStatus, ValidationType, Verdict};
pub use store::{StoreLock, VerificationStore};

pub use domainlock_types::{Domain, LicenseKey, UnixTimestamp};
