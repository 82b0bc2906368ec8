//! Core type definitions for domainlock.
//!
//! This crate defines the small value types shared by the license core and
//! its host integrations:
//! - License keys (opaque handles issued by the licensing authority)
//! - Domains (canonicalized request hosts, or the `*` wildcard binding)
//! - Unix timestamps in whole seconds
//!
//! Behaviour that talks to the network or the filesystem belongs in
//! `domainlock-license`, not here.

mod ids;
mod timestamp;

pub use ids::{Domain, LicenseKey};
pub use timestamp::UnixTimestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when constructing the value types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid license key: {0}")]
    InvalidLicenseKey(String),

    #[error("invalid domain: {0}")]
    InvalidDomain(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
