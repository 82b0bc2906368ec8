//! Identifier types used throughout domainlock.
//!
//! Both types are thin string newtypes. Their constructors enforce the
//! canonical form, so two values compare equal exactly when the authority
//! would treat them as the same license or the same site.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An opaque license key issued by the licensing authority.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Parses a license key, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty after trimming.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidLicenseKey(
                "license key is missing or empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the raw key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a form of the key that is safe to write to logs.
    #[must_use]
    pub fn masked(&self) -> String {
        let visible: String = self.0.chars().take(4).collect();
        if self.0.chars().count() <= 4 {
            "****".to_string()
        } else {
            format!("{visible}****")
        }
    }
}

impl fmt::Debug for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LicenseKey").field(&self.masked()).finish()
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LicenseKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A canonical domain, or the wildcard binding `*`.
///
/// Canonical means lower-cased, trimmed, without a leading `www.` and without
/// a trailing `:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// The literal wildcard that matches every domain.
    pub const WILDCARD: &'static str = "*";

    /// Derives the canonical domain from a raw `Host` header value.
    ///
    /// Never fails. An empty or whitespace-only host yields the empty domain,
    /// which matches no binding.
    #[must_use]
    pub fn from_host(host: &str) -> Self {
        let mut domain = host.trim().to_ascii_lowercase();

        if domain.starts_with("www.") {
            domain.drain(..4);
        }

        if let Some(idx) = domain.rfind(':') {
            let port = &domain[idx + 1..];
            if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
                domain.truncate(idx);
            }
        }

        Self(domain.trim().to_string())
    }

    /// Returns the wildcard binding.
    #[must_use]
    pub fn wildcard() -> Self {
        Self(Self::WILDCARD.to_string())
    }

    /// Parses a binding: either `*` or a host that is canonicalized.
    ///
    /// # Errors
    ///
    /// Returns an error if the host canonicalizes to the empty domain.
    pub fn parse_binding(s: &str) -> Result<Self, Error> {
        if s.trim() == Self::WILDCARD {
            return Ok(Self::wildcard());
        }
        let domain = Self::from_host(s);
        if domain.is_empty() {
            return Err(Error::InvalidDomain(
                "domain name could not be determined".to_string(),
            ));
        }
        Ok(domain)
    }

    /// Returns true if this is the `*` binding.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::WILDCARD
    }

    /// Returns true if this is the empty domain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if a record bound to `self` is valid for `requested`.
    ///
    /// The empty domain never matches, not even a wildcard binding.
    #[must_use]
    pub fn permits(&self, requested: &Domain) -> bool {
        if requested.is_empty() {
            return false;
        }
        self.is_wildcard() || self == requested
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_binding(s)
    }
}
