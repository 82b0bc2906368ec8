//! Tamper evidence for the verification file.
//!
//! The hash is an HMAC-SHA256 keyed by the configured salt, computed over a
//! length-prefixed encoding of every persisted field except the hash itself.
//! A record can only be produced or altered by code holding the salt.

use crate::error::{LicenseError, LicenseResult};
use crate::record::LicenseRecord;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Domain separator mixed into every digest.
const RECORD_TAG: &[u8] = b"domainlock/license-record/v1";

/// Computes and checks record tamper hashes.
#[derive(Clone)]
pub struct IntegrityGuard {
    keyed: HmacSha256,
}

impl IntegrityGuard {
    /// Creates a guard keyed by `salt`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the salt is empty.
    pub fn new(salt: impl AsRef<[u8]>) -> LicenseResult<Self> {
        let salt = salt.as_ref();
        if salt.is_empty() {
            return Err(LicenseError::Config("tamper-hash salt is not set".to_string()));
        }
        let keyed = HmacSha256::new_from_slice(salt)
            .map_err(|e| LicenseError::Config(format!("invalid tamper-hash salt: {e}")))?;
        Ok(Self { keyed })
    }

    /// Computes the hex-encoded tamper hash for `record`, ignoring its stored hash.
    #[must_use]
    pub fn compute_hash(&self, record: &LicenseRecord) -> String {
        let mut mac = self.keyed.clone();
        update_field(&mut mac, RECORD_TAG);
        update_field(&mut mac, record.license_key().as_str().as_bytes());
        update_field(&mut mac, record.domain().as_str().as_bytes());
        update_field(&mut mac, record.status().as_str().as_bytes());
        update_field(&mut mac, &record.last_check().as_secs().to_be_bytes());
        update_field(&mut mac, record.validation_type().as_str().as_bytes());
        update_field(&mut mac, &record.expires().as_secs().to_be_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Stores a fresh hash on `record`.
    pub fn seal(&self, record: &mut LicenseRecord) {
        let hash = self.compute_hash(record);
        record.set_hash(hash);
    }

    /// Checks the stored hash against a recomputed one in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Integrity`] on any mismatch, including a stored
    /// hash that is not valid hex.
    pub fn verify(&self, record: &LicenseRecord) -> LicenseResult<()> {
        let expected = self.compute_hash(record);
        let stored = hex::decode(record.hash()).unwrap_or_default();
        let computed = hex::decode(&expected).unwrap_or_default();

        let matches = stored.len() == computed.len() && bool::from(stored.ct_eq(&computed));
        if matches {
            return Ok(());
        }

        warn!(
            target: "domainlock::security",
            domain = %record.domain(),
            key = %record.license_key().masked(),
            "verification file has been tampered with"
        );
        Err(LicenseError::Integrity(
            "verification file has been tampered with".to_string(),
        ))
    }
}

fn update_field(mac: &mut HmacSha256, bytes: &[u8]) {
    mac.update(&(bytes.len() as u64).to_be_bytes());
    mac.update(bytes);
}
