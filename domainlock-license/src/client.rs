//! Remote licensing authority client.
//!
//! The wire protocol is a form-encoded POST with an `action` field and a JSON
//! answer carrying at least `status`. [`Authority`] is the transport seam;
//! [`AuthorityClient`] applies per-action timeouts and turns answers into
//! [`Verdict`]s or errors.

use crate::config::LicenseConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::record::{ValidationType, Verdict};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, DateTime};
use domainlock_types::{Domain, LicenseKey, UnixTimestamp};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Operation requested from the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Activate,
    Verify,
    Deactivate,
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Verify => "verify",
            Self::Deactivate => "deactivate",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form body sent to the authority.
#[derive(Clone, Serialize)]
pub struct VerificationRequest {
    pub action: Action,
    pub license_key: String,
    pub domain: String,
    #[serde(rename = "ip")]
    pub client_ip: String,
    pub api_key: String,
    pub product: String,
}

impl VerificationRequest {
    #[must_use]
    pub fn new(
        action: Action,
        license_key: &LicenseKey,
        domain: &Domain,
        client_ip: &str,
        config: &LicenseConfig,
    ) -> Self {
        Self {
            action,
            license_key: license_key.as_str().to_string(),
            domain: domain.as_str().to_string(),
            client_ip: client_ip.to_string(),
            api_key: config.api_key.clone(),
            product: config.product.clone(),
        }
    }
}

impl fmt::Debug for VerificationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationRequest")
            .field("action", &self.action)
            .field("domain", &self.domain)
            .field("ip", &self.client_ip)
            .field("product", &self.product)
            .finish_non_exhaustive()
    }
}

/// JSON answer from the authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub validation_type: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
}

impl ServerResponse {
    /// Parses a response body.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Protocol`] if the body is not JSON or has no `status`.
    pub fn parse(body: &str) -> LicenseResult<Self> {
        let response: Self = serde_json::from_str(body).map_err(|e| {
            LicenseError::Protocol(format!("invalid response from license server: {e}"))
        })?;
        if response.status.is_none() {
            return Err(LicenseError::Protocol(
                "invalid response from license server: missing status".to_string(),
            ));
        }
        Ok(response)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }

    /// Converts a success answer into a [`Verdict`].
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Rejected`] carrying the authority's message when
    /// `status` is anything other than `success`.
    pub fn into_verdict(self, action: Action) -> LicenseResult<Verdict> {
        if !self.is_success() {
            let message = self
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("license {action} failed"));
            return Err(LicenseError::Rejected { message });
        }

        let expires = match self.expires.as_deref() {
            Some(raw) => {
                let parsed = parse_expiry(raw);
                if parsed.is_none() {
                    warn!(expires = raw, "unparsable expiry from license server, using default term");
                }
                parsed
            }
            None => None,
        };

        Ok(Verdict {
            validation_type: self
                .validation_type
                .as_deref()
                .map(ValidationType::from_wire)
                .unwrap_or_default(),
            expires,
            message: self.message,
        })
    }
}

/// Parses an authority expiry: RFC 3339, `YYYY-MM-DD HH:MM:SS`, or `YYYY-MM-DD`
/// (midnight UTC). Naive values are read as UTC.
#[must_use]
pub fn parse_expiry(raw: &str) -> Option<UnixTimestamp> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(UnixTimestamp::from_secs(dt.timestamp()));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(UnixTimestamp::from_secs(dt.and_utc().timestamp()));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| UnixTimestamp::from_secs(dt.and_utc().timestamp()))
}

/// Transport to the licensing authority.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Sends one request and returns the parsed answer.
    ///
    /// Implementations must report unreachable endpoints and non-200 answers
    /// as [`LicenseError::Transport`] and unusable bodies as
    /// [`LicenseError::Protocol`]. They must not interpret `status`.
    async fn send(
        &self,
        request: &VerificationRequest,
        timeout: Duration,
    ) -> LicenseResult<ServerResponse>;
}

/// HTTP(S) implementation of [`Authority`].
pub struct HttpAuthority {
    endpoint: String,
    client: Client,
}

impl HttpAuthority {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>) -> LicenseResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("domainlock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LicenseError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Authority for HttpAuthority {
    async fn send(
        &self,
        request: &VerificationRequest,
        timeout: Duration,
    ) -> LicenseResult<ServerResponse> {
        debug!(endpoint = %self.endpoint, ?request, "contacting license server");

        let response = self
            .client
            .post(&self.endpoint)
            .form(request)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LicenseError::Transport(format!(
                "API returned HTTP code {}",
                status.as_u16()
            )));
        }

        let body = response.text().await?;
        debug!(action = %request.action, body = %body, "license server response");
        ServerResponse::parse(&body)
    }
}

/// Remote operations with per-action timeouts and response interpretation.
#[derive(Clone)]
pub struct AuthorityClient {
    authority: Arc<dyn Authority>,
    config: Arc<LicenseConfig>,
}

impl AuthorityClient {
    pub fn new(authority: Arc<dyn Authority>, config: Arc<LicenseConfig>) -> Self {
        Self { authority, config }
    }

    /// Builds an HTTP client against the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn http(config: Arc<LicenseConfig>) -> LicenseResult<Self> {
        let authority = HttpAuthority::new(config.endpoint_url.clone())?;
        Ok(Self::new(Arc::new(authority), config))
    }

    fn request(
        &self,
        action: Action,
        key: &LicenseKey,
        domain: &Domain,
        client_ip: &str,
    ) -> VerificationRequest {
        VerificationRequest::new(action, key, domain, client_ip, &self.config)
    }

    /// Asks the authority to bind `key` to `domain`.
    ///
    /// # Errors
    ///
    /// Transport, protocol, or rejection errors from the authority.
    pub async fn activate(
        &self,
        key: &LicenseKey,
        domain: &Domain,
        client_ip: &str,
    ) -> LicenseResult<Verdict> {
        let request = self.request(Action::Activate, key, domain, client_ip);
        let timeout = Duration::from_millis(self.config.activate_timeout_ms);
        let verdict = self
            .authority
            .send(&request, timeout)
            .await?
            .into_verdict(Action::Activate)?;
        info!(%domain, key = %key.masked(), "license activated by server");
        Ok(verdict)
    }

    /// Asks the authority whether `key` is still valid for `domain`.
    ///
    /// # Errors
    ///
    /// Transport, protocol, or rejection errors from the authority.
    pub async fn verify(
        &self,
        key: &LicenseKey,
        domain: &Domain,
        client_ip: &str,
    ) -> LicenseResult<Verdict> {
        let request = self.request(Action::Verify, key, domain, client_ip);
        let timeout = Duration::from_millis(self.config.verify_timeout_ms);
        self.authority
            .send(&request, timeout)
            .await?
            .into_verdict(Action::Verify)
    }

    /// Tells the authority to release `key` from `domain`. Best effort.
    ///
    /// # Errors
    ///
    /// Returns whatever the authority call failed with; callers proceed with
    /// local deletion regardless.
    pub async fn deactivate(
        &self,
        key: &LicenseKey,
        domain: &Domain,
        client_ip: &str,
    ) -> LicenseResult<()> {
        let request = self.request(Action::Deactivate, key, domain, client_ip);
        let timeout = Duration::from_millis(self.config.deactivate_timeout_ms);
        self.authority
            .send(&request, timeout)
            .await?
            .into_verdict(Action::Deactivate)
            .map(|_| ())
    }
}
