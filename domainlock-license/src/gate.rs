//! The protection gate: the single licensing call a host makes.
//!
//! `authorize` loads the verification record, checks its integrity and
//! binding, consults the grace policy, rechecks with the authority when due,
//! persists the outcome, and folds everything into a [`Decision`]. It fails
//! closed: every error is a deny.

use crate::client::{Authority, AuthorityClient};
use crate::clock::{Clock, SystemClock};
use crate::config::{LicenseConfig, RecheckMode};
use crate::domain::RequestContext;
use crate::error::{LicenseError, LicenseResult};
use crate::integrity::IntegrityGuard;
use crate::policy::{GracePeriodPolicy, PolicyState, RecheckFailure};
use crate::record::LicenseRecord;
use crate::store::{StoreLock, VerificationStore};
use domainlock_types::{Domain, LicenseKey, UnixTimestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a request was denied. Meant for operator logs, not end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DenyReason {
    /// No license key, or no domain to bind to.
    Config(String),
    /// The verification file was edited or is corrupt.
    Integrity,
    /// The license is bound to another domain.
    DomainMismatch { bound: String, actual: String },
    /// The license is inactive until re-activated.
    Inactive,
    /// The authority explicitly denied the license.
    Rejected(String),
    /// The authority could not be consulted and no grace applies.
    Unreachable(String),
    /// The verification file could not be read or written.
    Storage(String),
}

impl From<&LicenseError> for DenyReason {
    fn from(err: &LicenseError) -> Self {
        match err {
            LicenseError::Config(msg) => Self::Config(msg.clone()),
            LicenseError::Integrity(_) | LicenseError::Serialization(_) => Self::Integrity,
            LicenseError::DomainMismatch { bound, actual } => Self::DomainMismatch {
                bound: bound.clone(),
                actual: actual.clone(),
            },
            LicenseError::Inactive => Self::Inactive,
            LicenseError::Rejected { message } => Self::Rejected(message.clone()),
            LicenseError::Transport(msg) | LicenseError::Protocol(msg) => {
                Self::Unreachable(msg.clone())
            }
            LicenseError::Storage(msg) => Self::Storage(msg.clone()),
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Integrity => f.write_str("license verification failed: record has been tampered with"),
            Self::DomainMismatch { .. } => f.write_str("this license is not valid for this domain"),
            Self::Inactive => f.write_str("license is inactive or has been revoked"),
            Self::Rejected(msg) => write!(f, "license rejected: {msg}"),
            Self::Unreachable(msg) => write!(f, "unable to contact license server: {msg}"),
            Self::Storage(msg) => write!(f, "license storage error: {msg}"),
        }
    }
}

/// Outcome of [`ProtectionGate::authorize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    /// Licensed.
    Allow,
    /// Licensed on the strength of a recent verdict; the authority was not
    /// reachable or is being consulted in the background.
    AllowGrace,
    /// Not licensed.
    Deny(DenyReason),
}

impl Decision {
    /// Returns true for `Allow` and `AllowGrace`.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow | Self::AllowGrace)
    }

    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Deny(reason) => Some(reason),
            _ => None,
        }
    }
}

struct GateInner {
    config: Arc<LicenseConfig>,
    store: VerificationStore,
    guard: IntegrityGuard,
    policy: GracePeriodPolicy,
    client: AuthorityClient,
    clock: Arc<dyn Clock>,
    recheck_in_flight: AtomicBool,
    background: Mutex<Option<JoinHandle<()>>>,
}

/// Licensing entry point for the host. Cheap to clone.
#[derive(Clone)]
pub struct ProtectionGate {
    inner: Arc<GateInner>,
}

impl ProtectionGate {
    /// Creates a gate talking HTTP to the configured endpoint on the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the configuration is incomplete.
    pub fn new(config: LicenseConfig) -> LicenseResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let client = AuthorityClient::http(Arc::clone(&config))?;
        Self::assemble(config, client, Arc::new(SystemClock))
    }

    /// Creates a gate with an explicit authority transport and clock.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the salt is missing.
    pub fn with_parts(
        config: LicenseConfig,
        authority: Arc<dyn Authority>,
        clock: Arc<dyn Clock>,
    ) -> LicenseResult<Self> {
        let config = Arc::new(config);
        let client = AuthorityClient::new(authority, Arc::clone(&config));
        Self::assemble(config, client, clock)
    }

    fn assemble(
        config: Arc<LicenseConfig>,
        client: AuthorityClient,
        clock: Arc<dyn Clock>,
    ) -> LicenseResult<Self> {
        let guard = IntegrityGuard::new(&config.salt)?;
        let store = VerificationStore::new(config.verification_file.clone());
        let policy = GracePeriodPolicy::from_config(&config);
        Ok(Self {
            inner: Arc::new(GateInner {
                config,
                store,
                guard,
                policy,
                client,
                clock,
                recheck_in_flight: AtomicBool::new(false),
                background: Mutex::new(None),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &LicenseConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &VerificationStore {
        &self.inner.store
    }

    /// Decides whether the deployment may serve a request for `ctx`.
    pub async fn authorize(&self, ctx: &RequestContext) -> Decision {
        match self.try_authorize(ctx).await {
            Ok(decision) => decision,
            Err(err) => {
                let state = PolicyState::for_error(&err);
                if err.is_grace_eligible() {
                    debug!(domain = %ctx.domain(), %state, "license check failed: {err}");
                } else {
                    warn!(domain = %ctx.domain(), %state, "license check failed: {err}");
                }
                Decision::Deny(DenyReason::from(&err))
            }
        }
    }

    async fn try_authorize(&self, ctx: &RequestContext) -> LicenseResult<Decision> {
        let now = self.inner.clock.now();

        if let Some(record) = self.load_record()? {
            let state = self
                .inner
                .policy
                .assess(&record, ctx.domain(), &self.inner.guard, now)?;
            if state == PolicyState::Verified {
                debug!(
                    domain = %ctx.domain(),
                    last_check = %record.last_check(),
                    "using cached verification"
                );
                return Ok(Decision::Allow);
            }

            if self.inner.config.recheck_mode == RecheckMode::Background
                && self.inner.policy.within_grace(&record, now)
            {
                self.spawn_recheck(ctx.clone()).await;
                return Ok(Decision::AllowGrace);
            }
        }

        self.recheck(ctx).await
    }

    /// Contacts the authority under the store lock and applies the outcome.
    async fn recheck(&self, ctx: &RequestContext) -> LicenseResult<Decision> {
        let _lock = self.lock_store().await?;
        let now = self.inner.clock.now();

        // Another worker may have refreshed the record while we waited.
        let record = self.load_record()?;
        if let Some(record) = &record {
            let state = self
                .inner
                .policy
                .assess(record, ctx.domain(), &self.inner.guard, now)?;
            if state == PolicyState::Verified {
                debug!(domain = %ctx.domain(), "record refreshed by another worker");
                return Ok(Decision::Allow);
            }
        } else if ctx.domain().is_empty() {
            return Err(LicenseError::Config(
                "domain name could not be determined".to_string(),
            ));
        }

        let key = self.resolve_key(record.as_ref())?;
        debug!(domain = %ctx.domain(), key = %key.masked(), "checking license with server");

        match self
            .inner
            .client
            .verify(&key, ctx.domain(), ctx.client_ip())
            .await
        {
            Ok(verdict) => {
                let default_term = self.inner.config.default_term();
                let record = match record {
                    Some(mut record) => {
                        record.refresh(&verdict, now, default_term, &self.inner.guard);
                        record
                    }
                    None => LicenseRecord::issue(
                        key,
                        ctx.domain().clone(),
                        &verdict,
                        now,
                        default_term,
                        &self.inner.guard,
                    ),
                };
                self.inner.store.save(&record)?;
                info!(
                    domain = %ctx.domain(),
                    validation_type = record.validation_type().as_str(),
                    "license validated successfully"
                );
                Ok(Decision::Allow)
            }
            Err(err) => {
                match self
                    .inner
                    .policy
                    .on_recheck_failure(record.as_ref(), &err, now)
                {
                    RecheckFailure::Grace => {
                        debug!(
                            domain = %ctx.domain(),
                            state = %PolicyState::Grace,
                            "server check failed, using grace period: {err}"
                        );
                        Ok(Decision::AllowGrace)
                    }
                    RecheckFailure::Expire => {
                        if let Some(mut record) = record {
                            record.mark_inactive(now, &self.inner.guard);
                            self.inner.store.save(&record)?;
                            warn!(
                                domain = %ctx.domain(),
                                state = %PolicyState::Expired,
                                "license marked inactive: {err}"
                            );
                        }
                        Err(err)
                    }
                }
            }
        }
    }

    async fn spawn_recheck(&self, ctx: RequestContext) {
        // Held across the spawn so handles are stored in spawn order.
        let mut slot = self.inner.background.lock().await;
        if self.inner.recheck_in_flight.swap(true, Ordering::SeqCst) {
            debug!("background recheck already in flight");
            return;
        }

        let gate = self.clone();
        let handle = tokio::spawn(async move {
            match gate.recheck(&ctx).await {
                Ok(decision) => debug!(?decision, "background recheck finished"),
                Err(err) => debug!("background recheck failed: {err}"),
            }
            gate.inner.recheck_in_flight.store(false, Ordering::SeqCst);
        });
        *slot = Some(handle);
    }

    /// Waits for an in-flight background recheck, if any.
    pub async fn settle(&self) {
        let handle = self.inner.background.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("background recheck task failed: {e}");
            }
        }
    }

    /// Activates `key` for the request's domain and stores a fresh record.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the domain cannot be determined, or
    /// the authority's error. The existing record is untouched on failure.
    pub async fn activate(
        &self,
        ctx: &RequestContext,
        key: LicenseKey,
    ) -> LicenseResult<LicenseRecord> {
        if ctx.domain().is_empty() {
            return Err(LicenseError::Config(
                "domain name could not be determined".to_string(),
            ));
        }
        self.activate_binding(ctx, key, ctx.domain().clone()).await
    }

    /// Activates `key` with an explicit binding, such as the `*` wildcard.
    ///
    /// # Errors
    ///
    /// Returns the authority's error; the existing record is untouched.
    pub async fn activate_binding(
        &self,
        ctx: &RequestContext,
        key: LicenseKey,
        binding: Domain,
    ) -> LicenseResult<LicenseRecord> {
        if binding.is_empty() {
            return Err(LicenseError::Config(
                "domain name could not be determined".to_string(),
            ));
        }

        let _lock = self.lock_store().await?;
        info!(domain = %binding, key = %key.masked(), "activating license with server");
        let verdict = self
            .inner
            .client
            .activate(&key, &binding, ctx.client_ip())
            .await?;

        // Only a sealed record for the same key may hold back the clock.
        let previous = self
            .inner
            .store
            .load()
            .ok()
            .flatten()
            .filter(|p| p.license_key() == &key && self.inner.guard.verify(p).is_ok());
        let now = monotonic_now(self.inner.clock.now(), previous.as_ref());
        let record = LicenseRecord::issue(
            key,
            binding,
            &verdict,
            now,
            self.inner.config.default_term(),
            &self.inner.guard,
        );
        self.inner.store.save(&record)?;
        Ok(record)
    }

    /// Deactivates the license and deletes the local record.
    ///
    /// The authority is told on a best-effort basis; the local record is
    /// deleted whatever it answers. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] when there is neither a configured key
    /// nor a local record, or a storage error if deletion fails.
    pub async fn deactivate(&self, ctx: &RequestContext) -> LicenseResult<bool> {
        let _lock = self.lock_store().await?;

        let record = match self.inner.store.load() {
            Ok(record) => record,
            Err(err) => {
                warn!("unreadable verification file during deactivation: {err}");
                None
            }
        };

        match self.resolve_key(record.as_ref()) {
            Ok(key) => {
                let domain = match &record {
                    Some(r) => r.domain().clone(),
                    None => ctx.domain().clone(),
                };
                info!(%domain, key = %key.masked(), "deactivating license with server");
                if let Err(err) = self
                    .inner
                    .client
                    .deactivate(&key, &domain, ctx.client_ip())
                    .await
                {
                    debug!("deactivation server request failed: {err}");
                }
            }
            Err(err) if !self.inner.store.path().exists() => return Err(err),
            Err(err) => debug!("skipping server deactivation: {err}"),
        }

        let removed = self.inner.store.delete()?;
        info!(removed, "local license record deleted");
        Ok(removed)
    }

    /// Loads and integrity-checks the local record without contacting the authority.
    ///
    /// # Errors
    ///
    /// Storage or integrity errors.
    pub fn inspect(&self) -> LicenseResult<Option<LicenseRecord>> {
        let record = self.load_record()?;
        if let Some(record) = &record {
            self.inner.guard.verify(record)?;
        }
        Ok(record)
    }

    /// Loads the record relevant to this gate.
    ///
    /// A record issued for a different key than the configured one is ignored.
    /// An unparsable record is reported as an integrity failure.
    fn load_record(&self) -> LicenseResult<Option<LicenseRecord>> {
        let record = match self.inner.store.load() {
            Ok(record) => record,
            Err(LicenseError::Serialization(e)) => {
                warn!(
                    target: "domainlock::security",
                    path = %self.inner.store.path().display(),
                    "license data corrupted: {e}"
                );
                return Err(LicenseError::Integrity(format!("license data corrupted: {e}")));
            }
            Err(err) => return Err(err),
        };

        let configured = self.configured_key()?;
        Ok(record.filter(|r| match &configured {
            Some(key) if key != r.license_key() => {
                info!(
                    stored = %r.license_key().masked(),
                    configured = %key.masked(),
                    "ignoring record issued for another license key"
                );
                false
            }
            _ => true,
        }))
    }

    fn configured_key(&self) -> LicenseResult<Option<LicenseKey>> {
        match self.inner.config.license_key.as_deref() {
            Some(raw) => Ok(Some(LicenseKey::parse(raw)?)),
            None => Ok(None),
        }
    }

    fn resolve_key(&self, record: Option<&LicenseRecord>) -> LicenseResult<LicenseKey> {
        if let Some(key) = self.configured_key()? {
            return Ok(key);
        }
        record
            .map(|r| r.license_key().clone())
            .ok_or_else(|| LicenseError::Config("license key is missing".to_string()))
    }

    async fn lock_store(&self) -> LicenseResult<StoreLock> {
        let store = self.inner.store.clone();
        tokio::task::spawn_blocking(move || store.lock())
            .await
            .map_err(|e| LicenseError::Storage(format!("lock task failed: {e}")))?
    }
}

fn monotonic_now(now: UnixTimestamp, previous: Option<&LicenseRecord>) -> UnixTimestamp {
    previous.map_or(now, |r| now.max(r.last_check()))
}
