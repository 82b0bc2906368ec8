mod common;

use common::{DAY, HOUR, KEY, SALT, T0};
use domainlock_license::{
    Domain, GracePeriodPolicy, IntegrityGuard, LicenseError, LicenseKey, LicenseRecord,
    PolicyState, RecheckFailure, UnixTimestamp, ValidationType, Verdict,
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_GRACE_PERIOD_SECS,
};
use std::time::Duration;

fn policy() -> GracePeriodPolicy {
    GracePeriodPolicy::new(DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_GRACE_PERIOD_SECS)
}

fn guard() -> IntegrityGuard {
    IntegrityGuard::new(SALT).unwrap()
}

fn record_bound_to(binding: &str, expires: Option<UnixTimestamp>) -> LicenseRecord {
    LicenseRecord::issue(
        LicenseKey::parse(KEY).unwrap(),
        Domain::parse_binding(binding).unwrap(),
        &Verdict {
            validation_type: ValidationType::Automatic,
            expires,
            message: None,
        },
        T0,
        Duration::from_secs(365 * 86400),
        &guard(),
    )
}

fn at(offset: i64) -> UnixTimestamp {
    T0.plus_secs(offset)
}

// ── assess ───────────────────────────────────────────────────────

#[test]
fn fresh_record_is_verified() {
    let r = record_bound_to("example.com", None);
    let state = policy()
        .assess(&r, &Domain::from_host("example.com"), &guard(), at(HOUR))
        .unwrap();
    assert_eq!(state, PolicyState::Verified);
}

#[test]
fn exactly_check_interval_is_still_verified() {
    let r = record_bound_to("example.com", None);
    let state = policy()
        .assess(&r, &Domain::from_host("example.com"), &guard(), at(DAY))
        .unwrap();
    assert_eq!(state, PolicyState::Verified);
}

#[test]
fn stale_record_is_pending_recheck() {
    let r = record_bound_to("example.com", None);
    let state = policy()
        .assess(&r, &Domain::from_host("example.com"), &guard(), at(DAY + 1))
        .unwrap();
    assert_eq!(state, PolicyState::PendingRecheck);
}

#[test]
fn elapsed_expiry_forces_recheck() {
    let r = record_bound_to("example.com", Some(at(HOUR)));
    let state = policy()
        .assess(&r, &Domain::from_host("example.com"), &guard(), at(2 * HOUR))
        .unwrap();
    assert_eq!(state, PolicyState::PendingRecheck);
}

#[test]
fn future_last_check_forces_recheck() {
    let r = record_bound_to("example.com", None);
    let state = policy()
        .assess(&r, &Domain::from_host("example.com"), &guard(), at(-HOUR))
        .unwrap();
    assert_eq!(state, PolicyState::PendingRecheck);
}

#[test]
fn domain_mismatch_is_error() {
    let r = record_bound_to("example.com", None);
    let err = policy()
        .assess(&r, &Domain::from_host("evil.com"), &guard(), at(HOUR))
        .unwrap_err();
    assert!(matches!(err, LicenseError::DomainMismatch { .. }));
    assert_eq!(PolicyState::for_error(&err), PolicyState::DomainMismatch);
}

#[test]
fn wildcard_accepts_any_domain() {
    let r = record_bound_to("*", None);
    for host in ["example.com", "shop.example.org", "localhost:8080"] {
        let state = policy()
            .assess(&r, &Domain::from_host(host), &guard(), at(HOUR))
            .unwrap();
        assert_eq!(state, PolicyState::Verified, "{host}");
    }
}

#[test]
fn inactive_record_is_error() {
    let mut r = record_bound_to("example.com", None);
    r.mark_inactive(at(HOUR), &guard());
    let err = policy()
        .assess(&r, &Domain::from_host("example.com"), &guard(), at(2 * HOUR))
        .unwrap_err();
    assert!(matches!(err, LicenseError::Inactive));
    assert_eq!(PolicyState::for_error(&err), PolicyState::Expired);
}

#[test]
fn integrity_checked_before_domain() {
    let r = record_bound_to("example.com", None);
    let wrong = IntegrityGuard::new("other").unwrap();
    let err = policy()
        .assess(&r, &Domain::from_host("evil.com"), &wrong, at(HOUR))
        .unwrap_err();
    assert!(matches!(err, LicenseError::Integrity(_)));
    assert_eq!(PolicyState::for_error(&err), PolicyState::IntegrityFailed);
}

// ── recheck failures ─────────────────────────────────────────────

#[test]
fn transport_failure_inside_grace() {
    let r = record_bound_to("example.com", None);
    let err = LicenseError::Transport("timed out".into());
    assert_eq!(
        policy().on_recheck_failure(Some(&r), &err, at(25 * HOUR)),
        RecheckFailure::Grace
    );
}

#[test]
fn protocol_failure_inside_grace() {
    let r = record_bound_to("example.com", None);
    let err = LicenseError::Protocol("bad body".into());
    assert_eq!(
        policy().on_recheck_failure(Some(&r), &err, at(6 * DAY)),
        RecheckFailure::Grace
    );
}

#[test]
fn transport_failure_at_grace_boundary_expires() {
    let r = record_bound_to("example.com", None);
    let err = LicenseError::Transport("timed out".into());
    assert_eq!(
        policy().on_recheck_failure(Some(&r), &err, at(7 * DAY)),
        RecheckFailure::Expire
    );
    assert_eq!(
        policy().on_recheck_failure(Some(&r), &err, at(8 * DAY)),
        RecheckFailure::Expire
    );
}

#[test]
fn rejection_never_gets_grace() {
    let r = record_bound_to("example.com", None);
    let err = LicenseError::Rejected {
        message: "revoked".into(),
    };
    assert_eq!(
        policy().on_recheck_failure(Some(&r), &err, at(25 * HOUR)),
        RecheckFailure::Expire
    );
}

#[test]
fn cold_start_never_gets_grace() {
    let err = LicenseError::Transport("timed out".into());
    assert_eq!(
        policy().on_recheck_failure(None, &err, T0),
        RecheckFailure::Expire
    );
}

#[test]
fn inactive_record_never_gets_grace() {
    let mut r = record_bound_to("example.com", None);
    r.mark_inactive(at(HOUR), &guard());
    assert!(!policy().within_grace(&r, at(2 * HOUR)));
}
