use domainlock_license::{Decision, DenyReason, LicenseError, PolicyState};

fn all_errors() -> Vec<LicenseError> {
    vec![
        LicenseError::Config("license key is missing".into()),
        LicenseError::Integrity("tampered".into()),
        LicenseError::Transport("timed out".into()),
        LicenseError::Protocol("not json".into()),
        LicenseError::Rejected {
            message: "revoked".into(),
        },
        LicenseError::DomainMismatch {
            bound: "example.com".into(),
            actual: "evil.com".into(),
        },
        LicenseError::Inactive,
        LicenseError::Storage("disk full".into()),
        LicenseError::Serialization(serde_json::from_str::<u8>("x").unwrap_err()),
    ]
}

#[test]
fn only_unreachable_authority_is_grace_eligible() {
    let eligible: Vec<bool> = all_errors().iter().map(LicenseError::is_grace_eligible).collect();
    assert_eq!(
        eligible,
        vec![false, false, true, true, false, false, false, false, false]
    );
}

#[test]
fn deny_reasons() {
    let reasons: Vec<DenyReason> = all_errors().iter().map(DenyReason::from).collect();
    assert_eq!(reasons[0], DenyReason::Config("license key is missing".into()));
    assert_eq!(reasons[1], DenyReason::Integrity);
    assert_eq!(reasons[2], DenyReason::Unreachable("timed out".into()));
    assert_eq!(reasons[3], DenyReason::Unreachable("not json".into()));
    assert_eq!(reasons[4], DenyReason::Rejected("revoked".into()));
    assert_eq!(
        reasons[5],
        DenyReason::DomainMismatch {
            bound: "example.com".into(),
            actual: "evil.com".into()
        }
    );
    assert_eq!(reasons[6], DenyReason::Inactive);
    assert_eq!(reasons[7], DenyReason::Storage("disk full".into()));
    assert_eq!(reasons[8], DenyReason::Integrity);
}

#[test]
fn error_states() {
    let states: Vec<PolicyState> = all_errors().iter().map(PolicyState::for_error).collect();
    assert_eq!(states[1], PolicyState::IntegrityFailed);
    assert_eq!(states[5], PolicyState::DomainMismatch);
    assert_eq!(states[6], PolicyState::Expired);
}

#[test]
fn display_messages() {
    assert_eq!(
        LicenseError::Rejected {
            message: "revoked".into()
        }
        .to_string(),
        "license rejected by authority: revoked"
    );
    assert_eq!(
        DenyReason::Inactive.to_string(),
        "license is inactive or has been revoked"
    );
}

#[test]
fn decision_serializes_tagged() {
    let json = serde_json::to_value(Decision::Deny(DenyReason::Rejected("revoked".into()))).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "decision": "deny",
            "reason": {"kind": "rejected", "detail": "revoked"}
        })
    );
    assert_eq!(
        serde_json::to_value(Decision::AllowGrace).unwrap(),
        serde_json::json!({"decision": "allow_grace"})
    );
    assert!(Decision::AllowGrace.is_allowed());
    assert!(Decision::Deny(DenyReason::Integrity).deny_reason().is_some());
}
