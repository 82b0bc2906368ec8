//! Shared test helpers for license tests.

#![allow(dead_code)]

use async_trait::async_trait;
use domainlock_license::{
    Action, Authority, HttpAuthority, LicenseConfig, LicenseError, LicenseResult, ManualClock,
    ProtectionGate, RequestContext, ServerResponse, UnixTimestamp, VerificationRequest,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const SALT: &str = "test-salt-do-not-ship";
pub const KEY: &str = "ABC123";
pub const HOST: &str = "example.com";
pub const API_PATH: &str = "/api.php";

/// 2024-01-01T00:00:00Z
pub const T0: UnixTimestamp = UnixTimestamp::from_secs(1_704_067_200);

pub const HOUR: i64 = 60 * 60;
pub const DAY: i64 = 24 * HOUR;

/// A configuration writing its record into `dir`.
pub fn test_config(dir: &Path, endpoint: &str) -> LicenseConfig {
    LicenseConfig {
        endpoint_url: endpoint.to_string(),
        api_key: "test-api-key".to_string(),
        product: "exchange-bridge".to_string(),
        salt: SALT.to_string(),
        verification_file: dir.join("verification.json"),
        activate_timeout_ms: 2_000,
        verify_timeout_ms: 2_000,
        deactivate_timeout_ms: 500,
        ..Default::default()
    }
}

pub fn ctx(host: &str) -> RequestContext {
    RequestContext::new(host, "203.0.113.7")
}

pub fn clock_at_t0() -> ManualClock {
    ManualClock::new(T0)
}

/// A gate backed by a real HTTP client pointed at `endpoint`.
pub fn http_gate(dir: &TempDir, endpoint: &str, clock: &ManualClock) -> ProtectionGate {
    http_gate_with(test_config(dir.path(), endpoint), endpoint, clock)
}

pub fn http_gate_with(config: LicenseConfig, endpoint: &str, clock: &ManualClock) -> ProtectionGate {
    let authority = HttpAuthority::new(format!("{endpoint}{API_PATH}")).unwrap();
    ProtectionGate::with_parts(config, Arc::new(authority), Arc::new(clock.clone())).unwrap()
}

pub fn success_body() -> serde_json::Value {
    serde_json::json!({
        "status": "success",
        "message": "License is valid",
        "validation_type": "automatic"
    })
}

pub fn rejected_body(message: &str) -> serde_json::Value {
    serde_json::json!({ "status": "error", "message": message })
}

/// How the scripted authority answers.
#[derive(Debug, Clone)]
pub enum Script {
    Success,
    Reject(String),
    Unreachable,
    Malformed,
}

/// An in-process authority that records every request.
pub struct ScriptedAuthority {
    script: Mutex<Script>,
    calls: Mutex<Vec<(Action, String)>>,
}

impl ScriptedAuthority {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn calls(&self, action: Action) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == action)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_domain(&self) -> Option<String> {
        self.calls.lock().unwrap().last().map(|(_, d)| d.clone())
    }
}

#[async_trait]
impl Authority for ScriptedAuthority {
    async fn send(
        &self,
        request: &VerificationRequest,
        _timeout: Duration,
    ) -> LicenseResult<ServerResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((request.action, request.domain.clone()));
        let script = self.script.lock().unwrap().clone();
        match script {
            Script::Success => Ok(ServerResponse {
                status: Some("success".to_string()),
                ..Default::default()
            }),
            Script::Reject(message) => Ok(ServerResponse {
                status: Some("error".to_string()),
                message: Some(message),
                ..Default::default()
            }),
            Script::Unreachable => Err(LicenseError::Transport("connection refused".to_string())),
            Script::Malformed => Err(LicenseError::Protocol("missing status".to_string())),
        }
    }
}

/// A gate backed by a [`ScriptedAuthority`].
pub fn scripted_gate(
    dir: &TempDir,
    authority: &Arc<ScriptedAuthority>,
    clock: &ManualClock,
) -> ProtectionGate {
    scripted_gate_with(test_config(dir.path(), "http://unused.invalid"), authority, clock)
}

pub fn scripted_gate_with(
    config: LicenseConfig,
    authority: &Arc<ScriptedAuthority>,
    clock: &ManualClock,
) -> ProtectionGate {
    let authority: Arc<dyn Authority> = authority.clone();
    ProtectionGate::with_parts(config, authority, Arc::new(clock.clone())).unwrap()
}

/// Reads the verification file as raw JSON.
pub fn read_raw(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

/// Overwrites the verification file with raw JSON.
pub fn write_raw(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}
