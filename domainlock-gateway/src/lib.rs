//! HTTP surface for the domainlock license gate.
//!
//! [`build_router`] exposes the license status and server time endpoints.
//! [`protect`] wraps any router so every request passes the gate first.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use domainlock_license::{Decision, DenyReason, ProtectionGate, RequestContext};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::debug;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LicenseStatusResponse {
    pub domain: String,
    pub allowed: bool,
    pub decision: Decision,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ServerTimeResponse {
    pub success: bool,
    pub server_time: String,
    pub timestamp: i64,
    pub timezone: String,
}

impl ServerTimeResponse {
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            success: true,
            server_time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            timestamp: now.timestamp(),
            timezone: "UTC".to_string(),
        }
    }
}

/// Body of a 403 returned by [`require_license`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeniedResponse {
    pub error: String,
    pub reason: DenyReason,
}

/// Resolves the licensing context of a request from its `Host` header,
/// client address headers and socket peer.
pub fn request_context(headers: &HeaderMap, remote: Option<SocketAddr>) -> RequestContext {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    RequestContext::from_request(
        host,
        |name| headers.get(name).and_then(|v| v.to_str().ok()),
        remote.map(|addr| addr.ip()),
    )
}

fn context_of(request: &Request) -> RequestContext {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    request_context(request.headers(), remote)
}

async fn license_status(
    State(gate): State<ProtectionGate>,
    request: Request,
) -> (StatusCode, Json<LicenseStatusResponse>) {
    let ctx = context_of(&request);
    let decision = gate.authorize(&ctx).await;
    let status = if decision.is_allowed() {
        StatusCode::OK
    } else {
        StatusCode::FORBIDDEN
    };
    (
        status,
        Json(LicenseStatusResponse {
            domain: ctx.domain().to_string(),
            allowed: decision.is_allowed(),
            decision,
        }),
    )
}

async fn server_time() -> Json<ServerTimeResponse> {
    Json(ServerTimeResponse::at(Utc::now()))
}

/// Middleware admitting a request only when the gate allows its domain.
pub async fn require_license(
    State(gate): State<ProtectionGate>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = context_of(&request);
    match gate.authorize(&ctx).await {
        Decision::Allow | Decision::AllowGrace => next.run(request).await,
        Decision::Deny(reason) => {
            debug!(domain = %ctx.domain(), path = %request.uri().path(), "request blocked");
            let body = DeniedResponse {
                error: reason.to_string(),
                reason,
            };
            (StatusCode::FORBIDDEN, Json(body)).into_response()
        }
    }
}

/// Puts every route of `router` behind the license gate.
pub fn protect(router: Router, gate: ProtectionGate) -> Router {
    router.layer(middleware::from_fn_with_state(gate, require_license))
}

/// Build the HTTP API router for the given gate.
pub fn build_router(gate: ProtectionGate) -> Router {
    Router::new()
        .route("/api/v1/license", get(license_status))
        .route("/api/get_server_time", get(server_time))
        .with_state(gate)
}
