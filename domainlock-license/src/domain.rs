//! Request context: the resolved domain and client address of the request
//! that triggered a license operation.

use domainlock_types::Domain;
use std::net::IpAddr;

/// Headers consulted for the client address, in priority order.
pub const CLIENT_IP_HEADERS: [&str; 2] = ["client-ip", "x-forwarded-for"];

/// Where a license operation is being performed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    domain: Domain,
    client_ip: String,
}

impl RequestContext {
    /// Builds a context from a raw `Host` value and an already-resolved client IP.
    #[must_use]
    pub fn new(host: &str, client_ip: impl Into<String>) -> Self {
        Self {
            domain: Domain::from_host(host),
            client_ip: client_ip.into(),
        }
    }

    /// Builds a context from request headers and the socket peer address.
    ///
    /// `header` looks up a header by lower-case name. The client IP comes from
    /// `Client-IP`, then `X-Forwarded-For`, then the remote address.
    pub fn from_request<'a, F>(host: &str, header: F, remote_addr: Option<IpAddr>) -> Self
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let client_ip = CLIENT_IP_HEADERS
            .iter()
            .find_map(|name| header(name).map(str::trim).filter(|v| !v.is_empty()))
            .map(str::to_string)
            .or_else(|| remote_addr.map(|a| a.to_string()))
            .unwrap_or_default();
        Self::new(host, client_ip)
    }

    /// The canonical domain of the request.
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The client address reported to the authority. May be empty.
    #[must_use]
    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }
}
