use domainlock_license::{Domain, RequestContext};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

const PEER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));

fn context(headers: &[(&str, &str)], peer: Option<IpAddr>) -> RequestContext {
    let headers: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    RequestContext::from_request(
        "WWW.Example.com:8080",
        |name| headers.get(name).map(String::as_str),
        peer,
    )
}

#[test]
fn host_is_canonicalized() {
    let ctx = context(&[], None);
    assert_eq!(ctx.domain(), &Domain::from_host("example.com"));
    assert_eq!(ctx.domain().as_str(), "example.com");
}

#[test]
fn client_ip_header_wins() {
    let ctx = context(
        &[("client-ip", "198.51.100.1"), ("x-forwarded-for", "192.0.2.9")],
        Some(PEER),
    );
    assert_eq!(ctx.client_ip(), "198.51.100.1");
}

#[test]
fn forwarded_for_before_peer() {
    let ctx = context(&[("x-forwarded-for", "192.0.2.9")], Some(PEER));
    assert_eq!(ctx.client_ip(), "192.0.2.9");
}

#[test]
fn blank_headers_are_skipped() {
    let ctx = context(&[("client-ip", "  "), ("x-forwarded-for", "")], Some(PEER));
    assert_eq!(ctx.client_ip(), "10.0.0.5");
}

#[test]
fn no_source_gives_empty_ip() {
    assert_eq!(context(&[], None).client_ip(), "");
}

#[test]
fn empty_host_gives_empty_domain() {
    let ctx = RequestContext::new("", "");
    assert!(ctx.domain().is_empty());
    assert!(!Domain::wildcard().permits(ctx.domain()));
}
