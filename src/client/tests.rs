use super::ClientIdentity;
use std::collections::HashSet;
use std::net::SocketAddr;

#[test]
fn test_identity_equality_is_by_value() {
    let a: ClientIdentity = "10.0.0.7:5683".parse().unwrap();
    let b = ClientIdentity::from("10.0.0.7:5683".parse::<SocketAddr>().unwrap());
    assert_eq!(a, b);

    let mut set = HashSet::new();
    set.insert(a);
    set.insert(b);
    assert_eq!(set.len(), 1);
}

#[test]
fn test_identity_distinguishes_ports() {
    let a: ClientIdentity = "10.0.0.7:5683".parse().unwrap();
    let b: ClientIdentity = "10.0.0.7:5684".parse().unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_ipv4_mapped_address_is_canonicalized() {
    let mapped: ClientIdentity = "[::ffff:192.168.1.20]:40000".parse().unwrap();
    let plain: ClientIdentity = "192.168.1.20:40000".parse().unwrap();
    assert_eq!(mapped, plain);
    assert_eq!(mapped.to_string(), "192.168.1.20:40000");
}

#[test]
fn test_plain_ipv6_is_kept() {
    let id: ClientIdentity = "[fe80::1]:5683".parse().unwrap();
    assert!(id.socket_addr().is_ipv6());
}

#[test]
fn test_invalid_endpoint_is_rejected() {
    assert!("not-an-endpoint".parse::<ClientIdentity>().is_err());
}
