//! Message id generation
//!
//! CoAP message ids are 16 bits wide. The generator starts from a seed mixed
//! from the host's IPv4 address and a random value, so two relays restarted
//! on different hosts (or twice on one host) are unlikely to reuse the same
//! run of ids straight away.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicU16, Ordering};

use tracing::{debug, info};

#[derive(Debug)]
pub struct MessageIdGenerator {
    current: AtomicU16,
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        let host = host_ipv4_bits();
        let seed = host.wrapping_add(rand::random::<u16>());
        info!("Init message id seed={seed}");
        Self::with_seed(seed)
    }

    pub fn with_seed(seed: u16) -> Self {
        Self {
            current: AtomicU16::new(seed),
        }
    }

    /// Advance and return the next id, wrapping at `u16::MAX`.
    pub fn next_id(&self) -> u16 {
        self.current.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Low 16 bits of the address the host would use for outbound traffic.
///
/// `connect` on a UDP socket only selects a route; nothing is sent.
/// Returns 0 when no route is available.
fn host_ipv4_bits() -> u16 {
    let local = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|s| s.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).map(|_| s))
        .and_then(|s| s.local_addr());

    match local {
        Ok(addr) => match addr.ip() {
            IpAddr::V4(v4) => {
                let [_, _, c, d] = v4.octets();
                u16::from_be_bytes([c, d])
            }
            IpAddr::V6(_) => 0,
        },
        Err(e) => {
            debug!("no host address for message id seed: {e}");
            0
        }
    }
}
