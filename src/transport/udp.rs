use std::net::{self, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::spawn;
use tracing::{debug, info, trace, warn};

use crate::broker::{Command, Dispatcher, MessageIdGenerator, Outbound, Outcome};
use crate::client::ClientIdentity;
use crate::config::ServerSettings;
use crate::transport::coap;
use crate::utils::error::{TransmitError, TransportError};

/// [`Outbound`] over a non-blocking clone of the listener socket.
///
/// Every send is its own `sendto` call, so a full socket buffer fails only
/// that datagram and is reported as a `TransmitError` instead of waiting.
#[derive(Debug)]
pub struct UdpOutbound {
    socket: net::UdpSocket,
    ids: MessageIdGenerator,
    ipv6: bool,
}

impl UdpOutbound {
    pub fn new(socket: net::UdpSocket, ids: MessageIdGenerator) -> Self {
        let ipv6 = socket.local_addr().map(|a| a.is_ipv6()).unwrap_or(false);
        Self { socket, ids, ipv6 }
    }

    /// An IPv6 socket can only reach IPv4 peers through their mapped form.
    fn wire_addr(&self, target: &ClientIdentity) -> SocketAddr {
        match target.socket_addr() {
            SocketAddr::V4(v4) if self.ipv6 => {
                SocketAddr::new(v4.ip().to_ipv6_mapped().into(), v4.port())
            }
            addr => addr,
        }
    }

    fn transmit(&self, target: &ClientIdentity, datagram: &[u8]) -> Result<(), TransmitError> {
        self.socket.send_to(datagram, self.wire_addr(target))?;
        Ok(())
    }
}

impl Outbound for UdpOutbound {
    fn send(&self, target: &ClientIdentity, payload: &Bytes) -> Result<(), TransmitError> {
        let datagram = coap::encode(&coap::delivery(self.ids.next_id(), payload))?;
        self.transmit(target, &datagram)
    }

    fn acknowledge(&self, original: &Command) -> Result<(), TransmitError> {
        let datagram = coap::encode(&coap::acknowledgment(original))?;
        self.transmit(&original.sender, &datagram)
    }
}

/// Bound UDP listener feeding the dispatcher.
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    dispatcher: Arc<Dispatcher>,
    outbound: Arc<UdpOutbound>,
    max_datagram_size: usize,
}

impl UdpServer {
    /// Bind the listening socket. This is the only fatal failure the relay has.
    pub async fn bind(
        addr: &str,
        dispatcher: Arc<Dispatcher>,
        settings: &ServerSettings,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        let listener = socket.into_std()?;
        listener.set_nonblocking(true)?;
        let sender = listener.try_clone()?;
        let socket = Arc::new(UdpSocket::from_std(listener)?);
        let outbound = Arc::new(UdpOutbound::new(sender, MessageIdGenerator::new()));

        Ok(Self {
            socket,
            dispatcher,
            outbound,
            max_datagram_size: settings.max_datagram_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive forever, handling every datagram in its own task.
    pub async fn run(self) {
        match self.socket.local_addr() {
            Ok(addr) => info!("CoAP relay listening on coap://{addr}"),
            Err(e) => warn!("CoAP relay listening on unknown address: {e}"),
        }

        // One spare byte tells an oversized datagram apart from one that fits exactly
        let mut buf = vec![0u8; self.max_datagram_size + 1];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    // ICMP errors for earlier sends surface here on some platforms
                    warn!("receive failed: {e}");
                    continue;
                }
            };

            if len > self.max_datagram_size {
                debug!(
                    "dropping datagram from {peer} larger than {} bytes",
                    self.max_datagram_size
                );
                continue;
            }

            let datagram = Bytes::copy_from_slice(&buf[..len]);
            let dispatcher = self.dispatcher.clone();
            let outbound = self.outbound.clone();
            spawn(async move {
                handle_datagram(&dispatcher, outbound.as_ref(), &datagram, peer);
            });
        }
    }
}

/// Decode one datagram from `peer` and dispatch it.
///
/// Undecodable input is dropped without a reply, the same as an unknown verb.
pub fn handle_datagram<O: Outbound + ?Sized>(
    dispatcher: &Dispatcher,
    outbound: &O,
    datagram: &[u8],
    peer: SocketAddr,
) -> Option<Outcome> {
    let sender = ClientIdentity::from(peer);
    let msg = match coap::decode(datagram) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("dropping undecodable datagram from {sender}: {e}");
            return None;
        }
    };

    let command = coap::to_command(&msg, sender);
    trace!(
        "cmd={} topic={:?} msg={} mid={}",
        command.verb,
        command.topic,
        String::from_utf8_lossy(&command.payload),
        command.correlation_id
    );
    Some(dispatcher.dispatch(&command, outbound))
}
