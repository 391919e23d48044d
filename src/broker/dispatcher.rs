//! Command dispatch
//!
//! The dispatcher turns a decoded [`Command`] into registry operations,
//! fan-out and an acknowledgment. It keeps no state of its own.
//!
//! | verb   | action                          | response    |
//! |--------|---------------------------------|-------------|
//! | ADDSUB | subscribe sender to topic       | acknowledge |
//! | REMSUB | unsubscribe sender from topic   | acknowledge |
//! | PUB    | fan out payload to subscribers  | acknowledge |
//! | HB     | none                            | acknowledge |
//!
//! Anything else (no verb, unknown verb, missing topic) is dropped and gets
//! no response at all.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::broker::command::{Command, Verb};
use crate::broker::registry::Registry;
use crate::client::ClientIdentity;
use crate::utils::error::{CommandError, TransmitError};

/// The delivery capabilities the dispatcher needs from the transport.
///
/// Both calls are fire-and-forget: they must not block or retry, and report
/// failure only through the returned error.
pub trait Outbound {
    fn send(&self, target: &ClientIdentity, payload: &Bytes) -> Result<(), TransmitError>;

    fn acknowledge(&self, original: &Command) -> Result<(), TransmitError>;
}

/// What happened to a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Handled {
        verb: Verb,
        delivered: usize,
        failed: usize,
        acknowledged: bool,
    },
    Dropped(CommandError),
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    registry: Registry,
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle one command to completion.
    pub fn dispatch<O: Outbound + ?Sized>(&self, command: &Command, out: &O) -> Outcome {
        let (verb, topic) = match command.resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!("dropping command from {}: {e}", command.sender);
                return Outcome::Dropped(e);
            }
        };

        let mut delivered = 0;
        let mut failed = 0;

        match (verb, topic) {
            (Verb::AddSub, Some(topic)) => {
                debug!("add sub topic={topic} client={}", command.sender);
                self.registry.subscribe(topic, command.sender);
                self.log_table();
            }
            (Verb::RemSub, Some(topic)) => {
                debug!("remove sub topic={topic} client={}", command.sender);
                self.registry.unsubscribe(topic, &command.sender);
                self.log_table();
            }
            (Verb::Pub, Some(topic)) => {
                (delivered, failed) = self.fan_out(topic, &command.payload, out);
                debug!("pub finished topic={topic} delivered={delivered} failed={failed}");
            }
            (Verb::Hb, _) => {
                debug!("heartbeat from {}", command.sender);
            }
            // resolve() guarantees a topic for every verb that needs one
            (verb, None) => return Outcome::Dropped(CommandError::MissingTopic(verb)),
        }

        let acknowledged = match out.acknowledge(command) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to acknowledge {verb} from {}: {e}", command.sender);
                false
            }
        };

        Outcome::Handled {
            verb,
            delivered,
            failed,
            acknowledged,
        }
    }

    /// Send `payload` to every current subscriber of `topic`.
    ///
    /// A failure for one subscriber never stops delivery to the rest.
    fn fan_out<O: Outbound + ?Sized>(
        &self,
        topic: &str,
        payload: &Bytes,
        out: &O,
    ) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;

        for client in self.registry.subscribers_of(topic) {
            match out.send(&client, payload) {
                Ok(()) => {
                    delivered += 1;
                    debug!("topic={topic} PUB to {client} len={}", payload.len());
                }
                Err(e) => {
                    failed += 1;
                    warn!("failed to deliver topic={topic} to {client}: {e}");
                }
            }
        }

        (delivered, failed)
    }

    fn log_table(&self) {
        if tracing::enabled!(tracing::Level::DEBUG) {
            for (topic, clients) in self.registry.dump() {
                debug!("topic={topic} sub by clients={clients:?}");
            }
        }
    }
}
