//! The `client` module defines how a client is identified in the relay.
//!
//! A client is nothing more than the transport endpoint a datagram came
//! from. [`ClientIdentity`] is that endpoint as an immutable value, so two
//! datagrams from the same address and port always map to the same key.

pub mod identity;
pub use identity::ClientIdentity;

#[cfg(test)]
mod tests;
