//! # CoapSub
//!
//! `coapsub` is a minimalist, in-memory publish/subscribe relay for
//! constrained devices. Clients talk CoAP over UDP: they subscribe to named
//! topics, publish payloads to a topic, and receive every payload published
//! to the topics they follow.
//!
//! ## Core Modules
//!
//! - `broker`: The subscription registry, the command dispatcher and message id generation.
//! - `client`: The value type identifying a client by its UDP endpoint.
//! - `config`: Handles loading and managing relay configuration.
//! - `transport`: The CoAP codec and the UDP listener.
//! - `utils`: Shared error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
