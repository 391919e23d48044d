//! The `transport` module is responsible for network communication with
//! clients over CoAP on UDP.
//!
//! It defines the wire codec that turns datagrams into broker commands and
//! back, and implements the UDP listener that feeds the dispatcher and
//! carries its replies.

pub mod coap;
pub mod udp;
