//! The `broker` module is the core of the relay: the subscription registry,
//! the command dispatcher and the message id generator.
//!
//! It knows nothing about sockets or wire formats. Commands come in already
//! decoded and replies go out through the [`Outbound`] trait.

pub mod command;
pub mod dispatcher;
pub mod message_id;
pub mod registry;

pub use command::{Command, Verb};
pub use dispatcher::{Dispatcher, Outbound, Outcome};
pub use message_id::MessageIdGenerator;
pub use registry::Registry;
