//! The `error` module defines the error types used within `coapsub`.
//!
//! Every error on the per-command path is contained within the handling of
//! that command. Only [`TransportError::Bind`] is fatal, and it can only
//! happen at startup.

use std::io;

use thiserror::Error;

use crate::broker::Verb;

/// Reasons a decoded command is dropped without a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("{0} requires a topic segment")]
    MissingTopic(Verb),

    #[error("unknown verb: {0}")]
    UnknownVerb(String),
}

/// Failures while parsing or building a CoAP datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("datagram shorter than the 4 byte header ({0} bytes)")]
    TooShort(usize),

    #[error("unsupported CoAP version {0}")]
    UnsupportedVersion(u8),

    #[error("token length {0} exceeds 8 bytes")]
    TokenTooLong(usize),

    #[error("datagram truncated while reading {0}")]
    Truncated(&'static str),

    #[error("reserved option nibble 15 outside the payload marker")]
    ReservedNibble,

    #[error("payload marker followed by an empty payload")]
    EmptyPayload,

    #[error("option value of {0} bytes is too large")]
    OptionTooLarge(usize),
}

/// Failures at the `send`/`acknowledge` boundary. Never fatal.
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode datagram: {0}")]
    Encode(#[from] CodecError),
}

/// Listener lifecycle failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("listener socket error: {0}")]
    Io(#[from] io::Error),
}
