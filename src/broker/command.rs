//! Command definitions for the broker
//!
//! `Command` is what the codec hands the dispatcher for every inbound
//! request. Notes on fields:
//! - `verb`: first path segment as received, not yet validated
//! - `topic`: second path segment, if any
//! - `payload`: opaque request body, echoed in the acknowledgment
//! - `sender`: endpoint the datagram came from
//! - `correlation_id`: request message id, echoed in the acknowledgment
//! - `token`: opaque request token, echoed in the acknowledgment
//! - `path`: every request path segment as received, echoed in the acknowledgment

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::client::ClientIdentity;
use crate::utils::error::CommandError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: String,
    pub topic: Option<String>,
    pub payload: Bytes,
    pub sender: ClientIdentity,
    pub correlation_id: u16,
    pub token: Bytes,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    AddSub,
    RemSub,
    Pub,
    Hb,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::AddSub => "ADDSUB",
            Verb::RemSub => "REMSUB",
            Verb::Pub => "PUB",
            Verb::Hb => "HB",
        }
    }

    /// Whether the verb is malformed without a topic segment.
    pub fn requires_topic(&self) -> bool {
        !matches!(self, Verb::Hb)
    }
}

impl FromStr for Verb {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADDSUB" => Ok(Verb::AddSub),
            "REMSUB" => Ok(Verb::RemSub),
            "PUB" => Ok(Verb::Pub),
            "HB" => Ok(Verb::Hb),
            "" => Err(CommandError::Empty),
            other => Err(CommandError::UnknownVerb(other.to_string())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    /// Resolve the verb and, where required, the topic.
    ///
    /// An empty topic segment counts as missing.
    pub fn resolve(&self) -> Result<(Verb, Option<&str>), CommandError> {
        let verb: Verb = self.verb.parse()?;
        let topic = self.topic.as_deref().filter(|t| !t.is_empty());
        if verb.requires_topic() && topic.is_none() {
            return Err(CommandError::MissingTopic(verb));
        }
        Ok((verb, topic))
    }
}
