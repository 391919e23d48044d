//! CoAP message codec
//!
//! Implements the subset of the RFC 7252 message format the relay needs:
//!
//! ```text
//!  0                   1                   2                   3
//! |Ver| T |  TKL  |      Code     |          Message ID           |
//! |   Token (if any, TKL bytes) ...
//! |   Options (if any) ...
//! |1 1 1 1 1 1 1 1|    Payload (if any) ...
//! ```
//!
//! Uri-Path and Content-Format are interpreted; every other option is kept
//! as opaque bytes on decode.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::broker::Command;
use crate::client::ClientIdentity;
use crate::utils::error::CodecError;

pub const VERSION: u8 = 1;
pub const MAX_TOKEN_LEN: usize = 8;
const PAYLOAD_MARKER: u8 = 0xFF;

pub const OPTION_URI_PATH: u16 = 11;
pub const OPTION_CONTENT_FORMAT: u16 = 12;

/// Content-Format `application/link-format`.
pub const CONTENT_FORMAT_LINK: u16 = 40;

/// Response code 2.05 Content.
pub const CODE_CONTENT: u8 = (2 << 5) | 5;

/// First path segment that marks the pub/sub function set; skipped if present.
pub const PUBSUB_PREFIX: &str = "ps";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Confirmable = 0,
    NonConfirmable = 1,
    Acknowledgement = 2,
    Reset = 3,
}

impl From<u8> for MessageType {
    fn from(bits: u8) -> Self {
        match bits & 0b11 {
            0 => MessageType::Confirmable,
            1 => MessageType::NonConfirmable,
            2 => MessageType::Acknowledgement,
            _ => MessageType::Reset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapMessage {
    pub msg_type: MessageType,
    pub code: u8,
    pub message_id: u16,
    pub token: Bytes,
    /// Options in ascending number order.
    pub options: Vec<(u16, Bytes)>,
    pub payload: Bytes,
}

impl CoapMessage {
    pub fn new(msg_type: MessageType, code: u8, message_id: u16) -> Self {
        Self {
            msg_type,
            code,
            message_id,
            token: Bytes::new(),
            options: Vec::new(),
            payload: Bytes::new(),
        }
    }

    /// Uri-Path segments in order. Segments that are not UTF-8 are replaced lossily.
    pub fn path(&self) -> Vec<String> {
        self.options
            .iter()
            .filter(|(number, _)| *number == OPTION_URI_PATH)
            .map(|(_, value)| String::from_utf8_lossy(value).into_owned())
            .collect()
    }

    /// Replace all Uri-Path options with `segments`.
    pub fn set_path<S: AsRef<str>>(&mut self, segments: &[S]) {
        self.options.retain(|(number, _)| *number != OPTION_URI_PATH);
        for segment in segments {
            let value = Bytes::copy_from_slice(segment.as_ref().as_bytes());
            self.insert_option(OPTION_URI_PATH, value);
        }
    }

    pub fn content_format(&self) -> Option<u16> {
        self.options
            .iter()
            .find(|(number, _)| *number == OPTION_CONTENT_FORMAT)
            .map(|(_, value)| value.iter().fold(0u16, |acc, b| (acc << 8) | u16::from(*b)))
    }

    pub fn set_content_format(&mut self, format: u16) {
        self.options.retain(|(number, _)| *number != OPTION_CONTENT_FORMAT);
        // uint options use the shortest big-endian form
        let value = match format {
            0 => Bytes::new(),
            1..=0xFF => Bytes::copy_from_slice(&[format as u8]),
            _ => Bytes::copy_from_slice(&format.to_be_bytes()),
        };
        self.insert_option(OPTION_CONTENT_FORMAT, value);
    }

    /// Insert keeping number order; repeated options keep insertion order.
    fn insert_option(&mut self, number: u16, value: Bytes) {
        let at = self.options.partition_point(|(n, _)| *n <= number);
        self.options.insert(at, (number, value));
    }
}

pub fn decode(datagram: &[u8]) -> Result<CoapMessage, CodecError> {
    if datagram.len() < 4 {
        return Err(CodecError::TooShort(datagram.len()));
    }
    let mut buf = datagram;

    let first = buf.get_u8();
    let version = first >> 6;
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let msg_type = MessageType::from(first >> 4);
    let token_len = (first & 0x0F) as usize;
    if token_len > MAX_TOKEN_LEN {
        return Err(CodecError::TokenTooLong(token_len));
    }
    let code = buf.get_u8();
    let message_id = buf.get_u16();

    if buf.remaining() < token_len {
        return Err(CodecError::Truncated("token"));
    }
    let token = Bytes::copy_from_slice(&buf[..token_len]);
    buf.advance(token_len);

    let mut options = Vec::new();
    let mut number: u16 = 0;
    let mut payload = Bytes::new();

    while buf.has_remaining() {
        let byte = buf.get_u8();
        if byte == PAYLOAD_MARKER {
            if !buf.has_remaining() {
                return Err(CodecError::EmptyPayload);
            }
            payload = Bytes::copy_from_slice(buf);
            break;
        }

        let delta = read_extended(&mut buf, byte >> 4)?;
        let len = read_extended(&mut buf, byte & 0x0F)? as usize;
        if buf.remaining() < len {
            return Err(CodecError::Truncated("option value"));
        }

        number = number
            .checked_add(delta)
            .ok_or(CodecError::Truncated("option number"))?;
        options.push((number, Bytes::copy_from_slice(&buf[..len])));
        buf.advance(len);
    }

    Ok(CoapMessage {
        msg_type,
        code,
        message_id,
        token,
        options,
        payload,
    })
}

fn read_extended(buf: &mut &[u8], nibble: u8) -> Result<u16, CodecError> {
    match nibble {
        0..=12 => Ok(u16::from(nibble)),
        13 => {
            if !buf.has_remaining() {
                return Err(CodecError::Truncated("option extension"));
            }
            Ok(u16::from(buf.get_u8()) + 13)
        }
        14 => {
            if buf.remaining() < 2 {
                return Err(CodecError::Truncated("option extension"));
            }
            buf.get_u16()
                .checked_add(269)
                .ok_or(CodecError::Truncated("option extension"))
        }
        _ => Err(CodecError::ReservedNibble),
    }
}

pub fn encode(msg: &CoapMessage) -> Result<Bytes, CodecError> {
    if msg.token.len() > MAX_TOKEN_LEN {
        return Err(CodecError::TokenTooLong(msg.token.len()));
    }

    let mut buf = BytesMut::with_capacity(4 + msg.token.len() + msg.payload.len() + 16);
    buf.put_u8((VERSION << 6) | ((msg.msg_type as u8) << 4) | msg.token.len() as u8);
    buf.put_u8(msg.code);
    buf.put_u16(msg.message_id);
    buf.put_slice(&msg.token);

    let mut options: Vec<_> = msg.options.iter().collect();
    options.sort_by_key(|(number, _)| *number);

    let mut previous = 0u16;
    for (number, value) in options {
        let delta = number - previous;
        let len = u16::try_from(value.len()).map_err(|_| CodecError::OptionTooLarge(value.len()))?;
        if len > u16::MAX - 269 {
            return Err(CodecError::OptionTooLarge(value.len()));
        }

        let (delta_nibble, delta_ext) = split_extended(delta);
        let (len_nibble, len_ext) = split_extended(len);
        buf.put_u8((delta_nibble << 4) | len_nibble);
        put_extended(&mut buf, delta_nibble, delta_ext);
        put_extended(&mut buf, len_nibble, len_ext);
        buf.put_slice(value);

        previous = *number;
    }

    if !msg.payload.is_empty() {
        buf.put_u8(PAYLOAD_MARKER);
        buf.put_slice(&msg.payload);
    }

    Ok(buf.freeze())
}

fn split_extended(value: u16) -> (u8, u16) {
    match value {
        0..=12 => (value as u8, 0),
        13..=268 => (13, value - 13),
        _ => (14, value - 269),
    }
}

fn put_extended(buf: &mut BytesMut, nibble: u8, ext: u16) {
    match nibble {
        13 => buf.put_u8(ext as u8),
        14 => buf.put_u16(ext),
        _ => {}
    }
}

/// Turn a request into a [`Command`] from `sender`.
///
/// The path is `[ps/]<verb>[/<topic>[/...]]`; segments after the topic are ignored.
pub fn to_command(msg: &CoapMessage, sender: ClientIdentity) -> Command {
    let path = msg.path();
    let mut segments = path.iter().cloned().peekable();
    if segments.peek().map(String::as_str) == Some(PUBSUB_PREFIX) {
        segments.next();
    }

    Command {
        verb: segments.next().unwrap_or_default(),
        topic: segments.next(),
        payload: msg.payload.clone(),
        sender,
        correlation_id: msg.message_id,
        token: msg.token.clone(),
        path,
    }
}

/// Piggybacked acknowledgment for `original`, echoing its id, token, path and payload.
pub fn acknowledgment(original: &Command) -> CoapMessage {
    let mut msg = CoapMessage::new(
        MessageType::Acknowledgement,
        CODE_CONTENT,
        original.correlation_id,
    );
    msg.token = original.token.clone();

    msg.set_path(&original.path);
    msg.set_content_format(CONTENT_FORMAT_LINK);
    msg.payload = original.payload.clone();
    msg
}

/// Non-confirmable datagram carrying a fanned-out payload.
pub fn delivery(message_id: u16, payload: &Bytes) -> CoapMessage {
    let mut msg = CoapMessage::new(MessageType::NonConfirmable, CODE_CONTENT, message_id);
    msg.payload = payload.clone();
    msg
}
