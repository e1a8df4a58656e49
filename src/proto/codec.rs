use crate::error::Error;
use crate::proto::message::{Message, Response};
use serde::Serialize;

/// Size of the big-endian length prefix preceding every payload.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Serialize a message or response and prepend its length prefix.
///
/// # Errors
///
/// Returns [`Error::InvalidJSON`] if the value can't be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    let payload = serde_json::to_vec(value)?;
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    // Payload lengths above u32::MAX are unrepresentable on the wire; a
    // truncating cast would silently corrupt the frame.
    let len = u32::try_from(payload.len())
        .map_err(|_| Error::Framing(format!("payload too large: {} bytes", payload.len())))?;
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Split one frame's payload off the front of `buf`.
///
/// # Errors
///
/// Returns [`Error::Framing`] if fewer than [`LENGTH_PREFIX_LEN`] bytes are
/// available, the declared payload is empty, or the buffer holds fewer bytes
/// than the prefix declares. The caller must keep reading and retry.
pub fn deframe(buf: &[u8]) -> Result<&[u8], Error> {
    if buf.len() < LENGTH_PREFIX_LEN {
        return Err(Error::Framing(format!(
            "incomplete length prefix: have {} of {LENGTH_PREFIX_LEN} bytes",
            buf.len()
        )));
    }
    let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
    len_bytes.copy_from_slice(&buf[..LENGTH_PREFIX_LEN]);
    let declared = u32::from_be_bytes(len_bytes) as usize;
    if declared == 0 {
        return Err(Error::Framing("empty message".to_string()));
    }
    let body = &buf[LENGTH_PREFIX_LEN..];
    if body.len() < declared {
        return Err(Error::Framing(format!(
            "incomplete payload: have {} of {declared} bytes",
            body.len()
        )));
    }
    Ok(&body[..declared])
}

/// Parse a frame payload as an inbound [`Message`].
///
/// # Errors
///
/// Returns [`Error::Schema`] if the payload is not valid JSON or is missing a
/// required field (`version`, `type`, `hostname`, `timestamp`).
pub fn parse_message(payload: &[u8]) -> Result<Message, Error> {
    serde_json::from_slice(payload).map_err(|e| Error::Schema(e.to_string()))
}

/// Decode one framed [`Message`] from the front of `buf`.
///
/// # Errors
///
/// Returns [`Error::Framing`] for an incomplete frame (see [`deframe`]) and
/// [`Error::Schema`] for a complete frame with an invalid payload.
pub fn decode(buf: &[u8]) -> Result<Message, Error> {
    parse_message(deframe(buf)?)
}

/// Decode one framed [`Response`] from the front of `buf`. The client-side
/// mirror of [`decode`].
///
/// # Errors
///
/// As for [`decode`].
pub fn decode_response(buf: &[u8]) -> Result<Response, Error> {
    let payload = deframe(buf)?;
    serde_json::from_slice(payload).map_err(|e| Error::Schema(e.to_string()))
}
