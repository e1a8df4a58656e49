//! Registration wire protocol.
//!
//! Length-prefixed JSON framing shared by clients and the
//! [connection server][crate::server], symmetric in both directions:
//!
//! ```text
//! +----------------+-------------------+
//! | Length (4B BE) | UTF-8 JSON        |
//! +----------------+-------------------+
//! ```
//!
//! A client sends [`Message`]s (`registration` or `heartbeat`):
//!
//! ```json
//! {"version":"1.0","type":"registration","timestamp":"2025-01-01T00:00:00Z","hostname":"host1"}
//! ```
//!
//! and receives a [`Response`] per message:
//!
//! ```json
//! {"version":"1.0","type":"response","status":"success",
//!  "message":"New host 'host1' registered with IP 203.0.113.5",
//!  "timestamp":"2025-01-01T00:00:01Z",
//!  "result_type":"new_registration","hostname":"host1","ip_address":"203.0.113.5"}
//! ```
//!
//! Two failure layers are kept distinct: a frame that can't be read off the
//! wire at all ([`Error::Framing`][crate::error::Error::Framing], fatal to the
//! connection) versus a complete frame whose JSON is malformed or missing
//! required fields ([`Error::Schema`][crate::error::Error::Schema], answered
//! in-line with the connection kept open).

mod codec;
mod message;

pub use codec::{decode, decode_response, deframe, encode, parse_message, LENGTH_PREFIX_LEN};
pub use message::{
    ErrorType, Message, MessageKind, Response, ResponseStatus, ResultType, ServerInfo,
    PROTOCOL_VERSION, RESPONSE_TYPE,
};
