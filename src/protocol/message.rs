//! Message envelope and discriminator.
//!
//! Every inbound text frame carries exactly one [`Message`]. The
//! discriminator decides how the `data` payload is read.
//!
//! # Format
//!
//! ```json
//! {
//!   "messageType": "ClientMethodInvocation",
//!   "data": "{\"methodName\":\"Broadcast\",\"arguments\":[\"hello\"]}"
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{from_str, to_string};

use crate::error::{Error, Result};

use super::InvocationDescriptor;
use super::deserialize_null_default;

// ============================================================================
// MessageType
// ============================================================================

/// Discriminator of a [`Message`] envelope.
///
/// Decodes from the variant name or from the server's numeric code.
/// Values this client does not know decode to [`MessageType::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Plain text notification (code `0`). Not routed by this client.
    Text,
    /// Server-to-client method call (code `1`).
    ClientMethodInvocation,
    /// Session identity assignment (code `2`).
    ConnectionEvent,
    /// Discriminator not known to this client, kept verbatim.
    Unknown(String),
}

impl MessageType {
    /// Returns the wire name of the discriminator.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "Text",
            Self::ClientMethodInvocation => "ClientMethodInvocation",
            Self::ConnectionEvent => "ConnectionEvent",
            Self::Unknown(raw) => raw,
        }
    }

    /// Maps a numeric discriminator code.
    fn from_code(code: u64) -> Self {
        match code {
            0 => Self::Text,
            1 => Self::ClientMethodInvocation,
            2 => Self::ConnectionEvent,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Maps a discriminator name.
    fn from_name(name: String) -> Self {
        match name.as_str() {
            "Text" => Self::Text,
            "ClientMethodInvocation" => Self::ClientMethodInvocation,
            "ConnectionEvent" => Self::ConnectionEvent,
            _ => Self::Unknown(name),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> StdResult<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> StdResult<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u64),
            Name(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Self::from_code(code),
            Raw::Name(name) => Self::from_name(name),
        })
    }
}

// ============================================================================
// Message
// ============================================================================

/// The wire-level envelope: a discriminator plus an opaque string payload.
///
/// Immutable once decoded; consumed by the receive loop and then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Kind of message.
    #[serde(alias = "MessageType", alias = "type")]
    pub message_type: MessageType,

    /// Payload, interpreted according to `message_type`.
    #[serde(default, alias = "Data", deserialize_with = "deserialize_null_default")]
    pub data: String,
}

impl Message {
    /// Creates an envelope.
    #[inline]
    #[must_use]
    pub fn new(message_type: MessageType, data: impl Into<String>) -> Self {
        Self {
            message_type,
            data: data.into(),
        }
    }

    /// Creates a `ConnectionEvent` envelope carrying a connection id.
    #[inline]
    #[must_use]
    pub fn connection_event(connection_id: impl Into<String>) -> Self {
        Self::new(MessageType::ConnectionEvent, connection_id)
    }

    /// Creates a `ClientMethodInvocation` envelope around an encoded descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the descriptor cannot be encoded.
    pub fn invocation(descriptor: &InvocationDescriptor) -> Result<Self> {
        Ok(Self::new(
            MessageType::ClientMethodInvocation,
            descriptor.encode()?,
        ))
    }

    /// Decodes an envelope from the text of one frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the text is not a valid envelope.
    pub fn decode(text: &str) -> Result<Self> {
        from_str(text).map_err(|e| Error::protocol(format!("malformed message envelope: {e}")))
    }

    /// Encodes the envelope as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
