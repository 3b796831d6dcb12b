//! Invocation descriptor carried by `ClientMethodInvocation` messages.
//!
//! The envelope's `data` field is itself a JSON document naming the method
//! to run and its positional arguments.
//!
//! # Format
//!
//! ```json
//! {
//!   "methodName": "Broadcast",
//!   "arguments": ["hello", 42]
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_str, to_string};

use crate::error::{Error, Result};

use super::deserialize_null_default;

// ============================================================================
// InvocationDescriptor
// ============================================================================

/// A remote-to-local method call: method name plus ordered arguments.
///
/// Argument values are loosely typed; nothing checks them against the
/// handler that eventually receives them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationDescriptor {
    /// Name of the registered handler to call.
    #[serde(alias = "MethodName")]
    pub method_name: String,

    /// Positional arguments, in call order.
    #[serde(default, alias = "Arguments", deserialize_with = "deserialize_null_default")]
    pub arguments: Vec<Value>,
}

impl InvocationDescriptor {
    /// Creates a descriptor.
    #[inline]
    #[must_use]
    pub fn new(method_name: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            method_name: method_name.into(),
            arguments,
        }
    }

    /// Decodes a descriptor from an envelope payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the payload is not a descriptor or the
    /// method name is empty.
    pub fn decode(data: &str) -> Result<Self> {
        let descriptor: Self = from_str(data)
            .map_err(|e| Error::protocol(format!("malformed invocation descriptor: {e}")))?;

        if descriptor.method_name.is_empty() {
            return Err(Error::protocol("invocation descriptor has empty method name"));
        }

        Ok(descriptor)
    }

    /// Encodes the descriptor as JSON text.
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

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_decode_descriptor() {
        let descriptor =
            InvocationDescriptor::decode(r#"{"methodName":"Broadcast","arguments":["hello"]}"#)
                .expect("decode");
        assert_eq!(descriptor.method_name, "Broadcast");
        assert_eq!(descriptor.arguments, vec![json!("hello")]);
    }

    #[test]
    fn test_decode_preserves_argument_order_and_types() {
        let descriptor = InvocationDescriptor::decode(
            r#"{"methodName":"Mixed","arguments":[1,"two",{"three":3},[4],null,true]}"#,
        )
        .expect("decode");

        assert_eq!(
            descriptor.arguments,
            vec![
                json!(1),
                json!("two"),
                json!({ "three": 3 }),
                json!([4]),
                Value::Null,
                json!(true),
            ]
        );
    }

    #[test]
    fn test_missing_or_null_arguments_are_empty() {
        let descriptor =
            InvocationDescriptor::decode(r#"{"methodName":"Ping"}"#).expect("decode");
        assert!(descriptor.arguments.is_empty());

        let descriptor = InvocationDescriptor::decode(r#"{"methodName":"Ping","arguments":null}"#)
            .expect("decode");
        assert!(descriptor.arguments.is_empty());
    }

    #[test]
    fn test_decode_pascal_case_fields() {
        let descriptor =
            InvocationDescriptor::decode(r#"{"MethodName":"Broadcast","Arguments":["x"]}"#)
                .expect("decode");
        assert_eq!(descriptor.method_name, "Broadcast");
        assert_eq!(descriptor.arguments, vec![json!("x")]);
    }

    #[test]
    fn test_empty_method_name_is_rejected() {
        let err = InvocationDescriptor::decode(r#"{"methodName":"","arguments":[]}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_malformed_descriptor_is_protocol_error() {
        let err = InvocationDescriptor::decode("{\"arguments\":[]}").unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));

        let err = InvocationDescriptor::decode("Broadcast(hello)").unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }
}
