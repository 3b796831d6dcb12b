//! Wire message types.
//!
//! This module defines the message format the server pushes to the client.
//!
//! # Protocol Overview
//!
//! | Discriminator | Payload (`data`) | Client action |
//! |---------------|------------------|---------------|
//! | `ConnectionEvent` | Connection id string | Store as session identity |
//! | `ClientMethodInvocation` | JSON [`InvocationDescriptor`] | Dispatch to handler |
//! | anything else | Ignored | None |
//!
//! Field names are camelCase on the wire. PascalCase names are accepted on
//! decode as well.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | [`Message`] envelope and [`MessageType`] discriminator |
//! | `invocation` | [`InvocationDescriptor`] payload |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer};

// ============================================================================
// Submodules
// ============================================================================

/// Invocation descriptor payload.
pub mod invocation;

/// Message envelope and discriminator.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use invocation::InvocationDescriptor;
pub use message::{Message, MessageType};

// ============================================================================
// Helpers
// ============================================================================

/// Decodes an explicit `null` as the type's default value.
pub(crate) fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
