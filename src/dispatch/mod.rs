//! Invocation dispatch.
//!
//! Routes decoded [`InvocationDescriptor`](crate::protocol::InvocationDescriptor)s
//! to callbacks registered by method name. A lookup miss yields
//! [`Error::UnknownMethod`](crate::Error::UnknownMethod) and calls nothing.

// ============================================================================
// Submodules
// ============================================================================

/// Method name to handler table.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use registry::{Handler, HandlerRegistry, InvocationHandler};
