//! Per-connection table of invocation handlers.
//!
//! Maps method names to local callbacks. The receive loop looks handlers up
//! here for every `ClientMethodInvocation` message.
//!
//! # Locking
//!
//! The map sits behind a single mutex. A lookup clones the handler out and
//! releases the lock before the handler runs, so a handler may register
//! further handlers without deadlocking.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::protocol::InvocationDescriptor;

// ============================================================================
// Types
// ============================================================================

/// Invocation callback type.
///
/// Receives the invocation's arguments in call order. Runs inline on the
/// receive loop, so it must not block.
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

// ============================================================================
// InvocationHandler
// ============================================================================

/// A registered callback plus its declared parameter types.
///
/// The parameter types are descriptive metadata only. Dispatch never checks
/// arguments against them.
#[derive(Clone)]
pub struct InvocationHandler {
    /// The callback.
    handler: Handler,
    /// Declared parameter type names.
    parameter_types: Vec<String>,
}

impl InvocationHandler {
    /// Creates a handler entry.
    #[inline]
    #[must_use]
    pub fn new(handler: Handler, parameter_types: Vec<String>) -> Self {
        Self {
            handler,
            parameter_types,
        }
    }

    /// Returns the declared parameter type names.
    #[inline]
    #[must_use]
    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    /// Calls the handler with the given arguments.
    #[inline]
    pub fn invoke(&self, arguments: &[Value]) {
        (self.handler)(arguments);
    }
}

impl fmt::Debug for InvocationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationHandler")
            .field("parameter_types", &self.parameter_types)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Method name to handler table, owned by one connection.
///
/// Cloning yields another reference to the same table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<Mutex<FxHashMap<String, InvocationHandler>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `method_name`.
    ///
    /// A second registration under the same name replaces the first.
    pub fn register(&self, method_name: impl Into<String>, handler: InvocationHandler) {
        let method_name = method_name.into();
        let previous = self.handlers.lock().insert(method_name.clone(), handler);

        if previous.is_some() {
            warn!(method = %method_name, "Handler replaced by duplicate registration");
        } else {
            trace!(method = %method_name, "Handler registered");
        }
    }

    /// Removes the handler registered under `method_name`.
    ///
    /// Returns the removed entry, if any.
    pub fn remove(&self, method_name: &str) -> Option<InvocationHandler> {
        self.handlers.lock().remove(method_name)
    }

    /// Returns `true` if a handler is registered under `method_name`.
    #[must_use]
    pub fn contains(&self, method_name: &str) -> bool {
        self.handlers.lock().contains_key(method_name)
    }

    /// Returns the handler registered under `method_name`.
    #[must_use]
    pub fn get(&self, method_name: &str) -> Option<InvocationHandler> {
        self.handlers.lock().get(method_name).cloned()
    }

    /// Returns the number of registered handlers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Returns `true` if no handlers are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Returns the registered method names, sorted.
    #[must_use]
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.lock().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Calls the handler named by `descriptor` with its arguments.
    ///
    /// The lock is not held while the handler runs.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownMethod`] if no handler is registered under the
    ///   descriptor's method name. No handler is called in that case.
    /// - [`Error::HandlerPanicked`] if the handler panicked.
    pub fn dispatch(&self, descriptor: &InvocationDescriptor) -> Result<()> {
        let handler = self
            .get(&descriptor.method_name)
            .ok_or_else(|| Error::unknown_method(&descriptor.method_name))?;

        trace!(
            method = %descriptor.method_name,
            arguments = descriptor.arguments.len(),
            "Dispatching invocation"
        );

        catch_unwind(AssertUnwindSafe(|| handler.invoke(&descriptor.arguments))).map_err(
            |payload| Error::handler_panicked(&descriptor.method_name, panic_message(&*payload)),
        )
    }
}

/// Extracts the message of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("methods", &self.method_names())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
