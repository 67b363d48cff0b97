//! Error types for the bridge.
//!
//! Every variant is a misuse of the construction or consumption contract.
//! None of them is transient, so nothing here is retried.

use thiserror::Error;

/// Errors raised by stores, selectors, providers and consumers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A consumption accessor ran with no provider scope above it.
    #[error("`{accessor}` must be used within a `StoreProvider` scope")]
    MissingProvider { accessor: &'static str },

    /// A selector was requested for a field the container never declared.
    #[error("field `{field}` is not part of the store's tracked state")]
    UndeclaredField { field: String },

    /// A declared field is absent from the container when read.
    #[error("container no longer holds tracked field `{field}`")]
    ContainerInvariant { field: String },

    /// A field exists but holds a value of another type.
    #[error("field `{field}` holds `{found}`, not `{expected}`")]
    FieldType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// No method with this name was exposed by the source computation.
    #[error("no method named `{name}` was exposed")]
    UnknownMethod { name: String },

    /// A method was called with a signature it was not created with.
    #[error("method `{name}` is `{found}`, not `{expected}`")]
    MethodSignature {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A declared key resolved to the wrong kind of slot.
    #[error("key `{key}` is not a {expected}")]
    SlotKind { key: String, expected: &'static str },

    /// A recomputation produced a tracked key set different from the first one.
    #[error("tracked keys changed from {expected:?} to {found:?}")]
    ShapeChanged {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Hooks were called in a different order or number than on the first render.
    #[error("hook #{index} does not match the previous render")]
    HookOrder { index: usize },
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
