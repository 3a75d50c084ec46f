//! Error types for Stepline.
//!
//! Errors cover structural wiring mistakes and configuration problems.
//! In-cycle process failure is not an error: it travels through the
//! [`StepStatus`](crate::status::StepStatus) lattice instead.

use thiserror::Error;

/// Result type alias using Stepline's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Stepline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A node lookup by name or id failed.
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    /// Two nodes were added under the same name.
    #[error("duplicate node name '{0}'")]
    DuplicateName(String),

    /// Connecting two nodes would create a cycle in the graph.
    #[error("connecting '{from}' to '{to}' would create a cycle")]
    WouldCycle {
        /// Name of the upstream node.
        from: String,
        /// Name of the downstream node.
        to: String,
    },

    /// A data transfer failed to downcast at either end of an edge.
    #[error("type mismatch on edge '{from}:{from_port}' -> '{to}:{to_port}'")]
    PortType {
        /// Name of the upstream node.
        from: String,
        /// Output port name on the upstream node.
        from_port: String,
        /// Name of the downstream node.
        to: String,
        /// Input port name on the downstream node.
        to_port: String,
    },

    /// A process reported failure from its initialize hook.
    #[error("process '{0}' failed to initialize")]
    InitializeFailed(String),

    /// The pipeline was stepped before `initialize()` was called.
    #[error("pipeline has not been initialized")]
    NotInitialized,

    /// A configuration value was missing or failed to parse.
    #[error("invalid configuration for '{key}': {message}")]
    Config {
        /// The configuration key that was rejected.
        key: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The pipeline structure is not runnable.
    #[error("invalid pipeline: {0}")]
    Invalid(String),
}
