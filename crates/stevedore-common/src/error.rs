//! Unified error types for the stevedore workspace.
//!
//! Configuration problems are always reported as [`StevedoreError::Config`]
//! before the engine is contacted. Failures raised by the container engine
//! travel unchanged inside [`StevedoreError::Engine`].

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StevedoreError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Which field is invalid and why.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// Scaling was requested for a service that publishes host ports.
    #[error(
        "service \"{service}\" cannot be scaled because it binds host ports; \
         remove the host side of its port mappings first"
    )]
    CannotScale {
        /// Name of the service.
        service: String,
    },

    /// The container engine reported a failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl StevedoreError {
    /// Shorthand for building a [`StevedoreError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this error is the engine's "no such image" failure.
    #[must_use]
    pub const fn is_missing_image(&self) -> bool {
        matches!(self, Self::Engine(EngineError::NoSuchImage(_)))
    }
}

/// Errors surfaced by a container engine implementation.
///
/// These are opaque to the orchestrator: apart from `NoSuchImage` during
/// container creation, they are handed back to the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The referenced image does not exist locally.
    #[error("no such image: {0}")]
    NoSuchImage(String),

    /// The referenced container does not exist.
    #[error("no such container: {0}")]
    NoSuchContainer(String),

    /// The request conflicts with existing engine state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The engine could not be reached or returned a malformed reply.
    #[error("engine request failed: {0}")]
    Transport(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StevedoreError>;
