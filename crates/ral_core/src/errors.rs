//! Error Types
//!
//! This module defines the error types shared by every RAL crate.
//!
//! # Overview
//!
//! The main error type [`RalError`] covers all failure modes of the resource
//! context:
//! - Invalid input (empty batches, mismatched create-info payloads)
//! - Name collisions in the program / shader / texture namespaces
//! - Backend construction failures (which roll back the whole batch)
//! - Operations on handles that are not (or no longer) live
//! - Teardown-time leak reports
//! - Render-thread dispatch failures
//! - Render-thread spawn failures
//!
//! Backends report their own failures through [`BackendError`], which the
//! context wraps into [`RalError::CreationFailure`].
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, RalError>`.
//!
//! ```rust,ignore
//! use ral_core::errors::{RalError, Result};
//!
//! fn delete_twice(ctx: &ResourceContext<B>, h: ObjectHandle) -> Result<()> {
//!     ctx.delete_objects(ObjectKind::Buffer, &[h])?;
//!     match ctx.delete_objects(ObjectKind::Buffer, &[h]) {
//!         Err(RalError::UnknownObject { .. }) => Ok(()),
//!         other => other,
//!     }
//! }
//! ```

use std::fmt;

use thiserror::Error;

use crate::handle::ObjectHandle;
use crate::kind::ObjectKind;

/// Namespaces in which object names must be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameNamespace {
    /// `ProgramCreateInfo::name`
    Program,
    /// `ShaderCreateInfo::name`
    Shader,
    /// `TextureCreateInfo::unique_name`
    Texture,
    /// `TextureCreateInfo::filename`
    TextureFile,
}

impl NameNamespace {
    pub const ALL: [NameNamespace; 4] = [
        NameNamespace::Program,
        NameNamespace::Shader,
        NameNamespace::Texture,
        NameNamespace::TextureFile,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for NameNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Program => "program",
            Self::Shader => "shader",
            Self::Texture => "texture",
            Self::TextureFile => "texture file",
        };
        f.write_str(s)
    }
}

/// A single leaked registry found at teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeakReport {
    pub kind: ObjectKind,
    pub live_objects: usize,
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.kind, self.live_objects)
    }
}

/// Failure reported by a [`Backend`](crate::backend::Backend) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend does not support the requested configuration.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The device ran out of memory.
    #[error("out of device memory")]
    OutOfMemory,

    /// The create-info payload was rejected by the backend.
    #[error("rejected create info: {0}")]
    Rejected(String),

    /// Pixel data upload failed.
    #[error("texture upload failed: {0}")]
    UploadFailed(String),
}

/// The main error type for the RAL resource context.
#[derive(Error, Debug)]
pub enum RalError {
    // ========================================================================
    // Caller Errors
    // ========================================================================
    /// Empty batch, mismatched payload kind or an operation the kind forbids.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A name is already taken in its namespace.
    #[error("Name collision: {namespace} name '{name}' is already in use")]
    NameCollision {
        /// Namespace the name was inserted into
        namespace: NameNamespace,
        /// The duplicate name
        name: String,
    },

    /// The handle is absent from the object table, belongs to another kind,
    /// or has already dropped its last user reference.
    #[error("Unknown {kind} object: {handle:?}")]
    UnknownObject {
        /// Kind the operation was issued for
        kind: ObjectKind,
        /// The offending handle
        handle: ObjectHandle,
    },

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The backend failed to construct the `index`-th object of a batch.
    /// Every object built earlier in the same batch has been rolled back.
    #[error("Failed to create {kind} #{index}: {source}")]
    CreationFailure {
        /// Kind of the batch
        kind: ObjectKind,
        /// Position of the failing create-info in the batch
        index: usize,
        /// Backend-provided reason
        #[source]
        source: BackendError,
    },

    // ========================================================================
    // Teardown Errors
    // ========================================================================
    /// Registries were not empty when the context was torn down.
    #[error("Leak detected at context teardown: {}", format_leaks(.0))]
    LeakDetected(Vec<LeakReport>),

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// The render thread is gone; the task could not be enqueued.
    #[error("Render-thread dispatcher is closed")]
    DispatcherClosed,

    /// The task was dropped or panicked before completing.
    #[error("Render-thread task was abandoned before completion")]
    TaskAbandoned,

    /// A render-thread-only operation was called from another thread.
    #[error("'{0}' must be called on the render thread")]
    WrongThread(&'static str),

    /// Spawning the render thread failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn format_leaks(leaks: &[LeakReport]) -> String {
    leaks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Alias for `Result<T, RalError>`.
pub type Result<T> = std::result::Result<T, RalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leak_message_lists_every_kind() {
        let err = RalError::LeakDetected(vec![
            LeakReport {
                kind: ObjectKind::Buffer,
                live_objects: 2,
            },
            LeakReport {
                kind: ObjectKind::Texture,
                live_objects: 1,
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Leak detected at context teardown: Buffer x2, Texture x1"
        );
    }

    #[test]
    fn creation_failure_exposes_backend_source() {
        use std::error::Error as _;

        let err = RalError::CreationFailure {
            kind: ObjectKind::Shader,
            index: 3,
            source: BackendError::OutOfMemory,
        };
        assert!(err.to_string().contains("Shader #3"));
        assert_eq!(
            err.source().map(ToString::to_string),
            Some("out of device memory".to_string())
        );
    }
}
