//! Lifecycle Event Ids
//!
//! Events published on the context's callback bus.
//!
//! | Event | When |
//! |-------|------|
//! | `Created(kind)` | after a batch registers freshly constructed objects (pool reuse is silent) |
//! | `AboutToBeDeleted(kind)` | the last user reference was dropped; handles are still resolvable |
//! | `Deleted(kind)` | the backend object was destroyed; handles are stale |
//! | `ContextAboutToRelease` | teardown starts, before the pool is emptied |

use std::fmt;

use crate::handle::ObjectHandle;
use crate::kind::ObjectKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextEvent {
    Created(ObjectKind),
    AboutToBeDeleted(ObjectKind),
    Deleted(ObjectKind),
    ContextAboutToRelease,
}

impl ContextEvent {
    /// Kind the event refers to, if any.
    #[must_use]
    pub fn kind(self) -> Option<ObjectKind> {
        match self {
            Self::Created(kind) | Self::AboutToBeDeleted(kind) | Self::Deleted(kind) => Some(kind),
            Self::ContextAboutToRelease => None,
        }
    }
}

impl fmt::Display for ContextEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(kind) => write!(f, "{kind}s created"),
            Self::AboutToBeDeleted(kind) => write!(f, "{kind}s about to be deleted"),
            Self::Deleted(kind) => write!(f, "{kind}s deleted"),
            Self::ContextAboutToRelease => f.write_str("context about to release"),
        }
    }
}

/// Payload delivered with every event.
#[derive(Debug, Clone, Copy)]
pub struct EventPayload<'a> {
    pub event: ContextEvent,
    /// Affected objects; empty for `ContextAboutToRelease`.
    pub handles: &'a [ObjectHandle],
}

impl<'a> EventPayload<'a> {
    #[must_use]
    pub fn objects(event: ContextEvent, handles: &'a [ObjectHandle]) -> Self {
        Self { event, handles }
    }

    #[must_use]
    pub fn context(event: ContextEvent) -> Self {
        Self { event, handles: &[] }
    }
}
