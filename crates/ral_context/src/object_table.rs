//! Object table: handle → refcount and record.
//!
//! The single source of truth for liveness. Registries and name indices are
//! derived bookkeeping that agree with it.

use parking_lot::{Mutex, MutexGuard};
use ral_core::{NameNamespace, ObjectHandle, ObjectKind, RalError, Result, TextureDescriptor};
use slotmap::SlotMap;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Visible to users.
    Live,
    /// Count reached the release threshold inside a delete that has not
    /// finished yet.
    Releasing,
    /// Texture idle in the pool, held only by the pool's standing reference.
    Pooled,
}

/// Texture-only metadata, replaced in place when the pool hands the texture
/// out again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureMeta {
    pub descriptor: TextureDescriptor,
    pub unique_name: Option<String>,
    pub filename: Option<String>,
    pub description: Option<String>,
}

pub(crate) struct ObjectRecord<O> {
    pub kind: ObjectKind,
    pub refcount: u32,
    pub state: RecordState,
    pub native: O,
    pub debug_name: String,
    pub names: SmallVec<[(NameNamespace, String); 2]>,
    pub texture: Option<TextureMeta>,
}

impl<O> ObjectRecord<O> {
    pub(crate) fn new(kind: ObjectKind, native: O, debug_name: String) -> Self {
        Self {
            kind,
            refcount: kind.initial_refcount(),
            state: RecordState::Live,
            native,
            debug_name,
            names: SmallVec::new(),
            texture: None,
        }
    }

    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.state == RecordState::Live
    }

    /// User references still outstanding.
    #[inline]
    pub(crate) fn user_refs(&self) -> u32 {
        self.refcount.saturating_sub(self.kind.release_threshold())
    }
}

pub(crate) type ObjectMap<O> = SlotMap<ObjectHandle, ObjectRecord<O>>;

pub(crate) struct ObjectTable<O> {
    inner: Mutex<ObjectMap<O>>,
}

impl<O> ObjectTable<O> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(SlotMap::with_key()),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ObjectMap<O>> {
        self.inner.lock()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Resolves `handle` to a live record of `kind`.
pub(crate) fn live_record<O>(
    map: &ObjectMap<O>,
    kind: ObjectKind,
    handle: ObjectHandle,
) -> Result<&ObjectRecord<O>> {
    match map.get(handle) {
        Some(record) if record.kind == kind && record.is_live() => Ok(record),
        _ => Err(RalError::UnknownObject { kind, handle }),
    }
}
