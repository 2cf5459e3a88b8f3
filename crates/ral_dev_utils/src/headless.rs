//! Headless Backend
//!
//! A [`Backend`] that allocates nothing. Every call is recorded in a
//! [`Journal`] that tests keep a clone of after the backend has been moved
//! into a context:
//!
//! - creations, releases and uploads, in call order
//! - the thread of the first call, and every call made from another thread
//! - scripted failures (fail the n-th creation, or every upload)

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use ral_core::{
    Backend, BackendError, BackendProperty, CreateInfo, ImageData, ObjectKind, PropertyValue,
};
use rustc_hash::FxHashMap;

/// Native object handed out by [`HeadlessBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessObject {
    /// Unique per backend, in creation order starting at 1.
    pub id: u64,
    pub kind: ObjectKind,
    pub debug_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Created { id: u64, kind: ObjectKind, debug_name: String },
    Released { id: u64, kind: ObjectKind },
    Uploaded { id: u64, bytes: usize },
}

#[derive(Debug, Default)]
struct JournalInner {
    entries: Vec<JournalEntry>,
    live: FxHashMap<u64, ObjectKind>,
    bound_thread: Option<ThreadId>,
    foreign_calls: usize,
    fail_on_create: Option<usize>,
    creates_attempted: usize,
    fail_uploads: bool,
}

/// Shared view of everything a [`HeadlessBackend`] did.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<JournalInner>>,
}

impl Journal {
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.inner.lock().entries.clone()
    }

    /// Number of objects created and not yet released.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.inner.lock().live.len()
    }

    #[must_use]
    pub fn live_of(&self, kind: ObjectKind) -> usize {
        self.inner.lock().live.values().filter(|k| **k == kind).count()
    }

    #[must_use]
    pub fn created(&self, kind: ObjectKind) -> usize {
        self.count(|entry| matches!(entry, JournalEntry::Created { kind: k, .. } if *k == kind))
    }

    #[must_use]
    pub fn released(&self, kind: ObjectKind) -> usize {
        self.count(|entry| matches!(entry, JournalEntry::Released { kind: k, .. } if *k == kind))
    }

    #[must_use]
    pub fn uploads(&self) -> usize {
        self.count(|entry| matches!(entry, JournalEntry::Uploaded { .. }))
    }

    /// Thread that made the first backend call.
    #[must_use]
    pub fn bound_thread(&self) -> Option<ThreadId> {
        self.inner.lock().bound_thread
    }

    /// Backend calls made from any thread other than [`bound_thread`](Self::bound_thread).
    #[must_use]
    pub fn foreign_thread_calls(&self) -> usize {
        self.inner.lock().foreign_calls
    }

    /// Makes the `n`-th creation from now (0-based) fail with
    /// [`BackendError::OutOfMemory`]. One-shot.
    pub fn fail_on_create(&self, n: usize) {
        let mut inner = self.inner.lock();
        inner.fail_on_create = Some(inner.creates_attempted + n);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.inner.lock().fail_uploads = fail;
    }

    fn count(&self, pred: impl Fn(&JournalEntry) -> bool) -> usize {
        self.inner.lock().entries.iter().filter(|entry| pred(entry)).count()
    }
}

impl JournalInner {
    fn check_thread(&mut self) {
        let current = thread::current().id();
        match self.bound_thread {
            None => self.bound_thread = Some(current),
            Some(bound) if bound != current => {
                self.foreign_calls += 1;
                log::error!("Headless backend called from {current:?}, bound to {bound:?}");
            }
            Some(_) => {}
        }
    }
}

/// Backend without a device.
#[derive(Debug)]
pub struct HeadlessBackend {
    journal: Journal,
    next_id: u64,
    properties: FxHashMap<BackendProperty, PropertyValue>,
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        let mut properties = FxHashMap::default();
        properties.insert(BackendProperty::Name, PropertyValue::Text("headless".to_owned()));
        properties.insert(BackendProperty::MaxTextureDimension2d, PropertyValue::U32(8192));
        properties.insert(BackendProperty::MaxSampleCount, PropertyValue::U32(4));
        properties.insert(BackendProperty::MaxAnisotropy, PropertyValue::F32(16.0));
        properties.insert(BackendProperty::UniformBufferOffsetAlignment, PropertyValue::U32(256));
        properties.insert(BackendProperty::StorageBufferOffsetAlignment, PropertyValue::U32(256));
        properties.insert(BackendProperty::SupportsCompute, PropertyValue::Bool(true));

        Self {
            journal: Journal::default(),
            next_id: 1,
            properties,
        }
    }

    /// Clone of the journal, valid after the backend is moved away.
    #[must_use]
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    #[must_use]
    pub fn with_property(mut self, property: BackendProperty, value: PropertyValue) -> Self {
        self.properties.insert(property, value);
        self
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HeadlessBackend {
    type Object = HeadlessObject;

    fn create_object(
        &mut self,
        info: &CreateInfo,
        debug_name: &str,
    ) -> Result<Self::Object, BackendError> {
        let mut journal = self.journal.inner.lock();
        journal.check_thread();

        let attempt = journal.creates_attempted;
        journal.creates_attempted += 1;
        if journal.fail_on_create == Some(attempt) {
            journal.fail_on_create = None;
            return Err(BackendError::OutOfMemory);
        }

        if let CreateInfo::Texture(texture) = info {
            let limit = self
                .properties
                .get(&BackendProperty::MaxTextureDimension2d)
                .and_then(PropertyValue::as_u32)
                .unwrap_or(u32::MAX);
            let desc = &texture.descriptor;
            if desc.width == 0 || desc.height == 0 || desc.width > limit || desc.height > limit {
                return Err(BackendError::Rejected(format!(
                    "texture extent {}x{} outside 1..={limit}",
                    desc.width, desc.height
                )));
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let kind = info.kind();
        journal.live.insert(id, kind);
        journal.entries.push(JournalEntry::Created {
            id,
            kind,
            debug_name: debug_name.to_owned(),
        });
        Ok(HeadlessObject {
            id,
            kind,
            debug_name: debug_name.to_owned(),
        })
    }

    fn release_object(&mut self, kind: ObjectKind, object: Self::Object) {
        let mut journal = self.journal.inner.lock();
        journal.check_thread();
        debug_assert_eq!(kind, object.kind);
        if journal.live.remove(&object.id).is_none() {
            log::error!("Headless backend released unknown object {}", object.id);
        }
        journal.entries.push(JournalEntry::Released { id: object.id, kind });
    }

    fn upload_texture_data(
        &mut self,
        texture: &Self::Object,
        image: &ImageData,
    ) -> Result<(), BackendError> {
        let mut journal = self.journal.inner.lock();
        journal.check_thread();
        if journal.fail_uploads {
            return Err(BackendError::UploadFailed(format!(
                "scripted failure for object {}",
                texture.id
            )));
        }
        journal.entries.push(JournalEntry::Uploaded {
            id: texture.id,
            bytes: image.data.len(),
        });
        Ok(())
    }

    fn get_property(&self, property: BackendProperty) -> Option<PropertyValue> {
        self.journal.inner.lock().check_thread();
        self.properties.get(&property).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ral_core::{BufferCreateInfo, wgpu};

    fn buffer() -> CreateInfo {
        BufferCreateInfo::new(16, wgpu::BufferUsages::UNIFORM).into()
    }

    #[test]
    fn journal_tracks_live_objects() {
        let mut backend = HeadlessBackend::new();
        let journal = backend.journal();

        let a = backend.create_object(&buffer(), "a").unwrap();
        let b = backend.create_object(&buffer(), "b").unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(journal.live_objects(), 2);

        backend.release_object(ObjectKind::Buffer, a);
        assert_eq!(journal.live_objects(), 1);
        assert_eq!(journal.created(ObjectKind::Buffer), 2);
        assert_eq!(journal.released(ObjectKind::Buffer), 1);
    }

    #[test]
    fn scripted_failure_is_one_shot() {
        let mut backend = HeadlessBackend::new();
        let journal = backend.journal();
        journal.fail_on_create(1);

        assert!(backend.create_object(&buffer(), "ok").is_ok());
        assert_eq!(
            backend.create_object(&buffer(), "boom").unwrap_err(),
            BackendError::OutOfMemory
        );
        assert!(backend.create_object(&buffer(), "ok again").is_ok());
    }

    #[test]
    fn calls_from_another_thread_are_counted() {
        let mut backend = HeadlessBackend::new();
        let journal = backend.journal();
        let _ = backend.get_property(BackendProperty::Name);

        let handle = thread::spawn(move || {
            let _ = backend.create_object(&buffer(), "elsewhere");
        });
        handle.join().unwrap();

        assert_eq!(journal.bound_thread(), Some(thread::current().id()));
        assert_eq!(journal.foreign_thread_calls(), 1);
    }
}
