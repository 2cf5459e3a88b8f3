//! Resource Context
//!
//! The core of RAL: owns every backend object created through it and tracks
//! its reference count, registry membership and names.
//!
//! # Structure
//!
//! ```text
//! ResourceContext<B>
//!  └─ Arc<Shared<B>>
//!      ├─ Registries          one lock per ObjectKind (insertion-ordered handles + id counter)
//!      ├─ ObjectTable         one lock, handle → record (refcount, state, native, names)
//!      ├─ NameIndex           one lock per namespace
//!      ├─ TexturePool         idle textures, attached back to Shared as its PoolOwner
//!      ├─ CallbackBus         lifecycle events
//!      ├─ Arc<Dispatcher>     render-thread queue
//!      └─ Arc<Mutex<B>>       only ever locked on the render thread
//! ```
//!
//! # Lock Order
//!
//! `backend → registry → object table`. Name-index and pool locks are never
//! held together with any other lock, and no lock is held while waiting on
//! the render thread.

mod create;
mod lifetime;
mod teardown;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use ral_core::{
    Backend, BackendProperty, ContextEvent, EventPayload, NameNamespace, ObjectHandle, ObjectKind,
    PropertyValue, RalError, Result,
};

use crate::callbacks::CallbackBus;
use crate::dispatcher::Dispatcher;
use crate::name_index::NameIndex;
use crate::object_table::{ObjectTable, RecordState, TextureMeta, live_record};
use crate::registry::Registries;
use crate::settings::ContextSettings;
use crate::texture_pool::{PoolOwner, TexturePool};

pub(crate) struct Shared<B: Backend> {
    pub(crate) settings: ContextSettings,
    pub(crate) backend: Arc<Mutex<B>>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) registries: Registries,
    pub(crate) objects: Arc<ObjectTable<B::Object>>,
    pub(crate) names: NameIndex,
    pub(crate) texture_pool: Arc<TexturePool>,
    pub(crate) callbacks: CallbackBus,
    pub(crate) frame_index: AtomicU64,
}

impl<B: Backend> Shared<B> {
    /// Releases natives through the backend on the render thread.
    pub(crate) fn release_natives(&self, kind: ObjectKind, natives: Vec<B::Object>) -> Result<()> {
        if natives.is_empty() {
            return Ok(());
        }
        let backend = Arc::clone(&self.backend);
        self.dispatcher.request_blocking(move || {
            let mut backend = backend.lock();
            for native in natives {
                backend.release_object(kind, native);
            }
        })
    }

    /// Destroys textures that are no longer referenced by users (pooled or
    /// refused by the pool): removes their records, releases the natives and
    /// publishes `Deleted(Texture)`.
    pub(crate) fn destroy_textures(&self, handles: &[ObjectHandle]) -> Result<()> {
        if handles.is_empty() {
            return Ok(());
        }

        let (destroyed, natives): (Vec<ObjectHandle>, Vec<B::Object>) = {
            let mut map = self.objects.lock();
            handles
                .iter()
                .filter_map(|&handle| map.remove(handle).map(|record| (handle, record.native)))
                .unzip()
        };
        for &handle in &destroyed {
            self.texture_pool.forget(handle);
        }

        self.release_natives(ObjectKind::Texture, natives)?;
        log::debug!("Destroyed {} texture(s)", destroyed.len());
        self.callbacks.publish(&EventPayload::objects(
            ContextEvent::Deleted(ObjectKind::Texture),
            &destroyed,
        ));
        Ok(())
    }
}

impl<B: Backend> PoolOwner for Shared<B> {
    fn destroy_pooled_textures(&self, handles: &[ObjectHandle]) {
        if let Err(err) = self.destroy_textures(handles) {
            log::error!("Failed to destroy {} pooled texture(s): {err}", handles.len());
        }
    }
}

/// Owns backend objects on behalf of any number of client threads.
///
/// Every backend call happens on the render thread bound to the context's
/// [`Dispatcher`]. Operations called from other threads wait until the render
/// thread has run them, so the render thread must keep draining (see
/// [`end_frame`](Self::end_frame) and [`RenderThread`](crate::RenderThread)).
///
/// Dropping the context without [`shutdown`](Self::shutdown) runs the same
/// teardown and surfaces leaks according to
/// [`LeakPolicy`](crate::LeakPolicy).
pub struct ResourceContext<B: Backend> {
    shared: Arc<Shared<B>>,
    released: bool,
}

impl<B: Backend> ResourceContext<B> {
    /// Creates a context around an already constructed backend.
    pub fn new(backend: B, dispatcher: Arc<Dispatcher>, settings: ContextSettings) -> Self {
        let texture_pool = Arc::new(TexturePool::new(settings.texture_pool.clone()));
        let shared = Arc::new(Shared {
            settings,
            backend: Arc::new(Mutex::new(backend)),
            dispatcher,
            registries: Registries::default(),
            objects: Arc::new(ObjectTable::new()),
            names: NameIndex::default(),
            texture_pool,
            callbacks: CallbackBus::new(),
            frame_index: AtomicU64::new(0),
        });

        let owner: Weak<Shared<B>> = Arc::downgrade(&shared);
        shared.texture_pool.attach(owner);

        log::info!(
            "ResourceContext created (render thread {:?})",
            shared.dispatcher.render_thread_id()
        );
        Self {
            shared,
            released: false,
        }
    }

    /// Constructs the backend on the render thread, for backends that must be
    /// created on the thread they are used from.
    pub fn with_factory<F>(
        dispatcher: Arc<Dispatcher>,
        settings: ContextSettings,
        factory: F,
    ) -> Result<Self>
    where
        F: FnOnce() -> B + Send + 'static,
    {
        let backend = dispatcher.request_blocking(factory)?;
        Ok(Self::new(backend, dispatcher, settings))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ContextSettings {
        &self.shared.settings
    }

    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.shared.dispatcher
    }

    #[inline]
    #[must_use]
    pub fn callbacks(&self) -> &CallbackBus {
        &self.shared.callbacks
    }

    #[inline]
    #[must_use]
    pub fn texture_pool(&self) -> &Arc<TexturePool> {
        &self.shared.texture_pool
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current reference count of a live object. Textures include the pool's
    /// standing reference.
    #[must_use]
    pub fn refcount(&self, handle: ObjectHandle) -> Option<u32> {
        let map = self.shared.objects.lock();
        map.get(handle)
            .filter(|record| record.is_live())
            .map(|record| record.refcount)
    }

    #[must_use]
    pub fn is_live(&self, handle: ObjectHandle) -> bool {
        self.refcount(handle).is_some()
    }

    #[must_use]
    pub fn kind_of(&self, handle: ObjectHandle) -> Option<ObjectKind> {
        let map = self.shared.objects.lock();
        map.get(handle)
            .filter(|record| record.is_live())
            .map(|record| record.kind)
    }

    /// Number of live objects of `kind`.
    #[must_use]
    pub fn live_count(&self, kind: ObjectKind) -> usize {
        self.shared.registries.len(kind)
    }

    /// Live handles of `kind`, in creation order.
    #[must_use]
    pub fn registered_handles(&self, kind: ObjectKind) -> Vec<ObjectHandle> {
        self.shared.registries.lock(kind).handles().to_vec()
    }

    /// Total number of records, including idle pooled textures.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.shared.objects.len()
    }

    /// Debug label of an object. Also resolves objects whose last reference
    /// is being dropped, so `AboutToBeDeleted` handlers can still label them.
    #[must_use]
    pub fn debug_name(&self, handle: ObjectHandle) -> Option<String> {
        let map = self.shared.objects.lock();
        map.get(handle)
            .filter(|record| record.state != RecordState::Pooled)
            .map(|record| record.debug_name.clone())
    }

    /// Descriptor and names of a live texture.
    #[must_use]
    pub fn texture_info(&self, handle: ObjectHandle) -> Option<TextureMeta> {
        let map = self.shared.objects.lock();
        live_record(&map, ObjectKind::Texture, handle)
            .ok()
            .and_then(|record| record.texture.clone())
    }

    #[must_use]
    pub fn find_program_by_name(&self, name: &str) -> Option<ObjectHandle> {
        self.shared.names.find(NameNamespace::Program, name)
    }

    #[must_use]
    pub fn find_shader_by_name(&self, name: &str) -> Option<ObjectHandle> {
        self.shared.names.find(NameNamespace::Shader, name)
    }

    #[must_use]
    pub fn find_texture_by_name(&self, name: &str) -> Option<ObjectHandle> {
        self.shared.names.find(NameNamespace::Texture, name)
    }

    #[must_use]
    pub fn find_texture_by_filename(&self, filename: &str) -> Option<ObjectHandle> {
        self.shared.names.find(NameNamespace::TextureFile, filename)
    }

    // ========================================================================
    // Render-thread access
    // ========================================================================

    /// Queries the backend on the render thread.
    pub fn backend_property(&self, property: BackendProperty) -> Result<Option<PropertyValue>> {
        let backend = Arc::clone(&self.shared.backend);
        self.shared
            .dispatcher
            .request_blocking(move || backend.lock().get_property(property))
    }

    /// Runs `f` against a live object's native on the render thread.
    ///
    /// The object table stays locked while `f` runs, so `f` must not call
    /// back into the context.
    pub fn with_native<R, F>(&self, kind: ObjectKind, handle: ObjectHandle, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&B::Object) -> R + Send + 'static,
    {
        let objects = Arc::clone(&self.shared.objects);
        self.shared.dispatcher.request_blocking(move || {
            let map = objects.lock();
            live_record(&map, kind, handle).map(|record| f(&record.native))
        })?
    }

    /// Runs `f` against the backend on the render thread.
    ///
    /// `f` must not call back into the context.
    pub fn with_backend<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut B) -> R + Send + 'static,
    {
        let backend = Arc::clone(&self.shared.backend);
        self.shared
            .dispatcher
            .request_blocking(move || f(&mut backend.lock()))
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Render-thread safe point: drains pending requests and runs texture
    /// garbage collection every `gc_interval_frames` frames. Returns the
    /// number of requests executed.
    pub fn end_frame(&self) -> Result<usize> {
        let drained = self.shared.dispatcher.drain()?;

        let frame = self.shared.frame_index.fetch_add(1, Ordering::Relaxed) + 1;
        let interval = u64::from(self.shared.settings.gc_interval_frames);
        if interval > 0 && frame % interval == 0 {
            self.shared.texture_pool.collect_garbage();
        }
        Ok(drained)
    }

    /// Runs texture garbage collection now. Returns `true` if anything was
    /// evicted.
    pub fn collect_texture_garbage(&self) -> bool {
        self.shared.texture_pool.collect_garbage()
    }

    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.shared.frame_index.load(Ordering::Relaxed)
    }

    fn ensure_non_empty(operation: &str, len: usize) -> Result<()> {
        if len == 0 {
            return Err(RalError::InvalidArgument(format!(
                "{operation} requires at least one element"
            )));
        }
        Ok(())
    }
}

impl<B: Backend> std::fmt::Debug for ResourceContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let live: Vec<(ObjectKind, usize)> = ObjectKind::ALL
            .iter()
            .map(|&kind| (kind, self.live_count(kind)))
            .filter(|(_, count)| *count > 0)
            .collect();
        f.debug_struct("ResourceContext")
            .field("live", &live)
            .field("dispatcher", &self.shared.dispatcher)
            .field("texture_pool", &self.shared.texture_pool)
            .field("released", &self.released)
            .finish()
    }
}
