//! Batch creation.
//!
//! ```text
//! validate ─► precheck names ─► reserve ids ─► pool lookup (textures)
//!    ─► render thread: construct fresh / upload initial data
//!    ─► register (registry → table) ─► claim names ─► track ─► Created
//! ```
//!
//! Any failure rolls the whole batch back: fresh natives are released on the
//! render thread and pool hits go back to the pool.

use std::sync::Arc;

use parking_lot::Mutex;
use ral_core::{
    Backend, BackendError, ContextEvent, CreateInfo, EventPayload, HandleList, NameNamespace,
    ObjectHandle, ObjectKind, RalError, Result,
};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::ResourceContext;
use crate::object_table::{ObjectRecord, ObjectTable, RecordState, TextureMeta};

/// Where each batch item comes from.
enum Planned {
    Fresh { debug_name: String },
    Reused(ObjectHandle),
}

/// Render-thread output for one batch item.
enum Built<O> {
    Fresh { native: O, debug_name: String },
    Reused(ObjectHandle),
}

impl<B: Backend> ResourceContext<B> {
    /// Creates one object per create-info, all of `kind`.
    ///
    /// Either every object is created and registered, or none is. Textures
    /// are served from the pool when an idle texture with an identical
    /// descriptor exists; the returned handle is then the pooled one.
    pub fn create_objects(
        &self,
        kind: ObjectKind,
        infos: &[CreateInfo],
    ) -> Result<Vec<ObjectHandle>> {
        Self::ensure_non_empty("create_objects", infos.len())?;
        if let Some((index, info)) = infos
            .iter()
            .enumerate()
            .find(|(_, info)| info.kind() != kind)
        {
            return Err(RalError::InvalidArgument(format!(
                "create_objects({kind}): item {index} is a {} create info",
                info.kind()
            )));
        }
        self.precheck_names(infos)?;

        let plan = self.plan_batch(kind, infos);
        let reused: HandleList = plan
            .iter()
            .filter_map(|planned| match planned {
                Planned::Reused(handle) => Some(*handle),
                Planned::Fresh { .. } => None,
            })
            .collect();

        let built = match self.build_on_render_thread(kind, infos, plan) {
            Ok(Ok(built)) => built,
            Ok(Err((index, source))) => {
                self.restore_pooled(&reused);
                log::debug!("create_objects({kind}) failed at item {index}: {source}");
                return Err(RalError::CreationFailure { kind, index, source });
            }
            Err(err) => {
                self.restore_pooled(&reused);
                return Err(err);
            }
        };

        let (handles, fresh) = self.register(kind, infos, built);

        let claims = infos
            .iter()
            .zip(&handles)
            .flat_map(|(info, &handle)| {
                info.names()
                    .into_iter()
                    .map(move |(ns, name)| (ns, name, handle))
            });
        if let Err(err) = self.shared.names.insert_all(claims) {
            self.unregister_batch(kind, &handles, &fresh);
            return Err(err);
        }

        if kind == ObjectKind::Texture {
            for (info, &handle) in infos.iter().zip(&handles) {
                if let Some(texture) = info.as_texture()
                    && fresh.contains(&handle)
                {
                    self.shared.texture_pool.track(handle, texture.descriptor);
                }
            }
        }

        log::debug!(
            "Created {} {kind}(s) ({} from pool)",
            handles.len(),
            handles.len() - fresh.len()
        );
        if !fresh.is_empty() {
            self.shared
                .callbacks
                .publish(&EventPayload::objects(ContextEvent::Created(kind), &fresh));
        }
        Ok(handles)
    }

    /// Fails early on names that are taken or repeated within the batch.
    /// `insert_all` still guards against concurrent batches claiming the same
    /// name in between.
    fn precheck_names(&self, infos: &[CreateInfo]) -> Result<()> {
        let mut seen: FxHashSet<(NameNamespace, &str)> = FxHashSet::default();
        for info in infos {
            for (namespace, name) in info.names() {
                if !seen.insert((namespace, name)) {
                    return Err(RalError::NameCollision {
                        namespace,
                        name: name.to_owned(),
                    });
                }
                self.shared.names.ensure_free(namespace, name)?;
            }
        }
        Ok(())
    }

    fn plan_batch(&self, kind: ObjectKind, infos: &[CreateInfo]) -> Vec<Planned> {
        let first_id = self.shared.registries.lock(kind).reserve_ids(infos.len());
        let synthesize = self.shared.settings.synthesize_debug_names;

        infos
            .iter()
            .zip(first_id..)
            .map(|(info, id)| {
                if let Some(texture) = info.as_texture()
                    && let Some(handle) = self.shared.texture_pool.take(&texture.descriptor)
                {
                    return Planned::Reused(handle);
                }
                let debug_name = match info.label() {
                    Some(label) => label.to_owned(),
                    None if synthesize => format!("{kind} {id}"),
                    None => kind.name().to_owned(),
                };
                Planned::Fresh { debug_name }
            })
            .collect()
    }

    /// Runs the backend half of the batch as one render-thread task. On
    /// backend failure every native built by the task is released before it
    /// returns.
    #[allow(clippy::type_complexity)]
    fn build_on_render_thread(
        &self,
        kind: ObjectKind,
        infos: &[CreateInfo],
        plan: Vec<Planned>,
    ) -> Result<std::result::Result<Vec<Built<B::Object>>, (usize, BackendError)>> {
        let backend = Arc::clone(&self.shared.backend);
        let objects = Arc::clone(&self.shared.objects);
        let infos: Vec<CreateInfo> = infos.to_vec();

        self.shared
            .dispatcher
            .request_blocking(move || build_batch(&backend, &objects, kind, &infos, plan))
    }

    /// Inserts fresh records, revives reused ones and registers all of them.
    /// Returns every handle in batch order and the freshly constructed subset.
    fn register(
        &self,
        kind: ObjectKind,
        infos: &[CreateInfo],
        built: Vec<Built<B::Object>>,
    ) -> (Vec<ObjectHandle>, HandleList) {
        let mut handles = Vec::with_capacity(built.len());
        let mut fresh = HandleList::new();

        let mut registry = self.shared.registries.lock(kind);
        let mut map = self.shared.objects.lock();
        for (info, item) in infos.iter().zip(built) {
            let names: SmallVec<[(NameNamespace, String); 2]> = info
                .names()
                .into_iter()
                .map(|(ns, name)| (ns, name.to_owned()))
                .collect();
            let texture = info.as_texture().map(|texture| TextureMeta {
                descriptor: texture.descriptor,
                unique_name: texture.unique_name.clone(),
                filename: texture.filename.clone(),
                description: texture.description.clone(),
            });

            let handle = match item {
                Built::Fresh { native, debug_name } => {
                    let mut record = ObjectRecord::new(kind, native, debug_name);
                    record.names = names;
                    record.texture = texture;
                    let handle = map.insert(record);
                    fresh.push(handle);
                    handle
                }
                Built::Reused(handle) => {
                    let Some(record) = map.get_mut(handle) else {
                        unreachable!("pooled texture {handle:?} vanished while handed out");
                    };
                    debug_assert_eq!(record.state, RecordState::Pooled);
                    record.refcount += 1;
                    record.state = RecordState::Live;
                    record.names = names;
                    record.texture = texture;
                    if let Some(label) = info.label() {
                        label.clone_into(&mut record.debug_name);
                    }
                    handle
                }
            };
            registry.insert(handle);
            handles.push(handle);
        }
        (handles, fresh)
    }

    /// Undoes [`register`](Self::register) after a name collision.
    fn unregister_batch(&self, kind: ObjectKind, handles: &[ObjectHandle], fresh: &[ObjectHandle]) {
        let mut natives = Vec::with_capacity(fresh.len());
        let mut reused = HandleList::new();
        {
            let mut registry = self.shared.registries.lock(kind);
            let mut map = self.shared.objects.lock();
            registry.remove_all(handles);
            for &handle in handles {
                if fresh.contains(&handle) {
                    if let Some(record) = map.remove(handle) {
                        natives.push(record.native);
                    }
                } else if let Some(record) = map.get_mut(handle) {
                    record.refcount -= 1;
                    record.state = RecordState::Pooled;
                    record.names.clear();
                    reused.push(handle);
                }
            }
        }

        if let Err(err) = self.shared.release_natives(kind, natives) {
            log::error!("Failed to roll back {kind} batch: {err}");
        }
        self.restore_pooled(&reused);
    }

    /// Hands pool hits of a failed batch back to the pool, destroying the ones
    /// it refuses.
    fn restore_pooled(&self, handles: &[ObjectHandle]) {
        let refused: HandleList = handles
            .iter()
            .copied()
            .filter(|&handle| !self.shared.texture_pool.park(handle))
            .collect();
        if let Err(err) = self.shared.destroy_textures(&refused) {
            log::error!("Failed to destroy {} refused texture(s): {err}", refused.len());
        }
    }
}

/// Render-thread half of a batch. Lock order: backend, then object table.
fn build_batch<B: Backend>(
    backend: &Mutex<B>,
    objects: &ObjectTable<B::Object>,
    kind: ObjectKind,
    infos: &[CreateInfo],
    plan: Vec<Planned>,
) -> std::result::Result<Vec<Built<B::Object>>, (usize, BackendError)> {
    let mut backend = backend.lock();
    let mut built: Vec<Built<B::Object>> = Vec::with_capacity(plan.len());

    for (index, (info, planned)) in infos.iter().zip(plan).enumerate() {
        let initial_data = info.as_texture().and_then(|texture| texture.initial_data.as_ref());

        let outcome = match planned {
            Planned::Fresh { debug_name } => match backend.create_object(info, &debug_name) {
                Ok(native) => {
                    let uploaded =
                        initial_data.map(|image| backend.upload_texture_data(&native, image));
                    match uploaded {
                        Some(Err(err)) => {
                            backend.release_object(kind, native);
                            Err(err)
                        }
                        _ => Ok(Built::Fresh { native, debug_name }),
                    }
                }
                Err(err) => Err(err),
            },
            Planned::Reused(handle) => match initial_data {
                Some(image) => {
                    let map = objects.lock();
                    match map.get(handle) {
                        Some(record) => backend
                            .upload_texture_data(&record.native, image)
                            .map(|()| Built::Reused(handle)),
                        None => Err(BackendError::Rejected(format!(
                            "pooled texture {handle:?} is missing its native"
                        ))),
                    }
                }
                None => Ok(Built::Reused(handle)),
            },
        };

        match outcome {
            Ok(item) => built.push(item),
            Err(err) => {
                for item in built {
                    if let Built::Fresh { native, .. } = item {
                        backend.release_object(kind, native);
                    }
                }
                return Err((index, err));
            }
        }
    }
    Ok(built)
}
