//! Retain / delete.

use std::mem;

use ral_core::{
    Backend, ContextEvent, EventPayload, HandleList, NameNamespace, ObjectHandle, ObjectKind,
    RalError, Result,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::ResourceContext;
use crate::object_table::{ObjectMap, RecordState, live_record};

impl<B: Backend> ResourceContext<B> {
    /// Adds one reference per listed handle. A handle listed twice is retained
    /// twice. Fails without changing anything if any handle is not a live
    /// object of `kind`.
    pub fn retain_objects(&self, kind: ObjectKind, handles: &[ObjectHandle]) -> Result<()> {
        Self::ensure_non_empty("retain_objects", handles.len())?;
        if !kind.is_retainable() {
            return Err(RalError::InvalidArgument(format!("{kind} objects cannot be retained")));
        }

        let mut map = self.shared.objects.lock();
        for &handle in handles {
            live_record(&map, kind, handle)?;
        }
        for &handle in handles {
            if let Some(record) = map.get_mut(handle) {
                record.refcount += 1;
            }
        }
        Ok(())
    }

    /// Drops one reference per listed handle.
    ///
    /// The batch is validated as a whole first: an unknown, stale or
    /// wrong-kind handle, or more deletions of a handle than it has
    /// references, fails with `UnknownObject` and nothing changes.
    ///
    /// Objects whose last reference is dropped publish `AboutToBeDeleted`,
    /// lose their names and registry entry, and are then either parked in the
    /// texture pool (textures) or released on the render thread, which
    /// publishes `Deleted`.
    pub fn delete_objects(&self, kind: ObjectKind, handles: &[ObjectHandle]) -> Result<()> {
        Self::ensure_non_empty("delete_objects", handles.len())?;

        let doomed = {
            let mut map = self.shared.objects.lock();
            validate_decrements(&map, kind, handles)?;
            decrement(&mut map, kind, handles)
        };
        if doomed.is_empty() {
            return Ok(());
        }

        self.shared.callbacks.publish(&EventPayload::objects(
            ContextEvent::AboutToBeDeleted(kind),
            &doomed,
        ));

        let names: Vec<(NameNamespace, String, ObjectHandle)> = {
            let mut map = self.shared.objects.lock();
            doomed
                .iter()
                .filter_map(|&handle| {
                    map.get_mut(handle)
                        .map(|record| (handle, mem::take(&mut record.names)))
                })
                .flat_map(|(handle, names)| {
                    names
                        .into_iter()
                        .map(move |(ns, name)| (ns, name, handle))
                })
                .collect()
        };
        for (namespace, name, handle) in &names {
            self.shared.names.remove(*namespace, name, *handle);
        }
        self.shared.registries.lock(kind).remove_all(&doomed);

        log::debug!("Dropped last reference to {} {kind}(s)", doomed.len());
        if kind == ObjectKind::Texture {
            self.park_textures(&doomed)
        } else {
            self.release_objects(kind, &doomed)
        }
    }

    /// Hands released textures to the pool; destroys what it refuses.
    fn park_textures(&self, doomed: &[ObjectHandle]) -> Result<()> {
        {
            let mut map = self.shared.objects.lock();
            for &handle in doomed {
                if let Some(record) = map.get_mut(handle) {
                    record.state = RecordState::Pooled;
                }
            }
        }

        let refused: HandleList = doomed
            .iter()
            .copied()
            .filter(|&handle| !self.shared.texture_pool.park(handle))
            .collect();
        self.shared.destroy_textures(&refused)
    }

    fn release_objects(&self, kind: ObjectKind, doomed: &[ObjectHandle]) -> Result<()> {
        let natives: Vec<B::Object> = {
            let mut map = self.shared.objects.lock();
            doomed
                .iter()
                .filter_map(|&handle| map.remove(handle).map(|record| record.native))
                .collect()
        };

        self.shared.release_natives(kind, natives)?;
        self.shared
            .callbacks
            .publish(&EventPayload::objects(ContextEvent::Deleted(kind), doomed));
        Ok(())
    }
}

fn validate_decrements<O>(
    map: &ObjectMap<O>,
    kind: ObjectKind,
    handles: &[ObjectHandle],
) -> Result<()> {
    let mut requested: FxHashMap<ObjectHandle, u32> = FxHashMap::default();
    for &handle in handles {
        let record = live_record(map, kind, handle)?;
        let count = requested.entry(handle).or_default();
        *count += 1;
        if *count > record.user_refs() {
            return Err(RalError::UnknownObject { kind, handle });
        }
    }
    Ok(())
}

/// Decrements every listed handle, marking the ones that reach the release
/// threshold as `Releasing`. Returns them in input order.
fn decrement<O>(map: &mut ObjectMap<O>, kind: ObjectKind, handles: &[ObjectHandle]) -> HandleList {
    let threshold = kind.release_threshold();
    let mut doomed: HandleList = SmallVec::new();
    for &handle in handles {
        let Some(record) = map.get_mut(handle) else {
            continue;
        };
        record.refcount -= 1;
        if record.refcount == threshold {
            record.state = RecordState::Releasing;
            doomed.push(handle);
        }
    }
    doomed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_table::ObjectRecord;
    use slotmap::SlotMap;

    fn table(kind: ObjectKind, n: usize) -> (ObjectMap<()>, Vec<ObjectHandle>) {
        let mut map: ObjectMap<()> = SlotMap::with_key();
        let handles = (0..n)
            .map(|i| map.insert(ObjectRecord::new(kind, (), format!("{kind} {i}"))))
            .collect();
        (map, handles)
    }

    #[test]
    fn over_deletion_is_rejected_as_a_whole() {
        let (map, h) = table(ObjectKind::Buffer, 2);
        let err = validate_decrements(&map, ObjectKind::Buffer, &[h[0], h[1], h[1]]).unwrap_err();
        assert!(matches!(err, RalError::UnknownObject { handle, .. } if handle == h[1]));
    }

    #[test]
    fn textures_stop_at_the_pool_reference() {
        let (mut map, h) = table(ObjectKind::Texture, 1);
        assert!(validate_decrements(&map, ObjectKind::Texture, &[h[0], h[0]]).is_err());

        let doomed = decrement(&mut map, ObjectKind::Texture, &[h[0]]);
        assert_eq!(doomed.as_slice(), &[h[0]]);
        assert_eq!(map[h[0]].refcount, 1);
        assert_eq!(map[h[0]].state, RecordState::Releasing);
    }

    #[test]
    fn retained_objects_survive_one_decrement() {
        let (mut map, h) = table(ObjectKind::Sampler, 1);
        map[h[0]].refcount += 1;

        validate_decrements(&map, ObjectKind::Sampler, &[h[0], h[0]]).unwrap();
        assert!(decrement(&mut map, ObjectKind::Sampler, &[h[0]]).is_empty());
        assert_eq!(map[h[0]].state, RecordState::Live);
    }
}
