//! Per-kind registries.
//!
//! Each kind keeps the insertion-ordered list of its live handles and an id
//! counter used for synthesised debug names. Every registry has its own lock
//! so batches of different kinds never contend.

use parking_lot::{Mutex, MutexGuard};
use ral_core::{LeakReport, ObjectHandle, ObjectKind};

#[derive(Debug, Default)]
pub(crate) struct RegistryInner {
    handles: Vec<ObjectHandle>,
    next_id: u64,
}

impl RegistryInner {
    /// Hands out `count` consecutive ids.
    pub(crate) fn reserve_ids(&mut self, count: usize) -> u64 {
        let first = self.next_id;
        self.next_id += count as u64;
        first
    }

    pub(crate) fn insert(&mut self, handle: ObjectHandle) {
        debug_assert!(!self.handles.contains(&handle));
        self.handles.push(handle);
    }

    /// Removes every handle in `doomed`, preserving the order of the rest.
    pub(crate) fn remove_all(&mut self, doomed: &[ObjectHandle]) {
        if doomed.len() == 1 {
            if let Some(pos) = self.handles.iter().position(|h| *h == doomed[0]) {
                self.handles.remove(pos);
            }
            return;
        }
        self.handles.retain(|h| !doomed.contains(h));
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    pub(crate) fn handles(&self) -> &[ObjectHandle] {
        &self.handles
    }

    pub(crate) fn take_all(&mut self) -> Vec<ObjectHandle> {
        std::mem::take(&mut self.handles)
    }
}

/// One registry per [`ObjectKind`], addressed by [`ObjectKind::index`].
#[derive(Debug, Default)]
pub(crate) struct Registries {
    kinds: [Mutex<RegistryInner>; ObjectKind::COUNT],
}

impl Registries {
    pub(crate) fn lock(&self, kind: ObjectKind) -> MutexGuard<'_, RegistryInner> {
        self.kinds[kind.index()].lock()
    }

    pub(crate) fn len(&self, kind: ObjectKind) -> usize {
        self.lock(kind).len()
    }

    /// Non-empty registries, in kind order.
    pub(crate) fn leaks(&self) -> Vec<LeakReport> {
        ObjectKind::ALL
            .iter()
            .filter_map(|&kind| {
                let live_objects = self.len(kind);
                (live_objects > 0).then_some(LeakReport { kind, live_objects })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn handles(n: usize) -> Vec<ObjectHandle> {
        let mut map: SlotMap<ObjectHandle, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn ids_are_monotonic_per_kind() {
        let registries = Registries::default();
        assert_eq!(registries.lock(ObjectKind::Buffer).reserve_ids(3), 0);
        assert_eq!(registries.lock(ObjectKind::Buffer).reserve_ids(2), 3);
        assert_eq!(registries.lock(ObjectKind::Shader).reserve_ids(1), 0);
    }

    #[test]
    fn removal_preserves_insertion_order() {
        let registries = Registries::default();
        let hs = handles(4);
        {
            let mut reg = registries.lock(ObjectKind::Sampler);
            for &h in &hs {
                reg.insert(h);
            }
            reg.remove_all(&[hs[1]]);
            reg.remove_all(&[hs[0], hs[3]]);
        }
        assert_eq!(registries.lock(ObjectKind::Sampler).handles(), &[hs[2]]);
    }

    #[test]
    fn leaks_report_non_empty_kinds() {
        let registries = Registries::default();
        let hs = handles(3);
        registries.lock(ObjectKind::Buffer).insert(hs[0]);
        registries.lock(ObjectKind::Texture).insert(hs[1]);
        registries.lock(ObjectKind::Texture).insert(hs[2]);

        assert_eq!(
            registries.leaks(),
            vec![
                LeakReport { kind: ObjectKind::Buffer, live_objects: 1 },
                LeakReport { kind: ObjectKind::Texture, live_objects: 2 },
            ]
        );
    }
}
