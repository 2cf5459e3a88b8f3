//! Name indices: one `name → handle` map per [`NameNamespace`].
//!
//! Locks are per namespace and never held together with any other lock.

use parking_lot::Mutex;
use ral_core::{NameNamespace, ObjectHandle, RalError, Result};
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub(crate) struct NameIndex {
    namespaces: [Mutex<FxHashMap<String, ObjectHandle>>; 4],
}

impl NameIndex {
    /// Inserts every name, or none: on collision the names inserted by this
    /// call are removed again.
    pub(crate) fn insert_all<'a>(
        &self,
        entries: impl IntoIterator<Item = (NameNamespace, &'a str, ObjectHandle)>,
    ) -> Result<()> {
        let mut inserted: Vec<(NameNamespace, &str, ObjectHandle)> = Vec::new();
        for (namespace, name, handle) in entries {
            let mut map = self.namespaces[namespace.index()].lock();
            if map.contains_key(name) {
                drop(map);
                for (ns, n, h) in inserted {
                    self.remove(ns, n, h);
                }
                return Err(RalError::NameCollision {
                    namespace,
                    name: name.to_owned(),
                });
            }
            map.insert(name.to_owned(), handle);
            inserted.push((namespace, name, handle));
        }
        Ok(())
    }

    /// Checks that `name` is free without claiming it.
    pub(crate) fn ensure_free(&self, namespace: NameNamespace, name: &str) -> Result<()> {
        if self.namespaces[namespace.index()].lock().contains_key(name) {
            return Err(RalError::NameCollision {
                namespace,
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    /// Removes `name` if it still maps to `handle`.
    pub(crate) fn remove(&self, namespace: NameNamespace, name: &str, handle: ObjectHandle) {
        let mut map = self.namespaces[namespace.index()].lock();
        if map.get(name) == Some(&handle) {
            map.remove(name);
        }
    }

    #[must_use]
    pub(crate) fn find(&self, namespace: NameNamespace, name: &str) -> Option<ObjectHandle> {
        self.namespaces[namespace.index()].lock().get(name).copied()
    }

    #[cfg(test)]
    pub(crate) fn len(&self, namespace: NameNamespace) -> usize {
        self.namespaces[namespace.index()].lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn collision_rolls_back_the_whole_insert() {
        let mut map: SlotMap<ObjectHandle, ()> = SlotMap::with_key();
        let (a, b, c) = (map.insert(()), map.insert(()), map.insert(()));
        let index = NameIndex::default();
        index.insert_all([(NameNamespace::Shader, "lit", a)]).unwrap();

        let err = index
            .insert_all([
                (NameNamespace::Texture, "albedo", b),
                (NameNamespace::Shader, "lit", c),
            ])
            .unwrap_err();

        assert!(matches!(
            err,
            RalError::NameCollision { namespace: NameNamespace::Shader, ref name } if name == "lit"
        ));
        assert_eq!(index.find(NameNamespace::Texture, "albedo"), None);
        assert_eq!(index.find(NameNamespace::Shader, "lit"), Some(a));
    }

    #[test]
    fn namespaces_are_independent() {
        let mut map: SlotMap<ObjectHandle, ()> = SlotMap::with_key();
        let (a, b) = (map.insert(()), map.insert(()));
        let index = NameIndex::default();
        index
            .insert_all([
                (NameNamespace::Program, "pbr", a),
                (NameNamespace::Shader, "pbr", b),
            ])
            .unwrap();

        assert_eq!(index.find(NameNamespace::Program, "pbr"), Some(a));
        assert_eq!(index.find(NameNamespace::Shader, "pbr"), Some(b));
        assert!(index.ensure_free(NameNamespace::TextureFile, "pbr").is_ok());
    }

    #[test]
    fn stale_removal_leaves_new_owner_alone() {
        let mut map: SlotMap<ObjectHandle, ()> = SlotMap::with_key();
        let (old, new) = (map.insert(()), map.insert(()));
        let index = NameIndex::default();
        index.insert_all([(NameNamespace::Texture, "shadow", new)]).unwrap();

        index.remove(NameNamespace::Texture, "shadow", old);
        assert_eq!(index.find(NameNamespace::Texture, "shadow"), Some(new));
        assert_eq!(index.len(NameNamespace::Texture), 1);
    }
}
