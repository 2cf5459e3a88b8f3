//! Texture Pool
//!
//! Reuse cache for textures whose last user reference was dropped.
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        TexturePool                           │
//! │                                                              │
//! │  tracked:     FxHashMap<ObjectHandle, TextureDescriptor>     │
//! │  idle:        FxHashMap<TextureDescriptor, Vec<PooledEntry>> │
//! │  checked_out: FxHashSet<ObjectHandle>                        │
//! │                                                              │
//! │  get(desc)            → most recently returned exact match   │
//! │  return_texture(h)    → back to idle, only if h came from get│
//! │  collect_garbage()    → evict by age / count, via the owner  │
//! │  empty()              → drain and destroy everything idle    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pool never touches backend objects. Evicted handles are passed to the
//! attached [`PoolOwner`] (the resource context), which destroys them. An
//! idle texture keeps its handle: the context parks its record at refcount 1
//! (the pool's standing reference) so a pool hit returns the same handle.
//!
//! Only the context parks textures. A handle taken with [`TexturePool::get`]
//! is checked out and may be handed back with
//! [`TexturePool::return_texture`]; any other handle, in particular one a
//! user still holds, is refused.

use std::fmt;
use std::sync::Weak;

use parking_lot::{Mutex, RwLock};
use ral_core::{ObjectHandle, TextureDescriptor};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::settings::TexturePoolPolicy;
use crate::time::Instant;

/// Destroys textures the pool gives up on.
pub trait PoolOwner: Send + Sync {
    /// Called without any pool lock held.
    fn destroy_pooled_textures(&self, handles: &[ObjectHandle]);
}

// ─── Internal Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PooledTextureEntry {
    pub descriptor: TextureDescriptor,
    pub handle: ObjectHandle,
    pub idle_since: Instant,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PoolStats {
    hits: u64,
    misses: u64,
    evictions: u64,
    refused: u64,
}

struct PoolInner {
    tracked: FxHashMap<ObjectHandle, TextureDescriptor>,
    idle: FxHashMap<TextureDescriptor, Vec<PooledTextureEntry>>,
    checked_out: FxHashSet<ObjectHandle>,
    draining: bool,
    policy: TexturePoolPolicy,
    stats: PoolStats,
}

impl PoolInner {
    fn idle_count(&self) -> usize {
        self.idle.values().map(Vec::len).sum()
    }

    fn take(&mut self, descriptor: &TextureDescriptor) -> Option<ObjectHandle> {
        if self.draining {
            return None;
        }

        let entry = self.idle.get_mut(descriptor).and_then(Vec::pop);
        if self.idle.get(descriptor).is_some_and(Vec::is_empty) {
            self.idle.remove(descriptor);
        }

        match entry {
            Some(entry) => {
                self.stats.hits += 1;
                log::debug!(
                    "Texture pool hit: {:?} {}x{}",
                    entry.handle,
                    descriptor.width,
                    descriptor.height
                );
                Some(entry.handle)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    fn park(&mut self, handle: ObjectHandle, now: Instant) -> bool {
        self.checked_out.remove(&handle);
        if self.draining {
            return false;
        }
        let Some(&descriptor) = self.tracked.get(&handle) else {
            return false;
        };

        let idle_for_descriptor = self.idle.get(&descriptor).map_or(0, Vec::len);
        if idle_for_descriptor >= self.policy.max_idle_per_descriptor {
            self.stats.refused += 1;
            return false;
        }

        let bucket = self.idle.entry(descriptor).or_default();
        debug_assert!(bucket.iter().all(|entry| entry.handle != handle));
        bucket.push(PooledTextureEntry {
            descriptor,
            handle,
            idle_since: now,
        });
        true
    }

    /// Removes `handles` from the idle set and stops tracking them.
    fn evict(&mut self, handles: &FxHashSet<ObjectHandle>) {
        self.idle.retain(|_, bucket| {
            bucket.retain(|entry| !handles.contains(&entry.handle));
            !bucket.is_empty()
        });
        for handle in handles {
            self.tracked.remove(handle);
        }
        self.stats.evictions += handles.len() as u64;
    }
}

// ─── Status ───────────────────────────────────────────────────────────────────

/// Snapshot returned by [`TexturePool::dump_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexturePoolStatus {
    pub tracked: usize,
    pub idle: usize,
    pub descriptors: usize,
    pub draining: bool,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub refused: u64,
}

impl fmt::Display for TexturePoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TexturePool: {} tracked, {} idle across {} descriptor(s), ",
            self.tracked, self.idle, self.descriptors,
        )?;
        write!(
            f,
            "hits {}, misses {}, evictions {}, refused {}{}",
            self.hits,
            self.misses,
            self.evictions,
            self.refused,
            if self.draining { " [draining]" } else { "" },
        )
    }
}

// ─── Pool Implementation ──────────────────────────────────────────────────────

pub struct TexturePool {
    inner: Mutex<PoolInner>,
    owner: RwLock<Option<Weak<dyn PoolOwner>>>,
}

impl TexturePool {
    #[must_use]
    pub fn new(policy: TexturePoolPolicy) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                tracked: FxHashMap::default(),
                idle: FxHashMap::default(),
                checked_out: FxHashSet::default(),
                draining: false,
                policy,
                stats: PoolStats::default(),
            }),
            owner: RwLock::new(None),
        }
    }

    // ── Owner ────────────────────────────────────────────────────────────────

    /// Sets the object that destroys evicted textures.
    pub fn attach(&self, owner: Weak<dyn PoolOwner>) {
        *self.owner.write() = Some(owner);
    }

    pub fn detach(&self) {
        *self.owner.write() = None;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.owner
            .read()
            .as_ref()
            .is_some_and(|owner| owner.strong_count() > 0)
    }

    // ── Bookkeeping ──────────────────────────────────────────────────────────

    /// Starts tracking a freshly constructed texture.
    pub(crate) fn track(&self, handle: ObjectHandle, descriptor: TextureDescriptor) {
        self.inner.lock().tracked.insert(handle, descriptor);
    }

    /// Stops tracking a destroyed texture.
    pub(crate) fn forget(&self, handle: ObjectHandle) {
        let mut inner = self.inner.lock();
        inner.checked_out.remove(&handle);
        if let Some(descriptor) = inner.tracked.remove(&handle)
            && let Some(bucket) = inner.idle.get_mut(&descriptor)
        {
            bucket.retain(|entry| entry.handle != handle);
            if bucket.is_empty() {
                inner.idle.remove(&descriptor);
            }
        }
    }

    #[must_use]
    pub fn is_tracked(&self, handle: ObjectHandle) -> bool {
        self.inner.lock().tracked.contains_key(&handle)
    }

    // ── Reuse ────────────────────────────────────────────────────────────────

    /// Takes an idle texture with exactly `descriptor`, most recently returned
    /// first. The handle stays checked out until it is given back with
    /// [`return_texture`](Self::return_texture).
    pub fn get(&self, descriptor: &TextureDescriptor) -> Option<ObjectHandle> {
        let mut inner = self.inner.lock();
        let handle = inner.take(descriptor)?;
        inner.checked_out.insert(handle);
        Some(handle)
    }

    /// Gives back a texture taken with [`get`](Self::get).
    ///
    /// Returns `false` for handles that are not checked out, so a texture a
    /// user still holds never becomes idle. A checked-out texture the pool
    /// refuses (draining, or its descriptor already has
    /// `max_idle_per_descriptor` idle textures) is destroyed through the
    /// owner, and `false` is returned as well.
    pub fn return_texture(&self, handle: ObjectHandle) -> bool {
        self.return_texture_at(handle, Instant::now())
    }

    pub fn return_texture_at(&self, handle: ObjectHandle, now: Instant) -> bool {
        {
            let mut inner = self.inner.lock();
            if !inner.checked_out.contains(&handle) {
                return false;
            }
            if inner.park(handle, now) {
                return true;
            }
        }
        match self.upgrade_owner() {
            Some(owner) => owner.destroy_pooled_textures(&[handle]),
            None => log::warn!("Texture pool refused {handle:?} without an owner to destroy it"),
        }
        false
    }

    #[must_use]
    pub fn is_checked_out(&self, handle: ObjectHandle) -> bool {
        self.inner.lock().checked_out.contains(&handle)
    }

    /// Pool lookup on behalf of the context; the hit is not checked out.
    pub(crate) fn take(&self, descriptor: &TextureDescriptor) -> Option<ObjectHandle> {
        self.inner.lock().take(descriptor)
    }

    /// Parks a texture the context no longer hands out. `false` means the
    /// caller must destroy it.
    pub(crate) fn park(&self, handle: ObjectHandle) -> bool {
        self.park_at(handle, Instant::now())
    }

    pub(crate) fn park_at(&self, handle: ObjectHandle, now: Instant) -> bool {
        self.inner.lock().park(handle, now)
    }

    // ── Eviction ─────────────────────────────────────────────────────────────

    /// Evicts idle textures per the pool policy. Returns `true` if anything
    /// was evicted.
    pub fn collect_garbage(&self) -> bool {
        self.collect_garbage_at(Instant::now())
    }

    /// [`collect_garbage`](Self::collect_garbage) against an explicit clock.
    pub fn collect_garbage_at(&self, now: Instant) -> bool {
        let Some(owner) = self.upgrade_owner() else {
            return false;
        };

        let evicted: Vec<ObjectHandle> = {
            let mut inner = self.inner.lock();
            if inner.draining {
                return false;
            }
            let policy = inner.policy.clone();

            let mut candidates: Vec<(Instant, ObjectHandle)> = inner
                .idle
                .values()
                .flatten()
                .map(|entry| (entry.idle_since, entry.handle))
                .collect();
            candidates.sort_by_key(|(since, _)| *since);

            let total = candidates.len();
            let mut evicted = Vec::new();
            for (i, (since, handle)) in candidates.into_iter().enumerate() {
                if evicted.len() >= policy.max_evictions_per_pass {
                    break;
                }
                let expired = now.saturating_duration_since(since) >= policy.max_idle_time;
                let over_cap = total - i > policy.max_idle_textures;
                // Oldest first: once neither holds, it holds for nothing later.
                if !expired && !over_cap {
                    break;
                }
                evicted.push(handle);
            }

            if !evicted.is_empty() {
                let set: FxHashSet<ObjectHandle> = evicted.iter().copied().collect();
                inner.evict(&set);
            }
            evicted
        };

        if evicted.is_empty() {
            return false;
        }
        log::debug!("Texture pool evicted {} idle texture(s)", evicted.len());
        owner.destroy_pooled_textures(&evicted);
        true
    }

    /// Marks the pool draining and destroys every idle texture. Later returns
    /// are refused. Returns the number of textures destroyed.
    pub fn empty(&self) -> usize {
        let evicted: Vec<ObjectHandle> = {
            let mut inner = self.inner.lock();
            inner.draining = true;
            let handles: Vec<ObjectHandle> = inner
                .idle
                .drain()
                .flat_map(|(_, bucket)| bucket.into_iter().map(|entry| entry.handle))
                .collect();
            for handle in &handles {
                inner.tracked.remove(handle);
            }
            inner.stats.evictions += handles.len() as u64;
            handles
        };

        if evicted.is_empty() {
            return 0;
        }
        match self.upgrade_owner() {
            Some(owner) => owner.destroy_pooled_textures(&evicted),
            None => log::warn!(
                "Texture pool emptied without an owner; {} idle texture(s) dropped untouched",
                evicted.len()
            ),
        }
        evicted.len()
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.inner.lock().draining
    }

    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.lock().idle_count()
    }

    #[must_use]
    pub fn policy(&self) -> TexturePoolPolicy {
        self.inner.lock().policy.clone()
    }

    pub fn set_policy(&self, policy: TexturePoolPolicy) {
        self.inner.lock().policy = policy;
    }

    /// Logs and returns a snapshot of the pool.
    pub fn dump_status(&self) -> TexturePoolStatus {
        let status = {
            let inner = self.inner.lock();
            TexturePoolStatus {
                tracked: inner.tracked.len(),
                idle: inner.idle_count(),
                descriptors: inner.idle.len(),
                draining: inner.draining,
                hits: inner.stats.hits,
                misses: inner.stats.misses,
                evictions: inner.stats.evictions,
                refused: inner.stats.refused,
            }
        };
        log::info!("{status}");
        status
    }

    fn upgrade_owner(&self) -> Option<std::sync::Arc<dyn PoolOwner>> {
        self.owner.read().as_ref().and_then(Weak::upgrade)
    }
}

impl fmt::Debug for TexturePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TexturePool")
            .field("tracked", &inner.tracked.len())
            .field("idle", &inner.idle_count())
            .field("draining", &inner.draining)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ral_core::wgpu;
    use slotmap::SlotMap;

    use crate::time::Duration;

    #[derive(Default)]
    struct RecordingOwner {
        destroyed: Mutex<Vec<ObjectHandle>>,
    }

    impl PoolOwner for RecordingOwner {
        fn destroy_pooled_textures(&self, handles: &[ObjectHandle]) {
            self.destroyed.lock().extend_from_slice(handles);
        }
    }

    fn desc(size: u32) -> TextureDescriptor {
        TextureDescriptor::new_2d(
            size,
            size,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    fn setup(policy: TexturePoolPolicy) -> (TexturePool, Arc<RecordingOwner>, Vec<ObjectHandle>) {
        let pool = TexturePool::new(policy);
        let owner = Arc::new(RecordingOwner::default());
        let weak: Weak<dyn PoolOwner> = Arc::downgrade(&owner) as Weak<dyn PoolOwner>;
        pool.attach(weak);
        let mut keys: SlotMap<ObjectHandle, ()> = SlotMap::with_key();
        let handles = (0..8).map(|_| keys.insert(())).collect();
        (pool, owner, handles)
    }

    #[test]
    fn exact_descriptor_match_only() {
        let (pool, _owner, h) = setup(TexturePoolPolicy::default());
        assert_eq!(pool.get(&desc(64)), None);

        pool.track(h[0], desc(64));
        assert!(pool.park(h[0]));

        assert_eq!(pool.get(&desc(32)), None);
        assert_eq!(pool.get(&desc(64)), Some(h[0]));
        assert_eq!(pool.get(&desc(64)), None);
    }

    #[test]
    fn most_recently_returned_first() {
        let (pool, _owner, h) = setup(TexturePoolPolicy::default());
        pool.track(h[0], desc(16));
        pool.track(h[1], desc(16));
        assert!(pool.park(h[0]));
        assert!(pool.park(h[1]));

        assert_eq!(pool.get(&desc(16)), Some(h[1]));
        assert_eq!(pool.get(&desc(16)), Some(h[0]));
    }

    #[test]
    fn untracked_and_over_cap_returns_are_refused() {
        let (pool, _owner, h) = setup(TexturePoolPolicy {
            max_idle_per_descriptor: 1,
            ..Default::default()
        });
        assert!(!pool.park(h[0]));

        pool.track(h[1], desc(8));
        pool.track(h[2], desc(8));
        assert!(pool.park(h[1]));
        assert!(!pool.park(h[2]));
        assert_eq!(pool.dump_status().refused, 1);
    }

    #[test]
    fn garbage_collection_evicts_by_age() {
        let (pool, owner, h) = setup(TexturePoolPolicy {
            max_idle_time: Duration::from_secs(5),
            ..Default::default()
        });
        let start = Instant::now();
        pool.track(h[0], desc(8));
        pool.track(h[1], desc(16));
        assert!(pool.park_at(h[0], start));
        assert!(pool.park_at(h[1], start + Duration::from_secs(4)));

        assert!(!pool.collect_garbage_at(start + Duration::from_secs(1)));
        assert!(pool.collect_garbage_at(start + Duration::from_secs(6)));

        assert_eq!(*owner.destroyed.lock(), vec![h[0]]);
        assert!(!pool.is_tracked(h[0]));
        assert_eq!(pool.get(&desc(16)), Some(h[1]));
    }

    #[test]
    fn garbage_collection_enforces_idle_cap_oldest_first() {
        let (pool, owner, h) = setup(TexturePoolPolicy {
            max_idle_textures: 2,
            max_evictions_per_pass: 1,
            ..Default::default()
        });
        let start = Instant::now();
        for (i, &handle) in h[..4].iter().enumerate() {
            pool.track(handle, desc(8 << i));
            assert!(pool.park_at(handle, start + Duration::from_millis(i as u64)));
        }

        // One eviction per pass.
        assert!(pool.collect_garbage_at(start));
        assert_eq!(pool.idle_count(), 3);
        assert!(pool.collect_garbage_at(start));
        assert!(!pool.collect_garbage_at(start));

        assert_eq!(*owner.destroyed.lock(), vec![h[0], h[1]]);
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn empty_drains_and_refuses_later_returns() {
        let (pool, owner, h) = setup(TexturePoolPolicy::default());
        pool.track(h[0], desc(8));
        pool.track(h[1], desc(8));
        assert!(pool.park(h[0]));

        assert_eq!(pool.empty(), 1);
        assert!(pool.is_draining());
        assert!(!pool.park(h[1]));
        assert_eq!(pool.get(&desc(8)), None);
        assert_eq!(*owner.destroyed.lock(), vec![h[0]]);
    }

    #[test]
    fn detached_pool_does_not_evict() {
        let (pool, _owner, h) = setup(TexturePoolPolicy {
            max_idle_time: Duration::ZERO,
            ..Default::default()
        });
        pool.track(h[0], desc(8));
        assert!(pool.park(h[0]));
        pool.detach();

        assert!(!pool.is_attached());
        assert!(!pool.collect_garbage());
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn only_checked_out_handles_can_be_returned() {
        let (pool, owner, h) = setup(TexturePoolPolicy {
            max_idle_per_descriptor: 1,
            ..Default::default()
        });
        pool.track(h[0], desc(8));
        pool.track(h[1], desc(8));

        // Tracked but never parked: still held by a user.
        assert!(!pool.return_texture(h[0]));
        assert_eq!(pool.idle_count(), 0);

        assert!(pool.park(h[0]));
        assert_eq!(pool.take(&desc(8)), Some(h[0]));
        assert!(!pool.is_checked_out(h[0]));
        assert!(!pool.return_texture(h[0]));

        assert!(pool.park(h[0]));
        assert_eq!(pool.get(&desc(8)), Some(h[0]));
        assert!(pool.is_checked_out(h[0]));
        assert!(pool.return_texture(h[0]));
        assert!(!pool.return_texture(h[0]));

        // A checked-out texture the pool cannot keep goes to the owner.
        assert_eq!(pool.get(&desc(8)), Some(h[0]));
        assert!(pool.park(h[1]));
        assert!(!pool.return_texture(h[0]));
        assert_eq!(*owner.destroyed.lock(), vec![h[0]]);
    }
}
