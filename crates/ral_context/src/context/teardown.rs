//! Context teardown and leak detection.

use std::thread;

use ral_core::{Backend, ContextEvent, EventPayload, LeakReport, ObjectKind, RalError, Result};

use super::ResourceContext;

impl<B: Backend> ResourceContext<B> {
    /// Tears the context down: publishes `ContextAboutToRelease`, empties the
    /// texture pool and releases every remaining object.
    ///
    /// Objects still referenced by users are force-released and reported as
    /// [`RalError::LeakDetected`].
    pub fn shutdown(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        self.released = true;
        let shared = &self.shared;

        shared
            .callbacks
            .publish(&EventPayload::context(ContextEvent::ContextAboutToRelease));

        let emptied = shared.texture_pool.empty();
        shared.texture_pool.detach();
        if emptied > 0 {
            log::debug!("Texture pool emptied: {emptied} idle texture(s) destroyed");
        }

        let leaks = shared.registries.leaks();
        for leak in &leaks {
            self.log_leak(*leak);
        }

        // Whatever is left in the table (leaked objects, textures held out of
        // the pool) is force-released, grouped by kind.
        let mut by_kind: [Vec<B::Object>; ObjectKind::COUNT] = Default::default();
        {
            let mut map = shared.objects.lock();
            for (_, record) in map.drain() {
                by_kind[record.kind.index()].push(record.native);
            }
        }
        for kind in ObjectKind::ALL {
            shared.registries.lock(kind).take_all();
        }

        let mut release_result = Ok(());
        for (kind, natives) in ObjectKind::ALL.into_iter().zip(by_kind) {
            if let Err(err) = shared.release_natives(kind, natives) {
                log::error!("Failed to release {kind} objects at teardown: {err}");
                release_result = Err(err);
            }
        }

        log::info!("ResourceContext released");
        if leaks.is_empty() {
            release_result
        } else {
            Err(RalError::LeakDetected(leaks))
        }
    }

    fn log_leak(&self, leak: LeakReport) {
        let names: Vec<String> = {
            let handles = self.shared.registries.lock(leak.kind).handles().to_vec();
            let map = self.shared.objects.lock();
            handles
                .iter()
                .filter_map(|&handle| map.get(handle).map(|record| record.debug_name.clone()))
                .collect()
        };
        log::warn!("Leaked {leak}: {}", names.join(", "));
    }
}

impl<B: Backend> Drop for ResourceContext<B> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.teardown() {
            Ok(()) => {}
            Err(RalError::LeakDetected(leaks)) => {
                let err = RalError::LeakDetected(leaks);
                if self.shared.settings.leak_policy.should_panic() && !thread::panicking() {
                    panic!("{err}");
                }
                log::warn!("{err}");
            }
            Err(err) => log::error!("ResourceContext teardown failed: {err}"),
        }
    }
}
