//! Context Settings
//!
//! Configuration for a [`ResourceContext`](crate::ResourceContext) and its
//! texture pool. All settings implement `Default` and can be loaded from any
//! serde format; missing fields fall back to their defaults.
//!
//! ```rust,ignore
//! use ral_context::{ContextSettings, TexturePoolPolicy};
//!
//! let settings = ContextSettings {
//!     texture_pool: TexturePoolPolicy {
//!         max_idle_textures: 64,
//!         ..Default::default()
//!     },
//!     gc_interval_frames: 30,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::time::Duration;

/// How leaks found while a context is dropped are surfaced.
///
/// Explicit [`ResourceContext::shutdown`](crate::ResourceContext::shutdown)
/// always returns the leak as an error regardless of this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LeakPolicy {
    /// Panic in debug builds, warn in release builds.
    #[default]
    Auto,
    /// Always panic (unless the thread is already unwinding).
    Panic,
    /// Always log a warning.
    Warn,
}

impl LeakPolicy {
    #[must_use]
    pub fn should_panic(self) -> bool {
        match self {
            Self::Auto => cfg!(debug_assertions),
            Self::Panic => true,
            Self::Warn => false,
        }
    }
}

/// Eviction policy for idle pooled textures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TexturePoolPolicy {
    /// Idle textures older than this are evicted.
    pub max_idle_time: Duration,
    /// Upper bound on idle textures across all descriptors; the oldest are
    /// evicted first.
    pub max_idle_textures: usize,
    /// Upper bound on idle textures sharing one descriptor. Returns beyond the
    /// bound are refused and the texture is destroyed immediately.
    pub max_idle_per_descriptor: usize,
    /// Upper bound on evictions performed by one garbage-collection pass.
    pub max_evictions_per_pass: usize,
}

impl Default for TexturePoolPolicy {
    fn default() -> Self {
        Self {
            max_idle_time: Duration::from_secs(5),
            max_idle_textures: 256,
            max_idle_per_descriptor: 16,
            max_evictions_per_pass: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Label unnamed objects `"<Kind> <id>"`. When disabled they are labelled
    /// with the kind name only.
    pub synthesize_debug_names: bool,
    pub texture_pool: TexturePoolPolicy,
    /// Run texture garbage collection every N calls to
    /// [`end_frame`](crate::ResourceContext::end_frame). 0 disables it.
    pub gc_interval_frames: u32,
    pub leak_policy: LeakPolicy,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            synthesize_debug_names: true,
            texture_pool: TexturePoolPolicy::default(),
            gc_interval_frames: 60,
            leak_policy: LeakPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: ContextSettings =
            serde_json::from_str(
                r#"{ "gc_interval_frames": 5, "texture_pool": { "max_idle_textures": 3 } }"#,
            )
                .unwrap();

        assert_eq!(settings.gc_interval_frames, 5);
        assert_eq!(settings.texture_pool.max_idle_textures, 3);
        assert_eq!(
            settings.texture_pool.max_idle_time,
            TexturePoolPolicy::default().max_idle_time
        );
        assert!(settings.synthesize_debug_names);
        assert_eq!(settings.leak_policy, LeakPolicy::Auto);
    }

    #[test]
    fn leak_policy_resolution() {
        assert!(LeakPolicy::Panic.should_panic());
        assert!(!LeakPolicy::Warn.should_panic());
        assert_eq!(LeakPolicy::Auto.should_panic(), cfg!(debug_assertions));
    }
}
