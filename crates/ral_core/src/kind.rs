//! Object Kinds
//!
//! The closed set of object categories managed by the resource context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a backend-owned object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Buffer,
    CommandBuffer,
    GfxState,
    Program,
    Sampler,
    Shader,
    Texture,
    TextureView,
}

impl ObjectKind {
    /// Every kind, in registry order.
    pub const ALL: [ObjectKind; 8] = [
        ObjectKind::Buffer,
        ObjectKind::CommandBuffer,
        ObjectKind::GfxState,
        ObjectKind::Program,
        ObjectKind::Sampler,
        ObjectKind::Shader,
        ObjectKind::Texture,
        ObjectKind::TextureView,
    ];

    /// Number of kinds.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index in `0..COUNT`, used to address per-kind tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Reference count at which the object is actually released.
    ///
    /// Textures are released at 1: the texture pool holds a standing
    /// reference on every texture it tracks.
    #[inline]
    #[must_use]
    pub const fn release_threshold(self) -> u32 {
        match self {
            Self::Texture => 1,
            _ => 0,
        }
    }

    /// Reference count a freshly constructed object starts with.
    #[inline]
    #[must_use]
    pub const fn initial_refcount(self) -> u32 {
        self.release_threshold() + 1
    }

    /// Whether `retain_objects` accepts handles of this kind.
    ///
    /// Texture views are owned exactly once by their creator.
    #[inline]
    #[must_use]
    pub const fn is_retainable(self) -> bool {
        !matches!(self, Self::TextureView)
    }

    /// Human-readable name used for debug labels and log output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Buffer => "Buffer",
            Self::CommandBuffer => "CommandBuffer",
            Self::GfxState => "GfxState",
            Self::Program => "Program",
            Self::Sampler => "Sampler",
            Self::Shader => "Shader",
            Self::Texture => "Texture",
            Self::TextureView => "TextureView",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
