//! Create-Info Payloads
//!
//! Kind-specific construction parameters. The resource context forwards them
//! verbatim to the backend and only reads:
//! - `ProgramCreateInfo::name` / `ShaderCreateInfo::name` (name indices)
//! - `TextureCreateInfo::{unique_name, filename, description}` (name indices,
//!   reuse metadata)
//! - `TextureCreateInfo::descriptor` (texture pool matching, equality only)
//! - `TextureCreateInfo::initial_data` (uploaded right after construction)
//!
//! Descriptor fields borrow `wgpu`'s plain value types as an opaque vocabulary.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::errors::NameNamespace;
use crate::handle::ObjectHandle;
use crate::kind::ObjectKind;

// ============================================================================
// Buffers & Command Buffers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferCreateInfo {
    pub size: u64,
    pub usage: wgpu::BufferUsages,
    pub mapped_at_creation: bool,
}

impl BufferCreateInfo {
    #[must_use]
    pub fn new(size: u64, usage: wgpu::BufferUsages) -> Self {
        Self {
            size,
            usage,
            mapped_at_creation: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandBufferLevel {
    #[default]
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandBufferCreateInfo {
    pub level: CommandBufferLevel,
    /// May be re-recorded after submission.
    pub resettable: bool,
    /// Recorded once and submitted once.
    pub transient: bool,
}

// ============================================================================
// Pipeline State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxStateCreateInfo {
    /// Program the state object is bound to. Not validated by the context.
    pub program: ObjectHandle,
    pub topology: wgpu::PrimitiveTopology,
    pub front_face: wgpu::FrontFace,
    pub cull_mode: Option<wgpu::Face>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub sample_count: u32,
}

impl GfxStateCreateInfo {
    #[must_use]
    pub fn new(program: ObjectHandle) -> Self {
        Self {
            program,
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            depth_test: true,
            depth_write: true,
            depth_compare: wgpu::CompareFunction::Less,
            sample_count: 1,
        }
    }
}

// ============================================================================
// Shaders & Programs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCreateInfo {
    /// Unique within the shader namespace.
    pub name: String,
    pub stage: wgpu::ShaderStages,
    pub source: Arc<str>,
}

impl ShaderCreateInfo {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        stage: wgpu::ShaderStages,
        source: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            name: name.into(),
            stage,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramCreateInfo {
    /// Unique within the program namespace.
    pub name: String,
    /// Shaders linked into the program. Not validated by the context.
    pub shaders: Vec<ObjectHandle>,
}

impl ProgramCreateInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shaders: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_shaders(mut self, shaders: impl IntoIterator<Item = ObjectHandle>) -> Self {
        self.shaders.extend(shaders);
        self
    }
}

// ============================================================================
// Samplers
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerCreateInfo {
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    pub address_mode_w: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub compare: Option<wgpu::CompareFunction>,
    pub anisotropy_clamp: u16,
}

impl Default for SamplerCreateInfo {
    fn default() -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            anisotropy_clamp: 1,
        }
    }
}

// ============================================================================
// Textures
// ============================================================================

/// Everything that decides whether two textures are interchangeable.
///
/// The texture pool matches descriptors by exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub dimension: wgpu::TextureDimension,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

impl TextureDescriptor {
    /// Single-sampled, single-mip 2D texture.
    #[must_use]
    pub fn new_2d(
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        Self {
            width,
            height,
            depth_or_array_layers: 1,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
        }
    }

    #[must_use]
    pub fn with_mip_level_count(mut self, mip_level_count: u32) -> Self {
        self.mip_level_count = mip_level_count;
        self
    }

    #[must_use]
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }
}

/// CPU-side pixel data for the base mip of a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub bytes_per_row: u32,
    pub data: Arc<[u8]>,
}

impl ImageData {
    #[must_use]
    pub fn new(
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        bytes_per_row: u32,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            width,
            height,
            format,
            bytes_per_row,
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureCreateInfo {
    pub descriptor: TextureDescriptor,
    /// Unique within the texture namespace.
    pub unique_name: Option<String>,
    /// Unique within the texture-file namespace.
    pub filename: Option<String>,
    pub description: Option<String>,
    /// Uploaded synchronously right after construction.
    pub initial_data: Option<ImageData>,
}

impl TextureCreateInfo {
    #[must_use]
    pub fn new(descriptor: TextureDescriptor) -> Self {
        Self {
            descriptor,
            unique_name: None,
            filename: None,
            description: None,
            initial_data: None,
        }
    }

    /// Texture sized and formatted after a decoded image, carrying the image
    /// as initial contents.
    #[must_use]
    pub fn from_image(
        filename: impl Into<String>,
        image: ImageData,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let descriptor = TextureDescriptor::new_2d(
            image.width,
            image.height,
            image.format,
            usage | wgpu::TextureUsages::COPY_DST,
        );
        Self {
            descriptor,
            unique_name: None,
            filename: Some(filename.into()),
            description: None,
            initial_data: Some(image),
        }
    }

    #[must_use]
    pub fn with_unique_name(mut self, name: impl Into<String>) -> Self {
        self.unique_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureViewCreateInfo {
    /// Parent texture. Not validated by the context.
    pub texture: ObjectHandle,
    pub format: Option<wgpu::TextureFormat>,
    pub dimension: Option<wgpu::TextureViewDimension>,
    pub base_mip_level: u32,
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    pub array_layer_count: Option<u32>,
}

impl TextureViewCreateInfo {
    /// Full view over every mip and layer of `texture`.
    #[must_use]
    pub fn whole(texture: ObjectHandle) -> Self {
        Self {
            texture,
            format: None,
            dimension: None,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: 0,
            array_layer_count: None,
        }
    }

    /// Single-mip view.
    #[must_use]
    pub fn mip(texture: ObjectHandle, mip_level: u32) -> Self {
        Self {
            base_mip_level: mip_level,
            mip_level_count: Some(1),
            ..Self::whole(texture)
        }
    }
}

// ============================================================================
// CreateInfo
// ============================================================================

/// A create-info payload of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateInfo {
    Buffer(BufferCreateInfo),
    CommandBuffer(CommandBufferCreateInfo),
    GfxState(GfxStateCreateInfo),
    Program(ProgramCreateInfo),
    Sampler(SamplerCreateInfo),
    Shader(ShaderCreateInfo),
    Texture(TextureCreateInfo),
    TextureView(TextureViewCreateInfo),
}

impl CreateInfo {
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Buffer(_) => ObjectKind::Buffer,
            Self::CommandBuffer(_) => ObjectKind::CommandBuffer,
            Self::GfxState(_) => ObjectKind::GfxState,
            Self::Program(_) => ObjectKind::Program,
            Self::Sampler(_) => ObjectKind::Sampler,
            Self::Shader(_) => ObjectKind::Shader,
            Self::Texture(_) => ObjectKind::Texture,
            Self::TextureView(_) => ObjectKind::TextureView,
        }
    }

    /// Names this payload claims, one per namespace.
    #[must_use]
    pub fn names(&self) -> SmallVec<[(NameNamespace, &str); 2]> {
        let mut names = SmallVec::new();
        match self {
            Self::Program(info) => names.push((NameNamespace::Program, info.name.as_str())),
            Self::Shader(info) => names.push((NameNamespace::Shader, info.name.as_str())),
            Self::Texture(info) => {
                if let Some(name) = &info.unique_name {
                    names.push((NameNamespace::Texture, name.as_str()));
                }
                if let Some(filename) = &info.filename {
                    names.push((NameNamespace::TextureFile, filename.as_str()));
                }
            }
            _ => {}
        }
        names
    }

    /// Preferred debug label: the object's own name when it has one.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Program(info) => Some(info.name.as_str()),
            Self::Shader(info) => Some(info.name.as_str()),
            Self::Texture(info) => info.unique_name.as_deref().or(info.filename.as_deref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_texture(&self) -> Option<&TextureCreateInfo> {
        match self {
            Self::Texture(info) => Some(info),
            _ => None,
        }
    }
}

macro_rules! impl_from_create_info {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CreateInfo {
                fn from(info: $ty) -> Self {
                    Self::$variant(info)
                }
            }
        )*
    };
}

impl_from_create_info! {
    Buffer => BufferCreateInfo,
    CommandBuffer => CommandBufferCreateInfo,
    GfxState => GfxStateCreateInfo,
    Program => ProgramCreateInfo,
    Sampler => SamplerCreateInfo,
    Shader => ShaderCreateInfo,
    Texture => TextureCreateInfo,
    TextureView => TextureViewCreateInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(width: u32, height: u32) -> TextureDescriptor {
        TextureDescriptor::new_2d(
            width,
            height,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    #[test]
    fn texture_names_cover_both_namespaces() {
        let info: CreateInfo = TextureCreateInfo::new(rgba(4, 4))
            .with_unique_name("albedo")
            .with_filename("textures/albedo.png")
            .into();

        let names = info.names();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], (NameNamespace::Texture, "albedo"));
        assert_eq!(names[1], (NameNamespace::TextureFile, "textures/albedo.png"));
        assert_eq!(info.label(), Some("albedo"));
    }

    #[test]
    fn unnamed_kinds_claim_no_names() {
        let info: CreateInfo = BufferCreateInfo::new(64, wgpu::BufferUsages::VERTEX).into();
        assert!(info.names().is_empty());
        assert_eq!(info.label(), None);
        assert_eq!(info.kind(), ObjectKind::Buffer);
    }

    #[test]
    fn from_image_sizes_texture_after_image() {
        let image = ImageData::new(8, 2, wgpu::TextureFormat::Rgba8Unorm, 32, vec![0u8; 64]);
        let info =
            TextureCreateInfo::from_image("a.png", image, wgpu::TextureUsages::TEXTURE_BINDING);

        assert_eq!(info.descriptor.width, 8);
        assert_eq!(info.descriptor.height, 2);
        assert!(info.descriptor.usage.contains(wgpu::TextureUsages::COPY_DST));
        assert_eq!(info.filename.as_deref(), Some("a.png"));
        assert!(info.initial_data.is_some());
    }

    #[test]
    fn descriptors_differ_by_size() {
        assert_eq!(rgba(16, 16), rgba(16, 16));
        assert_ne!(rgba(16, 16), rgba(32, 16));
        assert_ne!(rgba(16, 16), rgba(16, 16).with_sample_count(4));
    }
}
