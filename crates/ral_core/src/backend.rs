//! Backend Contract
//!
//! A [`Backend`] is implemented once per graphics API. The resource context is
//! generic over it and guarantees that every method is invoked on the render
//! thread the backend is affine to; implementations never need their own
//! cross-thread synchronisation.

use std::fmt;

use crate::create_info::{CreateInfo, ImageData};
use crate::errors::BackendError;
use crate::kind::ObjectKind;

/// Backend capability and state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendProperty {
    /// Human-readable backend name.
    Name,
    /// Largest supported 2D texture extent.
    MaxTextureDimension2d,
    /// Largest supported MSAA sample count.
    MaxSampleCount,
    /// Largest supported anisotropy clamp.
    MaxAnisotropy,
    /// Required offset alignment for uniform buffer bindings.
    UniformBufferOffsetAlignment,
    /// Required offset alignment for storage buffer bindings.
    StorageBufferOffsetAlignment,
    /// Whether compute pipelines are available.
    SupportsCompute,
}

/// Value returned by [`Backend::get_property`].
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    F32(f32),
    Text(String),
}

impl PropertyValue {
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            Self::U64(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Allocates and frees native objects for one graphics API.
///
/// The context owns the backend behind a mutex that is only ever locked on
/// the render thread.
pub trait Backend: Send + 'static {
    /// Native object owned by the context on the backend's behalf.
    type Object: Send + 'static;

    /// Constructs one native object. `debug_name` is the label the context
    /// synthesised for it.
    fn create_object(
        &mut self,
        info: &CreateInfo,
        debug_name: &str,
    ) -> Result<Self::Object, BackendError>;

    /// Destroys a native object previously returned by
    /// [`create_object`](Self::create_object).
    fn release_object(&mut self, kind: ObjectKind, object: Self::Object);

    /// Uploads base-mip pixel data into a texture.
    fn upload_texture_data(
        &mut self,
        texture: &Self::Object,
        image: &ImageData,
    ) -> Result<(), BackendError>;

    /// Answers a capability query, or `None` if the backend does not know it.
    fn get_property(&self, property: BackendProperty) -> Option<PropertyValue>;
}
