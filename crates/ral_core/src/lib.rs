//! RAL Core
//!
//! Foundational types shared by the resource context and its backends:
//!
//! - [`ObjectKind`]: the closed set of object categories
//! - [`ObjectHandle`]: generation-indexed opaque handles
//! - [`CreateInfo`]: kind-specific construction payloads
//! - [`Backend`]: the contract a graphics API implementation fulfils
//! - [`ContextEvent`]: lifecycle event ids
//! - [`RalError`]: the error taxonomy

pub mod backend;
pub mod create_info;
pub mod errors;
pub mod event;
pub mod handle;
pub mod kind;

pub use backend::{Backend, BackendProperty, PropertyValue};
pub use create_info::{
    BufferCreateInfo, CommandBufferCreateInfo, CommandBufferLevel, CreateInfo, GfxStateCreateInfo,
    ImageData, ProgramCreateInfo, SamplerCreateInfo, ShaderCreateInfo, TextureCreateInfo,
    TextureDescriptor, TextureViewCreateInfo,
};
pub use errors::{BackendError, LeakReport, NameNamespace, RalError, Result};
pub use event::{ContextEvent, EventPayload};
pub use handle::{HandleList, ObjectHandle};
pub use kind::ObjectKind;

/// Re-exported descriptor vocabulary.
pub use wgpu;
