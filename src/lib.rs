//! # RAL
//!
//! A thread-affine GPU resource context.
//!
//! Client threads create, retain and delete backend objects (buffers, command
//! buffers, pipeline state, programs, samplers, shaders, textures, texture
//! views) through opaque refcounted handles. Every backend call is marshalled
//! onto the one render thread the backend is bound to. Released textures are
//! kept in a descriptor-keyed pool for reuse, and lifecycle events are
//! published on a callback bus.
//!
//! ```rust,ignore
//! use ral::prelude::*;
//! use ral_dev_utils::HeadlessBackend;
//!
//! let render = RenderThread::spawn("render")?;
//! let ctx = ResourceContext::new(
//!     HeadlessBackend::new(),
//!     render.dispatcher().clone(),
//!     ContextSettings::default(),
//! );
//!
//! let buffers = ctx.create_objects(
//!     ObjectKind::Buffer,
//!     &[BufferCreateInfo::new(256, wgpu::BufferUsages::UNIFORM).into()],
//! )?;
//! ctx.delete_objects(ObjectKind::Buffer, &buffers)?;
//!
//! ctx.shutdown()?;
//! render.shutdown();
//! ```

pub use ral_context::{
    CallbackBus, ContextSettings, Dispatcher, DispatcherState, LeakPolicy, RenderThread,
    RequestMode, ResourceContext, SubscriptionId, TexturePool, TexturePoolPolicy,
    TexturePoolStatus,
};
pub use ral_core::{
    Backend, BackendError, BackendProperty, ContextEvent, CreateInfo, EventPayload, HandleList,
    LeakReport, NameNamespace, ObjectHandle, ObjectKind, PropertyValue, RalError, Result, wgpu,
};

pub mod prelude {
    pub use ral_context::{
        ContextSettings, Dispatcher, LeakPolicy, RenderThread, RequestMode, ResourceContext,
        TexturePoolPolicy,
    };
    pub use ral_core::{
        Backend, BufferCreateInfo, CommandBufferCreateInfo, ContextEvent, CreateInfo,
        GfxStateCreateInfo, ImageData, ObjectHandle, ObjectKind, ProgramCreateInfo, RalError,
        SamplerCreateInfo, ShaderCreateInfo, TextureCreateInfo, TextureDescriptor,
        TextureViewCreateInfo, wgpu,
    };
}
