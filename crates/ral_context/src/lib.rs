//! RAL Context
//!
//! The backend-agnostic resource context:
//!
//! - [`ResourceContext`]: batch create / retain / delete with per-kind
//!   registries, a shared refcount table and name indices
//! - [`TexturePool`]: descriptor-keyed reuse cache for released textures
//! - [`CallbackBus`]: lifecycle events
//! - [`Dispatcher`] / [`RenderThread`]: marshalling work onto the thread the
//!   backend is bound to
//! - [`ContextSettings`]: configuration

pub mod callbacks;
pub mod context;
pub mod dispatcher;
mod name_index;
pub mod object_table;
mod registry;
pub mod settings;
pub mod texture_pool;
mod time;

pub use callbacks::{CallbackBus, EventHandler, SubscriptionId};
pub use context::ResourceContext;
pub use dispatcher::{Dispatcher, DispatcherState, RenderThread, RequestMode};
pub use object_table::{RecordState, TextureMeta};
pub use settings::{ContextSettings, LeakPolicy, TexturePoolPolicy};
pub use texture_pool::{PoolOwner, PooledTextureEntry, TexturePool, TexturePoolStatus};
pub use time::{Duration, Instant};
