//! Typed wrappers over OpenGL objects with a client-side binding cache.
//!
//! Every object belongs to a [`Context`], which remembers what is bound to each binding point
//! and skips redundant binds. Calls reach the driver through the [`GlApi`] trait; the
//! `headless` feature provides an in-memory implementation and the `native` feature a real one.
pub mod api;
mod binding;
mod buffer;
mod config;
mod context;
mod error;
mod framebuffer;
mod handle;
mod property;
mod shader;
mod texture;
pub mod uniform;
mod vertex_array;

pub use crate::api::{ActiveUniform, ApiError, GlApi, Limits};
pub use crate::binding::{
    BindingState, BindingStats, BindingTarget, BufferTarget, FramebufferTarget, TargetCategory,
    TextureTarget,
};
pub use crate::buffer::{
    Buffer, BufferProperties, BufferProperty, BufferUsage, MapAccess, MappedView, MappingState,
};
pub use crate::config::ContextConfig;
pub use crate::context::Context;
pub use crate::error::{Error, GlResult, UsageError};
pub use crate::framebuffer::{
    Attachment, AttachmentInfo, DefaultSize, Framebuffer, FramebufferProperties,
    FramebufferProperty, FramebufferStatus, Viewport,
};
pub use crate::handle::{ContextObject, Handle, ObjectKind};
pub use crate::property::{CachedProperties, Origin, Property};
pub use crate::shader::{Program, ProgramProperties, ProgramProperty, Shader, ShaderStage};
pub use crate::texture::{
    Extent3d, InternalFormat, Texture, TextureLevelParam, TextureProperties, TextureProperty,
};
pub use crate::uniform::{
    AsUniform, OwnedUniformValues, ScalarType, SourceType, StructLayout, StructMember,
    UniformData, UniformTable, UniformType, UniformVariable,
};
pub use crate::vertex_array::VertexArray;

#[cfg(feature = "headless")]
pub use crate::api::HeadlessGl;
#[cfg(feature = "native")]
pub use crate::api::NativeGl;
