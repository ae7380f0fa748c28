//! The boundary with the underlying graphics API.
//!
//! Everything this crate does to the API goes through [`GlApi`]. Object names are raw `u32`
//! values; the typed wrappers above never hand a name of the wrong kind to a call.
use crate::{
    binding::{BindingTarget, BufferTarget, FramebufferTarget, TextureTarget},
    buffer::{BufferUsage, MapAccess},
    config::ContextConfig,
    framebuffer::{Attachment, FramebufferStatus, Viewport},
    handle::ObjectKind,
    shader::ShaderStage,
    texture::{Extent3d, InternalFormat, TextureLevelParam},
    uniform::{OwnedUniformValues, UniformType, UniformUpload},
};
use std::{num::NonZeroU32, ptr::NonNull};

#[cfg(feature = "headless")]
mod headless;
#[cfg(feature = "native")]
mod native;

#[cfg(feature = "headless")]
pub use self::headless::{Call, HeadlessGl, RecordedUpload};
#[cfg(feature = "native")]
pub use self::native::NativeGl;

/// Errors reported by the API.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("invalid enum")]
    InvalidEnum,
    #[error("invalid value")]
    InvalidValue,
    #[error("invalid operation")]
    InvalidOperation,
    #[error("invalid framebuffer operation")]
    InvalidFramebufferOperation,
    #[error("out of memory")]
    OutOfMemory,
    #[error("failed to create {0:?} object")]
    CreationFailed(ObjectKind),
    #[error("unknown error (code {0:#x})")]
    Other(u32),
}

/// Implementation limits that matter to binding validation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    pub max_texture_units: u32,
    pub max_uniform_buffer_bindings: u32,
    pub max_shader_storage_buffer_bindings: u32,
    pub max_transform_feedback_buffers: u32,
    pub max_atomic_counter_buffer_bindings: u32,
}

impl Limits {
    /// Number of indexed binding points of a buffer target (0 if the target is not indexable).
    pub fn indexed_bindings(&self, target: BufferTarget) -> u32 {
        match target {
            BufferTarget::Uniform => self.max_uniform_buffer_bindings,
            BufferTarget::ShaderStorage => self.max_shader_storage_buffer_bindings,
            BufferTarget::TransformFeedback => self.max_transform_feedback_buffers,
            BufferTarget::AtomicCounter => self.max_atomic_counter_buffer_bindings,
            _ => 0,
        }
    }

    /// Applies the caps of `config`.
    pub(crate) fn capped(self, config: &ContextConfig) -> Limits {
        let cap = |limit: u32, cap: Option<u32>| cap.map_or(limit, |cap| cap.min(limit));
        let indexed = config.max_indexed_bindings;
        Limits {
            max_texture_units: cap(self.max_texture_units, config.max_texture_units),
            max_uniform_buffer_bindings: cap(self.max_uniform_buffer_bindings, indexed),
            max_shader_storage_buffer_bindings: cap(self.max_shader_storage_buffer_bindings, indexed),
            max_transform_feedback_buffers: cap(self.max_transform_feedback_buffers, indexed),
            max_atomic_counter_buffer_bindings: cap(self.max_atomic_counter_buffer_bindings, indexed),
        }
    }
}

/// An active uniform, as reported after a link.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveUniform {
    /// Name as reported (`lights[0]` for arrays, `light.color` for struct members).
    pub name: String,
    pub ty: UniformType,
    /// Array size, 1 for non-arrays.
    pub size: u32,
    /// -1 for uniforms in blocks.
    pub location: i32,
}

/// Calls issued to the underlying API.
///
/// Methods take `&self`: an API instance is tied to one context and one thread. Object names
/// passed in are always live names of the right kind.
pub trait GlApi {
    fn limits(&self) -> Limits;

    // --- objects ---

    /// Creates an object of any kind but `Shader`. Returns 0 on failure.
    fn create(&self, kind: ObjectKind) -> Result<u32, ApiError>;
    /// Creates a shader object. Returns 0 on failure.
    fn create_shader(&self, stage: ShaderStage) -> Result<u32, ApiError>;
    fn delete(&self, kind: ObjectKind, id: u32);
    /// Makes `object` current on `target`, or detaches the current object if `None`.
    fn activate(&self, target: BindingTarget, object: Option<NonZeroU32>) -> Result<(), ApiError>;

    // --- buffers ---

    /// (Re)allocates the storage of a buffer, optionally with initial contents.
    fn buffer_data(
        &self,
        buffer: NonZeroU32,
        size: usize,
        data: Option<&[u8]>,
        usage: BufferUsage,
    ) -> Result<(), ApiError>;
    fn buffer_sub_data(&self, buffer: NonZeroU32, offset: usize, data: &[u8]) -> Result<(), ApiError>;
    fn map_buffer_range(
        &self,
        buffer: NonZeroU32,
        offset: usize,
        len: usize,
        access: MapAccess,
    ) -> Result<NonNull<u8>, ApiError>;
    /// `offset` is relative to the start of the mapped range.
    fn flush_mapped_buffer_range(
        &self,
        buffer: NonZeroU32,
        offset: usize,
        len: usize,
    ) -> Result<(), ApiError>;
    /// Returns `false` if the contents were corrupted while mapped.
    fn unmap_buffer(&self, buffer: NonZeroU32) -> Result<bool, ApiError>;

    // --- textures ---

    /// Specifies a texture level. The texture is current on unit 0 of `target`.
    fn texture_image(
        &self,
        texture: NonZeroU32,
        target: TextureTarget,
        level: u32,
        format: InternalFormat,
        extent: Extent3d,
        data: Option<&[u8]>,
    ) -> Result<(), ApiError>;
    fn texture_sub_image(
        &self,
        texture: NonZeroU32,
        level: u32,
        offset: Extent3d,
        extent: Extent3d,
        format: InternalFormat,
        data: &[u8],
    ) -> Result<(), ApiError>;
    fn texture_level_parameter(
        &self,
        texture: NonZeroU32,
        level: u32,
        param: TextureLevelParam,
    ) -> Result<u32, ApiError>;

    // --- framebuffers ---

    /// Attaches a texture level (or layer) to a framebuffer, or detaches the attachment if
    /// `texture` is `None`.
    fn framebuffer_texture(
        &self,
        framebuffer: NonZeroU32,
        attachment: Attachment,
        texture: Option<NonZeroU32>,
        level: u32,
        layer: Option<u32>,
    ) -> Result<(), ApiError>;
    fn framebuffer_draw_buffers(
        &self,
        framebuffer: NonZeroU32,
        attachments: &[Attachment],
    ) -> Result<(), ApiError>;
    fn framebuffer_default_size(
        &self,
        framebuffer: NonZeroU32,
        width: u32,
        height: u32,
        samples: u32,
    ) -> Result<(), ApiError>;
    fn framebuffer_status(
        &self,
        framebuffer: NonZeroU32,
        target: FramebufferTarget,
    ) -> Result<FramebufferStatus, ApiError>;
    fn viewport(&self, viewport: Viewport) -> Result<(), ApiError>;

    // --- shaders & programs ---

    fn shader_source(&self, shader: NonZeroU32, source: &str) -> Result<(), ApiError>;
    /// Returns the compile status.
    fn compile_shader(&self, shader: NonZeroU32) -> Result<bool, ApiError>;
    fn shader_info_log(&self, shader: NonZeroU32) -> String;
    fn attach_shader(&self, program: NonZeroU32, shader: NonZeroU32) -> Result<(), ApiError>;
    fn detach_shader(&self, program: NonZeroU32, shader: NonZeroU32) -> Result<(), ApiError>;
    /// Returns the link status.
    fn link_program(&self, program: NonZeroU32) -> Result<bool, ApiError>;
    fn program_info_log(&self, program: NonZeroU32) -> String;
    fn active_uniforms(&self, program: NonZeroU32) -> Result<Vec<ActiveUniform>, ApiError>;
    /// Uploads uniform values to the current program.
    fn upload_uniform(&self, upload: &UniformUpload<'_>) -> Result<(), ApiError>;
    /// Reads back one element of a uniform, in the upload representation of `ty`.
    fn read_uniform(
        &self,
        program: NonZeroU32,
        location: i32,
        ty: UniformType,
    ) -> Result<OwnedUniformValues, ApiError>;

    // --- vertex arrays ---

    fn vertex_array_element_buffer(
        &self,
        vertex_array: NonZeroU32,
        buffer: Option<NonZeroU32>,
    ) -> Result<(), ApiError>;
}
