//! OpenGL 4.5 implementation on top of the `gl` crate.
//!
//! Function pointers are process-global in the `gl` crate; `NativeGl::load` loads them and must
//! be called with the context that will be used current on the calling thread.
use crate::{
    api::{ActiveUniform, ApiError, GlApi, Limits},
    binding::{BindingTarget, BufferTarget, FramebufferTarget, TargetCategory, TextureTarget},
    buffer::{BufferUsage, MapAccess},
    framebuffer::{Attachment, FramebufferStatus, Viewport},
    handle::ObjectKind,
    shader::ShaderStage,
    texture::{Extent3d, InternalFormat, TextureLevelParam},
    uniform::{OwnedUniformValues, ScalarType, UniformType, UniformUpload, UniformValues},
};
use gl::types::*;
use std::{
    cell::RefCell,
    collections::HashMap,
    ffi::{c_void, CStr},
    marker::PhantomData,
    num::NonZeroU32,
    ptr::{self, NonNull},
};
use tracing::{debug, warn};

fn check() -> Result<(), ApiError> {
    let err = unsafe { gl::GetError() };
    match err {
        gl::NO_ERROR => Ok(()),
        gl::INVALID_ENUM => Err(ApiError::InvalidEnum),
        gl::INVALID_VALUE => Err(ApiError::InvalidValue),
        gl::INVALID_OPERATION => Err(ApiError::InvalidOperation),
        gl::INVALID_FRAMEBUFFER_OPERATION => Err(ApiError::InvalidFramebufferOperation),
        gl::OUT_OF_MEMORY => Err(ApiError::OutOfMemory),
        other => Err(ApiError::Other(other)),
    }
}

fn get_integer(pname: GLenum) -> u32 {
    let mut value = 0;
    unsafe { gl::GetIntegerv(pname, &mut value) };
    value.max(0) as u32
}

fn buffer_target(target: BufferTarget) -> GLenum {
    match target {
        BufferTarget::Array => gl::ARRAY_BUFFER,
        BufferTarget::ElementArray => gl::ELEMENT_ARRAY_BUFFER,
        BufferTarget::Uniform => gl::UNIFORM_BUFFER,
        BufferTarget::ShaderStorage => gl::SHADER_STORAGE_BUFFER,
        BufferTarget::CopyRead => gl::COPY_READ_BUFFER,
        BufferTarget::CopyWrite => gl::COPY_WRITE_BUFFER,
        BufferTarget::PixelPack => gl::PIXEL_PACK_BUFFER,
        BufferTarget::PixelUnpack => gl::PIXEL_UNPACK_BUFFER,
        BufferTarget::DrawIndirect => gl::DRAW_INDIRECT_BUFFER,
        BufferTarget::DispatchIndirect => gl::DISPATCH_INDIRECT_BUFFER,
        BufferTarget::TransformFeedback => gl::TRANSFORM_FEEDBACK_BUFFER,
        BufferTarget::AtomicCounter => gl::ATOMIC_COUNTER_BUFFER,
        BufferTarget::Texture => gl::TEXTURE_BUFFER,
        BufferTarget::Query => gl::QUERY_BUFFER,
    }
}

fn texture_target(target: TextureTarget) -> GLenum {
    match target {
        TextureTarget::Tex1D => gl::TEXTURE_1D,
        TextureTarget::Tex2D => gl::TEXTURE_2D,
        TextureTarget::Tex3D => gl::TEXTURE_3D,
        TextureTarget::Tex1DArray => gl::TEXTURE_1D_ARRAY,
        TextureTarget::Tex2DArray => gl::TEXTURE_2D_ARRAY,
        TextureTarget::CubeMap => gl::TEXTURE_CUBE_MAP,
        TextureTarget::CubeMapArray => gl::TEXTURE_CUBE_MAP_ARRAY,
        TextureTarget::Rectangle => gl::TEXTURE_RECTANGLE,
        TextureTarget::Buffer => gl::TEXTURE_BUFFER,
        TextureTarget::Tex2DMultisample => gl::TEXTURE_2D_MULTISAMPLE,
        TextureTarget::Tex2DMultisampleArray => gl::TEXTURE_2D_MULTISAMPLE_ARRAY,
    }
}

fn framebuffer_target(target: FramebufferTarget) -> GLenum {
    match target {
        FramebufferTarget::Draw => gl::DRAW_FRAMEBUFFER,
        FramebufferTarget::Read => gl::READ_FRAMEBUFFER,
        FramebufferTarget::Both => gl::FRAMEBUFFER,
    }
}

fn buffer_usage(usage: BufferUsage) -> GLenum {
    match usage {
        BufferUsage::StreamDraw => gl::STREAM_DRAW,
        BufferUsage::StreamRead => gl::STREAM_READ,
        BufferUsage::StreamCopy => gl::STREAM_COPY,
        BufferUsage::StaticDraw => gl::STATIC_DRAW,
        BufferUsage::StaticRead => gl::STATIC_READ,
        BufferUsage::StaticCopy => gl::STATIC_COPY,
        BufferUsage::DynamicDraw => gl::DYNAMIC_DRAW,
        BufferUsage::DynamicRead => gl::DYNAMIC_READ,
        BufferUsage::DynamicCopy => gl::DYNAMIC_COPY,
    }
}

fn attachment(point: Attachment) -> GLenum {
    match point {
        Attachment::Color(index) => gl::COLOR_ATTACHMENT0 + index,
        Attachment::Depth => gl::DEPTH_ATTACHMENT,
        Attachment::Stencil => gl::STENCIL_ATTACHMENT,
        Attachment::DepthStencil => gl::DEPTH_STENCIL_ATTACHMENT,
    }
}

fn shader_stage(stage: ShaderStage) -> GLenum {
    match stage {
        ShaderStage::Vertex => gl::VERTEX_SHADER,
        ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        ShaderStage::Geometry => gl::GEOMETRY_SHADER,
        ShaderStage::TessControl => gl::TESS_CONTROL_SHADER,
        ShaderStage::TessEvaluation => gl::TESS_EVALUATION_SHADER,
        ShaderStage::Compute => gl::COMPUTE_SHADER,
    }
}

/// Internal format, and the (format, type) pair of host data.
struct FormatInfo {
    internal: GLenum,
    upload_components: GLenum,
    upload_ty: GLenum,
}

fn format_info(format: InternalFormat) -> FormatInfo {
    let (internal, upload_components, upload_ty) = match format {
        InternalFormat::R8 => (gl::R8, gl::RED, gl::UNSIGNED_BYTE),
        InternalFormat::Rg8 => (gl::RG8, gl::RG, gl::UNSIGNED_BYTE),
        InternalFormat::Rgba8 => (gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE),
        InternalFormat::Srgb8Alpha8 => (gl::SRGB8_ALPHA8, gl::RGBA, gl::UNSIGNED_BYTE),
        InternalFormat::R16F => (gl::R16F, gl::RED, gl::HALF_FLOAT),
        InternalFormat::Rg16F => (gl::RG16F, gl::RG, gl::HALF_FLOAT),
        InternalFormat::Rgba16F => (gl::RGBA16F, gl::RGBA, gl::HALF_FLOAT),
        InternalFormat::R32F => (gl::R32F, gl::RED, gl::FLOAT),
        InternalFormat::Rg32F => (gl::RG32F, gl::RG, gl::FLOAT),
        InternalFormat::Rgba32F => (gl::RGBA32F, gl::RGBA, gl::FLOAT),
        InternalFormat::R32I => (gl::R32I, gl::RED_INTEGER, gl::INT),
        InternalFormat::R32UI => (gl::R32UI, gl::RED_INTEGER, gl::UNSIGNED_INT),
        InternalFormat::Depth32F => (gl::DEPTH_COMPONENT32F, gl::DEPTH_COMPONENT, gl::FLOAT),
        InternalFormat::Depth24Stencil8 => {
            (gl::DEPTH24_STENCIL8, gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8)
        }
    };
    FormatInfo {
        internal,
        upload_components,
        upload_ty,
    }
}

fn framebuffer_status(status: GLenum) -> FramebufferStatus {
    match status {
        gl::FRAMEBUFFER_COMPLETE => FramebufferStatus::Complete,
        gl::FRAMEBUFFER_UNDEFINED => FramebufferStatus::Undefined,
        gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => FramebufferStatus::IncompleteAttachment,
        gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => FramebufferStatus::MissingAttachment,
        gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => FramebufferStatus::IncompleteDrawBuffer,
        gl::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => FramebufferStatus::IncompleteReadBuffer,
        gl::FRAMEBUFFER_UNSUPPORTED => FramebufferStatus::Unsupported,
        gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => FramebufferStatus::IncompleteMultisample,
        gl::FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => FramebufferStatus::IncompleteLayerTargets,
        other => FramebufferStatus::Other(other),
    }
}

const fn sampler(dim: TextureTarget, sampled: ScalarType, shadow: bool) -> UniformType {
    UniformType::Sampler {
        dim,
        sampled,
        shadow,
    }
}

const fn image(dim: TextureTarget, sampled: ScalarType) -> UniformType {
    UniformType::Image { dim, sampled }
}

const fn mat(elem: ScalarType, columns: u8, rows: u8) -> UniformType {
    UniformType::Matrix {
        elem,
        columns,
        rows,
    }
}

/// Uniform type from the type enum reported by `glGetActiveUniform`.
fn uniform_type(ty: GLenum) -> Option<UniformType> {
    use ScalarType::{Double as D, Float as F, Int as I, UInt as U};
    use TextureTarget as T;
    let ty = match ty {
        gl::FLOAT => UniformType::FLOAT,
        gl::FLOAT_VEC2 => UniformType::VEC2,
        gl::FLOAT_VEC3 => UniformType::VEC3,
        gl::FLOAT_VEC4 => UniformType::VEC4,
        gl::DOUBLE => UniformType::DOUBLE,
        gl::DOUBLE_VEC2 => UniformType::DVEC2,
        gl::DOUBLE_VEC3 => UniformType::DVEC3,
        gl::DOUBLE_VEC4 => UniformType::DVEC4,
        gl::INT => UniformType::INT,
        gl::INT_VEC2 => UniformType::IVEC2,
        gl::INT_VEC3 => UniformType::IVEC3,
        gl::INT_VEC4 => UniformType::IVEC4,
        gl::UNSIGNED_INT => UniformType::UINT,
        gl::UNSIGNED_INT_VEC2 => UniformType::UVEC2,
        gl::UNSIGNED_INT_VEC3 => UniformType::UVEC3,
        gl::UNSIGNED_INT_VEC4 => UniformType::UVEC4,
        gl::BOOL => UniformType::BOOL,
        gl::BOOL_VEC2 => UniformType::BVEC2,
        gl::BOOL_VEC3 => UniformType::BVEC3,
        gl::BOOL_VEC4 => UniformType::BVEC4,
        gl::FLOAT_MAT2 => mat(F, 2, 2),
        gl::FLOAT_MAT3 => mat(F, 3, 3),
        gl::FLOAT_MAT4 => mat(F, 4, 4),
        gl::FLOAT_MAT2x3 => mat(F, 2, 3),
        gl::FLOAT_MAT2x4 => mat(F, 2, 4),
        gl::FLOAT_MAT3x2 => mat(F, 3, 2),
        gl::FLOAT_MAT3x4 => mat(F, 3, 4),
        gl::FLOAT_MAT4x2 => mat(F, 4, 2),
        gl::FLOAT_MAT4x3 => mat(F, 4, 3),
        gl::DOUBLE_MAT2 => mat(D, 2, 2),
        gl::DOUBLE_MAT3 => mat(D, 3, 3),
        gl::DOUBLE_MAT4 => mat(D, 4, 4),
        gl::DOUBLE_MAT2x3 => mat(D, 2, 3),
        gl::DOUBLE_MAT2x4 => mat(D, 2, 4),
        gl::DOUBLE_MAT3x2 => mat(D, 3, 2),
        gl::DOUBLE_MAT3x4 => mat(D, 3, 4),
        gl::DOUBLE_MAT4x2 => mat(D, 4, 2),
        gl::DOUBLE_MAT4x3 => mat(D, 4, 3),
        gl::SAMPLER_1D => sampler(T::Tex1D, F, false),
        gl::SAMPLER_2D => sampler(T::Tex2D, F, false),
        gl::SAMPLER_3D => sampler(T::Tex3D, F, false),
        gl::SAMPLER_CUBE => sampler(T::CubeMap, F, false),
        gl::SAMPLER_2D_RECT => sampler(T::Rectangle, F, false),
        gl::SAMPLER_1D_ARRAY => sampler(T::Tex1DArray, F, false),
        gl::SAMPLER_2D_ARRAY => sampler(T::Tex2DArray, F, false),
        gl::SAMPLER_CUBE_MAP_ARRAY => sampler(T::CubeMapArray, F, false),
        gl::SAMPLER_BUFFER => sampler(T::Buffer, F, false),
        gl::SAMPLER_2D_MULTISAMPLE => sampler(T::Tex2DMultisample, F, false),
        gl::SAMPLER_2D_MULTISAMPLE_ARRAY => sampler(T::Tex2DMultisampleArray, F, false),
        gl::SAMPLER_1D_SHADOW => sampler(T::Tex1D, F, true),
        gl::SAMPLER_2D_SHADOW => sampler(T::Tex2D, F, true),
        gl::SAMPLER_CUBE_SHADOW => sampler(T::CubeMap, F, true),
        gl::SAMPLER_2D_RECT_SHADOW => sampler(T::Rectangle, F, true),
        gl::SAMPLER_1D_ARRAY_SHADOW => sampler(T::Tex1DArray, F, true),
        gl::SAMPLER_2D_ARRAY_SHADOW => sampler(T::Tex2DArray, F, true),
        gl::SAMPLER_CUBE_MAP_ARRAY_SHADOW => sampler(T::CubeMapArray, F, true),
        gl::INT_SAMPLER_1D => sampler(T::Tex1D, I, false),
        gl::INT_SAMPLER_2D => sampler(T::Tex2D, I, false),
        gl::INT_SAMPLER_3D => sampler(T::Tex3D, I, false),
        gl::INT_SAMPLER_CUBE => sampler(T::CubeMap, I, false),
        gl::INT_SAMPLER_2D_ARRAY => sampler(T::Tex2DArray, I, false),
        gl::INT_SAMPLER_BUFFER => sampler(T::Buffer, I, false),
        gl::UNSIGNED_INT_SAMPLER_1D => sampler(T::Tex1D, U, false),
        gl::UNSIGNED_INT_SAMPLER_2D => sampler(T::Tex2D, U, false),
        gl::UNSIGNED_INT_SAMPLER_3D => sampler(T::Tex3D, U, false),
        gl::UNSIGNED_INT_SAMPLER_CUBE => sampler(T::CubeMap, U, false),
        gl::UNSIGNED_INT_SAMPLER_2D_ARRAY => sampler(T::Tex2DArray, U, false),
        gl::UNSIGNED_INT_SAMPLER_BUFFER => sampler(T::Buffer, U, false),
        gl::IMAGE_1D => image(T::Tex1D, F),
        gl::IMAGE_2D => image(T::Tex2D, F),
        gl::IMAGE_3D => image(T::Tex3D, F),
        gl::IMAGE_CUBE => image(T::CubeMap, F),
        gl::IMAGE_2D_ARRAY => image(T::Tex2DArray, F),
        gl::IMAGE_BUFFER => image(T::Buffer, F),
        gl::INT_IMAGE_2D => image(T::Tex2D, I),
        gl::INT_IMAGE_3D => image(T::Tex3D, I),
        gl::UNSIGNED_INT_IMAGE_2D => image(T::Tex2D, U),
        gl::UNSIGNED_INT_IMAGE_3D => image(T::Tex3D, U),
        _ => return None,
    };
    Some(ty)
}

fn info_log(
    id: GLuint,
    get_iv: unsafe fn(GLuint, GLenum, *mut GLint),
    get_log: unsafe fn(GLuint, GLsizei, *mut GLsizei, *mut GLchar),
) -> String {
    unsafe {
        let mut len = 0;
        get_iv(id, gl::INFO_LOG_LENGTH, &mut len);
        if len <= 0 {
            return String::new();
        }
        let mut buf: Vec<u8> = vec![0; len as usize];
        let mut written = 0;
        get_log(id, len, &mut written, buf.as_mut_ptr() as *mut GLchar);
        buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// OpenGL implementation of the API.
///
/// Not `Send`: the context must stay current on the thread that created this object.
pub struct NativeGl {
    limits: Limits,
    /// Texture targets, fixed on first bind.
    texture_targets: RefCell<HashMap<u32, TextureTarget>>,
    _not_send: PhantomData<*const ()>,
}

impl NativeGl {
    /// Loads the GL function pointers with `loader` and queries the implementation limits.
    pub fn load(loader: impl FnMut(&'static str) -> *const c_void) -> NativeGl {
        gl::load_with(loader);
        let limits = Limits {
            max_texture_units: get_integer(gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS),
            max_uniform_buffer_bindings: get_integer(gl::MAX_UNIFORM_BUFFER_BINDINGS),
            max_shader_storage_buffer_bindings: get_integer(gl::MAX_SHADER_STORAGE_BUFFER_BINDINGS),
            max_transform_feedback_buffers: get_integer(gl::MAX_TRANSFORM_FEEDBACK_BUFFERS),
            max_atomic_counter_buffer_bindings: get_integer(gl::MAX_ATOMIC_COUNTER_BUFFER_BINDINGS),
        };
        debug!(?limits, "loaded OpenGL functions");
        NativeGl {
            limits,
            texture_targets: RefCell::new(HashMap::new()),
            _not_send: PhantomData,
        }
    }

    fn texture_target_of(&self, texture: u32) -> Result<TextureTarget, ApiError> {
        self.texture_targets
            .borrow()
            .get(&texture)
            .copied()
            .ok_or(ApiError::InvalidOperation)
    }
}

/// Runs `f` with tightly packed pixel rows.
unsafe fn with_unpack_alignment_1(f: impl FnOnce()) {
    let mut prev_unpack_alignment = 0;
    gl::GetIntegerv(gl::UNPACK_ALIGNMENT, &mut prev_unpack_alignment);
    gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
    f();
    gl::PixelStorei(gl::UNPACK_ALIGNMENT, prev_unpack_alignment);
}

impl GlApi for NativeGl {
    fn limits(&self) -> Limits {
        self.limits
    }

    fn create(&self, kind: ObjectKind) -> Result<u32, ApiError> {
        let mut obj = 0;
        unsafe {
            match kind {
                ObjectKind::Buffer => gl::CreateBuffers(1, &mut obj),
                // the target of a texture is only known at first bind
                ObjectKind::Texture => gl::GenTextures(1, &mut obj),
                ObjectKind::Framebuffer => gl::CreateFramebuffers(1, &mut obj),
                ObjectKind::Program => obj = gl::CreateProgram(),
                ObjectKind::VertexArray => gl::CreateVertexArrays(1, &mut obj),
                ObjectKind::Shader => return Err(ApiError::InvalidEnum),
            }
        }
        check()?;
        Ok(obj)
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, ApiError> {
        let obj = unsafe { gl::CreateShader(shader_stage(stage)) };
        check()?;
        Ok(obj)
    }

    fn delete(&self, kind: ObjectKind, id: u32) {
        unsafe {
            match kind {
                ObjectKind::Buffer => gl::DeleteBuffers(1, &id),
                ObjectKind::Texture => {
                    self.texture_targets.borrow_mut().remove(&id);
                    gl::DeleteTextures(1, &id)
                }
                ObjectKind::Framebuffer => gl::DeleteFramebuffers(1, &id),
                ObjectKind::Shader => gl::DeleteShader(id),
                ObjectKind::Program => gl::DeleteProgram(id),
                ObjectKind::VertexArray => gl::DeleteVertexArrays(1, &id),
            }
        }
        if let Err(err) = check() {
            warn!(?kind, id, ?err, "error deleting object");
        }
    }

    fn activate(&self, target: BindingTarget, object: Option<NonZeroU32>) -> Result<(), ApiError> {
        let obj = object.map_or(0, NonZeroU32::get);
        unsafe {
            match (target.category(), target.slot()) {
                (TargetCategory::Buffer(t), None) => gl::BindBuffer(buffer_target(t), obj),
                (TargetCategory::Buffer(t), Some(index)) => {
                    gl::BindBufferBase(buffer_target(t), index, obj)
                }
                (TargetCategory::Texture(t), unit) => {
                    gl::ActiveTexture(gl::TEXTURE0 + unit.unwrap_or(0));
                    gl::BindTexture(texture_target(t), obj);
                }
                (TargetCategory::Framebuffer(t), _) => gl::BindFramebuffer(framebuffer_target(t), obj),
                (TargetCategory::Program, _) => gl::UseProgram(obj),
                (TargetCategory::VertexArray, _) => gl::BindVertexArray(obj),
            }
        }
        check()?;
        if let (TargetCategory::Texture(t), Some(obj)) = (target.category(), object) {
            self.texture_targets.borrow_mut().entry(obj.get()).or_insert(t);
        }
        Ok(())
    }

    fn buffer_data(
        &self,
        buffer: NonZeroU32,
        size: usize,
        data: Option<&[u8]>,
        usage: BufferUsage,
    ) -> Result<(), ApiError> {
        let ptr = data.map_or(ptr::null(), |d| d.as_ptr() as *const c_void);
        unsafe {
            gl::NamedBufferData(buffer.get(), size as GLsizeiptr, ptr, buffer_usage(usage));
        }
        check()
    }

    fn buffer_sub_data(&self, buffer: NonZeroU32, offset: usize, data: &[u8]) -> Result<(), ApiError> {
        unsafe {
            gl::NamedBufferSubData(
                buffer.get(),
                offset as GLintptr,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const c_void,
            );
        }
        check()
    }

    fn map_buffer_range(
        &self,
        buffer: NonZeroU32,
        offset: usize,
        len: usize,
        access: MapAccess,
    ) -> Result<NonNull<u8>, ApiError> {
        let ptr = unsafe {
            gl::MapNamedBufferRange(
                buffer.get(),
                offset as GLintptr,
                len as GLsizeiptr,
                access.bits(),
            )
        };
        check()?;
        NonNull::new(ptr as *mut u8).ok_or(ApiError::OutOfMemory)
    }

    fn flush_mapped_buffer_range(
        &self,
        buffer: NonZeroU32,
        offset: usize,
        len: usize,
    ) -> Result<(), ApiError> {
        unsafe {
            gl::FlushMappedNamedBufferRange(buffer.get(), offset as GLintptr, len as GLsizeiptr);
        }
        check()
    }

    fn unmap_buffer(&self, buffer: NonZeroU32) -> Result<bool, ApiError> {
        let intact = unsafe { gl::UnmapNamedBuffer(buffer.get()) };
        check()?;
        Ok(intact == gl::TRUE)
    }

    fn texture_image(
        &self,
        texture: NonZeroU32,
        target: TextureTarget,
        level: u32,
        format: InternalFormat,
        extent: Extent3d,
        data: Option<&[u8]>,
    ) -> Result<(), ApiError> {
        if matches!(
            target,
            TextureTarget::Buffer | TextureTarget::Tex2DMultisample | TextureTarget::Tex2DMultisampleArray
        ) {
            // need dedicated storage calls
            return Err(ApiError::InvalidEnum);
        }
        let fmt = format_info(format);
        let ptr = data.map_or(ptr::null(), |d| d.as_ptr() as *const c_void);
        let (w, h, d) = (extent.width as i32, extent.height as i32, extent.depth as i32);
        let level = level as i32;
        let internal = fmt.internal as i32;
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0);
            with_unpack_alignment_1(|| match target {
                TextureTarget::Tex1D => gl::TexImage1D(
                    gl::TEXTURE_1D,
                    level,
                    internal,
                    w,
                    0,
                    fmt.upload_components,
                    fmt.upload_ty,
                    ptr,
                ),
                TextureTarget::Tex2D | TextureTarget::Tex1DArray | TextureTarget::Rectangle => {
                    gl::TexImage2D(
                        texture_target(target),
                        level,
                        internal,
                        w,
                        h,
                        0,
                        fmt.upload_components,
                        fmt.upload_ty,
                        ptr,
                    )
                }
                TextureTarget::CubeMap => {
                    let face_size = extent.width as usize * extent.height as usize * format.texel_size();
                    for face in 0..6 {
                        let face_ptr = data
                            .and_then(|d| d.get(face * face_size..))
                            .map_or(ptr::null(), |d| d.as_ptr() as *const c_void);
                        gl::TexImage2D(
                            gl::TEXTURE_CUBE_MAP_POSITIVE_X + face as u32,
                            level,
                            internal,
                            w,
                            h,
                            0,
                            fmt.upload_components,
                            fmt.upload_ty,
                            face_ptr,
                        );
                    }
                }
                TextureTarget::Tex3D | TextureTarget::Tex2DArray | TextureTarget::CubeMapArray => {
                    gl::TexImage3D(
                        texture_target(target),
                        level,
                        internal,
                        w,
                        h,
                        d,
                        0,
                        fmt.upload_components,
                        fmt.upload_ty,
                        ptr,
                    )
                }
                _ => {}
            });
        }
        check()?;
        self.texture_targets.borrow_mut().insert(texture.get(), target);
        Ok(())
    }

    fn texture_sub_image(
        &self,
        texture: NonZeroU32,
        level: u32,
        offset: Extent3d,
        extent: Extent3d,
        format: InternalFormat,
        data: &[u8],
    ) -> Result<(), ApiError> {
        let target = self.texture_target_of(texture.get())?;
        let fmt = format_info(format);
        let ptr = data.as_ptr() as *const c_void;
        let tex = texture.get();
        let level = level as i32;
        unsafe {
            with_unpack_alignment_1(|| match target {
                TextureTarget::Tex1D => gl::TextureSubImage1D(
                    tex,
                    level,
                    offset.width as i32,
                    extent.width as i32,
                    fmt.upload_components,
                    fmt.upload_ty,
                    ptr,
                ),
                TextureTarget::Tex2D | TextureTarget::Tex1DArray | TextureTarget::Rectangle => {
                    gl::TextureSubImage2D(
                        tex,
                        level,
                        offset.width as i32,
                        offset.height as i32,
                        extent.width as i32,
                        extent.height as i32,
                        fmt.upload_components,
                        fmt.upload_ty,
                        ptr,
                    )
                }
                _ => gl::TextureSubImage3D(
                    tex,
                    level,
                    offset.width as i32,
                    offset.height as i32,
                    offset.depth as i32,
                    extent.width as i32,
                    extent.height as i32,
                    extent.depth as i32,
                    fmt.upload_components,
                    fmt.upload_ty,
                    ptr,
                ),
            });
        }
        check()
    }

    fn texture_level_parameter(
        &self,
        texture: NonZeroU32,
        level: u32,
        param: TextureLevelParam,
    ) -> Result<u32, ApiError> {
        let pname = match param {
            TextureLevelParam::Width => gl::TEXTURE_WIDTH,
            TextureLevelParam::Height => gl::TEXTURE_HEIGHT,
            TextureLevelParam::Depth => gl::TEXTURE_DEPTH,
        };
        let mut value = 0;
        unsafe { gl::GetTextureLevelParameteriv(texture.get(), level as i32, pname, &mut value) };
        check()?;
        Ok(value.max(0) as u32)
    }

    fn framebuffer_texture(
        &self,
        framebuffer: NonZeroU32,
        point: Attachment,
        texture: Option<NonZeroU32>,
        level: u32,
        layer: Option<u32>,
    ) -> Result<(), ApiError> {
        let tex = texture.map_or(0, NonZeroU32::get);
        unsafe {
            match layer {
                Some(layer) => gl::NamedFramebufferTextureLayer(
                    framebuffer.get(),
                    attachment(point),
                    tex,
                    level as i32,
                    layer as i32,
                ),
                None => gl::NamedFramebufferTexture(
                    framebuffer.get(),
                    attachment(point),
                    tex,
                    level as i32,
                ),
            }
        }
        check()
    }

    fn framebuffer_draw_buffers(
        &self,
        framebuffer: NonZeroU32,
        attachments: &[Attachment],
    ) -> Result<(), ApiError> {
        let bufs: Vec<GLenum> = attachments.iter().map(|a| attachment(*a)).collect();
        unsafe {
            gl::NamedFramebufferDrawBuffers(framebuffer.get(), bufs.len() as i32, bufs.as_ptr());
        }
        check()
    }

    fn framebuffer_default_size(
        &self,
        framebuffer: NonZeroU32,
        width: u32,
        height: u32,
        samples: u32,
    ) -> Result<(), ApiError> {
        unsafe {
            let fb = framebuffer.get();
            gl::NamedFramebufferParameteri(fb, gl::FRAMEBUFFER_DEFAULT_WIDTH, width as i32);
            gl::NamedFramebufferParameteri(fb, gl::FRAMEBUFFER_DEFAULT_HEIGHT, height as i32);
            gl::NamedFramebufferParameteri(fb, gl::FRAMEBUFFER_DEFAULT_SAMPLES, samples as i32);
        }
        check()
    }

    fn framebuffer_status(
        &self,
        framebuffer: NonZeroU32,
        target: FramebufferTarget,
    ) -> Result<FramebufferStatus, ApiError> {
        let status =
            unsafe { gl::CheckNamedFramebufferStatus(framebuffer.get(), framebuffer_target(target)) };
        check()?;
        Ok(framebuffer_status(status))
    }

    fn viewport(&self, viewport: Viewport) -> Result<(), ApiError> {
        unsafe {
            gl::Viewport(
                viewport.x,
                viewport.y,
                viewport.width as i32,
                viewport.height as i32,
            );
        }
        check()
    }

    fn shader_source(&self, shader: NonZeroU32, source: &str) -> Result<(), ApiError> {
        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        unsafe { gl::ShaderSource(shader.get(), 1, &ptr, &len) };
        check()
    }

    fn compile_shader(&self, shader: NonZeroU32) -> Result<bool, ApiError> {
        let mut status = 0;
        unsafe {
            gl::CompileShader(shader.get());
            gl::GetShaderiv(shader.get(), gl::COMPILE_STATUS, &mut status);
        }
        check()?;
        Ok(status == gl::TRUE as GLint)
    }

    fn shader_info_log(&self, shader: NonZeroU32) -> String {
        info_log(shader.get(), gl::GetShaderiv, gl::GetShaderInfoLog)
    }

    fn attach_shader(&self, program: NonZeroU32, shader: NonZeroU32) -> Result<(), ApiError> {
        unsafe { gl::AttachShader(program.get(), shader.get()) };
        check()
    }

    fn detach_shader(&self, program: NonZeroU32, shader: NonZeroU32) -> Result<(), ApiError> {
        unsafe { gl::DetachShader(program.get(), shader.get()) };
        check()
    }

    fn link_program(&self, program: NonZeroU32) -> Result<bool, ApiError> {
        let mut status = 0;
        unsafe {
            gl::LinkProgram(program.get());
            gl::GetProgramiv(program.get(), gl::LINK_STATUS, &mut status);
        }
        check()?;
        Ok(status == gl::TRUE as GLint)
    }

    fn program_info_log(&self, program: NonZeroU32) -> String {
        info_log(program.get(), gl::GetProgramiv, gl::GetProgramInfoLog)
    }

    fn active_uniforms(&self, program: NonZeroU32) -> Result<Vec<ActiveUniform>, ApiError> {
        let program = program.get();
        let mut uniforms = Vec::new();
        unsafe {
            let mut count = 0;
            let mut max_len = 0;
            gl::GetProgramiv(program, gl::ACTIVE_UNIFORMS, &mut count);
            gl::GetProgramiv(program, gl::ACTIVE_UNIFORM_MAX_LENGTH, &mut max_len);
            let mut name_buf: Vec<u8> = vec![0; max_len.max(1) as usize];
            for index in 0..count.max(0) as u32 {
                let mut len = 0;
                let mut size = 0;
                let mut ty = 0;
                gl::GetActiveUniform(
                    program,
                    index,
                    name_buf.len() as GLsizei,
                    &mut len,
                    &mut size,
                    &mut ty,
                    name_buf.as_mut_ptr() as *mut GLchar,
                );
                let name = match CStr::from_bytes_until_nul(&name_buf) {
                    Ok(name) => name.to_string_lossy().into_owned(),
                    Err(_) => continue,
                };
                let ty = match uniform_type(ty) {
                    Some(ty) => ty,
                    None => {
                        warn!(%name, ty, "skipping uniform of unsupported type");
                        continue;
                    }
                };
                let location =
                    gl::GetUniformLocation(program, name_buf.as_ptr() as *const GLchar);
                uniforms.push(ActiveUniform {
                    name,
                    ty,
                    size: size.max(1) as u32,
                    location,
                });
            }
        }
        check()?;
        Ok(uniforms)
    }

    fn upload_uniform(&self, upload: &UniformUpload<'_>) -> Result<(), ApiError> {
        let loc = upload.location;
        let n = upload.count as GLsizei;
        unsafe {
            match (upload.values, upload.columns, upload.rows) {
                (UniformValues::Float(v), 1, 1) => gl::Uniform1fv(loc, n, v.as_ptr()),
                (UniformValues::Float(v), 1, 2) => gl::Uniform2fv(loc, n, v.as_ptr()),
                (UniformValues::Float(v), 1, 3) => gl::Uniform3fv(loc, n, v.as_ptr()),
                (UniformValues::Float(v), 1, 4) => gl::Uniform4fv(loc, n, v.as_ptr()),
                (UniformValues::Float(v), 2, 2) => gl::UniformMatrix2fv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Float(v), 3, 3) => gl::UniformMatrix3fv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Float(v), 4, 4) => gl::UniformMatrix4fv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Float(v), 2, 3) => gl::UniformMatrix2x3fv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Float(v), 2, 4) => gl::UniformMatrix2x4fv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Float(v), 3, 2) => gl::UniformMatrix3x2fv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Float(v), 3, 4) => gl::UniformMatrix3x4fv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Float(v), 4, 2) => gl::UniformMatrix4x2fv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Float(v), 4, 3) => gl::UniformMatrix4x3fv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Double(v), 1, 1) => gl::Uniform1dv(loc, n, v.as_ptr()),
                (UniformValues::Double(v), 1, 2) => gl::Uniform2dv(loc, n, v.as_ptr()),
                (UniformValues::Double(v), 1, 3) => gl::Uniform3dv(loc, n, v.as_ptr()),
                (UniformValues::Double(v), 1, 4) => gl::Uniform4dv(loc, n, v.as_ptr()),
                (UniformValues::Double(v), 2, 2) => gl::UniformMatrix2dv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Double(v), 3, 3) => gl::UniformMatrix3dv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Double(v), 4, 4) => gl::UniformMatrix4dv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Double(v), 2, 3) => gl::UniformMatrix2x3dv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Double(v), 2, 4) => gl::UniformMatrix2x4dv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Double(v), 3, 2) => gl::UniformMatrix3x2dv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Double(v), 3, 4) => gl::UniformMatrix3x4dv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Double(v), 4, 2) => gl::UniformMatrix4x2dv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Double(v), 4, 3) => gl::UniformMatrix4x3dv(loc, n, gl::FALSE, v.as_ptr()),
                (UniformValues::Int(v), 1, 1) => gl::Uniform1iv(loc, n, v.as_ptr()),
                (UniformValues::Int(v), 1, 2) => gl::Uniform2iv(loc, n, v.as_ptr()),
                (UniformValues::Int(v), 1, 3) => gl::Uniform3iv(loc, n, v.as_ptr()),
                (UniformValues::Int(v), 1, 4) => gl::Uniform4iv(loc, n, v.as_ptr()),
                (UniformValues::UInt(v), 1, 1) => gl::Uniform1uiv(loc, n, v.as_ptr()),
                (UniformValues::UInt(v), 1, 2) => gl::Uniform2uiv(loc, n, v.as_ptr()),
                (UniformValues::UInt(v), 1, 3) => gl::Uniform3uiv(loc, n, v.as_ptr()),
                (UniformValues::UInt(v), 1, 4) => gl::Uniform4uiv(loc, n, v.as_ptr()),
                _ => return Err(ApiError::InvalidOperation),
            }
        }
        check()
    }

    fn read_uniform(
        &self,
        program: NonZeroU32,
        location: i32,
        ty: UniformType,
    ) -> Result<OwnedUniformValues, ApiError> {
        let mut values = OwnedUniformValues::zeroed(ty.upload_kind(), ty.components());
        let program = program.get();
        unsafe {
            match &mut values {
                OwnedUniformValues::Float(v) => gl::GetUniformfv(program, location, v.as_mut_ptr()),
                OwnedUniformValues::Double(v) => gl::GetUniformdv(program, location, v.as_mut_ptr()),
                OwnedUniformValues::Int(v) => gl::GetUniformiv(program, location, v.as_mut_ptr()),
                OwnedUniformValues::UInt(v) => gl::GetUniformuiv(program, location, v.as_mut_ptr()),
            }
        }
        check()?;
        Ok(values)
    }

    fn vertex_array_element_buffer(
        &self,
        vertex_array: NonZeroU32,
        buffer: Option<NonZeroU32>,
    ) -> Result<(), ApiError> {
        unsafe {
            gl::VertexArrayElementBuffer(vertex_array.get(), buffer.map_or(0, NonZeroU32::get));
        }
        check()
    }
}
