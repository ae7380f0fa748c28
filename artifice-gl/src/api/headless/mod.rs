//! In-memory implementation of the API.
//!
//! Keeps the state an OpenGL implementation would keep (objects, bindings, buffer and texture
//! contents, program uniforms), validates calls the way the API does, and records every call
//! so that tests can count them.
mod glsl;

use crate::{
    api::{ActiveUniform, ApiError, GlApi, Limits},
    binding::{BindingTarget, BufferTarget, FramebufferTarget, TargetCategory, TextureTarget},
    buffer::{BufferUsage, MapAccess},
    framebuffer::{Attachment, FramebufferStatus, Viewport},
    handle::ObjectKind,
    shader::ShaderStage,
    texture::{Extent3d, InternalFormat, TextureLevelParam},
    uniform::{OwnedUniformValues, UniformClass, UniformType, UniformUpload, UniformValues},
};
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
    num::NonZeroU32,
    ptr::NonNull,
};
use tracing::trace;

const MAX_COLOR_ATTACHMENTS: u32 = 8;

/// A uniform upload, as received.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedUpload {
    pub program: u32,
    pub location: i32,
    pub rows: u8,
    pub columns: u8,
    pub count: usize,
    pub values: OwnedUniformValues,
}

/// A call received by `HeadlessGl`.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Create {
        kind: ObjectKind,
        id: u32,
    },
    Delete {
        kind: ObjectKind,
        id: u32,
    },
    Activate {
        target: BindingTarget,
        object: Option<u32>,
    },
    BufferData {
        buffer: u32,
        size: usize,
        usage: BufferUsage,
    },
    BufferSubData {
        buffer: u32,
        offset: usize,
        len: usize,
    },
    MapBuffer {
        buffer: u32,
        offset: usize,
        len: usize,
        access: MapAccess,
    },
    FlushMappedBufferRange {
        buffer: u32,
        offset: usize,
        len: usize,
    },
    UnmapBuffer {
        buffer: u32,
    },
    TextureImage {
        texture: u32,
        level: u32,
        format: InternalFormat,
        extent: Extent3d,
    },
    TextureSubImage {
        texture: u32,
        level: u32,
        offset: Extent3d,
        extent: Extent3d,
    },
    TextureLevelParameter {
        texture: u32,
        level: u32,
        param: TextureLevelParam,
    },
    FramebufferTexture {
        framebuffer: u32,
        attachment: Attachment,
        texture: Option<u32>,
        level: u32,
        layer: Option<u32>,
    },
    FramebufferDrawBuffers {
        framebuffer: u32,
        attachments: Vec<Attachment>,
    },
    FramebufferDefaultSize {
        framebuffer: u32,
        width: u32,
        height: u32,
        samples: u32,
    },
    CheckFramebufferStatus {
        framebuffer: u32,
    },
    Viewport(Viewport),
    ShaderSource {
        shader: u32,
    },
    CompileShader {
        shader: u32,
    },
    AttachShader {
        program: u32,
        shader: u32,
    },
    DetachShader {
        program: u32,
        shader: u32,
    },
    LinkProgram {
        program: u32,
    },
    UploadUniform(RecordedUpload),
    VertexArrayElementBuffer {
        vertex_array: u32,
        buffer: Option<u32>,
    },
}

#[derive(Copy, Clone, Debug)]
struct Mapping {
    offset: usize,
    len: usize,
    access: MapAccess,
}

#[derive(Debug, Default)]
struct BufferObject {
    data: Vec<u8>,
    mapping: Option<Mapping>,
}

#[derive(Debug)]
struct TextureLevel {
    format: InternalFormat,
    extent: Extent3d,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct TextureObject {
    /// Set by the first bind or image specification.
    target: Option<TextureTarget>,
    levels: BTreeMap<u32, TextureLevel>,
}

#[derive(Copy, Clone, Debug)]
struct AttachedTexture {
    texture: u32,
    level: u32,
}

#[derive(Debug, Default)]
struct FramebufferObject {
    attachments: BTreeMap<Attachment, AttachedTexture>,
    draw_buffers: Vec<Attachment>,
    default_width: u32,
    default_height: u32,
}

#[derive(Debug)]
struct ShaderObject {
    source: Option<String>,
    compiled: bool,
    log: String,
    uniforms: Vec<glsl::DeclaredUniform>,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<u32>,
    linked: bool,
    log: String,
    uniforms: Vec<ActiveUniform>,
    /// Values of every uniform element, by location.
    values: HashMap<i32, OwnedUniformValues>,
}

#[derive(Debug, Default)]
struct VertexArrayObject {
    element_buffer: Option<u32>,
}

#[derive(Debug, Default)]
struct State {
    next_id: HashMap<ObjectKind, u32>,
    buffers: HashMap<u32, BufferObject>,
    textures: HashMap<u32, TextureObject>,
    framebuffers: HashMap<u32, FramebufferObject>,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    vertex_arrays: HashMap<u32, VertexArrayObject>,
    bindings: HashMap<BindingTarget, u32>,
    viewport: Option<Viewport>,
    calls: Vec<Call>,
}

fn category_kind(category: TargetCategory) -> ObjectKind {
    match category {
        TargetCategory::Buffer(_) => ObjectKind::Buffer,
        TargetCategory::Texture(_) => ObjectKind::Texture,
        TargetCategory::Framebuffer(_) => ObjectKind::Framebuffer,
        TargetCategory::Program => ObjectKind::Program,
        TargetCategory::VertexArray => ObjectKind::VertexArray,
    }
}

const ELEMENT_ARRAY: BindingTarget = BindingTarget::buffer(BufferTarget::ElementArray);

impl State {
    fn exists(&self, kind: ObjectKind, id: u32) -> bool {
        match kind {
            ObjectKind::Buffer => self.buffers.contains_key(&id),
            ObjectKind::Texture => self.textures.contains_key(&id),
            ObjectKind::Framebuffer => self.framebuffers.contains_key(&id),
            ObjectKind::Shader => self.shaders.contains_key(&id),
            ObjectKind::Program => self.programs.contains_key(&id),
            ObjectKind::VertexArray => self.vertex_arrays.contains_key(&id),
        }
    }

    fn allocate_id(&mut self, kind: ObjectKind) -> u32 {
        let next = self.next_id.entry(kind).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }

    fn buffer(&mut self, id: NonZeroU32) -> Result<&mut BufferObject, ApiError> {
        self.buffers.get_mut(&id.get()).ok_or(ApiError::InvalidOperation)
    }

    fn texture(&mut self, id: NonZeroU32) -> Result<&mut TextureObject, ApiError> {
        self.textures.get_mut(&id.get()).ok_or(ApiError::InvalidOperation)
    }

    fn framebuffer(&mut self, id: NonZeroU32) -> Result<&mut FramebufferObject, ApiError> {
        self.framebuffers
            .get_mut(&id.get())
            .ok_or(ApiError::InvalidOperation)
    }

    fn shader(&mut self, id: NonZeroU32) -> Result<&mut ShaderObject, ApiError> {
        self.shaders.get_mut(&id.get()).ok_or(ApiError::InvalidOperation)
    }

    fn program(&mut self, id: NonZeroU32) -> Result<&mut ProgramObject, ApiError> {
        self.programs.get_mut(&id.get()).ok_or(ApiError::InvalidOperation)
    }

    fn set_binding(&mut self, target: BindingTarget, object: Option<u32>) {
        match object {
            Some(id) => self.bindings.insert(target, id),
            None => self.bindings.remove(&target),
        };
    }

    fn framebuffer_status(&self, id: u32) -> FramebufferStatus {
        let fb = match self.framebuffers.get(&id) {
            Some(fb) => fb,
            None => return FramebufferStatus::Undefined,
        };
        if fb.attachments.is_empty() {
            return if fb.default_width > 0 && fb.default_height > 0 {
                FramebufferStatus::Complete
            } else {
                FramebufferStatus::MissingAttachment
            };
        }
        for attached in fb.attachments.values() {
            let level = self
                .textures
                .get(&attached.texture)
                .and_then(|t| t.levels.get(&attached.level));
            match level {
                Some(level) if level.extent.volume() != Some(0) => {}
                _ => return FramebufferStatus::IncompleteAttachment,
            }
        }
        if fb
            .draw_buffers
            .iter()
            .any(|point| !fb.attachments.contains_key(point))
        {
            return FramebufferStatus::IncompleteDrawBuffer;
        }
        FramebufferStatus::Complete
    }
}

/// Links the uniforms of the attached shaders into one list, with locations assigned in
/// declaration order.
fn link_uniforms(
    shaders: &HashMap<u32, ShaderObject>,
    attached: &[u32],
) -> Result<Vec<ActiveUniform>, String> {
    if attached.is_empty() {
        return Err("error: no shaders attached".to_string());
    }
    let mut declared: Vec<&glsl::DeclaredUniform> = Vec::new();
    for id in attached {
        let shader = match shaders.get(id) {
            Some(shader) if shader.compiled => shader,
            _ => return Err(format!("error: shader {} is not compiled", id)),
        };
        for u in shader.uniforms.iter() {
            match declared.iter().find(|d| d.name == u.name) {
                Some(d) if d.ty != u.ty || d.size != u.size => {
                    return Err(format!(
                        "error: uniform `{}` declared as both {} and {}",
                        u.name, d.ty, u.ty
                    ));
                }
                Some(_) => {}
                None => declared.push(u),
            }
        }
    }

    let mut location = 0;
    Ok(declared
        .into_iter()
        .map(|d| {
            let u = ActiveUniform {
                name: d.name.clone(),
                ty: d.ty,
                size: d.size,
                location,
            };
            location += d.size as i32;
            u
        })
        .collect())
}

/// Copies a box of texels between two tightly packed images.
fn copy_region(
    dst: &mut [u8],
    dst_extent: Extent3d,
    offset: Extent3d,
    src: &[u8],
    extent: Extent3d,
    texel: usize,
) {
    let row = extent.width as usize * texel;
    for z in 0..extent.depth as usize {
        for y in 0..extent.height as usize {
            let s = (z * extent.height as usize + y) * row;
            let dz = offset.depth as usize + z;
            let dy = offset.height as usize + y;
            let d = ((dz * dst_extent.height as usize + dy) * dst_extent.width as usize
                + offset.width as usize)
                * texel;
            dst[d..d + row].copy_from_slice(&src[s..s + row]);
        }
    }
}

/// Converts values uploaded to a bool uniform to 0/1 ints.
fn to_bool_values(values: UniformValues<'_>) -> Option<OwnedUniformValues> {
    let ints = match values {
        UniformValues::Float(v) => v.iter().map(|&x| (x != 0.0) as i32).collect(),
        UniformValues::Int(v) => v.iter().map(|&x| (x != 0) as i32).collect(),
        UniformValues::UInt(v) => v.iter().map(|&x| (x != 0) as i32).collect(),
        UniformValues::Double(_) => return None,
    };
    Some(OwnedUniformValues::Int(ints))
}

/// An API implementation that runs entirely in memory.
#[derive(Debug)]
pub struct HeadlessGl {
    limits: Limits,
    state: RefCell<State>,
    /// Failure to report, and how many fallible calls succeed before it.
    injected: Cell<Option<(usize, ApiError)>>,
}

impl HeadlessGl {
    pub const DEFAULT_LIMITS: Limits = Limits {
        max_texture_units: 16,
        max_uniform_buffer_bindings: 36,
        max_shader_storage_buffer_bindings: 8,
        max_transform_feedback_buffers: 4,
        max_atomic_counter_buffer_bindings: 8,
    };

    pub fn new() -> HeadlessGl {
        HeadlessGl::with_limits(HeadlessGl::DEFAULT_LIMITS)
    }

    pub fn with_limits(limits: Limits) -> HeadlessGl {
        HeadlessGl {
            limits,
            state: RefCell::new(State::default()),
            injected: Cell::new(None),
        }
    }

    /// Makes the next fallible call fail with `error`.
    pub fn fail_next(&self, error: ApiError) {
        self.fail_after(0, error);
    }

    /// Lets `skip` fallible calls through, then fails the one after with `error`.
    pub fn fail_after(&self, skip: usize, error: ApiError) {
        self.injected.set(Some((skip, error)));
    }

    fn injected(&self) -> Result<(), ApiError> {
        match self.injected.get() {
            Some((0, error)) => {
                self.injected.set(None);
                trace!(?error, "injected failure");
                Err(error)
            }
            Some((skip, error)) => {
                self.injected.set(Some((skip - 1, error)));
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Number of activation calls received.
    pub fn activation_count(&self) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Activate { .. }))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Delete { .. }))
            .count()
    }

    pub fn uniform_uploads(&self) -> Vec<RecordedUpload> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::UploadUniform(upload) => Some(upload.clone()),
                _ => None,
            })
            .collect()
    }

    /// The object actually current on `target`.
    pub fn bound(&self, target: BindingTarget) -> Option<u32> {
        self.state.borrow().bindings.get(&target).copied()
    }

    /// Number of live objects of a kind.
    pub fn live_objects(&self, kind: ObjectKind) -> usize {
        let state = self.state.borrow();
        match kind {
            ObjectKind::Buffer => state.buffers.len(),
            ObjectKind::Texture => state.textures.len(),
            ObjectKind::Framebuffer => state.framebuffers.len(),
            ObjectKind::Shader => state.shaders.len(),
            ObjectKind::Program => state.programs.len(),
            ObjectKind::VertexArray => state.vertex_arrays.len(),
        }
    }

    pub fn buffer_contents(&self, buffer: u32) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).map(|b| b.data.clone())
    }

    pub fn texture_contents(&self, texture: u32, level: u32) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .textures
            .get(&texture)
            .and_then(|t| t.levels.get(&level))
            .map(|l| l.data.clone())
    }

    pub fn last_viewport(&self) -> Option<Viewport> {
        self.state.borrow().viewport
    }

    /// The element buffer stored in a vertex array.
    pub fn element_buffer(&self, vertex_array: u32) -> Option<u32> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .and_then(|v| v.element_buffer)
    }
}

impl Default for HeadlessGl {
    fn default() -> Self {
        HeadlessGl::new()
    }
}

impl GlApi for HeadlessGl {
    fn limits(&self) -> Limits {
        self.limits
    }

    fn create(&self, kind: ObjectKind) -> Result<u32, ApiError> {
        self.injected()?;
        if kind == ObjectKind::Shader {
            return Err(ApiError::InvalidEnum);
        }
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id(kind);
        match kind {
            ObjectKind::Buffer => {
                state.buffers.insert(id, BufferObject::default());
            }
            ObjectKind::Texture => {
                state.textures.insert(id, TextureObject::default());
            }
            ObjectKind::Framebuffer => {
                state.framebuffers.insert(id, FramebufferObject::default());
            }
            ObjectKind::Program => {
                state.programs.insert(id, ProgramObject::default());
            }
            ObjectKind::VertexArray => {
                state.vertex_arrays.insert(id, VertexArrayObject::default());
            }
            ObjectKind::Shader => {}
        }
        state.calls.push(Call::Create { kind, id });
        Ok(id)
    }

    fn create_shader(&self, _stage: ShaderStage) -> Result<u32, ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id(ObjectKind::Shader);
        state.shaders.insert(
            id,
            ShaderObject {
                source: None,
                compiled: false,
                log: String::new(),
                uniforms: Vec::new(),
            },
        );
        state.calls.push(Call::Create {
            kind: ObjectKind::Shader,
            id,
        });
        Ok(id)
    }

    fn delete(&self, kind: ObjectKind, id: u32) {
        let mut state = self.state.borrow_mut();
        let existed = match kind {
            ObjectKind::Buffer => state.buffers.remove(&id).is_some(),
            ObjectKind::Texture => state.textures.remove(&id).is_some(),
            ObjectKind::Framebuffer => state.framebuffers.remove(&id).is_some(),
            ObjectKind::Shader => state.shaders.remove(&id).is_some(),
            ObjectKind::Program => state.programs.remove(&id).is_some(),
            ObjectKind::VertexArray => state.vertex_arrays.remove(&id).is_some(),
        };
        if existed {
            let current_vao = kind == ObjectKind::VertexArray
                && state.bindings.get(&BindingTarget::VERTEX_ARRAY) == Some(&id);
            // deleted objects are unbound from every binding point
            state
                .bindings
                .retain(|target, bound| !(*bound == id && category_kind(target.category()) == kind));
            if current_vao {
                // back to the default vertex array, which has no element buffer here
                state.bindings.remove(&ELEMENT_ARRAY);
            }
        }
        state.calls.push(Call::Delete { kind, id });
    }

    fn activate(&self, target: BindingTarget, object: Option<NonZeroU32>) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let object = object.map(NonZeroU32::get);

        match (target.category(), target.slot()) {
            (TargetCategory::Texture(_), Some(unit)) if unit >= self.limits.max_texture_units => {
                return Err(ApiError::InvalidEnum)
            }
            (TargetCategory::Buffer(t), Some(index)) => {
                if !t.is_indexable() {
                    return Err(ApiError::InvalidEnum);
                }
                if index >= self.limits.indexed_bindings(t) {
                    return Err(ApiError::InvalidValue);
                }
            }
            _ => {}
        }

        if let Some(id) = object {
            let kind = category_kind(target.category());
            if !state.exists(kind, id) {
                return Err(ApiError::InvalidOperation);
            }
            match target.category() {
                TargetCategory::Texture(t) => {
                    let texture = state.textures.entry(id).or_default();
                    match texture.target {
                        Some(existing) if existing != t => return Err(ApiError::InvalidOperation),
                        _ => texture.target = Some(t),
                    }
                }
                TargetCategory::Program => {
                    if !state.programs.get(&id).map_or(false, |p| p.linked) {
                        return Err(ApiError::InvalidOperation);
                    }
                }
                _ => {}
            }
        }

        match (target.category(), target.slot()) {
            (TargetCategory::Framebuffer(FramebufferTarget::Both), _) => {
                state.set_binding(BindingTarget::framebuffer(FramebufferTarget::Draw), object);
                state.set_binding(BindingTarget::framebuffer(FramebufferTarget::Read), object);
            }
            (TargetCategory::Buffer(t), Some(_)) => {
                state.set_binding(target, object);
                state.set_binding(BindingTarget::buffer(t), object);
            }
            (TargetCategory::Buffer(BufferTarget::ElementArray), None) => {
                state.set_binding(target, object);
                if let Some(vao) = state.bindings.get(&BindingTarget::VERTEX_ARRAY).copied() {
                    if let Some(vao) = state.vertex_arrays.get_mut(&vao) {
                        vao.element_buffer = object;
                    }
                }
            }
            (TargetCategory::VertexArray, _) => {
                state.set_binding(target, object);
                let element_buffer = object
                    .and_then(|id| state.vertex_arrays.get(&id))
                    .and_then(|vao| vao.element_buffer);
                state.set_binding(ELEMENT_ARRAY, element_buffer);
            }
            _ => state.set_binding(target, object),
        }
        state.calls.push(Call::Activate { target, object });
        Ok(())
    }

    fn buffer_data(
        &self,
        buffer: NonZeroU32,
        size: usize,
        data: Option<&[u8]>,
        usage: BufferUsage,
    ) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let obj = state.buffer(buffer)?;
        if obj.mapping.is_some() {
            return Err(ApiError::InvalidOperation);
        }
        obj.data = match data {
            Some(data) if data.len() != size => return Err(ApiError::InvalidValue),
            Some(data) => data.to_vec(),
            None => vec![0; size],
        };
        state.calls.push(Call::BufferData {
            buffer: buffer.get(),
            size,
            usage,
        });
        Ok(())
    }

    fn buffer_sub_data(&self, buffer: NonZeroU32, offset: usize, data: &[u8]) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let obj = state.buffer(buffer)?;
        if obj.mapping.is_some() {
            return Err(ApiError::InvalidOperation);
        }
        let end = offset.checked_add(data.len()).ok_or(ApiError::InvalidValue)?;
        if end > obj.data.len() {
            return Err(ApiError::InvalidValue);
        }
        obj.data[offset..end].copy_from_slice(data);
        state.calls.push(Call::BufferSubData {
            buffer: buffer.get(),
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn map_buffer_range(
        &self,
        buffer: NonZeroU32,
        offset: usize,
        len: usize,
        access: MapAccess,
    ) -> Result<NonNull<u8>, ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let obj = state.buffer(buffer)?;
        if obj.mapping.is_some() || !access.is_valid() {
            return Err(ApiError::InvalidOperation);
        }
        let end = offset.checked_add(len).ok_or(ApiError::InvalidValue)?;
        if len == 0 || end > obj.data.len() {
            return Err(ApiError::InvalidValue);
        }
        let ptr = NonNull::new(obj.data[offset..end].as_mut_ptr()).ok_or(ApiError::OutOfMemory)?;
        obj.mapping = Some(Mapping {
            offset,
            len,
            access,
        });
        state.calls.push(Call::MapBuffer {
            buffer: buffer.get(),
            offset,
            len,
            access,
        });
        Ok(ptr)
    }

    fn flush_mapped_buffer_range(
        &self,
        buffer: NonZeroU32,
        offset: usize,
        len: usize,
    ) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let mapping = state.buffer(buffer)?.mapping.ok_or(ApiError::InvalidOperation)?;
        if !mapping.access.contains(MapAccess::FLUSH_EXPLICIT) {
            return Err(ApiError::InvalidOperation);
        }
        if offset.checked_add(len).map_or(true, |end| end > mapping.len) {
            return Err(ApiError::InvalidValue);
        }
        trace!(buffer = buffer.get(), offset = mapping.offset + offset, len, "flush");
        state.calls.push(Call::FlushMappedBufferRange {
            buffer: buffer.get(),
            offset,
            len,
        });
        Ok(())
    }

    fn unmap_buffer(&self, buffer: NonZeroU32) -> Result<bool, ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let obj = state.buffer(buffer)?;
        if obj.mapping.take().is_none() {
            return Err(ApiError::InvalidOperation);
        }
        state.calls.push(Call::UnmapBuffer {
            buffer: buffer.get(),
        });
        Ok(true)
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
        self.injected()?;
        let mut state = self.state.borrow_mut();
        // image specification applies to the texture current on unit 0
        if state.bindings.get(&BindingTarget::texture(target, 0)) != Some(&texture.get()) {
            return Err(ApiError::InvalidOperation);
        }
        let size = extent.byte_len(format).ok_or(ApiError::OutOfMemory)?;
        let data = match data {
            Some(data) if data.len() != size => return Err(ApiError::InvalidValue),
            Some(data) => data.to_vec(),
            None => vec![0; size],
        };
        let obj = state.texture(texture)?;
        obj.target = Some(target);
        obj.levels.insert(level, TextureLevel { format, extent, data });
        state.calls.push(Call::TextureImage {
            texture: texture.get(),
            level,
            format,
            extent,
        });
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
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let obj = state.texture(texture)?;
        let image = obj.levels.get_mut(&level).ok_or(ApiError::InvalidOperation)?;
        let fits = image.extent.contains_region(offset, extent);
        let texel = image.format.texel_size();
        if !fits || format.texel_size() != texel || extent.byte_len(format) != Some(data.len()) {
            return Err(ApiError::InvalidValue);
        }
        copy_region(&mut image.data, image.extent, offset, data, extent, texel);
        state.calls.push(Call::TextureSubImage {
            texture: texture.get(),
            level,
            offset,
            extent,
        });
        Ok(())
    }

    fn texture_level_parameter(
        &self,
        texture: NonZeroU32,
        level: u32,
        param: TextureLevelParam,
    ) -> Result<u32, ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let extent = state
            .texture(texture)?
            .levels
            .get(&level)
            .map(|l| l.extent)
            .unwrap_or_default();
        state.calls.push(Call::TextureLevelParameter {
            texture: texture.get(),
            level,
            param,
        });
        Ok(match param {
            TextureLevelParam::Width => extent.width,
            TextureLevelParam::Height => extent.height,
            TextureLevelParam::Depth => extent.depth,
        })
    }

    fn framebuffer_texture(
        &self,
        framebuffer: NonZeroU32,
        attachment: Attachment,
        texture: Option<NonZeroU32>,
        level: u32,
        layer: Option<u32>,
    ) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        if let Attachment::Color(index) = attachment {
            if index >= MAX_COLOR_ATTACHMENTS {
                return Err(ApiError::InvalidOperation);
            }
        }
        if let Some(texture) = texture {
            if !state.textures.contains_key(&texture.get()) {
                return Err(ApiError::InvalidOperation);
            }
        }
        let fb = state.framebuffer(framebuffer)?;
        match texture {
            Some(texture) => {
                fb.attachments.insert(
                    attachment,
                    AttachedTexture {
                        texture: texture.get(),
                        level,
                    },
                );
            }
            None => {
                fb.attachments.remove(&attachment);
            }
        }
        state.calls.push(Call::FramebufferTexture {
            framebuffer: framebuffer.get(),
            attachment,
            texture: texture.map(NonZeroU32::get),
            level,
            layer,
        });
        Ok(())
    }

    fn framebuffer_draw_buffers(
        &self,
        framebuffer: NonZeroU32,
        attachments: &[Attachment],
    ) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let valid = attachments
            .iter()
            .all(|a| matches!(a, Attachment::Color(i) if *i < MAX_COLOR_ATTACHMENTS));
        if !valid {
            return Err(ApiError::InvalidEnum);
        }
        state.framebuffer(framebuffer)?.draw_buffers = attachments.to_vec();
        state.calls.push(Call::FramebufferDrawBuffers {
            framebuffer: framebuffer.get(),
            attachments: attachments.to_vec(),
        });
        Ok(())
    }

    fn framebuffer_default_size(
        &self,
        framebuffer: NonZeroU32,
        width: u32,
        height: u32,
        samples: u32,
    ) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let fb = state.framebuffer(framebuffer)?;
        fb.default_width = width;
        fb.default_height = height;
        state.calls.push(Call::FramebufferDefaultSize {
            framebuffer: framebuffer.get(),
            width,
            height,
            samples,
        });
        Ok(())
    }

    fn framebuffer_status(
        &self,
        framebuffer: NonZeroU32,
        _target: FramebufferTarget,
    ) -> Result<FramebufferStatus, ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let status = state.framebuffer_status(framebuffer.get());
        state.calls.push(Call::CheckFramebufferStatus {
            framebuffer: framebuffer.get(),
        });
        Ok(status)
    }

    fn viewport(&self, viewport: Viewport) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        state.viewport = Some(viewport);
        state.calls.push(Call::Viewport(viewport));
        Ok(())
    }

    fn shader_source(&self, shader: NonZeroU32, source: &str) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let obj = state.shader(shader)?;
        obj.source = Some(source.to_string());
        state.calls.push(Call::ShaderSource {
            shader: shader.get(),
        });
        Ok(())
    }

    fn compile_shader(&self, shader: NonZeroU32) -> Result<bool, ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let obj = state.shader(shader)?;
        let result = match obj.source.as_deref() {
            Some(source) => glsl::scan(source),
            None => Err("error: no source".to_string()),
        };
        match result {
            Ok(uniforms) => {
                obj.compiled = true;
                obj.log.clear();
                obj.uniforms = uniforms;
            }
            Err(log) => {
                obj.compiled = false;
                obj.log = log;
                obj.uniforms.clear();
            }
        }
        let compiled = obj.compiled;
        state.calls.push(Call::CompileShader {
            shader: shader.get(),
        });
        Ok(compiled)
    }

    fn shader_info_log(&self, shader: NonZeroU32) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader.get())
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn attach_shader(&self, program: NonZeroU32, shader: NonZeroU32) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        if !state.shaders.contains_key(&shader.get()) {
            return Err(ApiError::InvalidOperation);
        }
        let obj = state.program(program)?;
        if obj.attached.contains(&shader.get()) {
            return Err(ApiError::InvalidOperation);
        }
        obj.attached.push(shader.get());
        state.calls.push(Call::AttachShader {
            program: program.get(),
            shader: shader.get(),
        });
        Ok(())
    }

    fn detach_shader(&self, program: NonZeroU32, shader: NonZeroU32) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let obj = state.program(program)?;
        if !obj.attached.contains(&shader.get()) {
            return Err(ApiError::InvalidOperation);
        }
        obj.attached.retain(|s| *s != shader.get());
        state.calls.push(Call::DetachShader {
            program: program.get(),
            shader: shader.get(),
        });
        Ok(())
    }

    fn link_program(&self, program: NonZeroU32) -> Result<bool, ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let attached = state.program(program)?.attached.clone();
        let result = link_uniforms(&state.shaders, &attached);
        let obj = state.program(program)?;
        obj.values.clear();
        let linked = match result {
            Ok(uniforms) => {
                for u in uniforms.iter() {
                    for element in 0..u.size as i32 {
                        obj.values.insert(
                            u.location + element,
                            OwnedUniformValues::zeroed(u.ty.upload_kind(), u.ty.components()),
                        );
                    }
                }
                obj.uniforms = uniforms;
                obj.log.clear();
                true
            }
            Err(log) => {
                obj.uniforms.clear();
                obj.log = log;
                false
            }
        };
        obj.linked = linked;
        state.calls.push(Call::LinkProgram {
            program: program.get(),
        });
        Ok(linked)
    }

    fn program_info_log(&self, program: NonZeroU32) -> String {
        self.state
            .borrow()
            .programs
            .get(&program.get())
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn active_uniforms(&self, program: NonZeroU32) -> Result<Vec<ActiveUniform>, ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        Ok(state.program(program)?.uniforms.clone())
    }

    fn upload_uniform(&self, upload: &UniformUpload<'_>) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let current = *state
            .bindings
            .get(&BindingTarget::PROGRAM)
            .ok_or(ApiError::InvalidOperation)?;
        if upload.location == -1 {
            return Ok(());
        }
        let program = state
            .programs
            .get_mut(&current)
            .filter(|p| p.linked)
            .ok_or(ApiError::InvalidOperation)?;
        let uniform: &ActiveUniform = program
            .uniforms
            .iter()
            .find(|u| u.location <= upload.location && upload.location < u.location + u.size as i32)
            .ok_or(ApiError::InvalidOperation)?;
        let ty: UniformType = uniform.ty;
        let end = uniform.location + uniform.size as i32;

        if upload.rows != ty.rows() || upload.columns != ty.columns() {
            return Err(ApiError::InvalidOperation);
        }
        if upload.count > 1 && uniform.size == 1 {
            return Err(ApiError::InvalidOperation);
        }
        let components = ty.components();
        if upload.values.len() != upload.count * components {
            return Err(ApiError::InvalidValue);
        }
        let values = if ty.class() == UniformClass::Bool {
            to_bool_values(upload.values).ok_or(ApiError::InvalidOperation)?
        } else if upload.values.kind() == ty.upload_kind() {
            upload.values.to_owned_values()
        } else {
            return Err(ApiError::InvalidOperation);
        };

        // elements past the end of the array are ignored
        for i in 0..upload.count {
            let location = upload.location + i as i32;
            if location >= end {
                break;
            }
            program
                .values
                .insert(location, values.slice(i * components, components));
        }

        state.calls.push(Call::UploadUniform(RecordedUpload {
            program: current,
            location: upload.location,
            rows: upload.rows,
            columns: upload.columns,
            count: upload.count,
            values: upload.values.to_owned_values(),
        }));
        Ok(())
    }

    fn read_uniform(
        &self,
        program: NonZeroU32,
        location: i32,
        _ty: UniformType,
    ) -> Result<OwnedUniformValues, ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let obj = state.program(program)?;
        if !obj.linked {
            return Err(ApiError::InvalidOperation);
        }
        obj.values
            .get(&location)
            .cloned()
            .ok_or(ApiError::InvalidOperation)
    }

    fn vertex_array_element_buffer(
        &self,
        vertex_array: NonZeroU32,
        buffer: Option<NonZeroU32>,
    ) -> Result<(), ApiError> {
        self.injected()?;
        let mut state = self.state.borrow_mut();
        let buffer = buffer.map(NonZeroU32::get);
        if let Some(buffer) = buffer {
            if !state.buffers.contains_key(&buffer) {
                return Err(ApiError::InvalidOperation);
            }
        }
        let vao = state
            .vertex_arrays
            .get_mut(&vertex_array.get())
            .ok_or(ApiError::InvalidOperation)?;
        vao.element_buffer = buffer;
        if state.bindings.get(&BindingTarget::VERTEX_ARRAY) == Some(&vertex_array.get()) {
            state.set_binding(ELEMENT_ARRAY, buffer);
        }
        state.calls.push(Call::VertexArrayElementBuffer {
            vertex_array: vertex_array.get(),
            buffer,
        });
        Ok(())
    }
}
