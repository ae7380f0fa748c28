use crate::{
    api::ApiError,
    binding::{BindingTarget, BufferTarget, TextureTarget},
    buffer::MapAccess,
    framebuffer::FramebufferStatus,
    handle::{Handle, ObjectKind},
    shader::ShaderStage,
    uniform::{ScalarType, UniformType},
};

/// Programmer mistakes detected before anything reaches the API.
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum UsageError {
    #[error("{0} was already disposed")]
    Disposed(Handle),
    #[error("{kind:?} objects cannot be bound to {target}")]
    UnsupportedTarget { kind: ObjectKind, target: BindingTarget },
    #[error("buffer target {0:?} has no indexed binding points")]
    NotIndexable(BufferTarget),
    #[error("binding index {index} out of range for {target} (limit {limit})")]
    SlotOutOfRange {
        target: BindingTarget,
        index: u32,
        limit: u32,
    },
    #[error("texture was created for {expected:?}, cannot be used as {actual:?}")]
    TextureTargetMismatch {
        expected: TextureTarget,
        actual: TextureTarget,
    },
    #[error("range of {len} bytes at offset {offset} is out of bounds (size {size})")]
    OutOfBounds { offset: usize, len: usize, size: usize },
    #[error("{0} is already mapped")]
    AlreadyMapped(Handle),
    #[error("{0} is not mapped")]
    NotMapped(Handle),
    #[error("mapped view does not belong to the current mapping of {0}")]
    StaleMapping(Handle),
    #[error("invalid map access flags {0:?}")]
    InvalidMapAccess(MapAccess),
    #[error("mapping of {handle} lacks the {required:?} access flag")]
    MissingMapAccess { handle: Handle, required: MapAccess },
    #[error("{0} has no storage allocated")]
    NotAllocated(Handle),
    #[error("cannot set uniform of type {declared} at location {location} from {supplied:?} values")]
    IncompatibleUniformType {
        location: i32,
        declared: UniformType,
        supplied: ScalarType,
    },
    #[error("uniform at location {location} of type {declared} (array size {array_size}) cannot take {supplied} values")]
    UniformCountMismatch {
        location: i32,
        declared: UniformType,
        array_size: u32,
        supplied: usize,
    },
    #[error("no active uniform named `{0}`")]
    UnknownUniform(String),
    #[error("no active uniform at location {0}")]
    UnknownUniformLocation(i32),
    #[error("struct data too short: {expected} bytes required, {actual} supplied")]
    StructDataTooShort { expected: usize, actual: usize },
    #[error("{0} is not linked")]
    NotLinked(Handle),
    #[error("{0} has no source")]
    NoShaderSource(Handle),
}

/// Errors emitted by this crate.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("framebuffer incomplete: {0:?}")]
    FramebufferIncomplete(FramebufferStatus),
    #[error("failed to compile {stage:?} shader {shader}:\n{log}")]
    ShaderCompilation {
        shader: Handle,
        stage: ShaderStage,
        log: String,
    },
    #[error("failed to link program {program}:\n{log}")]
    ProgramLink { program: Handle, log: String },
}

impl Error {
    /// The usage error behind this error, if any.
    pub fn usage(&self) -> Option<&UsageError> {
        match self {
            Error::Usage(err) => Some(err),
            _ => None,
        }
    }
}

pub type GlResult<T> = Result<T, Error>;
