//! Uniform types, values and the dispatch engine.
mod dispatch;
mod struct_layout;
mod types;
mod value;

pub use self::{
    dispatch::{resolve, Coercion, UniformTable, UniformVariable, UploadPath},
    struct_layout::{SourceType, StructLayout, StructMember},
    types::{ScalarType, UniformClass, UniformType, UploadKind},
    value::{AsUniform, OwnedUniformValues, UniformData, UniformUpload, UniformValues},
};

pub(crate) use self::dispatch::upload_uniform;
