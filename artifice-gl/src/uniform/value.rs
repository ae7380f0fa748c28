use crate::uniform::{ScalarType, UploadKind};
use std::slice;

/// Host values to assign to a uniform, before any conversion.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformData<'a> {
    Float(&'a [f32]),
    Double(&'a [f64]),
    Int(&'a [i32]),
    UInt(&'a [u32]),
    Bool(&'a [bool]),
}

impl<'a> UniformData<'a> {
    pub fn kind(&self) -> ScalarType {
        match self {
            UniformData::Float(_) => ScalarType::Float,
            UniformData::Double(_) => ScalarType::Double,
            UniformData::Int(_) => ScalarType::Int,
            UniformData::UInt(_) => ScalarType::UInt,
            UniformData::Bool(_) => ScalarType::Bool,
        }
    }

    /// Number of scalar components.
    pub fn len(&self) -> usize {
        match self {
            UniformData::Float(v) => v.len(),
            UniformData::Double(v) => v.len(),
            UniformData::Int(v) => v.len(),
            UniformData::UInt(v) => v.len(),
            UniformData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Types that can be assigned to uniforms.
///
/// Implemented for the scalar types, arrays of them (vectors and arrays of scalars) and arrays of
/// arrays (matrices in column-major order, arrays of vectors).
pub trait AsUniform {
    fn as_uniform(&self) -> UniformData<'_>;
}

macro_rules! impl_as_uniform {
    ($t:ty, $variant:ident) => {
        impl AsUniform for $t {
            fn as_uniform(&self) -> UniformData<'_> {
                UniformData::$variant(slice::from_ref(self))
            }
        }

        impl AsUniform for [$t] {
            fn as_uniform(&self) -> UniformData<'_> {
                UniformData::$variant(self)
            }
        }

        impl AsUniform for Vec<$t> {
            fn as_uniform(&self) -> UniformData<'_> {
                UniformData::$variant(self)
            }
        }

        impl<const N: usize> AsUniform for [$t; N] {
            fn as_uniform(&self) -> UniformData<'_> {
                UniformData::$variant(&self[..])
            }
        }
    };
}

macro_rules! impl_as_uniform_nested {
    ($t:ty, $variant:ident) => {
        impl<const R: usize, const C: usize> AsUniform for [[$t; R]; C] {
            fn as_uniform(&self) -> UniformData<'_> {
                UniformData::$variant(bytemuck::cast_slice(&self[..]))
            }
        }

        impl<const R: usize> AsUniform for [[$t; R]] {
            fn as_uniform(&self) -> UniformData<'_> {
                UniformData::$variant(bytemuck::cast_slice(self))
            }
        }
    };
}

impl_as_uniform!(f32, Float);
impl_as_uniform!(f64, Double);
impl_as_uniform!(i32, Int);
impl_as_uniform!(u32, UInt);
impl_as_uniform!(bool, Bool);

impl_as_uniform_nested!(f32, Float);
impl_as_uniform_nested!(f64, Double);
impl_as_uniform_nested!(i32, Int);
impl_as_uniform_nested!(u32, UInt);

impl<'a> AsUniform for UniformData<'a> {
    fn as_uniform(&self) -> UniformData<'_> {
        *self
    }
}

/// Uniform values in their upload representation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValues<'a> {
    Float(&'a [f32]),
    Double(&'a [f64]),
    Int(&'a [i32]),
    UInt(&'a [u32]),
}

impl<'a> UniformValues<'a> {
    pub fn kind(&self) -> UploadKind {
        match self {
            UniformValues::Float(_) => UploadKind::Float,
            UniformValues::Double(_) => UploadKind::Double,
            UniformValues::Int(_) => UploadKind::Int,
            UniformValues::UInt(_) => UploadKind::UInt,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            UniformValues::Float(v) => v.len(),
            UniformValues::Double(v) => v.len(),
            UniformValues::Int(v) => v.len(),
            UniformValues::UInt(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_owned_values(&self) -> OwnedUniformValues {
        match *self {
            UniformValues::Float(v) => OwnedUniformValues::Float(v.to_vec()),
            UniformValues::Double(v) => OwnedUniformValues::Double(v.to_vec()),
            UniformValues::Int(v) => OwnedUniformValues::Int(v.to_vec()),
            UniformValues::UInt(v) => OwnedUniformValues::UInt(v.to_vec()),
        }
    }
}

/// Owned uniform values, as read back from a program.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum OwnedUniformValues {
    Float(Vec<f32>),
    Double(Vec<f64>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
}

impl OwnedUniformValues {
    /// `len` zeroes of the given kind.
    pub fn zeroed(kind: UploadKind, len: usize) -> OwnedUniformValues {
        match kind {
            UploadKind::Float => OwnedUniformValues::Float(vec![0.0; len]),
            UploadKind::Double => OwnedUniformValues::Double(vec![0.0; len]),
            UploadKind::Int => OwnedUniformValues::Int(vec![0; len]),
            UploadKind::UInt => OwnedUniformValues::UInt(vec![0; len]),
        }
    }

    pub fn as_values(&self) -> UniformValues<'_> {
        match self {
            OwnedUniformValues::Float(v) => UniformValues::Float(v),
            OwnedUniformValues::Double(v) => UniformValues::Double(v),
            OwnedUniformValues::Int(v) => UniformValues::Int(v),
            OwnedUniformValues::UInt(v) => UniformValues::UInt(v),
        }
    }

    pub fn kind(&self) -> UploadKind {
        self.as_values().kind()
    }

    pub fn len(&self) -> usize {
        self.as_values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a sub-range of the values.
    pub fn slice(&self, start: usize, len: usize) -> OwnedUniformValues {
        match self {
            OwnedUniformValues::Float(v) => OwnedUniformValues::Float(v[start..start + len].to_vec()),
            OwnedUniformValues::Double(v) => {
                OwnedUniformValues::Double(v[start..start + len].to_vec())
            }
            OwnedUniformValues::Int(v) => OwnedUniformValues::Int(v[start..start + len].to_vec()),
            OwnedUniformValues::UInt(v) => OwnedUniformValues::UInt(v[start..start + len].to_vec()),
        }
    }
}

/// A uniform upload, as handed to the API.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UniformUpload<'a> {
    pub location: i32,
    /// Rows of one element (vector length or matrix rows).
    pub rows: u8,
    /// Columns of one element (1 unless matrix).
    pub columns: u8,
    /// Number of array elements.
    pub count: usize,
    pub values: UniformValues<'a>,
}
