use crate::binding::TextureTarget;
use std::fmt;

/// Scalar component types of uniform variables and of host values.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarType {
    /// 32-bit floating-point value
    Float,
    /// 64-bit floating-point value
    Double,
    /// 32-bit signed integer
    Int,
    /// 32-bit unsigned integer
    UInt,
    /// Boolean, stored as a 32-bit integer on the host side.
    Bool,
}

impl ScalarType {
    pub(crate) const ALL: [ScalarType; 5] = [
        ScalarType::Float,
        ScalarType::Double,
        ScalarType::Int,
        ScalarType::UInt,
        ScalarType::Bool,
    ];

    /// Size in bytes of one component in host memory.
    pub const fn byte_size(self) -> usize {
        match self {
            ScalarType::Double => 8,
            _ => 4,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            ScalarType::Float => 0,
            ScalarType::Double => 1,
            ScalarType::Int => 2,
            ScalarType::UInt => 3,
            ScalarType::Bool => 4,
        }
    }

    fn glsl_name(self) -> &'static str {
        match self {
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Bool => "bool",
        }
    }

    fn glsl_prefix(self) -> &'static str {
        match self {
            ScalarType::Float => "",
            ScalarType::Double => "d",
            ScalarType::Int => "i",
            ScalarType::UInt => "u",
            ScalarType::Bool => "b",
        }
    }
}

/// The representation a uniform is uploaded in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum UploadKind {
    Float,
    Double,
    Int,
    UInt,
}

/// Broad class of a declared uniform type, used to pick an upload path.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum UniformClass {
    Float,
    Double,
    Int,
    UInt,
    Bool,
    /// Samplers and images, set through texture/image unit indices.
    Opaque,
}

impl UniformClass {
    pub(crate) const fn index(self) -> usize {
        match self {
            UniformClass::Float => 0,
            UniformClass::Double => 1,
            UniformClass::Int => 2,
            UniformClass::UInt => 3,
            UniformClass::Bool => 4,
            UniformClass::Opaque => 5,
        }
    }
}

/// Type of a uniform variable as declared in a shader.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum UniformType {
    Scalar(ScalarType),
    /// Vector type (element type, 2 to 4 components).
    Vector { elem: ScalarType, len: u8 },
    /// Matrix type (only float and double elements).
    Matrix {
        elem: ScalarType,
        columns: u8,
        rows: u8,
    },
    Sampler {
        dim: TextureTarget,
        sampled: ScalarType,
        shadow: bool,
    },
    Image { dim: TextureTarget, sampled: ScalarType },
}

const fn vector(elem: ScalarType, len: u8) -> UniformType {
    UniformType::Vector { elem, len }
}

const fn matrix(elem: ScalarType, columns: u8, rows: u8) -> UniformType {
    UniformType::Matrix {
        elem,
        columns,
        rows,
    }
}

impl UniformType {
    pub const FLOAT: UniformType = UniformType::Scalar(ScalarType::Float);
    pub const VEC2: UniformType = vector(ScalarType::Float, 2);
    pub const VEC3: UniformType = vector(ScalarType::Float, 3);
    pub const VEC4: UniformType = vector(ScalarType::Float, 4);
    pub const DOUBLE: UniformType = UniformType::Scalar(ScalarType::Double);
    pub const DVEC2: UniformType = vector(ScalarType::Double, 2);
    pub const DVEC3: UniformType = vector(ScalarType::Double, 3);
    pub const DVEC4: UniformType = vector(ScalarType::Double, 4);
    pub const INT: UniformType = UniformType::Scalar(ScalarType::Int);
    pub const IVEC2: UniformType = vector(ScalarType::Int, 2);
    pub const IVEC3: UniformType = vector(ScalarType::Int, 3);
    pub const IVEC4: UniformType = vector(ScalarType::Int, 4);
    pub const UINT: UniformType = UniformType::Scalar(ScalarType::UInt);
    pub const UVEC2: UniformType = vector(ScalarType::UInt, 2);
    pub const UVEC3: UniformType = vector(ScalarType::UInt, 3);
    pub const UVEC4: UniformType = vector(ScalarType::UInt, 4);
    pub const BOOL: UniformType = UniformType::Scalar(ScalarType::Bool);
    pub const BVEC2: UniformType = vector(ScalarType::Bool, 2);
    pub const BVEC3: UniformType = vector(ScalarType::Bool, 3);
    pub const BVEC4: UniformType = vector(ScalarType::Bool, 4);
    pub const MAT2: UniformType = matrix(ScalarType::Float, 2, 2);
    pub const MAT3: UniformType = matrix(ScalarType::Float, 3, 3);
    pub const MAT4: UniformType = matrix(ScalarType::Float, 4, 4);
    pub const DMAT4: UniformType = matrix(ScalarType::Double, 4, 4);
    pub const SAMPLER_2D: UniformType = UniformType::Sampler {
        dim: TextureTarget::Tex2D,
        sampled: ScalarType::Float,
        shadow: false,
    };

    /// Number of rows (components of a vector, rows of a matrix).
    pub fn rows(&self) -> u8 {
        match *self {
            UniformType::Vector { len, .. } => len,
            UniformType::Matrix { rows, .. } => rows,
            _ => 1,
        }
    }

    pub fn columns(&self) -> u8 {
        match *self {
            UniformType::Matrix { columns, .. } => columns,
            _ => 1,
        }
    }

    /// Number of scalar components in one element.
    pub fn components(&self) -> usize {
        self.rows() as usize * self.columns() as usize
    }

    pub fn class(&self) -> UniformClass {
        match *self {
            UniformType::Scalar(elem)
            | UniformType::Vector { elem, .. }
            | UniformType::Matrix { elem, .. } => match elem {
                ScalarType::Float => UniformClass::Float,
                ScalarType::Double => UniformClass::Double,
                ScalarType::Int => UniformClass::Int,
                ScalarType::UInt => UniformClass::UInt,
                ScalarType::Bool => UniformClass::Bool,
            },
            UniformType::Sampler { .. } | UniformType::Image { .. } => UniformClass::Opaque,
        }
    }

    /// The representation values of this type are uploaded in.
    pub fn upload_kind(&self) -> UploadKind {
        match self.class() {
            UniformClass::Float => UploadKind::Float,
            UniformClass::Double => UploadKind::Double,
            UniformClass::UInt => UploadKind::UInt,
            UniformClass::Int | UniformClass::Bool | UniformClass::Opaque => UploadKind::Int,
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.class() == UniformClass::Opaque
    }

    /// Parses a GLSL type name (`vec3`, `dmat4`, `usampler2DArray`, ...).
    pub fn from_glsl(name: &str) -> Option<UniformType> {
        for &elem in ScalarType::ALL.iter() {
            if name == elem.glsl_name() {
                return Some(UniformType::Scalar(elem));
            }
            let vec_prefix = format!("{}vec", elem.glsl_prefix());
            if let Some(len) = name.strip_prefix(vec_prefix.as_str()) {
                return parse_len(len).map(|len| vector(elem, len));
            }
        }

        for &(prefix, elem) in [("mat", ScalarType::Float), ("dmat", ScalarType::Double)].iter() {
            if let Some(rest) = name.strip_prefix(prefix) {
                let (columns, rows) = match rest.split_once('x') {
                    Some((c, r)) => (parse_len(c)?, parse_len(r)?),
                    None => {
                        let n = parse_len(rest)?;
                        (n, n)
                    }
                };
                return Some(matrix(elem, columns, rows));
            }
        }

        for &(prefix, sampled) in [
            ("", ScalarType::Float),
            ("i", ScalarType::Int),
            ("u", ScalarType::UInt),
        ]
        .iter()
        {
            if let Some(rest) = name.strip_prefix(prefix) {
                if let Some(rest) = rest.strip_prefix("sampler") {
                    let (rest, shadow) = match rest.strip_suffix("Shadow") {
                        Some(rest) => (rest, true),
                        None => (rest, false),
                    };
                    if shadow && sampled != ScalarType::Float {
                        return None;
                    }
                    return parse_dim(rest).map(|dim| UniformType::Sampler {
                        dim,
                        sampled,
                        shadow,
                    });
                }
                if let Some(rest) = rest.strip_prefix("image") {
                    return parse_dim(rest).map(|dim| UniformType::Image { dim, sampled });
                }
            }
        }
        None
    }
}

fn parse_len(s: &str) -> Option<u8> {
    match s {
        "2" => Some(2),
        "3" => Some(3),
        "4" => Some(4),
        _ => None,
    }
}

const DIM_SUFFIXES: [(&str, TextureTarget); 11] = [
    ("1D", TextureTarget::Tex1D),
    ("2D", TextureTarget::Tex2D),
    ("3D", TextureTarget::Tex3D),
    ("Cube", TextureTarget::CubeMap),
    ("2DRect", TextureTarget::Rectangle),
    ("1DArray", TextureTarget::Tex1DArray),
    ("2DArray", TextureTarget::Tex2DArray),
    ("CubeArray", TextureTarget::CubeMapArray),
    ("Buffer", TextureTarget::Buffer),
    ("2DMS", TextureTarget::Tex2DMultisample),
    ("2DMSArray", TextureTarget::Tex2DMultisampleArray),
];

fn parse_dim(s: &str) -> Option<TextureTarget> {
    DIM_SUFFIXES
        .iter()
        .find(|(suffix, _)| *suffix == s)
        .map(|&(_, dim)| dim)
}

fn dim_suffix(dim: TextureTarget) -> &'static str {
    DIM_SUFFIXES
        .iter()
        .find(|(_, d)| *d == dim)
        .map(|&(suffix, _)| suffix)
        .unwrap_or("")
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            UniformType::Scalar(elem) => f.write_str(elem.glsl_name()),
            UniformType::Vector { elem, len } => write!(f, "{}vec{}", elem.glsl_prefix(), len),
            UniformType::Matrix {
                elem,
                columns,
                rows,
            } => {
                if columns == rows {
                    write!(f, "{}mat{}", elem.glsl_prefix(), columns)
                } else {
                    write!(f, "{}mat{}x{}", elem.glsl_prefix(), columns, rows)
                }
            }
            UniformType::Sampler {
                dim,
                sampled,
                shadow,
            } => write!(
                f,
                "{}sampler{}{}",
                sampled.glsl_prefix(),
                dim_suffix(dim),
                if shadow { "Shadow" } else { "" }
            ),
            UniformType::Image { dim, sampled } => {
                write!(f, "{}image{}", sampled.glsl_prefix(), dim_suffix(dim))
            }
        }
    }
}
