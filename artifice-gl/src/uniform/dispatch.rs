//! Uniform dispatch.
//!
//! The upload path of a `(declared type, host value)` pair comes from a fixed table indexed by the
//! declared class and the host scalar type. Among float, double, int and uint every combination
//! converts (with Rust `as` semantics: float to int truncates toward zero and saturates); bools
//! only take bools, samplers and images only take unit indices.
use crate::{
    api::{ActiveUniform, GlApi},
    error::{GlResult, UsageError},
    uniform::{
        ScalarType, UniformData, UniformType, UniformUpload, UniformValues, UploadKind,
    },
};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// How host values reach the upload representation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Coercion {
    /// Same representation, uploaded as-is.
    Direct,
    /// Converted component by component.
    Convert,
}

/// Resolved upload path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UploadPath {
    pub upload: UploadKind,
    pub coercion: Coercion,
}

const fn direct(upload: UploadKind) -> Option<UploadPath> {
    Some(UploadPath {
        upload,
        coercion: Coercion::Direct,
    })
}

const fn convert(upload: UploadKind) -> Option<UploadPath> {
    Some(UploadPath {
        upload,
        coercion: Coercion::Convert,
    })
}

const NONE: Option<UploadPath> = None;

// rows: declared class (float, double, int, uint, bool, opaque)
// columns: host scalar type (float, double, int, uint, bool)
static DISPATCH_TABLE: [[Option<UploadPath>; 5]; 6] = [
    [
        direct(UploadKind::Float),
        convert(UploadKind::Float),
        convert(UploadKind::Float),
        convert(UploadKind::Float),
        NONE,
    ],
    [
        convert(UploadKind::Double),
        direct(UploadKind::Double),
        convert(UploadKind::Double),
        convert(UploadKind::Double),
        NONE,
    ],
    [
        convert(UploadKind::Int),
        convert(UploadKind::Int),
        direct(UploadKind::Int),
        convert(UploadKind::Int),
        NONE,
    ],
    [
        convert(UploadKind::UInt),
        convert(UploadKind::UInt),
        convert(UploadKind::UInt),
        direct(UploadKind::UInt),
        NONE,
    ],
    [NONE, NONE, NONE, NONE, convert(UploadKind::Int)],
    [NONE, NONE, direct(UploadKind::Int), convert(UploadKind::Int), NONE],
];

/// Returns the upload path for a value of type `supplied` assigned to a uniform of type
/// `declared`, or `None` if the combination is not allowed.
pub fn resolve(declared: &UniformType, supplied: ScalarType) -> Option<UploadPath> {
    DISPATCH_TABLE[declared.class().index()][supplied.index()]
}

/// Values in their upload representation, converted only if needed.
pub(crate) enum Converted<'a> {
    Borrowed(UniformValues<'a>),
    Float(SmallVec<[f32; 16]>),
    Double(SmallVec<[f64; 16]>),
    Int(SmallVec<[i32; 16]>),
    UInt(SmallVec<[u32; 16]>),
}

impl<'a> Converted<'a> {
    pub(crate) fn values(&self) -> UniformValues<'_> {
        match self {
            Converted::Borrowed(values) => *values,
            Converted::Float(v) => UniformValues::Float(v),
            Converted::Double(v) => UniformValues::Double(v),
            Converted::Int(v) => UniformValues::Int(v),
            Converted::UInt(v) => UniformValues::UInt(v),
        }
    }
}

macro_rules! convert_all {
    ($data:expr, $t:ty) => {
        match $data {
            UniformData::Float(v) => v.iter().map(|&x| x as $t).collect(),
            UniformData::Double(v) => v.iter().map(|&x| x as $t).collect(),
            UniformData::Int(v) => v.iter().map(|&x| x as $t).collect(),
            UniformData::UInt(v) => v.iter().map(|&x| x as $t).collect(),
            UniformData::Bool(v) => v.iter().map(|&x| (x as u8) as $t).collect(),
        }
    };
}

/// Converts `data` to the representation of `upload`.
pub(crate) fn convert_values(data: UniformData<'_>, upload: UploadKind) -> Converted<'_> {
    match (upload, data) {
        (UploadKind::Float, UniformData::Float(v)) => Converted::Borrowed(UniformValues::Float(v)),
        (UploadKind::Double, UniformData::Double(v)) => {
            Converted::Borrowed(UniformValues::Double(v))
        }
        (UploadKind::Int, UniformData::Int(v)) => Converted::Borrowed(UniformValues::Int(v)),
        (UploadKind::UInt, UniformData::UInt(v)) => Converted::Borrowed(UniformValues::UInt(v)),
        (UploadKind::Float, data) => Converted::Float(convert_all!(data, f32)),
        (UploadKind::Double, data) => Converted::Double(convert_all!(data, f64)),
        (UploadKind::Int, data) => Converted::Int(convert_all!(data, i32)),
        (UploadKind::UInt, data) => Converted::UInt(convert_all!(data, u32)),
    }
}

/// An active uniform of a linked program.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformVariable {
    /// Name, without the `[0]` suffix the API reports for arrays.
    pub name: String,
    /// Location of the first element.
    pub location: i32,
    pub ty: UniformType,
    /// Number of array elements (1 for non-arrays).
    pub array_size: u32,
    /// Upload representation of the declared type.
    pub upload: UploadKind,
}

/// Uniforms of a program, by name and by location.
#[derive(Clone, Debug, Default)]
pub struct UniformTable {
    variables: Vec<UniformVariable>,
    by_name: HashMap<String, usize>,
    by_location: BTreeMap<i32, usize>,
}

impl UniformTable {
    /// Builds the table from the active uniforms reported after a link.
    pub fn from_active(active: Vec<ActiveUniform>) -> UniformTable {
        let mut table = UniformTable::default();
        for u in active {
            // uniforms in blocks have no location
            if u.location < 0 {
                continue;
            }
            let name = match u.name.strip_suffix("[0]") {
                Some(base) => base.to_string(),
                None => u.name,
            };
            let index = table.variables.len();
            table.by_name.insert(name.clone(), index);
            table.by_location.insert(u.location, index);
            table.variables.push(UniformVariable {
                name,
                location: u.location,
                ty: u.ty,
                array_size: u.size.max(1),
                upload: u.ty.upload_kind(),
            });
        }
        table
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UniformVariable> {
        self.variables.iter()
    }

    /// Looks up a uniform by name. Array elements can be named with a subscript (`lights[2]`).
    ///
    /// Returns the variable and the array element the name refers to.
    pub fn lookup(&self, name: &str) -> Option<(&UniformVariable, u32)> {
        if let Some(&index) = self.by_name.get(name) {
            return Some((&self.variables[index], 0));
        }
        let (base, subscript) = name.strip_suffix(']')?.rsplit_once('[')?;
        let element: u32 = subscript.parse().ok()?;
        let &index = self.by_name.get(base)?;
        let variable = &self.variables[index];
        if element < variable.array_size {
            Some((variable, element))
        } else {
            None
        }
    }

    pub fn get(&self, name: &str) -> Option<&UniformVariable> {
        self.lookup(name).map(|(variable, _)| variable)
    }

    pub fn location(&self, name: &str) -> Option<i32> {
        self.lookup(name)
            .map(|(variable, element)| variable.location + element as i32)
    }

    /// Returns the variable covering `location`, and the array element at that location.
    pub fn at_location(&self, location: i32) -> Option<(&UniformVariable, u32)> {
        let (&base, &index) = self.by_location.range(..=location).next_back()?;
        let variable = &self.variables[index];
        let element = (location - base) as u32;
        if element < variable.array_size {
            Some((variable, element))
        } else {
            None
        }
    }
}

/// Uploads `data` to the given element of `variable`. The owning program must be current.
pub(crate) fn upload_uniform(
    api: &dyn GlApi,
    variable: &UniformVariable,
    element: u32,
    data: UniformData<'_>,
) -> GlResult<()> {
    let location = variable.location + element as i32;
    let supplied = data.kind();
    let path = resolve(&variable.ty, supplied).ok_or(UsageError::IncompatibleUniformType {
        location,
        declared: variable.ty,
        supplied,
    })?;

    let per_element = variable.ty.components();
    let available = (variable.array_size - element) as usize;
    let count = data.len() / per_element;
    if data.is_empty() || data.len() % per_element != 0 || count > available {
        return Err(UsageError::UniformCountMismatch {
            location,
            declared: variable.ty,
            array_size: variable.array_size,
            supplied: data.len(),
        }
        .into());
    }

    let converted = convert_values(data, path.upload);
    trace!(location, ty = %variable.ty, count, ?path, "upload_uniform");
    api.upload_uniform(&UniformUpload {
        location,
        rows: variable.ty.rows(),
        columns: variable.ty.columns(),
        count,
        values: converted.values(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::TextureTarget;

    const CLASSES: [UniformType; 6] = [
        UniformType::FLOAT,
        UniformType::DOUBLE,
        UniformType::INT,
        UniformType::UINT,
        UniformType::BOOL,
        UniformType::SAMPLER_2D,
    ];

    #[test]
    fn exact_matches_are_direct() {
        let pairs = [
            (UniformType::VEC3, ScalarType::Float, UploadKind::Float),
            (UniformType::DVEC2, ScalarType::Double, UploadKind::Double),
            (UniformType::IVEC4, ScalarType::Int, UploadKind::Int),
            (UniformType::UVEC2, ScalarType::UInt, UploadKind::UInt),
            (UniformType::SAMPLER_2D, ScalarType::Int, UploadKind::Int),
        ];
        for &(declared, supplied, upload) in pairs.iter() {
            assert_eq!(
                resolve(&declared, supplied),
                Some(UploadPath {
                    upload,
                    coercion: Coercion::Direct
                }),
                "{} from {:?}",
                declared,
                supplied
            );
        }
    }

    #[test]
    fn numeric_kinds_convert_both_ways() {
        let numeric = [
            ScalarType::Float,
            ScalarType::Double,
            ScalarType::Int,
            ScalarType::UInt,
        ];
        for declared in CLASSES[..4].iter() {
            for &supplied in numeric.iter() {
                let path = resolve(declared, supplied).expect("numeric combination rejected");
                assert_eq!(path.upload, declared.upload_kind());
            }
            assert_eq!(resolve(declared, ScalarType::Bool), None);
        }
    }

    #[test]
    fn bools_only_take_bools() {
        for &supplied in ScalarType::ALL.iter() {
            let path = resolve(&UniformType::BVEC3, supplied);
            if supplied == ScalarType::Bool {
                assert_eq!(path, convert(UploadKind::Int));
            } else {
                assert_eq!(path, None);
            }
        }
    }

    #[test]
    fn opaque_types_only_take_unit_indices() {
        let image = UniformType::Image {
            dim: TextureTarget::Tex3D,
            sampled: ScalarType::UInt,
        };
        for declared in [UniformType::SAMPLER_2D, image].iter() {
            assert!(resolve(declared, ScalarType::Int).is_some());
            assert!(resolve(declared, ScalarType::UInt).is_some());
            assert!(resolve(declared, ScalarType::Float).is_none());
            assert!(resolve(declared, ScalarType::Double).is_none());
            assert!(resolve(declared, ScalarType::Bool).is_none());
        }
    }

    #[test]
    fn conversion_semantics() {
        let ints = [3, -7];
        match convert_values(UniformData::Int(&ints), UploadKind::Float) {
            Converted::Float(v) => assert_eq!(&v[..], &[3.0, -7.0]),
            _ => panic!("expected converted floats"),
        }
        let floats = [2.9f32, -2.9, 1e20];
        match convert_values(UniformData::Float(&floats), UploadKind::Int) {
            Converted::Int(v) => assert_eq!(&v[..], &[2, -2, i32::MAX]),
            _ => panic!("expected converted ints"),
        }
        let bools = [true, false];
        match convert_values(UniformData::Bool(&bools), UploadKind::Int) {
            Converted::Int(v) => assert_eq!(&v[..], &[1, 0]),
            _ => panic!("expected converted ints"),
        }
        let doubles = [0.1f64];
        assert!(matches!(
            convert_values(UniformData::Double(&doubles), UploadKind::Double),
            Converted::Borrowed(UniformValues::Double(_))
        ));
    }

    fn active(name: &str, location: i32, ty: UniformType, size: u32) -> ActiveUniform {
        ActiveUniform {
            name: name.to_string(),
            location,
            ty,
            size,
        }
    }

    #[test]
    fn table_lookup() {
        let table = UniformTable::from_active(vec![
            active("mvp", 0, UniformType::MAT4, 1),
            active("weights[0]", 1, UniformType::FLOAT, 4),
            active("light.color", 5, UniformType::VEC3, 1),
            active("block_member", -1, UniformType::VEC4, 1),
        ]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.location("mvp"), Some(0));
        assert_eq!(table.location("weights"), Some(1));
        assert_eq!(table.location("weights[3]"), Some(4));
        assert_eq!(table.location("weights[4]"), None);
        assert_eq!(table.location("light.color"), Some(5));
        assert_eq!(table.location("block_member"), None);

        let (var, element) = table.at_location(3).unwrap();
        assert_eq!((var.name.as_str(), element), ("weights", 2));
        assert!(table.at_location(6).is_none());
        assert!(table.at_location(-1).is_none());
    }
}
