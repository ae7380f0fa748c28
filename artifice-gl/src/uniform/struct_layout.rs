//! Host-side layout of composite (struct) uniforms.
//!
//! Members are packed back to back, each taking its natural host size: 4 bytes per float, int,
//! uint or bool component, 8 bytes per double component. There is no padding.
use crate::{
    error::UsageError,
    uniform::{ScalarType, UniformData},
};
use smallvec::SmallVec;

/// Type of a struct member in host memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceType {
    pub scalar: ScalarType,
    /// Vector length or matrix rows.
    pub rows: u8,
    pub columns: u8,
}

impl SourceType {
    pub const fn scalar(scalar: ScalarType) -> SourceType {
        SourceType {
            scalar,
            rows: 1,
            columns: 1,
        }
    }

    pub const fn vector(scalar: ScalarType, len: u8) -> SourceType {
        SourceType {
            scalar,
            rows: len,
            columns: 1,
        }
    }

    /// Column-major matrix.
    pub const fn matrix(scalar: ScalarType, columns: u8, rows: u8) -> SourceType {
        SourceType {
            scalar,
            rows,
            columns,
        }
    }

    pub const fn components(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    pub const fn byte_size(&self) -> usize {
        self.scalar.byte_size() * self.components()
    }
}

/// A struct member.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub struct StructMember {
    pub name: String,
    pub source: SourceType,
    /// Round double values through `f32` before uploading them.
    pub store_as_float: bool,
}

/// Ordered list of struct members.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub struct StructLayout {
    members: Vec<StructMember>,
}

impl StructLayout {
    pub fn new() -> StructLayout {
        StructLayout::default()
    }

    /// Appends a member.
    pub fn member(mut self, name: impl Into<String>, source: SourceType) -> Self {
        self.members.push(StructMember {
            name: name.into(),
            source,
            store_as_float: false,
        });
        self
    }

    /// Appends a double member that is narrowed to `f32` precision on upload.
    pub fn member_as_float(mut self, name: impl Into<String>, source: SourceType) -> Self {
        self.members.push(StructMember {
            name: name.into(),
            source,
            store_as_float: true,
        });
        self
    }

    pub fn members(&self) -> &[StructMember] {
        &self.members
    }

    /// Size in bytes of one struct, which is also the stride of struct arrays.
    pub fn size(&self) -> usize {
        self.members.iter().map(|m| m.source.byte_size()).sum()
    }

    /// Byte offset of every member.
    pub fn offsets(&self) -> Vec<usize> {
        self.members
            .iter()
            .scan(0, |offset, m| {
                let current = *offset;
                *offset += m.source.byte_size();
                Some(current)
            })
            .collect()
    }

    /// Decodes the members of one struct starting at the beginning of `bytes`.
    pub(crate) fn decode<'l>(&'l self, bytes: &[u8]) -> Result<Vec<DecodedMember<'l>>, UsageError> {
        self.decode_array(bytes, 1)
    }

    /// Decodes `count` consecutive structs. Members of element `i` are returned with `element`
    /// set to `i`.
    pub(crate) fn decode_array<'l>(
        &'l self,
        bytes: &[u8],
        count: usize,
    ) -> Result<Vec<DecodedMember<'l>>, UsageError> {
        let stride = self.size();
        let expected = stride.checked_mul(count).unwrap_or(usize::MAX);
        if bytes.len() < expected {
            return Err(UsageError::StructDataTooShort {
                expected,
                actual: bytes.len(),
            });
        }

        let mut decoded = Vec::with_capacity(self.members.len() * count);
        for element in 0..count {
            let mut offset = element * stride;
            for member in self.members.iter() {
                let size = member.source.byte_size();
                let values = MemberValues::read(member, &bytes[offset..offset + size]);
                decoded.push(DecodedMember {
                    member,
                    element,
                    offset,
                    values,
                });
                offset += size;
            }
        }
        Ok(decoded)
    }
}

/// Values of a struct member read from host memory.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum MemberValues {
    Float(SmallVec<[f32; 16]>),
    Double(SmallVec<[f64; 16]>),
    Int(SmallVec<[i32; 16]>),
    UInt(SmallVec<[u32; 16]>),
    Bool(SmallVec<[bool; 16]>),
}

fn read_all<T: bytemuck::Pod>(bytes: &[u8]) -> impl Iterator<Item = T> + '_ {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned::<T>)
}

impl MemberValues {
    fn read(member: &StructMember, bytes: &[u8]) -> MemberValues {
        match member.source.scalar {
            ScalarType::Float => MemberValues::Float(read_all::<f32>(bytes).collect()),
            ScalarType::Double if member.store_as_float => {
                MemberValues::Double(read_all::<f64>(bytes).map(|v| v as f32 as f64).collect())
            }
            ScalarType::Double => MemberValues::Double(read_all::<f64>(bytes).collect()),
            ScalarType::Int => MemberValues::Int(read_all::<i32>(bytes).collect()),
            ScalarType::UInt => MemberValues::UInt(read_all::<u32>(bytes).collect()),
            ScalarType::Bool => MemberValues::Bool(read_all::<u32>(bytes).map(|v| v != 0).collect()),
        }
    }

    pub(crate) fn as_data(&self) -> UniformData<'_> {
        match self {
            MemberValues::Float(v) => UniformData::Float(v),
            MemberValues::Double(v) => UniformData::Double(v),
            MemberValues::Int(v) => UniformData::Int(v),
            MemberValues::UInt(v) => UniformData::UInt(v),
            MemberValues::Bool(v) => UniformData::Bool(v),
        }
    }
}

/// A member of one struct instance, decoded.
#[derive(Clone, Debug)]
pub(crate) struct DecodedMember<'l> {
    pub(crate) member: &'l StructMember,
    /// Index of the struct in the array (0 for single structs).
    pub(crate) element: usize,
    /// Byte offset in the source data.
    pub(crate) offset: usize,
    pub(crate) values: MemberValues,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBER_TYPES: [SourceType; 8] = [
        SourceType::scalar(ScalarType::Float),
        SourceType::scalar(ScalarType::Double),
        SourceType::scalar(ScalarType::Int),
        SourceType::scalar(ScalarType::UInt),
        SourceType::scalar(ScalarType::Bool),
        SourceType::vector(ScalarType::Float, 2),
        SourceType::vector(ScalarType::Double, 3),
        SourceType::matrix(ScalarType::Float, 2, 2),
    ];

    /// Appends the encoding of `n` consecutive values starting at `seed`.
    fn encode(bytes: &mut Vec<u8>, source: SourceType, seed: u32) {
        for i in 0..source.components() as u32 {
            let v = seed + i;
            match source.scalar {
                ScalarType::Float => bytes.extend_from_slice(&(v as f32).to_ne_bytes()),
                ScalarType::Double => bytes.extend_from_slice(&(v as f64).to_ne_bytes()),
                ScalarType::Int => bytes.extend_from_slice(&(v as i32).to_ne_bytes()),
                ScalarType::UInt => bytes.extend_from_slice(&v.to_ne_bytes()),
                ScalarType::Bool => bytes.extend_from_slice(&(v % 2).to_ne_bytes()),
            }
        }
    }

    fn check_values(values: &MemberValues, source: SourceType, seed: u32) {
        let n = source.components() as u32;
        match values {
            MemberValues::Float(v) => {
                assert_eq!(source.scalar, ScalarType::Float);
                assert_eq!(&v[..], &(seed..seed + n).map(|x| x as f32).collect::<Vec<_>>()[..]);
            }
            MemberValues::Double(v) => {
                assert_eq!(source.scalar, ScalarType::Double);
                assert_eq!(&v[..], &(seed..seed + n).map(|x| x as f64).collect::<Vec<_>>()[..]);
            }
            MemberValues::Int(v) => {
                assert_eq!(source.scalar, ScalarType::Int);
                assert_eq!(&v[..], &(seed..seed + n).map(|x| x as i32).collect::<Vec<_>>()[..]);
            }
            MemberValues::UInt(v) => {
                assert_eq!(source.scalar, ScalarType::UInt);
                assert_eq!(&v[..], &(seed..seed + n).collect::<Vec<_>>()[..]);
            }
            MemberValues::Bool(v) => {
                assert_eq!(source.scalar, ScalarType::Bool);
                assert_eq!(&v[..], &(seed..seed + n).map(|x| x % 2 == 1).collect::<Vec<_>>()[..]);
            }
        }
    }

    fn sequences(len: usize) -> Vec<Vec<SourceType>> {
        if len == 0 {
            return vec![vec![]];
        }
        let mut out = Vec::new();
        for prefix in sequences(len - 1) {
            for ty in MEMBER_TYPES.iter() {
                let mut seq = prefix.clone();
                seq.push(*ty);
                out.push(seq);
            }
        }
        out
    }

    #[test]
    fn every_member_sequence_decodes_at_natural_offsets() {
        for len in 1..=3 {
            for seq in sequences(len) {
                let mut layout = StructLayout::new();
                let mut bytes = Vec::new();
                let mut expected_offsets = Vec::new();
                for (i, ty) in seq.iter().enumerate() {
                    expected_offsets.push(bytes.len());
                    layout = layout.member(format!("m{}", i), *ty);
                    encode(&mut bytes, *ty, 10 * i as u32 + 1);
                }
                assert_eq!(layout.size(), bytes.len(), "{:?}", seq);
                assert_eq!(layout.offsets(), expected_offsets, "{:?}", seq);

                let decoded = layout.decode(&bytes).unwrap();
                assert_eq!(decoded.len(), seq.len());
                for (i, d) in decoded.iter().enumerate() {
                    assert_eq!(d.offset, expected_offsets[i], "{:?}", seq);
                    assert_eq!(d.element, 0);
                    check_values(&d.values, seq[i], 10 * i as u32 + 1);
                }
            }
        }
    }

    #[test]
    fn int_vec2_bool_offsets() {
        let layout = StructLayout::new()
            .member("a", SourceType::scalar(ScalarType::Int))
            .member("b", SourceType::vector(ScalarType::Float, 2))
            .member("c", SourceType::scalar(ScalarType::Bool));
        assert_eq!(layout.offsets(), vec![0, 4, 12]);
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn arrays_use_the_struct_size_as_stride() {
        let layout = StructLayout::new()
            .member("d", SourceType::scalar(ScalarType::Double))
            .member("i", SourceType::scalar(ScalarType::Int));
        let mut bytes = Vec::new();
        for k in 0..3 {
            encode(&mut bytes, SourceType::scalar(ScalarType::Double), k * 100);
            encode(&mut bytes, SourceType::scalar(ScalarType::Int), k * 100 + 50);
        }
        let decoded = layout.decode_array(&bytes, 3).unwrap();
        let offsets: Vec<_> = decoded.iter().map(|d| (d.element, d.offset)).collect();
        assert_eq!(offsets, vec![(0, 0), (0, 8), (1, 12), (1, 20), (2, 24), (2, 32)]);
        check_values(&decoded[4].values, SourceType::scalar(ScalarType::Double), 200);
        check_values(&decoded[5].values, SourceType::scalar(ScalarType::Int), 250);
    }

    #[test]
    fn narrowed_doubles() {
        let layout = StructLayout::new()
            .member_as_float("x", SourceType::scalar(ScalarType::Double));
        let bytes = 0.1f64.to_ne_bytes();
        let decoded = layout.decode(&bytes).unwrap();
        assert_eq!(
            decoded[0].values,
            MemberValues::Double(SmallVec::from_slice(&[0.1f32 as f64]))
        );
    }

    #[test]
    fn short_data_is_rejected() {
        let layout = StructLayout::new().member("v", SourceType::vector(ScalarType::Float, 4));
        assert_eq!(
            layout.decode_array(&[0u8; 20], 2).unwrap_err(),
            UsageError::StructDataTooShort {
                expected: 32,
                actual: 20
            }
        );
        assert_eq!(
            layout.decode_array(&[0u8; 16], usize::MAX).unwrap_err(),
            UsageError::StructDataTooShort {
                expected: usize::MAX,
                actual: 16
            }
        );
    }
}
