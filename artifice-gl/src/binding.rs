//! Binding state cache.
//!
//! Mirrors which object is current on every binding point of a context, so that activation
//! calls that would not change anything can be skipped.
use crate::handle::Handle;
use smallvec::{smallvec, SmallVec};
use std::{collections::HashMap, fmt};

/// Buffer binding points.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum BufferTarget {
    Array,
    ElementArray,
    Uniform,
    ShaderStorage,
    CopyRead,
    CopyWrite,
    PixelPack,
    PixelUnpack,
    DrawIndirect,
    DispatchIndirect,
    TransformFeedback,
    AtomicCounter,
    Texture,
    Query,
}

impl BufferTarget {
    /// Whether the target has numbered binding points (`glBindBufferBase`).
    pub fn is_indexable(self) -> bool {
        matches!(
            self,
            BufferTarget::Uniform
                | BufferTarget::ShaderStorage
                | BufferTarget::TransformFeedback
                | BufferTarget::AtomicCounter
        )
    }
}

/// Texture binding points. Each texture unit has one binding per target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureTarget {
    Tex1D,
    Tex2D,
    Tex3D,
    Tex1DArray,
    Tex2DArray,
    CubeMap,
    CubeMapArray,
    Rectangle,
    Buffer,
    Tex2DMultisample,
    Tex2DMultisampleArray,
}

/// Framebuffer binding points.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum FramebufferTarget {
    Draw,
    Read,
    /// Both the draw and read binding points.
    Both,
}

/// The class of binding point.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetCategory {
    Buffer(BufferTarget),
    Texture(TextureTarget),
    Framebuffer(FramebufferTarget),
    /// The current program.
    Program,
    VertexArray,
}

/// A binding point: a category plus an optional unit or index.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub struct BindingTarget {
    category: TargetCategory,
    slot: Option<u32>,
}

impl BindingTarget {
    /// The current program (`glUseProgram`).
    pub const PROGRAM: BindingTarget = BindingTarget {
        category: TargetCategory::Program,
        slot: None,
    };

    /// The current vertex array.
    pub const VERTEX_ARRAY: BindingTarget = BindingTarget {
        category: TargetCategory::VertexArray,
        slot: None,
    };

    /// Generic binding point of a buffer target.
    pub const fn buffer(target: BufferTarget) -> BindingTarget {
        BindingTarget {
            category: TargetCategory::Buffer(target),
            slot: None,
        }
    }

    /// Numbered binding point of an indexable buffer target.
    pub const fn buffer_indexed(target: BufferTarget, index: u32) -> BindingTarget {
        BindingTarget {
            category: TargetCategory::Buffer(target),
            slot: Some(index),
        }
    }

    /// Binding point of `target` on texture unit `unit`.
    pub const fn texture(target: TextureTarget, unit: u32) -> BindingTarget {
        BindingTarget {
            category: TargetCategory::Texture(target),
            slot: Some(unit),
        }
    }

    pub const fn framebuffer(target: FramebufferTarget) -> BindingTarget {
        BindingTarget {
            category: TargetCategory::Framebuffer(target),
            slot: None,
        }
    }

    pub fn category(&self) -> TargetCategory {
        self.category
    }

    /// Texture unit or buffer binding index.
    pub fn slot(&self) -> Option<u32> {
        self.slot
    }

    /// Cache entries that must all hold the requested value for an activation to be redundant.
    fn checked_keys(&self) -> SmallVec<[BindingTarget; 2]> {
        match self.category {
            TargetCategory::Framebuffer(FramebufferTarget::Both) => smallvec![
                BindingTarget::framebuffer(FramebufferTarget::Draw),
                BindingTarget::framebuffer(FramebufferTarget::Read),
            ],
            _ => smallvec![*self],
        }
    }

    /// Cache entries overwritten by a successful activation.
    fn affected_keys(&self) -> SmallVec<[BindingTarget; 2]> {
        match (self.category, self.slot) {
            // binding to an indexed point also replaces the generic binding of that target
            (TargetCategory::Buffer(target), Some(_)) => {
                smallvec![*self, BindingTarget::buffer(target)]
            }
            _ => self.checked_keys(),
        }
    }
}

impl fmt::Display for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot {
            Some(slot) => write!(f, "{:?}[{}]", self.category, slot),
            None => write!(f, "{:?}", self.category),
        }
    }
}

/// What the cache knows about a binding point.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BindingState {
    /// Never observed (or invalidated); the next activation always goes through.
    Unknown,
    /// Explicitly detached.
    Null,
    Bound(Handle),
}

impl BindingState {
    pub fn handle(&self) -> Option<Handle> {
        match *self {
            BindingState::Bound(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Activation counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BindingStats {
    /// Activation calls forwarded to the API.
    pub issued: u64,
    /// Activation requests answered from the cache.
    pub elided: u64,
}

/// Table of `binding point -> bound object`.
///
/// An absent entry means "unknown"; `Some(None)` means the point was explicitly detached.
#[derive(Debug, Default)]
pub(crate) struct BindingTable {
    entries: HashMap<BindingTarget, Option<Handle>>,
    stats: BindingStats,
}

impl BindingTable {
    pub(crate) fn new() -> BindingTable {
        BindingTable::default()
    }

    pub(crate) fn state(&self, target: &BindingTarget) -> BindingState {
        let mut result = None;
        for key in target.checked_keys() {
            let state = match self.entries.get(&key) {
                None => BindingState::Unknown,
                Some(None) => BindingState::Null,
                Some(Some(handle)) => BindingState::Bound(*handle),
            };
            match result {
                None => result = Some(state),
                // aliased points disagree
                Some(prev) if prev != state => return BindingState::Unknown,
                Some(_) => {}
            }
        }
        result.unwrap_or(BindingState::Unknown)
    }

    /// Whether activating `value` on `target` would be redundant.
    pub(crate) fn holds(&self, target: &BindingTarget, value: Option<Handle>) -> bool {
        target
            .checked_keys()
            .iter()
            .all(|key| self.entries.get(key) == Some(&value))
    }

    /// Records a successful activation.
    pub(crate) fn record(&mut self, target: &BindingTarget, value: Option<Handle>) {
        for key in target.affected_keys() {
            self.entries.insert(key, value);
        }
        if target.category == TargetCategory::VertexArray {
            // the element array binding belongs to the vertex array that was just made current
            self.entries
                .remove(&BindingTarget::buffer(BufferTarget::ElementArray));
        }
        self.stats.issued += 1;
    }

    pub(crate) fn record_elided(&mut self) {
        self.stats.elided += 1;
    }

    /// Drops every entry referring to `handle`: the API unbinds objects when they are deleted,
    /// and may hand their name out again.
    pub(crate) fn forget(&mut self, handle: Handle) {
        if self.entries.get(&BindingTarget::VERTEX_ARRAY) == Some(&Some(handle)) {
            // deleting the current vertex array reverts to the default one, which has its own
            // element array binding
            self.entries
                .remove(&BindingTarget::buffer(BufferTarget::ElementArray));
        }
        self.entries.retain(|_, bound| *bound != Some(handle));
    }

    /// Marks a single binding point as unknown.
    pub(crate) fn invalidate(&mut self, target: &BindingTarget) {
        for key in target.checked_keys() {
            self.entries.remove(&key);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn stats(&self) -> BindingStats {
        self.stats
    }

    /// All known entries, for diagnostics.
    pub(crate) fn snapshot(&self) -> Vec<(BindingTarget, Option<Handle>)> {
        self.entries.iter().map(|(k, v)| (*k, *v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ObjectKind;
    use std::num::NonZeroU32;

    fn handle(kind: ObjectKind, id: u32) -> Handle {
        Handle::new(kind, NonZeroU32::new(id).unwrap())
    }

    #[test]
    fn unknown_until_recorded() {
        let mut table = BindingTable::new();
        let array = BindingTarget::buffer(BufferTarget::Array);
        let buf = handle(ObjectKind::Buffer, 1);

        assert_eq!(table.state(&array), BindingState::Unknown);
        assert!(!table.holds(&array, None));
        table.record(&array, Some(buf));
        assert_eq!(table.state(&array), BindingState::Bound(buf));
        assert!(table.holds(&array, Some(buf)));
        table.record(&array, None);
        assert_eq!(table.state(&array), BindingState::Null);
        assert!(table.holds(&array, None));
    }

    #[test]
    fn units_are_distinct_keys() {
        let mut table = BindingTable::new();
        let tex = handle(ObjectKind::Texture, 4);
        table.record(&BindingTarget::texture(TextureTarget::Tex2D, 0), Some(tex));
        assert!(table.holds(&BindingTarget::texture(TextureTarget::Tex2D, 0), Some(tex)));
        assert!(!table.holds(&BindingTarget::texture(TextureTarget::Tex2D, 1), Some(tex)));
        assert!(!table.holds(&BindingTarget::texture(TextureTarget::Tex3D, 0), Some(tex)));
    }

    #[test]
    fn indexed_binding_replaces_generic_binding() {
        let mut table = BindingTable::new();
        let a = handle(ObjectKind::Buffer, 1);
        let b = handle(ObjectKind::Buffer, 2);
        let generic = BindingTarget::buffer(BufferTarget::Uniform);
        table.record(&generic, Some(a));
        table.record(&BindingTarget::buffer_indexed(BufferTarget::Uniform, 3), Some(b));
        assert_eq!(table.state(&generic), BindingState::Bound(b));
        assert_eq!(
            table.state(&BindingTarget::buffer_indexed(BufferTarget::Uniform, 0)),
            BindingState::Unknown
        );
    }

    #[test]
    fn framebuffer_both_aliases_draw_and_read() {
        let mut table = BindingTable::new();
        let fb = handle(ObjectKind::Framebuffer, 1);
        let other = handle(ObjectKind::Framebuffer, 2);
        let both = BindingTarget::framebuffer(FramebufferTarget::Both);
        let read = BindingTarget::framebuffer(FramebufferTarget::Read);

        table.record(&both, Some(fb));
        assert!(table.holds(&both, Some(fb)));
        assert_eq!(table.state(&read), BindingState::Bound(fb));

        table.record(&read, Some(other));
        assert!(!table.holds(&both, Some(fb)));
        assert_eq!(table.state(&both), BindingState::Unknown);
    }

    #[test]
    fn vertex_array_invalidates_element_array() {
        let mut table = BindingTable::new();
        let ebo = handle(ObjectKind::Buffer, 1);
        let vao = handle(ObjectKind::VertexArray, 1);
        let elements = BindingTarget::buffer(BufferTarget::ElementArray);
        table.record(&elements, Some(ebo));
        table.record(&BindingTarget::VERTEX_ARRAY, Some(vao));
        assert_eq!(table.state(&elements), BindingState::Unknown);
    }

    #[test]
    fn forgetting_the_current_vertex_array_drops_its_element_array() {
        let mut table = BindingTable::new();
        let ebo = handle(ObjectKind::Buffer, 1);
        let vao = handle(ObjectKind::VertexArray, 1);
        let other_vao = handle(ObjectKind::VertexArray, 2);
        let elements = BindingTarget::buffer(BufferTarget::ElementArray);

        table.record(&BindingTarget::VERTEX_ARRAY, Some(vao));
        table.record(&elements, Some(ebo));
        table.forget(other_vao);
        assert_eq!(table.state(&elements), BindingState::Bound(ebo));

        table.forget(vao);
        assert_eq!(table.state(&elements), BindingState::Unknown);
        assert_eq!(table.state(&BindingTarget::VERTEX_ARRAY), BindingState::Unknown);
    }

    #[test]
    fn forget_removes_every_reference() {
        let mut table = BindingTable::new();
        let tex = handle(ObjectKind::Texture, 7);
        let other = handle(ObjectKind::Texture, 8);
        table.record(&BindingTarget::texture(TextureTarget::Tex2D, 0), Some(tex));
        table.record(&BindingTarget::texture(TextureTarget::Tex2D, 5), Some(tex));
        table.record(&BindingTarget::texture(TextureTarget::Tex2D, 6), Some(other));
        table.forget(tex);
        assert_eq!(
            table.state(&BindingTarget::texture(TextureTarget::Tex2D, 0)),
            BindingState::Unknown
        );
        assert_eq!(
            table.state(&BindingTarget::texture(TextureTarget::Tex2D, 5)),
            BindingState::Unknown
        );
        assert_eq!(
            table.state(&BindingTarget::texture(TextureTarget::Tex2D, 6)),
            BindingState::Bound(other)
        );
    }

    #[test]
    fn same_id_different_kind_is_a_different_handle() {
        let mut table = BindingTable::new();
        let buf = handle(ObjectKind::Buffer, 1);
        let prog = handle(ObjectKind::Program, 1);
        table.record(&BindingTarget::PROGRAM, Some(prog));
        assert!(!table.holds(&BindingTarget::PROGRAM, Some(buf)));
    }
}
