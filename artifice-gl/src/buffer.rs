use crate::{
    binding::{BindingTarget, BufferTarget},
    context::Context,
    error::{GlResult, UsageError},
    handle::{ContextObject, Handle, ObjectKind},
    property::{CachedProperties, Origin, Property},
};
use bitflags::bitflags;
use std::{fmt, ptr::NonNull, slice};
use tracing::{trace, warn};

/// Expected usage pattern of the contents of a buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum BufferUsage {
    StreamDraw,
    StreamRead,
    StreamCopy,
    StaticDraw,
    StaticRead,
    StaticCopy,
    DynamicDraw,
    DynamicRead,
    DynamicCopy,
}

bitflags! {
    /// Access flags of a buffer mapping.
    pub struct MapAccess: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
        const INVALIDATE_RANGE = 0x4;
        const INVALIDATE_BUFFER = 0x8;
        const FLUSH_EXPLICIT = 0x10;
        const UNSYNCHRONIZED = 0x20;
    }
}

impl MapAccess {
    /// Whether this combination of flags is a valid mapping request.
    pub fn is_valid(&self) -> bool {
        if !self.intersects(MapAccess::READ | MapAccess::WRITE) {
            return false;
        }
        let write_only =
            MapAccess::INVALIDATE_RANGE | MapAccess::INVALIDATE_BUFFER | MapAccess::UNSYNCHRONIZED;
        if self.contains(MapAccess::READ) && self.intersects(write_only) {
            return false;
        }
        !(self.contains(MapAccess::FLUSH_EXPLICIT) && !self.contains(MapAccess::WRITE))
    }
}

/// A live mapping of a range of a buffer.
///
/// At most one view exists per buffer at a time; it is consumed by `Buffer::unmap`.
pub struct MappedView {
    owner: Handle,
    ptr: NonNull<u8>,
    offset: usize,
    len: usize,
    access: MapAccess,
    generation: u64,
}

impl MappedView {
    pub fn owner(&self) -> Handle {
        self.owner
    }

    /// Offset of the mapped range in the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn access(&self) -> MapAccess {
        self.access
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The mapped bytes.
    ///
    /// # Safety
    ///
    /// The mapping must allow reads, and no other code may write the range for the lifetime of
    /// the returned slice (including the device, unless the mapping is synchronized).
    pub unsafe fn as_slice(&self) -> &[u8] {
        slice::from_raw_parts(self.ptr.as_ptr(), self.len)
    }

    /// The mapped bytes, mutably.
    ///
    /// # Safety
    ///
    /// The mapping must allow writes. Same aliasing rules as `as_slice`.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }
}

impl fmt::Debug for MappedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedView")
            .field("owner", &self.owner)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("access", &self.access)
            .field("generation", &self.generation)
            .finish()
    }
}

/// The mapping currently live on a buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MappingState {
    pub offset: usize,
    pub len: usize,
    pub access: MapAccess,
    pub generation: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BufferProperty {
    Size,
    Usage,
    Mapping,
}

/// Cached state of a buffer. All of it is authoritative.
#[derive(Debug)]
pub struct BufferProperties {
    size: Property<usize>,
    usage: Property<BufferUsage>,
    mapping: Option<MappingState>,
    generation: u64,
}

impl BufferProperties {
    fn new() -> BufferProperties {
        BufferProperties {
            size: Property::authoritative(),
            usage: Property::authoritative(),
            mapping: None,
            generation: 0,
        }
    }

    pub(crate) fn sync_after_alloc(&mut self, size: usize, usage: BufferUsage) {
        self.size.set(size);
        self.usage.set(usage);
        self.mapping = None;
    }

    pub fn size(&self) -> Option<usize> {
        self.size.get()
    }

    pub fn usage(&self) -> Option<BufferUsage> {
        self.usage.get()
    }

    pub fn mapping(&self) -> Option<MappingState> {
        self.mapping
    }
}

impl CachedProperties for BufferProperties {
    type Key = BufferProperty;

    fn origin(&self, _key: BufferProperty) -> Origin {
        Origin::Authoritative
    }

    fn invalidate(&self, key: BufferProperty) {
        match key {
            BufferProperty::Size => self.size.invalidate(),
            BufferProperty::Usage => self.usage.invalidate(),
            // the mapping is only ever changed by map/unmap
            BufferProperty::Mapping => {}
        }
    }
}

fn check_range(offset: usize, len: usize, size: usize) -> Result<(), UsageError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(UsageError::OutOfBounds { offset, len, size }),
    }
}

/// A buffer object.
#[derive(Debug)]
pub struct Buffer {
    obj: ContextObject,
    target: BufferTarget,
    props: BufferProperties,
}

impl Buffer {
    /// Creates a buffer with no storage. `target` is the binding point used by `bind`.
    pub fn new(ctx: &Context, target: BufferTarget) -> GlResult<Buffer> {
        let obj = ContextObject::create(ctx, ObjectKind::Buffer, |api| api.create(ObjectKind::Buffer))?;
        Ok(Buffer {
            obj,
            target,
            props: BufferProperties::new(),
        })
    }

    pub fn handle(&self) -> Result<Handle, UsageError> {
        self.obj.handle()
    }

    pub fn object(&self) -> &ContextObject {
        &self.obj
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn properties(&self) -> &BufferProperties {
        &self.props
    }

    /// Binds the buffer to its default target.
    pub fn bind(&self) -> GlResult<bool> {
        self.obj.bind(BindingTarget::buffer(self.target))
    }

    pub fn bind_to(&self, target: BufferTarget) -> GlResult<bool> {
        self.obj.bind(BindingTarget::buffer(target))
    }

    /// Binds the buffer to an indexed binding point. This also makes it current on the generic
    /// binding point of `target`.
    pub fn bind_indexed(&self, target: BufferTarget, index: u32) -> GlResult<bool> {
        self.obj.bind(BindingTarget::buffer_indexed(target, index))
    }

    pub fn unbind(&self) -> GlResult<bool> {
        self.obj.unbind(BindingTarget::buffer(self.target))
    }

    fn allocate_inner(&mut self, size: usize, data: Option<&[u8]>, usage: BufferUsage) -> GlResult<()> {
        let handle = self.obj.handle()?;
        if self.props.mapping.is_some() {
            return Err(UsageError::AlreadyMapped(handle).into());
        }
        self.obj
            .context()
            .api()
            .buffer_data(handle.raw(), size, data, usage)?;
        self.props.sync_after_alloc(size, usage);
        trace!(%handle, size, ?usage, "buffer_allocate");
        Ok(())
    }

    /// Allocates (or reallocates) uninitialized storage.
    pub fn allocate(&mut self, size: usize, usage: BufferUsage) -> GlResult<()> {
        self.allocate_inner(size, None, usage)
    }

    /// Allocates storage initialized with `data`.
    pub fn allocate_with_data(&mut self, data: &[u8], usage: BufferUsage) -> GlResult<()> {
        self.allocate_inner(data.len(), Some(data), usage)
    }

    fn allocated_size(&self, handle: Handle) -> Result<usize, UsageError> {
        self.props.size().ok_or(UsageError::NotAllocated(handle))
    }

    /// Writes `data` at `offset`.
    pub fn upload(&self, offset: usize, data: &[u8]) -> GlResult<()> {
        let handle = self.obj.handle()?;
        let size = self.allocated_size(handle)?;
        check_range(offset, data.len(), size)?;
        if self.props.mapping.is_some() {
            return Err(UsageError::AlreadyMapped(handle).into());
        }
        self.obj
            .context()
            .api()
            .buffer_sub_data(handle.raw(), offset, data)?;
        Ok(())
    }

    /// Maps a range of the buffer.
    pub fn map(&mut self, offset: usize, len: usize, access: MapAccess) -> GlResult<MappedView> {
        let handle = self.obj.handle()?;
        if !access.is_valid() {
            return Err(UsageError::InvalidMapAccess(access).into());
        }
        let size = self.allocated_size(handle)?;
        if len == 0 {
            return Err(UsageError::OutOfBounds { offset, len, size }.into());
        }
        check_range(offset, len, size)?;
        if self.props.mapping.is_some() {
            return Err(UsageError::AlreadyMapped(handle).into());
        }

        let ptr = self
            .obj
            .context()
            .api()
            .map_buffer_range(handle.raw(), offset, len, access)?;
        self.props.generation += 1;
        let generation = self.props.generation;
        self.props.mapping = Some(MappingState {
            offset,
            len,
            access,
            generation,
        });
        trace!(%handle, offset, len, ?access, generation, "buffer_map");
        Ok(MappedView {
            owner: handle,
            ptr,
            offset,
            len,
            access,
            generation,
        })
    }

    /// Maps the whole buffer.
    pub fn map_all(&mut self, access: MapAccess) -> GlResult<MappedView> {
        let handle = self.obj.handle()?;
        let size = self.allocated_size(handle)?;
        self.map(0, size, access)
    }

    /// Returns the live mapping `view` refers to.
    fn check_view(&self, view: &MappedView) -> Result<MappingState, UsageError> {
        let handle = self.obj.handle()?;
        let mapping = self.props.mapping.ok_or(UsageError::NotMapped(handle))?;
        if view.owner != handle || view.generation != mapping.generation {
            return Err(UsageError::StaleMapping(handle));
        }
        Ok(mapping)
    }

    fn require_access(&self, mapping: &MappingState, required: MapAccess) -> Result<(), UsageError> {
        if mapping.access.contains(required) {
            Ok(())
        } else {
            Err(UsageError::MissingMapAccess {
                handle: self.obj.last_handle(),
                required,
            })
        }
    }

    /// Flushes a sub-range of an explicitly flushed mapping. `offset` is relative to the view.
    pub fn flush_mapped_range(&self, view: &MappedView, offset: usize, len: usize) -> GlResult<()> {
        let mapping = self.check_view(view)?;
        self.require_access(&mapping, MapAccess::FLUSH_EXPLICIT)?;
        check_range(offset, len, mapping.len)?;
        self.obj
            .context()
            .api()
            .flush_mapped_buffer_range(view.owner.raw(), offset, len)?;
        Ok(())
    }

    /// Copies `data` into the mapping at `offset` (relative to the view).
    pub fn write_mapped(&self, view: &mut MappedView, offset: usize, data: &[u8]) -> GlResult<()> {
        let mapping = self.check_view(view)?;
        self.require_access(&mapping, MapAccess::WRITE)?;
        check_range(offset, data.len(), mapping.len)?;
        // SAFETY: the view is the live mapping of this buffer, the range is in bounds and the
        // mapping allows writes
        unsafe {
            view.as_mut_slice()[offset..offset + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    /// Copies `len` bytes out of the mapping at `offset` (relative to the view).
    pub fn read_mapped(&self, view: &MappedView, offset: usize, len: usize) -> GlResult<Vec<u8>> {
        let mapping = self.check_view(view)?;
        self.require_access(&mapping, MapAccess::READ)?;
        check_range(offset, len, mapping.len)?;
        // SAFETY: same as above, for reads
        let bytes = unsafe { view.as_slice()[offset..offset + len].to_vec() };
        Ok(bytes)
    }

    /// Ends the mapping. Returns `false` if the API reports that the contents of the buffer were
    /// lost while mapped.
    ///
    /// If the API call fails the buffer stays mapped; disposing it releases the mapping.
    pub fn unmap(&mut self, view: MappedView) -> GlResult<bool> {
        self.check_view(&view)?;
        let handle = view.owner;
        let intact = self.obj.context().api().unmap_buffer(handle.raw())?;
        self.props.mapping = None;
        trace!(%handle, intact, "buffer_unmap");
        Ok(intact)
    }

    /// Allocated size in bytes, `None` before the first allocation.
    pub fn size(&self) -> Option<usize> {
        self.props.size()
    }

    pub fn usage(&self) -> Option<BufferUsage> {
        self.props.usage()
    }

    pub fn is_mapped(&self) -> bool {
        self.props.mapping.is_some()
    }

    /// Access flags of the live mapping.
    pub fn map_access(&self) -> Option<MapAccess> {
        self.props.mapping.map(|m| m.access)
    }

    pub fn dispose(&mut self) -> bool {
        if let Some(mapping) = self.props.mapping.take() {
            warn!(handle = %self.obj.last_handle(), ?mapping, "buffer disposed while mapped");
        }
        self.obj.dispose()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_access_combinations() {
        assert!(MapAccess::READ.is_valid());
        assert!((MapAccess::READ | MapAccess::WRITE).is_valid());
        assert!((MapAccess::WRITE | MapAccess::INVALIDATE_BUFFER).is_valid());
        assert!((MapAccess::WRITE | MapAccess::FLUSH_EXPLICIT).is_valid());
        assert!(!MapAccess::empty().is_valid());
        assert!(!MapAccess::FLUSH_EXPLICIT.is_valid());
        assert!(!(MapAccess::READ | MapAccess::INVALIDATE_RANGE).is_valid());
        assert!(!(MapAccess::READ | MapAccess::FLUSH_EXPLICIT).is_valid());
    }

    #[test]
    fn ranges() {
        assert!(check_range(0, 16, 16).is_ok());
        assert!(check_range(16, 0, 16).is_ok());
        assert_eq!(
            check_range(8, 9, 16),
            Err(UsageError::OutOfBounds {
                offset: 8,
                len: 9,
                size: 16
            })
        );
        assert!(check_range(usize::MAX, 2, 16).is_err());
    }
}
