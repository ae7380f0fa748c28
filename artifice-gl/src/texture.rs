use crate::{
    binding::{BindingState, BindingTarget, TextureTarget},
    context::Context,
    error::{GlResult, UsageError},
    handle::{ContextObject, Handle, ObjectKind},
    property::{CachedProperties, Origin, Property},
};
use std::{cell::RefCell, collections::BTreeMap};
use tracing::trace;

/// Internal formats of texture levels.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum InternalFormat {
    R8,
    Rg8,
    Rgba8,
    Srgb8Alpha8,
    R16F,
    Rg16F,
    Rgba16F,
    R32F,
    Rg32F,
    Rgba32F,
    R32I,
    R32UI,
    Depth32F,
    Depth24Stencil8,
}

impl InternalFormat {
    /// Size in bytes of one texel in host memory.
    pub fn texel_size(&self) -> usize {
        match *self {
            InternalFormat::R8 => 1,
            InternalFormat::Rg8 | InternalFormat::R16F => 2,
            InternalFormat::Rgba8
            | InternalFormat::Srgb8Alpha8
            | InternalFormat::Rg16F
            | InternalFormat::R32F
            | InternalFormat::R32I
            | InternalFormat::R32UI
            | InternalFormat::Depth32F
            | InternalFormat::Depth24Stencil8 => 4,
            InternalFormat::Rgba16F | InternalFormat::Rg32F => 8,
            InternalFormat::Rgba32F => 16,
        }
    }
}

/// Size of a texture level, or an offset into one. Array layers count as height (1D arrays) or
/// depth (2D and cube arrays).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3d {
    pub const fn new(width: u32, height: u32, depth: u32) -> Extent3d {
        Extent3d {
            width,
            height,
            depth,
        }
    }

    pub const fn new_2d(width: u32, height: u32) -> Extent3d {
        Extent3d::new(width, height, 1)
    }

    /// Number of texels, `None` if it does not fit in a `usize`.
    pub fn volume(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.depth as usize)
    }

    /// Size of `volume()` tightly packed texels of `format`.
    pub fn byte_len(&self, format: InternalFormat) -> Option<usize> {
        self.volume()?.checked_mul(format.texel_size())
    }

    /// Whether the region of size `extent` at `offset` lies inside this extent.
    pub fn contains_region(&self, offset: Extent3d, extent: Extent3d) -> bool {
        let fits = |offset: u32, len: u32, size: u32| {
            offset.checked_add(len).map_or(false, |end| end <= size)
        };
        fits(offset.width, extent.width, self.width)
            && fits(offset.height, extent.height, self.height)
            && fits(offset.depth, extent.depth, self.depth)
    }
}

/// Per-level parameters that can be queried from the API.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TextureLevelParam {
    Width,
    Height,
    Depth,
}

#[derive(Debug)]
struct LevelProperties {
    format: Property<InternalFormat>,
    extent: Property<Extent3d>,
}

impl LevelProperties {
    fn new() -> LevelProperties {
        LevelProperties {
            format: Property::authoritative(),
            extent: Property::queried(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TextureProperty {
    Format(u32),
    Extent(u32),
}

/// Cached state of a texture: per-level formats (authoritative) and extents (queried).
#[derive(Debug, Default)]
pub struct TextureProperties {
    levels: RefCell<BTreeMap<u32, LevelProperties>>,
}

impl TextureProperties {
    pub(crate) fn sync_after_alloc(&self, level: u32, format: InternalFormat) {
        let mut levels = self.levels.borrow_mut();
        let props = levels.entry(level).or_insert_with(LevelProperties::new);
        props.format.set(format);
        props.extent.invalidate();
    }

    pub fn format(&self, level: u32) -> Option<InternalFormat> {
        self.levels.borrow().get(&level).and_then(|l| l.format.get())
    }

    /// Cached extent of a level, without querying.
    pub fn cached_extent(&self, level: u32) -> Option<Extent3d> {
        self.levels.borrow().get(&level).and_then(|l| l.extent.get())
    }

    fn extent_or_query<E>(
        &self,
        level: u32,
        query: impl FnOnce() -> Result<Extent3d, E>,
    ) -> Result<Extent3d, E> {
        let mut levels = self.levels.borrow_mut();
        levels
            .entry(level)
            .or_insert_with(LevelProperties::new)
            .extent
            .get_or_query(query)
    }
}

impl CachedProperties for TextureProperties {
    type Key = TextureProperty;

    fn origin(&self, key: TextureProperty) -> Origin {
        match key {
            TextureProperty::Format(_) => Origin::Authoritative,
            TextureProperty::Extent(_) => Origin::Queried,
        }
    }

    fn invalidate(&self, key: TextureProperty) {
        let levels = self.levels.borrow();
        match key {
            TextureProperty::Format(level) => {
                if let Some(l) = levels.get(&level) {
                    l.format.invalidate()
                }
            }
            TextureProperty::Extent(level) => {
                if let Some(l) = levels.get(&level) {
                    l.extent.invalidate()
                }
            }
        }
    }
}

/// A texture object. The target is fixed at creation.
#[derive(Debug)]
pub struct Texture {
    obj: ContextObject,
    target: TextureTarget,
    props: TextureProperties,
}

impl Texture {
    pub fn new(ctx: &Context, target: TextureTarget) -> GlResult<Texture> {
        let obj = ContextObject::create(ctx, ObjectKind::Texture, |api| {
            api.create(ObjectKind::Texture)
        })?;
        Ok(Texture {
            obj,
            target,
            props: TextureProperties::default(),
        })
    }

    pub fn handle(&self) -> Result<Handle, UsageError> {
        self.obj.handle()
    }

    pub fn object(&self) -> &ContextObject {
        &self.obj
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn properties(&self) -> &TextureProperties {
        &self.props
    }

    /// Binds the texture to texture unit `unit`.
    pub fn bind(&self, unit: u32) -> GlResult<bool> {
        self.obj.bind(BindingTarget::texture(self.target, unit))
    }

    /// Binds the texture to `target` on texture unit `unit`. `target` must be the target the
    /// texture was created for.
    pub fn bind_to(&self, target: TextureTarget, unit: u32) -> GlResult<bool> {
        if target != self.target {
            return Err(UsageError::TextureTargetMismatch {
                expected: self.target,
                actual: target,
            }
            .into());
        }
        self.bind(unit)
    }

    pub fn unbind(&self, unit: u32) -> GlResult<bool> {
        self.obj.unbind(BindingTarget::texture(self.target, unit))
    }

    /// Specifies a mip level.
    ///
    /// If present, `data` must hold exactly `extent.volume()` tightly packed texels.
    ///
    /// Image specification goes through unit 0. The object the cache knows to be current there
    /// is made current again afterwards.
    pub fn allocate(
        &self,
        level: u32,
        format: InternalFormat,
        extent: Extent3d,
        data: Option<&[u8]>,
    ) -> GlResult<()> {
        let handle = self.obj.handle()?;
        let expected = extent.byte_len(format);
        if let Some(data) = data {
            if expected != Some(data.len()) {
                return Err(UsageError::OutOfBounds {
                    offset: 0,
                    len: data.len(),
                    size: expected.unwrap_or(usize::MAX),
                }
                .into());
            }
        } else if expected.is_none() {
            return Err(UsageError::OutOfBounds {
                offset: 0,
                len: 0,
                size: usize::MAX,
            }
            .into());
        }

        let ctx = self.obj.context();
        let unit0 = BindingTarget::texture(self.target, 0);
        let previous = ctx.binding(unit0);
        self.bind(0)?;
        let result = ctx
            .api()
            .texture_image(handle.raw(), self.target, level, format, extent, data);
        match previous {
            BindingState::Bound(other) if other != handle => {
                ctx.activate(Some(other), unit0)?;
            }
            BindingState::Null => {
                ctx.activate(None, unit0)?;
            }
            _ => {}
        }
        result?;
        self.props.sync_after_alloc(level, format);
        trace!(%handle, level, ?format, ?extent, "texture_allocate");
        Ok(())
    }

    /// Replaces a region of a mip level with `data` (tightly packed texels of the level format).
    pub fn upload(&self, level: u32, offset: Extent3d, extent: Extent3d, data: &[u8]) -> GlResult<()> {
        let handle = self.obj.handle()?;
        let format = self.props.format(level).ok_or(UsageError::NotAllocated(handle))?;
        let size = self.extent(level)?;
        if !size.contains_region(offset, extent) || extent.byte_len(format) != Some(data.len()) {
            return Err(UsageError::OutOfBounds {
                offset: offset.byte_len(format).unwrap_or(usize::MAX),
                len: data.len(),
                size: size.byte_len(format).unwrap_or(usize::MAX),
            }
            .into());
        }
        self.obj
            .context()
            .api()
            .texture_sub_image(handle.raw(), level, offset, extent, format, data)?;
        Ok(())
    }

    /// Internal format of a level, `None` if the level was never allocated through this object.
    pub fn format(&self, level: u32) -> Option<InternalFormat> {
        self.props.format(level)
    }

    /// Extent of a level. Queried from the API on first access, then cached until the level is
    /// reallocated.
    pub fn extent(&self, level: u32) -> GlResult<Extent3d> {
        let handle = self.obj.handle()?;
        let api = self.obj.context().api();
        let extent = self.props.extent_or_query(level, || -> GlResult<Extent3d> {
            trace!(%handle, level, "texture_query_extent");
            Ok(Extent3d {
                width: api.texture_level_parameter(handle.raw(), level, TextureLevelParam::Width)?,
                height: api.texture_level_parameter(handle.raw(), level, TextureLevelParam::Height)?,
                depth: api.texture_level_parameter(handle.raw(), level, TextureLevelParam::Depth)?,
            })
        })?;
        Ok(extent)
    }

    pub fn width(&self, level: u32) -> GlResult<u32> {
        Ok(self.extent(level)?.width)
    }

    pub fn height(&self, level: u32) -> GlResult<u32> {
        Ok(self.extent(level)?.height)
    }

    pub fn depth(&self, level: u32) -> GlResult<u32> {
        Ok(self.extent(level)?.depth)
    }

    pub fn dispose(&mut self) -> bool {
        self.obj.dispose()
    }
}
