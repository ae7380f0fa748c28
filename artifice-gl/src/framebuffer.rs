use crate::{
    binding::{BindingTarget, FramebufferTarget},
    context::Context,
    error::{Error, GlResult, UsageError},
    handle::{ContextObject, Handle, ObjectKind},
    property::{CachedProperties, Origin},
    texture::Texture,
};
use std::collections::BTreeMap;
use tracing::trace;

/// Framebuffer attachment points.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum Attachment {
    Color(u32),
    Depth,
    Stencil,
    DepthStencil,
}

/// What is attached to an attachment point.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AttachmentInfo {
    None,
    Texture {
        texture: Handle,
        level: u32,
        /// Attached layer, or `None` if the whole level is attached (layered rendering).
        layer: Option<u32>,
    },
}

impl Default for AttachmentInfo {
    fn default() -> Self {
        AttachmentInfo::None
    }
}

/// Completeness status of a framebuffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FramebufferStatus {
    Complete,
    Undefined,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDrawBuffer,
    IncompleteReadBuffer,
    Unsupported,
    IncompleteMultisample,
    IncompleteLayerTargets,
    Other(u32),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Viewport {
        Viewport {
            x,
            y,
            width,
            height,
        }
    }
}

/// Size of a framebuffer with no attachments.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DefaultSize {
    pub width: u32,
    pub height: u32,
    pub samples: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FramebufferProperty {
    Attachment(Attachment),
    DrawBuffers,
    DefaultSize,
    Viewport,
}

/// Cached state of a framebuffer. Everything is written by this crate.
#[derive(Debug, Default)]
pub struct FramebufferProperties {
    attachments: BTreeMap<Attachment, AttachmentInfo>,
    draw_buffers: Vec<Attachment>,
    default_size: Option<DefaultSize>,
    viewport: Option<Viewport>,
}

impl FramebufferProperties {
    /// The attachment at `point`, `AttachmentInfo::None` if nothing was ever attached there.
    pub fn attachment(&self, point: Attachment) -> AttachmentInfo {
        self.attachments.get(&point).copied().unwrap_or_default()
    }

    pub fn attachments(&self) -> impl Iterator<Item = (Attachment, AttachmentInfo)> + '_ {
        self.attachments.iter().map(|(k, v)| (*k, *v))
    }

    pub fn draw_buffers(&self) -> &[Attachment] {
        &self.draw_buffers
    }

    pub fn default_size(&self) -> Option<DefaultSize> {
        self.default_size
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }
}

impl CachedProperties for FramebufferProperties {
    type Key = FramebufferProperty;

    fn origin(&self, _key: FramebufferProperty) -> Origin {
        Origin::Authoritative
    }

    // nothing here can go stale behind our back
    fn invalidate(&self, _key: FramebufferProperty) {}
}

/// A framebuffer object.
#[derive(Debug)]
pub struct Framebuffer {
    obj: ContextObject,
    props: FramebufferProperties,
}

impl Framebuffer {
    pub fn new(ctx: &Context) -> GlResult<Framebuffer> {
        let obj = ContextObject::create(ctx, ObjectKind::Framebuffer, |api| {
            api.create(ObjectKind::Framebuffer)
        })?;
        Ok(Framebuffer {
            obj,
            props: FramebufferProperties::default(),
        })
    }

    pub fn handle(&self) -> Result<Handle, UsageError> {
        self.obj.handle()
    }

    pub fn object(&self) -> &ContextObject {
        &self.obj
    }

    pub fn properties(&self) -> &FramebufferProperties {
        &self.props
    }

    /// Binds the framebuffer, then applies its viewport (if one was set). The viewport is
    /// applied even if the framebuffer was already bound.
    pub fn bind(&self, target: FramebufferTarget) -> GlResult<bool> {
        let changed = self.obj.bind(BindingTarget::framebuffer(target))?;
        if let Some(viewport) = self.props.viewport {
            self.obj.context().api().viewport(viewport)?;
        }
        Ok(changed)
    }

    pub fn unbind(&self, target: FramebufferTarget) -> GlResult<bool> {
        self.obj.unbind(BindingTarget::framebuffer(target))
    }

    /// Sets the viewport applied on every `bind`.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.props.viewport = Some(viewport);
    }

    /// Attaches a level of `texture`, or a single layer of it.
    pub fn attach_texture(
        &mut self,
        point: Attachment,
        texture: &Texture,
        level: u32,
        layer: Option<u32>,
    ) -> GlResult<()> {
        let handle = self.obj.handle()?;
        let texture = texture.handle()?;
        self.obj.context().api().framebuffer_texture(
            handle.raw(),
            point,
            Some(texture.raw()),
            level,
            layer,
        )?;
        trace!(%handle, ?point, %texture, level, ?layer, "framebuffer_attach");
        self.props.attachments.insert(
            point,
            AttachmentInfo::Texture {
                texture,
                level,
                layer,
            },
        );
        Ok(())
    }

    pub fn detach(&mut self, point: Attachment) -> GlResult<()> {
        let handle = self.obj.handle()?;
        self.obj
            .context()
            .api()
            .framebuffer_texture(handle.raw(), point, None, 0, None)?;
        self.props.attachments.remove(&point);
        Ok(())
    }

    pub fn attachment(&self, point: Attachment) -> AttachmentInfo {
        self.props.attachment(point)
    }

    pub fn set_draw_buffers(&mut self, points: &[Attachment]) -> GlResult<()> {
        let handle = self.obj.handle()?;
        self.obj
            .context()
            .api()
            .framebuffer_draw_buffers(handle.raw(), points)?;
        self.props.draw_buffers = points.to_vec();
        Ok(())
    }

    /// Sets the size used when the framebuffer has no attachments.
    pub fn set_default_size(&mut self, width: u32, height: u32, samples: u32) -> GlResult<()> {
        let handle = self.obj.handle()?;
        self.obj
            .context()
            .api()
            .framebuffer_default_size(handle.raw(), width, height, samples)?;
        self.props.default_size = Some(DefaultSize {
            width,
            height,
            samples,
        });
        Ok(())
    }

    pub fn default_size(&self) -> Option<DefaultSize> {
        self.props.default_size
    }

    /// Queries the completeness status.
    pub fn status(&self) -> GlResult<FramebufferStatus> {
        let handle = self.obj.handle()?;
        Ok(self
            .obj
            .context()
            .api()
            .framebuffer_status(handle.raw(), FramebufferTarget::Draw)?)
    }

    /// Fails with `Error::FramebufferIncomplete` unless the framebuffer is complete.
    pub fn check_status(&self) -> GlResult<()> {
        match self.status()? {
            FramebufferStatus::Complete => Ok(()),
            status => Err(Error::FramebufferIncomplete(status)),
        }
    }

    pub fn dispose(&mut self) -> bool {
        self.obj.dispose()
    }
}
