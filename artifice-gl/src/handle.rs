use crate::{
    api::{ApiError, GlApi},
    binding::{BindingTarget, TargetCategory},
    context::Context,
    error::{GlResult, UsageError},
};
use std::{fmt, num::NonZeroU32};
use tracing::debug;

/// Kind of object a handle refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectKind {
    Buffer,
    Texture,
    Framebuffer,
    Shader,
    Program,
    VertexArray,
}

impl ObjectKind {
    /// Whether objects of this kind can be activated on targets of the given category.
    pub fn supports(self, category: &TargetCategory) -> bool {
        match (self, category) {
            (ObjectKind::Buffer, TargetCategory::Buffer(_)) => true,
            (ObjectKind::Texture, TargetCategory::Texture(_)) => true,
            (ObjectKind::Framebuffer, TargetCategory::Framebuffer(_)) => true,
            (ObjectKind::Program, TargetCategory::Program) => true,
            (ObjectKind::VertexArray, TargetCategory::VertexArray) => true,
            // shaders are never bound, only attached to programs
            _ => false,
        }
    }
}

/// Opaque identifier of an object in the underlying API, tagged with its kind.
///
/// Handles are plain values: copying one does not extend the lifetime of the object.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle {
    id: NonZeroU32,
    kind: ObjectKind,
}

impl Handle {
    pub(crate) fn new(kind: ObjectKind, id: NonZeroU32) -> Handle {
        Handle { id, kind }
    }

    /// The raw object name.
    pub fn id(&self) -> u32 {
        self.id.get()
    }

    pub fn raw(&self) -> NonZeroU32 {
        self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.id)
    }
}

/// An object owned by a context.
///
/// This is the lifecycle shared by every resource kind: the object is allocated through
/// the API on creation, binds through the context's binding table, and is released exactly
/// once, either by an explicit `dispose` or on drop.
pub struct ContextObject {
    ctx: Context,
    handle: Handle,
    disposed: bool,
}

impl ContextObject {
    /// Allocates a new object of the given kind. `create` issues the kind-specific creation call.
    pub(crate) fn create(
        ctx: &Context,
        kind: ObjectKind,
        create: impl FnOnce(&dyn GlApi) -> Result<u32, ApiError>,
    ) -> GlResult<ContextObject> {
        let raw = create(ctx.api())?;
        let id = NonZeroU32::new(raw).ok_or(ApiError::CreationFailed(kind))?;
        let handle = Handle::new(kind, id);
        debug!(%handle, "create_object");
        Ok(ContextObject {
            ctx: ctx.clone(),
            handle,
            disposed: false,
        })
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Returns the handle, or a usage error if the object was disposed.
    pub fn handle(&self) -> Result<Handle, UsageError> {
        if self.disposed {
            Err(UsageError::Disposed(self.handle))
        } else {
            Ok(self.handle)
        }
    }

    /// Returns the handle even if the object was disposed. Only useful for diagnostics.
    pub fn last_handle(&self) -> Handle {
        self.handle
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Makes this object current on `target`. Skipped if the context already has it bound there.
    pub fn bind(&self, target: BindingTarget) -> GlResult<bool> {
        let handle = self.handle()?;
        self.ctx.activate(Some(handle), target)
    }

    /// Detaches this object from `target`, if it is the one currently bound there.
    pub fn unbind(&self, target: BindingTarget) -> GlResult<bool> {
        let handle = self.handle()?;
        self.ctx.unbind(handle, target)
    }

    pub fn is_bound(&self, target: BindingTarget) -> bool {
        !self.disposed && self.ctx.is_bound(self.handle, target)
    }

    /// Releases the underlying object. Returns `false` if it was already released.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        debug!(handle = %self.handle, "dispose_object");
        self.ctx.forget(self.handle);
        self.ctx.api().delete(self.handle.kind, self.handle.id.get());
        true
    }
}

impl Drop for ContextObject {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ContextObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextObject")
            .field("handle", &self.handle)
            .field("disposed", &self.disposed)
            .finish()
    }
}
