use crate::{
    binding::{BindingTarget, BufferTarget},
    buffer::Buffer,
    context::Context,
    error::{GlResult, UsageError},
    handle::{ContextObject, Handle, ObjectKind},
};

/// A vertex array object.
///
/// The element array binding is part of the vertex array state: binding a vertex array changes
/// which buffer is current on `BufferTarget::ElementArray`.
#[derive(Debug)]
pub struct VertexArray {
    obj: ContextObject,
    element_buffer: Option<Handle>,
}

impl VertexArray {
    pub fn new(ctx: &Context) -> GlResult<VertexArray> {
        let obj = ContextObject::create(ctx, ObjectKind::VertexArray, |api| {
            api.create(ObjectKind::VertexArray)
        })?;
        Ok(VertexArray {
            obj,
            element_buffer: None,
        })
    }

    pub fn handle(&self) -> Result<Handle, UsageError> {
        self.obj.handle()
    }

    pub fn object(&self) -> &ContextObject {
        &self.obj
    }

    pub fn bind(&self) -> GlResult<bool> {
        self.obj.bind(BindingTarget::VERTEX_ARRAY)
    }

    pub fn unbind(&self) -> GlResult<bool> {
        self.obj.unbind(BindingTarget::VERTEX_ARRAY)
    }

    /// Sets (or clears) the index buffer of this vertex array.
    pub fn set_element_buffer(&mut self, buffer: Option<&Buffer>) -> GlResult<()> {
        let handle = self.obj.handle()?;
        let buffer = buffer.map(|b| b.handle()).transpose()?;
        let ctx = self.obj.context();
        ctx.api()
            .vertex_array_element_buffer(handle.raw(), buffer.map(|b| b.raw()))?;
        if ctx.is_bound(handle, BindingTarget::VERTEX_ARRAY) {
            ctx.invalidate_binding(BindingTarget::buffer(BufferTarget::ElementArray));
        }
        self.element_buffer = buffer;
        Ok(())
    }

    /// The index buffer last set through `set_element_buffer`.
    pub fn element_buffer(&self) -> Option<Handle> {
        self.element_buffer
    }

    pub fn dispose(&mut self) -> bool {
        self.obj.dispose()
    }
}
