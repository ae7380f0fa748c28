mod common;

use artifice_gl::{
    ApiError, BindingState, BindingTarget, Buffer, BufferTarget, ContextConfig, Error, Framebuffer,
    FramebufferTarget, Texture, TextureTarget, UsageError, VertexArray,
};
use common::Fixture;

const ARRAY: BindingTarget = BindingTarget::buffer(BufferTarget::Array);

#[test]
fn redundant_bind_is_elided() {
    let fx = Fixture::new();
    let buffer = Buffer::new(&fx.ctx, BufferTarget::Array).unwrap();
    fx.api.clear_calls();

    assert!(buffer.bind().unwrap());
    assert!(!buffer.bind().unwrap());

    assert_eq!(fx.api.activation_count(), 1);
    assert_eq!(fx.ctx.currently_bound(ARRAY), Some(buffer.handle().unwrap()));
    let stats = fx.ctx.binding_stats();
    assert_eq!(stats.issued, 1);
    assert_eq!(stats.elided, 1);
}

#[test]
fn last_activation_wins() {
    let fx = Fixture::new();
    let x = Texture::new(&fx.ctx, TextureTarget::Tex2D).unwrap();
    let y = Texture::new(&fx.ctx, TextureTarget::Tex2D).unwrap();
    fx.api.clear_calls();

    x.bind(0).unwrap();
    y.bind(0).unwrap();

    let unit0 = BindingTarget::texture(TextureTarget::Tex2D, 0);
    assert_eq!(fx.ctx.currently_bound(unit0), Some(y.handle().unwrap()));
    assert!(!fx.ctx.is_bound(x.handle().unwrap(), unit0));
    assert_eq!(fx.api.activation_count(), 2);
    assert_eq!(fx.api.bound(unit0), Some(y.handle().unwrap().id()));
}

#[test]
fn units_are_separate_binding_points() {
    let fx = Fixture::new();
    let tex = Texture::new(&fx.ctx, TextureTarget::Tex2D).unwrap();
    assert!(tex.bind(0).unwrap());
    assert!(tex.bind(3).unwrap());
    assert!(!tex.bind(0).unwrap());
    assert!(fx
        .ctx
        .is_bound(tex.handle().unwrap(), BindingTarget::texture(TextureTarget::Tex2D, 3)));
}

#[test]
fn unbind_only_detaches_the_current_object() {
    let fx = Fixture::new();
    let a = Buffer::new(&fx.ctx, BufferTarget::Array).unwrap();
    let b = Buffer::new(&fx.ctx, BufferTarget::Array).unwrap();
    b.bind().unwrap();
    fx.api.clear_calls();

    assert!(!a.unbind().unwrap());
    assert_eq!(fx.api.activation_count(), 0);
    assert_eq!(fx.ctx.currently_bound(ARRAY), Some(b.handle().unwrap()));

    assert!(b.unbind().unwrap());
    assert_eq!(fx.ctx.binding(ARRAY), BindingState::Null);
    assert_eq!(fx.api.bound(ARRAY), None);
    // detaching again is a cache hit
    assert!(!fx.ctx.activate(None, ARRAY).unwrap());
}

#[test]
fn failed_activation_leaves_the_cache_untouched() {
    let fx = Fixture::new();
    let buffer = Buffer::new(&fx.ctx, BufferTarget::Array).unwrap();

    fx.api.fail_next(ApiError::InvalidOperation);
    let err = buffer.bind().unwrap_err();
    assert!(matches!(err, Error::Api(ApiError::InvalidOperation)));
    assert_eq!(fx.ctx.binding(ARRAY), BindingState::Unknown);

    // not retried, and the next attempt goes through
    assert!(buffer.bind().unwrap());
    assert!(buffer.object().is_bound(ARRAY));
}

#[test]
fn bindings_are_validated_before_reaching_the_api() {
    let fx = Fixture::with_config(ContextConfig::new().max_texture_units(4));
    let tex = Texture::new(&fx.ctx, TextureTarget::Tex2D).unwrap();
    let buffer = Buffer::new(&fx.ctx, BufferTarget::Uniform).unwrap();
    fx.api.clear_calls();

    let err = tex.bind(4).unwrap_err();
    assert_eq!(
        err.usage(),
        Some(&UsageError::SlotOutOfRange {
            target: BindingTarget::texture(TextureTarget::Tex2D, 4),
            index: 4,
            limit: 4,
        })
    );

    let err = buffer.bind_indexed(BufferTarget::Array, 0).unwrap_err();
    assert_eq!(err.usage(), Some(&UsageError::NotIndexable(BufferTarget::Array)));

    let err = buffer.bind_indexed(BufferTarget::Uniform, 36).unwrap_err();
    assert!(matches!(err.usage(), Some(UsageError::SlotOutOfRange { limit: 36, .. })));

    let err = fx.ctx.activate(Some(tex.handle().unwrap()), ARRAY).unwrap_err();
    assert!(matches!(err.usage(), Some(UsageError::UnsupportedTarget { .. })));

    let err = tex.bind_to(TextureTarget::Tex3D, 0).unwrap_err();
    assert_eq!(
        err.usage(),
        Some(&UsageError::TextureTargetMismatch {
            expected: TextureTarget::Tex2D,
            actual: TextureTarget::Tex3D,
        })
    );

    assert_eq!(fx.api.activation_count(), 0);
}

#[test]
fn indexed_binding_replaces_the_generic_binding() {
    let fx = Fixture::new();
    let buffer = Buffer::new(&fx.ctx, BufferTarget::Uniform).unwrap();
    assert!(buffer.bind_indexed(BufferTarget::Uniform, 2).unwrap());
    assert!(!buffer.bind().unwrap());
    assert!(!buffer.bind_indexed(BufferTarget::Uniform, 2).unwrap());
    assert!(buffer.bind_indexed(BufferTarget::Uniform, 3).unwrap());
}

#[test]
fn framebuffer_both_covers_draw_and_read() {
    let fx = Fixture::new();
    let fb = Framebuffer::new(&fx.ctx).unwrap();
    assert!(fb.bind(FramebufferTarget::Both).unwrap());
    assert!(!fb.bind(FramebufferTarget::Draw).unwrap());
    assert!(!fb.bind(FramebufferTarget::Read).unwrap());
    assert!(!fb.bind(FramebufferTarget::Both).unwrap());

    assert!(fx.ctx.bind_default_framebuffer(FramebufferTarget::Read).unwrap());
    assert_eq!(
        fx.ctx.binding(BindingTarget::framebuffer(FramebufferTarget::Read)),
        BindingState::Null
    );
    // Draw still holds the framebuffer, Read does not
    assert!(fb.bind(FramebufferTarget::Both).unwrap());
}

#[test]
fn binding_a_vertex_array_forgets_the_element_buffer() {
    let fx = Fixture::new();
    let ibo = Buffer::new(&fx.ctx, BufferTarget::ElementArray).unwrap();
    let vao = VertexArray::new(&fx.ctx).unwrap();
    let element_array = BindingTarget::buffer(BufferTarget::ElementArray);

    ibo.bind().unwrap();
    assert!(fx.ctx.is_bound(ibo.handle().unwrap(), element_array));
    vao.bind().unwrap();
    assert_eq!(fx.ctx.binding(element_array), BindingState::Unknown);
    assert!(ibo.bind().unwrap());
}

#[test]
fn disposing_the_current_vertex_array_forgets_the_element_buffer() {
    let fx = Fixture::new();
    let ibo = Buffer::new(&fx.ctx, BufferTarget::ElementArray).unwrap();
    let mut vao = VertexArray::new(&fx.ctx).unwrap();
    let element_array = BindingTarget::buffer(BufferTarget::ElementArray);

    vao.bind().unwrap();
    ibo.bind().unwrap();
    assert!(vao.dispose());
    assert_eq!(fx.api.bound(element_array), None);
    assert_eq!(fx.ctx.binding(element_array), BindingState::Unknown);

    assert!(ibo.bind().unwrap());
    assert_eq!(fx.api.bound(element_array), Some(ibo.handle().unwrap().id()));
}

#[test]
fn invalidation_forces_the_next_activation() {
    let fx = Fixture::new();
    let buffer = Buffer::new(&fx.ctx, BufferTarget::Array).unwrap();
    buffer.bind().unwrap();
    fx.ctx.invalidate_bindings();
    assert_eq!(fx.ctx.binding(ARRAY), BindingState::Unknown);
    assert!(fx.ctx.bindings_snapshot().is_empty());
    assert!(buffer.bind().unwrap());
}

#[test]
fn elision_can_be_disabled() {
    let fx = Fixture::with_config(ContextConfig::new().elide_redundant_binds(false));
    let buffer = Buffer::new(&fx.ctx, BufferTarget::Array).unwrap();
    fx.api.clear_calls();

    assert!(buffer.bind().unwrap());
    assert!(buffer.bind().unwrap());
    assert_eq!(fx.api.activation_count(), 2);
    assert_eq!(fx.ctx.currently_bound(ARRAY), Some(buffer.handle().unwrap()));
    assert_eq!(fx.ctx.binding_stats().elided, 0);
}
