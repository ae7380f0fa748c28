mod common;

use artifice_gl::api::Call;
use artifice_gl::{
    Attachment, AttachmentInfo, Error, Extent3d, Framebuffer, FramebufferStatus, FramebufferTarget,
    InternalFormat, Texture, TextureTarget, Viewport,
};
use common::Fixture;

fn color_texture(fx: &Fixture, width: u32, height: u32) -> Texture {
    let tex = Texture::new(&fx.ctx, TextureTarget::Tex2D).unwrap();
    tex.allocate(0, InternalFormat::Rgba8, Extent3d::new_2d(width, height), None)
        .unwrap();
    tex
}

#[test]
fn viewport_is_applied_on_every_bind() {
    let fx = Fixture::new();
    let mut fb = Framebuffer::new(&fx.ctx).unwrap();
    let viewport = Viewport::new(0, 0, 640, 480);
    fb.set_viewport(viewport);
    fx.api.clear_calls();

    assert!(fb.bind(FramebufferTarget::Draw).unwrap());
    assert!(!fb.bind(FramebufferTarget::Draw).unwrap());

    let viewports = fx
        .api
        .calls()
        .iter()
        .filter(|c| **c == Call::Viewport(viewport))
        .count();
    assert_eq!(viewports, 2);
    assert_eq!(fx.api.activation_count(), 1);
    assert_eq!(fx.api.last_viewport(), Some(viewport));
}

#[test]
fn attachments_are_tracked() {
    let fx = Fixture::new();
    let mut fb = Framebuffer::new(&fx.ctx).unwrap();
    let tex = color_texture(&fx, 16, 16);

    assert_eq!(fb.attachment(Attachment::Color(0)), AttachmentInfo::None);
    fb.attach_texture(Attachment::Color(0), &tex, 0, None).unwrap();
    assert_eq!(
        fb.attachment(Attachment::Color(0)),
        AttachmentInfo::Texture {
            texture: tex.handle().unwrap(),
            level: 0,
            layer: None,
        }
    );
    assert_eq!(fb.attachment(Attachment::Depth), AttachmentInfo::None);

    fb.detach(Attachment::Color(0)).unwrap();
    assert_eq!(fb.attachment(Attachment::Color(0)), AttachmentInfo::None);
}

#[test]
fn completeness() {
    let fx = Fixture::new();
    let mut fb = Framebuffer::new(&fx.ctx).unwrap();
    assert_eq!(fb.status().unwrap(), FramebufferStatus::MissingAttachment);
    match fb.check_status().unwrap_err() {
        Error::FramebufferIncomplete(status) => {
            assert_eq!(status, FramebufferStatus::MissingAttachment)
        }
        other => panic!("unexpected error: {}", other),
    }

    let color = color_texture(&fx, 32, 32);
    fb.attach_texture(Attachment::Color(0), &color, 0, None).unwrap();
    fb.check_status().unwrap();

    // draw buffer without an attachment
    fb.set_draw_buffers(&[Attachment::Color(0), Attachment::Color(1)])
        .unwrap();
    assert_eq!(fb.status().unwrap(), FramebufferStatus::IncompleteDrawBuffer);
    fb.set_draw_buffers(&[Attachment::Color(0)]).unwrap();
    assert_eq!(fb.properties().draw_buffers(), &[Attachment::Color(0)]);
    fb.check_status().unwrap();

    // attachment with no storage at that level
    fb.attach_texture(Attachment::Color(1), &color, 3, None).unwrap();
    assert_eq!(fb.status().unwrap(), FramebufferStatus::IncompleteAttachment);
}

#[test]
fn default_size_completes_an_empty_framebuffer() {
    let fx = Fixture::new();
    let mut fb = Framebuffer::new(&fx.ctx).unwrap();
    assert_eq!(fb.default_size(), None);
    fb.set_default_size(256, 128, 4).unwrap();
    let size = fb.default_size().unwrap();
    assert_eq!((size.width, size.height, size.samples), (256, 128, 4));
    fb.check_status().unwrap();
}

#[test]
fn layered_attachment() {
    let fx = Fixture::new();
    let mut fb = Framebuffer::new(&fx.ctx).unwrap();
    let array = Texture::new(&fx.ctx, TextureTarget::Tex2DArray).unwrap();
    array
        .allocate(0, InternalFormat::R32F, Extent3d::new(8, 8, 4), None)
        .unwrap();
    fb.attach_texture(Attachment::Color(0), &array, 0, Some(2)).unwrap();

    let fb_id = fb.handle().unwrap().id();
    let attached = fx.api.calls().into_iter().any(|c| {
        c == Call::FramebufferTexture {
            framebuffer: fb_id,
            attachment: Attachment::Color(0),
            texture: Some(array.handle().unwrap().id()),
            level: 0,
            layer: Some(2),
        }
    });
    assert!(attached);
    assert_eq!(fb.status().unwrap(), FramebufferStatus::Complete);
}

#[test]
fn default_framebuffer_binding() {
    let fx = Fixture::new();
    let fb = Framebuffer::new(&fx.ctx).unwrap();
    fb.bind(FramebufferTarget::Both).unwrap();
    assert!(fx.ctx.bind_default_framebuffer(FramebufferTarget::Both).unwrap());
    assert!(!fb.object().is_bound(artifice_gl::BindingTarget::framebuffer(FramebufferTarget::Draw)));
    assert!(!fx.ctx.bind_default_framebuffer(FramebufferTarget::Both).unwrap());
}
