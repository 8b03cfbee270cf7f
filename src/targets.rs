//! Per-camera intermediate render targets.
//!
//! When a camera renders scaled, with HDR, with post FX or with color/depth
//! sampling, the scene draws into pooled intermediate attachments instead of
//! the camera target. Optional snapshot copies of both attachments are taken
//! mid-frame for transparents that sample the scene; when a copy is not
//! requested, a 1x1 placeholder is bound in its place so shaders never
//! sample missing state.

use glam::Vec4;

use crate::postfx::{HDR_FORMAT, LDR_FORMAT};
use crate::rt_pool::{PooledRt, RtDesc, RtPool};

/// Depth format of camera depth attachments.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// What a frame's intermediate attachments should look like.
#[derive(Debug, Clone, Copy)]
pub struct CameraTargetsDesc {
    /// Working resolution.
    pub buffer_size: (u32, u32),
    /// HDR color attachment.
    pub use_hdr: bool,
    /// Keep a sampleable color snapshot.
    pub copy_color: bool,
    /// Keep a sampleable depth snapshot.
    pub copy_depth: bool,
}

/// Pooled color/depth attachments for one camera frame.
pub struct CameraTargets {
    color: PooledRt,
    depth: PooledRt,
    color_copy: Option<PooledRt>,
    depth_copy: Option<PooledRt>,
    buffer_size: (u32, u32),
}

impl CameraTargets {
    /// Acquire attachments (and copy textures when requested) from the pool.
    pub fn acquire(device: &wgpu::Device, pool: &mut RtPool, desc: CameraTargetsDesc) -> Self {
        let (width, height) = desc.buffer_size;
        let color_format = if desc.use_hdr { HDR_FORMAT } else { LDR_FORMAT };
        Self {
            color: pool.acquire(device, RtDesc::new(width, height, color_format)),
            depth: pool.acquire(device, RtDesc::new(width, height, DEPTH_FORMAT)),
            color_copy: desc
                .copy_color
                .then(|| pool.acquire(device, RtDesc::new(width, height, color_format))),
            depth_copy: desc
                .copy_depth
                .then(|| pool.acquire(device, RtDesc::new(width, height, DEPTH_FORMAT))),
            buffer_size: desc.buffer_size,
        }
    }

    /// Color attachment view.
    #[inline]
    pub fn color_view(&self) -> &wgpu::TextureView {
        self.color.view()
    }

    /// Depth attachment view.
    #[inline]
    pub fn depth_view(&self) -> &wgpu::TextureView {
        self.depth.view()
    }

    /// Snapshot the attachments into their copy textures.
    ///
    /// Record this between the opaque and transparent passes; the copies
    /// hold whatever has rendered so far.
    pub fn copy_attachments(&self, encoder: &mut wgpu::CommandEncoder) {
        let extent = wgpu::Extent3d {
            width: self.buffer_size.0,
            height: self.buffer_size.1,
            depth_or_array_layers: 1,
        };
        if let Some(copy) = &self.color_copy {
            encoder.copy_texture_to_texture(
                self.color.texture().as_image_copy(),
                copy.texture().as_image_copy(),
                extent,
            );
        }
        if let Some(copy) = &self.depth_copy {
            encoder.copy_texture_to_texture(
                self.depth.texture().as_image_copy(),
                copy.texture().as_image_copy(),
                extent,
            );
        }
    }

    /// Sampleable color snapshot, when requested.
    pub fn color_copy_view(&self) -> Option<&wgpu::TextureView> {
        self.color_copy.as_ref().map(|rt| rt.view())
    }

    /// Sampleable depth snapshot, when requested.
    pub fn depth_copy_view(&self) -> Option<&wgpu::TextureView> {
        self.depth_copy.as_ref().map(|rt| rt.view())
    }

    /// Working resolution.
    #[inline]
    pub fn buffer_size(&self) -> (u32, u32) {
        self.buffer_size
    }

    /// Buffer size vector `(1/w, 1/h, w, h)` for shader binding.
    pub fn buffer_size_vec(&self) -> Vec4 {
        let (width, height) = self.buffer_size;
        Vec4::new(
            1.0 / width as f32,
            1.0 / height as f32,
            width as f32,
            height as f32,
        )
    }

    /// Return every attachment to the pool.
    pub fn release(self, pool: &mut RtPool) {
        pool.release(self.color);
        pool.release(self.depth);
        if let Some(copy) = self.color_copy {
            pool.release(copy);
        }
        if let Some(copy) = self.depth_copy {
            pool.release(copy);
        }
    }
}

/// A 1x1 mid-gray texture bound wherever an optional input is missing.
pub struct PlaceholderTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl PlaceholderTexture {
    /// Create and upload the placeholder.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Missing Texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            texture.as_image_copy(),
            &[128, 128, 128, 255],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// The texture.
    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// View to bind for absent optional inputs.
    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}
