//! Pooled per-frame render targets.
//!
//! Every transient texture in the pipeline (shadow atlases, bloom pyramid
//! levels, the grading LUT, intermediate buffers) is acquired here at the
//! start of its owning stage and released on every exit path of that stage.
//! Released targets keep their GPU allocation and are handed back on the
//! next matching acquire, so steady-state frames allocate nothing.

use std::collections::HashMap;

/// Descriptor for a pooled render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RtDesc {
    /// Width in pixels, at least 1.
    pub width: u32,
    /// Height in pixels, at least 1.
    pub height: u32,
    /// Texture format.
    pub format: wgpu::TextureFormat,
}

impl RtDesc {
    /// Create a descriptor; zero dimensions are clamped to one pixel.
    pub fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            format,
        }
    }
}

/// A render target checked out of the pool.
///
/// Must be returned with [`RtPool::release`]; dropping it instead forfeits
/// the allocation (the texture itself is still freed by wgpu).
#[derive(Debug)]
pub struct PooledRt {
    desc: RtDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl PooledRt {
    /// The descriptor this target was acquired with.
    #[inline]
    pub fn desc(&self) -> RtDesc {
        self.desc
    }

    /// The underlying texture.
    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Default view over the whole texture.
    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Reuse pool for transient render targets, keyed by descriptor.
#[derive(Debug, Default)]
pub struct RtPool {
    free: HashMap<RtDesc, Vec<PooledRt>>,
    live: usize,
}

impl RtPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a target out of the pool, creating one on a miss.
    pub fn acquire(&mut self, device: &wgpu::Device, desc: RtDesc) -> PooledRt {
        self.live += 1;
        if let Some(rt) = self.free.get_mut(&desc).and_then(|list| list.pop()) {
            return rt;
        }

        log::trace!(
            "rt pool miss: {}x{} {:?}",
            desc.width,
            desc.height,
            desc.format
        );
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Pooled Render Target"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        PooledRt {
            desc,
            texture,
            view,
        }
    }

    /// Return a target to the pool for reuse.
    pub fn release(&mut self, rt: PooledRt) {
        self.live = self.live.saturating_sub(1);
        self.free.entry(rt.desc).or_default().push(rt);
    }

    /// Number of targets currently checked out.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Drop all retained free targets, e.g. after a resolution change.
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desc_clamps_zero_dimensions() {
        let desc = RtDesc::new(0, 0, wgpu::TextureFormat::Rgba16Float);
        assert_eq!((desc.width, desc.height), (1, 1));
    }

    #[test]
    fn test_desc_key_equality() {
        let a = RtDesc::new(128, 64, wgpu::TextureFormat::Rgba16Float);
        let b = RtDesc::new(128, 64, wgpu::TextureFormat::Rgba16Float);
        let c = RtDesc::new(128, 64, wgpu::TextureFormat::Depth32Float);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
