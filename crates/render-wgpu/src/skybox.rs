use std::path::Path;

use wgpu::util::DeviceExt;

use crate::error::StartupError;

/// An equirectangular environment image in RGBA8.
///
/// Texels are stored as authored; the tracing program applies the scene's
/// sky gamma and strength when sampling.
#[derive(Debug, Clone)]
pub struct SkyImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SkyImage {
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let image = image::open(path)
            .map_err(|source| StartupError::Skybox {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();
        tracing::info!("loaded skybox {} ({width}x{height})", path.display());
        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
        })
    }

    /// Horizon-to-zenith gradient over a darker ground.
    pub fn procedural(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(2);
        let zenith = [0.32, 0.52, 0.86];
        let horizon = [0.86, 0.9, 0.95];
        let ground = [0.3, 0.28, 0.26];
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            // 0 at the zenith, 1 at the nadir
            let v = y as f32 / (height - 1) as f32;
            let color = if v < 0.5 {
                lerp(zenith, horizon, (v * 2.0).powf(2.0))
            } else {
                lerp(horizon, ground, ((v - 0.5) * 8.0).min(1.0))
            };
            let texel = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            for _ in 0..width {
                pixels.extend_from_slice(&[texel[0], texel[1], texel[2], 255]);
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Load `path` if given, falling back to the procedural sky.
    pub fn load_or_procedural(path: Option<&Path>) -> Result<Self, StartupError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::procedural(256, 128)),
        }
    }

    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("skybox"),
                size: wgpu::Extent3d {
                    width: self.width,
                    height: self.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &self.pixels,
        );
        texture.create_view(&Default::default())
    }
}

fn lerp(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedural_has_full_rgba_buffer() {
        let sky = SkyImage::procedural(8, 4);
        assert_eq!(sky.pixels.len(), 8 * 4 * 4);
        assert!(sky.pixels.chunks(4).all(|p| p[3] == 255));
    }

    #[test]
    fn procedural_zenith_is_bluer_than_ground() {
        let sky = SkyImage::procedural(1, 16);
        let top = &sky.pixels[0..4];
        let bottom = &sky.pixels[sky.pixels.len() - 4..];
        assert!(top[2] > top[0]);
        assert!(bottom[2] <= bottom[0]);
    }

    #[test]
    fn load_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let sky = SkyImage::load(&path).unwrap();
        assert_eq!((sky.width, sky.height), (4, 2));
        assert_eq!(&sky.pixels[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_startup_error() {
        let err = SkyImage::load(Path::new("/nonexistent/sky.png")).unwrap_err();
        assert!(matches!(err, StartupError::Skybox { .. }));
    }

    #[test]
    fn no_path_falls_back_to_procedural() {
        let sky = SkyImage::load_or_procedural(None).unwrap();
        assert_eq!((sky.width, sky.height), (256, 128));
    }
}
