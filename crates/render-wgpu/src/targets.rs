use crate::error::StartupError;

/// Format of the offscreen sample and the accumulation history.
pub const ACCUM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

const REQUIRED_USAGES: wgpu::TextureUsages =
    wgpu::TextureUsages::RENDER_ATTACHMENT.union(wgpu::TextureUsages::TEXTURE_BINDING);

/// Verify the adapter can render to and filter the accumulation format.
pub fn check_completeness(adapter: &wgpu::Adapter) -> Result<(), StartupError> {
    check_features(ACCUM_FORMAT, adapter.get_texture_format_features(ACCUM_FORMAT))
}

fn check_features(
    format: wgpu::TextureFormat,
    features: wgpu::TextureFormatFeatures,
) -> Result<(), StartupError> {
    let mut missing = Vec::new();
    let absent = REQUIRED_USAGES.difference(features.allowed_usages);
    if !absent.is_empty() {
        missing.push(format!("usages {absent:?}"));
    }
    if !features
        .flags
        .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
    {
        missing.push("linear filtering".to_string());
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StartupError::TargetIncomplete {
            format,
            missing: missing.join(", "),
        })
    }
}

/// The offscreen sample plus a ping-pong pair of history textures.
///
/// The direct pass writes `sample`. The composite pass reads `sample` and
/// the current history, and writes the other history texture, so no texture
/// is read and written by the same pass.
pub struct OffscreenTargets {
    pub width: u32,
    pub height: u32,
    pub sample: wgpu::TextureView,
    history: [wgpu::TextureView; 2],
    current: usize,
}

impl OffscreenTargets {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            sample: create_target(device, "accum_sample", width, height),
            history: [
                create_target(device, "accum_history_a", width, height),
                create_target(device, "accum_history_b", width, height),
            ],
            current: 0,
        }
    }

    /// Index of the history texture holding the latest average.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn history(&self, index: usize) -> &wgpu::TextureView {
        &self.history[index]
    }

    /// The history texture the next composite pass writes.
    pub fn next_history(&self) -> &wgpu::TextureView {
        &self.history[1 - self.current]
    }

    /// Make the texture just written the current average.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }
}

fn create_target(device: &wgpu::Device, label: &str, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: ACCUM_FORMAT,
        usage: REQUIRED_USAGES,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(
        allowed_usages: wgpu::TextureUsages,
        flags: wgpu::TextureFormatFeatureFlags,
    ) -> wgpu::TextureFormatFeatures {
        wgpu::TextureFormatFeatures {
            allowed_usages,
            flags,
        }
    }

    #[test]
    fn renderable_filterable_format_is_complete() {
        let f = features(
            wgpu::TextureUsages::all(),
            wgpu::TextureFormatFeatureFlags::FILTERABLE,
        );
        assert!(check_features(ACCUM_FORMAT, f).is_ok());
    }

    #[test]
    fn unfilterable_format_is_incomplete() {
        let f = features(
            wgpu::TextureUsages::all(),
            wgpu::TextureFormatFeatureFlags::empty(),
        );
        let err = check_features(ACCUM_FORMAT, f).unwrap_err();
        assert!(err.to_string().contains("linear filtering"));
    }

    #[test]
    fn non_renderable_format_is_incomplete() {
        let f = features(
            wgpu::TextureUsages::TEXTURE_BINDING,
            wgpu::TextureFormatFeatureFlags::FILTERABLE,
        );
        let err = check_features(ACCUM_FORMAT, f).unwrap_err();
        assert!(matches!(err, StartupError::TargetIncomplete { .. }));
        assert!(err.to_string().contains("RENDER_ATTACHMENT"));
    }
}
