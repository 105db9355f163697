use std::path::{Path, PathBuf};

use lumen_sync::{MAX_LIGHTS, MAX_OBJECTS, ProgramId};

use crate::error::StartupError;
use crate::shaders;
use crate::targets::ACCUM_FORMAT;

pub const ENTRY_VERTEX: &str = "vs_fullscreen";
pub const ENTRY_DIRECT: &str = "fs_direct";
pub const ENTRY_COMPOSITE: &str = "fs_composite";

/// Entry points the frame protocol draws with. A program without them
/// cannot run.
pub const REQUIRED_ENTRY_POINTS: [&str; 3] = [ENTRY_VERTEX, ENTRY_DIRECT, ENTRY_COMPOSITE];

/// Resources bound by the renderer. A program that leaves one undeclared
/// still runs; the value is simply ignored.
pub const BOUND_RESOURCES: [&str; 8] = [
    "frame",
    "params",
    "objects",
    "lights",
    "skybox",
    "sky_sampler",
    "accum_sample",
    "accum_history",
];

/// Where the tracing program's WGSL comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramSource {
    Builtin,
    File(PathBuf),
}

impl ProgramSource {
    pub fn from_option(path: Option<&Path>) -> Self {
        match path {
            Some(p) => ProgramSource::File(p.to_path_buf()),
            None => ProgramSource::Builtin,
        }
    }

    pub fn label(&self) -> String {
        match self {
            ProgramSource::Builtin => "builtin tracer".into(),
            ProgramSource::File(path) => path.display().to_string(),
        }
    }

    /// Read the template text.
    pub fn read(&self) -> Result<String, StartupError> {
        match self {
            ProgramSource::Builtin => Ok(shaders::TRACER_SHADER.to_string()),
            ProgramSource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| StartupError::ShaderRead {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

/// Substitute the array capacities into a template.
pub fn expand_template(template: &str) -> String {
    template
        .replace("{{MAX_OBJECTS}}", &MAX_OBJECTS.to_string())
        .replace("{{MAX_LIGHTS}}", &MAX_LIGHTS.to_string())
}

/// Names of module-scope `var` declarations.
pub fn declared_resources(source: &str) -> Vec<&str> {
    source
        .lines()
        .filter_map(|line| {
            let line = line.split("//").next()?;
            let rest = line.split_once("var")?.1;
            // Reject identifiers that merely contain "var".
            if !rest.starts_with(['<', ' ']) {
                return None;
            }
            let rest = match rest.trim_start().strip_prefix('<') {
                Some(r) => r.split_once('>')?.1,
                None => rest,
            };
            let name = rest.split(':').next()?.trim();
            (!name.is_empty() && line.trim_start().starts_with('@')).then_some(name)
        })
        .collect()
}

fn has_entry_point(source: &str, name: &str) -> bool {
    source.lines().any(|line| {
        line.trim_start()
            .strip_prefix("fn ")
            .and_then(|rest| rest.strip_prefix(name))
            .is_some_and(|rest| rest.trim_start().starts_with('('))
    })
}

/// Check a program's text against the renderer's expectations.
///
/// Missing entry points are an error. Missing resources are returned so the
/// caller can warn about them.
pub fn check_source(label: &str, source: &str) -> Result<Vec<&'static str>, StartupError> {
    for entry_point in REQUIRED_ENTRY_POINTS {
        if !has_entry_point(source, entry_point) {
            return Err(StartupError::MissingEntryPoint {
                label: label.to_string(),
                entry_point,
            });
        }
    }
    let declared = declared_resources(source);
    Ok(BOUND_RESOURCES
        .into_iter()
        .filter(|name| !declared.contains(name))
        .collect())
}

/// A compiled tracing program: one pipeline per pass.
pub struct Program {
    pub id: ProgramId,
    pub label: String,
    pub direct: wgpu::RenderPipeline,
    pub composite: wgpu::RenderPipeline,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl Program {
    /// Load, check, and compile a program.
    pub fn compile(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        surface_format: wgpu::TextureFormat,
        source: &ProgramSource,
    ) -> Result<Self, StartupError> {
        let label = source.label();
        let wgsl = expand_template(&source.read()?);
        for name in check_source(&label, &wgsl)? {
            tracing::warn!("shader {label} does not declare `{name}`; its value will be ignored");
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label.as_str()),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });
        let direct = create_pipeline(
            device,
            layout,
            &module,
            ENTRY_DIRECT,
            &[Some(color_target(ACCUM_FORMAT))],
        );
        let composite = create_pipeline(
            device,
            layout,
            &module,
            ENTRY_COMPOSITE,
            &[Some(color_target(surface_format)), Some(color_target(ACCUM_FORMAT))],
        );
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(StartupError::ShaderCompile {
                label,
                message: err.to_string(),
            });
        }

        let id = ProgramId::next();
        tracing::info!("compiled program {} from {label}", id.0);
        Ok(Self {
            id,
            label,
            direct,
            composite,
        })
    }
}

fn color_target(format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format,
        blend: Some(wgpu::BlendState::REPLACE),
        write_mask: wgpu::ColorWrites::ALL,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    fragment_entry: &str,
    targets: &[Option<wgpu::ColorTargetState>],
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(fragment_entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(ENTRY_VERTEX),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x2],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            compilation_options: Default::default(),
            targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_passes_checks() {
        let source = expand_template(shaders::TRACER_SHADER);
        assert!(!source.contains("{{"));
        let missing = check_source("builtin", &source).unwrap();
        assert!(missing.is_empty(), "missing: {missing:?}");
    }

    #[test]
    fn capacities_are_substituted() {
        let source = expand_template("array<Object, {{MAX_OBJECTS}}> array<Light, {{MAX_LIGHTS}}>");
        assert_eq!(source, format!("array<Object, {MAX_OBJECTS}> array<Light, {MAX_LIGHTS}>"));
    }

    #[test]
    fn declared_resources_reads_bindings() {
        let source = "\
@group(0) @binding(0) var<uniform> frame: Frame;
@group(1) @binding(1) var sky_sampler: sampler;
var<private> rng_state: u32;
    var local_var = 1.0;
";
        assert_eq!(declared_resources(source), vec!["frame", "sky_sampler"]);
    }

    #[test]
    fn missing_entry_point_is_fatal() {
        let source = "fn vs_fullscreen() {}\nfn fs_direct() {}\n";
        let err = check_source("partial", source).unwrap_err();
        assert!(matches!(
            err,
            StartupError::MissingEntryPoint {
                entry_point: ENTRY_COMPOSITE,
                ..
            }
        ));
    }

    #[test]
    fn entry_point_prefix_does_not_match() {
        assert!(!has_entry_point("fn fs_direct_old() {}", ENTRY_DIRECT));
        assert!(has_entry_point("fn fs_direct (x: f32) {}", ENTRY_DIRECT));
    }

    #[test]
    fn missing_resources_are_reported_not_fatal() {
        let source = "\
@group(0) @binding(0) var<uniform> frame: Frame;
fn vs_fullscreen() {}
fn fs_direct() {}
fn fs_composite() {}
";
        let missing = check_source("sparse", source).unwrap();
        assert!(!missing.contains(&"frame"));
        assert!(missing.contains(&"skybox"));
        assert_eq!(missing.len(), BOUND_RESOURCES.len() - 1);
    }

    #[test]
    fn unreadable_file_reports_path() {
        let source = ProgramSource::File(PathBuf::from("/nonexistent/tracer.wgsl"));
        let err = source.read().unwrap_err();
        assert!(err.to_string().contains("tracer.wgsl"));
    }
}
