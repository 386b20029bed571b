use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rendering::domain::scene_renderer::SceneRenderer;

use super::cpu_scene_renderer::CpuSceneRenderer;
use super::gpu_context::GpuContext;
use super::gpu_scene_renderer::GpuSceneRenderer;

/// Renderer backend preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererBackend {
    /// GPU when an adapter exists, CPU otherwise.
    #[default]
    Auto,
    Gpu,
    Cpu,
}

impl FromStr for RendererBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "gpu" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            other => Err(format!(
                "renderer must be one of: auto, gpu, cpu, got '{other}'"
            )),
        }
    }
}

impl fmt::Display for RendererBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Gpu => "gpu",
            Self::Cpu => "cpu",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RendererError {
    #[error("no GPU adapter available")]
    NoGpuAdapter,
    #[error("invalid render size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// Creates a scene renderer for the requested backend.
///
/// `Auto` probes for a wgpu adapter and falls back to the CPU rasterizer.
/// Logs which backend is selected.
pub fn create_renderer(
    backend: RendererBackend,
    width: u32,
    height: u32,
) -> Result<Box<dyn SceneRenderer>, RendererError> {
    if width == 0 || height == 0 {
        return Err(RendererError::InvalidSize { width, height });
    }

    if backend != RendererBackend::Cpu {
        if let Some(ctx) = GpuContext::new() {
            log::info!(
                "Using GPU renderer on {} ({width}x{height})",
                ctx.adapter_name
            );
            return Ok(Box::new(GpuSceneRenderer::new(Arc::new(ctx), width, height)));
        }
        if backend == RendererBackend::Gpu {
            return Err(RendererError::NoGpuAdapter);
        }
        log::info!("No GPU available, using CPU renderer ({width}x{height})");
    } else {
        log::info!("Using CPU renderer ({width}x{height})");
    }
    Ok(Box::new(CpuSceneRenderer::new(width, height)))
}

/// Returns true if a GPU adapter is available for rendering.
pub fn gpu_available() -> bool {
    GpuContext::new().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::domain::camera::PerspectiveCamera;
    use crate::rendering::domain::scene::create_scene;
    use rstest::rstest;

    #[rstest]
    #[case("auto", RendererBackend::Auto)]
    #[case("GPU", RendererBackend::Gpu)]
    #[case("cpu", RendererBackend::Cpu)]
    fn test_parse_backend(#[case] input: &str, #[case] expected: RendererBackend) {
        assert_eq!(input.parse::<RendererBackend>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_backend_fails() {
        assert!("vulkan".parse::<RendererBackend>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for backend in [RendererBackend::Auto, RendererBackend::Gpu, RendererBackend::Cpu] {
            assert_eq!(backend.to_string().parse::<RendererBackend>().unwrap(), backend);
        }
    }

    #[test]
    fn test_cpu_backend_always_available() {
        let mut renderer = create_renderer(RendererBackend::Cpu, 64, 48).unwrap();
        let frame = renderer
            .render(&create_scene(), &PerspectiveCamera::for_viewport(64, 48))
            .unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 48));
    }

    #[test]
    fn test_auto_backend_renders() {
        let mut renderer = create_renderer(RendererBackend::Auto, 64, 48).unwrap();
        assert_eq!(renderer.size(), (64, 48));
        renderer
            .render(&create_scene(), &PerspectiveCamera::for_viewport(64, 48))
            .unwrap();
    }

    #[test]
    fn test_gpu_backend_matches_adapter_presence() {
        let result = create_renderer(RendererBackend::Gpu, 64, 48);
        assert_eq!(result.is_ok(), gpu_available());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert_eq!(
            create_renderer(RendererBackend::Cpu, 0, 48).err(),
            Some(RendererError::InvalidSize {
                width: 0,
                height: 48
            })
        );
    }
}
