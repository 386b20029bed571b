pub mod cpu_scene_renderer;
pub mod gpu_context;
pub mod gpu_scene_renderer;
pub mod renderer_factory;
