//! Rendering core of the demo player.
//!
//! The crate owns the camera, the nested 2D/3D projection state, render
//! targets backed by framebuffers and the textured-quad draw path. All GPU
//! work goes through [`GpuBackend`], so everything above it runs headless
//! against [`RecordingBackend`] as well as on the wgpu device.

pub mod camera;
pub mod error;
pub mod fbo;
pub mod math;
pub mod objects;
pub mod quad;
pub mod render;
pub mod renderer;
pub mod screen;
pub mod scripting;
pub mod settings;
pub mod texture;
pub mod viewport;

pub use camera::{Camera, ResolvedView};
pub use error::{RenderError, RenderResult};
pub use fbo::{RenderTarget, RenderTargetId, RenderTargetRegistry};
pub use objects::{ObjectHandle, ObjectResolver, ObjectTable, TrackedObject};
pub use quad::{draw_texture, place_quad, QuadPlacement};
pub use render::{
    BlendFactor, CommandLog, GpuBackend, GpuCommand, PixelFormat, RecordingBackend, WgpuBackend,
};
pub use renderer::{RenderSummary, Renderer, TargetSummary};
pub use screen::{ResizableScreen, ScreenArea, ScreenProvider, StaticScreen};
pub use scripting::ScriptHost;
pub use settings::PlayerSettings;
pub use texture::{Alignment, TextureDrawState, TextureId, TextureRegistry};
pub use viewport::ViewportController;
