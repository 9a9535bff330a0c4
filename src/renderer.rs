//! The rendering context: camera, projection state, render targets and
//! textures bound to one GPU backend.
//!
//! Every operation takes primitive arguments or opaque ids so an embedding
//! layer can call it directly.

use std::sync::Arc;

use glam::{DVec2, DVec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, ResolvedView};
use crate::error::{RenderError, RenderResult};
use crate::fbo::{RenderTarget, RenderTargetId, RenderTargetRegistry};
use crate::math::project_to_screen;
use crate::objects::{ObjectHandle, ObjectTable};
use crate::quad::{draw_texture, QuadPlacement};
use crate::render::{GpuBackend, PixelFormat};
use crate::screen::{ScreenArea, ScreenProvider};
use crate::texture::{TextureDrawState, TextureId, TextureRegistry};
use crate::viewport::ViewportController;

pub struct Renderer {
    backend: Box<dyn GpuBackend>,
    screen: Arc<dyn ScreenProvider>,
    objects: ObjectTable,
    camera: Camera,
    viewport: ViewportController,
    targets: RenderTargetRegistry,
    textures: TextureRegistry,
    clear_color: Vec4,
    active_target: Option<RenderTargetId>,
    frames: u64,
    draw_calls: u64,
}

/// Render target as reported in a [`RenderSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub name: String,
    pub size: (u32, u32),
    pub effective_size: (u32, u32),
    pub store_depth: bool,
    pub generated: bool,
}

/// Snapshot of the renderer after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub frames: u64,
    pub camera_position: DVec3,
    pub camera_look_at: DVec3,
    pub targets: Vec<TargetSummary>,
    pub draw_calls: u64,
}

impl Renderer {
    /// Creates a renderer whose camera matches the screen's aspect ratio.
    pub fn new(
        backend: Box<dyn GpuBackend>,
        screen: Arc<dyn ScreenProvider>,
        objects: ObjectTable,
    ) -> Self {
        let camera = Camera::new(screen.aspect_ratio());
        Self {
            backend,
            screen,
            objects,
            camera,
            viewport: ViewportController::new(),
            targets: RenderTargetRegistry::new(),
            textures: TextureRegistry::new(),
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            active_target: None,
            frames: 0,
            draw_calls: 0,
        }
    }

    pub fn screen_size(&self) -> (u32, u32) {
        self.screen.screen_size()
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    // Camera

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// The live camera. Changes apply at the next view rebuild.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_camera_position(&mut self, x: f64, y: f64, z: f64) {
        self.camera.set_position(x, y, z);
    }

    pub fn set_camera_look_at(&mut self, x: f64, y: f64, z: f64) {
        self.camera.set_look_at(x, y, z);
    }

    pub fn set_camera_up_vector(&mut self, x: f64, y: f64, z: f64) {
        self.camera.set_up_vector(x, y, z);
    }

    pub fn set_camera_perspective(
        &mut self,
        fovy: f64,
        aspect: f64,
        z_near: f64,
        z_far: f64,
    ) -> RenderResult<()> {
        self.camera.set_perspective(fovy, aspect, z_near, z_far)
    }

    pub fn set_camera_position_object(&mut self, object: Option<ObjectHandle>) {
        self.camera.set_position_object(object);
    }

    pub fn set_camera_target_object(&mut self, object: Option<ObjectHandle>) {
        self.camera.set_target_object(object);
    }

    /// Projects a world point to window coordinates with the live camera.
    pub fn project(&self, point: DVec3) -> Option<DVec2> {
        let view = self.camera.resolve(&self.objects);
        project_to_screen(point, view.view, view.projection, self.viewport_rect())
    }

    // Projection state

    pub fn depth_2d(&self) -> i32 {
        self.viewport.depth_2d()
    }

    pub fn enter_2d(&mut self, width: u32, height: u32) {
        self.viewport.enter_2d(self.backend.as_mut(), width, height);
    }

    pub fn exit_2d(&mut self) {
        self.viewport
            .exit_2d(self.backend.as_mut(), &self.camera, &self.objects);
    }

    pub fn rebuild_3d_view(&mut self) -> ResolvedView {
        self.viewport
            .rebuild_3d_view(self.backend.as_mut(), &self.camera, &self.objects)
    }

    pub fn clear_color(&self) -> Vec4 {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_color = Vec4::new(r, g, b, a);
    }

    pub fn active_target(&self) -> Option<RenderTargetId> {
        self.active_target
    }

    /// Sets the backend viewport to the screen area, or to the active
    /// target's rendered region.
    pub fn reset_viewport(&mut self) {
        let (x, y, width, height) = self.viewport_rect();
        self.backend.set_viewport(x, y, width, height);
    }

    fn viewport_rect(&self) -> (i32, i32, u32, u32) {
        match self
            .active_target
            .and_then(|id| self.targets.get(id).ok())
        {
            Some(target) => (0, 0, target.effective_width(), target.effective_height()),
            None => {
                let area = ScreenArea::of(self.screen.as_ref());
                (area.x, area.y, area.width, area.height)
            }
        }
    }

    /// Starts rendering into `target` (or the screen): binds it, resets the
    /// viewport, clears color and depth and rebuilds the 3D view.
    pub fn update_viewport(&mut self, target: Option<RenderTargetId>) -> RenderResult<()> {
        self.targets.bind(target, self.backend.as_mut())?;
        self.active_target = target;
        self.reset_viewport();
        self.backend.clear(self.clear_color, true);
        self.rebuild_3d_view();
        Ok(())
    }

    // Render targets

    pub fn fbo_init(&mut self, name: &str) -> RenderResult<RenderTargetId> {
        let screen_size = self.screen.screen_size();
        self.targets.get_or_create(name, screen_size)
    }

    pub fn fbo_find(&self, name: &str) -> RenderResult<RenderTargetId> {
        self.targets.find(name)
    }

    pub fn fbo(&self, id: RenderTargetId) -> RenderResult<&RenderTarget> {
        self.targets.get(id)
    }

    pub fn fbo_set_dimensions(
        &mut self,
        id: RenderTargetId,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        self.targets.set_dimensions(id, width, height)
    }

    pub fn fbo_set_render_dimensions(
        &mut self,
        id: RenderTargetId,
        width_percent: f64,
        height_percent: f64,
    ) -> RenderResult<()> {
        self.targets
            .set_render_dimensions(id, width_percent, height_percent, &mut self.textures)
    }

    pub fn fbo_store_depth(&mut self, id: RenderTargetId, enabled: bool) -> RenderResult<()> {
        self.targets.store_depth(id, enabled)
    }

    pub fn fbo_generate(&mut self, id: RenderTargetId) -> RenderResult<()> {
        let canvas = self.screen.screen_size();
        self.targets
            .generate_framebuffer(id, self.backend.as_mut(), &mut self.textures, canvas)
    }

    pub fn fbo_bind(&mut self, target: Option<RenderTargetId>) -> RenderResult<()> {
        self.targets.bind(target, self.backend.as_mut())
    }

    pub fn fbo_bind_textures(&mut self, target: Option<RenderTargetId>) -> RenderResult<()> {
        self.targets
            .bind_textures(target, self.backend.as_mut(), &self.textures)
    }

    pub fn fbo_deinit(&mut self, id: RenderTargetId) -> RenderResult<()> {
        if self.active_target == Some(id) {
            self.active_target = None;
        }
        self.targets
            .deinit(id, self.backend.as_mut(), &mut self.textures)
    }

    /// Color texture of a generated target.
    pub fn fbo_color_texture(&self, id: RenderTargetId) -> RenderResult<TextureId> {
        let target = self.targets.get(id)?;
        target.color.ok_or_else(|| {
            RenderError::InvalidState(format!(
                "render target '{}' has no color texture, generate it first",
                target.name
            ))
        })
    }

    pub fn fbo_depth_texture(&self, id: RenderTargetId) -> RenderResult<TextureId> {
        let target = self.targets.get(id)?;
        target.depth.ok_or_else(|| {
            RenderError::InvalidState(format!(
                "render target '{}' stores no depth texture",
                target.name
            ))
        })
    }

    // Textures

    /// Allocates a texture sized `width`×`height` drawn against the screen.
    pub fn create_texture(
        &mut self,
        name: &str,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<TextureId> {
        let canvas = self.screen.screen_size();
        self.textures
            .create(self.backend.as_mut(), name, format, (width, height), canvas)
    }

    pub fn texture_find(&self, name: &str) -> RenderResult<TextureId> {
        self.textures.find(name)
    }

    pub fn texture(&self, id: TextureId) -> RenderResult<&TextureDrawState> {
        self.textures.get(id)
    }

    /// Mutable draw state. Fails with `InvalidState` for unloaded textures.
    pub fn texture_mut(&mut self, id: TextureId) -> RenderResult<&mut TextureDrawState> {
        self.textures.get_mut(id)
    }

    pub fn set_texture_size_to_screen_size(&mut self, id: TextureId) -> RenderResult<()> {
        let (width, height) = self.screen.screen_size();
        self.textures.get_mut(id)?.set_custom_dimensions(width, height);
        Ok(())
    }

    /// Samples `other` on texture unit `unit` whenever `id` is drawn.
    pub fn set_texture_unit_texture(
        &mut self,
        id: TextureId,
        unit: usize,
        other: Option<TextureId>,
    ) -> RenderResult<()> {
        let handle = other
            .map(|other| self.textures.get(other).map(|state| state.handle))
            .transpose()?;
        self.textures.get_mut(id)?.set_unit_texture(unit, handle)
    }

    pub fn unload_texture(&mut self, id: TextureId) -> RenderResult<()> {
        self.textures.unload(self.backend.as_mut(), id)
    }

    pub fn draw_texture(&mut self, id: TextureId) -> RenderResult<QuadPlacement> {
        let state = self.textures.get(id)?;
        let placement = draw_texture(
            state,
            self.backend.as_mut(),
            &mut self.viewport,
            &self.camera,
            &self.objects,
        );
        self.draw_calls += 1;
        Ok(placement)
    }

    /// Submits the frame's work to the backend.
    pub fn end_frame(&mut self) {
        self.backend.finish_frame();
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn summary(&self) -> RenderSummary {
        let targets = self
            .targets
            .iter()
            .map(|(_, target)| TargetSummary {
                name: target.name.clone(),
                size: (target.width, target.height),
                effective_size: (target.effective_width(), target.effective_height()),
                store_depth: target.store_depth,
                generated: target.is_generated(),
            })
            .collect();
        RenderSummary {
            frames: self.frames,
            camera_position: self.camera.position,
            camera_look_at: self.camera.look_at,
            targets,
            draw_calls: self.draw_calls,
        }
    }
}
