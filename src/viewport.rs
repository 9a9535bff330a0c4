//! Projection state machine: 3D camera view with nestable 2D overlays.

use glam::DMat4;
use log::error;

use crate::camera::{Camera, ResolvedView};
use crate::objects::ObjectResolver;
use crate::render::{Capability, GpuBackend, MatrixMode};

/// Tracks 2D overlay nesting. Only the outermost `enter_2d`/`exit_2d` pair
/// touches GPU state.
#[derive(Debug, Default)]
pub struct ViewportController {
    depth_2d: i32,
}

impl ViewportController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current overlay nesting. Negative after unbalanced `exit_2d` calls.
    pub fn depth_2d(&self) -> i32 {
        self.depth_2d
    }

    pub fn is_2d(&self) -> bool {
        self.depth_2d > 0
    }

    /// Recomputes projection and view from the live camera.
    pub fn rebuild_3d_view(
        &self,
        backend: &mut dyn GpuBackend,
        camera: &Camera,
        objects: &dyn ObjectResolver,
    ) -> ResolvedView {
        let resolved = camera.resolve(objects);
        backend.load_matrix(MatrixMode::Projection, resolved.projection);
        backend.load_matrix(MatrixMode::ModelView, resolved.view);
        resolved
    }

    /// Switches to an orthographic `[0,w]×[0,h]` projection with identity
    /// view and depth testing off.
    pub fn enter_2d(&mut self, backend: &mut dyn GpuBackend, width: u32, height: u32) {
        if self.depth_2d == 0 {
            backend.disable(Capability::DepthTest);
            backend.push_matrix(MatrixMode::ModelView);
            backend.push_matrix(MatrixMode::Projection);
            backend.load_matrix(
                MatrixMode::Projection,
                DMat4::orthographic_rh_gl(0.0, f64::from(width), 0.0, f64::from(height), 0.0, 1.0),
            );
            backend.load_matrix(MatrixMode::ModelView, DMat4::IDENTITY);
        }
        self.depth_2d += 1;
    }

    /// Leaves one overlay level. The outermost exit restores the saved
    /// matrices, re-enables depth testing and rebuilds the camera view.
    pub fn exit_2d(
        &mut self,
        backend: &mut dyn GpuBackend,
        camera: &Camera,
        objects: &dyn ObjectResolver,
    ) {
        if self.depth_2d == 1 {
            backend.pop_matrix(MatrixMode::Projection);
            backend.pop_matrix(MatrixMode::ModelView);
            backend.enable(Capability::DepthTest);
            self.rebuild_3d_view(backend, camera, objects);
        }

        self.depth_2d -= 1;

        if self.depth_2d < 0 {
            error!(
                "2D overlay exit without matching enter, nesting depth is now {}",
                self.depth_2d
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectTable;
    use crate::render::{GpuCommand, RecordingBackend};

    fn count(backend: &RecordingBackend, wanted: GpuCommand) -> usize {
        backend
            .commands()
            .into_iter()
            .filter(|command| *command == wanted)
            .count()
    }

    #[test]
    fn nested_overlays_push_and_pop_once() {
        let mut backend = RecordingBackend::new();
        let mut viewport = ViewportController::new();
        let camera = Camera::new(1.0);
        let objects = ObjectTable::new();

        for _ in 0..3 {
            viewport.enter_2d(&mut backend, 800, 600);
        }
        assert!(viewport.is_2d());
        for _ in 0..3 {
            viewport.exit_2d(&mut backend, &camera, &objects);
        }

        assert_eq!(viewport.depth_2d(), 0);
        for mode in [MatrixMode::Projection, MatrixMode::ModelView] {
            assert_eq!(count(&backend, GpuCommand::PushMatrix(mode)), 1);
            assert_eq!(count(&backend, GpuCommand::PopMatrix(mode)), 1);
            assert_eq!(backend.matrix_stack_depth(mode), 0);
        }
        assert_eq!(
            count(&backend, GpuCommand::Disable(Capability::DepthTest)),
            1
        );
        assert_eq!(count(&backend, GpuCommand::Enable(Capability::DepthTest)), 1);
    }

    #[test]
    fn overlay_uses_orthographic_canvas() {
        let mut backend = RecordingBackend::new();
        let mut viewport = ViewportController::new();
        viewport.enter_2d(&mut backend, 320, 200);
        let ortho = DMat4::orthographic_rh_gl(0.0, 320.0, 0.0, 200.0, 0.0, 1.0);
        let commands = backend.commands();
        assert!(commands.contains(&GpuCommand::LoadMatrix(MatrixMode::Projection, ortho)));
        assert!(commands.contains(&GpuCommand::LoadMatrix(
            MatrixMode::ModelView,
            DMat4::IDENTITY
        )));
    }

    #[test]
    fn outermost_exit_rebuilds_camera_view() {
        let mut backend = RecordingBackend::new();
        let mut viewport = ViewportController::new();
        let mut camera = Camera::new(1.0);
        camera.set_position(0.0, 4.0, 4.0);
        let objects = ObjectTable::new();

        viewport.enter_2d(&mut backend, 800, 600);
        backend.log().clear();
        viewport.exit_2d(&mut backend, &camera, &objects);

        let resolved = camera.resolve(&objects);
        let commands = backend.commands();
        assert_eq!(
            commands.last(),
            Some(&GpuCommand::LoadMatrix(MatrixMode::ModelView, resolved.view))
        );
    }

    #[test]
    fn unbalanced_exit_goes_negative_without_touching_state() {
        let mut backend = RecordingBackend::new();
        let mut viewport = ViewportController::new();
        let camera = Camera::new(1.0);
        let objects = ObjectTable::new();

        viewport.exit_2d(&mut backend, &camera, &objects);
        viewport.exit_2d(&mut backend, &camera, &objects);

        assert_eq!(viewport.depth_2d(), -2);
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn rebuild_loads_projection_then_view() {
        let mut backend = RecordingBackend::new();
        let viewport = ViewportController::new();
        let camera = Camera::new(2.0);
        let objects = ObjectTable::new();

        let resolved = viewport.rebuild_3d_view(&mut backend, &camera, &objects);
        assert_eq!(
            backend.commands(),
            vec![
                GpuCommand::LoadMatrix(MatrixMode::Projection, resolved.projection),
                GpuCommand::LoadMatrix(MatrixMode::ModelView, resolved.view),
            ]
        );
    }
}
