//! Turns a [`TextureDrawState`] into a transformed, textured quad.

use glam::{DMat4, DVec2, DVec3};

use crate::camera::Camera;
use crate::math::axis_rotation;
use crate::objects::ObjectResolver;
use crate::render::{BlendFactor, Capability, GpuBackend, MatrixMode, QuadVertex};
use crate::texture::{Alignment, TextureDrawState};
use crate::viewport::ViewportController;

/// Geometry derived from a draw state, before it reaches the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadPlacement {
    /// Local quad extent; the quad spans `[0,width]×[0,height]`.
    pub width: f64,
    pub height: f64,
    /// Translation applied before scaling, alignment included.
    pub origin: DVec3,
    /// Rotation origin in local space.
    pub pivot: DVec3,
    pub model: DMat4,
    pub vertices: [QuadVertex; 4],
}

impl QuadPlacement {
    /// Quad corners after the model transform.
    pub fn transformed_corners(&self) -> [DVec3; 4] {
        self.vertices
            .map(|vertex| self.model.transform_point3(vertex.position))
    }
}

/// Computes size, alignment, pivot and model transform for `state`.
pub fn place_quad(state: &TextureDrawState) -> QuadPlacement {
    let (draw_width, draw_height) = state.draw_size();
    let (mut w, mut h) = (f64::from(draw_width), f64::from(draw_height));
    if state.perspective_3d && h != 0.0 {
        w /= h;
        h = 1.0;
    }

    let x_fixed = -w / 2.0 * state.scale_w;
    let y_fixed = -h / 2.0 * state.scale_h;
    let mut origin = DVec3::new(x_fixed + state.x, y_fixed + state.y, state.z);

    if !state.perspective_3d {
        let canvas_width = f64::from(state.canvas_width);
        let canvas_height = f64::from(state.canvas_height);
        match state.alignment {
            Alignment::None => {}
            Alignment::Center => {
                origin.x += canvas_width / 2.0;
                origin.y += canvas_height / 2.0;
            }
            Alignment::HorizontalCenter => origin.x += canvas_width / 2.0,
            Alignment::VerticalCenter => origin.y += canvas_height / 2.0,
            Alignment::PivotLeftAnchor => origin.x -= x_fixed,
            Alignment::PivotRightAnchor => origin.x += canvas_width + x_fixed,
        }
    }

    let pivot = DVec3::new(
        w / 2.0 + state.pivot_x / state.scale_w,
        h / 2.0 + state.pivot_y / state.scale_h,
        state.pivot_z,
    );

    let degrees = state.rotation_degrees;
    let axis = state.rotation_axis;
    // Composed X·Y·Z so vertices turn about Z first, then Y, then X.
    let rotations = [
        axis_rotation(degrees.x, DVec3::new(-axis.x, 0.0, 0.0)),
        axis_rotation(degrees.y, DVec3::new(0.0, -axis.y, 0.0)),
        axis_rotation(degrees.z, DVec3::new(0.0, 0.0, -axis.z)),
    ];

    let mut model = DMat4::from_translation(origin)
        * DMat4::from_scale(DVec3::new(state.scale_w, state.scale_h, 1.0))
        * DMat4::from_translation(pivot);
    for rotation in rotations.into_iter().flatten() {
        model *= rotation;
    }
    model *= DMat4::from_translation(-pivot);

    let vertices = [
        QuadVertex {
            position: DVec3::new(w, h, 0.0),
            tex_coord: DVec2::new(state.u_max, state.v_max),
        },
        QuadVertex {
            position: DVec3::new(0.0, h, 0.0),
            tex_coord: DVec2::new(state.u_min, state.v_max),
        },
        QuadVertex {
            position: DVec3::new(0.0, 0.0, 0.0),
            tex_coord: DVec2::new(state.u_min, state.v_min),
        },
        QuadVertex {
            position: DVec3::new(w, 0.0, 0.0),
            tex_coord: DVec2::new(state.u_max, state.v_min),
        },
    ];

    QuadPlacement {
        width: w,
        height: h,
        origin,
        pivot,
        model,
        vertices,
    }
}

/// Draws `state` with its own blending and texture units, entering a 2D
/// overlay for screen-space textures. Backend state is restored afterwards.
pub fn draw_texture(
    state: &TextureDrawState,
    backend: &mut dyn GpuBackend,
    viewport: &mut ViewportController,
    camera: &Camera,
    objects: &dyn ObjectResolver,
) -> QuadPlacement {
    backend.set_blend_func(state.blend_src, state.blend_dst);
    backend.enable(Capability::Blend);
    backend.enable_texture_unit(0);

    let bound_units: Vec<usize> = (0..state.multi_texture.len())
        .rev()
        .filter(|&unit| state.multi_texture[unit].is_some())
        .collect();
    for &unit in &bound_units {
        backend.enable_texture_unit(unit);
        backend.bind_texture(unit, state.multi_texture[unit]);
    }

    if !state.perspective_3d {
        viewport.enter_2d(backend, state.canvas_width, state.canvas_height);
    }

    let placement = place_quad(state);
    backend.push_matrix(MatrixMode::ModelView);
    backend.multiply_matrix(MatrixMode::ModelView, placement.model);
    backend.draw_quad(&placement.vertices);
    backend.pop_matrix(MatrixMode::ModelView);

    if !state.perspective_3d {
        viewport.exit_2d(backend, camera, objects);
    }

    for &unit in &bound_units {
        backend.bind_texture(unit, None);
        backend.disable_texture_unit(unit);
    }

    backend.set_blend_func(BlendFactor::DEFAULT_SRC, BlendFactor::DEFAULT_DST);
    backend.disable(Capability::Blend);
    backend.disable_texture_unit(0);

    placement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectTable;
    use crate::render::{GpuCommand, PixelFormat, RecordingBackend, TextureHandle};

    fn sprite(width: u32, height: u32) -> TextureDrawState {
        TextureDrawState::new(
            "sprite",
            TextureHandle(7),
            PixelFormat::Rgba,
            (width, height),
            (800, 600),
        )
    }

    fn bounds(corners: [DVec3; 4]) -> (f64, f64, f64, f64) {
        let xs = corners.map(|c| c.x);
        let ys = corners.map(|c| c.y);
        (
            xs.iter().copied().fold(f64::INFINITY, f64::min),
            xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ys.iter().copied().fold(f64::INFINITY, f64::min),
            ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    }

    #[test]
    fn centered_sprite_spans_middle_of_canvas() {
        let mut state = sprite(256, 256);
        state.set_custom_dimensions(100, 50);
        state.set_alignment(Alignment::Center);

        let placement = place_quad(&state);
        assert_eq!(placement.origin, DVec3::new(350.0, 275.0, 0.0));
        assert_eq!(bounds(placement.transformed_corners()), (350.0, 450.0, 275.0, 325.0));
    }

    #[test]
    fn horizontal_and_vertical_alignment_shift_one_axis() {
        let mut state = sprite(100, 50);
        state.set_alignment(Alignment::HorizontalCenter);
        assert_eq!(place_quad(&state).origin, DVec3::new(350.0, -25.0, 0.0));

        state.set_alignment(Alignment::VerticalCenter);
        assert_eq!(place_quad(&state).origin, DVec3::new(-50.0, 275.0, 0.0));
    }

    #[test]
    fn pivot_anchors_offset_from_edges() {
        let mut state = sprite(100, 50);
        state.set_alignment(Alignment::PivotLeftAnchor);
        assert_eq!(place_quad(&state).origin.x, 0.0);

        state.set_alignment(Alignment::PivotRightAnchor);
        assert_eq!(place_quad(&state).origin.x, 700.0);
    }

    #[test]
    fn alignment_is_ignored_in_3d() {
        let mut state = sprite(200, 100);
        state.set_perspective_3d(true);
        state.set_alignment(Alignment::Center);
        let placement = place_quad(&state);
        assert_eq!((placement.width, placement.height), (2.0, 1.0));
        assert_eq!(placement.origin, DVec3::new(-1.0, -0.5, 0.0));
    }

    #[test]
    fn uv_window_is_flipped_against_local_y() {
        let mut state = sprite(10, 10);
        state.set_uv_dimensions(0.0, 0.0, 0.5, 0.25);
        let vertices = place_quad(&state).vertices;
        let expected = [
            (DVec3::new(10.0, 10.0, 0.0), DVec2::new(0.5, 0.25)),
            (DVec3::new(0.0, 10.0, 0.0), DVec2::new(0.0, 0.25)),
            (DVec3::new(0.0, 0.0, 0.0), DVec2::new(0.0, 0.0)),
            (DVec3::new(10.0, 0.0, 0.0), DVec2::new(0.5, 0.0)),
        ];
        for (vertex, (position, tex_coord)) in vertices.iter().zip(expected) {
            assert_eq!(vertex.position, position);
            assert_eq!(vertex.tex_coord, tex_coord);
        }
    }

    #[test]
    fn rotation_turns_around_pivot() {
        let mut state = sprite(100, 100);
        state.set_rotation(DVec3::new(0.0, 0.0, 180.0), DVec3::new(0.0, 0.0, 1.0));
        let corners = place_quad(&state).transformed_corners();
        let (min_x, max_x, min_y, max_y) = bounds(corners);
        assert!((min_x + 50.0).abs() < 1e-9 && (max_x - 50.0).abs() < 1e-9);
        assert!((min_y + 50.0).abs() < 1e-9 && (max_y - 50.0).abs() < 1e-9);
        assert!((corners[2] - DVec3::new(50.0, 50.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn combined_rotation_turns_about_z_before_x() {
        let mut state = sprite(100, 100);
        state.set_perspective_3d(true);
        state.set_rotation(DVec3::new(90.0, 0.0, 90.0), DVec3::new(1.0, 0.0, 1.0));
        let placement = place_quad(&state);
        assert_eq!((placement.width, placement.height), (1.0, 1.0));

        let corner = placement.transformed_corners()[0];
        assert!((corner - DVec3::new(0.5, 0.0, 0.5)).length() < 1e-9, "{corner:?}");
    }

    #[test]
    fn scale_and_pivot_offset_combine() {
        let mut state = sprite(100, 100);
        state.set_scale(2.0, 2.0);
        state.set_pivot(20.0, 0.0, 0.0);
        let placement = place_quad(&state);
        assert_eq!(placement.origin, DVec3::new(-100.0, -100.0, 0.0));
        assert_eq!(placement.pivot, DVec3::new(60.0, 50.0, 0.0));
        assert_eq!(bounds(placement.transformed_corners()), (-100.0, 100.0, -100.0, 100.0));
    }

    #[test]
    fn multi_texture_units_bind_high_to_low_and_are_released() {
        let mut backend = RecordingBackend::new();
        let mut viewport = ViewportController::new();
        let camera = Camera::new(1.0);
        let objects = ObjectTable::new();
        let mut state = sprite(64, 64);
        state.set_unit_texture(2, Some(TextureHandle(9))).unwrap();

        draw_texture(&state, &mut backend, &mut viewport, &camera, &objects);

        let commands = backend.commands();
        let position = |wanted: &GpuCommand| commands.iter().position(|c| c == wanted).unwrap();
        let bind_2 = position(&GpuCommand::BindTexture {
            unit: 2,
            texture: Some(TextureHandle(9)),
        });
        let bind_0 = position(&GpuCommand::BindTexture {
            unit: 0,
            texture: Some(TextureHandle(7)),
        });
        let draw = commands
            .iter()
            .position(|c| matches!(c, GpuCommand::DrawQuad(_)))
            .unwrap();
        assert!(bind_2 < bind_0 && bind_0 < draw);

        for unit in [0, 2] {
            let unbind = position(&GpuCommand::BindTexture { unit, texture: None });
            assert!(unbind > draw);
            assert!(commands[draw..].contains(&GpuCommand::DisableTextureUnit(unit)));
        }
        assert!(!commands
            .iter()
            .any(|c| matches!(c, GpuCommand::BindTexture { unit: 1 | 3, .. })));
        assert_eq!(
            commands.last(),
            Some(&GpuCommand::DisableTextureUnit(0))
        );
    }

    #[test]
    fn screen_space_draw_wraps_itself_in_overlay() {
        let mut backend = RecordingBackend::new();
        let mut viewport = ViewportController::new();
        let camera = Camera::new(1.0);
        let objects = ObjectTable::new();
        let state = sprite(32, 32);

        draw_texture(&state, &mut backend, &mut viewport, &camera, &objects);

        assert_eq!(viewport.depth_2d(), 0);
        let commands = backend.commands();
        assert!(commands.contains(&GpuCommand::Disable(Capability::DepthTest)));
        assert!(commands.contains(&GpuCommand::Enable(Capability::DepthTest)));
        assert!(commands.contains(&GpuCommand::SetBlendFunc(
            BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha
        )));
        assert_eq!(backend.matrix_stack_depth(MatrixMode::ModelView), 0);
    }

    #[test]
    fn world_space_draw_keeps_projection_untouched() {
        let mut backend = RecordingBackend::new();
        let mut viewport = ViewportController::new();
        let camera = Camera::new(1.0);
        let objects = ObjectTable::new();
        let mut state = sprite(32, 32);
        state.set_perspective_3d(true);
        state.set_blend_func(BlendFactor::One, BlendFactor::One);

        draw_texture(&state, &mut backend, &mut viewport, &camera, &objects);

        let commands = backend.commands();
        assert_eq!(
            commands.first(),
            Some(&GpuCommand::SetBlendFunc(BlendFactor::One, BlendFactor::One))
        );
        assert!(!commands
            .iter()
            .any(|c| matches!(c, GpuCommand::PushMatrix(MatrixMode::Projection))));
    }
}
