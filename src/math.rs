//! Vector helpers shared by the camera and quad transform code.

use glam::{DMat4, DVec2, DVec3, DVec4};

/// Cross product of two vectors.
pub fn cross(a: DVec3, b: DVec3) -> DVec3 {
    DVec3::new(
        a.y * b.z - b.y * a.z,
        a.z * b.x - b.z * a.x,
        a.x * b.y - b.x * a.y,
    )
}

/// Dot product of two vectors.
pub fn inner_product(a: DVec3, b: DVec3) -> f64 {
    a.x * b.x + a.y * b.y + a.z * b.z
}

/// Returns the unit vector pointing along `v`, or zero for a zero-length input.
pub fn normalize(v: DVec3) -> DVec3 {
    let length = inner_product(v, v).sqrt();
    if length <= f64::EPSILON {
        DVec3::ZERO
    } else {
        v / length
    }
}

/// Rotates `point` around the X axis by `degrees`.
pub fn rotate_x(point: DVec3, degrees: f64) -> DVec3 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    DVec3::new(
        point.x,
        point.y * cos - point.z * sin,
        point.y * sin + point.z * cos,
    )
}

/// Rotates `point` around the Y axis by `degrees`.
pub fn rotate_y(point: DVec3, degrees: f64) -> DVec3 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    DVec3::new(
        point.z * sin + point.x * cos,
        point.y,
        point.z * cos - point.x * sin,
    )
}

/// Rotates `point` around the Z axis by `degrees`.
pub fn rotate_z(point: DVec3, degrees: f64) -> DVec3 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    DVec3::new(
        point.x * cos - point.y * sin,
        point.x * sin + point.y * cos,
        point.z,
    )
}

/// Rotation of `degrees` about an arbitrary axis, normalizing the axis first.
///
/// Returns `None` when the rotation would be a no-op (zero angle) or is
/// undefined (zero-length axis), so callers can skip it.
pub fn axis_rotation(degrees: f64, axis: DVec3) -> Option<DMat4> {
    let axis = normalize(axis);
    if degrees == 0.0 || axis == DVec3::ZERO {
        return None;
    }
    Some(DMat4::from_axis_angle(axis, degrees.to_radians()))
}

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

pub fn interpolate_linear(p: f64, a: f64, b: f64) -> f64 {
    a + (b - a) * p
}

pub fn interpolate_smooth_step(p: f64, a: f64, b: f64) -> f64 {
    let x = clamp((interpolate_linear(p, a, b) - a) / (b - a), 0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

pub fn interpolate_smoother_step(p: f64, a: f64, b: f64) -> f64 {
    let x = clamp((interpolate_linear(p, a, b) - a) / (b - a), 0.0, 1.0);
    x * x * x * (x * (x * 6.0 - 15.0) + 10.0)
}

/// Maps a world-space point to window coordinates.
///
/// `viewport` is `(x, y, width, height)` in pixels. Returns `None` when the
/// point lies on the camera plane (clip-space `w == 0`).
pub fn project_to_screen(
    point: DVec3,
    view: DMat4,
    projection: DMat4,
    viewport: (i32, i32, u32, u32),
) -> Option<DVec2> {
    let clip = projection * view * DVec4::new(point.x, point.y, point.z, 1.0);
    if clip.w == 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    let (x, y, width, height) = viewport;
    Some(DVec2::new(
        f64::from(x) + (ndc.x + 1.0) * f64::from(width) / 2.0,
        f64::from(y) + (ndc.y + 1.0) * f64::from(height) / 2.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: DVec3, b: DVec3) {
        assert!((a - b).length() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn cross_of_x_and_y_is_z() {
        assert_eq!(cross(DVec3::X, DVec3::Y), DVec3::Z);
        assert_eq!(cross(DVec3::Y, DVec3::X), -DVec3::Z);
    }

    #[test]
    fn inner_product_matches_component_sum() {
        let a = DVec3::new(1.0, 2.0, 3.0);
        let b = DVec3::new(4.0, -5.0, 6.0);
        assert_eq!(inner_product(a, b), 12.0);
    }

    #[test]
    fn normalize_handles_zero_vector() {
        assert_eq!(normalize(DVec3::ZERO), DVec3::ZERO);
        assert_close(normalize(DVec3::new(0.0, 3.0, 4.0)), DVec3::new(0.0, 0.6, 0.8));
    }

    #[test]
    fn quarter_turns_follow_right_hand_rule() {
        assert_close(rotate_z(DVec3::X, 90.0), DVec3::Y);
        assert_close(rotate_x(DVec3::Y, 90.0), DVec3::Z);
        assert_close(rotate_y(DVec3::Z, 90.0), DVec3::X);
    }

    #[test]
    fn axis_rotation_skips_degenerate_input() {
        assert!(axis_rotation(0.0, DVec3::Z).is_none());
        assert!(axis_rotation(45.0, DVec3::ZERO).is_none());
        let rotation = axis_rotation(90.0, DVec3::new(0.0, 0.0, 2.0)).unwrap();
        assert_close(rotation.transform_point3(DVec3::X), DVec3::Y);
    }

    #[test]
    fn smooth_steps_clamp_to_unit_range() {
        assert_eq!(interpolate_smooth_step(-1.0, 0.0, 1.0), 0.0);
        assert_eq!(interpolate_smooth_step(2.0, 0.0, 1.0), 1.0);
        assert!((interpolate_smooth_step(0.5, 0.0, 1.0) - 0.5).abs() < 1e-12);
        assert!((interpolate_smoother_step(0.5, 0.0, 1.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn projecting_look_at_target_lands_in_viewport_center() {
        let view = DMat4::look_at_rh(DVec3::new(0.0, 0.0, 2.0), DVec3::ZERO, DVec3::Y);
        let projection = DMat4::perspective_rh_gl(45f64.to_radians(), 4.0 / 3.0, 1.0, 1000.0);
        let screen = project_to_screen(DVec3::ZERO, view, projection, (0, 0, 800, 600)).unwrap();
        assert!((screen.x - 400.0).abs() < 1e-9);
        assert!((screen.y - 300.0).abs() < 1e-9);
    }
}
