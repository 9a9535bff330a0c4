//! Process-wide camera state.
//!
//! The camera only stores parameters; the projection and view matrices are
//! built on demand by [`Camera::resolve`], which folds in the positions of
//! any tracked objects.

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::objects::{ObjectHandle, ObjectResolver};

pub const DEFAULT_FOVY: f64 = 45.0;
pub const DEFAULT_Z_NEAR: f64 = 1.0;
pub const DEFAULT_Z_FAR: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: DVec3,
    pub look_at: DVec3,
    pub up: DVec3,
    /// Object whose position is added to `position` when the view is built.
    pub position_object: Option<ObjectHandle>,
    /// Object whose position is added to `look_at` when the view is built.
    pub target_object: Option<ObjectHandle>,
    /// Vertical field of view in degrees.
    pub fovy: f64,
    pub aspect: f64,
    pub z_near: f64,
    pub z_far: f64,
}

/// Camera parameters with tracked objects folded in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedView {
    pub eye: DVec3,
    pub target: DVec3,
    pub up: DVec3,
    pub projection: DMat4,
    pub view: DMat4,
}

impl Camera {
    /// Camera with the player defaults for a screen area of `aspect`.
    pub fn new(aspect: f64) -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 2.0),
            look_at: DVec3::ZERO,
            up: DVec3::Y,
            position_object: None,
            target_object: None,
            fovy: DEFAULT_FOVY,
            aspect,
            z_near: DEFAULT_Z_NEAR,
            z_far: DEFAULT_Z_FAR,
        }
    }

    pub fn set_position_object(&mut self, object: Option<ObjectHandle>) {
        self.position_object = object;
    }

    pub fn set_target_object(&mut self, object: Option<ObjectHandle>) {
        self.target_object = object;
    }

    /// Replaces the perspective parameters.
    ///
    /// Requires `aspect > 0`, `z_near > 0` and `z_far > z_near`; the previous
    /// values are kept when the check fails.
    pub fn set_perspective(
        &mut self,
        fovy: f64,
        aspect: f64,
        z_near: f64,
        z_far: f64,
    ) -> RenderResult<()> {
        if !(aspect > 0.0) {
            return Err(RenderError::InvalidArgument(format!(
                "aspect must be positive, got {aspect}"
            )));
        }
        if !(z_near > 0.0 && z_far > z_near) {
            return Err(RenderError::InvalidArgument(format!(
                "clip planes must satisfy 0 < near < far, got near={z_near} far={z_far}"
            )));
        }
        self.fovy = fovy;
        self.aspect = aspect;
        self.z_near = z_near;
        self.z_far = z_far;
        Ok(())
    }

    pub fn set_position(&mut self, x: f64, y: f64, z: f64) {
        self.position = DVec3::new(x, y, z);
    }

    pub fn set_look_at(&mut self, x: f64, y: f64, z: f64) {
        self.look_at = DVec3::new(x, y, z);
    }

    pub fn set_up_vector(&mut self, x: f64, y: f64, z: f64) {
        self.up = DVec3::new(x, y, z);
    }

    /// Eye position including the tracked position object, if it still exists.
    pub fn effective_eye(&self, objects: &dyn ObjectResolver) -> DVec3 {
        self.position + tracked_offset(self.position_object, objects)
    }

    /// Look-at point including the tracked target object, if it still exists.
    pub fn effective_target(&self, objects: &dyn ObjectResolver) -> DVec3 {
        self.look_at + tracked_offset(self.target_object, objects)
    }

    /// Builds the perspective projection and look-at view.
    pub fn resolve(&self, objects: &dyn ObjectResolver) -> ResolvedView {
        let eye = self.effective_eye(objects);
        let target = self.effective_target(objects);
        let projection =
            DMat4::perspective_rh_gl(self.fovy.to_radians(), self.aspect, self.z_near, self.z_far);
        let view = DMat4::look_at_rh(eye, target, self.up);
        ResolvedView {
            eye,
            target,
            up: self.up,
            projection,
            view,
        }
    }
}

fn tracked_offset(object: Option<ObjectHandle>, objects: &dyn ObjectResolver) -> DVec3 {
    object
        .and_then(|handle| objects.object_position(handle))
        .unwrap_or(DVec3::ZERO)
}
