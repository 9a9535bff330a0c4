//! Per-texture draw state and the name-keyed texture registry.

use std::collections::HashMap;

use glam::DVec3;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::render::{BlendFactor, GpuBackend, PixelFormat, TextureHandle, MAX_TEXTURE_UNITS};

/// 2D anchoring rule applied to a quad's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    None,
    Center,
    HorizontalCenter,
    VerticalCenter,
    PivotLeftAnchor,
    PivotRightAnchor,
}

impl Alignment {
    /// Maps the numeric codes scripts use (0 = none … 5 = right anchor).
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::Center,
            2 => Self::HorizontalCenter,
            3 => Self::VerticalCenter,
            4 => Self::PivotLeftAnchor,
            5 => Self::PivotRightAnchor,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Center => 1,
            Self::HorizontalCenter => 2,
            Self::VerticalCenter => 3,
            Self::PivotLeftAnchor => 4,
            Self::PivotRightAnchor => 5,
        }
    }
}

/// Transform, UV window, blending and multi-texture setup of one texture.
///
/// While `perspective_3d` is false every depth-affecting field (`z`,
/// `pivot_z`, X/Y rotation) is held at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureDrawState {
    pub name: String,
    pub handle: TextureHandle,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub custom_width: u32,
    pub custom_height: u32,
    pub has_custom_dimensions: bool,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub pivot_x: f64,
    pub pivot_y: f64,
    pub pivot_z: f64,
    pub scale_w: f64,
    pub scale_h: f64,
    /// Rotation angles in degrees, one per axis.
    pub rotation_degrees: DVec3,
    /// Axis component each per-axis rotation is performed around.
    pub rotation_axis: DVec3,
    pub u_min: f64,
    pub v_min: f64,
    pub u_max: f64,
    pub v_max: f64,
    pub alignment: Alignment,
    pub perspective_3d: bool,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,
    /// Textures bound to units `0..MAX_TEXTURE_UNITS` while drawing.
    pub multi_texture: [Option<TextureHandle>; MAX_TEXTURE_UNITS],
}

impl TextureDrawState {
    /// State for a freshly allocated texture, sized against a canvas of
    /// `canvas` pixels (normally the screen).
    pub fn new(
        name: impl Into<String>,
        handle: TextureHandle,
        format: PixelFormat,
        (width, height): (u32, u32),
        (canvas_width, canvas_height): (u32, u32),
    ) -> Self {
        let mut multi_texture = [None; MAX_TEXTURE_UNITS];
        multi_texture[0] = Some(handle);
        let mut state = Self {
            name: name.into(),
            handle,
            format,
            width,
            height,
            custom_width: width,
            custom_height: height,
            has_custom_dimensions: false,
            canvas_width,
            canvas_height,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            pivot_x: 0.0,
            pivot_y: 0.0,
            pivot_z: 0.0,
            scale_w: 1.0,
            scale_h: 1.0,
            rotation_degrees: DVec3::ZERO,
            rotation_axis: DVec3::ZERO,
            u_min: 0.0,
            v_min: 0.0,
            u_max: 1.0,
            v_max: 1.0,
            alignment: Alignment::None,
            perspective_3d: false,
            blend_src: BlendFactor::DEFAULT_SRC,
            blend_dst: BlendFactor::DEFAULT_DST,
            multi_texture,
        };
        state.set_defaults();
        state
    }

    /// Switches between screen-space (2D) and world-space (3D) drawing.
    pub fn set_perspective_3d(&mut self, perspective_3d: bool) {
        self.perspective_3d = perspective_3d;
        if !perspective_3d {
            self.z = 0.0;
            self.pivot_z = 0.0;
            self.rotation_degrees.x = 0.0;
            self.rotation_degrees.y = 0.0;
            self.rotation_axis.x = 0.0;
            self.rotation_axis.y = 0.0;
        }
    }

    pub fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.blend_src = src;
        self.blend_dst = dst;
    }

    /// Overrides the drawn size. A zero component falls back to the natural
    /// size; `(0, 0)` removes the override entirely.
    pub fn set_custom_dimensions(&mut self, width: u32, height: u32) {
        self.custom_width = if width == 0 { self.width } else { width };
        self.custom_height = if height == 0 { self.height } else { height };
        self.has_custom_dimensions = !(width == 0 && height == 0);
    }

    pub fn set_canvas_dimensions(&mut self, width: u32, height: u32) {
        self.canvas_width = width;
        self.canvas_height = height;
    }

    pub fn set_uv_dimensions(&mut self, u_min: f64, v_min: f64, u_max: f64, v_max: f64) {
        self.u_min = u_min;
        self.v_min = v_min;
        self.u_max = u_max;
        self.v_max = v_max;
    }

    pub fn set_alignment(&mut self, alignment: Alignment) {
        self.alignment = alignment;
    }

    pub fn set_position(&mut self, x: f64, y: f64, z: f64) {
        self.x = x;
        self.y = y;
        self.z = if self.perspective_3d { z } else { 0.0 };
    }

    /// Sets the rotation/scale origin, in pixels from the quad centre.
    pub fn set_pivot(&mut self, x: f64, y: f64, z: f64) {
        self.pivot_x = x;
        self.pivot_y = y;
        self.pivot_z = if self.perspective_3d { z } else { 0.0 };
    }

    pub fn set_scale(&mut self, scale_w: f64, scale_h: f64) {
        self.scale_w = scale_w;
        self.scale_h = scale_h;
    }

    pub fn set_rotation(&mut self, degrees: DVec3, axis: DVec3) {
        self.rotation_degrees = degrees;
        self.rotation_axis = axis;
        if !self.perspective_3d {
            self.rotation_degrees.x = 0.0;
            self.rotation_degrees.y = 0.0;
            self.rotation_axis.x = 0.0;
            self.rotation_axis.y = 0.0;
        }
    }

    /// Assigns `texture` to texture unit `unit` for multi-texture draws.
    pub fn set_unit_texture(
        &mut self,
        unit: usize,
        texture: Option<TextureHandle>,
    ) -> RenderResult<()> {
        let slot = self.multi_texture.get_mut(unit).ok_or_else(|| {
            RenderError::InvalidArgument(format!(
                "texture unit {unit} is out of range 0..{MAX_TEXTURE_UNITS}"
            ))
        })?;
        *slot = texture;
        Ok(())
    }

    /// Restores blending, size, alignment and transform defaults.
    pub fn set_defaults(&mut self) {
        self.set_blend_func(BlendFactor::DEFAULT_SRC, BlendFactor::DEFAULT_DST);
        self.set_custom_dimensions(0, 0);
        self.set_alignment(Alignment::None);
        self.set_position(0.0, 0.0, 0.0);
        self.set_pivot(0.0, 0.0, 0.0);
        self.set_scale(1.0, 1.0);
        self.set_rotation(DVec3::ZERO, DVec3::ZERO);
    }

    /// Width and height the quad is drawn with before any 3D normalization.
    pub fn draw_size(&self) -> (u32, u32) {
        if self.has_custom_dimensions {
            (self.custom_width, self.custom_height)
        } else {
            (self.width, self.height)
        }
    }
}

/// Index of a texture in a [`TextureRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureId(pub usize);

/// Owns every texture's draw state, addressable by id or unique name.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    entries: Vec<Option<TextureDrawState>>,
    by_name: HashMap<String, TextureId>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `state` under its name. Names must be unique.
    pub fn register(&mut self, state: TextureDrawState) -> RenderResult<TextureId> {
        if state.name.is_empty() {
            return Err(RenderError::InvalidArgument(
                "texture name must not be empty".into(),
            ));
        }
        if self.by_name.contains_key(&state.name) {
            return Err(RenderError::InvalidArgument(format!(
                "texture '{}' is already registered",
                state.name
            )));
        }
        let id = TextureId(self.entries.len());
        self.by_name.insert(state.name.clone(), id);
        self.entries.push(Some(state));
        Ok(id)
    }

    /// Allocates a backend texture and registers default draw state for it.
    pub fn create(
        &mut self,
        backend: &mut dyn GpuBackend,
        name: &str,
        format: PixelFormat,
        size: (u32, u32),
        canvas: (u32, u32),
    ) -> RenderResult<TextureId> {
        if self.by_name.contains_key(name) {
            return Err(RenderError::InvalidArgument(format!(
                "texture '{name}' is already registered"
            )));
        }
        let handle = backend.create_texture(format, size.0, size.1)?;
        match self.register(TextureDrawState::new(name, handle, format, size, canvas)) {
            Ok(id) => Ok(id),
            Err(err) => {
                backend.delete_texture(handle);
                Err(err)
            }
        }
    }

    /// Removes the state and deletes its backend texture.
    pub fn unload(&mut self, backend: &mut dyn GpuBackend, id: TextureId) -> RenderResult<()> {
        let state = self.remove(id)?;
        backend.delete_texture(state.handle);
        Ok(())
    }

    pub fn find(&self, name: &str) -> RenderResult<TextureId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RenderError::NotFound {
                kind: "texture",
                name: name.to_string(),
            })
    }

    pub fn get(&self, id: TextureId) -> RenderResult<&TextureDrawState> {
        self.entries
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| missing(id))
    }

    pub fn get_mut(&mut self, id: TextureId) -> RenderResult<&mut TextureDrawState> {
        self.entries
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| missing(id))
    }

    /// Drops the state and frees its name. The caller deletes the backend
    /// texture.
    pub fn remove(&mut self, id: TextureId) -> RenderResult<TextureDrawState> {
        let state = self
            .entries
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| missing(id))?;
        self.by_name.remove(&state.name);
        debug!("Cleaning texture '{}' ({:?})", state.name, state.handle);
        Ok(state)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &TextureDrawState)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.as_ref().map(|state| (TextureId(index), state)))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn missing(id: TextureId) -> RenderError {
    RenderError::InvalidState(format!("texture {} is not loaded", id.0))
}
