//! Immediate-mode GPU backend interface.
//!
//! The rendering core only talks to the GPU through [`GpuBackend`]. The
//! operation set mirrors a fixed-function pipeline: blend and capability
//! state, per-unit texture binding, projection/model-view matrix stacks,
//! quad emission and framebuffer objects. [`RecordingBackend`] records the
//! calls for tests and headless runs, [`WgpuBackend`] renders them.

mod native;
mod recording;

use glam::{DMat4, DVec2, DVec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::RenderResult;

pub use native::WgpuBackend;
pub use recording::{CommandLog, GpuCommand, RecordingBackend};

/// Number of texture units a quad may sample from.
pub const MAX_TEXTURE_UNITS: usize = 4;

/// Backend texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureHandle(pub u32);

/// Backend framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FramebufferHandle(pub u32);

/// Backend depth renderbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderbufferHandle(pub u32);

/// Blend equation factors, numbered like their OpenGL enums so scripts can
/// pass the familiar constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
}

impl BlendFactor {
    pub const DEFAULT_SRC: Self = Self::SrcAlpha;
    pub const DEFAULT_DST: Self = Self::OneMinusSrcAlpha;

    pub const ALL: [Self; 11] = [
        Self::Zero,
        Self::One,
        Self::SrcColor,
        Self::OneMinusSrcColor,
        Self::SrcAlpha,
        Self::OneMinusSrcAlpha,
        Self::DstAlpha,
        Self::OneMinusDstAlpha,
        Self::DstColor,
        Self::OneMinusDstColor,
        Self::SrcAlphaSaturate,
    ];

    pub fn gl_enum(self) -> u32 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::SrcColor => 0x0300,
            Self::OneMinusSrcColor => 0x0301,
            Self::SrcAlpha => 0x0302,
            Self::OneMinusSrcAlpha => 0x0303,
            Self::DstAlpha => 0x0304,
            Self::OneMinusDstAlpha => 0x0305,
            Self::DstColor => 0x0306,
            Self::OneMinusDstColor => 0x0307,
            Self::SrcAlphaSaturate => 0x0308,
        }
    }

    pub fn from_gl_enum(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|factor| factor.gl_enum() == value)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Zero => "ZERO",
            Self::One => "ONE",
            Self::SrcColor => "SRC_COLOR",
            Self::OneMinusSrcColor => "ONE_MINUS_SRC_COLOR",
            Self::SrcAlpha => "SRC_ALPHA",
            Self::OneMinusSrcAlpha => "ONE_MINUS_SRC_ALPHA",
            Self::DstAlpha => "DST_ALPHA",
            Self::OneMinusDstAlpha => "ONE_MINUS_DST_ALPHA",
            Self::DstColor => "DST_COLOR",
            Self::OneMinusDstColor => "ONE_MINUS_DST_COLOR",
            Self::SrcAlphaSaturate => "SRC_ALPHA_SATURATE",
        }
    }
}

/// Toggleable pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    DepthTest,
}

/// Which matrix stack an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixMode {
    Projection,
    ModelView,
}

/// Pixel layout of a texture attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb,
    Rgba,
    Depth,
}

impl PixelFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth)
    }
}

/// Result of a framebuffer completeness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDimensions,
    Unsupported,
}

/// One corner of an emitted quad: a local-space position plus the texture
/// coordinate sampled on unit 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadVertex {
    pub position: DVec3,
    pub tex_coord: DVec2,
}

/// Immediate-mode GPU capability provider.
///
/// Texture, framebuffer and renderbuffer handles returned by this trait are
/// opaque to the caller. Attachments and the completeness query apply to the
/// currently bound framebuffer, as in OpenGL.
pub trait GpuBackend {
    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor);
    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);

    /// Enables 2D texturing on `unit`.
    fn enable_texture_unit(&mut self, unit: usize);
    /// Disables 2D texturing on `unit`.
    fn disable_texture_unit(&mut self, unit: usize);
    /// Binds `texture` (or nothing) to `unit`, making it the active unit.
    fn bind_texture(&mut self, unit: usize, texture: Option<TextureHandle>);

    fn push_matrix(&mut self, mode: MatrixMode);
    fn pop_matrix(&mut self, mode: MatrixMode);
    fn load_matrix(&mut self, mode: MatrixMode, matrix: DMat4);
    fn multiply_matrix(&mut self, mode: MatrixMode, matrix: DMat4);

    /// Emits a textured quad transformed by the current matrices.
    fn draw_quad(&mut self, vertices: &[QuadVertex; 4]);
    fn clear(&mut self, color: Vec4, depth: bool);
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    fn create_texture(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<TextureHandle>;
    fn delete_texture(&mut self, texture: TextureHandle);

    fn create_framebuffer(&mut self) -> RenderResult<FramebufferHandle>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);
    /// Binds `framebuffer`, or the default framebuffer when `None`.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    fn create_renderbuffer(&mut self, width: u32, height: u32) -> RenderResult<RenderbufferHandle>;
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle);

    fn attach_color_texture(&mut self, texture: TextureHandle);
    fn attach_depth_texture(&mut self, texture: TextureHandle);
    fn attach_depth_renderbuffer(&mut self, renderbuffer: RenderbufferHandle);
    fn framebuffer_status(&mut self) -> FramebufferStatus;

    /// Submits everything issued since the previous call.
    fn finish_frame(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_factors_round_trip_through_gl_enums() {
        for factor in BlendFactor::ALL {
            assert_eq!(BlendFactor::from_gl_enum(factor.gl_enum()), Some(factor));
        }
        assert_eq!(BlendFactor::from_gl_enum(0x0302), Some(BlendFactor::SrcAlpha));
        assert_eq!(BlendFactor::from_gl_enum(0xFFFF), None);
    }
}
