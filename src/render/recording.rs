use std::collections::HashMap;
use std::sync::Arc;

use glam::{DMat4, Vec4};
use parking_lot::Mutex;

use crate::error::{RenderError, RenderResult};

use super::{
    BlendFactor, Capability, FramebufferHandle, FramebufferStatus, GpuBackend, MatrixMode,
    PixelFormat, QuadVertex, RenderbufferHandle, TextureHandle,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    SetBlendFunc(BlendFactor, BlendFactor),
    Enable(Capability),
    Disable(Capability),
    EnableTextureUnit(usize),
    DisableTextureUnit(usize),
    BindTexture {
        unit: usize,
        texture: Option<TextureHandle>,
    },
    PushMatrix(MatrixMode),
    PopMatrix(MatrixMode),
    LoadMatrix(MatrixMode, DMat4),
    MultiplyMatrix(MatrixMode, DMat4),
    DrawQuad([QuadVertex; 4]),
    Clear {
        color: Vec4,
        depth: bool,
    },
    SetViewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    CreateTexture {
        texture: TextureHandle,
        format: PixelFormat,
        width: u32,
        height: u32,
    },
    DeleteTexture(TextureHandle),
    CreateFramebuffer(FramebufferHandle),
    DeleteFramebuffer(FramebufferHandle),
    BindFramebuffer(Option<FramebufferHandle>),
    CreateRenderbuffer {
        renderbuffer: RenderbufferHandle,
        width: u32,
        height: u32,
    },
    DeleteRenderbuffer(RenderbufferHandle),
    AttachColorTexture(TextureHandle),
    AttachDepthTexture(TextureHandle),
    AttachDepthRenderbuffer(RenderbufferHandle),
    FramebufferStatus(FramebufferStatus),
    FinishFrame,
}

/// Shared view of the commands a [`RecordingBackend`] has received.
#[derive(Debug, Default, Clone)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<GpuCommand>>>,
}

impl CommandLog {
    pub fn snapshot(&self) -> Vec<GpuCommand> {
        self.commands.lock().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    /// Number of recorded commands matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&GpuCommand) -> bool) -> usize {
        self.commands.lock().iter().filter(|c| predicate(c)).count()
    }

    fn push(&self, command: GpuCommand) {
        self.commands.lock().push(command);
    }
}

/// Backend double that records every call instead of touching a GPU.
///
/// Handles are handed out sequentially starting at 1 and the matrix stacks
/// are tracked so tests can check balanced push/pop usage.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    log: CommandLog,
    next_handle: u32,
    bound_framebuffer: Option<FramebufferHandle>,
    forced_status: Option<FramebufferStatus>,
    stack_depth: HashMap<MatrixMode, usize>,
    max_stack_depth: HashMap<MatrixMode, usize>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that keeps observing this backend's commands after it
    /// has been boxed or moved into a renderer.
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    pub fn commands(&self) -> Vec<GpuCommand> {
        self.log.snapshot()
    }

    /// Makes every following completeness query report `status`.
    pub fn force_framebuffer_status(&mut self, status: FramebufferStatus) {
        self.forced_status = Some(status);
    }

    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.bound_framebuffer
    }

    /// Current push depth of the given matrix stack.
    pub fn matrix_stack_depth(&self, mode: MatrixMode) -> usize {
        self.stack_depth
            .get(&mode)
            .copied()
            .unwrap_or_default()
    }

    /// Deepest the given matrix stack has been since creation.
    pub fn max_matrix_stack_depth(&self, mode: MatrixMode) -> usize {
        self.max_stack_depth
            .get(&mode)
            .copied()
            .unwrap_or_default()
    }

    fn allocate(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl GpuBackend for RecordingBackend {
    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.log.push(GpuCommand::SetBlendFunc(src, dst));
    }

    fn enable(&mut self, capability: Capability) {
        self.log.push(GpuCommand::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.log.push(GpuCommand::Disable(capability));
    }

    fn enable_texture_unit(&mut self, unit: usize) {
        self.log.push(GpuCommand::EnableTextureUnit(unit));
    }

    fn disable_texture_unit(&mut self, unit: usize) {
        self.log.push(GpuCommand::DisableTextureUnit(unit));
    }

    fn bind_texture(&mut self, unit: usize, texture: Option<TextureHandle>) {
        self.log.push(GpuCommand::BindTexture { unit, texture });
    }

    fn push_matrix(&mut self, mode: MatrixMode) {
        let depth = self.stack_depth.entry(mode).or_default();
        *depth += 1;
        let depth = *depth;
        let max = self.max_stack_depth.entry(mode).or_default();
        *max = (*max).max(depth);
        self.log.push(GpuCommand::PushMatrix(mode));
    }

    fn pop_matrix(&mut self, mode: MatrixMode) {
        let depth = self.stack_depth.entry(mode).or_default();
        *depth = depth.saturating_sub(1);
        self.log.push(GpuCommand::PopMatrix(mode));
    }

    fn load_matrix(&mut self, mode: MatrixMode, matrix: DMat4) {
        self.log.push(GpuCommand::LoadMatrix(mode, matrix));
    }

    fn multiply_matrix(&mut self, mode: MatrixMode, matrix: DMat4) {
        self.log.push(GpuCommand::MultiplyMatrix(mode, matrix));
    }

    fn draw_quad(&mut self, vertices: &[QuadVertex; 4]) {
        self.log.push(GpuCommand::DrawQuad(*vertices));
    }

    fn clear(&mut self, color: Vec4, depth: bool) {
        self.log.push(GpuCommand::Clear { color, depth });
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.log.push(GpuCommand::SetViewport {
            x,
            y,
            width,
            height,
        });
    }

    fn create_texture(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<TextureHandle> {
        let texture = TextureHandle(self.allocate());
        self.log.push(GpuCommand::CreateTexture {
            texture,
            format,
            width,
            height,
        });
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.log.push(GpuCommand::DeleteTexture(texture));
    }

    fn create_framebuffer(&mut self) -> RenderResult<FramebufferHandle> {
        let framebuffer = FramebufferHandle(self.allocate());
        self.log.push(GpuCommand::CreateFramebuffer(framebuffer));
        Ok(framebuffer)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
        self.log.push(GpuCommand::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound_framebuffer = framebuffer;
        self.log.push(GpuCommand::BindFramebuffer(framebuffer));
    }

    fn create_renderbuffer(&mut self, width: u32, height: u32) -> RenderResult<RenderbufferHandle> {
        if width == 0 || height == 0 {
            return Err(RenderError::BackendAllocation(format!(
                "renderbuffer of {width}x{height} pixels"
            )));
        }
        let renderbuffer = RenderbufferHandle(self.allocate());
        self.log.push(GpuCommand::CreateRenderbuffer {
            renderbuffer,
            width,
            height,
        });
        Ok(renderbuffer)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        self.log.push(GpuCommand::DeleteRenderbuffer(renderbuffer));
    }

    fn attach_color_texture(&mut self, texture: TextureHandle) {
        self.log.push(GpuCommand::AttachColorTexture(texture));
    }

    fn attach_depth_texture(&mut self, texture: TextureHandle) {
        self.log.push(GpuCommand::AttachDepthTexture(texture));
    }

    fn attach_depth_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        self.log.push(GpuCommand::AttachDepthRenderbuffer(renderbuffer));
    }

    fn framebuffer_status(&mut self) -> FramebufferStatus {
        let status = match (self.bound_framebuffer, self.forced_status) {
            (None, _) => FramebufferStatus::Complete,
            (Some(_), Some(forced)) => forced,
            (Some(_), None) => FramebufferStatus::Complete,
        };
        self.log.push(GpuCommand::FramebufferStatus(status));
        status
    }

    fn finish_frame(&mut self) {
        self.log.push(GpuCommand::FinishFrame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_sequential_and_shared_across_kinds() {
        let mut backend = RecordingBackend::new();
        let texture = backend.create_texture(PixelFormat::Rgba, 4, 4).unwrap();
        let framebuffer = backend.create_framebuffer().unwrap();
        assert_eq!(texture, TextureHandle(1));
        assert_eq!(framebuffer, FramebufferHandle(2));
    }

    #[test]
    fn log_survives_moving_the_backend() {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let mut boxed: Box<dyn GpuBackend> = Box::new(backend);
        boxed.enable(Capability::Blend);
        assert_eq!(log.snapshot(), vec![GpuCommand::Enable(Capability::Blend)]);
    }

    #[test]
    fn forced_status_only_applies_to_bound_framebuffers() {
        let mut backend = RecordingBackend::new();
        backend.force_framebuffer_status(FramebufferStatus::MissingAttachment);
        assert_eq!(backend.framebuffer_status(), FramebufferStatus::Complete);
        let framebuffer = backend.create_framebuffer().unwrap();
        backend.bind_framebuffer(Some(framebuffer));
        assert_eq!(
            backend.framebuffer_status(),
            FramebufferStatus::MissingAttachment
        );
    }

    #[test]
    fn matrix_stack_depth_tracks_push_and_pop() {
        let mut backend = RecordingBackend::new();
        backend.push_matrix(MatrixMode::Projection);
        backend.push_matrix(MatrixMode::Projection);
        backend.pop_matrix(MatrixMode::Projection);
        assert_eq!(backend.matrix_stack_depth(MatrixMode::Projection), 1);
        assert_eq!(backend.max_matrix_stack_depth(MatrixMode::Projection), 2);
        assert_eq!(backend.matrix_stack_depth(MatrixMode::ModelView), 0);
    }
}
