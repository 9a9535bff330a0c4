//! Named off-screen render targets.
//!
//! A [`RenderTarget`] owns a color texture, an optional depth texture and the
//! backend framebuffer they are attached to. Targets may render into only a
//! fraction of their allocation; the textures' UV window is kept in sync so
//! sampling a target reads just the rendered region.

use std::collections::HashMap;

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::render::{
    FramebufferHandle, FramebufferStatus, GpuBackend, PixelFormat, RenderbufferHandle,
};
use crate::texture::{Alignment, TextureId, TextureRegistry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderTarget {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub render_width_percent: f64,
    pub render_height_percent: f64,
    pub color: Option<TextureId>,
    pub depth: Option<TextureId>,
    pub color_format: PixelFormat,
    pub depth_format: PixelFormat,
    /// Whether the next generation allocates a sampleable depth texture.
    pub store_depth: bool,
    pub framebuffer: Option<FramebufferHandle>,
    pub depth_renderbuffer: Option<RenderbufferHandle>,
}

impl RenderTarget {
    fn new(name: &str, (width, height): (u32, u32)) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            render_width_percent: 1.0,
            render_height_percent: 1.0,
            color: None,
            depth: None,
            color_format: PixelFormat::Rgba,
            depth_format: PixelFormat::Depth,
            store_depth: false,
            framebuffer: None,
            depth_renderbuffer: None,
        }
    }

    /// Rendered width: base width scaled by the render percentage, truncated.
    pub fn effective_width(&self) -> u32 {
        (f64::from(self.width) * self.render_width_percent) as u32
    }

    pub fn effective_height(&self) -> u32 {
        (f64::from(self.height) * self.render_height_percent) as u32
    }

    pub fn is_generated(&self) -> bool {
        self.framebuffer.is_some()
    }

    fn texture_name(&self, kind: &str) -> String {
        format!("{}.{kind}.fbo", self.name)
    }

    fn sync_uv_window(&self, textures: &mut TextureRegistry) -> RenderResult<()> {
        for id in [self.color, self.depth].into_iter().flatten() {
            textures.get_mut(id)?.set_uv_dimensions(
                0.0,
                0.0,
                self.render_width_percent,
                self.render_height_percent,
            );
        }
        Ok(())
    }
}

/// Index of a render target in a [`RenderTargetRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderTargetId(pub usize);

/// Name-keyed store of render targets.
#[derive(Debug, Default)]
pub struct RenderTargetRegistry {
    entries: Vec<Option<RenderTarget>>,
    by_name: HashMap<String, RenderTargetId>,
}

impl RenderTargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the target called `name`, creating it at `screen_size` with
    /// full render area, RGBA color and no depth storage if it is unknown.
    pub fn get_or_create(
        &mut self,
        name: &str,
        screen_size: (u32, u32),
    ) -> RenderResult<RenderTargetId> {
        if name.is_empty() {
            return Err(RenderError::InvalidArgument(
                "render target name must not be empty".into(),
            ));
        }
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        let id = RenderTargetId(self.entries.len());
        self.entries.push(Some(RenderTarget::new(name, screen_size)));
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn find(&self, name: &str) -> RenderResult<RenderTargetId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RenderError::NotFound {
                kind: "render target",
                name: name.to_string(),
            })
    }

    pub fn get(&self, id: RenderTargetId) -> RenderResult<&RenderTarget> {
        self.entries
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| missing(id))
    }

    pub fn get_mut(&mut self, id: RenderTargetId) -> RenderResult<&mut RenderTarget> {
        self.entries
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| missing(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (RenderTargetId, &RenderTarget)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.as_ref().map(|target| (RenderTargetId(index), target)))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Sets the base size. Takes effect at the next generation.
    pub fn set_dimensions(&mut self, id: RenderTargetId, width: u32, height: u32) -> RenderResult<()> {
        let target = self.get_mut(id)?;
        target.width = width;
        target.height = height;
        Ok(())
    }

    /// Sets the rendered fraction of the allocation. Both percentages must
    /// lie in `(0, 1]`; on failure the previous values are kept.
    pub fn set_render_dimensions(
        &mut self,
        id: RenderTargetId,
        width_percent: f64,
        height_percent: f64,
        textures: &mut TextureRegistry,
    ) -> RenderResult<()> {
        for (axis, value) in [("width", width_percent), ("height", height_percent)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(RenderError::InvalidArgument(format!(
                    "render {axis} percentage must be in (0, 1], got {value}"
                )));
            }
        }
        let target = self.get_mut(id)?;
        target.render_width_percent = width_percent;
        target.render_height_percent = height_percent;
        target.sync_uv_window(textures)
    }

    pub fn store_depth(&mut self, id: RenderTargetId, enabled: bool) -> RenderResult<()> {
        self.get_mut(id)?.store_depth = enabled;
        Ok(())
    }

    /// (Re)allocates the target's textures and framebuffer.
    ///
    /// Color-backed targets always get a depth renderbuffer so depth testing
    /// works without a stored depth texture. Returns
    /// [`RenderError::IncompleteFramebuffer`] when the backend rejects the
    /// result; the partially built objects stay attached to the target.
    pub fn generate_framebuffer(
        &mut self,
        id: RenderTargetId,
        backend: &mut dyn GpuBackend,
        textures: &mut TextureRegistry,
        canvas: (u32, u32),
    ) -> RenderResult<()> {
        let target = self.get_mut(id)?;
        let size = (target.effective_width(), target.effective_height());
        if size.0 == 0 || size.1 == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "render target '{}' has an empty effective size {}x{}",
                target.name, size.0, size.1
            )));
        }
        debug!(
            "Generating render target '{}' at {}x{} (store depth: {})",
            target.name, size.0, size.1, target.store_depth
        );

        if let Some(old) = target.color.take() {
            textures.unload(backend, old)?;
        }
        if let Some(old) = target.depth.take() {
            textures.unload(backend, old)?;
        }

        let color_name = target.texture_name("color");
        let color = textures.create(backend, &color_name, target.color_format, size, canvas)?;
        textures.get_mut(color)?.set_alignment(Alignment::Center);
        target.color = Some(color);

        if target.store_depth {
            let depth_name = target.texture_name("depth");
            let depth = textures.create(backend, &depth_name, target.depth_format, size, canvas)?;
            textures.get_mut(depth)?.set_alignment(Alignment::Center);
            target.depth = Some(depth);
        }
        target.sync_uv_window(textures)?;

        if let Some(old) = target.framebuffer.take() {
            backend.delete_framebuffer(old);
        }
        if let Some(old) = target.depth_renderbuffer.take() {
            backend.delete_renderbuffer(old);
        }

        let framebuffer = backend.create_framebuffer()?;
        target.framebuffer = Some(framebuffer);
        backend.bind_framebuffer(Some(framebuffer));

        if let Some(color) = target.color {
            let renderbuffer = backend.create_renderbuffer(size.0, size.1)?;
            target.depth_renderbuffer = Some(renderbuffer);
            backend.attach_depth_renderbuffer(renderbuffer);
            backend.attach_color_texture(textures.get(color)?.handle);
        }
        if let Some(depth) = target.depth {
            backend.attach_depth_texture(textures.get(depth)?.handle);
        }

        let status = backend.framebuffer_status();
        backend.bind_framebuffer(None);

        if status != FramebufferStatus::Complete {
            error!(
                "Render target '{}' framebuffer is incomplete: {:?}",
                target.name, status
            );
            return Err(RenderError::IncompleteFramebuffer {
                name: target.name.clone(),
                status,
            });
        }
        Ok(())
    }

    /// Directs subsequent draws into `target`, or the default framebuffer.
    pub fn bind(
        &self,
        target: Option<RenderTargetId>,
        backend: &mut dyn GpuBackend,
    ) -> RenderResult<()> {
        let framebuffer = match target {
            Some(id) => self.get(id)?.framebuffer,
            None => None,
        };
        backend.bind_framebuffer(framebuffer);
        Ok(())
    }

    /// Exposes the color texture on unit 0 and the depth texture on unit 1.
    /// `None` unbinds and disables both units.
    pub fn bind_textures(
        &self,
        target: Option<RenderTargetId>,
        backend: &mut dyn GpuBackend,
        textures: &TextureRegistry,
    ) -> RenderResult<()> {
        let Some(id) = target else {
            for unit in [1, 0] {
                backend.bind_texture(unit, None);
                backend.disable_texture_unit(unit);
            }
            return Ok(());
        };

        let target = self.get(id)?;
        let handle_of = |texture: Option<TextureId>| -> RenderResult<_> {
            texture
                .map(|texture| textures.get(texture).map(|state| state.handle))
                .transpose()
        };
        let depth = handle_of(target.depth)?;
        let color = handle_of(target.color)?;

        backend.enable_texture_unit(1);
        backend.bind_texture(1, depth);
        backend.enable_texture_unit(0);
        backend.bind_texture(0, color);
        Ok(())
    }

    /// Releases the target's backend objects and textures and frees its name.
    pub fn deinit(
        &mut self,
        id: RenderTargetId,
        backend: &mut dyn GpuBackend,
        textures: &mut TextureRegistry,
    ) -> RenderResult<()> {
        let target = self
            .entries
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| missing(id))?;
        self.by_name.remove(&target.name);
        debug!("Deinitializing render target '{}'", target.name);

        backend.bind_framebuffer(None);
        if let Some(renderbuffer) = target.depth_renderbuffer {
            backend.delete_renderbuffer(renderbuffer);
        }
        if let Some(framebuffer) = target.framebuffer {
            backend.delete_framebuffer(framebuffer);
        }
        for texture in [target.color, target.depth].into_iter().flatten() {
            match textures.unload(backend, texture) {
                Ok(()) => {}
                // Unloaded directly through the texture registry.
                Err(RenderError::InvalidState(_)) => {
                    debug!("Texture {} of '{}' already released", texture.0, target.name);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

fn missing(id: RenderTargetId) -> RenderError {
    RenderError::InvalidState(format!("render target {} does not exist", id.0))
}
