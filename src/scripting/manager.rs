use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use mlua::{Function, HookTriggers, Lua};
use parking_lot::Mutex;

use crate::renderer::Renderer;

use super::bindings::{register_globals, ScriptContext};

/// Drives a demo script against a shared renderer.
///
/// The script's top level runs once on load. Afterwards every frame calls the
/// global `render(frame)` when the script defines one and then closes the
/// frame on the renderer.
pub struct ScriptHost {
    lua: Lua,
    renderer: Arc<Mutex<Renderer>>,
    running: Arc<AtomicBool>,
    name: String,
}

impl ScriptHost {
    pub fn new(renderer: Arc<Mutex<Renderer>>) -> Result<Self> {
        let lua = Lua::new();
        let running = Arc::new(AtomicBool::new(true));
        let hook_running = Arc::clone(&running);
        lua.set_hook(
            HookTriggers {
                every_nth_instruction: Some(1000),
                ..Default::default()
            },
            move |_, _| {
                if !hook_running.load(Ordering::Acquire) {
                    Err(mlua::Error::RuntimeError("script stopped by host".into()))
                } else {
                    Ok(())
                }
            },
        );

        let context = ScriptContext::new(Arc::clone(&renderer));
        register_globals(&lua, &context)?;
        Ok(Self {
            lua,
            renderer,
            running,
            name: String::from("<none>"),
        })
    }

    pub fn renderer(&self) -> &Arc<Mutex<Renderer>> {
        &self.renderer
    }

    /// Flag checked every thousand instructions; clearing it aborts the script.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        self.load_source(&path.display().to_string(), &source)
    }

    pub fn load_source(&mut self, name: &str, source: &str) -> Result<()> {
        info!("Loading script {name}");
        self.name = name.to_string();
        self.lua
            .load(source)
            .set_name(name)
            .exec()
            .map_err(anyhow::Error::from)
            .with_context(|| format!("Lua runtime error in {name}"))
    }

    pub fn has_render_function(&self) -> Result<bool> {
        let render: Option<Function> = self.lua.globals().get("render")?;
        Ok(render.is_some())
    }

    /// Runs one frame. The renderer lock is not held while Lua executes.
    pub fn run_frame(&mut self, frame: u64) -> Result<()> {
        let render: Option<Function> = self.lua.globals().get("render")?;
        if let Some(render) = render {
            render
                .call::<_, ()>(frame)
                .map_err(anyhow::Error::from)
                .with_context(|| format!("Lua runtime error in {} at frame {frame}", self.name))?;
        }
        self.renderer.lock().end_frame();
        Ok(())
    }

    pub fn run_frames(&mut self, frames: u32) -> Result<()> {
        debug!("Running {frames} frames of {}", self.name);
        for frame in 0..u64::from(frames) {
            self.run_frame(frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectTable;
    use crate::render::{GpuCommand, RecordingBackend};
    use crate::screen::StaticScreen;
    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use std::io::Write;

    static OVERLAY_SCRIPT: Lazy<String> = Lazy::new(|| {
        r#"
        local scene = fbo.init("scene")
        fbo.storeDepth(scene, true)
        fbo.generate(scene)
        local logo = texture.create("logo", FORMAT_RGBA, 64, 64)
        texture.setAlignment(logo, ALIGN_CENTER)

        function render(frame)
            camera.setPosition(0, 0, 2 + frame)
            fbo.bind(scene)
            fbo.bind(nil)
            texture.draw(logo)
        end
        "#
        .to_string()
    });

    fn host() -> (ScriptHost, crate::render::CommandLog) {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let renderer = Renderer::new(
            Box::new(backend),
            Arc::new(StaticScreen::new(640, 480)),
            ObjectTable::new(),
        );
        (ScriptHost::new(Arc::new(Mutex::new(renderer))).unwrap(), log)
    }

    #[test]
    fn script_file_renders_every_frame() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(OVERLAY_SCRIPT.as_bytes()).unwrap();

        let (mut host, log) = host();
        host.load_file(tmp.path()).unwrap();
        assert!(host.has_render_function().unwrap());
        host.run_frames(3).unwrap();

        let renderer = host.renderer().lock();
        assert_eq!(renderer.frames(), 3);
        assert_eq!(renderer.camera().position.z, 4.0);
        assert_eq!(
            log.count(|command| matches!(command, GpuCommand::DrawQuad(_))),
            3
        );
        assert_eq!(
            log.count(|command| matches!(command, GpuCommand::FinishFrame)),
            3
        );
    }

    #[test]
    fn script_without_render_still_counts_frames() {
        let (mut host, _) = host();
        host.load_source("setup", "camera.setLookAt(1, 0, 0)").unwrap();
        assert!(!host.has_render_function().unwrap());
        host.run_frames(2).unwrap();
        assert_eq!(host.renderer().lock().frames(), 2);
    }

    #[test]
    fn runtime_errors_carry_script_name() {
        let (mut host, _) = host();
        let err = host
            .load_source("broken.lua", "fbo.bind(42)")
            .unwrap_err();
        assert!(format!("{err:#}").contains("broken.lua"));
    }

    #[test]
    fn cleared_running_flag_stops_script() {
        let (mut host, _) = host();
        host.running_flag().store(false, Ordering::Release);
        let err = host
            .load_source("spin", "while true do end")
            .unwrap_err();
        assert!(format!("{err:#}").contains("stopped by host"));
    }

    #[test]
    fn missing_file_is_reported() {
        let (mut host, _) = host();
        let err = host.load_file("/nonexistent/demo.lua").unwrap_err();
        assert!(err.to_string().contains("failed to read script"));
    }
}
