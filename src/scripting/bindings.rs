use std::sync::Arc;

use glam::DVec3;
use log::info;
use mlua::{Lua, Result as LuaResult, Value, Variadic};
use parking_lot::Mutex;

use crate::error::RenderError;
use crate::fbo::RenderTargetId;
use crate::objects::ObjectHandle;
use crate::render::{BlendFactor, PixelFormat};
use crate::renderer::Renderer;
use crate::texture::{Alignment, TextureDrawState, TextureId};

pub(super) struct ScriptContext {
    pub renderer: Arc<Mutex<Renderer>>,
}

impl ScriptContext {
    pub fn new(renderer: Arc<Mutex<Renderer>>) -> Self {
        Self { renderer }
    }
}

impl Clone for ScriptContext {
    fn clone(&self) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
        }
    }
}

pub(super) fn register_globals(lua: &Lua, context: &ScriptContext) -> LuaResult<()> {
    register_print(lua)?;
    register_constants(lua)?;
    register_camera(lua, context)?;
    register_graphics(lua, context)?;
    register_fbo(lua, context)?;
    register_texture(lua, context)?;
    register_objects(lua, context)?;
    Ok(())
}

fn register_print(lua: &Lua) -> LuaResult<()> {
    let print = lua.create_function(|lua, values: Variadic<Value>| {
        let mut out = Vec::new();
        for value in values.iter() {
            let text = match value {
                Value::Nil => "nil".to_string(),
                Value::Boolean(b) => b.to_string(),
                Value::String(s) => s.to_str()?.to_string(),
                _ => match lua.coerce_string(value.clone())? {
                    Some(s) => s.to_str()?.to_string(),
                    None => format!("{:?}", value),
                },
            };
            out.push(text);
        }
        info!("[Lua] {}", out.join("\t"));
        Ok(())
    })?;
    lua.globals().set("print", print)?;
    Ok(())
}

fn register_constants(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();
    let alignments = [
        ("ALIGN_NONE", Alignment::None),
        ("ALIGN_CENTER", Alignment::Center),
        ("ALIGN_HORIZONTAL_CENTER", Alignment::HorizontalCenter),
        ("ALIGN_VERTICAL_CENTER", Alignment::VerticalCenter),
        ("ALIGN_PIVOT_LEFT", Alignment::PivotLeftAnchor),
        ("ALIGN_PIVOT_RIGHT", Alignment::PivotRightAnchor),
    ];
    for (name, alignment) in alignments {
        globals.set(name, alignment.code())?;
    }
    for format in [PixelFormat::Rgb, PixelFormat::Rgba, PixelFormat::Depth] {
        globals.set(format_constant(format), format_code(format))?;
    }
    for factor in BlendFactor::ALL {
        globals.set(format!("GL_{}", factor.name()), factor.gl_enum())?;
    }
    Ok(())
}

fn register_camera(lua: &Lua, context: &ScriptContext) -> LuaResult<()> {
    let camera = lua.create_table()?;

    let ctx = context.clone();
    camera.set(
        "setPosition",
        lua.create_function(move |_, (x, y, z): (f64, f64, f64)| {
            ctx.renderer.lock().set_camera_position(x, y, z);
            Ok(())
        })?,
    )?;
    let ctx = context.clone();
    camera.set(
        "setLookAt",
        lua.create_function(move |_, (x, y, z): (f64, f64, f64)| {
            ctx.renderer.lock().set_camera_look_at(x, y, z);
            Ok(())
        })?,
    )?;
    let ctx = context.clone();
    camera.set(
        "setUpVector",
        lua.create_function(move |_, (x, y, z): (f64, f64, f64)| {
            ctx.renderer.lock().set_camera_up_vector(x, y, z);
            Ok(())
        })?,
    )?;
    let ctx = context.clone();
    camera.set(
        "setPerspective",
        lua.create_function(move |_, (fovy, aspect, near, far): (f64, f64, f64, f64)| {
            ctx.renderer
                .lock()
                .set_camera_perspective(fovy, aspect, near, far)
                .map_err(mlua::Error::external)
        })?,
    )?;

    let ctx = context.clone();
    camera.set(
        "getPosition",
        lua.create_function(move |_, ()| Ok(components(ctx.renderer.lock().camera().position)))?,
    )?;
    let ctx = context.clone();
    camera.set(
        "getLookAt",
        lua.create_function(move |_, ()| Ok(components(ctx.renderer.lock().camera().look_at)))?,
    )?;
    let ctx = context.clone();
    camera.set(
        "getUpVector",
        lua.create_function(move |_, ()| Ok(components(ctx.renderer.lock().camera().up)))?,
    )?;
    let ctx = context.clone();
    camera.set(
        "getPerspective",
        lua.create_function(move |_, ()| {
            let renderer = ctx.renderer.lock();
            let camera = renderer.camera();
            Ok((camera.fovy, camera.aspect, camera.z_near, camera.z_far))
        })?,
    )?;

    let ctx = context.clone();
    camera.set(
        "setPositionObject",
        lua.create_function(move |_, handle: Option<i64>| {
            ctx.renderer
                .lock()
                .set_camera_position_object(handle.map(object_handle));
            Ok(())
        })?,
    )?;
    let ctx = context.clone();
    camera.set(
        "setTargetObject",
        lua.create_function(move |_, handle: Option<i64>| {
            ctx.renderer
                .lock()
                .set_camera_target_object(handle.map(object_handle));
            Ok(())
        })?,
    )?;

    let ctx = context.clone();
    camera.set(
        "project",
        lua.create_function(move |_, (x, y, z): (f64, f64, f64)| {
            Ok(ctx
                .renderer
                .lock()
                .project(DVec3::new(x, y, z))
                .map_or((None, None), |point| (Some(point.x), Some(point.y))))
        })?,
    )?;

    lua.globals().set("camera", camera)?;
    Ok(())
}

fn register_graphics(lua: &Lua, context: &ScriptContext) -> LuaResult<()> {
    let graphics = lua.create_table()?;

    let ctx = context.clone();
    graphics.set(
        "begin2D",
        lua.create_function(move |_, (width, height): (Option<u32>, Option<u32>)| {
            let mut renderer = ctx.renderer.lock();
            let (screen_width, screen_height) = renderer.screen_size();
            renderer.enter_2d(width.unwrap_or(screen_width), height.unwrap_or(screen_height));
            Ok(())
        })?,
    )?;
    let ctx = context.clone();
    graphics.set(
        "end2D",
        lua.create_function(move |_, ()| {
            ctx.renderer.lock().exit_2d();
            Ok(())
        })?,
    )?;
    let ctx = context.clone();
    graphics.set(
        "depth2D",
        lua.create_function(move |_, ()| Ok(ctx.renderer.lock().depth_2d()))?,
    )?;
    let ctx = context.clone();
    graphics.set(
        "viewReset",
        lua.create_function(move |_, ()| {
            ctx.renderer.lock().rebuild_3d_view();
            Ok(())
        })?,
    )?;
    let ctx = context.clone();
    graphics.set(
        "setClearColor",
        lua.create_function(move |_, (r, g, b, a): (f32, f32, f32, Option<f32>)| {
            ctx.renderer.lock().set_clear_color(r, g, b, a.unwrap_or(1.0));
            Ok(())
        })?,
    )?;
    let ctx = context.clone();
    graphics.set(
        "updateViewport",
        lua.create_function(move |_, target: Option<usize>| {
            ctx.renderer
                .lock()
                .update_viewport(target.map(RenderTargetId))
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    graphics.set(
        "resetViewport",
        lua.create_function(move |_, ()| {
            ctx.renderer.lock().reset_viewport();
            Ok(())
        })?,
    )?;
    let ctx = context.clone();
    graphics.set(
        "getScreenSize",
        lua.create_function(move |_, ()| Ok(ctx.renderer.lock().screen_size()))?,
    )?;

    lua.globals().set("graphics", graphics)?;
    Ok(())
}

fn register_fbo(lua: &Lua, context: &ScriptContext) -> LuaResult<()> {
    let fbo = lua.create_table()?;

    let ctx = context.clone();
    fbo.set(
        "init",
        lua.create_function(move |_, name: String| {
            ctx.renderer
                .lock()
                .fbo_init(&name)
                .map(|id| id.0)
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "find",
        lua.create_function(move |_, name: String| {
            Ok(ctx.renderer.lock().fbo_find(&name).ok().map(|id| id.0))
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "setDimensions",
        lua.create_function(move |_, (id, width, height): (usize, u32, u32)| {
            ctx.renderer
                .lock()
                .fbo_set_dimensions(RenderTargetId(id), width, height)
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "setRenderDimensions",
        lua.create_function(move |_, (id, width, height): (usize, f64, f64)| {
            ctx.renderer
                .lock()
                .fbo_set_render_dimensions(RenderTargetId(id), width, height)
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "storeDepth",
        lua.create_function(move |_, (id, enabled): (usize, bool)| {
            ctx.renderer
                .lock()
                .fbo_store_depth(RenderTargetId(id), enabled)
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "generate",
        lua.create_function(move |_, id: usize| {
            match ctx.renderer.lock().fbo_generate(RenderTargetId(id)) {
                Ok(()) => Ok(true),
                Err(RenderError::IncompleteFramebuffer { .. }) => Ok(false),
                Err(err) => Err(mlua::Error::external(err)),
            }
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "bind",
        lua.create_function(move |_, id: Option<usize>| {
            ctx.renderer
                .lock()
                .fbo_bind(id.map(RenderTargetId))
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "bindTextures",
        lua.create_function(move |_, id: Option<usize>| {
            ctx.renderer
                .lock()
                .fbo_bind_textures(id.map(RenderTargetId))
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "deinit",
        lua.create_function(move |_, id: usize| {
            ctx.renderer
                .lock()
                .fbo_deinit(RenderTargetId(id))
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "colorTexture",
        lua.create_function(move |_, id: usize| {
            ctx.renderer
                .lock()
                .fbo_color_texture(RenderTargetId(id))
                .map(|texture| texture.0)
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "depthTexture",
        lua.create_function(move |_, id: usize| {
            ctx.renderer
                .lock()
                .fbo_depth_texture(RenderTargetId(id))
                .map(|texture| texture.0)
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    fbo.set(
        "getEffectiveSize",
        lua.create_function(move |_, id: usize| {
            let renderer = ctx.renderer.lock();
            let target = renderer
                .fbo(RenderTargetId(id))
                .map_err(mlua::Error::external)?;
            Ok((target.effective_width(), target.effective_height()))
        })?,
    )?;

    lua.globals().set("fbo", fbo)?;
    Ok(())
}

fn register_texture(lua: &Lua, context: &ScriptContext) -> LuaResult<()> {
    let texture = lua.create_table()?;

    let ctx = context.clone();
    texture.set(
        "create",
        lua.create_function(
            move |_, (name, format, width, height): (String, u32, u32, u32)| {
                let format = format_from_code(format)?;
                ctx.renderer
                    .lock()
                    .create_texture(&name, format, width, height)
                    .map(|id| id.0)
                    .map_err(mlua::Error::external)
            },
        )?,
    )?;
    let ctx = context.clone();
    texture.set(
        "find",
        lua.create_function(move |_, name: String| {
            Ok(ctx.renderer.lock().texture_find(&name).ok().map(|id| id.0))
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "unload",
        lua.create_function(move |_, id: usize| {
            ctx.renderer
                .lock()
                .unload_texture(TextureId(id))
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "draw",
        lua.create_function(move |_, id: usize| {
            ctx.renderer
                .lock()
                .draw_texture(TextureId(id))
                .map(|_| ())
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "getSize",
        lua.create_function(move |_, id: usize| {
            let renderer = ctx.renderer.lock();
            let state = renderer
                .texture(TextureId(id))
                .map_err(mlua::Error::external)?;
            Ok((state.width, state.height))
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setSizeToScreenSize",
        lua.create_function(move |_, id: usize| {
            ctx.renderer
                .lock()
                .set_texture_size_to_screen_size(TextureId(id))
                .map_err(mlua::Error::external)
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setUnitTexture",
        lua.create_function(move |_, (id, unit, other): (usize, usize, Option<usize>)| {
            ctx.renderer
                .lock()
                .set_texture_unit_texture(TextureId(id), unit, other.map(TextureId))
                .map_err(mlua::Error::external)
        })?,
    )?;

    let ctx = context.clone();
    texture.set(
        "setPosition",
        lua.create_function(move |_, (id, x, y, z): (usize, f64, f64, Option<f64>)| {
            update_texture(&ctx, id, |state| state.set_position(x, y, z.unwrap_or(0.0)))
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setPivot",
        lua.create_function(move |_, (id, x, y, z): (usize, f64, f64, Option<f64>)| {
            update_texture(&ctx, id, |state| state.set_pivot(x, y, z.unwrap_or(0.0)))
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setScale",
        lua.create_function(move |_, (id, width, height): (usize, f64, f64)| {
            update_texture(&ctx, id, |state| state.set_scale(width, height))
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setRotation",
        lua.create_function(
            move |_,
                  (id, degrees_x, degrees_y, degrees_z, axis_x, axis_y, axis_z): (
                usize,
                f64,
                f64,
                f64,
                Option<f64>,
                Option<f64>,
                Option<f64>,
            )| {
                let degrees = DVec3::new(degrees_x, degrees_y, degrees_z);
                let axis = DVec3::new(
                    axis_x.unwrap_or(1.0),
                    axis_y.unwrap_or(1.0),
                    axis_z.unwrap_or(1.0),
                );
                update_texture(&ctx, id, |state| state.set_rotation(degrees, axis))
            },
        )?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setAlignment",
        lua.create_function(move |_, (id, code): (usize, u32)| {
            let alignment = Alignment::from_code(code).ok_or_else(|| {
                mlua::Error::external(RenderError::InvalidArgument(format!(
                    "unknown alignment {code}"
                )))
            })?;
            update_texture(&ctx, id, |state| state.set_alignment(alignment))
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setPerspective3d",
        lua.create_function(move |_, (id, enabled): (usize, bool)| {
            update_texture(&ctx, id, |state| state.set_perspective_3d(enabled))
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setBlendFunc",
        lua.create_function(move |_, (id, src, dst): (usize, u32, u32)| {
            let src = blend_from_enum(src)?;
            let dst = blend_from_enum(dst)?;
            update_texture(&ctx, id, |state| state.set_blend_func(src, dst))
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setCustomDimensions",
        lua.create_function(move |_, (id, width, height): (usize, u32, u32)| {
            update_texture(&ctx, id, |state| state.set_custom_dimensions(width, height))
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setCanvasDimensions",
        lua.create_function(move |_, (id, width, height): (usize, u32, u32)| {
            update_texture(&ctx, id, |state| state.set_canvas_dimensions(width, height))
        })?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setUvDimensions",
        lua.create_function(
            move |_, (id, u_min, v_min, u_max, v_max): (usize, f64, f64, f64, f64)| {
                update_texture(&ctx, id, |state| {
                    state.set_uv_dimensions(u_min, v_min, u_max, v_max)
                })
            },
        )?,
    )?;
    let ctx = context.clone();
    texture.set(
        "setDefaults",
        lua.create_function(move |_, id: usize| {
            update_texture(&ctx, id, TextureDrawState::set_defaults)
        })?,
    )?;

    lua.globals().set("texture", texture)?;
    Ok(())
}

fn register_objects(lua: &Lua, context: &ScriptContext) -> LuaResult<()> {
    let objects = lua.create_table()?;

    let ctx = context.clone();
    objects.set(
        "add",
        lua.create_function(move |_, (name, x, y, z): (String, f64, f64, f64)| {
            let table = ctx.renderer.lock().objects().clone();
            Ok(table.insert(name, DVec3::new(x, y, z)).to_bits() as i64)
        })?,
    )?;
    let ctx = context.clone();
    objects.set(
        "find",
        lua.create_function(move |_, name: String| {
            let table = ctx.renderer.lock().objects().clone();
            Ok(table.find(&name).map(|handle| handle.to_bits() as i64))
        })?,
    )?;
    let ctx = context.clone();
    objects.set(
        "setPosition",
        lua.create_function(move |_, (handle, x, y, z): (i64, f64, f64, f64)| {
            let table = ctx.renderer.lock().objects().clone();
            Ok(table.set_position(object_handle(handle), DVec3::new(x, y, z)))
        })?,
    )?;
    let ctx = context.clone();
    objects.set(
        "getPosition",
        lua.create_function(move |_, handle: i64| {
            let table = ctx.renderer.lock().objects().clone();
            Ok(match table.get(object_handle(handle)) {
                Some(object) => {
                    let (x, y, z) = components(object.position);
                    (Some(x), Some(y), Some(z))
                }
                None => (None, None, None),
            })
        })?,
    )?;
    let ctx = context.clone();
    objects.set(
        "remove",
        lua.create_function(move |_, handle: i64| {
            let table = ctx.renderer.lock().objects().clone();
            Ok(table.remove(object_handle(handle)).is_some())
        })?,
    )?;

    lua.globals().set("objects", objects)?;
    Ok(())
}

fn update_texture(
    context: &ScriptContext,
    id: usize,
    update: impl FnOnce(&mut TextureDrawState),
) -> LuaResult<()> {
    let mut renderer = context.renderer.lock();
    let state = renderer
        .texture_mut(TextureId(id))
        .map_err(mlua::Error::external)?;
    update(state);
    Ok(())
}

fn components(vector: DVec3) -> (f64, f64, f64) {
    (vector.x, vector.y, vector.z)
}

fn object_handle(bits: i64) -> ObjectHandle {
    ObjectHandle::from_bits(bits as u64)
}

fn format_constant(format: PixelFormat) -> &'static str {
    match format {
        PixelFormat::Rgb => "FORMAT_RGB",
        PixelFormat::Rgba => "FORMAT_RGBA",
        PixelFormat::Depth => "FORMAT_DEPTH",
    }
}

fn format_code(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Rgb => 0,
        PixelFormat::Rgba => 1,
        PixelFormat::Depth => 2,
    }
}

fn format_from_code(code: u32) -> LuaResult<PixelFormat> {
    [PixelFormat::Rgb, PixelFormat::Rgba, PixelFormat::Depth]
        .into_iter()
        .find(|format| format_code(*format) == code)
        .ok_or_else(|| {
            mlua::Error::external(RenderError::InvalidArgument(format!(
                "unknown pixel format {code}"
            )))
        })
}

fn blend_from_enum(value: u32) -> LuaResult<BlendFactor> {
    BlendFactor::from_gl_enum(value).ok_or_else(|| {
        mlua::Error::external(RenderError::InvalidArgument(format!(
            "unknown blend factor {value:#06x}"
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectTable;
    use crate::render::{CommandLog, GpuCommand, RecordingBackend};
    use crate::screen::StaticScreen;

    fn setup() -> (Lua, Arc<Mutex<Renderer>>, CommandLog) {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let renderer = Arc::new(Mutex::new(Renderer::new(
            Box::new(backend),
            Arc::new(StaticScreen::new(800, 600)),
            ObjectTable::new(),
        )));
        let lua = Lua::new();
        register_globals(&lua, &ScriptContext::new(Arc::clone(&renderer))).unwrap();
        (lua, renderer, log)
    }

    #[test]
    fn camera_setters_reach_renderer() {
        let (lua, renderer, _) = setup();
        let (x, fovy): (f64, f64) = lua
            .load(
                r#"
                camera.setPosition(1, 2, 3)
                camera.setLookAt(0, 1, 0)
                camera.setPerspective(60, 2, 0.5, 100)
                local x = camera.getPosition()
                local fovy = camera.getPerspective()
                return x, fovy
            "#,
            )
            .eval()
            .unwrap();

        assert_eq!((x, fovy), (1.0, 60.0));
        let renderer = renderer.lock();
        assert_eq!(renderer.camera().look_at, DVec3::new(0.0, 1.0, 0.0));
        assert_eq!(renderer.camera().z_near, 0.5);
    }

    #[test]
    fn invalid_perspective_raises_script_error() {
        let (lua, _, _) = setup();
        let message: String = lua
            .load(
                r#"
                local ok, err = pcall(camera.setPerspective, 45, 0, 1, 10)
                assert(not ok)
                return tostring(err)
            "#,
            )
            .eval()
            .unwrap();
        assert!(message.contains("aspect"));
    }

    #[test]
    fn fbo_workflow_from_script() {
        let (lua, renderer, _) = setup();
        let (generated, width, height, has_depth): (bool, u32, u32, bool) = lua
            .load(
                r#"
                local scene = fbo.init("scene")
                assert(fbo.init("scene") == scene)
                fbo.storeDepth(scene, true)
                fbo.setRenderDimensions(scene, 0.5, 0.5)
                local ok = fbo.generate(scene)
                graphics.updateViewport(scene)
                graphics.updateViewport(nil)
                local w, h = fbo.getEffectiveSize(scene)
                local depth = fbo.depthTexture(scene)
                return ok, w, h, depth ~= nil
            "#,
            )
            .eval()
            .unwrap();

        assert!(generated);
        assert_eq!((width, height), (400, 300));
        assert!(has_depth);
        assert_eq!(renderer.lock().summary().targets.len(), 1);
    }

    #[test]
    fn out_of_range_render_dimensions_raise() {
        let (lua, _, _) = setup();
        let failed: bool = lua
            .load(
                r#"
                local scene = fbo.init("scene")
                return not pcall(fbo.setRenderDimensions, scene, 1.5, 0.5)
            "#,
            )
            .eval()
            .unwrap();
        assert!(failed);
    }

    #[test]
    fn texture_setters_and_draw() {
        let (lua, renderer, log) = setup();
        let id: usize = lua
            .load(
                r#"
                local logo = texture.create("logo", FORMAT_RGBA, 100, 50)
                texture.setAlignment(logo, ALIGN_CENTER)
                texture.setBlendFunc(logo, GL_ONE, GL_ONE)
                texture.setPosition(logo, 10, 20, 30)
                texture.draw(logo)
                return logo
            "#,
            )
            .eval()
            .unwrap();

        let renderer = renderer.lock();
        let state = renderer.texture(TextureId(id)).unwrap();
        assert_eq!(state.alignment, Alignment::Center);
        assert_eq!((state.x, state.y, state.z), (10.0, 20.0, 0.0));
        assert_eq!(state.blend_src, BlendFactor::One);
        assert_eq!(
            log.count(|command| matches!(command, GpuCommand::DrawQuad(_))),
            1
        );
        assert!(log
            .snapshot()
            .contains(&GpuCommand::SetBlendFunc(BlendFactor::One, BlendFactor::One)));
    }

    #[test]
    fn unloaded_texture_setter_raises() {
        let (lua, _, _) = setup();
        let message: String = lua
            .load(
                r#"
                local tmp = texture.create("tmp", FORMAT_RGB, 4, 4)
                texture.unload(tmp)
                local ok, err = pcall(texture.setScale, tmp, 2, 2)
                assert(not ok)
                return tostring(err)
            "#,
            )
            .eval()
            .unwrap();
        assert!(message.contains("invalid state"));
    }

    #[test]
    fn camera_follows_scripted_object() {
        let (lua, renderer, _) = setup();
        lua.load(
            r#"
            local ship = objects.add("ship", 5, 0, 0)
            camera.setPositionObject(ship)
            objects.setPosition(ship, 1, 1, 1)
            assert(objects.find("ship") == ship)
        "#,
        )
        .exec()
        .unwrap();

        let view = renderer.lock().rebuild_3d_view();
        assert_eq!(view.eye, DVec3::new(1.0, 1.0, 3.0));
    }

    #[test]
    fn constants_are_exposed() {
        let (lua, _, _) = setup();
        let (center, depth, src_alpha): (u32, u32, u32) = lua
            .load("return ALIGN_CENTER, FORMAT_DEPTH, GL_SRC_ALPHA")
            .eval()
            .unwrap();
        assert_eq!((center, depth, src_alpha), (1, 2, 0x0302));
    }
}
