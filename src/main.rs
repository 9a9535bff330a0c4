use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use parking_lot::Mutex;

use demo_player::{
    GpuBackend, ObjectTable, PlayerSettings, RecordingBackend, RenderSummary, Renderer,
    ScreenProvider, ScriptHost, WgpuBackend,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let mut settings = match &options.settings {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings {path}"))?;
            PlayerSettings::from_xml(&xml)
                .with_context(|| format!("failed to parse settings {path}"))?
        }
        None => PlayerSettings::default(),
    };
    if let Some(frames) = options.frames {
        settings.frames = frames;
    }

    let screen: Arc<dyn ScreenProvider> = Arc::new(settings.to_screen());
    let backend = create_backend(&settings, options.summary_only);
    let mut renderer = Renderer::new(backend, screen, ObjectTable::new());
    let color = settings.clear_color;
    renderer.set_clear_color(color.x, color.y, color.z, color.w);
    renderer.reset_viewport();

    let mut host = ScriptHost::new(Arc::new(Mutex::new(renderer)))?;
    host.load_file(&options.script)?;
    host.run_frames(settings.frames)
        .context("script execution failed")?;

    let summary = host.renderer().lock().summary();
    print_summary(&summary);
    Ok(())
}

fn create_backend(settings: &PlayerSettings, summary_only: bool) -> Box<dyn GpuBackend> {
    if summary_only {
        return Box::new(RecordingBackend::new());
    }
    let (width, height) = settings.window_size();
    match WgpuBackend::new(width, height) {
        Ok(backend) => {
            info!("Rendering off-screen at {width}x{height}");
            Box::new(backend)
        }
        Err(err) => {
            warn!("{err:#}. Falling back to the recording backend.");
            Box::new(RecordingBackend::new())
        }
    }
}

fn print_summary(summary: &RenderSummary) {
    println!("Rendered {} frame(s)", summary.frames);
    let position = summary.camera_position;
    let look_at = summary.camera_look_at;
    println!(
        "Camera pos=({:.2}, {:.2}, {:.2}) lookAt=({:.2}, {:.2}, {:.2})",
        position.x, position.y, position.z, look_at.x, look_at.y, look_at.z
    );
    println!("Render targets:");
    for target in &summary.targets {
        println!(
            " - {} size={}x{} effective={}x{} depth={} generated={}",
            target.name,
            target.size.0,
            target.size.1,
            target.effective_size.0,
            target.effective_size.1,
            target.store_depth,
            target.generated
        );
    }
    println!("Draw calls: {}", summary.draw_calls);
}

struct CliOptions {
    script: String,
    settings: Option<String>,
    frames: Option<u32>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        const USAGE: &str =
            "Usage: demo-player <script.lua> [--settings file.xml] [--frames N] [--summary-only]";
        let mut args = env::args().skip(1);
        let Some(script) = args.next() else {
            return Err(anyhow!(USAGE));
        };
        let mut settings = None;
        let mut frames = None;
        let mut summary_only = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--settings" => {
                    settings = Some(args.next().ok_or_else(|| anyhow!(USAGE))?);
                }
                "--frames" => {
                    let value = args.next().ok_or_else(|| anyhow!(USAGE))?;
                    frames = Some(
                        value
                            .parse::<u32>()
                            .with_context(|| format!("invalid frame count '{value}'"))?,
                    );
                }
                "--summary-only" => summary_only = true,
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --settings, --frames or --summary-only"
                    ));
                }
            }
        }
        Ok(Self {
            script,
            settings,
            frames,
            summary_only,
        })
    }
}
