use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_temp(contents: &str, suffix: &str) -> NamedTempFile {
    let mut tmp = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp file");
    tmp.write_all(contents.as_bytes()).expect("write temp file");
    tmp
}

fn demo_script() -> NamedTempFile {
    let script = r#"
local scene = fbo.init("scene")
fbo.storeDepth(scene, true)
fbo.setRenderDimensions(scene, 0.5, 0.5)
fbo.generate(scene)

local overlay = texture.create("overlay", FORMAT_RGBA, 128, 32)
texture.setAlignment(overlay, ALIGN_CENTER)

function render(frame)
  camera.setPosition(0, 1, 5)
  camera.setLookAt(0, 0, 0)
  fbo.bind(scene)
  graphics.updateViewport(scene)
  fbo.bind(nil)
  graphics.updateViewport(nil)
  texture.draw(overlay)
end
"#;
    write_temp(script, ".lua")
}

#[test]
fn cli_runs_script_and_prints_summary() {
    let script = demo_script();
    let settings = write_temp(
        "<settings><screen>1024 768</screen><frames>3</frames></settings>",
        ".xml",
    );
    let mut cmd = Command::cargo_bin("demo-player").expect("binary exists");
    cmd.arg(script.path())
        .arg("--settings")
        .arg(settings.path())
        .arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Rendered 3 frame(s)"))
        .stdout(contains(
            "Camera pos=(0.00, 1.00, 5.00) lookAt=(0.00, 0.00, 0.00)",
        ))
        .stdout(contains(
            " - scene size=1024x768 effective=512x384 depth=true generated=true",
        ))
        .stdout(contains("Draw calls: 3"));
}

#[test]
fn frames_flag_overrides_settings() {
    let script = demo_script();
    let mut cmd = Command::cargo_bin("demo-player").expect("binary exists");
    cmd.arg(script.path())
        .arg("--frames")
        .arg("5")
        .arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Rendered 5 frame(s)"))
        .stdout(contains(" - scene size=800x600 effective=400x300"));
}

#[test]
fn missing_script_fails() {
    let mut cmd = Command::cargo_bin("demo-player").expect("binary exists");
    cmd.arg("/nonexistent/demo.lua").arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to read script"));
}

#[test]
fn script_errors_fail_the_run() {
    let script = write_temp("camera.setPerspective(45, -1, 1, 10)", ".lua");
    let mut cmd = Command::cargo_bin("demo-player").expect("binary exists");
    cmd.arg(script.path()).arg("--summary-only");
    cmd.assert().failure().stderr(contains("aspect"));
}
