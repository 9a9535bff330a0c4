use anyhow::{anyhow, Context, Result};
use glam::{DVec2, Vec4};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::screen::StaticScreen;

/// Player configuration read from the settings XML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    #[serde(default = "default_screen")]
    pub screen: (u32, u32),
    /// Output window size. Defaults to the screen size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<(u32, u32)>,
    /// Screen-area aspect as a width/height pair. Defaults to the screen's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect: Option<DVec2>,
    #[serde(default = "default_clear_color")]
    pub clear_color: Vec4,
    #[serde(default = "default_frames")]
    pub frames: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            screen: default_screen(),
            window: None,
            aspect: None,
            clear_color: default_clear_color(),
            frames: default_frames(),
        }
    }
}

impl PlayerSettings {
    /// Parses a `<settings>` document. Missing elements keep their defaults.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid settings XML")?;
        let root = document.root_element();
        if !root.has_tag_name("settings") {
            return Err(anyhow!(
                "expected <settings> root element, found <{}>",
                root.tag_name().name()
            ));
        }

        let mut settings = Self::default();
        if let Some(screen) = parse_size(optional_text(&root, "screen"), "screen")? {
            settings.screen = screen;
        }
        settings.window = parse_size(optional_text(&root, "window"), "window")?;
        settings.aspect = parse_aspect(optional_text(&root, "aspect"))?;
        settings.clear_color = parse_color(optional_text(&root, "clearColor"), settings.clear_color)?;
        if let Some(frames) = optional_text(&root, "frames") {
            settings.frames = frames
                .parse::<u32>()
                .map_err(|err| anyhow!("failed to parse <frames>: {err}"))?;
        }
        Ok(settings)
    }

    pub fn window_size(&self) -> (u32, u32) {
        self.window.unwrap_or(self.screen)
    }

    pub fn to_screen(&self) -> StaticScreen {
        let (window_width, window_height) = self.window_size();
        let screen = StaticScreen::new(self.screen.0, self.screen.1)
            .with_window(window_width, window_height);
        match self.aspect {
            Some(aspect) => screen.with_aspect(aspect.x, aspect.y),
            None => screen,
        }
    }
}

fn default_screen() -> (u32, u32) {
    (800, 600)
}

fn default_clear_color() -> Vec4 {
    Vec4::new(0.0, 0.0, 0.0, 1.0)
}

fn default_frames() -> u32 {
    1
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_numbers<T: std::str::FromStr>(value: &str, what: &str) -> Result<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<T>()
                .map_err(|err| anyhow!("invalid {what} component '{component}': {err}"))
        })
        .collect()
}

fn parse_size(value: Option<String>, what: &str) -> Result<Option<(u32, u32)>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match parse_numbers::<u32>(&value, what)?[..] {
        [width, height] if width > 0 && height > 0 => Ok(Some((width, height))),
        _ => Err(anyhow!("<{what}> needs two positive integers, got '{value}'")),
    }
}

fn parse_aspect(value: Option<String>) -> Result<Option<DVec2>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match parse_numbers::<f64>(&value, "aspect")?[..] {
        [width, height] if width > 0.0 && height > 0.0 => Ok(Some(DVec2::new(width, height))),
        _ => Err(anyhow!("<aspect> needs two positive numbers, got '{value}'")),
    }
}

fn parse_color(value: Option<String>, default: Vec4) -> Result<Vec4> {
    let Some(value) = value else {
        return Ok(default);
    };
    let components = parse_numbers::<f32>(&value, "color")?;
    let (r, g, b, a) = match components[..] {
        [r, g, b] => (r, g, b, 255.0),
        [r, g, b, a] => (r, g, b, a),
        _ => return Err(anyhow!("color needs 3 or 4 components, got '{value}'")),
    };
    Ok(Vec4::new(r, g, b, a) / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::ScreenProvider;

    const SAMPLE: &str = r#"
    <settings>
        <screen>1280 720</screen>
        <window>1920 1200</window>
        <aspect>16 9</aspect>
        <clearColor>255 128 0</clearColor>
        <frames>4</frames>
    </settings>
    "#;

    #[test]
    fn parse_settings_populates_every_field() {
        let settings = PlayerSettings::from_xml(SAMPLE).unwrap();
        assert_eq!(settings.screen, (1280, 720));
        assert_eq!(settings.window_size(), (1920, 1200));
        assert_eq!(settings.aspect, Some(DVec2::new(16.0, 9.0)));
        assert_eq!(settings.clear_color, Vec4::new(1.0, 128.0 / 255.0, 0.0, 1.0));
        assert_eq!(settings.frames, 4);

        let screen = settings.to_screen();
        assert_eq!(screen.screen_size(), (1280, 720));
        assert_eq!(screen.window_size(), (1920, 1200));
        assert_eq!(screen.aspect_ratio(), 16.0 / 9.0);
    }

    #[test]
    fn empty_settings_use_defaults() {
        let settings = PlayerSettings::from_xml("<settings/>").unwrap();
        assert_eq!(settings, PlayerSettings::default());
        assert_eq!(settings.window_size(), (800, 600));
        assert_eq!(settings.to_screen().aspect_ratio(), 800.0 / 600.0);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(PlayerSettings::from_xml("<settings><screen>800</screen></settings>").is_err());
        assert!(PlayerSettings::from_xml("<settings><frames>many</frames></settings>").is_err());
        assert!(
            PlayerSettings::from_xml("<settings><clearColor>1 x 3</clearColor></settings>").is_err()
        );
        assert!(PlayerSettings::from_xml("<config/>").is_err());
    }
}
