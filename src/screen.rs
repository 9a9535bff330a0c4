use std::sync::Arc;

use parking_lot::RwLock;

/// Provides the logical screen and physical window dimensions.
pub trait ScreenProvider: Send + Sync {
    /// Logical resolution the demo is authored against.
    fn screen_size(&self) -> (u32, u32);
    /// Physical size of the output surface.
    fn window_size(&self) -> (u32, u32);
    /// Aspect ratio of the letterboxed screen area inside the window.
    fn aspect_ratio(&self) -> f64;
}

/// Screen that always reports the same resolution.
#[derive(Debug, Clone, Copy)]
pub struct StaticScreen {
    pub width: u32,
    pub height: u32,
    pub window_width: u32,
    pub window_height: u32,
    pub aspect_ratio: f64,
}

impl StaticScreen {
    /// Screen whose window matches its size and whose aspect ratio follows
    /// from its dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            window_width: width,
            window_height: height,
            aspect_ratio: f64::from(width) / f64::from(height.max(1)),
        }
    }

    pub fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Sets the screen-area aspect ratio from a width/height pair.
    pub fn with_aspect(mut self, width: f64, height: f64) -> Self {
        self.aspect_ratio = width / height;
        self
    }
}

impl ScreenProvider for StaticScreen {
    fn screen_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }
}

/// Screen whose window can be resized at runtime.
#[derive(Debug)]
pub struct ResizableScreen {
    inner: RwLock<StaticScreen>,
}

impl ResizableScreen {
    pub fn new(screen: StaticScreen) -> Self {
        Self {
            inner: RwLock::new(screen),
        }
    }

    pub fn resize_window(&self, width: u32, height: u32) {
        let mut inner = self.inner.write();
        inner.window_width = width.max(1);
        inner.window_height = height.max(1);
    }
}

impl ScreenProvider for ResizableScreen {
    fn screen_size(&self) -> (u32, u32) {
        self.inner.read().screen_size()
    }

    fn window_size(&self) -> (u32, u32) {
        self.inner.read().window_size()
    }

    fn aspect_ratio(&self) -> f64 {
        self.inner.read().aspect_ratio
    }
}

impl<T> ScreenProvider for Arc<T>
where
    T: ScreenProvider + ?Sized,
{
    fn screen_size(&self) -> (u32, u32) {
        (**self).screen_size()
    }

    fn window_size(&self) -> (u32, u32) {
        (**self).window_size()
    }

    fn aspect_ratio(&self) -> f64 {
        (**self).aspect_ratio()
    }
}

/// Letterboxed region of the window that the screen is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenArea {
    /// Fits the largest rectangle of the screen's aspect ratio into the
    /// window and centres it.
    pub fn of(screen: &dyn ScreenProvider) -> Self {
        let (window_width, window_height) = screen.window_size();
        let aspect = screen.aspect_ratio();
        let window_width_f = f64::from(window_width);
        let window_height_f = f64::from(window_height);

        let width = (window_height_f * aspect).min(window_width_f);
        let height = (window_width_f / aspect).min(window_height_f);
        let width = (width + 0.5) as u32;
        let height = (height + 0.5) as u32;

        Self {
            x: ((window_width_f - f64::from(width)) / 2.0) as i32,
            y: ((window_height_f - f64::from(height)) / 2.0) as i32,
            width,
            height,
        }
    }
}
