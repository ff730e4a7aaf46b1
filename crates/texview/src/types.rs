use crate::viewport::ContentMode;

/// Settings for the on-screen viewer window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub title: String,
    /// Initial inner size in physical pixels.
    pub size: (u32, u32),
    pub vsync: bool,
    pub content_mode: ContentMode,
    /// Show the FPS, size, and format in the title bar.
    pub show_diagnostics: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "texview".to_string(),
            size: (1280, 720),
            vsync: true,
            content_mode: ContentMode::default(),
            show_diagnostics: true,
        }
    }
}
