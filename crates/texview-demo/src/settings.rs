use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use texview::{ContentMode, PixelFormat, WindowConfig};
use texview_config::{parse_size, ViewerConfig, MAX_CAMERA_BUFFERS};
use texview_source::CameraConfig;

use crate::cli::RunArgs;

/// Where frames come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceChoice {
    Image(PathBuf),
    Camera(CameraConfig),
    Pattern,
}

/// Everything needed to start the viewer, after command-line flags have been
/// layered over the configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub window: WindowConfig,
    pub format: PixelFormat,
    pub source: SourceChoice,
}

/// Loads `explicit` if given (it must exist), otherwise `fallback` when it
/// exists, otherwise the defaults.
pub fn load_config(explicit: Option<&Path>, fallback: &Path) -> Result<ViewerConfig> {
    let path = match explicit {
        Some(path) => path,
        None if fallback.is_file() => fallback,
        None => {
            tracing::debug!(path = %fallback.display(), "no config file; using defaults");
            return Ok(ViewerConfig::default());
        }
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config = ViewerConfig::from_toml_str(&contents)
        .with_context(|| format!("invalid config at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

impl Settings {
    pub fn resolve(config: &ViewerConfig, args: &RunArgs) -> Result<Self> {
        let size = match args.size.as_deref() {
            Some(raw) => parse_size(raw)?,
            None => config.window_size()?,
        };

        let format = match (args.format, config.display.format.as_deref()) {
            (Some(format), _) => format,
            (None, Some(raw)) => raw
                .parse::<PixelFormat>()
                .with_context(|| format!("display.format '{raw}'"))?,
            (None, None) => PixelFormat::BiPlanar420Video,
        };

        let content_mode = match (args.content_mode, config.display.content_mode.as_deref()) {
            (Some(mode), _) => mode,
            (None, Some(raw)) => raw.parse::<ContentMode>().map_err(anyhow::Error::msg)?,
            (None, None) => ContentMode::default(),
        };

        let window = WindowConfig {
            title: config.window.title.clone(),
            size,
            vsync: config.window.vsync && !args.no_vsync,
            content_mode,
            show_diagnostics: config.window.show_diagnostics,
        };

        let source = if let Some(path) = &args.image {
            SourceChoice::Image(path.clone())
        } else if args.camera || config.camera.enabled {
            let buffers = args.buffers.unwrap_or(config.camera.buffers);
            if !(1..=MAX_CAMERA_BUFFERS).contains(&buffers) {
                bail!("--buffers must be between 1 and {MAX_CAMERA_BUFFERS}, got {buffers}");
            }
            SourceChoice::Camera(CameraConfig {
                format,
                width: size.0,
                height: size.1,
                buffers,
                frame_interval: args.interval.unwrap_or(config.camera.frame_interval),
                zero_copy: config.camera.zero_copy && !args.copy,
            })
        } else {
            SourceChoice::Pattern
        };

        Ok(Self {
            window,
            format,
            source,
        })
    }
}
