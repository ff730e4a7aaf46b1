use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use texview::{ContentMode, PixelFormat};

#[derive(Parser, Debug)]
#[command(
    name = "texview-demo",
    author,
    version,
    about = "Display images or a synthetic camera in any supported pixel format",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Image to display (PNG, JPEG, BMP, or GIF). Shows a test pattern when
    /// omitted.
    #[arg(value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// Pixel format to convert into: a name (`420YpCbCr8BiPlanarVideoRange`),
    /// a four-character code (`420v`), or a decimal code.
    #[arg(long, value_name = "FORMAT", value_parser = parse_format)]
    pub format: Option<PixelFormat>,

    /// Placement of the image in the window, e.g. `aspect-fit`, `stretch`, `top-left`.
    #[arg(long, value_name = "MODE", value_parser = parse_content_mode)]
    pub content_mode: Option<ContentMode>,

    /// Feed frames from the synthetic camera instead of a still image.
    #[arg(long, conflicts_with = "image")]
    pub camera: bool,

    /// Number of buffers in the camera ring (1-8).
    #[arg(long, value_name = "N")]
    pub buffers: Option<usize>,

    /// Time between camera frames (e.g. `33ms`, `0.5s`).
    #[arg(long, value_name = "DURATION", value_parser = parse_interval)]
    pub interval: Option<Duration>,

    /// Bind camera frames through the copying path even when they could be aliased.
    #[arg(long)]
    pub copy: bool,

    /// Window and camera frame size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Configuration file; defaults to `texview.toml` in the config directory.
    #[arg(long, value_name = "PATH", env = "TEXVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Present without waiting for vertical sync.
    #[arg(long)]
    pub no_vsync: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every supported pixel format.
    Formats,
    /// Validate a configuration file and print the settings it resolves to.
    CheckConfig {
        /// File to check; defaults to `texview.toml` in the config directory.
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_format(value: &str) -> Result<PixelFormat, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("pixel format must not be empty".to_string());
    }
    trimmed.parse::<PixelFormat>().map_err(|err| err.to_string())
}

pub fn parse_content_mode(value: &str) -> Result<ContentMode, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("content mode must not be empty".to_string());
    }
    trimmed.parse::<ContentMode>()
}

pub fn parse_interval(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    let interval = match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Duration::from_secs_f64(seconds),
        Ok(_) => return Err(format!("invalid interval '{trimmed}'")),
        Err(_) => humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid interval '{trimmed}': {err}"))?,
    };
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}
