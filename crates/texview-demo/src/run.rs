use std::path::Path;

use anyhow::{Context, Result};
use texview::{PixelFormat, PixelSource, WgpuBackend, WindowRuntime};
use texview_source::{StillImageSource, SyntheticCamera};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RunArgs};
use crate::paths::AppPaths;
use crate::settings::{load_config, Settings, SourceChoice};

const PATTERN_SIZE: (u32, u32) = (1280, 720);

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    match cli.command {
        Some(Command::Formats) => {
            print_formats();
            Ok(())
        }
        Some(Command::CheckConfig { path }) => check_config(path.as_deref().or(cli.run.config.as_deref())),
        None => run_viewer(&cli.run),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_formats() {
    println!("{:<32} {:<12} {:>6} {:<6} PROGRAM", "NAME", "CODE", "PLANES", "RANGE");
    for format in PixelFormat::ALL {
        let descriptor = format.descriptor();
        println!(
            "{:<32} {:<12} {:>6} {:<6} {:?}",
            descriptor.name(),
            format.fourcc().to_string(),
            descriptor.plane_count(),
            format!("{:?}", descriptor.color_range).to_ascii_lowercase(),
            descriptor.program
        );
    }
}

fn check_config(explicit: Option<&Path>) -> Result<()> {
    let paths = AppPaths::discover()?;
    let fallback = paths.config_file();
    let config = load_config(explicit, &fallback)?;
    let settings = Settings::resolve(&config, &RunArgs::default())?;
    let shown = explicit.unwrap_or(&fallback);
    println!(
        "{}: OK ({}x{}, {}, {})",
        shown.display(),
        settings.window.size.0,
        settings.window.size.1,
        settings.format,
        settings.window.content_mode
    );
    Ok(())
}

fn run_viewer(args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    tracing::debug!(config = %paths.config_dir().display(), "resolved texview paths");
    let config = load_config(args.config.as_deref(), &paths.config_file())?;
    let settings = Settings::resolve(&config, args)?;

    let mut source = build_source(&settings)?;
    let runtime = WindowRuntime::spawn(settings.window.clone()).context("failed to open window")?;
    if let Err(err) = source.start(runtime.viewer()) {
        // The window thread is left running otherwise.
        if let Err(shutdown) = runtime.shutdown() {
            tracing::warn!(error = %shutdown, "window did not shut down cleanly");
        }
        return Err(err.context("failed to start frame source"));
    }

    let result = runtime.wait();
    let stopped = source.stop();
    result?;
    stopped
}

fn build_source(settings: &Settings) -> Result<Box<dyn PixelSource<WgpuBackend>>> {
    Ok(match &settings.source {
        SourceChoice::Image(path) => {
            tracing::info!(path = %path.display(), format = %settings.format, "loading image");
            Box::new(StillImageSource::open(path, settings.format)?)
        }
        SourceChoice::Camera(camera) => Box::new(SyntheticCamera::new(camera.clone())?),
        SourceChoice::Pattern => {
            let (width, height) = PATTERN_SIZE;
            Box::new(StillImageSource::test_pattern(settings.format, width, height)?)
        }
    })
}
