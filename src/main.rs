//! fbdash - a framebuffer dashboard
//!
//! Usage: fbdash [--config config.json] [--fb fb0 | --no-framebuffer | --window] [--exit]
//! Widgets are placed on the screen by the config file and each refreshes on
//! its own schedule in the background.

mod config;
mod dashboard;
mod error;
mod expr;
mod fetch;
mod layout;
mod preview;
mod raster;
mod scheduler;
mod surface;
mod units;
mod widgets;

use anyhow::Context as _;
use clap::Parser;
use config::DashboardConfig;
use dashboard::Dashboard;
use fetch::HttpClient;
use preview::WindowSurface;
use std::path::PathBuf;
use surface::{LinuxFrameBuffer, PngSurface, RenderSurface};
use tracing_subscriber::EnvFilter;
use widgets::{WidgetContext, WidgetSlot};

#[derive(Parser, Debug)]
#[command(name = "fbdash", version, about = "Composite independently refreshed widgets onto a framebuffer")]
struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Name of the framebuffer device
    #[arg(long, default_value = "fb0")]
    fb: String,

    /// Run without a framebuffer, writing every frame to a png
    #[arg(long, conflicts_with = "window")]
    no_framebuffer: bool,

    /// Png written when running without a framebuffer
    #[arg(long, default_value = "framebuffer.png")]
    output: PathBuf,

    /// Show frames in a desktop window instead of a framebuffer
    #[arg(long)]
    window: bool,

    /// Exit once every widget has rendered
    #[arg(long)]
    exit: bool,

    /// Print the weather card layout for a <width>x<height> box as JSON and exit
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    layout_log: Option<(u32, u32)>,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s.split_once('x').ok_or_else(|| format!("expected <width>x<height>, got {:?}", s))?;
    let w = w.trim().parse().map_err(|e| format!("bad width {:?}: {}", w, e))?;
    let h = h.trim().parse().map_err(|e| format!("bad height {:?}: {}", h, e))?;
    Ok((w, h))
}

fn build_widgets(config: &DashboardConfig, canvas: (u32, u32), ctx: &WidgetContext) -> anyhow::Result<Vec<WidgetSlot>> {
    config
        .widgets
        .iter()
        .enumerate()
        .map(|(i, widget)| {
            WidgetSlot::from_config(i, widget, canvas, ctx)
                .with_context(|| format!("widget #{} ({})", i, widget.kind))
        })
        .collect()
}

fn dashboard_on<S: RenderSurface>(surface: S, config: &DashboardConfig, ctx: &WidgetContext) -> anyhow::Result<Dashboard<S>> {
    let widgets = build_widgets(config, surface.size(), ctx)?;
    Ok(Dashboard::new(surface, widgets))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Some((w, h)) = cli.layout_log {
        let layout = widgets::weather_layout().layout(w as f64, h as f64)?;
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    let config = DashboardConfig::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    let font = config.font.as_deref().map(raster::load_font).transpose()?;
    let ctx = WidgetContext { font, http: HttpClient::new()? };
    let frame_interval = config.frame_interval();
    let (width, height) = (config.canvas.width, config.canvas.height);

    if cli.window {
        let surface = WindowSurface::new(width, height)?;
        return preview::run(dashboard_on(surface, &config, &ctx)?, frame_interval, cli.exit);
    }

    if cli.no_framebuffer {
        let surface = PngSurface::new(&cli.output, width, height)?;
        tracing::info!("writing frames to {}", cli.output.display());
        dashboard_on(surface, &config, &ctx)?.run(frame_interval, cli.exit)?;
    } else {
        let surface = LinuxFrameBuffer::open(&cli.fb).with_context(|| format!("opening framebuffer {}", cli.fb))?;
        dashboard_on(surface, &config, &ctx)?.run(frame_interval, cli.exit)?;
    }
    Ok(())
}
