//! Widgets: rectangular regions that redraw themselves from a data source.
//!
//! A widget only knows how to produce a fresh BGRA buffer for its own size.
//! [`WidgetSlot`] pairs it with its placement and a [`Refresher`] that decides
//! when that happens and holds the last published result.

mod clock;
mod image;
mod metric;
mod text;
mod weather;

pub use weather::weather_layout;

use crate::config::{Placement, WidgetConfig};
use crate::error::{ConfigError, WidgetError};
use crate::fetch::HttpClient;
use crate::scheduler::{Refresher, DEFAULT_REFRESH_INTERVAL};
use crate::surface::RenderSurface;
use fontdue::Font;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something that can render itself into a pixel buffer.
pub trait Widget: Send + Sync {
    /// Fetch data and draw. Returns exactly `width * height * 4` BGRA bytes.
    /// May block on I/O; always called off the frame loop thread.
    fn refresh(&self) -> Result<Vec<u8>, WidgetError>;
}

/// Shared resources handed to widget constructors.
#[derive(Clone)]
pub struct WidgetContext {
    pub font: Option<Arc<Font>>,
    pub http: HttpClient,
}

impl WidgetContext {
    fn font(&self) -> Result<Arc<Font>, ConfigError> {
        self.font.clone().ok_or(ConfigError::MissingField("font"))
    }
}

/// The widget types a config file may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Image,
    Text,
    Clock,
    BigMetric,
    Weather,
}

impl FromStr for WidgetKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Image" => Ok(WidgetKind::Image),
            "Text" => Ok(WidgetKind::Text),
            "Clock" => Ok(WidgetKind::Clock),
            "BigMetric" => Ok(WidgetKind::BigMetric),
            "Weather" => Ok(WidgetKind::Weather),
            other => Err(ConfigError::UnknownWidgetType(other.to_string())),
        }
    }
}

impl WidgetKind {
    pub fn default_refresh_interval(self) -> Duration {
        match self {
            WidgetKind::Clock => Duration::from_millis(250),
            WidgetKind::BigMetric => Duration::from_secs(5 * 60),
            WidgetKind::Weather => Duration::from_secs(10 * 60),
            WidgetKind::Image | WidgetKind::Text => DEFAULT_REFRESH_INTERVAL,
        }
    }

    fn build(self, config: &WidgetConfig, at: Placement, ctx: &WidgetContext) -> Result<Arc<dyn Widget>, ConfigError> {
        let (w, h) = (at.width, at.height);
        let widget: Arc<dyn Widget> = match self {
            WidgetKind::Image => Arc::new(image::ImageWidget::new(w, h, config.options()?, ctx)?),
            WidgetKind::Text => Arc::new(text::TextWidget::new(w, h, config.options()?, ctx)?),
            WidgetKind::Clock => Arc::new(clock::ClockWidget::new(w, h, config.options()?, ctx)?),
            WidgetKind::BigMetric => Arc::new(metric::BigMetricWidget::new(w, h, config.options()?, ctx)?),
            WidgetKind::Weather => Arc::new(weather::WeatherWidget::new(w, h, config.options()?, ctx)?),
        };
        Ok(widget)
    }
}

/// A placed widget plus its refresh state.
pub struct WidgetSlot {
    placement: Placement,
    widget: Arc<dyn Widget>,
    refresher: Refresher,
}

impl WidgetSlot {
    pub fn new(label: impl Into<String>, placement: Placement, interval: Duration, widget: Arc<dyn Widget>) -> Self {
        Self {
            refresher: Refresher::new(label, interval),
            placement,
            widget,
        }
    }

    /// Build a widget from its config entry. Unknown types fail here, once, at startup.
    pub fn from_config(index: usize, config: &WidgetConfig, canvas: (u32, u32), ctx: &WidgetContext) -> Result<Self, ConfigError> {
        let kind: WidgetKind = config.kind.parse()?;
        let placement = config.placement(canvas)?;
        let interval = config.refresh_interval(kind.default_refresh_interval())?;
        let widget = kind.build(config, placement, ctx)?;

        let slot = Self::new(format!("{}#{}", config.kind, index), placement, interval, widget);
        tracing::info!(
            "creating widget of type {} at ({}, {}) with size ({}, {}), refreshing every {:?}",
            config.kind,
            placement.x,
            placement.y,
            placement.width,
            placement.height,
            slot.refresher.interval()
        );
        Ok(slot)
    }

    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    /// Kick off a background refresh if one is due. Never blocks.
    pub fn maybe_start_refresh(&self, now: Instant) -> bool {
        let widget = Arc::clone(&self.widget);
        let expected = self.placement.width as usize * self.placement.height as usize * 4;
        self.refresher.maybe_start_refresh(now, move || {
            let bytes = widget.refresh()?;
            if bytes.len() != expected {
                return Err(WidgetError::BufferSize { expected, actual: bytes.len() });
            }
            Ok(bytes)
        })
    }

    pub fn should_render(&self) -> bool {
        self.refresher.should_render()
    }

    /// Copy the published buffer into the surface row by row. A widget that has
    /// never finished a refresh writes nothing.
    pub fn write_into_surface<S: RenderSurface + ?Sized>(&self, surface: &mut S) {
        let Some(buffer) = self.refresher.current_buffer() else {
            return;
        };
        let stride = self.placement.width as usize * 4;
        for (row, line) in buffer.chunks_exact(stride).enumerate() {
            surface.write_scanline(self.placement.x, self.placement.y + row as u32, line);
        }
    }
}
