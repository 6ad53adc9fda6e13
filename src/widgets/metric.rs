use super::{Widget, WidgetContext};
use crate::error::{ConfigError, WidgetError};
use crate::fetch::HttpClient;
use crate::raster::{fit_font_size, Anchor, Canvas, Color};
use fontdue::Font;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

fn default_bg() -> Color {
    Color::BLACK
}

fn default_fg() -> Color {
    Color::GREEN
}

fn default_mode() -> String {
    "json".into()
}

#[derive(Debug, Deserialize)]
pub struct BigMetricOptions {
    pub url: String,
    /// Dot separated path into the response, e.g. `data.items.0.count`.
    pub json_path: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_bg")]
    pub bg_color: Color,
    #[serde(default = "default_fg")]
    pub fg_color: Color,
}

/// A single number pulled from a JSON endpoint, drawn as large as it fits.
pub struct BigMetricWidget {
    width: u32,
    height: u32,
    url: String,
    json_path: String,
    label: String,
    bg: Color,
    fg: Color,
    font: Arc<Font>,
    http: HttpClient,
}

/// Follow a dot separated key path. Numeric segments index into arrays.
pub fn get_keypath<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |value, key| match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Strings render without their quotes.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl BigMetricWidget {
    pub fn new(width: u32, height: u32, options: BigMetricOptions, ctx: &WidgetContext) -> Result<Self, ConfigError> {
        if options.mode != "json" {
            return Err(ConfigError::InvalidValue {
                field: "mode".into(),
                message: format!("unknown mode {:?}", options.mode),
            });
        }
        Ok(Self {
            width,
            height,
            url: options.url,
            json_path: options.json_path,
            label: options.label,
            bg: options.bg_color,
            fg: options.fg_color,
            font: ctx.font()?,
            http: ctx.http.clone(),
        })
    }

    fn render(&self, text: &str) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height, self.bg);
        let height = self.height as f32;
        let size = fit_font_size(&self.font, text, self.width as f32, height, height).min(0.5 * height);
        let top = height - size - 0.25 * size - 0.25 * size;
        let cx = (self.width / 2) as f32;

        canvas.draw_text(&self.font, text, size, (cx, top), Anchor::MIDDLE_TOP, self.fg);
        canvas.draw_text(&self.font, &self.label, 0.25 * size, (cx, top + size), Anchor::MIDDLE, self.fg);
        canvas
    }
}

impl Widget for BigMetricWidget {
    fn refresh(&self) -> Result<Vec<u8>, WidgetError> {
        let data: Value = self.http.get_json(&self.url)?;
        let value = get_keypath(&data, &self.json_path).ok_or_else(|| WidgetError::MissingKey(self.json_path.clone()))?;
        let text = display_value(value);
        tracing::debug!("{} {} = {}", self.url, self.json_path, text);
        Ok(self.render(&text).into_bgra())
    }
}
