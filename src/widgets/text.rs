use super::{Widget, WidgetContext};
use crate::config::Dimension;
use crate::error::{ConfigError, WidgetError};
use crate::raster::{Anchor, Canvas, Color};
use fontdue::Font;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

fn default_bg() -> Color {
    Color::BLACK
}

fn default_fg() -> Color {
    Color::WHITE
}

#[derive(Debug, Deserialize)]
pub struct TextOptions {
    pub text: String,
    /// Font size, may refer to the widget's own `w` and `h`.
    pub size: Dimension,
    #[serde(default = "default_bg")]
    pub bg_color: Color,
    #[serde(default = "default_fg")]
    pub fg_color: Color,
}

/// Static text drawn from the top-left corner.
pub struct TextWidget {
    width: u32,
    height: u32,
    text: String,
    size: f32,
    bg: Color,
    fg: Color,
    font: Arc<Font>,
}

impl TextWidget {
    pub fn new(width: u32, height: u32, options: TextOptions, ctx: &WidgetContext) -> Result<Self, ConfigError> {
        let vars = HashMap::from([("w", width as f64), ("h", height as f64)]);
        let size = options.size.eval(&vars)?.trunc();
        if !(size > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "size".into(),
                message: format!("{} is not a positive font size", size),
            });
        }

        Ok(Self {
            width,
            height,
            text: options.text,
            size: size as f32,
            bg: options.bg_color,
            fg: options.fg_color,
            font: ctx.font()?,
        })
    }
}

impl Widget for TextWidget {
    fn refresh(&self) -> Result<Vec<u8>, WidgetError> {
        let mut canvas = Canvas::new(self.width, self.height, self.bg);
        canvas.draw_text(&self.font, &self.text, self.size, (0.0, 0.0), Anchor::LEFT_TOP, self.fg);
        Ok(canvas.into_bgra())
    }
}
