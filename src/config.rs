//! Dashboard configuration file.
//!
//! ```json
//! {
//!   "font": "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
//!   "widgets": [
//!     { "type": "Clock", "x": 0, "y": 0, "w": "w / 2", "h": "h / 3" },
//!     { "type": "Image", "x": "w / 2", "y": 0, "w": "w / 2", "h": "h",
//!       "path": "https://example.com/cam.jpg", "refresh_interval": 30 }
//!   ]
//! }
//! ```

use crate::error::ConfigError;
use crate::expr;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CANVAS: CanvasConfig = CanvasConfig { width: 1080, height: 720 };

fn default_frame_interval_ms() -> u64 {
    250
}

#[derive(Debug, Deserialize)]
pub struct DashboardConfig {
    /// Canvas size for surfaces that are not backed by a device.
    #[serde(default)]
    pub canvas: CanvasConfig,
    pub font: Option<PathBuf>,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    pub widgets: Vec<WidgetConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        DEFAULT_CANVAS
    }
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        if config.frame_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "frame_interval_ms".into(),
                message: "must be positive".into(),
            });
        }
        Ok(config)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// A number or an expression over named variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Number(f64),
    Expr(String),
}

impl Dimension {
    pub fn eval(&self, vars: &HashMap<&str, f64>) -> Result<f64, ConfigError> {
        match self {
            Dimension::Number(n) => Ok(*n),
            Dimension::Expr(e) => expr::eval(e, vars).map_err(|err| ConfigError::Expression {
                expr: e.clone(),
                col: err.col,
                message: err.message,
            }),
        }
    }
}

/// Where a widget sits on the canvas. Fixed for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct WidgetConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub x: Dimension,
    pub y: Dimension,
    pub w: Dimension,
    pub h: Dimension,
    /// Seconds between refreshes.
    pub refresh_interval: Option<f64>,
    /// Widget specific settings.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl WidgetConfig {
    /// Evaluate the geometry against the canvas size.
    pub fn placement(&self, canvas: (u32, u32)) -> Result<Placement, ConfigError> {
        let vars = HashMap::from([("w", canvas.0 as f64), ("h", canvas.1 as f64)]);
        let eval = |field: &str, dim: &Dimension, min: f64| -> Result<u32, ConfigError> {
            let value = dim.eval(&vars)?.trunc();
            if !value.is_finite() || value < min || value > u32::MAX as f64 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("{} is out of range", value),
                });
            }
            Ok(value as u32)
        };
        Ok(Placement {
            x: eval("x", &self.x, 0.0)?,
            y: eval("y", &self.y, 0.0)?,
            width: eval("w", &self.w, 1.0)?,
            height: eval("h", &self.h, 1.0)?,
        })
    }

    pub fn refresh_interval(&self, default: Duration) -> Result<Duration, ConfigError> {
        match self.refresh_interval {
            None => Ok(default),
            Some(secs) => Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|d| !d.is_zero())
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "refresh_interval".into(),
                    message: format!("{} is not a positive number of seconds", secs),
                }),
        }
    }

    /// Deserialize the widget specific settings.
    pub fn options<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        Ok(serde_json::from_value(Value::Object(self.options.clone()))?)
    }
}
