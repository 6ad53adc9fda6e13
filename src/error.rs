//! Error types for layout, configuration, widget refreshes and surfaces.

use thiserror::Error;

/// Failures while resolving units or computing a layout tree.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("unrecognized unit in length value: {0:?}")]
    UnrecognizedUnit(String),

    #[error("viewport unit {0:?} used without a root size")]
    MissingRootSize(String),

    #[error("box {0:?} has children but their weights sum to zero")]
    ZeroWeightSum(String),

    #[error("box {identifier:?} has weight {weight}, weights must be positive")]
    InvalidWeight { identifier: String, weight: f64 },

    #[error("duplicate layout identifier: {0:?}")]
    DuplicateIdentifier(String),
}

/// Failures while loading the dashboard configuration. All of these abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bad expression {expr:?} at column {col}: {message}")]
    Expression {
        expr: String,
        col: usize,
        message: String,
    },

    #[error("unknown widget type: {0}")]
    UnknownWidgetType(String),

    #[error("missing config field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("font error: {0}")]
    Font(String),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),
}

/// A widget refresh failed. Recovered locally: logged, previous buffer kept, retried later.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("svg error: {0}")]
    Svg(String),

    #[error("digest auth error: {0}")]
    DigestAuth(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing key {0:?} in response")]
    MissingKey(String),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("refresh produced {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("refresh panicked")]
    Panicked,
}

/// Failures in a render surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported bits per pixel: {0}")]
    UnsupportedDepth(u32),

    #[error("bad framebuffer attribute {name}: {value:?}")]
    Attribute { name: &'static str, value: String },

    #[error("image export error: {0}")]
    Image(#[from] image::ImageError),
}
