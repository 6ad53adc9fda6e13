//! Length values for padding and gaps.
//!
//! A length is an absolute pixel count, a percentage of the box's own
//! dimension along the relevant axis, or a percentage of the root layout
//! call's width (`vw`) or height (`vh`).

use crate::error::LayoutError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Width and height of the root layout call, the reference frame for `vw`/`vh`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "LengthRepr")]
pub enum Length {
    Px(f64),
    Percent(f64),
    Vw(f64),
    Vh(f64),
}

impl Default for Length {
    fn default() -> Self {
        Length::Px(0.0)
    }
}

impl Length {
    /// Resolve to whole pixels. `own` is the box's extent along the axis this
    /// value applies to; `root` is required only for viewport units.
    pub fn resolve(&self, own: f64, root: Option<Size>) -> Result<i64, LayoutError> {
        let px = match *self {
            Length::Px(v) => v,
            Length::Percent(p) => own * p / 100.0,
            Length::Vw(p) => {
                let root = root.ok_or_else(|| LayoutError::MissingRootSize(self.to_string()))?;
                root.width * p / 100.0
            }
            Length::Vh(p) => {
                let root = root.ok_or_else(|| LayoutError::MissingRootSize(self.to_string()))?;
                root.height * p / 100.0
            }
        };
        Ok(px.round() as i64)
    }
}

impl FromStr for Length {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || LayoutError::UnrecognizedUnit(s.to_string());

        let (number, ctor): (&str, fn(f64) -> Length) = if let Some(n) = s.strip_suffix("px") {
            (n, Length::Px)
        } else if let Some(n) = s.strip_suffix('%') {
            (n, Length::Percent)
        } else if let Some(n) = s.strip_suffix("vw") {
            (n, Length::Vw)
        } else if let Some(n) = s.strip_suffix("vh") {
            (n, Length::Vh)
        } else {
            return Err(bad());
        };

        let value: f64 = number.trim().parse().map_err(|_| bad())?;
        if !value.is_finite() {
            return Err(bad());
        }
        Ok(ctor(value))
    }
}

impl From<f64> for Length {
    fn from(px: f64) -> Self {
        Length::Px(px)
    }
}

impl From<i32> for Length {
    fn from(px: i32) -> Self {
        Length::Px(px as f64)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Px(v) => write!(f, "{}px", v),
            Length::Percent(v) => write!(f, "{}%", v),
            Length::Vw(v) => write!(f, "{}vw", v),
            Length::Vh(v) => write!(f, "{}vh", v),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LengthRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<LengthRepr> for Length {
    type Error = LayoutError;

    fn try_from(repr: LengthRepr) -> Result<Self, Self::Error> {
        match repr {
            LengthRepr::Number(px) => Ok(Length::Px(px)),
            LengthRepr::Text(s) => s.parse(),
        }
    }
}

/// Four padding edges in CSS order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(try_from = "EdgesRepr")]
pub struct Edges {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl Edges {
    pub fn all(value: Length) -> Self {
        Self { top: value, right: value, bottom: value, left: value }
    }

    pub fn symmetric(vertical: Length, horizontal: Length) -> Self {
        Self { top: vertical, right: horizontal, bottom: vertical, left: horizontal }
    }

    pub fn new(top: Length, right: Length, bottom: Length, left: Length) -> Self {
        Self { top, right, bottom, left }
    }
}

impl From<Length> for Edges {
    fn from(value: Length) -> Self {
        Edges::all(value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EdgesRepr {
    One(Length),
    Many(Vec<Length>),
}

impl TryFrom<EdgesRepr> for Edges {
    type Error = String;

    fn try_from(repr: EdgesRepr) -> Result<Self, Self::Error> {
        match repr {
            EdgesRepr::One(v) => Ok(Edges::all(v)),
            EdgesRepr::Many(v) => match v.as_slice() {
                [a] => Ok(Edges::all(*a)),
                [a, b] => Ok(Edges::symmetric(*a, *b)),
                [t, r, b, l] => Ok(Edges::new(*t, *r, *b, *l)),
                _ => Err(format!("padding takes 1, 2 or 4 values, got {}", v.len())),
            },
        }
    }
}
