use super::{Widget, WidgetContext};
use crate::error::{ConfigError, WidgetError};
use crate::raster::{fit_font_size, Anchor, Canvas, Color};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;
use fontdue::Font;
use serde::Deserialize;
use std::sync::Arc;

fn default_clock_format() -> String {
    "%H:%M:%S".into()
}

fn default_date_format() -> String {
    "%Y-%m-%d".into()
}

fn default_bg() -> Color {
    Color::BLACK
}

fn default_fg() -> Color {
    Color::WHITE
}

#[derive(Debug, Deserialize)]
pub struct ClockOptions {
    #[serde(default = "default_clock_format")]
    pub clock_format: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// IANA zone name such as `"America/New_York"`.
    pub timezone: Option<String>,
    /// Fixed offset such as `"+02:00"`. Local time when neither this nor `timezone` is set.
    pub utc_offset: Option<String>,
    #[serde(default = "default_bg")]
    pub bg_color: Color,
    #[serde(default = "default_fg")]
    pub fg_color: Color,
}

/// Where the clock reads its time.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Zone {
    Local,
    Named(Tz),
    Fixed(FixedOffset),
}

impl Zone {
    fn from_options(timezone: Option<String>, utc_offset: Option<String>) -> Result<Self, ConfigError> {
        match (timezone, utc_offset) {
            (Some(_), Some(_)) => Err(ConfigError::InvalidValue {
                field: "timezone".into(),
                message: "set either timezone or utc_offset, not both".into(),
            }),
            (Some(name), None) => name.parse::<Tz>().map(Zone::Named).map_err(|e| ConfigError::InvalidValue {
                field: "timezone".into(),
                message: format!("{:?}: {}", name, e),
            }),
            (None, Some(offset)) => parse_offset(&offset).map(Zone::Fixed).ok_or_else(|| ConfigError::InvalidValue {
                field: "utc_offset".into(),
                message: format!("{:?} is not of the form +HH:MM", offset),
            }),
            (None, None) => Ok(Zone::Local),
        }
    }

    fn at(self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Zone::Local => instant.with_timezone(&Local).fixed_offset(),
            Zone::Named(tz) => instant.with_timezone(&tz).fixed_offset(),
            Zone::Fixed(offset) => instant.with_timezone(&offset),
        }
    }
}

/// Current time, large, with the date underneath.
pub struct ClockWidget {
    width: u32,
    height: u32,
    clock_format: String,
    date_format: String,
    zone: Zone,
    size: f32,
    bg: Color,
    fg: Color,
    font: Arc<Font>,
}

fn check_format(field: &str, format: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(format).any(|item| item == Item::Error) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("bad time format {:?}", format),
        });
    }
    Ok(())
}

/// `+HH:MM`, `-HH:MM`, `+HHMM` or `Z`.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    if s == "Z" || s == "UTC" {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl ClockWidget {
    pub fn new(width: u32, height: u32, options: ClockOptions, ctx: &WidgetContext) -> Result<Self, ConfigError> {
        check_format("clock_format", &options.clock_format)?;
        check_format("date_format", &options.date_format)?;
        let zone = Zone::from_options(options.timezone, options.utc_offset)?;

        let font = ctx.font()?;
        let sample = Local::now().format(&options.clock_format).to_string();
        let size = fit_font_size(&font, &sample, width as f32, height as f32, height as f32);

        Ok(Self {
            width,
            height,
            clock_format: options.clock_format,
            date_format: options.date_format,
            zone,
            size,
            bg: options.bg_color,
            fg: options.fg_color,
            font,
        })
    }

    fn now(&self) -> DateTime<FixedOffset> {
        self.zone.at(Utc::now())
    }

    fn render(&self, now: DateTime<FixedOffset>) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height, self.bg);
        let (cx, cy) = ((self.width / 2) as f32, (self.height / 2) as f32);

        let time = now.format(&self.clock_format).to_string();
        canvas.draw_text(&self.font, &time, self.size, (cx, cy), Anchor::MIDDLE, self.fg);

        let date = now.format(&self.date_format).to_string();
        let date_y = cy + self.size / 2.0 + 0.25 * self.size;
        canvas.draw_text(&self.font, &date, 0.25 * self.size, (cx, date_y), Anchor::MIDDLE, self.fg);
        canvas
    }
}

impl Widget for ClockWidget {
    fn refresh(&self) -> Result<Vec<u8>, WidgetError> {
        Ok(self.render(self.now()).into_bgra())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::HttpClient;
    use crate::raster::tests::system_font;

    fn options() -> ClockOptions {
        serde_json::from_str(r#"{"utc_offset": "+02:00"}"#).unwrap()
    }

    #[test]
    fn test_defaults_and_offset() {
        let opts = options();
        assert_eq!(opts.clock_format, "%H:%M:%S");
        assert_eq!(opts.date_format, "%Y-%m-%d");
        assert_eq!(opts.bg_color, Color::BLACK);

        let Some(font) = system_font() else { return };
        let ctx = WidgetContext { font: Some(font), http: HttpClient::new().unwrap() };
        let clock = ClockWidget::new(300, 100, opts, &ctx).unwrap();
        assert_eq!(clock.zone, Zone::Fixed(FixedOffset::east_opt(2 * 3600).unwrap()));
        assert!(clock.size > 1.0 && clock.size <= 90.0);
        assert_eq!(clock.refresh().unwrap().len(), 300 * 100 * 4);
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("+02:00"), FixedOffset::east_opt(7200));
        assert_eq!(parse_offset("-0530"), FixedOffset::west_opt(5 * 3600 + 30 * 60));
        assert_eq!(parse_offset("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_offset("02:00"), None);
        assert_eq!(parse_offset("+2:00"), None);
        assert_eq!(parse_offset("+02:75"), None);
        assert_eq!(parse_offset("+99:00"), None);
    }

    #[test]
    fn test_named_timezone_follows_daylight_saving() {
        let opts: ClockOptions = serde_json::from_str(r#"{"timezone": "America/New_York"}"#).unwrap();
        let zone = Zone::from_options(opts.timezone, opts.utc_offset).unwrap();
        assert_eq!(zone, Zone::Named(chrono_tz::America::New_York));

        let winter = DateTime::parse_from_rfc3339("2024-01-15T17:00:00Z").unwrap().with_timezone(&Utc);
        let summer = DateTime::parse_from_rfc3339("2024-07-15T17:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(zone.at(winter).format("%H:%M %z").to_string(), "12:00 -0500");
        assert_eq!(zone.at(summer).format("%H:%M %z").to_string(), "13:00 -0400");
    }

    #[test]
    fn test_timezone_from_widget_config() {
        let config = crate::config::DashboardConfig::from_json(
            r#"{"widgets": [{"type": "Clock", "x": 0, "y": 0, "w": 10, "h": 10, "timezone": "Europe/Berlin"}]}"#,
        )
        .unwrap();
        let opts: ClockOptions = config.widgets[0].options().unwrap();
        let zone = Zone::from_options(opts.timezone, opts.utc_offset).unwrap();
        assert_eq!(zone, Zone::Named(chrono_tz::Europe::Berlin));
    }

    #[test]
    fn test_zone_options() {
        assert_eq!(Zone::from_options(None, None).unwrap(), Zone::Local);
        assert!(matches!(
            Zone::from_options(Some("Mars/Olympus_Mons".into()), None),
            Err(ConfigError::InvalidValue { field, .. }) if field == "timezone"
        ));
        assert!(matches!(
            Zone::from_options(Some("Europe/Berlin".into()), Some("+01:00".into())),
            Err(ConfigError::InvalidValue { field, .. }) if field == "timezone"
        ));
    }

    #[test]
    fn test_bad_formats_rejected() {
        assert!(check_format("clock_format", "%H:%M").is_ok());
        assert!(check_format("clock_format", "%Q").is_err());

        let Some(font) = system_font() else { return };
        let ctx = WidgetContext { font: Some(font), http: HttpClient::new().unwrap() };
        let mut opts = options();
        opts.utc_offset = Some("two hours east".into());
        assert!(matches!(
            ClockWidget::new(100, 100, opts, &ctx),
            Err(ConfigError::InvalidValue { field, .. }) if field == "utc_offset"
        ));
    }

    #[test]
    fn test_render_is_centered() {
        let Some(font) = system_font() else { return };
        let ctx = WidgetContext { font: Some(font), http: HttpClient::new().unwrap() };
        let clock = ClockWidget::new(200, 100, options(), &ctx).unwrap();

        let at = DateTime::parse_from_rfc3339("2024-05-01T12:34:56+02:00").unwrap();
        let canvas = clock.render(at);
        assert_eq!(canvas.pixel(0, 0), Some(Color::BLACK.to_argb()));
        let lit = (0..200).any(|x| canvas.pixel(x, 50).is_some_and(|p| p & 0xFF > 0x80));
        assert!(lit);
    }
}
