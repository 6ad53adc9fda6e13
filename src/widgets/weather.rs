use super::{Widget, WidgetContext};
use crate::error::{ConfigError, WidgetError};
use crate::fetch::HttpClient;
use crate::layout::{BoxNode, LayoutResult, Rect};
use crate::raster::{decode_image, fit_font_size, Anchor, Canvas, Color};
use crate::units::{Edges, Length};
use fontdue::Font;
use serde::Deserialize;
use std::sync::Arc;

const POINTS_URL: &str = "https://api.weather.gov/points";
const ICON_BORDER: u32 = 4;

fn default_bg() -> Color {
    Color::BLACK
}

fn default_fg() -> Color {
    Color::WHITE
}

#[derive(Debug, Deserialize)]
pub struct WeatherOptions {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_bg")]
    pub bg_color: Color,
    #[serde(default = "default_fg")]
    pub fg_color: Color,
}

#[derive(Debug, Deserialize)]
struct Points {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    forecast: String,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Vec<Period>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Period {
    name: String,
    temperature: f64,
    temperature_unit: String,
    short_forecast: String,
    #[serde(default)]
    icon: Option<String>,
    wind_speed: String,
    wind_direction: String,
    #[serde(default)]
    probability_of_precipitation: Option<Quantity>,
}

#[derive(Debug, Clone, Deserialize)]
struct Quantity {
    value: Option<f64>,
}

impl Period {
    fn rain_chance(&self) -> f64 {
        self.probability_of_precipitation
            .as_ref()
            .and_then(|p| p.value)
            .unwrap_or(0.0)
    }
}

/// Box tree for the weather card: icon and headline on top, wind and rain below.
pub fn weather_layout() -> BoxNode {
    BoxNode::column("weather_layout")
        .padding(Length::Vw(2.0))
        .children([
            BoxNode::row("top_row").weight(2.0).children([
                BoxNode::new("icon_box").padding(Length::Vw(5.0)),
                BoxNode::column("text_box")
                    .weight(2.0)
                    .padding(Length::Vw(5.0))
                    .gap(Length::Percent(5.0))
                    .children([
                        BoxNode::new("period_name"),
                        BoxNode::new("temperature").weight(4.0),
                        BoxNode::new("short_forecast"),
                    ]),
            ]),
            BoxNode::row("bottom_row").child(
                BoxNode::row("detailed_forecast")
                    .padding(Edges::symmetric(Length::Vw(2.0), Length::Vw(5.0)))
                    .gap(Length::Vw(5.0))
                    .children([BoxNode::new("wind_speed"), BoxNode::new("rain_chance")]),
            ),
        ])
}

/// National Weather Service forecast for one location.
pub struct WeatherWidget {
    width: u32,
    height: u32,
    latitude: f64,
    longitude: f64,
    bg: Color,
    fg: Color,
    font: Arc<Font>,
    http: HttpClient,
}

impl WeatherWidget {
    pub fn new(width: u32, height: u32, options: WeatherOptions, ctx: &WidgetContext) -> Result<Self, ConfigError> {
        let valid = (-90.0..=90.0).contains(&options.latitude) && (-180.0..=180.0).contains(&options.longitude);
        if !valid {
            return Err(ConfigError::InvalidValue {
                field: "latitude/longitude".into(),
                message: format!("{},{} is not a location", options.latitude, options.longitude),
            });
        }
        Ok(Self {
            width,
            height,
            latitude: options.latitude,
            longitude: options.longitude,
            bg: options.bg_color,
            fg: options.fg_color,
            font: ctx.font()?,
            http: ctx.http.clone(),
        })
    }

    fn fetch_period(&self) -> Result<Period, WidgetError> {
        let url = format!("{}/{},{}", POINTS_URL, self.latitude, self.longitude);
        let points: Points = self.http.get_json(&url)?;
        let forecast: Forecast = self.http.get_json(&points.properties.forecast)?;
        forecast
            .properties
            .periods
            .into_iter()
            .next()
            .ok_or_else(|| WidgetError::MissingKey("properties.periods.0".into()))
    }

    fn fetch_icon(&self, url: &str, side: u32) -> Option<Canvas> {
        let loaded = self
            .http
            .get_bytes(url, None)
            .and_then(|bytes| decode_image(&bytes, side, side));
        match loaded {
            Ok(icon) => Some(icon),
            Err(e) => {
                tracing::warn!("weather icon {} unavailable: {}", url, e);
                None
            }
        }
    }

    fn draw_fitted(&self, canvas: &mut Canvas, text: &str, rect: Rect, anchor: Anchor, color: Color) {
        let (w, h) = (rect.width as f32, rect.height as f32);
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let size = fit_font_size(&self.font, text, w, h, h);
        let (x, y) = match anchor {
            Anchor::MIDDLE => (rect.x as f32 + w / 2.0, rect.y as f32 + h / 2.0),
            _ => (rect.x as f32, rect.y as f32),
        };
        canvas.draw_text(&self.font, text, size, (x, y), anchor, color);
    }

    /// A value with a caption beneath it, both centred in `rect`.
    fn draw_stat(&self, canvas: &mut Canvas, value: &str, caption: &str, rect: Rect, color: Color) {
        let value_h = rect.height * 2 / 3;
        let value_rect = Rect::new(rect.x, rect.y, rect.width, value_h);
        let caption_rect = Rect::new(rect.x, rect.y + value_h, rect.width, rect.height - value_h);
        self.draw_fitted(canvas, value, value_rect, Anchor::MIDDLE, color);
        self.draw_fitted(canvas, caption, caption_rect, Anchor::MIDDLE, color);
    }

    fn render(&self, period: &Period, layout: &LayoutResult, icon: Option<&Canvas>) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height, self.bg);
        let content = |id: &str| layout.get(id).map(|r| r.content).unwrap_or_default();

        if let Some(icon) = icon {
            let slot = content("icon_box");
            let side = icon.width() as i64;
            let x = slot.x + (slot.width - side) / 2;
            let y = slot.y + (slot.height - side) / 2;
            canvas.blit(icon, x as i32, y as i32, Some(side as f32 * 0.25));
        }

        self.draw_fitted(&mut canvas, &period.name, content("period_name"), Anchor::LEFT_TOP, self.fg);
        let temperature = format!("{}°{}", period.temperature, period.temperature_unit);
        self.draw_fitted(&mut canvas, &temperature, content("temperature"), Anchor::LEFT_TOP, self.fg);
        self.draw_fitted(&mut canvas, &period.short_forecast, content("short_forecast"), Anchor::LEFT_TOP, self.fg);

        let wind = format!("{} {}", period.wind_speed, period.wind_direction);
        self.draw_stat(&mut canvas, &wind, "WIND SPEED", content("wind_speed"), self.fg);
        let rain = format!("{}%", period.rain_chance());
        self.draw_stat(&mut canvas, &rain, "CHANCE OF RAIN", content("rain_chance"), Color::BLUE);

        // divider centred in the gap between the two stats
        let (wind, rain) = (content("wind_speed"), content("rain_chance"));
        if rain.x > wind.x + wind.width {
            let x = (wind.x + wind.width + rain.x) as f32 / 2.0;
            let (top, bottom) = (wind.y as f32, (wind.y + wind.height) as f32);
            canvas.draw_line((x, top), (x, bottom), 2, self.fg);
        }
        canvas
    }
}

impl Widget for WeatherWidget {
    fn refresh(&self) -> Result<Vec<u8>, WidgetError> {
        let layout = weather_layout().layout(self.width as f64, self.height as f64)?;
        let period = self.fetch_period()?;

        let slot = layout.get("icon_box").map(|r| r.content).unwrap_or_default();
        let side = slot.width.min(slot.height);
        let icon = match &period.icon {
            Some(url) if side > 0 => self.fetch_icon(url, side as u32).map(|mut icon| {
                icon.stroke_rounded_rect(0, 0, icon.width(), icon.height(), side as f32 * 0.25, ICON_BORDER, Color::WHITE);
                icon
            }),
            _ => None,
        };

        Ok(self.render(&period, &layout, icon.as_ref()).into_bgra())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::tests::system_font;

    const FORECAST: &str = r#"{
        "properties": {
            "periods": [{
                "number": 1,
                "name": "Tonight",
                "temperature": 54,
                "temperatureUnit": "F",
                "probabilityOfPrecipitation": {"unitCode": "wmoUnit:percent", "value": null},
                "windSpeed": "5 mph",
                "windDirection": "SW",
                "icon": "https://api.weather.gov/icons/land/night/few?size=medium",
                "shortForecast": "Mostly Clear"
            }]
        }
    }"#;

    #[test]
    fn test_layout_tree() {
        let out = weather_layout().layout(400.0, 300.0).unwrap();
        let ids: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(
            ids,
            [
                "weather_layout",
                "top_row",
                "icon_box",
                "text_box",
                "period_name",
                "temperature",
                "short_forecast",
                "bottom_row",
                "detailed_forecast",
                "wind_speed",
                "rain_chance",
            ]
        );

        assert_eq!(out["weather_layout"].content, Rect::new(8, 8, 384, 284));
        assert_eq!(out["icon_box"].content, Rect::new(28, 28, 88, 149));
        assert_eq!(out["temperature"].content, Rect::new(156, 59, 216, 88));
        assert_eq!(out["bottom_row"].outer, Rect::new(8, 197, 384, 95));
        assert_eq!(out["wind_speed"].content, Rect::new(28, 205, 162, 79));
        assert_eq!(out["rain_chance"].content, Rect::new(210, 205, 162, 79));
    }

    #[test]
    fn test_parse_forecast() {
        let forecast: Forecast = serde_json::from_str(FORECAST).unwrap();
        let period = &forecast.properties.periods[0];
        assert_eq!(period.name, "Tonight");
        assert_eq!(format!("{}°{}", period.temperature, period.temperature_unit), "54°F");
        assert_eq!(period.rain_chance(), 0.0);
        assert_eq!(period.wind_direction, "SW");
    }

    #[test]
    fn test_render_period() {
        let Some(font) = system_font() else { return };
        let ctx = WidgetContext { font: Some(font), http: HttpClient::new().unwrap() };
        let options: WeatherOptions = serde_json::from_str(r#"{"latitude": 39.74, "longitude": -104.99}"#).unwrap();
        let widget = WeatherWidget::new(400, 300, options, &ctx).unwrap();

        let forecast: Forecast = serde_json::from_str(FORECAST).unwrap();
        let layout = weather_layout().layout(400.0, 300.0).unwrap();
        let mut icon = Canvas::new(88, 88, Color::GREEN);
        icon.stroke_rounded_rect(0, 0, 88, 88, 22.0, ICON_BORDER, Color::WHITE);

        let canvas = widget.render(&forecast.properties.periods[0], &layout, Some(&icon));
        assert_eq!(canvas.width(), 400);
        // icon centre, then the masked-off corner of the icon square
        assert_eq!(canvas.pixel(72, 102), Some(Color::GREEN.to_argb()));
        assert_eq!(canvas.pixel(28, 59), Some(Color::BLACK.to_argb()));
    }

    #[test]
    fn test_location_validated() {
        let ctx = WidgetContext { font: system_font(), http: HttpClient::new().unwrap() };
        let options = WeatherOptions { latitude: 123.0, longitude: 0.0, bg_color: Color::BLACK, fg_color: Color::WHITE };
        assert!(matches!(
            WeatherWidget::new(10, 10, options, &ctx),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
