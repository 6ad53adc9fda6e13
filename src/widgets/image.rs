use super::{Widget, WidgetContext};
use crate::error::{ConfigError, WidgetError};
use crate::fetch::{is_remote, Auth, HttpClient};
use crate::raster::{decode_image, Canvas, Color};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ImageOptions {
    /// File path or `http(s)://` URL.
    pub path: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_type: Option<String>,
}

/// A still image from disk or the network, scaled to fill the widget.
pub struct ImageWidget {
    width: u32,
    height: u32,
    path: String,
    auth: Option<Auth>,
    http: HttpClient,
}

impl ImageWidget {
    pub fn new(width: u32, height: u32, options: ImageOptions, ctx: &WidgetContext) -> Result<Self, ConfigError> {
        let auth = match (options.username, options.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                match options.auth_type.as_deref() {
                    None | Some("") | Some("basic") => Some(Auth::Basic { username, password }),
                    Some("digest") => Some(Auth::Digest { username, password }),
                    Some(other) => {
                        return Err(ConfigError::InvalidValue {
                            field: "auth_type".into(),
                            message: format!("unknown auth type {:?}", other),
                        })
                    }
                }
            }
            _ => None,
        };

        Ok(Self {
            width,
            height,
            path: options.path,
            auth,
            http: ctx.http.clone(),
        })
    }

    fn load(&self) -> Result<Canvas, WidgetError> {
        let bytes = if is_remote(&self.path) {
            match self.http.get_bytes(&self.path, self.auth.as_ref()) {
                Ok(bytes) => bytes,
                Err(WidgetError::Status { url, status }) => {
                    tracing::warn!("failed to download image from {}: {}", url, status);
                    return Ok(Canvas::new(self.width, self.height, Color::TRANSPARENT));
                }
                Err(e) => return Err(e),
            }
        } else {
            std::fs::read(&self.path)?
        };
        decode_image(&bytes, self.width, self.height)
    }
}

impl Widget for ImageWidget {
    fn refresh(&self) -> Result<Vec<u8>, WidgetError> {
        Ok(self.load()?.into_bgra())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> WidgetContext {
        WidgetContext { font: None, http: HttpClient::new().unwrap() }
    }

    fn options(path: &str) -> ImageOptions {
        ImageOptions { path: path.into(), username: None, password: None, auth_type: None }
    }

    #[test]
    fn test_local_png_is_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        ::image::RgbaImage::from_pixel(8, 8, ::image::Rgba([255, 0, 0, 255])).save(&path).unwrap();

        let widget = ImageWidget::new(4, 2, options(path.to_str().unwrap()), &context()).unwrap();
        let bytes = widget.refresh().unwrap();
        assert_eq!(bytes.len(), 4 * 2 * 4);
        assert_eq!(&bytes[..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn test_missing_file_fails() {
        let widget = ImageWidget::new(4, 4, options("/nonexistent/image.png"), &context()).unwrap();
        assert!(matches!(widget.refresh(), Err(WidgetError::Io(_))));
    }

    #[test]
    fn test_auth_types() {
        let mut opts = options("https://example.com/cam.jpg");
        opts.username = Some("user".into());
        opts.password = Some("pw".into());
        let widget = ImageWidget::new(1, 1, opts, &context()).unwrap();
        assert_eq!(widget.auth, Some(Auth::Basic { username: "user".into(), password: "pw".into() }));

        let mut opts = options("https://example.com/cam.jpg");
        opts.username = Some("user".into());
        opts.password = Some("pw".into());
        opts.auth_type = Some("digest".into());
        let widget = ImageWidget::new(1, 1, opts, &context()).unwrap();
        assert_eq!(widget.auth, Some(Auth::Digest { username: "user".into(), password: "pw".into() }));

        let mut opts = options("https://example.com/cam.jpg");
        opts.username = Some("user".into());
        opts.password = Some("pw".into());
        opts.auth_type = Some("ntlm".into());
        assert!(matches!(
            ImageWidget::new(1, 1, opts, &context()),
            Err(ConfigError::InvalidValue { field, .. }) if field == "auth_type"
        ));

        let mut opts = options("https://example.com/cam.jpg");
        opts.username = Some("user".into());
        assert!(ImageWidget::new(1, 1, opts, &context()).unwrap().auth.is_none());
    }
}
