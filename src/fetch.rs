//! Blocking HTTP access for widget refreshes.
//!
//! Refreshes already run on their own threads, so a blocking client is all
//! that is needed. Every request carries a timeout.

use crate::error::WidgetError;
use digest_auth::AuthContext;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials for password protected resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { username: String, password: String },
    /// Answered after the server's 401 challenge.
    Digest { username: String, password: String },
}

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let inner = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("fbdash/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { inner })
    }

    /// Fetch a body, failing on any non-success status.
    pub fn get_bytes(&self, url: &str, auth: Option<&Auth>) -> Result<Vec<u8>, WidgetError> {
        let mut request = self.inner.get(url);
        if let Some(Auth::Basic { username, password }) = auth {
            request = request.basic_auth(username, Some(password));
        }

        let mut response = request.send()?;
        if let Some(Auth::Digest { username, password }) = auth {
            let challenge = response.headers().get(WWW_AUTHENTICATE).and_then(|h| h.to_str().ok());
            if let (StatusCode::UNAUTHORIZED, Some(challenge)) = (response.status(), challenge) {
                let target = response.url();
                let uri = match target.query() {
                    Some(query) => format!("{}?{}", target.path(), query),
                    None => target.path().to_string(),
                };
                let answer = digest_answer(challenge, &uri, username, password)?;
                response = self.inner.get(target.as_str()).header(AUTHORIZATION, answer).send()?;
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(WidgetError::Status { url: url.to_string(), status: status.as_u16() });
        }
        Ok(response.bytes()?.to_vec())
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, WidgetError> {
        let bytes = self.get_bytes(url, None)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// `Authorization` value answering a `WWW-Authenticate: Digest` challenge for a GET of `uri`.
fn digest_answer(challenge: &str, uri: &str, username: &str, password: &str) -> Result<String, WidgetError> {
    let mut prompt = digest_auth::parse(challenge).map_err(|e| WidgetError::DigestAuth(e.to_string()))?;
    let context = AuthContext::new(username, password, uri);
    let answer = prompt.respond(&context).map_err(|e| WidgetError::DigestAuth(e.to_string()))?;
    Ok(answer.to_header_string())
}

pub fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}
