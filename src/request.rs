use std::fmt;

use reqwest::{header, Method};
use serde::Serialize;

use crate::{FetchError, Result};

/// Target, method, headers and body of a request.
///
/// The executor treats this as opaque pass-through configuration and replays
/// it unchanged on every attempt.
#[derive(Clone)]
pub struct RequestSpec {
    url: String,
    method: Method,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if is_sensitive_header(name) {
                    (name.as_str(), "<redacted>")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("RequestSpec")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("headers", &headers)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish()
    }
}

impl RequestSpec {
    /// Request with no headers and no body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            body: None,
        }
    }

    /// `GET url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// `POST url`, with the body set separately.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Appends a header. Repeated names are sent as repeated headers.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a raw request body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|err| FetchError::InvalidRequest(format!("unserializable body: {err}")))?;
        Ok(self
            .header(header::CONTENT_TYPE.as_str(), "application/json")
            .body(body))
    }

    /// Target URL as given, before validation.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP method sent on every attempt.
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Validates against `http` and produces a replayable request.
    pub(crate) fn build(&self, http: &reqwest::Client) -> Result<reqwest::Request> {
        let mut builder = http.request(self.method.clone(), &self.url);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        builder
            .build()
            .map_err(|err| FetchError::InvalidRequest(err.to_string()))
    }
}

fn is_sensitive_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(header::AUTHORIZATION.as_str())
        || name.eq_ignore_ascii_case(header::COOKIE.as_str())
        || name.eq_ignore_ascii_case(header::PROXY_AUTHORIZATION.as_str())
}
