use http::Method;
use url::Url;

use crate::RequestError;

/// A fully resolved request: absolute URL, ordered headers, raw body.
/// `host`, `content-length` and `connection` are written by the client.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn builder(url: Url) -> RequestBuilder {
        RequestBuilder::new(url)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Follow-up request for a redirect to `location`. 303, and 301/302 for
    /// anything but GET/HEAD, become a GET without a body.
    pub(crate) fn redirected(&self, location: Url, status: u16) -> Self {
        let downgrade = status == 303
            || (matches!(status, 301 | 302)
                && self.method != Method::GET
                && self.method != Method::HEAD);
        if !downgrade {
            return Self {
                url: location,
                ..self.clone()
            };
        }
        Self {
            method: Method::GET,
            url: location,
            headers: self
                .headers
                .iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
                .cloned()
                .collect(),
            body: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn method_str(self, method: &str) -> Result<Self, RequestError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| RequestError::InvalidMethod(method.to_string()))?;
        Ok(self.method(method))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
        }
    }
}

pub type RequestMethod = Method;
