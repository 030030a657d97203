use std::net::SocketAddr;

use crate::execution::ExecutionRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WebRequestError {
    MissingMethod,
    InvalidMethod(String),
    InvalidUri(String),
}

impl std::fmt::Display for WebRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingMethod => write!(f, "HTTP method not specified"),
            Self::InvalidMethod(m) => write!(f, "Invalid HTTP method: {}", m),
            Self::InvalidUri(uri) => {
                write!(f, "Request URI must start with '/': {}", uri)
            }
        }
    }
}

impl std::error::Error for WebRequestError {}

/// Request method forwarded as `REQUEST_METHOD`.
///
/// The common methods have their own variants; any other RFC 9110 token
/// (`PROPFIND`, `LINK`, ...) is carried verbatim in [`Method::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Other(String),
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

impl TryFrom<&str> for Method {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ if is_token(value) => Ok(Method::Other(value.to_string())),
            _ => Err(format!("Invalid HTTP method: {}", value)),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Method::try_from(value.as_str())
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Other(name) => name,
        }
    }

    /// Methods whose requests normally carry a body.
    pub fn expects_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

/// Builder for an [`ExecutionRequest`].
///
/// Defaults to `/`, `HTTP/1.1` and a remote peer of `127.0.0.1:0`.
#[derive(Debug, Clone)]
pub struct WebRequest {
    https: bool,
    remote_port: u16,
    uri: String,
    remote_addr: String,
    method: Option<Method>,
    http_version: String,
    body: Option<Vec<u8>>,
    headers: Vec<(String, String)>,
}

impl Default for WebRequest {
    fn default() -> Self {
        Self {
            uri: "/".to_string(),
            method: None,
            http_version: "HTTP/1.1".to_string(),
            remote_addr: "127.0.0.1".to_string(),
            remote_port: 0,
            https: false,
            headers: Vec::new(),
            body: None,
        }
    }
}

impl WebRequest {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Default::default()
        }
    }

    /// Builder for any method token, e.g. `PROPFIND`.
    pub fn with_method(method: &str) -> Result<Self, WebRequestError> {
        Method::try_from(method)
            .map(Self::new)
            .map_err(|_| WebRequestError::InvalidMethod(method.to_string()))
    }

    #[must_use]
    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    #[must_use]
    pub fn post() -> Self {
        Self::new(Method::Post)
    }

    #[must_use]
    pub fn put() -> Self {
        Self::new(Method::Put)
    }

    #[must_use]
    pub fn delete() -> Self {
        Self::new(Method::Delete)
    }

    #[must_use]
    pub fn patch() -> Self {
        Self::new(Method::Patch)
    }

    #[must_use]
    pub fn head() -> Self {
        Self::new(Method::Head)
    }

    #[must_use]
    pub fn options() -> Self {
        Self::new(Method::Options)
    }

    /// Path plus optional `?query`, e.g. `/index.php?page=2`.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    #[must_use]
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers
            .push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_headers<I, K, V>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into())),
        );
        self
    }

    /// An empty body still counts as present and yields `CONTENT_LENGTH=0`.
    #[must_use]
    pub fn with_body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = Some(bytes.into());
        self
    }

    #[must_use]
    pub fn with_content_type(self, ct: impl Into<String>) -> Self {
        self.with_header("Content-Type", ct)
    }

    #[must_use]
    pub fn with_http_version(mut self, version: impl Into<String>) -> Self {
        self.http_version = version.into();
        self
    }

    #[must_use]
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    #[must_use]
    pub fn with_remote_port(mut self, port: u16) -> Self {
        self.remote_port = port;
        self
    }

    #[must_use]
    pub fn with_remote(self, addr: SocketAddr) -> Self {
        self.with_remote_addr(addr.ip().to_string())
            .with_remote_port(addr.port())
    }

    #[must_use]
    pub fn with_https(mut self, enabled: bool) -> Self {
        self.https = enabled;
        self
    }

    pub fn build(self) -> Result<ExecutionRequest, WebRequestError> {
        let method = self
            .method
            .ok_or(WebRequestError::MissingMethod)?;

        if !self.uri.starts_with('/') {
            return Err(WebRequestError::InvalidUri(self.uri));
        }

        Ok(ExecutionRequest {
            method,
            path: self.uri,
            http_version: self.http_version,
            headers: self.headers,
            body: self.body,
            remote_addr: self.remote_addr,
            remote_port: self.remote_port,
            https: self.https,
        })
    }
}

#[cfg(feature = "http")]
mod http_compat {
    use super::*;

    /// Converts an `http::Request` into a builder.
    ///
    /// An empty body is kept as present for `POST`, `PUT` and `PATCH` or
    /// when a `Content-Length` header is set, so PHP still sees
    /// `CONTENT_LENGTH=0`.
    ///
    /// A builder is returned rather than a finished request so that the
    /// caller can still attach the peer address, which `http` does not carry.
    pub fn from_http_request<B: AsRef<[u8]>>(
        req: http::Request<B>,
    ) -> Result<WebRequest, WebRequestError> {
        let (parts, body) = req.into_parts();
        from_http_parts(parts, body.as_ref().to_vec())
    }

    pub fn from_http_parts(
        parts: http::request::Parts,
        body: Vec<u8>,
    ) -> Result<WebRequest, WebRequestError> {
        let method = Method::try_from(parts.method.as_str()).map_err(|_| {
            WebRequestError::InvalidMethod(parts.method.to_string())
        })?;

        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let carries_body = method.expects_body()
            || parts.headers.contains_key(http::header::CONTENT_LENGTH);

        let mut builder = WebRequest::new(method)
            .with_uri(uri)
            .with_http_version(server_protocol(parts.version))
            .with_https(parts.uri.scheme() == Some(&http::uri::Scheme::HTTPS));

        // Non-UTF-8 header bytes are replaced, not dropped.
        for (name, value) in parts.headers.iter() {
            builder = builder.with_header(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()),
            );
        }

        if !body.is_empty() || carries_body {
            builder = builder.with_body(body);
        }

        Ok(builder)
    }

    fn server_protocol(version: http::Version) -> &'static str {
        match version {
            http::Version::HTTP_09 => "HTTP/0.9",
            http::Version::HTTP_10 => "HTTP/1.0",
            http::Version::HTTP_2 => "HTTP/2.0",
            http::Version::HTTP_3 => "HTTP/3.0",
            _ => "HTTP/1.1",
        }
    }
}

#[cfg(feature = "http")]
pub use http_compat::{from_http_parts, from_http_request};
