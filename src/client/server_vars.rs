use std::path::Path;

use crate::execution::{ExecutionOptions, ExecutionRequest};
use crate::protocol::encode_params;
use crate::FpmError;

/// CGI/1.1 meta-variables sent to the responder as `FCGI_PARAMS`.
///
/// Implements meta-variable semantics per [RFC 3875 §4.1](https://datatracker.ietf.org/doc/html/rfc3875#section-4.1).
/// Insertion order is preserved and setting an existing key replaces its
/// value in place, so the encoded output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerVars {
    vars: Vec<(String, String)>,
}

impl ServerVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            vars: Vec::with_capacity(cap),
        }
    }

    /// Derives the full environment for one request.
    pub fn from_request(
        request: &ExecutionRequest,
        options: &ExecutionOptions,
    ) -> Self {
        let mut vars = Self::with_capacity(24 + request.headers().len());

        vars.gateway_interface("CGI/1.1")
            .server_software(&options.server_software)
            .server_protocol(request.http_version())
            .request_method(request.method().as_str())
            .request_uri(request.path())
            .script_name(request.script_name())
            .query_string(request.query_string().unwrap_or_default())
            .script_filename(&options.script_path)
            .document_root(&options.document_root())
            .server_name(&server_name(request, options))
            .server_addr(&options.server_addr)
            .server_port(options.server_port)
            .remote_addr(request.remote_addr())
            .remote_port(request.remote_port())
            .https(request.is_https());

        for (name, value) in request.headers() {
            vars.http_header(name, value);
        }

        if let Some(body) = request.body() {
            vars.content_length(body.len());
        }

        vars
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        let key = key.into();
        let value = value.into();

        match self
            .vars
            .iter_mut()
            .find(|(k, _)| *k == key)
        {
            Some((_, existing)) => *existing = value,
            None => self.vars.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.vars.iter()
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.vars
    }

    /// Encodes the variables as one `FCGI_PARAMS` payload.
    pub fn encode(&self) -> Result<Vec<u8>, FpmError> {
        encode_params(
            self.vars
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }

    pub fn request_method(&mut self, method: &str) -> &mut Self {
        self.set("REQUEST_METHOD", method)
    }

    pub fn request_uri(&mut self, uri: &str) -> &mut Self {
        self.set("REQUEST_URI", uri)
    }

    pub fn query_string(&mut self, qs: &str) -> &mut Self {
        self.set("QUERY_STRING", qs)
    }

    pub fn script_filename(&mut self, path: &Path) -> &mut Self {
        self.set("SCRIPT_FILENAME", path.to_string_lossy())
    }

    pub fn script_name(&mut self, name: &str) -> &mut Self {
        self.set("SCRIPT_NAME", name)
    }

    pub fn document_root(&mut self, path: &Path) -> &mut Self {
        self.set("DOCUMENT_ROOT", path.to_string_lossy())
    }

    /// Sets `SERVER_NAME` meta-variable.
    ///
    /// Per [RFC 3875 §4.1.14](https://datatracker.ietf.org/doc/html/rfc3875#section-4.1.14).
    pub fn server_name(&mut self, name: &str) -> &mut Self {
        self.set("SERVER_NAME", name)
    }

    pub fn server_port(&mut self, port: u16) -> &mut Self {
        self.set("SERVER_PORT", port.to_string())
    }

    pub fn server_addr(&mut self, addr: &str) -> &mut Self {
        self.set("SERVER_ADDR", addr)
    }

    /// Sets `SERVER_PROTOCOL` meta-variable.
    ///
    /// Per [RFC 3875 §4.1.16](https://datatracker.ietf.org/doc/html/rfc3875#section-4.1.16),
    /// format is `protocol/version` (e.g., `HTTP/1.1`).
    pub fn server_protocol(&mut self, proto: &str) -> &mut Self {
        self.set("SERVER_PROTOCOL", proto)
    }

    pub fn server_software(&mut self, software: &str) -> &mut Self {
        self.set("SERVER_SOFTWARE", software)
    }

    /// Sets `GATEWAY_INTERFACE` meta-variable.
    ///
    /// Per [RFC 3875 §4.1.4](https://datatracker.ietf.org/doc/html/rfc3875#section-4.1.4),
    /// this identifies the CGI specification version (e.g., `CGI/1.1`).
    pub fn gateway_interface(&mut self, gi: &str) -> &mut Self {
        self.set("GATEWAY_INTERFACE", gi)
    }

    pub fn remote_addr(&mut self, addr: &str) -> &mut Self {
        self.set("REMOTE_ADDR", addr)
    }

    pub fn remote_port(&mut self, port: u16) -> &mut Self {
        self.set("REMOTE_PORT", port.to_string())
    }

    pub fn https(&mut self, enabled: bool) -> &mut Self {
        if enabled {
            self.set("HTTPS", "on")
                .set("REQUEST_SCHEME", "https")
        } else {
            self.set("HTTPS", "off")
                .set("REQUEST_SCHEME", "http")
        }
    }

    /// Maps one request header onto its meta-variable.
    ///
    /// `Content-Length` is ignored; the length is always derived from the
    /// body that is actually sent. `Proxy` is dropped (httpoxy). A repeated
    /// header is appended to the earlier value.
    pub fn http_header(&mut self, name: &str, value: &str) -> &mut Self {
        let upper = name
            .trim()
            .to_uppercase()
            .replace('-', "_");

        let key = match upper.as_str() {
            "CONTENT_LENGTH" | "PROXY" | "" => return self,
            "CONTENT_TYPE" => "CONTENT_TYPE".to_string(),
            _ => format!("HTTP_{}", upper),
        };

        let separator = if key == "HTTP_COOKIE" { "; " } else { ", " };
        let joined = match self.get(&key) {
            Some(existing) => format!("{}{}{}", existing, separator, value),
            None => value.to_string(),
        };

        self.set(key, joined)
    }

    pub fn content_type(&mut self, ct: &str) -> &mut Self {
        self.set("CONTENT_TYPE", ct)
    }

    pub fn content_length(&mut self, len: usize) -> &mut Self {
        self.set("CONTENT_LENGTH", len.to_string())
    }
}

/// Host part of the `Host` header, falling back to the server address.
fn server_name(
    request: &ExecutionRequest,
    options: &ExecutionOptions,
) -> String {
    let Some(host) = request
        .header("Host")
        .map(str::trim)
        .filter(|h| !h.is_empty())
    else {
        return options.server_addr.clone();
    };

    if let Some(rest) = host.strip_prefix('[') {
        if let Some((ipv6, _)) = rest.split_once(']') {
            return ipv6.to_string();
        }
    }

    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => {
            name.to_string()
        }
        _ => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_params;
    use crate::WebRequest;

    fn options() -> ExecutionOptions {
        ExecutionOptions::script("/var/www/html/index.php")
    }

    fn vars_for(req: WebRequest) -> ServerVars {
        ServerVars::from_request(&req.build().unwrap(), &options())
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut vars = ServerVars::new();
        vars.set("A", "1")
            .set("B", "2")
            .set("A", "3");

        assert_eq!(
            vars.into_vec(),
            vec![
                ("A".to_string(), "3".to_string()),
                ("B".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_script_name_and_query_string() {
        let vars = vars_for(WebRequest::get().with_uri("/index.php?a=1"));

        assert_eq!(vars.get("SCRIPT_NAME"), Some("/index.php"));
        assert_eq!(vars.get("QUERY_STRING"), Some("a=1"));
        assert_eq!(vars.get("REQUEST_URI"), Some("/index.php?a=1"));
        assert_eq!(vars.get("REQUEST_METHOD"), Some("GET"));
    }

    #[test]
    fn test_missing_query_string_is_empty() {
        let vars = vars_for(WebRequest::get().with_uri("/status.php"));
        assert_eq!(vars.get("QUERY_STRING"), Some(""));
    }

    #[test]
    fn test_fixed_variables() {
        let vars = vars_for(
            WebRequest::get()
                .with_remote_addr("10.0.0.5")
                .with_remote_port(40000)
                .with_http_version("HTTP/1.0"),
        );

        assert_eq!(vars.get("GATEWAY_INTERFACE"), Some("CGI/1.1"));
        assert_eq!(vars.get("SERVER_PROTOCOL"), Some("HTTP/1.0"));
        assert_eq!(
            vars.get("SCRIPT_FILENAME"),
            Some("/var/www/html/index.php")
        );
        assert_eq!(vars.get("DOCUMENT_ROOT"), Some("/var/www/html"));
        assert_eq!(vars.get("SERVER_SOFTWARE"), Some("Ripht/0.1.0"));
        assert_eq!(vars.get("SERVER_ADDR"), Some("127.0.0.1"));
        assert_eq!(vars.get("SERVER_NAME"), Some("127.0.0.1"));
        assert_eq!(vars.get("SERVER_PORT"), Some("80"));
        assert_eq!(vars.get("REMOTE_ADDR"), Some("10.0.0.5"));
        assert_eq!(vars.get("REMOTE_PORT"), Some("40000"));
        assert_eq!(vars.get("HTTPS"), Some("off"));
        assert_eq!(vars.get("REQUEST_SCHEME"), Some("http"));
    }

    #[test]
    fn test_https_on() {
        let vars = vars_for(WebRequest::get().with_https(true));

        assert_eq!(vars.get("HTTPS"), Some("on"));
        assert_eq!(vars.get("REQUEST_SCHEME"), Some("https"));
    }

    #[test]
    fn test_content_type_is_not_prefixed() {
        let vars = vars_for(
            WebRequest::post()
                .with_content_type("text/plain")
                .with_body("hi"),
        );

        assert_eq!(vars.get("CONTENT_TYPE"), Some("text/plain"));
        assert!(!vars.contains("HTTP_CONTENT_TYPE"));
    }

    #[test]
    fn test_content_length_comes_from_body() {
        let vars = vars_for(
            WebRequest::post()
                .with_header("Content-Length", "9999")
                .with_body("Hello World !"),
        );

        assert_eq!(vars.get("CONTENT_LENGTH"), Some("13"));
        assert!(!vars.contains("HTTP_CONTENT_LENGTH"));
    }

    #[test]
    fn test_no_body_no_content_length() {
        let vars = vars_for(WebRequest::get().with_header("Content-Length", "5"));
        assert!(!vars.contains("CONTENT_LENGTH"));
    }

    #[test]
    fn test_header_passthrough_and_joining() {
        let vars = vars_for(
            WebRequest::get()
                .with_header("X-Custom-Header", "value")
                .with_header("Accept", "text/html")
                .with_header("accept", "application/json")
                .with_header("Cookie", "a=1")
                .with_header("cookie", "b=2")
                .with_header("Proxy", "http://evil.example"),
        );

        assert_eq!(vars.get("HTTP_X_CUSTOM_HEADER"), Some("value"));
        assert_eq!(
            vars.get("HTTP_ACCEPT"),
            Some("text/html, application/json")
        );
        assert_eq!(vars.get("HTTP_COOKIE"), Some("a=1; b=2"));
        assert!(!vars.contains("HTTP_PROXY"));
    }

    #[test]
    fn test_server_name_from_host_header() {
        let named = vars_for(WebRequest::get().with_header("Host", "example.com:8080"));
        assert_eq!(named.get("SERVER_NAME"), Some("example.com"));
        assert_eq!(named.get("HTTP_HOST"), Some("example.com:8080"));

        let ipv6 = vars_for(WebRequest::get().with_header("Host", "[::1]:8080"));
        assert_eq!(ipv6.get("SERVER_NAME"), Some("::1"));
    }

    #[test]
    fn test_encode_roundtrips_through_decoder() {
        let vars = vars_for(WebRequest::get().with_uri("/a.php?x=y"));
        let decoded = decode_params(&vars.encode().unwrap()).unwrap();

        assert_eq!(decoded, vars.into_vec());
    }
}
