use std::fmt;

use crate::adapters::Method;

/// A single inbound request, as handed to the CGI environment builder.
///
/// Built through [`WebRequest`](crate::WebRequest) and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) http_version: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) remote_addr: String,
    pub(crate) remote_port: u16,
    pub(crate) https: bool,
}

impl ExecutionRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path including the query string, if any.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path up to the first `?`.
    pub fn script_name(&self) -> &str {
        self.split_path().0
    }

    /// Everything after the first `?`, if present.
    pub fn query_string(&self) -> Option<&str> {
        self.split_path().1
    }

    fn split_path(&self) -> (&str, Option<&str>) {
        match self.path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.path.as_str(), None),
        }
    }

    pub fn http_version(&self) -> &str {
        &self.http_version
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn is_https(&self) -> bool {
        self.https
    }
}

impl fmt::Display for ExecutionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ExecutionRequest {{")?;
        writeln!(
            f,
            "  {} {} {}",
            self.method, self.path, self.http_version
        )?;
        writeln!(f, "  remote: {}:{}", self.remote_addr, self.remote_port)?;

        if self.headers.is_empty() {
            writeln!(f, "  headers: []")?;
        } else {
            writeln!(f, "  headers: [")?;

            let display_count = self.headers.len().min(15);
            for (name, value) in self.headers.iter().take(display_count) {
                let escaped = escape_control(value);
                let truncated = if escaped.chars().count() > 60 {
                    let head: String = escaped.chars().take(57).collect();
                    format!("{}...", head)
                } else {
                    escaped
                };
                writeln!(f, "    {}: \"{}\"", name, truncated)?;
            }

            if self.headers.len() > display_count {
                writeln!(
                    f,
                    "    ... ({} more)",
                    self.headers.len() - display_count
                )?;
            }
            writeln!(f, "  ]")?;
        }

        match self.body {
            Some(ref body) => writeln!(f, "  body: {} bytes", body.len())?,
            None => writeln!(f, "  body: none")?,
        }
        write!(f, "}}")
    }
}

fn escape_control(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_control() && c != '\t' {
            result.push_str(&format!("\\x{:02x}", c as u32));
        } else {
            result.push(c);
        }
    }
    result
}
