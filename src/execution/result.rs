use super::message::ExecutionMessage;

/// Structured result of one FastCGI session.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FpmResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    messages: Vec<ExecutionMessage>,
    app_status: Option<u32>,
}

impl FpmResponse {
    pub(crate) fn new(
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            messages: Vec::new(),
            app_status: None,
        }
    }

    pub(crate) fn with_messages(
        mut self,
        messages: Vec<ExecutionMessage>,
    ) -> Self {
        self.messages = messages;
        self
    }

    pub(crate) fn with_app_status(mut self, app_status: Option<u32>) -> Self {
        self.app_status = app_status;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Exit status reported in `FCGI_END_REQUEST`, if the responder got
    /// that far before the session stopped reading.
    pub fn app_status(&self) -> Option<u32> {
        self.app_status
    }

    pub fn messages(&self) -> &[ExecutionMessage] {
        &self.messages
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.is_error())
    }

    pub fn has_warnings(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.is_warning_or_worse())
    }

    pub fn errors(&self) -> impl Iterator<Item = &ExecutionMessage> {
        self.messages
            .iter()
            .filter(|m| m.is_error())
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

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

impl Default for FpmResponse {
    fn default() -> Self {
        Self::new(200, Vec::new(), Vec::new())
    }
}

#[cfg(feature = "http")]
impl FpmResponse {
    /// Headers that are not valid HTTP tokens are dropped.
    pub fn into_http_response(self) -> http::Response<Vec<u8>> {
        let mut builder = http::Response::builder().status(self.status);

        for (name, value) in &self.headers {
            let (Ok(name), Ok(value)) = (
                http::HeaderName::from_bytes(name.as_bytes()),
                http::HeaderValue::from_str(value),
            ) else {
                continue;
            };
            builder = builder.header(name, value);
        }

        builder
            .body(self.body)
            .unwrap_or_else(|_| http::Response::new(Vec::new()))
    }
}

#[cfg(feature = "http")]
impl From<FpmResponse> for http::Response<Vec<u8>> {
    fn from(res: FpmResponse) -> Self {
        res.into_http_response()
    }
}
