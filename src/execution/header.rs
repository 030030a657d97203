/// One `Name: Value` line from the CGI header block.
///
/// Malformed lines from the responder are silently dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    name: String,
    value: String,
}

impl ResponseHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn into_pair(self) -> (String, String) {
        (self.name, self.value)
    }

    /// The synthetic CGI `Status` header (RFC 3875 §6.3.3).
    pub fn is_status(&self) -> bool {
        self.name.eq_ignore_ascii_case("Status")
    }

    /// Numeric prefix of a `Status` value such as `404 Not Found`.
    pub fn status_code(&self) -> Option<u16> {
        if !self.is_status() {
            return None;
        }

        let code = self.value.split_whitespace().next()?;
        code.parse::<u16>()
            .ok()
            .filter(|c| (100..=999).contains(c))
    }

    /// Parses one header line, without its line terminator.
    pub(crate) fn parse(line: &[u8]) -> Option<Self> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let colon_pos = memchr::memchr(b':', line)?;
        if colon_pos == 0 {
            return None;
        }

        let name_str = std::str::from_utf8(&line[..colon_pos])
            .ok()?
            .trim();
        if name_str.is_empty() || name_str.contains(char::is_whitespace) {
            return None;
        }

        let value_bytes = line[colon_pos + 1..].trim_ascii();
        let value = String::from_utf8_lossy(value_bytes).into_owned();

        Some(Self {
            name: name_str.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let h = ResponseHeader::parse(b"Content-Type: text/html; charset=UTF-8")
            .unwrap();
        assert_eq!(h.name(), "Content-Type");
        assert_eq!(h.value(), "text/html; charset=UTF-8");
    }

    #[test]
    fn test_parse_strips_carriage_return_and_ows() {
        let h = ResponseHeader::parse(b"X-Powered-By:   PHP/8.3.4  \r").unwrap();
        assert_eq!(h.name(), "X-Powered-By");
        assert_eq!(h.value(), "PHP/8.3.4");
    }

    #[test]
    fn test_parse_empty_value() {
        let h = ResponseHeader::parse(b"X-Empty:").unwrap();
        assert_eq!(h.value(), "");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ResponseHeader::parse(b"no colon here").is_none());
        assert!(ResponseHeader::parse(b": value").is_none());
        assert!(ResponseHeader::parse(b"   : value").is_none());
        assert!(ResponseHeader::parse(b"Bad Name: value").is_none());
        assert!(ResponseHeader::parse(b"X-\xff: value").is_none());
    }

    #[test]
    fn test_parse_colon_in_value() {
        let h = ResponseHeader::parse(b"Location: http://localhost:8080/")
            .unwrap();
        assert_eq!(h.value(), "http://localhost:8080/");
    }

    #[test]
    fn test_parse_non_utf8_value() {
        let h = ResponseHeader::parse(b"X-Binary: \xff\xfe").unwrap();
        assert!(h.value().contains('\u{FFFD}'));
    }

    #[test]
    fn test_status_code() {
        assert_eq!(
            ResponseHeader::new("Status", "404 Not Found").status_code(),
            Some(404)
        );
        assert_eq!(ResponseHeader::new("status", "302").status_code(), Some(302));
        assert_eq!(ResponseHeader::new("Status", "abc").status_code(), None);
        assert_eq!(ResponseHeader::new("Status", "42 Odd").status_code(), None);
        assert_eq!(ResponseHeader::new("X-Status", "200").status_code(), None);
    }
}
