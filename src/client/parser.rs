use crate::execution::{FpmResponse, ResponseHeader};

const DEFAULT_STATUS: u16 = 200;

/// Splits CGI stdout into header block and body.
///
/// The body is everything after the first blank line, byte-for-byte. Output
/// with no blank line is treated as a header block with an empty body.
pub fn parse_response(stdout: &[u8]) -> FpmResponse {
    let mut headers = Vec::new();
    let mut body: &[u8] = &[];
    let mut rest = stdout;

    while !rest.is_empty() {
        let (line, next) = match memchr::memchr(b'\n', rest) {
            Some(pos) => (&rest[..pos], &rest[pos + 1..]),
            None => (rest, &rest[rest.len()..]),
        };
        rest = next;

        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            body = rest;
            break;
        }

        if let Some(header) = ResponseHeader::parse(line) {
            headers.push(header);
        }
    }

    let status = headers
        .iter()
        .find(|h| h.is_status())
        .and_then(ResponseHeader::status_code)
        .unwrap_or(DEFAULT_STATUS);

    let headers = headers
        .into_iter()
        .filter(|h| !h.is_status())
        .map(ResponseHeader::into_pair)
        .collect();

    FpmResponse::new(status, headers, body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_header_extracted() {
        let res =
            parse_response(b"Status: 404 Not Found\r\nX-Foo: bar\r\n\r\nhello\r\n");

        assert_eq!(res.status(), 404);
        assert_eq!(
            res.headers(),
            &[("X-Foo".to_string(), "bar".to_string())]
        );
        assert_eq!(res.body(), b"hello\r\n");
    }

    #[test]
    fn test_default_status() {
        let res = parse_response(b"Content-Type: text/html\r\n\r\n<p>hi</p>");

        assert_eq!(res.status(), 200);
        assert_eq!(res.header("content-type"), Some("text/html"));
        assert_eq!(res.body(), b"<p>hi</p>");
    }

    #[test]
    fn test_bare_newlines() {
        let res = parse_response(b"Status: 302 Found\nLocation: /next\n\nmoved");

        assert_eq!(res.status(), 302);
        assert_eq!(res.header("Location"), Some("/next"));
        assert_eq!(res.body(), b"moved");
    }

    #[test]
    fn test_body_kept_verbatim() {
        let res = parse_response(b"X-A: 1\r\n\r\nline1\n\r\nline2\r\n\r\n");
        assert_eq!(res.body(), b"line1\n\r\nline2\r\n\r\n");
    }

    #[test]
    fn test_no_blank_line_means_no_body() {
        let res = parse_response(b"Status: 500\r\nX-Error: yes");

        assert_eq!(res.status(), 500);
        assert_eq!(res.header("X-Error"), Some("yes"));
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_first_status_wins_and_all_are_removed() {
        let res = parse_response(
            b"status: 201 Created\r\nStatus: 500\r\nX-Id: 9\r\n\r\n",
        );

        assert_eq!(res.status(), 201);
        assert_eq!(res.headers().len(), 1);
        assert_eq!(res.header("Status"), None);
    }

    #[test]
    fn test_unparseable_status_falls_back() {
        let res = parse_response(b"Status: teapot\r\n\r\n");

        assert_eq!(res.status(), 200);
        assert!(res.headers().is_empty());
    }

    #[test]
    fn test_malformed_lines_dropped() {
        let res = parse_response(b"garbage\r\n: nope\r\nX-Ok: 1\r\n\r\nbody");

        assert_eq!(
            res.headers(),
            &[("X-Ok".to_string(), "1".to_string())]
        );
        assert_eq!(res.body(), b"body");
    }

    #[test]
    fn test_empty_output() {
        let res = parse_response(b"");

        assert_eq!(res.status(), 200);
        assert!(res.headers().is_empty());
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_repeated_headers_kept() {
        let res =
            parse_response(b"Set-Cookie: a=1\r\nSet-Cookie: b=2\r\n\r\n");
        assert_eq!(res.headers_all("set-cookie"), vec!["a=1", "b=2"]);
    }
}
