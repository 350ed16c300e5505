//! Minimal HTTP/1.1 request parser and response writer.
//!
//! One request per connection: request line, headers up to the empty line,
//! then exactly `Content-Length` body bytes. Anything that does not fit that
//! shape is an [`HttpError`], which the connection handler answers with 500.

use std::collections::HashMap;
use std::fmt;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Longest request or header line accepted, including the line ending.
pub const MAX_LINE_LEN: usize = 1024;

/// Most header lines accepted per request.
pub const MAX_HEADERS: usize = 32;

/// Largest body accepted. The credential form is a few dozen bytes.
pub const MAX_BODY_LEN: usize = 2048;

/// Request header fields, keyed by lowercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: HashMap<String, String>,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. The name is normalized once here; the first value of a
    /// repeated field is kept.
    pub fn insert(&mut self, name: &str, value: &str) {
        self.fields
            .entry(name.trim().to_ascii_lowercase())
            .or_insert_with(|| value.trim().to_string());
    }

    /// Look up a field by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// `Host` without any `:port` suffix.
    pub fn host(&self) -> Option<&str> {
        let host = self.get("host")?;
        Some(match host.rsplit_once(':') {
            Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
            _ => host,
        })
    }

    /// Declared body length. Absent means zero.
    pub fn content_length(&self) -> Result<usize, HttpError> {
        match self.get("content-length") {
            None => Ok(0),
            Some(value) => value
                .parse()
                .map_err(|_| HttpError::InvalidContentLength(value.to_string())),
        }
    }
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Request {
    /// Parse a request line: exactly `METHOD SP PATH SP VERSION`.
    fn from_request_line(line: &str) -> Result<Self, HttpError> {
        let mut parts = line.split(' ');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(path), Some(version), None)
                if !method.is_empty() && !path.is_empty() && !version.is_empty() =>
            {
                Ok(Self {
                    method: method.to_string(),
                    path: path.to_string(),
                    version: version.to_string(),
                    headers: Headers::new(),
                    body: Vec::new(),
                })
            }
            _ => Err(HttpError::MalformedRequestLine(line.to_string())),
        }
    }
}

/// Read one request from the connection.
pub async fn read_request<R>(reader: &mut R) -> Result<Request, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?;
    let mut request = Request::from_request_line(&line)?;

    let mut header_lines = 0;
    loop {
        let line = read_line(reader).await?;
        if line.is_empty() {
            break;
        }
        header_lines += 1;
        if header_lines > MAX_HEADERS {
            return Err(HttpError::TooManyHeaders);
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HttpError::MissingHeaderDelimiter(line.clone()))?;
        request.headers.insert(name, value);
    }

    let content_length = request.headers.content_length()?;
    if content_length > MAX_BODY_LEN {
        return Err(HttpError::BodyTooLarge(content_length));
    }
    if content_length > 0 {
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await?;
        request.body = body;
    }

    Ok(request)
}

/// Read one CRLF- or LF-terminated line, without its terminator.
async fn read_line<R>(reader: &mut R) -> Result<String, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', &mut buf)
        .await?;

    if buf.last() != Some(&b'\n') {
        return Err(if n >= MAX_LINE_LEN {
            HttpError::LineTooLong
        } else {
            HttpError::UnexpectedEof
        });
    }
    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| HttpError::InvalidUtf8)
}

/// Status codes the portal emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Found,
    InternalServerError,
}

impl StatusCode {
    /// Numeric code.
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Found => 302,
            Self::InternalServerError => 500,
        }
    }

    /// Reason phrase for the status line.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Found => "Found",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason())
    }
}

/// Content type of HTML pages.
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

/// Content type of the stylesheet.
pub const CONTENT_TYPE_CSS: &str = "text/css";

/// A response about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// 200 with the given body.
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::Ok,
            headers: vec![("Content-Type", content_type.to_string())],
            body: body.into(),
        }
    }

    /// 302 to `location`, no body.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Found,
            headers: vec![("Location", location.into())],
            body: Vec::new(),
        }
    }

    /// 500 with an HTML error page.
    pub fn error(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::InternalServerError,
            headers: vec![("Content-Type", CONTENT_TYPE_HTML.to_string())],
            body: body.into(),
        }
    }

    /// Value of a response header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {}\r\n", self.status);
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Write the response and flush it.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await
    }
}

/// Errors while reading or handling a request.
#[derive(Debug)]
pub enum HttpError {
    /// Socket error.
    Io(io::Error),
    /// Client did not deliver the request in time.
    Timeout,
    /// Connection closed before the request was complete.
    UnexpectedEof,
    /// A line exceeded [`MAX_LINE_LEN`].
    LineTooLong,
    /// Request line is not `METHOD SP PATH SP VERSION`.
    MalformedRequestLine(String),
    /// Header line without a colon.
    MissingHeaderDelimiter(String),
    /// More than [`MAX_HEADERS`] header lines.
    TooManyHeaders,
    /// `Content-Length` is not an unsigned integer.
    InvalidContentLength(String),
    /// `Content-Length` exceeds [`MAX_BODY_LEN`].
    BodyTooLarge(usize),
    /// Request text is not UTF-8.
    InvalidUtf8,
    /// Form submission lacks a required field.
    MissingFormField(&'static str),
    /// Submitted credentials were rejected or could not be stored.
    Credentials(crate::credentials::CredentialError),
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Timeout => write!(f, "request timed out"),
            Self::UnexpectedEof => write!(f, "connection closed mid-request"),
            Self::LineTooLong => write!(f, "line exceeds {} bytes", MAX_LINE_LEN),
            Self::MalformedRequestLine(line) => write!(f, "malformed request line: {:?}", line),
            Self::MissingHeaderDelimiter(line) => write!(f, "header without colon: {:?}", line),
            Self::TooManyHeaders => write!(f, "more than {} headers", MAX_HEADERS),
            Self::InvalidContentLength(v) => write!(f, "invalid Content-Length: {:?}", v),
            Self::BodyTooLarge(len) => {
                write!(f, "body of {} bytes exceeds {}", len, MAX_BODY_LEN)
            }
            Self::InvalidUtf8 => write!(f, "request is not valid UTF-8"),
            Self::MissingFormField(name) => write!(f, "form field {:?} missing", name),
            Self::Credentials(e) => write!(f, "credentials: {}", e),
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Credentials(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HttpError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::UnexpectedEof
        } else {
            Self::Io(e)
        }
    }
}

impl From<crate::credentials::CredentialError> for HttpError {
    fn from(e: crate::credentials::CredentialError) -> Self {
        Self::Credentials(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(raw: &[u8]) -> Result<Request, HttpError> {
        let mut reader = raw;
        read_request(&mut reader).await
    }

    #[tokio::test]
    async fn test_parse_get() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: iotdevice.setup\r\nAccept: */*\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/");
        assert_eq!(request.version, "HTTP/1.1");
        assert_eq!(request.headers.host(), Some("iotdevice.setup"));
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_parse_post_body() {
        let request = parse(
            b"POST /wifi HTTP/1.1\r\nHost: iotdevice.setup\r\nContent-Length: 24\r\n\r\nssid=MyNet&key=secret123",
        )
        .await
        .unwrap();
        assert_eq!(request.body, b"ssid=MyNet&key=secret123");
    }

    #[tokio::test]
    async fn test_body_limited_to_content_length() {
        let request = parse(b"POST /wifi HTTP/1.0\r\ncontent-length: 3\r\n\r\nabcdef")
            .await
            .unwrap();
        assert_eq!(request.body, b"abc");
    }

    #[tokio::test]
    async fn test_bare_lf_line_endings() {
        let request = parse(b"GET /style.css HTTP/1.1\nHost: a\n\n").await.unwrap();
        assert_eq!(request.path, "/style.css");
        assert_eq!(request.headers.get("HOST"), Some("a"));
    }

    #[tokio::test]
    async fn test_header_names_case_insensitive_values_trimmed() {
        let request = parse(b"GET / HTTP/1.1\r\nX-Thing:   spaced value  \r\n\r\n")
            .await
            .unwrap();
        assert_eq!(request.headers.get("x-thing"), Some("spaced value"));
        assert_eq!(request.headers.get("X-THING"), Some("spaced value"));
    }

    #[tokio::test]
    async fn test_header_value_keeps_later_colons() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: iotdevice.setup:80\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(request.headers.get("host"), Some("iotdevice.setup:80"));
        assert_eq!(request.headers.host(), Some("iotdevice.setup"));
    }

    #[tokio::test]
    async fn test_first_duplicate_header_wins() {
        let request = parse(b"GET / HTTP/1.1\r\nHost: first\r\nhost: second\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(request.headers.host(), Some("first"));
    }

    #[tokio::test]
    async fn test_malformed_request_lines() {
        let requests: [&[u8]; 4] = [
            b"GET /\r\n\r\n",
            b"GET / HTTP/1.1 extra\r\n\r\n",
            b"GET  / HTTP/1.1\r\n\r\n",
            b"\r\n\r\n",
        ];
        for raw in requests {
            assert!(
                matches!(parse(raw).await, Err(HttpError::MalformedRequestLine(_))),
                "{:?}",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[tokio::test]
    async fn test_missing_header_delimiter() {
        let result = parse(b"GET / HTTP/1.1\r\nHost iotdevice.setup\r\n\r\n").await;
        assert!(matches!(result, Err(HttpError::MissingHeaderDelimiter(_))));
    }

    #[tokio::test]
    async fn test_missing_blank_line() {
        let result = parse(b"GET / HTTP/1.1\r\nHost: iotdevice.setup\r\n").await;
        assert!(matches!(result, Err(HttpError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_partial_header_line() {
        let result = parse(b"GET / HTTP/1.1\r\nHost: iotdev").await;
        assert!(matches!(result, Err(HttpError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_short_body() {
        let result = parse(b"POST /wifi HTTP/1.1\r\nContent-Length: 50\r\n\r\nssid=a").await;
        assert!(matches!(result, Err(HttpError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_invalid_content_length() {
        let result = parse(b"POST /wifi HTTP/1.1\r\nContent-Length: -1\r\n\r\n").await;
        assert!(matches!(result, Err(HttpError::InvalidContentLength(_))));
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let result = parse(b"POST /wifi HTTP/1.1\r\nContent-Length: 999999\r\n\r\n").await;
        assert!(matches!(result, Err(HttpError::BodyTooLarge(999999))));
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let mut raw = b"GET /".to_vec();
        raw.extend(std::iter::repeat(b'a').take(MAX_LINE_LEN));
        raw.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        assert!(matches!(parse(&raw).await, Err(HttpError::LineTooLong)));
    }

    #[tokio::test]
    async fn test_too_many_headers() {
        let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
        for i in 0..=MAX_HEADERS {
            raw.extend_from_slice(format!("X-{}: v\r\n", i).as_bytes());
        }
        raw.extend_from_slice(b"\r\n");
        assert!(matches!(parse(&raw).await, Err(HttpError::TooManyHeaders)));
    }

    #[tokio::test]
    async fn test_header_limit_counts_repeated_lines() {
        let request = |count: usize| {
            let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
            for _ in 0..count {
                raw.extend_from_slice(b"X-Dup: v\r\n");
            }
            raw.extend_from_slice(b"\r\n");
            raw
        };
        assert!(parse(&request(MAX_HEADERS)).await.is_ok());
        assert!(matches!(
            parse(&request(MAX_HEADERS + 1)).await,
            Err(HttpError::TooManyHeaders)
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let result = parse(b"GET /\xff HTTP/1.1\r\n\r\n").await;
        assert!(matches!(result, Err(HttpError::InvalidUtf8)));
    }

    #[test]
    fn test_redirect_bytes() {
        let bytes = Response::redirect("http://iotdevice.setup/").to_bytes();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "HTTP/1.1 302 Found\r\nLocation: http://iotdevice.setup/\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn test_ok_bytes() {
        let bytes = Response::ok(CONTENT_TYPE_CSS, "p{}").to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/css\r\n"));
        assert!(text.contains("Content-Length: 3\r\n"));
        assert!(text.ends_with("\r\n\r\np{}"));
    }

    #[test]
    fn test_error_status_line() {
        let response = Response::error("oops");
        assert_eq!(response.status.as_u16(), 500);
        assert!(String::from_utf8(response.to_bytes())
            .unwrap()
            .starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }
}
