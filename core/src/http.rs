//! HTTP/1.1 message types and framing.
//!
//! # Design
//! `HttpRequest` is a fully prepared request as plain data: every header,
//! including `Authorization`, is already in place, and `to_wire` renders the
//! exact bytes the transport writes. Nothing is re-encoded between signing
//! and sending.
//!
//! `prepare` runs `check_target` and `check_header` on everything that ends
//! up in the head, so `to_wire` never writes a CR or LF that was not put
//! there by the framing itself.
//!
//! Responses are parsed incrementally by `ResponseParser` as bytes arrive.
//! The dispatcher always sends `Connection: close`, so the parser supports
//! `Content-Length`, chunked transfer coding and read-until-close bodies, and
//! skips interim 1xx responses. A response is capped at `MAX_RESPONSE_BYTES`.

use std::io::{self, Read};
use std::str::FromStr;

use ::http::uri::PathAndQuery;
use ::http::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ConnectionError};

/// HTTP method for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Methods whose bodyless form still announces `Content-Length: 0`.
    fn expects_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

/// A signed HTTP request described as plain data.
///
/// Built by `AttestationClient::prepare`. `target` is the origin-form
/// resource (path plus query) exactly as it was signed.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Value of the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Serialize into HTTP/1.1 bytes.
    ///
    /// A body is framed by `Content-Length` only; nothing follows it.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut head = format!("{} {} HTTP/1.1\r\n", self.method.as_str(), self.target);
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        match &self.body {
            Some(body) => head.push_str(&format!("Content-Length: {}\r\n", body.len())),
            None if self.method.expects_body() => head.push_str("Content-Length: 0\r\n"),
            None => {}
        }
        head.push_str("\r\n");

        let mut wire = head.into_bytes();
        if let Some(body) = &self.body {
            wire.extend_from_slice(body);
        }
        wire
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Upper bound on the bytes `read_response` accepts for one response.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

/// Check that `target` is an origin-form request target.
pub(crate) fn check_target(target: &str) -> Result<(), ApiError> {
    if !target.starts_with('/') {
        return Err(ApiError::MalformedRequest(format!("resource {target:?} must start with '/'")));
    }
    match PathAndQuery::from_str(target) {
        // A fragment parses but is dropped; it must not reach the wire either.
        Ok(parsed) if parsed.as_str() == target => Ok(()),
        Ok(_) => Err(ApiError::MalformedRequest(format!("resource {target:?} carries a fragment"))),
        Err(e) => Err(ApiError::MalformedRequest(format!("resource {target:?}: {e}"))),
    }
}

/// Check that `name: value` can be written as one header line.
pub(crate) fn check_header(name: &str, value: &str) -> Result<(), ApiError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ApiError::MalformedRequest(format!("header name {name:?} is not a token")))?;
    HeaderValue::from_str(value)
        .map_err(|_| ApiError::MalformedRequest(format!("header {name} has a control character in its value")))?;
    Ok(())
}

/// Read one response from `stream`, stopping as soon as it is complete.
///
/// `head_request` suppresses body parsing for responses to `HEAD`. Responses
/// larger than `MAX_RESPONSE_BYTES` fail with `MalformedResponse`.
pub fn read_response<R: Read>(stream: &mut R, head_request: bool) -> Result<HttpResponse, ConnectionError> {
    read_response_limited(stream, head_request, MAX_RESPONSE_BYTES)
}

/// `read_response` with an explicit size limit.
pub fn read_response_limited<R: Read>(
    stream: &mut R,
    head_request: bool,
    limit: usize,
) -> Result<HttpResponse, ConnectionError> {
    let mut parser = ResponseParser::with_limit(head_request, limit);
    let mut chunk = [0u8; 8 * 1024];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if let Some(response) = parser.feed(&chunk[..n])? {
                    return Ok(response);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // Peers that close without a TLS close_notify surface as UnexpectedEof.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && parser.received() > 0 => break,
            Err(e) => return Err(ConnectionError::Io(e)),
        }
    }
    match parser.finish()? {
        Some(response) => Ok(response),
        None => Err(ConnectionError::MalformedResponse(parser.truncated())),
    }
}

/// Try to parse a complete response out of `buf`.
///
/// Returns `Ok(None)` while more bytes are needed. With `eof` set, a body
/// without explicit framing extends to the end of `buf`.
pub fn parse_response(buf: &[u8], head_request: bool, eof: bool) -> Result<Option<HttpResponse>, ConnectionError> {
    let mut parser = ResponseParser::new(head_request);
    match parser.feed(buf)? {
        Some(response) => Ok(Some(response)),
        None if eof => parser.finish(),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// Waiting for the end of a response head.
    Head,
    /// Bytes of a `Content-Length` body still outstanding.
    Length(usize),
    Chunked(Chunk),
    /// No framing; the body ends when the peer closes.
    UntilEof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk {
    Size,
    Data(usize),
    DataEnd,
    Trailer,
}

/// Incremental HTTP/1.1 response parser.
///
/// Bytes are fed as they arrive. Consumed input is dropped, decoded body
/// bytes are appended once, and line searches resume where the previous
/// search stopped, so every received byte is examined a bounded number of
/// times.
#[derive(Debug)]
pub struct ResponseParser {
    head_request: bool,
    limit: usize,
    received: usize,
    buf: Vec<u8>,
    pos: usize,
    scanned: usize,
    framing: Framing,
    head: Option<(u16, Vec<(String, String)>)>,
    body: Vec<u8>,
}

impl ResponseParser {
    pub fn new(head_request: bool) -> Self {
        Self::with_limit(head_request, MAX_RESPONSE_BYTES)
    }

    pub fn with_limit(head_request: bool, limit: usize) -> Self {
        Self {
            head_request,
            limit,
            received: 0,
            buf: Vec::new(),
            pos: 0,
            scanned: 0,
            framing: Framing::Head,
            head: None,
            body: Vec::new(),
        }
    }

    /// Total bytes fed so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Bytes fed but not yet consumed by the parser.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Feed the next bytes from the stream. Returns the response once it is
    /// complete; bytes after its end are ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Option<HttpResponse>, ConnectionError> {
        self.received += bytes.len();
        self.buf.extend_from_slice(bytes);
        if let Some(response) = self.advance()? {
            return Ok(Some(response));
        }
        if self.received > self.limit {
            return Err(ConnectionError::MalformedResponse(format!(
                "response exceeds {} bytes",
                self.limit
            )));
        }
        self.compact();
        Ok(None)
    }

    /// The stream ended. Only a body framed by connection close completes
    /// here.
    pub fn finish(&mut self) -> Result<Option<HttpResponse>, ConnectionError> {
        match self.framing {
            Framing::UntilEof => self.take_response().map(Some),
            _ => Ok(None),
        }
    }

    fn truncated(&self) -> String {
        if self.received == 0 {
            "connection closed before a response was received".to_string()
        } else {
            format!(
                "connection closed after {} bytes of an incomplete response",
                self.received
            )
        }
    }

    fn advance(&mut self) -> Result<Option<HttpResponse>, ConnectionError> {
        loop {
            match self.framing {
                Framing::Head => {
                    let Some(end) = self.find(b"\r\n\r\n") else {
                        return Ok(None);
                    };
                    let head = std::str::from_utf8(&self.buf[self.pos..end])
                        .map_err(|_| ConnectionError::MalformedResponse("response head is not UTF-8".to_string()))?;
                    let (status, headers) = parse_head(head)?;
                    self.pos = end + 4;

                    // Interim responses carry no body; the final response follows.
                    if (100..200).contains(&status) && status != 101 {
                        continue;
                    }
                    self.framing = body_framing(status, &headers, self.head_request)?;
                    self.head = Some((status, headers));
                }
                Framing::Length(0) => return self.take_response().map(Some),
                Framing::Length(remaining) => {
                    let taken = self.take_body(remaining);
                    if taken == 0 {
                        return Ok(None);
                    }
                    self.framing = Framing::Length(remaining - taken);
                }
                Framing::UntilEof => {
                    self.take_body(usize::MAX);
                    return Ok(None);
                }
                Framing::Chunked(Chunk::Size) => {
                    let Some(end) = self.find(b"\r\n") else {
                        return Ok(None);
                    };
                    let size_line = std::str::from_utf8(&self.buf[self.pos..end])
                        .map_err(|_| ConnectionError::MalformedResponse("chunk size is not UTF-8".to_string()))?;
                    let size_hex = size_line.split(';').next().unwrap_or_default().trim();
                    let size = usize::from_str_radix(size_hex, 16)
                        .map_err(|_| ConnectionError::MalformedResponse(format!("bad chunk size {size_hex:?}")))?;
                    self.pos = end + 2;
                    self.framing = Framing::Chunked(if size == 0 { Chunk::Trailer } else { Chunk::Data(size) });
                }
                Framing::Chunked(Chunk::Data(remaining)) => {
                    let taken = self.take_body(remaining);
                    if taken == 0 {
                        return Ok(None);
                    }
                    self.framing = Framing::Chunked(if taken == remaining {
                        Chunk::DataEnd
                    } else {
                        Chunk::Data(remaining - taken)
                    });
                }
                Framing::Chunked(Chunk::DataEnd) => {
                    if self.buffered() < 2 {
                        return Ok(None);
                    }
                    if &self.buf[self.pos..self.pos + 2] != b"\r\n" {
                        return Err(ConnectionError::MalformedResponse("chunk not followed by CRLF".to_string()));
                    }
                    self.pos += 2;
                    self.framing = Framing::Chunked(Chunk::Size);
                }
                Framing::Chunked(Chunk::Trailer) => {
                    // Trailer fields are read past and discarded up to the empty line.
                    let Some(end) = self.find(b"\r\n") else {
                        return Ok(None);
                    };
                    let empty = end == self.pos;
                    self.pos = end + 2;
                    if empty {
                        return self.take_response().map(Some);
                    }
                }
            }
        }
    }

    /// Absolute index of `needle` at or after `pos`, resuming a previous
    /// unsuccessful search.
    fn find(&mut self, needle: &[u8]) -> Option<usize> {
        let start = self.scanned.max(self.pos);
        match find_subsequence(&self.buf[start..], needle) {
            Some(idx) => {
                self.scanned = 0;
                Some(start + idx)
            }
            None => {
                self.scanned = self.buf.len().saturating_sub(needle.len() - 1).max(self.pos);
                None
            }
        }
    }

    /// Move up to `max` buffered bytes into the body.
    fn take_body(&mut self, max: usize) -> usize {
        let taken = self.buffered().min(max);
        self.body.extend_from_slice(&self.buf[self.pos..self.pos + taken]);
        self.pos += taken;
        taken
    }

    fn compact(&mut self) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.scanned = self.scanned.saturating_sub(self.pos);
            self.pos = 0;
        }
    }

    fn take_response(&mut self) -> Result<HttpResponse, ConnectionError> {
        let (status, headers) = self
            .head
            .take()
            .ok_or_else(|| ConnectionError::MalformedResponse("response has no head".to_string()))?;
        Ok(HttpResponse {
            status,
            headers,
            body: std::mem::take(&mut self.body),
        })
    }
}

fn body_framing(status: u16, headers: &[(String, String)], head_request: bool) -> Result<Framing, ConnectionError> {
    if head_request || status == 204 || status == 304 {
        return Ok(Framing::Length(0));
    }
    if find_header(headers, "transfer-encoding").is_some_and(|v| v.to_ascii_lowercase().contains("chunked")) {
        return Ok(Framing::Chunked(Chunk::Size));
    }
    match find_header(headers, "content-length") {
        Some(len) => len
            .trim()
            .parse()
            .map(Framing::Length)
            .map_err(|_| ConnectionError::MalformedResponse(format!("bad Content-Length {len:?}"))),
        None => Ok(Framing::UntilEof),
    }
}

fn parse_head(head: &str) -> Result<(u16, Vec<(String, String)>), ConnectionError> {
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(ConnectionError::MalformedResponse(format!("bad status line {status_line:?}")));
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| ConnectionError::MalformedResponse(format!("bad status line {status_line:?}")))?;

    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ConnectionError::MalformedResponse(format!("bad header line {line:?}")))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok((status, headers))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: HttpMethod, body: Option<&[u8]>) -> HttpRequest {
        HttpRequest {
            method,
            target: "/hosts?name=h1".to_string(),
            headers: vec![
                ("Host".to_string(), "localhost:8181".to_string()),
                ("Authorization".to_string(), "Test sig".to_string()),
            ],
            body: body.map(<[u8]>::to_vec),
        }
    }

    #[test]
    fn body_is_framed_by_exact_content_length() {
        let body = "{\"name\":\"h\u{e9}\"}".as_bytes();
        let wire = request(HttpMethod::Post, Some(body)).to_wire();
        let text = String::from_utf8(wire.clone()).unwrap();
        assert!(text.starts_with("POST /hosts?name=h1 HTTP/1.1\r\n"));
        assert!(text.contains(&format!("\r\nContent-Length: {}\r\n", body.len())));
        assert!(!text.to_ascii_lowercase().contains("transfer-encoding"));
        assert!(wire.ends_with(b"\r\n\r\n{\"name\":\"h\xc3\xa9\"}"));
    }

    #[test]
    fn get_without_body_has_no_content_length() {
        let text = String::from_utf8(request(HttpMethod::Get, None).to_wire()).unwrap();
        assert_eq!(
            text,
            "GET /hosts?name=h1 HTTP/1.1\r\nHost: localhost:8181\r\nAuthorization: Test sig\r\n\r\n"
        );
    }

    #[test]
    fn bodyless_post_announces_zero_length() {
        let text = String::from_utf8(request(HttpMethod::Post, None).to_wire()).unwrap();
        assert!(text.ends_with("Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn parses_content_length_response() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nok";
        let response = parse_response(raw, false, false).unwrap().unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.text(), "ok");
    }

    #[test]
    fn waits_for_full_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nok";
        assert!(parse_response(raw, false, false).unwrap().is_none());
        assert!(parse_response(b"HTTP/1.1 200 OK\r\nContent-Le", false, false).unwrap().is_none());
    }

    #[test]
    fn parses_chunked_response_with_trailer() {
        let raw = b"HTTP/1.1 409 Conflict\r\nTransfer-Encoding: chunked\r\n\r\n\
                    4\r\ncon\x66\r\n4;ext=1\r\nlict\r\n0\r\nX-Trailer: t\r\n\r\n";
        let response = parse_response(raw, false, false).unwrap().unwrap();
        assert_eq!(response.status, 409);
        assert_eq!(response.text(), "conflict");
    }

    #[test]
    fn incomplete_chunked_body_needs_more() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nconf\r\n";
        assert!(parse_response(raw, false, false).unwrap().is_none());
    }

    #[test]
    fn unframed_body_runs_to_eof() {
        let raw = b"HTTP/1.0 500 Internal Server Error\r\n\r\nboom";
        assert!(parse_response(raw, false, false).unwrap().is_none());
        let response = parse_response(raw, false, true).unwrap().unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.text(), "boom");
    }

    #[test]
    fn skips_interim_continue() {
        let raw = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n";
        let response = parse_response(raw, false, false).unwrap().unwrap();
        assert_eq!(response.status, 201);
        assert!(response.body.is_empty());
    }

    #[test]
    fn no_content_and_head_have_empty_bodies() {
        let raw = b"HTTP/1.1 204 No Content\r\n\r\n";
        assert!(parse_response(raw, false, false).unwrap().unwrap().body.is_empty());
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 42\r\n\r\n";
        assert!(parse_response(raw, true, false).unwrap().unwrap().body.is_empty());
    }

    #[test]
    fn rejects_garbage_status_line() {
        let err = parse_response(b"SSH-2.0-OpenSSH\r\n\r\n", false, false).unwrap_err();
        assert!(matches!(err, ConnectionError::MalformedResponse(_)));
    }

    #[test]
    fn read_response_reports_empty_connection() {
        let mut empty: &[u8] = b"";
        let err = read_response(&mut empty, false).unwrap_err();
        assert!(matches!(err, ConnectionError::MalformedResponse(_)));
    }

    #[test]
    fn read_response_stops_at_content_length() {
        let mut raw: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nokEXTRA";
        let response = read_response(&mut raw, false).unwrap();
        assert_eq!(response.body, b"ok");
    }

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.len().min(self.step).min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn chunked_response(body: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        for chunk in body.chunks(chunk_size) {
            raw.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            raw.extend_from_slice(chunk);
            raw.extend_from_slice(b"\r\n");
        }
        raw.extend_from_slice(b"0\r\n\r\n");
        raw
    }

    #[test]
    fn reads_multi_megabyte_chunked_body() {
        let body: Vec<u8> = (0..8 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        let raw = chunked_response(&body, 4096);
        let mut reader = Trickle { data: &raw, step: 8 * 1024 };

        let response = read_response(&mut reader, false).unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body.len(), body.len());
        assert!(response.body == body);
    }

    #[test]
    fn parser_keeps_only_unconsumed_bytes() {
        let body = vec![b'x'; 2 * 1024 * 1024];
        let raw = chunked_response(&body, 1000);
        let mut parser = ResponseParser::new(false);
        let mut response = None;
        for piece in raw.chunks(777) {
            if let Some(done) = parser.feed(piece).unwrap() {
                response = Some(done);
                break;
            }
            // At most a partial chunk-size line or the CRLF after chunk data
            // is held back; decoded data is never re-read.
            assert!(parser.buffered() < 16, "{} bytes buffered", parser.buffered());
        }
        assert_eq!(response.unwrap().body.len(), body.len());
    }

    #[test]
    fn chunk_framing_split_across_reads() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                    4\r\ncon\x66\r\n4;ext=1\r\nlict\r\n0\r\nX-Trailer: t\r\n\r\n";
        let mut reader = Trickle { data: raw, step: 1 };
        let response = read_response(&mut reader, false).unwrap();
        assert_eq!(response.text(), "conflict");
    }

    #[test]
    fn oversized_response_is_rejected() {
        let mut raw = b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\n\r\n".to_vec();
        raw.extend_from_slice(&[b'a'; 4096]);
        let mut reader = Trickle { data: &raw, step: 512 };
        let err = read_response_limited(&mut reader, false, 1024).unwrap_err();
        assert!(matches!(err, ConnectionError::MalformedResponse(ref m) if m.contains("exceeds 1024 bytes")), "{err:?}");

        let mut reader = Trickle { data: &raw, step: 512 };
        assert_eq!(read_response_limited(&mut reader, false, 8192).unwrap().body.len(), 4096);
    }

    #[test]
    fn unframed_body_is_limited_too() {
        let mut raw = b"HTTP/1.0 200 OK\r\n\r\n".to_vec();
        raw.extend_from_slice(&[b'a'; 4096]);
        let mut reader = Trickle { data: &raw, step: 1024 };
        let err = read_response_limited(&mut reader, false, 2048).unwrap_err();
        assert!(matches!(err, ConnectionError::MalformedResponse(_)));
    }

    #[test]
    fn truncated_chunked_body_is_malformed() {
        let mut raw: &[u8] = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nco";
        let err = read_response(&mut raw, false).unwrap_err();
        assert!(matches!(err, ConnectionError::MalformedResponse(ref m) if m.contains("incomplete")), "{err:?}");
    }

    #[test]
    fn origin_form_targets_pass_checks() {
        assert!(check_target("/hosts?name=h+1&limit=10").is_ok());
        assert!(check_target("/").is_ok());
        assert!(matches!(check_target("http://x/hosts"), Err(ApiError::MalformedRequest(_))));
        assert!(matches!(check_target("/a b"), Err(ApiError::MalformedRequest(_))));
        assert!(matches!(check_target("/a\r\nb"), Err(ApiError::MalformedRequest(_))));
    }

    #[test]
    fn header_checks_reject_line_breaks_and_non_tokens() {
        assert!(check_header("X-Request-Id", "42 \t ok").is_ok());
        assert!(check_header("Bad Name", "v").is_err());
        assert!(check_header("X-Colon:", "v").is_err());
        assert!(check_header("X-A", "1\r\nX-B: 2").is_err());
        assert!(check_header("X-A", "1\n").is_err());
    }

    #[test]
    fn json_decodes_body() {
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: br#"{"name":"h1"}"#.to_vec(),
        };
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["name"], "h1");

        let bad = HttpResponse {
            body: b"not json".to_vec(),
            ..response
        };
        let err = bad.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }
}
