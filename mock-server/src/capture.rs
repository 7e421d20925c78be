//! Raw request recorder for byte-level client tests.
//!
//! # Design
//! `CaptureServer` is a blocking, thread-backed listener that answers a fixed
//! list of connections with canned responses. For each connection it keeps
//! the request head, the `Content-Length`-framed body and any bytes that
//! arrived after the body, so tests can assert on exact framing. Connections
//! that fail (for instance a TLS handshake the client aborts) produce no
//! capture.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rustls::{ServerConfig, ServerConnection, StreamOwned};

/// How long to wait for bytes past the framed body.
const TRAILING_GRACE: Duration = Duration::from_millis(200);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Response written back for one connection.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl CannedResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    fn to_wire(&self) -> Vec<u8> {
        let mut wire = format!(
            "HTTP/1.1 {} Canned\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.body.len()
        )
        .into_bytes();
        wire.extend_from_slice(&self.body);
        wire
    }
}

/// One request as it arrived on the socket.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request line and headers, without the terminating blank line.
    pub head: String,
    pub body: Vec<u8>,
    /// Bytes received after the framed body.
    pub trailing: Vec<u8>,
}

impl CapturedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn method(&self) -> &str {
        self.request_line().split(' ').next().unwrap_or_default()
    }

    pub fn target(&self) -> &str {
        self.request_line().split(' ').nth(1).unwrap_or_default()
    }

    /// Every value sent under `name`, compared case-insensitively.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.head
            .lines()
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .filter(|(k, _)| k.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }
}

pub struct CaptureServer {
    addr: SocketAddr,
    captured: mpsc::Receiver<CapturedRequest>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureServer {
    /// Serve `responses` over plain TCP, one connection each.
    pub fn plain(responses: Vec<CannedResponse>) -> io::Result<Self> {
        Self::start(None, responses)
    }

    /// Serve `responses` over TLS with `config`.
    pub fn tls(config: Arc<ServerConfig>, responses: Vec<CannedResponse>) -> io::Result<Self> {
        Self::start(Some(config), responses)
    }

    fn start(tls: Option<Arc<ServerConfig>>, responses: Vec<CannedResponse>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let (tx, captured) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            for response in responses {
                let tcp = match listener.accept() {
                    Ok((tcp, _)) => tcp,
                    Err(e) => {
                        tracing::warn!("capture accept failed: {e}");
                        return;
                    }
                };
                if stopped.load(Ordering::SeqCst) {
                    return;
                }
                match serve(tcp, tls.clone(), &response) {
                    Ok(request) => {
                        if tx.send(request).is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::debug!("capture connection failed: {e}"),
                }
            }
        });

        Ok(Self {
            addr,
            captured,
            stop,
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Next captured request, waiting up to `timeout`.
    pub fn next_request(&self, timeout: Duration) -> Option<CapturedRequest> {
        self.captured.recv_timeout(timeout).ok()
    }
}

impl Drop for CaptureServer {
    fn drop(&mut self) {
        // Unblock a pending accept so the thread can see the flag.
        self.stop.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(tcp: TcpStream, tls: Option<Arc<ServerConfig>>, response: &CannedResponse) -> io::Result<CapturedRequest> {
    let control = tcp.try_clone()?;
    control.set_read_timeout(Some(READ_TIMEOUT))?;
    match tls {
        Some(config) => {
            let conn = ServerConnection::new(config).map_err(io::Error::other)?;
            let mut stream = StreamOwned::new(conn, tcp);
            let request = exchange(&mut stream, &control, response)?;
            stream.conn.send_close_notify();
            stream.flush()?;
            Ok(request)
        }
        None => {
            let mut stream = tcp;
            exchange(&mut stream, &control, response)
        }
    }
}

fn exchange<S: Read + Write>(stream: &mut S, control: &TcpStream, response: &CannedResponse) -> io::Result<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let (head_len, body_len) = loop {
        if let Some(framing) = framing(&buf)? {
            let (head_len, body_len) = framing;
            if buf.len() >= head_len + 4 + body_len {
                break framing;
            }
        }
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "client closed mid-request"));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    // Anything else the client sends before waiting for the response.
    control.set_read_timeout(Some(TRAILING_GRACE))?;
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => break,
            Err(e) => return Err(e),
        }
    }
    control.set_read_timeout(Some(READ_TIMEOUT))?;

    stream.write_all(&response.to_wire())?;
    stream.flush()?;

    let body_start = head_len + 4;
    Ok(CapturedRequest {
        head: String::from_utf8_lossy(&buf[..head_len]).into_owned(),
        body: buf[body_start..body_start + body_len].to_vec(),
        trailing: buf[body_start + body_len..].to_vec(),
    })
}

/// Head length and declared body length, once the head is complete.
fn framing(buf: &[u8]) -> io::Result<Option<(usize, usize)>> {
    let Some(head_len) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return Ok(None);
    };
    let head = String::from_utf8_lossy(&buf[..head_len]);
    let mut body_len = 0;
    for line in head.lines().skip(1) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                body_len = value
                    .trim()
                    .parse()
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad Content-Length"))?;
            }
        }
    }
    Ok(Some((head_len, body_len)))
}
