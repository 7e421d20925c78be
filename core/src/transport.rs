//! One-shot TCP/TLS connections to the attestation service.
//!
//! # Design
//! `open` returns a blocking stream that carries exactly one request and one
//! response. For TLS the handshake is driven to completion inside `open`, so
//! certificate failures surface before a single request byte is written.
//!
//! The optional timeout bounds connection establishment only. Reads and
//! writes have no deadline: a server that stalls mid-response blocks the
//! calling thread indefinitely. Response size is bounded separately by
//! `http::MAX_RESPONSE_BYTES`.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConnection, StreamOwned};
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::ConnectionError;
use crate::tls;

/// An established connection, plain or TLS.
pub enum Connection {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connection::Plain(stream) => f.debug_tuple("Plain").field(stream).finish(),
            Connection::Tls(stream) => f.debug_tuple("Tls").field(&stream.sock).finish(),
        }
    }
}

impl Connection {
    pub fn is_tls(&self) -> bool {
        matches!(self, Connection::Tls(_))
    }

    /// Best-effort orderly close: TLS close_notify, then TCP shutdown.
    pub fn close(mut self) {
        if let Connection::Tls(stream) = &mut self {
            stream.conn.send_close_notify();
            if let Err(e) = stream.flush() {
                trace!("close_notify not delivered: {e}");
            }
        }
        let sock = match &self {
            Connection::Plain(stream) => stream,
            Connection::Tls(stream) => &stream.sock,
        };
        if let Err(e) = sock.shutdown(Shutdown::Both) {
            trace!("socket shutdown failed: {e}");
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(stream) => stream.read(buf),
            Connection::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(stream) => stream.write(buf),
            Connection::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Plain(stream) => stream.flush(),
            Connection::Tls(stream) => stream.flush(),
        }
    }
}

/// Connect to `config.host:config.port`, upgrading to TLS when `use_tls` is set.
pub fn open(config: &ConnectionConfig, timeout: Option<Duration>) -> Result<Connection, ConnectionError> {
    if !config.use_tls {
        let tcp = connect_tcp(&config.host, config.port, timeout)?;
        debug!(host = %config.host, port = config.port, "plain HTTP connection established");
        return Ok(Connection::Plain(tcp));
    }

    let tls_config = tls::client_config(config)?;
    let server_name =
        ServerName::try_from(config.host.clone()).map_err(|_| ConnectionError::ServerName(config.host.clone()))?;
    if config.is_insecure() {
        warn!(
            host = %config.host,
            "TLS server certificate verification is DISABLED (no ca_file configured); do not use in production"
        );
    }

    let mut tcp = connect_tcp(&config.host, config.port, timeout)?;
    let mut conn = ClientConnection::new(tls_config, server_name)?;
    while conn.is_handshaking() {
        conn.complete_io(&mut tcp).map_err(|source| ConnectionError::Handshake {
            host: config.host.clone(),
            source,
        })?;
    }
    debug!(
        host = %config.host,
        port = config.port,
        version = ?conn.protocol_version(),
        mutual = config.cert_file.is_some(),
        "TLS connection established"
    );
    Ok(Connection::Tls(Box::new(StreamOwned::new(conn, tcp))))
}

fn connect_tcp(host: &str, port: u16, timeout: Option<Duration>) -> Result<TcpStream, ConnectionError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| ConnectionError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, "connect attempt failed: {e}");
                last_error = Some((addr, e));
            }
        }
    }

    Err(match last_error {
        Some((addr, source)) => ConnectionError::Connect {
            addr: addr.to_string(),
            source,
        },
        None => ConnectionError::Resolve {
            host: host.to_string(),
            port,
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
        },
    })
}
