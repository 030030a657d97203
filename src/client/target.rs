use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::FpmError;

fn socket_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^php\d+(\.\d+)?-fpm\.sock$").ok())
        .as_ref()
}

/// Where the FastCGI responder listens.
///
/// Parses from `host:port`, `tcp://host:port` or `unix:///path/php8.3-fpm.sock`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum ConnectionTarget {
    Tcp { host: String, port: u16 },
    #[cfg(unix)]
    Unix { path: PathBuf },
}

impl ConnectionTarget {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// A Unix-domain socket target.
    ///
    /// The file name must look like `php8.3-fpm.sock`; anything else is
    /// rejected here, before a connection is ever attempted.
    #[cfg(unix)]
    pub fn unix(path: impl AsRef<Path>) -> Result<Self, FpmError> {
        let path = path.as_ref();
        validate_socket_name(path)?;

        Ok(Self::Unix {
            path: path.to_path_buf(),
        })
    }

    /// Non-Unix targets cannot exist on this platform.
    #[cfg(not(unix))]
    pub fn unix(path: impl AsRef<Path>) -> Result<Self, FpmError> {
        validate_socket_name(path.as_ref())?;
        Err(FpmError::config(
            "Unix-domain sockets are not supported on this platform",
        ))
    }

    pub fn is_unix(&self) -> bool {
        !matches!(self, Self::Tcp { .. })
    }

    /// Opens the transport. Every failure is reported as
    /// [`FpmError::Connection`]. A zero timeout means no timeout.
    pub fn connect(
        &self,
        timeout: Option<Duration>,
    ) -> Result<FcgiStream, FpmError> {
        let timeout = timeout.filter(|t| !t.is_zero());
        let stream = match self {
            Self::Tcp { host, port } => {
                connect_tcp(host, *port, timeout).map(FcgiStream::Tcp)
            }
            #[cfg(unix)]
            Self::Unix { path } => UnixStream::connect(path).map(FcgiStream::Unix),
        };

        let connection_err = |source| FpmError::Connection {
            target: self.to_string(),
            source,
        };

        let stream = stream.map_err(connection_err)?;
        stream
            .set_timeouts(timeout)
            .map_err(connection_err)?;

        Ok(stream)
    }
}

fn validate_socket_name(path: &Path) -> Result<(), FpmError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    if !socket_name_pattern().is_some_and(|re| re.is_match(name)) {
        return Err(FpmError::config(format!(
            "Unix socket name must match php<major>[.<minor>]-fpm.sock, got {}",
            path.display()
        )));
    }
    Ok(())
}

fn connect_tcp(
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> io::Result<TcpStream> {
    let Some(timeout) = timeout else {
        return TcpStream::connect((host, port));
    };

    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{host}:{port} did not resolve to any address"),
        )
    }))
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => {
                write!(f, "tcp://[{}]:{}", host, port)
            }
            Self::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            #[cfg(unix)]
            Self::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

impl FromStr for ConnectionTarget {
    type Err = FpmError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();

        if let Some(path) = raw.strip_prefix("unix://") {
            return Self::unix(path);
        }

        let addr = raw.strip_prefix("tcp://").unwrap_or(raw);
        let Some((host, port)) = addr.rsplit_once(':') else {
            return Err(FpmError::config(format!(
                "invalid FastCGI address (expected host:port or unix://path): {}",
                raw
            )));
        };

        let port: u16 = port.parse().map_err(|_| {
            FpmError::config(format!("invalid FastCGI port in address: {}", raw))
        })?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(FpmError::config(format!(
                "missing host in FastCGI address: {}",
                raw
            )));
        }

        Ok(Self::tcp(host, port))
    }
}

impl TryFrom<String> for ConnectionTarget {
    type Error = FpmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConnectionTarget> for String {
    fn from(target: ConnectionTarget) -> Self {
        target.to_string()
    }
}

/// An open connection to a responder.
#[derive(Debug)]
pub enum FcgiStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl FcgiStream {
    fn set_timeouts(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(s) => {
                s.set_read_timeout(timeout)?;
                s.set_write_timeout(timeout)
            }
            #[cfg(unix)]
            Self::Unix(s) => {
                s.set_read_timeout(timeout)?;
                s.set_write_timeout(timeout)
            }
        }
    }
}

impl Read for FcgiStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Self::Unix(s) => s.read(buf),
        }
    }
}

impl Write for FcgiStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Self::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Self::Unix(s) => s.flush(),
        }
    }
}
