//! Minimal FastCGI responder for driving the client end to end.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
#[cfg(unix)]
use std::os::unix::net::UnixListener;
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ripht_php_fpm::protocol::{
    decode_params, encode_record, EndRequest, ProtocolStatus, RecordReader,
    RecordType,
};

/// What the responder received for one request.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub begin: Vec<u8>,
    pub request_id: u16,
    pub params: Vec<(String, String)>,
    pub stdin: Vec<u8>,
    pub params_records: usize,
    pub stdin_records: usize,
}

impl Captured {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub type Handler = Arc<dyn Fn(&Captured) -> Vec<u8> + Send + Sync>;

/// Builds raw responder output record by record.
#[derive(Debug, Default)]
pub struct Reply {
    bytes: Vec<u8>,
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(self, content: impl AsRef<[u8]>) -> Self {
        self.record(RecordType::Stdout, content.as_ref())
    }

    pub fn stderr(self, content: impl AsRef<[u8]>) -> Self {
        self.record(RecordType::Stderr, content.as_ref())
    }

    pub fn end(self, app_status: u32) -> Self {
        self.end_with(app_status, ProtocolStatus::RequestComplete)
    }

    pub fn end_with(self, app_status: u32, status: ProtocolStatus) -> Self {
        let body = EndRequest {
            app_status,
            protocol_status: status,
        }
        .encode();
        self.record(RecordType::EndRequest, &body)
    }

    pub fn record(mut self, ty: RecordType, content: &[u8]) -> Self {
        for chunk in content.chunks(65535) {
            self.bytes
                .extend(encode_record(ty, 1, chunk).expect("encode record"));
        }
        if content.is_empty() {
            self.bytes
                .extend(encode_record(ty, 1, &[]).expect("encode record"));
        }
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Replies to every request with the same CGI output.
pub fn fixed(output: &'static str) -> Handler {
    Arc::new(move |_: &Captured| {
        Reply::new()
            .stdout(output)
            .stdout("")
            .end(0)
            .into_bytes()
    })
}

/// Replies with the received environment and body as JSON.
pub fn echo_env() -> Handler {
    Arc::new(|captured: &Captured| {
        let env: BTreeMap<&str, &str> = captured
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let json = serde_json::json!({
            "env": env,
            "stdin": String::from_utf8_lossy(&captured.stdin),
        });

        Reply::new()
            .stdout(format!("Content-Type: application/json\r\n\r\n{}", json))
            .end(0)
            .into_bytes()
    })
}

pub fn serve<S: Read + Write>(mut stream: S, handler: &Handler) -> Captured {
    let mut captured = Captured::default();
    let mut params = Vec::new();

    {
        let mut reader = RecordReader::new(&mut stream);
        while let Some(Ok(record)) = reader.next() {
            captured.request_id = record.request_id;
            match record.record_type {
                RecordType::BeginRequest => captured.begin = record.content,
                RecordType::Params => {
                    captured.params_records += 1;
                    params.extend(record.content);
                }
                RecordType::Stdin if record.content.is_empty() => {
                    captured.stdin_records += 1;
                    break;
                }
                RecordType::Stdin => {
                    captured.stdin_records += 1;
                    captured.stdin.extend(record.content);
                }
                _ => {}
            }
        }
    }

    captured.params = decode_params(&params).expect("decode params");

    let reply = handler(&captured);
    let _ = stream.write_all(&reply);
    let _ = stream.flush();

    captured
}

/// Accepts `connections` connections, serving each on its own thread.
pub struct MockResponder {
    addr: Option<SocketAddr>,
    #[cfg(unix)]
    path: Option<PathBuf>,
    handle: JoinHandle<Vec<Captured>>,
}

impl MockResponder {
    pub fn tcp(connections: usize, handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let handle = thread::spawn(move || {
            let workers: Vec<_> = (0..connections)
                .map(|_| {
                    let (stream, _) = listener.accept().expect("accept");
                    let handler = Arc::clone(&handler);
                    thread::spawn(move || serve(stream, &handler))
                })
                .collect();

            workers
                .into_iter()
                .map(|w| w.join().expect("mock worker"))
                .collect()
        });

        Self {
            addr: Some(addr),
            #[cfg(unix)]
            path: None,
            handle,
        }
    }

    #[cfg(unix)]
    pub fn unix(dir: &Path, connections: usize, handler: Handler) -> Self {
        let path = dir.join("php8.3-fpm.sock");
        let listener = UnixListener::bind(&path).expect("bind unix socket");

        let handle = thread::spawn(move || {
            let workers: Vec<_> = (0..connections)
                .map(|_| {
                    let (stream, _) = listener.accept().expect("accept");
                    let handler = Arc::clone(&handler);
                    thread::spawn(move || serve(stream, &handler))
                })
                .collect();

            workers
                .into_iter()
                .map(|w| w.join().expect("mock worker"))
                .collect()
        });

        Self {
            addr: None,
            path: Some(path),
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.expect("tcp responder").port()
    }

    #[cfg(unix)]
    pub fn path(&self) -> &Path {
        self.path.as_deref().expect("unix responder")
    }

    pub fn join(self) -> Vec<Captured> {
        self.handle.join().expect("mock responder")
    }
}

/// A port nothing is listening on.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("local addr").port()
}
