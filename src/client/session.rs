use std::fmt;
use std::io::{BufWriter, Read, Write};
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

use super::target::{ConnectionTarget, FcgiStream};
use crate::execution::SessionHooks;
use crate::protocol::{
    begin_request_body, write_record, write_stream, EndRequest, RecordReader,
    RecordType, FCGI_NULL_REQUEST_ID, FCGI_RESPONDER,
};
use crate::FpmError;

/// Request id used for the single request carried by each connection.
pub const REQUEST_ID: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    Sent,
    AwaitingResponse,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
            Self::Sent => "sent",
            Self::AwaitingResponse => "awaiting-response",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the session stops reading the response stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Termination {
    /// Read until `FCGI_END_REQUEST` (or a clean end of stream) and
    /// concatenate every stdout chunk.
    #[default]
    EndRequest,
    /// Stop at the first non-empty stdout chunk. Output split across
    /// several records is truncated; only use this against responders
    /// known to answer in one record.
    FirstStdout,
}

impl FromStr for Termination {
    type Err = FpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "end_request" | "end-request" => Ok(Self::EndRequest),
            "first_stdout" | "first-stdout" => Ok(Self::FirstStdout),
            other => Err(FpmError::config(format!(
                "unknown termination policy: {}",
                other
            ))),
        }
    }
}

/// Unparsed output of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Absent when the stream ended cleanly before `FCGI_END_REQUEST`, or
    /// when [`Termination::FirstStdout`] stopped reading early.
    pub end: Option<EndRequest>,
}

/// One request/response exchange over a single connection.
///
/// Any failure closes the stream and moves the session to
/// [`SessionState::Closed`].
pub struct Session<S> {
    stream: Option<S>,
    state: SessionState,
    termination: Termination,
}

impl Session<FcgiStream> {
    pub fn new(termination: Termination) -> Self {
        Self {
            stream: None,
            state: SessionState::Idle,
            termination,
        }
    }

    pub fn connect(
        &mut self,
        target: &ConnectionTarget,
        timeout: Option<Duration>,
    ) -> Result<(), FpmError> {
        self.expect_state(SessionState::Idle)?;

        match target.connect(timeout) {
            Ok(stream) => {
                #[cfg(feature = "tracing")]
                debug!(address = %target, "Connected to FastCGI responder");

                self.stream = Some(stream);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }
}

impl<S: Read + Write> Session<S> {
    /// Starts a session over an already-open stream.
    pub fn from_stream(stream: S, termination: Termination) -> Self {
        Self {
            stream: Some(stream),
            state: SessionState::Connected,
            termination,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Writes the full request envelope and flushes it.
    ///
    /// `params` is an encoded `FCGI_PARAMS` payload. A `None` body sends
    /// only the empty stdin terminator.
    pub fn send<H: SessionHooks + ?Sized>(
        &mut self,
        params: &[u8],
        stdin: Option<&[u8]>,
        hooks: &mut H,
    ) -> Result<(), FpmError> {
        self.expect_state(SessionState::Connected)?;

        let stdin = stdin.unwrap_or_default();
        let result = match self.stream.as_mut() {
            Some(stream) => write_envelope(stream, params, stdin),
            None => Err(FpmError::InvalidState(SessionState::Closed.as_str())),
        };

        if let Err(e) = result {
            return Err(self.fail(e));
        }

        #[cfg(feature = "tracing")]
        debug!(
            params_len = params.len(),
            stdin_len = stdin.len(),
            "FastCGI request sent"
        );

        hooks.on_request_sent(params.len(), stdin.len());
        self.state = SessionState::Sent;
        Ok(())
    }

    /// Reads the response stream until the termination policy is met, then
    /// closes the connection.
    pub fn receive<H: SessionHooks + ?Sized>(
        &mut self,
        hooks: &mut H,
    ) -> Result<RawOutput, FpmError> {
        self.expect_state(SessionState::Sent)?;
        self.state = SessionState::AwaitingResponse;

        let termination = self.termination;
        let result = match self.stream.as_mut() {
            Some(stream) => read_output(stream, termination, hooks),
            None => Err(FpmError::InvalidState(SessionState::Closed.as_str())),
        };

        match result {
            Ok(output) => {
                self.close();
                Ok(output)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Drops the stream. Safe to call in any state.
    pub fn close(&mut self) {
        self.stream = None;
        self.state = SessionState::Closed;
    }

    fn expect_state(&mut self, expected: SessionState) -> Result<(), FpmError> {
        if self.state == expected {
            return Ok(());
        }

        let actual = self.state;
        self.close();
        Err(FpmError::InvalidState(actual.as_str()))
    }

    fn fail(&mut self, error: FpmError) -> FpmError {
        self.close();
        error
    }
}

fn write_envelope<W: Write>(
    stream: &mut W,
    params: &[u8],
    stdin: &[u8],
) -> Result<(), FpmError> {
    let mut w = BufWriter::new(stream);

    write_record(
        &mut w,
        RecordType::BeginRequest,
        REQUEST_ID,
        &begin_request_body(FCGI_RESPONDER, 0),
    )?;

    write_stream(&mut w, RecordType::Params, REQUEST_ID, params)?;
    write_record(&mut w, RecordType::Params, REQUEST_ID, &[])?;

    write_stream(&mut w, RecordType::Stdin, REQUEST_ID, stdin)?;
    write_record(&mut w, RecordType::Stdin, REQUEST_ID, &[])?;

    w.flush()
        .map_err(FpmError::TransportWrite)
}

fn read_output<R: Read, H: SessionHooks + ?Sized>(
    stream: &mut R,
    termination: Termination,
    hooks: &mut H,
) -> Result<RawOutput, FpmError> {
    let mut output = RawOutput::default();
    let mut reader = RecordReader::new(stream);

    while let Some(record) = reader.next_record()? {
        if record.request_id != REQUEST_ID
            && record.request_id != FCGI_NULL_REQUEST_ID
        {
            return Err(FpmError::MalformedRecord(format!(
                "unexpected request id {} in {} record",
                record.request_id, record.record_type
            )));
        }

        hooks.on_record(record.record_type, record.content.len());

        match record.record_type {
            RecordType::Stdout if record.content.is_empty() => {}
            RecordType::Stdout => {
                hooks.on_stdout(&record.content);
                output
                    .stdout
                    .extend_from_slice(&record.content);

                if termination == Termination::FirstStdout {
                    break;
                }
            }
            RecordType::Stderr => {
                output
                    .stderr
                    .extend_from_slice(&record.content);
            }
            RecordType::EndRequest => {
                let end = EndRequest::parse(&record.content)?;
                if !end.protocol_status.is_complete() {
                    #[cfg(feature = "tracing")]
                    warn!(
                        status = %end.protocol_status,
                        "FastCGI responder rejected the request"
                    );
                    return Err(FpmError::Rejected(end.protocol_status));
                }
                output.end = Some(end);
                break;
            }
            _other => {
                #[cfg(feature = "tracing")]
                trace!(record_type = %_other, "Ignoring FastCGI record");
            }
        }
    }

    Ok(output)
}
