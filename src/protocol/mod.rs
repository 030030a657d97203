//! FastCGI wire format.
//!
//! Record framing and name-value pair encoding per the FastCGI 1.0
//! specification. Everything here is pure byte manipulation over
//! `Read`/`Write`; no sockets are opened in this module.

mod params;
mod record;

pub use params::{
    decode_length, decode_params, encode_length, encode_params,
    MAX_PARAM_LENGTH,
};
pub use record::{
    begin_request_body, decode_record_header, encode_record, write_record,
    write_stream, EndRequest, Record, RecordHeader, RecordReader,
};

pub const FCGI_VERSION: u8 = 1;
pub const FCGI_HEADER_LEN: usize = 8;
pub const FCGI_MAX_CONTENT_LEN: usize = 65535;

/// Request id used by management records (`GetValues` and friends).
pub const FCGI_NULL_REQUEST_ID: u16 = 0;

pub const FCGI_RESPONDER: u16 = 1;
pub const FCGI_KEEP_CONN: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    BeginRequest,
    AbortRequest,
    EndRequest,
    Params,
    Stdin,
    Stdout,
    Stderr,
    Data,
    GetValues,
    GetValuesResult,
    UnknownType,
    Other(u8),
}

impl RecordType {
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::BeginRequest => 1,
            Self::AbortRequest => 2,
            Self::EndRequest => 3,
            Self::Params => 4,
            Self::Stdin => 5,
            Self::Stdout => 6,
            Self::Stderr => 7,
            Self::Data => 8,
            Self::GetValues => 9,
            Self::GetValuesResult => 10,
            Self::UnknownType => 11,
            Self::Other(raw) => *raw,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeginRequest => "FCGI_BEGIN_REQUEST",
            Self::AbortRequest => "FCGI_ABORT_REQUEST",
            Self::EndRequest => "FCGI_END_REQUEST",
            Self::Params => "FCGI_PARAMS",
            Self::Stdin => "FCGI_STDIN",
            Self::Stdout => "FCGI_STDOUT",
            Self::Stderr => "FCGI_STDERR",
            Self::Data => "FCGI_DATA",
            Self::GetValues => "FCGI_GET_VALUES",
            Self::GetValuesResult => "FCGI_GET_VALUES_RESULT",
            Self::UnknownType => "FCGI_UNKNOWN_TYPE",
            Self::Other(_) => "FCGI_OTHER",
        }
    }
}

impl From<u8> for RecordType {
    fn from(raw: u8) -> Self {
        match raw {
            1 => Self::BeginRequest,
            2 => Self::AbortRequest,
            3 => Self::EndRequest,
            4 => Self::Params,
            5 => Self::Stdin,
            6 => Self::Stdout,
            7 => Self::Stderr,
            8 => Self::Data,
            9 => Self::GetValues,
            10 => Self::GetValuesResult,
            11 => Self::UnknownType,
            other => Self::Other(other),
        }
    }
}

impl From<RecordType> for u8 {
    fn from(ty: RecordType) -> Self {
        ty.as_u8()
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(raw) => write!(f, "FCGI_OTHER({})", raw),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// `protocolStatus` field of an `FCGI_END_REQUEST` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStatus {
    RequestComplete,
    CantMpxConn,
    Overloaded,
    UnknownRole,
    Other(u8),
}

impl ProtocolStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::RequestComplete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestComplete => "request complete",
            Self::CantMpxConn => "cannot multiplex connection",
            Self::Overloaded => "overloaded",
            Self::UnknownRole => "unknown role",
            Self::Other(_) => "unknown protocol status",
        }
    }
}

impl From<u8> for ProtocolStatus {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::RequestComplete,
            1 => Self::CantMpxConn,
            2 => Self::Overloaded,
            3 => Self::UnknownRole,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for ProtocolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(raw) => write!(f, "{} ({})", self.as_str(), raw),
            _ => f.write_str(self.as_str()),
        }
    }
}
