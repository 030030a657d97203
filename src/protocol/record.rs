use std::io::{self, Read, Write};

#[cfg(feature = "tracing")]
use tracing::trace;

use super::{
    ProtocolStatus, RecordType, FCGI_HEADER_LEN, FCGI_MAX_CONTENT_LEN,
    FCGI_VERSION,
};
use crate::FpmError;

const PADDING: [u8; 8] = [0u8; 8];

fn padding_for(content_len: usize) -> usize {
    (8 - (content_len % 8)) % 8
}

fn header_bytes(
    record_type: RecordType,
    request_id: u16,
    content_len: usize,
    padding_len: usize,
) -> [u8; FCGI_HEADER_LEN] {
    let [id_hi, id_lo] = request_id.to_be_bytes();
    let [len_hi, len_lo] = (content_len as u16).to_be_bytes();

    [
        FCGI_VERSION,
        record_type.as_u8(),
        id_hi,
        id_lo,
        len_hi,
        len_lo,
        padding_len as u8,
        0,
    ]
}

fn check_content_len(len: usize) -> Result<(), FpmError> {
    if len > FCGI_MAX_CONTENT_LEN {
        return Err(FpmError::ProtocolEncoding(len));
    }
    Ok(())
}

/// Encodes a single record: 8-byte header, payload, zero padding up to the
/// next multiple of 8.
pub fn encode_record(
    record_type: RecordType,
    request_id: u16,
    payload: &[u8],
) -> Result<Vec<u8>, FpmError> {
    check_content_len(payload.len())?;

    let padding = padding_for(payload.len());
    let mut frame =
        Vec::with_capacity(FCGI_HEADER_LEN + payload.len() + padding);

    frame.extend_from_slice(&header_bytes(
        record_type,
        request_id,
        payload.len(),
        padding,
    ));
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&PADDING[..padding]);

    Ok(frame)
}

/// Writes a single record without building an intermediate frame.
pub fn write_record<W: Write + ?Sized>(
    w: &mut W,
    record_type: RecordType,
    request_id: u16,
    payload: &[u8],
) -> Result<(), FpmError> {
    check_content_len(payload.len())?;

    let padding = padding_for(payload.len());
    let header =
        header_bytes(record_type, request_id, payload.len(), padding);

    w.write_all(&header)
        .map_err(FpmError::TransportWrite)?;

    if !payload.is_empty() {
        w.write_all(payload)
            .map_err(FpmError::TransportWrite)?;
    }

    if padding > 0 {
        w.write_all(&PADDING[..padding])
            .map_err(FpmError::TransportWrite)?;
    }

    Ok(())
}

/// Writes an arbitrarily long payload as consecutive records of at most
/// 65535 bytes each. An empty payload writes nothing; stream terminators are
/// the caller's job.
pub fn write_stream<W: Write + ?Sized>(
    w: &mut W,
    record_type: RecordType,
    request_id: u16,
    payload: &[u8],
) -> Result<(), FpmError> {
    for chunk in payload.chunks(FCGI_MAX_CONTENT_LEN) {
        write_record(w, record_type, request_id, chunk)?;
    }
    Ok(())
}

/// Body of an `FCGI_BEGIN_REQUEST` record.
pub fn begin_request_body(role: u16, flags: u8) -> [u8; 8] {
    let [role_hi, role_lo] = role.to_be_bytes();
    [role_hi, role_lo, flags, 0, 0, 0, 0, 0]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub version: u8,
    pub record_type: RecordType,
    pub request_id: u16,
    pub content_length: u16,
    pub padding_length: u8,
}

impl RecordHeader {
    pub fn parse(bytes: &[u8; FCGI_HEADER_LEN]) -> Self {
        Self {
            version: bytes[0],
            record_type: RecordType::from(bytes[1]),
            request_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            content_length: u16::from_be_bytes([bytes[4], bytes[5]]),
            padding_length: bytes[6],
        }
    }
}

/// Decodes the header at the start of `bytes`, if there is a full one.
pub fn decode_record_header(bytes: &[u8]) -> Option<RecordHeader> {
    let header: &[u8; FCGI_HEADER_LEN] = bytes
        .get(..FCGI_HEADER_LEN)?
        .try_into()
        .ok()?;

    Some(RecordHeader::parse(header))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub record_type: RecordType,
    pub request_id: u16,
    pub content: Vec<u8>,
}

impl Record {
    pub fn new(
        record_type: RecordType,
        request_id: u16,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            record_type,
            request_id,
            content: content.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, FpmError> {
        encode_record(self.record_type, self.request_id, &self.content)
    }
}

/// Body of an `FCGI_END_REQUEST` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndRequest {
    pub app_status: u32,
    pub protocol_status: ProtocolStatus,
}

impl EndRequest {
    pub fn complete(app_status: u32) -> Self {
        Self {
            app_status,
            protocol_status: ProtocolStatus::RequestComplete,
        }
    }

    pub fn parse(content: &[u8]) -> Result<Self, FpmError> {
        if content.len() < 8 {
            return Err(FpmError::MalformedRecord(format!(
                "FCGI_END_REQUEST body is {} bytes, expected 8",
                content.len()
            )));
        }

        Ok(Self {
            app_status: u32::from_be_bytes([
                content[0], content[1], content[2], content[3],
            ]),
            protocol_status: ProtocolStatus::from(content[4]),
        })
    }

    pub fn encode(&self) -> [u8; 8] {
        let [a, b, c, d] = self.app_status.to_be_bytes();
        let status = match self.protocol_status {
            ProtocolStatus::RequestComplete => 0,
            ProtocolStatus::CantMpxConn => 1,
            ProtocolStatus::Overloaded => 2,
            ProtocolStatus::UnknownRole => 3,
            ProtocolStatus::Other(raw) => raw,
        };
        [a, b, c, d, status, 0, 0, 0]
    }
}

/// Reads as many bytes as are available up to `buf.len()`.
///
/// Returns fewer than `buf.len()` only at end-of-stream.
fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}

/// Lazy decoder over a FastCGI byte stream.
///
/// Yields records until a clean end-of-stream or until an `FCGI_END_REQUEST`
/// record has been yielded. After an error the reader is exhausted.
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    finished: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn next_record(&mut self) -> Result<Option<Record>, FpmError> {
        if self.finished {
            return Ok(None);
        }

        let result = self.read_record();

        match result {
            Ok(Some(ref record))
                if record.record_type != RecordType::EndRequest => {}
            _ => self.finished = true,
        }

        result
    }

    fn read_record(&mut self) -> Result<Option<Record>, FpmError> {
        let mut header_buf = [0u8; FCGI_HEADER_LEN];
        let got = read_full(&mut self.inner, &mut header_buf)
            .map_err(FpmError::TransportRead)?;

        if got == 0 {
            return Ok(None);
        }

        if got < FCGI_HEADER_LEN {
            return Err(FpmError::ProtocolTruncated {
                expected: FCGI_HEADER_LEN,
                got,
            });
        }

        let header = RecordHeader::parse(&header_buf);

        if header.version != FCGI_VERSION {
            return Err(FpmError::MalformedRecord(format!(
                "unsupported FastCGI version {}",
                header.version
            )));
        }

        let content_len = header.content_length as usize;
        let mut content = vec![0u8; content_len];
        let got = read_full(&mut self.inner, &mut content)
            .map_err(FpmError::TransportRead)?;

        if got < content_len {
            return Err(FpmError::ProtocolTruncated {
                expected: content_len,
                got,
            });
        }

        let padding_len = header.padding_length as usize;
        if padding_len > 0 {
            let mut padding = [0u8; 255];
            let got = read_full(&mut self.inner, &mut padding[..padding_len])
                .map_err(FpmError::TransportRead)?;

            if got < padding_len {
                return Err(FpmError::ProtocolTruncated {
                    expected: padding_len,
                    got,
                });
            }
        }

        #[cfg(feature = "tracing")]
        trace!(
            record_type = %header.record_type,
            request_id = header.request_id,
            content_len,
            padding_len,
            "Read FastCGI record"
        );

        Ok(Some(Record {
            record_type: header.record_type,
            request_id: header.request_id,
            content,
        }))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, FpmError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream_of(records: &[Record]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|r| r.encode().unwrap())
            .collect()
    }

    #[test]
    fn test_encode_is_aligned() {
        for len in (0..=64).chain([1000, 65534, 65535]) {
            let payload = vec![0xAB; len];
            let frame = encode_record(RecordType::Stdin, 1, &payload).unwrap();

            assert_eq!(frame.len() % 8, 0, "len {}", len);
            assert_eq!(frame[6] as usize, (8 - len % 8) % 8);
            assert!(frame[FCGI_HEADER_LEN + len..]
                .iter()
                .all(|&b| b == 0));
        }
    }

    #[test]
    fn test_encode_header_layout() {
        let frame =
            encode_record(RecordType::Params, 0x0102, b"hello").unwrap();

        assert_eq!(&frame[..8], &[1, 4, 0x01, 0x02, 0, 5, 3, 0]);
        assert_eq!(&frame[8..13], b"hello");
        assert_eq!(frame.len(), 16);
    }

    #[test]
    fn test_header_roundtrip() {
        for (ty, id, len) in [
            (RecordType::BeginRequest, 1u16, 8usize),
            (RecordType::Stdout, 0xFFFF, 0),
            (RecordType::Stdin, 7, 65535),
            (RecordType::Other(200), 300, 13),
        ] {
            let payload = vec![1u8; len];
            let frame = encode_record(ty, id, &payload).unwrap();
            let header = decode_record_header(&frame).unwrap();

            assert_eq!(
                (header.record_type, header.request_id, header.content_length),
                (ty, id, len as u16)
            );
        }
    }

    #[test]
    fn test_decode_header_too_short() {
        assert!(decode_record_header(&[1, 6, 0, 1]).is_none());
    }

    #[test]
    fn test_encode_too_large() {
        let payload = vec![0u8; FCGI_MAX_CONTENT_LEN + 1];
        let err = encode_record(RecordType::Stdin, 1, &payload).unwrap_err();

        assert!(matches!(err, FpmError::ProtocolEncoding(65536)));
    }

    #[test]
    fn test_write_record_matches_encode() {
        let mut out = Vec::new();
        write_record(&mut out, RecordType::Stdout, 3, b"abc").unwrap();

        assert_eq!(out, encode_record(RecordType::Stdout, 3, b"abc").unwrap());
    }

    #[test]
    fn test_write_stream_chunks() {
        let payload = vec![7u8; 70_000];
        let mut out = Vec::new();
        write_stream(&mut out, RecordType::Stdin, 1, &payload).unwrap();

        let records: Vec<Record> = RecordReader::new(Cursor::new(out))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content.len(), 65535);
        assert_eq!(records[1].content.len(), 70_000 - 65535);
    }

    #[test]
    fn test_write_stream_empty_writes_nothing() {
        let mut out = Vec::new();
        write_stream(&mut out, RecordType::Stdin, 1, &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_begin_request_body() {
        assert_eq!(begin_request_body(1, 0), [0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(begin_request_body(3, 1), [0, 3, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_reader_stops_after_end_request() {
        let mut bytes = stream_of(&[
            Record::new(RecordType::Stdout, 1, b"Status: 200\r\n\r\n".to_vec()),
            Record::new(RecordType::Stderr, 1, b"oops".to_vec()),
            Record::new(
                RecordType::EndRequest,
                1,
                EndRequest::complete(0).encode().to_vec(),
            ),
        ]);
        bytes.extend_from_slice(b"garbage that is never read");

        let mut reader = RecordReader::new(Cursor::new(bytes));
        let types: Vec<RecordType> = reader
            .by_ref()
            .map(|r| r.unwrap().record_type)
            .collect();

        assert_eq!(
            types,
            vec![RecordType::Stdout, RecordType::Stderr, RecordType::EndRequest]
        );
        assert!(reader.is_finished());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_reader_clean_eof() {
        let bytes = stream_of(&[Record::new(RecordType::Stdout, 1, b"x".to_vec())]);
        let mut reader = RecordReader::new(Cursor::new(bytes));

        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_reader_truncated_header() {
        let mut reader = RecordReader::new(Cursor::new(vec![1u8, 6, 0]));
        let err = reader.next_record().unwrap_err();

        assert!(matches!(
            err,
            FpmError::ProtocolTruncated {
                expected: 8,
                got: 3
            }
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_reader_truncated_content() {
        let mut bytes = encode_record(RecordType::Stdout, 1, b"hello!").unwrap();
        bytes.truncate(FCGI_HEADER_LEN + 2);

        let err = RecordReader::new(Cursor::new(bytes))
            .next_record()
            .unwrap_err();

        assert!(matches!(
            err,
            FpmError::ProtocolTruncated {
                expected: 6,
                got: 2
            }
        ));
    }

    #[test]
    fn test_reader_truncated_padding() {
        let mut bytes = encode_record(RecordType::Stdout, 1, b"hello").unwrap();
        bytes.pop();

        let err = RecordReader::new(Cursor::new(bytes))
            .next_record()
            .unwrap_err();

        assert!(matches!(err, FpmError::ProtocolTruncated { .. }));
    }

    #[test]
    fn test_reader_rejects_unknown_version() {
        let mut bytes = encode_record(RecordType::Stdout, 1, b"x").unwrap();
        bytes[0] = 2;

        let err = RecordReader::new(Cursor::new(bytes))
            .next_record()
            .unwrap_err();

        assert!(matches!(err, FpmError::MalformedRecord(_)));
    }

    #[test]
    fn test_end_request_parse() {
        let body = EndRequest {
            app_status: 255,
            protocol_status: ProtocolStatus::Overloaded,
        }
        .encode();

        let parsed = EndRequest::parse(&body).unwrap();
        assert_eq!(parsed.app_status, 255);
        assert_eq!(parsed.protocol_status, ProtocolStatus::Overloaded);

        assert!(EndRequest::parse(&body[..4]).is_err());
    }
}
