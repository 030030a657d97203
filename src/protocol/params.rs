use crate::FpmError;

/// Largest name or value length representable in the 4-byte form.
pub const MAX_PARAM_LENGTH: usize = 0x7FFF_FFFF;

/// Appends a FastCGI name-value length prefix.
///
/// Lengths below 128 take one byte; anything larger takes four bytes,
/// big-endian, with the high bit of the first byte set.
pub fn encode_length(len: usize, buf: &mut Vec<u8>) -> Result<(), FpmError> {
    if len < 128 {
        buf.push(len as u8);
    } else if len <= MAX_PARAM_LENGTH {
        buf.extend_from_slice(&((len as u32) | 0x8000_0000).to_be_bytes());
    } else {
        return Err(FpmError::ProtocolEncoding(len));
    }
    Ok(())
}

/// Decodes a length prefix, returning the length and the bytes consumed.
pub fn decode_length(bytes: &[u8]) -> Option<(usize, usize)> {
    let first = *bytes.first()?;

    if first & 0x80 == 0 {
        return Some((first as usize, 1));
    }

    let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    let len = u32::from_be_bytes(raw) & 0x7FFF_FFFF;

    Some((len as usize, 4))
}

/// Encodes name-value pairs into an `FCGI_PARAMS` payload.
///
/// Pairs are emitted in iteration order; pairs without a value are skipped.
/// The result may exceed a single record and is meant to be written with
/// [`write_stream`](super::write_stream).
pub fn encode_params<'a, I, V>(params: I) -> Result<Vec<u8>, FpmError>
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: Into<Option<&'a str>>,
{
    let mut buf = Vec::new();

    for (name, value) in params {
        let Some(value) = value.into() else {
            continue;
        };

        encode_length(name.len(), &mut buf)?;
        encode_length(value.len(), &mut buf)?;
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(value.as_bytes());
    }

    Ok(buf)
}

/// Decodes an `FCGI_PARAMS` payload back into name-value pairs.
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn decode_params(
    mut bytes: &[u8],
) -> Result<Vec<(String, String)>, FpmError> {
    let mut pairs = Vec::new();

    while !bytes.is_empty() {
        let (name_len, used) = decode_length(bytes)
            .ok_or_else(|| truncated("name length"))?;
        bytes = &bytes[used..];

        let (value_len, used) = decode_length(bytes)
            .ok_or_else(|| truncated("value length"))?;
        bytes = &bytes[used..];

        if bytes.len() < name_len + value_len {
            return Err(truncated("name-value data"));
        }

        let (name, rest) = bytes.split_at(name_len);
        let (value, rest) = rest.split_at(value_len);
        bytes = rest;

        pairs.push((
            String::from_utf8_lossy(name).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        ));
    }

    Ok(pairs)
}

fn truncated(what: &str) -> FpmError {
    FpmError::MalformedRecord(format!("FCGI_PARAMS truncated in {}", what))
}
