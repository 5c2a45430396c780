//! # Memcached Text Protocol
//!
//! Commands are CRLF-terminated ASCII lines; only `set` carries a length (the
//! value's byte count). Responses have no length prefix: bytes are appended to
//! a buffer until it holds a complete response. Value blocks are skipped by
//! their declared length, and the first line outside them classifies the
//! outcome.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::memcached::error::{ClientError, ClientResult};

pub const EOL: &[u8] = b"\r\n";

const RESPONSE_STORED: &[u8] = b"STORED\r\n";
const RESPONSE_END: &[u8] = b"END\r\n";
const RESPONSE_NOT_FOUND: &[u8] = b"NOT_FOUND\r\n";
const RESPONSE_DELETED: &[u8] = b"DELETED\r\n";
const RESPONSE_ERROR: &[u8] = b"ERROR";
const RESPONSE_CLIENT_ERROR: &[u8] = b"CLIENT_ERROR";
const RESPONSE_SERVER_ERROR: &[u8] = b"SERVER_ERROR";
const VALUE_PREFIX: &[u8] = b"VALUE ";

const TERMINATORS: [&[u8]; 4] = [
    RESPONSE_STORED,
    RESPONSE_END,
    RESPONSE_NOT_FOUND,
    RESPONSE_DELETED,
];

/// Opaque client flags sent with every `set`.
const FLAGS: u32 = 0;

/// Longest key the text protocol accepts.
pub const MAX_KEY_LENGTH: usize = 250;

const READ_CHUNK: usize = 1024;

// == Command ==
/// A single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Set {
        key: &'a str,
        value: &'a str,
        ttl_secs: u64,
    },
    Get {
        key: &'a str,
    },
    Delete {
        key: &'a str,
    },
}

impl Command<'_> {
    pub fn key(&self) -> &str {
        match *self {
            Command::Set { key, .. } | Command::Get { key } | Command::Delete { key } => key,
        }
    }

    /// Appends the wire form of the command to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match *self {
            Command::Set {
                key,
                value,
                ttl_secs,
            } => {
                let header = format!("set {} {} {} {}", key, FLAGS, ttl_secs, value.len());
                buf.reserve(header.len() + value.len() + 2 * EOL.len());
                buf.put_slice(header.as_bytes());
                buf.put_slice(EOL);
                buf.put_slice(value.as_bytes());
                buf.put_slice(EOL);
            }
            Command::Get { key } => {
                buf.put_slice(b"get ");
                buf.put_slice(key.as_bytes());
                buf.put_slice(EOL);
            }
            Command::Delete { key } => {
                buf.put_slice(b"delete ");
                buf.put_slice(key.as_bytes());
                buf.put_slice(EOL);
            }
        }
    }
}

/// Rejects keys that would break command framing.
pub fn validate_key(key: &str) -> ClientResult<()> {
    let framing_safe = key
        .bytes()
        .all(|b| !b.is_ascii_whitespace() && !b.is_ascii_control());
    if key.is_empty() || key.len() > MAX_KEY_LENGTH || !framing_safe {
        return Err(ClientError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// == Response Classification ==
/// Outcome class of a complete response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One of the success terminators was seen
    Complete,
    /// `ERROR` or `CLIENT_ERROR` line
    ClientError(String),
    /// `SERVER_ERROR` line
    ServerError(String),
    /// Bytes that fit no response shape
    Malformed(String),
}

/// Classifies the buffered response, or returns `None` while incomplete.
///
/// The buffer is walked line by line from the start. A `VALUE` header is
/// followed by exactly its declared number of data bytes plus CRLF, and only
/// `END` may follow a value block; markers inside value data never count.
/// Every line is classified only once its CRLF has arrived so nothing of the
/// response is left on the wire.
pub fn scan(buf: &[u8]) -> Option<Frame> {
    let mut pos = 0;
    let mut after_value = false;

    loop {
        let rest = &buf[pos..];
        let line = &rest[..find(rest, EOL)?];

        if line.starts_with(VALUE_PREFIX) {
            let Some(len) = value_length(line) else {
                return Some(Frame::Malformed(lossy(line)));
            };
            let data_start = pos + line.len() + EOL.len();
            let Some(block_end) = data_start
                .checked_add(len)
                .and_then(|end| end.checked_add(EOL.len()))
            else {
                return Some(Frame::Malformed(lossy(line)));
            };
            if buf.len() < block_end {
                return None;
            }
            if &buf[block_end - EOL.len()..block_end] != EOL {
                return Some(Frame::Malformed(format!("value block of {} overran", lossy(line))));
            }
            pos = block_end;
            after_value = true;
            continue;
        }

        let full_line = &rest[..line.len() + EOL.len()];
        if after_value {
            return Some(if full_line == RESPONSE_END {
                Frame::Complete
            } else {
                Frame::Malformed(lossy(line))
            });
        }

        // SERVER_ERROR and CLIENT_ERROR both contain ERROR; test the specific
        // ones first.
        return Some(if line.starts_with(RESPONSE_SERVER_ERROR) {
            Frame::ServerError(lossy(line))
        } else if line.starts_with(RESPONSE_CLIENT_ERROR) || line.starts_with(RESPONSE_ERROR) {
            Frame::ClientError(lossy(line))
        } else if TERMINATORS.contains(&full_line) {
            Frame::Complete
        } else {
            Frame::Malformed(lossy(line))
        });
    }
}

/// Declared data length of a `VALUE <key> <flags> <bytes>` header line.
fn value_length(header: &[u8]) -> Option<usize> {
    std::str::from_utf8(header)
        .ok()?
        .split_ascii_whitespace()
        .nth(3)?
        .parse()
        .ok()
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// == I/O ==
/// Reads into `buf` until it holds a complete response.
///
/// Error lines become `ClientError::Client`/`ClientError::Server`, bytes
/// that fit no response shape `ClientError::Protocol`, and a stream that ends
/// first `ClientError::UnexpectedEof`.
pub async fn read_response<R>(reader: &mut R, buf: &mut BytesMut) -> ClientResult<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        match scan(&buf[..]) {
            Some(Frame::Complete) => return Ok(()),
            Some(Frame::ClientError(line)) => return Err(ClientError::Client(line)),
            Some(Frame::ServerError(line)) => return Err(ClientError::Server(line)),
            Some(Frame::Malformed(line)) => return Err(ClientError::Protocol(line)),
            None => {}
        }

        buf.reserve(READ_CHUNK);
        let read = reader.read_buf(buf).await.map_err(ClientError::ConnRead)?;
        if read == 0 {
            return Err(ClientError::UnexpectedEof);
        }
    }
}

/// Writes `command` and reads its response into `buf`.
pub async fn exchange<S>(stream: &mut S, command: &Command<'_>, buf: &mut BytesMut) -> ClientResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    buf.clear();
    command.encode(buf);
    stream
        .write_all(&buf[..])
        .await
        .map_err(ClientError::ConnWrite)?;
    stream.flush().await.map_err(ClientError::ConnWrite)?;

    buf.clear();
    read_response(stream, buf).await
}

/// Extracts the value of a `get` response already framed by [`scan`].
///
/// Expects `VALUE <key> <flags> <bytes>\r\n<data>\r\nEND\r\n`; a bare
/// `END\r\n` is a miss and yields `None`.
pub fn parse_value(response: &[u8]) -> ClientResult<Option<String>> {
    let Some(header_end) = find(response, EOL) else {
        return Ok(None);
    };
    let header = &response[..header_end];
    if !header.starts_with(VALUE_PREFIX) {
        return Ok(None);
    }

    let len = value_length(header)
        .ok_or_else(|| ClientError::InvalidValue(format!("malformed header {:?}", lossy(header))))?;

    let start = header_end + EOL.len();
    let data = start
        .checked_add(len)
        .and_then(|end| response.get(start..end))
        .ok_or_else(|| ClientError::InvalidValue("truncated value".to_string()))?;

    String::from_utf8(data.to_vec())
        .map(Some)
        .map_err(|_| ClientError::InvalidValue("value is not valid UTF-8".to_string()))
}
