//! Frame types
//!
//! The universal unit on the wire. A frame is either *opaque* (the raw
//! header+body bytes, retained zero-copy for verbatim re-emission) or
//! *decoded* (typed header and body from the schema library). Every frame
//! knows its correlation id and its exact encoded size.

use bytes::{BufMut, Bytes, BytesMut};
use kafka_protocol::messages::{ApiKey, RequestHeader, RequestKind, ResponseHeader, ResponseKind};
use kafka_protocol::protocol::Encodable;

use crate::error::{RelayError, Result};

/// A frame forwarded without parsing its body.
///
/// `payload` holds the header+body bytes exactly as read off the wire,
/// excluding the 4-byte length prefix, and aliases the input buffer.
/// `decode_response` is only meaningful on the request path, where it
/// records whether the matching response should be structurally decoded.
#[derive(Debug, Clone)]
pub struct OpaqueFrame {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub decode_response: bool,
    pub payload: Bytes,
}

impl OpaqueFrame {
    /// Exact size of the encoded frame, length prefix included.
    pub fn encoded_size(&self) -> usize {
        4 + self.payload.len()
    }

    /// Emit the length prefix followed by the retained bytes verbatim.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_size());
        dst.put_i32(self.payload.len() as i32);
        dst.extend_from_slice(&self.payload);
    }
}

/// A request whose header and body were decoded through the schema library.
#[derive(Debug)]
pub struct DecodedRequestFrame {
    pub api_key: ApiKey,
    pub api_version: i16,
    pub header: RequestHeader,
    pub body: RequestKind,
    /// Whether the matching response should be structurally decoded
    pub decode_response: bool,
}

impl DecodedRequestFrame {
    pub fn correlation_id(&self) -> i32 {
        self.header.correlation_id
    }

    /// Request-header version for (api_key, api_version), per the schema
    /// library's table.
    pub fn header_version(&self) -> i16 {
        self.api_key.request_header_version(self.api_version)
    }

    /// Write length prefix, header and body.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_sized(dst, |dst| {
            self.header
                .encode(dst, self.header_version())
                .map_err(RelayError::codec)?;
            self.body
                .encode(dst, self.api_version)
                .map_err(RelayError::codec)
        })
    }

    /// Exact size of the encoded frame, length prefix included.
    pub fn encoded_size(&self) -> Result<usize> {
        let mut scratch = BytesMut::new();
        self.encode(&mut scratch)?;
        Ok(scratch.len())
    }
}

/// A response whose header and body were decoded through the schema library.
#[derive(Debug)]
pub struct DecodedResponseFrame {
    pub api_key: ApiKey,
    pub api_version: i16,
    pub header: ResponseHeader,
    pub body: ResponseKind,
}

impl DecodedResponseFrame {
    pub fn correlation_id(&self) -> i32 {
        self.header.correlation_id
    }

    /// Response-header version for (api_key, api_version). The schema
    /// library's table covers the API_VERSIONS quirk: those responses use
    /// header version 0 at every api version.
    pub fn header_version(&self) -> i16 {
        self.api_key.response_header_version(self.api_version)
    }

    /// Write length prefix, header and body.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_sized(dst, |dst| {
            self.header
                .encode(dst, self.header_version())
                .map_err(RelayError::codec)?;
            self.body
                .encode(dst, self.api_version)
                .map_err(RelayError::codec)
        })
    }

    /// Exact size of the encoded frame, length prefix included.
    pub fn encoded_size(&self) -> Result<usize> {
        let mut scratch = BytesMut::new();
        self.encode(&mut scratch)?;
        Ok(scratch.len())
    }
}

/// A frame travelling from client to broker.
#[derive(Debug)]
pub enum RequestFrame {
    Opaque(OpaqueFrame),
    Decoded(DecodedRequestFrame),
}

impl RequestFrame {
    pub fn correlation_id(&self) -> i32 {
        match self {
            RequestFrame::Opaque(f) => f.correlation_id,
            RequestFrame::Decoded(f) => f.correlation_id(),
        }
    }

    pub fn api_key_raw(&self) -> i16 {
        match self {
            RequestFrame::Opaque(f) => f.api_key,
            RequestFrame::Decoded(f) => f.api_key as i16,
        }
    }

    pub fn api_version(&self) -> i16 {
        match self {
            RequestFrame::Opaque(f) => f.api_version,
            RequestFrame::Decoded(f) => f.api_version,
        }
    }

    pub fn decode_response(&self) -> bool {
        match self {
            RequestFrame::Opaque(f) => f.decode_response,
            RequestFrame::Decoded(f) => f.decode_response,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, RequestFrame::Opaque(_))
    }

    pub fn encoded_size(&self) -> Result<usize> {
        match self {
            RequestFrame::Opaque(f) => Ok(f.encoded_size()),
            RequestFrame::Decoded(f) => f.encoded_size(),
        }
    }
}

/// A frame travelling from broker to client.
#[derive(Debug)]
pub enum ResponseFrame {
    Opaque(OpaqueFrame),
    Decoded(DecodedResponseFrame),
}

impl ResponseFrame {
    pub fn correlation_id(&self) -> i32 {
        match self {
            ResponseFrame::Opaque(f) => f.correlation_id,
            ResponseFrame::Decoded(f) => f.correlation_id(),
        }
    }

    pub fn api_key_raw(&self) -> i16 {
        match self {
            ResponseFrame::Opaque(f) => f.api_key,
            ResponseFrame::Decoded(f) => f.api_key as i16,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, ResponseFrame::Opaque(_))
    }

    pub fn encoded_size(&self) -> Result<usize> {
        match self {
            ResponseFrame::Opaque(f) => Ok(f.encoded_size()),
            ResponseFrame::Decoded(f) => f.encoded_size(),
        }
    }
}

/// Write a 4-byte length placeholder, run `write`, then backfill the
/// placeholder with the measured size. The output buffer may grow while
/// `write` runs; growth preserves everything already written, so the
/// prefix position stays valid.
fn encode_sized(dst: &mut BytesMut, write: impl FnOnce(&mut BytesMut) -> Result<()>) -> Result<()> {
    let start = dst.len();
    dst.put_i32(0);
    write(dst)?;
    let size = (dst.len() - start - 4) as i32;
    dst[start..start + 4].copy_from_slice(&size.to_be_bytes());
    Ok(())
}
