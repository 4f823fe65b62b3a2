//! Incremental frame decoding
//!
//! Both decoders consume a buffer of accumulated inbound bytes and yield
//! zero or more frames per call, suspending (`Ok(None)`) until a complete
//! length-prefixed frame is buffered. The frame window is split off the
//! input zero-copy; header fields are sniffed through [`ByteReader`]
//! without consuming the window, so an opaque frame re-emits exactly the
//! bytes that arrived.
//!
//! Requests carry their API key and version in the header. Responses do
//! not: the response decoder consumes the correlation record registered
//! when the request was forwarded and decodes (or passes through) based on
//! what that request promised.

use bytes::{Buf, Bytes, BytesMut};
use kafka_protocol::messages::{ApiKey, RequestHeader, RequestKind, ResponseHeader, ResponseKind};
use kafka_protocol::protocol::Decodable;
use std::sync::Arc;

use crate::codec::correlation::CorrelationMap;
use crate::codec::cursor::ByteReader;
use crate::codec::frame::{
    DecodedRequestFrame, DecodedResponseFrame, OpaqueFrame, RequestFrame, ResponseFrame,
};
use crate::error::{RelayError, Result};
use crate::intercept::InterceptorRegistry;

/// Split one complete frame window off `src`, or return `None` to suspend.
///
/// The returned bytes are the header+body without the length prefix and
/// alias the input buffer.
fn take_frame(src: &mut BytesMut, max_frame_bytes: usize) -> Result<Option<Bytes>> {
    if src.len() < 4 {
        return Ok(None);
    }
    let length = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
    if length < 0 {
        return Err(RelayError::InvalidFrameLength(length));
    }
    let length = length as usize;
    if length > max_frame_bytes {
        return Err(RelayError::FrameTooLarge {
            length,
            max: max_frame_bytes,
        });
    }
    if src.len() < 4 + length {
        // partial frame; make room for the rest before suspending
        src.reserve(4 + length - src.len());
        return Ok(None);
    }
    let mut frame = src.split_to(4 + length);
    frame.advance(4);
    Ok(Some(frame.freeze()))
}

/// Decoder for the client-to-broker direction.
pub struct RequestDecoder {
    registry: Arc<InterceptorRegistry>,
    max_frame_bytes: usize,
}

impl RequestDecoder {
    pub fn new(registry: Arc<InterceptorRegistry>, max_frame_bytes: usize) -> Self {
        RequestDecoder {
            registry,
            max_frame_bytes,
        }
    }

    /// Decode the next request frame out of `src`, if one is complete.
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<RequestFrame>> {
        let payload = match take_frame(src, self.max_frame_bytes)? {
            Some(payload) => payload,
            None => return Ok(None),
        };

        // Every request-header version starts with api key, api version
        // and correlation id at fixed offsets; sniff them and rewind by
        // leaving the window untouched.
        let mut sniff = ByteReader::new(&payload);
        let api_key_raw = sniff.read_i16()?;
        let api_version = sniff.read_i16()?;
        let correlation_id = sniff.read_i32()?;

        let api_key = match ApiKey::try_from(api_key_raw) {
            Ok(api_key) => api_key,
            // Unknown to the schema library: forward opaquely and never
            // attempt to decode the response.
            Err(_) => {
                return Ok(Some(RequestFrame::Opaque(OpaqueFrame {
                    api_key: api_key_raw,
                    api_version,
                    correlation_id,
                    decode_response: false,
                    payload,
                })))
            }
        };

        let decode_response = self.registry.should_decode_response(api_key, api_version);
        if !self.registry.should_decode_request(api_key, api_version) {
            return Ok(Some(RequestFrame::Opaque(OpaqueFrame {
                api_key: api_key_raw,
                api_version,
                correlation_id,
                decode_response,
                payload,
            })));
        }

        let mut bytes = payload;
        let header_version = api_key.request_header_version(api_version);
        let header =
            RequestHeader::decode(&mut bytes, header_version).map_err(RelayError::codec)?;
        let body = RequestKind::decode(api_key, &mut bytes, api_version).map_err(RelayError::codec)?;
        if bytes.has_remaining() {
            return Err(RelayError::TrailingBytes(bytes.remaining()));
        }

        Ok(Some(RequestFrame::Decoded(DecodedRequestFrame {
            api_key,
            api_version,
            header,
            body,
            decode_response,
        })))
    }
}

/// Decoder for the broker-to-client direction.
pub struct ResponseDecoder {
    max_frame_bytes: usize,
}

impl ResponseDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        ResponseDecoder { max_frame_bytes }
    }

    /// Decode the next response frame out of `src`, if one is complete.
    ///
    /// Consumes the correlation record for the response's id; a response
    /// with no in-flight request is a protocol violation.
    pub fn decode(
        &self,
        src: &mut BytesMut,
        correlation: &mut CorrelationMap,
    ) -> Result<Option<ResponseFrame>> {
        let payload = match take_frame(src, self.max_frame_bytes)? {
            Some(payload) => payload,
            None => return Ok(None),
        };

        let mut sniff = ByteReader::new(&payload);
        let correlation_id = sniff.read_i32()?;
        let record = correlation
            .consume(correlation_id)
            .ok_or(RelayError::UnknownCorrelation(correlation_id))?;

        if !record.decode_response {
            return Ok(Some(ResponseFrame::Opaque(OpaqueFrame {
                api_key: record.api_key,
                api_version: record.api_version,
                correlation_id,
                decode_response: false,
                payload,
            })));
        }

        // decode_response is only ever set for keys the schema library knows
        let api_key = ApiKey::try_from(record.api_key).map_err(|_| {
            RelayError::codec(anyhow::anyhow!(
                "api key {} has no schema but was registered for decode",
                record.api_key
            ))
        })?;

        let mut bytes = payload;
        let header = ResponseHeader::decode(&mut bytes, record.response_header_version)
            .map_err(RelayError::codec)?;
        let body = ResponseKind::decode(api_key, &mut bytes, record.api_version)
            .map_err(RelayError::codec)?;
        if bytes.has_remaining() {
            return Err(RelayError::TrailingBytes(bytes.remaining()));
        }

        Ok(Some(ResponseFrame::Decoded(DecodedResponseFrame {
            api_key,
            api_version: record.api_version,
            header,
            body,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_frame_waits_for_length_prefix() {
        let mut src = BytesMut::new();
        src.extend_from_slice(&[0x00, 0x00]);
        assert!(take_frame(&mut src, 1024).unwrap().is_none());
        assert_eq!(src.len(), 2);
    }

    #[test]
    fn test_take_frame_waits_for_body() {
        let mut src = BytesMut::new();
        src.extend_from_slice(&8i32.to_be_bytes());
        src.extend_from_slice(&[1, 2, 3]);
        assert!(take_frame(&mut src, 1024).unwrap().is_none());
        // nothing consumed while suspended
        assert_eq!(src.len(), 7);
    }

    #[test]
    fn test_take_frame_splits_exact_window() {
        let mut src = BytesMut::new();
        src.extend_from_slice(&3i32.to_be_bytes());
        src.extend_from_slice(&[0xaa, 0xbb, 0xcc]);
        src.extend_from_slice(&[0x00, 0x00]); // start of the next frame

        let payload = take_frame(&mut src, 1024).unwrap().unwrap();
        assert_eq!(&payload[..], &[0xaa, 0xbb, 0xcc]);
        assert_eq!(src.len(), 2);
    }

    #[test]
    fn test_take_frame_rejects_negative_length() {
        let mut src = BytesMut::new();
        src.extend_from_slice(&(-1i32).to_be_bytes());
        let err = take_frame(&mut src, 1024).unwrap_err();
        assert!(matches!(err, RelayError::InvalidFrameLength(-1)));
    }

    #[test]
    fn test_take_frame_enforces_maximum() {
        let mut src = BytesMut::new();
        src.extend_from_slice(&2048i32.to_be_bytes());
        let err = take_frame(&mut src, 1024).unwrap_err();
        assert!(matches!(
            err,
            RelayError::FrameTooLarge {
                length: 2048,
                max: 1024
            }
        ));
    }
}
