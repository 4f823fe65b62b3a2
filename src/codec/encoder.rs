//! Frame emission
//!
//! Requests register their correlation record immediately before being
//! serialized to the outbound buffer, so the map holds an entry exactly
//! while a forwarded request awaits its response. Opaque frames re-emit
//! the retained bytes verbatim; decoded frames are serialized through the
//! schema library at their recorded header and api versions.

use bytes::BytesMut;
use kafka_protocol::messages::ApiKey;

use crate::codec::correlation::{Correlation, CorrelationMap};
use crate::codec::frame::{RequestFrame, ResponseFrame};
use crate::error::Result;

/// Serialize a request frame to `dst`, registering its correlation record.
pub fn encode_request(
    frame: &RequestFrame,
    dst: &mut BytesMut,
    correlation: &mut CorrelationMap,
) -> Result<()> {
    match frame {
        RequestFrame::Opaque(f) => {
            // Unknown api keys decode nothing, so the header version they
            // record is never consulted.
            let response_header_version = ApiKey::try_from(f.api_key)
                .map(|key| key.response_header_version(f.api_version))
                .unwrap_or(0);
            correlation.register(
                f.correlation_id,
                Correlation {
                    api_key: f.api_key,
                    api_version: f.api_version,
                    response_header_version,
                    decode_response: f.decode_response,
                },
            )?;
            f.encode(dst);
            Ok(())
        }
        RequestFrame::Decoded(f) => {
            correlation.register(
                f.correlation_id(),
                Correlation {
                    api_key: f.api_key as i16,
                    api_version: f.api_version,
                    response_header_version: f.api_key.response_header_version(f.api_version),
                    decode_response: f.decode_response,
                },
            )?;
            f.encode(dst)
        }
    }
}

/// Serialize a response frame to `dst`.
pub fn encode_response(frame: &ResponseFrame, dst: &mut BytesMut) -> Result<()> {
    match frame {
        ResponseFrame::Opaque(f) => {
            f.encode(dst);
            Ok(())
        }
        ResponseFrame::Decoded(f) => f.encode(dst),
    }
}
