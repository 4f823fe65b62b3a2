//! Kafka wire-protocol frame codec
//!
//! Handles the binary framing layer of the proxy:
//! [4 bytes: size (big-endian i32)] [header] [body]
//!
//! The schema library (`kafka-protocol`) supplies the per-API message
//! schemas and the header-version table; this module owns everything
//! around them: length-prefixed framing, api-key sniffing, the
//! decode-or-passthrough decision, correlation tracking, and emission.
//!
//! Module organization:
//! - `cursor`: positioned byte reader/writer and varint codec
//! - `frame`: opaque and decoded frame types
//! - `correlation`: in-flight request map
//! - `decoder`: incremental request/response frame decoding
//! - `encoder`: frame serialization and correlation registration

mod correlation;
mod cursor;
mod decoder;
mod encoder;
mod frame;

pub use correlation::{Correlation, CorrelationMap};
pub use cursor::{ByteReader, ByteWriter};
pub use decoder::{RequestDecoder, ResponseDecoder};
pub use encoder::{encode_request, encode_response};
pub use frame::{
    DecodedRequestFrame, DecodedResponseFrame, OpaqueFrame, RequestFrame, ResponseFrame,
};
