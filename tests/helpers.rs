// Shared test helpers for the integration suites
//
// Builds Kafka wire frames at the byte level so tests can play both the
// client and the broker against a running proxy, and parse whatever comes
// back out.

#![allow(dead_code)]

use bytes::{BufMut, Bytes, BytesMut};
use kafka_protocol::messages::api_versions_response::ApiVersion;
use kafka_protocol::messages::metadata_response::MetadataResponseBroker;
use kafka_protocol::messages::{
    ApiKey, ApiVersionsRequest, ApiVersionsResponse, BrokerId, MetadataResponse, RequestHeader,
    ResponseHeader,
};
use kafka_protocol::protocol::{Decodable, Encodable, StrBytes};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Wrap `payload` in a 4-byte length prefix.
pub fn frame(payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_i32(payload.len() as i32);
    buf.extend_from_slice(payload);
    buf
}

/// Build a request frame with a header-v1 layout and an arbitrary body.
///
/// The body bytes need not satisfy any schema; the proxy only sniffs the
/// header for frames it does not decode. Only valid for api versions
/// whose request header is v1 (non-flexible with a nullable client id).
pub fn raw_request_frame(
    api_key: i16,
    api_version: i16,
    correlation_id: i32,
    client_id: Option<&str>,
    body: &[u8],
) -> BytesMut {
    let mut payload = BytesMut::new();
    payload.put_i16(api_key);
    payload.put_i16(api_version);
    payload.put_i32(correlation_id);
    match client_id {
        Some(id) => {
            payload.put_i16(id.len() as i16);
            payload.extend_from_slice(id.as_bytes());
        }
        None => payload.put_i16(-1),
    }
    payload.extend_from_slice(body);
    frame(&payload)
}

/// Build a response frame with a header-v0 layout and an arbitrary body.
pub fn raw_response_frame(correlation_id: i32, body: &[u8]) -> BytesMut {
    let mut payload = BytesMut::new();
    payload.put_i32(correlation_id);
    payload.extend_from_slice(body);
    frame(&payload)
}

/// A schema-valid API_VERSIONS request frame.
pub fn api_versions_request_frame(correlation_id: i32, version: i16) -> BytesMut {
    let mut header = RequestHeader::default();
    header.request_api_key = ApiKey::ApiVersionsKey as i16;
    header.request_api_version = version;
    header.correlation_id = correlation_id;
    header.client_id = Some(StrBytes::from_static_str("relay-test"));

    let mut payload = BytesMut::new();
    header
        .encode(
            &mut payload,
            ApiKey::ApiVersionsKey.request_header_version(version),
        )
        .expect("encode request header");
    ApiVersionsRequest::default()
        .encode(&mut payload, version)
        .expect("encode api versions request");
    frame(&payload)
}

/// A schema-valid API_VERSIONS response advertising the given
/// (api_key, min, max) ranges.
pub fn api_versions_response_frame(
    correlation_id: i32,
    version: i16,
    ranges: &[(i16, i16, i16)],
) -> BytesMut {
    let mut header = ResponseHeader::default();
    header.correlation_id = correlation_id;

    let mut body = ApiVersionsResponse::default();
    for (api_key, min, max) in ranges {
        let mut entry = ApiVersion::default();
        entry.api_key = *api_key;
        entry.min_version = *min;
        entry.max_version = *max;
        body.api_keys.push(entry);
    }

    let mut payload = BytesMut::new();
    header
        .encode(
            &mut payload,
            ApiKey::ApiVersionsKey.response_header_version(version),
        )
        .expect("encode response header");
    body.encode(&mut payload, version)
        .expect("encode api versions response");
    frame(&payload)
}

/// A schema-valid METADATA response advertising the given
/// (node_id, host, port) brokers.
pub fn metadata_response_frame(
    correlation_id: i32,
    version: i16,
    brokers: &[(i32, &str, i32)],
) -> BytesMut {
    let mut header = ResponseHeader::default();
    header.correlation_id = correlation_id;

    let mut body = MetadataResponse::default();
    for (node_id, host, port) in brokers {
        let mut broker = MetadataResponseBroker::default();
        broker.node_id = BrokerId(*node_id);
        broker.host = StrBytes::from_string(host.to_string());
        broker.port = *port;
        body.brokers.push(broker);
    }

    let mut payload = BytesMut::new();
    header
        .encode(
            &mut payload,
            ApiKey::MetadataKey.response_header_version(version),
        )
        .expect("encode response header");
    body.encode(&mut payload, version)
        .expect("encode metadata response");
    frame(&payload)
}

/// Read one length-prefixed frame off a socket, returning the payload
/// without the prefix.
pub async fn read_wire_frame(stream: &mut TcpStream) -> std::io::Result<BytesMut> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = i32::from_be_bytes(len_buf) as usize;
    let mut payload = BytesMut::new();
    payload.resize(len, 0);
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write a pre-framed message to a socket.
pub async fn write_wire_frame(stream: &mut TcpStream, frame: &[u8]) -> std::io::Result<()> {
    stream.write_all(frame).await?;
    stream.flush().await
}

/// Correlation id of a request payload (fixed offset in every request
/// header version).
pub fn request_correlation_id(payload: &[u8]) -> i32 {
    i32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]])
}

/// Correlation id of a response payload.
pub fn response_correlation_id(payload: &[u8]) -> i32 {
    i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
}

/// Decode an API_VERSIONS response payload (header plus body).
pub fn parse_api_versions_response(payload: BytesMut, version: i16) -> (i32, ApiVersionsResponse) {
    let mut bytes: Bytes = payload.freeze();
    let header = ResponseHeader::decode(
        &mut bytes,
        ApiKey::ApiVersionsKey.response_header_version(version),
    )
    .expect("decode response header");
    let body = ApiVersionsResponse::decode(&mut bytes, version).expect("decode api versions body");
    (header.correlation_id, body)
}

/// Decode a METADATA response payload (header plus body).
pub fn parse_metadata_response(payload: BytesMut, version: i16) -> (i32, MetadataResponse) {
    let mut bytes: Bytes = payload.freeze();
    let header = ResponseHeader::decode(
        &mut bytes,
        ApiKey::MetadataKey.response_header_version(version),
    )
    .expect("decode response header");
    let body = MetadataResponse::decode(&mut bytes, version).expect("decode metadata body");
    (header.correlation_id, body)
}
