//! In-flight request tracking
//!
//! Kafka responses do not carry their API key on the wire, so the proxy
//! remembers, per forwarded request, everything needed to decode the
//! matching response. The map is owned by a single connection pair's task
//! and therefore needs no synchronization.

use std::collections::HashMap;

use crate::error::{RelayError, Result};

/// Metadata retained for one outstanding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    /// Raw API key as sent by the client
    pub api_key: i16,
    /// API version of the request
    pub api_version: i16,
    /// Header version the matching response will use
    pub response_header_version: i16,
    /// Whether the matching response should be structurally decoded
    pub decode_response: bool,
}

/// Map from correlation id to in-flight request metadata.
///
/// An entry exists iff a request with that id has been forwarded upstream
/// and its response has not yet arrived.
#[derive(Debug, Default)]
pub struct CorrelationMap {
    inflight: HashMap<i32, Correlation>,
}

impl CorrelationMap {
    pub fn new() -> Self {
        CorrelationMap {
            inflight: HashMap::new(),
        }
    }

    /// Record a request immediately before it is serialized upstream.
    ///
    /// Reusing an id that is still in flight is a protocol violation and
    /// fatal for the connection pair.
    pub fn register(&mut self, correlation_id: i32, record: Correlation) -> Result<()> {
        if self.inflight.contains_key(&correlation_id) {
            return Err(RelayError::DuplicateCorrelation(correlation_id));
        }
        self.inflight.insert(correlation_id, record);
        Ok(())
    }

    /// Remove and return the record for a response's correlation id.
    pub fn consume(&mut self, correlation_id: i32) -> Option<Correlation> {
        self.inflight.remove(&correlation_id)
    }

    /// Number of requests awaiting a response.
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}
