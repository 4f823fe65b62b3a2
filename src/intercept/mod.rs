//! Frame interceptors
//!
//! An interceptor is a value with four capabilities: two decode
//! predicates deciding which (api key, api version) pairs it needs in
//! structured form, and two optional handlers transforming decoded frames.
//! The registry composes an ordered list of them: a frame is decoded iff
//! *any* interceptor asks for it, and handlers run in registration order
//! on the connection pair's own task. Handlers must not block; a handler
//! error closes the pair.
//!
//! Module organization:
//! - `api_versions`: narrows advertised version ranges to what the proxy
//!   can parse
//! - `broker_address`: rewrites advertised broker addresses to proxy
//!   addresses

mod api_versions;
mod broker_address;

pub use api_versions::ApiVersionsIntersect;
pub use broker_address::{AddressMapping, BrokerAddressRewrite, PortShiftMapping};

use kafka_protocol::messages::ApiKey;
use std::sync::Arc;

use crate::codec::{DecodedRequestFrame, DecodedResponseFrame};
use crate::error::Result;

/// Context passed to interceptor handlers.
///
/// Carries the channel descriptor for logging. This is also the seam
/// where a synthetic-response emitter would be added.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    channel: String,
}

impl HandlerContext {
    pub fn new(channel: impl Into<String>) -> Self {
        HandlerContext {
            channel: channel.into(),
        }
    }

    /// Human-readable identifier of the connection pair, for logging.
    pub fn channel_descriptor(&self) -> &str {
        &self.channel
    }
}

/// A pluggable transformer observing or mutating decoded frames.
///
/// All methods have pass-through defaults, so an interceptor implements
/// only the capabilities it uses. Handlers may mutate the frame in place
/// or substitute a new one.
pub trait Interceptor: Send + Sync {
    /// Should requests with this api key and version be decoded?
    fn should_decode_request(&self, _api_key: ApiKey, _api_version: i16) -> bool {
        false
    }

    /// Should responses with this api key and version be decoded?
    fn should_decode_response(&self, _api_key: ApiKey, _api_version: i16) -> bool {
        false
    }

    /// Transform a decoded request before it is forwarded upstream.
    fn on_request(
        &self,
        frame: DecodedRequestFrame,
        _ctx: &HandlerContext,
    ) -> Result<DecodedRequestFrame> {
        Ok(frame)
    }

    /// Transform a decoded response before it is forwarded downstream.
    fn on_response(
        &self,
        frame: DecodedResponseFrame,
        _ctx: &HandlerContext,
    ) -> Result<DecodedResponseFrame> {
        Ok(frame)
    }
}

/// An ordered, immutable set of interceptors shared by all connection
/// pairs.
pub struct InterceptorRegistry {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorRegistry {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        InterceptorRegistry { interceptors }
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Decode a request iff any interceptor asks for it.
    pub fn should_decode_request(&self, api_key: ApiKey, api_version: i16) -> bool {
        self.interceptors
            .iter()
            .any(|i| i.should_decode_request(api_key, api_version))
    }

    /// Decode a response iff any interceptor asks for it.
    pub fn should_decode_response(&self, api_key: ApiKey, api_version: i16) -> bool {
        self.interceptors
            .iter()
            .any(|i| i.should_decode_response(api_key, api_version))
    }

    /// Run every request handler in registration order.
    pub fn apply_request(
        &self,
        mut frame: DecodedRequestFrame,
        ctx: &HandlerContext,
    ) -> Result<DecodedRequestFrame> {
        for interceptor in &self.interceptors {
            frame = interceptor.on_request(frame, ctx)?;
        }
        Ok(frame)
    }

    /// Run every response handler in registration order.
    pub fn apply_response(
        &self,
        mut frame: DecodedResponseFrame,
        ctx: &HandlerContext,
    ) -> Result<DecodedResponseFrame> {
        for interceptor in &self.interceptors {
            frame = interceptor.on_response(frame, ctx)?;
        }
        Ok(frame)
    }
}
