//! Advertised broker-address rewrite
//!
//! Kafka clients bootstrap through the proxy but then connect to whatever
//! addresses the broker advertises. This interceptor rewrites every
//! broker/coordinator entry in Metadata, DescribeCluster and
//! FindCoordinator responses through an injected mapping so clients keep
//! talking to the proxy.

use kafka_protocol::messages::{ApiKey, ResponseKind};
use kafka_protocol::protocol::StrBytes;
use std::sync::Arc;
use tracing::trace;

use crate::codec::DecodedResponseFrame;
use crate::error::Result;
use crate::intercept::{HandlerContext, Interceptor};

/// Maps an upstream broker address to the downstream address clients
/// should use. `None` leaves the entry untouched.
pub trait AddressMapping: Send + Sync {
    fn downstream(&self, upstream_host: &str, upstream_port: i32) -> Option<(String, i32)>;
}

/// Default mapping: keep the host, shift the port by a fixed amount.
#[derive(Debug, Clone, Copy)]
pub struct PortShiftMapping {
    shift: i32,
}

impl PortShiftMapping {
    pub fn new(shift: i32) -> Self {
        PortShiftMapping { shift }
    }
}

impl AddressMapping for PortShiftMapping {
    fn downstream(&self, upstream_host: &str, upstream_port: i32) -> Option<(String, i32)> {
        Some((upstream_host.to_string(), upstream_port + self.shift))
    }
}

/// Interceptor substituting advertised addresses through an
/// [`AddressMapping`].
pub struct BrokerAddressRewrite {
    mapping: Arc<dyn AddressMapping>,
}

impl BrokerAddressRewrite {
    pub fn new(mapping: Arc<dyn AddressMapping>) -> Self {
        BrokerAddressRewrite { mapping }
    }

    fn rewrite(&self, channel: &str, what: &str, host: &mut StrBytes, port: &mut i32) {
        // v4+ FindCoordinator responses leave the legacy single-coordinator
        // fields empty; nothing to rewrite there
        if host.is_empty() {
            return;
        }
        if let Some((new_host, new_port)) = self.mapping.downstream(host.as_str(), *port) {
            trace!(
                "{}: rewriting {} address {}:{} -> {}:{}",
                channel,
                what,
                host.as_str(),
                port,
                new_host,
                new_port
            );
            *host = StrBytes::from_string(new_host);
            *port = new_port;
        }
    }
}

impl Interceptor for BrokerAddressRewrite {
    fn should_decode_response(&self, api_key: ApiKey, _api_version: i16) -> bool {
        matches!(
            api_key,
            ApiKey::MetadataKey | ApiKey::DescribeClusterKey | ApiKey::FindCoordinatorKey
        )
    }

    fn on_response(
        &self,
        mut frame: DecodedResponseFrame,
        ctx: &HandlerContext,
    ) -> Result<DecodedResponseFrame> {
        let channel = ctx.channel_descriptor();
        match &mut frame.body {
            ResponseKind::Metadata(data) => {
                for broker in &mut data.brokers {
                    self.rewrite(channel, "broker", &mut broker.host, &mut broker.port);
                }
            }
            ResponseKind::DescribeCluster(data) => {
                for broker in &mut data.brokers {
                    self.rewrite(channel, "broker", &mut broker.host, &mut broker.port);
                }
            }
            ResponseKind::FindCoordinator(data) => {
                self.rewrite(channel, "coordinator", &mut data.host, &mut data.port);
                for coordinator in &mut data.coordinators {
                    self.rewrite(
                        channel,
                        "coordinator",
                        &mut coordinator.host,
                        &mut coordinator.port,
                    );
                }
            }
            _ => {}
        }
        Ok(frame)
    }
}
