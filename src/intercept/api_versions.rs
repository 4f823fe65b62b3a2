//! API-versions intersection
//!
//! Changes an API_VERSIONS response so that a client sees, for each api
//! key, the intersection of the broker's advertised range and the range
//! the proxy's schema library can parse. This is an intrinsic part of
//! acting as a proxy: without it a client may pick a version the proxy
//! cannot decode.

use kafka_protocol::messages::api_versions_response::ApiVersion;
use kafka_protocol::messages::{ApiKey, ApiVersionsResponse, ResponseKind};
use kafka_protocol::protocol::{Message, VersionRange};
use tracing::trace;

use crate::codec::DecodedResponseFrame;
use crate::error::Result;
use crate::intercept::{HandlerContext, Interceptor};

/// Interceptor narrowing advertised version ranges to the mutual range.
#[derive(Debug, Default)]
pub struct ApiVersionsIntersect;

impl ApiVersionsIntersect {
    pub fn new() -> Self {
        ApiVersionsIntersect
    }
}

impl Interceptor for ApiVersionsIntersect {
    fn should_decode_response(&self, api_key: ApiKey, _api_version: i16) -> bool {
        api_key == ApiKey::ApiVersionsKey
    }

    fn on_response(
        &self,
        mut frame: DecodedResponseFrame,
        ctx: &HandlerContext,
    ) -> Result<DecodedResponseFrame> {
        if let ResponseKind::ApiVersions(body) = &mut frame.body {
            intersect_api_versions(ctx.channel_descriptor(), body);
        }
        Ok(frame)
    }
}

/// Clamp every advertised range in place.
///
/// Keys the schema library does not know pass through unchanged. Keys
/// whose intersection is empty are removed: advertising `min > max` would
/// be malformed, and a client must not use an API the proxy cannot parse
/// at any version.
fn intersect_api_versions(channel: &str, response: &mut ApiVersionsResponse) {
    response.api_keys.retain_mut(|entry| {
        let api_key = match ApiKey::try_from(entry.api_key) {
            Ok(api_key) => api_key,
            Err(_) => return true,
        };
        let proxy = match supported_versions(api_key) {
            Some(range) => range,
            None => return true,
        };
        intersect_entry(channel, entry, proxy)
    });
}

/// Clamp one advertised range; returns false when the intersection is
/// empty and the key should be dropped.
fn intersect_entry(channel: &str, entry: &mut ApiVersion, proxy: VersionRange) -> bool {
    let mutual_min = entry.min_version.max(proxy.min);
    let mutual_max = entry.max_version.min(proxy.max);
    if mutual_min > mutual_max {
        trace!(
            "{}: api key {} has no mutual version (broker {}-{}, proxy {}-{}), dropping",
            channel,
            entry.api_key,
            entry.min_version,
            entry.max_version,
            proxy.min,
            proxy.max
        );
        return false;
    }
    if mutual_min != entry.min_version {
        trace!(
            "{}: api key {} min version {} -> {}",
            channel,
            entry.api_key,
            entry.min_version,
            mutual_min
        );
        entry.min_version = mutual_min;
    }
    if mutual_max != entry.max_version {
        trace!(
            "{}: api key {} max version {} -> {}",
            channel,
            entry.api_key,
            entry.max_version,
            mutual_max
        );
        entry.max_version = mutual_max;
    }
    true
}

/// The version range the proxy itself can parse for an api key, from the
/// schema library's per-message tables. `None` for keys without a usable
/// schema here; those are advertised unchanged.
pub fn supported_versions(api_key: ApiKey) -> Option<VersionRange> {
    use kafka_protocol::messages::*;

    fn range<T: Message>() -> Option<VersionRange> {
        Some(T::VERSIONS)
    }

    match api_key {
        ApiKey::ProduceKey => range::<ProduceRequest>(),
        ApiKey::FetchKey => range::<FetchRequest>(),
        ApiKey::ListOffsetsKey => range::<ListOffsetsRequest>(),
        ApiKey::MetadataKey => range::<MetadataRequest>(),
        ApiKey::LeaderAndIsrKey => range::<LeaderAndIsrRequest>(),
        ApiKey::StopReplicaKey => range::<StopReplicaRequest>(),
        ApiKey::UpdateMetadataKey => range::<UpdateMetadataRequest>(),
        ApiKey::ControlledShutdownKey => range::<ControlledShutdownRequest>(),
        ApiKey::OffsetCommitKey => range::<OffsetCommitRequest>(),
        ApiKey::OffsetFetchKey => range::<OffsetFetchRequest>(),
        ApiKey::FindCoordinatorKey => range::<FindCoordinatorRequest>(),
        ApiKey::JoinGroupKey => range::<JoinGroupRequest>(),
        ApiKey::HeartbeatKey => range::<HeartbeatRequest>(),
        ApiKey::LeaveGroupKey => range::<LeaveGroupRequest>(),
        ApiKey::SyncGroupKey => range::<SyncGroupRequest>(),
        ApiKey::DescribeGroupsKey => range::<DescribeGroupsRequest>(),
        ApiKey::ListGroupsKey => range::<ListGroupsRequest>(),
        ApiKey::SaslHandshakeKey => range::<SaslHandshakeRequest>(),
        ApiKey::ApiVersionsKey => range::<ApiVersionsRequest>(),
        ApiKey::CreateTopicsKey => range::<CreateTopicsRequest>(),
        ApiKey::DeleteTopicsKey => range::<DeleteTopicsRequest>(),
        ApiKey::DeleteRecordsKey => range::<DeleteRecordsRequest>(),
        ApiKey::InitProducerIdKey => range::<InitProducerIdRequest>(),
        ApiKey::OffsetForLeaderEpochKey => range::<OffsetForLeaderEpochRequest>(),
        ApiKey::AddPartitionsToTxnKey => range::<AddPartitionsToTxnRequest>(),
        ApiKey::AddOffsetsToTxnKey => range::<AddOffsetsToTxnRequest>(),
        ApiKey::EndTxnKey => range::<EndTxnRequest>(),
        ApiKey::WriteTxnMarkersKey => range::<WriteTxnMarkersRequest>(),
        ApiKey::TxnOffsetCommitKey => range::<TxnOffsetCommitRequest>(),
        ApiKey::DescribeAclsKey => range::<DescribeAclsRequest>(),
        ApiKey::CreateAclsKey => range::<CreateAclsRequest>(),
        ApiKey::DeleteAclsKey => range::<DeleteAclsRequest>(),
        ApiKey::DescribeConfigsKey => range::<DescribeConfigsRequest>(),
        ApiKey::AlterConfigsKey => range::<AlterConfigsRequest>(),
        ApiKey::AlterReplicaLogDirsKey => range::<AlterReplicaLogDirsRequest>(),
        ApiKey::DescribeLogDirsKey => range::<DescribeLogDirsRequest>(),
        ApiKey::SaslAuthenticateKey => range::<SaslAuthenticateRequest>(),
        ApiKey::CreatePartitionsKey => range::<CreatePartitionsRequest>(),
        ApiKey::CreateDelegationTokenKey => range::<CreateDelegationTokenRequest>(),
        ApiKey::RenewDelegationTokenKey => range::<RenewDelegationTokenRequest>(),
        ApiKey::ExpireDelegationTokenKey => range::<ExpireDelegationTokenRequest>(),
        ApiKey::DescribeDelegationTokenKey => range::<DescribeDelegationTokenRequest>(),
        ApiKey::DeleteGroupsKey => range::<DeleteGroupsRequest>(),
        ApiKey::ElectLeadersKey => range::<ElectLeadersRequest>(),
        ApiKey::IncrementalAlterConfigsKey => range::<IncrementalAlterConfigsRequest>(),
        ApiKey::AlterPartitionReassignmentsKey => range::<AlterPartitionReassignmentsRequest>(),
        ApiKey::ListPartitionReassignmentsKey => range::<ListPartitionReassignmentsRequest>(),
        ApiKey::OffsetDeleteKey => range::<OffsetDeleteRequest>(),
        ApiKey::DescribeClientQuotasKey => range::<DescribeClientQuotasRequest>(),
        ApiKey::AlterClientQuotasKey => range::<AlterClientQuotasRequest>(),
        ApiKey::DescribeUserScramCredentialsKey => range::<DescribeUserScramCredentialsRequest>(),
        ApiKey::AlterUserScramCredentialsKey => range::<AlterUserScramCredentialsRequest>(),
        ApiKey::DescribeClusterKey => range::<DescribeClusterRequest>(),
        ApiKey::DescribeProducersKey => range::<DescribeProducersRequest>(),
        ApiKey::DescribeTransactionsKey => range::<DescribeTransactionsRequest>(),
        ApiKey::ListTransactionsKey => range::<ListTransactionsRequest>(),
        ApiKey::AllocateProducerIdsKey => range::<AllocateProducerIdsRequest>(),
        ApiKey::ConsumerGroupHeartbeatKey => range::<ConsumerGroupHeartbeatRequest>(),
        _ => None,
    }
}
