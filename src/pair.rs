//! Bidirectional connection pair
//!
//! One task owns everything for a client/broker pair: both sockets, the
//! per-direction buffers, the codec state and the correlation map. All
//! decoding, interceptor execution and encoding happens inline on this
//! task, so none of the per-pair state needs locks.
//!
//! Flow control: each direction accumulates encoded output in a pending
//! buffer. When that buffer crosses the high watermark the *source* side
//! stops being read; reads resume once writes drain the buffer to the low
//! watermark. A slow peer therefore stalls its producer instead of
//! growing proxy memory.
//!
//! Connect ordering: the upstream connect completes before the first read
//! of the client socket is issued, so a client that fires API_VERSIONS
//! immediately after connecting just waits in the kernel buffer.

use bytes::{Buf, BytesMut};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::codec::{
    encode_request, encode_response, CorrelationMap, RequestDecoder, RequestFrame,
    ResponseDecoder, ResponseFrame,
};
use crate::config::ProxyConfig;
use crate::constants::{READ_BUFFER_CAPACITY, WRITE_HIGH_WATERMARK, WRITE_LOW_WATERMARK};
use crate::error::Result;
use crate::intercept::{HandlerContext, InterceptorRegistry};

/// Read gate with watermark hysteresis.
///
/// Closes when the tracked backlog reaches the high watermark and reopens
/// only after it drains to the low watermark, so the pipeline does not
/// flap around a single threshold.
#[derive(Debug)]
pub(crate) struct FlowGate {
    high: usize,
    low: usize,
    suspended: bool,
}

impl FlowGate {
    pub(crate) fn new(high: usize, low: usize) -> Self {
        FlowGate {
            high,
            low,
            suspended: false,
        }
    }

    /// Re-evaluate the gate against the current backlog.
    pub(crate) fn update(&mut self, pending: usize) {
        if pending >= self.high {
            self.suspended = true;
        } else if pending <= self.low {
            self.suspended = false;
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.suspended
    }
}

/// A client connection paired with its upstream broker connection.
pub(crate) struct ConnectionPair {
    client: TcpStream,
    broker_addr: String,
    registry: Arc<InterceptorRegistry>,
    max_frame_bytes: usize,
    log_network: bool,
    log_frames: bool,
    channel: String,
}

impl ConnectionPair {
    pub(crate) fn new(
        client: TcpStream,
        peer: std::net::SocketAddr,
        config: &ProxyConfig,
        registry: Arc<InterceptorRegistry>,
    ) -> Self {
        let broker_addr = config.broker_addr();
        let channel = format!("{}<->{}", peer, broker_addr);
        ConnectionPair {
            client,
            broker_addr,
            registry,
            max_frame_bytes: config.max_frame_bytes,
            log_network: config.log_network,
            log_frames: config.log_frames,
            channel,
        }
    }

    /// Run the pair to completion.
    ///
    /// Returns when either side closes or on the first data-path error.
    /// Either way, complete frames already encoded for the surviving
    /// side are flushed best-effort before both sockets shut down;
    /// partial frames in the read buffers are discarded.
    pub(crate) async fn run(self) -> Result<()> {
        let ConnectionPair {
            mut client,
            broker_addr,
            registry,
            max_frame_bytes,
            log_network,
            log_frames,
            channel,
        } = self;

        // Connect upstream before the first client read; a connect
        // failure closes the inbound connection by dropping it.
        let mut broker = TcpStream::connect(&broker_addr).await?;
        debug!("{}: upstream connected, enabling client reads", channel);

        let request_decoder = RequestDecoder::new(registry.clone(), max_frame_bytes);
        let response_decoder = ResponseDecoder::new(max_frame_bytes);
        let mut correlation = CorrelationMap::new();
        let ctx = HandlerContext::new(channel.clone());

        let (mut client_rd, mut client_wr) = client.split();
        let (mut broker_rd, mut broker_wr) = broker.split();

        let mut client_in = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
        let mut broker_in = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
        let mut to_broker = BytesMut::new();
        let mut to_client = BytesMut::new();

        // request gate throttles client reads on the broker-bound backlog,
        // response gate throttles broker reads on the client-bound backlog
        let mut request_gate = FlowGate::new(WRITE_HIGH_WATERMARK, WRITE_LOW_WATERMARK);
        let mut response_gate = FlowGate::new(WRITE_HIGH_WATERMARK, WRITE_LOW_WATERMARK);

        let mut client_open = true;
        let mut broker_open = true;

        let outcome: Result<()> = loop {
            if !client_open || !broker_open {
                break Ok(());
            }
            tokio::select! {
                read = client_rd.read_buf(&mut client_in), if request_gate.is_open() => {
                    match read {
                        Ok(0) => client_open = false,
                        Ok(n) => {
                            if log_network {
                                trace!("{}: read {} bytes from client", channel, n);
                            }
                            if let Err(e) = pump_requests(
                                &request_decoder,
                                &registry,
                                &ctx,
                                &mut client_in,
                                &mut to_broker,
                                &mut correlation,
                                log_frames,
                                &channel,
                            ) {
                                break Err(e);
                            }
                            request_gate.update(to_broker.len());
                        }
                        Err(e) => break Err(e.into()),
                    }
                }
                read = broker_rd.read_buf(&mut broker_in), if response_gate.is_open() => {
                    match read {
                        Ok(0) => broker_open = false,
                        Ok(n) => {
                            if log_network {
                                trace!("{}: read {} bytes from broker", channel, n);
                            }
                            if let Err(e) = pump_responses(
                                &response_decoder,
                                &registry,
                                &ctx,
                                &mut broker_in,
                                &mut to_client,
                                &mut correlation,
                                log_frames,
                                &channel,
                            ) {
                                break Err(e);
                            }
                            response_gate.update(to_client.len());
                        }
                        Err(e) => break Err(e.into()),
                    }
                }
                written = broker_wr.write(&to_broker), if !to_broker.is_empty() => {
                    match written {
                        Ok(n) => {
                            to_broker.advance(n);
                            request_gate.update(to_broker.len());
                        }
                        Err(e) => break Err(e.into()),
                    }
                }
                written = client_wr.write(&to_client), if !to_client.is_empty() => {
                    match written {
                        Ok(n) => {
                            to_client.advance(n);
                            response_gate.update(to_client.len());
                        }
                        Err(e) => break Err(e.into()),
                    }
                }
            }
        };

        // Flush complete frames each surviving side is still owed, then
        // shut both legs down. The frame that caused an error was never
        // encoded, so nothing partial can leak here.
        if !to_broker.is_empty() {
            let _ = broker_wr.write_all(&to_broker).await;
        }
        if !to_client.is_empty() {
            let _ = client_wr.write_all(&to_client).await;
        }
        let _ = broker_wr.shutdown().await;
        let _ = client_wr.shutdown().await;

        debug!(
            "{}: pair closed, {} responses still outstanding",
            channel,
            correlation.len()
        );
        outcome
    }
}

/// Drain every complete request frame out of `client_in`: decode, run
/// the handler chain, encode toward the broker.
#[allow(clippy::too_many_arguments)]
fn pump_requests(
    decoder: &RequestDecoder,
    registry: &InterceptorRegistry,
    ctx: &HandlerContext,
    client_in: &mut BytesMut,
    to_broker: &mut BytesMut,
    correlation: &mut CorrelationMap,
    log_frames: bool,
    channel: &str,
) -> Result<()> {
    while let Some(frame) = decoder.decode(client_in)? {
        let frame = match frame {
            RequestFrame::Decoded(decoded) => {
                RequestFrame::Decoded(registry.apply_request(decoded, ctx)?)
            }
            opaque => opaque,
        };
        if log_frames {
            debug!(
                "{}: request api_key={} v{} correlation_id={} {}",
                channel,
                frame.api_key_raw(),
                frame.api_version(),
                frame.correlation_id(),
                if frame.is_opaque() { "opaque" } else { "decoded" },
            );
        }
        encode_request(&frame, to_broker, correlation)?;
    }
    Ok(())
}

/// Drain every complete response frame out of `broker_in`: decode
/// against the correlation map, run the handler chain, encode toward the
/// client.
#[allow(clippy::too_many_arguments)]
fn pump_responses(
    decoder: &ResponseDecoder,
    registry: &InterceptorRegistry,
    ctx: &HandlerContext,
    broker_in: &mut BytesMut,
    to_client: &mut BytesMut,
    correlation: &mut CorrelationMap,
    log_frames: bool,
    channel: &str,
) -> Result<()> {
    while let Some(frame) = decoder.decode(broker_in, correlation)? {
        let frame = match frame {
            ResponseFrame::Decoded(decoded) => {
                ResponseFrame::Decoded(registry.apply_response(decoded, ctx)?)
            }
            opaque => opaque,
        };
        if log_frames {
            debug!(
                "{}: response api_key={} correlation_id={} {}",
                channel,
                frame.api_key_raw(),
                frame.correlation_id(),
                if frame.is_opaque() { "opaque" } else { "decoded" },
            );
        }
        encode_response(&frame, to_client)?;
    }
    Ok(())
}
