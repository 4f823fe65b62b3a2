//! Listener lifecycle
//!
//! Binds the client-facing socket, accepts connections, and spawns one
//! [`ConnectionPair`](crate::pair::ConnectionPair) task per client. The
//! accept loop runs until a shutdown signal arrives on a watch channel;
//! pair faults are logged and isolated from other pairs.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::intercept::{Interceptor, InterceptorRegistry};
use crate::pair::ConnectionPair;

/// A proxy instance: one listener, one upstream broker address, one
/// immutable interceptor chain shared by every connection pair.
pub struct KafkaRelay {
    config: ProxyConfig,
    registry: Arc<InterceptorRegistry>,
    running: Option<(watch::Sender<bool>, JoinHandle<()>)>,
    local_addr: Option<SocketAddr>,
}

impl KafkaRelay {
    pub fn new(config: ProxyConfig, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        KafkaRelay {
            config,
            registry: Arc::new(InterceptorRegistry::new(interceptors)),
            running: None,
            local_addr: None,
        }
    }

    /// Bind the listener and start accepting connections.
    ///
    /// Bind failure is fatal and propagates to the caller. Calling
    /// `startup` on a proxy that is already running just returns the
    /// bound address again.
    pub async fn startup(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr {
            if self.running.is_some() {
                return Ok(addr);
            }
        }

        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        let addr = listener.local_addr()?;
        info!(
            "proxying local {} to remote {}",
            addr,
            self.config.broker_addr()
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(
            listener,
            self.config.clone(),
            self.registry.clone(),
            shutdown_rx,
        ));
        self.running = Some((shutdown_tx, task));
        self.local_addr = Some(addr);
        Ok(addr)
    }

    /// Address the listener is bound to, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    ///
    /// Existing connection pairs finish on their own; only the listener
    /// is torn down here.
    pub async fn shutdown(&mut self) {
        if let Some((shutdown_tx, task)) = self.running.take() {
            let _ = shutdown_tx.send(true);
            let _ = task.await;
            self.local_addr = None;
            info!("listener stopped");
        }
    }
}

/// Accept loop: wait for new connections or the shutdown signal.
async fn accept_loop(
    listener: TcpListener,
    config: ProxyConfig,
    registry: Arc<InterceptorRegistry>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((socket, peer)) => {
                        debug!("accepted connection from {}", peer);
                        // per-frame latency matters more than throughput here
                        let _ = socket.set_nodelay(true);
                        let pair = ConnectionPair::new(socket, peer, &config, registry.clone());
                        tokio::spawn(async move {
                            if let Err(e) = pair.run().await {
                                if e.is_protocol_violation() {
                                    warn!("closing pair for {}: {}", peer, e);
                                } else {
                                    debug!("pair for {} ended: {}", peer, e);
                                }
                            }
                        });
                    }
                    Err(e) => {
                        warn!("error accepting connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    debug!("listener received shutdown signal");
                    break;
                }
            }
        }
    }
}
