//! Binary entry point
//!
//! Wires the default interceptor chain (API-versions intersection and
//! advertised-address rewrite) to a proxy instance configured from the
//! environment, then runs until interrupted.

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kafka_relay::intercept::{
    ApiVersionsIntersect, BrokerAddressRewrite, Interceptor, PortShiftMapping,
};
use kafka_relay::{KafkaRelay, ProxyConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match ProxyConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let interceptors: Vec<Arc<dyn Interceptor>> = vec![
        Arc::new(ApiVersionsIntersect::new()),
        Arc::new(BrokerAddressRewrite::new(Arc::new(PortShiftMapping::new(
            config.advertise_port_shift,
        )))),
    ];

    let mut relay = KafkaRelay::new(config, interceptors);
    if let Err(e) = relay.startup().await {
        error!("failed to start proxy: {}", e);
        return ExitCode::FAILURE;
    }

    if tokio::signal::ctrl_c().await.is_err() {
        error!("failed to listen for shutdown signal");
    } else {
        info!("interrupt received, shutting down");
    }
    relay.shutdown().await;
    ExitCode::SUCCESS
}
