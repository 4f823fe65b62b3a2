//! Transparent Kafka wire-protocol proxy
//!
//! Sits between Kafka clients and a broker, parses the wire protocol
//! selectively, transforms specific request/response messages through a
//! pluggable interceptor chain, and forwards everything else as opaque
//! bytes.
//!
//! Architecture overview:
//!
//! - [`codec`] owns framing: length prefixes, api-key sniffing, the
//!   decode-or-passthrough decision, and correlation tracking. Message
//!   schemas come from the `kafka-protocol` crate.
//! - [`intercept`] holds the interceptor trait, the registry that
//!   composes decode predicates and handler chains, and the two built-in
//!   interceptors every Kafka proxy needs: API-versions intersection and
//!   advertised-address rewrite.
//! - [`proxy`] binds the listener and spawns one task per connection
//!   pair; that task (in `pair`) owns all per-pair state, so the data
//!   path is lock-free.

pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod intercept;
mod pair;
pub mod proxy;

pub use config::ProxyConfig;
pub use error::{RelayError, Result};
pub use proxy::KafkaRelay;
