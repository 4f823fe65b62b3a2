//! Protocol constants and tunables
//!
//! Centralizes the magic numbers used across the proxy. Wire-level values
//! come from the Kafka protocol specification; buffer tunables follow the
//! usual 64 KiB / 32 KiB channel watermark pairing.

// ===== Configuration Defaults =====

/// Default client-facing listen port
pub const DEFAULT_LISTEN_PORT: u16 = 9192;

/// Default upstream broker port (standard Kafka broker port)
pub const DEFAULT_BROKER_PORT: u16 = 9092;

/// Default upstream broker host
pub const DEFAULT_BROKER_HOST: &str = "localhost";

/// Host to bind when no listen host is configured (all interfaces)
pub const ALL_INTERFACES: &str = "0.0.0.0";

/// Default port shift applied by the advertised-address rewrite
pub const DEFAULT_ADVERTISE_PORT_SHIFT: i32 = 100;

// ===== Protocol Limits =====

/// Maximum accepted frame size (100MB)
///
/// A length prefix above this closes the pair; it bounds per-connection
/// buffering against hostile or corrupt length fields.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 100_000_000;

/// Hard ceiling for the configurable frame size limit (1GB)
pub const MAX_CONFIGURABLE_FRAME_BYTES: usize = 1_000_000_000;

/// Maximum encoded width of a 32-bit varint
pub const MAX_VARINT_BYTES: usize = 5;

/// Maximum encoded width of a 64-bit varlong
pub const MAX_VARLONG_BYTES: usize = 10;

// ===== Pipeline Tunables =====

/// Pending-write level at which reads on the opposite side are suspended
pub const WRITE_HIGH_WATERMARK: usize = 64 * 1024;

/// Pending-write level at which suspended reads resume
pub const WRITE_LOW_WATERMARK: usize = 32 * 1024;

/// Initial capacity of per-direction read buffers
pub const READ_BUFFER_CAPACITY: usize = 16 * 1024;
