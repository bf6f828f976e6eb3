//! Resilient Modbus-TCP client
//!
//! Hardening layer over a raw Modbus-TCP transport for unreliable field
//! devices and long-running polling loops.
//!
//! # Architecture
//!
//! This library provides:
//! - **Connection management**: ping-verified liveness, exponential back-off with jitter
//! - **Invalid address quarantine**: TTL-bounded cache of ranges the device rejected
//! - **Typed codec**: int16 through float64 in four register/byte orders
//! - **Safe operations**: every request classified into a [`ModbusError`] kind,
//!   exposed both as `Option`/`bool` and as `Result`
//!
//! The wire protocol itself lives behind [`ModbusTransport`].

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod quarantine;
pub mod transport;

// Re-export core types
pub use client::ResilientClient;
pub use codec::{DataType, Endian, RegisterValue, TypedValue};
pub use config::{ClientConfig, LoggingConfig};
pub use connection::{Backoff, ConnectionManager, ConnectionState};
pub use error::{ModbusError, Result};
pub use logging::{init_logging, ClientLogger};
pub use quarantine::{AreaKind, InvalidAddressCache, QuarantineKey};
pub use transport::{ExceptionCode, ModbusTransport};
