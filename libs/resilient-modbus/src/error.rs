//! Modbus client error types
//!
//! Classified failure kinds reported by the safe-operation layer.

use thiserror::Error;

/// Result type for resilient-modbus operations
pub type Result<T> = std::result::Result<T, ModbusError>;

/// Classified Modbus client errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// Transport unreachable or socket-level failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Device-reported application exception; the connection is still usable
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Read failed without any distinguishing signal from the transport
    #[error("Read error: {0}")]
    Read(String),

    /// Write failed without any distinguishing signal from the transport
    #[error("Write error: {0}")]
    Write(String),

    /// Value outside its representable range, wrong register count or non-finite float
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<figment::Error> for ModbusError {
    fn from(err: figment::Error) -> Self {
        ModbusError::Config(err.to_string())
    }
}

// Helper methods for creating errors
impl ModbusError {
    pub fn connection(msg: impl Into<String>) -> Self {
        ModbusError::Connection(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        ModbusError::Protocol(msg.into())
    }

    pub fn read(msg: impl Into<String>) -> Self {
        ModbusError::Read(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        ModbusError::Write(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        ModbusError::Conversion(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ModbusError::Config(msg.into())
    }

    /// Check if this error requires closing the connection and backing off
    ///
    /// Protocol errors leave the socket untouched: only the request was invalid.
    pub fn closes_connection(&self) -> bool {
        match self {
            ModbusError::Connection(_)
            | ModbusError::Read(_)
            | ModbusError::Write(_)
            | ModbusError::Conversion(_) => true,
            ModbusError::Protocol(_) | ModbusError::Config(_) => false,
        }
    }

    /// Short kind label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            ModbusError::Connection(_) => "connection",
            ModbusError::Protocol(_) => "protocol",
            ModbusError::Read(_) => "read",
            ModbusError::Write(_) => "write",
            ModbusError::Conversion(_) => "conversion",
            ModbusError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_keep_connection() {
        assert!(!ModbusError::protocol("illegal address").closes_connection());
        assert!(ModbusError::connection("reset").closes_connection());
        assert!(ModbusError::read("no data").closes_connection());
        assert!(ModbusError::write("rejected").closes_connection());
        assert!(ModbusError::conversion("range").closes_connection());
    }

    #[test]
    fn test_display_includes_kind() {
        let err = ModbusError::conversion("INT16 out of range: 40000");
        assert_eq!(
            err.to_string(),
            "Conversion error: INT16 out of range: 40000"
        );
        assert_eq!(err.kind(), "conversion");
    }
}
