//! Typed register codec
//!
//! Pure conversions between 16-bit register blocks and numeric values:
//! - `int16`/`uint16`: one register
//! - `int32`/`uint32`/`float32`: two registers
//! - `int64`/`uint64`/`float64`: four registers
//!
//! Every layout supports the four [`Endian`] conventions. Conversion
//! failures are reported as [`ModbusError::Conversion`](crate::ModbusError),
//! never truncated.

pub mod conversions;
pub mod endian;
pub mod value;

pub use conversions::{decode, encode, register_count};
pub use endian::{Endian, ParseEndianError};
pub use value::{DataType, ParseDataTypeError, RegisterValue, TypedValue};
