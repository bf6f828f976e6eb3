//! Numeric data types carried in register blocks

use crate::error::{ModbusError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric kinds that can be stored in holding/input registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

impl DataType {
    pub const ALL: [DataType; 8] = [
        DataType::Int16,
        DataType::Uint16,
        DataType::Int32,
        DataType::Uint32,
        DataType::Int64,
        DataType::Uint64,
        DataType::Float32,
        DataType::Float64,
    ];

    /// Bit width of the value
    pub fn bits(&self) -> usize {
        match self {
            Self::Int16 | Self::Uint16 => 16,
            Self::Int32 | Self::Uint32 | Self::Float32 => 32,
            Self::Int64 | Self::Uint64 | Self::Float64 => 64,
        }
    }

    /// Number of 16-bit registers the value occupies
    pub fn register_count(&self) -> usize {
        self.bits() / 16
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a data type name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown data type: {0}")]
pub struct ParseDataTypeError(pub String);

impl FromStr for DataType {
    type Err = ParseDataTypeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "int16" | "i16" => Ok(Self::Int16),
            "uint16" | "u16" => Ok(Self::Uint16),
            "int32" | "i32" => Ok(Self::Int32),
            "uint32" | "u32" => Ok(Self::Uint32),
            "int64" | "i64" => Ok(Self::Int64),
            "uint64" | "u64" => Ok(Self::Uint64),
            "float32" | "f32" | "float" => Ok(Self::Float32),
            "float64" | "f64" | "double" => Ok(Self::Float64),
            _ => Err(ParseDataTypeError(s.to_string())),
        }
    }
}

/// A decoded register value tagged with its data type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypedValue {
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl TypedValue {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::I16(_) => DataType::Int16,
            Self::U16(_) => DataType::Uint16,
            Self::I32(_) => DataType::Int32,
            Self::U32(_) => DataType::Uint32,
            Self::I64(_) => DataType::Int64,
            Self::U64(_) => DataType::Uint64,
            Self::F32(_) => DataType::Float32,
            Self::F64(_) => DataType::Float64,
        }
    }

    /// Build a value of `data_type` from an integer, rejecting values that do not fit
    pub fn from_integer(data_type: DataType, value: i128) -> Result<Self> {
        let out_of_range =
            || ModbusError::conversion(format!("{} out of range: {}", data_type, value));

        Ok(match data_type {
            DataType::Int16 => Self::I16(i16::try_from(value).map_err(|_| out_of_range())?),
            DataType::Uint16 => Self::U16(u16::try_from(value).map_err(|_| out_of_range())?),
            DataType::Int32 => Self::I32(i32::try_from(value).map_err(|_| out_of_range())?),
            DataType::Uint32 => Self::U32(u32::try_from(value).map_err(|_| out_of_range())?),
            DataType::Int64 => Self::I64(i64::try_from(value).map_err(|_| out_of_range())?),
            DataType::Uint64 => Self::U64(u64::try_from(value).map_err(|_| out_of_range())?),
            DataType::Float32 | DataType::Float64 => {
                return Self::from_float(data_type, value as f64)
            },
        })
    }

    /// Build a value of `data_type` from a float
    ///
    /// Non-finite input always fails. Integer targets additionally require an
    /// integral value inside the target range; `Float32` requires a value
    /// inside the binary32 range.
    pub fn from_float(data_type: DataType, value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(ModbusError::conversion(format!(
                "invalid value for {}: {}",
                data_type, value
            )));
        }

        match data_type {
            DataType::Float64 => Ok(Self::F64(value)),
            DataType::Float32 => {
                if value.abs() > f64::from(f32::MAX) {
                    return Err(ModbusError::conversion(format!(
                        "float32 out of range: {}",
                        value
                    )));
                }
                Ok(Self::F32(value as f32))
            },
            _ => {
                if value.fract() != 0.0 {
                    return Err(ModbusError::conversion(format!(
                        "{} requires an integral value, got {}",
                        data_type, value
                    )));
                }
                // Saturating cast; anything beyond i128 is out of range for every target anyway
                Self::from_integer(data_type, value as i128)
            },
        }
    }

    /// Lossy widening to f64, convenient for display and scaling
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::I16(v) => f64::from(v),
            Self::U16(v) => f64::from(v),
            Self::I32(v) => f64::from(v),
            Self::U32(v) => f64::from(v),
            Self::I64(v) => v as f64,
            Self::U64(v) => v as f64,
            Self::F32(v) => f64::from(v),
            Self::F64(v) => v,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I16(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
        }
    }
}

/// Rust primitive that maps one-to-one onto a [`DataType`]
///
/// Enables the statically typed client API, e.g. `read_holding::<f32>(addr, endian)`.
pub trait RegisterValue: Copy + Send + Sized {
    const DATA_TYPE: DataType;

    fn into_typed(self) -> TypedValue;

    fn from_typed(value: TypedValue) -> Option<Self>;
}

macro_rules! impl_register_value {
    ($($ty:ty => $variant:ident, $data_type:ident;)*) => {
        $(
            impl RegisterValue for $ty {
                const DATA_TYPE: DataType = DataType::$data_type;

                fn into_typed(self) -> TypedValue {
                    TypedValue::$variant(self)
                }

                fn from_typed(value: TypedValue) -> Option<Self> {
                    match value {
                        TypedValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for TypedValue {
                fn from(value: $ty) -> Self {
                    TypedValue::$variant(value)
                }
            }
        )*
    };
}

impl_register_value! {
    i16 => I16, Int16;
    u16 => U16, Uint16;
    i32 => I32, Int32;
    u32 => U32, Uint32;
    i64 => I64, Int64;
    u64 => U64, Uint64;
    f32 => F32, Float32;
    f64 => F64, Float64;
}
