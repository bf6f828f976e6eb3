//! Transport collaborator contract
//!
//! The raw Modbus-TCP client (framing, transaction matching, sockets) sits
//! behind [`ModbusTransport`]. Primitives report failure with `None`/`false`;
//! the reason is read afterwards from the outcome accessors.

use crate::quarantine::{AreaKind, QuarantineKey};
use async_trait::async_trait;
use std::fmt;

/// Primitive operations of the underlying Modbus-TCP client
#[async_trait]
pub trait ModbusTransport: Send {
    /// Open the connection; `true` on success
    async fn open(&mut self) -> bool;

    /// Close the connection
    async fn close(&mut self);

    /// Whether the socket currently appears open
    fn is_open(&self) -> bool;

    /// FC02
    async fn read_discrete_inputs(&mut self, addr: u16, count: u16) -> Option<Vec<bool>>;

    /// FC01
    async fn read_coils(&mut self, addr: u16, count: u16) -> Option<Vec<bool>>;

    /// FC04
    async fn read_input_registers(&mut self, addr: u16, count: u16) -> Option<Vec<u16>>;

    /// FC03
    async fn read_holding_registers(&mut self, addr: u16, count: u16) -> Option<Vec<u16>>;

    /// FC05
    async fn write_single_coil(&mut self, addr: u16, value: bool) -> bool;

    /// FC15
    async fn write_multiple_coils(&mut self, addr: u16, values: &[bool]) -> bool;

    /// FC06
    async fn write_single_register(&mut self, addr: u16, value: u16) -> bool;

    /// FC16
    async fn write_multiple_registers(&mut self, addr: u16, values: &[u16]) -> bool;

    /// FC23
    async fn write_read_multiple_registers(
        &mut self,
        write_addr: u16,
        write_values: &[u16],
        read_addr: u16,
        read_count: u16,
    ) -> Option<Vec<u16>>;

    /// Exception code of the last response; nonzero means the device rejected the request
    fn last_exception_code(&self) -> u8;

    /// Transport error of the last operation; nonzero means a socket-level failure
    fn last_error_code(&self) -> i32;
}

/// Standard Modbus exception codes, for readable diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailedToRespond,
    Other(u8),
}

impl From<u8> for ExceptionCode {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::ServerDeviceBusy,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetFailedToRespond,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalFunction => write!(f, "illegal function (0x01)"),
            Self::IllegalDataAddress => write!(f, "illegal data address (0x02)"),
            Self::IllegalDataValue => write!(f, "illegal data value (0x03)"),
            Self::ServerDeviceFailure => write!(f, "server device failure (0x04)"),
            Self::Acknowledge => write!(f, "acknowledge (0x05)"),
            Self::ServerDeviceBusy => write!(f, "server device busy (0x06)"),
            Self::MemoryParityError => write!(f, "memory parity error (0x08)"),
            Self::GatewayPathUnavailable => write!(f, "gateway path unavailable (0x0A)"),
            Self::GatewayTargetFailedToRespond => {
                write!(f, "gateway target failed to respond (0x0B)")
            },
            Self::Other(code) => write!(f, "exception 0x{:02X}", code),
        }
    }
}

/// One primitive call against the transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request<'a> {
    ReadDiscreteInputs {
        addr: u16,
        count: u16,
    },
    ReadCoils {
        addr: u16,
        count: u16,
    },
    ReadInputRegisters {
        addr: u16,
        count: u16,
    },
    ReadHoldingRegisters {
        addr: u16,
        count: u16,
    },
    WriteSingleCoil {
        addr: u16,
        value: bool,
    },
    WriteMultipleCoils {
        addr: u16,
        values: &'a [bool],
    },
    WriteSingleRegister {
        addr: u16,
        value: u16,
    },
    WriteMultipleRegisters {
        addr: u16,
        values: &'a [u16],
    },
    WriteReadMultipleRegisters {
        write_addr: u16,
        write_values: &'a [u16],
        read_addr: u16,
        read_count: u16,
    },
}

impl Request<'_> {
    /// Address range this request touches, if it participates in quarantine
    ///
    /// The combined write/read request spans two ranges and is never quarantined.
    /// Neither is an empty multi-write, which addresses no range at all.
    pub fn quarantine_key(&self) -> Option<QuarantineKey> {
        let (area, addr, count) = match *self {
            Self::ReadDiscreteInputs { addr, count } => (AreaKind::DiscreteInput, addr, count),
            Self::ReadCoils { addr, count } => (AreaKind::Coil, addr, count),
            Self::ReadInputRegisters { addr, count } => (AreaKind::InputRegister, addr, count),
            Self::ReadHoldingRegisters { addr, count } => (AreaKind::HoldingRegister, addr, count),
            Self::WriteSingleCoil { addr, .. } => (AreaKind::Coil, addr, 1),
            Self::WriteMultipleCoils { addr, values } => {
                (AreaKind::Coil, addr, saturating_count(values.len()))
            },
            Self::WriteSingleRegister { addr, .. } => (AreaKind::HoldingRegister, addr, 1),
            Self::WriteMultipleRegisters { addr, values } => {
                (AreaKind::HoldingRegister, addr, saturating_count(values.len()))
            },
            Self::WriteReadMultipleRegisters { .. } => return None,
        };
        (count > 0).then(|| QuarantineKey::new(area, addr, count))
    }

    /// Whether a failure without any transport signal counts as a write error
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::WriteSingleCoil { .. }
                | Self::WriteMultipleCoils { .. }
                | Self::WriteSingleRegister { .. }
                | Self::WriteMultipleRegisters { .. }
        )
    }

    /// Operation name used in log lines and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadDiscreteInputs { .. } => "read_discrete_inputs",
            Self::ReadCoils { .. } => "read_coils",
            Self::ReadInputRegisters { .. } => "read_input_registers",
            Self::ReadHoldingRegisters { .. } => "read_holding_registers",
            Self::WriteSingleCoil { .. } => "write_single_coil",
            Self::WriteMultipleCoils { .. } => "write_multiple_coils",
            Self::WriteSingleRegister { .. } => "write_single_register",
            Self::WriteMultipleRegisters { .. } => "write_multiple_registers",
            Self::WriteReadMultipleRegisters { .. } => "write_read_multiple_registers",
        }
    }
}

fn saturating_count(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

/// Successful primitive result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Bits(Vec<bool>),
    Registers(Vec<u16>),
    Written,
}

impl Response {
    pub fn into_bits(self) -> Option<Vec<bool>> {
        match self {
            Self::Bits(bits) => Some(bits),
            _ => None,
        }
    }

    pub fn into_registers(self) -> Option<Vec<u16>> {
        match self {
            Self::Registers(regs) => Some(regs),
            _ => None,
        }
    }
}

/// Invoke the primitive matching `request`; `None` when the transport reports failure
pub async fn dispatch<T>(transport: &mut T, request: &Request<'_>) -> Option<Response>
where
    T: ModbusTransport + ?Sized,
{
    let written = |ok: bool| ok.then_some(Response::Written);

    match *request {
        Request::ReadDiscreteInputs { addr, count } => transport
            .read_discrete_inputs(addr, count)
            .await
            .map(Response::Bits),
        Request::ReadCoils { addr, count } => {
            transport.read_coils(addr, count).await.map(Response::Bits)
        },
        Request::ReadInputRegisters { addr, count } => transport
            .read_input_registers(addr, count)
            .await
            .map(Response::Registers),
        Request::ReadHoldingRegisters { addr, count } => transport
            .read_holding_registers(addr, count)
            .await
            .map(Response::Registers),
        Request::WriteSingleCoil { addr, value } => {
            written(transport.write_single_coil(addr, value).await)
        },
        Request::WriteMultipleCoils { addr, values } => {
            written(transport.write_multiple_coils(addr, values).await)
        },
        Request::WriteSingleRegister { addr, value } => {
            written(transport.write_single_register(addr, value).await)
        },
        Request::WriteMultipleRegisters { addr, values } => {
            written(transport.write_multiple_registers(addr, values).await)
        },
        Request::WriteReadMultipleRegisters {
            write_addr,
            write_values,
            read_addr,
            read_count,
        } => transport
            .write_read_multiple_registers(write_addr, write_values, read_addr, read_count)
            .await
            .map(Response::Registers),
    }
}
