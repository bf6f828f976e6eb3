//! Resilient Modbus client
//!
//! Every read and write passes through one pipeline:
//!
//! ```text
//! request ─► quarantine check ─► liveness check ─► transport primitive
//!                 │                     │                  │
//!            Protocol err        Connection err     classify failure
//!                                                   (exception → quarantine)
//! ```
//!
//! The safe entry points (`read_*`, `write_*`) never return errors: they log
//! the classified failure and return `None`/`false`. The `try_*` twins expose
//! the [`ModbusError`] kind with identical side effects. Protocol errors leave
//! the connection alone; every other kind closes it and backs off.

use crate::codec::{self, DataType, Endian, RegisterValue, TypedValue};
use crate::config::ClientConfig;
use crate::connection::{Backoff, ConnectionManager, ConnectionState};
use crate::error::{ModbusError, Result};
use crate::logging::ClientLogger;
use crate::quarantine::{InvalidAddressCache, QuarantineKey};
use crate::transport::{dispatch, ExceptionCode, ModbusTransport, Request, Response};
use std::time::Duration;
use tokio::time::Instant;

/// Modbus client with reconnection, back-off and invalid-address quarantine
///
/// Operations take `&mut self`: one request is in flight per connection.
/// Share a client between tasks by wrapping it in a mutex.
#[derive(Debug)]
pub struct ResilientClient<T> {
    connection: ConnectionManager<T>,
    cache: InvalidAddressCache,
    logger: ClientLogger,
}

impl<T: ModbusTransport> ResilientClient<T> {
    /// Create a client over `transport` with an injected logger
    pub fn new(transport: T, config: &ClientConfig, logger: ClientLogger) -> Self {
        let backoff = Backoff::new(config.base_retry_delay(), config.max_retry_delay());
        let connection = ConnectionManager::new(
            transport,
            backoff,
            config.ping_addr,
            config.ping_count,
            logger.clone(),
        );
        let cache = InvalidAddressCache::new(config.invalid_cache_ttl(), config.invalid_cache_max);

        Self {
            connection,
            cache,
            logger,
        }
    }

    /// Create a client whose logger is labelled with `config.target()`
    pub fn from_config(transport: T, config: &ClientConfig) -> Self {
        let logger = ClientLogger::new(config.target());
        Self::new(transport, config, logger)
    }

    // ========================================================================
    // Connection management
    // ========================================================================

    /// Verify the connection with a ping read, reconnecting if needed
    pub async fn check_liveness(&mut self) -> bool {
        self.connection.check_liveness().await
    }

    /// Close the connection; idempotent
    pub async fn close(&mut self) {
        self.connection.close().await;
    }

    pub fn is_open(&self) -> bool {
        self.connection.transport().is_open()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Consecutive connect/ping failures since the last success
    pub fn failure_count(&self) -> u32 {
        self.connection.backoff().consecutive_failures()
    }

    /// Un-jittered delay of the next retry sleep
    pub fn current_retry_delay(&self) -> Duration {
        self.connection.backoff().current_delay()
    }

    pub fn backoff(&self) -> &Backoff {
        self.connection.backoff()
    }

    pub fn logger(&self) -> &ClientLogger {
        &self.logger
    }

    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.connection.transport_mut()
    }

    // ========================================================================
    // Invalid address cache
    // ========================================================================

    /// Forget every quarantined address range
    pub fn clear_invalid_cache(&mut self) {
        self.cache.clear();
    }

    /// Live quarantine entries with their expiry instants
    pub fn invalid_cache_snapshot(&mut self) -> Vec<(QuarantineKey, Instant)> {
        self.cache.snapshot()
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    async fn execute(&mut self, request: Request<'_>) -> Result<Response> {
        let key = request.quarantine_key();

        if let Some(key) = key {
            if self.cache.is_quarantined(&key) {
                self.logger.log_skipped(&key);
                return Err(ModbusError::protocol(format!(
                    "address quarantined (probably nonexistent): {}",
                    key
                )));
            }
        }

        if !self.connection.check_liveness().await {
            return Err(ModbusError::connection("connection unavailable"));
        }

        match dispatch(self.connection.transport_mut(), &request).await {
            Some(response) => Ok(response),
            None => Err(self.classify_failure(&request, key)),
        }
    }

    fn classify_failure(&mut self, request: &Request<'_>, key: Option<QuarantineKey>) -> ModbusError {
        let transport = self.connection.transport();
        let exception = transport.last_exception_code();
        let error_code = transport.last_error_code();
        let message = format!("{} failed", request.name());

        if exception != 0 {
            if let Some(key) = key {
                self.cache.mark(key);
                self.logger.log_quarantined(&key, self.cache.ttl());
            }
            return ModbusError::protocol(format!(
                "{} (Modbus exception: {})",
                message,
                ExceptionCode::from(exception)
            ));
        }

        if error_code != 0 {
            return ModbusError::connection(format!(
                "{} (socket/transport error={})",
                message, error_code
            ));
        }

        if request.is_write() {
            ModbusError::write(message)
        } else {
            ModbusError::read(message)
        }
    }

    /// Log a classified failure and, unless it is a protocol error, drop the connection
    async fn handle_error(&mut self, context: &str, error: ModbusError) -> ModbusError {
        self.logger.log_failure(context, &error);
        if error.closes_connection() {
            self.connection.drop_connection().await;
        }
        error
    }

    async fn run(&mut self, request: Request<'_>) -> Result<Response> {
        match self.execute(request).await {
            Ok(response) => Ok(response),
            Err(error) => Err(self.handle_error(request.name(), error).await),
        }
    }

    async fn run_bits(&mut self, request: Request<'_>) -> Result<Vec<bool>> {
        let name = request.name();
        self.run(request)
            .await?
            .into_bits()
            .ok_or_else(|| ModbusError::read(format!("{} returned no bits", name)))
    }

    async fn run_registers(&mut self, request: Request<'_>) -> Result<Vec<u16>> {
        let name = request.name();
        self.run(request)
            .await?
            .into_registers()
            .ok_or_else(|| ModbusError::read(format!("{} returned no registers", name)))
    }

    async fn run_write(&mut self, request: Request<'_>) -> Result<()> {
        self.run(request).await.map(|_| ())
    }

    // ========================================================================
    // Raw operations (Result)
    // ========================================================================

    pub async fn try_read_discrete_inputs(&mut self, addr: u16, count: u16) -> Result<Vec<bool>> {
        self.run_bits(Request::ReadDiscreteInputs { addr, count }).await
    }

    pub async fn try_read_coils(&mut self, addr: u16, count: u16) -> Result<Vec<bool>> {
        self.run_bits(Request::ReadCoils { addr, count }).await
    }

    pub async fn try_write_single_coil(&mut self, addr: u16, value: bool) -> Result<()> {
        self.run_write(Request::WriteSingleCoil { addr, value }).await
    }

    pub async fn try_write_multiple_coils(&mut self, addr: u16, values: &[bool]) -> Result<()> {
        self.run_write(Request::WriteMultipleCoils { addr, values })
            .await
    }

    pub async fn try_read_input_registers(&mut self, addr: u16, count: u16) -> Result<Vec<u16>> {
        self.run_registers(Request::ReadInputRegisters { addr, count })
            .await
    }

    pub async fn try_read_holding_registers(
        &mut self,
        addr: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        self.run_registers(Request::ReadHoldingRegisters { addr, count })
            .await
    }

    pub async fn try_write_single_register(&mut self, addr: u16, value: u16) -> Result<()> {
        self.run_write(Request::WriteSingleRegister { addr, value })
            .await
    }

    pub async fn try_write_multiple_registers(&mut self, addr: u16, values: &[u16]) -> Result<()> {
        self.run_write(Request::WriteMultipleRegisters { addr, values })
            .await
    }

    /// FC23; never quarantined since it spans two address ranges
    pub async fn try_write_read_multiple_registers(
        &mut self,
        write_addr: u16,
        write_values: &[u16],
        read_addr: u16,
        read_count: u16,
    ) -> Result<Vec<u16>> {
        self.run_registers(Request::WriteReadMultipleRegisters {
            write_addr,
            write_values,
            read_addr,
            read_count,
        })
        .await
    }

    // ========================================================================
    // Raw operations (safe)
    // ========================================================================

    pub async fn read_discrete_inputs(&mut self, addr: u16, count: u16) -> Option<Vec<bool>> {
        self.try_read_discrete_inputs(addr, count).await.ok()
    }

    pub async fn read_coils(&mut self, addr: u16, count: u16) -> Option<Vec<bool>> {
        self.try_read_coils(addr, count).await.ok()
    }

    pub async fn write_single_coil(&mut self, addr: u16, value: bool) -> bool {
        self.try_write_single_coil(addr, value).await.is_ok()
    }

    pub async fn write_multiple_coils(&mut self, addr: u16, values: &[bool]) -> bool {
        self.try_write_multiple_coils(addr, values).await.is_ok()
    }

    pub async fn read_input_registers(&mut self, addr: u16, count: u16) -> Option<Vec<u16>> {
        self.try_read_input_registers(addr, count).await.ok()
    }

    pub async fn read_holding_registers(&mut self, addr: u16, count: u16) -> Option<Vec<u16>> {
        self.try_read_holding_registers(addr, count).await.ok()
    }

    pub async fn write_single_register(&mut self, addr: u16, value: u16) -> bool {
        self.try_write_single_register(addr, value).await.is_ok()
    }

    pub async fn write_multiple_registers(&mut self, addr: u16, values: &[u16]) -> bool {
        self.try_write_multiple_registers(addr, values).await.is_ok()
    }

    pub async fn write_read_multiple_registers(
        &mut self,
        write_addr: u16,
        write_values: &[u16],
        read_addr: u16,
        read_count: u16,
    ) -> Option<Vec<u16>> {
        self.try_write_read_multiple_registers(write_addr, write_values, read_addr, read_count)
            .await
            .ok()
    }

    // ========================================================================
    // Typed operations (Result)
    // ========================================================================

    async fn decode_block(
        &mut self,
        context: &str,
        regs: &[u16],
        data_type: DataType,
        endian: Endian,
    ) -> Result<TypedValue> {
        match codec::decode(regs, data_type, endian) {
            Ok(value) => Ok(value),
            Err(error) => {
                let context = format!("{}[{}]", context, data_type);
                Err(self.handle_error(&context, error).await)
            },
        }
    }

    /// Read `data_type.register_count()` holding registers and decode them
    pub async fn try_read_holding_typed(
        &mut self,
        addr: u16,
        data_type: DataType,
        endian: Endian,
    ) -> Result<TypedValue> {
        let regs = self
            .try_read_holding_registers(addr, data_type.register_count() as u16)
            .await?;
        self.decode_block("read_holding_typed", &regs, data_type, endian)
            .await
    }

    /// Read `data_type.register_count()` input registers and decode them
    pub async fn try_read_input_typed(
        &mut self,
        addr: u16,
        data_type: DataType,
        endian: Endian,
    ) -> Result<TypedValue> {
        let regs = self
            .try_read_input_registers(addr, data_type.register_count() as u16)
            .await?;
        self.decode_block("read_input_typed", &regs, data_type, endian)
            .await
    }

    /// Encode `value` and write it; 16-bit values use FC06, wider values FC16
    pub async fn try_write_holding_typed(
        &mut self,
        addr: u16,
        value: TypedValue,
        endian: Endian,
    ) -> Result<()> {
        let regs = match codec::encode(&value, endian) {
            Ok(regs) => regs,
            Err(error) => {
                let context = format!("write_holding_typed[{}]", value.data_type());
                return Err(self.handle_error(&context, error).await);
            },
        };

        match regs.as_slice() {
            [reg] => self.try_write_single_register(addr, *reg).await,
            _ => self.try_write_multiple_registers(addr, &regs).await,
        }
    }

    /// Range-check `value` against `data_type`, then write it
    pub async fn try_write_holding_integer(
        &mut self,
        addr: u16,
        value: i128,
        data_type: DataType,
        endian: Endian,
    ) -> Result<()> {
        match TypedValue::from_integer(data_type, value) {
            Ok(typed) => self.try_write_holding_typed(addr, typed, endian).await,
            Err(error) => {
                let context = format!("write_holding_typed[{}]", data_type);
                Err(self.handle_error(&context, error).await)
            },
        }
    }

    /// Check `value` is representable as `data_type`, then write it
    pub async fn try_write_holding_float(
        &mut self,
        addr: u16,
        value: f64,
        data_type: DataType,
        endian: Endian,
    ) -> Result<()> {
        match TypedValue::from_float(data_type, value) {
            Ok(typed) => self.try_write_holding_typed(addr, typed, endian).await,
            Err(error) => {
                let context = format!("write_holding_typed[{}]", data_type);
                Err(self.handle_error(&context, error).await)
            },
        }
    }

    pub async fn try_read_holding<V: RegisterValue>(&mut self, addr: u16, endian: Endian) -> Result<V> {
        let value = self.try_read_holding_typed(addr, V::DATA_TYPE, endian).await?;
        unwrap_typed(value)
    }

    pub async fn try_read_input<V: RegisterValue>(&mut self, addr: u16, endian: Endian) -> Result<V> {
        let value = self.try_read_input_typed(addr, V::DATA_TYPE, endian).await?;
        unwrap_typed(value)
    }

    pub async fn try_write_holding<V: RegisterValue>(
        &mut self,
        addr: u16,
        value: V,
        endian: Endian,
    ) -> Result<()> {
        self.try_write_holding_typed(addr, value.into_typed(), endian)
            .await
    }

    // ========================================================================
    // Typed operations (safe)
    // ========================================================================

    pub async fn read_holding_typed(
        &mut self,
        addr: u16,
        data_type: DataType,
        endian: Endian,
    ) -> Option<TypedValue> {
        self.try_read_holding_typed(addr, data_type, endian)
            .await
            .ok()
    }

    pub async fn read_input_typed(
        &mut self,
        addr: u16,
        data_type: DataType,
        endian: Endian,
    ) -> Option<TypedValue> {
        self.try_read_input_typed(addr, data_type, endian).await.ok()
    }

    pub async fn write_holding_typed(&mut self, addr: u16, value: TypedValue, endian: Endian) -> bool {
        self.try_write_holding_typed(addr, value, endian)
            .await
            .is_ok()
    }

    pub async fn write_holding_integer(
        &mut self,
        addr: u16,
        value: i128,
        data_type: DataType,
        endian: Endian,
    ) -> bool {
        self.try_write_holding_integer(addr, value, data_type, endian)
            .await
            .is_ok()
    }

    pub async fn write_holding_float(
        &mut self,
        addr: u16,
        value: f64,
        data_type: DataType,
        endian: Endian,
    ) -> bool {
        self.try_write_holding_float(addr, value, data_type, endian)
            .await
            .is_ok()
    }

    /// Statically typed read, e.g. `client.read_holding::<f32>(100, Endian::Be)`
    pub async fn read_holding<V: RegisterValue>(&mut self, addr: u16, endian: Endian) -> Option<V> {
        self.try_read_holding(addr, endian).await.ok()
    }

    pub async fn read_input<V: RegisterValue>(&mut self, addr: u16, endian: Endian) -> Option<V> {
        self.try_read_input(addr, endian).await.ok()
    }

    pub async fn write_holding<V: RegisterValue>(&mut self, addr: u16, value: V, endian: Endian) -> bool {
        self.try_write_holding(addr, value, endian).await.is_ok()
    }
}

fn unwrap_typed<V: RegisterValue>(value: TypedValue) -> Result<V> {
    V::from_typed(value).ok_or_else(|| {
        ModbusError::conversion(format!(
            "expected {}, decoded {}",
            V::DATA_TYPE,
            value.data_type()
        ))
    })
}
