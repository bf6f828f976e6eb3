//! Shared test utilities
//!
//! [`MockDevice`] models a Modbus server as sparse address maps: reading or
//! writing any undefined address yields exception 0x02. Failures can also be
//! scripted per primitive call.

#![allow(dead_code)]

use async_trait::async_trait;
use resilient_modbus::{ClientConfig, ModbusTransport};
use std::collections::{HashMap, VecDeque};

/// Exception code for an illegal data address
pub const ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Transport error code reported for a reset connection
pub const ECONNRESET: i32 = 104;

/// Forced outcome of one primitive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Behave according to the address maps
    Normal,
    /// Device answers with this exception code
    Exception(u8),
    /// Socket fails with this error code and the connection drops
    Socket(i32),
    /// Call fails without any exception or error code
    Silent,
}

/// In-memory device behind the [`ModbusTransport`] contract
#[derive(Debug, Default)]
pub struct MockDevice {
    pub holding: HashMap<u16, u16>,
    pub input: HashMap<u16, u16>,
    pub coils: HashMap<u16, bool>,
    pub discrete: HashMap<u16, bool>,

    /// Number of upcoming `open` calls that fail
    pub failing_opens: usize,
    /// Outcomes consumed one per primitive call; empty means `Normal`
    pub script: VecDeque<Outcome>,

    pub open: bool,
    pub open_calls: usize,
    pub close_calls: usize,
    /// Name of every primitive invoked, ping reads included
    pub calls: Vec<&'static str>,

    exception_code: u8,
    error_code: i32,
}

impl MockDevice {
    /// Device with holding registers `0..count` set to zero
    pub fn with_holding_registers(count: u16) -> Self {
        let mut device = Self::default();
        for addr in 0..count {
            device.holding.insert(addr, 0);
        }
        device
    }

    pub fn script(mut self, outcomes: &[Outcome]) -> Self {
        self.script.extend(outcomes.iter().copied());
        self
    }

    pub fn holding_block(&self, addr: u16, count: u16) -> Vec<u16> {
        (addr..addr + count)
            .map(|a| self.holding.get(&a).copied().unwrap_or_default())
            .collect()
    }

    fn begin(&mut self, name: &'static str) -> Outcome {
        self.calls.push(name);
        self.exception_code = 0;
        self.error_code = 0;

        let outcome = self.script.pop_front().unwrap_or(Outcome::Normal);
        match outcome {
            Outcome::Normal => {},
            Outcome::Exception(code) => self.exception_code = code,
            Outcome::Socket(code) => {
                self.error_code = code;
                self.open = false;
            },
            Outcome::Silent => {},
        }
        if !self.open && outcome == Outcome::Normal {
            self.error_code = ECONNRESET;
            return Outcome::Socket(ECONNRESET);
        }
        outcome
    }

    fn read_map<V: Copy>(
        map: &HashMap<u16, V>,
        addr: u16,
        count: u16,
        exception_code: &mut u8,
    ) -> Option<Vec<V>> {
        let values: Option<Vec<V>> = (0..count)
            .map(|offset| {
                addr.checked_add(offset)
                    .and_then(|a| map.get(&a).copied())
            })
            .collect();
        if values.is_none() {
            *exception_code = ILLEGAL_DATA_ADDRESS;
        }
        values
    }

    fn write_map<V: Copy>(
        map: &mut HashMap<u16, V>,
        addr: u16,
        values: &[V],
        exception_code: &mut u8,
    ) -> bool {
        let defined = (0..values.len()).all(|offset| {
            u16::try_from(offset)
                .ok()
                .and_then(|offset| addr.checked_add(offset))
                .is_some_and(|a| map.contains_key(&a))
        });
        if !defined {
            *exception_code = ILLEGAL_DATA_ADDRESS;
            return false;
        }
        for (a, value) in (addr..).zip(values.iter()) {
            map.insert(a, *value);
        }
        true
    }
}

#[async_trait]
impl ModbusTransport for MockDevice {
    async fn open(&mut self) -> bool {
        self.open_calls += 1;
        if self.failing_opens > 0 {
            self.failing_opens -= 1;
            return false;
        }
        self.open = true;
        true
    }

    async fn close(&mut self) {
        self.close_calls += 1;
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn read_discrete_inputs(&mut self, addr: u16, count: u16) -> Option<Vec<bool>> {
        match self.begin("read_discrete_inputs") {
            Outcome::Normal => Self::read_map(&self.discrete, addr, count, &mut self.exception_code),
            _ => None,
        }
    }

    async fn read_coils(&mut self, addr: u16, count: u16) -> Option<Vec<bool>> {
        match self.begin("read_coils") {
            Outcome::Normal => Self::read_map(&self.coils, addr, count, &mut self.exception_code),
            _ => None,
        }
    }

    async fn read_input_registers(&mut self, addr: u16, count: u16) -> Option<Vec<u16>> {
        match self.begin("read_input_registers") {
            Outcome::Normal => Self::read_map(&self.input, addr, count, &mut self.exception_code),
            _ => None,
        }
    }

    async fn read_holding_registers(&mut self, addr: u16, count: u16) -> Option<Vec<u16>> {
        match self.begin("read_holding_registers") {
            Outcome::Normal => Self::read_map(&self.holding, addr, count, &mut self.exception_code),
            _ => None,
        }
    }

    async fn write_single_coil(&mut self, addr: u16, value: bool) -> bool {
        match self.begin("write_single_coil") {
            Outcome::Normal => {
                Self::write_map(&mut self.coils, addr, &[value], &mut self.exception_code)
            },
            _ => false,
        }
    }

    async fn write_multiple_coils(&mut self, addr: u16, values: &[bool]) -> bool {
        match self.begin("write_multiple_coils") {
            Outcome::Normal => {
                Self::write_map(&mut self.coils, addr, values, &mut self.exception_code)
            },
            _ => false,
        }
    }

    async fn write_single_register(&mut self, addr: u16, value: u16) -> bool {
        match self.begin("write_single_register") {
            Outcome::Normal => {
                Self::write_map(&mut self.holding, addr, &[value], &mut self.exception_code)
            },
            _ => false,
        }
    }

    async fn write_multiple_registers(&mut self, addr: u16, values: &[u16]) -> bool {
        match self.begin("write_multiple_registers") {
            Outcome::Normal => {
                Self::write_map(&mut self.holding, addr, values, &mut self.exception_code)
            },
            _ => false,
        }
    }

    async fn write_read_multiple_registers(
        &mut self,
        write_addr: u16,
        write_values: &[u16],
        read_addr: u16,
        read_count: u16,
    ) -> Option<Vec<u16>> {
        match self.begin("write_read_multiple_registers") {
            Outcome::Normal => {
                if !Self::write_map(
                    &mut self.holding,
                    write_addr,
                    write_values,
                    &mut self.exception_code,
                ) {
                    return None;
                }
                Self::read_map(&self.holding, read_addr, read_count, &mut self.exception_code)
            },
            _ => None,
        }
    }

    fn last_exception_code(&self) -> u8 {
        self.exception_code
    }

    fn last_error_code(&self) -> i32 {
        self.error_code
    }
}

/// Client configuration with short retry delays
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("127.0.0.1");
    config.base_retry_delay_ms = 100;
    config.max_retry_delay_ms = 1_000;
    config.invalid_cache_ttl_secs = 600;
    config.logging.log_file = None;
    config
}
