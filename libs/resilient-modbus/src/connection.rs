//! Connection lifecycle and retry timing
//!
//! A TCP socket that looks open proves nothing about the peer, so liveness
//! is established with a real holding-register read. Failed connects and
//! dead sockets double the retry delay up to a ceiling; every wait is
//! jittered so clients sharing a schedule do not reconnect in lockstep.

use crate::logging::ClientLogger;
use crate::transport::ModbusTransport;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Lower bound of the jitter factor applied to retry sleeps
pub const JITTER_MIN: f64 = 0.9;
/// Upper bound of the jitter factor applied to retry sleeps
pub const JITTER_MAX: f64 = 1.1;

/// Connection state as seen by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Exponential back-off state
///
/// Invariant: `base_delay <= current_delay <= max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base_delay: Duration,
    max_delay: Duration,
    current_delay: Duration,
    consecutive_failures: u32,
}

impl Backoff {
    /// Create back-off state; `max_delay` is raised to `base_delay` if smaller
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            current_delay: base_delay,
            consecutive_failures: 0,
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Double the delay, capped at `max_delay`
    pub fn increase(&mut self) {
        self.current_delay = self.current_delay.saturating_mul(2).min(self.max_delay);
    }

    /// Return to `base_delay`
    pub fn reset(&mut self) {
        self.current_delay = self.base_delay;
    }

    /// Count one failure and back off
    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.increase();
    }

    /// Clear the failure count and return to `base_delay`
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.reset();
    }

    /// Current delay scaled by `factor`, floored at zero
    pub fn scaled_delay(&self, factor: f64) -> Duration {
        Duration::try_from_secs_f64((self.current_delay.as_secs_f64() * factor).max(0.0))
            .unwrap_or(self.max_delay)
    }

    /// Current delay scaled by a factor drawn uniformly from `[JITTER_MIN, JITTER_MAX]`
    pub fn jittered_delay(&self) -> Duration {
        let factor = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
        self.scaled_delay(factor)
    }
}

/// Owns the transport and its reconnection policy
#[derive(Debug)]
pub struct ConnectionManager<T> {
    transport: T,
    backoff: Backoff,
    ping_addr: u16,
    ping_count: u16,
    logger: ClientLogger,
}

impl<T: ModbusTransport> ConnectionManager<T> {
    pub fn new(
        transport: T,
        backoff: Backoff,
        ping_addr: u16,
        ping_count: u16,
        logger: ClientLogger,
    ) -> Self {
        Self {
            transport,
            backoff,
            ping_addr,
            ping_count: ping_count.max(1),
            logger,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn state(&self) -> ConnectionState {
        if self.transport.is_open() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Open the transport unless it is already open
    ///
    /// Success resets the failure count and back-off; failure counts one
    /// failure and doubles the delay. Never sleeps.
    pub async fn ensure_connected(&mut self) -> bool {
        if self.transport.is_open() {
            return true;
        }

        self.logger.log_connect();
        if self.transport.open().await {
            self.logger.log_connected();
            self.backoff.record_success();
            return true;
        }

        self.logger.log_connect_failed(self.backoff.current_delay());
        self.backoff.record_failure();
        false
    }

    /// Prove the peer is responsive with a ping read
    ///
    /// On connect failure or a failed ping the manager sleeps for the
    /// jittered retry delay before returning `false`; a failed ping also
    /// closes the transport and backs off.
    pub async fn check_liveness(&mut self) -> bool {
        if !self.ensure_connected().await {
            self.sleep_with_jitter().await;
            return false;
        }

        let ping = self
            .transport
            .read_holding_registers(self.ping_addr, self.ping_count)
            .await;

        if ping.is_some() {
            self.backoff.record_success();
            return true;
        }

        self.logger.log_connection_lost(self.backoff.current_delay());
        self.transport.close().await;
        self.backoff.record_failure();
        self.sleep_with_jitter().await;
        false
    }

    /// Close the transport and back off, without counting a failure
    ///
    /// Used after a classified operation failure that is not a protocol error.
    pub async fn drop_connection(&mut self) {
        self.transport.close().await;
        self.backoff.increase();
    }

    /// Close the transport if it is open; idempotent
    pub async fn close(&mut self) {
        if self.transport.is_open() {
            self.transport.close().await;
            self.logger.log_closed();
        }
    }

    async fn sleep_with_jitter(&mut self) {
        let delay = self.backoff.jittered_delay();
        debug!("Retry sleep {:?}", delay);
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        assert_eq!(backoff.current_delay(), Duration::from_millis(100));

        backoff.record_failure();
        assert_eq!(backoff.current_delay(), Duration::from_millis(200));
        backoff.record_failure();
        assert_eq!(backoff.current_delay(), Duration::from_millis(400));
        backoff.record_failure();
        assert_eq!(backoff.current_delay(), Duration::from_millis(800));
        assert_eq!(backoff.consecutive_failures(), 3);
    }

    #[test]
    fn test_max_delay_limit() {
        let base = Duration::from_secs(2);
        let max = Duration::from_secs(30);
        let mut backoff = Backoff::new(base, max);

        for n in 1..=10u32 {
            backoff.record_failure();
            let expected = base.saturating_mul(2u32.pow(n)).min(max);
            assert_eq!(backoff.current_delay(), expected);
            assert!(backoff.current_delay() >= base);
            assert!(backoff.current_delay() <= max);
        }
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(8));
        backoff.record_failure();
        backoff.record_failure();
        backoff.record_success();
        assert_eq!(backoff.current_delay(), Duration::from_secs(1));
        assert_eq!(backoff.consecutive_failures(), 0);
    }

    #[test]
    fn test_max_raised_to_base() {
        let backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(backoff.max_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_bounds() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(60));
        backoff.increase();
        for _ in 0..200 {
            let delay = backoff.jittered_delay();
            assert!(delay >= Duration::from_secs_f64(18.0 - 1e-6));
            assert!(delay <= Duration::from_secs_f64(22.0 + 1e-6));
        }
        assert_eq!(backoff.scaled_delay(-1.0), Duration::ZERO);
    }

    #[test]
    fn test_zero_base_stays_zero() {
        let mut backoff = Backoff::new(Duration::ZERO, Duration::from_secs(1));
        backoff.record_failure();
        assert_eq!(backoff.current_delay(), Duration::ZERO);
        assert_eq!(backoff.jittered_delay(), Duration::ZERO);
    }
}
