//! Reconnect policy: exponential backoff, an attempt budget, and the
//! resume-or-reidentify decision for close codes.

use std::time::Duration;

use rand::Rng;

use super::error::GatewayError;
use crate::config::ReconnectConfig;

/// How the next connection should authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    /// Keep session id and sequence, send Resume.
    Resume,
    /// Forget the session, send Identify.
    Reidentify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    Resume,
    Reidentify,
    Fatal,
}

pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const AUTHENTICATION_FAILED: u16 = 4004;
    pub const INVALID_SEQUENCE: u16 = 4007;
    pub const SESSION_TIMED_OUT: u16 = 4009;
    pub const INVALID_SHARD: u16 = 4010;
    pub const SHARDING_REQUIRED: u16 = 4011;
    pub const INVALID_API_VERSION: u16 = 4012;
    pub const INVALID_INTENTS: u16 = 4013;
    pub const DISALLOWED_INTENTS: u16 = 4014;
    /// Sent by this client when it drops a connection it wants to resume.
    pub const CLIENT_RESUME: u16 = 4000;
}

pub fn classify_close(code: u16) -> CloseAction {
    match code {
        close_code::AUTHENTICATION_FAILED
        | close_code::INVALID_SHARD
        | close_code::SHARDING_REQUIRED
        | close_code::INVALID_API_VERSION
        | close_code::INVALID_INTENTS
        | close_code::DISALLOWED_INTENTS => CloseAction::Fatal,
        close_code::NORMAL
        | close_code::GOING_AWAY
        | close_code::INVALID_SEQUENCE
        | close_code::SESSION_TIMED_OUT => CloseAction::Reidentify,
        _ => CloseAction::Resume,
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    step: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms: max_ms.max(base_ms),
            step: 0,
        }
    }

    /// `base * 2^step`, capped at the maximum.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u64.checked_shl(self.step).unwrap_or(u64::MAX);
        let millis = self.base_ms.saturating_mul(factor).min(self.max_ms);
        self.step = self.step.saturating_add(1).min(63);
        Duration::from_millis(millis)
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    backoff: Backoff,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            backoff: Backoff::new(config.backoff_base_ms, config.backoff_max_ms),
            max_attempts: config.max_attempts,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A session was established (READY or RESUMED).
    pub fn connected(&mut self) {
        self.attempts = 0;
        self.backoff.reset();
    }

    /// Delay before the next attempt, or an error once the budget is spent.
    pub fn next_delay(&mut self, kind: Reconnect) -> Result<Duration, GatewayError> {
        if self.attempts >= self.max_attempts {
            return Err(GatewayError::ReconnectExhausted(self.attempts));
        }
        self.attempts += 1;

        let delay = self.backoff.next_delay();
        Ok(match kind {
            Reconnect::Resume => delay,
            // Identify is rate limited; wait 1-5s after a lost session.
            Reconnect::Reidentify => delay.max(Duration::from_millis(
                rand::rng().random_range(1_000..=5_000),
            )),
        })
    }
}
