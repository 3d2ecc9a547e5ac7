//! Connection lifecycle state machine
//!
//! ```text
//! Disconnected --connect--> Connecting --open--> Connected
//! Connected  --unclean close / error, attempts < max--> Error --delay--> Connecting
//! Connecting --open failed, attempts < max-----------> Error --delay--> Connecting
//! Connected  --close 1000 / manual disconnect--> Disconnected
//! Connecting --attempts == max--> Disconnected (fatal)
//! ```
//!
//! [`Connection`] holds no sockets or timers; it only decides. The
//! [`ConnectionManager`](super::ConnectionManager) performs the I/O.

use tokio::time::Instant;

use super::NORMAL_CLOSURE;
use crate::types::{ConnectionState, DisconnectReason, StreamKey};

/// Decision taken when a socket closes or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossOutcome {
    /// No retry will follow
    Terminal(DisconnectReason),
    /// Schedule reconnect attempt number `attempt`
    Retry { attempt: u32 },
    /// Attempt budget exhausted
    Exhausted { attempts: u32 },
}

/// Lifecycle of one stream's connection.
#[derive(Debug, Clone)]
pub struct Connection {
    key: StreamKey,
    state: ConnectionState,
    attempts: u32,
    max_attempts: u32,
    last_open: Option<Instant>,
    manual_close: bool,
    fatal: bool,
}

impl Connection {
    pub fn new(key: StreamKey, max_attempts: u32) -> Self {
        Self {
            key,
            state: ConnectionState::Disconnected,
            attempts: 0,
            max_attempts,
            last_open: None,
            manual_close: false,
            fatal: false,
        }
    }

    /// Enter Connecting. Returns `false` if already connecting or connected.
    pub fn begin_connect(&mut self) -> bool {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            return false;
        }
        self.state = ConnectionState::Connecting;
        self.manual_close = false;
        self.fatal = false;
        true
    }

    /// The socket opened at `now`
    pub fn opened(&mut self, now: Instant) {
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.last_open = Some(now);
    }

    /// The socket closed with `code`, failed, or could not be opened (`None`).
    pub fn lost(&mut self, code: Option<u16>) -> LossOutcome {
        if self.manual_close {
            self.state = ConnectionState::Disconnected;
            return LossOutcome::Terminal(DisconnectReason::Manual);
        }
        if code == Some(NORMAL_CLOSURE) {
            self.state = ConnectionState::Disconnected;
            return LossOutcome::Terminal(DisconnectReason::CleanClose);
        }
        if self.attempts >= self.max_attempts {
            self.state = ConnectionState::Disconnected;
            self.fatal = true;
            return LossOutcome::Exhausted { attempts: self.attempts };
        }
        self.attempts += 1;
        self.state = ConnectionState::Error;
        LossOutcome::Retry { attempt: self.attempts }
    }

    /// The reconnect delay elapsed
    pub fn retry_due(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Go to Disconnected. `manual` suppresses any later automatic retry.
    ///
    /// Returns `false` if nothing was active.
    pub fn disconnect(&mut self, manual: bool) -> bool {
        let was_active = self.state != ConnectionState::Disconnected;
        self.state = ConnectionState::Disconnected;
        if manual {
            self.manual_close = true;
        }
        was_active
    }

    /// Explicit user reconnect: forget previous failures
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.fatal = false;
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn last_open(&self) -> Option<Instant> {
        self.last_open
    }

    pub fn is_manually_closed(&self) -> bool {
        self.manual_close
    }

    /// Retries were exhausted and no reconnect happened since
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn connection(max: u32) -> Connection {
        Connection::new(StreamKey::new("cam-1").unwrap(), max)
    }

    #[test]
    fn connect_is_noop_when_active() {
        let mut conn = connection(3);
        assert!(conn.begin_connect());
        assert!(!conn.begin_connect());
        conn.opened(Instant::now());
        assert!(!conn.begin_connect());
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn clean_close_is_terminal() {
        let mut conn = connection(3);
        conn.begin_connect();
        conn.opened(Instant::now());
        assert_eq!(conn.lost(Some(1000)), LossOutcome::Terminal(DisconnectReason::CleanClose));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.attempts(), 0);
    }

    #[test]
    fn manual_disconnect_suppresses_retry() {
        let mut conn = connection(3);
        conn.begin_connect();
        conn.opened(Instant::now());
        assert!(conn.disconnect(true));
        assert_eq!(conn.lost(Some(1006)), LossOutcome::Terminal(DisconnectReason::Manual));
        assert!(!conn.disconnect(true));
    }

    #[test]
    fn unclean_close_counts_attempts_until_exhausted() {
        let mut conn = connection(2);
        conn.begin_connect();
        conn.opened(Instant::now());

        assert_eq!(conn.lost(Some(1006)), LossOutcome::Retry { attempt: 1 });
        assert_eq!(conn.state(), ConnectionState::Error);
        conn.retry_due();
        assert_eq!(conn.lost(None), LossOutcome::Retry { attempt: 2 });
        conn.retry_due();
        assert_eq!(conn.lost(None), LossOutcome::Exhausted { attempts: 2 });
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.is_fatal());

        conn.reset_attempts();
        assert_eq!(conn.attempts(), 0);
        assert!(!conn.is_fatal());
    }

    #[test]
    fn successful_open_resets_attempts() {
        let mut conn = connection(5);
        conn.begin_connect();
        conn.lost(None);
        conn.retry_due();
        conn.lost(None);
        assert_eq!(conn.attempts(), 2);
        conn.retry_due();
        let now = Instant::now();
        conn.opened(now);
        assert_eq!(conn.attempts(), 0);
        assert_eq!(conn.last_open(), Some(now));
    }

    proptest! {
        #[test]
        fn attempts_never_exceed_max(
            max in 0u32..12,
            codes in prop::collection::vec(prop::option::of(1001u16..4999), 0..40)
        ) {
            let mut conn = connection(max);
            conn.begin_connect();
            for code in codes {
                match conn.lost(code) {
                    LossOutcome::Retry { attempt } => {
                        prop_assert!(attempt <= max);
                        conn.retry_due();
                    }
                    LossOutcome::Exhausted { attempts } => {
                        prop_assert_eq!(attempts, max);
                        break;
                    }
                    LossOutcome::Terminal(_) => prop_assert!(false, "no clean close generated"),
                }
                prop_assert!(conn.attempts() <= max);
            }
        }
    }
}
