use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::clock::{duration_ms, Clock, EpochMillis};
use crate::ProviderId;

/// Runtime circuit state for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<EpochMillis>,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

/// Thread-safe circuit breaker timed by the injected clock.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    /// Open circuits let a single trial request through once `open_timeout` has elapsed.
    pub fn allow_request(&self) -> bool {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let now = self.clock.now_ms();
                let can_try = inner
                    .opened_at
                    .map(|opened_at| now - opened_at >= duration_ms(self.config.open_timeout))
                    .unwrap_or(false);

                if can_try {
                    inner.state = CircuitState::HalfOpen;
                    inner.opened_at = None;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    /// Returns `true` when this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        if inner.state == CircuitState::HalfOpen
            || (inner.state == CircuitState::Closed
                && inner.consecutive_failures >= self.config.failure_threshold)
        {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(self.clock.now_ms());
            return true;
        }
        false
    }

    pub fn state(&self) -> CircuitState {
        let inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        let inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.consecutive_failures
    }
}

/// Lazily created breaker per provider, shared by every resolution.
#[derive(Debug)]
pub struct CircuitBreakers {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    breakers: Mutex<HashMap<ProviderId, Arc<CircuitBreaker>>>,
}

impl CircuitBreakers {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            breakers: Mutex::default(),
        }
    }

    pub fn for_provider(&self, provider: ProviderId) -> Arc<CircuitBreaker> {
        let mut breakers = self
            .breakers
            .lock()
            .expect("circuit breaker registry lock is not poisoned");
        breakers
            .entry(provider)
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config, self.clock.clone())))
            .clone()
    }

    pub fn state(&self, provider: ProviderId) -> CircuitState {
        self.for_provider(provider).state()
    }

    pub(crate) fn record(&self, provider: ProviderId, success: bool) {
        let breaker = self.for_provider(provider);
        if success {
            if breaker.state() != CircuitState::Closed {
                info!(%provider, "circuit closed");
            }
            breaker.record_success();
        } else if breaker.record_failure() {
            warn!(
                %provider,
                open_for_ms = duration_ms(self.config.open_timeout),
                "circuit opened"
            );
        }
    }
}
