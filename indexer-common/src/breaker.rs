// This file is part of soroban-indexer.
// Copyright (C) 2025 Blockroma
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Circuit breaker for upstream calls.
//!
//! The breaker is `Closed` until `max_failures` consecutive failures are observed, then `Open`
//! for `reset_timeout`, after which a limited number of probe calls are admitted (`HalfOpen`).
//! A single successful probe closes the breaker, a single failed probe reopens it. Every call
//! runs under its own `request_timeout` deadline.

use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Deserialize;
use std::{collections::VecDeque, error::Error as StdError, future::Future, time::Duration};
use thiserror::Error;
use tokio::time::{self, Instant};

/// Probe calls admitted while half-open.
const HALF_OPEN_MAX: u32 = 3;

/// Failures retained for diagnostics when the breaker opens.
const ERROR_HISTORY: usize = 10;

/// The state of a [CircuitBreaker].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

/// Configuration for [CircuitBreaker].
///
/// All fields have sensible deserialization defaults.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Config {
    /// Consecutive failures before the breaker opens. Defaults to 5.
    #[serde(default = "max_failures_default")]
    pub max_failures: u32,

    /// Time the breaker stays open before admitting probes. Defaults to 30s.
    #[serde(with = "humantime_serde", default = "reset_timeout_default")]
    pub reset_timeout: Duration,

    /// Deadline for each individual call. Defaults to 30s.
    #[serde(with = "humantime_serde", default = "request_timeout_default")]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_failures: max_failures_default(),
            reset_timeout: reset_timeout_default(),
            request_timeout: request_timeout_default(),
        }
    }
}

/// Error possibly returned by [CircuitBreaker::call].
#[derive(Debug, Error)]
pub enum BreakerError<E>
where
    E: StdError + 'static,
{
    #[error("circuit breaker is open")]
    Open,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed")]
    Call(#[source] E),
}

/// Circuit breaker guarding calls to an unreliable upstream.
///
/// The state machine is guarded by a mutex and never observed mid-transition; the failure count
/// is shared across all users of one breaker instance.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: Config,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: State,
    failures: u32,
    last_failure: Option<Instant>,
    half_open_probes: u32,
    recent_errors: VecDeque<String>,
}

impl CircuitBreaker {
    /// Create a new [CircuitBreaker] in the `Closed` state.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                failures: 0,
                last_failure: None,
                half_open_probes: 0,
                recent_errors: VecDeque::with_capacity(ERROR_HISTORY),
            }),
        }
    }

    /// Execute the given call under breaker protection and the configured request deadline.
    pub async fn call<T, E, Fut>(&self, fut: Fut) -> Result<T, BreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        if !self.can_attempt() {
            return Err(BreakerError::Open);
        }

        let result = match time::timeout(self.config.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(BreakerError::Call(error)),
            Err(_) => Err(BreakerError::Timeout(self.config.request_timeout)),
        };

        match &result {
            Ok(_) => self.record_success(),
            Err(error) => self.record_failure(error.to_string()),
        }

        result
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// The current consecutive failure count.
    pub fn failures(&self) -> u32 {
        self.inner.lock().failures
    }

    /// Force the breaker back into the `Closed` state, clearing all counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.failures = 0;
        inner.half_open_probes = 0;
    }

    fn can_attempt(&self) -> bool {
        let mut inner = self.inner.lock();

        match inner.state {
            State::Closed => true,

            State::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| at.elapsed() > self.config.reset_timeout)
                    .unwrap_or(true);

                if elapsed {
                    inner.state = State::HalfOpen;
                    inner.half_open_probes = 1;
                    info!("circuit breaker half-open, admitting probes");
                    true
                } else {
                    false
                }
            }

            State::HalfOpen => {
                if inner.half_open_probes < HALF_OPEN_MAX {
                    inner.half_open_probes += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();

        match inner.state {
            State::HalfOpen => {
                inner.state = State::Closed;
                inner.failures = 0;
                inner.half_open_probes = 0;
                info!("circuit breaker closed after successful probe");
            }

            State::Closed => inner.failures = 0,

            State::Open => {}
        }
    }

    fn record_failure(&self, error: String) {
        let mut inner = self.inner.lock();

        inner.failures += 1;
        inner.last_failure = Some(Instant::now());

        if inner.recent_errors.len() == ERROR_HISTORY {
            inner.recent_errors.pop_back();
        }
        inner.recent_errors.push_front(error);

        let previous = inner.state;

        if inner.failures >= self.config.max_failures {
            inner.state = State::Open;

            if previous != State::Open {
                let recent = inner
                    .recent_errors
                    .iter()
                    .take(5)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("; ");
                error!(
                    failures = inner.failures,
                    max_failures = self.config.max_failures,
                    recent_errors = recent;
                    "circuit breaker opened"
                );
            }
        } else if previous == State::HalfOpen {
            inner.state = State::Open;
            warn!(failures = inner.failures; "circuit breaker reopened after failed probe");
        }
    }
}

fn max_failures_default() -> u32 {
    5
}

fn reset_timeout_default() -> Duration {
    Duration::from_secs(30)
}

fn request_timeout_default() -> Duration {
    Duration::from_secs(30)
}

#[cfg(test)]
mod tests {
    use crate::breaker::{BreakerError, CircuitBreaker, Config, State};
    use assert_matches::assert_matches;
    use std::{future, time::Duration};
    use thiserror::Error;
    use tokio::time;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    fn breaker(max_failures: u32) -> CircuitBreaker {
        CircuitBreaker::new(Config {
            max_failures,
            reset_timeout: Duration::from_millis(100),
            request_timeout: Duration::from_secs(1),
        })
    }

    #[tokio::test]
    async fn test_success_keeps_closed() {
        let breaker = breaker(3);

        for _ in 0..5 {
            let result = breaker.call(future::ready(Ok::<_, Boom>(42))).await;
            assert_matches!(result, Ok(42));
        }

        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.failures(), 0);
    }

    #[tokio::test]
    async fn test_failures_open_circuit() {
        let breaker = breaker(3);

        for _ in 0..3 {
            let result = breaker.call(future::ready(Err::<u32, _>(Boom))).await;
            assert_matches!(result, Err(BreakerError::Call(Boom)));
        }
        assert_eq!(breaker.state(), State::Open);

        // Rejected without invoking the call.
        let result = breaker.call(future::ready(Ok::<_, Boom>(1))).await;
        assert_matches!(result, Err(BreakerError::Open));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_success_closes() {
        let breaker = breaker(2);

        for _ in 0..2 {
            let _ = breaker.call(future::ready(Err::<u32, _>(Boom))).await;
        }
        assert_eq!(breaker.state(), State::Open);

        time::advance(Duration::from_millis(150)).await;

        let result = breaker.call(future::ready(Ok::<_, Boom>(7))).await;
        assert_matches!(result, Ok(7));
        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let breaker = breaker(2);

        for _ in 0..2 {
            let _ = breaker.call(future::ready(Err::<u32, _>(Boom))).await;
        }
        time::advance(Duration::from_millis(150)).await;

        let result = breaker.call(future::ready(Err::<u32, _>(Boom))).await;
        assert_matches!(result, Err(BreakerError::Call(Boom)));
        assert_eq!(breaker.state(), State::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout() {
        let breaker = CircuitBreaker::new(Config {
            max_failures: 5,
            reset_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_millis(10),
        });

        let result = breaker
            .call(async {
                time::sleep(Duration::from_secs(60)).await;
                Ok::<_, Boom>(1)
            })
            .await;

        assert_matches!(result, Err(BreakerError::Timeout(_)));
        assert_eq!(breaker.failures(), 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let breaker = breaker(1);

        let _ = breaker.call(future::ready(Err::<u32, _>(Boom))).await;
        assert_eq!(breaker.state(), State::Open);

        breaker.reset();
        assert_eq!(breaker.state(), State::Closed);

        let result = breaker.call(future::ready(Ok::<_, Boom>(1))).await;
        assert_matches!(result, Ok(1));
    }
}
