//! Waiter - polling state machine for eventually consistent resources
//!
//! Control-plane APIs acknowledge a mutation before it has settled: a create
//! returns while the resource is still materializing, a delete returns while
//! it is still visible. Lifecycle handlers express "block until the remote
//! reports one of these statuses" as a [`WaitSpec`] plus a [`Probe`], and get
//! back either the final observation or a typed failure.
//!
//! The waiter runs on the calling task, issues probes strictly sequentially,
//! and suspends only for the optional initial delay and the inter-poll
//! sleeps. Callers reconciling many resources run one wait per resource
//! concurrently; a `WaitSpec` holds no state across calls.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::provider::BoxFuture;

/// Default pacing between probes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of consecutive empty observations tolerated before the
/// resource is considered gone
pub const DEFAULT_NOT_FOUND_TOLERANCE: u32 = 20;

/// One look at the remote resource
///
/// `value` is an opaque snapshot the waiter never interprets. An empty
/// `status` together with a missing `value` means the resource was not
/// observable on this attempt (eventual-consistency lag, or deleted).
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<T> {
    pub value: Option<T>,
    pub status: String,
}

impl<T> Observation<T> {
    /// The resource was seen in the given status
    pub fn observed(value: T, status: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            status: status.into(),
        }
    }

    /// The resource was seen in the given status, but the probe has no
    /// snapshot to report (e.g., the status was inferred from an error code)
    pub fn status_only(status: impl Into<String>) -> Self {
        Self {
            value: None,
            status: status.into(),
        }
    }

    /// The resource could not be seen at all
    pub fn absent() -> Self {
        Self {
            value: None,
            status: String::new(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_none() && self.status.is_empty()
    }
}

/// A probe queries remote state once and classifies what it saw
///
/// Implementations are small structs holding the API client, the identifier
/// of the watched resource, and any bookkeeping the classification needs
/// (e.g., a first-observation timestamp).
pub trait Probe: Send {
    type Value: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Issue one read against the remote system
    fn observe(&mut self) -> BoxFuture<'_, Result<Observation<Self::Value>, Self::Error>>;

    /// Whether a probe failure is expected to clear on its own and should be
    /// retried instead of aborting the wait
    fn is_transient(&self, _err: &Self::Error) -> bool {
        false
    }
}

/// Successful reconciliation: the remote reported a target status
#[derive(Debug)]
pub struct Reached<T> {
    pub value: Option<T>,
    pub status: String,
}

/// Terminal failure of a wait
///
/// Timeout is distinct from the error cases so callers can degrade
/// gracefully, typically with one final out-of-band read.
#[derive(Debug, Error)]
pub enum WaitError<T, E>
where
    T: std::fmt::Debug,
    E: std::error::Error,
{
    /// No target status was reached within the timeout
    #[error("timed out after {elapsed:?} waiting for target status (last observed: {})", .last_status.as_deref().unwrap_or("<none>"))]
    Timeout {
        last_value: Option<T>,
        last_status: Option<String>,
        elapsed: Duration,
    },

    /// The remote reported a status outside both the pending and target sets
    #[error("unexpected status {status:?} while waiting for target status")]
    Unexpected { value: Option<T>, status: String },

    /// Consecutive empty observations exceeded the tolerance. For a wait
    /// that follows a delete this is usually the desired outcome; the
    /// caller decides.
    #[error("resource was not observable for {checks} consecutive probes")]
    Vanished { checks: u32 },

    /// The probe failed and the failure was not classified as transient
    #[error(transparent)]
    Probe(E),
}

impl<T, E> WaitError<T, E>
where
    T: std::fmt::Debug,
    E: std::error::Error,
{
    /// True when the wait ran out of time rather than failing outright
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Configuration for one reconciliation run
///
/// Built fresh per lifecycle operation and discarded once an outcome is
/// produced. Statuses are opaque strings matched by equality; the pending
/// and target sets must be disjoint.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    pending: Vec<String>,
    target: Vec<String>,
    timeout: Duration,
    poll_interval: Duration,
    initial_delay: Option<Duration>,
    not_found_tolerance: u32,
    tolerate_unknown: bool,
}

impl WaitSpec {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Vec::new(),
            target: Vec::new(),
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            initial_delay: None,
            not_found_tolerance: DEFAULT_NOT_FOUND_TOLERANCE,
            tolerate_unknown: false,
        }
    }

    /// Statuses that mean "still in progress, keep polling"
    pub fn pending<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = statuses.into_iter().map(Into::into).collect();
        self
    }

    /// Statuses that mean "reconciliation succeeded, stop polling"
    pub fn target<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Suspend before the first probe, for remotes with a known minimum
    /// propagation lag
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Number of consecutive empty observations to ride out before treating
    /// absence as real
    pub fn not_found_tolerance(mut self, checks: u32) -> Self {
        self.not_found_tolerance = checks;
        self
    }

    /// Keep polling through statuses outside both sets instead of failing
    pub fn tolerate_unknown(mut self) -> Self {
        self.tolerate_unknown = true;
        self
    }

    /// Poll `probe` until it reports a target status, fails permanently, or
    /// the timeout elapses
    ///
    /// The elapsed-time budget starts after the initial delay. Probes are
    /// never issued past the deadline; a slow probe round-trip stretches the
    /// effective poll spacing by that amount.
    pub async fn wait<P>(
        &self,
        probe: &mut P,
    ) -> Result<Reached<P::Value>, WaitError<P::Value, P::Error>>
    where
        P: Probe,
        P::Value: std::fmt::Debug,
    {
        debug_assert!(!self.timeout.is_zero(), "timeout must be positive");
        debug_assert!(!self.poll_interval.is_zero(), "poll interval must be positive");
        debug_assert!(
            self.pending.iter().all(|status| !self.target.contains(status)),
            "pending and target statuses must be disjoint"
        );

        if let Some(delay) = self.initial_delay {
            sleep(delay).await;
        }

        let started = Instant::now();
        let mut consecutive_absent: u32 = 0;
        let mut last_value: Option<P::Value> = None;
        let mut last_status: Option<String> = None;

        loop {
            match probe.observe().await {
                Ok(observation) if observation.is_absent() => {
                    consecutive_absent += 1;
                    if consecutive_absent > self.not_found_tolerance {
                        return Err(WaitError::Vanished {
                            checks: consecutive_absent,
                        });
                    }
                }
                Ok(observation) => {
                    consecutive_absent = 0;
                    let Observation { value, status } = observation;
                    if self.target.iter().any(|t| *t == status) {
                        return Ok(Reached { value, status });
                    }
                    if !self.pending.iter().any(|p| *p == status) && !self.tolerate_unknown {
                        return Err(WaitError::Unexpected { value, status });
                    }
                    last_value = value;
                    last_status = Some(status);
                }
                Err(err) if probe.is_transient(&err) => {}
                Err(err) => return Err(WaitError::Probe(err)),
            }

            let elapsed = started.elapsed();
            let remaining = self.timeout.saturating_sub(elapsed);
            if remaining.is_zero() {
                return Err(WaitError::Timeout {
                    last_value,
                    last_status,
                    elapsed,
                });
            }
            sleep(self.poll_interval.min(remaining)).await;
            if started.elapsed() >= self.timeout {
                return Err(WaitError::Timeout {
                    last_value,
                    last_status,
                    elapsed: started.elapsed(),
                });
            }
        }
    }
}
