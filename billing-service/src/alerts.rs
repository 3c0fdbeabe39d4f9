//! Deduplication of job failure alerts.

use std::{collections::HashMap, time::Duration};

use time::OffsetDateTime;

/// What the caller should do after reporting a job outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// Raise a failure alert.
    Notify,
    /// Same failure already alerted within the cooldown.
    Suppress,
    /// A previously failing job is healthy again.
    Recovered,
    /// Nothing to report.
    Quiet,
}

#[derive(Debug, Clone)]
struct FailureState {
    fingerprint: blake3::Hash,
    last_sent: OffsetDateTime,
}

/// Per-job failure memory.
///
/// A failure is alerted when it differs from the job's previous failure or the
/// cooldown since the last alert has elapsed.
#[derive(Debug)]
pub struct AlertTracker {
    cooldown: Duration,
    failing: HashMap<String, FailureState>,
}

impl AlertTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            failing: HashMap::new(),
        }
    }

    pub fn record_failure(&mut self, job: &str, message: &str, now: OffsetDateTime) -> AlertDecision {
        let fingerprint = blake3::hash(message.as_bytes());
        let cooldown = self.cooldown;

        match self.failing.get_mut(job) {
            Some(state)
                if state.fingerprint == fingerprint
                    && (now - state.last_sent).unsigned_abs() < cooldown =>
            {
                AlertDecision::Suppress
            }
            Some(state) => {
                state.fingerprint = fingerprint;
                state.last_sent = now;
                AlertDecision::Notify
            }
            None => {
                self.failing.insert(
                    job.to_string(),
                    FailureState {
                        fingerprint,
                        last_sent: now,
                    },
                );
                AlertDecision::Notify
            }
        }
    }

    pub fn record_success(&mut self, job: &str) -> AlertDecision {
        if self.failing.remove(job).is_some() {
            AlertDecision::Recovered
        } else {
            AlertDecision::Quiet
        }
    }

    /// Report the outcome through tracing and metrics, deduplicated.
    pub fn report<T, E: std::fmt::Display>(
        &mut self,
        job: &'static str,
        outcome: &Result<T, E>,
        now: OffsetDateTime,
    ) -> AlertDecision {
        match outcome {
            Ok(_) => {
                let decision = self.record_success(job);
                if decision == AlertDecision::Recovered {
                    tracing::info!(job, "job recovered");
                }
                decision
            }
            Err(e) => {
                metrics::counter!("job_failures_total", "job" => job).increment(1);
                let message = e.to_string();
                let decision = self.record_failure(job, &message, now);
                match decision {
                    AlertDecision::Notify => tracing::error!(job, error = %message, "job failed"),
                    _ => tracing::debug!(job, error = %message, "job still failing, alert suppressed"),
                }
                decision
            }
        }
    }
}
