//! Fixed-interval polling until a remote object reaches a target state

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tfplug::Context;
use tokio::time::Instant;

use super::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("unexpected state '{state}', wanted target '{target}'")]
    UnexpectedState { state: String, target: String },

    #[error("timeout while waiting for state to become '{target}' (last state: '{last_state}', timeout: {timeout:?})")]
    Timeout {
        target: String,
        last_state: String,
        timeout: Duration,
    },

    #[error("couldn't find resource ({0} retries)")]
    NotFound(u32),

    #[error("operation cancelled while waiting for state '{0}'")]
    Cancelled(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Polls `refresh` until it reports one of `target`. `refresh` returns the
/// object and its state, or `None` while the object cannot be found. With no
/// `pending` states any non-target state keeps the wait going.
pub struct StateChangeConf<F> {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub refresh: F,
    pub timeout: Duration,
    pub delay: Duration,
    pub poll_interval: Duration,
    pub continuous_target_occurrence: u32,
    pub not_found_checks: u32,
}

impl<F, Fut> StateChangeConf<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<(Value, String)>, ApiError>>,
{
    pub fn new(refresh: F) -> Self {
        Self {
            pending: Vec::new(),
            target: Vec::new(),
            refresh,
            timeout: Duration::from_secs(300),
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(10),
            continuous_target_occurrence: 1,
            not_found_checks: 20,
        }
    }

    pub fn pending(mut self, states: &[&str]) -> Self {
        self.pending = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn target(mut self, states: &[&str]) -> Self {
        self.target = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn continuous_target_occurrence(mut self, count: u32) -> Self {
        self.continuous_target_occurrence = count.max(1);
        self
    }

    pub async fn wait_for_state(&self, ctx: &Context) -> Result<Value, WaitError> {
        let mut deadline = Instant::now() + self.timeout;
        if let Some(remaining) = ctx.remaining() {
            deadline = deadline.min(Instant::now() + remaining);
        }

        let mut last_state = String::new();
        let mut occurrences = 0;
        let mut not_found = 0;

        self.sleep(ctx, self.delay, deadline, &last_state).await?;

        loop {
            match (self.refresh)().await? {
                None => {
                    occurrences = 0;
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(WaitError::NotFound(not_found - 1));
                    }
                }
                Some((value, state)) => {
                    not_found = 0;
                    tracing::debug!("waiting for {:?}, current state: {}", self.target, state);

                    if self.target.contains(&state) {
                        occurrences += 1;
                        if occurrences >= self.continuous_target_occurrence {
                            return Ok(value);
                        }
                    } else if self.pending.is_empty() || self.pending.contains(&state) {
                        occurrences = 0;
                    } else {
                        return Err(WaitError::UnexpectedState {
                            state,
                            target: self.target.join(", "),
                        });
                    }
                    last_state = state;
                }
            }

            self.sleep(ctx, self.poll_interval, deadline, &last_state)
                .await?;
        }
    }

    async fn sleep(
        &self,
        ctx: &Context,
        duration: Duration,
        deadline: Instant,
        last_state: &str,
    ) -> Result<(), WaitError> {
        let now = Instant::now();
        if now >= deadline {
            return Err(self.timeout_error(last_state));
        }
        let wake = (now + duration).min(deadline);

        tokio::select! {
            _ = tokio::time::sleep_until(wake) => {
                if wake >= deadline && duration > Duration::ZERO {
                    return Err(self.timeout_error(last_state));
                }
                Ok(())
            }
            _ = ctx.cancelled() => {
                if ctx.remaining() == Some(Duration::ZERO) {
                    Err(self.timeout_error(last_state))
                } else {
                    Err(WaitError::Cancelled(self.target.join(", ")))
                }
            }
        }
    }

    fn timeout_error(&self, last_state: &str) -> WaitError {
        WaitError::Timeout {
            target: self.target.join(", "),
            last_state: last_state.to_string(),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sequence(states: &'static [&'static str]) -> (Arc<AtomicUsize>, impl Fn() -> std::future::Ready<Result<Option<(Value, String)>, ApiError>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let refresh = move || {
            let i = counter.fetch_add(1, Ordering::SeqCst);
            let state = states[i.min(states.len() - 1)];
            std::future::ready(Ok(Some((json!({"state": state}), state.to_string()))))
        };
        (calls, refresh)
    }

    #[tokio::test]
    async fn reaches_target_after_pending() {
        let (calls, refresh) = sequence(&["Evaluating", "Evaluating", "Enabled"]);
        let conf = StateChangeConf::new(refresh)
            .pending(&["Evaluating"])
            .target(&["Enabled"])
            .poll_interval(Duration::from_millis(1));

        let value = conf.wait_for_state(&Context::new()).await.unwrap();
        assert_eq!(value["state"], json!("Enabled"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn continuous_target_needs_consecutive_hits() {
        let (calls, refresh) = sequence(&["Disabled", "Disabling", "Disabled", "Disabled"]);
        let conf = StateChangeConf::new(refresh)
            .pending(&["Disabling"])
            .target(&["Disabled"])
            .continuous_target_occurrence(2)
            .poll_interval(Duration::from_millis(1));

        conf.wait_for_state(&Context::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn unexpected_state_is_an_error() {
        let (_, refresh) = sequence(&["Evaluating", "Failed"]);
        let conf = StateChangeConf::new(refresh)
            .pending(&["Evaluating"])
            .target(&["Enabled"])
            .poll_interval(Duration::from_millis(1));

        let err = conf.wait_for_state(&Context::new()).await.unwrap_err();
        assert!(matches!(err, WaitError::UnexpectedState { ref state, .. } if state == "Failed"));
    }

    #[tokio::test]
    async fn without_pending_states_anything_keeps_waiting() {
        let (calls, refresh) = sequence(&["Evaluating", "Disabled", "Enabled"]);
        let conf = StateChangeConf::new(refresh)
            .target(&["Enabled"])
            .poll_interval(Duration::from_millis(1));

        conf.wait_for_state(&Context::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_names_last_state() {
        let (_, refresh) = sequence(&["Evaluating"]);
        let conf = StateChangeConf::new(refresh)
            .pending(&["Evaluating"])
            .target(&["Enabled"])
            .timeout(Duration::from_millis(30))
            .poll_interval(Duration::from_millis(5));

        let err = conf.wait_for_state(&Context::new()).await.unwrap_err();
        assert!(err.to_string().contains("last state: 'Evaluating'"));
    }

    #[tokio::test]
    async fn cancellation_stops_the_wait() {
        let (_, refresh) = sequence(&["Evaluating"]);
        let conf = StateChangeConf::new(refresh)
            .pending(&["Evaluating"])
            .target(&["Enabled"])
            .poll_interval(Duration::from_secs(60));

        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = conf.wait_for_state(&ctx).await.unwrap_err();
        assert!(matches!(err, WaitError::Cancelled(_)));
    }

    #[tokio::test]
    async fn missing_object_exhausts_not_found_checks() {
        let mut conf = StateChangeConf::new(|| std::future::ready(Ok(None)))
            .target(&["Enabled"])
            .poll_interval(Duration::from_millis(1));
        conf.not_found_checks = 2;

        let err = conf.wait_for_state(&Context::new()).await.unwrap_err();
        assert!(matches!(err, WaitError::NotFound(2)));
    }
}
