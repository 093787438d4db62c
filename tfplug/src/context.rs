//! Context implementation for request-scoped data and cancellation
//!
//! A Context carries a cancellation signal, an optional deadline and
//! request-scoped values. Children created with `with_timeout` observe their
//! parent's cancellation, so stopping the provider also interrupts any
//! long-running wait inside a resource operation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::time;

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    parent: Option<Context>,
    deadline: Option<Instant>,
    values: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
    done_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        Self::build(None, None)
    }

    fn build(parent: Option<Context>, deadline: Option<Instant>) -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                parent,
                deadline,
                values: RwLock::new(HashMap::new()),
                done_rx,
                done_tx,
            }),
        }
    }

    /// Child context cancelled when the timeout elapses or the parent is cancelled.
    /// The child's deadline never extends past the parent's.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut deadline = Instant::now() + timeout;
        if let Some(parent_deadline) = self.deadline() {
            deadline = deadline.min(parent_deadline);
        }

        let child = Self::build(Some(self.clone()), Some(deadline));
        if self.is_cancelled() {
            child.cancel();
            return child;
        }

        let parent = self.clone();
        let tx = child.inner.done_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline.into()) => {
                    let _ = tx.send(true);
                }
                _ = parent.cancelled() => {
                    let _ = tx.send(true);
                }
                _ = tx.closed() => {}
            }
        });

        child
    }

    pub async fn with_value<T: Send + Sync + 'static>(self, key: &str, value: T) -> Self {
        let mut values = self.inner.values.write().await;
        values.insert(key.to_string(), Box::new(value));
        drop(values);
        self
    }

    /// Looks up a value here, then in ancestors
    pub async fn get_value<T>(&self, key: &str) -> Option<T>
    where
        T: Send + Sync + Clone + 'static,
    {
        let mut current = Some(self);
        while let Some(ctx) = current {
            let values = ctx.inner.values.read().await;
            if let Some(v) = values.get(key).and_then(|v| v.downcast_ref::<T>()) {
                return Some(v.clone());
            }
            drop(values);
            current = ctx.inner.parent.as_ref();
        }
        None
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done_rx.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, None when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.inner.done_rx.clone();
        if rx.wait_for(|done| *done).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done_rx.clone()
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_stores_and_retrieves_values() {
        let ctx = Context::new();
        let ctx = ctx.with_value("region", "cn-north-4".to_string()).await;

        let value: Option<String> = ctx.get_value("region").await;
        assert_eq!(value, Some("cn-north-4".to_string()));
    }

    #[tokio::test]
    async fn child_sees_parent_values() {
        let parent = Context::new().with_value("request_id", 7u32).await;
        let child = parent.with_timeout(Duration::from_secs(5));

        assert_eq!(child.get_value::<u32>("request_id").await, Some(7));
    }

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));

        assert!(!ctx.is_cancelled());
        sleep(Duration::from_millis(120)).await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn parent_cancel_propagates_to_child() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(60));

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("child should observe parent cancellation");
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn child_deadline_is_capped_by_parent() {
        let parent = Context::new().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(600));

        assert!(child.remaining().unwrap() <= Duration::from_secs(1));
        assert!(Context::new().remaining().is_none());
    }
}
