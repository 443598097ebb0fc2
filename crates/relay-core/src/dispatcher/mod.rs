//! Request dispatcher: hands a request to the executor hook and waits for its result.
//! - Mints a token and registers its slot.
//! - Emits [`EXECUTE_EVENT`] to the hook.
//! - Races the delivered result against the timeout and server shutdown.
//! - Removes the token on every exit path, including when the caller drops the future.
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use relay_model::{EXECUTE_EVENT, ExecutionRequest, Outcome, RequestToken};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::{
    error::DispatchError,
    metrics::{DispatchOutcome, MetricsHandle, noop_metrics},
    registry::CorrelationRegistry,
};

/// Dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How long a request waits for its script result.
    pub timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl DispatchConfig {
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Notification seam towards the external script executor.
///
/// `emit` must not block: the executor is expected to queue the job on its own
/// event loop and report back through [`crate::ResultSink`].
pub trait EventHook: Send + Sync + 'static {
    fn emit(&self, event: &'static str, request: ExecutionRequest);
}

impl<F> EventHook for F
where
    F: Fn(&'static str, ExecutionRequest) + Send + Sync + 'static,
{
    fn emit(&self, event: &'static str, request: ExecutionRequest) {
        self(event, request)
    }
}

/// Shared handle to an executor hook.
pub type HookRef = Arc<dyn EventHook>;

pub struct Dispatcher {
    registry: CorrelationRegistry,
    config: DispatchConfig,
    metrics: MetricsHandle,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(registry: CorrelationRegistry, config: DispatchConfig) -> Self {
        Self {
            registry,
            config,
            metrics: noop_metrics(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Waiters resolve to [`DispatchError::Stopped`] once `shutdown` is cancelled.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    /// Run `script_id` with `content` through `hook` and wait for the result.
    ///
    /// `hook == None` means the executor subsystem is not initialized: the call fails
    /// with [`DispatchError::ExecutorUnavailable`] without waiting.
    #[instrument(level = "debug", skip(self, content, hook))]
    pub async fn dispatch(
        &self,
        script_id: &str,
        content: String,
        hook: Option<&dyn EventHook>,
    ) -> Result<Outcome, DispatchError> {
        let started = Instant::now();
        self.metrics.record_dispatched();

        let result = self.run(script_id, content, hook).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        self.metrics
            .record_completed(DispatchOutcome::of(&result), duration_ms);
        result
    }

    async fn run(
        &self,
        script_id: &str,
        content: String,
        hook: Option<&dyn EventHook>,
    ) -> Result<Outcome, DispatchError> {
        let token = self.registry.register();
        let _guard = SlotGuard {
            registry: &self.registry,
            token: token.clone(),
        };
        let Some(mut slot) = self.registry.take(&token) else {
            return Err(self.slot_lost());
        };

        let Some(hook) = hook else {
            warn!(%token, "no executor hook configured");
            return Err(DispatchError::ExecutorUnavailable);
        };

        hook.emit(
            EXECUTE_EVENT,
            ExecutionRequest {
                token: token.clone(),
                script_id: script_id.to_string(),
                content,
            },
        );
        debug!(%token, "execution requested, waiting for result");

        let timeout = self.config.timeout();
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(DispatchError::Stopped),
            received = slot.recv() => received.ok_or_else(|| self.slot_lost()),
            _ = tokio::time::sleep(timeout) => {
                debug!(%token, ?timeout, "gave up waiting for result");
                Err(DispatchError::Timeout(timeout))
            }
        }
    }

    /// A slot closed by `stop` reports [`DispatchError::Stopped`], one closed by the
    /// sweeper [`DispatchError::Expired`].
    fn slot_lost(&self) -> DispatchError {
        if self.shutdown.is_cancelled() {
            DispatchError::Stopped
        } else {
            DispatchError::Expired
        }
    }
}

/// Removes the token when the dispatch ends or its future is dropped.
struct SlotGuard<'a> {
    registry: &'a CorrelationRegistry,
    token: RequestToken,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.token);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::sink::ResultSink;

    /// Hook that answers on a spawned task, like a host event loop would.
    fn uppercase_hook(sink: ResultSink) -> impl EventHook {
        move |event: &'static str, req: ExecutionRequest| {
            assert_eq!(event, EXECUTE_EVENT);
            let sink = sink.clone();
            tokio::spawn(async move {
                sink.deliver(&req.token, Outcome::success(req.content.to_uppercase()));
            });
        }
    }

    fn silent_hook(seen: Arc<Mutex<Vec<ExecutionRequest>>>) -> impl EventHook {
        move |_: &'static str, req: ExecutionRequest| {
            seen.lock().unwrap().push(req);
        }
    }

    fn dispatcher(timeout_ms: u64) -> Dispatcher {
        Dispatcher::new(CorrelationRegistry::new(), DispatchConfig { timeout_ms })
    }

    #[test]
    fn default_timeout_is_thirty_seconds() {
        assert_eq!(DispatchConfig::default().timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn returns_delivered_outcome_and_cleans_up() {
        let d = dispatcher(5_000);
        let hook = uppercase_hook(ResultSink::new(d.registry().clone()));

        let outcome = d.dispatch("script_1", "hello".into(), Some(&hook)).await;

        assert_eq!(outcome, Ok(Outcome::success("HELLO")));
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn script_error_is_passed_through() {
        let d = dispatcher(5_000);
        let sink = ResultSink::new(d.registry().clone());
        let hook = move |_: &'static str, req: ExecutionRequest| {
            sink.deliver(&req.token, Outcome::error("ReferenceError: x is not defined"));
        };

        let outcome = d.dispatch("script_1", String::new(), Some(&hook)).await;

        assert_eq!(
            outcome,
            Ok(Outcome::error("ReferenceError: x is not defined"))
        );
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn hook_receives_token_script_and_content() {
        let d = dispatcher(10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook = silent_hook(Arc::clone(&seen));

        let _ = d.dispatch("script_42", "payload".into(), Some(&hook)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].script_id, "script_42");
        assert_eq!(seen[0].content, "payload");
        assert!(seen[0].token.issued_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_default_deadline_and_cleans_up() {
        let d = Dispatcher::new(CorrelationRegistry::new(), DispatchConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook = silent_hook(Arc::clone(&seen));

        let started = tokio::time::Instant::now();
        let outcome = d.dispatch("script_1", "test".into(), Some(&hook)).await;

        assert_eq!(
            outcome,
            Err(DispatchError::Timeout(Duration::from_secs(30)))
        );
        assert!(started.elapsed() >= Duration::from_secs(30));
        let token = seen.lock().unwrap()[0].token.clone();
        assert!(!d.registry().contains(&token));
    }

    #[tokio::test]
    async fn late_delivery_after_timeout_is_dropped() {
        let d = dispatcher(10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook = silent_hook(Arc::clone(&seen));

        let outcome = d.dispatch("script_1", "x".into(), Some(&hook)).await;
        assert!(matches!(outcome, Err(DispatchError::Timeout(_))));

        let token = seen.lock().unwrap()[0].token.clone();
        let sink = ResultSink::new(d.registry().clone());
        assert!(!sink.deliver(&token, Outcome::success("too late")));
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn missing_hook_fails_fast_without_leaking() {
        let d = dispatcher(30_000);

        let outcome = d.dispatch("script_1", "x".into(), None).await;

        assert_eq!(outcome, Err(DispatchError::ExecutorUnavailable));
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn shutdown_wakes_waiter() {
        let shutdown = CancellationToken::new();
        let d = Arc::new(dispatcher(30_000).with_shutdown(shutdown.clone()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let waiter = {
            let d = Arc::clone(&d);
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let hook = silent_hook(seen);
                d.dispatch("script_1", "x".into(), Some(&hook)).await
            })
        };
        while d.registry().is_empty() {
            tokio::task::yield_now().await;
        }
        shutdown.cancel();
        d.registry().close_all();

        assert_eq!(waiter.await.unwrap(), Err(DispatchError::Stopped));
        assert!(d.registry().is_empty());
    }

    #[test]
    fn lost_slot_after_shutdown_is_stopped() {
        let shutdown = CancellationToken::new();
        let d = dispatcher(30_000).with_shutdown(shutdown.clone());
        assert_eq!(d.slot_lost(), DispatchError::Expired);

        shutdown.cancel();
        assert_eq!(d.slot_lost(), DispatchError::Stopped);
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_is_stopped() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let d = dispatcher(30_000).with_shutdown(shutdown);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook = silent_hook(Arc::clone(&seen));

        let outcome = d.dispatch("script_1", "x".into(), Some(&hook)).await;

        assert_eq!(outcome, Err(DispatchError::Stopped));
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn swept_slot_resolves_to_expired() {
        let d = Arc::new(dispatcher(30_000));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let waiter = {
            let d = Arc::clone(&d);
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let hook = silent_hook(seen);
                d.dispatch("script_1", "x".into(), Some(&hook)).await
            })
        };
        while d.registry().is_empty() {
            tokio::task::yield_now().await;
        }
        d.registry().sweep_expired_at(60, u64::MAX);

        assert_eq!(waiter.await.unwrap(), Err(DispatchError::Expired));
    }

    #[tokio::test]
    async fn dropped_dispatch_releases_slot() {
        let d = Arc::new(dispatcher(30_000));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let waiter = {
            let d = Arc::clone(&d);
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let hook = silent_hook(seen);
                d.dispatch("script_1", "x".into(), Some(&hook)).await
            })
        };
        while d.registry().is_empty() {
            tokio::task::yield_now().await;
        }
        waiter.abort();
        let _ = waiter.await;

        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn concurrent_dispatches_get_their_own_results() {
        let d = Arc::new(dispatcher(5_000));
        let sink = ResultSink::new(d.registry().clone());

        let calls: Vec<_> = (0..32)
            .map(|i| {
                let d = Arc::clone(&d);
                let hook = uppercase_hook(sink.clone());
                tokio::spawn(async move {
                    let content = format!("msg-{i}");
                    let outcome = d.dispatch("script_1", content.clone(), Some(&hook)).await;
                    (content, outcome)
                })
            })
            .collect();

        for call in calls {
            let (content, outcome) = call.await.unwrap();
            assert_eq!(outcome, Ok(Outcome::success(content.to_uppercase())));
        }
        assert!(d.registry().is_empty());
    }
}
