//! The logic thread and its deferred call queue.

use super::LogicThreadConfig;
use crate::errors::{current_thread_label, ContextCallError, InvocationError, Result};
use crate::reporting::{ErrorReporter, LoggingErrorReporter};
use parking_lot::Mutex;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use tokio::sync::Notify;
use tracing::{debug, error, trace, warn};

/// A deferred zero-argument call.
pub type PendingCall = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static BOUND_LOGIC_THREAD: RefCell<Option<LogicThread>> = const { RefCell::new(None) };
}

/// Counters describing a logic thread's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogicStats {
    /// Logic thread name.
    pub name: String,
    /// Number of drain cycles run.
    pub cycles: u64,
    /// Number of calls run.
    pub calls_run: u64,
    /// Number of calls waiting for a cycle.
    pub pending: usize,
}

struct LogicInner {
    config: LogicThreadConfig,
    owner: ThreadId,
    queue: Mutex<VecDeque<PendingCall>>,
    shutdown: AtomicBool,
    wake: Notify,
    reporter: Arc<dyn ErrorReporter>,
    cycles: AtomicU64,
    calls_run: AtomicU64,
}

/// Handle to the designated logic thread.
///
/// The thread that binds a `LogicThread` owns it: only that thread may drain
/// the queue, and only code running on it sees the handle through
/// [`LogicThread::current`]. Handles are cheap to clone and may be sent to
/// other threads, which can enqueue work with [`LogicThread::push_call`].
#[derive(Clone)]
pub struct LogicThread {
    inner: Arc<LogicInner>,
}

/// Builder for binding or spawning a logic thread.
#[derive(Default)]
pub struct LogicThreadBuilder {
    config: LogicThreadConfig,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl LogicThreadBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: LogicThreadConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the reporter that receives call failures.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Binds the calling thread as the logic thread.
    pub fn bind(self) -> Result<LogicThread> {
        self.config.validate()?;
        BOUND_LOGIC_THREAD.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_some() {
                return Err(ContextCallError::AlreadyBound {
                    thread: current_thread_label(),
                });
            }
            let logic = LogicThread {
                inner: Arc::new(LogicInner {
                    config: self.config,
                    owner: std::thread::current().id(),
                    queue: Mutex::new(VecDeque::new()),
                    shutdown: AtomicBool::new(false),
                    wake: Notify::new(),
                    reporter: self
                        .reporter
                        .unwrap_or_else(|| Arc::new(LoggingErrorReporter)),
                    cycles: AtomicU64::new(0),
                    calls_run: AtomicU64::new(0),
                }),
            };
            debug!(logic_thread = %logic.name(), thread = %current_thread_label(), "Logic thread bound");
            *slot = Some(logic.clone());
            Ok(logic)
        })
    }

    /// Spawns a dedicated OS thread, binds it as the logic thread, and drives
    /// it with a current-thread tokio runtime until shutdown.
    ///
    /// Blocks only until the new thread is bound, so it may be called from
    /// inside a tokio runtime.
    pub fn spawn(self) -> Result<(LogicThread, std::thread::JoinHandle<Result<()>>)> {
        let name = self.config.name.clone();
        let (tx, rx) = std::sync::mpsc::sync_channel::<Result<LogicThread>>(1);
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || -> Result<()> {
                let started = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(ContextCallError::from)
                    .and_then(|runtime| Ok((runtime, self.bind()?)));
                let (runtime, logic) = match started {
                    Ok(started) => started,
                    Err(err) => {
                        let _ = tx.send(Err(err));
                        return Ok(());
                    }
                };
                if tx.send(Ok(logic.clone())).is_err() {
                    LogicThread::unbind_current();
                    return Ok(());
                }
                let result = runtime.block_on(logic.run_until_shutdown());
                LogicThread::unbind_current();
                result
            })?;
        // A closed channel means the thread died before reporting.
        let logic = rx
            .recv()
            .map_err(|_| ContextCallError::Shutdown { name })??;
        Ok((logic, handle))
    }
}

impl LogicThread {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> LogicThreadBuilder {
        LogicThreadBuilder::new()
    }

    /// Binds the calling thread as the logic thread with `config`.
    pub fn bind_current(config: LogicThreadConfig) -> Result<Self> {
        Self::builder().config(config).bind()
    }

    /// Returns the logic thread bound to the calling thread, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        BOUND_LOGIC_THREAD.with(|slot| slot.borrow().clone())
    }

    /// Returns the logic thread bound to the calling thread, or a
    /// thread-affinity error naming `operation`.
    pub fn require_current(operation: &'static str) -> Result<Self> {
        Self::current().ok_or_else(|| {
            let err = ContextCallError::not_logic_thread(operation);
            error!(operation, error = %err, "Logic thread affinity violated");
            err
        })
    }

    /// Releases the calling thread's binding, if any.
    pub fn unbind_current() -> Option<Self> {
        BOUND_LOGIC_THREAD.with(|slot| slot.borrow_mut().take())
    }

    /// Returns the configured name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LogicThreadConfig {
        &self.inner.config
    }

    /// Returns the reporter that receives call failures.
    #[must_use]
    pub fn reporter(&self) -> &Arc<dyn ErrorReporter> {
        &self.inner.reporter
    }

    /// Returns true if the calling thread is this logic thread.
    #[must_use]
    pub fn is_logic_thread(&self) -> bool {
        std::thread::current().id() == self.inner.owner
    }

    /// Queues `call` to run on an upcoming cycle. Callable from any thread.
    pub fn push_call<F>(&self, call: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_shutdown() {
            warn!(logic_thread = %self.name(), "Dropping call pushed after shutdown");
            return Err(ContextCallError::Shutdown {
                name: self.name().to_string(),
            });
        }
        self.inner.queue.lock().push_back(Box::new(call));
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Returns the number of queued calls.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Runs one cycle: the calls queued before this method was entered, in
    /// submission order. Calls queued while the cycle runs wait for the next
    /// cycle. Returns how many calls ran.
    pub fn run_pending_calls(&self) -> Result<usize> {
        if !self.is_logic_thread() {
            return Err(ContextCallError::not_logic_thread(
                "LogicThread::run_pending_calls",
            ));
        }

        let batch: Vec<PendingCall> = {
            let mut queue = self.inner.queue.lock();
            let count = self
                .inner
                .config
                .max_calls_per_cycle
                .map_or(queue.len(), |max| max.min(queue.len()));
            queue.drain(..count).collect()
        };
        self.inner.cycles.fetch_add(1, Ordering::Relaxed);

        let mut ran = 0;
        for call in batch {
            if self.is_shutdown() {
                break;
            }
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(call)) {
                warn!(
                    logic_thread = %self.name(),
                    error = %InvocationError::from_panic(panic.as_ref()),
                    "Pending call panicked"
                );
            }
            ran += 1;
        }
        self.inner.calls_run.fetch_add(ran as u64, Ordering::Relaxed);
        trace!(logic_thread = %self.name(), ran, "Logic cycle complete");
        Ok(ran)
    }

    /// Drains the queue each time work arrives, until [`LogicThread::shutdown`].
    ///
    /// Must be polled on the logic thread, e.g. from a current-thread tokio
    /// runtime.
    pub async fn run_until_shutdown(&self) -> Result<()> {
        if !self.is_logic_thread() {
            return Err(ContextCallError::not_logic_thread(
                "LogicThread::run_until_shutdown",
            ));
        }
        while !self.is_shutdown() {
            if self.pending_calls() == 0 {
                self.inner.wake.notified().await;
                continue;
            }
            self.run_pending_calls()?;
            tokio::task::yield_now().await;
        }
        debug!(logic_thread = %self.name(), "Logic loop stopped");
        Ok(())
    }

    /// Stops accepting calls and drops everything still queued.
    pub fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped: Vec<PendingCall> = self.inner.queue.lock().drain(..).collect();
        debug!(
            logic_thread = %self.name(),
            dropped = dropped.len(),
            "Logic thread shut down"
        );
        drop(dropped);
        self.inner.wake.notify_one();
    }

    /// Returns true once shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// Returns activity counters.
    #[must_use]
    pub fn stats(&self) -> LogicStats {
        LogicStats {
            name: self.name().to_string(),
            cycles: self.inner.cycles.load(Ordering::Relaxed),
            calls_run: self.inner.calls_run.load(Ordering::Relaxed),
            pending: self.pending_calls(),
        }
    }
}

impl std::fmt::Debug for LogicThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicThread")
            .field("name", &self.name())
            .field("pending", &self.pending_calls())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl std::fmt::Debug for LogicThreadBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicThreadBuilder")
            .field("config", &self.config)
            .field("has_reporter", &self.reporter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio_test::{assert_pending, assert_ready_ok};

    fn bind() -> LogicThread {
        LogicThread::bind_current(LogicThreadConfig::default()).unwrap()
    }

    #[test]
    fn test_bind_and_current() {
        assert!(LogicThread::current().is_none());
        let logic = bind();
        assert!(logic.is_logic_thread());
        assert_eq!(LogicThread::current().unwrap().name(), "logic");

        let again = LogicThread::bind_current(LogicThreadConfig::default());
        assert!(matches!(again, Err(ContextCallError::AlreadyBound { .. })));

        LogicThread::unbind_current();
        assert!(LogicThread::current().is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = LogicThread::bind_current(LogicThreadConfig::new().with_max_calls_per_cycle(0));
        assert!(matches!(result, Err(ContextCallError::Config(_))));
        assert!(LogicThread::current().is_none());
    }

    #[test]
    fn test_require_current_off_logic_thread() {
        let err = LogicThread::require_current("test op").unwrap_err();
        assert!(err.is_thread_violation());
    }

    #[test]
    fn test_calls_run_in_fifo_order() {
        let logic = bind();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            logic.push_call(move || order.lock().push(i)).unwrap();
        }
        assert_eq!(logic.pending_calls(), 5);
        assert_eq!(logic.run_pending_calls().unwrap(), 5);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_calls_pushed_during_cycle_wait_for_next_cycle() {
        let logic = bind();
        let counter = Arc::new(AtomicUsize::new(0));
        let inner_logic = logic.clone();
        let inner_counter = counter.clone();
        logic
            .push_call(move || {
                let counter = inner_counter.clone();
                inner_logic
                    .push_call(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            })
            .unwrap();

        assert_eq!(logic.run_pending_calls().unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(logic.run_pending_calls().unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_max_calls_per_cycle() {
        let logic =
            LogicThread::bind_current(LogicThreadConfig::new().with_max_calls_per_cycle(2)).unwrap();
        for _ in 0..5 {
            logic.push_call(|| {}).unwrap();
        }
        assert_eq!(logic.run_pending_calls().unwrap(), 2);
        assert_eq!(logic.run_pending_calls().unwrap(), 2);
        assert_eq!(logic.run_pending_calls().unwrap(), 1);
        assert_eq!(logic.stats().calls_run, 5);
        assert_eq!(logic.stats().cycles, 3);
    }

    #[test]
    fn test_panicking_call_does_not_stop_cycle() {
        let logic = bind();
        let counter = Arc::new(AtomicUsize::new(0));
        logic.push_call(|| panic!("bad call")).unwrap();
        let c = counter.clone();
        logic
            .push_call(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(logic.run_pending_calls().unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_push_from_other_thread_and_drain_off_thread_fails() {
        let logic = bind();
        let remote = logic.clone();
        std::thread::spawn(move || {
            remote.push_call(|| {}).unwrap();
            assert!(!remote.is_logic_thread());
            assert!(remote.run_pending_calls().unwrap_err().is_thread_violation());
            assert!(LogicThread::current().is_none());
        })
        .join()
        .unwrap();
        assert_eq!(logic.run_pending_calls().unwrap(), 1);
    }

    #[test]
    fn test_shutdown_drops_pending_and_rejects_new_calls() {
        let logic = bind();
        let token = Arc::new(());
        let held = token.clone();
        logic.push_call(move || drop(held)).unwrap();
        assert_eq!(Arc::strong_count(&token), 2);

        logic.shutdown();
        assert!(logic.is_shutdown());
        assert_eq!(Arc::strong_count(&token), 1);
        assert!(matches!(
            logic.push_call(|| {}),
            Err(ContextCallError::Shutdown { .. })
        ));
        assert_eq!(logic.run_pending_calls().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_until_shutdown_drains_remote_pushes() {
        let logic = bind();
        let counter = Arc::new(AtomicUsize::new(0));
        let remote = logic.clone();
        let remote_counter = counter.clone();
        let producer = std::thread::spawn(move || {
            for _ in 0..3 {
                let c = remote_counter.clone();
                remote
                    .push_call(move || {
                        c.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
            let stopper = remote.clone();
            remote.push_call(move || stopper.shutdown()).unwrap();
        });

        logic.run_until_shutdown().await.unwrap();
        producer.join().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_spawned_logic_thread() {
        let (logic, handle) = LogicThread::builder()
            .config(LogicThreadConfig::new().with_name("spawned-logic"))
            .spawn()
            .unwrap();
        assert!(!logic.is_logic_thread());

        let (tx, rx) = std::sync::mpsc::channel();
        logic
            .push_call(move || {
                let name = std::thread::current().name().map(String::from);
                let bound = LogicThread::current().is_some();
                tx.send((name, bound)).unwrap();
            })
            .unwrap();
        let (name, bound) = rx.recv().unwrap();
        assert_eq!(name.as_deref(), Some("spawned-logic"));
        assert!(bound);

        logic.shutdown();
        handle.join().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_spawn_from_inside_runtime() {
        let (logic, handle) = LogicThread::builder()
            .config(LogicThreadConfig::new().with_name("runtime-spawned"))
            .spawn()
            .unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel();
        logic
            .push_call(move || {
                let _ = tx.send(LogicThread::current().map(|l| l.name().to_string()));
            })
            .unwrap();
        assert_eq!(rx.await.unwrap().as_deref(), Some("runtime-spawned"));

        logic.shutdown();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_spawn_reports_bind_failure() {
        let result = LogicThread::builder()
            .config(LogicThreadConfig::new().with_max_calls_per_cycle(0))
            .spawn();
        assert!(matches!(result, Err(ContextCallError::Config(_))));
    }

    #[test]
    fn test_run_until_shutdown_waits_for_work() {
        let logic = bind();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut run = tokio_test::task::spawn(logic.run_until_shutdown());
        assert_pending!(run.poll());

        let c = counter.clone();
        logic
            .push_call(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(run.is_woken());
        assert_pending!(run.poll());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        logic.shutdown();
        assert_ready_ok!(run.poll());
    }

    #[test]
    fn test_run_until_shutdown_off_logic_thread() {
        let logic = bind();
        let remote = logic.clone();
        let err = std::thread::spawn(move || tokio_test::block_on(remote.run_until_shutdown()))
            .join()
            .unwrap()
            .unwrap_err();
        assert!(err.is_thread_violation());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_panic_message_is_logged_as_text() {
        let logic = bind();
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        logic.push_call(|| panic!("bad call")).unwrap();
        tracing::subscriber::with_default(subscriber, || logic.run_pending_calls().unwrap());

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        assert!(output.contains("Pending call panicked"), "{output}");
        assert!(output.contains("panic: bad call"), "{output}");
        assert!(!output.contains("Any"), "{output}");
    }
}
