//! Callables bundled with the context they were created in.

use super::tracker::{self, ActiveCallFrame};
use super::CallSite;
use crate::callable::{CallArgs, Callable, CallableRef, FnCallable};
use crate::context::{ContextSnapshot, ScopedContext};
use crate::errors::{InvocationError, Result};
use crate::observability::SpanTimer;
use crate::reporting::CallFailureReport;
use crate::scheduler::LogicThread;
use chrono::{DateTime, Utc};
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// What a call to [`ContextCall::run`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The callable ran and returned successfully.
    Completed,
    /// The callable raised; the failure was reported and contained.
    Failed,
    /// The call was marked dead; nothing ran.
    Dead,
    /// There was no callable, or it could no longer be resolved.
    Missing,
}

#[derive(Debug, Clone, Copy)]
enum Retention {
    Strong,
    Weak,
}

/// A callable plus the ambient context that was active when it was created.
///
/// Running the call reinstalls that context for the duration of the
/// invocation and restores whatever was active afterwards. Calls are always
/// handled through `Arc<ContextCall>`; scheduling takes either an owning or
/// a non-owning reference to the call.
pub struct ContextCall {
    id: Uuid,
    callable: Option<CallableRef>,
    context: ContextSnapshot,
    site: Option<CallSite>,
    created_at: DateTime<Utc>,
    dead: AtomicBool,
    self_ref: Weak<ContextCall>,
}

impl ContextCall {
    fn build(callable: Option<CallableRef>, site: Option<CallSite>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            id: Uuid::new_v4(),
            callable,
            context: ContextSnapshot::current(),
            site,
            created_at: Utc::now(),
            dead: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        })
    }

    /// Creates a call with no callable. Running it does nothing.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Self::build(None, None)
    }

    /// Wraps `callable`, capturing the current context and creation site.
    #[must_use]
    #[track_caller]
    pub fn new<C: Callable + 'static>(callable: C) -> Arc<Self> {
        Self::from_ref(Arc::new(callable))
    }

    /// Wraps a shared callable, capturing the current context and creation
    /// site.
    #[must_use]
    #[track_caller]
    pub fn from_ref(callable: CallableRef) -> Arc<Self> {
        Self::with_site(callable, CallSite::capture(Location::caller()))
    }

    /// Wraps a shared callable with a creation site the host already knows,
    /// capturing the current context. No site probe is consulted.
    #[must_use]
    pub fn with_site(callable: CallableRef, site: Option<CallSite>) -> Arc<Self> {
        let call = Self::build(Some(callable), site);
        trace!(
            call_id = %call.id,
            site = ?call.site,
            context = %call.context,
            "ContextCall created"
        );
        call
    }

    /// Wraps a closure.
    #[must_use]
    #[track_caller]
    pub fn from_fn<F>(func: F) -> Arc<Self>
    where
        F: Fn(Option<&CallArgs>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(FnCallable::new(func))
    }

    /// Returns the call currently running on this thread, if any.
    #[must_use]
    pub fn current() -> Option<Arc<Self>> {
        tracker::current_call()
    }

    /// Returns the unique id of this call.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the wrapped callable.
    #[must_use]
    pub fn callable(&self) -> Option<&CallableRef> {
        self.callable.as_ref()
    }

    /// Returns the context captured at creation.
    #[must_use]
    pub fn context(&self) -> &ContextSnapshot {
        &self.context
    }

    /// Returns where the call was created, if known.
    #[must_use]
    pub fn call_site(&self) -> Option<&CallSite> {
        self.site.as_ref()
    }

    /// Returns when the call was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if the call holds a callable that can still be invoked.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.callable.as_ref().is_some_and(|c| c.is_resolvable())
    }

    /// Returns true once [`ContextCall::mark_dead`] has been called.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    /// Permanently disables the call. Later runs do nothing.
    ///
    /// The callable itself is released only when the last reference to the
    /// call goes away.
    pub fn mark_dead(&self) {
        if !self.dead.swap(true, Ordering::SeqCst) {
            debug!(call_id = %self.id, "ContextCall marked dead");
        }
    }

    /// Describes the call for logs and error reports.
    #[must_use]
    pub fn description(&self) -> String {
        let id = self.id.simple().to_string();
        let site = self
            .site
            .as_ref()
            .map_or_else(|| "unknown location".to_string(), ToString::to_string);
        let dead = if self.is_dead() { " (dead)" } else { "" };
        format!("<ContextCall {} from {site}{dead}>", &id[..8])
    }

    /// Describes the call together with its captured context and the
    /// context active right now.
    #[must_use]
    pub fn context_report(&self) -> String {
        let site = self
            .site
            .as_ref()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
        format!(
            "  call: {}\n  created at: {site}\n  context: {}\n  active context: {}\n",
            self.description(),
            self.context,
            ContextSnapshot::current()
        )
    }

    /// Runs the call now with no arguments.
    ///
    /// Must be called on the logic thread. Failures raised by the callable
    /// are reported to the logic thread's reporter and never propagated;
    /// the only error returned is a thread-affinity violation.
    pub fn run(&self) -> Result<RunOutcome> {
        self.run_inner(None)
    }

    /// Runs the call now with `args`. See [`ContextCall::run`].
    pub fn run_with(&self, args: &CallArgs) -> Result<RunOutcome> {
        self.run_inner(Some(args))
    }

    fn run_inner(&self, args: Option<&CallArgs>) -> Result<RunOutcome> {
        let logic = LogicThread::require_current("ContextCall::run")?;

        if self.is_dead() {
            trace!(call_id = %self.id, "Skipping dead call");
            return Ok(RunOutcome::Dead);
        }
        let Some(callable) = self.callable.as_ref().filter(|c| c.is_resolvable()) else {
            trace!(call_id = %self.id, "Skipping call with no callable");
            return Ok(RunOutcome::Missing);
        };

        let _keep_alive = self.self_ref.upgrade();
        let frame = ActiveCallFrame::enter(self.self_ref.clone());
        let scope = ScopedContext::new(&self.context);

        let timer = SpanTimer::start("context_call.invoke");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            callable.invoke(args)
        }))
        .unwrap_or_else(|panic| Err(InvocationError::from_panic(panic.as_ref())));
        let elapsed = timer.elapsed();
        let elapsed_ms = timer.finish();

        let outcome = match result {
            Ok(()) => RunOutcome::Completed,
            Err(err) => {
                self.report_failure(&logic, frame.depth(), err);
                RunOutcome::Failed
            }
        };

        drop(scope);
        drop(frame);

        if logic.config().is_slow_call(elapsed) {
            warn!(
                call_id = %self.id,
                call = %self.description(),
                duration_ms = elapsed_ms,
                "Slow context call"
            );
        }
        Ok(outcome)
    }

    fn report_failure(&self, logic: &LogicThread, depth: usize, error: InvocationError) {
        let report = CallFailureReport {
            call_id: self.id,
            call: self.description(),
            call_site: self.site.clone(),
            captured_context: self.context.description(),
            active_context: logic
                .config()
                .include_context_dump
                .then(|| ContextSnapshot::current().description()),
            depth,
            error,
            timestamp: Utc::now(),
        };
        logic.reporter().report(&report);
    }

    /// Runs the call on an upcoming logic-thread cycle, keeping it alive
    /// until then.
    pub fn schedule(&self) -> Result<()> {
        self.enqueue(None, Retention::Strong, "ContextCall::schedule")
    }

    /// Like [`ContextCall::schedule`], passing `args`.
    pub fn schedule_with(&self, args: CallArgs) -> Result<()> {
        self.enqueue(Some(args), Retention::Strong, "ContextCall::schedule")
    }

    /// Runs the call on an upcoming logic-thread cycle if it still exists
    /// then. Dropping every other reference before that cancels the run.
    pub fn schedule_weak(&self) -> Result<()> {
        self.enqueue(None, Retention::Weak, "ContextCall::schedule_weak")
    }

    /// Like [`ContextCall::schedule_weak`], passing `args`.
    pub fn schedule_weak_with(&self, args: CallArgs) -> Result<()> {
        self.enqueue(Some(args), Retention::Weak, "ContextCall::schedule_weak")
    }

    fn enqueue(
        &self,
        args: Option<CallArgs>,
        retention: Retention,
        operation: &'static str,
    ) -> Result<()> {
        let logic = LogicThread::require_current(operation)?;
        debug!(call_id = %self.id, ?retention, "Scheduling call");
        match retention {
            Retention::Strong => {
                // Only fails while the last owner is mid-drop.
                let Some(call) = self.self_ref.upgrade() else {
                    return Ok(());
                };
                logic.push_call(move || call.run_deferred(args.as_ref()))
            }
            Retention::Weak => {
                let weak = self.self_ref.clone();
                logic.push_call(move || match weak.upgrade() {
                    Some(call) => call.run_deferred(args.as_ref()),
                    None => trace!("Weakly scheduled call expired before running"),
                })
            }
        }
    }

    fn run_deferred(&self, args: Option<&CallArgs>) {
        if let Err(err) = self.run_inner(args) {
            error!(call_id = %self.id, error = %err, "Deferred call could not run");
        }
    }
}

impl fmt::Display for ContextCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

impl fmt::Debug for ContextCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCall")
            .field("id", &self.id)
            .field("callable", &self.callable)
            .field("context", &self.context)
            .field("site", &self.site)
            .field("dead", &self.is_dead())
            .finish()
    }
}
