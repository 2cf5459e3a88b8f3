//! Render-Thread Dispatcher
//!
//! A single-consumer task queue bound to the thread a backend is affine to.
//! Any thread may submit work; the render thread executes it.
//!
//! ```text
//!  client threads                         render thread
//!  ──────────────                         ─────────────
//!  request(task, FireAndForget) ──┐
//!  request(task, Blocking) ───────┼──► flume queue ──► drain() / run_until_shutdown()
//!        │ parked on Condvar      │        (FIFO)          │
//!        ◄────────────────────────┴──────── completion ◄───┘
//! ```
//!
//! - Requests made on the render thread itself run inline, before `request`
//!   returns.
//! - Tasks submitted by one thread run in submission order.
//! - There is no cancellation. A task that panics is contained on the render
//!   thread; a blocked submitter then receives [`RalError::TaskAbandoned`].
//! - After [`Dispatcher::close`] new submissions fail with
//!   [`RalError::DispatcherClosed`]; already queued tasks still run.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};
use ral_core::{RalError, Result};

use crate::time::Duration;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// How [`Dispatcher::request`] waits for the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Park the caller until the render thread has run the task.
    Blocking,
    /// Return as soon as the task is queued.
    FireAndForget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatcherState {
    Idle = 0,
    CallbackPending = 1,
    Executing = 2,
}

impl DispatcherState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::CallbackPending,
            2 => Self::Executing,
            _ => Self::Idle,
        }
    }
}

// ─── Completion ───────────────────────────────────────────────────────────────

enum Slot<R> {
    Pending,
    Done(R),
    Abandoned,
}

struct Completion<R> {
    slot: Mutex<Slot<R>>,
    ready: Condvar,
}

impl<R> Completion<R> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
            ready: Condvar::new(),
        }
    }

    fn finish(&self, outcome: Slot<R>) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = outcome;
        }
        self.ready.notify_all();
    }

    fn wait(&self) -> Result<R> {
        let mut slot = self.slot.lock();
        loop {
            match std::mem::replace(&mut *slot, Slot::Pending) {
                Slot::Pending => self.ready.wait(&mut slot),
                Slot::Done(value) => return Ok(value),
                Slot::Abandoned => return Err(RalError::TaskAbandoned),
            }
        }
    }
}

/// Travels with a blocking task. Dropping it without completing (task
/// panicked, or was discarded with the queue) wakes the submitter.
struct CompletionGuard<R> {
    completion: Option<Arc<Completion<R>>>,
}

impl<R> CompletionGuard<R> {
    fn complete(mut self, value: R) {
        if let Some(completion) = self.completion.take() {
            completion.finish(Slot::Done(value));
        }
    }
}

impl<R> Drop for CompletionGuard<R> {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            completion.finish(Slot::Abandoned);
        }
    }
}

// ─── Dispatcher ───────────────────────────────────────────────────────────────

pub struct Dispatcher {
    render_thread: ThreadId,
    /// `None` once closed. Submissions hold the read lock while sending so
    /// that nothing can slip into the queue after the final drain.
    sender: RwLock<Option<flume::Sender<Task>>>,
    receiver: flume::Receiver<Task>,
    state: AtomicU8,
    executed: AtomicU64,
}

impl Dispatcher {
    /// Creates a dispatcher bound to the calling thread.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            render_thread: thread::current().id(),
            sender: RwLock::new(Some(sender)),
            receiver,
            state: AtomicU8::new(DispatcherState::Idle as u8),
            executed: AtomicU64::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn render_thread_id(&self) -> ThreadId {
        self.render_thread
    }

    #[inline]
    #[must_use]
    pub fn is_render_thread(&self) -> bool {
        thread::current().id() == self.render_thread
    }

    #[must_use]
    pub fn state(&self) -> DispatcherState {
        DispatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of queued tasks not yet executed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Total number of queued tasks executed so far (inline calls excluded).
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    // ── Submission (any thread) ──────────────────────────────────────────────

    /// Runs `task` on the render thread.
    pub fn request<F>(&self, task: F, mode: RequestMode) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match mode {
            RequestMode::Blocking => self.request_blocking(task),
            RequestMode::FireAndForget => {
                if self.is_render_thread() {
                    task();
                    return Ok(());
                }
                self.enqueue(Box::new(task))
            }
        }
    }

    /// Runs `f` on the render thread and returns its result, parking the
    /// caller until it has run.
    pub fn request_blocking<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_render_thread() {
            return Ok(f());
        }

        let completion = Arc::new(Completion::new());
        let guard = CompletionGuard {
            completion: Some(Arc::clone(&completion)),
        };
        self.enqueue(Box::new(move || guard.complete(f())))?;
        completion.wait()
    }

    /// Async variant of [`request_blocking`](Self::request_blocking): the
    /// task is queued immediately, the returned future resolves once it ran.
    pub fn request_async<R, F>(&self, f: F) -> impl Future<Output = Result<R>> + Send + 'static
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (tx, rx) = flume::bounded(1);
        let submitted = self.request(
            move || {
                let _ = tx.send(f());
            },
            RequestMode::FireAndForget,
        );
        async move {
            submitted?;
            rx.recv_async().await.map_err(|_| RalError::TaskAbandoned)
        }
    }

    fn enqueue(&self, task: Task) -> Result<()> {
        let sender = self.sender.read();
        let Some(sender) = sender.as_ref() else {
            return Err(RalError::DispatcherClosed);
        };
        sender.send(task).map_err(|_| RalError::DispatcherClosed)?;
        let _ = self.state.compare_exchange(
            DispatcherState::Idle as u8,
            DispatcherState::CallbackPending as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        Ok(())
    }

    /// Stops accepting new tasks. Queued tasks still run on the next drain.
    pub fn close(&self) {
        if self.sender.write().take().is_some() {
            log::debug!("Dispatcher closed with {} pending task(s)", self.pending());
        }
    }

    // ── Execution (render thread) ────────────────────────────────────────────

    /// Executes every queued task, in FIFO order. Call at safe points, e.g.
    /// once per frame.
    pub fn drain(&self) -> Result<usize> {
        self.ensure_render_thread("Dispatcher::drain")?;
        let mut count = 0;
        while let Ok(task) = self.receiver.try_recv() {
            self.execute(task);
            count += 1;
        }
        Ok(count)
    }

    /// Waits up to `timeout` for the first task, then drains the queue.
    pub fn wait_and_drain(&self, timeout: Duration) -> Result<usize> {
        self.ensure_render_thread("Dispatcher::wait_and_drain")?;
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                self.execute(task);
                Ok(1 + self.drain()?)
            }
            Err(_) => Ok(0),
        }
    }

    /// Executes tasks as they arrive until [`close`](Self::close) is called
    /// and the queue is empty.
    pub fn run_until_shutdown(&self) -> Result<()> {
        self.ensure_render_thread("Dispatcher::run_until_shutdown")?;
        // `close` drops the only sender; the channel reports disconnection
        // once the remaining queue is empty.
        while let Ok(task) = self.receiver.recv() {
            self.execute(task);
        }
        Ok(())
    }

    fn execute(&self, task: Task) {
        self.state
            .store(DispatcherState::Executing as u8, Ordering::Release);

        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            log::error!("Render-thread task panicked; the submitter is notified as abandoned");
        }
        self.executed.fetch_add(1, Ordering::Relaxed);

        let next = if self.receiver.is_empty() {
            DispatcherState::Idle
        } else {
            DispatcherState::CallbackPending
        };
        self.state.store(next as u8, Ordering::Release);
    }

    fn ensure_render_thread(&self, operation: &'static str) -> Result<()> {
        if self.is_render_thread() {
            Ok(())
        } else {
            Err(RalError::WrongThread(operation))
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("render_thread", &self.render_thread)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ─── Dedicated Render Thread ─────────────────────────────────────────────────

/// A named thread that owns a [`Dispatcher`] and executes tasks as soon as
/// they arrive.
pub struct RenderThread {
    dispatcher: Arc<Dispatcher>,
    handle: Option<JoinHandle<()>>,
}

impl RenderThread {
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (tx, rx) = flume::bounded(1);

        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name).spawn(move || {
            let dispatcher = Arc::new(Dispatcher::new());
            if tx.send(Arc::clone(&dispatcher)).is_err() {
                return;
            }
            log::info!("Render thread '{thread_name}' started");
            if let Err(err) = dispatcher.run_until_shutdown() {
                log::error!("Render thread '{thread_name}' stopped: {err}");
            }
            log::info!(
                "Render thread '{thread_name}' exiting after {} task(s)",
                dispatcher.executed()
            );
        })?;

        let dispatcher = rx.recv().map_err(|_| RalError::DispatcherClosed)?;
        Ok(Self {
            dispatcher,
            handle: Some(handle),
        })
    }

    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Closes the dispatcher, lets the thread finish queued work and joins it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.dispatcher.close();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Render thread panicked during shutdown");
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop();
    }
}
