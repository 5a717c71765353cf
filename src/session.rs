//! Follow sessions: one reader process, one dispatch task, one line channel.

use crate::config::FollowConfig;
use crate::error::{Error, Result};
use crate::source::{self, FollowSource};
use crate::splitter::{DispatchExit, DispatchState, FollowStats, dispatch_lines};
use futures::Stream;
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{Notify, broadcast, mpsc, oneshot};
use tokio::time::Instant;

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const STOPPED: u8 = 2;

/// An active follow of one file.
///
/// Lines arrive in file order through [`next_line`](Self::next_line) or the
/// [`Stream`] impl. The stream ends once the reader's output is exhausted or the
/// session is stopped. Call [`stop`](Self::stop) to release the reader process.
pub struct FollowSession {
    path: PathBuf,
    buffer_capacity: usize,
    channel_capacity: usize,
    lines: mpsc::Receiver<String>,
    control: Arc<SessionControl>,
}

/// Stops a session from another task.
#[derive(Clone)]
pub struct StopHandle {
    control: Arc<SessionControl>,
}

struct SessionControl {
    path: PathBuf,
    grace_period: Duration,
    process_id: Option<u32>,
    state: AtomicU8,
    stopped: Notify,
    teardown: Mutex<Option<Teardown>>,
    shutdown_tx: broadcast::Sender<()>,
    dispatch: Arc<DispatchState>,
}

struct Teardown {
    child: Child,
    done_rx: oneshot::Receiver<DispatchExit>,
}

impl FollowSession {
    /// Starts following `path` from its first byte with default settings.
    pub async fn start<P: AsRef<Path>>(path: P, buffer_capacity: usize) -> Result<Self> {
        let config = FollowConfig::default().with_buffer_capacity(buffer_capacity);
        Self::start_with(path, config).await
    }

    /// Starts following `path` from its first byte.
    ///
    /// Fails with [`Error::NotFound`] if the file is missing, without spawning
    /// anything. Returns once the reader is running and the dispatch task is
    /// launched.
    pub async fn start_with<P: AsRef<Path>>(path: P, config: FollowConfig) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref().to_path_buf();
        let FollowSource { child, stdout } = source::open(&path, &config.reader).await?;
        let process_id = child.id();

        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        let dispatch = Arc::new(DispatchState::default());

        let task_state = Arc::clone(&dispatch);
        let buffer_capacity = config.buffer_capacity;
        tokio::spawn(async move {
            let exit = dispatch_lines(stdout, buffer_capacity, tx, shutdown_rx, task_state).await;
            let _ = done_tx.send(exit);
        });

        tracing::info!(
            path = %path.display(),
            pid = ?process_id,
            buffer_capacity,
            channel_capacity = config.channel_capacity,
            "Follow session started"
        );

        let control = SessionControl {
            path: path.clone(),
            grace_period: config.grace_period,
            process_id,
            state: AtomicU8::new(RUNNING),
            stopped: Notify::new(),
            teardown: Mutex::new(Some(Teardown { child, done_rx })),
            shutdown_tx,
            dispatch,
        };

        Ok(Self {
            path,
            buffer_capacity,
            channel_capacity: config.channel_capacity,
            lines: rx,
            control: Arc::new(control),
        })
    }

    /// Waits for the next line. `None` once the channel is closed.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Interrupts the reader and waits for the session to wind down.
    ///
    /// The reader gets the configured grace period to exit and the channel gets
    /// the same window to close; after that the reader is killed. Returns only
    /// when the dispatch task has finished and the reader has been reaped.
    /// Repeated or concurrent calls are safe.
    pub async fn stop(&self) {
        self.control.stop().await;
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            control: Arc::clone(&self.control),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// OS id of the reader process as spawned.
    pub fn process_id(&self) -> Option<u32> {
        self.control.process_id
    }

    pub fn is_stopped(&self) -> bool {
        self.control.state.load(Ordering::Acquire) == STOPPED
    }

    /// The most recent run-time error seen by the dispatch task, if any.
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.control.dispatch.last_error()
    }

    pub fn stats(&self) -> FollowStats {
        self.control.dispatch.stats()
    }

    /// Why the dispatch task ended. `None` while it is still running.
    pub fn exit_reason(&self) -> Option<DispatchExit> {
        self.control.dispatch.exit_reason()
    }
}

impl StopHandle {
    /// Same as [`FollowSession::stop`].
    pub async fn stop(&self) {
        self.control.stop().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.control.state.load(Ordering::Acquire) == STOPPED
    }
}

impl SessionControl {
    async fn stop(&self) {
        let stopped = self.stopped.notified();
        tokio::pin!(stopped);
        stopped.as_mut().enable();

        if self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            if self.state.load(Ordering::Acquire) != STOPPED {
                stopped.await;
            }
            return;
        }

        let _guard = StopGuard(self);
        if let Some(teardown) = self.take_teardown() {
            self.tear_down(teardown).await;
        }
    }

    fn take_teardown(&self) -> Option<Teardown> {
        match self.teardown.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    async fn tear_down(&self, teardown: Teardown) {
        let Teardown {
            mut child,
            mut done_rx,
        } = teardown;

        if let Err(e) = source::request_interrupt(&mut child) {
            tracing::error!(error = %e, path = %self.path.display(), "Failed to interrupt reader");
        }
        // Releases a dispatch task parked on a full channel.
        let _ = self.shutdown_tx.send(());

        let deadline = grace_deadline(Instant::now(), self.grace_period);
        let mut exit = tokio::time::timeout_at(deadline, &mut done_rx).await.ok();
        let mut status = match exit {
            Some(_) => tokio::time::timeout_at(deadline, child.wait()).await.ok(),
            None => None,
        };

        let forced = exit.is_none() || status.is_none();
        if forced {
            tracing::warn!(
                path = %self.path.display(),
                grace_period = ?self.grace_period,
                "Reader did not exit within grace period, killing it"
            );
            if let Err(e) = child.kill().await {
                tracing::error!(error = %e, "Failed to kill reader");
            }
        }

        if exit.is_none() {
            exit = Some(done_rx.await);
        }
        if status.is_none() {
            status = Some(child.wait().await);
        }

        tracing::info!(
            path = %self.path.display(),
            exit = ?exit.and_then(|e| e.ok()),
            status = ?status.and_then(|s| s.ok()),
            forced,
            "Follow session stopped"
        );
    }
}

/// Far enough out to never fire in practice while staying representable.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// End of the graceful window, clamped so huge grace periods cannot overflow.
fn grace_deadline(now: Instant, grace_period: Duration) -> Instant {
    now.checked_add(grace_period)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Marks the session stopped even if the stopping future is dropped midway.
struct StopGuard<'a>(&'a SessionControl);

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        self.0.state.store(STOPPED, Ordering::Release);
        self.0.stopped.notify_waiters();
    }
}

impl Drop for FollowSession {
    fn drop(&mut self) {
        if self.control.state.load(Ordering::Acquire) == RUNNING {
            let _ = self.control.shutdown_tx.send(());
        }
    }
}

impl Stream for FollowSession {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.lines.poll_recv(cx)
    }
}

impl fmt::Display for FollowSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FollowSession{{path: {}, buffer_capacity: {}}}",
            self.path.display(),
            self.buffer_capacity
        )
    }
}

impl fmt::Debug for FollowSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FollowSession")
            .field("path", &self.path)
            .field("buffer_capacity", &self.buffer_capacity)
            .field("channel_capacity", &self.channel_capacity)
            .field("process_id", &self.control.process_id)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
