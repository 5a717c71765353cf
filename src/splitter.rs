//! Splits the reader's byte stream into lines and hands them to the consumer.

use crate::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{broadcast, mpsc};

/// Why the dispatch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    /// The reader closed its output.
    EndOfStream,
    /// Reading failed; the cause is in the last-error slot.
    ReadFailed,
    /// A stop request arrived while a line was waiting for channel space.
    Stopped,
    /// The consumer dropped its end of the channel.
    ConsumerGone,
}

/// Point-in-time counters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowStats {
    /// Lines accepted by the handoff channel.
    pub lines_dispatched: u64,
    /// Lines that outgrew the configured buffer capacity.
    pub oversized_lines: u64,
}

/// State written by the dispatch task and read by the session.
#[derive(Debug, Default)]
pub(crate) struct DispatchState {
    last_error: Mutex<Option<Arc<Error>>>,
    exit: Mutex<Option<DispatchExit>>,
    lines_dispatched: AtomicU64,
    oversized_lines: AtomicU64,
}

impl DispatchState {
    pub(crate) fn last_error(&self) -> Option<Arc<Error>> {
        match self.last_error.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn exit_reason(&self) -> Option<DispatchExit> {
        match self.exit.lock() {
            Ok(slot) => *slot,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn stats(&self) -> FollowStats {
        FollowStats {
            lines_dispatched: self.lines_dispatched.load(Ordering::Relaxed),
            oversized_lines: self.oversized_lines.load(Ordering::Relaxed),
        }
    }

    fn record_error(&self, error: Error) {
        let mut slot = match self.last_error.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(Arc::new(error));
    }

    fn record_exit(&self, exit: DispatchExit) {
        let mut slot = match self.exit.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(exit);
    }
}

/// Reads `reader` line by line and pushes each line into `tx` until the stream ends.
///
/// `buffer_capacity` sizes the read buffer. A line longer than that grows the line
/// buffer to fit and is still delivered whole; it is only counted and reported.
/// Pushing blocks while the channel is full, which in turn stops draining the
/// reader's pipe. A message on `shutdown_rx` abandons a blocked push.
///
/// The exit reason is recorded in `state` and `tx` is dropped before returning,
/// so the reason is readable by the time the channel reports closed.
pub(crate) async fn dispatch_lines<R>(
    reader: R,
    buffer_capacity: usize,
    tx: mpsc::Sender<String>,
    mut shutdown_rx: broadcast::Receiver<()>,
    state: Arc<DispatchState>,
) -> DispatchExit
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(buffer_capacity, reader);
    let mut buf = Vec::with_capacity(buffer_capacity);

    let exit = loop {
        buf.clear();
        if buf.capacity() > buffer_capacity {
            buf.shrink_to(buffer_capacity);
        }

        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break DispatchExit::EndOfStream,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Reader output failed, ending dispatch");
                state.record_error(Error::Read(e));
                break DispatchExit::ReadFailed;
            }
        }

        if buf.len() > buffer_capacity {
            state.oversized_lines.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                line_bytes = buf.len(),
                buffer_capacity,
                "Line exceeded buffer capacity, grew to fit"
            );
        }

        let line = into_line(&buf);

        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => break DispatchExit::Stopped,

            sent = tx.send(line) => {
                if sent.is_err() {
                    break DispatchExit::ConsumerGone;
                }
            }
        }

        state.lines_dispatched.fetch_add(1, Ordering::Relaxed);
    };

    state.record_exit(exit);
    drop(tx);
    tracing::debug!(?exit, "Dispatch loop finished");
    exit
}

/// Strips the line terminator (`\n` or `\r\n`) and decodes the rest as text.
fn into_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;
    use tokio_test::io::Builder;

    async fn run(
        reader: tokio_test::io::Mock,
        buffer_capacity: usize,
        channel_capacity: usize,
    ) -> (DispatchExit, Vec<String>, Arc<DispatchState>) {
        let (tx, mut rx) = mpsc::channel(channel_capacity);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let state = Arc::new(DispatchState::default());

        let task = tokio::spawn(dispatch_lines(
            reader,
            buffer_capacity,
            tx,
            shutdown_rx,
            Arc::clone(&state),
        ));

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }

        (task.await.unwrap(), lines, state)
    }

    #[test]
    fn test_into_line_strips_newline() {
        assert_eq!(into_line(b"line1\n"), "line1");
    }

    #[test]
    fn test_into_line_strips_crlf() {
        assert_eq!(into_line(b"line1\r\n"), "line1");
    }

    #[test]
    fn test_into_line_keeps_unterminated_fragment() {
        assert_eq!(into_line(b"tail end"), "tail end");
    }

    #[test]
    fn test_into_line_preserves_whitespace_and_empty_lines() {
        assert_eq!(into_line(b"  padded  \n"), "  padded  ");
        assert_eq!(into_line(b"\n"), "");
    }

    #[test]
    fn test_into_line_replaces_invalid_utf8() {
        assert_eq!(into_line(b"ok\xffok\n"), "ok\u{FFFD}ok");
    }

    #[tokio::test]
    async fn test_lines_in_order() {
        let reader = Builder::new().read(b"one\ntwo\nthree\n").build();
        let (exit, lines, state) = run(reader, 64, 10).await;

        assert_eq!(exit, DispatchExit::EndOfStream);
        assert_eq!(lines, vec!["one", "two", "three"]);
        assert_eq!(state.stats().lines_dispatched, 3);
        assert!(state.last_error().is_none());
        assert_eq!(state.exit_reason(), Some(DispatchExit::EndOfStream));
    }

    #[tokio::test]
    async fn test_lines_split_across_reads() {
        let reader = Builder::new()
            .read(b"fir")
            .read(b"st\nsec")
            .read(b"ond\n")
            .read(b"\nlast")
            .build();
        let (exit, lines, _) = run(reader, 64, 10).await;

        assert_eq!(exit, DispatchExit::EndOfStream);
        assert_eq!(lines, vec!["first", "second", "", "last"]);
    }

    #[tokio::test]
    async fn test_long_line_grows_past_buffer_capacity() {
        let long = "This is an extraordinarily long but simple line".repeat(100);
        let mut data = long.clone().into_bytes();
        data.push(b'\n');
        data.extend_from_slice(b"short\n");

        let reader = Builder::new().read(&data).build();
        let (exit, lines, state) = run(reader, 16, 10).await;

        assert_eq!(exit, DispatchExit::EndOfStream);
        assert_eq!(lines, vec![long, "short".to_string()]);
        assert_eq!(state.stats().oversized_lines, 1);
        assert_eq!(state.stats().lines_dispatched, 2);
    }

    #[tokio::test]
    async fn test_read_error_recorded_and_ends_loop() {
        let reader = Builder::new()
            .read(b"one\ntwo\n")
            .read_error(io::Error::new(io::ErrorKind::Other, "reader crashed"))
            .build();
        let (exit, lines, state) = run(reader, 64, 10).await;

        assert_eq!(exit, DispatchExit::ReadFailed);
        assert_eq!(state.exit_reason(), Some(DispatchExit::ReadFailed));
        assert_eq!(lines, vec!["one", "two"]);

        let error = state.last_error().expect("read error should be recorded");
        match error.as_ref() {
            Error::Read(inner) => assert_eq!(inner.to_string(), "reader crashed"),
            other => panic!("Expected Error::Read, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_backpressure_holds_lines_until_consumed() {
        let reader = Builder::new().read(b"a\nb\nc\n").build();
        let (tx, mut rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let state = Arc::new(DispatchState::default());

        let task = tokio::spawn(dispatch_lines(
            reader,
            64,
            tx,
            shutdown_rx,
            Arc::clone(&state),
        ));

        // One slot: the task parks on the second line until we consume.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        assert_eq!(state.stats().lines_dispatched, 1);

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }

        assert_eq!(lines, vec!["a", "b", "c"]);
        assert_eq!(task.await.unwrap(), DispatchExit::EndOfStream);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_blocked_push() {
        let reader = Builder::new().read(b"a\nb\nc\n").build();
        let (tx, mut rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let state = Arc::new(DispatchState::default());

        let task = tokio::spawn(dispatch_lines(
            reader,
            64,
            tx,
            shutdown_rx,
            Arc::clone(&state),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("dispatch should end promptly")
            .unwrap();
        assert_eq!(exit, DispatchExit::Stopped);

        // The line already in the channel is still delivered, then the channel is closed.
        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_consumer_gone_ends_loop() {
        let reader = Builder::new().read(b"a\nb\n").build();
        let (tx, rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        drop(rx);

        let exit = dispatch_lines(
            reader,
            64,
            tx,
            shutdown_rx,
            Arc::new(DispatchState::default()),
        )
        .await;

        assert_eq!(exit, DispatchExit::ConsumerGone);
    }
}
