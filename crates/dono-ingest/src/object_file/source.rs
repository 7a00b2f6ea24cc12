//! Pausable line source
//!
//! A background task reads lines ahead into a bounded channel. While the
//! consumer is busy closing objects (and handing them to possibly slow
//! handlers) it suspends the source; the reader task then stops pulling from
//! the underlying file until the source is resumed.
//!
//! Suspension is counted: nested `suspend` calls must be matched by the same
//! number of `resume` calls, and only the outermost pair toggles the reader.

use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use crate::error::Result;

/// Lines buffered ahead of the parser
pub const DEFAULT_READ_AHEAD: usize = 256;

/// Counted suspension gate
///
/// `acquire` reports the open-to-held edge, `release` the held-to-open edge.
/// Releasing an open gate is a no-op.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SuspendGate {
    pending: usize,
}

impl SuspendGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when this call moved the gate from open to held
    pub fn acquire(&mut self) -> bool {
        self.pending += 1;
        self.pending == 1
    }

    /// Returns `true` when this call moved the gate from held to open
    pub fn release(&mut self) -> bool {
        match self.pending {
            0 => false,
            n => {
                self.pending = n - 1;
                self.pending == 0
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.pending > 0
    }

    pub fn pending(&self) -> usize {
        self.pending
    }
}

/// Ordered, pausable stream of lines with 1-based line numbers
///
/// Must be created inside a Tokio runtime. Dropping the source stops the
/// reader task.
#[derive(Debug)]
pub struct LineSource {
    lines: mpsc::Receiver<io::Result<String>>,
    paused: watch::Sender<bool>,
    gate: SuspendGate,
    line_no: usize,
}

impl LineSource {
    /// Read lines from any buffered async reader
    pub fn from_reader<R>(reader: R, read_ahead: usize) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(read_ahead.max(1));
        let (paused_tx, paused_rx) = watch::channel(false);
        tokio::spawn(pump(reader, tx, paused_rx));

        Self {
            lines: rx,
            paused: paused_tx,
            gate: SuspendGate::new(),
            line_no: 0,
        }
    }

    /// Read lines from an in-memory document
    pub fn from_text(text: impl Into<String>) -> Self {
        let bytes = text.into().into_bytes();
        Self::from_reader(io::Cursor::new(bytes), DEFAULT_READ_AHEAD)
    }

    /// Open a file for reading
    pub async fn open(path: &Path, read_ahead: usize) -> Result<Self> {
        let file = File::open(path).await?;
        debug!(path = %path.display(), read_ahead, "Opened object file");
        Ok(Self::from_reader(BufReader::new(file), read_ahead))
    }

    /// Next line and its 1-based number, or `None` at end of input
    ///
    /// Line terminators (`\n` or `\r\n`) are stripped.
    pub async fn next_line(&mut self) -> Result<Option<(usize, String)>> {
        debug_assert!(!self.gate.is_held(), "line requested while source is suspended");
        match self.lines.recv().await {
            Some(Ok(line)) => {
                self.line_no += 1;
                Ok(Some((self.line_no, line)))
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Stop reading ahead until the matching [`resume`](Self::resume)
    pub fn suspend(&mut self) {
        if self.gate.acquire() {
            trace!(line = self.line_no, "Suspending line source");
            self.paused.send_replace(true);
        }
    }

    pub fn resume(&mut self) {
        if self.gate.release() {
            trace!(line = self.line_no, "Resuming line source");
            self.paused.send_replace(false);
        }
    }

    /// Whether a suspension is outstanding
    pub fn is_suspended(&self) -> bool {
        self.gate.is_held()
    }

    /// Whether the reader task is currently told to stop reading
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Watch the flag that tells the reader task to stop
    pub fn pause_signal(&self) -> watch::Receiver<bool> {
        self.paused.subscribe()
    }

    /// Number of lines handed out so far
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

async fn pump<R>(reader: R, tx: mpsc::Sender<io::Result<String>>, mut paused: watch::Receiver<bool>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        // Sender dropped means the source is gone
        let running = paused.wait_for(|paused| !*paused).await.is_ok();
        if !running {
            return;
        }
        let item = match lines.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => return,
            Err(e) => Err(e),
        };
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            return;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    /// Reader that counts how often it is polled for bytes
    struct CountingReader {
        inner: io::Cursor<Vec<u8>>,
        reads: Arc<AtomicUsize>,
    }

    impl AsyncRead for CountingReader {
        fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    fn counting_source(text: &str) -> (LineSource, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = CountingReader { inner: io::Cursor::new(text.as_bytes().to_vec()), reads: reads.clone() };
        // Two-byte buffer so every line needs fresh reads
        (LineSource::from_reader(BufReader::with_capacity(2, reader), 1), reads)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_gate_edges() {
        let mut gate = SuspendGate::new();
        assert!(gate.acquire());
        assert!(!gate.acquire());
        assert_eq!(gate.pending(), 2);
        assert!(!gate.release());
        assert!(gate.is_held());
        assert!(gate.release());
        assert!(!gate.is_held());
    }

    #[test]
    fn test_release_open_gate_is_noop() {
        let mut gate = SuspendGate::new();
        assert!(!gate.release());
        assert_eq!(gate.pending(), 0);
        assert!(gate.acquire());
    }

    #[tokio::test]
    async fn test_lines_are_numbered_and_stripped() {
        let mut source = LineSource::from_text("Employee\r\n  id: 1\n\nRate");
        let mut seen = Vec::new();
        while let Some(line) = source.next_line().await.unwrap() {
            seen.push(line);
        }
        assert_eq!(
            seen,
            vec![
                (1, "Employee".to_string()),
                (2, "  id: 1".to_string()),
                (3, String::new()),
                (4, "Rate".to_string()),
            ]
        );
        assert_eq!(source.lines_read(), 4);
    }

    #[tokio::test]
    async fn test_nested_suspend_pauses_once() {
        let mut source = LineSource::from_text("A\nB\n");
        source.suspend();
        source.suspend();
        assert!(source.is_paused());

        source.resume();
        assert!(source.is_suspended());
        assert!(source.is_paused());

        source.resume();
        assert!(!source.is_suspended());
        assert!(!source.is_paused());

        // Surplus resume does not flip anything
        source.resume();
        assert!(!source.is_paused());
        assert_eq!(source.next_line().await.unwrap(), Some((1, "A".to_string())));
    }

    #[tokio::test]
    async fn test_suspended_reader_holds_back_until_resumed() {
        let (mut source, reads) = counting_source("A\nB\nC\n");
        source.suspend();
        settle().await;
        assert_eq!(reads.load(Ordering::SeqCst), 0);

        source.resume();
        let mut lines = Vec::new();
        while let Some((_, line)) = source.next_line().await.unwrap() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["A", "B", "C"]);
        assert!(reads.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_suspend_mid_stream_stops_reading() {
        let text: String = (0..50).map(|i| format!("L{i}\n")).collect();
        let (mut source, reads) = counting_source(&text);
        assert_eq!(source.next_line().await.unwrap(), Some((1, "L0".to_string())));

        source.suspend();
        // At most one line was in flight when the flag went up
        settle().await;
        let held = reads.load(Ordering::SeqCst);
        settle().await;
        assert_eq!(reads.load(Ordering::SeqCst), held);

        source.resume();
        let mut count = 1;
        while source.next_line().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 50);
        assert!(reads.load(Ordering::SeqCst) > held);
    }

    #[tokio::test]
    async fn test_pause_signal_follows_outer_edges() {
        let mut source = LineSource::from_text("A\n");
        let signal = source.pause_signal();
        source.suspend();
        source.suspend();
        assert!(*signal.borrow());
        source.resume();
        assert!(*signal.borrow());
        source.resume();
        assert!(!*signal.borrow());
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LineSource::open(&dir.path().join("missing.txt"), 8).await.unwrap_err();
        assert!(matches!(err, crate::error::IngestError::Io(_)));
    }
}
