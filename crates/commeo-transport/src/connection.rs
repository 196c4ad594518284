//! Framed, flow-controlled connection to a gateway
//!
//! Outbound frames go through a queue drained by a single writer task, which
//! sleeps a fixed interval after every write. Inbound frames are read one at
//! a time: a second [`Connection::receive_frame`] while one is pending returns
//! [`ReceiveOutcome::Busy`] without touching the stream.
//!
//! There are no request IDs on the wire. Responses are matched to requests
//! by method name only, so callers must not keep two requests of the same
//! method outstanding at once.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use commeo_core::FRAME_TERMINATOR;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TransportError};
use crate::serial::SerialConfig;

/// Frames larger than this without a terminator are discarded
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Consecutive stream read errors after which the connection is closed
pub const MAX_READ_ERRORS: u32 = 3;

/// Result of one receive attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// A complete frame, trimmed to start at the first `<`
    Frame(String),
    /// Nothing arrived within the receive timeout
    TimedOut,
    /// Read error, end of stream, or the connection was closed. After
    /// [`MAX_READ_ERRORS`] stream errors in a row the connection is closed.
    Failed,
    /// Another receive is already in flight; nothing was read
    Busy,
}

struct Outbound {
    bytes: Vec<u8>,
    done: Option<oneshot::Sender<Result<()>>>,
}

struct FrameReader {
    stream: Box<dyn AsyncRead + Send + Unpin>,
    buffer: BytesMut,
}

impl FrameReader {
    /// Read until a full frame is buffered. Cancel safe: bytes read before
    /// cancellation stay in the buffer for the next call.
    async fn next_frame(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if let Some(pos) = find_terminator(&self.buffer) {
                let raw = self.buffer.split_to(pos + FRAME_TERMINATOR.len());
                let text = String::from_utf8_lossy(&raw[..pos]);
                match text.find('<') {
                    Some(start) => return Ok(Some(text[start..].to_string())),
                    None => {
                        debug!("Skipping {} bytes of line noise", pos);
                        continue;
                    }
                }
            }

            if self.buffer.len() > MAX_FRAME_SIZE {
                let dropped = self.buffer.len();
                self.buffer.clear();
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("no frame terminator within {} bytes", dropped),
                ));
            }

            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                return Ok(None);
            }
        }
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_TERMINATOR.len())
        .position(|w| w == FRAME_TERMINATOR)
}

/// Clears the single-flight flag however the read ends
struct ReadGuard<'a>(&'a AtomicBool);

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    queue: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    reader: tokio::sync::Mutex<FrameReader>,
    reading: AtomicBool,
    read_errors: AtomicU32,
    connected: AtomicBool,
    shutdown: CancellationToken,
    writer_task: Mutex<Option<JoinHandle<()>>>,
    receive_timeout: Duration,
}

/// A framed connection to the gateway. Cheap to clone; all clones share the
/// same writer queue and reader.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Wrap any byte stream. Must be called inside a tokio runtime.
    pub fn from_stream<S>(stream: S, config: &SerialConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let writer_task = tokio::spawn(run_writer(
            write_half,
            rx,
            config.send_interval,
            shutdown.clone(),
        ));

        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(Some(tx)),
                reader: tokio::sync::Mutex::new(FrameReader {
                    stream: Box::new(read_half),
                    buffer: BytesMut::with_capacity(1024),
                }),
                reading: AtomicBool::new(false),
                read_errors: AtomicU32::new(0),
                connected: AtomicBool::new(true),
                shutdown,
                writer_task: Mutex::new(Some(writer_task)),
                receive_timeout: config.receive_timeout,
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// True while a receive is in flight
    pub fn is_receiving(&self) -> bool {
        self.inner.reading.load(Ordering::Acquire)
    }

    fn enqueue(&self, text: &str, done: Option<oneshot::Sender<Result<()>>>) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if !text.is_ascii() {
            return Err(TransportError::SendFailed(format!(
                "frame is not ASCII: {:?}",
                text
            )));
        }

        let mut bytes = Vec::with_capacity(text.len() + FRAME_TERMINATOR.len());
        bytes.extend_from_slice(text.as_bytes());
        bytes.extend_from_slice(FRAME_TERMINATOR);

        let queue = self.inner.queue.lock();
        let tx = queue.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(Outbound { bytes, done })
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Queue a frame for sending. Returns once queued, never waits for the
    /// writer.
    pub fn send(&self, text: &str) -> Result<()> {
        self.enqueue(text, None)
    }

    /// Queue a frame and wait until it has been written and flushed
    pub async fn send_confirmed(&self, text: &str) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(text, Some(done_tx))?;
        done_rx.await.map_err(|_| TransportError::ConnectionClosed)?
    }

    /// Read one frame, bounded by the receive timeout
    pub async fn receive_frame(&self) -> ReceiveOutcome {
        if !self.is_connected() {
            return ReceiveOutcome::Failed;
        }
        if self
            .inner
            .reading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Receive already in flight");
            return ReceiveOutcome::Busy;
        }
        let _guard = ReadGuard(&self.inner.reading);

        let mut reader = self.inner.reader.lock().await;
        let read = tokio::time::timeout(self.inner.receive_timeout, reader.next_frame());

        tokio::select! {
            _ = self.inner.shutdown.cancelled() => {
                debug!("Receive aborted by close");
                ReceiveOutcome::Failed
            }
            result = read => match result {
                Err(_) => {
                    debug!("Receive timed out after {:?}", self.inner.receive_timeout);
                    self.inner.read_errors.store(0, Ordering::Release);
                    ReceiveOutcome::TimedOut
                }
                Ok(Ok(Some(frame))) => {
                    debug!("--- Received ---\n{}", frame);
                    self.inner.read_errors.store(0, Ordering::Release);
                    ReceiveOutcome::Frame(frame)
                }
                Ok(Ok(None)) => {
                    warn!("Gateway stream closed");
                    self.inner.connected.store(false, Ordering::Release);
                    ReceiveOutcome::Failed
                }
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    warn!("Dropping unframed input: {}", e);
                    ReceiveOutcome::Failed
                }
                Ok(Err(e)) => {
                    error!("Error during receive: {}", e);
                    let errors = self.inner.read_errors.fetch_add(1, Ordering::AcqRel) + 1;
                    if errors >= MAX_READ_ERRORS {
                        error!("{} read errors in a row, closing connection", errors);
                        self.close();
                    }
                    ReceiveOutcome::Failed
                }
            }
        }
    }

    /// Close the connection, aborting any in-flight read or write and
    /// dropping queued frames
    pub fn close(&self) {
        if !self.inner.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        self.inner.shutdown.cancel();
        self.inner.queue.lock().take();
        if let Some(task) = self.inner.writer_task.lock().take() {
            task.abort();
        }
        info!("Connection closed");
    }
}

async fn run_writer<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    interval: Duration,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let msg = tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        debug!("--- Sent ---\n{}", String::from_utf8_lossy(&msg.bytes).trim_end());
        let result = async {
            writer.write_all(&msg.bytes).await?;
            writer.flush().await
        }
        .await;

        let result = result.map_err(|e| {
            error!("Error during send: {}", e);
            TransportError::from(e)
        });
        if let Some(done) = msg.done {
            let _ = done.send(result);
        }

        tokio::time::sleep(interval).await;
    }

    let _ = writer.shutdown().await;
    debug!("Writer stopped");
}
