//! Common test helpers for the Commeo workspace
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - A scripted in-memory gateway ([`MockGateway`])
//! - Builders for gateway frames ([`frames`])
//! - Hooks that record every call ([`RecordingHooks`])

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use commeo_client::Gateway;
use commeo_transport::SerialConfig;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub mod frames;
mod hooks;
mod mock;

pub use hooks::{HookCall, RecordingHooks};
pub use mock::{MockActor, MockGateway};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Wait for an atomic counter to reach a target value
pub async fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || async { counter.load(Ordering::SeqCst) >= target },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

// ============================================================================
// Gateway Setup
// ============================================================================

/// Transport settings that keep tests fast: 1 ms between writes and a short
/// receive timeout
pub fn fast_config() -> SerialConfig {
    SerialConfig {
        send_interval: Duration::from_millis(1),
        receive_timeout: Duration::from_millis(200),
        ..SerialConfig::default()
    }
}

/// A gateway wired to a mock with the given actors, recording hook calls
pub fn connect(actors: Vec<MockActor>) -> (Gateway, MockGateway, RecordingHooks) {
    let (mock, stream) = MockGateway::start(actors);
    let hooks = RecordingHooks::new();
    let gateway = Gateway::with_stream(stream, &fast_config(), Arc::new(hooks.clone()));
    (gateway, mock, hooks)
}

/// A stream whose reads always fail, like a gateway unplugged mid-session.
/// Writes are accepted and discarded.
pub struct BrokenStream;

impl AsyncRead for BrokenStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged")))
    }
}

impl AsyncWrite for BrokenStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
