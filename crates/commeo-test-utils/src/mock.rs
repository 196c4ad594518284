//! In-memory gateway peer
//!
//! [`MockGateway`] sits on the far end of a `tokio::io::duplex` pipe and
//! answers requests from a table of [`MockActor`]s the way the real stick
//! does. Scripted replies override the table per method; unsolicited frames
//! can be pushed at any time.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use commeo_core::{decode, ActorId, CommandKind, Frame, Method, FRAME_TERMINATOR, MAX_RAW_POSITION};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::frames;
use crate::wait_for_count;

/// One actor as the mock gateway sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockActor {
    pub actor_id: ActorId,
    pub label: String,
    pub radio_address: u32,
    pub device_type: i64,
    pub device_status: i64,
    pub motion: i64,
    pub current_raw: u16,
    pub target_raw: u16,
}

impl MockActor {
    /// An active shutter standing still, fully open
    pub fn shutter(actor_id: ActorId, label: &str) -> Self {
        Self {
            actor_id,
            label: label.to_string(),
            radio_address: 0x0010_0000 + actor_id,
            device_type: 1,
            device_status: 1,
            motion: 1,
            current_raw: 0,
            target_raw: 0,
        }
    }

    pub fn with_device_type(mut self, device_type: i64) -> Self {
        self.device_type = device_type;
        self
    }

    pub fn with_device_status(mut self, device_status: i64) -> Self {
        self.device_status = device_status;
        self
    }

    pub fn at(mut self, raw: u16) -> Self {
        self.current_raw = raw;
        self.target_raw = raw;
        self
    }

    fn info(&self) -> String {
        frames::info_response(
            self.actor_id,
            &self.label,
            self.radio_address,
            self.device_type,
            self.device_status,
        )
    }

    fn values(&self) -> String {
        frames::values_response(self.actor_id, self.motion, self.current_raw, self.target_raw)
    }

    fn event(&self) -> String {
        frames::status_event(self.actor_id, self.motion, self.current_raw, self.target_raw)
    }
}

#[derive(Default)]
struct State {
    actors: Mutex<BTreeMap<ActorId, MockActor>>,
    scripts: Mutex<HashMap<String, Vec<String>>>,
    requests: Mutex<Vec<Frame>>,
    request_count: AtomicU32,
    silent: AtomicBool,
}

impl State {
    fn answer(&self, text: &str) -> Vec<String> {
        let frame = match decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Mock gateway cannot decode request: {}", e);
                return Vec::new();
            }
        };
        let method = frame.method().unwrap_or(Method::Unknown(String::new()));

        self.requests.lock().push(frame.clone());
        self.request_count.fetch_add(1, Ordering::SeqCst);

        if self.silent.load(Ordering::SeqCst) {
            return Vec::new();
        }
        if let Some(replies) = self.scripts.lock().get(method.as_str()) {
            return replies.clone();
        }

        let actor_id = frame.int_as::<ActorId>(0).ok();
        let mut actors = self.actors.lock();
        let missing = |id: Option<ActorId>| {
            vec![frames::fault_response(&[
                method.as_str(),
                &format!("unknown actor {:?}", id),
            ])]
        };

        match method {
            Method::DeviceGetIds => {
                let ids: Vec<ActorId> = actors.keys().copied().collect();
                vec![frames::ids_response(&ids)]
            }
            Method::DeviceGetInfo => match actor_id.and_then(|id| actors.get(&id)) {
                Some(actor) => vec![actor.info()],
                None => missing(actor_id),
            },
            Method::DeviceGetValues => match actor_id.and_then(|id| actors.get(&id)) {
                Some(actor) => vec![actor.values()],
                None => missing(actor_id),
            },
            Method::CommandDevice => {
                let code = frame.int(1).unwrap_or(-1);
                let parameter = frame.int_as::<u16>(3).unwrap_or(0);
                match actor_id.and_then(|id| actors.get_mut(&id)) {
                    Some(actor) => {
                        match CommandKind::from_code(code) {
                            Some(CommandKind::DriveUp) => actor.current_raw = 0,
                            Some(CommandKind::DriveDown) => actor.current_raw = MAX_RAW_POSITION,
                            Some(CommandKind::DrivePosition) => actor.current_raw = parameter,
                            Some(CommandKind::Stop) | None => {}
                        }
                        actor.target_raw = actor.current_raw;
                        vec![
                            frames::command_ack(),
                            frames::command_result(code, &[actor.actor_id], &[], true),
                            actor.event(),
                        ]
                    }
                    None => vec![
                        frames::command_ack(),
                        frames::command_result(code, &[], &[actor_id.unwrap_or(0)], true),
                    ],
                }
            }
            _ => Vec::new(),
        }
    }
}

/// Scripted gateway on the far end of a duplex pipe
pub struct MockGateway {
    state: Arc<State>,
    outbound: mpsc::UnboundedSender<String>,
    handle: Option<JoinHandle<()>>,
}

impl MockGateway {
    /// Start answering for `actors`. Returns the mock and the stream end the
    /// code under test should use.
    pub fn start(actors: Vec<MockActor>) -> (Self, DuplexStream) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let state = Arc::new(State::default());
        *state.actors.lock() = actors.into_iter().map(|a| (a.actor_id, a)).collect();

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(remote, state.clone(), rx));

        (
            Self {
                state,
                outbound: tx,
                handle: Some(handle),
            },
            local,
        )
    }

    /// Send an unsolicited frame
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.outbound.send(frame.into());
    }

    /// Answer every request for `method` with `replies` instead of the actor table
    pub fn script(&self, method: &str, replies: Vec<String>) {
        self.state.scripts.lock().insert(method.to_string(), replies);
    }

    /// Stop answering; requests are still recorded
    pub fn set_silent(&self, silent: bool) {
        self.state.silent.store(silent, Ordering::SeqCst);
    }

    pub fn update_actor(&self, actor: MockActor) {
        self.state.actors.lock().insert(actor.actor_id, actor);
    }

    pub fn requests(&self) -> Vec<Frame> {
        self.state.requests.lock().clone()
    }

    /// Recorded requests of one method
    pub fn requests_for(&self, method: &str) -> Vec<Frame> {
        self.state
            .requests
            .lock()
            .iter()
            .filter(|f| f.method_name().map(|m| m == method).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// First integer argument of every recorded request of one method
    pub fn requested_actors(&self, method: &str) -> Vec<ActorId> {
        self.requests_for(method)
            .iter()
            .filter_map(|f| f.int_as(0).ok())
            .collect()
    }

    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::SeqCst)
    }

    pub async fn wait_for_requests(&self, n: u32, max_wait: Duration) -> bool {
        wait_for_count(&self.state.request_count, n, max_wait).await
    }

    /// Drop the pipe, the code under test sees end of stream
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(stream: DuplexStream, state: Arc<State>, mut outbound: mpsc::UnboundedReceiver<String>) {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buffer = BytesMut::with_capacity(1024);

    loop {
        tokio::select! {
            read = reader.read_buf(&mut buffer) => {
                match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                while let Some(pos) = buffer
                    .windows(FRAME_TERMINATOR.len())
                    .position(|w| w == FRAME_TERMINATOR)
                {
                    let raw = buffer.split_to(pos + FRAME_TERMINATOR.len());
                    let text = String::from_utf8_lossy(&raw[..pos]).to_string();
                    for reply in state.answer(&text) {
                        if write_frame(&mut writer, &reply).await.is_err() {
                            return;
                        }
                    }
                }
            }
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if write_frame(&mut writer, &frame).await.is_err() {
                        return;
                    }
                }
                None => break,
            },
        }
    }
}

async fn write_frame(writer: &mut WriteHalf<DuplexStream>, frame: &str) -> std::io::Result<()> {
    writer.write_all(frame.as_bytes()).await?;
    writer.write_all(FRAME_TERMINATOR).await?;
    writer.flush().await
}
