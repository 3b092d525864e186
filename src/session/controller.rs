use super::config::MeetingConfig;
use crate::audio::{AudioCapture, CaptureConfig};
use crate::engine::MeetingState;
use crate::events::{ClientMessage, ErrorEvent};
use crate::ws::{WsClient, WsConfig, WsEvent};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Orchestrates one live meeting: audio capture upstream, server events
/// downstream into the reconciliation engine, and the session lifecycle
/// (start/pause/resume/end/reconnect).
///
/// The engine state is only ever mutated from the event pump task and the
/// prune timer; both go through the same mutex, so reconciliation stays
/// strictly in delivery order.
pub struct MeetingController {
    shared: Shared,
    pump_task: Option<JoinHandle<()>>,
    prune_task: Option<JoinHandle<()>>,
}

/// Everything the background tasks need, cheaply cloneable.
#[derive(Clone)]
struct Shared {
    config: MeetingConfig,
    state: Arc<Mutex<MeetingState>>,
    ws: Arc<Mutex<WsClient>>,
    audio: Arc<Mutex<Box<dyn AudioCapture>>>,
    session_id: Arc<Mutex<Option<String>>>,
    is_recording: Arc<AtomicBool>,
    is_connected: Arc<AtomicBool>,
    /// Prompt held while disconnected, flushed once on the next connect.
    pending_prompt: Arc<Mutex<Option<String>>>,
    /// Last prompt ever sent, re-queued for every new session.
    last_prompt: Arc<Mutex<Option<String>>>,
    /// Closes we initiated ourselves; their Disconnected events must not
    /// surface as connection-lost errors.
    expected_disconnects: Arc<AtomicUsize>,
}

impl MeetingController {
    /// Create a controller around an audio capture backend. No connection
    /// is made until [`MeetingController::start`].
    pub fn new(config: MeetingConfig, audio: Box<dyn AudioCapture>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let ws_config = WsConfig {
            base_url: config.endpoint.clone(),
            ping_interval: config.ping_interval,
            pong_timeout: config.pong_timeout,
        };

        let shared = Shared {
            config,
            state: Arc::new(Mutex::new(MeetingState::new())),
            ws: Arc::new(Mutex::new(WsClient::new(ws_config, event_tx))),
            audio: Arc::new(Mutex::new(audio)),
            session_id: Arc::new(Mutex::new(None)),
            is_recording: Arc::new(AtomicBool::new(false)),
            is_connected: Arc::new(AtomicBool::new(false)),
            pending_prompt: Arc::new(Mutex::new(None)),
            last_prompt: Arc::new(Mutex::new(None)),
            expected_disconnects: Arc::new(AtomicUsize::new(0)),
        };

        let pump_task = tokio::spawn(run_event_pump(shared.clone(), event_rx));
        let prune_task = tokio::spawn(run_prune_timer(shared.clone()));

        Self {
            shared,
            pump_task: Some(pump_task),
            prune_task: Some(prune_task),
        }
    }

    /// Start a fresh session: new session id, full engine reset, connect,
    /// begin uploading audio.
    pub async fn start(&self) -> Result<()> {
        if self.shared.is_recording.load(Ordering::SeqCst) {
            warn!("Meeting already started");
            return Ok(());
        }

        self.shared.state.lock().await.reset_all();
        let session_id = self.shared.open_session().await?;
        self.shared.start_audio().await?;
        self.shared.is_recording.store(true, Ordering::SeqCst);

        info!("Meeting started (session {})", session_id);
        Ok(())
    }

    /// Stop audio capture but keep the socket and all state.
    pub async fn pause(&self) {
        if !self.shared.is_recording.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shared.stop_audio().await;
        info!("Meeting paused");
    }

    /// Restart audio capture, on the existing session if the socket is
    /// still open, otherwise on a newly started one.
    pub async fn resume(&self) -> Result<()> {
        if self.shared.is_recording.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.shared.ws.lock().await.is_connected() {
            self.shared.start_audio().await?;
            self.shared.is_recording.store(true, Ordering::SeqCst);
            info!("Meeting resumed");
            return Ok(());
        }
        self.reconnect().await
    }

    /// End the session: send the stop control, tear down audio and the
    /// socket, clear live/display state. Durable history survives.
    pub async fn end(&self) {
        info!("Ending meeting");
        self.shared.is_recording.store(false, Ordering::SeqCst);
        self.shared.stop_audio().await;

        let mut ws = self.shared.ws.lock().await;
        if ws.is_connected() {
            ws.send_control(ClientMessage::SessionStop);
            self.shared
                .expected_disconnects
                .fetch_add(1, Ordering::SeqCst);
        }
        ws.disconnect().await;
        drop(ws);

        self.shared.state.lock().await.clear_live_and_display();
        *self.shared.session_id.lock().await = None;
    }

    /// Drop the current connection (if any) and start over with a fresh
    /// session id. Live/display state resets; history, orphans,
    /// suggestions and summary survive.
    pub async fn reconnect(&self) -> Result<()> {
        self.shared.reconnect_session(true).await
    }

    /// Send a suggestions prompt, or park it until the next connect.
    pub async fn send_suggestions_prompt(&self, prompt: &str) {
        let trimmed = prompt.trim().to_string();
        *self.shared.last_prompt.lock().await = Some(trimmed.clone());

        if self.shared.is_connected.load(Ordering::SeqCst) {
            self.shared
                .ws
                .lock()
                .await
                .send_control(ClientMessage::SuggestionsPrompt { prompt: trimmed });
        } else {
            *self.shared.pending_prompt.lock().await = Some(trimmed);
        }
    }

    /// Ask the server for a meeting summary. Not available while
    /// disconnected; that surfaces as a non-retryable status error.
    pub async fn request_summary(&self) {
        if self.shared.is_connected.load(Ordering::SeqCst) {
            self.shared
                .ws
                .lock()
                .await
                .send_control(ClientMessage::SummaryRequest);
            self.shared.state.lock().await.summary_requested();
        } else {
            self.shared.state.lock().await.set_error(ErrorEvent {
                ts: Utc::now().timestamp_millis(),
                code: "SUMMARY_UNAVAILABLE".to_string(),
                message: "Cannot request a summary while disconnected".to_string(),
                retryable: Some(false),
            });
        }
    }

    pub async fn dismiss_error(&self) {
        self.shared.state.lock().await.dismiss_error();
    }

    /// Immutable snapshot of the reconciled meeting state for rendering.
    pub async fn snapshot(&self) -> MeetingState {
        self.shared.state.lock().await.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.shared.is_recording.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected.load(Ordering::SeqCst)
    }

    pub async fn session_id(&self) -> Option<String> {
        self.shared.session_id.lock().await.clone()
    }

    /// Tear down audio, socket and background timers.
    pub async fn shutdown(&mut self) {
        self.end().await;
        if let Some(task) = self.pump_task.take() {
            task.abort();
        }
        if let Some(task) = self.prune_task.take() {
            task.abort();
        }
    }
}

impl Drop for MeetingController {
    fn drop(&mut self) {
        if let Some(task) = self.pump_task.take() {
            task.abort();
        }
        if let Some(task) = self.prune_task.take() {
            task.abort();
        }
    }
}

impl Shared {
    /// Connect with a fresh session id. Session ids are never reused; the
    /// remembered suggestions prompt is re-queued for the new session.
    async fn open_session(&self) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();

        if let Some(prompt) = self.last_prompt.lock().await.clone() {
            *self.pending_prompt.lock().await = Some(prompt);
        }

        let start = ClientMessage::session_start(self.config.sample_rate, &self.config.lang);
        self.ws
            .lock()
            .await
            .connect(&session_id, start)
            .await
            .context("Failed to open meeting session")?;

        *self.session_id.lock().await = Some(session_id.clone());
        Ok(session_id)
    }

    /// Shared by the user-facing reconnect action and the automatic
    /// liveness-failure recovery. `resume_capture` controls whether audio
    /// restarts; a recovery during a pause must leave the meeting paused.
    async fn reconnect_session(&self, resume_capture: bool) -> Result<()> {
        self.stop_audio().await;

        if self.ws.lock().await.is_connected() {
            self.expected_disconnects.fetch_add(1, Ordering::SeqCst);
        }

        self.state.lock().await.reset_live_and_display();
        let session_id = self.open_session().await?;
        if resume_capture {
            self.start_audio().await?;
            self.is_recording.store(true, Ordering::SeqCst);
        }

        info!("Reconnected (session {})", session_id);
        Ok(())
    }

    /// Start capture and the chunk-forwarding task. The forwarder ends on
    /// its own when capture stops and drops the channel.
    async fn start_audio(&self) -> Result<()> {
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<Vec<u8>>(32);

        let capture_config = CaptureConfig {
            sample_rate: self.config.sample_rate,
            chunk_interval: self.config.chunk_interval,
        };

        let mut audio = self.audio.lock().await;
        info!("Starting audio capture ({})", audio.name());
        audio
            .start(capture_config, chunk_tx)
            .await
            .context("Failed to start audio capture")?;
        drop(audio);

        let ws = Arc::clone(&self.ws);
        tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                ws.lock().await.send_audio(chunk);
            }
        });

        Ok(())
    }

    async fn stop_audio(&self) {
        self.audio.lock().await.stop().await;
    }
}

/// Consumes transport events: connection-state changes, liveness failures
/// and server events for the reconciliation engine.
async fn run_event_pump(shared: Shared, mut event_rx: mpsc::UnboundedReceiver<WsEvent>) {
    while let Some(event) = event_rx.recv().await {
        match event {
            WsEvent::Connected => {
                shared.is_connected.store(true, Ordering::SeqCst);

                // Flush a parked prompt exactly once per connection.
                let pending = shared.pending_prompt.lock().await.take();
                if let Some(prompt) = pending {
                    shared
                        .ws
                        .lock()
                        .await
                        .send_control(ClientMessage::SuggestionsPrompt { prompt });
                }
            }

            WsEvent::Disconnected => {
                shared.is_connected.store(false, Ordering::SeqCst);

                // Closes we initiated are not errors.
                if shared
                    .expected_disconnects
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    continue;
                }

                if shared.is_recording.swap(false, Ordering::SeqCst) {
                    warn!("Connection lost while recording");
                    shared.stop_audio().await;
                    shared.state.lock().await.set_error(ErrorEvent {
                        ts: Utc::now().timestamp_millis(),
                        code: "CONNECTION_LOST".to_string(),
                        message: "Connection lost".to_string(),
                        retryable: Some(true),
                    });
                }
            }

            WsEvent::LivenessFailure => {
                warn!("Keepalive failed, reconnecting with a fresh session");
                // The socket task emits a trailing Disconnected for the
                // dead connection; swallow it.
                shared.expected_disconnects.fetch_add(1, Ordering::SeqCst);

                let was_recording = shared.is_recording.load(Ordering::SeqCst);
                if let Err(e) = shared.reconnect_session(was_recording).await {
                    error!("Automatic reconnect failed: {:#}", e);
                    shared.is_recording.store(false, Ordering::SeqCst);
                    shared.state.lock().await.set_error(ErrorEvent {
                        ts: Utc::now().timestamp_millis(),
                        code: "CONNECTION_LOST".to_string(),
                        message: "Connection lost".to_string(),
                        retryable: Some(true),
                    });
                }
            }

            WsEvent::Event(event) => {
                shared.state.lock().await.apply(event);
            }
        }
    }
}

/// Periodically expires stale partial transcripts from the live window.
async fn run_prune_timer(shared: Shared) {
    let mut ticker = tokio::time::interval(shared.config.prune_interval);
    loop {
        ticker.tick().await;
        if shared.is_recording.load(Ordering::SeqCst) {
            shared
                .state
                .lock()
                .await
                .prune_live(Utc::now().timestamp_millis());
        }
    }
}
