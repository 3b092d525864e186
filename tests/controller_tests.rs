use futures::{SinkExt, StreamExt};
use live_meeting_client::{
    MeetingConfig, MeetingController, SilenceCapture, SummaryStatus,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Minimal meeting server: records inbound text frames per connection and
/// lets tests push event JSON down the most recent connection.
struct TestServer {
    endpoint: String,
    frames: Arc<Mutex<Vec<String>>>,
    conns: Arc<Mutex<Vec<mpsc::UnboundedSender<String>>>>,
}

impl TestServer {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let frames: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let conns: Arc<Mutex<Vec<mpsc::UnboundedSender<String>>>> =
            Arc::new(Mutex::new(Vec::new()));

        let accept_frames = Arc::clone(&frames);
        let accept_conns = Arc::clone(&conns);
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let frames = Arc::clone(&accept_frames);
                let conns = Arc::clone(&accept_conns);
                tokio::spawn(handle_conn(stream, frames, conns));
            }
        });

        Self {
            endpoint,
            frames,
            conns,
        }
    }

    fn send_to_latest(&self, json: &str) {
        let conns = self.conns.lock().unwrap();
        conns
            .last()
            .expect("no connection yet")
            .send(json.to_string())
            .expect("connection gone");
    }

    fn text_frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    fn connection_count(&self) -> usize {
        self.conns.lock().unwrap().len()
    }
}

async fn handle_conn(
    stream: TcpStream,
    frames: Arc<Mutex<Vec<String>>>,
    conns: Arc<Mutex<Vec<mpsc::UnboundedSender<String>>>>,
) {
    let ws = accept_async(stream).await.unwrap();
    let (mut sink, mut source) = ws.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    conns.lock().unwrap().push(out_tx);

    loop {
        tokio::select! {
            outgoing = out_rx.recv() => match outgoing {
                Some(json) => {
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    frames.lock().unwrap().push(text.as_str().to_string());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
}

async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..250 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for: {what}");
}

fn test_meeting_config(endpoint: &str) -> MeetingConfig {
    MeetingConfig {
        endpoint: endpoint.to_string(),
        chunk_interval: Duration::from_millis(20),
        prune_interval: Duration::from_millis(50),
        ..MeetingConfig::default()
    }
}

/// Keepalive shrunk to milliseconds; the test server never answers pings,
/// so every connection dies of a pong timeout shortly after opening.
fn flaky_link_config(endpoint: &str) -> MeetingConfig {
    MeetingConfig {
        ping_interval: Duration::from_millis(50),
        pong_timeout: Duration::from_millis(100),
        ..test_meeting_config(endpoint)
    }
}

fn controller_for(endpoint: &str) -> MeetingController {
    MeetingController::new(
        test_meeting_config(endpoint),
        Box::new(SilenceCapture::new()),
    )
}

#[tokio::test]
async fn test_start_sends_session_start_and_uploads_audio() {
    let server = TestServer::spawn().await;
    let mut controller = controller_for(&server.endpoint);

    controller.start().await.unwrap();
    assert!(controller.is_recording());
    assert!(controller.session_id().await.is_some());

    wait_until("session.start frame", || async {
        server
            .text_frames()
            .iter()
            .any(|f| f.contains("session.start"))
    })
    .await;

    // Starting again is a no-op.
    controller.start().await.unwrap();
    assert_eq!(server.connection_count(), 1);

    controller.shutdown().await;
}

#[tokio::test]
async fn test_server_events_reach_engine_and_end_keeps_history() {
    let server = TestServer::spawn().await;
    let mut controller = controller_for(&server.endpoint);

    controller.start().await.unwrap();
    wait_until("connected", || async {
        controller.is_connected() && server.connection_count() == 1
    })
    .await;

    server.send_to_latest(
        r#"{"type":"transcript.final","ts":100,"sessionId":"s","speaker":"spk_1","text":"Hello","segmentId":1}"#,
    );

    wait_until("transcript applied", || async {
        controller.snapshot().await.transcripts.len() == 1
    })
    .await;

    controller.end().await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.transcripts.len(), 1);
    assert!(snapshot.live_transcripts.is_empty());
    assert!(snapshot.display.current.is_none());
    // An end we initiated is not a connection-lost error.
    assert!(snapshot.error.is_none());
    assert!(!controller.is_recording());
    assert!(controller.session_id().await.is_none());

    wait_until("session.stop frame", || async {
        server
            .text_frames()
            .iter()
            .any(|f| f.contains("session.stop"))
    })
    .await;

    controller.shutdown().await;
}

#[tokio::test]
async fn test_pending_prompt_flushes_once_after_connect() {
    let server = TestServer::spawn().await;
    let mut controller = controller_for(&server.endpoint);

    // Parked while disconnected.
    controller.send_suggestions_prompt("  focus on pricing  ").await;

    controller.start().await.unwrap();

    wait_until("prompt flushed", || async {
        server
            .text_frames()
            .iter()
            .any(|f| f.contains("suggestions.prompt"))
    })
    .await;

    let prompt_frames: Vec<String> = server
        .text_frames()
        .into_iter()
        .filter(|f| f.contains("suggestions.prompt"))
        .collect();
    assert_eq!(prompt_frames.len(), 1);
    assert!(prompt_frames[0].contains("focus on pricing"));
    // Trimmed before sending.
    assert!(!prompt_frames[0].contains("  focus"));

    // While connected, prompts go straight out.
    controller.send_suggestions_prompt("next topic").await;
    wait_until("second prompt", || async {
        server
            .text_frames()
            .iter()
            .filter(|f| f.contains("suggestions.prompt"))
            .count()
            == 2
    })
    .await;

    controller.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_issues_fresh_session_and_resets_live_only() {
    let server = TestServer::spawn().await;
    let mut controller = controller_for(&server.endpoint);

    controller.start().await.unwrap();
    wait_until("connected", || async {
        controller.is_connected() && server.connection_count() == 1
    })
    .await;
    let first_session = controller.session_id().await.unwrap();

    server.send_to_latest(
        r#"{"type":"transcript.final","ts":100,"sessionId":"s","speaker":"spk_1","text":"Kept","segmentId":1}"#,
    );
    server.send_to_latest(
        r#"{"type":"transcript.partial","ts":200,"sessionId":"s","speaker":"spk_1","text":"Gone","segmentId":2}"#,
    );

    wait_until("events applied", || async {
        let s = controller.snapshot().await;
        s.transcripts.len() == 1 && s.live_transcripts.len() == 2
    })
    .await;

    controller.reconnect().await.unwrap();
    wait_until("second connection", || async {
        server.connection_count() == 2 && controller.is_connected()
    })
    .await;

    let second_session = controller.session_id().await.unwrap();
    assert_ne!(first_session, second_session);
    assert!(controller.is_recording());

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.transcripts.len(), 1, "history survives reconnect");
    assert!(snapshot.live_transcripts.is_empty(), "live window resets");

    controller.shutdown().await;
}

#[tokio::test]
async fn test_pause_and_resume_keep_session() {
    let server = TestServer::spawn().await;
    let mut controller = controller_for(&server.endpoint);

    controller.start().await.unwrap();
    wait_until("connected", || async { controller.is_connected() }).await;
    let session = controller.session_id().await.unwrap();

    controller.pause().await;
    assert!(!controller.is_recording());
    assert!(controller.is_connected(), "pause keeps the socket");

    controller.resume().await.unwrap();
    assert!(controller.is_recording());
    assert_eq!(
        controller.session_id().await.unwrap(),
        session,
        "resume on a live socket keeps the session"
    );
    assert_eq!(server.connection_count(), 1);

    controller.shutdown().await;
}

#[tokio::test]
async fn test_summary_request_while_disconnected_is_an_error() {
    let server = TestServer::spawn().await;
    let controller = controller_for(&server.endpoint);

    controller.request_summary().await;

    let snapshot = controller.snapshot().await;
    let error = snapshot.error.expect("expected a status error");
    assert_eq!(error.code, "SUMMARY_UNAVAILABLE");
    assert_eq!(error.retryable, Some(false));
    assert_eq!(snapshot.summary.status, SummaryStatus::Idle);
}

#[tokio::test]
async fn test_summary_request_while_connected_sets_loading() {
    let server = TestServer::spawn().await;
    let mut controller = controller_for(&server.endpoint);

    controller.start().await.unwrap();
    wait_until("connected", || async {
        controller.is_connected() && server.connection_count() == 1
    })
    .await;

    controller.request_summary().await;
    assert_eq!(
        controller.snapshot().await.summary.status,
        SummaryStatus::Loading
    );

    wait_until("summary.request frame", || async {
        server
            .text_frames()
            .iter()
            .any(|f| f.contains("summary.request"))
    })
    .await;

    server.send_to_latest(
        r###"{"type":"summary.update","ts":1,"sessionId":"s","summaryMarkdown":"## 5줄 요약"}"###,
    );
    wait_until("summary ready", || async {
        controller.snapshot().await.summary.status == SummaryStatus::Ready
    })
    .await;

    controller.shutdown().await;
}

#[tokio::test]
async fn test_pong_timeout_reconnects_with_fresh_session() {
    let server = TestServer::spawn().await;
    let mut controller = MeetingController::new(
        flaky_link_config(&server.endpoint),
        Box::new(SilenceCapture::new()),
    );

    controller.start().await.unwrap();
    wait_until("connected", || async {
        controller.is_connected() && server.connection_count() == 1
    })
    .await;
    let first_session = controller.session_id().await.unwrap();

    // The server never pongs, so the pong timeout fires and the controller
    // recovers on its own with a new session.
    wait_until("automatic reconnect", || async {
        server.connection_count() >= 2 && controller.is_connected()
    })
    .await;

    assert!(controller.is_recording(), "recovery keeps recording");
    let second_session = controller.session_id().await.unwrap();
    assert_ne!(first_session, second_session, "session ids are never reused");
    assert!(
        controller.snapshot().await.error.is_none(),
        "a recovered liveness failure is not a user-facing error"
    );

    controller.shutdown().await;
}

#[tokio::test]
async fn test_pong_timeout_while_paused_stays_paused() {
    let server = TestServer::spawn().await;
    let mut controller = MeetingController::new(
        flaky_link_config(&server.endpoint),
        Box::new(SilenceCapture::new()),
    );

    controller.start().await.unwrap();
    wait_until("connected", || async {
        controller.is_connected() && server.connection_count() == 1
    })
    .await;

    controller.pause().await;
    assert!(!controller.is_recording());

    wait_until("reconnect while paused", || async {
        server.connection_count() >= 2 && controller.is_connected()
    })
    .await;

    assert!(
        !controller.is_recording(),
        "recovery must not resume a paused meeting"
    );
    assert!(controller.snapshot().await.error.is_none());

    controller.shutdown().await;
}

#[tokio::test]
async fn test_stale_partials_are_pruned_while_recording() {
    let server = TestServer::spawn().await;
    let mut controller = controller_for(&server.endpoint);

    controller.start().await.unwrap();
    wait_until("connected", || async {
        controller.is_connected() && server.connection_count() == 1
    })
    .await;

    // A partial stamped far in the past is past its TTL immediately; one
    // stamped now survives pruning.
    let now = chrono::Utc::now().timestamp_millis();
    server.send_to_latest(
        r#"{"type":"transcript.partial","ts":1,"sessionId":"s","speaker":"spk_1","text":"old","segmentId":1}"#,
    );
    server.send_to_latest(&format!(
        r#"{{"type":"transcript.partial","ts":{now},"sessionId":"s","speaker":"spk_1","text":"fresh","segmentId":2}}"#,
    ));

    wait_until("stale partial pruned", || async {
        let live = controller.snapshot().await.live_transcripts;
        live.len() == 1 && live[0].segment_id == 2
    })
    .await;

    controller.shutdown().await;
}
