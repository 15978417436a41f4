//! Integration tests for daemon-CLI IPC communication.
//!
//! Each test runs the daemon pieces in-process (runtime, idle monitor,
//! audio controller over a mock output, accept loop) on a temporary
//! socket and talks to them through the real client.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use focusrun::activity::{IdleMonitor, MockIdleSource};
use focusrun::cli::client::{EventStream, IpcClient};
use focusrun::notification::{spawn_notifier, MockNotifier};
use focusrun::daemon::{
    serve, spawn_runtime, EngineEvent, FixedSettings, IpcServer, RequestHandler, RuntimeParts,
    SessionEngine,
};
use focusrun::sound::{AudioController, MockAudioOutput};
use focusrun::types::{IpcRequest, IpcResponse, Session, Settings, Task};

// ============================================================================
// Test Helpers
// ============================================================================

/// In-process daemon bound to a temporary socket.
struct TestDaemon {
    socket_path: PathBuf,
    audio: Arc<MockAudioOutput>,
    idle: Arc<MockIdleSource>,
    notifier: Arc<MockNotifier>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    _dir: tempfile::TempDir,
}

impl TestDaemon {
    async fn start(tick_period: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("focusrun.sock");

        let audio = Arc::new(MockAudioOutput::new());
        let controller = Arc::new(AudioController::new(audio.clone()));

        let idle = Arc::new(MockIdleSource::new());
        let monitor = Arc::new(
            IdleMonitor::new(idle.clone()).with_poll_interval(Duration::from_millis(10)),
        );
        let (idle_tx, idle_rx) = mpsc::channel(16);
        monitor.spawn(idle_tx);

        let engine = SessionEngine::new(Arc::new(FixedSettings::new(Settings::default())));
        let mut parts = RuntimeParts::new(controller.clone(), monitor.clone(), idle_rx);
        parts.tick_period = tick_period;
        let (handle, _runtime) = spawn_runtime(engine, parts);

        let notifier = Arc::new(MockNotifier::new());
        spawn_notifier(notifier.clone(), handle.subscribe());

        let handler = Arc::new(RequestHandler::new(handle, controller, monitor));
        let server = IpcServer::new(&socket_path).unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(server, handler, async {
            let _ = stop_rx.await;
        }));

        Self {
            socket_path,
            audio,
            idle,
            notifier,
            stop: Some(stop_tx),
            task: Some(task),
            _dir: dir,
        }
    }

    fn client(&self) -> IpcClient {
        IpcClient::with_socket_path(self.socket_path.clone())
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            task.await.unwrap();
        }
    }
}

/// Sends a raw request and returns the parsed response, error or not.
async fn raw_request(socket_path: &Path, request: &IpcRequest) -> IpcResponse {
    let mut body = serde_json::to_vec(request).unwrap();
    body.push(b'\n');
    raw_bytes(socket_path, &body).await
}

async fn raw_bytes(socket_path: &Path, body: &[u8]) -> IpcResponse {
    let mut stream = UnixStream::connect(socket_path).await.unwrap();
    stream.write_all(body).await.unwrap();
    let mut raw = String::new();
    timeout(Duration::from_secs(5), stream.read_to_string(&mut raw))
        .await
        .unwrap()
        .unwrap();
    serde_json::from_str(raw.trim_end()).unwrap()
}

fn one_minute_session() -> Session {
    Session::new(
        "Sprint",
        vec![Task::work("Write", 1), Task::rest("Stretch", 1)],
    )
}

/// Collects events until `stop` matches, with an overall deadline.
async fn collect_until<F>(events: &mut EventStream, stop: F) -> Vec<EngineEvent>
where
    F: Fn(&EngineEvent) -> bool,
{
    let mut seen = Vec::new();
    timeout(Duration::from_secs(10), async {
        while let Some(event) = events.next_event().await.unwrap() {
            let done = stop(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .expect("timed out waiting for events");
    seen
}

// ============================================================================
// Timer control
// ============================================================================

#[tokio::test]
async fn test_load_start_status_roundtrip() {
    let daemon = TestDaemon::start(Duration::from_secs(1)).await;
    let client = daemon.client();

    let loaded = client.load_session(one_minute_session()).await.unwrap();
    let data = loaded.data.unwrap();
    assert_eq!(data.state.as_deref(), Some("loaded"));
    let timer = data.timer.unwrap();
    assert_eq!(timer.remaining_seconds, 60);
    assert_eq!(timer.task_count, 2);
    assert!(!timer.is_running);

    let started = client.start_timer().await.unwrap();
    assert_eq!(started.data.unwrap().state.as_deref(), Some("running"));

    let status = client.timer_status().await.unwrap();
    let data = status.data.unwrap();
    assert_eq!(data.state.as_deref(), Some("running"));
    assert!(data.timer.unwrap().is_running);

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_start_without_session_is_rejected() {
    let daemon = TestDaemon::start(Duration::from_secs(1)).await;

    let response = raw_request(&daemon.socket_path, &IpcRequest::StartTimer).await;
    assert!(!response.is_success());
    assert_eq!(response.code.as_deref(), Some("no_session_loaded"));

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_load_empty_session_is_rejected() {
    let daemon = TestDaemon::start(Duration::from_secs(1)).await;

    let request = IpcRequest::LoadSession {
        session: Session::new("Empty", Vec::new()),
    };
    let response = raw_request(&daemon.socket_path, &request).await;
    assert_eq!(response.code.as_deref(), Some("invalid_session"));

    let status = daemon.client().timer_status().await.unwrap();
    assert_eq!(status.data.unwrap().state.as_deref(), Some("idle"));

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_pause_freezes_remaining_time() {
    let daemon = TestDaemon::start(Duration::from_millis(5)).await;
    let client = daemon.client();

    client
        .load_session(Session::new("Long", vec![Task::work("Write", 180)]))
        .await
        .unwrap();
    client.start_timer().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let paused = client.pause_timer().await.unwrap();
    let data = paused.data.unwrap();
    assert_eq!(data.state.as_deref(), Some("paused"));
    let frozen = data.timer.unwrap().remaining_seconds;
    assert!(frozen < 180 * 60);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let status = client.timer_status().await.unwrap();
    let timer = status.data.unwrap().timer.unwrap();
    assert_eq!(timer.remaining_seconds, frozen);
    assert!(!timer.is_running);

    daemon.shutdown().await;
}

// ============================================================================
// Event stream
// ============================================================================

#[tokio::test]
async fn test_full_session_event_sequence() {
    let daemon = TestDaemon::start(Duration::from_millis(1)).await;
    let client = daemon.client();

    let (_ack, mut events) = client.subscribe().await.unwrap();
    client.load_session(one_minute_session()).await.unwrap();
    client.start_timer().await.unwrap();

    let seen = collect_until(&mut events, |e| {
        matches!(e, EngineEvent::SessionFinished { .. })
    })
    .await;

    let updates: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            EngineEvent::TimerUpdate(timer) => Some(timer),
            _ => None,
        })
        .collect();
    // load + start + 59 ticks + task change + 59 ticks + final
    assert_eq!(updates.len(), 122);

    let changes: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e, EngineEvent::TaskChanged { .. }))
        .collect();
    assert_eq!(changes.len(), 1);
    assert!(matches!(
        changes[0],
        EngineEvent::TaskChanged { index: 1, is_break: true, .. }
    ));

    let last = updates.last().unwrap();
    assert_eq!(last.remaining_seconds, 0);
    assert!(!last.is_running);
    assert_eq!(last.current_task_index, 1);

    let status = client.timer_status().await.unwrap();
    assert_eq!(status.data.unwrap().state.as_deref(), Some("finished"));

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_session_notifications_and_bells() {
    let daemon = TestDaemon::start(Duration::from_millis(1)).await;
    let client = daemon.client();

    let (_ack, mut events) = client.subscribe().await.unwrap();
    client.load_session(one_minute_session()).await.unwrap();
    client.start_timer().await.unwrap();
    collect_until(&mut events, |e| {
        matches!(e, EngineEvent::SessionFinished { .. })
    })
    .await;

    // Notifications and bells are delivered off the engine task.
    timeout(Duration::from_secs(5), async {
        while daemon.notifier.shown().len() < 2 || daemon.audio.bell_count() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("notifications were not delivered");

    let shown = daemon.notifier.shown();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].title, "タスク完了");
    assert_eq!(shown[0].body, "次: [休憩] Stretch");
    assert_eq!(shown[1].title, "セッション完了");
    assert_eq!(daemon.audio.bell_count(), 2);

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_stop_emits_timer_stopped() {
    let daemon = TestDaemon::start(Duration::from_secs(1)).await;
    let client = daemon.client();

    let (_ack, mut events) = client.subscribe().await.unwrap();
    let session = one_minute_session();
    client.load_session(session.clone()).await.unwrap();
    client.start_timer().await.unwrap();
    let stopped = client.stop_timer().await.unwrap();
    assert_eq!(stopped.data.unwrap().state.as_deref(), Some("idle"));

    let seen = collect_until(&mut events, |e| {
        matches!(e, EngineEvent::TimerStopped { .. })
    })
    .await;
    match seen.last() {
        Some(EngineEvent::TimerStopped { session_id }) => assert_eq!(session_id, &session.id),
        other => panic!("Expected TimerStopped, got {:?}", other),
    }

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_activity_warning_once_per_idle_episode() {
    let daemon = TestDaemon::start(Duration::from_secs(1)).await;
    let client = daemon.client();
    daemon.idle.set_idle(Duration::from_secs(120));

    let (_ack, mut events) = client.subscribe().await.unwrap();
    client.load_session(one_minute_session()).await.unwrap();
    client.start_timer().await.unwrap();
    client.set_activity_monitoring(true, 60).await.unwrap();

    let seen = collect_until(&mut events, |e| {
        matches!(e, EngineEvent::ActivityWarning { .. })
    })
    .await;
    match seen.last() {
        Some(EngineEvent::ActivityWarning {
            idle_seconds,
            threshold_seconds,
        }) => {
            assert_eq!(*idle_seconds, 120);
            assert_eq!(*threshold_seconds, 60);
        }
        other => panic!("Expected ActivityWarning, got {:?}", other),
    }

    // The episode continues; further reports must stay silent.
    let extra = timeout(Duration::from_millis(200), async {
        loop {
            match events.next_event().await.unwrap() {
                Some(EngineEvent::ActivityWarning { .. }) => return true,
                Some(_) => continue,
                None => return false,
            }
        }
    })
    .await;
    assert!(extra.is_err(), "a second warning was emitted in one idle episode");

    daemon.shutdown().await;
}

// ============================================================================
// Music
// ============================================================================

#[tokio::test]
async fn test_missing_music_file_keeps_timer_running() {
    let daemon = TestDaemon::start(Duration::from_millis(5)).await;
    let client = daemon.client();
    daemon.audio.mark_unavailable("/nonexistent/missing.mp3");

    client
        .load_session(Session::new("Long", vec![Task::work("Write", 180)]))
        .await
        .unwrap();
    client.start_timer().await.unwrap();

    let response = raw_request(
        &daemon.socket_path,
        &IpcRequest::PlayMusic {
            file_path: "/nonexistent/missing.mp3".to_string(),
            loop_enabled: false,
        },
    )
    .await;
    assert!(!response.is_success());
    assert_eq!(response.code.as_deref(), Some("audio_source_unavailable"));

    let before = client.timer_status().await.unwrap().data.unwrap().timer.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let status = client.timer_status().await.unwrap();
    let data = status.data.unwrap();
    assert_eq!(data.state.as_deref(), Some("running"));
    let after = data.timer.unwrap();
    assert!(after.is_running);
    assert!(after.remaining_seconds < before.remaining_seconds);

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_music_controls() {
    let daemon = TestDaemon::start(Duration::from_secs(1)).await;
    let client = daemon.client();

    let playing = client
        .play_music("/music/rain.mp3".to_string(), true)
        .await
        .unwrap();
    let music = playing.data.unwrap().music.unwrap();
    assert_eq!(music.state.as_str(), "playing");
    assert!(music.loop_enabled);

    let paused = client.pause_music().await.unwrap();
    assert_eq!(paused.data.unwrap().music.unwrap().state.as_str(), "paused");

    let resumed = client.resume_music().await.unwrap();
    assert_eq!(resumed.data.unwrap().music.unwrap().state.as_str(), "playing");

    let volume = client.set_volume(0.25).await.unwrap();
    assert_eq!(volume.data.unwrap().music.unwrap().volume, 0.25);

    let stopped = client.stop_music().await.unwrap();
    assert_eq!(stopped.data.unwrap().music.unwrap().state.as_str(), "stopped");

    assert_eq!(daemon.audio.play_count(), 1);
    daemon.shutdown().await;
}

// ============================================================================
// Protocol errors
// ============================================================================

#[tokio::test]
async fn test_malformed_request_gets_error_response() {
    let daemon = TestDaemon::start(Duration::from_secs(1)).await;

    let response = raw_bytes(&daemon.socket_path, b"{\"command\":\"dance\"}\n").await;
    assert!(!response.is_success());
    assert_eq!(response.code.as_deref(), Some("invalid_request"));

    // The server keeps serving after a bad request.
    assert!(daemon.client().timer_status().await.is_ok());

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_second_server_on_live_socket_is_refused() {
    let daemon = TestDaemon::start(Duration::from_secs(1)).await;

    let second = IpcServer::new(&daemon.socket_path);
    assert!(second.is_err());

    daemon.shutdown().await;
}

#[tokio::test]
async fn test_client_without_daemon_fails() {
    let dir = tempfile::tempdir().unwrap();
    let client = IpcClient::with_socket_path(dir.path().join("absent.sock"));

    assert!(client.timer_status().await.is_err());
    assert!(client.probe_status().await.is_none());
}
