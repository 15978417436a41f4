//! IPC server for the focusrun daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for engine, music and monitoring commands
//! - Event streaming for `subscribe` connections
//!
//! Every connection carries one JSON request. The daemon answers with one
//! JSON response line and closes the connection, except for `subscribe`,
//! which keeps the connection open and writes one event per line until the
//! client disconnects.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::activity::IdleMonitor;
use crate::sound::AudioController;
use crate::store::SettingsCache;
use crate::types::{
    clamp_volume, IpcRequest, IpcResponse, ResponseData, MAX_ACTIVITY_THRESHOLD_SECS,
    MIN_ACTIVITY_THRESHOLD_SECS,
};

use super::error::EngineError;
use super::runtime::{EngineHandle, StatusView};

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (64KB)
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

/// Read chunk size
const READ_CHUNK_SIZE: usize = 4096;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Another daemon owns the socket
    #[error("デーモンは既に起動しています: {0}")]
    AlreadyRunning(String),

    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Write error
    #[error("Failed to write response: {0}")]
    WriteError(String),

    /// The request is not valid JSON or not a known command
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The client closed the connection before sending a request
    #[error("Connection closed by client")]
    ConnectionClosed,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

impl IpcError {
    /// Machine-readable code used in IPC error responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRunning(_) => "already_running",
            Self::InvalidRequest(_) => "invalid_request",
            Self::RequestTooLarge => "request_too_large",
            Self::Timeout => "timeout",
            Self::ReadError(_) | Self::WriteError(_) | Self::ConnectionClosed => "io_error",
        }
    }
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// A stale socket file is removed before binding. A socket that still
    /// accepts connections belongs to a running daemon and is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if another daemon is running or the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            if std::os::unix::net::UnixStream::connect(socket_path).is_ok() {
                return Err(IpcError::AlreadyRunning(socket_path.display().to_string()).into());
            }
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove stale socket: {:?}", socket_path))?;
            debug!("Removed stale socket: {}", socket_path.display());
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until a complete JSON value has arrived or the client closes
    /// its write side. Each read is bounded by the read timeout.
    ///
    /// # Errors
    ///
    /// Returns an `IpcError` if reading fails, times out, exceeds the size
    /// limit, or the request is not valid.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest, IpcError> {
        let mut buffer = Vec::with_capacity(READ_CHUNK_SIZE);
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let n = match timeout(
                Duration::from_secs(READ_TIMEOUT_SECS),
                stream.read(&mut chunk),
            )
            .await
            {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string())),
                Err(_) => return Err(IpcError::Timeout),
            };

            if n == 0 {
                if buffer.is_empty() {
                    return Err(IpcError::ConnectionClosed);
                }
                return serde_json::from_slice(&buffer)
                    .map_err(|e| IpcError::InvalidRequest(e.to_string()));
            }

            buffer.extend_from_slice(&chunk[..n]);
            if buffer.len() > MAX_REQUEST_SIZE {
                return Err(IpcError::RequestTooLarge);
            }

            match serde_json::from_slice::<IpcRequest>(&buffer) {
                Ok(request) => return Ok(request),
                Err(e) if e.is_eof() => continue,
                Err(e) => return Err(IpcError::InvalidRequest(e.to_string())),
            }
        }
    }

    /// Serializes and sends an IPC response as one line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response<W>(stream: &mut W, response: &IpcResponse) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;
        json.push(b'\n');

        stream
            .write_all(&json)
            .await
            .map_err(|e| IpcError::WriteError(e.to_string()))?;
        stream.flush().await.context("Failed to flush response")?;

        Ok(())
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        // Clean up socket file on drop
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the engine, the audio controller
/// and the idle monitor.
pub struct RequestHandler {
    engine: EngineHandle,
    audio: Arc<AudioController>,
    monitor: Arc<IdleMonitor>,
    settings: Option<Arc<SettingsCache>>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(engine: EngineHandle, audio: Arc<AudioController>, monitor: Arc<IdleMonitor>) -> Self {
        Self {
            engine,
            audio,
            monitor,
            settings: None,
        }
    }

    /// Attaches the settings cache refreshed by `reload_settings`.
    #[must_use]
    pub fn with_settings(mut self, settings: Arc<SettingsCache>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Serves one client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the response or an event cannot be written.
    pub async fn serve_connection(&self, mut stream: UnixStream) -> Result<()> {
        let request = match IpcServer::receive_request(&mut stream).await {
            Ok(request) => request,
            Err(IpcError::ConnectionClosed) => return Ok(()),
            Err(e) => {
                warn!("Rejected request: {}", e);
                let response = IpcResponse::error_with_code(e.code(), e.to_string());
                return IpcServer::send_response(&mut stream, &response).await;
            }
        };

        debug!("Request: {:?}", request);
        if matches!(request, IpcRequest::Subscribe) {
            return self.stream_events(stream).await;
        }

        let response = self.handle(request).await;
        IpcServer::send_response(&mut stream, &response).await
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::LoadSession { session } => {
                let result = self.engine.load_session(session).await;
                engine_response(result, "セッションを読み込みました")
            }
            IpcRequest::StartTimer => {
                engine_response(self.engine.start_timer().await, "タイマーを開始しました")
            }
            IpcRequest::PauseTimer => {
                engine_response(self.engine.pause_timer().await, "タイマーを一時停止しました")
            }
            IpcRequest::StopTimer => {
                engine_response(self.engine.stop_timer().await, "タイマーを停止しました")
            }
            IpcRequest::GetTimerStatus => {
                let StatusView { phase, timer } = self.engine.status();
                IpcResponse::success("", Some(ResponseData::from_timer(phase, timer)))
            }
            IpcRequest::PlayMusic {
                file_path,
                loop_enabled,
            } => self.handle_play_music(file_path, loop_enabled).await,
            IpcRequest::PauseMusic => {
                self.audio.pause();
                self.music_response("音楽を一時停止しました")
            }
            IpcRequest::ResumeMusic => {
                self.audio.resume();
                self.music_response("音楽を再開しました")
            }
            IpcRequest::StopMusic => {
                self.audio.stop();
                self.music_response("音楽を停止しました")
            }
            IpcRequest::MusicStatus => self.music_response(""),
            IpcRequest::SetVolume { volume } => {
                let volume = clamp_volume(volume);
                self.audio.set_volume(volume);
                self.music_response(format!("音量を{}%に設定しました", (volume * 100.0).round()))
            }
            IpcRequest::SetActivityMonitoring {
                enabled,
                threshold_seconds,
            } => {
                let threshold = threshold_seconds
                    .clamp(MIN_ACTIVITY_THRESHOLD_SECS, MAX_ACTIVITY_THRESHOLD_SECS);
                self.monitor.configure(enabled, threshold);
                let message = if enabled {
                    format!("アイドル監視を有効にしました（{}秒）", threshold)
                } else {
                    "アイドル監視を無効にしました".to_string()
                };
                IpcResponse::success(message, None)
            }
            IpcRequest::ReloadSettings => self.handle_reload_settings().await,
            IpcRequest::Subscribe => IpcResponse::error_with_code(
                "invalid_request",
                "subscribe はイベントストリーム接続でのみ使用できます",
            ),
        }
    }

    /// Plays a music file. Failures leave the timer untouched.
    async fn handle_play_music(&self, file_path: String, loop_enabled: bool) -> IpcResponse {
        let audio = Arc::clone(&self.audio);
        let result =
            tokio::task::spawn_blocking(move || audio.play(&file_path, loop_enabled)).await;

        match result {
            Ok(Ok(())) => self.music_response("音楽を再生しています"),
            Ok(Err(e)) => IpcResponse::error_with_code(e.code(), e.to_string()),
            Err(e) => IpcResponse::error(format!("音楽の再生に失敗しました: {}", e)),
        }
    }

    /// Refreshes the settings cache on the blocking pool.
    async fn handle_reload_settings(&self) -> IpcResponse {
        let Some(cache) = self.settings.as_ref().map(Arc::clone) else {
            return IpcResponse::error_with_code(
                "settings_unavailable",
                "このDaemonは設定ファイルを使用していません",
            );
        };

        match tokio::task::spawn_blocking(move || cache.reload()).await {
            Ok(Ok(_)) => IpcResponse::success("設定を再読み込みしました", None),
            Ok(Err(e)) => {
                warn!("Settings reload failed: {}", e);
                IpcResponse::error_with_code("settings_unavailable", e.to_string())
            }
            Err(e) => IpcResponse::error(format!("設定の再読み込みに失敗しました: {}", e)),
        }
    }

    fn music_response(&self, message: impl Into<String>) -> IpcResponse {
        IpcResponse::success(message, Some(ResponseData::from_music(self.audio.status())))
    }

    /// Streams engine events as JSON lines until the client goes away.
    async fn stream_events(&self, stream: UnixStream) -> Result<()> {
        let mut subscription = self.engine.subscribe();
        let (mut reader, mut writer) = stream.into_split();
        info!("Subscriber {} connected", subscription.id());

        let StatusView { phase, timer } = self.engine.status();
        let ack = IpcResponse::success("購読を開始しました", Some(ResponseData::from_timer(phase, timer)));
        IpcServer::send_response(&mut writer, &ack).await?;

        let mut scratch = [0u8; 64];
        loop {
            tokio::select! {
                event = subscription.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    let mut line = serde_json::to_vec(&event).context("Failed to serialize event")?;
                    line.push(b'\n');
                    if writer.write_all(&line).await.is_err() {
                        break;
                    }
                }
                read = reader.read(&mut scratch) => {
                    match read {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            }
        }

        info!("Subscriber {} disconnected", subscription.id());
        subscription.cancel();
        Ok(())
    }
}

fn engine_response(result: Result<StatusView, EngineError>, message: &str) -> IpcResponse {
    match result {
        Ok(StatusView { phase, timer }) => {
            IpcResponse::success(message, Some(ResponseData::from_timer(phase, timer)))
        }
        Err(e) => IpcResponse::error_with_code(e.code(), e.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
