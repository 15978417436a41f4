//! IPC client for communicating with the focusrun daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling
//! - Event stream for `subscribe`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::daemon::EngineEvent;
use crate::store::AppPaths;
use crate::types::{IpcRequest, IpcResponse, Session};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: u64 = 65536;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a client for the daemon socket under `paths`.
    pub fn new(paths: &AppPaths) -> Self {
        Self::with_socket_path(paths.socket_path())
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Loads a session into the engine.
    pub async fn load_session(&self, session: Session) -> Result<IpcResponse> {
        self.send(&IpcRequest::LoadSession { session }).await
    }

    /// Starts or resumes the timer.
    pub async fn start_timer(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::StartTimer).await
    }

    /// Pauses the timer.
    pub async fn pause_timer(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::PauseTimer).await
    }

    /// Stops the run.
    pub async fn stop_timer(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::StopTimer).await
    }

    /// Queries the timer status.
    pub async fn timer_status(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::GetTimerStatus).await
    }

    /// Plays a music file.
    pub async fn play_music(&self, file_path: String, loop_enabled: bool) -> Result<IpcResponse> {
        self.send(&IpcRequest::PlayMusic {
            file_path,
            loop_enabled,
        })
        .await
    }

    pub async fn pause_music(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::PauseMusic).await
    }

    pub async fn resume_music(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::ResumeMusic).await
    }

    pub async fn stop_music(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::StopMusic).await
    }

    pub async fn music_status(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::MusicStatus).await
    }

    /// Sets the music volume (0.0-1.0).
    pub async fn set_volume(&self, volume: f32) -> Result<IpcResponse> {
        self.send(&IpcRequest::SetVolume { volume }).await
    }

    /// Configures idle monitoring.
    pub async fn set_activity_monitoring(
        &self,
        enabled: bool,
        threshold_seconds: u64,
    ) -> Result<IpcResponse> {
        self.send(&IpcRequest::SetActivityMonitoring {
            enabled,
            threshold_seconds,
        })
        .await
    }

    /// Asks the daemon to re-read settings.json.
    pub async fn reload_settings(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::ReloadSettings).await
    }

    /// Queries the timer status once, without retrying.
    ///
    /// Returns `None` when no daemon is listening.
    pub async fn probe_status(&self) -> Option<IpcResponse> {
        match self.send_request(&IpcRequest::GetTimerStatus).await {
            Ok(response) if response.is_success() => Some(response),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Daemon not reachable: {:#}", e);
                None
            }
        }
    }

    /// Opens an event stream.
    ///
    /// The first line the daemon sends is an acknowledgement carrying the
    /// current status; it is returned alongside the stream.
    pub async fn subscribe(&self) -> Result<(IpcResponse, EventStream)> {
        let mut stream = self.connect().await?;
        write_request(&mut stream, &IpcRequest::Subscribe).await?;

        let (reader, writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        let ack_line = timeout(Duration::from_secs(IO_TIMEOUT_SECS), lines.next_line())
            .await
            .context("読み込みがタイムアウトしました")?
            .context("レスポンスの受信に失敗しました")?
            .context("Daemonからの応答がありませんでした")?;

        let ack: IpcResponse =
            serde_json::from_str(&ack_line).context("レスポンスのパースに失敗しました")?;
        let ack = into_result(ack)?;

        Ok((
            ack,
            EventStream {
                lines,
                _writer: writer,
            },
        ))
    }

    /// Sends a request and turns an error response into an error.
    async fn send(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let response = self.send_request_with_retry(request).await?;
        into_result(response)
    }

    /// Sends a request to the daemon with retry logic.
    ///
    /// Only transport failures are retried; an error response is returned
    /// as is.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut attempt = 1;
        loop {
            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!("リクエスト失敗 (試行 {}/{}): {}", attempt, MAX_RETRIES, e);
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a single request to the daemon.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = self.connect().await?;
        write_request(&mut stream, request).await?;

        // The daemon closes the connection after one response line.
        let mut buffer = Vec::new();
        let mut limited = (&mut stream).take(MAX_RESPONSE_SIZE);
        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            limited.read_to_end(&mut buffer),
        )
        .await
        .context("読み込みがタイムアウトしました")?
        .context("レスポンスの受信に失敗しました")?;

        if buffer.is_empty() {
            anyhow::bail!("Daemonからの応答がありませんでした");
        }

        serde_json::from_slice(buffer.trim_ascii_end()).context("レスポンスのパースに失敗しました")
    }

    async fn connect(&self) -> Result<UnixStream> {
        timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("接続がタイムアウトしました")?
            .context("Daemonに接続できません。'focusrun daemon' を起動してください")
    }
}

async fn write_request(stream: &mut UnixStream, request: &IpcRequest) -> Result<()> {
    let mut request_json =
        serde_json::to_vec(request).context("リクエストのシリアライズに失敗しました")?;
    request_json.push(b'\n');

    timeout(
        Duration::from_secs(IO_TIMEOUT_SECS),
        stream.write_all(&request_json),
    )
    .await
    .context("書き込みがタイムアウトしました")?
    .context("リクエストの送信に失敗しました")?;

    timeout(Duration::from_secs(IO_TIMEOUT_SECS), stream.flush())
        .await
        .context("フラッシュがタイムアウトしました")?
        .context("フラッシュに失敗しました")
}

fn into_result(response: IpcResponse) -> Result<IpcResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        anyhow::bail!("{}", response.message)
    }
}

// ============================================================================
// EventStream
// ============================================================================

/// Newline-delimited event stream opened by [`IpcClient::subscribe`].
///
/// Dropping the stream closes the connection, which ends the subscription
/// on the daemon side.
pub struct EventStream {
    lines: Lines<BufReader<OwnedReadHalf>>,
    _writer: OwnedWriteHalf,
}

impl EventStream {
    /// Waits for the next event. Returns `None` when the daemon closes the stream.
    pub async fn next_event(&mut self) -> Result<Option<EngineEvent>> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .context("イベントの受信に失敗しました")?
            else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).context("イベントのパースに失敗しました")?;
            return Ok(Some(event));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
