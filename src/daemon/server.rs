//! Daemon bootstrap and accept loop.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::ipc::{IpcServer, RequestHandler};
use super::runtime::{spawn_runtime, RuntimeParts};
use super::timer::{SessionEngine, SettingsSource};
use crate::activity::{IdleMonitor, SystemIdleSource};
use crate::notification::{spawn_notifier, DesktopNotifier};
use crate::sound::{try_create_output, AudioController};
use crate::store::{AppPaths, SettingsCache};

/// Capacity of the idle report queue.
const IDLE_REPORT_QUEUE_SIZE: usize = 16;

/// Runs the daemon until Ctrl-C.
///
/// Wires the engine runtime, the audio controller, the idle monitor and
/// desktop notifications, then serves IPC connections on the socket under
/// `paths`.
///
/// # Errors
///
/// Returns an error if the settings cannot be loaded or the socket cannot
/// be bound (for example because another daemon is running).
pub async fn run_daemon(paths: &AppPaths) -> Result<()> {
    paths
        .ensure_base_dir()
        .context("Failed to create application directory")?;

    let settings = Arc::new(
        SettingsCache::load(paths.settings_file()).context("Failed to load settings")?,
    );
    let initial = settings.current();

    let audio = Arc::new(AudioController::new(try_create_output()));
    audio.set_volume(initial.music_volume);

    let monitor = Arc::new(IdleMonitor::new(Arc::new(SystemIdleSource::new())));
    monitor.configure(initial.activity_monitoring, initial.activity_threshold);
    let (idle_tx, idle_rx) = mpsc::channel(IDLE_REPORT_QUEUE_SIZE);
    let monitor_task = monitor.spawn(idle_tx);

    let engine = SessionEngine::new(settings.clone());
    let (handle, runtime_task) = spawn_runtime(
        engine,
        RuntimeParts::new(Arc::clone(&audio), Arc::clone(&monitor), idle_rx),
    );

    let server = IpcServer::new(&paths.socket_path())?;
    info!("focusrun daemon listening on {}", server.socket_path().display());

    let notifier_task = spawn_notifier(Arc::new(DesktopNotifier::new()), handle.subscribe());

    let handler = Arc::new(
        RequestHandler::new(handle, Arc::clone(&audio), monitor).with_settings(settings),
    );
    serve(server, handler, shutdown_signal()).await;

    notifier_task.abort();
    monitor_task.abort();
    runtime_task.abort();
    audio.stop();
    info!("focusrun daemon stopped");
    Ok(())
}

/// Accepts connections until `shutdown` completes; one task per connection.
///
/// The socket file is removed when the server is dropped on return.
pub async fn serve<F>(server: IpcServer, handler: Arc<RequestHandler>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            accepted = server.accept() => {
                match accepted {
                    Ok(stream) => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            if let Err(e) = handler.serve_connection(stream).await {
                                warn!("Connection error: {:#}", e);
                            }
                        });
                    }
                    Err(e) => error!("{:#}", e),
                }
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
