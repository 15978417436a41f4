//! Command execution for the focusrun CLI.
//!
//! Session and settings commands work on the local stores; timer and music
//! commands go to the daemon over IPC. `monitor` and `music volume` save
//! first and then push to a running daemon, like `settings set`.

use anyhow::{Context, Result};
use clap::CommandFactory;

use crate::cli::client::IpcClient;
use crate::cli::commands::{
    Cli, Commands, MonitorArgs, MusicCommand, SessionCommand, SettingsCommand, SettingsSetArgs,
};
use crate::cli::display::Display;
use crate::store::{AppPaths, SessionStore, SettingsStore};
use crate::types::{IpcResponse, Session, Settings};

/// Executes a client command. `daemon` is handled by the caller.
pub async fn execute(command: Option<Commands>, paths: &AppPaths) -> Result<()> {
    match command {
        Some(Commands::Session { command }) => run_session(command, paths).await,
        Some(Commands::Load { id }) => {
            let store = SessionStore::open(paths.sessions_file())?;
            let session = store.resolve(&id)?.clone();
            let response = IpcClient::new(paths).load_session(session).await?;
            Display::show_timer_result(&response);
            Ok(())
        }
        Some(Commands::Start) => {
            let response = IpcClient::new(paths).start_timer().await?;
            Display::show_timer_result(&response);
            Ok(())
        }
        Some(Commands::Pause) => {
            let response = IpcClient::new(paths).pause_timer().await?;
            Display::show_timer_result(&response);
            Ok(())
        }
        Some(Commands::Stop) => {
            let response = IpcClient::new(paths).stop_timer().await?;
            Display::show_timer_result(&response);
            Ok(())
        }
        Some(Commands::Status) => {
            let response = IpcClient::new(paths).timer_status().await?;
            Display::show_status(&response);
            Ok(())
        }
        Some(Commands::Watch) => watch(paths).await,
        Some(Commands::Music { command }) => run_music(command, paths).await,
        Some(Commands::Monitor(args)) => run_monitor(args, paths).await,
        Some(Commands::Settings { command }) => run_settings(command, paths).await,
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
            Ok(())
        }
        Some(Commands::Daemon) => anyhow::bail!("daemon はこの経路では実行できません"),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

// ============================================================================
// Sessions
// ============================================================================

async fn run_session(command: SessionCommand, paths: &AppPaths) -> Result<()> {
    paths.ensure_base_dir()?;
    let mut store = SessionStore::open(paths.sessions_file())?;

    match command {
        SessionCommand::Add(args) => {
            let session = Session::new(args.name, args.tasks);
            store.add(session.clone())?;
            Display::show_session_saved("セッションを作成しました", &session);
        }
        SessionCommand::List => Display::show_session_list(store.list()),
        SessionCommand::Show { id } => Display::show_session(store.resolve(&id)?),
        SessionCommand::Rename { id, name } => {
            let mut session = store.resolve(&id)?.clone();
            ensure_not_in_use(paths, &session).await?;
            session.name = name;
            store.update(session.clone())?;
            Display::show_session_saved("セッション名を変更しました", &session);
        }
        SessionCommand::Delete { id } => {
            let session = store.resolve(&id)?.clone();
            ensure_not_in_use(paths, &session).await?;
            let removed = store.delete(&session.id)?;
            Display::show_session_saved("セッションを削除しました", &removed);
        }
    }
    Ok(())
}

/// Refuses to edit a session the daemon is running or has paused.
async fn ensure_not_in_use(paths: &AppPaths, session: &Session) -> Result<()> {
    let Some(status) = IpcClient::new(paths).probe_status().await else {
        return Ok(());
    };
    if is_session_in_use(&status, &session.id) {
        anyhow::bail!(
            "セッション '{}' は実行中のため変更できません。先に 'focusrun stop' を実行してください",
            session.name
        );
    }
    Ok(())
}

/// Returns true when a status response shows `session_id` running or paused.
pub fn is_session_in_use(status: &IpcResponse, session_id: &str) -> bool {
    let Some(data) = &status.data else {
        return false;
    };
    let active = matches!(data.state.as_deref(), Some("running") | Some("paused"));
    active
        && data
            .timer
            .as_ref()
            .is_some_and(|timer| timer.session_id == session_id)
}

// ============================================================================
// Timer events
// ============================================================================

async fn watch(paths: &AppPaths) -> Result<()> {
    let (ack, mut events) = IpcClient::new(paths).subscribe().await?;
    Display::show_timer_result(&ack);

    loop {
        tokio::select! {
            event = events.next_event() => {
                match event? {
                    Some(event) => println!("{}", Display::format_event(&event)),
                    None => {
                        Display::show_warning("Daemonとの接続が終了しました");
                        return Ok(());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

// ============================================================================
// Music
// ============================================================================

async fn run_music(command: MusicCommand, paths: &AppPaths) -> Result<()> {
    let client = IpcClient::new(paths);

    let response = match command {
        MusicCommand::Play { path, loop_enabled } => {
            let settings = SettingsStore::load(paths.settings_file())?.settings().clone();
            let (file_path, loop_enabled) = resolve_play_target(path, loop_enabled, &settings)?;
            client.play_music(file_path, loop_enabled).await?
        }
        MusicCommand::Pause => client.pause_music().await?,
        MusicCommand::Resume => client.resume_music().await?,
        MusicCommand::Stop => client.stop_music().await?,
        MusicCommand::Status => client.music_status().await?,
        MusicCommand::Volume { volume } => {
            paths.ensure_base_dir()?;
            let mut store = SettingsStore::load(paths.settings_file())?;
            let settings = store.update(|s| s.music_volume = volume)?.clone();
            Display::show_success(&format!(
                "音量を{}%で保存しました",
                Display::volume_percent(settings.music_volume)
            ));
            push_settings(paths, &SettingsPush::volume(), &settings).await;
            return Ok(());
        }
    };

    Display::show_music_result(&response);
    Ok(())
}

/// Picks the file and loop flag for `music play`, falling back to settings.
pub fn resolve_play_target(
    path: Option<String>,
    loop_flag: bool,
    settings: &Settings,
) -> Result<(String, bool)> {
    match path {
        Some(path) => Ok((path, loop_flag)),
        None => {
            let path = settings.music_file_path.clone().context(
                "音楽ファイルが指定されていません。パスを渡すか 'focusrun settings set --music-file' で設定してください",
            )?;
            Ok((path, loop_flag || settings.music_loop))
        }
    }
}

// ============================================================================
// Monitor / Settings
// ============================================================================

async fn run_monitor(args: MonitorArgs, paths: &AppPaths) -> Result<()> {
    paths.ensure_base_dir()?;
    let mut store = SettingsStore::load(paths.settings_file())?;
    let enabled = args.enable && !args.disable;
    let threshold = args
        .threshold
        .unwrap_or(store.settings().activity_threshold);

    let settings = store
        .update(|s| {
            s.activity_monitoring = enabled;
            s.activity_threshold = threshold;
        })?
        .clone();
    Display::show_success(if enabled {
        "アイドル監視を有効にして保存しました"
    } else {
        "アイドル監視を無効にして保存しました"
    });
    push_settings(paths, &SettingsPush::monitoring(), &settings).await;
    Ok(())
}

async fn run_settings(command: SettingsCommand, paths: &AppPaths) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let store = SettingsStore::load(paths.settings_file())?;
            Display::show_settings(store.settings());
        }
        SettingsCommand::Set(args) => {
            if args.is_empty() {
                anyhow::bail!("変更する設定を1つ以上指定してください (例: --music-volume 0.7)");
            }
            paths.ensure_base_dir()?;
            let mut store = SettingsStore::load(paths.settings_file())?;
            let settings = store.update(|s| apply_settings(s, &args))?.clone();
            Display::show_success("設定を保存しました");
            Display::show_settings(&settings);
            push_settings(paths, &SettingsPush::from_args(&args), &settings).await;
        }
    }
    Ok(())
}

/// Applies the given options to `settings`.
pub fn apply_settings(settings: &mut Settings, args: &SettingsSetArgs) {
    if let Some(enabled) = args.activity_monitoring {
        settings.activity_monitoring = enabled;
    }
    if let Some(threshold) = args.activity_threshold {
        settings.activity_threshold = threshold;
    }
    if let Some(volume) = args.music_volume {
        settings.music_volume = volume;
    }
    if let Some(path) = &args.music_file {
        settings.music_file_path = Some(path.clone());
    }
    if args.clear_music_file {
        settings.music_file_path = None;
    }
    if let Some(auto_play) = args.music_auto_play {
        settings.music_auto_play = auto_play;
    }
    if let Some(loop_enabled) = args.music_loop {
        settings.music_loop = loop_enabled;
    }
}

/// Which saved settings need to reach a running daemon right away.
///
/// The daemon's settings cache is always refreshed; volume and monitoring
/// are also applied live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsPush {
    pub volume: bool,
    pub monitoring: bool,
}

impl SettingsPush {
    #[must_use]
    pub fn volume() -> Self {
        Self {
            volume: true,
            monitoring: false,
        }
    }

    #[must_use]
    pub fn monitoring() -> Self {
        Self {
            volume: false,
            monitoring: true,
        }
    }

    #[must_use]
    pub fn from_args(args: &SettingsSetArgs) -> Self {
        Self {
            volume: args.music_volume.is_some(),
            monitoring: args.activity_monitoring.is_some() || args.activity_threshold.is_some(),
        }
    }
}

/// Forwards saved settings to a running daemon, if any.
///
/// Best-effort: the settings are already saved, so failures only warn.
async fn push_settings(paths: &AppPaths, push: &SettingsPush, settings: &Settings) {
    let client = IpcClient::new(paths);
    if client.probe_status().await.is_none() {
        tracing::debug!("Daemon not running; settings apply on next start");
        return;
    }

    if let Err(e) = client.reload_settings().await {
        Display::show_warning(&format!("設定をDaemonに反映できませんでした: {}", e));
    }
    if push.volume {
        if let Err(e) = client.set_volume(settings.music_volume).await {
            Display::show_warning(&format!("音量をDaemonに反映できませんでした: {}", e));
        }
    }
    if push.monitoring {
        if let Err(e) = client
            .set_activity_monitoring(settings.activity_monitoring, settings.activity_threshold)
            .await
        {
            Display::show_warning(&format!("アイドル監視をDaemonに反映できませんでした: {}", e));
        }
    }
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
