use anyhow::{Context, Result};
use clap::Parser;
use notify::{RecursiveMode, Watcher};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use voxtrigger_audio::{CaptureBackend, CpalCapture, DeviceManager};
use voxtrigger_core::{AppConfig, ConfigDiff};
use voxtrigger_engine::ModelRegistry;
use voxtrigger_listener::{KeywordListener, ListenerSettings, TranscriptFile};

const STATUS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "voxtrigger", about = "Voice-triggered keyword listener")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "voxtrigger.toml")]
    config: PathBuf,

    /// Print the available input devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_devices {
        let devices = DeviceManager::new();
        let default = devices.default_input_name();
        let names = devices
            .input_device_names()
            .context("failed to list input devices")?;
        for name in names {
            let marker = if default.as_deref() == Some(name.as_str()) { "*" } else { " " };
            println!("{marker} {name}");
        }
        return Ok(());
    }

    let mut config = AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::info!("voxtrigger starting");

    let registry = ModelRegistry::new();
    tracing::info!(
        engine = %config.engine.name,
        available = ?registry.list_engines(),
        model_path = %config.engine.model_path,
        "speech engine"
    );
    let engine_name = config.engine.name.clone();
    let model_path = PathBuf::from(&config.engine.model_path);
    let load_model = move || registry.load(&engine_name, &model_path);

    let mut listener = KeywordListener::new(
        CpalCapture::new(),
        ListenerSettings::from_config(&config),
        load_model,
    );
    listener.set_keywords(&config.keywords.words);
    listener.set_mic_device(Some(&config.capture.device_name));

    listener.on_keyword(|event| {
        tracing::info!(
            keyword = %event.keyword,
            confidence = event.confidence,
            partial = event.is_partial,
            "keyword"
        );
    });
    listener.on_final_text(|text| tracing::debug!("final text: {}", text));

    if let Some(path) = &config.transcript.path {
        let transcript = TranscriptFile::open(path)
            .with_context(|| format!("failed to open transcript file {path}"))?;
        tracing::info!("writing transcript to {}", transcript.path().display());
        let transcript = Rc::new(RefCell::new(transcript));

        let sink = Rc::clone(&transcript);
        listener.on_final_text(move |text| {
            if let Err(e) = sink.borrow_mut().write_final_text(text) {
                tracing::warn!("transcript: {}", e);
            }
        });
        let sink = Rc::clone(&transcript);
        listener.on_keyword(move |event| {
            if let Err(e) = sink.borrow_mut().write_keyword(event) {
                tracing::warn!("transcript: {}", e);
            }
        });
    }

    // Config hot reload: the watcher thread only signals, the control loop
    // re-reads and applies.
    let (reload_tx, mut reload_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let _watcher = match watch_config(&cli.config, reload_tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!("config hot reload disabled: {:#}", e);
            None
        }
    };

    listener.start_listening();
    let status = listener.status();
    tracing::info!(
        device = ?status.device,
        sample_rate = status.sample_rate,
        channels = status.channels,
        chunk_frames = status.chunk_frames,
        grammar = status.grammar_enabled,
        keywords = listener.vocabulary().len(),
        "listening, press Ctrl-C to quit"
    );

    let mut tick = tokio::time::interval(Duration::from_millis(
        config.general.tick_interval_ms.max(1),
    ));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status_tick = tokio::time::interval(STATUS_INTERVAL);
    status_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = tick.tick() => listener.tick(),
            _ = status_tick.tick() => {
                let status = listener.status();
                tracing::debug!(
                    listening = status.listening,
                    model_loaded = status.model_loaded,
                    queued = status.queued_chunks,
                    level = listener.mic_level(),
                    error = ?status.last_error,
                    "status"
                );
            }
            Some(()) = reload_rx.recv() => {
                reload_config(&cli.config, &mut config, &mut listener);
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::error!("failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }
    }

    tracing::info!("shutting down");
    listener.shutdown();

    Ok(())
}

/// Watch the config file's directory so editors that replace the file on
/// save are still picked up.
fn watch_config(
    path: &Path,
    reload_tx: tokio::sync::mpsc::UnboundedSender<()>,
) -> Result<notify::RecommendedWatcher> {
    let file_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .context("config path has no file name")?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let relevant = (event.kind.is_modify() || event.kind.is_create())
                    && event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if relevant {
                    let _ = reload_tx.send(());
                }
            }
            Err(e) => tracing::warn!("config watch error: {}", e),
        }
    })
    .context("failed to create file watcher")?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", dir.display()))?;
    Ok(watcher)
}

fn reload_config<B: CaptureBackend>(
    path: &Path,
    current: &mut AppConfig,
    listener: &mut KeywordListener<B>,
) {
    let new = match AppConfig::load_from_file(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config reload failed, keeping current settings: {}", e);
            return;
        }
    };

    let diff = ConfigDiff::diff(current, &new);
    if diff.is_empty() {
        return;
    }
    tracing::info!(
        keywords = diff.keywords.is_some(),
        mode = ?diff.mode,
        device = ?diff.device,
        tuning = diff.tuning_changed,
        "config changed"
    );
    listener.apply_config_diff(&diff, &new);
    *current = new;
}
