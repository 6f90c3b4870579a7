//! Configuration file watcher for hot reload.
//!
//! # Data Flow
//! ```text
//! notify callback (watcher thread)
//!     → keep modify/create events naming the config file
//!     → signal channel
//! reload task
//!     → wait until the burst goes quiet
//!     → load_config (parse + validate)
//!     → forward only configs that differ from the last one sent
//! ```
//!
//! The parent directory is watched rather than the file, so saves that
//! replace the file through a rename are still seen.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GateConfig;

/// Quiet period that ends one save's burst of events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches the gate's configuration file and emits validated updates.
pub struct ConfigWatcher {
    path: PathBuf,
    current: GateConfig,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<GateConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration already in effect; reloads equal to it are dropped.
    pub fn new(path: &Path, current: GateConfig) -> (Self, mpsc::UnboundedReceiver<GateConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                current,
                debounce: DEFAULT_DEBOUNCE,
                update_tx,
            },
            update_rx,
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called inside a tokio runtime.
    ///
    /// Dropping the returned handle stops events and ends the reload task.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_config_change(&event, &file_name) => {
                    let _ = signal_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tokio::spawn(reload_loop(
            signal_rx,
            self.path.clone(),
            self.debounce,
            self.current,
            self.update_tx,
        ));

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// A content change to the file called `file_name`.
fn is_config_change(event: &Event, file_name: &OsString) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

async fn reload_loop(
    mut signals: mpsc::UnboundedReceiver<()>,
    path: PathBuf,
    debounce: Duration,
    mut current: GateConfig,
    updates: mpsc::UnboundedSender<GateConfig>,
) {
    while signals.recv().await.is_some() {
        // One save can fire several events; reload once the file settles.
        while let Ok(Some(())) = tokio::time::timeout(debounce, signals.recv()).await {}

        match load_config(&path) {
            Ok(config) if config == current => {
                tracing::debug!(path = %path.display(), "Config file touched, content unchanged");
            }
            Ok(config) => {
                tracing::info!(path = %path.display(), "Config file changed, applying");
                current = config.clone();
                if updates.send(config).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }
}
