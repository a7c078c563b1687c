use anyhow::Context;
use crossbeam_channel::{Receiver, RecvError, Sender, select};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{fs, thread};

use crate::filter::DeviceId;
use crate::logging::LogSink;
use crate::settings::{Settings, SettingsStore};

/// Persisted user configuration.
///
/// Thresholds are in milliseconds; `-1` disables the corresponding feature.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub left_threshold: i32,
    pub right_threshold: i32,
    pub middle_threshold: i32,
    pub x1_threshold: i32,
    pub x2_threshold: i32,
    pub min_delay: i32,
    pub ignored_device: DeviceId,
    pub drag_start_ms: i32,
    pub drag_stop_ms: i32,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            left_threshold: settings.left_threshold,
            right_threshold: settings.right_threshold,
            middle_threshold: settings.middle_threshold,
            x1_threshold: settings.x1_threshold,
            x2_threshold: settings.x2_threshold,
            min_delay: settings.min_delay,
            ignored_device: settings.ignored_device,
            drag_start_ms: settings.drag_start_ms,
            drag_stop_ms: settings.drag_stop_ms,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from file, or create default if not exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if !path.as_ref().exists() {
            let default_config = Self::default();
            default_config.save_to_file(&path)?;
            return Ok(default_config);
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.validate();
        Ok(config)
    }

    /// Clamps every value below `-1` to `-1` (disabled).
    fn validate(&mut self) {
        for value in [
            &mut self.left_threshold,
            &mut self.right_threshold,
            &mut self.middle_threshold,
            &mut self.x1_threshold,
            &mut self.x2_threshold,
            &mut self.min_delay,
            &mut self.drag_start_ms,
            &mut self.drag_stop_ms,
        ] {
            if *value < -1 {
                *value = -1;
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = format!(
            "# Suppression window per button in ms (-1 = disabled)\n\
             left_threshold = {}\n\
             right_threshold = {}\n\
             middle_threshold = {}\n\
             x1_threshold = {}\n\
             x2_threshold = {}\n\n\
             min_delay = {}            # Presses this close (ms) to a release always pass (-1 = off)\n\
             ignored_device = {}       # Raw input device id never filtered (touch pads often report 0)\n\n\
             # Drag correction, enabled only when both are >= 0\n\
             drag_start_ms = {}        # Hold time before movement can start a drag lock\n\
             drag_stop_ms = {}         # Stillness required before a locked release passes\n\n\
             log_level = \"{}\"       # error, warn, info, debug or trace\n",
            self.left_threshold,
            self.right_threshold,
            self.middle_threshold,
            self.x1_threshold,
            self.x2_threshold,
            self.min_delay,
            self.ignored_device,
            self.drag_start_ms,
            self.drag_stop_ms,
            self.log_level,
        );

        fs::write(path, content)?;
        Ok(())
    }

    /// Builds the snapshot consumed by the filter.
    pub fn to_settings(&self, double_click_reference_ms: i32) -> Settings {
        Settings {
            left_threshold: self.left_threshold,
            right_threshold: self.right_threshold,
            middle_threshold: self.middle_threshold,
            x1_threshold: self.x1_threshold,
            x2_threshold: self.x2_threshold,
            min_delay: self.min_delay,
            ignored_device: self.ignored_device,
            drag_start_ms: self.drag_start_ms,
            drag_stop_ms: self.drag_stop_ms,
            double_click_reference_ms,
        }
    }
}

/// Watches the config file and publishes a new snapshot whenever it changes.
///
/// The parent directory is watched rather than the file itself, since editors
/// often save by replacing the file.
pub struct ConfigWatcher {
    watcher: Option<RecommendedWatcher>,
    stop: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

/// Quiet period after the last file event before reloading.
const SETTLE_DELAY: Duration = Duration::from_millis(50);

impl ConfigWatcher {
    pub fn start(
        path: PathBuf,
        store: Arc<SettingsStore>,
        logger: Arc<dyn LogSink>,
        double_click_reference_ms: i32,
    ) -> anyhow::Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .with_context(|| format!("{} does not name a file", path.display()))?;
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let Ok(event) = res else { return };
                if touches_file(&event, &file_name) {
                    let _ = event_tx.send(());
                }
            },
            notify::Config::default(),
        )?;
        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", directory.display()))?;

        let reloader = Reloader {
            last: AppConfig::load_from_file(&path).ok(),
            path,
            store,
            logger,
            double_click_reference_ms,
        };
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name("config_watcher".to_string())
            .spawn(move || reloader.run(event_rx, stop_rx))
            .map_err(|e| anyhow::anyhow!("Failed to start config watcher thread: {}", e))?;

        Ok(Self {
            watcher: Some(watcher),
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.watcher.take();
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn touches_file(event: &Event, file_name: &OsStr) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name))
}

#[derive(Debug, PartialEq, Eq)]
enum Wake {
    Changed,
    Settled,
    Stop,
}

/// Blocks until a file event, a stop request, or `settle` elapsing quietly.
fn wait(events: &Receiver<()>, stop: &Receiver<()>, settle: Option<Duration>) -> Wake {
    let changed = |event: Result<(), RecvError>| match event {
        Ok(()) => Wake::Changed,
        Err(_) => Wake::Stop,
    };
    match settle {
        Some(timeout) => select! {
            recv(stop) -> _ => Wake::Stop,
            recv(events) -> event => changed(event),
            default(timeout) => Wake::Settled,
        },
        None => select! {
            recv(stop) -> _ => Wake::Stop,
            recv(events) -> event => changed(event),
        },
    }
}

struct Reloader {
    path: PathBuf,
    store: Arc<SettingsStore>,
    logger: Arc<dyn LogSink>,
    double_click_reference_ms: i32,
    /// Last successfully applied file contents.
    last: Option<AppConfig>,
}

impl Reloader {
    fn run(mut self, events: Receiver<()>, stop: Receiver<()>) {
        loop {
            if wait(&events, &stop, None) == Wake::Stop {
                return;
            }
            // A save usually arrives as several events
            loop {
                match wait(&events, &stop, Some(SETTLE_DELAY)) {
                    Wake::Stop => return,
                    Wake::Changed => continue,
                    Wake::Settled => break,
                }
            }
            self.reload();
        }
    }

    fn reload(&mut self) {
        match AppConfig::load_from_file(&self.path) {
            Ok(config) if self.last.as_ref() == Some(&config) => {}
            Ok(config) => {
                self.store
                    .publish(config.to_settings(self.double_click_reference_ms));
                self.last = Some(config);
                self.logger.log(
                    format!("Settings reloaded from {}", self.path.display()),
                    false,
                );
            }
            Err(e) => self.logger.log(
                format!("Failed to reload {}: {}", self.path.display(), e),
                false,
            ),
        }
    }
}
