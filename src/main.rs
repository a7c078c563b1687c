// Hide console window in release mode
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

#[cfg(windows)]
mod mouse;
#[cfg(windows)]
mod rawinput;
#[cfg(windows)]
mod signal;

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "clickfix")]
#[command(about = "Suppress chattering mouse clicks and broken drags")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(long, env = "CLICKFIX_CONFIG", default_value = "Config.toml")]
    config: PathBuf,

    /// Run without installing the mouse hook
    #[arg(long)]
    no_hook: bool,

    /// Open a console and show verbose diagnostics
    #[arg(short, long)]
    interactive: bool,

    /// Also append diagnostics to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    app::run(Cli::parse())
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    let _ = Cli::parse();
    anyhow::bail!("clickfix needs the Windows low-level mouse hook and only runs on Windows")
}

#[cfg(windows)]
mod app {
    use std::sync::Arc;
    use std::thread;

    use crossbeam_channel::select;

    use windows::Win32::Foundation::{ERROR_ALREADY_EXISTS, GetLastError, HANDLE};
    use windows::Win32::System::Console::AllocConsole;
    use windows::Win32::System::Threading::CreateMutexW;
    use windows::Win32::UI::Input::KeyboardAndMouse::GetDoubleClickTime;
    use windows::Win32::UI::WindowsAndMessaging::{MB_ICONERROR, MB_OK, MessageBoxW};
    use windows::core::{HSTRING, w};

    use clickfix::capabilities::InputCapabilities;
    use clickfix::config::{AppConfig, ConfigWatcher};
    use clickfix::filter::MouseFilter;
    use clickfix::logging::{self, LogSink, Logger};
    use clickfix::settings::{DEFAULT_DOUBLE_CLICK_MS, SettingsStore};

    use crate::Cli;
    use crate::mouse::MouseHook;
    use crate::rawinput::HostWindow;
    use crate::signal;

    pub fn run(cli: Cli) -> anyhow::Result<()> {
        if cli.interactive {
            // Fails harmlessly when a console is already attached
            let _ = unsafe { AllocConsole() };
        }

        let config = match AppConfig::load_or_create(&cli.config) {
            Ok(cfg) => cfg,
            Err(e) => {
                let error_msg = format!("Failed to load configuration: {}", e);
                show_error(&error_msg);
                return Err(anyhow::anyhow!(error_msg));
            }
        };

        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(config.log_level.as_str()),
        )
        .init();

        let _instance = if cli.no_hook {
            None
        } else {
            match acquire_single_instance() {
                Some(handle) => Some(handle),
                None => {
                    show_error("clickfix is already running.");
                    return Ok(());
                }
            }
        };

        signal::set_control_ctrl_handler()?;

        let (logger, logger_thread) = Logger::start()?;
        logger.set_foreground(cli.interactive);
        if let Some(path) = &cli.log_file {
            logger.add_listener(logging::file_listener(path)?);
        }
        let sink: Arc<dyn LogSink> = Arc::new(logger.clone());

        let double_click_ms = double_click_reference();
        let settings = config.to_settings(double_click_ms);
        let store = Arc::new(SettingsStore::new(settings));
        let updates = store.subscribe();
        let watcher = ConfigWatcher::start(
            cli.config.clone(),
            store.clone(),
            sink.clone(),
            double_click_ms,
        )?;

        sink.log(
            format!("Input devices: {}", InputCapabilities::detect().description()),
            false,
        );
        sink.log(format!("Using configuration {}", cli.config.display()), false);
        sink.log(format!("Filtering: {}", settings.describe()), false);

        let install = !cli.no_hook;
        let hook_store = store.clone();
        let hook_sink = sink.clone();
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        let hook_thread = thread::Builder::new()
            .name("mouse_hook".to_string())
            .spawn(move || -> anyhow::Result<()> {
                let _done = done_tx;
                signal::register_hook_thread();
                let filter = MouseFilter::new(hook_store.snapshot(), hook_sink.clone());
                let hook = MouseHook::new(filter, hook_store, hook_sink.clone(), install);
                let _window = match HostWindow::create() {
                    Ok(window) => Some(window),
                    Err(e) => {
                        hook_sink.log(format!("Raw input unavailable: {:#}", e), false);
                        None
                    }
                };
                hook.run_message_loop()
            })
            .map_err(|e| anyhow::anyhow!("Failed to start mouse hook thread: {}", e))?;

        // Report applied settings until the hook thread exits
        let mut hook_running = true;
        while hook_running {
            hook_running = select! {
                recv(updates) -> update => match update {
                    Ok(settings) => {
                        sink.log(format!("Filtering: {}", settings.describe()), false);
                        true
                    }
                    Err(_) => false,
                },
                recv(done_rx) -> _ => false,
            };
        }

        let result = hook_thread
            .join()
            .map_err(|_| anyhow::anyhow!("Mouse hook thread panicked"))
            .and_then(|result| result);

        drop(watcher);
        drop(sink);
        drop(logger);
        logger_thread.join();

        result
    }

    /// Named mutex held for the life of the process.
    fn acquire_single_instance() -> Option<HANDLE> {
        let handle = unsafe { CreateMutexW(None, true, w!("Local\\clickfix-single-instance")) };
        match handle {
            Ok(handle) if unsafe { GetLastError() } != ERROR_ALREADY_EXISTS => Some(handle),
            Ok(_) => None,
            // Cannot tell; do not block startup
            Err(_) => Some(HANDLE::default()),
        }
    }

    fn double_click_reference() -> i32 {
        match unsafe { GetDoubleClickTime() } {
            0 => DEFAULT_DOUBLE_CLICK_MS,
            ms => i32::try_from(ms).unwrap_or(DEFAULT_DOUBLE_CLICK_MS),
        }
    }

    fn show_error(message: &str) {
        unsafe {
            let _ = MessageBoxW(None, &HSTRING::from(message), w!("clickfix"), MB_OK | MB_ICONERROR);
        }
    }
}
