//! Non-blocking diagnostic logging for the hook thread.
//!
//! The hook callback must never wait on I/O, so messages are handed to an
//! unbounded queue and written by a single consumer thread. The consumer
//! forwards each line to the `log` facade and to registered listeners.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};

/// Fire-and-forget sink used by the filter.
pub trait LogSink: Send + Sync {
    /// Queues a message. `foreground_only` messages are discarded while no one
    /// is watching the diagnostics.
    fn log(&self, message: String, foreground_only: bool);

    /// Whether foreground-only messages would currently be kept.
    ///
    /// Callers check this before formatting high-frequency messages.
    fn is_foreground(&self) -> bool;
}

/// Receives every delivered message on the consumer thread.
pub type LogListener = Box<dyn Fn(&str) + Send>;

enum LogCommand {
    Message(String),
    AddListener(LogListener),
}

/// Queue-backed [`LogSink`].
#[derive(Clone)]
pub struct Logger {
    sender: Sender<LogCommand>,
    foreground: Arc<AtomicBool>,
}

/// Handle to the consumer thread; it exits once every [`Logger`] is dropped.
pub struct LoggerThread {
    handle: JoinHandle<()>,
}

impl LoggerThread {
    /// Waits for the consumer to drain the queue and exit.
    pub fn join(self) {
        let _ = self.handle.join();
    }
}

impl Logger {
    /// Starts the consumer thread in background mode.
    pub fn start() -> anyhow::Result<(Self, LoggerThread)> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("log_consumer".to_string())
            .spawn(move || Self::consume(receiver))
            .map_err(|e| anyhow::anyhow!("Failed to start log consumer thread: {}", e))?;

        let logger = Self {
            sender,
            foreground: Arc::new(AtomicBool::new(false)),
        };
        Ok((logger, LoggerThread { handle }))
    }

    fn consume(receiver: Receiver<LogCommand>) {
        let mut listeners: Vec<LogListener> = Vec::new();
        for command in receiver.iter() {
            match command {
                LogCommand::Message(message) => {
                    log::info!("{}", message);
                    for listener in &listeners {
                        listener(&message);
                    }
                }
                LogCommand::AddListener(listener) => listeners.push(listener),
            }
        }
    }

    /// Registers a listener. It runs on the consumer thread, not the caller's.
    pub fn add_listener(&self, listener: impl Fn(&str) + Send + 'static) {
        let _ = self.sender.send(LogCommand::AddListener(Box::new(listener)));
    }

    /// Switches foreground mode, e.g. when a diagnostics console is attached.
    pub fn set_foreground(&self, foreground: bool) {
        self.foreground.store(foreground, Ordering::Relaxed);
    }
}

/// Listener appending every message as a line to `path`.
pub fn file_listener(path: &Path) -> anyhow::Result<impl Fn(&str) + Send + 'static> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(move |message: &str| {
        let mut out = &file;
        let _ = writeln!(out, "{}", message);
    })
}

impl LogSink for Logger {
    #[inline]
    fn log(&self, message: String, foreground_only: bool) {
        if foreground_only && !self.is_foreground() {
            return;
        }
        let _ = self.sender.send(LogCommand::Message(message));
    }

    #[inline(always)]
    fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn collecting_logger(foreground: bool) -> (Logger, LoggerThread, Receiver<String>) {
        let (logger, thread) = Logger::start().expect("Failed to start logger");
        logger.set_foreground(foreground);
        let (tx, rx) = crossbeam_channel::unbounded();
        logger.add_listener(move |message| {
            let _ = tx.send(message.to_string());
        });
        (logger, thread, rx)
    }

    #[test]
    fn test_messages_reach_listener_in_order() {
        let (logger, thread, rx) = collecting_logger(false);

        logger.log("first".to_string(), false);
        logger.log("second".to_string(), false);

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).ok().as_deref(), Some("first"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).ok().as_deref(), Some("second"));

        drop(logger);
        thread.join();
    }

    #[test]
    fn test_foreground_only_dropped_in_background() {
        let (logger, thread, rx) = collecting_logger(false);

        logger.log("verbose".to_string(), true);
        logger.log("important".to_string(), false);

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).ok().as_deref(),
            Some("important")
        );
        drop(logger);
        thread.join();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_foreground_only_kept_in_foreground() {
        let (logger, thread, rx) = collecting_logger(false);
        assert!(!logger.is_foreground());
        logger.set_foreground(true);
        assert!(logger.is_foreground());

        logger.log("verbose".to_string(), true);

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).ok().as_deref(),
            Some("verbose")
        );
        drop(logger);
        thread.join();
    }

    #[test]
    fn test_consumer_drains_queue_before_exit() {
        let (logger, thread, rx) = collecting_logger(true);
        for i in 0..100 {
            logger.log(format!("message {}", i), false);
        }
        drop(logger);
        thread.join();

        assert_eq!(rx.try_iter().count(), 100);
    }

    #[test]
    fn test_file_listener_appends_lines() {
        let path = std::env::temp_dir().join(format!(
            "clickfix_log_test_{}.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        std::fs::write(&path, "earlier run\n").unwrap();

        let (logger, thread) = Logger::start().unwrap();
        logger.add_listener(file_listener(&path).unwrap());
        logger.log("Mouse hook installed".to_string(), false);
        logger.log("hidden".to_string(), true);
        drop(logger);
        thread.join();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "earlier run\nMouse hook installed\n");
        let _ = std::fs::remove_file(&path);
    }
}
