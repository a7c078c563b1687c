//! Core modules for the clickfix mouse chatter filter.
//!
//! Everything here is platform independent; the Windows hook that feeds
//! events into [`filter::MouseFilter`] lives in the binary.

pub mod capabilities;
pub mod config;
pub mod device;
pub mod filter;
pub mod logging;
pub mod settings;
pub mod timing;
pub mod util;

pub use config::{AppConfig, ConfigWatcher};
pub use filter::{LogicalButton, MouseEvent, MouseFilter, Verdict};
pub use logging::{LogSink, Logger};
pub use settings::{Settings, SettingsStore};
