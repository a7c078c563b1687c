//! Settings snapshots shared between the configuration side and the hook thread.
//!
//! The hook thread never reads mutable shared fields. Every change is published
//! as a whole new [`Settings`] value swapped in atomically, and a generation
//! counter lets the hook thread notice the swap with a single atomic load.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender};
use scc::{AtomicShared, Guard, Shared, Tag};
use smallvec::SmallVec;

use crate::filter::{DeviceId, LogicalButton};

/// Fallback when the system reports no double-click time.
pub const DEFAULT_DOUBLE_CLICK_MS: i32 = 600;

/// Immutable view of every value the filter consults.
///
/// Thresholds use `-1` for "disabled"; any value `>= 0` is a window in ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub left_threshold: i32,
    pub right_threshold: i32,
    pub middle_threshold: i32,
    pub x1_threshold: i32,
    pub x2_threshold: i32,
    pub min_delay: i32,
    pub ignored_device: DeviceId,
    pub drag_start_ms: i32,
    pub drag_stop_ms: i32,
    /// System double-click time, only used to classify diagnostics.
    pub double_click_reference_ms: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            left_threshold: 50,
            right_threshold: -1,
            middle_threshold: -1,
            x1_threshold: -1,
            x2_threshold: -1,
            min_delay: -1,
            ignored_device: 0,
            drag_start_ms: -1,
            drag_stop_ms: -1,
            double_click_reference_ms: DEFAULT_DOUBLE_CLICK_MS,
        }
    }
}

impl Settings {
    /// Suppression window for a button, `None` for buttons without one.
    #[inline(always)]
    pub fn threshold(&self, button: LogicalButton) -> Option<i32> {
        match button {
            LogicalButton::Left => Some(self.left_threshold),
            LogicalButton::Right => Some(self.right_threshold),
            LogicalButton::Middle => Some(self.middle_threshold),
            LogicalButton::X1 => Some(self.x1_threshold),
            LogicalButton::X2 => Some(self.x2_threshold),
            LogicalButton::Wheel | LogicalButton::None => None,
        }
    }

    #[inline(always)]
    pub fn is_enabled(&self, button: LogicalButton) -> bool {
        self.threshold(button).is_some_and(|t| t >= 0)
    }

    /// One-line overview of what is being filtered, for the log.
    pub fn describe(&self) -> String {
        let buttons: Vec<String> = LogicalButton::TRACKED
            .iter()
            .map(|&button| match self.threshold(button) {
                Some(ms) if self.is_enabled(button) => format!("{} {} ms", button, ms),
                _ => format!("{} off", button),
            })
            .collect();
        let min_delay = if self.min_delay >= 0 {
            format!("{} ms", self.min_delay)
        } else {
            "off".to_string()
        };
        let drag = if self.is_drag_correction_enabled() {
            format!("{}/{} ms", self.drag_start_ms, self.drag_stop_ms)
        } else {
            "off".to_string()
        };
        format!(
            "{}; min delay {}; drag correction {}",
            buttons.join(", "),
            min_delay,
            drag
        )
    }

    /// Drag correction needs both the start and the stop delay.
    #[inline(always)]
    pub fn is_drag_correction_enabled(&self) -> bool {
        self.drag_start_ms >= 0 && self.drag_stop_ms >= 0
    }
}

/// Single-writer publication point for [`Settings`].
pub struct SettingsStore {
    current: AtomicShared<Settings>,
    generation: AtomicU64,
    subscribers: Mutex<SmallVec<[Sender<Settings>; 2]>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: AtomicShared::from(Shared::new(settings)),
            generation: AtomicU64::new(0),
            subscribers: Mutex::new(SmallVec::new()),
        }
    }

    /// Returns the most recently published snapshot.
    pub fn snapshot(&self) -> Settings {
        let guard = Guard::new();
        self.current
            .load(Ordering::Acquire, &guard)
            .as_ref()
            .copied()
            .unwrap_or_default()
    }

    /// Number of snapshots published since creation.
    #[inline(always)]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Swaps in a new snapshot and notifies subscribers.
    pub fn publish(&self, settings: Settings) {
        let _ = self
            .current
            .swap((Some(Shared::new(settings)), Tag::None), Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);

        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(settings).is_ok());
        }
    }

    /// Receives every snapshot published after this call.
    pub fn subscribe(&self) -> Receiver<Settings> {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_enable_left_only() {
        let settings = Settings::default();
        assert!(settings.is_enabled(LogicalButton::Left));
        assert!(!settings.is_enabled(LogicalButton::Right));
        assert!(!settings.is_enabled(LogicalButton::Middle));
        assert!(!settings.is_enabled(LogicalButton::X1));
        assert!(!settings.is_enabled(LogicalButton::X2));
        assert!(!settings.is_drag_correction_enabled());
    }

    #[test]
    fn test_describe_lists_every_button() {
        assert_eq!(
            Settings::default().describe(),
            "Left 50 ms, Right off, Middle off, X1 off, X2 off; min delay off; drag correction off"
        );

        let settings = Settings {
            x2_threshold: 0,
            min_delay: 5,
            drag_start_ms: 100,
            drag_stop_ms: 200,
            ..Settings::default()
        };
        assert_eq!(
            settings.describe(),
            "Left 50 ms, Right off, Middle off, X1 off, X2 0 ms; min delay 5 ms; drag correction 100/200 ms"
        );
    }

    #[test]
    fn test_threshold_missing_for_untracked_buttons() {
        let settings = Settings::default();
        assert_eq!(settings.threshold(LogicalButton::Wheel), None);
        assert_eq!(settings.threshold(LogicalButton::None), None);
        assert!(!settings.is_enabled(LogicalButton::Wheel));
    }

    #[test]
    fn test_drag_correction_requires_both_delays() {
        let mut settings = Settings {
            drag_start_ms: 100,
            ..Settings::default()
        };
        assert!(!settings.is_drag_correction_enabled());

        settings.drag_stop_ms = 0;
        assert!(settings.is_drag_correction_enabled());

        settings.drag_start_ms = -1;
        assert!(!settings.is_drag_correction_enabled());
    }

    #[test]
    fn test_store_publish_bumps_generation() {
        let store = SettingsStore::new(Settings::default());
        assert_eq!(store.generation(), 0);
        assert_eq!(store.snapshot(), Settings::default());

        let updated = Settings {
            right_threshold: 30,
            ..Settings::default()
        };
        store.publish(updated);

        assert_eq!(store.generation(), 1);
        assert_eq!(store.snapshot().right_threshold, 30);
    }

    #[test]
    fn test_store_subscribers_receive_snapshots() {
        let store = SettingsStore::new(Settings::default());
        let rx = store.subscribe();

        let updated = Settings {
            min_delay: 0,
            ..Settings::default()
        };
        store.publish(updated);

        assert_eq!(rx.try_recv().ok(), Some(updated));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_store_drops_closed_subscribers() {
        let store = SettingsStore::new(Settings::default());
        drop(store.subscribe());
        let rx = store.subscribe();

        store.publish(Settings::default());
        store.publish(Settings::default());

        assert_eq!(rx.len(), 2);
        assert_eq!(store.subscribers.lock().map(|s| s.len()).unwrap_or(0), 1);
    }

    #[test]
    fn test_store_snapshot_visible_across_threads() {
        use std::sync::Arc;

        let store = Arc::new(SettingsStore::new(Settings::default()));
        let writer = store.clone();
        std::thread::spawn(move || {
            writer.publish(Settings {
                left_threshold: 80,
                ..Settings::default()
            });
        })
        .join()
        .unwrap();

        assert_eq!(store.generation(), 1);
        assert_eq!(store.snapshot().left_threshold, 80);
    }
}
