//! Tracking of the device that most recently produced input.

use crate::filter::{DeviceId, UNKNOWN_DEVICE};
use crate::logging::LogSink;

/// Remembers the active input device and reports switches.
///
/// Purely observational: the ignored-device check compares against the live
/// settings, not against this cache.
#[derive(Debug)]
pub struct DeviceTracker {
    current: DeviceId,
}

impl Default for DeviceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceTracker {
    pub const fn new() -> Self {
        Self {
            current: UNKNOWN_DEVICE,
        }
    }

    #[inline(always)]
    pub fn current(&self) -> DeviceId {
        self.current
    }

    /// Records `device` and returns `true` if it differs from the previous one.
    #[inline]
    pub fn observe(&mut self, device: DeviceId, logger: &dyn LogSink) -> bool {
        if device == self.current {
            return false;
        }
        if logger.is_foreground() {
            logger.log(format!("Switched device: {}", device), true);
        }
        self.current = device;
        true
    }
}
