//! Mouse event filtering.
//!
//! [`MouseFilter`] is the single entry point called once per low-level mouse
//! event. It decides, within the hook callback, whether the event is forwarded
//! or dropped. Events arrive one at a time in delivery order, so all state is
//! owned here without locking.

pub mod classify;
pub mod drag_lock;
pub mod suppressor;
pub mod types;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;

use crate::device::DeviceTracker;
use crate::logging::LogSink;
use crate::settings::{Settings, SettingsStore};
use crate::timing::HookTimings;
use crate::util::unlikely;

pub use classify::{ObservedMessages, classify};
pub use drag_lock::{DragLockController, DragState, MOVEMENT_THRESHOLD_PIXELS};
pub use suppressor::DoubleClickSuppressor;
pub use types::*;

/// Chatter filter state machine.
pub struct MouseFilter {
    settings: Settings,
    settings_generation: Option<u64>,
    observed: ObservedMessages,
    suppressor: DoubleClickSuppressor,
    drag: DragLockController,
    device: DeviceTracker,
    timings: HookTimings,
    logger: Arc<dyn LogSink>,
}

impl MouseFilter {
    pub fn new(settings: Settings, logger: Arc<dyn LogSink>) -> Self {
        Self {
            observed: ObservedMessages::from_settings(&settings),
            settings,
            settings_generation: None,
            suppressor: DoubleClickSuppressor::new(),
            drag: DragLockController::new(),
            device: DeviceTracker::new(),
            timings: HookTimings::default(),
            logger,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn observed_messages(&self) -> ObservedMessages {
        self.observed
    }

    pub fn drag_lock(&self) -> &DragLockController {
        &self.drag
    }

    pub fn suppressor(&self) -> &DoubleClickSuppressor {
        &self.suppressor
    }

    /// Device that most recently produced input.
    pub fn current_device(&self) -> DeviceId {
        self.device.current()
    }

    /// Applies a new settings snapshot.
    ///
    /// Recomputes the observed message set and drops all drag state when drag
    /// correction is now disabled while buttons are still tracked.
    pub fn on_settings_changed(&mut self, settings: Settings) {
        if !settings.is_drag_correction_enabled() && self.drag.pressed_count() > 0 {
            self.drag.reset();
        }
        self.observed = ObservedMessages::from_settings(&settings);
        self.settings = settings;
    }

    /// Picks up a snapshot published on another thread, if there is a new one.
    #[inline]
    pub fn sync_settings(&mut self, store: &SettingsStore) {
        let generation = store.generation();
        if unlikely(self.settings_generation != Some(generation)) {
            self.settings_generation = Some(generation);
            self.on_settings_changed(store.snapshot());
        }
    }

    /// Side-channel device report from raw input.
    pub fn observe_device(&mut self, device: DeviceId) {
        self.device.observe(device, self.logger.as_ref());
    }

    /// Decides the fate of one event.
    ///
    /// Never fails: an internal error or panic is logged and the event is
    /// forwarded, since dropping input on a fault would freeze the mouse.
    pub fn handle(&mut self, event: &MouseEvent) -> Verdict {
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(event)));
        let verdict = self.settle(outcome);

        if let Some(summary) = self.timings.record(started.elapsed()) {
            self.logger.log(summary.to_string(), false);
        }
        verdict
    }

    /// Turns the outcome of [`Self::process`] into a verdict, forwarding the
    /// event on any failure.
    fn settle(&mut self, outcome: std::thread::Result<anyhow::Result<Verdict>>) -> Verdict {
        match outcome {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                self.logger
                    .log(format!("Error in hook callback: {:#}", e), false);
                Verdict::Allow
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                self.logger
                    .log(format!("Error in hook callback: {}", reason), false);
                self.drag.reset();
                Verdict::Allow
            }
        }
    }

    fn process(&mut self, event: &MouseEvent) -> anyhow::Result<Verdict> {
        if event.device_id == self.settings.ignored_device {
            return Ok(Verdict::Allow);
        }
        self.device.observe(event.device_id, self.logger.as_ref());

        if event.is_move() {
            if self.settings.is_drag_correction_enabled() && self.drag.pressed_count() > 0 {
                self.drag.on_move(
                    event.position,
                    event.timestamp,
                    self.settings.drag_start_ms,
                    self.logger.as_ref(),
                );
            }
            return Ok(Verdict::Allow);
        }

        if !self.observed.contains(event.message) {
            return Ok(Verdict::Allow);
        }

        let classification = classify(
            event.message,
            event.mouse_data,
            &self.observed,
            &self.settings,
        );
        if classification.is_none() {
            return Ok(Verdict::Allow);
        }
        let button = classification.button;
        let drag_enabled = self.settings.is_drag_correction_enabled();

        if drag_enabled && self.drag.is_locked(button) {
            return self.drag.locked_verdict(
                button,
                classification,
                event.timestamp,
                self.settings.drag_stop_ms,
                &mut self.suppressor,
                self.logger.as_ref(),
            );
        }

        if classification.is_down {
            return self.on_button_down(button, event);
        }

        if classification.is_up {
            self.drag.release(button);
            self.suppressor.on_up(button, event.timestamp)?;
        }
        Ok(Verdict::Allow)
    }

    /// Suppression decision for a press outside drag lock.
    fn on_button_down(
        &mut self,
        button: LogicalButton,
        event: &MouseEvent,
    ) -> anyhow::Result<Verdict> {
        let threshold = self
            .settings
            .threshold(button)
            .with_context(|| format!("no suppression threshold for button {}", button))?;
        let verdict = self.suppressor.on_down(
            button,
            event.timestamp,
            threshold,
            &self.settings,
            self.logger.as_ref(),
        )?;
        if verdict == Verdict::Allow && self.settings.is_drag_correction_enabled() {
            self.drag.press(button, event.position, event.timestamp);
        }
        Ok(verdict)
    }
}
