//! Drag-lock handling.
//!
//! A button that is held down while the cursor travels far enough, late enough
//! after the press, enters drag lock. While locked, presses of that button are
//! dropped and a release only passes once the cursor has been still for the
//! configured stop delay. This keeps a chattering switch from breaking a drag.

use crate::logging::LogSink;

use super::suppressor::DoubleClickSuppressor;
use super::types::*;

/// Minimum travel from the press position before a drag can lock, in pixels.
pub const MOVEMENT_THRESHOLD_PIXELS: i64 = 5;

/// State of one button between its genuine press and its release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragState {
    pub initial_position: Point,
    pub initial_down: u32,
    pub last_move: u32,
    pub locked: bool,
}

/// Tracks which buttons are down and whether each one is drag-locked.
///
/// A slot holds `Some` exactly while its button is considered down.
#[derive(Debug)]
pub struct DragLockController {
    buttons: ButtonMap<Option<DragState>>,
}

impl Default for DragLockController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragLockController {
    pub const fn new() -> Self {
        Self {
            buttons: ButtonMap::filled(None),
        }
    }

    pub fn state(&self, button: LogicalButton) -> Option<DragState> {
        self.buttons.get(button).copied().flatten()
    }

    #[inline(always)]
    pub fn is_down(&self, button: LogicalButton) -> bool {
        self.state(button).is_some()
    }

    #[inline(always)]
    pub fn is_locked(&self, button: LogicalButton) -> bool {
        self.state(button).is_some_and(|state| state.locked)
    }

    /// Number of buttons currently considered down.
    pub fn pressed_count(&self) -> usize {
        self.buttons.values().filter(|slot| slot.is_some()).count()
    }

    /// Up -> DownUnlocked on a genuine press.
    pub fn press(&mut self, button: LogicalButton, position: Point, timestamp: u32) {
        if let Some(slot) = self.buttons.get_mut(button) {
            *slot = Some(DragState {
                initial_position: position,
                initial_down: timestamp,
                last_move: timestamp,
                locked: false,
            });
        }
    }

    /// Any down state -> Up.
    pub fn release(&mut self, button: LogicalButton) {
        if let Some(slot) = self.buttons.get_mut(button) {
            *slot = None;
        }
    }

    /// Drops every tracked press, e.g. after drag correction was disabled.
    pub fn reset(&mut self) {
        for (_, slot) in self.buttons.iter_mut() {
            *slot = None;
        }
    }

    /// Updates movement time of every pressed button and locks the ones whose
    /// drag has travelled far enough after the start delay.
    pub fn on_move(
        &mut self,
        position: Point,
        timestamp: u32,
        drag_start_ms: i32,
        logger: &dyn LogSink,
    ) {
        for (button, slot) in self.buttons.iter_mut() {
            let Some(state) = slot else {
                continue;
            };
            state.last_move = timestamp;
            if state.locked {
                continue;
            }

            let distance_squared = position.distance_squared(state.initial_position);
            let elapsed_since_down = elapsed_ms(timestamp, state.initial_down);
            if distance_squared >= MOVEMENT_THRESHOLD_PIXELS * MOVEMENT_THRESHOLD_PIXELS
                && elapsed_since_down >= i64::from(drag_start_ms)
            {
                state.locked = true;
                if logger.is_foreground() {
                    logger.log(
                        format!(
                            "Entered drag lock ({}) after {} ms",
                            button, elapsed_since_down
                        ),
                        true,
                    );
                }
            }
        }
    }

    /// Verdict for a button event while `button` is locked.
    ///
    /// Presses are always dropped. A release passes once the cursor has been
    /// still for `drag_stop_ms`; it then ends the lock and counts as the
    /// genuine release for double-click timing.
    pub fn locked_verdict(
        &mut self,
        button: LogicalButton,
        classification: Classification,
        timestamp: u32,
        drag_stop_ms: i32,
        suppressor: &mut DoubleClickSuppressor,
        logger: &dyn LogSink,
    ) -> anyhow::Result<Verdict> {
        if classification.is_down {
            return Ok(Verdict::Suppress);
        }
        if !classification.is_up {
            return Ok(Verdict::Allow);
        }

        let Some(state) = self.state(button) else {
            anyhow::bail!("drag lock verdict requested for released button {}", button);
        };

        let elapsed_since_move = elapsed_ms(timestamp, state.last_move);
        if elapsed_since_move < i64::from(drag_stop_ms) {
            return Ok(Verdict::Suppress);
        }

        self.release(button);
        suppressor.on_up(button, timestamp)?;
        if logger.is_foreground() {
            logger.log(format!("Exited drag lock ({})", button), true);
        }
        Ok(Verdict::Allow)
    }
}
