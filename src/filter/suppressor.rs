//! Per-button double-click suppression.

use anyhow::Context;

use crate::logging::LogSink;
use crate::settings::Settings;

use super::types::*;

/// Tracks the last genuine release of every button.
#[derive(Debug)]
pub struct DoubleClickSuppressor {
    /// `0` means "no prior release".
    previous_up: ButtonMap<u32>,
    ignored_clicks: u32,
}

impl Default for DoubleClickSuppressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DoubleClickSuppressor {
    pub const fn new() -> Self {
        Self {
            previous_up: ButtonMap::filled(0),
            ignored_clicks: 0,
        }
    }

    /// Decides whether a press arrived too soon after the previous release.
    pub fn on_down(
        &mut self,
        button: LogicalButton,
        timestamp: u32,
        threshold: i32,
        settings: &Settings,
        logger: &dyn LogSink,
    ) -> anyhow::Result<Verdict> {
        let previous_up = self
            .previous_up
            .get_mut(button)
            .with_context(|| format!("no release timing slot for button {}", button))?;

        let delta = elapsed_ms(timestamp, *previous_up);
        let below_min_delay = settings.min_delay >= 0 && delta <= i64::from(settings.min_delay);
        let suppress = delta < i64::from(threshold) && !below_min_delay;

        if suppress {
            self.ignored_clicks = self.ignored_clicks.wrapping_add(1);
            // A third rapid press is judged against "no release" rather than this one.
            *previous_up = 0;
            logger.log(
                format!(
                    "Ignored double click ({}): {} ms (#{})",
                    button, delta, self.ignored_clicks
                ),
                false,
            );
            return Ok(Verdict::Suppress);
        }

        if delta < i64::from(settings.double_click_reference_ms) && logger.is_foreground() {
            logger.log(format!("{} ms ({})", delta, button), true);
        }
        Ok(Verdict::Allow)
    }

    /// Records a genuine release.
    pub fn on_up(&mut self, button: LogicalButton, timestamp: u32) -> anyhow::Result<()> {
        let previous_up = self
            .previous_up
            .get_mut(button)
            .with_context(|| format!("no release timing slot for button {}", button))?;
        *previous_up = timestamp;
        Ok(())
    }

    pub fn previous_up(&self, button: LogicalButton) -> Option<u32> {
        self.previous_up.get(button).copied()
    }

    /// Suppressed presses since start, used to number diagnostics.
    pub fn ignored_clicks(&self) -> u32 {
        self.ignored_clicks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::RecordingSink;

    fn settings(min_delay: i32) -> Settings {
        Settings {
            min_delay,
            double_click_reference_ms: 500,
            ..Settings::default()
        }
    }

    #[test]
    fn test_down_without_prior_release_is_allowed() {
        let sink = RecordingSink::default();
        let mut suppressor = DoubleClickSuppressor::new();
        let verdict = suppressor
            .on_down(LogicalButton::Left, 100, 50, &settings(-1), &sink)
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn test_down_inside_window_is_suppressed_and_resets() {
        let sink = RecordingSink::default();
        let mut suppressor = DoubleClickSuppressor::new();
        suppressor.on_up(LogicalButton::Left, 110).unwrap();

        let verdict = suppressor
            .on_down(LogicalButton::Left, 120, 50, &settings(-1), &sink)
            .unwrap();

        assert_eq!(verdict, Verdict::Suppress);
        assert_eq!(suppressor.previous_up(LogicalButton::Left), Some(0));
        assert_eq!(suppressor.ignored_clicks(), 1);
        assert_eq!(
            sink.messages(),
            vec!["Ignored double click (Left): 10 ms (#1)".to_string()]
        );
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let sink = RecordingSink::default();
        let mut suppressor = DoubleClickSuppressor::new();

        suppressor.on_up(LogicalButton::Right, 100).unwrap();
        let at_19 = suppressor
            .on_down(LogicalButton::Right, 119, 20, &settings(-1), &sink)
            .unwrap();
        assert_eq!(at_19, Verdict::Suppress);

        suppressor.on_up(LogicalButton::Right, 200).unwrap();
        let at_20 = suppressor
            .on_down(LogicalButton::Right, 220, 20, &settings(-1), &sink)
            .unwrap();
        assert_eq!(at_20, Verdict::Allow);
    }

    #[test]
    fn test_min_delay_floor_allows_zero_gap() {
        let sink = RecordingSink::default();
        let mut suppressor = DoubleClickSuppressor::new();
        suppressor.on_up(LogicalButton::Left, 100).unwrap();

        let verdict = suppressor
            .on_down(LogicalButton::Left, 100, 50, &settings(0), &sink)
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn test_min_delay_floor_does_not_cover_larger_gaps() {
        let sink = RecordingSink::default();
        let mut suppressor = DoubleClickSuppressor::new();
        suppressor.on_up(LogicalButton::Left, 100).unwrap();

        let verdict = suppressor
            .on_down(LogicalButton::Left, 101, 50, &settings(0), &sink)
            .unwrap();
        assert_eq!(verdict, Verdict::Suppress);
    }

    #[test]
    fn test_wraparound_gap_is_small() {
        assert_eq!(elapsed_ms(0x0000_0010, 0xFFFF_FFF0), 0x20);

        let sink = RecordingSink::default();
        let mut suppressor = DoubleClickSuppressor::new();
        suppressor.on_up(LogicalButton::Left, 0xFFFF_FFF0).unwrap();

        let verdict = suppressor
            .on_down(LogicalButton::Left, 0x0000_0010, 50, &settings(-1), &sink)
            .unwrap();
        assert_eq!(verdict, Verdict::Suppress);
        assert_eq!(
            sink.messages(),
            vec!["Ignored double click (Left): 32 ms (#1)".to_string()]
        );
    }

    #[test]
    fn test_wraparound_gap_beyond_window_is_allowed() {
        let sink = RecordingSink::default();
        let mut suppressor = DoubleClickSuppressor::new();
        suppressor.on_up(LogicalButton::Left, 0xFFFF_FFF0).unwrap();

        let verdict = suppressor
            .on_down(LogicalButton::Left, 0x0000_0100, 50, &settings(-1), &sink)
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn test_allowed_fast_click_logs_only_in_foreground() {
        let sink = RecordingSink::default();
        let mut suppressor = DoubleClickSuppressor::new();
        suppressor.on_up(LogicalButton::Left, 100).unwrap();
        suppressor
            .on_down(LogicalButton::Left, 200, 50, &settings(-1), &sink)
            .unwrap();
        assert!(sink.messages().is_empty());

        let sink = RecordingSink::foreground();
        suppressor.on_up(LogicalButton::Left, 300).unwrap();
        suppressor
            .on_down(LogicalButton::Left, 400, 50, &settings(-1), &sink)
            .unwrap();
        assert_eq!(sink.messages(), vec!["100 ms (Left)".to_string()]);
    }

    #[test]
    fn test_untracked_button_is_an_error() {
        let sink = RecordingSink::default();
        let mut suppressor = DoubleClickSuppressor::new();
        assert!(
            suppressor
                .on_down(LogicalButton::Wheel, 100, 50, &settings(-1), &sink)
                .is_err()
        );
        assert!(suppressor.on_up(LogicalButton::None, 100).is_err());
    }

    #[test]
    fn test_buttons_are_independent() {
        let sink = RecordingSink::default();
        let mut suppressor = DoubleClickSuppressor::new();
        suppressor.on_up(LogicalButton::Left, 100).unwrap();

        let verdict = suppressor
            .on_down(LogicalButton::Middle, 105, 50, &settings(-1), &sink)
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(suppressor.previous_up(LogicalButton::Left), Some(100));
    }
}
