//! Message classification and the derived set of observed messages.

use crate::settings::Settings;

use super::types::*;

/// Set of button message codes the dispatch loop inspects.
///
/// Stored as a bitmask over the offset from [`message::MOUSE_MOVE`], so a
/// membership test is a shift and a mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservedMessages {
    mask: u32,
}

impl ObservedMessages {
    #[inline(always)]
    fn bit(message: u32) -> Option<u32> {
        message
            .checked_sub(message::MOUSE_MOVE)
            .filter(|offset| *offset < 32)
            .map(|offset| 1 << offset)
    }

    fn insert(&mut self, message: u32) {
        if let Some(bit) = Self::bit(message) {
            self.mask |= bit;
        }
    }

    #[inline(always)]
    pub fn contains(&self, message: u32) -> bool {
        Self::bit(message).is_some_and(|bit| self.mask & bit != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Recomputes the set from the enabled per-button thresholds.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut observed = Self::default();
        if settings.left_threshold >= 0 {
            observed.insert(message::LBUTTON_DOWN);
            observed.insert(message::LBUTTON_UP);
        }
        if settings.right_threshold >= 0 {
            observed.insert(message::RBUTTON_DOWN);
            observed.insert(message::RBUTTON_UP);
        }
        if settings.middle_threshold >= 0 {
            observed.insert(message::MBUTTON_DOWN);
            observed.insert(message::MBUTTON_UP);
        }
        if settings.x1_threshold >= 0 || settings.x2_threshold >= 0 {
            observed.insert(message::XBUTTON_DOWN);
            observed.insert(message::XBUTTON_UP);
        }
        observed
    }
}

/// Maps a raw message to a logical button and its polarity.
///
/// Messages outside `observed` and extended-button events whose button is
/// disabled classify as [`Classification::NONE`].
#[inline]
pub fn classify(
    message: u32,
    mouse_data: u32,
    observed: &ObservedMessages,
    settings: &Settings,
) -> Classification {
    if !observed.contains(message) {
        return Classification::NONE;
    }

    match message {
        message::LBUTTON_DOWN => Classification::down(LogicalButton::Left),
        message::LBUTTON_UP => Classification::up(LogicalButton::Left),
        message::RBUTTON_DOWN => Classification::down(LogicalButton::Right),
        message::RBUTTON_UP => Classification::up(LogicalButton::Right),
        message::MBUTTON_DOWN => Classification::down(LogicalButton::Middle),
        message::MBUTTON_UP => Classification::up(LogicalButton::Middle),
        message::XBUTTON_DOWN => match x_button(mouse_data, settings) {
            LogicalButton::None => Classification::NONE,
            button => Classification::down(button),
        },
        message::XBUTTON_UP => match x_button(mouse_data, settings) {
            LogicalButton::None => Classification::NONE,
            button => Classification::up(button),
        },
        _ => Classification::NONE,
    }
}

/// Selects the extended button from the high word of `mouse_data`.
#[inline(always)]
fn x_button(mouse_data: u32, settings: &Settings) -> LogicalButton {
    let high_word = (mouse_data >> 16) & 0xFFFF;
    if settings.x1_threshold >= 0 && high_word & XBUTTON1 != 0 {
        LogicalButton::X1
    } else if settings.x2_threshold >= 0 && high_word & XBUTTON2 != 0 {
        LogicalButton::X2
    } else {
        LogicalButton::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_enabled() -> Settings {
        Settings {
            left_threshold: 50,
            right_threshold: 50,
            middle_threshold: 50,
            x1_threshold: 50,
            x2_threshold: 50,
            ..Settings::default()
        }
    }

    #[test]
    fn test_observed_set_follows_thresholds() {
        let observed = ObservedMessages::from_settings(&Settings::default());
        assert!(observed.contains(message::LBUTTON_DOWN));
        assert!(observed.contains(message::LBUTTON_UP));
        assert!(!observed.contains(message::RBUTTON_DOWN));
        assert!(!observed.contains(message::MBUTTON_UP));
        assert!(!observed.contains(message::XBUTTON_DOWN));
        assert!(!observed.contains(message::MOUSE_MOVE));
    }

    #[test]
    fn test_observed_set_empty_when_everything_disabled() {
        let settings = Settings {
            left_threshold: -1,
            ..Settings::default()
        };
        assert!(ObservedMessages::from_settings(&settings).is_empty());
    }

    #[test]
    fn test_observed_set_x_messages_shared_by_x1_and_x2() {
        let settings = Settings {
            x2_threshold: 0,
            ..Settings::default()
        };
        let observed = ObservedMessages::from_settings(&settings);
        assert!(observed.contains(message::XBUTTON_DOWN));
        assert!(observed.contains(message::XBUTTON_UP));
    }

    #[test]
    fn test_observed_set_ignores_out_of_range_codes() {
        let observed = ObservedMessages::from_settings(&all_enabled());
        assert!(!observed.contains(0));
        assert!(!observed.contains(0x01FF));
        assert!(!observed.contains(0x0200 + 32));
        assert!(!observed.contains(u32::MAX));
    }

    #[test]
    fn test_classify_standard_buttons() {
        let settings = all_enabled();
        let observed = ObservedMessages::from_settings(&settings);

        let cases = [
            (message::LBUTTON_DOWN, Classification::down(LogicalButton::Left)),
            (message::LBUTTON_UP, Classification::up(LogicalButton::Left)),
            (message::RBUTTON_DOWN, Classification::down(LogicalButton::Right)),
            (message::RBUTTON_UP, Classification::up(LogicalButton::Right)),
            (message::MBUTTON_DOWN, Classification::down(LogicalButton::Middle)),
            (message::MBUTTON_UP, Classification::up(LogicalButton::Middle)),
        ];
        for (msg, expected) in cases {
            assert_eq!(classify(msg, 0, &observed, &settings), expected);
        }
    }

    #[test]
    fn test_classify_x_buttons_from_high_word() {
        let settings = all_enabled();
        let observed = ObservedMessages::from_settings(&settings);

        assert_eq!(
            classify(message::XBUTTON_DOWN, 0x0001_0000, &observed, &settings),
            Classification::down(LogicalButton::X1)
        );
        assert_eq!(
            classify(message::XBUTTON_UP, 0x0002_0000, &observed, &settings),
            Classification::up(LogicalButton::X2)
        );
        // Low word is not a button selector
        assert!(classify(message::XBUTTON_DOWN, 0x0000_0001, &observed, &settings).is_none());
    }

    #[test]
    fn test_classify_disabled_x_button_is_none() {
        let settings = Settings {
            x1_threshold: -1,
            x2_threshold: 20,
            ..Settings::default()
        };
        let observed = ObservedMessages::from_settings(&settings);

        assert!(classify(message::XBUTTON_DOWN, 0x0001_0000, &observed, &settings).is_none());
        assert_eq!(
            classify(message::XBUTTON_DOWN, 0x0002_0000, &observed, &settings),
            Classification::down(LogicalButton::X2)
        );
    }

    #[test]
    fn test_classify_both_bits_prefers_x1() {
        let settings = all_enabled();
        let observed = ObservedMessages::from_settings(&settings);
        assert_eq!(
            classify(message::XBUTTON_DOWN, 0x0003_0000, &observed, &settings),
            Classification::down(LogicalButton::X1)
        );
    }

    #[test]
    fn test_classify_unobserved_and_unknown_messages() {
        let settings = Settings::default();
        let observed = ObservedMessages::from_settings(&settings);

        assert!(classify(message::RBUTTON_DOWN, 0, &observed, &settings).is_none());
        assert!(classify(message::MOUSE_MOVE, 0, &observed, &settings).is_none());
        assert!(classify(message::MOUSE_WHEEL, 0, &observed, &settings).is_none());
        assert!(classify(0xDEAD, 0, &observed, &settings).is_none());
    }

    #[test]
    fn test_classify_is_idempotent() {
        let settings = all_enabled();
        let observed = ObservedMessages::from_settings(&settings);
        for msg in 0x0200..=0x020Du32 {
            for data in [0u32, 0x0001_0000, 0x0002_0000, 0xFFFF_FFFF] {
                let first = classify(msg, data, &observed, &settings);
                let second = classify(msg, data, &observed, &settings);
                assert_eq!(first, second);
            }
        }
    }
}
