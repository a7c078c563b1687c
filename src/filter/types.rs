//! Type definitions shared by the filter stages.

use std::fmt;

/// Identifier of the physical device that produced an event.
///
/// On Windows this is the raw input device handle.
pub type DeviceId = i64;

/// Device id reported while no raw input has been observed yet.
pub const UNKNOWN_DEVICE: DeviceId = -1;

/// Low-level mouse message codes, as delivered by the host hook.
pub mod message {
    pub const MOUSE_MOVE: u32 = 0x0200;
    pub const LBUTTON_DOWN: u32 = 0x0201;
    pub const LBUTTON_UP: u32 = 0x0202;
    pub const RBUTTON_DOWN: u32 = 0x0204;
    pub const RBUTTON_UP: u32 = 0x0205;
    pub const MBUTTON_DOWN: u32 = 0x0207;
    pub const MBUTTON_UP: u32 = 0x0208;
    pub const MOUSE_WHEEL: u32 = 0x020A;
    pub const XBUTTON_DOWN: u32 = 0x020B;
    pub const XBUTTON_UP: u32 = 0x020C;
}

/// Bits in the high word of the auxiliary data of extended button events.
pub const XBUTTON1: u32 = 0x0001;
pub const XBUTTON2: u32 = 0x0002;

/// Number of buttons with per-button state.
pub const BUTTON_COUNT: usize = 5;

/// Logical mouse button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
    Wheel,
    None,
}

impl LogicalButton {
    /// Buttons that carry per-button timing and drag state.
    pub const TRACKED: [LogicalButton; BUTTON_COUNT] = [
        LogicalButton::Left,
        LogicalButton::Right,
        LogicalButton::Middle,
        LogicalButton::X1,
        LogicalButton::X2,
    ];

    /// Slot of this button in a [`ButtonMap`], if it is tracked.
    #[inline(always)]
    pub const fn index(self) -> Option<usize> {
        match self {
            LogicalButton::Left => Some(0),
            LogicalButton::Right => Some(1),
            LogicalButton::Middle => Some(2),
            LogicalButton::X1 => Some(3),
            LogicalButton::X2 => Some(4),
            LogicalButton::Wheel | LogicalButton::None => None,
        }
    }
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalButton::Left => "Left",
            LogicalButton::Right => "Right",
            LogicalButton::Middle => "Middle",
            LogicalButton::X1 => "X1",
            LogicalButton::X2 => "X2",
            LogicalButton::Wheel => "Wheel",
            LogicalButton::None => "None",
        };
        f.write_str(name)
    }
}

/// Fixed-size per-button storage indexed by [`LogicalButton::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonMap<T> {
    slots: [T; BUTTON_COUNT],
}

impl<T: Copy> ButtonMap<T> {
    pub const fn filled(value: T) -> Self {
        Self {
            slots: [value; BUTTON_COUNT],
        }
    }
}

impl<T> ButtonMap<T> {
    #[inline(always)]
    pub fn get(&self, button: LogicalButton) -> Option<&T> {
        button.index().map(|i| &self.slots[i])
    }

    #[inline(always)]
    pub fn get_mut(&mut self, button: LogicalButton) -> Option<&mut T> {
        button.index().map(|i| &mut self.slots[i])
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (LogicalButton, &mut T)> {
        LogicalButton::TRACKED.into_iter().zip(self.slots.iter_mut())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }
}

/// Screen position of the cursor in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance, widened so extreme coordinates cannot overflow.
    #[inline(always)]
    pub fn distance_squared(self, other: Point) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

/// One low-level mouse event, populated by the host before calling the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// Raw message code (see [`message`]).
    pub message: u32,
    /// Auxiliary data word; the high word selects the extended button.
    pub mouse_data: u32,
    /// Wrapping millisecond timestamp.
    pub timestamp: u32,
    pub position: Point,
    pub device_id: DeviceId,
}

impl MouseEvent {
    pub const fn new(message: u32, timestamp: u32) -> Self {
        Self {
            message,
            mouse_data: 0,
            timestamp,
            position: Point::new(0, 0),
            device_id: UNKNOWN_DEVICE,
        }
    }

    pub const fn with_mouse_data(mut self, mouse_data: u32) -> Self {
        self.mouse_data = mouse_data;
        self
    }

    pub const fn with_position(mut self, x: i32, y: i32) -> Self {
        self.position = Point::new(x, y);
        self
    }

    pub const fn with_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = device_id;
        self
    }

    #[inline(always)]
    pub const fn is_move(&self) -> bool {
        self.message == message::MOUSE_MOVE
    }
}

/// Decision returned to the host for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward the event to the next handler.
    Allow,
    /// Drop the event.
    Suppress,
}

impl Verdict {
    #[inline(always)]
    pub const fn is_suppress(self) -> bool {
        matches!(self, Verdict::Suppress)
    }
}

/// Result of classifying a button message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub button: LogicalButton,
    pub is_down: bool,
    pub is_up: bool,
}

impl Classification {
    pub const NONE: Classification = Classification {
        button: LogicalButton::None,
        is_down: false,
        is_up: false,
    };

    pub const fn down(button: LogicalButton) -> Self {
        Self {
            button,
            is_down: true,
            is_up: false,
        }
    }

    pub const fn up(button: LogicalButton) -> Self {
        Self {
            button,
            is_down: false,
            is_up: true,
        }
    }

    pub const fn is_none(&self) -> bool {
        matches!(self.button, LogicalButton::None)
    }
}

/// Elapsed milliseconds between two wrapping timestamps.
///
/// The subtraction is done on the unsigned 32-bit values first, so a pair that
/// straddles the counter rollover yields the small positive gap.
#[inline(always)]
pub const fn elapsed_ms(now: u32, earlier: u32) -> i64 {
    now.wrapping_sub(earlier) as i64
}
