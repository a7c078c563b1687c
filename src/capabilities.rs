//! Pointer hardware present on the machine, reported once at startup.
//!
//! Touch screens and touch pads are the usual reason to configure an ignored
//! device or a min delay, so the log says which ones were found.

/// Snapshot of the pointer devices Windows reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputCapabilities {
    /// A ready touch digitizer, or a non-zero maximum touch count.
    pub has_touchscreen: bool,
    /// A HID touch pad (digitizer usage page, touch pad usage).
    pub has_precision_touchpad: bool,
    /// Any mouse-like pointer; a touch pad counts as a mouse.
    pub has_mouse_like_pointer: bool,
}

impl InputCapabilities {
    pub fn description(&self) -> &'static str {
        match (
            self.has_touchscreen,
            self.has_precision_touchpad,
            self.has_mouse_like_pointer,
        ) {
            (true, true, _) => "Touchscreen + precision touchpad",
            (true, false, true) => "Touchscreen + mouse",
            (true, false, false) => "Touchscreen only",
            (false, true, _) => "Precision touchpad",
            (false, false, true) => "Mouse only",
            (false, false, false) => "No standard pointer device detected",
        }
    }

    /// Queries the system once. Safe to call from any thread.
    #[cfg(windows)]
    pub fn detect() -> Self {
        Self {
            has_touchscreen: windows_impl::detect_touchscreen(),
            has_precision_touchpad: windows_impl::detect_precision_touchpad(),
            has_mouse_like_pointer: windows_impl::detect_mouse_like_pointer(),
        }
    }

    #[cfg(not(windows))]
    pub fn detect() -> Self {
        Self::default()
    }
}

#[cfg(windows)]
mod windows_impl {
    use windows::Win32::UI::Input::*;
    use windows::Win32::UI::WindowsAndMessaging::{
        GetSystemMetrics, SM_DIGITIZER, SM_MAXIMUMTOUCHES, SM_MOUSEPRESENT,
    };

    const NID_INTEGRATED_TOUCH: i32 = 0x01;
    const NID_EXTERNAL_TOUCH: i32 = 0x02;
    const NID_READY: i32 = 0x80;

    const USAGE_PAGE_DIGITIZER: u16 = 0x0D;
    const USAGE_TOUCH_PAD: u16 = 0x05;

    pub(super) fn detect_touchscreen() -> bool {
        let caps = unsafe { GetSystemMetrics(SM_DIGITIZER) };
        let present = caps & (NID_INTEGRATED_TOUCH | NID_EXTERNAL_TOUCH) != 0;
        let ready = caps & NID_READY != 0;
        if present && ready {
            return true;
        }
        // Some machines only report a touch count
        unsafe { GetSystemMetrics(SM_MAXIMUMTOUCHES) > 0 }
    }

    pub(super) fn detect_mouse_like_pointer() -> bool {
        unsafe { GetSystemMetrics(SM_MOUSEPRESENT) != 0 }
    }

    pub(super) fn detect_precision_touchpad() -> bool {
        let entry_size = std::mem::size_of::<RAWINPUTDEVICELIST>() as u32;
        unsafe {
            let mut count = 0u32;
            if GetRawInputDeviceList(None, &mut count, entry_size) == u32::MAX || count == 0 {
                return false;
            }

            let mut devices = vec![RAWINPUTDEVICELIST::default(); count as usize];
            let written = GetRawInputDeviceList(Some(devices.as_mut_ptr()), &mut count, entry_size);
            if written == u32::MAX {
                return false;
            }

            devices
                .iter()
                .take(written as usize)
                .filter(|device| device.dwType == RIM_TYPEHID)
                .any(|device| {
                    hid_usage(device.hDevice) == Some((USAGE_PAGE_DIGITIZER, USAGE_TOUCH_PAD))
                })
        }
    }

    unsafe fn hid_usage(device: windows::Win32::Foundation::HANDLE) -> Option<(u16, u16)> {
        let mut info = RID_DEVICE_INFO {
            cbSize: std::mem::size_of::<RID_DEVICE_INFO>() as u32,
            ..Default::default()
        };
        let mut size = info.cbSize;
        let result = unsafe {
            GetRawInputDeviceInfoW(
                Some(device),
                RIDI_DEVICEINFO,
                Some(&mut info as *mut RID_DEVICE_INFO as _),
                &mut size,
            )
        };
        if result == u32::MAX || info.dwType != RIM_TYPEHID {
            return None;
        }
        let hid = unsafe { info.Anonymous.hid };
        Some((hid.usUsagePage, hid.usUsage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(touch: bool, touchpad: bool, mouse: bool) -> InputCapabilities {
        InputCapabilities {
            has_touchscreen: touch,
            has_precision_touchpad: touchpad,
            has_mouse_like_pointer: mouse,
        }
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(caps(true, true, true).description(), "Touchscreen + precision touchpad");
        assert_eq!(caps(true, false, true).description(), "Touchscreen + mouse");
        assert_eq!(caps(true, false, false).description(), "Touchscreen only");
        assert_eq!(caps(false, true, true).description(), "Precision touchpad");
        assert_eq!(caps(false, false, true).description(), "Mouse only");
        assert_eq!(
            caps(false, false, false).description(),
            "No standard pointer device detected"
        );
    }
}
