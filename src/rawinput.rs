//! Message-only window that runs on the hook thread.
//!
//! It receives raw mouse input, used only to learn which device produced the
//! latest event, and the power and session notifications that drive the
//! hook's remove/reinstall cycle.

use windows::Win32::Foundation::*;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::RemoteDesktop::{
    NOTIFY_FOR_THIS_SESSION, WTSRegisterSessionNotification, WTSUnRegisterSessionNotification,
};
use windows::Win32::UI::Input::*;
use windows::Win32::UI::WindowsAndMessaging::*;
use windows::core::{PCWSTR, w};

use clickfix::filter::DeviceId;
use clickfix::util::unlikely;

use crate::mouse::{self, MouseHook};

const HOST_WINDOW_CLASS: PCWSTR = w!("ClickfixHostWindow");
const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;

const PBT_APMSUSPEND: usize = 0x0004;
const PBT_APMRESUMESUSPEND: usize = 0x0007;
const PBT_APMRESUMEAUTOMATIC: usize = 0x0012;

const WTS_SESSION_LOCK: usize = 0x7;
const WTS_SESSION_UNLOCK: usize = 0x8;

const USAGE_PAGE_GENERIC: u16 = 0x01;
const USAGE_MOUSE: u16 = 0x02;

/// The host window. Destroyed, with its registrations, on drop.
pub struct HostWindow {
    hwnd: HWND,
    instance: HINSTANCE,
    session_notifications: bool,
}

impl HostWindow {
    /// Creates the window on the current thread. Its messages are dispatched
    /// by that thread's message loop.
    pub fn create() -> anyhow::Result<Self> {
        unsafe {
            let instance = HINSTANCE(GetModuleHandleW(None)?.0);

            let wc = WNDCLASSW {
                lpfnWndProc: Some(Self::window_proc),
                hInstance: instance,
                lpszClassName: HOST_WINDOW_CLASS,
                ..Default::default()
            };

            if RegisterClassW(&wc) == 0 {
                let last_error = GetLastError();
                if last_error.0 != ERROR_CLASS_ALREADY_EXISTS {
                    return Err(anyhow::anyhow!(
                        "Failed to register window class: {:?}",
                        last_error
                    ));
                }
            }

            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE(0),
                HOST_WINDOW_CLASS,
                w!("clickfix host window"),
                WINDOW_STYLE(0),
                0,
                0,
                0,
                0,
                Some(HWND_MESSAGE),
                None,
                Some(instance),
                None,
            )?;

            let mut window = Self {
                hwnd,
                instance,
                session_notifications: false,
            };
            window.register()?;
            Ok(window)
        }
    }

    fn register(&mut self) -> anyhow::Result<()> {
        let devices = [RAWINPUTDEVICE {
            usUsagePage: USAGE_PAGE_GENERIC,
            usUsage: USAGE_MOUSE,
            dwFlags: RIDEV_INPUTSINK,
            hwndTarget: self.hwnd,
        }];
        unsafe {
            RegisterRawInputDevices(&devices, std::mem::size_of::<RAWINPUTDEVICE>() as u32)?;
        }

        // Lock/unlock handling is optional; raw input is not
        match unsafe { WTSRegisterSessionNotification(self.hwnd, NOTIFY_FOR_THIS_SESSION) } {
            Ok(()) => self.session_notifications = true,
            Err(e) => {
                if let Some(logger) = MouseHook::logger() {
                    logger.log(
                        format!("Failed to register for session notifications: {}", e),
                        false,
                    );
                }
            }
        }
        Ok(())
    }

    unsafe extern "system" fn window_proc(
        hwnd: HWND,
        msg: u32,
        w_param: WPARAM,
        l_param: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_INPUT => {
                if let Some(device) = device_from_input(l_param) {
                    MouseHook::with_filter(|filter| filter.observe_device(device));
                }
                unsafe { DefWindowProcW(hwnd, msg, w_param, l_param) }
            }
            WM_POWERBROADCAST => {
                match w_param.0 {
                    PBT_APMSUSPEND => remove_hook("system suspend"),
                    PBT_APMRESUMEAUTOMATIC | PBT_APMRESUMESUSPEND => mouse::reinstall("resume"),
                    _ => {}
                }
                LRESULT(1)
            }
            WM_WTSSESSION_CHANGE => {
                match w_param.0 {
                    WTS_SESSION_LOCK => remove_hook("session lock"),
                    WTS_SESSION_UNLOCK => mouse::reinstall("session unlock"),
                    _ => {}
                }
                LRESULT(0)
            }
            WM_ENDSESSION => {
                if w_param.0 != 0 {
                    remove_hook("session end");
                }
                LRESULT(0)
            }
            _ => unsafe { DefWindowProcW(hwnd, msg, w_param, l_param) },
        }
    }
}

impl Drop for HostWindow {
    fn drop(&mut self) {
        unsafe {
            if self.session_notifications {
                let _ = WTSUnRegisterSessionNotification(self.hwnd);
            }
            let _ = DestroyWindow(self.hwnd);
            let _ = UnregisterClassW(HOST_WINDOW_CLASS, Some(self.instance));
        }
    }
}

fn remove_hook(reason: &str) {
    if MouseHook::uninstall()
        && let Some(logger) = MouseHook::logger()
    {
        logger.log(format!("Mouse hook removed ({})", reason), false);
    }
}

/// Reads only the header of a `WM_INPUT` payload.
fn device_from_input(l_param: LPARAM) -> Option<DeviceId> {
    let mut header = RAWINPUTHEADER::default();
    let mut size = std::mem::size_of::<RAWINPUTHEADER>() as u32;
    let copied = unsafe {
        GetRawInputData(
            HRAWINPUT(l_param.0 as _),
            RID_HEADER,
            Some(&mut header as *mut RAWINPUTHEADER as _),
            &mut size,
            std::mem::size_of::<RAWINPUTHEADER>() as u32,
        )
    };

    if unlikely(copied == u32::MAX || copied == 0) || header.dwType != RIM_TYPEMOUSE.0 {
        return None;
    }
    Some(header.hDevice.0 as isize as DeviceId)
}
