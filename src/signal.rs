use std::sync::atomic::{AtomicU32, Ordering};

use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::System::Console::*;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{PostThreadMessageA, WM_QUIT};
use windows::core::*;

/// Thread running the hook's message loop; `0` until it registers.
static HOOK_THREAD_ID: AtomicU32 = AtomicU32::new(0);

pub fn set_control_ctrl_handler() -> Result<()> {
    unsafe { SetConsoleCtrlHandler(Some(console_handler), true) }
}

/// Marks the calling thread as the one to stop on Ctrl+C or close.
pub fn register_hook_thread() {
    HOOK_THREAD_ID.store(unsafe { GetCurrentThreadId() }, Ordering::Release);
}

/// Asks the hook thread to leave its message loop.
pub fn request_exit() -> bool {
    match HOOK_THREAD_ID.load(Ordering::Acquire) {
        0 => false,
        thread_id => unsafe {
            PostThreadMessageA(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)).is_ok()
        },
    }
}

unsafe extern "system" fn console_handler(ctrl_type: u32) -> BOOL {
    match ctrl_type {
        CTRL_C_EVENT | CTRL_BREAK_EVENT | CTRL_CLOSE_EVENT => {
            if !request_exit() {
                std::process::exit(0); // no hook thread yet
            }
            BOOL(1) // Event has been handled
        }
        _ => BOOL(0), // Leave other events to the default handler
    }
}
