//! Low-level mouse hook and the thread that owns it.
//!
//! The hook callback, the raw input window and the filter all live on one
//! thread, so the filter is kept in a thread-local and never locked.

use std::cell::RefCell;
use std::sync::Arc;

use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::*;

use clickfix::filter::{MouseEvent, MouseFilter};
use clickfix::logging::LogSink;
use clickfix::settings::SettingsStore;
use clickfix::util::likely;

struct HookContext {
    filter: MouseFilter,
    store: Arc<SettingsStore>,
    logger: Arc<dyn LogSink>,
    hook: Option<HHOOK>,
    /// Cleared by `--no-hook`; lifecycle events never install the hook then.
    enabled: bool,
}

thread_local! {
    static HOOK_CONTEXT: RefCell<Option<HookContext>> = const { RefCell::new(None) };
}

/// Owns the hook thread's state. Not `Send`: create it on the thread that runs
/// the message loop.
pub struct MouseHook {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl MouseHook {
    /// Prepares the filter on the current thread and, if `install` is set,
    /// installs the hook. An install failure is logged and the thread keeps
    /// running so a later resume or unlock can retry.
    pub fn new(
        filter: MouseFilter,
        store: Arc<SettingsStore>,
        logger: Arc<dyn LogSink>,
        install: bool,
    ) -> Self {
        HOOK_CONTEXT.with(|cell| {
            *cell.borrow_mut() = Some(HookContext {
                filter,
                store,
                logger: logger.clone(),
                hook: None,
                enabled: install,
            });
        });

        if install {
            match Self::install() {
                Ok(()) => logger.log("Mouse hook installed".to_string(), false),
                Err(e) => logger.log(format!("Failed to install mouse hook: {:#}", e), false),
            }
        } else {
            logger.log("Running without mouse hook".to_string(), false);
        }

        Self {
            _not_send: std::marker::PhantomData,
        }
    }

    /// Installs the hook if it is not already installed.
    pub fn install() -> anyhow::Result<()> {
        HOOK_CONTEXT.with(|cell| {
            let mut guard = cell
                .try_borrow_mut()
                .map_err(|_| anyhow::anyhow!("hook context is busy"))?;
            let context = guard
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!("hook context not initialized"))?;
            if context.hook.is_some() {
                return Ok(());
            }

            let hook = unsafe { SetWindowsHookExA(WH_MOUSE_LL, Some(Self::mouse_proc), None, 0)? };
            if hook.0.is_null() {
                anyhow::bail!("Failed to set mouse hook.");
            }
            context.hook = Some(hook);
            Ok(())
        })
    }

    /// Removes the hook. Returns `true` if one was installed.
    pub fn uninstall() -> bool {
        HOOK_CONTEXT.with(|cell| {
            let Ok(mut guard) = cell.try_borrow_mut() else {
                return false;
            };
            match guard.as_mut().and_then(|context| context.hook.take()) {
                Some(hook) => {
                    unsafe {
                        let _ = UnhookWindowsHookEx(hook);
                    }
                    true
                }
                None => false,
            }
        })
    }

    /// Enabled but currently removed, e.g. after a suspend.
    pub fn needs_reinstall() -> bool {
        HOOK_CONTEXT.with(|cell| {
            cell.try_borrow()
                .map(|guard| {
                    guard
                        .as_ref()
                        .is_some_and(|context| context.enabled && context.hook.is_none())
                })
                .unwrap_or(false)
        })
    }

    /// Runs `f` against the filter, unless the context is missing or in use.
    pub fn with_filter<R>(f: impl FnOnce(&mut MouseFilter) -> R) -> Option<R> {
        HOOK_CONTEXT.with(|cell| {
            let mut guard = cell.try_borrow_mut().ok()?;
            guard.as_mut().map(|context| f(&mut context.filter))
        })
    }

    pub fn logger() -> Option<Arc<dyn LogSink>> {
        HOOK_CONTEXT.with(|cell| {
            cell.try_borrow()
                .ok()
                .and_then(|guard| guard.as_ref().map(|context| context.logger.clone()))
        })
    }

    /// Pumps messages until `WM_QUIT`. The hook is removed on drop.
    pub fn run_message_loop(self) -> anyhow::Result<()> {
        unsafe {
            let mut msg = MSG::default();
            loop {
                let result = GetMessageW(&mut msg, None, 0, 0);

                if result.0 == 0 || result.0 == -1 {
                    break;
                }

                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        Ok(())
    }

    unsafe extern "system" fn mouse_proc(code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
        if code < 0 {
            return unsafe { CallNextHookEx(None, code, w_param, l_param) };
        }

        let info = unsafe { &*(l_param.0 as *const MSLLHOOKSTRUCT) };

        let suppress = HOOK_CONTEXT.with(|cell| {
            let Ok(mut guard) = cell.try_borrow_mut() else {
                return false;
            };
            let Some(context) = guard.as_mut() else {
                return false;
            };

            context.filter.sync_settings(&context.store);
            let event = MouseEvent::new(w_param.0 as u32, info.time)
                .with_mouse_data(info.mouseData)
                .with_position(info.pt.x, info.pt.y)
                .with_device(context.filter.current_device());
            context.filter.handle(&event).is_suppress()
        });

        if suppress {
            return LRESULT(1);
        }

        unsafe { CallNextHookEx(None, code, w_param, l_param) }
    }
}

impl Drop for MouseHook {
    fn drop(&mut self) {
        if Self::uninstall()
            && let Some(logger) = Self::logger()
        {
            logger.log("Mouse hook removed".to_string(), false);
        }
        HOOK_CONTEXT.with(|cell| {
            if let Ok(mut guard) = cell.try_borrow_mut() {
                *guard = None;
            }
        });
    }
}

/// Reinstalls the hook after a suspend or lock, logging `reason` on failure.
pub fn reinstall(reason: &str) {
    if !likely(MouseHook::needs_reinstall()) {
        return;
    }
    let Some(logger) = MouseHook::logger() else {
        return;
    };
    match MouseHook::install() {
        Ok(()) => logger.log(format!("Mouse hook reinstalled after {}", reason), false),
        Err(e) => logger.log(
            format!("Failed to reinstall mouse hook after {}: {:#}", reason, e),
            false,
        ),
    }
}
