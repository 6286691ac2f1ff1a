//! Window discovery functions for finding the game client window.

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{ClientToScreen, MonitorFromWindow, MONITOR_DEFAULTTONEAREST};
use windows::Win32::UI::HiDpi::{
    GetAwarenessFromDpiAwarenessContext, GetDpiForMonitor, GetWindowDpiAwarenessContext,
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    DPI_AWARENESS_UNAWARE, MDT_EFFECTIVE_DPI,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowRect, GetWindowTextLengthW, GetWindowTextW, IsWindow,
    IsWindowVisible,
};

use super::{input_scale, WindowHandle};

pub(crate) fn to_hwnd(window: WindowHandle) -> HWND {
    HWND(window.0 as *mut std::ffi::c_void)
}

pub(crate) fn from_hwnd(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as isize)
}

/// Finds the first visible top-level window whose title contains `title_fragment`.
///
/// Returns an error if no window matches (the game is not running).
pub fn find_window_by_title(title_fragment: &str) -> Result<WindowHandle> {
    struct EnumData {
        needle: String,
        hwnd: Option<HWND>,
        title: Option<String>,
    }

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let data = &mut *(lparam.0 as *mut EnumData);

            if !IsWindowVisible(hwnd).as_bool() {
                return TRUE;
            }

            let title_len = GetWindowTextLengthW(hwnd);
            if title_len <= 0 {
                return TRUE;
            }
            let mut title_buf: Vec<u16> = vec![0; (title_len + 1) as usize];
            GetWindowTextW(hwnd, &mut title_buf);
            let title = OsString::from_wide(&title_buf[..title_len as usize])
                .to_string_lossy()
                .to_string();

            if title.contains(&data.needle) {
                data.hwnd = Some(hwnd);
                data.title = Some(title);
                return BOOL(0); // Stop enumeration
            }

            TRUE
        }
    }

    crate::log(&format!("Searching for window titled \"{}\"...", title_fragment));
    let mut data = EnumData {
        needle: title_fragment.to_string(),
        hwnd: None,
        title: None,
    };
    unsafe {
        // EnumWindows returns FALSE when the callback stops it early, which is expected
        let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
    }

    if let Some(title) = &data.title {
        crate::log(&format!("Found window: \"{}\"", title));
    }

    data.hwnd.map(from_hwnd).ok_or_else(|| {
        anyhow!(
            "Could not find a window titled \"{}\". Is the game running?",
            title_fragment
        )
    })
}

/// Checks if a window handle is still valid.
pub fn is_window_valid(window: WindowHandle) -> bool {
    unsafe { IsWindow(to_hwnd(window)).as_bool() }
}

/// Makes window rectangles and capture textures report physical pixels.
///
/// Must run before any window is queried. Fails if the awareness was already
/// set, e.g. by a manifest.
pub fn enable_dpi_awareness() -> Result<()> {
    unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2)? };
    Ok(())
}

/// Multiplier from frame pixels to the window's client coordinates.
pub fn get_input_scale(window: WindowHandle) -> f32 {
    let hwnd = to_hwnd(window);
    let unaware = unsafe {
        GetAwarenessFromDpiAwarenessContext(GetWindowDpiAwarenessContext(hwnd))
            == DPI_AWARENESS_UNAWARE
    };

    let monitor = unsafe { MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST) };
    let (mut dpi_x, mut dpi_y) = (0u32, 0u32);
    if unsafe { GetDpiForMonitor(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y) }.is_err() {
        crate::log("GetDpiForMonitor failed, assuming 100% scaling");
        return 1.0;
    }
    input_scale(unaware, dpi_x)
}

/// Gets the client area rectangle and its offset relative to the window origin.
///
/// The offset is needed to crop a whole-window capture down to the client area.
pub fn get_client_area_info(window: WindowHandle) -> Result<(RECT, POINT)> {
    let hwnd = to_hwnd(window);
    let mut client_rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut client_rect)? };

    let mut client_origin = POINT { x: 0, y: 0 };
    unsafe {
        if !ClientToScreen(hwnd, &mut client_origin).as_bool() {
            return Err(anyhow!("ClientToScreen failed"));
        }
    }

    let mut window_rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut window_rect)? };

    let offset = POINT {
        x: client_origin.x - window_rect.left,
        y: client_origin.y - window_rect.top,
    };

    Ok((client_rect, offset))
}
