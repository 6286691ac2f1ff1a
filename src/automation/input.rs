//! Mouse input for UI automation.
//!
//! The automation core talks to an `InputSink`. Coordinates handed to a sink
//! are final window-local client pixels: the controller has already applied
//! the DPI multiplier.
//!
//! The Windows sink posts mouse messages straight to the game window, so the
//! real cursor is never moved and the game does not need focus.

use crate::capture::{Point, WindowHandle};
use crate::error::Result;

/// Direction the pointer travels while the button is held.
///
/// Dragging a list `Up` advances it (content moves up); `Down` rewinds it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragDirection {
    Up,
    Down,
}

/// Synthetic mouse input for one window.
pub trait InputSink {
    fn click(&self, window: WindowHandle, point: Point) -> Result<()>;

    fn drag(
        &self,
        window: WindowHandle,
        start: Point,
        distance: u32,
        direction: DragDirection,
    ) -> Result<()>;
}

/// End point of a vertical drag.
pub fn drag_end(start: Point, distance: u32, direction: DragDirection) -> Point {
    let d = distance as i32;
    match direction {
        DragDirection::Up => Point::new(start.x, start.y - d),
        DragDirection::Down => Point::new(start.x, start.y + d),
    }
}

#[cfg(windows)]
pub use self::windows_input::PostMessageInput;

#[cfg(windows)]
mod windows_input {
    use std::time::Duration;

    use windows::Win32::Foundation::{LPARAM, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        PostMessageW, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE,
    };

    use super::{drag_end, DragDirection, InputSink};
    use crate::capture::window::to_hwnd;
    use crate::capture::{Point, WindowHandle};
    use crate::error::{AutomationError, Result};

    /// MK_LBUTTON in the WPARAM of mouse messages.
    const MK_LBUTTON: usize = 0x0001;
    /// Pixels per intermediate WM_MOUSEMOVE while dragging.
    const DRAG_STEP: i32 = 8;

    /// `InputSink` that posts WM_* mouse messages to the window.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct PostMessageInput;

    /// Packs client coordinates into LPARAM: low word = x, high word = y.
    fn make_lparam(point: Point) -> LPARAM {
        let x = point.x.clamp(0, i16::MAX as i32) as u32;
        let y = point.y.clamp(0, i16::MAX as i32) as u32;
        LPARAM(((y << 16) | x) as isize)
    }

    fn post(window: WindowHandle, msg: u32, wparam: usize, point: Point) -> Result<()> {
        unsafe { PostMessageW(to_hwnd(window), msg, WPARAM(wparam), make_lparam(point)) }
            .map_err(|e| AutomationError::Input(format!("PostMessageW failed: {}", e)))
    }

    impl InputSink for PostMessageInput {
        fn click(&self, window: WindowHandle, point: Point) -> Result<()> {
            post(window, WM_MOUSEMOVE, 0, point)?;
            std::thread::sleep(Duration::from_millis(20));
            post(window, WM_LBUTTONDOWN, MK_LBUTTON, point)?;
            std::thread::sleep(Duration::from_millis(50));
            post(window, WM_LBUTTONUP, 0, point)
        }

        fn drag(
            &self,
            window: WindowHandle,
            start: Point,
            distance: u32,
            direction: DragDirection,
        ) -> Result<()> {
            let end = drag_end(start, distance, direction);
            post(window, WM_MOUSEMOVE, 0, start)?;
            post(window, WM_LBUTTONDOWN, MK_LBUTTON, start)?;
            std::thread::sleep(Duration::from_millis(50));

            let step = if end.y < start.y { -DRAG_STEP } else { DRAG_STEP };
            let mut y = start.y;
            while (step < 0 && y + step > end.y) || (step > 0 && y + step < end.y) {
                y += step;
                post(window, WM_MOUSEMOVE, MK_LBUTTON, Point::new(start.x, y))?;
                std::thread::sleep(Duration::from_millis(10));
            }

            post(window, WM_MOUSEMOVE, MK_LBUTTON, end)?;
            std::thread::sleep(Duration::from_millis(50));
            post(window, WM_LBUTTONUP, 0, end)
        }
    }
}
