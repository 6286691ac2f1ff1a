//! Window capture boundary.
//!
//! This module provides:
//! - Geometry types shared by recognition and input (`Rect`, `Point`)
//! - The captured pixel buffer (`Frame`)
//! - The `ScreenSource` trait the automation core captures through
//! - On Windows: window discovery and Windows Graphics Capture
//!
//! Frames are in physical client pixels of the game window. The process
//! declares per-monitor DPI awareness, so client rectangles and the capture
//! texture agree. Input is dispatched in the window's own client coordinates,
//! which differ from frame pixels only for a DPI-virtualised window; see
//! `input_scale`.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{AutomationError, Result};

#[cfg(windows)]
pub mod screenshot;
#[cfg(windows)]
pub mod window;

#[cfg(windows)]
pub use screenshot::WindowsScreen;
#[cfg(windows)]
pub use window::{
    enable_dpi_awareness, find_window_by_title, get_client_area_info, get_input_scale,
    is_window_valid,
};

/// Opaque window identifier. On Windows this is the raw `HWND` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// Pixel rectangle in window-local coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if this rectangle lies entirely inside a `width` x `height` area.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        !self.is_empty()
            && self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height)
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.x + self.width / 2) as i32,
            y: (self.y + self.height / 2) as i32,
        }
    }

    /// Offsets `inner` (relative to this rect's origin) into the outer coordinate space.
    pub fn offset(&self, inner: Rect) -> Rect {
        Rect::new(self.x + inner.x, self.y + inner.y, inner.width, inner.height)
    }
}

/// Pixel point in window-local coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Applies the DPI multiplier used by input dispatch.
    pub fn scaled(&self, dpi_scale: f32) -> Point {
        Point {
            x: (self.x as f32 * dpi_scale).round() as i32,
            y: (self.y as f32 * dpi_scale).round() as i32,
        }
    }
}

/// Windows reports 96 DPI as 100% scaling.
pub const BASE_DPI: u32 = 96;

/// Multiplier from frame pixels to window message coordinates.
///
/// A DPI-aware window takes physical client pixels, so frame coordinates
/// pass through unchanged. A DPI-unaware window is scaled up by the system
/// and expects logical pixels: `BASE_DPI / monitor_dpi`.
pub fn input_scale(window_dpi_unaware: bool, monitor_dpi: u32) -> f32 {
    if !window_dpi_unaware || monitor_dpi == 0 {
        return 1.0;
    }
    BASE_DPI as f32 / monitor_dpi as f32
}

/// A single captured image of the game window.
///
/// Frames are deliberately not `Clone`: every automation step asks the
/// `ScreenSource` for a new one.
#[derive(Debug)]
pub struct Frame {
    pub pixels: RgbaImage,
    /// Where the pixels came from, in window-local coordinates.
    pub source_rect: Rect,
}

impl Frame {
    pub fn new(pixels: RgbaImage, source_rect: Rect) -> Self {
        Self {
            pixels,
            source_rect,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Produces frames for a window.
pub trait ScreenSource {
    /// Captures the client area of `window`, restricted to `region` when given.
    fn capture(&self, window: WindowHandle, region: Option<Rect>) -> Result<Frame>;

    /// Returns false once the window is closed or the handle is stale.
    fn is_window_valid(&self, window: WindowHandle) -> bool;
}

/// Crops a full client-area image down to `region`, failing instead of clamping.
pub fn crop_to_region(img: RgbaImage, region: Option<Rect>) -> Result<Frame> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(AutomationError::CaptureFailure(
            "captured image is empty".to_string(),
        ));
    }
    match region {
        None => Ok(Frame::new(img, Rect::new(0, 0, w, h))),
        Some(rect) => {
            if !rect.fits_within(w, h) {
                return Err(AutomationError::CaptureFailure(format!(
                    "region {:?} outside {}x{} client area",
                    rect, w, h
                )));
            }
            let cropped =
                image::imageops::crop_imm(&img, rect.x, rect.y, rect.width, rect.height)
                    .to_image();
            Ok(Frame::new(cropped, rect))
        }
    }
}
