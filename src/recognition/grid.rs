//! Grid origin detection by separator-colour scanning.
//!
//! Only the vertical origin moves when a list scrolls, so it is found by
//! scanning rows for the separator colour. Columns follow from a fixed start
//! offset and pitch.

use image::RgbaImage;

use super::layout::GridLayout;
use crate::capture::{Point, Rect};
use crate::error::{AutomationError, Result};

/// Line coordinates carving a frame into cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridLines {
    pub x_lines: Vec<u32>,
    pub y_lines: Vec<u32>,
}

impl GridLines {
    pub fn rows(&self) -> usize {
        self.y_lines.len().saturating_sub(1)
    }

    pub fn cols(&self) -> usize {
        self.x_lines.len().saturating_sub(1)
    }

    /// Rectangle of cell `(row, col)`, if it exists.
    pub fn cell(&self, row: usize, col: usize) -> Option<Rect> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        let (x0, x1) = (self.x_lines[col], self.x_lines[col + 1]);
        let (y0, y1) = (self.y_lines[row], self.y_lines[row + 1]);
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn cell_center(&self, row: usize, col: usize) -> Option<Point> {
        self.cell(row, col).map(|r| r.center())
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, Rect)> + '_ {
        (0..self.rows()).flat_map(move |row| {
            (0..self.cols()).filter_map(move |col| self.cell(row, col).map(|r| (row, col, r)))
        })
    }
}

fn channel_close(a: u8, b: u8, tolerance: u8) -> bool {
    a.abs_diff(b) <= tolerance
}

fn is_separator_pixel(pixel: &[u8], layout: &GridLayout) -> bool {
    layout.separator_colors.iter().any(|c| {
        channel_close(pixel[0], c[0], layout.tolerance)
            && channel_close(pixel[1], c[1], layout.tolerance)
            && channel_close(pixel[2], c[2], layout.tolerance)
    })
}

/// True if row `y` holds at least `min_run` consecutive separator pixels in `[x0, x1)`.
fn row_has_separator(img: &RgbaImage, y: u32, x0: u32, x1: u32, layout: &GridLayout) -> bool {
    let mut run = 0;
    for x in x0..x1 {
        if is_separator_pixel(&img.get_pixel(x, y).0, layout) {
            run += 1;
            if run >= layout.min_run {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Finds the first separator row inside the scan area.
pub fn find_separator_row(img: &RgbaImage, layout: &GridLayout) -> Option<u32> {
    let scan = layout.scan;
    if !scan.fits_within(img.width(), img.height()) {
        return None;
    }
    (scan.y..scan.bottom()).find(|&y| row_has_separator(img, y, scan.x, scan.right(), layout))
}

/// Locates the grid for `layout` in `img`.
///
/// The first separator row marks the top of the first row. When that
/// separator sits a full row pitch or more below the scan top, the list is
/// scrolled mid-row and a complete row is visible above it, so the origin
/// moves up by one pitch.
pub fn detect_grid(img: &RgbaImage, layout: &GridLayout) -> Result<GridLines> {
    let separator = find_separator_row(img, layout).ok_or_else(|| {
        AutomationError::GeometryNotFound(format!("no separator row in {} area", layout.name))
    })?;

    let mut origin = separator + 1;
    if separator - layout.scan.y >= layout.row_pitch {
        origin -= layout.row_pitch;
    }

    let bottom = layout.bottom_limit.min(img.height());
    let y_lines: Vec<u32> = (0..=layout.max_rows)
        .map(|k| origin + k * layout.row_pitch)
        .take_while(|&y| y <= bottom)
        .collect();
    if y_lines.len() < 2 {
        return Err(AutomationError::GeometryNotFound(format!(
            "{} origin {} leaves no complete row",
            layout.name, origin
        )));
    }

    let x_lines: Vec<u32> = (0..=layout.cols)
        .map(|k| layout.x_start + k * layout.col_pitch)
        .take_while(|&x| x <= img.width())
        .collect();
    if x_lines.len() < 2 {
        return Err(AutomationError::GeometryNotFound(format!(
            "{} columns do not fit in a {}px wide frame",
            layout.name,
            img.width()
        )));
    }

    Ok(GridLines { x_lines, y_lines })
}
