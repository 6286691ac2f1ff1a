//! Calibrated pixel constants for the 950x600 game client.
//!
//! Every ROI below is relative to the origin of the crop it applies to: a
//! grid cell for card/item/recipe categories, the client area for markers.
//! These values belong to one client resolution and are not derived at runtime.

use super::matcher::AcceptRule;
use super::templates::Category;
use crate::capture::{Point, Rect};

/// Separator scan and cell pitch for one scrollable grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    pub name: &'static str,
    /// Area scanned top-down for the separator row.
    pub scan: Rect,
    pub separator_colors: &'static [[u8; 3]],
    /// Allowed deviation per channel.
    pub tolerance: u8,
    /// Minimum run of separator-coloured pixels on one row.
    pub min_run: u32,
    pub x_start: u32,
    pub col_pitch: u32,
    pub cols: u32,
    pub row_pitch: u32,
    pub max_rows: u32,
    /// Rows must end at or above this y.
    pub bottom_limit: u32,
}

/// A scrollable list: its grid, its markers and how to drag it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ListLayout {
    pub grid: &'static GridLayout,
    pub top_marker: &'static str,
    pub bottom_marker: &'static str,
    /// Scrollbar strip, compared before and after a drag.
    pub scroll_roi: Rect,
    /// Where drags start, inside the list body.
    pub drag_start: Point,
    /// Rows advanced by one drag.
    pub rows_per_drag: u32,
}

const BAG_SEPARATORS: &[[u8; 3]] = &[[196, 146, 82], [164, 112, 58]];
const RECIPE_SEPARATORS: &[[u8; 3]] = &[[222, 186, 122], [196, 146, 82]];

/// Card/item bag on the right side of the enhancement and production screens.
pub const BAG_GRID: GridLayout = GridLayout {
    name: "bag",
    scan: Rect::new(560, 90, 340, 120),
    separator_colors: BAG_SEPARATORS,
    tolerance: 20,
    min_run: 25,
    x_start: 565,
    col_pitch: 49,
    cols: 7,
    row_pitch: 57,
    max_rows: 8,
    bottom_limit: 560,
};

/// Recipe list on the left side of the production screen.
pub const RECIPE_GRID: GridLayout = GridLayout {
    name: "recipe list",
    scan: Rect::new(40, 110, 300, 110),
    separator_colors: RECIPE_SEPARATORS,
    tolerance: 20,
    min_run: 25,
    x_start: 45,
    col_pitch: 72,
    cols: 4,
    row_pitch: 72,
    max_rows: 5,
    bottom_limit: 500,
};

pub const BAG_LIST: ListLayout = ListLayout {
    grid: &BAG_GRID,
    top_marker: "bag_top",
    bottom_marker: "bag_bottom",
    scroll_roi: Rect::new(910, 95, 14, 460),
    drag_start: Point::new(735, 420),
    rows_per_drag: 3,
};

pub const RECIPE_LIST: ListLayout = ListLayout {
    grid: &RECIPE_GRID,
    top_marker: "recipe_top",
    bottom_marker: "recipe_bottom",
    scroll_roi: Rect::new(348, 115, 14, 380),
    drag_start: Point::new(190, 400),
    rows_per_drag: 2,
};

/// Card artwork inside a bag cell.
pub const CARD_TYPE_ROI: Rect = Rect::new(6, 12, 36, 28);
/// Star badge in the top-left corner of a card.
pub const CARD_LEVEL_ROI: Rect = Rect::new(1, 1, 14, 11);
/// Bind badge in the bottom-left corner of a card.
pub const CARD_BIND_ROI: Rect = Rect::new(2, 44, 11, 11);
/// Clover/spice icon inside a bag cell.
pub const ITEM_ICON_ROI: Rect = Rect::new(6, 6, 36, 36);
/// Bind badge of a clover/spice.
pub const ITEM_BIND_ROI: Rect = Rect::new(34, 44, 11, 11);
/// Recipe icon inside a recipe cell.
pub const RECIPE_ICON_ROI: Rect = Rect::new(8, 6, 56, 48);

/// Bind templates are keyed by what they sit on.
pub const BIND_KEY_CARD: &str = "card";
pub const BIND_KEY_ITEM: &str = "item";

/// Similarity floor for clover/spice candidates before the bind filter.
pub const ITEM_MIN_SIMILARITY: f32 = 0.90;

/// Fixed client-area ROIs of position markers and menu tabs.
const MARKERS: &[(Category, &str, Rect)] = &[
    (Category::ScrollMarker, "bag_top", Rect::new(910, 95, 14, 14)),
    (Category::ScrollMarker, "bag_bottom", Rect::new(910, 541, 14, 14)),
    (Category::ScrollMarker, "recipe_top", Rect::new(348, 115, 14, 14)),
    (Category::ScrollMarker, "recipe_bottom", Rect::new(348, 481, 14, 14)),
    (Category::PagePosition, "enhance_tab", Rect::new(600, 40, 60, 20)),
    (Category::PagePosition, "produce_tab", Rect::new(670, 40, 60, 20)),
    (Category::PagePosition, "bag_cards", Rect::new(570, 64, 50, 18)),
    (Category::PagePosition, "bag_items", Rect::new(630, 64, 50, 18)),
];

/// Returns the client-area ROI of a marker key.
pub fn marker_roi(category: Category, key: &str) -> Option<Rect> {
    MARKERS
        .iter()
        .find(|(c, k, _)| *c == category && *k == key)
        .map(|(_, _, roi)| *roi)
}

/// Returns the ROI a template of `(category, key)` is hashed over.
pub fn template_roi(category: Category, key: &str) -> Option<Rect> {
    match category {
        Category::CardType => Some(CARD_TYPE_ROI),
        Category::CardLevel => Some(CARD_LEVEL_ROI),
        Category::CardBind if key == BIND_KEY_ITEM => Some(ITEM_BIND_ROI),
        Category::CardBind => Some(CARD_BIND_ROI),
        Category::Clover | Category::Spice => Some(ITEM_ICON_ROI),
        Category::Recipe => Some(RECIPE_ICON_ROI),
        Category::PagePosition | Category::ScrollMarker => marker_roi(category, key),
    }
}

/// Acceptance rule per category.
pub fn accept_rule(category: Category) -> AcceptRule {
    match category {
        Category::Clover | Category::Spice => AcceptRule::Best {
            min_similarity: ITEM_MIN_SIMILARITY,
        },
        _ => AcceptRule::Exact,
    }
}
