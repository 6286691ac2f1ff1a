//! Category recognizers.
//!
//! One recognizer serves every category; per-category ROIs and accept rules
//! come from `layout`. Cell-based categories take a cell rectangle in frame
//! coordinates, markers use their fixed client-area ROI.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::grid::GridLines;
use super::hash::{average_hash, ImageHash};
use super::layout::{accept_rule, marker_roi, template_roi, BIND_KEY_CARD, BIND_KEY_ITEM};
use super::matcher::{rank, AcceptRule};
use super::templates::{Category, TemplateRegistry};
use crate::capture::{Frame, Point, Rect};

/// Which bind states a caller accepts. Both false means "don't care".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindFilter {
    #[serde(default)]
    pub want_bound: bool,
    #[serde(default)]
    pub want_unbound: bool,
}

impl BindFilter {
    pub const ANY: BindFilter = BindFilter {
        want_bound: false,
        want_unbound: false,
    };

    pub fn new(want_bound: bool, want_unbound: bool) -> Self {
        Self {
            want_bound,
            want_unbound,
        }
    }

    pub fn accepts(&self, bound: bool) -> bool {
        match (self.want_bound, self.want_unbound) {
            (true, false) => bound,
            (false, true) => !bound,
            _ => true,
        }
    }
}

/// Where a recognition happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    Cell { row: usize, col: usize },
    Pixel(Point),
}

/// Outcome of one recognition call.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognitionResult {
    pub category: Category,
    pub matched_key: Option<String>,
    pub similarity: f32,
    pub position: Option<Position>,
    pub timestamp: DateTime<Local>,
}

impl RecognitionResult {
    fn new(category: Category) -> Self {
        Self {
            category,
            matched_key: None,
            similarity: 0.0,
            position: None,
            timestamp: Local::now(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched_key.is_some()
    }
}

/// A recognised card in the bag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardInfo {
    pub name: String,
    /// 0 when no level badge matched.
    pub level: u8,
    pub bound: bool,
    /// Frame coordinates of the cell centre.
    pub center: Point,
    pub row: usize,
    pub col: usize,
}

/// A clover/spice accepted by the similarity floor and the bind filter.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemMatch {
    pub key: String,
    pub similarity: f32,
    pub bound: bool,
}

/// Applies the template registry to frames.
#[derive(Clone, Copy)]
pub struct Recognizer<'a> {
    registry: &'a TemplateRegistry,
}

impl<'a> Recognizer<'a> {
    pub fn new(registry: &'a TemplateRegistry) -> Self {
        Self { registry }
    }

    /// Hash of `roi` offset into `cell`, or `None` if it leaves the frame.
    fn cell_hash(frame: &Frame, cell: Rect, roi: Rect) -> Option<ImageHash> {
        if roi.right() > cell.width || roi.bottom() > cell.height {
            return None;
        }
        average_hash(&frame.pixels, Some(cell.offset(roi)))
    }

    /// Ranks `live` against the category's templates whose key passes `allow`.
    pub fn match_hash<F>(&self, category: Category, live: ImageHash, allow: F) -> RecognitionResult
    where
        F: Fn(&str) -> bool,
    {
        let mut result = RecognitionResult::new(category);
        let ranking = rank(
            live,
            self.registry
                .templates(category)
                .iter()
                .filter(|t| allow(&t.key))
                .map(|t| (t.key.as_str(), t.hash)),
        );
        if let Some(best) = ranking.best {
            result.similarity = best.similarity;
            if accept_rule(category).accepts(&best) {
                result.matched_key = Some(best.key.to_string());
            }
        }
        result
    }

    /// Card type by exact match, only against the `required` keys.
    pub fn card_type(
        &self,
        frame: &Frame,
        cell: Rect,
        required: &BTreeSet<String>,
    ) -> RecognitionResult {
        let roi = template_roi(Category::CardType, "").unwrap_or_default();
        match Self::cell_hash(frame, cell, roi) {
            Some(live) => self.match_hash(Category::CardType, live, |k| required.contains(k)),
            None => RecognitionResult::new(Category::CardType),
        }
    }

    /// First level, in ascending order, whose template equals `live` exactly.
    pub fn level_from_hash(&self, live: ImageHash) -> Option<u8> {
        self.registry
            .level_templates()
            .into_iter()
            .find(|(_, t)| t.hash == live)
            .map(|(level, _)| level)
    }

    pub fn card_level(&self, frame: &Frame, cell: Rect) -> Option<u8> {
        let roi = template_roi(Category::CardLevel, "")?;
        let live = Self::cell_hash(frame, cell, roi)?;
        self.level_from_hash(live)
    }

    /// Exact match against one bind badge template; no match means unbound.
    fn bound_with(&self, frame: &Frame, cell: Rect, key: &str) -> bool {
        let Some(template) = self.registry.get(Category::CardBind, key) else {
            return false;
        };
        let Some(roi) = template_roi(Category::CardBind, key) else {
            return false;
        };
        Self::cell_hash(frame, cell, roi).is_some_and(|live| live == template.hash)
    }

    pub fn card_bound(&self, frame: &Frame, cell: Rect) -> bool {
        self.bound_with(frame, cell, BIND_KEY_CARD)
    }

    /// Best candidate among `enabled` keys, then the bind filter.
    pub fn classify_item(
        &self,
        category: Category,
        icon: ImageHash,
        bound: bool,
        enabled: &BTreeSet<String>,
        filter: BindFilter,
    ) -> Option<ItemMatch> {
        let result = self.match_hash(category, icon, |k| enabled.contains(k));
        let key = result.matched_key?;
        if !filter.accepts(bound) {
            return None;
        }
        Some(ItemMatch {
            key,
            similarity: result.similarity,
            bound,
        })
    }

    /// Clover or spice in one cell.
    pub fn item(
        &self,
        category: Category,
        frame: &Frame,
        cell: Rect,
        enabled: &BTreeSet<String>,
        filter: BindFilter,
    ) -> Option<ItemMatch> {
        let roi = template_roi(category, "")?;
        let icon = Self::cell_hash(frame, cell, roi)?;
        let bound = self.bound_with(frame, cell, BIND_KEY_ITEM);
        self.classify_item(category, icon, bound, enabled, filter)
    }

    /// First grid cell holding `key` with similarity 1.0.
    pub fn find_recipe(&self, frame: &Frame, grid: &GridLines, key: &str) -> RecognitionResult {
        let mut best = RecognitionResult::new(Category::Recipe);
        let Some(roi) = template_roi(Category::Recipe, key) else {
            return best;
        };
        for (row, col, cell) in grid.cells() {
            let Some(live) = Self::cell_hash(frame, cell, roi) else {
                continue;
            };
            let result = self.match_hash(Category::Recipe, live, |k| k == key);
            if result.is_match() {
                return RecognitionResult {
                    position: Some(Position::Cell { row, col }),
                    ..result
                };
            }
            if result.similarity > best.similarity {
                best = RecognitionResult {
                    position: Some(Position::Cell { row, col }),
                    ..result
                };
            }
        }
        best
    }

    /// Exact match of a marker at its fixed ROI.
    pub fn marker(&self, frame: &Frame, category: Category, key: &str) -> bool {
        let (Some(template), Some(roi)) =
            (self.registry.get(category, key), marker_roi(category, key))
        else {
            return false;
        };
        if !matches!(accept_rule(category), AcceptRule::Exact) {
            return false;
        }
        average_hash(&frame.pixels, Some(roi)).is_some_and(|live| live == template.hash)
    }

    /// Every cell whose card type is one of `required`.
    pub fn scan_cards(
        &self,
        frame: &Frame,
        grid: &GridLines,
        required: &BTreeSet<String>,
    ) -> Vec<CardInfo> {
        grid.cells()
            .filter_map(|(row, col, cell)| {
                let name = self.card_type(frame, cell, required).matched_key?;
                Some(CardInfo {
                    name,
                    level: self.card_level(frame, cell).unwrap_or(0),
                    bound: self.card_bound(frame, cell),
                    center: cell.center(),
                    row,
                    col,
                })
            })
            .collect()
    }

    pub fn registry(&self) -> &'a TemplateRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::grid::detect_grid;
    use crate::recognition::layout::{
        BAG_GRID, CARD_BIND_ROI, CARD_LEVEL_ROI, CARD_TYPE_ROI, ITEM_BIND_ROI, ITEM_ICON_ROI,
        RECIPE_GRID, RECIPE_ICON_ROI,
    };
    use crate::recognition::templates::Template;
    use crate::testutil::{
        blank_frame, frame_of, paint_pattern, paint_separator, template_from_frame, SEEDS,
    };

    fn keys(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn hash_template(category: Category, key: &str, bits: u64) -> Template {
        Template {
            category,
            key: key.to_string(),
            roi: Rect::new(0, 0, 8, 8),
            hash: ImageHash(bits),
            image: image::RgbaImage::new(8, 8),
        }
    }

    #[test]
    fn test_bind_filter_truth_table() {
        assert!(BindFilter::new(false, false).accepts(true));
        assert!(BindFilter::new(false, false).accepts(false));
        assert!(BindFilter::new(true, true).accepts(true));
        assert!(BindFilter::new(true, true).accepts(false));
        assert!(BindFilter::new(true, false).accepts(true));
        assert!(!BindFilter::new(true, false).accepts(false));
        assert!(!BindFilter::new(false, true).accepts(true));
        assert!(BindFilter::new(false, true).accepts(false));
    }

    #[test]
    fn test_exact_level_match() {
        let seven: ImageHash = "01".repeat(32).parse().unwrap();
        let mut registry = TemplateRegistry::new();
        registry.insert(hash_template(Category::CardLevel, "6", 0x0F0F_0F0F_0F0F_0F0F));
        registry.insert(hash_template(Category::CardLevel, "7", seven.0));
        let recognizer = Recognizer::new(&registry);

        assert_eq!(recognizer.level_from_hash(seven), Some(7));
        assert_eq!(recognizer.level_from_hash(ImageHash(seven.0 ^ 1)), None);
    }

    #[test]
    fn test_level_ties_resolve_to_lowest_level() {
        let mut registry = TemplateRegistry::new();
        registry.insert(hash_template(Category::CardLevel, "9", 0xABCD));
        registry.insert(hash_template(Category::CardLevel, "4", 0xABCD));
        assert_eq!(Recognizer::new(&registry).level_from_hash(ImageHash(0xABCD)), Some(4));
    }

    #[test]
    fn test_card_type_single_bit_flip_rejected() {
        let mut registry = TemplateRegistry::new();
        registry.insert(hash_template(Category::CardType, "cat", 0x1234_5678_9ABC_DEF0));
        let recognizer = Recognizer::new(&registry);
        let required = keys(&["cat"]);

        let exact = recognizer.match_hash(
            Category::CardType,
            ImageHash(0x1234_5678_9ABC_DEF0),
            |k| required.contains(k),
        );
        assert_eq!(exact.matched_key.as_deref(), Some("cat"));
        assert_eq!(exact.similarity, 1.0);

        let flipped = recognizer.match_hash(
            Category::CardType,
            ImageHash(0x1234_5678_9ABC_DEF1),
            |k| required.contains(k),
        );
        assert!(!flipped.is_match());
        assert!(flipped.similarity < 1.0);
    }

    #[test]
    fn test_card_type_ignores_keys_not_required() {
        let mut registry = TemplateRegistry::new();
        registry.insert(hash_template(Category::CardType, "cat", 0xFF));
        let recognizer = Recognizer::new(&registry);
        let dog = keys(&["dog"]);
        let result =
            recognizer.match_hash(Category::CardType, ImageHash(0xFF), |k| dog.contains(k));
        assert!(!result.is_match());
    }

    #[test]
    fn test_clover_bind_filter_rejects_high_similarity() {
        let template = 0x0F0F_3C3C_F0F0_C3C3u64;
        let mut registry = TemplateRegistry::new();
        registry.insert(hash_template(Category::Clover, "lucky", template));
        let recognizer = Recognizer::new(&registry);
        let enabled = keys(&["lucky"]);

        // Two flipped bits: similarity 62/64
        let live = ImageHash(template ^ 0b11);
        let unbound_only = BindFilter::new(false, true);
        assert_eq!(
            recognizer.classify_item(Category::Clover, live, true, &enabled, unbound_only),
            None
        );

        let accepted = recognizer
            .classify_item(Category::Clover, live, false, &enabled, unbound_only)
            .unwrap();
        assert_eq!(accepted.key, "lucky");
        assert!((accepted.similarity - 0.96875).abs() < 1e-6);
    }

    #[test]
    fn test_item_picks_best_enabled_candidate() {
        let mut registry = TemplateRegistry::new();
        registry.insert(hash_template(Category::Spice, "salt", 0b1111));
        registry.insert(hash_template(Category::Spice, "pepper", 0b0111));
        registry.insert(hash_template(Category::Spice, "sugar", 0b0011));
        let recognizer = Recognizer::new(&registry);

        let all = keys(&["salt", "pepper", "sugar"]);
        let hit = recognizer
            .classify_item(Category::Spice, ImageHash(0b0011), false, &all, BindFilter::ANY)
            .unwrap();
        assert_eq!(hit.key, "sugar");

        let no_sugar = keys(&["salt", "pepper"]);
        let hit = recognizer
            .classify_item(Category::Spice, ImageHash(0b0011), false, &no_sugar, BindFilter::ANY)
            .unwrap();
        assert_eq!(hit.key, "pepper");
    }

    #[test]
    fn test_item_below_floor_is_rejected() {
        let mut registry = TemplateRegistry::new();
        registry.insert(hash_template(Category::Spice, "salt", 0));
        let recognizer = Recognizer::new(&registry);
        // 8 bits off: 0.875 < 0.90
        let result = recognizer.classify_item(
            Category::Spice,
            ImageHash(0xFF),
            false,
            &keys(&["salt"]),
            BindFilter::ANY,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_scan_cards_on_synthetic_bag() {
        let mut img = blank_frame();
        paint_separator(&mut img, &BAG_GRID, 100);
        let grid = detect_grid(&img, &BAG_GRID).unwrap();

        let cell_a = grid.cell(0, 1).unwrap();
        let cell_b = grid.cell(2, 3).unwrap();
        paint_pattern(&mut img, cell_a.offset(CARD_TYPE_ROI), SEEDS[0]);
        paint_pattern(&mut img, cell_a.offset(CARD_LEVEL_ROI), SEEDS[1]);
        paint_pattern(&mut img, cell_a.offset(CARD_BIND_ROI), SEEDS[2]);
        paint_pattern(&mut img, cell_b.offset(CARD_TYPE_ROI), SEEDS[3]);
        let frame = frame_of(img);

        let mut registry = TemplateRegistry::new();
        for (category, key, rect) in [
            (Category::CardType, "cat", cell_a.offset(CARD_TYPE_ROI)),
            (Category::CardType, "dog", cell_b.offset(CARD_TYPE_ROI)),
            (Category::CardLevel, "5", cell_a.offset(CARD_LEVEL_ROI)),
            (Category::CardBind, BIND_KEY_CARD, cell_a.offset(CARD_BIND_ROI)),
        ] {
            registry.insert(template_from_frame(&frame, category, key, rect));
        }
        let recognizer = Recognizer::new(&registry);

        let cards = recognizer.scan_cards(&frame, &grid, &keys(&["cat", "dog"]));
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].name, "cat");
        assert_eq!((cards[0].row, cards[0].col), (0, 1));
        assert_eq!(cards[0].level, 5);
        assert!(cards[0].bound);
        assert_eq!(cards[0].center, cell_a.center());
        assert_eq!(cards[1].name, "dog");
        assert_eq!(cards[1].level, 0);
        assert!(!cards[1].bound);

        let only_dog = recognizer.scan_cards(&frame, &grid, &keys(&["dog"]));
        assert_eq!(only_dog.len(), 1);
        assert_eq!((only_dog[0].row, only_dog[0].col), (2, 3));
    }

    #[test]
    fn test_item_reads_bind_badge_from_frame() {
        let mut img = blank_frame();
        paint_separator(&mut img, &BAG_GRID, 100);
        let grid = detect_grid(&img, &BAG_GRID).unwrap();
        let cell = grid.cell(1, 0).unwrap();
        paint_pattern(&mut img, cell.offset(ITEM_ICON_ROI), SEEDS[0]);
        paint_pattern(&mut img, cell.offset(ITEM_BIND_ROI), SEEDS[1]);
        let frame = frame_of(img);

        let mut registry = TemplateRegistry::new();
        let icon = cell.offset(ITEM_ICON_ROI);
        let badge = cell.offset(ITEM_BIND_ROI);
        registry.insert(template_from_frame(&frame, Category::Clover, "four_leaf", icon));
        registry.insert(template_from_frame(&frame, Category::CardBind, BIND_KEY_ITEM, badge));
        let recognizer = Recognizer::new(&registry);
        let enabled = keys(&["four_leaf"]);

        let hit = recognizer
            .item(Category::Clover, &frame, cell, &enabled, BindFilter::new(true, false))
            .unwrap();
        assert!(hit.bound);
        assert!(recognizer
            .item(Category::Clover, &frame, cell, &enabled, BindFilter::new(false, true))
            .is_none());
    }

    #[test]
    fn test_find_recipe_requires_exact_cell_match() {
        let mut img = blank_frame();
        paint_separator(&mut img, &RECIPE_GRID, 120);
        let grid = detect_grid(&img, &RECIPE_GRID).unwrap();
        let cell = grid.cell(1, 2).unwrap();
        paint_pattern(&mut img, cell.offset(RECIPE_ICON_ROI), SEEDS[2]);
        let frame = frame_of(img);

        let mut registry = TemplateRegistry::new();
        let icon = cell.offset(RECIPE_ICON_ROI);
        registry.insert(template_from_frame(&frame, Category::Recipe, "cake", icon));
        let recognizer = Recognizer::new(&registry);

        let found = recognizer.find_recipe(&frame, &grid, "cake");
        assert_eq!(found.similarity, 1.0);
        assert_eq!(found.position, Some(Position::Cell { row: 1, col: 2 }));

        let missing = recognizer.find_recipe(&frame, &grid, "pie");
        assert!(!missing.is_match());
    }

    #[test]
    fn test_marker_requires_template_and_exact_hash() {
        let roi = marker_roi(Category::ScrollMarker, "recipe_bottom").unwrap();
        let mut img = blank_frame();
        paint_pattern(&mut img, roi, SEEDS[1]);
        let frame = frame_of(img);

        let empty = TemplateRegistry::new();
        assert!(!Recognizer::new(&empty).marker(&frame, Category::ScrollMarker, "recipe_bottom"));

        let mut registry = TemplateRegistry::new();
        registry.insert(template_from_frame(&frame, Category::ScrollMarker, "recipe_bottom", roi));
        let recognizer = Recognizer::new(&registry);
        assert!(recognizer.marker(&frame, Category::ScrollMarker, "recipe_bottom"));
        let empty_frame = frame_of(blank_frame());
        assert!(!recognizer.marker(&empty_frame, Category::ScrollMarker, "recipe_bottom"));
    }

    #[test]
    fn test_cell_outside_frame_fails_closed() {
        let mut registry = TemplateRegistry::new();
        registry.insert(hash_template(Category::CardType, "cat", 0));
        let recognizer = Recognizer::new(&registry);
        let frame = frame_of(image::RgbaImage::new(100, 100));
        let result = recognizer.card_type(&frame, Rect::new(90, 90, 49, 57), &keys(&["cat"]));
        assert!(!result.is_match());
        assert_eq!(recognizer.card_level(&frame, Rect::new(90, 90, 49, 57)), None);
    }
}
