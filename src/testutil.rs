//! Synthetic frames and fake capture/input for tests.

use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex};

use crate::automation::config::AutomationConfig;
use crate::automation::detection::{CancelToken, PollPolicy};
use crate::automation::input::{DragDirection, InputSink};
use crate::capture::{crop_to_region, Frame, Point, Rect, ScreenSource, WindowHandle};
use crate::error::{AutomationError, Result};
use crate::recognition::grid::detect_grid;
use crate::recognition::hash::average_hash;
use crate::recognition::layout::{
    marker_roi, GridLayout, BAG_GRID, BAG_LIST, BIND_KEY_CARD, BIND_KEY_ITEM, CARD_BIND_ROI,
    CARD_LEVEL_ROI, CARD_TYPE_ROI, ITEM_BIND_ROI, ITEM_ICON_ROI, RECIPE_GRID, RECIPE_ICON_ROI,
    RECIPE_LIST,
};
use crate::recognition::templates::{Category, Template, TemplateRegistry};

pub const CLIENT_WIDTH: u32 = 950;
pub const CLIENT_HEIGHT: u32 = 600;

/// Block patterns with clearly different average hashes.
pub const SEEDS: [u64; 6] = [
    0xF0F0_F0F0_0F0F_0F0F,
    0xFF00_FF00_00FF_00FF,
    0xCCCC_3333_CCCC_3333,
    0x0FF0_0FF0_F00F_F00F,
    0xAAAA_5555_AAAA_5555,
    0xFFFF_0000_0000_FFFF,
];

const LIGHT: Rgba<u8> = Rgba([230, 230, 230, 255]);
const DARK: Rgba<u8> = Rgba([20, 20, 20, 255]);

pub fn blank_frame() -> RgbaImage {
    RgbaImage::from_pixel(CLIENT_WIDTH, CLIENT_HEIGHT, Rgba([0, 0, 0, 255]))
}

pub fn frame_of(img: RgbaImage) -> Frame {
    let rect = Rect::new(0, 0, img.width(), img.height());
    Frame::new(img, rect)
}

/// Draws the layout's first separator colour across its scan width at row `y`.
pub fn paint_separator(img: &mut RgbaImage, layout: &GridLayout, y: u32) {
    let c = layout.separator_colors[0];
    for x in layout.scan.x..layout.scan.right() {
        img.put_pixel(x, y, Rgba([c[0], c[1], c[2], 255]));
    }
}

/// Fills `rect` with an 8x8 block pattern; bit 63 of `seed` is the top-left block.
pub fn paint_pattern(img: &mut RgbaImage, rect: Rect, seed: u64) {
    for y in 0..rect.height {
        for x in 0..rect.width {
            let bx = x * 8 / rect.width;
            let by = y * 8 / rect.height;
            let bit = (seed >> (63 - (by * 8 + bx))) & 1;
            let color = if bit == 1 { LIGHT } else { DARK };
            img.put_pixel(rect.x + x, rect.y + y, color);
        }
    }
}

pub fn pattern_image(width: u32, height: u32, seed: u64) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    paint_pattern(&mut img, Rect::new(0, 0, width, height), seed);
    img
}

/// Builds a template whose hash equals whatever `frame` shows at `rect`.
pub fn template_from_frame(frame: &Frame, category: Category, key: &str, rect: Rect) -> Template {
    let hash = average_hash(&frame.pixels, Some(rect)).expect("rect inside frame");
    let image = image::imageops::crop_imm(&frame.pixels, rect.x, rect.y, rect.width, rect.height)
        .to_image();
    Template {
        category,
        key: key.to_string(),
        roi: Rect::new(0, 0, rect.width, rect.height),
        hash,
        image,
    }
}

/// Everything the fake game has been asked to do.
#[derive(Debug)]
pub struct FakeWorld {
    pub clicks: Vec<Point>,
    pub drags: Vec<(Point, u32, DragDirection)>,
    pub window_valid: bool,
    pub captures: usize,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self {
            clicks: Vec::new(),
            drags: Vec::new(),
            window_valid: true,
            captures: 0,
        }
    }
}

impl FakeWorld {
    /// Scroll position: advancing drags minus rewinding drags.
    pub fn page(&self) -> usize {
        let advanced = self
            .drags
            .iter()
            .filter(|(_, _, d)| *d == DragDirection::Up)
            .count();
        let rewound = self.drags.len() - advanced;
        advanced.saturating_sub(rewound)
    }
}

pub type SharedWorld = Arc<Mutex<FakeWorld>>;

type Renderer = Box<dyn Fn(&FakeWorld) -> RgbaImage + Send>;

/// Renders frames from the current fake world state.
pub struct FakeScreen {
    pub world: SharedWorld,
    render: Renderer,
}

impl FakeScreen {
    pub fn new<F>(world: SharedWorld, render: F) -> Self
    where
        F: Fn(&FakeWorld) -> RgbaImage + Send + 'static,
    {
        Self {
            world,
            render: Box::new(render),
        }
    }
}

impl ScreenSource for FakeScreen {
    fn capture(&self, _window: WindowHandle, region: Option<Rect>) -> Result<Frame> {
        let mut world = self.world.lock().unwrap();
        if !world.window_valid {
            return Err(AutomationError::CaptureFailure("window closed".to_string()));
        }
        world.captures += 1;
        crop_to_region((self.render)(&world), region)
    }

    fn is_window_valid(&self, _window: WindowHandle) -> bool {
        self.world.lock().unwrap().window_valid
    }
}

/// Records input and optionally requests cancellation after the n-th click.
pub struct FakeInput {
    pub world: SharedWorld,
    pub cancel_after_clicks: Option<(usize, CancelToken)>,
}

impl FakeInput {
    pub fn new(world: SharedWorld) -> Self {
        Self {
            world,
            cancel_after_clicks: None,
        }
    }
}

impl InputSink for FakeInput {
    fn click(&self, _window: WindowHandle, point: Point) -> Result<()> {
        let mut world = self.world.lock().unwrap();
        world.clicks.push(point);
        if let Some((n, token)) = &self.cancel_after_clicks {
            if world.clicks.len() >= *n {
                token.cancel();
            }
        }
        Ok(())
    }

    fn drag(
        &self,
        _window: WindowHandle,
        start: Point,
        distance: u32,
        direction: DragDirection,
    ) -> Result<()> {
        self.world
            .lock()
            .unwrap()
            .drags
            .push((start, distance, direction));
        Ok(())
    }
}

pub fn shared_world() -> SharedWorld {
    Arc::new(Mutex::new(FakeWorld::default()))
}

/// Default layout with millisecond polling and no pauses.
pub fn fast_config() -> AutomationConfig {
    AutomationConfig {
        poll: PollPolicy {
            interval_ms: 1,
            max_attempts: 5,
        },
        tick_delay_ms: 0,
        settle_ms: 0,
        ..AutomationConfig::default()
    }
}

/// Template for `seed` painted at `rect`.
pub fn pattern_template(category: Category, key: &str, rect: Rect, seed: u64) -> Template {
    let mut img = blank_frame();
    paint_pattern(&mut img, rect, seed);
    template_from_frame(&frame_of(img), category, key, rect)
}

fn marker(category: Category, key: &str) -> Rect {
    marker_roi(category, key).expect("known marker")
}

const RECIPE_SEPARATOR_Y: u32 = 120;
const BAG_SEPARATOR_Y: u32 = 100;

/// Cell that holds `cake` on its page of the recipe list.
pub fn recipe_cell() -> Rect {
    let mut img = blank_frame();
    paint_separator(&mut img, &RECIPE_GRID, RECIPE_SEPARATOR_Y);
    detect_grid(&img, &RECIPE_GRID)
        .expect("recipe grid")
        .cell(1, 2)
        .expect("recipe cell")
}

/// Production screen. `cake` shows on page `recipe_page`; the recipe preview
/// fills after the first click and the production result changes on every click.
pub fn render_production(world: &FakeWorld, recipe_page: usize) -> RgbaImage {
    let config = AutomationConfig::default();
    let page = world.page();
    let mut img = blank_frame();

    paint_separator(&mut img, &RECIPE_GRID, RECIPE_SEPARATOR_Y);
    paint_pattern(&mut img, marker(Category::PagePosition, "produce_tab"), SEEDS[5]);
    paint_pattern(&mut img, RECIPE_LIST.scroll_roi, SEEDS[page % SEEDS.len()]);
    if page == 0 {
        paint_pattern(&mut img, marker(Category::ScrollMarker, "recipe_top"), SEEDS[4]);
    }
    if page == recipe_page {
        paint_pattern(&mut img, recipe_cell().offset(RECIPE_ICON_ROI), SEEDS[2]);
    }
    if !world.clicks.is_empty() {
        paint_pattern(&mut img, config.recipe_preview, SEEDS[3]);
    }
    paint_pattern(
        &mut img,
        config.produce_result,
        SEEDS[world.clicks.len() % SEEDS.len()],
    );
    img
}

pub fn production_registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    registry.insert(pattern_template(
        Category::Recipe,
        "cake",
        recipe_cell().offset(RECIPE_ICON_ROI),
        SEEDS[2],
    ));
    registry.insert(pattern_template(
        Category::PagePosition,
        "produce_tab",
        marker(Category::PagePosition, "produce_tab"),
        SEEDS[5],
    ));
    registry.insert(pattern_template(
        Category::ScrollMarker,
        "recipe_top",
        marker(Category::ScrollMarker, "recipe_top"),
        SEEDS[4],
    ));
    registry
}

/// Bind badge pattern, shared by cards and items.
pub const BIND_SEED: u64 = SEEDS[2];
const BAG_TOP_SEED: u64 = SEEDS[4];
const ITEMS_TAB_SEED: u64 = SEEDS[3];

/// Bag cell `(row, col)` with the separator at its fixed height.
pub fn bag_cell(row: usize, col: usize) -> Rect {
    let mut img = blank_frame();
    paint_separator(&mut img, &BAG_GRID, BAG_SEPARATOR_Y);
    detect_grid(&img, &BAG_GRID)
        .expect("bag grid")
        .cell(row, col)
        .expect("bag cell")
}

/// One occupied bag cell.
#[derive(Clone, Copy, Debug)]
pub struct BagEntry {
    /// Scroll position the entry is visible at
    pub page: usize,
    pub row: usize,
    pub col: usize,
    /// Card artwork or item icon
    pub icon: u64,
    /// Level badge, cards only
    pub level: Option<u64>,
    pub bound: bool,
    /// Listed on the items tab instead of the cards tab
    pub item: bool,
}

impl BagEntry {
    pub fn card(
        page: usize,
        row: usize,
        col: usize,
        icon: u64,
        level: Option<u64>,
        bound: bool,
    ) -> Self {
        Self {
            page,
            row,
            col,
            icon,
            level,
            bound,
            item: false,
        }
    }

    pub fn item(page: usize, row: usize, col: usize, icon: u64, bound: bool) -> Self {
        Self {
            page,
            row,
            col,
            icon,
            level: None,
            bound,
            item: true,
        }
    }
}

/// True once the items tab was clicked more recently than the cards tab.
fn items_tab_open(world: &FakeWorld, config: &AutomationConfig) -> bool {
    world
        .clicks
        .iter()
        .rev()
        .find(|p| **p == config.item_tab_button || **p == config.card_tab_button)
        .is_some_and(|p| *p == config.item_tab_button)
}

/// Paints the bag: tab marker, scrollbar, the entries of the open tab on the
/// current page and, with `show_top`, the top marker on page 0.
pub fn paint_bag(img: &mut RgbaImage, world: &FakeWorld, entries: &[BagEntry], show_top: bool) {
    let config = AutomationConfig::default();
    let page = world.page();
    let items = items_tab_open(world, &config);

    paint_separator(img, &BAG_GRID, BAG_SEPARATOR_Y);
    if items {
        paint_pattern(img, marker(Category::PagePosition, "bag_items"), ITEMS_TAB_SEED);
    } else {
        paint_pattern(img, marker(Category::PagePosition, "bag_cards"), SEEDS[4]);
    }
    paint_pattern(img, BAG_LIST.scroll_roi, SEEDS[page % SEEDS.len()]);
    if show_top && page == 0 {
        paint_pattern(img, marker(Category::ScrollMarker, "bag_top"), BAG_TOP_SEED);
    }

    for entry in entries.iter().filter(|e| e.page == page && e.item == items) {
        let cell = bag_cell(entry.row, entry.col);
        if entry.item {
            paint_pattern(img, cell.offset(ITEM_ICON_ROI), entry.icon);
            if entry.bound {
                paint_pattern(img, cell.offset(ITEM_BIND_ROI), BIND_SEED);
            }
        } else {
            paint_pattern(img, cell.offset(CARD_TYPE_ROI), entry.icon);
            if let Some(level) = entry.level {
                paint_pattern(img, cell.offset(CARD_LEVEL_ROI), level);
            }
            if entry.bound {
                paint_pattern(img, cell.offset(CARD_BIND_ROI), BIND_SEED);
            }
        }
    }
}

/// Paints `slots` with a pattern that changes on every click.
fn paint_slots(img: &mut RgbaImage, world: &FakeWorld, slots: &[Rect]) {
    let seed = SEEDS[world.clicks.len() % SEEDS.len()];
    for slot in slots {
        paint_pattern(img, *slot, seed);
    }
}

/// Enhancement screen showing `entries` in the bag.
pub fn render_enhancement_bag(
    world: &FakeWorld,
    entries: &[BagEntry],
    show_top: bool,
) -> RgbaImage {
    let config = AutomationConfig::default();
    let mut img = blank_frame();
    paint_pattern(&mut img, marker(Category::PagePosition, "enhance_tab"), SEEDS[5]);
    paint_bag(&mut img, world, entries, show_top);

    let mut slots = vec![config.main_slot, config.clover_slot];
    slots.extend(config.sub_slots.iter().copied());
    paint_slots(&mut img, world, &slots);
    img
}

/// Enhancement screen with a single level 1 `sword` at bag cell (0, 1).
pub fn render_enhancement(world: &FakeWorld) -> RgbaImage {
    let sword = BagEntry::card(0, 0, 1, SEEDS[0], Some(SEEDS[1]), false);
    render_enhancement_bag(world, &[sword], false)
}

/// Production screen of `render_production` with `entries` in the bag.
pub fn render_production_bag(
    world: &FakeWorld,
    recipe_page: usize,
    entries: &[BagEntry],
) -> RgbaImage {
    let config = AutomationConfig::default();
    let mut img = render_production(world, recipe_page);
    paint_bag(&mut img, world, entries, false);
    paint_slots(&mut img, world, &[config.spice_slot]);
    img
}

/// Bind badges, bag tab markers and the level 1 badge.
pub fn add_bag_templates(registry: &mut TemplateRegistry) {
    let cell = bag_cell(0, 0);
    registry.insert(pattern_template(
        Category::CardLevel,
        "1",
        cell.offset(CARD_LEVEL_ROI),
        SEEDS[1],
    ));
    registry.insert(pattern_template(
        Category::CardBind,
        BIND_KEY_CARD,
        cell.offset(CARD_BIND_ROI),
        BIND_SEED,
    ));
    registry.insert(pattern_template(
        Category::CardBind,
        BIND_KEY_ITEM,
        cell.offset(ITEM_BIND_ROI),
        BIND_SEED,
    ));
    for (key, seed) in [
        ("enhance_tab", SEEDS[5]),
        ("bag_cards", SEEDS[4]),
        ("bag_items", ITEMS_TAB_SEED),
    ] {
        registry.insert(pattern_template(
            Category::PagePosition,
            key,
            marker(Category::PagePosition, key),
            seed,
        ));
    }
}

pub fn bag_top_template() -> Template {
    pattern_template(
        Category::ScrollMarker,
        "bag_top",
        marker(Category::ScrollMarker, "bag_top"),
        BAG_TOP_SEED,
    )
}

/// Clover or spice icon template.
pub fn item_template(category: Category, key: &str, seed: u64) -> Template {
    pattern_template(category, key, bag_cell(0, 0).offset(ITEM_ICON_ROI), seed)
}

/// Bag templates plus the `sword` card type.
pub fn enhancement_registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    add_bag_templates(&mut registry);
    registry.insert(pattern_template(
        Category::CardType,
        "sword",
        bag_cell(0, 0).offset(CARD_TYPE_ROI),
        SEEDS[0],
    ));
    registry
}
