//! Template registry.
//!
//! Templates are loaded once from `resources/template/<category>/<key>.png`
//! and hashed at load time. A missing directory or unreadable image only
//! leaves that category (or key) unrecognisable; loading never fails.

use image::RgbaImage;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use super::hash::{average_hash, ImageHash};
use super::layout::template_roi;
use crate::capture::Rect;

/// Highest card level with a badge template.
pub const MAX_CARD_LEVEL: u8 = 16;

/// Recognition category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    CardType,
    CardLevel,
    CardBind,
    Clover,
    Spice,
    Recipe,
    PagePosition,
    ScrollMarker,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::CardType,
        Category::CardLevel,
        Category::CardBind,
        Category::Clover,
        Category::Spice,
        Category::Recipe,
        Category::PagePosition,
        Category::ScrollMarker,
    ];

    /// Sub-directory of the template root holding this category.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::CardType => "card",
            Category::CardLevel => "level",
            Category::CardBind => "bind",
            Category::Clover => "clover",
            Category::Spice => "spice",
            Category::Recipe => "recipe",
            Category::PagePosition => "position",
            Category::ScrollMarker => "scroll",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A pre-hashed reference image for one `(category, key)`.
#[derive(Clone, Debug)]
pub struct Template {
    pub category: Category,
    pub key: String,
    /// Region of `image` the hash was computed over.
    pub roi: Rect,
    pub hash: ImageHash,
    pub image: RgbaImage,
}

impl Template {
    /// Hashes `image` over `roi`, or over the whole image if it is exactly
    /// the ROI's size. Returns `None` when the ROI does not fit.
    pub fn from_image(
        category: Category,
        key: &str,
        image: RgbaImage,
        roi: Option<Rect>,
    ) -> Option<Template> {
        let full = Rect::new(0, 0, image.width(), image.height());
        let roi = match roi {
            Some(roi) if roi.width == image.width() && roi.height == image.height() => full,
            Some(roi) => roi,
            None => full,
        };
        let hash = average_hash(&image, Some(roi))?;
        Some(Template {
            category,
            key: key.to_string(),
            roi,
            hash,
            image,
        })
    }
}

/// All loaded templates, grouped by category in load order.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    by_category: HashMap<Category, Vec<Template>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every category directory under `root`.
    pub fn load_from_dir(root: &Path) -> Self {
        let mut registry = Self::new();
        crate::log(&format!("Loading templates from {}", root.display()));

        for category in Category::ALL {
            let dir = root.join(category.dir_name());
            let loaded = registry.load_category(category, &dir);
            if loaded == 0 {
                crate::log(&format!(
                    "Warning: no {} templates in {}; category is unrecognizable",
                    category,
                    dir.display()
                ));
            } else {
                crate::log(&format!("Loaded {} {} templates", loaded, category));
            }
        }

        registry
    }

    fn load_category(&mut self, category: Category, dir: &Path) -> usize {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut paths: Vec<_> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "bmp"))
            })
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            if category == Category::CardLevel && parse_level(key).is_none() {
                crate::log(&format!(
                    "Warning: skipping level template {} (expected 1-{})",
                    path.display(),
                    MAX_CARD_LEVEL
                ));
                continue;
            }

            let image = match image::open(&path) {
                Ok(img) => img.to_rgba8(),
                Err(e) => {
                    crate::log(&format!(
                        "Warning: failed to load template {}: {}",
                        path.display(),
                        e
                    ));
                    continue;
                }
            };

            match Template::from_image(category, key, image, template_roi(category, key)) {
                Some(template) => {
                    self.insert(template);
                    loaded += 1;
                }
                None => crate::log(&format!(
                    "Warning: template {} is smaller than its {} ROI",
                    path.display(),
                    category
                )),
            }
        }
        loaded
    }

    /// Adds a template, replacing an existing one with the same key.
    pub fn insert(&mut self, template: Template) {
        let list = self.by_category.entry(template.category).or_default();
        if let Some(existing) = list.iter_mut().find(|t| t.key == template.key) {
            *existing = template;
        } else {
            list.push(template);
        }
    }

    pub fn get(&self, category: Category, key: &str) -> Option<&Template> {
        self.templates(category).iter().find(|t| t.key == key)
    }

    pub fn contains(&self, category: Category, key: &str) -> bool {
        self.get(category, key).is_some()
    }

    pub fn templates(&self, category: Category) -> &[Template] {
        self.by_category
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Level templates sorted by ascending level.
    pub fn level_templates(&self) -> Vec<(u8, &Template)> {
        let mut levels: Vec<(u8, &Template)> = self
            .templates(Category::CardLevel)
            .iter()
            .filter_map(|t| parse_level(&t.key).map(|level| (level, t)))
            .collect();
        levels.sort_by_key(|(level, _)| *level);
        levels
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses a level key such as `7` or `07`.
pub fn parse_level(key: &str) -> Option<u8> {
    key.parse::<u8>()
        .ok()
        .filter(|level| (1..=MAX_CARD_LEVEL).contains(level))
}
