//! Configuration types for automation.
//!
//! `AutomationConfig` describes the screen: window title, button positions,
//! slot regions and timing. `RunConfig` describes one run: which workflow and
//! with which cards, items and level bounds. Both are loaded from config.json
//! and handed to the controller by value when a run starts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::automation::detection::PollPolicy;
use crate::capture::{Point, Rect};
use crate::error::{AutomationError, Result};
use crate::recognition::templates::MAX_CARD_LEVEL;
use crate::recognition::BindFilter;

/// Screen layout and timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Fragment of the game window title
    pub window_title: String,
    /// Capture only this top-left sub-rectangle of the client area
    pub capture_region: Option<Rect>,
    /// Multiplier from frame pixels to window message coordinates;
    /// detected from the window when absent
    pub dpi_scale: Option<f32>,
    pub poll: PollPolicy,
    /// Pause between enhancement ticks (milliseconds)
    pub tick_delay_ms: u64,
    /// Retries of a failed step before the run fails
    pub step_retries: u32,
    /// Drags allowed while searching one list
    pub max_pages: u32,
    /// Wait used in place of a marker check whose template is missing
    pub settle_ms: u64,
    pub enhance_tab_button: Point,
    pub produce_tab_button: Point,
    pub card_tab_button: Point,
    pub item_tab_button: Point,
    pub enhance_button: Point,
    pub produce_button: Point,
    /// Changes when the main card is placed or enhanced
    pub main_slot: Rect,
    pub sub_slots: Vec<Rect>,
    pub clover_slot: Rect,
    pub spice_slot: Rect,
    /// Changes when a recipe is selected
    pub recipe_preview: Rect,
    /// Changes when a production completes
    pub produce_result: Rect,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            window_title: "CardGame".to_string(),
            capture_region: None,
            dpi_scale: None,
            poll: PollPolicy::default(),
            tick_delay_ms: 300,
            step_retries: 1,
            max_pages: 20,
            settle_ms: 500,
            enhance_tab_button: Point::new(630, 50),
            produce_tab_button: Point::new(700, 50),
            card_tab_button: Point::new(595, 73),
            item_tab_button: Point::new(655, 73),
            enhance_button: Point::new(300, 540),
            produce_button: Point::new(460, 540),
            main_slot: Rect::new(110, 150, 80, 100),
            sub_slots: vec![
                Rect::new(60, 300, 56, 64),
                Rect::new(122, 300, 56, 64),
                Rect::new(184, 300, 56, 64),
            ],
            clover_slot: Rect::new(260, 300, 56, 64),
            spice_slot: Rect::new(380, 300, 56, 64),
            recipe_preview: Rect::new(380, 120, 160, 160),
            produce_result: Rect::new(380, 420, 200, 40),
        }
    }
}

impl AutomationConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(region) = self.capture_region {
            if region.x != 0 || region.y != 0 || region.is_empty() {
                return Err(AutomationError::InvalidConfig(format!(
                    "capture_region must be a non-empty rectangle at the client origin, got {:?}",
                    region
                )));
            }
        }
        if let Some(dpi) = self.dpi_scale {
            if !(dpi.is_finite() && dpi > 0.0) {
                return Err(AutomationError::InvalidConfig(format!(
                    "dpi_scale must be positive, got {}",
                    dpi
                )));
            }
        }
        if self.sub_slots.is_empty() {
            return Err(AutomationError::InvalidConfig("no sub card slots".into()));
        }
        Ok(())
    }
}

/// Accepted item names plus a bind filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRule {
    pub names: Vec<String>,
    #[serde(default)]
    pub bind: BindFilter,
}

impl ItemRule {
    pub fn name_set(&self) -> BTreeSet<String> {
        self.names.iter().cloned().collect()
    }
}

/// One material card for an enhancement step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCardRule {
    pub cards: Vec<String>,
    /// Exact level required, any level when absent
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub bind: BindFilter,
}

/// Materials used when enhancing from `level`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRule {
    pub level: u8,
    /// Overrides the plan's main cards for this level
    #[serde(default)]
    pub main_cards: Vec<String>,
    #[serde(default)]
    pub sub_cards: Vec<SubCardRule>,
    #[serde(default)]
    pub clover: Option<ItemRule>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementPlan {
    pub min_level: u8,
    pub max_level: u8,
    pub main_cards: Vec<String>,
    #[serde(default)]
    pub main_bind: BindFilter,
    #[serde(default)]
    pub levels: Vec<LevelRule>,
}

impl EnhancementPlan {
    /// Rule for enhancing a card currently at `level`.
    pub fn rule_for(&self, level: u8) -> Option<&LevelRule> {
        self.levels.iter().find(|r| r.level == level)
    }

    /// Card types the main card may have at `level`.
    pub fn main_cards_at(&self, level: u8) -> BTreeSet<String> {
        match self.rule_for(level) {
            Some(rule) if !rule.main_cards.is_empty() => rule.main_cards.iter().cloned().collect(),
            _ => self.main_cards.iter().cloned().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionPlan {
    pub recipe: String,
    #[serde(default)]
    pub spice: Option<ItemRule>,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Workflow {
    Enhance(EnhancementPlan),
    Produce(ProductionPlan),
}

/// What one run does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub workflow: Workflow,
}

fn check_names(what: &str, names: &[String]) -> Result<()> {
    if names.is_empty() || names.iter().any(|n| n.trim().is_empty()) {
        return Err(AutomationError::InvalidConfig(format!(
            "{} needs at least one non-empty name",
            what
        )));
    }
    Ok(())
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        match &self.workflow {
            Workflow::Enhance(plan) => {
                check_names("main card types", &plan.main_cards)?;
                if plan.min_level < 1
                    || plan.min_level > plan.max_level
                    || plan.max_level > MAX_CARD_LEVEL
                {
                    return Err(AutomationError::InvalidConfig(format!(
                        "level range {}..={} outside 1..={}",
                        plan.min_level, plan.max_level, MAX_CARD_LEVEL
                    )));
                }
                for rule in &plan.levels {
                    if rule.level < plan.min_level || rule.level >= plan.max_level {
                        return Err(AutomationError::InvalidConfig(format!(
                            "level rule {} never used for range {}..{}",
                            rule.level, plan.min_level, plan.max_level
                        )));
                    }
                    for sub in &rule.sub_cards {
                        check_names(&format!("level {} sub card", rule.level), &sub.cards)?;
                    }
                    if let Some(clover) = &rule.clover {
                        check_names(&format!("level {} clover", rule.level), &clover.names)?;
                    }
                }
            }
            Workflow::Produce(plan) => {
                if plan.recipe.trim().is_empty() {
                    return Err(AutomationError::InvalidConfig("no recipe selected".into()));
                }
                if plan.count == 0 {
                    return Err(AutomationError::InvalidConfig(
                        "production count must be at least 1".into(),
                    ));
                }
                if let Some(spice) = &plan.spice {
                    check_names("spice", &spice.names)?;
                }
            }
        }
        Ok(())
    }
}

/// Contents of config.json.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub automation: AutomationConfig,
    pub run: Option<RunConfig>,
}

/// Loads configuration from `path` or returns defaults.
pub fn load_config(path: &Path) -> AppConfig {
    crate::log(&format!("Looking for config at: {}", path.display()));

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    return config;
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
    }

    AppConfig::default()
}
