//! Workflow controller.
//!
//! Sequences capture → recognise → act → verify for the enhancement and
//! production workflows. Every step takes a fresh frame, and no input is
//! dispatched before the previous one has been verified or has timed out.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::automation::config::{
    AutomationConfig, EnhancementPlan, ItemRule, ProductionPlan, RunConfig, Workflow,
};
use crate::automation::detection::{
    region_hash, wait_for_marker, wait_for_region_change, CancelToken,
};
use crate::automation::events::{Reporter, ResultEvent};
use crate::automation::input::{DragDirection, InputSink};
use crate::automation::state::{
    EnhancementLoop, RunOutcome, RunState, TickOutcome, WorkflowState,
};
use crate::capture::{Frame, Point, Rect, ScreenSource, WindowHandle};
use crate::error::{AutomationError, Result};
use crate::recognition::layout::{BAG_LIST, RECIPE_LIST};
use crate::recognition::{
    BindFilter, CardInfo, Category, ImageHash, Position, Recognizer, TemplateRegistry,
};

/// Drives one game window through a workflow.
pub struct Controller<S, I> {
    screen: S,
    input: I,
    window: WindowHandle,
    config: AutomationConfig,
    registry: Arc<TemplateRegistry>,
    reporter: Reporter,
    cancel: CancelToken,
    state: RunState,
    dpi: f32,
    /// Missing templates already reported
    warned: HashSet<(Category, String)>,
    /// Net verified drags per list since the run started, advancing = +1
    scroll: HashMap<&'static str, i32>,
}

/// A bag cell picked during one enhancement step: (scroll position, row, col).
type Taken = (i32, usize, usize);

impl<S: ScreenSource, I: InputSink> Controller<S, I> {
    pub fn new(
        screen: S,
        input: I,
        window: WindowHandle,
        config: AutomationConfig,
        registry: Arc<TemplateRegistry>,
        reporter: Reporter,
        cancel: CancelToken,
    ) -> Self {
        let dpi = config.dpi_scale.unwrap_or(1.0);
        Self {
            screen,
            input,
            window,
            config,
            registry,
            reporter,
            cancel,
            state: RunState::Idle,
            dpi,
            warned: HashSet::new(),
            scroll: HashMap::new(),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub(crate) fn screen(&self) -> &S {
        &self.screen
    }

    pub(crate) fn window(&self) -> WindowHandle {
        self.window
    }

    pub(crate) fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub(crate) fn registry(&self) -> Arc<TemplateRegistry> {
        Arc::clone(&self.registry)
    }

    /// Current scroll position of `list`, stable across searches within a run.
    pub(crate) fn scroll_position(&self, list: &str) -> i32 {
        self.scroll.get(list).copied().unwrap_or(0)
    }

    pub(crate) fn record_scroll(&mut self, list: &'static str, delta: i32) {
        *self.scroll.entry(list).or_insert(0) += delta;
    }

    fn set_state(&mut self, state: RunState) {
        if self.state != state {
            self.state = state.clone();
            self.reporter.state(state);
        }
    }

    pub(crate) fn enter_verifying(&mut self) {
        self.set_state(RunState::Verifying);
    }

    /// Reports a missing template once per run.
    pub(crate) fn warn_missing(&mut self, category: Category, key: &str) {
        if self.warned.insert((category, key.to_string())) {
            self.reporter.warn(format!(
                "{} template '{}' not loaded, skipping its check",
                category, key
            ));
        }
    }

    fn require_template(&self, category: Category, key: &str) -> Result<()> {
        if self.registry.contains(category, key) {
            Ok(())
        } else {
            Err(AutomationError::TemplateMissing {
                category: category.to_string(),
                key: key.to_string(),
            })
        }
    }

    /// Captures a fresh frame; an invalid window is a capture failure.
    pub fn capture(&self) -> Result<Frame> {
        if !self.screen.is_window_valid(self.window) {
            return Err(AutomationError::CaptureFailure(
                "game window is no longer valid".to_string(),
            ));
        }
        self.screen.capture(self.window, self.config.capture_region)
    }

    /// Clicks a frame-space point, converted to window coordinates by `dpi_scale`.
    pub fn click(&mut self, point: Point) -> Result<()> {
        self.set_state(RunState::Stepping);
        self.input.click(self.window, point.scaled(self.dpi))
    }

    pub fn drag(&mut self, start: Point, distance: u32, direction: DragDirection) -> Result<()> {
        self.set_state(RunState::Stepping);
        let distance = (distance as f32 * self.dpi).round() as u32;
        self.input
            .drag(self.window, start.scaled(self.dpi), distance, direction)
    }

    /// Polls until `roi` no longer hashes to `baseline`.
    pub fn verify_change(&mut self, roi: Rect, baseline: ImageHash, what: &str) -> Result<()> {
        self.enter_verifying();
        wait_for_region_change(
            &self.screen,
            self.window,
            self.config.capture_region,
            roi,
            baseline,
            &self.config.poll,
            &self.cancel,
            what,
        )
        .map(|_| ())
    }

    fn click_and_verify(&mut self, point: Point, roi: Rect, what: &str) -> Result<()> {
        let baseline = region_hash(&self.capture()?, roi)?;
        self.click(point)?;
        self.verify_change(roi, baseline, what)
    }

    /// Makes sure the page or tab marked by `(category, key)` is showing.
    ///
    /// Clicks `button` if it is not. Without a template the button is
    /// clicked unconditionally and the controller waits `settle_ms`.
    fn ensure_page(&mut self, category: Category, key: &str, button: Point) -> Result<()> {
        if !self.registry.contains(category, key) {
            self.warn_missing(category, key);
            self.click(button)?;
            std::thread::sleep(Duration::from_millis(self.config.settle_ms));
            return Ok(());
        }

        let registry = self.registry();
        let recognizer = Recognizer::new(&registry);
        if recognizer.marker(&self.capture()?, category, key) {
            return Ok(());
        }

        self.click(button)?;
        self.enter_verifying();
        wait_for_marker(
            &self.screen,
            self.window,
            self.config.capture_region,
            &recognizer,
            category,
            key,
            &self.config.poll,
            &self.cancel,
        )
    }

    /// Runs `step`, retrying step-local failures up to `step_retries` times.
    fn with_retries<T, F>(&mut self, what: &str, mut step: F) -> Result<T>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match step(&mut *self) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_run_terminating() || attempt >= self.config.step_retries => {
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    self.reporter.warn(format!(
                        "{} failed: {}. Retrying ({}/{})",
                        what, e, attempt, self.config.step_retries
                    ));
                }
            }
        }
    }

    /// Runs one workflow to completion, cancellation or failure.
    pub fn run(&mut self, run: &RunConfig) -> RunOutcome {
        self.set_state(RunState::Running);

        let result = self
            .config
            .validate()
            .and_then(|()| run.validate())
            .and_then(|()| match &run.workflow {
                Workflow::Enhance(plan) => self.run_enhancement(plan),
                Workflow::Produce(plan) => self.run_production(plan),
            });

        let outcome = match result {
            Ok(()) => {
                self.reporter.success("Automation complete");
                RunOutcome::Finished
            }
            Err(AutomationError::Cancelled) => {
                self.reporter.warn("Automation cancelled");
                RunOutcome::Cancelled
            }
            Err(e) => {
                self.reporter.error(format!("Automation failed: {}", e));
                RunOutcome::Failed(e.to_string())
            }
        };

        self.set_state(outcome.clone().into());
        self.reporter.finished(outcome.clone());
        outcome
    }

    fn run_enhancement(&mut self, plan: &EnhancementPlan) -> Result<()> {
        let overrides = plan.levels.iter().flat_map(|r| r.main_cards.iter());
        for card in plan.main_cards.iter().chain(overrides) {
            self.require_template(Category::CardType, card)?;
        }

        let required: BTreeSet<String> = plan.main_cards.iter().cloned().collect();
        let mut lp = EnhancementLoop::new(WorkflowState::new(
            plan.min_level,
            plan.max_level,
            required,
        ));
        self.reporter.info(format!(
            "Enhancing {:?} from level {} to {}",
            lp.state.required_card_types, plan.min_level, plan.max_level
        ));

        let cancel = self.cancel.clone();
        loop {
            let outcome = lp.tick(&cancel, |level| {
                self.with_retries(&format!("Enhancement at level {}", level), |c| {
                    c.enhance_once(plan, level)
                })
            })?;

            match outcome {
                TickOutcome::Continue => {
                    let level = lp.state.current_level;
                    self.reporter.success(format!("Card reached level {}", level));
                    self.reporter.result(ResultEvent::LevelReached(level));
                    std::thread::sleep(Duration::from_millis(self.config.tick_delay_ms));
                }
                TickOutcome::Finished => {
                    self.reporter.info(format!(
                        "Level {} reached after {} ticks",
                        lp.state.current_level,
                        lp.ticks()
                    ));
                    return Ok(());
                }
                TickOutcome::Cancelled => return Err(AutomationError::Cancelled),
            }
        }
    }

    /// One enhancement of a card at `level`: main card, materials, button.
    fn enhance_once(&mut self, plan: &EnhancementPlan, level: u8) -> Result<()> {
        self.ensure_page(Category::PagePosition, "enhance_tab", self.config.enhance_tab_button)?;
        self.ensure_page(Category::PagePosition, "bag_cards", self.config.card_tab_button)?;

        // Without level badges every level reads as 0
        let levels_known = !self.registry.level_templates().is_empty();
        if !levels_known {
            self.warn_missing(Category::CardLevel, "*");
        }
        let level_filter = |want: Option<u8>| want.filter(|_| levels_known);

        let mut taken: Vec<Taken> = Vec::new();
        let main_cards = plan.main_cards_at(level);
        let main = self.select_card(
            &main_cards,
            level_filter(Some(level)),
            plan.main_bind,
            &taken,
            "main card",
        )?;
        self.click_and_verify(main.1.center, self.config.main_slot, "main card slot")?;
        taken.push((main.0, main.1.row, main.1.col));
        self.reporter.result(ResultEvent::CardSelected(main.1));

        if let Some(rule) = plan.rule_for(level) {
            for (i, sub) in rule.sub_cards.iter().enumerate() {
                let Some(slot) = self.config.sub_slots.get(i).copied() else {
                    self.reporter.warn(format!(
                        "Level {} lists {} sub cards but only {} slots exist",
                        level,
                        rule.sub_cards.len(),
                        self.config.sub_slots.len()
                    ));
                    break;
                };
                let names: BTreeSet<String> = sub.cards.iter().cloned().collect();
                let picked = self.select_card(
                    &names,
                    level_filter(sub.level),
                    sub.bind,
                    &taken,
                    "sub card",
                )?;
                self.click_and_verify(picked.1.center, slot, "sub card slot")?;
                taken.push((picked.0, picked.1.row, picked.1.col));
                self.reporter.result(ResultEvent::CardSelected(picked.1));
            }

            if let Some(clover) = &rule.clover {
                self.ensure_page(Category::PagePosition, "bag_items", self.config.item_tab_button)?;
                let point = self.select_item(Category::Clover, clover)?;
                self.click_and_verify(point, self.config.clover_slot, "clover slot")?;
            }
        }

        self.click_and_verify(
            self.config.enhance_button,
            self.config.main_slot,
            "enhancement result",
        )
    }

    /// Finds a card in the bag matching names, level and bind state.
    fn select_card(
        &mut self,
        names: &BTreeSet<String>,
        level: Option<u8>,
        bind: BindFilter,
        taken: &[Taken],
        what: &str,
    ) -> Result<(i32, CardInfo)> {
        self.scroll_to_top(&BAG_LIST)?;
        let found = self.find_in_list(&BAG_LIST, what, |rec, frame, grid, position| {
            rec.scan_cards(frame, grid, names)
                .into_iter()
                .find(|card| {
                    level.is_none_or(|l| card.level == l)
                        && bind.accepts(card.bound)
                        && !taken.contains(&(position, card.row, card.col))
                })
                .map(|card| (position, card))
        })?;
        self.reporter.info(format!(
            "Selected {} '{}' (level {}, {}) at row {}, col {}",
            what,
            found.1.name,
            found.1.level,
            if found.1.bound { "bound" } else { "unbound" },
            found.1.row,
            found.1.col
        ));
        Ok(found)
    }

    /// Finds a clover or spice in the bag and returns its cell centre.
    fn select_item(&mut self, category: Category, rule: &ItemRule) -> Result<Point> {
        let names = rule.name_set();
        let bind = rule.bind;
        self.scroll_to_top(&BAG_LIST)?;
        let what = category.to_string();
        let (point, hit) = self.find_in_list(&BAG_LIST, &what, |rec, frame, grid, _| {
            grid.cells().find_map(|(_, _, cell)| {
                rec.item(category, frame, cell, &names, bind)
                    .map(|hit| (cell.center(), hit))
            })
        })?;
        self.reporter.info(format!(
            "Selected {} '{}' (similarity {:.3})",
            category, hit.key, hit.similarity
        ));
        Ok(point)
    }

    fn select_recipe(&mut self, recipe: &str) -> Result<()> {
        self.scroll_to_top(&RECIPE_LIST)?;
        let (point, result) = self.find_in_list(&RECIPE_LIST, recipe, |rec, frame, grid, _| {
            let result = rec.find_recipe(frame, grid, recipe);
            let position = result.position;
            if let (true, Some(Position::Cell { row, col })) = (result.is_match(), position) {
                return grid.cell_center(row, col).map(|p| (p, result));
            }
            None
        })?;
        self.reporter.info(format!("Found recipe '{}'", recipe));
        self.reporter.result(ResultEvent::Recognition(result));
        self.click_and_verify(point, self.config.recipe_preview, "recipe preview")
    }

    fn run_production(&mut self, plan: &ProductionPlan) -> Result<()> {
        self.require_template(Category::Recipe, &plan.recipe)?;
        if let Some(spice) = &plan.spice {
            if !spice.names.iter().any(|n| self.registry.contains(Category::Spice, n)) {
                return Err(AutomationError::TemplateMissing {
                    category: Category::Spice.to_string(),
                    key: spice.names.join(", "),
                });
            }
        }

        self.reporter
            .info(format!("Producing '{}' x{}", plan.recipe, plan.count));
        self.ensure_page(Category::PagePosition, "produce_tab", self.config.produce_tab_button)?;
        self.with_retries("Recipe selection", |c| c.select_recipe(&plan.recipe))?;

        if let Some(spice) = &plan.spice {
            self.with_retries("Spice selection", |c| {
                c.ensure_page(Category::PagePosition, "bag_items", c.config.item_tab_button)?;
                let point = c.select_item(Category::Spice, spice)?;
                c.click_and_verify(point, c.config.spice_slot, "spice slot")
            })?;
        }

        for n in 1..=plan.count {
            if self.cancel.is_cancelled() {
                return Err(AutomationError::Cancelled);
            }
            self.with_retries("Production", |c| {
                c.click_and_verify(
                    c.config.produce_button,
                    c.config.produce_result,
                    "production result",
                )
            })?;
            self.reporter
                .success(format!("Produced '{}' ({}/{})", plan.recipe, n, plan.count));
            self.reporter.result(ResultEvent::Produced {
                recipe: plan.recipe.clone(),
                count: n,
            });
            if n < plan.count {
                std::thread::sleep(Duration::from_millis(self.config.tick_delay_ms));
            }
        }
        Ok(())
    }
}
