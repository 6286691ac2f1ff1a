//! List paging and scrolling.
//!
//! Lists only show a few rows at a time. A search inspects the visible page,
//! drags the list up by a fixed number of rows when the target is missing,
//! verifies that the scrollbar moved, and inspects the new page.
//!
//! Every verified drag moves the list's scroll position by one. The position
//! lives on the controller for the whole run, so a cell seen by two searches
//! has the same `(position, row, col)` even when no top marker rewinds the
//! list between them.

use crate::automation::controller::Controller;
use crate::automation::detection::{region_hash, wait_for_region_change};
use crate::automation::input::{DragDirection, InputSink};
use crate::capture::{Frame, ScreenSource};
use crate::error::{AutomationError, Result};
use crate::recognition::layout::ListLayout;
use crate::recognition::{detect_grid, Category, GridLines, Recognizer};

/// Outcome of dragging a list once.
enum Scroll {
    Moved,
    /// The scrollbar did not change within the poll budget
    Stuck,
}

impl<S: ScreenSource, I: InputSink> Controller<S, I> {
    fn drag_list(
        &mut self,
        list: &ListLayout,
        frame: &Frame,
        direction: DragDirection,
    ) -> Result<Scroll> {
        let baseline = region_hash(frame, list.scroll_roi)?;
        let distance = list.rows_per_drag * list.grid.row_pitch;
        self.drag(list.drag_start, distance, direction)?;

        self.enter_verifying();
        let config = self.config();
        let result = wait_for_region_change(
            self.screen(),
            self.window(),
            config.capture_region,
            list.scroll_roi,
            baseline,
            &config.poll,
            self.cancel_token(),
            list.grid.name,
        );
        match result {
            Ok(_) => {
                let delta = match direction {
                    DragDirection::Up => 1,
                    DragDirection::Down => -1,
                };
                self.record_scroll(list.grid.name, delta);
                Ok(Scroll::Moved)
            }
            Err(AutomationError::Timeout { .. }) => Ok(Scroll::Stuck),
            Err(e) => Err(e),
        }
    }

    /// Pages through `list` until `finder` returns a value.
    ///
    /// `finder` receives the recognizer, the current frame, its grid and the
    /// list's scroll position. Stops with `NoMatchFound` at the bottom
    /// marker, when the list stops moving, or after `max_pages` drags.
    pub fn find_in_list<T, F>(
        &mut self,
        list: &ListLayout,
        what: &str,
        mut finder: F,
    ) -> Result<T>
    where
        F: FnMut(&Recognizer<'_>, &Frame, &GridLines, i32) -> Option<T>,
    {
        let registry = self.registry();
        let recognizer = Recognizer::new(&registry);
        let max_pages = self.config().max_pages;

        for page in 0..=max_pages {
            if self.cancel_token().is_cancelled() {
                return Err(AutomationError::Cancelled);
            }

            let frame = self.capture()?;
            let grid = detect_grid(&frame.pixels, list.grid)?;
            let position = self.scroll_position(list.grid.name);
            if let Some(found) = finder(&recognizer, &frame, &grid, position) {
                return Ok(found);
            }

            if recognizer.marker(&frame, Category::ScrollMarker, list.bottom_marker) {
                self.reporter()
                    .info(format!("Reached the end of the {} list", list.grid.name));
                break;
            }
            if page == max_pages {
                self.reporter().warn(format!(
                    "Gave up on the {} list after {} pages",
                    list.grid.name, max_pages
                ));
                break;
            }

            if let Scroll::Stuck = self.drag_list(list, &frame, DragDirection::Up)? {
                self.reporter()
                    .info(format!("The {} list no longer moves", list.grid.name));
                break;
            }
        }

        Err(AutomationError::NoMatchFound(format!(
            "{} not in the {} list",
            what, list.grid.name
        )))
    }

    /// Rewinds `list` until its top marker shows.
    ///
    /// Without a top marker template this is skipped with a warning.
    pub fn scroll_to_top(&mut self, list: &ListLayout) -> Result<()> {
        let registry = self.registry();
        if !registry.contains(Category::ScrollMarker, list.top_marker) {
            self.warn_missing(Category::ScrollMarker, list.top_marker);
            return Ok(());
        }
        let recognizer = Recognizer::new(&registry);

        for _ in 0..=self.config().max_pages {
            let frame = self.capture()?;
            if recognizer.marker(&frame, Category::ScrollMarker, list.top_marker) {
                return Ok(());
            }
            if let Scroll::Stuck = self.drag_list(list, &frame, DragDirection::Down)? {
                self.reporter().warn(format!(
                    "The {} list stopped moving before its top marker showed",
                    list.grid.name
                ));
                return Ok(());
            }
        }

        Err(AutomationError::Timeout {
            what: format!("top of the {} list", list.grid.name),
            attempts: self.config().max_pages + 1,
        })
    }
}
