//! Run states and the level-increment loop.
//!
//! A run moves through: Idle → Running → (Stepping → Verifying)* → Finished,
//! Cancelled or Failed. Cancellation is only observed at tick boundaries so an
//! input is never left half-dispatched.

use std::collections::BTreeSet;
use std::fmt;

use crate::automation::detection::CancelToken;
use crate::error::Result;

/// Controller states, reported to the caller as they change.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// Not started
    Idle,
    /// Config validated, workflow started
    Running,
    /// Capturing, recognising and dispatching one input
    Stepping,
    /// Polling for the effect of the last input
    Verifying,
    Finished,
    /// Cancellation observed at a tick boundary
    Cancelled,
    Failed(String),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Running => write!(f, "Running"),
            RunState::Stepping => write!(f, "Stepping"),
            RunState::Verifying => write!(f, "Verifying"),
            RunState::Finished => write!(f, "Finished"),
            RunState::Cancelled => write!(f, "Cancelled"),
            RunState::Failed(msg) => write!(f, "Failed: {}", msg),
        }
    }
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Finished | RunState::Cancelled | RunState::Failed(_)
        )
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Finished,
    Cancelled,
    Failed(String),
}

impl From<RunOutcome> for RunState {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Finished => RunState::Finished,
            RunOutcome::Cancelled => RunState::Cancelled,
            RunOutcome::Failed(msg) => RunState::Failed(msg),
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        RunState::from(self.clone()).fmt(f)
    }
}

/// Progress of one enhancement run. Owned by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub current_level: u8,
    pub min_level: u8,
    pub max_level: u8,
    pub required_card_types: BTreeSet<String>,
    pub cancel_requested: bool,
}

impl WorkflowState {
    pub fn new(min_level: u8, max_level: u8, required_card_types: BTreeSet<String>) -> Self {
        Self {
            current_level: min_level,
            min_level,
            max_level,
            required_card_types,
            cancel_requested: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// One enhancement was dispatched and verified
    Continue,
    Finished,
    Cancelled,
}

/// Drives `WorkflowState` one tick at a time.
#[derive(Debug)]
pub struct EnhancementLoop {
    pub state: WorkflowState,
    ticks: u32,
}

impl EnhancementLoop {
    pub fn new(state: WorkflowState) -> Self {
        Self { state, ticks: 0 }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Advances the loop by one tick.
    ///
    /// Checks cancellation first, then the level bound. Otherwise runs
    /// `enhance` with the current level and increments it once `enhance`
    /// returns `Ok`. An error leaves the level unchanged.
    pub fn tick<F>(&mut self, cancel: &CancelToken, enhance: F) -> Result<TickOutcome>
    where
        F: FnOnce(u8) -> Result<()>,
    {
        self.ticks += 1;

        if cancel.is_cancelled() {
            self.state.cancel_requested = true;
            return Ok(TickOutcome::Cancelled);
        }
        if self.state.current_level >= self.state.max_level {
            return Ok(TickOutcome::Finished);
        }

        enhance(self.state.current_level)?;
        self.state.current_level += 1;
        Ok(TickOutcome::Continue)
    }
}
