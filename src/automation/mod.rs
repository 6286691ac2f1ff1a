//! UI automation for the card game client.
//!
//! This module provides:
//! - Mouse input through the `InputSink` trait
//! - Bounded polling and cancellation
//! - The enhancement and production workflows with list paging
//! - A worker thread reporting typed events

pub mod config;
pub mod controller;
pub mod detection;
pub mod events;
pub mod input;
pub mod navigation;
pub mod runner;
pub mod state;

pub use config::{
    load_config, AppConfig, AutomationConfig, EnhancementPlan, ItemRule, LevelRule,
    ProductionPlan, RunConfig, SubCardRule, Workflow,
};
pub use controller::Controller;
pub use detection::{poll_until, CancelToken, PollPolicy};
pub use events::{LogEvent, Reporter, ResultEvent, Severity, WorkerEvent};
pub use input::{DragDirection, InputSink};
pub use runner::{start, RunHandle};
pub use state::{EnhancementLoop, RunOutcome, RunState, TickOutcome, WorkflowState};

#[cfg(windows)]
pub use input::PostMessageInput;
