//! Event queue from the automation worker to its caller.
//!
//! Uses a std::sync::mpsc channel: the worker is the single producer, the
//! caller (UI layer or console) the single consumer. Sends are fire-and-forget;
//! a caller that stopped listening never blocks the worker.

use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::automation::state::{RunOutcome, RunState};
use crate::recognition::{CardInfo, RecognitionResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Success => write!(f, "OK"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    pub message: String,
    pub severity: Severity,
}

/// Recognition results surfaced to the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultEvent {
    /// A card was selected for enhancement.
    CardSelected(CardInfo),
    Recognition(RecognitionResult),
    /// The main card reached this level.
    LevelReached(u8),
    /// Production click `count` of the run was verified.
    Produced { recipe: String, count: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorkerEvent {
    Log(LogEvent),
    Result(ResultEvent),
    State(RunState),
    Finished(RunOutcome),
}

/// Creates a new event queue.
pub fn create_event_queue() -> (Sender<WorkerEvent>, Receiver<WorkerEvent>) {
    channel()
}

/// Worker-side handle that mirrors log events into the log file.
#[derive(Clone)]
pub struct Reporter {
    sender: Sender<WorkerEvent>,
}

impl Reporter {
    pub fn new(sender: Sender<WorkerEvent>) -> Self {
        Self { sender }
    }

    fn emit(&self, event: WorkerEvent) {
        // The receiver may be gone; the worker keeps going regardless
        let _ = self.sender.send(event);
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        crate::log(&format!("[{}] {}", severity, message));
        self.emit(WorkerEvent::Log(LogEvent { message, severity }));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(Severity::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    pub fn result(&self, result: ResultEvent) {
        self.emit(WorkerEvent::Result(result));
    }

    pub fn state(&self, state: RunState) {
        self.emit(WorkerEvent::State(state));
    }

    pub fn finished(&self, outcome: RunOutcome) {
        self.emit(WorkerEvent::Finished(outcome));
    }
}
