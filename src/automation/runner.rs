//! Automation runner - starts a workflow on its own thread.
//!
//! The worker owns the controller, the capture source and the input sink for
//! the whole run. The caller keeps a `RunHandle`: an event receiver, the
//! cancel token and the join handle.

use anyhow::{Context, Result};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::automation::config::{AutomationConfig, RunConfig};
use crate::automation::controller::Controller;
use crate::automation::detection::CancelToken;
use crate::automation::events::{create_event_queue, Reporter, WorkerEvent};
use crate::automation::input::InputSink;
use crate::automation::state::RunOutcome;
use crate::capture::{ScreenSource, WindowHandle};
use crate::recognition::TemplateRegistry;

/// Caller side of a running workflow.
pub struct RunHandle {
    pub events: Receiver<WorkerEvent>,
    cancel: CancelToken,
    join: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Requests cancellation; observed at the next tick or poll.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Blocks until the worker exits.
    pub fn wait(self) -> RunOutcome {
        match self.join.join() {
            Ok(outcome) => outcome,
            Err(e) => {
                crate::log(&format!("Automation thread panicked: {:?}", e));
                RunOutcome::Failed("automation thread panicked".to_string())
            }
        }
    }
}

/// Starts `run` against `window` in a background thread.
///
/// Config and registry are moved into the worker and stay fixed for the run.
pub fn start<S, I>(
    screen: S,
    input: I,
    window: WindowHandle,
    config: AutomationConfig,
    registry: Arc<TemplateRegistry>,
    run: RunConfig,
) -> Result<RunHandle>
where
    S: ScreenSource + Send + 'static,
    I: InputSink + Send + 'static,
{
    let (sender, events) = create_event_queue();
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();

    crate::log(&format!(
        "Starting automation on window {:?} ({} templates)",
        window,
        registry.len()
    ));

    let join = thread::Builder::new()
        .name("automation".to_string())
        .spawn(move || {
            let mut controller = Controller::new(
                screen,
                input,
                window,
                config,
                registry,
                Reporter::new(sender),
                worker_cancel,
            );
            let outcome = controller.run(&run);
            crate::log(&format!("Automation thread finished: {}", outcome));
            outcome
        })
        .context("Failed to spawn automation thread")?;

    Ok(RunHandle {
        events,
        cancel,
        join,
    })
}
