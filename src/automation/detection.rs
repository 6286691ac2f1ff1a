//! Verification by bounded polling.
//!
//! After an input is dispatched the controller polls fresh captures until
//! the expected change shows up, the attempt budget runs out, or the run is
//! cancelled.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::capture::{Frame, Rect, ScreenSource, WindowHandle};
use crate::error::{AutomationError, Result};
use crate::recognition::{average_hash, Category, ImageHash, Recognizer};

/// Cooperative cancellation flag shared between the caller and one run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fixed-interval polling budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        // 60 x 50ms = 3s
        Self {
            interval_ms: 50,
            max_attempts: 60,
        }
    }
}

/// Calls `check` until it returns true.
///
/// Cancellation is checked before every attempt. Returns the attempt number
/// that succeeded, `Timeout` once `max_attempts` checks have failed, or the
/// first error `check` returns.
pub fn poll_until<F>(
    policy: &PollPolicy,
    cancel: &CancelToken,
    what: &str,
    mut check: F,
) -> Result<u32>
where
    F: FnMut(u32) -> Result<bool>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(AutomationError::Cancelled);
        }
        if check(attempt)? {
            return Ok(attempt);
        }
        if attempt < attempts {
            std::thread::sleep(Duration::from_millis(policy.interval_ms));
        }
    }
    Err(AutomationError::Timeout {
        what: what.to_string(),
        attempts,
    })
}

/// Hash of a client-area region of `frame`.
pub fn region_hash(frame: &Frame, roi: Rect) -> Result<ImageHash> {
    average_hash(&frame.pixels, Some(roi)).ok_or_else(|| {
        AutomationError::CaptureFailure(format!(
            "region {:?} outside {}x{} frame",
            roi,
            frame.width(),
            frame.height()
        ))
    })
}

/// Polls until the hash of `roi` differs from `baseline`.
#[allow(clippy::too_many_arguments)]
pub fn wait_for_region_change<S: ScreenSource + ?Sized>(
    screen: &S,
    window: WindowHandle,
    region: Option<Rect>,
    roi: Rect,
    baseline: ImageHash,
    policy: &PollPolicy,
    cancel: &CancelToken,
    what: &str,
) -> Result<ImageHash> {
    let mut latest = baseline;
    poll_until(policy, cancel, what, |_| {
        let frame = screen.capture(window, region)?;
        latest = region_hash(&frame, roi)?;
        Ok(latest != baseline)
    })?;
    Ok(latest)
}

/// Polls until the marker `(category, key)` is recognised.
#[allow(clippy::too_many_arguments)]
pub fn wait_for_marker<S: ScreenSource + ?Sized>(
    screen: &S,
    window: WindowHandle,
    region: Option<Rect>,
    recognizer: &Recognizer<'_>,
    category: Category,
    key: &str,
    policy: &PollPolicy,
    cancel: &CancelToken,
) -> Result<()> {
    poll_until(policy, cancel, key, |_| {
        let frame = screen.capture(window, region)?;
        Ok(recognizer.marker(&frame, category, key))
    })
    .map(|_| ())
}
