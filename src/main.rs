//! Card Assistant
//!
//! Console front end: loads config.json and the template folder next to the
//! executable, binds the game window and runs the configured workflow.
//! Ctrl+Shift+Q cancels a running workflow.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use card_assistant::automation::{self, AutomationConfig, RunConfig, WorkerEvent};
use card_assistant::recognition::TemplateRegistry;
use card_assistant::{log, paths};

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join("card_assistant.log");
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            use std::io::Write;
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    paths::ensure_directories().context("Failed to create log directory")?;

    let app = automation::load_config(&paths::get_config_path());
    let run = app
        .run
        .ok_or_else(|| anyhow!("config.json has no \"run\" section; nothing to do"))?;

    let registry = TemplateRegistry::load_from_dir(&paths::get_template_dir());
    if registry.is_empty() {
        log("Warning: no templates loaded, recognition will not match anything");
    }

    run_workflow(app.automation, Arc::new(registry), run)
}

/// Logs what the worker reports. Returns true once the run has finished.
#[cfg_attr(not(windows), allow(dead_code))]
fn report_event(event: &WorkerEvent) -> bool {
    match event {
        // Already mirrored to the log by the worker
        WorkerEvent::Log(_) => false,
        WorkerEvent::Result(result) => {
            log(&format!("Result: {:?}", result));
            false
        }
        WorkerEvent::State(state) => {
            log(&format!("State: {}", state));
            false
        }
        WorkerEvent::Finished(outcome) => {
            log(&format!("Finished: {}", outcome));
            true
        }
    }
}

#[cfg(windows)]
fn run_workflow(
    mut config: AutomationConfig,
    registry: Arc<TemplateRegistry>,
    run: RunConfig,
) -> Result<()> {
    use std::sync::mpsc::RecvTimeoutError;
    use std::time::Duration;

    use card_assistant::automation::{PostMessageInput, RunOutcome};
    use card_assistant::capture::{self, WindowsScreen};
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT,
    };
    use windows::Win32::UI::WindowsAndMessaging::{PeekMessageW, MSG, PM_REMOVE, WM_HOTKEY};

    const HOTKEY_ABORT: i32 = 1;

    if let Err(e) = capture::enable_dpi_awareness() {
        log(&format!("Could not enable per-monitor DPI awareness: {}", e));
    }

    unsafe {
        windows::Win32::System::WinRT::RoInitialize(
            windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
        )?
    };

    let window = capture::find_window_by_title(&config.window_title)
        .with_context(|| format!("Could not find a window titled '{}'", config.window_title))?;
    let (client, _) = capture::get_client_area_info(window)?;
    log(&format!(
        "Bound window {:?}, client area {}x{}",
        window,
        client.right - client.left,
        client.bottom - client.top
    ));
    if config.dpi_scale.is_none() {
        let scale = capture::get_input_scale(window);
        log(&format!("Input scale: {:.3}", scale));
        config.dpi_scale = Some(scale);
    }

    // Thread hotkey: WM_HOTKEY lands in this thread's queue
    unsafe {
        RegisterHotKey(
            HWND::default(),
            HOTKEY_ABORT,
            MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT,
            0x51, // 'Q' key
        )?;
    }
    log("Hotkey: Ctrl+Shift+Q (cancel)");

    let handle = automation::start(
        WindowsScreen,
        PostMessageInput,
        window,
        config,
        registry,
        run,
    )?;

    loop {
        let mut msg = MSG::default();
        while unsafe { PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE) }.as_bool() {
            if msg.message == WM_HOTKEY && msg.wParam.0 as i32 == HOTKEY_ABORT {
                log("Cancel hotkey pressed - stopping after the current step");
                handle.cancel();
            }
        }

        match handle.events.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => {
                if report_event(&event) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    unsafe {
        let _ = UnregisterHotKey(HWND::default(), HOTKEY_ABORT);
    }

    match handle.wait() {
        RunOutcome::Finished | RunOutcome::Cancelled => Ok(()),
        RunOutcome::Failed(msg) => Err(anyhow!("Automation failed: {}", msg)),
    }
}

#[cfg(not(windows))]
fn run_workflow(
    _config: AutomationConfig,
    _registry: Arc<TemplateRegistry>,
    _run: RunConfig,
) -> Result<()> {
    Err(anyhow!(
        "Window capture and input are only implemented for Windows"
    ))
}
