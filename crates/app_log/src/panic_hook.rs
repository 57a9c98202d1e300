//! Panic hook for crash reporting
//!
//! Panics on worker pool threads are caught by the pool and the worker keeps
//! running, so they are only logged. Any other panic writes a crash report.

use backtrace::Backtrace;
use chrono::Local;
use std::panic::PanicHookInfo;
use std::path::PathBuf;

/// Thread name prefixes of pools that recover from job panics
const RECOVERING_POOLS: [&str; 2] = ["enrich-", "enumerate-"];

/// Initialize the panic hook for crash reporting
pub fn init_panic_hook() {
    std::panic::set_hook(Box::new(panic_handler));
    tracing::debug!("Panic hook initialized");
}

fn payload_text(info: &PanicHookInfo) -> String {
    let payload = info.payload();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<unknown>".to_string()
    }
}

fn is_recovering_worker(thread_name: &str) -> bool {
    RECOVERING_POOLS.iter().any(|p| thread_name.starts_with(p))
}

fn crash_report(timestamp: &str, thread_name: &str, location: &str, payload: &str, trace: &str) -> String {
    format!(
        "=== CRITICAL PANIC ===\n\
         Timestamp: {}\n\
         Thread: {}\n\
         Location: {}\n\
         Payload: {}\n\n\
         Stack Trace:\n{}",
        timestamp, thread_name, location, payload, trace
    )
}

fn crash_dir() -> PathBuf {
    let dir = crate::log_dir().join("crashes");
    match std::fs::create_dir_all(&dir) {
        Ok(()) => dir,
        Err(_) => std::env::temp_dir(),
    }
}

fn panic_handler(info: &PanicHookInfo) {
    let thread = std::thread::current();
    let thread_name = thread.name().unwrap_or("<unnamed>");
    let location = info
        .location()
        .map(|l| format!("{}:{}", l.file(), l.line()))
        .unwrap_or_else(|| "<unknown>".to_string());
    let payload = payload_text(info);

    if is_recovering_worker(thread_name) {
        tracing::warn!(thread = thread_name, %location, "Worker job panicked: {}", payload);
        return;
    }

    let report = crash_report(
        &Local::now().to_rfc3339(),
        thread_name,
        &location,
        &payload,
        &format!("{:?}", Backtrace::new()),
    );

    eprintln!("{}", report);
    tracing::error!(thread = thread_name, "{}", report);

    let dump_path = crash_dir().join(format!(
        "live_lister_crash_{}.txt",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    match std::fs::write(&dump_path, &report) {
        Ok(()) => eprintln!("Crash report written to {}", dump_path.display()),
        Err(e) => eprintln!("Failed to write crash dump: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_threads_recover() {
        assert!(is_recovering_worker("enrich-thumb-0"));
        assert!(is_recovering_worker("enumerate-0"));
        assert!(!is_recovering_worker("main"));
        assert!(!is_recovering_worker("deadlock-detector"));
    }

    #[test]
    fn test_crash_report_layout() {
        let report = crash_report("2026-01-01T00:00:00", "main", "src/app.rs:10", "boom", "frames");
        assert!(report.starts_with("=== CRITICAL PANIC ==="));
        assert!(report.contains("Thread: main\n"));
        assert!(report.contains("Location: src/app.rs:10\n"));
        assert!(report.ends_with("Stack Trace:\nframes"));
    }
}
