//! Opt-in timing of per-frame work.
//!
//! Disabled by default; `set_profiling_enabled(true)` turns on `[PERF]` log
//! lines for every `timed` section and a periodic element-count summary.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Global flag to enable/disable performance profiling.
static PROFILING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Frame counter for periodic logging (every N frames).
static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How often to log element counts (every N frames).
const SUMMARY_LOG_INTERVAL: u64 = 300; // ~5 seconds at 60fps

pub fn is_profiling_enabled() -> bool {
    PROFILING_ENABLED.load(Ordering::Relaxed)
}

pub fn set_profiling_enabled(enabled: bool) {
    PROFILING_ENABLED.store(enabled, Ordering::Relaxed);
    if enabled {
        log::info!("Performance profiling ENABLED");
    } else {
        log::info!("Performance profiling DISABLED");
    }
}

/// Increment frame counter and return true if we should log this frame.
pub fn should_log_summary() -> bool {
    if !is_profiling_enabled() {
        return false;
    }
    let frame = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    frame % SUMMARY_LOG_INTERVAL == 0
}

/// Run `f`, logging its duration when profiling is enabled.
pub fn timed<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    if is_profiling_enabled() {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();
        log::info!("[PERF] {}: {:.2}ms", label, elapsed.as_secs_f64() * 1000.0);
        result
    } else {
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_returns_result() {
        assert_eq!(timed("noop", || 42), 42);
    }
}
