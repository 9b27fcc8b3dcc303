//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Wall clock in milliseconds
//! - Logger and panic hook installation

/// Milliseconds on a clock that never goes backwards
///
/// Native: time since the first call. Web: `Date.now()`.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
}

#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Install the platform logger at `level`
///
/// Native honours `RUST_LOG` on top of `level`. Calling twice is harmless.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(level: log::LevelFilter) {
    let result = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
    if result.is_err() {
        log::debug!("logger already installed");
    }
}

#[cfg(target_arch = "wasm32")]
pub fn init_logging(level: log::LevelFilter) {
    console_error_panic_hook::set_once();
    let level = level.to_level().unwrap_or(log::Level::Info);
    if console_log::init_with_level(level).is_err() {
        log::debug!("logger already installed");
    }
}
