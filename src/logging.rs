//! Logger setup for applications driving the renderer

use std::sync::Once;

/// Filter applied when neither the caller nor `RUST_LOG` provides one
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn";

static INIT: Once = Once::new();

/// Install the global `env_logger` once.
///
/// `filter` uses the `env_logger` syntax and takes precedence over
/// `RUST_LOG`. Later calls are ignored.
pub fn init_logging(filter: Option<&str>) {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or(DEFAULT_FILTER);
        let mut builder = env_logger::Builder::from_env(env);
        if let Some(filter) = filter {
            builder.parse_filters(filter);
        }
        if builder.try_init().is_err() {
            log::warn!("A global logger was already installed");
        }
        log::debug!("Logging initialized");
    });
}
