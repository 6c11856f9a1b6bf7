use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "info,parcel_query=debug,tower_http=info";

/// Installs the global fmt subscriber; later calls are no-ops.
pub fn init_tracing() {
    let _ = INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    });
}
