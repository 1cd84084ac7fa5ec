// Tracing setup shared by the `relay` and `kidpaint` binaries. `RUST_LOG`
// wins when set; otherwise the kidpaint crates log at info (debug with -v).

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init(verbose: bool) {
    let default_filter = if verbose {
        "kidpaint_relay=debug,kidpaint_canvas=debug"
    } else {
        "kidpaint_relay=info,kidpaint_canvas=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
