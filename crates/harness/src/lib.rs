mod faults;
mod network;
mod peer;

pub use faults::{FaultyStore, Faults};
pub use network::{TestNetwork, VIEW};
pub use peer::TestPeer;

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once. `RUST_LOG` overrides the
/// default `warn` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
