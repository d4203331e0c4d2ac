//! Monotonic staleness ticks.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Microseconds since the first call in this process, plus one.
///
/// Never decreases and never returns 0, which is reserved for "stale".
pub fn ticks() -> u64 {
    let epoch = *EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_micros() as u64 + 1
}
