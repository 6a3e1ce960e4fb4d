//! Tick timing for the client simulation loops

use std::time::Duration;

/// Nominal period of both simulation loops (~60Hz)
pub const TICK_MILLIS: u64 = 16;

/// Convert a configured tick period into a timer duration.
///
/// A zero period would make `tokio::time::interval` panic, so it is raised to 1ms.
pub fn tick_duration(millis: u64) -> Duration {
    Duration::from_millis(millis.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_is_raised_to_one_millisecond() {
        assert_eq!(tick_duration(0), Duration::from_millis(1));
        assert_eq!(tick_duration(TICK_MILLIS), Duration::from_millis(16));
    }
}
