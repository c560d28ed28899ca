use std::sync::Mutex;

use mural_types::Timestamp;

/// Internal mutable state of the store clock.
struct ClockState {
    /// Last-issued physical millisecond timestamp.
    ms: u64,
    /// Logical counter for mutations within the same millisecond.
    seq: u32,
}

/// Strictly monotonic timestamp source.
///
/// Combines wall-clock milliseconds with a logical counter so that every
/// call returns a value strictly greater than all previous ones, even
/// when the wall clock stalls or steps backwards. Safe for concurrent
/// use via an internal [`Mutex`].
pub struct StoreClock {
    state: Mutex<ClockState>,
}

impl StoreClock {
    /// Create a fresh clock.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClockState { ms: 0, seq: 0 }),
        }
    }

    /// Issue the next timestamp, strictly greater than any issued before.
    pub fn now(&self) -> Timestamp {
        let wall = Timestamp::wall_now().ms;
        let mut state = self.state.lock().expect("clock mutex poisoned");

        let ms = wall.max(state.ms);
        let seq = if ms > state.ms { 0 } else { state.seq + 1 };

        state.ms = ms;
        state.seq = seq;

        Timestamp::new(ms, seq)
    }
}

impl Default for StoreClock {
    fn default() -> Self {
        Self::new()
    }
}
