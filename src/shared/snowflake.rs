//! Snowflake ID Generator
//!
//! Twitter-style unique ID generation for users, conversations and messages.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::domain::{Snowflake, SNOWFLAKE_EPOCH};

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

/// Snowflake ID generator
///
/// Timestamp and sequence are advanced under one lock so two callers in the
/// same millisecond never observe the same sequence number.
pub struct SnowflakeGenerator {
    machine_id: u64,
    state: Mutex<GeneratorState>,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator (machine id is truncated to 10 bits)
    pub fn new(machine_id: u16) -> Self {
        Self {
            machine_id: (machine_id as u64) & 0x3FF,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Generate a new snowflake ID
    pub fn generate(&self) -> Snowflake {
        let mut state = self.state.lock();
        let mut timestamp = current_timestamp().max(state.last_timestamp);

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & 0xFFF;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond; borrow the next one
                timestamp += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = timestamp;

        let id = ((timestamp - SNOWFLAKE_EPOCH) << 22) | (self.machine_id << 12) | state.sequence;
        Snowflake::new(id as i64)
    }
}

/// Current timestamp in milliseconds
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(SNOWFLAKE_EPOCH)
}
