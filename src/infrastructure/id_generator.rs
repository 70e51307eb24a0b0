// Document ID generation - Snowflake-like 64-bit ids
// 64-bit ID format: [timestamp:42][node_id:10][sequence:12]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use crate::core::Timestamp;

const SEQUENCE_BITS: u64 = 12;
const NODE_BITS: u64 = 10;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

/// Allows 1024 nodes and 4096 ids per millisecond per node
#[derive(Debug)]
pub struct IdGenerator {
    node_id: u16,
    state: Mutex<GeneratorState>,
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

impl IdGenerator {
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: node_id & ((1 << NODE_BITS) - 1) as u16,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Next unique id. Strictly increasing for a single generator.
    pub fn next_id(&self) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut now = current_millis();

        // Never go backwards, even if the wall clock does
        if now < state.last_timestamp {
            now = state.last_timestamp;
        }

        if now == state.last_timestamp {
            state.sequence += 1;
            if state.sequence > MAX_SEQUENCE {
                // Sequence exhausted: borrow the next millisecond
                now += 1;
                state.sequence = 0;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = now;

        let id = ((now & 0x3FF_FFFF_FFFF) << (NODE_BITS + SEQUENCE_BITS))
            | ((self.node_id as u64) << SEQUENCE_BITS)
            | (state.sequence & MAX_SEQUENCE);

        id as i64
    }

    pub fn extract_node_id(id: i64) -> u16 {
        (((id as u64) >> SEQUENCE_BITS) & ((1 << NODE_BITS) - 1)) as u16
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }
}

/// Creation-time source whose readings are strictly increasing, so that
/// newest-first scans have no ties.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Timestamp {
        let wall = Timestamp::now().value();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(current + 1);
            match self
                .last
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Timestamp(next),
                Err(observed) => current = observed,
            }
        }
    }

    /// Fast-forward past readings already persisted, e.g. after a restart
    pub fn observe(&self, ts: Timestamp) {
        self.last.fetch_max(ts.value(), Ordering::AcqRel);
    }
}

fn current_millis() -> u64 {
    Timestamp::now().value().max(0) as u64
}
