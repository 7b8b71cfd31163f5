//! Client-side identifier generation for auto-ID collections

use std::sync::atomic::{AtomicI64, Ordering};

const NODE_BITS: i64 = 10;
const SEQUENCE_BITS: i64 = 12;
const NODE_MAX: i64 = (1 << NODE_BITS) - 1;
const SEQUENCE_MAX: i64 = (1 << SEQUENCE_BITS) - 1;

/// Snowflake-style generator producing strictly increasing 64-bit ids.
///
/// Layout: millisecond timestamp | node | sequence. The whole id is kept
/// in one atomic so concurrent callers always observe a larger value
/// than any previously handed out, even across a clock step backwards.
pub struct IdGenerator {
    node: i64,
    last: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            node: (rand::random::<u16>() as i64) & NODE_MAX,
            last: AtomicI64::new(0),
        }
    }

    /// Next unique id; monotonically increasing per generator.
    pub fn next_id(&self) -> i64 {
        let candidate = (now_millis() << (NODE_BITS + SEQUENCE_BITS)) | (self.node << SEQUENCE_BITS);
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = if candidate > prev { candidate } else { prev + 1 };
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis() & !(!0 << (63 - NODE_BITS - SEQUENCE_BITS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let gen = IdGenerator::new();
        let mut prev = gen.next_id();
        for _ in 0..10_000 {
            let id = gen.next_id();
            assert!(id > prev);
            prev = id;
        }
    }

    #[test]
    fn test_sequence_fits_in_layout() {
        assert!(SEQUENCE_MAX > 0);
        let gen = IdGenerator::new();
        assert!(gen.next_id() > 0);
    }
}
