use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// Babble epoch: 2025-01-01T00:00:00Z
const EPOCH: u64 = 1_735_689_600_000;

// IDs are stored and sorted as TEXT (message history is `ORDER BY id`), so
// they are zero-padded to the full u64 decimal width. Without the padding,
// string order would diverge from creation order once the raw value gains
// a digit.
const ID_WIDTH: usize = 20;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);
static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock went backwards")
        .as_millis() as u64
}

fn format_id(id: u64) -> String {
    format!("{id:0width$}", width = ID_WIDTH)
}

/// Time-sortable string IDs. History ordering relies on IDs sorting in
/// creation order, so the sequence bits only matter within one millisecond.
pub fn generate() -> String {
    let mut timestamp = now_ms() - EPOCH;
    let last = LAST_TIMESTAMP.load(Ordering::SeqCst);

    if timestamp == last {
        let seq = SEQUENCE.fetch_add(1, Ordering::SeqCst) & 0xFFF;
        if seq == 0 {
            // Sequence overflow, wait for next millisecond
            while timestamp <= last {
                timestamp = now_ms() - EPOCH;
            }
        }
        LAST_TIMESTAMP.store(timestamp, Ordering::SeqCst);
        format_id((timestamp << 22) | seq)
    } else {
        LAST_TIMESTAMP.store(timestamp, Ordering::SeqCst);
        SEQUENCE.store(1, Ordering::SeqCst);
        format_id(timestamp << 22)
    }
}

pub fn timestamp_of(id: &str) -> Option<u64> {
    let num: u64 = id.parse().ok()?;
    Some((num >> 22) + EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_unique_ids() {
        let a = generate();
        let b = generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_timestamp_extraction() {
        let id = generate();
        let ts = timestamp_of(&id).unwrap();
        let now = now_ms();
        assert!(ts <= now && ts > now - 1000);
    }

    #[test]
    fn test_monotonically_increasing() {
        let ids: Vec<u64> = (0..100)
            .map(|_| generate().parse::<u64>().unwrap())
            .collect();
        for w in ids.windows(2) {
            assert!(w[0] < w[1], "IDs should be monotonically increasing");
        }
    }

    #[test]
    fn test_string_order_matches_generation_order() {
        let ids: Vec<String> = (0..100).map(|_| generate()).collect();
        assert!(ids.iter().all(|id| id.len() == ID_WIDTH));

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted, "text order must match creation order");
    }
}
