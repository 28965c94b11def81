use basalt_bus::{DomainOptions, SLOT_DATA_OFFSET};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

// ─── Statistics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p99: u64,
    pub p999: u64,
    pub count: usize,
}

pub fn compute_stats(samples: &mut [u64]) -> Stats {
    assert!(!samples.is_empty(), "cannot compute stats on empty samples");
    samples.sort_unstable();

    let count = samples.len();
    let sum: u64 = samples.iter().sum();

    Stats {
        min: samples[0],
        max: samples[count - 1],
        mean: sum as f64 / count as f64,
        p50: percentile_sorted(samples, 50.0),
        p99: percentile_sorted(samples, 99.0),
        p999: percentile_sorted(samples, 99.9),
        count,
    }
}

fn percentile_sorted(sorted: &[u64], pct: f64) -> u64 {
    let len = sorted.len();
    if len == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0 * len as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(len - 1)]
}

// ─── Bench Scratch Space ────────────────────────────────────────────────────

/// A unique scratch prefix directory for one bench's backing files.
pub fn temp_prefix(tag: &str) -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("basalt_perf_{tag}_{ts}"));
    std::fs::create_dir_all(&dir).expect("create bench scratch dir");
    dir
}

/// Domain options pointing at a fresh scratch prefix, sized so the large
/// payload benches fit.
pub fn bench_options(tag: &str) -> (DomainOptions, PathBuf) {
    let dir = temp_prefix(tag);
    let opts = DomainOptions {
        prefix: dir.clone(),
        domain_bytes: 1 << 20,
        slot_bytes: (SLOT_DATA_OFFSET + (1 << 20)) as u64,
    };
    (opts, dir)
}
