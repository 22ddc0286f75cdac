//! Metrics Collector. Bounded ring buffers per named stream plus cache
//! hit/miss counters and best-effort memory sampling. `parking_lot` backs
//! the hot synchronous recording path, the one piece of in-process state
//! that needs mutual exclusion outside the async world the rest of the
//! crate lives in.

use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const RING_BUFFER_CAPACITY: usize = 1000;

struct RingBuffer {
    values: Mutex<VecDeque<f64>>,
}

impl RingBuffer {
    fn new() -> Self {
        Self {
            values: Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY)),
        }
    }

    fn record(&self, value: f64) {
        let mut values = self.values.lock();
        if values.len() == RING_BUFFER_CAPACITY {
            values.pop_front();
        }
        values.push_back(value);
    }

    fn snapshot(&self) -> StreamSnapshot {
        let values = self.values.lock();
        if values.is_empty() {
            return StreamSnapshot::default();
        }
        let count = values.len();
        let sum: f64 = values.iter().sum();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        StreamSnapshot {
            count,
            avg: sum / count as f64,
            min,
            max,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub fast_generation_ms: StreamSnapshot,
    pub accurate_generation_ms: StreamSnapshot,
    pub pipeline_ms: StreamSnapshot,
    /// Per-step time within `Orchestrator::retrieve` (embedding generation,
    /// semantic search, related-act traversal, context rendering).
    pub embedding_ms: StreamSnapshot,
    pub semantic_search_ms: StreamSnapshot,
    pub related_acts_ms: StreamSnapshot,
    pub render_ms: StreamSnapshot,
    pub cache_hit_rate: f64,
    pub fast_success: u64,
    pub fast_failure: u64,
    pub accurate_success: u64,
    pub accurate_failure: u64,
    pub memory: MemorySnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub rss_bytes: Option<u64>,
    pub percent_of_total: Option<f64>,
}

/// Named streams the orchestrator records against. Kept as a closed enum
/// rather than a free-form string key so call sites can't typo a stream
/// name into existence. `EmbeddingMs`/`SemanticSearchMs`/`RelatedActsMs`/
/// `RenderMs` are the per-step time streams for `Orchestrator::retrieve`'s
/// four sub-steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    FastGenerationMs,
    AccurateGenerationMs,
    PipelineMs,
    EmbeddingMs,
    SemanticSearchMs,
    RelatedActsMs,
    RenderMs,
}

/// Which pipeline tier a success/failure counter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Fast,
    Accurate,
}

pub struct Metrics {
    fast_generation_ms: RingBuffer,
    accurate_generation_ms: RingBuffer,
    pipeline_ms: RingBuffer,
    embedding_ms: RingBuffer,
    semantic_search_ms: RingBuffer,
    related_acts_ms: RingBuffer,
    render_ms: RingBuffer,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    fast_success: AtomicU64,
    fast_failure: AtomicU64,
    accurate_success: AtomicU64,
    accurate_failure: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            fast_generation_ms: RingBuffer::new(),
            accurate_generation_ms: RingBuffer::new(),
            pipeline_ms: RingBuffer::new(),
            embedding_ms: RingBuffer::new(),
            semantic_search_ms: RingBuffer::new(),
            related_acts_ms: RingBuffer::new(),
            render_ms: RingBuffer::new(),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            fast_success: AtomicU64::new(0),
            fast_failure: AtomicU64::new(0),
            accurate_success: AtomicU64::new(0),
            accurate_failure: AtomicU64::new(0),
        }
    }

    pub fn record_outcome(&self, tier: Tier, succeeded: bool) {
        let counter = match (tier, succeeded) {
            (Tier::Fast, true) => &self.fast_success,
            (Tier::Fast, false) => &self.fast_failure,
            (Tier::Accurate, true) => &self.accurate_success,
            (Tier::Accurate, false) => &self.accurate_failure,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, stream: Stream, value_ms: u64) {
        let buffer = match stream {
            Stream::FastGenerationMs => &self.fast_generation_ms,
            Stream::AccurateGenerationMs => &self.accurate_generation_ms,
            Stream::PipelineMs => &self.pipeline_ms,
            Stream::EmbeddingMs => &self.embedding_ms,
            Stream::SemanticSearchMs => &self.semantic_search_ms,
            Stream::RelatedActsMs => &self.related_acts_ms,
            Stream::RenderMs => &self.render_ms,
        };
        buffer.record(value_ms as f64);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let cache_hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        MetricsSnapshot {
            fast_generation_ms: self.fast_generation_ms.snapshot(),
            accurate_generation_ms: self.accurate_generation_ms.snapshot(),
            pipeline_ms: self.pipeline_ms.snapshot(),
            embedding_ms: self.embedding_ms.snapshot(),
            semantic_search_ms: self.semantic_search_ms.snapshot(),
            related_acts_ms: self.related_acts_ms.snapshot(),
            render_ms: self.render_ms.snapshot(),
            cache_hit_rate,
            fast_success: self.fast_success.load(Ordering::Relaxed),
            fast_failure: self.fast_failure.load(Ordering::Relaxed),
            accurate_success: self.accurate_success.load(Ordering::Relaxed),
            accurate_failure: self.accurate_failure.load(Ordering::Relaxed),
            memory: sample_memory(),
        }
    }

    /// Logs the current snapshot at `info` level; intended to be driven by
    /// a periodic task every `metrics_log_interval_secs` (default 300).
    pub fn log_snapshot(&self) {
        let snapshot = self.snapshot();
        info!(?snapshot, "metrics snapshot");
    }
}

/// Best-effort RSS plus percent-of-total, read directly from
/// `/proc/self/status` and `/proc/meminfo`. No `psutil`-equivalent crate
/// for a diagnostic-only feature; absolute numbers are always attempted,
/// percentage only when total memory is determinable.
fn sample_memory() -> MemorySnapshot {
    let rss_bytes = read_proc_kb("/proc/self/status", "VmRSS:").map(|kb| kb * 1024);
    let total_kb = read_proc_kb("/proc/meminfo", "MemTotal:");

    let percent_of_total = match (rss_bytes, total_kb) {
        (Some(rss), Some(total_kb)) if total_kb > 0 => {
            Some((rss as f64 / 1024.0) / total_kb as f64 * 100.0)
        }
        _ => None,
    };

    if rss_bytes.is_none() {
        warn!("could not sample process RSS from /proc/self/status");
    }

    MemorySnapshot {
        rss_bytes,
        percent_of_total,
    }
}

fn read_proc_kb(path: &str, field: &str) -> Option<u64> {
    let contents = fs::read_to_string(path).ok()?;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix(field) {
            let value = rest.trim().split_whitespace().next()?;
            return value.parse().ok();
        }
    }
    None
}
