//! Per-frame counters and periodic stats reporting.

use std::time::{Duration, Instant};

use tracing::info;

/// What one frame of the render loop did.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    pub visible: usize,
    pub in_slot_hits: usize,
    pub subslot_hits: usize,
    pub misses: usize,
    pub drained: usize,
    pub draw_calls: usize,
    pub frame_ms: f32,
}

/// Aggregates frame stats and logs one summary line per interval.
pub struct StatsAggregator {
    interval: Duration,
    window_start: Instant,
    frames: u32,
    sum: FrameStats,
    max_frame_ms: f32,
}

impl StatsAggregator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: Instant::now(),
            frames: 0,
            sum: FrameStats::default(),
            max_frame_ms: 0.0,
        }
    }

    /// Fold in one frame; emits and resets once the interval has elapsed.
    pub fn record(&mut self, stats: &FrameStats) {
        self.frames += 1;
        self.sum.visible += stats.visible;
        self.sum.in_slot_hits += stats.in_slot_hits;
        self.sum.subslot_hits += stats.subslot_hits;
        self.sum.misses += stats.misses;
        self.sum.drained += stats.drained;
        self.sum.draw_calls += stats.draw_calls;
        self.sum.frame_ms += stats.frame_ms;
        self.max_frame_ms = self.max_frame_ms.max(stats.frame_ms);

        if self.window_start.elapsed() >= self.interval {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let frames = self.frames.max(1);
        let avg_ms = self.sum.frame_ms / frames as f32;
        let fps = if avg_ms > 0.0 { 1000.0 / avg_ms } else { 0.0 };
        info!(
            frames = self.frames,
            visible = self.sum.visible / frames as usize,
            in_slot_hits = self.sum.in_slot_hits,
            subslot_hits = self.sum.subslot_hits,
            misses = self.sum.misses,
            draw_calls = self.sum.draw_calls,
            "{fps:.1} fps, avg {avg_ms:.2} ms, max {:.2} ms",
            self.max_frame_ms
        );
        self.frames = 0;
        self.sum = FrameStats::default();
        self.max_frame_ms = 0.0;
        self.window_start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_until_flush() {
        let mut agg = StatsAggregator::new(Duration::from_secs(3600));
        for _ in 0..10 {
            agg.record(&FrameStats {
                visible: 5,
                misses: 2,
                frame_ms: 4.0,
                ..Default::default()
            });
        }
        assert_eq!(agg.frames, 10);
        assert_eq!(agg.sum.misses, 20);
        assert!((agg.sum.frame_ms - 40.0).abs() < 1e-3);
    }

    #[test]
    fn flush_resets_the_window() {
        let mut agg = StatsAggregator::new(Duration::ZERO);
        agg.record(&FrameStats::default());
        // interval of zero flushes on every record
        assert_eq!(agg.frames, 0);
    }
}
