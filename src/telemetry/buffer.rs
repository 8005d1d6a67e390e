use std::collections::VecDeque;

use crate::types::{ChartPoint, EpochMillis, HistogramBin, Sample};

/// Time-windowed store of raw samples, oldest first
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    retention_ms: i64,
}

impl SampleBuffer {
    pub fn new(retention_ms: i64) -> Self {
        Self {
            samples: VecDeque::new(),
            retention_ms,
        }
    }

    pub fn retention_ms(&self) -> i64 {
        self.retention_ms
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Append a sample and trim anything that fell out of the window.
    ///
    /// Timestamps are kept non-decreasing: a sample stamped before the newest
    /// retained one is recorded at the newest timestamp instead, so eviction
    /// can always cut a contiguous prefix.
    pub fn append(&mut self, value: f64, at_ms: EpochMillis) -> Sample {
        let at_ms = match self.samples.back() {
            Some(last) if last.at_ms > at_ms => last.at_ms,
            _ => at_ms,
        };
        let sample = Sample { at_ms, value };
        self.samples.push_back(sample);
        self.evict_older_than(at_ms - self.retention_ms);
        sample
    }

    /// Drop every sample stamped before `cutoff`. Returns how many were removed.
    pub fn evict_older_than(&mut self, cutoff: EpochMillis) -> usize {
        match self.samples.front() {
            Some(oldest) if oldest.at_ms < cutoff => {}
            _ => return 0,
        }
        let keep_from = self.samples.partition_point(|s| s.at_ms < cutoff);
        self.samples.drain(..keep_from);
        keep_from
    }

    /// Average the retained samples into `bucket_seconds`-wide buckets covering
    /// `[window_end - retention, window_end]`.
    ///
    /// Bucket `i` covers `[start + i*step, start + (i+1)*step)`, so a sample on
    /// a boundary lands in the later bucket.
    pub fn chart_points(&self, bucket_seconds: u64, window_end: EpochMillis) -> Vec<ChartPoint> {
        let step = i64::try_from(bucket_seconds)
            .unwrap_or(i64::MAX)
            .max(1)
            .saturating_mul(1000);
        let span = self.retention_ms.max(0);
        let start = window_end.saturating_sub(span);
        let bucket_count = usize::try_from(span / step).unwrap_or(0) + 1;

        let mut sums = vec![0.0f64; bucket_count];
        let mut counts = vec![0usize; bucket_count];

        for sample in self
            .samples
            .iter()
            .filter(|s| s.at_ms >= start && s.at_ms <= window_end)
        {
            let idx = ((sample.at_ms - start) / step) as usize;
            sums[idx] += sample.value;
            counts[idx] += 1;
        }

        (0..bucket_count)
            .map(|i| ChartPoint {
                t: start + i as i64 * step,
                avg: (counts[i] > 0).then(|| sums[i] / counts[i] as f64),
            })
            .collect()
    }

    /// Count retained samples into `bin_count` equal-width bins spanning the
    /// current min..max. All-equal input lands entirely in bin 0.
    pub fn histogram(&self, bin_count: usize) -> Vec<HistogramBin> {
        if self.samples.is_empty() {
            return Vec::new();
        }
        let bin_count = bin_count.max(1);

        let (min, max) = self
            .samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.value), hi.max(s.value))
            });

        let mut counts = vec![0usize; bin_count];
        if min == max {
            counts[0] = self.samples.len();
        } else {
            let span = max - min;
            for sample in &self.samples {
                let idx = (((sample.value - min) / span) * bin_count as f64).floor() as usize;
                counts[idx.min(bin_count - 1)] += 1;
            }
        }

        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin { i, count })
            .collect()
    }
}
