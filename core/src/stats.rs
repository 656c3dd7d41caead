//! Windowed amplitude statistics
//!
//! Samples are folded one at a time while a sampling window is open; the
//! derived metrics are computed once when it closes.

/// Running min/max/sum/count over one sampling window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WindowedStat {
    min: f32,
    max: f32,
    sum: f32,
    count: u32,
    dropped: u32,
}

impl WindowedStat {
    /// Empty window
    pub const fn new() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            sum: 0.0,
            count: 0,
            dropped: 0,
        }
    }

    /// Fold one amplitude. Non-positive amplitudes (silence, I²S glitches)
    /// are counted as dropped.
    pub fn fold(&mut self, amplitude: f32) {
        if amplitude.is_nan() || amplitude <= 0.0 {
            self.dropped += 1;
            return;
        }
        if self.count == 0 {
            self.min = amplitude;
            self.max = amplitude;
        } else {
            self.min = self.min.min(amplitude);
            self.max = self.max.max(amplitude);
        }
        self.sum += amplitude;
        self.count += 1;
    }

    /// Forget everything folded so far
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Smallest folded amplitude, 0 when empty
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Largest folded amplitude, 0 when empty
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Samples folded
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Samples rejected
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Mean of the folded amplitudes, 0 when empty
    pub fn average(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f32
        }
    }

    /// Close the window
    pub fn summary(&self) -> AudioSummary {
        if self.count == 0 {
            return AudioSummary::default();
        }
        let avg = self.average();
        AudioSummary {
            rms_avg: avg,
            rms_min: self.min,
            rms_max: self.max,
            dbfs_avg: dbfs(avg),
            dbfs_min: dbfs(self.min),
            dbfs_max: dbfs(self.max),
        }
    }
}

/// Metrics derived from a closed window. All zero when nothing was sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioSummary {
    /// Mean RMS amplitude
    pub rms_avg: f32,
    /// Smallest RMS amplitude
    pub rms_min: f32,
    /// Largest RMS amplitude
    pub rms_max: f32,
    /// Mean, in dB relative to full scale
    pub dbfs_avg: f32,
    /// Minimum, in dB relative to full scale
    pub dbfs_min: f32,
    /// Maximum, in dB relative to full scale
    pub dbfs_max: f32,
}

/// `20 * log10(amplitude)`
fn dbfs(amplitude: f32) -> f32 {
    20.0 * libm::log10f(amplitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_example_window() {
        let mut stat = WindowedStat::new();
        for amplitude in [2.0, 5.0, 1.0, 5.0, 3.0] {
            stat.fold(amplitude);
        }
        assert_eq!(stat.min(), 1.0);
        assert_eq!(stat.max(), 5.0);
        assert_eq!(stat.count(), 5);
        assert!(close(stat.average(), 3.2));

        let summary = stat.summary();
        assert!(close(summary.rms_avg, 3.2));
        assert!(close(summary.dbfs_min, 0.0));
        assert!(close(summary.dbfs_max, 20.0 * 5.0f32.log10()));
        assert!(close(summary.dbfs_avg, 20.0 * 3.2f32.log10()));
    }

    #[test]
    fn test_empty_window_is_all_zero() {
        let mut stat = WindowedStat::new();
        stat.fold(0.0);
        stat.fold(-3.0);
        stat.fold(f32::NAN);
        assert_eq!(stat.count(), 0);
        assert_eq!(stat.dropped(), 3);

        let summary = stat.summary();
        assert_eq!(summary, AudioSummary::default());
        assert!(!summary.dbfs_avg.is_nan());
        assert!(summary.dbfs_min.is_finite());
    }

    #[test]
    fn test_reset_clears_window() {
        let mut stat = WindowedStat::new();
        stat.fold(4.0);
        stat.fold(0.0);
        stat.reset();
        assert_eq!(stat, WindowedStat::new());
    }
}
