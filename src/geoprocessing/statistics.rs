use serde::Serialize;

/// Summary of the samples of one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population variance.
    pub variance: f64,
    pub std_dev: f64,
    pub count: usize,
}

/// Running statistics over a stream of samples, non finite samples are ignored.
#[derive(Debug, Clone, Default)]
pub struct StatisticsAccumulator {
    count: usize,
    min: f64,
    max: f64,
    mean: f64,
    /// Sum of squared distances to the mean.
    m2: f64,
}

impl StatisticsAccumulator {
    pub fn push(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }
        if self.count == 0 {
            self.min = sample;
            self.max = sample;
        } else {
            self.min = self.min.min(sample);
            self.max = self.max.max(sample);
        }
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (sample - self.mean);
    }

    /// `None` when no finite sample was pushed.
    pub fn finish(&self) -> Option<BandStatistics> {
        if self.count == 0 {
            return None;
        }
        let variance = self.m2 / self.count as f64;
        Some(BandStatistics {
            min: self.min,
            max: self.max,
            mean: self.mean,
            variance,
            std_dev: variance.sqrt(),
            count: self.count,
        })
    }
}

impl Extend<f64> for StatisticsAccumulator {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, samples: I) {
        samples.into_iter().for_each(|sample| self.push(sample));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn population_statistics() {
        let mut accumulator = StatisticsAccumulator::default();
        accumulator.extend([2., 4., 4., 4., 5., 5., 7., 9.]);
        let statistics = accumulator.finish().unwrap();
        assert_eq!(statistics.min, 2.);
        assert_eq!(statistics.max, 9.);
        assert_relative_eq!(statistics.mean, 5.);
        assert_relative_eq!(statistics.variance, 4.);
        assert_relative_eq!(statistics.std_dev, 2.);
        assert_eq!(statistics.count, 8);
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let mut accumulator = StatisticsAccumulator::default();
        accumulator.extend([f64::NAN, f64::INFINITY]);
        assert!(accumulator.finish().is_none());
        accumulator.push(-3.);
        assert_eq!(accumulator.finish().unwrap().mean, -3.);
    }
}
