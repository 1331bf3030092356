//! Reliability metrics for predicted home-win probabilities

use serde::{Deserialize, Serialize};

const RELIABILITY_BINS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReliabilityBin {
    pub count: usize,
    pub sum_p: f64,
    pub sum_y: f64,
}

impl ReliabilityBin {
    /// Observed frequency minus mean prediction
    pub fn residual(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(self.sum_y / n - self.sum_p / n)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReliabilityMetrics {
    pub sample_count: usize,
    pub brier_sum: f64,
    pub residual_sum: f64,
    pub bins: Vec<ReliabilityBin>,
}

impl Default for ReliabilityMetrics {
    fn default() -> Self {
        Self {
            sample_count: 0,
            brier_sum: 0.0,
            residual_sum: 0.0,
            bins: vec![ReliabilityBin::default(); RELIABILITY_BINS],
        }
    }
}

impl ReliabilityMetrics {
    pub fn record(&mut self, p_pred: f64, home_won: bool) {
        let p = p_pred.clamp(0.0, 1.0);
        let y = if home_won { 1.0 } else { 0.0 };

        self.sample_count += 1;
        self.brier_sum += (p - y).powi(2);
        self.residual_sum += y - p;

        let idx = ((p * RELIABILITY_BINS as f64).floor() as usize).min(RELIABILITY_BINS - 1);
        if let Some(bin) = self.bins.get_mut(idx) {
            bin.count += 1;
            bin.sum_p += p;
            bin.sum_y += y;
        }
    }

    /// Mean of (outcome - prediction)
    pub fn mean_residual(&self) -> Option<f64> {
        if self.sample_count == 0 {
            None
        } else {
            Some(self.residual_sum / self.sample_count as f64)
        }
    }

    pub fn brier_score(&self) -> Option<f64> {
        if self.sample_count == 0 {
            None
        } else {
            Some(self.brier_sum / self.sample_count as f64)
        }
    }

    /// Expected calibration error over the reliability bins
    pub fn ece(&self) -> Option<f64> {
        if self.sample_count == 0 {
            return None;
        }
        let total = self.sample_count as f64;
        let ece = self
            .bins
            .iter()
            .filter_map(|bin| bin.residual().map(|r| (bin.count as f64 / total) * r.abs()))
            .sum();
        Some(ece)
    }
}
