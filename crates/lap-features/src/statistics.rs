//! Channel Statistics
//!
//! Single-pass summary statistics for one telemetry channel. Every
//! accumulator carries an explicit policy for missing values instead of
//! silently skipping them.

use serde::{Deserialize, Serialize};

/// How an aggregate treats samples that lack the channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Compute over the values that are present
    #[default]
    IgnoreMissing,
    /// Any missing value makes every aggregate missing
    PropagateMissing,
}

/// Running statistics for a signal (Welford's algorithm)
///
/// Non-finite values count as missing. Aggregates over zero available values
/// are `None`.
#[derive(Debug, Clone)]
pub struct ChannelStats {
    policy: NullPolicy,
    count: usize,
    missing: usize,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl ChannelStats {
    /// Create an empty accumulator
    pub fn new(policy: NullPolicy) -> Self {
        Self {
            policy,
            count: 0,
            missing: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    /// Compute statistics over a fully populated slice
    pub fn compute(values: &[f64]) -> Self {
        let mut stats = Self::new(NullPolicy::IgnoreMissing);
        for &v in values {
            stats.push(Some(v));
        }
        stats
    }

    /// Compute statistics over optional values
    pub fn from_optional<I>(values: I, policy: NullPolicy) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut stats = Self::new(policy);
        for v in values {
            stats.push(v);
        }
        stats
    }

    /// Add one observation
    pub fn push(&mut self, value: Option<f64>) {
        match value {
            Some(v) if v.is_finite() => {
                self.count += 1;
                let delta = v - self.mean;
                self.mean += delta / self.count as f64;
                self.m2 += delta * (v - self.mean);
                self.min = self.min.min(v);
                self.max = self.max.max(v);
            }
            _ => self.missing += 1,
        }
    }

    fn available(&self) -> bool {
        self.count > 0 && !(self.policy == NullPolicy::PropagateMissing && self.missing > 0)
    }

    /// Number of values present
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of values missing
    pub fn missing(&self) -> usize {
        self.missing
    }

    pub fn mean(&self) -> Option<f64> {
        self.available().then_some(self.mean)
    }

    pub fn min(&self) -> Option<f64> {
        self.available().then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        self.available().then_some(self.max)
    }

    /// Variance with the n-1 denominator. Needs at least two values.
    pub fn sample_variance(&self) -> Option<f64> {
        if !self.available() || self.count < 2 {
            return None;
        }
        Some(self.m2 / (self.count - 1) as f64)
    }

    /// Standard deviation with the n-1 denominator
    pub fn sample_std_dev(&self) -> Option<f64> {
        self.sample_variance().map(f64::sqrt)
    }

    /// Variance with the n denominator
    pub fn population_variance(&self) -> Option<f64> {
        self.available().then(|| self.m2 / self.count as f64)
    }

    /// Standard deviation with the n denominator
    pub fn population_std_dev(&self) -> Option<f64> {
        self.population_variance().map(f64::sqrt)
    }
}
