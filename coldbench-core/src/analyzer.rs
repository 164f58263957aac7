// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Statistical comparison of control and treatment latency samples.
//!
//! - Descriptive statistics with the sample (n-1) standard deviation
//! - Welch's unequal-variance t-test on the means
//! - Cohen's d with pooled standard deviation
//! - Two-tailed F-test on the variances
//!
//! Zero-variance inputs never divide by zero: the affected statistic is
//! reported as undefined instead.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

use crate::error::AnalysisError;

/// Default significance threshold.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Observations required per group before any test is computed.
pub const MIN_OBSERVATIONS: usize = 2;

/// Summary statistics of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptive {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n-1 denominator); 0 for a single value.
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl Descriptive {
    /// Returns None for an empty sample.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        // Summing a constant sample can leave rounding residue in the mean
        // and variance; a constant sample has exactly its value and zero.
        let (mean, variance) = if sorted[0] == sorted[count - 1] {
            (sorted[0], 0.0)
        } else {
            let mean = values.iter().sum::<f64>() / count as f64;
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            (mean, variance)
        };

        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        Some(Self {
            count,
            mean,
            std_dev: variance.sqrt(),
            variance,
            min: sorted[0],
            max: sorted[count - 1],
            median,
        })
    }
}

/// Welch's t-test result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelchTTest {
    /// Positive when the treatment mean is larger. Infinite when both
    /// samples are constant but their means differ.
    #[serde(with = "signed_float")]
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub significant: bool,
}

/// Effect size bucket for |d|.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
    /// Pooled standard deviation is zero while the means differ.
    Undefined,
}

impl EffectMagnitude {
    pub fn from_d(d: f64) -> Self {
        let abs_d = d.abs();
        if !abs_d.is_finite() {
            Self::Undefined
        } else if abs_d < 0.2 {
            Self::Negligible
        } else if abs_d < 0.5 {
            Self::Small
        } else if abs_d < 0.8 {
            Self::Medium
        } else {
            Self::Large
        }
    }
}

impl std::fmt::Display for EffectMagnitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Negligible => "negligible",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Undefined => "undefined",
        };
        write!(f, "{}", label)
    }
}

/// Cohen's d.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSize {
    /// None when undefined.
    pub cohens_d: Option<f64>,
    pub pooled_std_dev: f64,
    pub magnitude: EffectMagnitude,
}

/// F-test for equality of variances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VarianceTest {
    Computed {
        /// Larger variance over smaller variance.
        f_statistic: f64,
        df_numerator: f64,
        df_denominator: f64,
        p_value: f64,
        significant: bool,
    },
    Undefined {
        reason: String,
    },
}

/// Full comparison of one metric between control and treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonVerdict {
    pub metric: String,
    pub alpha: f64,
    pub control: Descriptive,
    pub treatment: Descriptive,
    /// treatment mean - control mean.
    pub overhead_mean: f64,
    /// Overhead relative to the control mean; None when the control mean is 0.
    pub overhead_pct: Option<f64>,
    pub t_test: WelchTTest,
    pub effect_size: EffectSize,
    pub variance_test: VarianceTest,
    /// Whether the means differ at `alpha`.
    pub significant: bool,
}

/// Stateless analyzer parameterised by the significance threshold.
#[derive(Debug, Clone, Copy)]
pub struct StatisticalAnalyzer {
    alpha: f64,
}

impl StatisticalAnalyzer {
    pub fn new(alpha: f64) -> Result<Self, AnalysisError> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(AnalysisError::InvalidSignificance { alpha });
        }
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Compare two latency samples for one metric.
    pub fn compare(
        &self,
        metric: impl Into<String>,
        control: &[f64],
        treatment: &[f64],
    ) -> Result<ComparisonVerdict, AnalysisError> {
        let control_stats = require_sample("control", control)?;
        let treatment_stats = require_sample("treatment", treatment)?;

        let t_test = self.welch_t_test(&control_stats, &treatment_stats)?;
        let effect_size = cohens_d(&control_stats, &treatment_stats);
        let variance_test = self.f_test(&control_stats, &treatment_stats)?;

        let overhead_mean = treatment_stats.mean - control_stats.mean;
        let overhead_pct = if control_stats.mean != 0.0 {
            Some(overhead_mean / control_stats.mean * 100.0)
        } else {
            None
        };

        Ok(ComparisonVerdict {
            metric: metric.into(),
            alpha: self.alpha,
            significant: t_test.significant,
            control: control_stats,
            treatment: treatment_stats,
            overhead_mean,
            overhead_pct,
            t_test,
            effect_size,
            variance_test,
        })
    }

    /// Welch's t-test, two-tailed.
    pub fn welch_t_test(
        &self,
        control: &Descriptive,
        treatment: &Descriptive,
    ) -> Result<WelchTTest, AnalysisError> {
        let n_c = control.count as f64;
        let n_t = treatment.count as f64;
        let se_c = control.variance / n_c;
        let se_t = treatment.variance / n_t;
        let standard_error = (se_c + se_t).sqrt();
        let diff = treatment.mean - control.mean;

        if standard_error == 0.0 {
            // Both samples constant: the means are either identical or
            // separated with certainty.
            let (t_statistic, p_value) = if diff == 0.0 {
                (0.0, 1.0)
            } else {
                (f64::INFINITY.copysign(diff), 0.0)
            };
            return Ok(WelchTTest {
                t_statistic,
                degrees_of_freedom: n_c + n_t - 2.0,
                p_value,
                significant: p_value < self.alpha,
            });
        }

        let t_statistic = diff / standard_error;
        let degrees_of_freedom = (se_c + se_t).powi(2)
            / (se_c.powi(2) / (n_c - 1.0) + se_t.powi(2) / (n_t - 1.0));

        let distribution = StudentsT::new(0.0, 1.0, degrees_of_freedom).map_err(|e| {
            AnalysisError::Distribution {
                reason: format!("t distribution with df={}: {}", degrees_of_freedom, e),
            }
        })?;
        let p_value = (2.0 * distribution.sf(t_statistic.abs())).min(1.0);

        Ok(WelchTTest {
            t_statistic,
            degrees_of_freedom,
            p_value,
            significant: p_value < self.alpha,
        })
    }

    /// Two-tailed F-test on the ratio of the larger to the smaller variance.
    pub fn f_test(
        &self,
        control: &Descriptive,
        treatment: &Descriptive,
    ) -> Result<VarianceTest, AnalysisError> {
        if control.variance == 0.0 || treatment.variance == 0.0 {
            return Ok(VarianceTest::Undefined {
                reason: "zero variance in at least one group".to_string(),
            });
        }

        let (larger, smaller) = if treatment.variance >= control.variance {
            (treatment, control)
        } else {
            (control, treatment)
        };
        let f_statistic = larger.variance / smaller.variance;
        let df_numerator = (larger.count - 1) as f64;
        let df_denominator = (smaller.count - 1) as f64;

        let distribution = FisherSnedecor::new(df_numerator, df_denominator).map_err(|e| {
            AnalysisError::Distribution {
                reason: format!(
                    "F distribution with df=({}, {}): {}",
                    df_numerator, df_denominator, e
                ),
            }
        })?;
        let p_value = (2.0 * distribution.sf(f_statistic)).min(1.0);

        Ok(VarianceTest::Computed {
            f_statistic,
            df_numerator,
            df_denominator,
            p_value,
            significant: p_value < self.alpha,
        })
    }
}

impl Default for StatisticalAnalyzer {
    fn default() -> Self {
        Self { alpha: DEFAULT_ALPHA }
    }
}

fn require_sample(group: &'static str, values: &[f64]) -> Result<Descriptive, AnalysisError> {
    match Descriptive::from_values(values) {
        Some(stats) if stats.count >= MIN_OBSERVATIONS => Ok(stats),
        _ => Err(AnalysisError::InsufficientData {
            group,
            observations: values.len(),
            required: MIN_OBSERVATIONS,
        }),
    }
}

/// Cohen's d = (mean_treatment - mean_control) / pooled_std_dev.
pub fn cohens_d(control: &Descriptive, treatment: &Descriptive) -> EffectSize {
    let n_c = control.count as f64;
    let n_t = treatment.count as f64;
    let pooled_std_dev = (((n_c - 1.0) * control.variance + (n_t - 1.0) * treatment.variance)
        / (n_c + n_t - 2.0))
        .sqrt();
    let diff = treatment.mean - control.mean;

    if pooled_std_dev == 0.0 {
        return if diff == 0.0 {
            EffectSize {
                cohens_d: Some(0.0),
                pooled_std_dev,
                magnitude: EffectMagnitude::Negligible,
            }
        } else {
            EffectSize {
                cohens_d: None,
                pooled_std_dev,
                magnitude: EffectMagnitude::Undefined,
            }
        };
    }

    let d = diff / pooled_std_dev;
    EffectSize {
        cohens_d: Some(d),
        pooled_std_dev,
        magnitude: EffectMagnitude::from_d(d),
    }
}

/// JSON has no infinity; non-finite values travel as strings.
mod signed_float {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            Repr::Number(*value).serialize(serializer)
        } else {
            Repr::Text(value.to_string()).serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}
