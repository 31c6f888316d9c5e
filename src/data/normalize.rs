use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc_inv;

use crate::error::{DataError, DataResult};

/// How raw column values are mapped onto a plotting axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationStyle {
    /// Values unchanged, axis fixed at [-1, 1].
    None,
    /// Axis spans the data.
    #[default]
    MinMax,
    /// Axis spans zero to the maximum.
    ZeroMax,
    /// Axis symmetric about zero, covering the largest magnitude.
    MaxAbs,
    /// Axis clipped to the central 99% (by rank).
    Trim1e2,
    /// Axis clipped to the central 99.9% (by rank).
    Trim1e3,
    /// Mean ± 3 population standard deviations.
    ThreeSigma,
    /// Base-10 logarithm of positive values.
    Log10,
    /// `v / (1 + |v|)`.
    Squash,
    /// Normalized rank in [0, 1].
    Rank,
    /// Rank mapped through the inverse normal CDF, scaled by 1/5.
    Gaussianize,
}

impl NormalizationStyle {
    pub const ALL: [NormalizationStyle; 11] = [
        NormalizationStyle::None,
        NormalizationStyle::MinMax,
        NormalizationStyle::ZeroMax,
        NormalizationStyle::MaxAbs,
        NormalizationStyle::Trim1e2,
        NormalizationStyle::Trim1e3,
        NormalizationStyle::ThreeSigma,
        NormalizationStyle::Log10,
        NormalizationStyle::Squash,
        NormalizationStyle::Rank,
        NormalizationStyle::Gaussianize,
    ];

    /// Menu label.
    pub fn name(self) -> &'static str {
        match self {
            NormalizationStyle::None => "none",
            NormalizationStyle::MinMax => "minmax",
            NormalizationStyle::ZeroMax => "zeromax",
            NormalizationStyle::MaxAbs => "maxabs",
            NormalizationStyle::Trim1e2 => "trim 1e-2",
            NormalizationStyle::Trim1e3 => "trim 1e-3",
            NormalizationStyle::ThreeSigma => "three sigma",
            NormalizationStyle::Log10 => "log_10",
            NormalizationStyle::Squash => "squash",
            NormalizationStyle::Rank => "rank",
            NormalizationStyle::Gaussianize => "gaussianize",
        }
    }

    /// Style by its position in [`NormalizationStyle::ALL`].
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Whether the transform rewrites values rather than only choosing bounds.
    pub fn rewrites_values(self) -> bool {
        matches!(
            self,
            NormalizationStyle::Log10
                | NormalizationStyle::Squash
                | NormalizationStyle::Rank
                | NormalizationStyle::Gaussianize
        )
    }
}

impl fmt::Display for NormalizationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NormalizationStyle {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect();
        let style = match key.as_str() {
            "none" => NormalizationStyle::None,
            "minmax" => NormalizationStyle::MinMax,
            "zeromax" => NormalizationStyle::ZeroMax,
            "maxabs" => NormalizationStyle::MaxAbs,
            "trim1e2" => NormalizationStyle::Trim1e2,
            "trim1e3" => NormalizationStyle::Trim1e3,
            "threesigma" => NormalizationStyle::ThreeSigma,
            "log10" => NormalizationStyle::Log10,
            "squash" | "atanh" => NormalizationStyle::Squash,
            "rank" => NormalizationStyle::Rank,
            "gaussianize" => NormalizationStyle::Gaussianize,
            _ => return Err(DataError::UnknownNormalization(s.to_string())),
        };
        Ok(style)
    }
}

/// Output of [`normalize`]: transformed copy of the input plus axis bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub values: Vec<f64>,
    pub world_min: f64,
    pub world_max: f64,
}

/// Apply `style` to `values`, ordered by `rank`.
///
/// `values` is never modified; the caller's raw buffer can be normalized
/// again with another style. `rank` must be the rank of `values`.
pub fn normalize(values: &[f64], rank: &[usize], style: NormalizationStyle) -> Normalized {
    debug_assert_eq!(values.len(), rank.len());
    let n = values.len();
    let mut out = values.to_vec();
    if n == 0 {
        return Normalized {
            values: out,
            world_min: -1.0,
            world_max: 1.0,
        };
    }

    let tmin = values[rank[0]];
    let tmax = values[rank[n - 1]];

    let (world_min, world_max) = match style {
        NormalizationStyle::None => (-1.0, 1.0),
        NormalizationStyle::MinMax => (tmin, tmax),
        NormalizationStyle::ZeroMax => (0.0, tmax),
        NormalizationStyle::MaxAbs => {
            let m = tmin.abs().max(tmax.abs());
            if m != 0.0 {
                (-m, m)
            } else {
                (tmin, tmax)
            }
        }
        NormalizationStyle::Trim1e2 => trimmed_bounds(values, rank, 1e-2),
        NormalizationStyle::Trim1e3 => trimmed_bounds(values, rank, 1e-3),
        NormalizationStyle::ThreeSigma => {
            let mu = values.iter().sum::<f64>() / n as f64;
            let sigma = (values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n as f64).sqrt();
            if mu.is_finite() && sigma != 0.0 {
                (mu - 3.0 * sigma, mu + 3.0 * sigma)
            } else {
                (tmin, tmax)
            }
        }
        NormalizationStyle::Log10 => {
            if tmin <= 0.0 {
                warn!("attempted to take logarithms of nonpositive numbers; those values were left unchanged");
            }
            let pmin = values
                .iter()
                .copied()
                .filter(|&v| v > 0.0)
                .fold(f64::INFINITY, f64::min);
            for v in out.iter_mut().filter(|v| **v > 0.0) {
                *v = v.log10();
            }
            if pmin.is_finite() {
                (pmin.log10(), tmax.log10())
            } else {
                (tmin, tmax)
            }
        }
        NormalizationStyle::Squash => {
            for v in out.iter_mut() {
                *v /= 1.0 + v.abs();
            }
            (out[rank[0]], out[rank[n - 1]])
        }
        NormalizationStyle::Rank => {
            let denom = (n as f64 - 1.0).max(1.0);
            for (i, &row) in rank.iter().enumerate() {
                out[row] = i as f64 / denom;
            }
            (0.0, 1.0)
        }
        NormalizationStyle::Gaussianize => {
            for (i, &row) in rank.iter().enumerate() {
                let p = (i as f64 + 1.0) / (n as f64 + 2.0);
                out[row] = 0.2 * inverse_normal_cdf(p);
            }
            (-1.0, 1.0)
        }
    };

    Normalized {
        values: out,
        world_min,
        world_max,
    }
}

/// Like [`normalize`], with the style given by name.
pub fn normalize_named(values: &[f64], rank: &[usize], style: &str) -> DataResult<Normalized> {
    let style: NormalizationStyle = style.parse()?;
    Ok(normalize(values, rank, style))
}

fn trimmed_bounds(values: &[f64], rank: &[usize], trim: f64) -> (f64, f64) {
    let n = values.len();
    let lo = (((0.5 * trim) * n as f64) as usize).min(n - 1);
    let hi = (((1.0 - 0.5 * trim) * n as f64) as usize).min(n - 1);
    (values[rank[lo]], values[rank[hi]])
}

/// Standard normal quantile function.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}
