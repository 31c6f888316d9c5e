use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::normalize::{normalize, NormalizationStyle};
use super::rank::compute_rank;
use super::store::ColumnStore;
use crate::error::DataResult;

/// Default histogram resolution; counts are scaled relative to it.
pub const NBINS_DEFAULT: usize = 128;

// ---------------------------------------------------------------------------
// Plot description
// ---------------------------------------------------------------------------

/// Optional change of coordinates applied after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform2d {
    #[default]
    None,
    /// x' = (x+y)/√2, y' = (x−y)/√2
    SumVsDifference,
    /// x' = atan2(x, y), y' = hypot(x, y)
    Polar,
}

impl Transform2d {
    pub const ALL: [Transform2d; 3] = [Transform2d::None, Transform2d::SumVsDifference, Transform2d::Polar];
}

impl fmt::Display for Transform2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform2d::None => write!(f, "none"),
            Transform2d::SumVsDifference => write!(f, "sum vs. difference"),
            Transform2d::Polar => write!(f, "polar"),
        }
    }
}

/// One axis of a plot: which column and how to normalize it.
/// A column index equal to the sentinel index means "nothing".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub column: usize,
    pub style: NormalizationStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpec {
    pub x: AxisSpec,
    pub y: AxisSpec,
    pub z: Option<AxisSpec>,
    pub transform: Transform2d,
    pub nbins: usize,
}

/// Normalized histogram of one axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<f64>,
    pub counts_selected: Vec<f64>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        if self.counts.is_empty() {
            0.0
        } else {
            (self.max - self.min) / self.counts.len() as f64
        }
    }
}

/// Everything a plot needs to draw one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotBuffers {
    pub labels: [String; 3],
    /// Plotting coordinates, one `[x, y, z]` per point.
    pub vertices: Vec<[f64; 3]>,
    /// Extent of the normalized (and transformed) values per axis.
    pub amin: [f64; 3],
    pub amax: [f64; 3],
    /// Suggested visible range per axis.
    pub world_min: [f64; 3],
    pub world_max: [f64; 3],
    pub histograms: [Histogram; 2],
}

impl PlotBuffers {
    pub fn xy(&self) -> Vec<[f64; 2]> {
        self.vertices.iter().map(|v| [v[0], v[1]]).collect()
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

struct Axis {
    label: String,
    values: Vec<f64>,
    world: (f64, f64),
    extent: (f64, f64),
}

/// Rank, normalize and bin the columns a plot shows.
///
/// Normalization always starts from a fresh copy of the raw values, so the
/// store's buffers are never rewritten; only rank caches are filled in.
pub fn extract_plot(store: &mut ColumnStore, selection: &[u32], spec: &PlotSpec) -> DataResult<PlotBuffers> {
    let n = store.point_count();
    let x = extract_axis(store, spec.x)?;
    let y = extract_axis(store, spec.y)?;
    let z = match spec.z {
        Some(axis) if axis.column != store.sentinel_index() => Some(extract_axis(store, axis)?),
        _ => None,
    };

    let mut xs = x.values;
    let mut ys = y.values;
    let mut amin = [x.extent.0, y.extent.0, -1.0];
    let mut amax = [x.extent.1, y.extent.1, 1.0];
    let mut world_min = [x.world.0, y.world.0, -1.0];
    let mut world_max = [x.world.1, y.world.1, 1.0];
    if let Some(z) = &z {
        amin[2] = z.extent.0;
        amax[2] = z.extent.1;
        world_min[2] = z.world.0;
        world_max[2] = z.world.1;
    }

    if spec.transform != Transform2d::None {
        transform_2d(&mut xs, &mut ys, spec.transform);
        let (x0, x1) = extent(&xs);
        let (y0, y1) = extent(&ys);
        amin[0] = x0;
        amax[0] = x1;
        amin[1] = y0;
        amax[1] = y1;
        world_min[..2].copy_from_slice(&amin[..2]);
        world_max[..2].copy_from_slice(&amax[..2]);
    }

    let nbins = spec.nbins.max(1);
    let histograms = [
        compute_histogram(&xs, selection, nbins, amin[0], amax[0]),
        compute_histogram(&ys, selection, nbins, amin[1], amax[1]),
    ];

    let vertices = match &z {
        Some(z) => (0..n).map(|i| [xs[i], ys[i], z.values[i]]).collect(),
        None => (0..n).map(|i| [xs[i], ys[i], 0.0]).collect(),
    };
    debug!(
        "extracted {} vs {}: x in [{}, {}], y in [{}, {}]",
        x.label, y.label, amin[0], amax[0], amin[1], amax[1]
    );

    Ok(PlotBuffers {
        labels: [x.label, y.label, z.map(|z| z.label).unwrap_or_default()],
        vertices,
        amin,
        amax,
        world_min,
        world_max,
        histograms,
    })
}

fn extract_axis(store: &mut ColumnStore, axis: AxisSpec) -> DataResult<Axis> {
    let n = store.point_count();
    let (label, raw, rank): (String, Vec<f64>, Arc<[usize]>) = if axis.column == store.sentinel_index() {
        let label = store.axis_label(axis.column).to_string();
        (label, vec![0.0; n], (0..n).collect())
    } else {
        let column = store.column_mut(axis.column)?;
        let rank = compute_rank(column);
        (column.label.clone(), column.values().to_vec(), rank)
    };

    let normalized = normalize(&raw, &rank, axis.style);
    // Rewritten values (log10 of a column with nonpositive entries) need not
    // keep the raw rank order.
    let span = match (rank.first(), rank.last()) {
        _ if axis.style.rewrites_values() => extent(&normalized.values),
        (Some(&lo), Some(&hi)) => (normalized.values[lo], normalized.values[hi]),
        _ => (-1.0, 1.0),
    };
    Ok(Axis {
        label,
        values: normalized.values,
        world: (normalized.world_min, normalized.world_max),
        extent: span,
    })
}

/// Apply a 2D transform in place.
pub fn transform_2d(xs: &mut [f64], ys: &mut [f64], transform: Transform2d) {
    match transform {
        Transform2d::None => {}
        Transform2d::SumVsDifference => {
            let c = std::f64::consts::FRAC_1_SQRT_2;
            for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
                let (a, b) = (*x, *y);
                *x = c * (a + b);
                *y = c * (a - b);
            }
        }
        Transform2d::Polar => {
            for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
                let (a, b) = (*x, *y);
                *x = a.atan2(b);
                *y = a.hypot(b);
            }
        }
    }
}

/// Bin `values` between `min` and `max`, for all points and for selected
/// points. Both count vectors are scaled by `(5 * nbins / 128) / npoints`.
pub fn compute_histogram(values: &[f64], selection: &[u32], nbins: usize, min: f64, max: f64) -> Histogram {
    let nbins = nbins.max(1);
    let mut counts = vec![0.0; nbins];
    let mut counts_selected = vec![0.0; nbins];
    let range = max - min;
    for (i, &v) in values.iter().enumerate() {
        let bin = if range > 0.0 && range.is_finite() {
            ((nbins as f64 * ((v - min) / range)) as isize).clamp(0, nbins as isize - 1) as usize
        } else {
            0
        };
        counts[bin] += 1.0;
        if selection.get(i).is_some_and(|&s| s > 0) {
            counts_selected[bin] += 1.0;
        }
    }
    if !values.is_empty() {
        let scale = (5.0 * nbins as f64 / NBINS_DEFAULT as f64) / values.len() as f64;
        for c in counts.iter_mut().chain(counts_selected.iter_mut()) {
            *c *= scale;
        }
    }
    Histogram {
        min,
        max,
        counts,
        counts_selected,
    }
}

fn extent(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (-1.0, 1.0);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}
