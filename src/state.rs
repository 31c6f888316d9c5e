use std::path::Path;

use anyhow::{Context, Result};

use crate::color::BrushPalette;
use crate::data::extract::{AxisSpec, PlotBuffers, PlotSpec, Transform2d, NBINS_DEFAULT};
use crate::data::manager::{DataFileManager, LoadMode};
use crate::data::normalize::NormalizationStyle;
use crate::data::selection::NBRUSHES;

/// Columns generated when there is nothing to show.
pub const DEFAULT_NVARS: usize = 10;

// ---------------------------------------------------------------------------
// Per-plot settings
// ---------------------------------------------------------------------------

/// What one cell of the scatterplot grid shows.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotConfig {
    pub x: usize,
    pub y: usize,
    pub x_style: NormalizationStyle,
    pub y_style: NormalizationStyle,
    pub transform: Transform2d,
    pub show_histograms: bool,
}

impl PlotConfig {
    fn spec(&self) -> PlotSpec {
        PlotSpec {
            x: AxisSpec {
                column: self.x,
                style: self.x_style,
            },
            y: AxisSpec {
                column: self.y,
                style: self.y_style,
            },
            z: None,
            transform: self.transform,
            nbins: NBINS_DEFAULT,
        }
    }
}

/// A box selection in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drag {
    pub plot: usize,
    pub start: [f64; 2],
    pub end: [f64; 2],
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Live dataset and selection.
    pub manager: DataFileManager,

    pub rows: usize,
    pub cols: usize,
    pub plots: Vec<PlotConfig>,

    /// Extracted buffers per plot; `None` means "re-extract before drawing".
    buffers: Vec<Option<PlotBuffers>>,

    pub brush: usize,
    pub add_to_selection: bool,
    pub drag: Option<Drag>,
    pub palette: BrushPalette,

    /// Columns ticked for deletion in the side panel.
    pub marked_columns: Vec<bool>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(manager: DataFileManager, rows: usize, cols: usize) -> Self {
        let mut state = Self {
            manager,
            rows: rows.max(1),
            cols: cols.max(1),
            plots: Vec::new(),
            buffers: Vec::new(),
            brush: 0,
            add_to_selection: false,
            drag: None,
            palette: BrushPalette::new(NBRUSHES),
            marked_columns: Vec::new(),
            status_message: None,
        };
        if state.manager.is_empty() {
            state.manager.create_default_data(DEFAULT_NVARS);
        }
        state.reset_plots();
        state
    }

    /// Lay out plots so consecutive cells show consecutive column pairs.
    pub fn reset_plots(&mut self) {
        let nvars = self.manager.variable_count().max(1);
        let n = self.rows * self.cols;
        self.plots = (0..n)
            .map(|i| PlotConfig {
                x: (2 * i) % nvars,
                y: (2 * i + 1) % nvars,
                x_style: NormalizationStyle::default(),
                y_style: NormalizationStyle::default(),
                transform: Transform2d::None,
                show_histograms: false,
            })
            .collect();
        self.marked_columns = vec![false; self.manager.variable_count()];
        self.drag = None;
        self.invalidate_all();
    }

    pub fn invalidate(&mut self, plot: usize) {
        if let Some(slot) = self.buffers.get_mut(plot) {
            *slot = None;
        }
    }

    pub fn invalidate_all(&mut self) {
        self.buffers = vec![None; self.plots.len()];
    }

    /// Buffers for `plot`, extracting them first if needed.
    pub fn buffers(&mut self, plot: usize) -> Option<&PlotBuffers> {
        let spec = self.plots.get(plot)?.spec();
        if self.buffers.get(plot)?.is_none() {
            match self.manager.extract_plot(&spec) {
                Ok(buffers) => self.buffers[plot] = Some(buffers),
                Err(e) => {
                    log::error!("couldn't extract plot {plot}: {e}");
                    self.status_message = Some(format!("Error: {e}"));
                    return None;
                }
            }
        }
        self.buffers.get(plot)?.as_ref()
    }

    /// Buffers already extracted for `plot`.
    pub fn cached_buffers(&self, plot: usize) -> Option<&PlotBuffers> {
        self.buffers.get(plot)?.as_ref()
    }

    // -- file operations ------------------------------------------------------

    pub fn open(&mut self, path: &Path, mode: LoadMode) -> Result<()> {
        let summary = self
            .manager
            .load_data_file(path, mode)
            .with_context(|| format!("loading {}", path.display()))?;
        if !summary.removed_columns.is_empty() {
            self.status_message = Some(format!(
                "Removed trivial columns: {}",
                summary.removed_columns.join(", ")
            ));
        } else {
            self.status_message = None;
        }
        self.reset_plots();
        Ok(())
    }

    pub fn save(&mut self, path: &Path, selected_only: bool) -> Result<()> {
        let mut options = self.manager.write_options.clone();
        options.selected_only = selected_only;
        let rows = self
            .manager
            .save_with(path, &options)
            .with_context(|| format!("saving {}", path.display()))?;
        self.status_message = Some(format!("Wrote {rows} rows to {}", path.display()));
        Ok(())
    }

    // -- dataset edits --------------------------------------------------------

    pub fn delete_marked_columns(&mut self) -> Result<()> {
        let indices: Vec<usize> = self
            .marked_columns
            .iter()
            .enumerate()
            .filter(|(_, &m)| m)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return Ok(());
        }
        let removed = self
            .manager
            .delete_columns(&indices)
            .context("deleting columns")?;
        self.status_message = Some(format!("Deleted {}", removed.join(", ")));
        self.reset_plots();
        Ok(())
    }

    pub fn remove_trivial_columns(&mut self) -> Result<()> {
        let removed = self
            .manager
            .remove_trivial_columns()
            .context("removing trivial columns")?;
        self.status_message = Some(if removed.is_empty() {
            "No trivial columns".to_string()
        } else {
            format!("Removed {}", removed.join(", "))
        });
        self.reset_plots();
        Ok(())
    }

    pub fn delete_selected_points(&mut self) -> Result<()> {
        let removed = self
            .manager
            .delete_selected_points()
            .context("deleting selected points")?;
        self.status_message = Some(format!("Deleted {removed} points"));
        self.invalidate_all();
        Ok(())
    }

    // -- selection ------------------------------------------------------------

    pub fn begin_drag(&mut self, plot: usize, at: [f64; 2]) {
        self.manager.selection_mut().begin_drag(plot);
        self.drag = Some(Drag {
            plot,
            start: at,
            end: at,
        });
    }

    /// Extend the drag box to `at` and reselect.
    pub fn update_drag(&mut self, at: [f64; 2]) {
        let Some(mut drag) = self.drag else {
            return;
        };
        drag.end = at;
        self.drag = Some(drag);
        let Some(points) = self.buffers(drag.plot).map(PlotBuffers::xy) else {
            return;
        };
        let (brush, add) = (self.brush, self.add_to_selection);
        self.manager
            .selection_mut()
            .select_in_box(&points, drag.start, drag.end, brush, add);
        self.invalidate_all();
    }

    pub fn end_drag(&mut self) {
        if self.drag.take().is_some() {
            self.manager.selection_mut().commit();
        }
    }

    pub fn invert_selection(&mut self) {
        let brush = self.brush;
        self.manager.selection_mut().invert(brush);
        self.invalidate_all();
    }

    pub fn clear_selection(&mut self) {
        self.manager.selection_mut().clear();
        self.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_default_data() {
        let state = AppState::new(DataFileManager::default(), 2, 2);
        assert_eq!(state.manager.variable_count(), DEFAULT_NVARS);
        assert_eq!(state.plots.len(), 4);
        assert_eq!((state.plots[1].x, state.plots[1].y), (2, 3));
    }

    #[test]
    fn drag_selects_points() {
        let mut state = AppState::new(DataFileManager::default(), 1, 1);
        state.begin_drag(0, [-0.1, -0.1]);
        state.update_drag([0.6, 0.6]);
        state.end_drag();
        // Default data is 0, 0.5, 1 in every column.
        assert_eq!(state.manager.selection().count_selected(), 2);
        state.invert_selection();
        assert_eq!(state.manager.selection().count_selected(), 1);
    }
}
