use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::extract::{extract_plot, PlotBuffers, PlotSpec};
use super::loader::{load_file, save_file, LoadedTable, TableView};
use super::model::Column;
use super::selection::{reconcile_append, reconcile_merge, SelectionState};
use super::store::ColumnStore;
use crate::config::{ReadOptions, WriteOptions};
use crate::error::{DataError, DataResult};

/// Points generated by [`DataFileManager::create_default_data`].
const DEFAULT_VALUES: [f64; 3] = [0.0, 0.5, 1.0];

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Lifecycle of the live dataset. Structural operations run in one of the
/// transient states and always end in `Loaded` (or back where they started
/// when they fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Empty,
    Loading,
    Loaded,
    Appending,
    Merging,
    Deleting,
    Trimming,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManagerState::Empty => "empty",
            ManagerState::Loading => "loading",
            ManagerState::Loaded => "loaded",
            ManagerState::Appending => "appending",
            ManagerState::Merging => "merging",
            ManagerState::Deleting => "deleting",
            ManagerState::Trimming => "trimming",
        };
        f.write_str(name)
    }
}

/// How a freshly read table is combined with the live dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Replace the dataset.
    #[default]
    Replace,
    /// Add rows; the column counts must match.
    Append,
    /// Add columns; the row counts must match.
    Merge,
}

impl LoadMode {
    fn state(self) -> ManagerState {
        match self {
            LoadMode::Replace => ManagerState::Loading,
            LoadMode::Append => ManagerState::Appending,
            LoadMode::Merge => ManagerState::Merging,
        }
    }
}

/// What a successful load did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub columns: usize,
    pub rows: usize,
    pub removed_columns: Vec<String>,
    pub had_selection: bool,
}

struct Snapshot {
    store: ColumnStore,
    selection: SelectionState,
    state: ManagerState,
}

// ---------------------------------------------------------------------------
// DataFileManager
// ---------------------------------------------------------------------------

/// Owns the live dataset (columns plus selection) and every operation that
/// changes its shape.
///
/// Each structural change snapshots the dataset first. If the change fails,
/// or leaves the selection arrays out of step with the point count, the
/// snapshot is put back verbatim and the error is returned.
pub struct DataFileManager {
    state: ManagerState,
    store: ColumnStore,
    selection: SelectionState,
    pub read_options: ReadOptions,
    pub write_options: WriteOptions,
    current_file: Option<PathBuf>,
}

impl Default for DataFileManager {
    fn default() -> Self {
        Self::new(ReadOptions::default(), WriteOptions::default())
    }
}

impl DataFileManager {
    pub fn new(read_options: ReadOptions, write_options: WriteOptions) -> Self {
        Self {
            state: ManagerState::Empty,
            store: ColumnStore::new(read_options.max_vars),
            selection: SelectionState::new(0),
            read_options,
            write_options,
            current_file: None,
        }
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.state == ManagerState::Empty
    }

    pub fn store(&self) -> &ColumnStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn variable_count(&self) -> usize {
        self.store.variable_count()
    }

    pub fn point_count(&self) -> usize {
        self.store.point_count()
    }

    pub fn labels(&self) -> Vec<String> {
        self.store.labels()
    }

    /// Fail unless the selection arrays match the point count.
    pub fn check_consistency(&self) -> DataResult<()> {
        self.selection.check_consistency(self.store.point_count())
    }

    // -- loading --------------------------------------------------------------

    pub fn load(&mut self, path: &Path) -> DataResult<LoadSummary> {
        self.load_data_file(path, LoadMode::Replace)
    }

    pub fn append(&mut self, path: &Path) -> DataResult<LoadSummary> {
        self.load_data_file(path, LoadMode::Append)
    }

    pub fn merge(&mut self, path: &Path) -> DataResult<LoadSummary> {
        self.load_data_file(path, LoadMode::Merge)
    }

    /// Read `path` with the current read options and combine it with the
    /// live dataset according to `mode`.
    pub fn load_data_file(&mut self, path: &Path, mode: LoadMode) -> DataResult<LoadSummary> {
        let table = match load_file(path, &self.read_options) {
            Ok(table) => table,
            Err(e) => {
                warn!("problems reading file {}: {e}", path.display());
                return Err(e);
            }
        };
        let summary = self.apply_table(table, mode)?;
        if mode == LoadMode::Replace {
            self.current_file = Some(path.to_path_buf());
        }
        Ok(summary)
    }

    /// Combine an already-read table with the live dataset.
    pub fn apply_table(&mut self, table: LoadedTable, mode: LoadMode) -> DataResult<LoadSummary> {
        let mode = if self.is_empty() { LoadMode::Replace } else { mode };
        self.transition(mode.state(), |manager| manager.commit_table(table, mode))
    }

    fn commit_table(&mut self, mut table: LoadedTable, mode: LoadMode) -> DataResult<LoadSummary> {
        let had_selection = table.selection.is_some();
        let removed_columns = if self.read_options.remove_trivial_columns && mode != LoadMode::Append {
            remove_trivial(&mut table.columns)
        } else {
            Vec::new()
        };

        let (rows, cols) = (table.rows(), table.cols());
        if rows == 0 || (mode == LoadMode::Replace && (cols <= 1 || rows <= 1)) {
            warn!("insufficient data, {cols}x{rows} samples; check delimiter character");
            return Err(DataError::InsufficientData { columns: cols, rows });
        }

        let (old_rows, old_cols) = (self.store.point_count(), self.store.variable_count());
        let mismatch = match mode {
            LoadMode::Replace => false,
            LoadMode::Append => cols != old_cols,
            LoadMode::Merge => rows != old_rows,
        };
        if mismatch {
            warn!("old ({old_rows}x{old_cols}) array doesn't match new ({rows}x{cols}) array");
            return Err(DataError::RowColumnMismatch {
                old_rows,
                old_cols,
                new_rows: rows,
                new_cols: cols,
            });
        }

        let new_selection = table.selection_or_zeros();
        let max_vars = self.read_options.max_vars;
        let (store, selected) = match mode {
            LoadMode::Replace => (ColumnStore::from_columns(table.columns, max_vars)?, new_selection),
            LoadMode::Append => {
                let old = std::mem::replace(&mut self.store, ColumnStore::new(max_vars));
                let columns = old
                    .into_columns()
                    .into_iter()
                    .zip(table.columns)
                    .map(|(old, new)| old.concat(new))
                    .collect();
                let store = ColumnStore::from_columns(columns, max_vars)?;
                let selected = reconcile_append(self.selection.selected(), &new_selection, store.point_count())?;
                (store, selected)
            }
            LoadMode::Merge => {
                let mut store = self.store.clone();
                store.set_max_vars(max_vars);
                for column in table.columns {
                    store.push_column(column)?;
                }
                let selected = reconcile_merge(self.selection.selected(), store.point_count())?;
                (store, selected)
            }
        };

        let mut selection = SelectionState::new(store.point_count());
        selection.set_selected(selected)?;
        self.store = store;
        self.selection = selection;

        info!(
            "loaded {} samples with {} fields",
            self.store.point_count(),
            self.store.variable_count()
        );
        Ok(LoadSummary {
            columns: self.store.variable_count(),
            rows: self.store.point_count(),
            removed_columns,
            had_selection,
        })
    }

    // -- saving ---------------------------------------------------------------

    /// Write the dataset with the current write options.
    pub fn save(&self, path: &Path) -> DataResult<usize> {
        self.save_with(path, &self.write_options)
    }

    pub fn save_with(&self, path: &Path, options: &WriteOptions) -> DataResult<usize> {
        if self.is_empty() {
            return Err(DataError::NoDataset);
        }
        let view = TableView::new(self.store.columns(), self.selection.selected());
        save_file(path, &view, options)
    }

    // -- structural edits -----------------------------------------------------

    /// Remove the listed columns. At least two columns must survive.
    pub fn delete_columns(&mut self, indices: &[usize]) -> DataResult<Vec<String>> {
        let count = self.store.variable_count();
        if let Some(&index) = indices.iter().find(|&&i| i >= count) {
            return Err(DataError::ColumnOutOfRange { index, count });
        }
        let mut keep = vec![true; count];
        for &i in indices {
            keep[i] = false;
        }
        self.transition(ManagerState::Deleting, |manager| manager.retain_columns(&keep))
    }

    /// Remove every column whose values are all identical.
    pub fn remove_trivial_columns(&mut self) -> DataResult<Vec<String>> {
        let keep: Vec<bool> = self.store.columns().iter().map(|c| !c.is_trivial()).collect();
        self.transition(ManagerState::Trimming, |manager| manager.retain_columns(&keep))
    }

    fn retain_columns(&mut self, keep: &[bool]) -> DataResult<Vec<String>> {
        let remaining = keep.iter().filter(|&&k| k).count();
        if remaining <= 1 {
            warn!("can't delete columns: only {remaining} would remain");
            return Err(DataError::TooFewSurvivingColumns { remaining });
        }
        let removed: Vec<String> = self
            .store
            .columns()
            .iter()
            .zip(keep)
            .filter(|(_, &k)| !k)
            .map(|(c, _)| c.label.clone())
            .collect();
        self.store.retain_columns(keep);
        if !removed.is_empty() {
            info!("removed {} columns: {}", removed.len(), removed.join(" "));
        }
        Ok(removed)
    }

    /// Drop the selected points. Every rank cache is invalidated and the
    /// selection is cleared. Returns the number of points removed.
    pub fn delete_selected_points(&mut self) -> DataResult<usize> {
        let keep: Vec<bool> = self.selection.selected().iter().map(|&s| s == 0).collect();
        let removed = keep.iter().filter(|&&k| !k).count();
        if removed == 0 {
            return Ok(0);
        }
        self.transition(ManagerState::Deleting, |manager| {
            let remaining = keep.len() - removed;
            if remaining <= 1 {
                return Err(DataError::InsufficientData {
                    columns: manager.store.variable_count(),
                    rows: remaining,
                });
            }
            manager.store.retain_rows(&keep);
            manager.store.invalidate_ranks();
            manager.selection = SelectionState::new(manager.store.point_count());
            info!("deleted {removed} points, {remaining} remain");
            Ok(removed)
        })
    }

    /// Replace the dataset with `nvars` columns `default_000`, `default_001`,
    /// ... of three points each. Fewer than two columns is a no-op.
    pub fn create_default_data(&mut self, nvars: usize) {
        if nvars < 2 {
            return;
        }
        let max_vars = self.read_options.max_vars.max(2);
        let nvars = nvars.min(max_vars);
        let columns = (0..nvars)
            .map(|i| Column::numeric(format!("default_{i:03}"), DEFAULT_VALUES.to_vec()))
            .collect();
        match ColumnStore::from_columns(columns, max_vars) {
            Ok(store) => {
                self.selection = SelectionState::new(store.point_count());
                self.store = store;
                self.state = ManagerState::Loaded;
                self.current_file = None;
                info!("generated default data with {nvars} fields");
            }
            Err(e) => warn!("couldn't generate default data: {e}"),
        }
    }

    // -- plotting -------------------------------------------------------------

    /// Extract the buffers one plot needs from the live dataset.
    pub fn extract_plot(&mut self, spec: &PlotSpec) -> DataResult<PlotBuffers> {
        if self.is_empty() {
            return Err(DataError::NoDataset);
        }
        extract_plot(&mut self.store, self.selection.selected(), spec)
    }

    // -- snapshot / restore ---------------------------------------------------

    fn transition<T>(
        &mut self,
        state: ManagerState,
        op: impl FnOnce(&mut Self) -> DataResult<T>,
    ) -> DataResult<T> {
        let snapshot = Snapshot {
            store: self.store.clone(),
            selection: self.selection.clone(),
            state: self.state,
        };
        self.state = state;
        let result = op(self).and_then(|value| {
            self.check_consistency()?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                self.state = ManagerState::Loaded;
                Ok(value)
            }
            Err(e) => {
                warn!("{state} failed, restoring previous data: {e}");
                self.store = snapshot.store;
                self.selection = snapshot.selection;
                self.state = snapshot.state;
                Err(e)
            }
        }
    }
}

/// Drop trivial columns from a freshly read table and return their labels.
/// Tables with a single row are left alone.
fn remove_trivial(columns: &mut Vec<Column>) -> Vec<String> {
    if columns.first().map_or(0, Column::len) <= 1 {
        return Vec::new();
    }
    let mut removed = Vec::new();
    columns.retain(|c| {
        let trivial = c.is_trivial();
        if trivial {
            warn!("skipping trivial column {}", c.label);
            removed.push(c.label.clone());
        }
        !trivial
    });
    removed
}
