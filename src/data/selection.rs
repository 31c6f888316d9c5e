use log::{debug, error};

use crate::error::{DataError, DataResult};

/// Number of brushes a point can be painted with.
pub const NBRUSHES: usize = 4;

/// Per-point selection state shared by every plot.
///
/// `selected[i]` is 0 for an unselected point and `brush + 1` otherwise.
/// Every array always has exactly one entry per point; [`SelectionState::resize`]
/// is the only way to change that length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    selected: Vec<u32>,
    previously_selected: Vec<u32>,
    newly_selected: Vec<u32>,
    saved_selection: Vec<u32>,
    inside_footprint: Vec<bool>,
    /// Per brush, the indices of the points it holds; only the first
    /// `brush_counts[b]` entries are meaningful.
    brush_indices: Vec<Vec<u32>>,
    brush_counts: [usize; NBRUSHES],
    /// Plot that started the last drag; a drag from another plot starts a
    /// fresh baseline.
    last_source: Option<usize>,
}

impl SelectionState {
    pub fn new(point_count: usize) -> Self {
        let mut state = Self::default();
        state.resize(point_count);
        state
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn selected(&self) -> &[u32] {
        &self.selected
    }

    pub fn previously_selected(&self) -> &[u32] {
        &self.previously_selected
    }

    pub fn newly_selected(&self) -> &[u32] {
        &self.newly_selected
    }

    pub fn saved_selection(&self) -> &[u32] {
        &self.saved_selection
    }

    pub fn inside_footprint(&self) -> &[bool] {
        &self.inside_footprint
    }

    /// Indices of the points painted with `brush`.
    pub fn brush_indices(&self, brush: usize) -> &[u32] {
        match self.brush_indices.get(brush) {
            Some(indices) => &indices[..self.brush_counts[brush]],
            None => &[],
        }
    }

    pub fn is_selected(&self, point: usize) -> bool {
        self.selected.get(point).is_some_and(|&s| s > 0)
    }

    pub fn count_selected(&self) -> usize {
        self.selected.iter().filter(|&&s| s > 0).count()
    }

    // -- sizing ---------------------------------------------------------------

    /// Resize every selection array to `point_count`, keeping the overlap and
    /// zero-filling growth.
    pub fn resize(&mut self, point_count: usize) {
        self.selected.resize(point_count, 0);
        self.previously_selected.resize(point_count, 0);
        self.newly_selected.resize(point_count, 0);
        self.saved_selection.resize(point_count, 0);
        self.inside_footprint.resize(point_count, false);
        self.brush_indices.resize_with(NBRUSHES, Vec::new);
        for indices in &mut self.brush_indices {
            indices.resize(point_count, 0);
        }
        self.refresh_brush_indices();
    }

    /// Fail unless every array has exactly `point_count` entries.
    pub fn check_consistency(&self, point_count: usize) -> DataResult<()> {
        let lengths = [
            self.selected.len(),
            self.previously_selected.len(),
            self.newly_selected.len(),
            self.saved_selection.len(),
            self.inside_footprint.len(),
        ];
        let brush_lengths = self.brush_indices.iter().map(Vec::len);
        match lengths.into_iter().chain(brush_lengths).find(|&n| n != point_count) {
            Some(found) => {
                error!("selection arrays aren't consistent: {found} != {point_count}");
                Err(DataError::SelectionArrayLengthMismatch {
                    expected: point_count,
                    found,
                })
            }
            None => Ok(()),
        }
    }

    /// Replace the live selection; the length must match the point count.
    pub fn set_selected(&mut self, selected: Vec<u32>) -> DataResult<()> {
        if selected.len() != self.len() {
            return Err(DataError::SelectionArrayLengthMismatch {
                expected: self.len(),
                found: selected.len(),
            });
        }
        self.selected = selected;
        self.previously_selected.clone_from(&self.selected);
        self.newly_selected.fill(0);
        self.refresh_brush_indices();
        Ok(())
    }

    // -- brushing -------------------------------------------------------------

    /// Start a drag in plot `source`. Switching plots makes the current
    /// selection the baseline that a non-additive drag falls back to.
    pub fn begin_drag(&mut self, source: usize) {
        if self.last_source != Some(source) {
            self.previously_selected.clone_from(&self.selected);
            self.last_source = Some(source);
        }
    }

    /// Select the points whose plotted coordinates fall inside the box with
    /// corners `a` and `b`, painting them with `brush`.
    ///
    /// With `add` the box accumulates onto the live selection; otherwise it
    /// replaces everything selected since the baseline set by
    /// [`SelectionState::begin_drag`]. Returns the selected-point count.
    pub fn select_in_box(
        &mut self,
        points: &[[f64; 2]],
        a: [f64; 2],
        b: [f64; 2],
        brush: usize,
        add: bool,
    ) -> usize {
        let (xmin, xmax) = (a[0].min(b[0]), a[0].max(b[0]));
        let (ymin, ymax) = (a[1].min(b[1]), a[1].max(b[1]));
        let value = brush.min(NBRUSHES - 1) as u32 + 1;

        for (i, p) in points.iter().enumerate().take(self.len()) {
            let inside = p[0] >= xmin && p[0] <= xmax && p[1] >= ymin && p[1] <= ymax;
            self.inside_footprint[i] = inside;
            self.newly_selected[i] = if inside { value } else { 0 };
            if inside {
                self.selected[i] = value;
            } else if !add {
                self.selected[i] = self.previously_selected[i];
            }
        }
        self.refresh_brush_indices();
        let n = self.count_selected();
        debug!("{n} points selected");
        n
    }

    /// Finish a drag: the footprint is cleared and the result becomes the
    /// new baseline.
    pub fn commit(&mut self) {
        self.previously_selected.clone_from(&self.selected);
        self.newly_selected.fill(0);
        self.inside_footprint.fill(false);
    }

    /// Swap selected and unselected points; newly selected ones get `brush`.
    pub fn invert(&mut self, brush: usize) {
        let value = brush.min(NBRUSHES - 1) as u32 + 1;
        for s in &mut self.selected {
            *s = if *s > 0 { 0 } else { value };
        }
        self.previously_selected.clone_from(&self.selected);
        self.refresh_brush_indices();
    }

    pub fn clear(&mut self) {
        self.selected.fill(0);
        self.previously_selected.fill(0);
        self.newly_selected.fill(0);
        self.inside_footprint.fill(false);
        self.last_source = None;
        self.refresh_brush_indices();
    }

    pub fn save(&mut self) {
        self.saved_selection.clone_from(&self.selected);
    }

    pub fn restore(&mut self) {
        self.selected.clone_from(&self.saved_selection);
        self.previously_selected.clone_from(&self.selected);
        self.refresh_brush_indices();
    }

    fn refresh_brush_indices(&mut self) {
        self.brush_counts = [0; NBRUSHES];
        for (i, &s) in self.selected.iter().enumerate() {
            if s == 0 {
                continue;
            }
            let brush = (s as usize - 1).min(NBRUSHES - 1);
            let slot = self.brush_counts[brush];
            if let Some(entry) = self.brush_indices.get_mut(brush).and_then(|v| v.get_mut(slot)) {
                *entry = i as u32;
                self.brush_counts[brush] += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Append / merge reconciliation
// ---------------------------------------------------------------------------

/// Selection after appending rows: old rows first, then the new ones.
pub fn reconcile_append(old: &[u32], new: &[u32], total: usize) -> DataResult<Vec<u32>> {
    let found = old.len() + new.len();
    if found != total {
        error!(
            "selection arrays aren't consistent: old({}) + new({}) != total({total})",
            old.len(),
            new.len()
        );
        return Err(DataError::SelectionArrayLengthMismatch {
            expected: total,
            found,
        });
    }
    let mut merged = Vec::with_capacity(total);
    merged.extend_from_slice(old);
    merged.extend_from_slice(new);
    Ok(merged)
}

/// Selection after merging columns: rows are unchanged, so is the selection.
pub fn reconcile_merge(old: &[u32], total: usize) -> DataResult<Vec<u32>> {
    if old.len() != total {
        return Err(DataError::SelectionArrayLengthMismatch {
            expected: total,
            found: old.len(),
        });
    }
    Ok(old.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid() -> Vec<[f64; 2]> {
        vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]
    }

    #[test]
    fn resize_keeps_every_array_in_step() {
        let mut s = SelectionState::new(3);
        s.set_selected(vec![1, 0, 2]).unwrap();
        s.resize(5);
        s.check_consistency(5).unwrap();
        assert_eq!(s.selected(), &[1, 0, 2, 0, 0]);
        s.resize(2);
        s.check_consistency(2).unwrap();
        assert_eq!(s.selected(), &[1, 0]);
        assert!(s.check_consistency(3).is_err());
    }

    #[test]
    fn box_selection_replaces_within_a_drag() {
        let mut s = SelectionState::new(4);
        s.begin_drag(0);
        assert_eq!(s.select_in_box(&grid(), [-0.5, -0.5], [1.5, 1.5], 0, false), 2);
        // Shrinking the box drops points that left it.
        assert_eq!(s.select_in_box(&grid(), [-0.5, -0.5], [0.5, 0.5], 0, false), 1);
        assert_eq!(s.selected(), &[1, 0, 0, 0]);
        assert_eq!(s.inside_footprint(), &[true, false, false, false]);
    }

    #[test]
    fn additive_box_selection_accumulates() {
        let mut s = SelectionState::new(4);
        s.begin_drag(0);
        s.select_in_box(&grid(), [-0.5, -0.5], [0.5, 0.5], 0, true);
        s.select_in_box(&grid(), [2.5, 2.5], [3.5, 3.5], 1, true);
        assert_eq!(s.selected(), &[1, 0, 0, 2]);
        assert_eq!(s.brush_indices(0), &[0]);
        assert_eq!(s.brush_indices(1), &[3]);
    }

    #[test]
    fn new_plot_keeps_previous_selection_as_baseline() {
        let mut s = SelectionState::new(4);
        s.begin_drag(0);
        s.select_in_box(&grid(), [-0.5, -0.5], [0.5, 0.5], 0, false);
        s.commit();
        s.begin_drag(1);
        s.select_in_box(&grid(), [2.5, 2.5], [3.5, 3.5], 0, false);
        assert_eq!(s.count_selected(), 2);
    }

    #[test]
    fn invert_clear_save_restore() {
        let mut s = SelectionState::new(3);
        s.set_selected(vec![1, 0, 0]).unwrap();
        s.save();
        s.invert(0);
        assert_eq!(s.selected(), &[0, 1, 1]);
        s.clear();
        assert_eq!(s.count_selected(), 0);
        s.restore();
        assert_eq!(s.selected(), &[1, 0, 0]);
    }

    #[test]
    fn append_puts_old_rows_first() {
        assert_eq!(reconcile_append(&[1, 0, 2], &[0, 3], 5).unwrap(), vec![1, 0, 2, 0, 3]);
        assert!(matches!(
            reconcile_append(&[1], &[0], 3),
            Err(DataError::SelectionArrayLengthMismatch { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn merge_inherits_selection() {
        assert_eq!(reconcile_merge(&[0, 4], 2).unwrap(), vec![0, 4]);
        assert!(reconcile_merge(&[0, 4], 3).is_err());
    }
}
