use log::debug;

use super::model::{Column, SENTINEL_LABEL};
use crate::error::{DataError, DataResult};

/// Owns the columns of the live dataset.
///
/// The last entry is always the sentinel column ("-nothing-"), zero-filled to
/// the point count and excluded from [`ColumnStore::variable_count`]. Every
/// column, sentinel included, has exactly [`ColumnStore::point_count`] values.
#[derive(Debug, Clone)]
pub struct ColumnStore {
    columns: Vec<Column>,
    max_vars: usize,
}

impl ColumnStore {
    pub fn new(max_vars: usize) -> Self {
        Self {
            columns: vec![Column::sentinel(0)],
            max_vars,
        }
    }

    /// Build a store from data columns (no sentinel) of equal length.
    pub fn from_columns(columns: Vec<Column>, max_vars: usize) -> DataResult<Self> {
        let mut store = Self::new(max_vars);
        if let Some(first) = columns.first() {
            store.resize(first.len());
        }
        for column in columns {
            store.push_column(column)?;
        }
        Ok(store)
    }

    pub fn max_vars(&self) -> usize {
        self.max_vars
    }

    pub fn set_max_vars(&mut self, max_vars: usize) {
        self.max_vars = max_vars;
    }

    /// Number of data columns (sentinel excluded).
    pub fn variable_count(&self) -> usize {
        self.columns.len() - 1
    }

    pub fn point_count(&self) -> usize {
        self.sentinel().len()
    }

    /// Index of the sentinel column, i.e. "no axis".
    pub fn sentinel_index(&self) -> usize {
        self.variable_count()
    }

    pub fn sentinel(&self) -> &Column {
        &self.columns[self.columns.len() - 1]
    }

    /// Data columns, sentinel excluded.
    pub fn columns(&self) -> &[Column] {
        &self.columns[..self.variable_count()]
    }

    pub fn column(&self, index: usize) -> DataResult<&Column> {
        let count = self.variable_count();
        self.columns()
            .get(index)
            .ok_or(DataError::ColumnOutOfRange { index, count })
    }

    pub fn column_mut(&mut self, index: usize) -> DataResult<&mut Column> {
        let count = self.variable_count();
        if index >= count {
            return Err(DataError::ColumnOutOfRange { index, count });
        }
        Ok(&mut self.columns[index])
    }

    pub fn labels(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.label.clone()).collect()
    }

    /// Label for an axis index, where the sentinel index means "no axis".
    pub fn axis_label(&self, index: usize) -> &str {
        match self.columns.get(index) {
            Some(column) => &column.label,
            None => SENTINEL_LABEL,
        }
    }

    pub fn n_ascii_columns(&self) -> usize {
        self.columns().iter().filter(|c| c.is_categorical()).count()
    }

    /// Append an empty (zero-filled) numeric column and return its index.
    pub fn add_column(&mut self, label: impl Into<String>) -> DataResult<usize> {
        let column = Column::numeric(label, vec![0.0; self.point_count()]);
        self.push_column(column)
    }

    /// Append a populated column; its length must match the point count.
    pub fn push_column(&mut self, column: Column) -> DataResult<usize> {
        let found = self.variable_count() + 1;
        if found > self.max_vars {
            return Err(DataError::TooManyColumns {
                found,
                limit: self.max_vars,
            });
        }
        if column.len() != self.point_count() {
            return Err(DataError::RowColumnMismatch {
                old_rows: self.point_count(),
                old_cols: self.variable_count(),
                new_rows: column.len(),
                new_cols: 1,
            });
        }
        let index = self.variable_count();
        self.columns.insert(index, column);
        Ok(index)
    }

    /// Resize every column, preserving the overlap and zero-filling growth.
    pub fn resize(&mut self, point_count: usize) {
        for column in &mut self.columns {
            column.resize(point_count);
        }
    }

    /// Remove one data column, shifting later columns down. Rank caches travel
    /// with their columns, so callers holding column *indices* must refresh
    /// them.
    pub fn remove_column(&mut self, index: usize) -> DataResult<Column> {
        let count = self.variable_count();
        if index >= count {
            return Err(DataError::ColumnOutOfRange { index, count });
        }
        Ok(self.columns.remove(index))
    }

    /// Keep the data columns whose flag is true; the sentinel is rebuilt.
    pub fn retain_columns(&mut self, keep: &[bool]) {
        let point_count = self.point_count();
        self.columns.pop();
        let mut index = 0;
        self.columns.retain(|_| {
            let k = keep.get(index).copied().unwrap_or(true);
            index += 1;
            k
        });
        self.columns.push(Column::sentinel(point_count));
    }

    /// Keep the rows whose flag is true in every column.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            column.retain_rows(keep);
        }
    }

    pub fn encode_ascii_value(&mut self, index: usize, token: &str) -> DataResult<usize> {
        Ok(self.column_mut(index)?.encode_ascii_value(token))
    }

    pub fn finalize_ascii_ordering(&mut self, index: usize) -> DataResult<bool> {
        let reordered = self.column_mut(index)?.finalize_ascii_ordering();
        if reordered {
            debug!("alphabetized ASCII values of column {index}");
        }
        Ok(reordered)
    }

    pub fn invalidate_ranks(&mut self) {
        for column in &mut self.columns {
            column.invalidate_rank();
        }
    }

    /// Take ownership of the data columns, leaving an empty store.
    pub fn into_columns(mut self) -> Vec<Column> {
        self.columns.pop();
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> ColumnStore {
        ColumnStore::from_columns(
            vec![
                Column::numeric("a", vec![1.0, 2.0, 3.0]),
                Column::numeric("b", vec![4.0, 5.0, 6.0]),
            ],
            8,
        )
        .unwrap()
    }

    #[test]
    fn sentinel_is_excluded_from_counts() {
        let s = store();
        assert_eq!(s.variable_count(), 2);
        assert_eq!(s.point_count(), 3);
        assert_eq!(s.axis_label(2), SENTINEL_LABEL);
        assert_eq!(s.labels(), vec!["a", "b"]);
    }

    #[test]
    fn resize_preserves_overlap_and_zero_fills() {
        let mut s = store();
        s.resize(5);
        assert_eq!(s.column(0).unwrap().values(), &[1.0, 2.0, 3.0, 0.0, 0.0]);
        assert_eq!(s.sentinel().len(), 5);
        s.resize(2);
        for c in s.columns() {
            assert_eq!(c.len(), 2);
        }
    }

    #[test]
    fn add_column_respects_max_vars() {
        let mut s = ColumnStore::new(2);
        s.resize(3);
        assert_eq!(s.add_column("x").unwrap(), 0);
        assert_eq!(s.add_column("y").unwrap(), 1);
        assert!(matches!(
            s.add_column("z"),
            Err(DataError::TooManyColumns { found: 3, limit: 2 })
        ));
        assert_eq!(s.column(1).unwrap().len(), 3);
    }

    #[test]
    fn remove_column_shifts_down() {
        let mut s = store();
        s.add_column("c").unwrap();
        let removed = s.remove_column(0).unwrap();
        assert_eq!(removed.label, "a");
        assert_eq!(s.labels(), vec!["b", "c"]);
        assert!(s.remove_column(2).is_err());
    }

    #[test]
    fn streaming_encode_then_finalize() {
        let mut s = ColumnStore::new(4);
        s.resize(3);
        let idx = s.add_column("c").unwrap();
        let codes: Vec<f64> = ["y", "x", "y"]
            .iter()
            .map(|t| s.encode_ascii_value(idx, t).unwrap() as f64)
            .collect();
        s.column_mut(idx).unwrap().set_values(codes);
        assert!(s.finalize_ascii_ordering(idx).unwrap());
        assert_eq!(s.column(idx).unwrap().values(), &[1.0, 0.0, 1.0]);
        assert_eq!(s.n_ascii_columns(), 1);
    }
}
