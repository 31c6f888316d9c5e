use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::info;

use super::model::Column;
use super::{ascii, binary, fits};
use crate::config::{FileFormat, ReadOptions, WriteOptions};
use crate::error::{DataError, DataResult};

// ---------------------------------------------------------------------------
// Loaded / outgoing tables
// ---------------------------------------------------------------------------

/// Everything one reader produced. Nothing here touches the live dataset;
/// the manager decides whether to commit it.
#[derive(Debug, Clone, Default)]
pub struct LoadedTable {
    /// Data columns, selection column excluded.
    pub columns: Vec<Column>,
    /// Brush index per row, when the file carried a `SELECTION_BY_VP` column.
    pub selection: Option<Vec<u32>>,
    /// Blank, comment, short and rejected lines (text formats only).
    pub skipped_lines: usize,
}

impl LoadedTable {
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn cols(&self) -> usize {
        self.columns.len()
    }

    pub fn labels(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }

    /// Selection flags for every row, zero when the file had none.
    pub fn selection_or_zeros(&self) -> Vec<u32> {
        self.selection.clone().unwrap_or_else(|| vec![0; self.rows()])
    }
}

/// Borrowed view of a dataset being written out.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    pub columns: &'a [Column],
    /// Brush index per row; empty means "nothing selected".
    pub selection: &'a [u32],
}

impl<'a> TableView<'a> {
    pub fn new(columns: &'a [Column], selection: &'a [u32]) -> Self {
        Self { columns, selection }
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn selection_at(&self, row: usize) -> u32 {
        self.selection.get(row).copied().unwrap_or(0)
    }

    pub fn has_categorical(&self) -> bool {
        self.columns.iter().any(Column::is_categorical)
    }

    /// Row indices that `options` asks to be written.
    pub fn rows_to_write(&self, options: &WriteOptions) -> Vec<usize> {
        (0..self.rows())
            .filter(|&row| !options.selected_only || self.selection_at(row) > 0)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Explicit format if given, otherwise a guess from the extension, otherwise
/// ASCII.
pub fn resolve_format(path: &Path, explicit: Option<FileFormat>) -> FileFormat {
    explicit
        .or_else(|| FileFormat::from_path(path))
        .unwrap_or_default()
}

/// Read a table using `options.format`.
pub fn load_file(path: &Path, options: &ReadOptions) -> DataResult<LoadedTable> {
    info!("reading {} data from {}", options.format, path.display());
    let file = open(path)?;
    let table = match options.format {
        FileFormat::Ascii => ascii::read_ascii(BufReader::new(file), options)?,
        FileFormat::Binary => binary::read_binary(BufReader::new(file), options)?,
        FileFormat::Fits => fits::read_fits(BufReader::new(file), options)?,
    };
    info!(
        "finished reading {}: {} columns x {} rows{}",
        path.display(),
        table.cols(),
        table.rows(),
        if table.selection.is_some() {
            " with selection information"
        } else {
            ""
        }
    );
    Ok(table)
}

/// Write a table using `options.format` and return the number of rows written.
pub fn save_file(path: &Path, view: &TableView<'_>, options: &WriteOptions) -> DataResult<usize> {
    let file = File::create(path).map_err(|source| DataError::FileNotOpenable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    let written = match options.format {
        FileFormat::Ascii => {
            ascii::write_ascii(&mut out, view, options, Some(&path.display().to_string()))?
        }
        FileFormat::Binary => binary::write_binary(&mut out, view, options)?,
        FileFormat::Fits => fits::write_fits(&mut out, view, options)?,
    };
    out.flush()?;
    info!(
        "wrote {written} rows of {} variables to {} file {}",
        view.columns.len(),
        options.format,
        path.display()
    );
    Ok(written)
}

fn open(path: &Path) -> DataResult<File> {
    File::open(path).map_err(|source| DataError::FileNotOpenable {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_resolution_order() {
        let p = Path::new("table.fits");
        assert_eq!(resolve_format(p, Some(FileFormat::Binary)), FileFormat::Binary);
        assert_eq!(resolve_format(p, None), FileFormat::Fits);
        assert_eq!(resolve_format(Path::new("table.xyz"), None), FileFormat::Ascii);
    }

    #[test]
    fn missing_file_is_not_openable() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("absent.txt"), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, DataError::FileNotOpenable { .. }));
    }

    #[test]
    fn selected_only_filters_rows() {
        let cols = vec![Column::numeric("a", vec![1.0, 2.0, 3.0])];
        let sel = [0, 2, 1];
        let view = TableView::new(&cols, &sel);
        let mut opts = WriteOptions::default();
        assert_eq!(view.rows_to_write(&opts), vec![0, 1, 2]);
        opts.selected_only = true;
        assert_eq!(view.rows_to_write(&opts), vec![1, 2]);
    }
}
