//! Load / append / merge / delete scenarios against files on disk.

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use rusty_viewpoints::config::{FileFormat, ReadOptions, WriteOptions};
use rusty_viewpoints::data::extract::{AxisSpec, PlotSpec, Transform2d, NBINS_DEFAULT};
use rusty_viewpoints::data::manager::{DataFileManager, ManagerState};
use rusty_viewpoints::data::normalize::NormalizationStyle;
use rusty_viewpoints::error::DataError;

const ABC: &str = "a b c\n1 2 x\n3 4 y\n5 6 x\n";

fn write(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn loaded_abc(dir: &TempDir) -> DataFileManager {
    let mut m = DataFileManager::default();
    m.load(&write(dir, "abc.txt", ABC.as_bytes())).unwrap();
    m
}

#[test]
fn whitespace_table_with_categorical_column() {
    let dir = TempDir::new().unwrap();
    let m = loaded_abc(&dir);
    assert_eq!(m.labels(), vec!["a", "b", "c"]);
    assert_eq!(m.point_count(), 3);
    let c = m.store().column(2).unwrap();
    let dict = c.dictionary().unwrap();
    assert_eq!((dict.code("x"), dict.code("y")), (Some(0), Some(1)));
    assert_eq!(c.values(), &[0.0, 1.0, 0.0]);
    assert_eq!(m.selection().count_selected(), 0);
}

#[test]
fn append_two_rows() {
    let dir = TempDir::new().unwrap();
    let mut m = loaded_abc(&dir);
    let more = write(&dir, "more.txt", b"a b c\n7 8 w\n9 10 y\n");
    let summary = m.append(&more).unwrap();
    assert_eq!(summary.rows, 5);
    assert_eq!(m.point_count(), 5);
    assert_eq!(m.selection().len(), 5);
    assert_eq!(m.store().column(0).unwrap().values(), &[1.0, 3.0, 5.0, 7.0, 9.0]);
    let c = m.store().column(2).unwrap();
    assert_eq!(c.dictionary().unwrap().tokens(), &["w", "x", "y"]);
    let decoded: Vec<String> = (0..5).map(|r| c.display_value(r)).collect();
    assert_eq!(decoded, vec!["x", "y", "x", "w", "y"]);
    m.check_consistency().unwrap();
}

#[test]
fn append_with_mismatched_columns_restores() {
    let dir = TempDir::new().unwrap();
    let mut m = loaded_abc(&dir);
    let narrow = write(&dir, "narrow.txt", b"a b\n7 8\n9 10\n");
    assert!(matches!(m.append(&narrow), Err(DataError::RowColumnMismatch { .. })));
    assert_eq!((m.variable_count(), m.point_count()), (3, 3));
    assert_eq!(m.state(), ManagerState::Loaded);
    m.check_consistency().unwrap();
}

#[test]
fn merge_adds_columns() {
    let dir = TempDir::new().unwrap();
    let mut m = loaded_abc(&dir);
    let extra = write(&dir, "extra.txt", b"d e\n0.5 9\n0.25 8\n0.125 7\n");
    m.merge(&extra).unwrap();
    assert_eq!(m.labels(), vec!["a", "b", "c", "d", "e"]);
    assert_eq!(m.store().sentinel_index(), 5);
}

#[test]
fn failed_load_keeps_previous_data() {
    let dir = TempDir::new().unwrap();
    let mut m = loaded_abc(&dir);
    let one_column = write(&dir, "one.txt", b"a\n1\n2\n");
    assert!(matches!(m.load(&one_column), Err(DataError::TooFewColumns { .. })));
    assert!(matches!(
        m.load(&dir.path().join("missing.txt")),
        Err(DataError::FileNotOpenable { .. })
    ));
    assert_eq!(m.labels(), vec!["a", "b", "c"]);
    assert_eq!(m.current_file().and_then(|p| p.file_name()).unwrap(), "abc.txt");
}

#[test]
fn binary_extended_header() {
    let dir = TempDir::new().unwrap();
    let mut bytes = b"BINARY_FILE_WITH_ASCII_VP\t2\nlabelA\tTFLOAT\nlabelB\tTSTRING\tfoo\tbar\n".to_vec();
    for v in [1.0f32, 0.0, 2.0, 1.0, 3.0, 0.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let path = write(&dir, "ext.bin", &bytes);
    let read = ReadOptions {
        format: FileFormat::Binary,
        ..ReadOptions::default()
    };
    let mut m = DataFileManager::new(read, WriteOptions::default());
    let summary = m.load(&path).unwrap();
    assert!(!summary.had_selection);
    assert_eq!(m.labels(), vec!["labelA", "labelB"]);
    let b = m.store().column(1).unwrap();
    let dict = b.dictionary().unwrap();
    assert_eq!((dict.code("foo"), dict.code("bar")), (Some(0), Some(1)));
    assert_eq!(b.display_value(0), "foo");
}

#[test]
fn trivial_column_is_removed_on_load() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "trivial.txt", b"p q r s\n1 7 2 3\n2 7 4 5\n3 7 6 8\n");
    let mut m = DataFileManager::default();
    let summary = m.load(&path).unwrap();
    assert_eq!(summary.removed_columns, vec!["q"]);
    assert_eq!(m.labels(), vec!["p", "r", "s"]);
}

#[test]
fn delete_that_leaves_one_column_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let mut m = loaded_abc(&dir);
    assert!(matches!(
        m.delete_columns(&[0, 2]),
        Err(DataError::TooFewSurvivingColumns { remaining: 1 })
    ));
    assert_eq!(m.labels(), vec!["a", "b", "c"]);
    assert_eq!(m.store().column(2).unwrap().values(), &[0.0, 1.0, 0.0]);
}

#[test]
fn plot_extraction_after_point_deletion() {
    let dir = TempDir::new().unwrap();
    let mut m = loaded_abc(&dir);
    let spec = PlotSpec {
        x: AxisSpec {
            column: 0,
            style: NormalizationStyle::Rank,
        },
        y: AxisSpec {
            column: 1,
            style: NormalizationStyle::MinMax,
        },
        z: None,
        transform: Transform2d::None,
        nbins: NBINS_DEFAULT,
    };
    let before = m.extract_plot(&spec).unwrap();
    assert_eq!(before.vertices.len(), 3);
    assert!(m.store().column(0).unwrap().is_ranked());

    let points = before.xy();
    m.selection_mut().begin_drag(0);
    m.selection_mut().select_in_box(&points, [0.9, 0.0], [1.1, 10.0], 0, false);
    m.selection_mut().commit();
    assert_eq!(m.delete_selected_points().unwrap(), 1);
    assert!(!m.store().column(0).unwrap().is_ranked());

    let after = m.extract_plot(&spec).unwrap();
    assert_eq!(after.vertices.len(), 2);
    assert_eq!((after.amin[1], after.amax[1]), (2.0, 4.0));
}
