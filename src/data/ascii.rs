use std::io::{BufRead, Write};

use log::{info, warn};

use super::labels::{
    extract_column_labels, infer_column_types, is_comment_line, is_nan_token, parse_number, split_fields,
    untab, HeaderLabels,
};
use super::loader::{LoadedTable, TableView};
use super::model::{AsciiDictionary, Column, BAD_DATA_FLAG, SELECTION_LABEL};
use crate::config::{ReadOptions, WriteOptions};
use crate::error::{DataError, DataResult};

/// Upper bound on lines examined while looking for the end of the header.
pub const MAX_HEADER_LINES: usize = 2000;

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Per-column accumulator used while streaming rows in.
enum Accumulator {
    Numeric(Vec<f64>),
    Categorical(Vec<f64>, AsciiDictionary),
}

impl Accumulator {
    fn into_column(self, label: &str) -> Column {
        match self {
            Accumulator::Numeric(values) => Column::numeric(label, values),
            Accumulator::Categorical(values, dict) => {
                let mut column = Column::categorical(label, values, dict);
                column.finalize_ascii_ordering();
                column
            }
        }
    }
}

/// One parsed cell, before the row is accepted.
enum Cell<'a> {
    Value(f64),
    Token(&'a str),
}

/// Read a delimited text table.
///
/// The header block (blank lines, comment lines and the first
/// `skip_header_lines` lines) is discarded. Labels come from the last header
/// line in commented-labels mode, otherwise from the first remaining line;
/// when that line is entirely numeric it is treated as data and `Column_N`
/// labels are generated. Column types are inferred from the first data line.
pub fn read_ascii<R: BufRead>(reader: R, options: &ReadOptions) -> DataResult<LoadedTable> {
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    // Header block
    let mut header_lines = 0usize;
    let mut last_header: Option<String> = None;
    let mut first: Option<String> = None;
    for i in 0..MAX_HEADER_LINES {
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        line_no += 1;
        if line.trim().is_empty() {
            header_lines += 1;
            continue;
        }
        if i < options.skip_header_lines || is_comment_line(&line) {
            last_header = Some(line);
            header_lines += 1;
            continue;
        }
        first = Some(line);
        break;
    }
    info!("header block contains {header_lines} header lines");

    let Some(first) = first else {
        return Err(DataError::TooFewColumns { found: 0 });
    };

    // Labels; `pending` is a line that still has to be read as data.
    let (header, mut pending) = if options.commented_labels {
        let header = match last_header.as_deref() {
            Some(label_line) if !label_line.trim().is_empty() => {
                extract_column_labels(label_line, false, options)?
            }
            _ => extract_column_labels(&first, true, options)?,
        };
        (header, Some(first))
    } else {
        let header = extract_column_labels(&first, false, options)?;
        let any_text = infer_column_types(&first, header.field_count(), options.delimiter)
            .is_some_and(|types| types.iter().any(|&t| t));
        if any_text {
            (header, None)
        } else {
            (extract_column_labels(&first, true, options)?, Some(first))
        }
    };

    let limit = options
        .npoints
        .filter(|&n| n > 0)
        .unwrap_or(options.max_points);
    let first_data_line = line_no + 1 - usize::from(pending.is_some());
    let rest = pending.take().into_iter().map(Ok).chain(lines);
    let table = read_rows(rest, first_data_line, &header, limit, options)?;

    Ok(LoadedTable {
        skipped_lines: table.skipped_lines + header_lines,
        ..table
    })
}

fn read_rows(
    lines: impl Iterator<Item = std::io::Result<String>>,
    first_data_line: usize,
    header: &HeaderLabels,
    limit: usize,
    options: &ReadOptions,
) -> DataResult<LoadedTable> {
    let field_count = header.field_count();
    let data_count = header.data_column_count();
    let proxy = options.bad_value_proxy;

    let mut categorical: Option<Vec<bool>> = None;
    let mut accumulators: Vec<Accumulator> = Vec::new();
    let mut selection: Vec<u32> = Vec::new();

    let mut rows = 0usize;
    let mut read = 0usize;
    let mut skipped = 0usize;
    let mut cycle = 0usize;
    let mut unreadable = 0usize;

    for raw in lines {
        if rows >= limit {
            break;
        }
        let raw = raw?;
        let line_no = first_data_line + read;
        read += 1;
        if raw.trim().is_empty() || is_comment_line(&raw) {
            skipped += 1;
            continue;
        }
        cycle += 1;

        let line = untab(&raw, options.delimiter);
        if categorical.is_none() {
            if let Some(types) = infer_column_types(&line, field_count, options.delimiter) {
                accumulators = types[..data_count]
                    .iter()
                    .map(|&text| {
                        if text {
                            Accumulator::Categorical(Vec::new(), AsciiDictionary::new())
                        } else {
                            Accumulator::Numeric(Vec::new())
                        }
                    })
                    .collect();
                categorical = Some(types);
            }
        }

        let fields = split_fields(&line, options.delimiter);
        if fields.len() < field_count || categorical.is_none() {
            warn!("not enough data on line {line_no}, skipping this line");
            skipped += 1;
            continue;
        }

        let mut cells: Vec<Cell<'_>> = Vec::with_capacity(data_count);
        let mut row_selection = 0u32;
        let mut bad = false;
        for (j, token) in fields[..field_count].iter().enumerate() {
            let token = token.as_str();
            if j >= data_count {
                row_selection = parse_number(token).map_or(0, |v| v.max(0.0) as u32);
                continue;
            }
            let cell = match &accumulators[j] {
                Accumulator::Categorical(..) if !token.is_empty() => Cell::Token(token),
                _ if token.is_empty() || is_nan_token(token) => Cell::Value(proxy),
                _ => match parse_number(token) {
                    Some(v) => Cell::Value(v),
                    None => {
                        warn!("unreadable data at line {line_no} column {}, skipping entire line", j + 1);
                        unreadable += 1;
                        bad = true;
                        break;
                    }
                },
            };
            if let Cell::Value(v) = cell {
                if v < BAD_DATA_FLAG {
                    warn!("bad data flag (<-90e99) at line {line_no}, column {j} - skipping entire line");
                    bad = true;
                    break;
                }
            }
            cells.push(cell);
        }

        if cycle >= options.unreadable_cycle_length {
            if unreadable >= options.max_unreadable_lines {
                return Err(DataError::UnreadableDataThreshold {
                    unreadable,
                    examined: cycle,
                    line: line_no,
                });
            }
            cycle = 0;
            unreadable = 0;
        }

        if bad {
            skipped += 1;
            continue;
        }

        for (acc, cell) in accumulators.iter_mut().zip(cells) {
            match (acc, cell) {
                (Accumulator::Numeric(values), Cell::Value(v))
                | (Accumulator::Categorical(values, _), Cell::Value(v)) => values.push(v),
                (Accumulator::Categorical(values, dict), Cell::Token(t)) => {
                    values.push(dict.encode(t) as f64)
                }
                (Accumulator::Numeric(values), Cell::Token(_)) => values.push(proxy),
            }
        }
        if header.has_selection {
            selection.push(row_selection);
        }
        rows += 1;
        if rows % 10_000 == 0 {
            info!("read {rows} rows of data");
        }
    }

    let n_text = accumulators
        .iter()
        .filter(|a| matches!(a, Accumulator::Categorical(..)))
        .count();
    if options.commented_labels && data_count > 0 && n_text >= data_count {
        warn!("all columns appear to be ASCII, as if the line of column labels was left uncommented");
    }

    if accumulators.is_empty() {
        accumulators = (0..data_count).map(|_| Accumulator::Numeric(Vec::new())).collect();
    }
    let columns: Vec<Column> = accumulators
        .into_iter()
        .zip(header.data_labels())
        .map(|(acc, label)| acc.into_column(label))
        .collect();
    if n_text > 0 {
        info!("alphabetized ASCII values of {n_text} columns");
    }
    info!(
        "finished reading {}x{rows} data block: {rows} good + {skipped} skipped = {read} lines",
        columns.len()
    );

    Ok(LoadedTable {
        columns,
        selection: header.has_selection.then_some(selection),
        skipped_lines: skipped,
    })
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Write a delimited text table and return the number of data rows written.
///
/// The output starts with a `! File Name:` comment when `file_name` is given,
/// then one label line (prefixed with `!` in commented-labels mode), then one
/// line per row. Categorical cells are written as their tokens and numbers
/// with up to 14 significant digits.
///
/// With an explicit delimiter, fields holding it are double-quoted. In
/// whitespace mode a field can't hold blanks, so blanks in labels and tokens
/// become `_` (and an empty token becomes `_`).
pub fn write_ascii<W: Write>(
    mut out: W,
    view: &TableView<'_>,
    options: &WriteOptions,
    file_name: Option<&str>,
) -> DataResult<usize> {
    if let Some(name) = file_name {
        writeln!(out, "! File Name: {name}")?;
    }

    let whitespace = options.delimiter.is_whitespace();
    let quote_style = if whitespace {
        csv::QuoteStyle::Never
    } else {
        csv::QuoteStyle::Necessary
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter.as_byte())
        .quote_style(quote_style)
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(out);

    let mut replaced = 0usize;
    let mut field = |text: String| -> String {
        if whitespace && (text.is_empty() || text.contains(char::is_whitespace)) {
            replaced += 1;
            return blanks_to_underscores(&text);
        }
        text
    };

    let mut header: Vec<String> = view.columns.iter().map(|c| field(c.label.clone())).collect();
    if options.write_selection {
        header.push(SELECTION_LABEL.to_string());
    }
    if options.commented_labels {
        if let Some(first) = header.first_mut() {
            first.insert(0, '!');
        }
    }
    writer.write_record(&header).map_err(csv_error)?;

    let rows = view.rows_to_write(options);
    let mut record: Vec<String> = Vec::with_capacity(header.len());
    for &row in &rows {
        record.clear();
        record.extend(view.columns.iter().map(|c| {
            if c.is_categorical() {
                field(c.display_value(row))
            } else {
                c.display_value(row)
            }
        }));
        if options.write_selection {
            record.push(view.selection_at(row).to_string());
        }
        writer.write_record(&record).map_err(csv_error)?;
    }
    writer.flush()?;
    if replaced > 0 {
        warn!("replaced blanks with '_' in {replaced} fields so they survive whitespace-delimited reading");
    }
    Ok(rows.len())
}

fn blanks_to_underscores(text: &str) -> String {
    if text.is_empty() {
        return "_".to_string();
    }
    text.chars().map(|c| if c.is_whitespace() { '_' } else { c }).collect()
}

fn csv_error(err: csv::Error) -> DataError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => DataError::Io(io),
        other => DataError::Io(std::io::Error::other(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Delimiter;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn read(text: &str, options: &ReadOptions) -> DataResult<LoadedTable> {
        read_ascii(Cursor::new(text.as_bytes()), options)
    }

    #[test]
    fn mixed_table_with_labels() {
        let t = read("a b c\n1 2 x\n3 4 y\n5 6 x\n", &ReadOptions::default()).unwrap();
        assert_eq!(t.labels(), vec!["a", "b", "c"]);
        assert_eq!(t.rows(), 3);
        assert!(t.selection.is_none());
        assert!(t.columns[2].is_categorical());
        assert_eq!(t.columns[2].dictionary().unwrap().tokens(), &["x", "y"]);
        assert_eq!(t.columns[2].values(), &[0.0, 1.0, 0.0]);
        assert_eq!(t.columns[1].values(), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn numeric_first_line_gets_default_labels() {
        let t = read("1 2\n3 4\n", &ReadOptions::default()).unwrap();
        assert_eq!(t.labels(), vec!["Column_1", "Column_2"]);
        assert_eq!(t.rows(), 2);
        assert_eq!(t.columns[0].values(), &[1.0, 3.0]);
    }

    #[test]
    fn commented_labels_come_from_last_header_line() {
        let options = ReadOptions {
            commented_labels: true,
            ..ReadOptions::default()
        };
        let t = read("# a survey\n!x y\n1 2\n3 4\n", &options).unwrap();
        assert_eq!(t.labels(), vec!["x", "y"]);
        assert_eq!(t.rows(), 2);
    }

    #[test]
    fn categorical_codes_are_alphabetized() {
        let t = read("k v\npear 1\napple 2\nfig 3\n", &ReadOptions::default()).unwrap();
        let k = &t.columns[0];
        assert_eq!(k.dictionary().unwrap().tokens(), &["apple", "fig", "pear"]);
        assert_eq!(k.values(), &[2.0, 0.0, 1.0]);
    }

    #[test]
    fn comma_delimited_with_empty_and_nan_cells() {
        let options = ReadOptions {
            delimiter: Delimiter::Char(','),
            bad_value_proxy: -1.0,
            ..ReadOptions::default()
        };
        let t = read("a,b,c\n1,,NaN\n2,3,4\n", &options).unwrap();
        assert_eq!(t.columns[1].values(), &[-1.0, 3.0]);
        assert_eq!(t.columns[2].values(), &[-1.0, 4.0]);
    }

    #[test]
    fn short_and_flagged_lines_are_skipped() {
        let t = read("a b\n1 2\n3\n-1e101 5\n7 8\n", &ReadOptions::default()).unwrap();
        assert_eq!(t.columns[0].values(), &[1.0, 7.0]);
        assert_eq!(t.skipped_lines, 2);
    }

    #[test]
    fn selection_column_is_consumed() {
        let t = read("a b SELECTION_BY_VP\n1 2 0\n3 4 2\n", &ReadOptions::default()).unwrap();
        assert_eq!(t.cols(), 2);
        assert_eq!(t.selection, Some(vec![0, 2]));
    }

    #[test]
    fn too_much_unreadable_data_aborts() {
        let mut text = String::from("a b\n1 2\n");
        for _ in 0..10 {
            text.push_str("1 oops\n");
        }
        let options = ReadOptions {
            unreadable_cycle_length: 10,
            max_unreadable_lines: 5,
            ..ReadOptions::default()
        };
        assert!(matches!(
            read(&text, &options),
            Err(DataError::UnreadableDataThreshold { .. })
        ));
    }

    #[test]
    fn reading_stops_at_max_points() {
        let options = ReadOptions {
            max_points: 2,
            ..ReadOptions::default()
        };
        let t = read("a b\n1 2\n3 4\n5 6\n", &options).unwrap();
        assert_eq!(t.rows(), 2);
    }

    #[test]
    fn writer_output_layout() {
        let mut dict = AsciiDictionary::new();
        dict.encode("x");
        dict.encode("y");
        let cols = vec![
            Column::numeric("a", vec![1.5, 2.0]),
            Column::categorical("c", vec![1.0, 0.0], dict),
        ];
        let sel = [1, 0];
        let view = TableView::new(&cols, &sel);
        let options = WriteOptions {
            commented_labels: true,
            write_selection: true,
            ..WriteOptions::default()
        };
        let mut out = Vec::new();
        let n = write_ascii(&mut out, &view, &options, Some("t.txt")).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "! File Name: t.txt\n!a c SELECTION_BY_VP\n1.5 y 1\n2 x 0\n"
        );
    }

    fn objects() -> Vec<Column> {
        let dict = AsciiDictionary::from_tokens(["M 31", "NGC, 1234"]);
        vec![
            Column::categorical("obj name", vec![1.0, 0.0], dict),
            Column::numeric("x", vec![1.0, 2.0]),
            Column::numeric("y", vec![3.0, 4.0]),
        ]
    }

    fn write_then_read(columns: &[Column], delimiter: Delimiter) -> LoadedTable {
        let view = TableView::new(columns, &[]);
        let write = WriteOptions {
            delimiter,
            ..WriteOptions::default()
        };
        let mut out = Vec::new();
        write_ascii(&mut out, &view, &write, None).unwrap();
        let read_options = ReadOptions {
            delimiter,
            ..ReadOptions::default()
        };
        read_ascii(Cursor::new(out), &read_options).unwrap()
    }

    #[test]
    fn blanks_in_tokens_survive_whitespace_output() {
        let t = write_then_read(&objects(), Delimiter::Whitespace);
        assert_eq!(t.labels(), vec!["obj_name", "x", "y"]);
        assert_eq!(t.columns[0].display_value(0), "NGC,_1234");
        assert_eq!(t.columns[0].display_value(1), "M_31");
        assert_eq!(t.columns[1].values(), &[1.0, 2.0]);
        assert_eq!(t.columns[2].values(), &[3.0, 4.0]);
    }

    #[test]
    fn delimiter_in_tokens_is_quoted() {
        let t = write_then_read(&objects(), Delimiter::Char(','));
        assert_eq!(t.labels(), vec!["obj name", "x", "y"]);
        assert_eq!(t.columns[0].display_value(0), "NGC, 1234");
        assert_eq!(t.columns[0].display_value(1), "M 31");
        assert_eq!(t.columns[1].values(), &[1.0, 2.0]);
        assert_eq!(t.columns[2].values(), &[3.0, 4.0]);
    }

    #[test]
    fn infinity_spellings_are_unreadable_numbers() {
        let t = read("a b\n1 2\n3 inf\n5 6\n", &ReadOptions::default()).unwrap();
        assert_eq!(t.columns[1].values(), &[2.0, 6.0]);
        assert_eq!(t.skipped_lines, 1);
    }
}
