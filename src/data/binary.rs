use std::io::{BufRead, Read, Write};

use log::{info, warn};

use super::labels::extract_column_labels;
use super::loader::{LoadedTable, TableView};
use super::model::{AsciiDictionary, Column, SELECTION_LABEL};
use crate::config::{BinaryOrdering, Delimiter, ReadOptions, WriteOptions};
use crate::error::{DataError, DataResult};

/// First token of the extended header, which carries per-column type tags
/// and categorical dictionaries.
pub const EXTENDED_HEADER_MARKER: &str = "BINARY_FILE_WITH_ASCII_VP";

/// Bound on one extended-header column line. Those lines carry whole
/// categorical dictionaries, so they are not held to the label-line limit.
pub const MAX_DICTIONARY_LINE: usize = 64 << 20;

const FLOAT_TAG: &str = "TFLOAT";
const STRING_TAG: &str = "TSTRING";
const SELECTION_TAG: &str = "TLONG";

/// Header description of one binary field.
#[derive(Debug, Clone, PartialEq)]
struct FieldSpec {
    label: String,
    dictionary: Option<AsciiDictionary>,
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read a binary table: one text header followed by little-endian `f32`
/// records.
pub fn read_binary<R: BufRead>(mut reader: R, options: &ReadOptions) -> DataResult<LoadedTable> {
    let max_header = options.max_vars * 100;
    let first = read_header_line(&mut reader, max_header)?
        .ok_or_else(|| DataError::Truncated("binary file has no header".into()))?;

    let (fields, has_selection) = if first.contains(EXTENDED_HEADER_MARKER) {
        read_extended_header(&mut reader, &first, options)?
    } else {
        let delimiter = if first.contains('\t') {
            info!("header is TAB delimited");
            Delimiter::Char('\t')
        } else {
            info!("header is WHITESPACE delimited");
            Delimiter::Whitespace
        };
        let header = extract_column_labels(
            &first,
            false,
            &ReadOptions {
                delimiter,
                ..options.clone()
            },
        )?;
        let fields = header
            .labels
            .into_iter()
            .map(|label| FieldSpec {
                label,
                dictionary: None,
            })
            .collect();
        (fields, header.has_selection)
    };

    let nfields = fields.len();
    let ndata = nfields - usize::from(has_selection);
    info!("about to read {ndata} variables with {nfields} fields per record");

    let mut data: Vec<Vec<f64>> = vec![Vec::new(); nfields];
    match options.ordering {
        BinaryOrdering::ColumnMajor => {
            let limit = options.npoints.filter(|&n| n > 0).unwrap_or(options.max_points);
            let mut record = vec![0u8; nfields * 4];
            let mut rows = 0usize;
            while rows < limit {
                match fill(&mut reader, &mut record)? {
                    0 => break,
                    n if n < record.len() => {
                        return Err(DataError::Truncated(format!(
                            "row {} holds {} of {nfields} values",
                            rows + 1,
                            n / 4
                        )));
                    }
                    _ => {}
                }
                for (column, chunk) in data.iter_mut().zip(record.chunks_exact(4)) {
                    column.push(decode_f32(chunk));
                }
                rows += 1;
            }
        }
        BinaryOrdering::RowMajor => {
            let npoints = options
                .npoints
                .filter(|&n| n > 0)
                .ok_or(DataError::RowMajorNeedsPointCount)?;
            if npoints > options.max_points {
                return Err(DataError::TooManyRows {
                    found: npoints,
                    limit: options.max_points,
                });
            }
            let mut block = vec![0u8; npoints * 4];
            for (i, column) in data.iter_mut().enumerate() {
                let n = fill(&mut reader, &mut block)?;
                if n < block.len() {
                    return Err(DataError::Truncated(format!(
                        "column {} holds {} of {npoints} values",
                        i + 1,
                        n / 4
                    )));
                }
                column.extend(block.chunks_exact(4).map(decode_f32));
            }
        }
    }

    let selection = if has_selection {
        data.pop()
            .map(|flags| flags.into_iter().map(|v| v.max(0.0) as u32).collect())
    } else {
        None
    };
    let columns = fields
        .into_iter()
        .take(ndata)
        .zip(data)
        .map(|(field, values)| match field.dictionary {
            Some(dict) => Column::categorical(field.label, values, dict),
            None => Column::numeric(field.label, values),
        })
        .collect();

    Ok(LoadedTable {
        columns,
        selection,
        skipped_lines: 0,
    })
}

fn read_extended_header<R: BufRead>(
    reader: &mut R,
    first: &str,
    options: &ReadOptions,
) -> DataResult<(Vec<FieldSpec>, bool)> {
    let count: usize = first
        .split('\t')
        .nth(1)
        .and_then(|t| t.trim().parse().ok())
        .ok_or_else(|| DataError::MalformedHeader(format!("missing column count in '{}'", first.trim_end())))?;
    if count > options.max_vars {
        return Err(DataError::TooManyColumns {
            found: count,
            limit: options.max_vars,
        });
    }
    if count <= 1 {
        return Err(DataError::TooFewColumns { found: count });
    }

    let mut fields = Vec::with_capacity(count);
    for i in 0..count {
        let line = read_header_line(reader, MAX_DICTIONARY_LINE)?
            .ok_or_else(|| DataError::Truncated(format!("header describes {count} columns, found {i}")))?;
        let mut parts = line.trim_end_matches(['\r', '\n']).split('\t');
        let label = parts.next().unwrap_or_default().to_string();
        let tag = parts.next().unwrap_or(FLOAT_TAG);
        let tokens: Vec<&str> = parts.collect();
        let dictionary = (tag == STRING_TAG || !tokens.is_empty()).then(|| AsciiDictionary::from_tokens(tokens));
        fields.push(FieldSpec { label, dictionary });
    }

    let has_selection = options.read_selection
        && fields
            .last()
            .is_some_and(|f| f.label.starts_with(SELECTION_LABEL));
    if has_selection {
        info!("last column holds selection information");
    }
    Ok((fields, has_selection))
}

/// One `\n`-terminated header line, at most `limit` bytes long.
fn read_header_line<R: BufRead>(reader: &mut R, limit: usize) -> DataResult<Option<String>> {
    let mut buf = Vec::new();
    let n = reader.by_ref().take(limit as u64).read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    if n >= limit && buf.last() != Some(&b'\n') {
        return Err(DataError::HeaderTooLong { limit });
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Read until `buf` is full or the input ends; returns the bytes read.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> DataResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

fn decode_f32(chunk: &[u8]) -> f64 {
    f64::from(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Write a binary table and return the number of rows written.
///
/// Tables with categorical columns get the extended header so their
/// dictionaries survive; purely numeric tables get a plain tab-delimited
/// label line. Records are column-major little-endian `f32`.
pub fn write_binary<W: Write>(mut out: W, view: &TableView<'_>, options: &WriteOptions) -> DataResult<usize> {
    if view.has_categorical() {
        let count = view.columns.len() + usize::from(options.write_selection);
        writeln!(out, "{EXTENDED_HEADER_MARKER}\t{count}")?;
        for column in view.columns {
            match column.dictionary() {
                Some(dict) => {
                    write!(out, "{}\t{STRING_TAG}", column.label)?;
                    for token in dict.tokens() {
                        write!(out, "\t{token}")?;
                    }
                    writeln!(out)?;
                }
                None => writeln!(out, "{}\t{FLOAT_TAG}", column.label)?,
            }
        }
        if options.write_selection {
            writeln!(out, "{SELECTION_LABEL}\t{SELECTION_TAG}")?;
        }
    } else {
        let mut labels: Vec<&str> = view.columns.iter().map(|c| c.label.as_str()).collect();
        if options.write_selection {
            labels.push(SELECTION_LABEL);
        }
        writeln!(out, "{}", labels.join("\t"))?;
    }

    let rows = view.rows_to_write(options);
    let mut record = Vec::with_capacity((view.columns.len() + 1) * 4);
    for &row in &rows {
        record.clear();
        for column in view.columns {
            record.extend_from_slice(&(column.values()[row] as f32).to_le_bytes());
        }
        if options.write_selection {
            record.extend_from_slice(&(view.selection_at(row) as f32).to_le_bytes());
        }
        out.write_all(&record)?;
    }
    if rows.len() < view.rows() {
        warn!("wrote {} of {} rows (selected only)", rows.len(), view.rows());
    }
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn extended_header_with_dictionary() {
        let mut bytes = b"BINARY_FILE_WITH_ASCII_VP\t2\nlabelA\tTFLOAT\nlabelB\tTSTRING\tfoo\tbar\n".to_vec();
        bytes.extend(floats(&[1.5, 1.0, 2.5, 0.0, 3.5, 1.0]));
        let t = read_binary(Cursor::new(bytes), &ReadOptions::default()).unwrap();

        assert_eq!(t.labels(), vec!["labelA", "labelB"]);
        assert!(t.selection.is_none());
        assert_eq!(t.columns[0].values(), &[1.5, 2.5, 3.5]);
        let dict = t.columns[1].dictionary().unwrap();
        assert_eq!(dict.code("foo"), Some(0));
        assert_eq!(dict.code("bar"), Some(1));
        assert_eq!(t.columns[1].display_value(1), "foo");
    }

    #[test]
    fn plain_header_whitespace_and_tab() {
        let mut bytes = b"x y\n".to_vec();
        bytes.extend(floats(&[1.0, 2.0, 3.0, 4.0]));
        let t = read_binary(Cursor::new(bytes), &ReadOptions::default()).unwrap();
        assert_eq!(t.labels(), vec!["x", "y"]);
        assert_eq!(t.columns[1].values(), &[2.0, 4.0]);

        let mut bytes = b"first col\tsecond col\n".to_vec();
        bytes.extend(floats(&[1.0, 2.0]));
        let t = read_binary(Cursor::new(bytes), &ReadOptions::default()).unwrap();
        assert_eq!(t.labels(), vec!["first col", "second col"]);
    }

    #[test]
    fn row_major_needs_point_count() {
        let mut bytes = b"x y\n".to_vec();
        bytes.extend(floats(&[1.0, 2.0, 3.0, 4.0]));
        let options = ReadOptions {
            ordering: BinaryOrdering::RowMajor,
            ..ReadOptions::default()
        };
        assert!(matches!(
            read_binary(Cursor::new(bytes.clone()), &options),
            Err(DataError::RowMajorNeedsPointCount)
        ));

        let options = ReadOptions {
            npoints: Some(2),
            ..options
        };
        let t = read_binary(Cursor::new(bytes), &options).unwrap();
        assert_eq!(t.columns[0].values(), &[1.0, 2.0]);
        assert_eq!(t.columns[1].values(), &[3.0, 4.0]);
    }

    #[test]
    fn partial_record_is_truncation() {
        let mut bytes = b"x y\n".to_vec();
        bytes.extend(floats(&[1.0, 2.0, 3.0]));
        assert!(matches!(
            read_binary(Cursor::new(bytes), &ReadOptions::default()),
            Err(DataError::Truncated(_))
        ));
    }

    #[test]
    fn overlong_header_is_rejected() {
        let options = ReadOptions {
            max_vars: 2,
            ..ReadOptions::default()
        };
        let bytes = vec![b'a'; 500];
        assert!(matches!(
            read_binary(Cursor::new(bytes), &options),
            Err(DataError::HeaderTooLong { limit: 200 })
        ));
    }

    #[test]
    fn selection_flags_round_trip() {
        let cols = vec![
            Column::numeric("a", vec![1.0, 2.0]),
            Column::numeric("b", vec![3.0, 4.0]),
        ];
        let sel = [0, 3];
        let view = TableView::new(&cols, &sel);
        let options = WriteOptions {
            write_selection: true,
            ..WriteOptions::default()
        };
        let mut out = Vec::new();
        assert_eq!(write_binary(&mut out, &view, &options).unwrap(), 2);
        assert!(out.starts_with(b"a\tb\tSELECTION_BY_VP\n"));

        let t = read_binary(Cursor::new(out), &ReadOptions::default()).unwrap();
        assert_eq!(t.cols(), 2);
        assert_eq!(t.selection, Some(vec![0, 3]));
        assert_eq!(t.columns[1].values(), &[3.0, 4.0]);
    }

    #[test]
    fn large_dictionary_round_trip() {
        let tokens: Vec<String> = (0..3000).map(|i| format!("token_{i:05}")).collect();
        let codes: Vec<f64> = (0..3000).rev().map(f64::from).collect();
        let cols = vec![
            Column::categorical("name", codes.clone(), AsciiDictionary::from_tokens(tokens.clone())),
            Column::numeric("x", (0..3000).map(f64::from).collect()),
        ];
        let view = TableView::new(&cols, &[]);
        let mut out = Vec::new();
        write_binary(&mut out, &view, &WriteOptions::default()).unwrap();

        let t = read_binary(Cursor::new(out), &ReadOptions::default()).unwrap();
        assert_eq!(t.rows(), 3000);
        assert_eq!(t.columns[0].dictionary().unwrap().tokens(), tokens.as_slice());
        assert_eq!(t.columns[0].values(), codes.as_slice());
        assert_eq!(t.columns[0].display_value(0), "token_02999");
    }
}
