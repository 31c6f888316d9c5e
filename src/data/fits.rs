use std::collections::HashMap;
use std::io::{Read, Write};

use log::{info, warn};

use super::loader::{LoadedTable, TableView};
use super::model::{AsciiDictionary, Column, SELECTION_LABEL};
use crate::config::{ReadOptions, WriteOptions};
use crate::error::{DataError, DataResult};

/// FITS files are a sequence of 2880-byte blocks.
pub const BLOCK_LEN: usize = 2880;
/// Header cards are 80 ASCII characters each.
pub const CARD_LEN: usize = 80;

/// Extension name written on output tables.
pub const EXTNAME: &str = "VP_OUTPUT_ASCII";
/// Minimum width of categorical fields on output; wider when a column holds
/// longer tokens.
pub const STRING_WIDTH: usize = 20;

// ---------------------------------------------------------------------------
// Header cards
// ---------------------------------------------------------------------------

/// Keyword/value pairs of one header unit.
#[derive(Debug, Default)]
struct Header {
    values: HashMap<String, String>,
}

impl Header {
    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn int(&self, key: &str) -> DataResult<i64> {
        let raw = self
            .get(key)
            .ok_or_else(|| DataError::MalformedHeader(format!("missing {key} keyword")))?;
        raw.parse()
            .map_err(|_| DataError::MalformedHeader(format!("{key} = {raw} is not an integer")))
    }

    fn int_or(&self, key: &str, default: i64) -> DataResult<i64> {
        match self.get(key) {
            Some(_) => self.int(key),
            None => Ok(default),
        }
    }

    /// Size in bytes of the data unit that follows, before block padding.
    fn data_len(&self) -> DataResult<usize> {
        let naxis = self.int_or("NAXIS", 0)?;
        if naxis == 0 {
            return Ok(0);
        }
        let mut elements: i64 = 1;
        for i in 1..=naxis {
            elements *= self.int(&format!("NAXIS{i}"))?;
        }
        let bitpix = self.int_or("BITPIX", 8)?.abs();
        let pcount = self.int_or("PCOUNT", 0)?;
        let gcount = self.int_or("GCOUNT", 1)?;
        Ok((bitpix / 8 * gcount * (pcount + elements)).max(0) as usize)
    }
}

/// Read header blocks up to and including the one holding `END`.
/// Returns `None` at a clean end of file.
fn read_header<R: Read>(reader: &mut R) -> DataResult<Option<Header>> {
    let mut header = Header::default();
    let mut block = [0u8; BLOCK_LEN];
    let mut first = true;
    loop {
        let n = fill(reader, &mut block)?;
        if n == 0 && first {
            return Ok(None);
        }
        if n < BLOCK_LEN {
            return Err(DataError::Truncated("FITS header block is incomplete".into()));
        }
        first = false;
        for card in block.chunks_exact(CARD_LEN) {
            let keyword = String::from_utf8_lossy(&card[..8]);
            let keyword = keyword.trim_end();
            if keyword == "END" {
                return Ok(Some(header));
            }
            if &card[8..10] == b"= " {
                let value = parse_card_value(&String::from_utf8_lossy(&card[10..]));
                header.values.insert(keyword.to_string(), value);
            }
        }
    }
}

/// Value field of a card: quoted strings are unquoted, anything else is cut
/// at the comment separator.
fn parse_card_value(field: &str) -> String {
    let field = field.trim_start();
    if let Some(rest) = field.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        value.trim_end().to_string()
    } else {
        field.split('/').next().unwrap_or("").trim().to_string()
    }
}

fn skip_data<R: Read>(reader: &mut R, len: usize) -> DataResult<()> {
    let padded = padded_len(len) as u64;
    let skipped = std::io::copy(&mut reader.by_ref().take(padded), &mut std::io::sink())?;
    if skipped < padded {
        return Err(DataError::Truncated("FITS data unit is incomplete".into()));
    }
    Ok(())
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_LEN) * BLOCK_LEN
}

// ---------------------------------------------------------------------------
// Table fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldKind {
    Text,
    Integer,
    Real,
}

#[derive(Debug, Clone)]
struct Field {
    label: String,
    kind: FieldKind,
    /// Zero-based byte offset within the row.
    start: usize,
    width: usize,
    null: Option<String>,
}

/// Parse a `TFORMn` value such as `A20`, `I8`, `F10.3`, `E14.6` or `D25.17`.
fn parse_tform(tform: &str) -> Option<(FieldKind, usize)> {
    let tform = tform.trim();
    let kind = match tform.chars().next()?.to_ascii_uppercase() {
        'A' => FieldKind::Text,
        'I' => FieldKind::Integer,
        'F' | 'E' | 'D' => FieldKind::Real,
        _ => return None,
    };
    let width = tform[1..].split('.').next()?.parse().ok()?;
    Some((kind, width))
}

fn table_fields(header: &Header, row_len: usize) -> DataResult<Vec<Field>> {
    let tfields = header.int("TFIELDS")?.max(0) as usize;
    let mut fields = Vec::with_capacity(tfields);
    for i in 1..=tfields {
        let missing = |what: &str| DataError::FitsColumnNotFound {
            index: i,
            detail: format!("no {what}{i} keyword"),
        };
        let label = header.get(&format!("TTYPE{i}")).ok_or_else(|| missing("TTYPE"))?;
        let tform = header.get(&format!("TFORM{i}")).ok_or_else(|| missing("TFORM"))?;
        let tbcol = header.int(&format!("TBCOL{i}")).map_err(|_| missing("TBCOL"))?;
        let (kind, width) = parse_tform(tform).ok_or_else(|| DataError::FitsColumnNotFound {
            index: i,
            detail: format!("unsupported TFORM '{tform}'"),
        })?;
        let start = (tbcol.max(1) - 1) as usize;
        if start + width > row_len {
            return Err(DataError::FitsColumnNotFound {
                index: i,
                detail: format!("field runs past the {row_len}-byte row"),
            });
        }
        fields.push(Field {
            label: label.to_string(),
            kind,
            start,
            width,
            null: header.get(&format!("TNULL{i}")).map(str::to_string),
        });
    }
    Ok(fields)
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read the first ASCII table extension of a FITS file.
pub fn read_fits<R: Read>(mut reader: R, options: &ReadOptions) -> DataResult<LoadedTable> {
    let primary = read_header(&mut reader)?.ok_or(DataError::FitsHduNotFound)?;
    if primary.get("SIMPLE") != Some("T") {
        return Err(DataError::MalformedHeader("not a FITS file (SIMPLE != T)".into()));
    }
    skip_data(&mut reader, primary.data_len()?)?;

    let header = loop {
        let header = read_header(&mut reader)?.ok_or(DataError::FitsHduNotFound)?;
        match header.get("XTENSION") {
            Some("TABLE") => break header,
            other => {
                info!("skipping {} extension", other.unwrap_or("unnamed"));
                skip_data(&mut reader, header.data_len()?)?;
            }
        }
    };

    let row_len = header.int("NAXIS1")?.max(0) as usize;
    let nrows = header.int("NAXIS2")?.max(0) as usize;
    let fields = table_fields(&header, row_len)?;
    info!("ASCII table extension, ({nrows}x{})", fields.len());

    if fields.len() > options.max_vars {
        return Err(DataError::TooManyColumns {
            found: fields.len(),
            limit: options.max_vars,
        });
    }
    if nrows > options.max_points {
        return Err(DataError::TooManyRows {
            found: nrows,
            limit: options.max_points,
        });
    }

    let has_selection = options.read_selection
        && fields
            .last()
            .is_some_and(|f| f.label.starts_with(SELECTION_LABEL));
    if has_selection {
        info!("last column holds selection information");
    }

    let mut data = vec![0u8; row_len * nrows];
    if fill(&mut reader, &mut data)? < data.len() {
        return Err(DataError::Truncated(format!("FITS table should hold {nrows} rows")));
    }

    let proxy = options.bad_value_proxy;
    let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(nrows); fields.len()];
    let mut dictionaries: Vec<Option<AsciiDictionary>> = fields
        .iter()
        .map(|f| (f.kind == FieldKind::Text).then(AsciiDictionary::new))
        .collect();
    let mut unparsed = 0usize;

    for row in data.chunks_exact(row_len.max(1)).take(nrows) {
        for (j, field) in fields.iter().enumerate() {
            let raw = String::from_utf8_lossy(&row[field.start..field.start + field.width]);
            let token = raw.trim();
            let v = match &mut dictionaries[j] {
                Some(dict) => dict.encode(token) as f64,
                None if token.is_empty() || field.null.as_deref() == Some(token) => proxy,
                None => match token.replace(['D', 'd'], "E").parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => {
                        unparsed += 1;
                        proxy
                    }
                },
            };
            values[j].push(v);
        }
    }
    if unparsed > 0 {
        warn!("{unparsed} FITS table cells were unreadable and set to {proxy}");
    }

    let selection = if has_selection {
        dictionaries.pop();
        values
            .pop()
            .map(|flags| flags.into_iter().map(|v| v.max(0.0) as u32).collect())
    } else {
        None
    };
    let columns = fields
        .into_iter()
        .zip(values)
        .zip(dictionaries)
        .map(|((field, values), dict)| match dict {
            Some(dict) => {
                let mut column = Column::categorical(field.label, values, dict);
                column.finalize_ascii_ordering();
                column
            }
            None => Column::numeric(field.label, values),
        })
        .collect();

    Ok(LoadedTable {
        columns,
        selection,
        skipped_lines: 0,
    })
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

struct CardWriter {
    buf: Vec<u8>,
}

impl CardWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn raw(&mut self, card: &str) {
        let mut card: String = card.chars().filter(char::is_ascii).take(CARD_LEN).collect();
        while card.len() < CARD_LEN {
            card.push(' ');
        }
        self.buf.extend_from_slice(card.as_bytes());
    }

    fn value(&mut self, key: &str, value: impl std::fmt::Display) {
        self.raw(&format!("{key:<8}= {value:>20}"));
    }

    fn string(&mut self, key: &str, value: &str) {
        let escaped: String = value.replace('\'', "''").chars().take(66).collect();
        self.raw(&format!("{key:<8}= '{escaped:<8}'"));
    }

    fn finish(mut self) -> Vec<u8> {
        self.raw("END");
        self.buf.resize(padded_len(self.buf.len()), b' ');
        self.buf
    }
}

/// Fortran `Ew.d` rendering: `-1.234560E+02`, right-aligned in `width`.
fn fortran_e(v: f64, width: usize, decimals: usize) -> String {
    if !v.is_finite() {
        return format!("{v:>width$}");
    }
    let s = format!("{v:.decimals$e}");
    let (mantissa, exponent) = s.split_once('e').unwrap_or((&s, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{:>width$}", format!("{mantissa}E{sign}{:02}", exponent.abs()))
}

fn fit_text(token: &str, width: usize) -> String {
    let mut text: String = token.chars().filter(char::is_ascii).take(width).collect();
    while text.len() < width {
        text.push(' ');
    }
    text
}

/// Write a FITS file holding an empty primary unit and one ASCII table
/// extension; returns the number of rows written.
pub fn write_fits<W: Write>(mut out: W, view: &TableView<'_>, options: &WriteOptions) -> DataResult<usize> {
    let mut primary = CardWriter::new();
    primary.value("SIMPLE", "T");
    primary.value("BITPIX", 8);
    primary.value("NAXIS", 0);
    primary.value("EXTEND", "T");
    out.write_all(&primary.finish())?;

    // (label, TFORM, width)
    let mut layout: Vec<(&str, String, usize)> = view
        .columns
        .iter()
        .map(|c| {
            if c.is_categorical() {
                let width = c
                    .dictionary()
                    .and_then(|dict| dict.tokens().iter().map(|t| t.chars().filter(char::is_ascii).count()).max())
                    .unwrap_or(0)
                    .max(STRING_WIDTH);
                (c.label.as_str(), format!("A{width}"), width)
            } else {
                (c.label.as_str(), "E14.6".to_string(), 14)
            }
        })
        .collect();
    if options.write_selection {
        layout.push((SELECTION_LABEL, "I8".to_string(), 8));
    }
    let row_len = layout.iter().map(|(_, _, w)| w).sum::<usize>() + layout.len().saturating_sub(1);
    let rows = view.rows_to_write(options);

    let mut header = CardWriter::new();
    header.string("XTENSION", "TABLE");
    header.value("BITPIX", 8);
    header.value("NAXIS", 2);
    header.value("NAXIS1", row_len);
    header.value("NAXIS2", rows.len());
    header.value("PCOUNT", 0);
    header.value("GCOUNT", 1);
    header.value("TFIELDS", layout.len());
    let mut tbcol = 1;
    for (i, (label, tform, width)) in layout.iter().enumerate() {
        let n = i + 1;
        header.string(&format!("TTYPE{n}"), label);
        header.value(&format!("TBCOL{n}"), tbcol);
        header.string(&format!("TFORM{n}"), tform);
        tbcol += width + 1;
    }
    header.string("EXTNAME", EXTNAME);
    out.write_all(&header.finish())?;

    let mut data = Vec::with_capacity(padded_len(row_len * rows.len()));
    for &row in &rows {
        let mut line = String::with_capacity(row_len);
        for (j, (column, (_, _, width))) in view.columns.iter().zip(&layout).enumerate() {
            if j > 0 {
                line.push(' ');
            }
            if column.is_categorical() {
                line.push_str(&fit_text(&column.display_value(row), *width));
            } else {
                line.push_str(&fortran_e(column.values()[row], 14, 6));
            }
        }
        if options.write_selection {
            if !view.columns.is_empty() {
                line.push(' ');
            }
            line.push_str(&format!("{:>8}", view.selection_at(row)));
        }
        data.extend_from_slice(line.as_bytes());
    }
    data.resize(padded_len(data.len()), b' ');
    out.write_all(&data)?;
    Ok(rows.len())
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn card_values() {
        assert_eq!(parse_card_value("                   T / flag"), "T");
        assert_eq!(parse_card_value(" 'TABLE   '           / type"), "TABLE");
        assert_eq!(parse_card_value(" 'O''Brien'"), "O'Brien");
    }

    #[test]
    fn tform_parsing() {
        assert_eq!(parse_tform("E14.6"), Some((FieldKind::Real, 14)));
        assert_eq!(parse_tform("A20"), Some((FieldKind::Text, 20)));
        assert_eq!(parse_tform("I8"), Some((FieldKind::Integer, 8)));
        assert_eq!(parse_tform("D25.17"), Some((FieldKind::Real, 25)));
        assert_eq!(parse_tform("X3"), None);
    }

    #[test]
    fn fortran_exponent_form() {
        assert_eq!(fortran_e(-123.456, 14, 6), " -1.234560E+02");
        assert_eq!(fortran_e(0.0, 14, 6), "  0.000000E+00");
        assert_eq!(fortran_e(2.5e-7, 14, 6), "  2.500000E-07");
    }

    #[test]
    fn table_round_trip() {
        let mut dict = AsciiDictionary::new();
        dict.encode("north");
        dict.encode("south");
        let cols = vec![
            Column::numeric("flux", vec![1.25, -3.0, 1e5]),
            Column::categorical("region", vec![1.0, 0.0, 1.0], dict),
        ];
        let sel = [0, 1, 2];
        let view = TableView::new(&cols, &sel);
        let options = WriteOptions {
            write_selection: true,
            ..WriteOptions::default()
        };
        let mut out = Vec::new();
        assert_eq!(write_fits(&mut out, &view, &options).unwrap(), 3);
        assert_eq!(out.len() % BLOCK_LEN, 0);

        let t = read_fits(Cursor::new(out), &ReadOptions::default()).unwrap();
        assert_eq!(t.labels(), vec!["flux", "region"]);
        assert_eq!(t.columns[0].values(), &[1.25, -3.0, 1e5]);
        assert_eq!(t.columns[1].display_value(0), "south");
        assert_eq!(t.columns[1].display_value(1), "north");
        assert_eq!(t.selection, Some(vec![0, 1, 2]));
    }

    #[test]
    fn file_without_table_has_no_hdu() {
        let mut primary = CardWriter::new();
        primary.value("SIMPLE", "T");
        primary.value("BITPIX", 8);
        primary.value("NAXIS", 0);
        let bytes = primary.finish();
        assert!(matches!(
            read_fits(Cursor::new(bytes), &ReadOptions::default()),
            Err(DataError::FitsHduNotFound)
        ));
    }

    #[test]
    fn null_marker_maps_to_proxy() {
        let mut primary = CardWriter::new();
        primary.value("SIMPLE", "T");
        primary.value("NAXIS", 0);
        let mut header = CardWriter::new();
        header.string("XTENSION", "TABLE");
        header.value("NAXIS", 2);
        header.value("NAXIS1", 9);
        header.value("NAXIS2", 2);
        header.value("TFIELDS", 2);
        header.string("TTYPE1", "a");
        header.value("TBCOL1", 1);
        header.string("TFORM1", "I4");
        header.string("TNULL1", "-99");
        header.string("TTYPE2", "b");
        header.value("TBCOL2", 6);
        header.string("TFORM2", "D4.1");
        let mut bytes = primary.finish();
        bytes.extend(header.finish());
        let mut data = b" -99 1D1    7 2.5".to_vec();
        data.resize(BLOCK_LEN, b' ');
        bytes.extend(data);

        let options = ReadOptions {
            bad_value_proxy: -1.0,
            ..ReadOptions::default()
        };
        let t = read_fits(Cursor::new(bytes), &options).unwrap();
        assert_eq!(t.columns[0].values(), &[-1.0, 7.0]);
        assert_eq!(t.columns[1].values(), &[10.0, 2.5]);
    }

    #[test]
    fn long_tokens_widen_the_string_field() {
        let prefix = "2MASS J05351234-05220000";
        let long = [format!("{prefix} a"), format!("{prefix} b")];
        let cols = vec![
            Column::categorical("source", vec![0.0, 1.0], AsciiDictionary::from_tokens(long.clone())),
            Column::numeric("mag", vec![12.5, 13.25]),
        ];
        let view = TableView::new(&cols, &[]);
        let mut out = Vec::new();
        write_fits(&mut out, &view, &WriteOptions::default()).unwrap();

        let t = read_fits(Cursor::new(out), &ReadOptions::default()).unwrap();
        let source = t.columns[0].dictionary().unwrap();
        assert_eq!(source.tokens(), long.as_slice());
        assert_eq!(t.columns[0].display_value(1), long[1]);
        assert_eq!(t.columns[1].values(), &[12.5, 13.25]);
    }
}
