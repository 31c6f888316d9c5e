use std::borrow::Cow;

use log::{debug, info, warn};

use super::model::SELECTION_LABEL;
use crate::config::{Delimiter, ReadOptions};
use crate::error::{DataError, DataResult};

/// Characters that open a comment line in text headers and data.
pub const COMMENT_CHARS: [char; 3] = ['!', '#', '%'];

/// Replacement label for an empty field in a character-delimited header.
pub const EMPTY_LABEL: &str = "Dummy";

// ---------------------------------------------------------------------------
// Tokenizing
// ---------------------------------------------------------------------------

pub fn is_comment_line(line: &str) -> bool {
    line.starts_with(COMMENT_CHARS)
}

/// Split one line into fields.
///
/// Whitespace mode collapses runs of blanks and never yields empty fields.
/// Character mode goes through a `csv` reader, so empty fields are kept,
/// blanks around each field are trimmed and double-quoted fields may hold
/// the delimiter. Tabs count as blanks unless the tab is itself the
/// delimiter.
pub fn split_fields(line: &str, delimiter: Delimiter) -> Vec<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    match delimiter {
        Delimiter::Whitespace => line.split_whitespace().map(str::to_string).collect(),
        Delimiter::Char(_) if line.is_empty() => Vec::new(),
        Delimiter::Char(c) if !c.is_ascii() => line.split(c).map(|field| field.trim().to_string()).collect(),
        Delimiter::Char(c) => {
            let mut reader = csv::ReaderBuilder::new()
                .delimiter(delimiter.as_byte())
                .has_headers(false)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_reader(line.as_bytes());
            let mut record = csv::StringRecord::new();
            match reader.read_record(&mut record) {
                Ok(true) => record.iter().map(str::to_string).collect(),
                Ok(false) => Vec::new(),
                Err(e) => {
                    debug!("csv couldn't split '{line}' ({e}), splitting on '{c}'");
                    line.split(c).map(|field| field.trim().to_string()).collect()
                }
            }
        }
    }
}

/// `NaN`, `NAN` and `nan` are numeric in the input, mapped to the bad-value
/// proxy.
pub fn is_nan_token(token: &str) -> bool {
    matches!(token, "NaN" | "NAN" | "nan")
}

/// Parse a plain decimal number. The `inf`, `infinity` and `nan` spellings
/// that `f64::from_str` also accepts are left to the categorical path.
pub fn parse_number(token: &str) -> Option<f64> {
    if token
        .chars()
        .any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E'))
    {
        return None;
    }
    token.parse().ok()
}

/// Whether a token reads as a number (NaN spellings included).
pub fn is_numeric_token(token: &str) -> bool {
    is_nan_token(token) || parse_number(token).is_some()
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Column labels found in a header line.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderLabels {
    /// Every label in the line, selection column included.
    pub labels: Vec<String>,
    /// The last label starts with `SELECTION_BY_VP`.
    pub has_selection: bool,
}

impl HeaderLabels {
    /// Number of fields expected on each data line.
    pub fn field_count(&self) -> usize {
        self.labels.len()
    }

    /// Number of data (non-selection) columns.
    pub fn data_column_count(&self) -> usize {
        self.labels.len() - usize::from(self.has_selection)
    }

    pub fn data_labels(&self) -> &[String] {
        &self.labels[..self.data_column_count()]
    }
}

/// `Column_1`, `Column_2`, ...
pub fn default_labels(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Column_{i}")).collect()
}

/// Extract column labels from `line`.
///
/// With `generate_defaults` the line is only used to count fields and the
/// labels are generated. Otherwise a single leading comment character is
/// stripped and each field becomes a label, with [`EMPTY_LABEL`] standing in
/// for empty ones. The set is then truncated to `nvars` (with a warning) and
/// checked against the two-column minimum and `max_vars`.
pub fn extract_column_labels(
    line: &str,
    generate_defaults: bool,
    options: &ReadOptions,
) -> DataResult<HeaderLabels> {
    let mut labels: Vec<String> = if generate_defaults {
        let line = untab(line, options.delimiter);
        let labels = default_labels(split_fields(&line, options.delimiter).len());
        info!("generated {} default column labels", labels.len());
        labels
    } else {
        let line = line.strip_prefix(COMMENT_CHARS).unwrap_or(line);
        let labels: Vec<String> = split_fields(line, options.delimiter)
            .into_iter()
            .map(|field| {
                if field.is_empty() {
                    EMPTY_LABEL.to_string()
                } else {
                    field
                }
            })
            .collect();
        info!("extracted {} column labels", labels.len());
        labels
    };

    if let Some(nvars) = options.nvars.filter(|&n| n > 0) {
        if labels.len() > nvars {
            labels.truncate(nvars);
            warn!("too many variables, truncated list to {nvars} column labels");
        }
    }

    if labels.len() <= 1 {
        return Err(DataError::TooFewColumns { found: labels.len() });
    }
    if labels.len() > options.max_vars {
        return Err(DataError::TooManyColumns {
            found: labels.len(),
            limit: options.max_vars,
        });
    }

    let has_selection = options.read_selection
        && labels
            .last()
            .is_some_and(|label| label.starts_with(SELECTION_LABEL));
    if has_selection {
        info!("last column holds selection information");
    }

    info!(
        "read {} {} column labels: {}",
        labels.len(),
        options.delimiter.describe(),
        labels.join(", ")
    );
    Ok(HeaderLabels {
        labels,
        has_selection,
    })
}

/// Per-column categorical flags inferred from the first data line.
///
/// Returns `None` when the line has fewer fields than there are labels.
pub fn infer_column_types(line: &str, field_count: usize, delimiter: Delimiter) -> Option<Vec<bool>> {
    let line = untab(line, delimiter);
    let fields = split_fields(&line, delimiter);
    if fields.len() < field_count {
        warn!("not enough data on first line to infer column types");
        return None;
    }
    Some(
        fields[..field_count]
            .iter()
            .map(|token| !token.is_empty() && !is_numeric_token(token))
            .collect(),
    )
}

/// Outside tab-delimited mode, tabs are plain blanks.
pub(crate) fn untab(line: &str, delimiter: Delimiter) -> Cow<'_, str> {
    if delimiter != Delimiter::Char('\t') && line.contains('\t') {
        Cow::Owned(line.replace('\t', " "))
    } else {
        Cow::Borrowed(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn opts(delimiter: Delimiter) -> ReadOptions {
        ReadOptions {
            delimiter,
            ..ReadOptions::default()
        }
    }

    #[test]
    fn whitespace_fields_collapse_runs() {
        assert_eq!(split_fields("  a \t b   c\r\n", Delimiter::Whitespace), vec!["a", "b", "c"]);
    }

    #[test]
    fn character_fields_keep_empties() {
        assert_eq!(split_fields("a, b,,c ", Delimiter::Char(',')), vec!["a", "b", "", "c"]);
        assert_eq!(split_fields("a\t \tb", Delimiter::Char('\t')), vec!["a", "", "b"]);
    }

    #[test]
    fn labels_from_plain_and_commented_lines() {
        let h = extract_column_labels("a b c", false, &opts(Delimiter::Whitespace)).unwrap();
        assert_eq!(h.labels, vec!["a", "b", "c"]);
        assert!(!h.has_selection);

        let h = extract_column_labels("!x,,z", false, &opts(Delimiter::Char(','))).unwrap();
        assert_eq!(h.labels, vec!["x", EMPTY_LABEL, "z"]);
    }

    #[test]
    fn default_labels_count_fields() {
        let h = extract_column_labels("1 2 3 4", true, &opts(Delimiter::Whitespace)).unwrap();
        assert_eq!(h.labels, vec!["Column_1", "Column_2", "Column_3", "Column_4"]);
    }

    #[test]
    fn selection_column_is_detected() {
        let h = extract_column_labels("a b SELECTION_BY_VP", false, &opts(Delimiter::Whitespace)).unwrap();
        assert!(h.has_selection);
        assert_eq!(h.data_labels(), &["a", "b"]);
        assert_eq!(h.field_count(), 3);

        let mut o = opts(Delimiter::Whitespace);
        o.read_selection = false;
        let h = extract_column_labels("a b SELECTION_BY_VP", false, &o).unwrap();
        assert!(!h.has_selection);
    }

    #[test]
    fn column_count_limits() {
        assert!(matches!(
            extract_column_labels("lonely", false, &opts(Delimiter::Whitespace)),
            Err(DataError::TooFewColumns { found: 1 })
        ));

        let mut o = opts(Delimiter::Whitespace);
        o.max_vars = 2;
        assert!(matches!(
            extract_column_labels("a b c", false, &o),
            Err(DataError::TooManyColumns { found: 3, limit: 2 })
        ));

        o.max_vars = 10;
        o.nvars = Some(2);
        let h = extract_column_labels("a b c", false, &o).unwrap();
        assert_eq!(h.labels, vec!["a", "b"]);
    }

    #[test]
    fn type_inference_treats_nan_as_numeric() {
        let types = infer_column_types("1 NaN x 2e3", 4, Delimiter::Whitespace).unwrap();
        assert_eq!(types, vec![false, false, true, false]);
        assert_eq!(infer_column_types("1 2", 3, Delimiter::Whitespace), None);
    }

    #[test]
    fn only_exact_nan_spellings_are_numeric() {
        let types = infer_column_types("NaNcy inf Infinity nAn Nan NAN -1.5E-3", 7, Delimiter::Whitespace).unwrap();
        assert_eq!(types, vec![true, true, true, true, true, false, false]);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("-1.5E-3"), Some(-1.5e-3));
    }

    #[test]
    fn quoted_fields_may_hold_the_delimiter() {
        assert_eq!(
            split_fields("\"NGC, 1234\", 7 ,\"\"", Delimiter::Char(',')),
            vec!["NGC, 1234", "7", ""]
        );
        assert_eq!(split_fields("", Delimiter::Char(',')), Vec::<String>::new());
    }
}
