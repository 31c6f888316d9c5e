use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Label of the trailing "no axis selected" column.
pub const SENTINEL_LABEL: &str = "-nothing-";

/// A trailing column whose label starts with this prefix holds selection
/// flags rather than data.
pub const SELECTION_LABEL: &str = "SELECTION_BY_VP";

/// Values below this are a bad-data flag in ASCII input.
pub const BAD_DATA_FLAG: f64 = -90e99;

// ---------------------------------------------------------------------------
// AsciiDictionary – token <-> integer code lookup for categorical columns
// ---------------------------------------------------------------------------

/// Bidirectional lookup between string tokens and the integer codes stored
/// in a categorical column. Codes are dense: `0..len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AsciiDictionary {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
}

impl AsciiDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dictionary whose codes are the positions in `tokens`.
    /// Repeated tokens keep their first position.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dict = Self::new();
        for token in tokens {
            dict.encode_owned(token.into());
        }
        dict
    }

    /// Code for `token`, inserting it with the next free code if unseen.
    pub fn encode(&mut self, token: &str) -> usize {
        if let Some(&code) = self.index.get(token) {
            return code;
        }
        self.encode_owned(token.to_string())
    }

    fn encode_owned(&mut self, token: String) -> usize {
        if let Some(&code) = self.index.get(&token) {
            return code;
        }
        let code = self.tokens.len();
        self.index.insert(token.clone(), code);
        self.tokens.push(token);
        code
    }

    pub fn code(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn token(&self, code: usize) -> Option<&str> {
        self.tokens.get(code).map(String::as_str)
    }

    /// Tokens in code order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Re-sort tokens lexically and return the old-code -> new-code mapping.
    pub fn alphabetize(&mut self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.tokens.len()).collect();
        order.sort_by(|&a, &b| self.tokens[a].cmp(&self.tokens[b]));

        let mut remap = vec![0; self.tokens.len()];
        for (new_code, &old_code) in order.iter().enumerate() {
            remap[old_code] = new_code;
        }

        let mut sorted = Vec::with_capacity(self.tokens.len());
        for &old_code in &order {
            sorted.push(std::mem::take(&mut self.tokens[old_code]));
        }
        self.tokens = sorted;
        self.index = self
            .tokens
            .iter()
            .enumerate()
            .map(|(code, token)| (token.clone(), code))
            .collect();
        remap
    }
}

// ---------------------------------------------------------------------------
// Column – one variable
// ---------------------------------------------------------------------------

/// Whether a column holds measured numbers or dictionary codes.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Numeric,
    Categorical(AsciiDictionary),
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Categorical(dict) => write!(f, "categorical ({})", dict.len()),
        }
    }
}

/// One variable: label, raw values, categorical dictionary and rank cache.
///
/// The rank cache is dropped by every method that can change `values`, so a
/// cached rank always describes the current buffer.
#[derive(Debug, Clone)]
pub struct Column {
    pub label: String,
    values: Vec<f64>,
    kind: ColumnKind,
    rank: Option<Arc<[usize]>>,
}

impl Column {
    pub fn new(label: impl Into<String>) -> Self {
        Self::numeric(label, Vec::new())
    }

    pub fn numeric(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            values,
            kind: ColumnKind::Numeric,
            rank: None,
        }
    }

    pub fn categorical(label: impl Into<String>, values: Vec<f64>, dictionary: AsciiDictionary) -> Self {
        Self {
            label: label.into(),
            values,
            kind: ColumnKind::Categorical(dictionary),
            rank: None,
        }
    }

    pub fn sentinel(len: usize) -> Self {
        Self::numeric(SENTINEL_LABEL, vec![0.0; len])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access to the values; drops the rank cache.
    pub fn values_mut(&mut self) -> &mut Vec<f64> {
        self.rank = None;
        &mut self.values
    }

    pub fn set_values(&mut self, values: Vec<f64>) {
        self.rank = None;
        self.values = values;
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, ColumnKind::Categorical(_))
    }

    pub fn dictionary(&self) -> Option<&AsciiDictionary> {
        match &self.kind {
            ColumnKind::Categorical(dict) => Some(dict),
            ColumnKind::Numeric => None,
        }
    }

    /// Resize the value buffer, zero-filling growth.
    pub fn resize(&mut self, len: usize) {
        self.rank = None;
        self.values.resize(len, 0.0);
    }

    /// Keep only the rows whose flag in `keep` is true.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        self.rank = None;
        let mut row = 0;
        self.values.retain(|_| {
            let k = keep.get(row).copied().unwrap_or(true);
            row += 1;
            k
        });
    }

    /// Encode a categorical token, switching a still-empty numeric column to
    /// categorical on first use.
    pub fn encode_ascii_value(&mut self, token: &str) -> usize {
        if let ColumnKind::Categorical(dict) = &mut self.kind {
            return dict.encode(token);
        }
        let mut dict = AsciiDictionary::new();
        let code = dict.encode(token);
        self.kind = ColumnKind::Categorical(dict);
        self.rank = None;
        code
    }

    /// Alphabetize the dictionary and rewrite every stored code to match.
    /// Returns false for numeric columns.
    pub fn finalize_ascii_ordering(&mut self) -> bool {
        let ColumnKind::Categorical(dict) = &mut self.kind else {
            return false;
        };
        let remap = dict.alphabetize();
        for v in self.values.iter_mut() {
            if let Some(code) = code_of(*v) {
                if let Some(&new_code) = remap.get(code) {
                    *v = new_code as f64;
                }
            }
        }
        self.rank = None;
        true
    }

    /// Convert a numeric column into a categorical one whose tokens are the
    /// rendered numbers.
    pub fn into_categorical(self) -> Column {
        if self.is_categorical() {
            return self;
        }
        let mut dict = AsciiDictionary::new();
        let values = self
            .values
            .iter()
            .map(|&v| dict.encode(&format_number(v)) as f64)
            .collect();
        Column::categorical(self.label, values, dict)
    }

    /// Rows of `self` followed by rows of `other`.
    ///
    /// If either side is categorical both become categorical; the new rows
    /// are recoded into the combined dictionary, which is then alphabetized.
    pub fn concat(self, other: Column) -> Column {
        if !self.is_categorical() && !other.is_categorical() {
            let mut values = self.values;
            values.extend_from_slice(&other.values);
            return Column::numeric(self.label, values);
        }

        let old = self.into_categorical();
        let new = other.into_categorical();
        let mut dict = old.dictionary().cloned().unwrap_or_default();
        let new_dict = new.dictionary().cloned().unwrap_or_default();
        let recoded: Vec<f64> = new
            .values
            .iter()
            .map(|&v| match code_of(v).and_then(|code| new_dict.token(code)) {
                Some(token) => dict.encode(token) as f64,
                None => v,
            })
            .collect();

        let mut values = old.values;
        values.extend(recoded);
        let mut merged = Column::categorical(old.label, values, dict);
        merged.finalize_ascii_ordering();
        merged
    }

    /// Text form of one cell: the token for categorical columns, the number
    /// otherwise.
    pub fn display_value(&self, row: usize) -> String {
        let Some(&v) = self.values.get(row) else {
            return String::new();
        };
        match &self.kind {
            ColumnKind::Numeric => format_number(v),
            ColumnKind::Categorical(dict) => code_of(v)
                .and_then(|code| dict.token(code))
                .map(str::to_string)
                .unwrap_or_else(|| format_number(v)),
        }
    }

    /// True when every row holds the same value.
    pub fn is_trivial(&self) -> bool {
        match self.values.split_first() {
            Some((first, rest)) => rest.iter().all(|v| v == first || (v.is_nan() && first.is_nan())),
            None => true,
        }
    }

    pub fn is_ranked(&self) -> bool {
        self.rank.is_some()
    }

    pub fn cached_rank(&self) -> Option<Arc<[usize]>> {
        self.rank.clone()
    }

    pub(crate) fn store_rank(&mut self, rank: Arc<[usize]>) {
        self.rank = Some(rank);
    }

    pub fn invalidate_rank(&mut self) {
        self.rank = None;
    }
}

/// Dictionary code stored in a categorical cell, if the value is one.
pub fn code_of(v: f64) -> Option<usize> {
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0).then_some(v as usize)
}

/// Render a number with at most 14 significant digits, integers without a
/// decimal point.
pub fn format_number(v: f64) -> String {
    if !v.is_finite() {
        return format!("{v}");
    }
    if v == 0.0 {
        return "0".to_string();
    }
    let rounded: f64 = format!("{v:.13e}").parse().unwrap_or(v);
    let magnitude = rounded.abs();
    if (1e-5..1e15).contains(&magnitude) {
        format!("{rounded}")
    } else {
        format!("{rounded:e}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_assigns_first_seen_codes() {
        let mut dict = AsciiDictionary::new();
        assert_eq!(dict.encode("x"), 0);
        assert_eq!(dict.encode("y"), 1);
        assert_eq!(dict.encode("x"), 0);
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.token(1), Some("y"));
    }

    #[test]
    fn finalize_alphabetizes_and_remaps() {
        let mut col = Column::new("c");
        let codes: Vec<f64> = ["pear", "apple", "fig", "apple"]
            .iter()
            .map(|t| col.encode_ascii_value(t) as f64)
            .collect();
        col.set_values(codes);
        assert_eq!(col.values(), &[0.0, 1.0, 2.0, 1.0]);

        assert!(col.finalize_ascii_ordering());
        let dict = col.dictionary().unwrap();
        assert_eq!(dict.tokens(), &["apple", "fig", "pear"]);
        assert_eq!(col.values(), &[2.0, 0.0, 1.0, 0.0]);
        // Every cell still decodes to its original token.
        let decoded: Vec<String> = (0..4).map(|r| col.display_value(r)).collect();
        assert_eq!(decoded, vec!["pear", "apple", "fig", "apple"]);
    }

    #[test]
    fn finalize_is_noop_for_numeric() {
        let mut col = Column::numeric("n", vec![3.0, 1.0]);
        assert!(!col.finalize_ascii_ordering());
        assert_eq!(col.values(), &[3.0, 1.0]);
    }

    #[test]
    fn mutation_drops_rank_cache() {
        let mut col = Column::numeric("n", vec![3.0, 1.0]);
        col.store_rank(Arc::from(vec![1, 0]));
        assert!(col.is_ranked());
        col.values_mut()[0] = 0.0;
        assert!(!col.is_ranked());
    }

    #[test]
    fn trivial_detection() {
        assert!(Column::numeric("a", vec![2.0; 5]).is_trivial());
        assert!(!Column::numeric("b", vec![2.0, 2.0, 3.0]).is_trivial());
    }

    #[test]
    fn into_categorical_renders_numbers() {
        let col = Column::numeric("n", vec![1.0, 2.5, 1.0]).into_categorical();
        assert_eq!(col.dictionary().unwrap().tokens(), &["1", "2.5"]);
        assert_eq!(col.values(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn concat_merges_dictionaries() {
        let old = Column::categorical("c", vec![0.0, 1.0], AsciiDictionary::from_tokens(["x", "y"]));
        let new = Column::categorical("c", vec![0.0, 1.0], AsciiDictionary::from_tokens(["z", "a"]));
        let merged = old.concat(new);
        assert_eq!(merged.dictionary().unwrap().tokens(), &["a", "x", "y", "z"]);
        let decoded: Vec<String> = (0..4).map(|r| merged.display_value(r)).collect();
        assert_eq!(decoded, vec!["x", "y", "z", "a"]);
    }

    #[test]
    fn concat_numeric_onto_categorical() {
        let old = Column::categorical("c", vec![0.0], AsciiDictionary::from_tokens(["b"]));
        let merged = old.concat(Column::numeric("c", vec![2.0]));
        assert_eq!(merged.dictionary().unwrap().tokens(), &["2", "b"]);
        assert_eq!(merged.values(), &[1.0, 0.0]);

        let plain = Column::numeric("n", vec![1.0]).concat(Column::numeric("n", vec![2.0]));
        assert!(!plain.is_categorical());
        assert_eq!(plain.values(), &[1.0, 2.0]);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.25), "-0.25");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(1.0e20), "1e20");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(f64::NAN), "NaN");
    }
}
