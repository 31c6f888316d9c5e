use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default cap on the number of rows read from one file.
pub const MAXPOINTS: usize = 2_000_000;
/// Default cap on the number of data columns.
pub const MAXVARS: usize = 256;

// ---------------------------------------------------------------------------
// File format / delimiter / ordering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Ascii,
    Binary,
    Fits,
}

impl FileFormat {
    /// Guess a format from the file extension, if it is a familiar one.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "lis" | "asc" | "dat" | "csv" => Some(FileFormat::Ascii),
            "bin" => Some(FileFormat::Binary),
            "fit" | "fits" => Some(FileFormat::Fits),
            _ => None,
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            FileFormat::Ascii => &["txt", "lis", "asc", "dat", "csv"],
            FileFormat::Binary => &["bin"],
            FileFormat::Fits => &["fit", "fits"],
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Ascii => write!(f, "ascii"),
            FileFormat::Binary => write!(f, "binary"),
            FileFormat::Fits => write!(f, "fits"),
        }
    }
}

/// Column separator for text headers and ASCII data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    /// Any run of spaces or tabs.
    #[default]
    Whitespace,
    /// A single explicit character; empty fields are significant.
    Char(char),
}

impl Delimiter {
    pub fn is_whitespace(self) -> bool {
        matches!(self, Delimiter::Whitespace)
    }

    /// Byte used when writing. Whitespace mode writes single spaces.
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Whitespace => b' ',
            Delimiter::Char(c) if c.is_ascii() => c as u8,
            Delimiter::Char(_) => b' ',
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Delimiter::Whitespace => "whitespace-delimited",
            Delimiter::Char(',') => "comma-delimited",
            Delimiter::Char('\t') => "tab-delimited",
            Delimiter::Char(_) => "custom-delimited",
        }
    }
}

impl FromStr for Delimiter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | " " | "whitespace" | "space" => Ok(Delimiter::Whitespace),
            "tab" | "\\t" | "\t" => Ok(Delimiter::Char('\t')),
            "comma" => Ok(Delimiter::Char(',')),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii() => Ok(Delimiter::Char(c)),
                    _ => Err(format!("delimiter must be a single ASCII character, got '{other}'")),
                }
            }
        }
    }
}

/// Record layout of the binary data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOrdering {
    /// Each record is one row of `nvars` floats.
    #[default]
    ColumnMajor,
    /// Each record is one full column of `npoints` floats.
    RowMajor,
}

// ---------------------------------------------------------------------------
// Read / write options
// ---------------------------------------------------------------------------

/// Fully resolved settings for one load operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub format: FileFormat,
    pub delimiter: Delimiter,
    /// Substituted for empty, `NaN` and unreadable numeric tokens.
    pub bad_value_proxy: f64,
    pub max_points: usize,
    pub max_vars: usize,
    /// Number of rows known in advance (required for row-major binary).
    pub npoints: Option<usize>,
    /// Keep at most this many leading columns.
    pub nvars: Option<usize>,
    pub skip_header_lines: usize,
    pub ordering: BinaryOrdering,
    /// Labels live on the last commented header line.
    pub commented_labels: bool,
    pub remove_trivial_columns: bool,
    /// Honour a trailing `SELECTION_BY_VP` column.
    pub read_selection: bool,
    pub unreadable_cycle_length: usize,
    pub max_unreadable_lines: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            format: FileFormat::Ascii,
            delimiter: Delimiter::Whitespace,
            bad_value_proxy: 0.0,
            max_points: MAXPOINTS,
            max_vars: MAXVARS,
            npoints: None,
            nvars: None,
            skip_header_lines: 0,
            ordering: BinaryOrdering::ColumnMajor,
            commented_labels: false,
            remove_trivial_columns: true,
            read_selection: true,
            unreadable_cycle_length: 100,
            max_unreadable_lines: 50,
        }
    }
}

/// Settings for one save operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub format: FileFormat,
    pub delimiter: Delimiter,
    pub commented_labels: bool,
    /// Append a `SELECTION_BY_VP` column holding the brush of each row.
    pub write_selection: bool,
    /// Only write rows that are currently selected.
    pub selected_only: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            format: FileFormat::Binary,
            delimiter: Delimiter::Whitespace,
            commented_labels: false,
            write_selection: false,
            selected_only: false,
        }
    }
}

/// Persisted settings for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub read: ReadOptions,
    pub write: WriteOptions,
}

impl Settings {
    pub fn load_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        serde_json::from_str(&text).context("parsing settings JSON")
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serializing settings")?;
        std::fs::write(path, text)
            .with_context(|| format!("writing settings to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_parsing() {
        assert_eq!("".parse::<Delimiter>(), Ok(Delimiter::Whitespace));
        assert_eq!("tab".parse::<Delimiter>(), Ok(Delimiter::Char('\t')));
        assert_eq!(",".parse::<Delimiter>(), Ok(Delimiter::Char(',')));
        assert!("ab".parse::<Delimiter>().is_err());
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a.FITS")), Some(FileFormat::Fits));
        assert_eq!(FileFormat::from_path(Path::new("a.bin")), Some(FileFormat::Binary));
        assert_eq!(FileFormat::from_path(Path::new("a.txt")), Some(FileFormat::Ascii));
        assert_eq!(FileFormat::from_path(Path::new("a.xlsx")), None);
    }

    #[test]
    fn settings_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.read.delimiter = Delimiter::Char(',');
        settings.read.npoints = Some(12);
        settings.write.format = FileFormat::Fits;
        settings.save_json(&path).unwrap();
        assert_eq!(Settings::load_json(&path).unwrap(), settings);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"read": {"skip_header_lines": 3}}"#).unwrap();
        assert_eq!(settings.read.skip_header_lines, 3);
        assert_eq!(settings.read.max_vars, MAXVARS);
        assert_eq!(settings.write, WriteOptions::default());
    }
}
