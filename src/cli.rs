use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::config::{BinaryOrdering, Delimiter, FileFormat, ReadOptions, Settings, WriteOptions};
use crate::data::loader::resolve_format;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Ascii,
    Binary,
    Fits,
}

impl From<FormatArg> for FileFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Ascii => FileFormat::Ascii,
            FormatArg::Binary => FileFormat::Binary,
            FormatArg::Fits => FileFormat::Fits,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OrderingArg {
    Columnmajor,
    Rowmajor,
}

impl From<OrderingArg> for BinaryOrdering {
    fn from(arg: OrderingArg) -> Self {
        match arg {
            OrderingArg::Columnmajor => BinaryOrdering::ColumnMajor,
            OrderingArg::Rowmajor => BinaryOrdering::RowMajor,
        }
    }
}

/// Command line of the viewer.
///
/// Without `--output` the GUI starts; with it the input is converted to the
/// output file and the program exits.
#[derive(Parser, Debug)]
#[command(version, about = "Linked scatterplots for ASCII, binary and FITS tables.")]
pub struct Args {
    /// Input file.
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Input format; guessed from the extension when omitted.
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<FormatArg>,

    /// Number of points to read (required for row-major binary input).
    #[arg(short = 'n', long = "npoints")]
    pub npoints: Option<usize>,

    /// Keep at most this many columns.
    #[arg(short = 'v', long = "nvars")]
    pub nvars: Option<usize>,

    /// Header lines to skip before the labels.
    #[arg(short = 's', long = "skip-header-lines")]
    pub skip_header_lines: Option<usize>,

    /// Record layout of binary input.
    #[arg(short = 'o', long = "ordering", value_enum)]
    pub ordering: Option<OrderingArg>,

    /// Value substituted for empty or NaN cells.
    #[arg(short = 'M', long = "missing-values", allow_hyphen_values = true)]
    pub missing_values: Option<f64>,

    /// Column delimiter: a single character, "tab", "comma" or "whitespace".
    #[arg(short = 'd', long = "delimiter")]
    pub delimiter: Option<Delimiter>,

    #[arg(long = "max-points")]
    pub max_points: Option<usize>,

    #[arg(long = "max-vars")]
    pub max_vars: Option<usize>,

    /// Labels are on the last commented header line.
    #[arg(long = "commented-labels")]
    pub commented_labels: bool,

    /// Keep columns whose values are all identical.
    #[arg(long = "keep-trivial-columns")]
    pub keep_trivial_columns: bool,

    /// Rows of plots.
    #[arg(short = 'r', long = "rows", default_value_t = 2)]
    pub rows: usize,

    /// Columns of plots.
    #[arg(short = 'c', long = "cols", default_value_t = 2)]
    pub cols: usize,

    /// JSON settings file; command line flags override it.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Convert the input to this file instead of starting the GUI.
    #[arg(long = "output", value_name = "PATH", requires = "input")]
    pub output: Option<PathBuf>,

    /// Output format; guessed from the extension when omitted.
    #[arg(long = "output-format", value_enum)]
    pub output_format: Option<FormatArg>,

    /// Add a SELECTION_BY_VP column to the output.
    #[arg(long = "write-selection")]
    pub write_selection: bool,
}

impl Args {
    /// Base settings from `--config` (or defaults), overridden by flags.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load_json(path)?,
            None => Settings::default(),
        };
        self.apply_read(&mut settings.read);
        self.apply_write(&mut settings.write);
        Ok(settings)
    }

    fn apply_read(&self, read: &mut ReadOptions) {
        if let Some(input) = &self.input {
            read.format = resolve_format(input, self.format.map(FileFormat::from));
        } else if let Some(format) = self.format {
            read.format = format.into();
        }
        if let Some(n) = self.npoints {
            read.npoints = Some(n);
        }
        if let Some(n) = self.nvars {
            read.nvars = Some(n);
        }
        if let Some(n) = self.skip_header_lines {
            read.skip_header_lines = n;
        }
        if let Some(ordering) = self.ordering {
            read.ordering = ordering.into();
        }
        if let Some(v) = self.missing_values {
            read.bad_value_proxy = v;
        }
        if let Some(d) = self.delimiter {
            read.delimiter = d;
        }
        if let Some(n) = self.max_points {
            read.max_points = n;
        }
        if let Some(n) = self.max_vars {
            read.max_vars = n;
        }
        read.commented_labels |= self.commented_labels;
        if self.keep_trivial_columns {
            read.remove_trivial_columns = false;
        }
    }

    fn apply_write(&self, write: &mut WriteOptions) {
        if let Some(output) = &self.output {
            write.format = resolve_format(output, self.output_format.map(FileFormat::from));
        } else if let Some(format) = self.output_format {
            write.format = format.into();
        }
        if let Some(d) = self.delimiter {
            write.delimiter = d;
        }
        write.commented_labels |= self.commented_labels;
        write.write_selection |= self.write_selection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "rusty-viewpoints",
            "-i",
            "data.bin",
            "-o",
            "rowmajor",
            "-n",
            "10",
            "-M",
            "-1",
            "-d",
            "tab",
            "--keep-trivial-columns",
        ]);
        let settings = args.settings().unwrap();
        assert_eq!(settings.read.format, FileFormat::Binary);
        assert_eq!(settings.read.ordering, BinaryOrdering::RowMajor);
        assert_eq!(settings.read.npoints, Some(10));
        assert_eq!(settings.read.bad_value_proxy, -1.0);
        assert_eq!(settings.read.delimiter, Delimiter::Char('\t'));
        assert!(!settings.read.remove_trivial_columns);
    }

    #[test]
    fn output_format_follows_extension() {
        let args = Args::parse_from(["rusty-viewpoints", "-i", "in.txt", "--output", "out.fits"]);
        let settings = args.settings().unwrap();
        assert_eq!(settings.read.format, FileFormat::Ascii);
        assert_eq!(settings.write.format, FileFormat::Fits);
    }

    #[test]
    fn explicit_format_wins() {
        let args = Args::parse_from(["rusty-viewpoints", "-i", "in.bin", "-f", "ascii"]);
        assert_eq!(args.settings().unwrap().read.format, FileFormat::Ascii);
    }
}
