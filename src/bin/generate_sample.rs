use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rusty_viewpoints::cli::FormatArg;
use rusty_viewpoints::config::{FileFormat, WriteOptions};
use rusty_viewpoints::data::loader::{resolve_format, save_file, TableView};
use rusty_viewpoints::data::model::{AsciiDictionary, Column};

/// Write a synthetic dataset: three gaussian clusters in four numeric
/// columns plus a categorical cluster label.
#[derive(Parser)]
struct Args {
    /// Output file; the format follows the extension unless --format is given.
    #[arg(default_value = "sample_data.txt")]
    output: PathBuf,

    #[arg(short = 'f', long = "format", value_enum)]
    format: Option<FormatArg>,

    /// Points per cluster.
    #[arg(short = 'n', long = "npoints", default_value_t = 2000)]
    npoints: usize,

    #[arg(long = "seed", default_value_t = 42)]
    seed: u64,

    /// Mark the first cluster as selected (brush 1).
    #[arg(long = "write-selection")]
    write_selection: bool,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// (name, centre, spread) of each cluster.
const CLUSTERS: [(&str, [f64; 3], f64); 3] = [
    ("alpha", [0.0, 0.0, 0.0], 1.0),
    ("beta", [4.0, 1.0, -2.0], 0.5),
    ("gamma", [-3.0, 3.0, 2.0], 1.5),
];

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut z = Vec::new();
    let mut energy = Vec::new();
    let mut cluster = Vec::new();
    let mut selection = Vec::new();
    let dict = AsciiDictionary::from_tokens(CLUSTERS.iter().map(|c| c.0));

    for (code, &(_, centre, spread)) in CLUSTERS.iter().enumerate() {
        for _ in 0..args.npoints {
            let (a, b, c) = (
                rng.gauss(centre[0], spread),
                rng.gauss(centre[1], spread),
                rng.gauss(centre[2], spread),
            );
            x.push(a);
            y.push(b);
            z.push(c);
            // Log-normal, so the log_10 normalization has something to show.
            energy.push((0.5 * a + rng.gauss(0.0, 0.3)).exp());
            cluster.push(code as f64);
            selection.push(u32::from(args.write_selection && code == 0));
        }
    }

    let columns = vec![
        Column::numeric("x", x),
        Column::numeric("y", y),
        Column::numeric("z", z),
        Column::numeric("energy", energy),
        Column::categorical("cluster", cluster, dict),
    ];
    let options = WriteOptions {
        format: resolve_format(&args.output, args.format.map(FileFormat::from)),
        write_selection: args.write_selection,
        ..WriteOptions::default()
    };
    let rows = save_file(&args.output, &TableView::new(&columns, &selection), &options)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!(
        "Wrote {rows} points ({} clusters) as {} to {}",
        CLUSTERS.len(),
        options.format,
        args.output.display()
    );
    Ok(())
}
