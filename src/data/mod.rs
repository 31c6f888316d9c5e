/// Data layer: column store, file formats, ranking, normalization and
/// selection.
///
/// Architecture:
/// ```text
///  .txt / .bin / .fits
///        │
///        ▼
///   ┌──────────────────┐
///   │ ascii/binary/fits │  parse file → LoadedTable  (labels: shared header rules)
///   └──────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ manager   │  load / append / merge / delete, snapshot + restore
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐   ┌───────────┐
///   │ ColumnStore  │   │ selection │  per-point brush flags
///   └─────────────┘   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ extract   │  rank → normalize → transform → histograms
///   └──────────┘
/// ```

pub mod ascii;
pub mod binary;
pub mod extract;
pub mod fits;
pub mod labels;
pub mod loader;
pub mod manager;
pub mod model;
pub mod normalize;
pub mod rank;
pub mod selection;
pub mod store;

pub use extract::{AxisSpec, PlotBuffers, PlotSpec, Transform2d};
pub use loader::{LoadedTable, TableView};
pub use manager::{DataFileManager, LoadMode, ManagerState};
pub use model::{AsciiDictionary, Column, ColumnKind};
pub use normalize::NormalizationStyle;
pub use selection::SelectionState;
pub use store::ColumnStore;
