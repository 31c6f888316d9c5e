/// egui front-end: menu bar and side panel (`panels`), scatterplot grid
/// (`plot`).
pub mod panels;
pub mod plot;
