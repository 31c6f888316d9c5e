//! Rusty Viewpoints - a linked scatterplot explorer for tabular data.
//!
//! The library holds the whole data layer (readers and writers for ASCII,
//! binary and FITS tables, the column store, ranking, normalization and
//! selection) plus the egui front-end that drives it.
//!
//! ## Module Structure
//!
//! - [`config`] - Read/write options and JSON settings
//! - [`error`] - Data layer error taxonomy
//! - [`data`] - Column store, file formats, normalization, selection
//! - [`cli`] - Command line arguments
//! - [`app`] - eframe::App implementation
//! - [`state`] - UI state around the data manager
//! - [`color`] - Brush colours
//! - [`ui`] - Menu bar, side panel and scatterplot grid

pub mod app;
pub mod cli;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod state;
pub mod ui;
