use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column as TableColumn, TableBuilder};

use crate::config::{Delimiter, FileFormat};
use crate::data::extract::Transform2d;
use crate::data::manager::LoadMode;
use crate::data::normalize::NormalizationStyle;
use crate::data::selection::NBRUSHES;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – plot controls, selection, columns
// ---------------------------------------------------------------------------

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    if state.manager.is_empty() {
        ui.label("No dataset loaded.");
        return;
    }

    let labels = state.manager.labels();
    let sentinel = state.manager.store().sentinel_index();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("Plots");
            ui.separator();
            for plot in 0..state.plots.len() {
                if plot_controls(ui, state, plot, &labels, sentinel) {
                    state.invalidate(plot);
                }
            }

            ui.add_space(8.0);
            ui.heading("Selection");
            ui.separator();
            brush_controls(ui, state);

            ui.add_space(8.0);
            ui.heading("Columns");
            ui.separator();
            column_table(ui, state);
        });
}

/// Axis, normalization and transform pickers for one plot. Returns true
/// when anything changed.
fn plot_controls(ui: &mut Ui, state: &mut AppState, plot: usize, labels: &[String], sentinel: usize) -> bool {
    let Some(config) = state.plots.get_mut(plot) else {
        return false;
    };
    let before = config.clone();
    let axis_name = |i: usize| labels.get(i).cloned().unwrap_or_else(|| "-nothing-".to_string());

    egui::CollapsingHeader::new(RichText::new(format!("Plot {}", plot + 1)).strong())
        .id_salt(("plot_controls", plot))
        .default_open(plot == 0)
        .show(ui, |ui: &mut Ui| {
            for (axis, column, style) in [
                ("x", &mut config.x, &mut config.x_style),
                ("y", &mut config.y, &mut config.y_style),
            ] {
                ui.horizontal(|ui: &mut Ui| {
                    ui.label(axis);
                    egui::ComboBox::from_id_salt(("axis", plot, axis))
                        .selected_text(axis_name(*column))
                        .show_ui(ui, |ui: &mut Ui| {
                            for i in 0..=sentinel {
                                ui.selectable_value(column, i, axis_name(i));
                            }
                        });
                    egui::ComboBox::from_id_salt(("style", plot, axis))
                        .selected_text(style.name())
                        .show_ui(ui, |ui: &mut Ui| {
                            for s in NormalizationStyle::ALL {
                                ui.selectable_value(style, s, s.name());
                            }
                        });
                });
            }
            ui.horizontal(|ui: &mut Ui| {
                egui::ComboBox::from_id_salt(("transform", plot))
                    .selected_text(config.transform.to_string())
                    .show_ui(ui, |ui: &mut Ui| {
                        for t in Transform2d::ALL {
                            ui.selectable_value(&mut config.transform, t, t.to_string());
                        }
                    });
                ui.checkbox(&mut config.show_histograms, "histograms");
            });
        });

    *config != before
}

fn brush_controls(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        for brush in 0..NBRUSHES {
            let text = RichText::new(format!("brush {}", brush + 1)).color(state.palette.brush(brush));
            ui.selectable_value(&mut state.brush, brush, text);
        }
    });
    ui.checkbox(&mut state.add_to_selection, "add to selection");
    ui.label(format!(
        "{} of {} points selected",
        state.manager.selection().count_selected(),
        state.manager.point_count()
    ));
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Invert").clicked() {
            state.invert_selection();
        }
        if ui.button("Clear").clicked() {
            state.clear_selection();
        }
    });
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Save").clicked() {
            state.manager.selection_mut().save();
        }
        if ui.button("Restore").clicked() {
            state.manager.selection_mut().restore();
            state.invalidate_all();
        }
    });
}

/// One row per column: delete tick box, label, kind.
fn column_table(ui: &mut Ui, state: &mut AppState) {
    let rows: Vec<(String, String)> = state
        .manager
        .store()
        .columns()
        .iter()
        .map(|c| (c.label.clone(), c.kind().to_string()))
        .collect();
    state.marked_columns.resize(rows.len(), false);

    TableBuilder::new(ui)
        .striped(true)
        .column(TableColumn::auto())
        .column(TableColumn::remainder())
        .column(TableColumn::auto())
        .header(18.0, |mut header| {
            header.col(|ui| {
                ui.strong("del");
            });
            header.col(|ui| {
                ui.strong("label");
            });
            header.col(|ui| {
                ui.strong("kind");
            });
        })
        .body(|mut body| {
            for (i, (label, kind)) in rows.iter().enumerate() {
                body.row(18.0, |mut row| {
                    row.col(|ui| {
                        ui.checkbox(&mut state.marked_columns[i], "");
                    });
                    row.col(|ui| {
                        ui.label(label);
                    });
                    row.col(|ui| {
                        ui.label(kind);
                    });
                });
            }
        });

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Delete marked").clicked() {
            report(state, |s| s.delete_marked_columns());
        }
        if ui.button("Remove trivial").clicked() {
            report(state, |s| s.remove_trivial_columns());
        }
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            for (text, mode) in [
                ("Open…", LoadMode::Replace),
                ("Append…", LoadMode::Append),
                ("Merge…", LoadMode::Merge),
            ] {
                if ui.button(text).clicked() {
                    open_file_dialog(state, mode);
                    ui.close_menu();
                }
            }
            ui.separator();
            if ui.button("Save As…").clicked() {
                save_file_dialog(state, false);
                ui.close_menu();
            }
            if ui.button("Save Selected As…").clicked() {
                save_file_dialog(state, true);
                ui.close_menu();
            }
            ui.separator();
            read_options_menu(ui, state);
        });

        ui.menu_button("Edit", |ui: &mut Ui| {
            if ui.button("Delete selected points").clicked() {
                report(state, |s| s.delete_selected_points());
                ui.close_menu();
            }
            if ui.button("Remove trivial columns").clicked() {
                report(state, |s| s.remove_trivial_columns());
                ui.close_menu();
            }
        });

        ui.separator();

        if !state.manager.is_empty() {
            let name = state
                .manager
                .current_file()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "default data".to_string());
            ui.label(format!(
                "{name}: {} points, {} fields",
                state.manager.point_count(),
                state.manager.variable_count()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

fn read_options_menu(ui: &mut Ui, state: &mut AppState) {
    let read = &mut state.manager.read_options;
    ui.menu_button("Read options", |ui: &mut Ui| {
        egui::ComboBox::from_id_salt("delimiter")
            .selected_text(read.delimiter.describe())
            .show_ui(ui, |ui: &mut Ui| {
                for d in [Delimiter::Whitespace, Delimiter::Char(','), Delimiter::Char('\t')] {
                    ui.selectable_value(&mut read.delimiter, d, d.describe());
                }
            });
        ui.checkbox(&mut read.commented_labels, "commented labels");
        ui.checkbox(&mut read.remove_trivial_columns, "remove trivial columns");
        ui.checkbox(&mut read.read_selection, "read selection");
    });
    let write = &mut state.manager.write_options;
    ui.menu_button("Write options", |ui: &mut Ui| {
        for f in [FileFormat::Ascii, FileFormat::Binary, FileFormat::Fits] {
            ui.radio_value(&mut write.format, f, f.to_string());
        }
        ui.checkbox(&mut write.commented_labels, "commented labels");
        ui.checkbox(&mut write.write_selection, "write selection");
    });
}

/// Run an edit and surface its error in the status line.
fn report(state: &mut AppState, op: impl FnOnce(&mut AppState) -> anyhow::Result<()>) {
    if let Err(e) = op(state) {
        log::error!("{e:#}");
        state.status_message = Some(format!("Error: {e:#}"));
    }
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

fn data_dialog(title: &str) -> rfd::FileDialog {
    let all: Vec<&str> = [FileFormat::Ascii, FileFormat::Binary, FileFormat::Fits]
        .iter()
        .flat_map(|f| f.extensions().iter().copied())
        .collect();
    rfd::FileDialog::new()
        .set_title(title)
        .add_filter("Supported files", all.as_slice())
        .add_filter("ASCII", FileFormat::Ascii.extensions())
        .add_filter("Binary", FileFormat::Binary.extensions())
        .add_filter("FITS", FileFormat::Fits.extensions())
}

pub fn open_file_dialog(state: &mut AppState, mode: LoadMode) {
    let title = match mode {
        LoadMode::Replace => "Open data file",
        LoadMode::Append => "Append rows from file",
        LoadMode::Merge => "Merge columns from file",
    };
    let Some(path) = data_dialog(title).pick_file() else {
        return;
    };
    let format = FileFormat::from_path(&path).unwrap_or(state.manager.read_options.format);
    state.manager.read_options.format = format;
    report(state, |s| s.open(&path, mode));
}

pub fn save_file_dialog(state: &mut AppState, selected_only: bool) {
    let Some(path) = data_dialog("Save data file").save_file() else {
        return;
    };
    if let Some(format) = FileFormat::from_path(&path) {
        state.manager.write_options.format = format;
    }
    report(state, |s| s.save(&path, selected_only));
}
