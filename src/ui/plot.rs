use eframe::egui::{Color32, Stroke, Ui, Vec2};
use egui_plot::{Bar, BarChart, Plot, PlotPoints, Points, Polygon};

use crate::data::extract::{Histogram, PlotBuffers};
use crate::data::selection::NBRUSHES;
use crate::state::AppState;

/// Fraction of the opposite axis a full-height histogram bar spans.
const HISTOGRAM_HEIGHT: f64 = 0.5;

enum DragEvent {
    Start(usize, [f64; 2]),
    Move([f64; 2]),
    Stop,
}

// ---------------------------------------------------------------------------
// Scatterplot grid (central panel)
// ---------------------------------------------------------------------------

/// Render the `rows x cols` grid of linked scatterplots.
pub fn scatter_grid(ui: &mut Ui, state: &mut AppState) {
    if state.manager.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to view data  (File → Open…)");
        });
        return;
    }

    let spacing = ui.spacing().item_spacing;
    let available = ui.available_size();
    let cell = Vec2::new(
        (available.x - spacing.x * (state.cols as f32 - 1.0)) / state.cols as f32,
        (available.y - spacing.y * (state.rows as f32 - 1.0)) / state.rows as f32,
    );

    let mut event = None;
    for row in 0..state.rows {
        ui.horizontal(|ui: &mut Ui| {
            for col in 0..state.cols {
                let plot = row * state.cols + col;
                if state.buffers(plot).is_none() {
                    continue;
                }
                if let Some(e) = scatter_plot(ui, state, plot, cell) {
                    event = Some(e);
                }
            }
        });
    }

    match event {
        Some(DragEvent::Start(plot, at)) => state.begin_drag(plot, at),
        Some(DragEvent::Move(at)) => state.update_drag(at),
        Some(DragEvent::Stop) => state.end_drag(),
        None => {}
    }
}

fn scatter_plot(ui: &mut Ui, state: &AppState, plot: usize, size: Vec2) -> Option<DragEvent> {
    let buffers = state.cached_buffers(plot)?;
    let config = state.plots.get(plot)?;
    let selected = state.manager.selection().selected();
    let palette = &state.palette;

    // Unselected points first, then one series per brush on top.
    let mut groups: Vec<Vec<[f64; 2]>> = vec![Vec::new(); NBRUSHES + 1];
    for (i, v) in buffers.vertices.iter().enumerate() {
        let s = selected.get(i).copied().unwrap_or(0) as usize;
        groups[s.min(NBRUSHES)].push([v[0], v[1]]);
    }

    let drag_box = state.drag.filter(|d| d.plot == plot);
    let response = Plot::new(("scatter", plot))
        .width(size.x)
        .height(size.y)
        .x_axis_label(buffers.labels[0].clone())
        .y_axis_label(buffers.labels[1].clone())
        .include_x(buffers.world_min[0])
        .include_x(buffers.world_max[0])
        .include_y(buffers.world_min[1])
        .include_y(buffers.world_max[1])
        .allow_drag(false)
        .allow_boxed_zoom(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for (s, points) in groups.into_iter().enumerate() {
                if points.is_empty() {
                    continue;
                }
                let name = if s == 0 {
                    "unselected".to_string()
                } else {
                    format!("brush {s}")
                };
                plot_ui.points(
                    Points::new(points)
                        .color(palette.color_for(s as u32))
                        .radius(1.5)
                        .name(name),
                );
            }

            if config.show_histograms {
                for chart in histogram_charts(buffers, palette.brush(0)) {
                    plot_ui.bar_chart(chart);
                }
            }

            if let Some(d) = drag_box {
                let corners = vec![
                    [d.start[0], d.start[1]],
                    [d.end[0], d.start[1]],
                    [d.end[0], d.end[1]],
                    [d.start[0], d.end[1]],
                ];
                plot_ui.polygon(
                    Polygon::new(PlotPoints::from(corners))
                        .stroke(Stroke::new(1.0, palette.brush(state.brush)))
                        .fill_color(Color32::TRANSPARENT),
                );
            }

            plot_ui.pointer_coordinate().map(|p| [p.x, p.y])
        });

    let pointer = response.inner;
    let r = &response.response;
    if r.drag_started() {
        pointer.map(|at| DragEvent::Start(plot, at))
    } else if r.drag_stopped() {
        Some(DragEvent::Stop)
    } else if r.dragged() && drag_box.is_some() {
        pointer.map(DragEvent::Move)
    } else {
        None
    }
}

/// Bars along the bottom (x) and left (y) edges of the plot, for all points
/// and for the selected ones.
fn histogram_charts(buffers: &PlotBuffers, selected_color: Color32) -> Vec<BarChart> {
    let [hx, hy] = &buffers.histograms;
    let y_span = buffers.world_max[1] - buffers.world_min[1];
    let x_span = buffers.world_max[0] - buffers.world_min[0];
    vec![
        bars(hx, buffers.world_min[1], y_span, false, Color32::GRAY, false),
        bars(hx, buffers.world_min[1], y_span, false, selected_color, true),
        bars(hy, buffers.world_min[0], x_span, true, Color32::GRAY, false),
        bars(hy, buffers.world_min[0], x_span, true, selected_color, true),
    ]
}

fn bars(h: &Histogram, base: f64, span: f64, horizontal: bool, color: Color32, selected: bool) -> BarChart {
    let width = h.bin_width();
    let counts = if selected { &h.counts_selected } else { &h.counts };
    let bars: Vec<Bar> = counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0.0)
        .map(|(i, &c)| {
            Bar::new(h.min + (i as f64 + 0.5) * width, c * span * HISTOGRAM_HEIGHT)
                .width(width)
                .base_offset(base)
        })
        .collect();
    let chart = BarChart::new(bars).color(color);
    if horizontal {
        chart.horizontal()
    } else {
        chart
    }
}
