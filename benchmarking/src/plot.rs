// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Draw the results as a grouped bar chart with a log-scaled time axis.

use std::{fmt::Display, path::Path};

use plotters::prelude::*;

use crate::{
    engine::Engine,
    error::{BenchError, Result},
    measurement::Outcome,
    summary::{engines, ResultRow},
};

const CHART_SIZE: (u32, u32) = (1280, 720);

const BAR_COLORS: [RGBColor; 3] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
];

fn plot_err<E: Display>(err: E) -> BenchError {
    BenchError::Plot(err.to_string())
}

/// One bar of the chart.
#[derive(Debug, Clone, PartialEq)]
struct Bar {
    /// Horizontal slot, counting one slot per bar plus a gap per group.
    slot: u32,
    engine: usize,
    seconds: f64,
    timed_out: bool,
}

/// Lay out one group of bars per row, one bar per engine. Completed cells are
/// drawn at their median, timeouts at the longest observed time, and failures
/// are left out.
fn layout_bars(rows: &[ResultRow], engines: &[Engine]) -> Vec<Bar> {
    let group = engines.len() as u32 + 1;
    let mut bars = vec![];
    for (i, row) in rows.iter().enumerate() {
        for (j, engine) in engines.iter().enumerate() {
            let Some(cell) = row.cell(*engine) else {
                continue;
            };
            let (seconds, timed_out) = match cell.outcome {
                Outcome::Ok => match cell.median {
                    Some(median) => (median, false),
                    None => continue,
                },
                Outcome::Timeout => (cell.worst, true),
                Outcome::Fail => continue,
            };
            bars.push(Bar {
                slot: i as u32 * group + j as u32,
                engine: j,
                seconds,
                timed_out,
            });
        }
    }
    bars
}

/// Y-axis range covering every bar with some headroom on a log scale.
fn time_bounds(bars: &[Bar]) -> (f64, f64) {
    let floor = 1e-3;
    let min = bars
        .iter()
        .map(|b| b.seconds)
        .fold(f64::INFINITY, f64::min)
        .max(floor);
    let max = bars
        .iter()
        .map(|b| b.seconds)
        .fold(floor, f64::max);
    (min / 2.0, max * 2.0)
}

/// Draw a grouped bar chart of `rows` to the SVG file at `path`.
pub fn draw_chart(rows: &[ResultRow], path: &Path, title: &str) -> Result<()> {
    let engines = engines(rows);
    let bars = layout_bars(rows, &engines);
    if bars.is_empty() {
        return Err(BenchError::Plot("no completed runs to plot".to_string()));
    }
    let (lo, hi) = time_bounds(&bars);
    let group = engines.len() as u32 + 1;
    let slots = group * rows.len() as u32;
    // label each group under its middle bar
    let label_slot = engines.len() as u32 / 2;
    let labels = rows
        .iter()
        .map(|r| r.benchmark.file.as_str())
        .collect::<Vec<_>>();

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(72)
        .build_cartesian_2d((0..slots).into_segmented(), (lo..hi).log_scale())
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(slots as usize)
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(slot) if *slot % group == label_slot => labels
                .get((*slot / group) as usize)
                .map(|l| l.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .y_desc("time (s)")
        .draw()
        .map_err(plot_err)?;

    for (idx, engine) in engines.iter().enumerate() {
        let color = BAR_COLORS[idx % BAR_COLORS.len()];
        let series = bars.iter().filter(|b| b.engine == idx).map(|b| {
            let style = if b.timed_out {
                color.mix(0.35).filled()
            } else {
                color.filled()
            };
            Rectangle::new(
                [
                    (SegmentValue::Exact(b.slot), lo),
                    (SegmentValue::Exact(b.slot + 1), b.seconds),
                ],
                style,
            )
        });
        chart
            .draw_series(series)
            .map_err(plot_err)?
            .label(engine.name())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    log::info!("wrote chart to {}", path.display());
    Ok(())
}
