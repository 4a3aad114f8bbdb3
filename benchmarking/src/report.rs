// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Report aggregated results as a table and a speedup summary.

use std::collections::HashMap;

use serde::Serialize;
use tabled::settings::{
    object::{Columns, Object, Rows},
    Alignment, Color, Modify, Style,
};

use crate::{
    engine::Engine,
    measurement::Outcome,
    summary::{engines, ResultRow, Speedup},
};

fn format_cell(row: &ResultRow, engine: Engine) -> String {
    let Some(cell) = row.cell(engine) else {
        return "-".to_string();
    };
    match (cell.outcome, cell.median) {
        (Outcome::Ok, Some(median)) if cell.trials > 1 => {
            format!("{median:0.2} ± {:0.2}", cell.deviation)
        }
        (Outcome::Ok, Some(median)) => format!("{median:0.2}"),
        (outcome, _) => outcome.to_string(),
    }
}

/// Header of the results table. Make sure this stays in sync with [`row`].
fn header(engines: &[Engine]) -> Vec<String> {
    let mut header = vec!["set".to_string(), "file".to_string()];
    header.extend(engines.iter().map(|e| format!("{e} (s)")));
    header
}

fn row(r: &ResultRow, engines: &[Engine]) -> Vec<String> {
    let mut row = vec![r.benchmark.set.clone(), r.benchmark.file.clone()];
    row.extend(engines.iter().map(|&e| format_cell(r, e)));
    row
}

/// Render the results table, one row per benchmark and one column per
/// engine.
pub fn render_table(rows: &[ResultRow]) -> String {
    let engines = engines(rows);
    let mut table_rows = vec![header(&engines)];
    table_rows.extend(rows.iter().map(|r| row(r, &engines)));

    let mut table = tabled::builder::Builder::from(table_rows).build();
    let engine_columns = Columns::new(2..);
    table
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0).not(Rows::first())).with(Color::FG_BLUE))
        .with(Modify::new(engine_columns).with(Alignment::right()));
    table.to_string()
}

/// Number of engine results with each outcome.
pub fn outcome_counts(rows: &[ResultRow]) -> HashMap<Outcome, usize> {
    let mut counts = HashMap::new();
    for cell in rows.iter().flat_map(|r| r.cells.values()) {
        *counts.entry(cell.outcome).or_default() += 1;
    }
    counts
}

/// One line describing `speedup`.
pub fn format_speedup(speedup: &Speedup) -> String {
    let name = format!("{} vs {}", speedup.candidate, speedup.baseline);
    match speedup.value {
        Some(value) => format!(
            "{name:<24} {value:0.3}× (harmonic mean over {} benchmarks)",
            speedup.benchmarks
        ),
        None => format!("{name:<24} n/a (no benchmark completed by both)"),
    }
}

/// Print the results table, totals, and speedups.
pub fn print_report(rows: &[ResultRow], speedups: &[Speedup]) {
    println!("{}", render_table(rows));
    let counts = outcome_counts(rows);
    println!(
        "benchmarks: {total}
ok:         {ok}
timeout:    {timeout}
fail:       {fail}",
        total = rows.len(),
        ok = counts.get(&Outcome::Ok).unwrap_or(&0),
        timeout = counts.get(&Outcome::Timeout).unwrap_or(&0),
        fail = counts.get(&Outcome::Fail).unwrap_or(&0)
    );
    println!();
    println!("speedups:");
    for speedup in speedups {
        println!("  {}", format_speedup(speedup));
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    rows: &'a [ResultRow],
    speedups: &'a [Speedup],
}

/// Convert the aggregated results to pretty-printed JSON.
pub fn to_json(rows: &[ResultRow], speedups: &[Speedup]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport { rows, speedups })
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::{engine::COMPARISONS, results::TrialRecord, summary::{speedups, summarize}};

    fn records() -> Vec<TrialRecord> {
        let trial = |file: &str, engine, trial, outcome, seconds| TrialRecord {
            set: "coreutils".to_string(),
            file: file.to_string(),
            engine,
            trial,
            outcome,
            seconds,
            user_seconds: seconds,
            max_mem_mb: 1,
            exit_code: None,
            started_at: SystemTime::UNIX_EPOCH,
            finished_at: SystemTime::UNIX_EPOCH,
        };
        vec![
            trial("cat", Engine::Souffle, 0, Outcome::Ok, 0.5),
            trial("cat", Engine::Souffle, 1, Outcome::Ok, 0.7),
            trial("cat", Engine::Egglog, 0, Outcome::Ok, 1.25),
            trial("ls", Engine::Souffle, 0, Outcome::Ok, 3.0),
            trial("ls", Engine::Egglog, 0, Outcome::Timeout, 60.0),
        ]
    }

    #[test]
    fn table_cells() {
        let rows = summarize(&records());
        assert_eq!(format_cell(&rows[0], Engine::Souffle), "0.60 ± 0.10");
        assert_eq!(format_cell(&rows[0], Engine::Egglog), "1.25");
        assert_eq!(format_cell(&rows[1], Engine::Egglog), "timeout");
        assert_eq!(format_cell(&rows[1], Engine::EgglogNaive), "-");

        let table = render_table(&rows);
        assert!(table.contains("souffle (s)"), "{table}");
        assert!(!table.contains("egglog-naive"), "{table}");
    }

    #[test]
    fn counts_and_speedups() {
        let rows = summarize(&records());
        let counts = outcome_counts(&rows);
        assert_eq!(counts[&Outcome::Ok], 3);
        assert_eq!(counts[&Outcome::Timeout], 1);
        assert!(!counts.contains_key(&Outcome::Fail));

        let speedups = speedups(&rows, &COMPARISONS);
        let line = format_speedup(&speedups[0]);
        assert!(line.starts_with("egglog vs souffle"), "{line}");
        assert!(line.contains("0.480×"), "{line}");
        assert!(format_speedup(&speedups[1]).contains("n/a"));

        let json: serde_json::Value =
            serde_json::from_str(&to_json(&rows, &speedups).unwrap()).unwrap();
        assert_eq!(json["rows"][1]["cells"]["egglog"]["outcome"], "timeout");
        assert_eq!(json["speedups"][0]["benchmarks"], 1);
    }
}
