// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Aggregate trials into one row per benchmark and compute speedups.
//!
//! Repeated trials are summarized as _median_ ± _deviation_, where the
//! deviation is the maximal distance from the median to any trial, so every
//! trial falls within the reported interval.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;

use crate::{
    engine::Engine,
    measurement::Outcome,
    results::TrialRecord,
    stats::{harmonic_mean, max_deviation, median},
    suite::Benchmark,
};

/// The trials of one engine on one benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    /// `Ok` if any trial succeeded, otherwise `Timeout` if any trial timed
    /// out, otherwise `Fail`.
    pub outcome: Outcome,
    /// Median seconds over the successful trials.
    pub median: Option<f64>,
    /// Maximal distance from the median to a successful trial.
    pub deviation: f64,
    /// Longest wall-clock time of any trial, successful or not.
    pub worst: f64,
    /// Number of trials recorded.
    pub trials: usize,
}

impl Cell {
    fn from_trials(trials: &[&TrialRecord]) -> Self {
        let ok_times = trials
            .iter()
            .filter(|t| t.outcome == Outcome::Ok)
            .map(|t| t.seconds)
            .collect::<Vec<_>>();
        let outcome = if !ok_times.is_empty() {
            Outcome::Ok
        } else if trials.iter().any(|t| t.outcome == Outcome::Timeout) {
            Outcome::Timeout
        } else {
            Outcome::Fail
        };
        let median = median(&ok_times);
        Cell {
            outcome,
            median,
            deviation: median.map_or(0.0, |m| max_deviation(&ok_times, m)),
            worst: trials.iter().map(|t| t.seconds).fold(0.0, f64::max),
            trials: trials.len(),
        }
    }

    /// Median time if the engine completed the benchmark.
    pub fn completed(&self) -> Option<f64> {
        match self.outcome {
            Outcome::Ok => self.median,
            _ => None,
        }
    }
}

/// Every engine's results on one benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    /// The benchmark
    pub benchmark: Benchmark,
    /// Results per engine; engines that never ran are absent.
    pub cells: BTreeMap<Engine, Cell>,
}

impl ResultRow {
    /// Results of `engine`, if it ran.
    pub fn cell(&self, engine: Engine) -> Option<&Cell> {
        self.cells.get(&engine)
    }
}

/// Group trials by benchmark and engine. Rows follow the suite order, with
/// benchmarks from outside the suite last.
pub fn summarize(records: &[TrialRecord]) -> Vec<ResultRow> {
    let by_benchmark = records
        .iter()
        .map(|r| (r.benchmark(), r))
        .into_group_map();
    by_benchmark
        .into_iter()
        .sorted_by_key(|(bench, _)| (bench.suite_index().unwrap_or(usize::MAX), bench.clone()))
        .map(|(benchmark, trials)| {
            let cells = trials
                .into_iter()
                .map(|t| (t.engine, t))
                .into_group_map()
                .into_iter()
                .map(|(engine, trials)| (engine, Cell::from_trials(&trials)))
                .collect();
            ResultRow { benchmark, cells }
        })
        .collect()
}

/// Engines with at least one result, in reporting order.
pub fn engines(rows: &[ResultRow]) -> Vec<Engine> {
    rows.iter()
        .flat_map(|r| r.cells.keys().copied())
        .sorted()
        .dedup()
        .collect()
}

/// Harmonic-mean speedup of `candidate` over `baseline`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Speedup {
    /// Engine whose time is the numerator
    pub baseline: Engine,
    /// Engine whose time is the denominator
    pub candidate: Engine,
    /// Harmonic mean of `baseline / candidate`, if any benchmark was
    /// completed by both
    pub value: Option<f64>,
    /// Number of benchmarks contributing to the mean
    pub benchmarks: usize,
}

/// Compute the speedup for each comparison over the benchmarks both engines
/// completed. Timeouts and failures are left out rather than guessed at.
pub fn speedups(rows: &[ResultRow], comparisons: &[(Engine, Engine)]) -> Vec<Speedup> {
    comparisons
        .iter()
        .map(|&(baseline, candidate)| {
            let ratios = rows
                .iter()
                .filter_map(|row| {
                    let base = row.cell(baseline)?.completed()?;
                    let cand = row.cell(candidate)?.completed()?;
                    Some(base / cand)
                })
                .collect::<Vec<_>>();
            Speedup {
                baseline,
                candidate,
                value: harmonic_mean(&ratios),
                benchmarks: ratios.len(),
            }
        })
        .collect()
}
