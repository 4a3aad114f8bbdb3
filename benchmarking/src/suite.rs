// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Define the benchmark programs and where their inputs and outputs live.

use std::{fmt, path::PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::{error::Result, toolchain::Layout};

/// A named group of programs compiled to bitcode.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkSet {
    /// Name of the set, also the subdirectory of its bitcode.
    pub name: &'static str,
    /// Programs in the set, without the `.bc` extension.
    pub files: &'static [&'static str],
}

/// The benchmark suite, in reporting order.
pub const BENCHMARK_SETS: &[BenchmarkSet] = &[
    BenchmarkSet {
        name: "coreutils",
        files: &["cat", "cp", "du", "ls", "mv", "sort", "wc"],
    },
    BenchmarkSet {
        name: "postgresql",
        files: &["initdb", "pg_dump", "psql"],
    },
];

/// A single analysis target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Benchmark {
    /// Benchmark set the program belongs to
    pub set: String,
    /// Program name
    pub file: String,
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.set, self.file)
    }
}

impl Benchmark {
    /// Create a benchmark from its set and program name.
    pub fn new(set: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            set: set.into(),
            file: file.into(),
        }
    }

    /// The `set/file` name that filters match against.
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Input bitcode.
    pub fn bitcode(&self, layout: &Layout) -> PathBuf {
        layout
            .bitcode_root()
            .join(&self.set)
            .join(format!("{}.bc", self.file))
    }

    /// Directory holding everything generated for this benchmark.
    pub fn work_dir(&self, layout: &Layout) -> PathBuf {
        layout.work_root().join(&self.set).join(&self.file)
    }

    /// Raw facts extracted from the bitcode.
    pub fn bc_facts_dir(&self, layout: &Layout) -> PathBuf {
        self.work_dir(layout).join("bc-facts")
    }

    /// Relations the engines start from.
    pub fn input_dir(&self, layout: &Layout) -> PathBuf {
        self.work_dir(layout).join("benchmark-input")
    }

    /// Where Soufflé writes its output relations.
    pub fn souffle_output_dir(&self, layout: &Layout) -> PathBuf {
        self.work_dir(layout).join("souffle-out")
    }

    /// Captured command lines and engine output.
    pub fn log_dir(&self, layout: &Layout) -> PathBuf {
        self.work_dir(layout).join("logs")
    }

    /// Position in the suite, if this is one of the suite's benchmarks.
    pub fn suite_index(&self) -> Option<usize> {
        benchmarks().iter().position(|b| b == self)
    }
}

/// Every benchmark in the suite.
pub fn benchmarks() -> Vec<Benchmark> {
    BENCHMARK_SETS
        .iter()
        .flat_map(|set| set.files.iter().map(|file| Benchmark::new(set.name, *file)))
        .collect()
}

/// The benchmarks whose `set/file` name matches the glob `filter`.
pub fn select(filter: &str) -> Result<Vec<Benchmark>> {
    let pattern = Pattern::new(filter)?;
    Ok(benchmarks()
        .into_iter()
        .filter(|b| pattern.matches(&b.name()))
        .collect())
}
