// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Errors raised while driving the external tools and processing results.

use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

use crate::engine::Engine;

/// Everything that can go wrong in a benchmarking session.
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum BenchError {
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{step} failed ({status})")]
    StepFailed { step: String, status: ExitStatus },
    #[error("{engine} failed on {benchmark} ({detail})")]
    EngineFailed {
        engine: Engine,
        benchmark: String,
        detail: String,
    },
    #[error("{tool} not found at {} (try {hint})", .path.display())]
    ToolMissing {
        tool: &'static str,
        path: PathBuf,
        hint: &'static str,
    },
    #[error("bitcode for {benchmark} not found at {}", .path.display())]
    MissingBitcode { benchmark: String, path: PathBuf },
    #[error("no benchmark input for {benchmark} in {} (try --gen-facts)", .path.display())]
    MissingFacts { benchmark: String, path: PathBuf },
    #[error("bench-timer binary not available - try cargo build --release --bin bench-timer")]
    TimerMissing,
    #[error("could not parse output of bench-timer: {0}")]
    TimerOutput(String),
    #[error("results cache {}: {source}", .path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid benchmark filter: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("could not draw chart: {0}")]
    Plot(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type used throughout the crate.
pub type Result<T, E = BenchError> = std::result::Result<T, E>;
