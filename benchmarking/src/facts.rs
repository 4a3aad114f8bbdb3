// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Generate the fact directories the engines start from.
//!
//! Generation is two steps: cclyzer++ extracts raw facts from the bitcode,
//! then a Soufflé setup program derives the benchmark input relations shared
//! by every engine.

use std::{fs, path::Path, process::Command};

use walkdir::WalkDir;

use crate::{
    error::{BenchError, Result},
    suite::Benchmark,
    toolchain::{run_step, Layout},
};

/// Number of relation files directly or transitively under `dir`.
pub fn count_relation_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Regenerate the raw facts and benchmark input of `bench`.
pub fn generate(layout: &Layout, bench: &Benchmark) -> Result<()> {
    let bitcode = bench.bitcode(layout);
    if !bitcode.is_file() {
        return Err(BenchError::MissingBitcode {
            benchmark: bench.name(),
            path: bitcode,
        });
    }
    let bc_facts = bench.bc_facts_dir(layout);
    let input = bench.input_dir(layout);
    recreate_dir(&bc_facts)?;
    recreate_dir(&input)?;

    run_step(
        &format!("extract facts for {bench}"),
        Command::new(layout.factgen_bin())
            .arg("--out-dir")
            .arg(&bc_facts)
            .args(["--context-sensitivity", "insensitive"])
            .arg(&bitcode),
    )?;
    run_step(
        &format!("prepare input for {bench}"),
        Command::new(layout.souffle_bin())
            .arg("--fact-dir")
            .arg(&bc_facts)
            .arg("--output-dir")
            .arg(&input)
            .arg(layout.resolve(&layout.setup_program)),
    )?;
    log::info!(
        "{bench}: {} bitcode relations, {} input relations",
        count_relation_files(&bc_facts),
        count_relation_files(&input)
    );
    Ok(())
}

/// Make sure `bench` has a non-empty benchmark input directory.
pub fn check(layout: &Layout, bench: &Benchmark) -> Result<()> {
    let input = bench.input_dir(layout);
    if input.is_dir() && count_relation_files(&input) > 0 {
        Ok(())
    } else {
        Err(BenchError::MissingFacts {
            benchmark: bench.name(),
            path: input,
        })
    }
}
