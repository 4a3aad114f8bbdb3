// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The analysis engines under comparison and how each one is invoked.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{suite::Benchmark, timer::Timer, toolchain::Layout};

/// An engine that runs the pointer analysis over a benchmark's input
/// relations.
#[derive(
    clap::ValueEnum,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    /// Soufflé, interpreting the Datalog analysis
    Souffle,
    /// egglog with semi-naive evaluation
    Egglog,
    /// egglog with naive evaluation
    EgglogNaive,
}

impl Engine {
    /// Every engine, in reporting order.
    pub const ALL: [Engine; 3] = [Engine::Souffle, Engine::Egglog, Engine::EgglogNaive];

    /// Name used on the command line, in tables, and in the results cache.
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Souffle => "souffle",
            Engine::Egglog => "egglog",
            Engine::EgglogNaive => "egglog-naive",
        }
    }

    /// Build the timed invocation of this engine on `bench`.
    pub fn timer(&self, layout: &Layout, bench: &Benchmark, souffle_jobs: usize) -> Timer {
        let input = bench.input_dir(layout);
        match self {
            Engine::Souffle => {
                let mut timer = Timer::new(layout.souffle_bin());
                timer
                    .arg(format!("--jobs={souffle_jobs}"))
                    .arg("--fact-dir")
                    .arg(&input)
                    .arg("--output-dir")
                    .arg(bench.souffle_output_dir(layout))
                    .arg(layout.resolve(&layout.souffle_program));
                timer
            }
            Engine::Egglog | Engine::EgglogNaive => {
                let mut timer = Timer::new(layout.egglog_bin());
                if *self == Engine::EgglogNaive {
                    timer.arg("--naive");
                }
                timer
                    .arg("--fact-directory")
                    .arg(&input)
                    .arg(layout.resolve(&layout.egglog_program));
                timer
            }
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pair of engines to compare, as `(baseline, candidate)`. The reported
/// speedup is `baseline time / candidate time`.
pub const COMPARISONS: [(Engine, Engine); 3] = [
    (Engine::Souffle, Engine::Egglog),
    (Engine::EgglogNaive, Engine::Egglog),
    (Engine::Souffle, Engine::EgglogNaive),
];

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    fn layout() -> Layout {
        Layout {
            root: "/w".into(),
            ..Layout::default()
        }
    }

    #[test]
    fn souffle_invocation() {
        let bench = Benchmark::new("coreutils", "cat");
        let timer = Engine::Souffle.timer(&layout(), &bench, 4);
        assert_eq!(
            timer.cmdline(),
            "souffle --jobs=4 \
             --fact-dir /w/bench-data/coreutils/cat/benchmark-input \
             --output-dir /w/bench-data/coreutils/cat/souffle-out \
             /w/mini-cclyzerpp/main.dl"
        );
    }

    #[test]
    fn egglog_invocations() {
        let bench = Benchmark::new("postgresql", "psql");
        let semi = Engine::Egglog.timer(&layout(), &bench, 1);
        assert_eq!(
            semi.cmdline(),
            "/w/egg-smol/target/release/egg-smol \
             --fact-directory /w/bench-data/postgresql/psql/benchmark-input \
             /w/mini-cclyzerpp/main.egg"
        );
        let naive = Engine::EgglogNaive.timer(&layout(), &bench, 1);
        assert_eq!(naive.args[0], "--naive");
        assert_eq!(naive.args.len(), semi.args.len() + 1);
    }

    #[test]
    fn names_agree_with_cli_and_serde() {
        for engine in Engine::ALL {
            let parsed = Engine::from_str(engine.name(), false).unwrap();
            assert_eq!(parsed, engine);
            assert_eq!(
                serde_json::to_string(&engine).unwrap(),
                format!("\"{}\"", engine.name())
            );
        }
    }
}
