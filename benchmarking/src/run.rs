// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Run the engines over the benchmark suite and record every trial.

use std::{
    fs::{self, File},
    io::Write,
    path::PathBuf,
    time::Duration,
};

use crate::{
    engine::Engine,
    error::{BenchError, Result},
    facts,
    measurement::{Outcome, RunMeasurement},
    results::{ResultsCache, TrialRecord},
    suite::Benchmark,
    timer::Timer,
    toolchain::Layout,
};

/// The setup shared by every trial of a session.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Engines to run, in order
    pub engines: Vec<Engine>,
    /// Time limit before killing an engine
    pub time_limit: Duration,
    /// Number of trials per engine and benchmark
    pub repeat: usize,
    /// Value of Soufflé's `--jobs`
    pub souffle_jobs: usize,
    /// Re-run trials even if they are cached, replacing the cached records
    pub fresh: bool,
    /// Keep going after an engine fails instead of stopping the session
    pub keep_going: bool,
    /// Save the command line, stdout, and stderr of every trial
    pub keep_logs: bool,
    /// `bench-timer` binary to use instead of searching for one
    pub timer_bin: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            engines: Engine::ALL.to_vec(),
            time_limit: Duration::from_secs(600),
            repeat: 1,
            souffle_jobs: 1,
            fresh: false,
            keep_going: false,
            keep_logs: false,
            timer_bin: None,
        }
    }
}

/// Runs trials and records them in a [`ResultsCache`].
pub struct Runner<'a> {
    layout: &'a Layout,
    config: &'a RunConfig,
    cache: &'a mut ResultsCache,
}

impl<'a> Runner<'a> {
    /// Create a runner storing its trials in `cache`.
    pub fn new(layout: &'a Layout, config: &'a RunConfig, cache: &'a mut ResultsCache) -> Self {
        Self {
            layout,
            config,
            cache,
        }
    }

    fn timer(&self, bench: &Benchmark, engine: Engine, trial: usize) -> Result<Timer> {
        let mut timer = engine.timer(self.layout, bench, self.config.souffle_jobs);
        timer.timeout(self.config.time_limit);
        if let Some(helper) = &self.config.timer_bin {
            timer.helper(helper);
        }
        if engine == Engine::Souffle {
            fs::create_dir_all(bench.souffle_output_dir(self.layout))?;
        }
        if self.config.keep_logs {
            let log_dir = bench.log_dir(self.layout);
            fs::create_dir_all(&log_dir)?;
            let stem = format!("{engine}-{trial}");
            timer.stdout(log_dir.join(format!("{stem}.stdout")));
            timer.stderr(log_dir.join(format!("{stem}.stderr")));
            let mut f = File::create(log_dir.join(format!("{stem}.command")))?;
            writeln!(&mut f, "{}", timer.cmdline())?;
        }
        Ok(timer)
    }

    /// Run a single trial and record it, without consulting the cache.
    pub fn run_trial(
        &mut self,
        bench: &Benchmark,
        engine: Engine,
        trial: usize,
    ) -> Result<RunMeasurement> {
        let timer = self.timer(bench, engine, trial)?;
        log::debug!("{}", timer.cmdline());
        let measurement = timer.run()?;
        self.cache
            .insert(TrialRecord::new(bench, engine, trial, &measurement));
        self.cache.save()?;
        Ok(measurement)
    }

    /// Run every trial of `engine` on `bench` that is not already cached.
    pub fn run_engine(&mut self, bench: &Benchmark, engine: Engine) -> Result<()> {
        let repeat = self.config.repeat;
        for trial in 0..repeat {
            let cached = if self.config.fresh {
                None
            } else {
                self.cache.get(bench, engine, trial)
            };
            let outcome = match cached {
                Some(cached) => {
                    log::debug!("{engine} {bench} #{trial}: cached ({})", cached.outcome);
                    cached.outcome
                }
                None => {
                    log::info!("{engine} {bench} ({}/{repeat})", trial + 1);
                    let measurement = self.run_trial(bench, engine, trial)?;
                    match measurement.outcome() {
                        Outcome::Ok => log::info!(
                            "{engine} {bench}: {:0.2}s, {}MB",
                            measurement.real_time.as_secs_f64(),
                            measurement.max_mem_mb()
                        ),
                        Outcome::Timeout => log::warn!(
                            "{engine} {bench}: timed out after {:0.0}s",
                            measurement.real_time.as_secs_f64()
                        ),
                        Outcome::Fail => {
                            log::error!(
                                "{engine} {bench}: failed ({})",
                                measurement.exit_description()
                            );
                            if !self.config.keep_going {
                                return Err(BenchError::EngineFailed {
                                    engine,
                                    benchmark: bench.name(),
                                    detail: measurement.exit_description(),
                                });
                            }
                        }
                    }
                    measurement.outcome()
                }
            };
            // further trials would only repeat the timeout or failure
            if outcome != Outcome::Ok {
                break;
            }
        }
        Ok(())
    }

    /// Check the facts of `bench` and run every configured engine on it.
    pub fn run_benchmark(&mut self, bench: &Benchmark) -> Result<()> {
        facts::check(self.layout, bench)?;
        for &engine in &self.config.engines {
            self.run_engine(bench, engine)?;
        }
        Ok(())
    }

    /// Run the whole selection of benchmarks, in order.
    pub fn run_all(&mut self, benches: &[Benchmark]) -> Result<()> {
        for bench in benches {
            self.run_benchmark(bench)?;
        }
        Ok(())
    }
}
