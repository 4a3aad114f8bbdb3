// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The flat CSV cache of individual trials.
//!
//! Every engine run becomes one row. The cache is rewritten after each trial,
//! so an interrupted session can be resumed and reports can be regenerated
//! without re-running anything.

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};

use crate::{
    engine::Engine,
    error::{BenchError, Result},
    measurement::{Outcome, RunMeasurement},
    suite::Benchmark,
};

/// Timestamps are stored as RFC 3339 with millisecond precision.
mod rfc3339 {
    use std::time::SystemTime;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_rfc3339_millis(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let s = String::deserialize(d)?;
        humantime::parse_rfc3339(&s).map_err(D::Error::custom)
    }
}

/// A single engine run on a single benchmark: one row of the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Benchmark set
    pub set: String,
    /// Program within the set
    pub file: String,
    /// Engine that was run
    pub engine: Engine,
    /// Index of the trial, starting from 0
    pub trial: usize,
    /// How the run ended
    pub outcome: Outcome,
    /// Wall-clock seconds
    pub seconds: f64,
    /// User CPU seconds
    pub user_seconds: f64,
    /// Peak RSS
    pub max_mem_mb: usize,
    /// Exit status, empty if killed by a signal
    pub exit_code: Option<i32>,
    /// When the engine was started
    #[serde(with = "rfc3339")]
    pub started_at: SystemTime,
    /// When the engine was reaped
    #[serde(with = "rfc3339")]
    pub finished_at: SystemTime,
}

impl TrialRecord {
    /// Record `measurement` as trial number `trial` of `engine` on `bench`.
    pub fn new(
        bench: &Benchmark,
        engine: Engine,
        trial: usize,
        measurement: &RunMeasurement,
    ) -> Self {
        Self {
            set: bench.set.clone(),
            file: bench.file.clone(),
            engine,
            trial,
            outcome: measurement.outcome(),
            seconds: measurement.real_time.as_secs_f64(),
            user_seconds: measurement.user_time.as_secs_f64(),
            max_mem_mb: measurement.max_mem_mb(),
            exit_code: measurement.exit_code,
            started_at: measurement.started_at,
            finished_at: measurement.finished_at,
        }
    }

    /// The benchmark this trial ran on.
    pub fn benchmark(&self) -> Benchmark {
        Benchmark::new(&self.set, &self.file)
    }

    fn is_trial(&self, bench: &Benchmark, engine: Engine, trial: usize) -> bool {
        self.set == bench.set
            && self.file == bench.file
            && self.engine == engine
            && self.trial == trial
    }
}

/// The trials recorded so far, backed by a CSV file.
#[derive(Debug, Clone)]
pub struct ResultsCache {
    path: PathBuf,
    records: Vec<TrialRecord>,
}

impl ResultsCache {
    /// A cache at `path` that ignores anything already stored there.
    pub fn empty<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            records: vec![],
        }
    }

    /// Load the cache at `path`, or start an empty one if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::empty(path));
        }
        Ok(Self {
            path: path.to_owned(),
            records: load_records(path)?,
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded trials, in insertion order.
    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    /// The recorded trial of `engine` on `bench`, if any.
    pub fn get(&self, bench: &Benchmark, engine: Engine, trial: usize) -> Option<&TrialRecord> {
        self.records
            .iter()
            .find(|r| r.is_trial(bench, engine, trial))
    }

    /// Add a trial, replacing an earlier record of the same trial.
    pub fn insert(&mut self, record: TrialRecord) {
        let bench = record.benchmark();
        match self
            .records
            .iter_mut()
            .find(|r| r.is_trial(&bench, record.engine, record.trial))
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Write the cache to disk. The file is replaced atomically so an
    /// interrupted write never loses earlier trials.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let cache_err = |source: csv::Error| BenchError::Cache {
            path: self.path.clone(),
            source,
        };
        let mut writer = csv::Writer::from_path(&tmp).map_err(cache_err)?;
        for record in &self.records {
            writer.serialize(record).map_err(cache_err)?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Read every trial stored in the CSV file at `path`.
pub fn load_records(path: &Path) -> Result<Vec<TrialRecord>> {
    let cache_err = |source: csv::Error| BenchError::Cache {
        path: path.to_owned(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(cache_err)?;
    let records = reader
        .deserialize()
        .collect::<Result<Vec<TrialRecord>, csv::Error>>()
        .map_err(cache_err)?;
    Ok(records)
}
