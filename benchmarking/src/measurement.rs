// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Statistics from a single engine run, mostly gathered through `getrusage`.

use std::{
    fmt,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};

/// How a single run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Exited with status 0 before the time limit.
    Ok,
    /// Killed by the time limit.
    Timeout,
    /// Exited with a non-zero status or was killed by a signal.
    Fail,
}

impl Outcome {
    /// Short name used in tables and in the results cache.
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Timeout => "timeout",
            Outcome::Fail => "fail",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `RunMeasurement` holds the statistics captured from a single run. This
/// includes the wall-clock interval of the run, resource usage through
/// `getrusage` (the same system call that powers `time`), and how the process
/// exited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeasurement {
    /// Wall-clock time the child was started.
    pub started_at: SystemTime,
    /// Wall-clock time the child was reaped.
    pub finished_at: SystemTime,
    /// Elapsed time of run.
    pub real_time: Duration,
    /// User time (including all child processes).
    pub user_time: Duration,
    /// System time (including all child processes).
    pub sys_time: Duration,
    /// Max memory usage (RSS) in bytes
    pub max_mem_bytes: usize,
    /// Whether the run was killed early due to a timeout.
    pub timed_out: bool,
    /// Exit status of the child, or `None` if it was killed by a signal.
    pub exit_code: Option<i32>,
}

impl RunMeasurement {
    /// Maximum memory usage in MB.
    pub fn max_mem_mb(&self) -> usize {
        self.max_mem_bytes / 1024 / 1024
    }

    /// Ratio of CPU time to wall clock time. Can exceed 1 for a multi-threaded
    /// engine (eg, Soufflé with `--jobs`).
    pub fn cpu_utilization(&self) -> f64 {
        self.user_time.as_secs_f64() / self.real_time.as_secs_f64()
    }

    /// Classify the run. A timeout wins over the exit status, since the
    /// child is killed by the watchdog.
    pub fn outcome(&self) -> Outcome {
        if self.timed_out {
            Outcome::Timeout
        } else if self.exit_code == Some(0) {
            Outcome::Ok
        } else {
            Outcome::Fail
        }
    }

    /// Human-readable description of how the process exited.
    pub fn exit_description(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "killed by signal".to_string(),
        }
    }

    /// Print a human-readable version of these results.
    pub fn print(&self) {
        println!(
            "time: {:0.2}s{timed_out_msg}",
            &self.real_time.as_secs_f64(),
            timed_out_msg = if self.timed_out { " (timed out)" } else { "" }
        );
        println!("  user:   {:0.2}s", self.user_time.as_secs_f64());
        println!("  sys:    {:0.2}s", self.sys_time.as_secs_f64());
        println!("max mem: {}MB", self.max_mem_mb());
        println!("status:  {}", self.exit_description());
    }

    /// Convert these results to a compact JSON representation.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse results serialized as JSON.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
